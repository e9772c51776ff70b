use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use vitalwatch::connection::TcpConnector;
use vitalwatch::{FileRoster, Monitor, MonitorConfig, StreamConnection, Supervisor};
use vitalwatch_types::Subject;

#[derive(Parser, Debug)]
#[command(name = "vitalwatch")]
#[command(about = "Real-time vitals telemetry monitor")]
struct Args {
    /// Monitoring service endpoint (host:port)
    #[arg(short, long)]
    connect: Option<String>,

    /// Path to a config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Subject to select and start tracking once connected
    #[arg(short, long)]
    subject: Option<String>,

    /// JSON roster file
    #[arg(long)]
    roster: Option<PathBuf>,

    /// JSON alert backlog file
    #[arg(long)]
    alerts: Option<PathBuf>,

    /// Summary interval in seconds
    #[arg(short, long, default_value = "5")]
    refresh: u64,

    /// Write the final state to a JSON file on exit
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Number of waveform samples to keep
    #[arg(long)]
    waveform_capacity: Option<usize>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = MonitorConfig::load(args.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(endpoint) = &args.connect {
        config.endpoint = endpoint.clone();
    }
    if let Some(capacity) = args.waveform_capacity {
        config.waveform_capacity = capacity;
    }
    if args.roster.is_some() {
        config.roster_path = args.roster.clone();
    }
    if args.alerts.is_some() {
        config.alerts_path = args.alerts.clone();
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(config, args))
}

async fn run(config: MonitorConfig, args: Args) -> Result<()> {
    let connector = Arc::new(TcpConnector::new(config.endpoint.clone()));
    let connection = StreamConnection::new(connector, config.handshake_timeout())
        .with_outbound_capacity(config.outbound_queue);
    let monitor = Monitor::new(Arc::new(connection.handle()), config.monitor_options());

    if let Some(path) = &config.roster_path {
        let mut roster = FileRoster::new(path);
        if let Some(alerts) = &config.alerts_path {
            roster = roster.with_alerts(alerts);
        }
        monitor
            .load_roster(&roster)
            .await
            .with_context(|| format!("failed to load roster from {}", path.display()))?;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut supervisor = Supervisor::new(
        connection,
        monitor.clone(),
        config.reconnect.backoff(),
        shutdown_rx,
    );
    if let Some(subject) = &args.subject {
        if monitor.select(subject).is_err() {
            // Without a roster entry the subject is registered under its id.
            warn!(subject = %subject, "subject not in roster, adding it");
            let mut subjects = monitor.view().subjects;
            subjects.push(Subject::new(subject.clone(), subject.clone()));
            monitor.load_subjects(subjects);
            monitor.select(subject)?;
        }
        supervisor = supervisor.track_on_connect(subject.clone());
    }

    let mut task = tokio::spawn(supervisor.run());
    let mut ticker = tokio::time::interval(Duration::from_secs(args.refresh.max(1)));

    let result = loop {
        tokio::select! {
            _ = ticker.tick() => info!("{}", monitor.view().summary()),
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                let _ = shutdown_tx.send(true);
                break (&mut task).await;
            }
            joined = &mut task => break joined,
        }
    };

    if let Some(path) = &args.export {
        export_to_file(&monitor, path)?;
    }

    match result? {
        Ok(()) => Ok(()),
        Err(e) => {
            error!(error = %e, "connection supervisor stopped");
            Err(e.into())
        }
    }
}

/// Export the current monitor state to a JSON file
fn export_to_file(monitor: &Monitor, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&monitor.view())?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write export to {}", path.display()))?;
    println!("Exported monitor state to: {}", path.display());
    Ok(())
}
