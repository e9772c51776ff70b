//! Rolling waveform buffer for the selected subject.

use std::collections::VecDeque;

/// Default number of samples kept.
pub const DEFAULT_CAPACITY: usize = 100;

/// Fixed-capacity FIFO of waveform samples.
///
/// The buffer is bound to one subject at a time. Samples for any other
/// subject are refused, so late data from a previous selection cannot leak
/// into the current trace. Contents depend only on the order of `append`
/// calls, never on their timing.
#[derive(Debug, Clone)]
pub struct WaveformBuffer {
    capacity: usize,
    subject: Option<String>,
    samples: VecDeque<f64>,
}

impl Default for WaveformBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl WaveformBuffer {
    /// Create an empty, unbound buffer.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            subject: None,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Subject the buffer currently accepts samples for.
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Clear to `capacity` zero samples, keeping the subject binding.
    ///
    /// A full buffer of zeros keeps chart rendering stable.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.samples.resize(self.capacity, 0.0);
    }

    /// Reset and bind to a new subject.
    pub fn rebind(&mut self, subject: Option<&str>) {
        self.subject = subject.map(str::to_string);
        self.reset();
    }

    /// Append samples for `subject`, evicting the oldest beyond capacity.
    ///
    /// Returns false and leaves the buffer untouched if `subject` is not the
    /// bound subject.
    pub fn append(&mut self, subject: &str, samples: &[f64]) -> bool {
        if self.subject.as_deref() != Some(subject) {
            return false;
        }
        for &sample in samples {
            self.samples.push_back(sample);
            if self.samples.len() > self.capacity {
                self.samples.pop_front();
            }
        }
        true
    }

    /// Iterate samples oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.samples.iter()
    }

    /// Copy the samples out, oldest first.
    pub fn to_vec(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }

    /// Most recent sample.
    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// An empty buffer bound to "s1".
    fn empty_buffer(capacity: usize) -> WaveformBuffer {
        let mut buffer = WaveformBuffer::new(capacity);
        buffer.subject = Some("s1".to_string());
        buffer
    }

    #[test]
    fn test_new_buffer_is_empty_and_unbound() {
        let buffer = WaveformBuffer::new(5);
        assert!(buffer.is_empty());
        assert_eq!(buffer.subject(), None);
    }

    #[test]
    fn test_reset_fills_with_zeros() {
        let mut buffer = empty_buffer(5);
        buffer.append("s1", &[1.0, 2.0]);
        buffer.reset();
        assert_eq!(buffer.to_vec(), vec![0.0; 5]);
        assert_eq!(buffer.subject(), Some("s1"));
    }

    #[test]
    fn test_append_under_capacity_preserves_order() {
        let mut buffer = empty_buffer(10);
        assert!(buffer.append("s1", &[1.0, 2.0]));
        assert!(buffer.append("s1", &[3.0]));
        assert!(buffer.append("s1", &[]));
        assert!(buffer.append("s1", &[4.0, 5.0, 6.0]));

        assert_eq!(buffer.len(), 6);
        assert_eq!(buffer.to_vec(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_append_over_capacity_keeps_last_samples() {
        let mut buffer = empty_buffer(4);
        buffer.append("s1", &[1.0, 2.0, 3.0]);
        buffer.append("s1", &[4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);

        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.to_vec(), vec![6.0, 7.0, 8.0, 9.0]);
        assert_eq!(buffer.latest(), Some(9.0));
    }

    #[test]
    fn test_one_at_a_time_past_capacity() {
        let mut buffer = empty_buffer(100);
        for i in 1..=120 {
            buffer.append("s1", &[i as f64]);
        }

        let expected: Vec<f64> = (21..=120).map(|i| i as f64).collect();
        assert_eq!(buffer.to_vec(), expected);
    }

    #[test]
    fn test_zero_filled_buffer_rolls_forward() {
        let mut buffer = WaveformBuffer::new(3);
        buffer.rebind(Some("s1"));
        buffer.append("s1", &[0.5]);
        assert_eq!(buffer.to_vec(), vec![0.0, 0.0, 0.5]);
    }

    #[test]
    fn test_append_for_other_subject_is_noop() {
        let mut buffer = empty_buffer(4);
        buffer.append("s1", &[1.0]);

        assert!(!buffer.append("s2", &[9.0, 9.0]));
        assert_eq!(buffer.to_vec(), vec![1.0]);

        let mut unbound = WaveformBuffer::new(2);
        assert!(!unbound.append("s1", &[1.0]));
        assert!(unbound.is_empty());
    }

    #[test]
    fn test_rebind_resets() {
        let mut buffer = empty_buffer(3);
        buffer.append("s1", &[1.0, 2.0]);
        buffer.rebind(Some("s2"));

        assert_eq!(buffer.to_vec(), vec![0.0; 3]);
        assert!(!buffer.append("s1", &[7.0]));
        assert!(buffer.append("s2", &[7.0]));
    }

    #[test]
    fn test_identical_call_sequences_give_identical_contents() {
        let calls: Vec<Vec<f64>> = vec![vec![0.1, 0.2], vec![0.3], vec![0.4, 0.5, 0.6, 0.7]];
        let mut a = empty_buffer(5);
        let mut b = empty_buffer(5);

        for call in &calls {
            a.append("s1", call);
        }
        for call in &calls {
            std::thread::sleep(std::time::Duration::from_millis(1));
            b.append("s1", call);
        }

        assert_eq!(a.to_vec(), b.to_vec());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        assert_eq!(WaveformBuffer::new(0).capacity(), 1);
    }
}
