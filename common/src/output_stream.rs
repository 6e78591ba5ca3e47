use std::sync::Arc;

use parking_lot::Mutex;

/// Shared, append-only list of text lines.
///
/// Clones share the same storage, so one handle can be given to a producer
/// while another is kept to read the collected lines afterwards.
#[derive(Debug, Default, Clone)]
pub struct OutputStream(Arc<Mutex<Vec<String>>>);

impl OutputStream {
    pub fn new() -> Self {
        OutputStream(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn write<S: Into<String>>(&self, s: S) {
        self.0.lock().push(s.into());
    }

    /// Drains the collected lines.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut self.0.lock())
    }

    /// Copies the collected lines without draining them.
    pub fn snapshot(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    /// True if any collected line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.0.lock().iter().any(|line| line.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_lines() {
        let stream = OutputStream::new();
        let writer = stream.clone();
        writer.write("THRESHOLD = 3");
        writer.write(String::from("NUMBER OF PEAKS = 0"));

        assert_eq!(stream.len(), 2);
        assert!(stream.contains("PEAKS = 0"));
        assert!(!stream.contains("VALID"));
    }

    #[test]
    fn test_take_drains_but_snapshot_does_not() {
        let stream = OutputStream::new();
        stream.write("a");
        assert_eq!(stream.snapshot(), vec!["a".to_string()]);
        assert_eq!(stream.len(), 1);

        assert_eq!(stream.take(), vec!["a".to_string()]);
        assert!(stream.is_empty());
    }
}
