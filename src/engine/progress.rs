// Progress gate — keeps reported percentages bounded, non-decreasing, and ending at 100 once.

#[derive(Debug, Default)]
pub struct ProgressGate {
    last: Option<u8>,
}

impl ProgressGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a raw percentage. Returns the value to publish, or `None` if it
    /// would repeat or move backwards.
    pub fn offer(&mut self, percent: u8) -> Option<u8> {
        let percent = percent.min(100);
        match self.last {
            Some(last) if percent <= last => None,
            _ => {
                self.last = Some(percent);
                Some(percent)
            }
        }
    }

    /// Mark the fetch complete. Returns `Some(100)` unless 100 was already published.
    pub fn finish(&mut self) -> Option<u8> {
        self.offer(100)
    }

    pub fn current(&self) -> u8 {
        self.last.unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_drops_regressions_and_repeats() {
        let mut gate = ProgressGate::new();
        let published: Vec<u8> = [0, 10, 10, 5, 37, 200]
            .into_iter()
            .filter_map(|p| gate.offer(p))
            .collect();
        assert_eq!(published, vec![0, 10, 37, 100]);
        assert_eq!(gate.finish(), None);
        assert_eq!(gate.current(), 100);
    }

    #[test]
    fn test_gate_finish_publishes_100_once() {
        let mut gate = ProgressGate::new();
        assert_eq!(gate.offer(42), Some(42));
        assert_eq!(gate.finish(), Some(100));
        assert_eq!(gate.finish(), None);
        assert_eq!(gate.offer(100), None);
    }
}
