use std::time::{Duration, Instant};

/// Holds back a rapidly changing value until it stopped changing for the quiescence period.
///
/// Time is passed in by the caller, the debouncer never looks at the clock itself.
#[derive(Debug)]
pub struct Debouncer<T> {
    quiescence: Duration,
    candidate: Option<(T, Instant)>,
}

impl<T: PartialEq> Debouncer<T> {
    pub fn new(quiescence: Duration) -> Self {
        Self {
            quiescence,
            candidate: None,
        }
    }

    /// Every proposal restarts the quiescence period, unless it repeats the current candidate.
    pub fn propose(&mut self, value: T, now: Instant) {
        if let Some((candidate, _)) = &self.candidate
            && *candidate == value
        {
            return;
        }
        self.candidate = Some((value, now));
    }

    /// Returns the candidate once it has been stable for long enough. It is handed out only once.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let (_, since) = self.candidate.as_ref()?;
        if now.saturating_duration_since(*since) < self.quiescence {
            return None;
        }
        self.candidate.take().map(|(value, _)| value)
    }

    pub fn is_settling(&self) -> bool {
        self.candidate.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settles_after_quiescence() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(250));

        debouncer.propose(1, start);
        assert_eq!(debouncer.poll(start + Duration::from_millis(100)), None);
        assert_eq!(debouncer.poll(start + Duration::from_millis(250)), Some(1));
        assert_eq!(debouncer.poll(start + Duration::from_millis(500)), None);
    }

    #[test]
    fn rapid_changes_only_apply_the_last_value() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(250));

        for (i, value) in [1, 2, 3, 4].into_iter().enumerate() {
            debouncer.propose(value, start + Duration::from_millis(100 * i as u64));
            assert_eq!(debouncer.poll(start + Duration::from_millis(100 * i as u64 + 50)), None);
        }

        assert_eq!(debouncer.poll(start + Duration::from_millis(549)), None);
        assert_eq!(debouncer.poll(start + Duration::from_millis(550)), Some(4));
        assert!(!debouncer.is_settling());
    }

    #[test]
    fn repeating_the_candidate_does_not_restart() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(250));

        debouncer.propose(7, start);
        debouncer.propose(7, start + Duration::from_millis(200));
        assert_eq!(debouncer.poll(start + Duration::from_millis(260)), Some(7));
    }
}
