use std::time::{Duration, Instant};

/// Single-shot countdown that abandons an unfinished key sequence.
pub trait SequenceTimer {
    /// Starts the countdown over, replacing any earlier one.
    fn arm(&mut self);
    fn cancel(&mut self);
    fn is_armed(&self) -> bool;
}

/// Timer polled by the event loop: it only records when it would fire.
#[derive(Debug, Clone)]
pub struct DeadlineTimer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl DeadlineTimer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn arm_at(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Time left before firing; zero once overdue, `None` while disarmed.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }
}

impl SequenceTimer for DeadlineTimer {
    fn arm(&mut self) {
        self.arm_at(Instant::now());
    }

    fn cancel(&mut self) {
        self.deadline = None;
    }

    fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(1000);

    #[test]
    fn fires_only_after_delay() {
        let now = Instant::now();
        let mut timer = DeadlineTimer::new(DELAY);
        assert!(!timer.expired(now + DELAY));
        assert_eq!(timer.remaining(now), None);

        timer.arm_at(now);
        assert!(timer.is_armed());
        assert!(!timer.expired(now + Duration::from_millis(999)));
        assert!(timer.expired(now + DELAY));
        assert_eq!(
            timer.remaining(now + Duration::from_millis(400)),
            Some(Duration::from_millis(600))
        );
        assert_eq!(timer.remaining(now + DELAY * 2), Some(Duration::ZERO));
    }

    #[test]
    fn rearming_pushes_deadline_back() {
        let now = Instant::now();
        let mut timer = DeadlineTimer::new(DELAY);
        timer.arm_at(now);
        timer.arm_at(now + Duration::from_millis(800));
        assert!(!timer.expired(now + DELAY));
        assert!(timer.expired(now + Duration::from_millis(1800)));
    }

    #[test]
    fn cancel_disarms() {
        let now = Instant::now();
        let mut timer = DeadlineTimer::new(DELAY);
        timer.arm_at(now);
        timer.cancel();
        assert!(!timer.is_armed());
        assert!(!timer.expired(now + DELAY * 5));
    }
}
