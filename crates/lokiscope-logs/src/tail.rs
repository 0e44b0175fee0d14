use std::time::Duration;

use tracing::debug;

use lokiscope_types::TailState;

/// Live/Paused state machine for tailing.
///
/// Any viewport move away from the newest row pauses tailing; only an explicit
/// return-to-top resumes it. Polling happens only while live.
#[derive(Clone, Debug)]
pub struct LiveTailController {
    state: TailState,
    poll_interval: Duration,
}

impl LiveTailController {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            state: TailState::Live,
            poll_interval,
        }
    }

    pub fn state(&self) -> TailState {
        self.state
    }

    pub fn is_live(&self) -> bool {
        self.state == TailState::Live
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Viewport moved. Returns true if this paused the tail.
    pub fn on_viewport(&mut self, at_top: bool) -> bool {
        if self.state == TailState::Live && !at_top {
            debug!("viewport left the newest line, pausing live tail");
            self.state = TailState::Paused;
            return true;
        }
        false
    }

    /// Explicit return to the newest line. Returns true if this resumed the tail.
    pub fn return_to_top(&mut self) -> bool {
        let resumed = self.state == TailState::Paused;
        self.state = TailState::Live;
        resumed
    }

    /// Whether a timer tick should poll
    pub fn should_poll(&self) -> bool {
        self.is_live()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_live() {
        let tail = LiveTailController::new(Duration::from_secs(10));
        assert!(tail.is_live());
        assert!(tail.should_poll());
        assert_eq!(tail.poll_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_scroll_away_pauses() {
        let mut tail = LiveTailController::new(Duration::from_secs(10));
        assert!(!tail.on_viewport(true));
        assert!(tail.is_live());

        assert!(tail.on_viewport(false));
        assert_eq!(tail.state(), TailState::Paused);
        assert!(!tail.should_poll());
    }

    #[test]
    fn test_scrolling_back_up_does_not_resume() {
        let mut tail = LiveTailController::new(Duration::from_secs(10));
        tail.on_viewport(false);
        assert!(!tail.on_viewport(true));
        assert_eq!(tail.state(), TailState::Paused);
    }

    #[test]
    fn test_return_to_top_resumes() {
        let mut tail = LiveTailController::new(Duration::from_secs(10));
        tail.on_viewport(false);
        assert!(tail.return_to_top());
        assert!(tail.is_live());
        assert!(!tail.return_to_top());
    }
}
