use std::time::Duration;

use tokio::time::Instant;

/// Ephemeral "new activity" flag.
///
/// Raising restarts the window (latest wins); expiry is evaluated on read, so
/// there is never more than one deadline in play.
#[derive(Debug, Clone)]
pub struct NotificationPulse {
    window: Duration,
    raised_at: Option<Instant>,
}

impl NotificationPulse {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            raised_at: None,
        }
    }

    pub fn raise(&mut self) {
        self.raised_at = Some(Instant::now());
    }

    pub fn is_active(&self) -> bool {
        self.raised_at
            .is_some_and(|raised| raised.elapsed() < self.window)
    }

    /// When the current window closes, if it is still open
    pub fn expires_at(&self) -> Option<Instant> {
        self.raised_at
            .map(|raised| raised + self.window)
            .filter(|deadline| *deadline > Instant::now())
    }

    pub fn clear(&mut self) {
        self.raised_at = None;
    }
}
