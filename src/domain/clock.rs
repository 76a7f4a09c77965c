//! Clock collaborator
//!
//! Services read the current time through a `Clock` value instead of
//! calling `Utc::now()` directly, so tests can pin timestamps.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct Clock {
    fixed: Option<DateTime<Utc>>,
}

impl Clock {
    /// Wall-clock time.
    pub fn system() -> Self {
        Self { fixed: None }
    }

    /// A clock frozen at `instant`, for tests.
    pub fn fixed(instant: DateTime<Utc>) -> Self {
        Self {
            fixed: Some(instant),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.fixed.unwrap_or_else(Utc::now)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}
