use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_SORT_ORDER: &str = "name_alphabetical_ascending";
pub const DEFAULT_POLLING_FREQUENCY: f64 = 5.0;

/// Per-client display preferences. Persisted as one document and always
/// replaced wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub sort_order: String,
    pub hidden_devices: Vec<String>,
    pub visits: i64,
    pub show_visibility_controls: bool,
    /// Seconds between device refreshes. Values `<= 0` fall back to the default.
    pub polling_frequency: f64,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            sort_order: DEFAULT_SORT_ORDER.to_string(),
            hidden_devices: Vec::new(),
            visits: 0,
            show_visibility_controls: false,
            polling_frequency: DEFAULT_POLLING_FREQUENCY,
        }
    }
}

impl Preferences {
    /// Polling period for the event stream, in whole seconds (at least one).
    pub fn polling_interval(&self, default_seconds: f64) -> Duration {
        let seconds = if self.polling_frequency.is_finite() && self.polling_frequency > 0.0 {
            self.polling_frequency
        } else {
            default_seconds
        };
        whole_seconds(seconds)
    }
}

pub(crate) fn whole_seconds(seconds: f64) -> Duration {
    let truncated = if seconds.is_finite() { seconds.trunc() } else { 0.0 };
    Duration::from_secs((truncated as u64).max(1))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub preferences: Preferences,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(session_id: String, ttl: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            preferences: Preferences::default(),
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}
