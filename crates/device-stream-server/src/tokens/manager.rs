use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::utils::{generate_opaque_id, PeriodicTask};

/// Short-lived capability to open one event stream as `session_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub session_id: String,
    pub expires_at: Instant,
}

impl Token {
    pub fn is_valid_at(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-memory registry of capability tokens.
///
/// One lock guards the whole map: lookups share it, issuance and the sweep
/// take it exclusively. Expired entries are invisible to lookups whether or
/// not the sweep has removed them yet.
#[derive(Clone, Default)]
pub struct TokenManager {
    tokens: Arc<RwLock<HashMap<String, Token>>>,
}

impl TokenManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new token for `session_id` that expires after `duration`.
    pub fn create(&self, session_id: &str, duration: Duration) -> String {
        let token = Token {
            session_id: session_id.to_string(),
            expires_at: Instant::now() + duration,
        };

        let mut tokens = self.tokens.write();
        let mut key = generate_opaque_id();
        while tokens.contains_key(&key) {
            key = generate_opaque_id();
        }
        tokens.insert(key.clone(), token);

        debug!("Issued token (ttl {:?}, {} live entries)", duration, tokens.len());
        key
    }

    /// The token behind `key`, or `None` if it is unknown or expired.
    /// Lookups do not consume the token; it stays usable until it expires.
    pub fn get(&self, key: &str) -> Option<Token> {
        let now = Instant::now();
        self.tokens
            .read()
            .get(key)
            .filter(|token| token.is_valid_at(now))
            .cloned()
    }

    pub fn validate(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Remove every expired entry. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut tokens = self.tokens.write();
        let before = tokens.len();
        tokens.retain(|_, token| token.is_valid_at(now));
        before - tokens.len()
    }

    /// Entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.tokens.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.read().is_empty()
    }

    /// Start the recurring sweep. Stop it with [`PeriodicTask::shutdown`].
    pub fn spawn_sweeper(&self, interval: Duration) -> PeriodicTask {
        let manager = self.clone();
        info!("Token sweep every {:?}", interval);

        PeriodicTask::spawn("token-sweep", interval, move || {
            let manager = manager.clone();
            async move {
                let removed = manager.sweep();
                if removed > 0 {
                    debug!("Token sweep removed {} expired entries", removed);
                }
            }
        })
    }
}
