use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::Settings;
use crate::services::DeviceFeed;
use crate::session::SessionStore;
use crate::tokens::TokenManager;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub sessions: Arc<dyn SessionStore>,
    pub tokens: TokenManager,
    pub feed: Arc<dyn DeviceFeed>,
    pub streams: StreamTracker,
}

impl AppState {
    pub fn new(
        settings: Settings,
        sessions: Arc<dyn SessionStore>,
        tokens: TokenManager,
        feed: Arc<dyn DeviceFeed>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            sessions,
            tokens,
            feed,
            streams: StreamTracker::default(),
        }
    }
}

/// Count of event streams currently open.
#[derive(Clone, Default)]
pub struct StreamTracker {
    active: Arc<AtomicUsize>,
}

impl StreamTracker {
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Mark one stream as open until the returned guard drops.
    pub fn open(&self) -> StreamGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        StreamGuard {
            active: self.active.clone(),
        }
    }
}

pub struct StreamGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}
