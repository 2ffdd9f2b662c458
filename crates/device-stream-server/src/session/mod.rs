//! Anonymous sessions: storage backends, cookie handling and the request gate.

pub mod cookie;
pub mod memory;
pub mod middleware;
pub mod models;
pub mod postgres;
pub mod store;

pub use memory::MemorySessionStore;
pub use middleware::{session_middleware, SessionContext};
pub use models::{Preferences, Session};
pub use postgres::PgSessionStore;
pub use store::{SessionError, SessionStore};
