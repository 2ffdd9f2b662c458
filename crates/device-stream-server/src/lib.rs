pub mod config;
pub mod handlers;
pub mod logging;
pub mod models;
pub mod router;
pub mod services;
pub mod session;
pub mod state;
pub mod tokens;
pub mod utils;

pub use router::build_router;
pub use state::AppState;

#[cfg(test)]
mod test;
