pub mod error;
pub mod ids;
pub mod periodic;

pub use error::ApiError;
pub use ids::generate_opaque_id;
pub use periodic::PeriodicTask;
