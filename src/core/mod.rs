pub mod config;
pub mod error;
pub mod types;

pub use error::{IgniteError, Result};
pub use types::{Direction, Millis, ObjectId, Position};
