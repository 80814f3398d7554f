// Common types and utilities shared across the application

pub mod auth;
pub mod errors;
pub mod types;

pub use auth::{Actor, HasAuthContext};
pub use errors::SubscriptionError;
pub use types::*;
