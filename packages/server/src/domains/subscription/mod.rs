//! Subscription domain - membership statuses, transitions and daily sweeps

pub mod activities;
pub mod machines;
pub mod messages;
pub mod models;

pub use machines::{SubscriptionMachine, Transition, Trigger};
pub use models::{DraftRecord, SubscriptionStatus, UserRecord};
