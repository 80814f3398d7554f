// Membership bot - core library
//
// Paid-membership lifecycle for a private Telegram group: registration dialogue,
// payment proof review, renewals and the daily sweeps that expire lapsed members.
//
// Business rules live per-domain in domains/*; infrastructure in kernel/.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
