//! Approval domain - the administrator's accept/reject decisions on payment proofs

pub mod activities;
pub mod decision;

pub use decision::{AdminDecision, DecisionAction, DecisionKind};
