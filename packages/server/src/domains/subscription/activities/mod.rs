//! Subscription activities - business logic over the record store and notifier
//!
//! Every status change goes through `transition` (or `start_draft` for new
//! drafts); nothing else writes the status column.

mod abandonment;
mod requests;
mod sweeps;
mod transition;

pub use abandonment::{
    arm_abandonment_timer, cancel_abandonment_timer, send_abandonment_reminder, ABANDONMENT_DELAY,
};
pub use requests::{request_renewal, submit_proof, ProofReceipt};
pub(crate) use sweeps::remove_from_group;
pub use sweeps::{
    expire_lapsed_subscriptions, greet_birthdays, remaining_whole_days, send_renewal_warnings,
    SweepReport,
};
pub use transition::{commit, start_draft, transition};
