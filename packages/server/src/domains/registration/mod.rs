//! Registration domain - the dialogue that turns a visitor into a draft

pub mod activities;
pub mod dialogue;
pub mod sessions;

pub use dialogue::{Dialogue, DialogueReply, DialogueStep, CONFIRM_NO, CONFIRM_YES};
pub use sessions::RegistrationSessions;
