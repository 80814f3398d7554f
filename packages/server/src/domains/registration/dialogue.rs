//! Registration dialogue - pure step logic, no I/O
//!
//! email → birthday → confirmation. Confirming yields a draft; declining
//! starts over from the email step.

use chrono::NaiveDate;

use crate::common::UserId;
use crate::domains::subscription::models::DraftRecord;

pub const CONFIRM_YES: &str = "Yes, my data is correct";
pub const CONFIRM_NO: &str = "No, start over";

const BIRTHDAY_FORMAT: &str = "%d/%m/%Y";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogueStep {
    AwaitingEmail,
    AwaitingBirthday { email: String },
    AwaitingConfirmation { email: String, birthday: NaiveDate },
}

/// What the dialogue wants said back after an input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogueReply {
    AskBirthday,
    InvalidEmail,
    InvalidBirthday,
    AskConfirmation {
        display_name: String,
        email: String,
        birthday: NaiveDate,
    },
    InvalidChoice,
    Restarted,
    Confirmed(DraftRecord),
}

impl DialogueReply {
    pub fn text(&self) -> String {
        match self {
            Self::AskBirthday => "Email saved.\n\nNow send your BIRTHDAY (for future promotions).\n\n\
                                  Use the format DD/MM/YYYY."
                .to_string(),
            Self::InvalidEmail => "That does not look like a valid email. Try again.".to_string(),
            Self::InvalidBirthday => "Invalid date. Please use exactly DD/MM/YYYY.\nExample: 25/12/1990"
                .to_string(),
            Self::AskConfirmation {
                display_name,
                email,
                birthday,
            } => format!(
                "Please confirm your details:\n\nUser: @{}\nEmail: {}\nBirthday: {}\n\nIs this correct?",
                display_name,
                email,
                birthday.format(BIRTHDAY_FORMAT)
            ),
            Self::InvalidChoice => format!("Please answer \"{}\" or \"{}\".", CONFIRM_YES, CONFIRM_NO),
            Self::Restarted => format!("OK, starting over.\n\n{}", opening_prompt()),
            // the caller replies with the payment instructions once the draft is stored
            Self::Confirmed(_) => String::new(),
        }
    }
}

pub fn opening_prompt() -> String {
    "Welcome.\n\nTo process your access I need a few details.\n\nFirst, what is your EMAIL?".to_string()
}

pub fn is_valid_email(email: &str) -> bool {
    email.contains('@') && email.contains('.')
}

/// `DD/MM/YYYY` with a four-digit year; chrono alone would read `90` as year 90.
pub fn parse_birthday(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    let year = input.rsplit('/').next()?;
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(input, BIRTHDAY_FORMAT).ok()
}

/// One user's in-progress registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialogue {
    pub user_id: UserId,
    pub display_name: String,
    pub step: DialogueStep,
}

impl Dialogue {
    pub fn new(user_id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            step: DialogueStep::AwaitingEmail,
        }
    }

    /// Feed one text message into the dialogue.
    pub fn advance(&mut self, input: &str) -> DialogueReply {
        let input = input.trim();
        let step = std::mem::replace(&mut self.step, DialogueStep::AwaitingEmail);

        let (next, reply) = match step {
            DialogueStep::AwaitingEmail => {
                if is_valid_email(input) {
                    (
                        DialogueStep::AwaitingBirthday {
                            email: input.to_string(),
                        },
                        DialogueReply::AskBirthday,
                    )
                } else {
                    (DialogueStep::AwaitingEmail, DialogueReply::InvalidEmail)
                }
            }
            DialogueStep::AwaitingBirthday { email } => match parse_birthday(input) {
                Some(birthday) => (
                    DialogueStep::AwaitingConfirmation {
                        email: email.clone(),
                        birthday,
                    },
                    DialogueReply::AskConfirmation {
                        display_name: self.display_name.clone(),
                        email,
                        birthday,
                    },
                ),
                None => (
                    DialogueStep::AwaitingBirthday { email },
                    DialogueReply::InvalidBirthday,
                ),
            },
            DialogueStep::AwaitingConfirmation { email, birthday } => {
                if input == CONFIRM_YES {
                    let draft = DraftRecord {
                        user_id: self.user_id,
                        display_name: self.display_name.clone(),
                        email: email.clone(),
                        birthday,
                    };
                    (
                        DialogueStep::AwaitingConfirmation { email, birthday },
                        DialogueReply::Confirmed(draft),
                    )
                } else if input == CONFIRM_NO {
                    (DialogueStep::AwaitingEmail, DialogueReply::Restarted)
                } else {
                    (
                        DialogueStep::AwaitingConfirmation { email, birthday },
                        DialogueReply::InvalidChoice,
                    )
                }
            }
        };

        self.step = next;
        reply
    }
}
