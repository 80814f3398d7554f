//! Telegram update loop
//!
//! Long-polls the Bot API, turns each update into an `Inbound` event, routes it
//! to the domain activities and sends the resulting reply. Updates are handled
//! one at a time so a user's dialogue answers are applied in order.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use telegram::{ReplyMarkup, TelegramService, Update};
use tracing::{debug, error, info, warn};

use crate::common::{SubscriptionError, UserId};
use crate::domains::approval::activities::{describe_failure, handle_decision};
use crate::domains::approval::DecisionKind;
use crate::domains::registration::activities::{
    begin_registration, cancel_registration, handle_registration_input, CancelOutcome,
    EntryOutcome, InputOutcome,
};
use crate::domains::registration::dialogue::{opening_prompt, DialogueReply, CONFIRM_NO, CONFIRM_YES};
use crate::domains::subscription::activities::{request_renewal, submit_proof};
use crate::domains::subscription::messages;
use crate::kernel::ServerDeps;

const POLL_TIMEOUT_SECS: u64 = 30;
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `/start` or `/acesso`
    Start,
    /// `/renovar`
    Renew,
    /// `/cancelar`
    Cancel,
}

impl Command {
    fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        // "/start@SomeBot" in group-style mentions
        let name = word.strip_prefix('/')?.split('@').next()?;
        match name {
            "start" | "acesso" => Some(Self::Start),
            "renovar" => Some(Self::Renew),
            "cancelar" => Some(Self::Cancel),
            _ => None,
        }
    }
}

/// An update reduced to what the router acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Command {
        user_id: UserId,
        display_name: String,
        command: Command,
    },
    Text {
        user_id: UserId,
        text: String,
    },
    Photo {
        user_id: UserId,
        message_id: i64,
    },
    Decision {
        sender: UserId,
        callback_id: String,
        /// Admin chat message holding the buttons, when Telegram still has it
        source: Option<(i64, i64)>,
        payload: String,
    },
    Ignored,
}

/// Name stored on the record: the username, or `user_{id}` without one.
fn display_name(user: &telegram::User) -> String {
    user.username
        .clone()
        .unwrap_or_else(|| format!("user_{}", user.id))
}

pub fn classify(update: &Update) -> Inbound {
    if let Some(query) = &update.callback_query {
        return Inbound::Decision {
            sender: UserId::new(query.from.id),
            callback_id: query.id.clone(),
            source: query
                .message
                .as_ref()
                .map(|message| (message.chat.id, message.message_id)),
            payload: query.data.clone().unwrap_or_default(),
        };
    }

    // edited messages are never treated as new input
    let Some(message) = &update.message else {
        return Inbound::Ignored;
    };
    let Some(from) = &message.from else {
        return Inbound::Ignored;
    };
    if !message.chat.is_private() || from.is_bot {
        return Inbound::Ignored;
    }

    let user_id = UserId::new(from.id);

    if message.has_photo() {
        return Inbound::Photo {
            user_id,
            message_id: message.message_id,
        };
    }

    match message.text.as_deref() {
        Some(text) if text.starts_with('/') => match Command::parse(text) {
            Some(command) => Inbound::Command {
                user_id,
                display_name: display_name(from),
                command,
            },
            None => Inbound::Ignored,
        },
        Some(text) => Inbound::Text {
            user_id,
            text: text.to_string(),
        },
        None => Inbound::Ignored,
    }
}

/// What to send back for one inbound event.
#[derive(Debug, Clone)]
pub enum Response {
    Reply {
        chat_id: i64,
        text: String,
        markup: Option<ReplyMarkup>,
    },
    /// Replace the admin's decision buttons with the result
    EditDecision {
        chat_id: i64,
        message_id: i64,
        text: String,
    },
    Nothing,
}

impl Response {
    fn reply(user_id: UserId, text: String) -> Self {
        Self::Reply {
            chat_id: user_id.as_i64(),
            text,
            markup: None,
        }
    }

    fn reply_with(user_id: UserId, text: String, markup: ReplyMarkup) -> Self {
        Self::Reply {
            chat_id: user_id.as_i64(),
            text,
            markup: Some(markup),
        }
    }
}

/// User-facing text for an activity error.
fn failure_text(err: &SubscriptionError) -> String {
    match err {
        SubscriptionError::Validation(reason) => reason.clone(),
        SubscriptionError::PermissionDenied(_) => "Action not allowed.".to_string(),
        SubscriptionError::StateConflict { .. } => messages::action_unavailable(),
        SubscriptionError::Store(_) | SubscriptionError::Delivery(_) => messages::temporary_failure(),
    }
}

fn log_failure(user_id: UserId, action: &str, err: &SubscriptionError) {
    if err.is_state_conflict() {
        debug!(user_id = %user_id, action, error = %err, "Request not applicable");
    } else {
        error!(user_id = %user_id, action, error = %err, "Request failed");
    }
}

pub async fn route(inbound: Inbound, now: DateTime<Utc>, deps: &ServerDeps) -> Response {
    let config = &deps.config;

    match inbound {
        Inbound::Command {
            user_id,
            display_name,
            command: Command::Start,
        } => match begin_registration(user_id, &display_name, deps).await {
            Ok(outcome) => {
                let text = match outcome {
                    EntryOutcome::DialogueOpened => opening_prompt(),
                    EntryOutcome::AlreadyActive { expires_at } => messages::already_active(expires_at),
                    EntryOutcome::UnderReview => messages::under_review(),
                    EntryOutcome::AwaitingPayment => messages::awaiting_payment(&config.payment_info),
                    EntryOutcome::AwaitingRenewalPayment => {
                        messages::awaiting_renewal_payment(&config.renewal_payment_info)
                    }
                    EntryOutcome::MustRenew => messages::must_renew(),
                };
                Response::reply(user_id, text)
            }
            Err(e) => {
                log_failure(user_id, "start", &e);
                Response::reply(user_id, failure_text(&e))
            }
        },

        Inbound::Command {
            user_id,
            command: Command::Renew,
            ..
        } => match request_renewal(user_id, now, deps).await {
            Ok(_) => Response::reply(
                user_id,
                messages::renewal_instructions(&config.renewal_payment_info),
            ),
            Err(e) if e.is_state_conflict() => Response::reply(user_id, messages::renewal_not_allowed()),
            Err(e) => {
                log_failure(user_id, "renew", &e);
                Response::reply(user_id, failure_text(&e))
            }
        },

        Inbound::Command {
            user_id,
            command: Command::Cancel,
            ..
        } => match cancel_registration(user_id, now, deps).await {
            Ok(outcome) => {
                debug!(user_id = %user_id, ?outcome, "Cancel handled");
                if outcome == CancelOutcome::DraftRejected {
                    info!(user_id = %user_id, "Registration cancelled by user");
                }
                Response::reply_with(user_id, messages::registration_cancelled(), ReplyMarkup::remove())
            }
            Err(e) => {
                log_failure(user_id, "cancel", &e);
                Response::reply(user_id, failure_text(&e))
            }
        },

        Inbound::Text { user_id, text } => {
            match handle_registration_input(user_id, &text, now, deps).await {
                Ok(InputOutcome::NoDialogue) => Response::Nothing,
                Ok(InputOutcome::Reply(reply)) => {
                    let text = reply.text();
                    match reply {
                        DialogueReply::AskConfirmation { .. } => Response::reply_with(
                            user_id,
                            text,
                            ReplyMarkup::one_time_keyboard(vec![
                                vec![CONFIRM_YES.to_string()],
                                vec![CONFIRM_NO.to_string()],
                            ]),
                        ),
                        DialogueReply::Restarted => {
                            Response::reply_with(user_id, text, ReplyMarkup::remove())
                        }
                        _ => Response::reply(user_id, text),
                    }
                }
                Ok(InputOutcome::Committed(_)) => Response::reply_with(
                    user_id,
                    messages::draft_saved(&config.payment_info),
                    ReplyMarkup::remove(),
                ),
                Err(e) => {
                    log_failure(user_id, "registration", &e);
                    Response::reply_with(user_id, failure_text(&e), ReplyMarkup::remove())
                }
            }
        }

        Inbound::Photo {
            user_id,
            message_id,
        } => match submit_proof(user_id, message_id, now, deps).await {
            Ok(receipt) => {
                let text = match receipt.kind {
                    DecisionKind::New => messages::proof_received_new(),
                    DecisionKind::Renewal => messages::proof_received_renewal(),
                };
                Response::reply(user_id, text)
            }
            Err(e) if e.is_state_conflict() => Response::reply(user_id, messages::no_proof_expected()),
            Err(e) => {
                log_failure(user_id, "proof", &e);
                Response::reply(user_id, failure_text(&e))
            }
        },

        Inbound::Decision {
            sender,
            source,
            payload,
            ..
        } => {
            let text = match handle_decision(sender, &payload, now, deps).await {
                Ok(outcome) => outcome.summary(),
                Err(e) => {
                    warn!(sender = %sender, payload = %payload, error = %e, "Admin decision not applied");
                    describe_failure(&payload, &e)
                }
            };
            match source {
                Some((chat_id, message_id)) => Response::EditDecision {
                    chat_id,
                    message_id,
                    text,
                },
                None => Response::reply(sender, text),
            }
        }

        Inbound::Ignored => Response::Nothing,
    }
}

async fn deliver(response: Response, telegram: &TelegramService) {
    let result = match &response {
        Response::Reply {
            chat_id,
            text,
            markup,
        } => telegram
            .send_message(*chat_id, text, markup.as_ref())
            .await
            .map(|_| ()),
        Response::EditDecision {
            chat_id,
            message_id,
            text,
        } => telegram
            .edit_message_text(*chat_id, *message_id, text)
            .await
            .map(|_| ()),
        Response::Nothing => Ok(()),
    };

    if let Err(e) = result {
        error!(error = %e, "Failed to deliver reply");
    }
}

async fn handle_update(update: Update, telegram: &TelegramService, deps: &ServerDeps) {
    let inbound = classify(&update);

    if let Inbound::Decision { callback_id, .. } = &inbound {
        if let Err(e) = telegram.answer_callback_query(callback_id).await {
            warn!(error = %e, "Failed to answer callback query");
        }
    }

    let response = route(inbound, Utc::now(), deps).await;
    deliver(response, telegram).await;
}

/// Poll for updates until the process exits.
pub async fn run_bot(telegram: Arc<TelegramService>, deps: ServerDeps) -> Result<()> {
    info!("Telegram update loop started");
    let mut offset: Option<i64> = None;

    loop {
        match telegram.get_updates(offset, POLL_TIMEOUT_SECS).await {
            Ok(updates) => {
                for update in updates {
                    offset = Some(update.update_id + 1);
                    handle_update(update, &telegram, &deps).await;
                }
            }
            Err(e) => {
                warn!(error = %e, "Polling for updates failed, retrying");
                tokio::time::sleep(POLL_RETRY_DELAY).await;
            }
        }
    }
}
