//! Texts sent to subscribers.

use chrono::{DateTime, Utc};

pub fn format_date(at: DateTime<Utc>) -> String {
    at.format("%d/%m/%Y").to_string()
}

pub fn draft_saved(payment_info: &str) -> String {
    format!(
        "Registration saved! Your status is now: PENDING PAYMENT.\n\n\
         To finish, make your payment:\n----------------------\n{}\n----------------------\n\n\
         After paying, send the PROOF (photo/screenshot) here in this chat.",
        payment_info
    )
}

pub fn abandonment_reminder(payment_info: &str) -> String {
    format!(
        "You requested access 24 hours ago but have not sent your payment proof yet.\n\n\
         If you still want to join, send the proof here.\n\nReminder:\n{}",
        payment_info
    )
}

pub fn birthday_greeting(display_name: &str) -> String {
    format!(
        "Hello, {}.\n\nToday is your special day. Use the coupon NIVER10 for 10% off \
         any individual content today.\n\nHappy birthday.",
        display_name
    )
}

pub fn renewal_warning(remaining_days: i64) -> String {
    format!(
        "ATTENTION: your subscription expires in {} days.\n\n\
         To keep your access, renew before then.\n\nUse /renovar to start the renewal.",
        remaining_days
    )
}

pub fn subscription_expired() -> String {
    "Your subscription has expired.\n\n\
     You were removed from the group automatically. Use /renovar to pay the renewal \
     and request access again."
        .to_string()
}

pub fn welcome(subscription_days: i64, invite_link: &str) -> String {
    format!(
        "Your payment was approved.\n\n\
         Your subscription is valid for {} days.\n\n\
         Your access link is personal, single-use and expires in 24 hours.\n\n{}\n\n\
         Read the pinned rules when you join.",
        subscription_days, invite_link
    )
}

pub fn renewal_confirmed(expires_at: Option<DateTime<Utc>>) -> String {
    let until = expires_at.map(format_date).unwrap_or_else(|| "-".to_string());
    format!(
        "Your renewal was confirmed.\n\nYour subscription is now valid until {}.",
        until
    )
}

pub fn new_member_rejected() -> String {
    "Your access request was reviewed and REJECTED.\n\n\
     Your proof was not accepted. If you think this is a mistake, start again with /acesso."
        .to_string()
}

pub fn renewal_rejected() -> String {
    "Your RENEWAL request was REJECTED.\n\n\
     Your proof was not accepted and your previous status was kept. If your subscription \
     is still active you stay in the group until its expiry date."
        .to_string()
}

pub fn proof_received_new() -> String {
    "NEW MEMBER proof received.\n\nYour request was sent for manual review. Please wait.".to_string()
}

pub fn proof_received_renewal() -> String {
    "RENEWAL proof received.\n\nYour request was sent for manual review. Please wait.".to_string()
}

pub fn renewal_instructions(renewal_payment_info: &str) -> String {
    format!(
        "You requested a renewal of your subscription.\n\n\
         Send your renewal payment:\n----------------------\n{}\n----------------------\n\n\
         After paying, send the PROOF (photo/screenshot) here in this chat.",
        renewal_payment_info
    )
}

pub fn renewal_not_allowed() -> String {
    "You need to be a member (active or expired) to renew. Use /acesso to register.".to_string()
}

pub fn already_active(expires_at: Option<DateTime<Utc>>) -> String {
    let until = expires_at.map(format_date).unwrap_or_else(|| "-".to_string());
    format!(
        "Your subscription is already active and valid until {}.\nUse /renovar if you want \
         to extend your access.",
        until
    )
}

pub fn under_review() -> String {
    "Your proof was already sent and is under review. Please wait.".to_string()
}

pub fn awaiting_payment(payment_info: &str) -> String {
    format!(
        "You already started your registration. Only the payment is missing.\n\n{}\n\n\
         Send the PROOF (photo) here in this chat.\n\nTo start over, send /cancelar.",
        payment_info
    )
}

pub fn awaiting_renewal_payment(renewal_payment_info: &str) -> String {
    format!(
        "You requested a renewal. Only the payment is missing.\n\n{}\n\n\
         Send the PROOF (photo) here in this chat.\n\nTo cancel, send /cancelar.",
        renewal_payment_info
    )
}

pub fn must_renew() -> String {
    "Your subscription has expired. To come back, renew it.\n\nUse /renovar to start.".to_string()
}

pub fn registration_cancelled() -> String {
    "Process cancelled. You can start again at any time with /acesso.".to_string()
}

pub fn action_unavailable() -> String {
    "That is not available right now. Send /start to see where your subscription stands."
        .to_string()
}

pub fn temporary_failure() -> String {
    "Something went wrong on our side. Please try again in a few minutes.".to_string()
}

pub fn no_proof_expected() -> String {
    "No payment is pending for you. Use /acesso to register or /renovar to renew.".to_string()
}
