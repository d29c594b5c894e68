//! Outbound email and text messages.

use super::MessageId;
use crate::supervisor::services::ValidationFailure;
use minijinja::Environment;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Email through the mail provider.
    Email,
    /// Text message through the SMS provider.
    Sms,
}

impl Channel {
    /// Returns the channel name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "sms",
        }
    }
}

/// A message to deliver, with templates rendered at send time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    /// Caller-chosen message identifier; one delivery runs per identifier.
    pub message_id: MessageId,
    /// Email address or E.164 phone number.
    pub recipient: String,
    /// Subject template, required for email.
    #[serde(default)]
    pub subject_template: Option<String>,
    /// Body template.
    pub body_template: String,
    /// Values available to the templates.
    #[serde(default)]
    pub context: Value,
}

impl NotificationRequest {
    /// Creates an email request.
    #[must_use]
    pub fn email(
        message_id: MessageId,
        recipient: impl Into<String>,
        subject_template: impl Into<String>,
        body_template: impl Into<String>,
        context: Value,
    ) -> Self {
        Self {
            message_id,
            recipient: recipient.into(),
            subject_template: Some(subject_template.into()),
            body_template: body_template.into(),
            context,
        }
    }

    /// Creates a text message request.
    #[must_use]
    pub fn sms(
        message_id: MessageId,
        recipient: impl Into<String>,
        body_template: impl Into<String>,
        context: Value,
    ) -> Self {
        Self {
            message_id,
            recipient: recipient.into(),
            subject_template: None,
            body_template: body_template.into(),
            context,
        }
    }

    /// Checks the recipient and templates for `channel`.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationFailure`] describing the first problem found.
    pub fn validate(&self, channel: Channel) -> Result<(), ValidationFailure> {
        let recipient = self.recipient.trim();
        match channel {
            Channel::Email => {
                if !is_plausible_email(recipient) {
                    return Err(ValidationFailure::new(
                        "invalid_recipient",
                        "recipient must be an email address",
                    ));
                }
                if self.subject_template.as_deref().is_none_or(|s| s.trim().is_empty()) {
                    return Err(ValidationFailure::new(
                        "missing_subject",
                        "email requires a subject template",
                    ));
                }
            }
            Channel::Sms => {
                if !is_plausible_phone(recipient) {
                    return Err(ValidationFailure::new(
                        "invalid_recipient",
                        "recipient must be an E.164 phone number",
                    ));
                }
            }
        }
        if self.body_template.trim().is_empty() {
            return Err(ValidationFailure::new("empty_body", "body template is empty"));
        }
        self.render(channel)
            .map(|_| ())
            .map_err(|err| ValidationFailure::new("invalid_template", err.to_string()))
    }

    /// Renders the provider payload for `channel`.
    ///
    /// # Errors
    ///
    /// Returns the template engine error when a template fails to render.
    pub fn render(&self, channel: Channel) -> Result<Value, minijinja::Error> {
        let environment = Environment::new();
        let body = environment.render_str(&self.body_template, &self.context)?;
        let recipient = self.recipient.trim();
        match channel {
            Channel::Email => {
                let subject_template = self.subject_template.as_deref().unwrap_or_default();
                let subject = environment.render_str(subject_template, &self.context)?;
                Ok(json!({ "to": recipient, "subject": subject, "body": body }))
            }
            Channel::Sms => Ok(json!({ "to": recipient, "body": body })),
        }
    }
}

fn is_plausible_email(value: &str) -> bool {
    value
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'))
        && !value.contains(char::is_whitespace)
}

fn is_plausible_phone(value: &str) -> bool {
    value.strip_prefix('+').is_some_and(|digits| {
        (8..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
    })
}
