//! Engine configuration.
//!
//! One [`EngineConfig`] is built at startup and handed to every service
//! constructor. Deployments that keep settings in a flat key-value table
//! load them with [`EngineConfig::from_entries`], using dotted keys such as
//! `file_deletion.max_attempts` or `transcription.webhook_secret`.

use crate::supervisor::domain::RetryPolicy;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Errors raised while building configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The key does not name a configuration field.
    #[error("unknown configuration key: {0}")]
    UnknownKey(String),

    /// A value does not fit its field.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Offending key.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// A secret string that never appears in debug output or logs.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wraps a secret value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the secret for use in cryptographic operations.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns whether no secret is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Queue settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Lease window granted on claim, in seconds.
    pub lease_duration_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            lease_duration_secs: 300,
        }
    }
}

/// Supervisor settings shared by every workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Invocations of one supervisor after which the tripwire fires.
    pub max_runs: u32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self { max_runs: 500 }
    }
}

/// Recording transcription settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Attempt budget for whole transcription kickoffs.
    pub policy: RetryPolicy,
    /// Fixed interval between checks while awaiting the webhook.
    pub poll_interval_secs: u64,
    /// Wait after which an attempt without a response fails.
    pub max_wait_secs: u64,
    /// Age after which a signature timestamp is rejected.
    pub signature_tolerance_secs: u64,
    /// Provider model requested for every transcription.
    pub model_id: String,
    /// Shared secret for webhook signatures.
    pub webhook_secret: Secret,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            policy: RetryPolicy::surfacing(2, 10),
            poll_interval_secs: 10,
            max_wait_secs: 900,
            signature_tolerance_secs: 1800,
            model_id: "scribe_v1".to_owned(),
            webhook_secret: Secret::default(),
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Queue settings.
    pub queue: QueueConfig,
    /// Supervisor settings.
    pub supervisor: SupervisorConfig,
    /// Per-file deletion policy.
    pub file_deletion: RetryPolicy,
    /// Account anonymization policy.
    pub account_anonymization: RetryPolicy,
    /// Root account deletion policy.
    pub account_deletion: RetryPolicy,
    /// Email delivery policy.
    pub email: RetryPolicy,
    /// Text message delivery policy.
    pub sms: RetryPolicy,
    /// Recording transcription settings.
    pub transcription: TranscriptionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            supervisor: SupervisorConfig::default(),
            file_deletion: RetryPolicy::surfacing(3, 5),
            account_anonymization: RetryPolicy::surfacing(3, 5),
            account_deletion: RetryPolicy::surfacing(1, 10),
            email: RetryPolicy::absorbing(5, 10),
            sms: RetryPolicy::absorbing(5, 10),
            transcription: TranscriptionConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Builds configuration from dotted key-value entries over the defaults.
    ///
    /// Values are read as JSON where they parse (`4`, `true`, `"absorb"`)
    /// and as plain strings otherwise. Fields that hold strings always take
    /// the raw text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownKey`] for keys that name no field and
    /// [`ConfigError::InvalidValue`] for values that do not fit or fail
    /// validation.
    pub fn from_entries<I, K, V>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut document = serde_json::to_value(Self::default()).map_err(|err| {
            ConfigError::InvalidValue {
                key: String::new(),
                reason: err.to_string(),
            }
        })?;
        for (key, raw) in entries {
            overlay(&mut document, key.as_ref(), raw.as_ref())?;
        }
        let config: Self =
            serde_json::from_value(document).map_err(|err| ConfigError::InvalidValue {
                key: "<entries>".to_owned(),
                reason: err.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let policies = [
            ("file_deletion", &self.file_deletion),
            ("account_anonymization", &self.account_anonymization),
            ("account_deletion", &self.account_deletion),
            ("email", &self.email),
            ("sms", &self.sms),
            ("transcription.policy", &self.transcription.policy),
        ];
        for (name, policy) in policies {
            if policy.max_attempts == 0 {
                return Err(invalid(
                    format!("{name}.max_attempts"),
                    "at least one attempt is required",
                ));
            }
        }
        if self.queue.lease_duration_secs == 0 {
            return Err(invalid("queue.lease_duration_secs", "must be positive"));
        }
        if self.supervisor.max_runs == 0 {
            return Err(invalid("supervisor.max_runs", "must be positive"));
        }
        if self.transcription.poll_interval_secs == 0 {
            return Err(invalid("transcription.poll_interval_secs", "must be positive"));
        }
        Ok(())
    }

    /// Returns the lease window as a duration.
    #[must_use]
    pub fn lease_duration(&self) -> Duration {
        crate::supervisor::domain::duration_from_secs(self.queue.lease_duration_secs)
    }
}

fn invalid(key: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.into(),
        reason: reason.into(),
    }
}

fn overlay(document: &mut Value, key: &str, raw: &str) -> Result<(), ConfigError> {
    let mut segments = key.split('.').peekable();
    let mut current = document;
    while let Some(segment) = segments.next() {
        let map: &mut Map<String, Value> = current
            .as_object_mut()
            .ok_or_else(|| ConfigError::UnknownKey(key.to_owned()))?;
        let slot = map
            .get_mut(segment)
            .ok_or_else(|| ConfigError::UnknownKey(key.to_owned()))?;
        if segments.peek().is_none() {
            if slot.is_object() {
                return Err(ConfigError::UnknownKey(key.to_owned()));
            }
            *slot = if slot.is_string() {
                Value::String(raw.to_owned())
            } else {
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
            };
            return Ok(());
        }
        current = slot;
    }
    Err(ConfigError::UnknownKey(key.to_owned()))
}
