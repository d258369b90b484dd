use serde::{Deserialize, Serialize};

use crate::{EventLevel, EventSource};
use ota_errors::UserFacingError;

/// Structured failure information shared across domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short user-facing message.
    pub message: String,
    /// Optional remediation hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether retrying the operation might succeed.
    pub retryable: bool,
}

impl FailureContext {
    /// Construct a new failure context.
    #[must_use]
    pub fn new(
        code: Option<impl Into<String>>,
        message: impl Into<String>,
        hint: Option<impl Into<String>>,
        retryable: bool,
    ) -> Self {
        Self {
            code: code.map(Into::into),
            message: message.into(),
            hint: hint.map(Into::into),
            retryable,
        }
    }

    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self::new(
            error.user_code(),
            error.user_message().into_owned(),
            error.user_hint(),
            error.is_retryable(),
        )
    }
}

pub mod general;
pub mod lifecycle;

pub use general::*;
pub use lifecycle::*;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// Events outside any particular domain
    General(GeneralEvent),

    /// Update lifecycle events (boot selection, rollback, confirmation)
    Lifecycle(LifecycleEvent),
}

impl AppEvent {
    /// Identify the source domain for this event
    #[must_use]
    pub fn source(&self) -> EventSource {
        match self {
            Self::General(_) => EventSource::General,
            Self::Lifecycle(_) => EventSource::Lifecycle,
        }
    }

    /// Severity the host should log this event at
    #[must_use]
    pub fn level(&self) -> EventLevel {
        match self {
            Self::Lifecycle(
                LifecycleEvent::StorageFallback { .. } | LifecycleEvent::MalformedRecord { .. },
            ) => EventLevel::Error,

            Self::General(GeneralEvent::Warning { .. })
            | Self::Lifecycle(
                LifecycleEvent::RollbackPerformed { .. }
                | LifecycleEvent::StalePackageIgnored { .. }
                | LifecycleEvent::UpdatesDiscarded { .. },
            ) => EventLevel::Warn,

            Self::Lifecycle(LifecycleEvent::DebugCacheCleared { .. }) => EventLevel::Debug,

            Self::Lifecycle(_) => EventLevel::Info,
        }
    }

    /// Hash of the package this event is about
    #[must_use]
    pub fn package_hash(&self) -> Option<&str> {
        match self {
            Self::Lifecycle(event) => event.package_hash(),
            Self::General(_) => None,
        }
    }
}
