//! Structured logging integration for events
//!
//! Events are drained from the channel after each command and turned into
//! tracing records with structured fields. The record level is the one the
//! event metadata carries.

use ota_events::{AppEvent, EventMessage, EventReceiver, GeneralEvent, LifecycleEvent};

const LIFECYCLE_TARGET: &str = "ota::events::lifecycle";
const GENERAL_TARGET: &str = "ota::events::general";

/// Emit a tracing record at a level only known at runtime
macro_rules! log_at {
    ($level:expr, $target:expr, $($arg:tt)+) => {
        match $level {
            tracing::Level::ERROR => tracing::error!(target: $target, $($arg)+),
            tracing::Level::WARN => tracing::warn!(target: $target, $($arg)+),
            tracing::Level::INFO => tracing::info!(target: $target, $($arg)+),
            tracing::Level::DEBUG => tracing::debug!(target: $target, $($arg)+),
            tracing::Level::TRACE => tracing::trace!(target: $target, $($arg)+),
        }
    };
}

/// Log every event still queued on the receiver
pub fn drain_events(receiver: &mut EventReceiver) -> usize {
    let mut drained = 0;
    while let Ok(message) = receiver.try_recv() {
        log_event_with_tracing(&message);
        drained += 1;
    }
    drained
}

/// Log an `AppEvent` using the tracing infrastructure with structured fields
pub fn log_event_with_tracing(message: &EventMessage) {
    let meta = &message.meta;
    let level = meta.tracing_level();
    let source = meta.source.as_str();
    let correlation = meta.correlation_id.as_deref();

    match &message.event {
        AppEvent::Lifecycle(event) => match event {
            LifecycleEvent::BootTargetResolved {
                path,
                running_binary,
                ..
            } => {
                log_at!(
                    level,
                    LIFECYCLE_TARGET,
                    source,
                    event_id = %meta.event_id,
                    correlation,
                    path = %path.display(),
                    running_binary,
                    "Boot target resolved"
                );
            }
            LifecycleEvent::UpdateArmed { .. } => {
                log_at!(
                    level,
                    LIFECYCLE_TARGET,
                    source,
                    event_id = %meta.event_id,
                    correlation,
                    "Update armed for first run"
                );
            }
            LifecycleEvent::RollbackPerformed { restored_hash, .. } => {
                log_at!(
                    level,
                    LIFECYCLE_TARGET,
                    source,
                    event_id = %meta.event_id,
                    correlation,
                    restored_hash = ?restored_hash,
                    "Unconfirmed update rolled back"
                );
            }
            LifecycleEvent::StalePackageIgnored {
                recorded_version,
                binary_version,
                ..
            } => {
                log_at!(
                    level,
                    LIFECYCLE_TARGET,
                    source,
                    event_id = %meta.event_id,
                    correlation,
                    recorded_version = ?recorded_version,
                    binary_version = %binary_version,
                    "Package built for another binary ignored"
                );
            }
            LifecycleEvent::UpdatesDiscarded { reason } => {
                log_at!(
                    level,
                    LIFECYCLE_TARGET,
                    source,
                    event_id = %meta.event_id,
                    reason = %reason,
                    "Updates discarded"
                );
            }
            LifecycleEvent::UpdateConfirmed { .. } => {
                log_at!(
                    level,
                    LIFECYCLE_TARGET,
                    source,
                    event_id = %meta.event_id,
                    correlation,
                    "Update confirmed"
                );
            }
            LifecycleEvent::PackageInstalled {
                label,
                previous_hash,
                ..
            } => {
                log_at!(
                    level,
                    LIFECYCLE_TARGET,
                    source,
                    event_id = %meta.event_id,
                    correlation,
                    label = ?label,
                    previous_hash = ?previous_hash,
                    "Package installed"
                );
            }
            LifecycleEvent::StorageFallback { operation, failure } => {
                log_at!(
                    level,
                    LIFECYCLE_TARGET,
                    source,
                    event_id = %meta.event_id,
                    operation = %operation,
                    retryable = failure.retryable,
                    code = ?failure.code,
                    message = %failure.message,
                    hint = ?failure.hint,
                    "Storage failed, launching embedded bundle"
                );
            }
            LifecycleEvent::MalformedRecord { key, message } => {
                log_at!(
                    level,
                    LIFECYCLE_TARGET,
                    source,
                    event_id = %meta.event_id,
                    key = %key,
                    message = %message,
                    "Malformed record ignored"
                );
            }
            LifecycleEvent::DebugCacheCleared { path } => {
                log_at!(
                    level,
                    LIFECYCLE_TARGET,
                    source,
                    event_id = %meta.event_id,
                    path = %path.display(),
                    "Development bundle cache cleared"
                );
            }
        },

        AppEvent::General(GeneralEvent::Warning { message, context }) => {
            log_at!(
                level,
                GENERAL_TARGET,
                source,
                event_id = %meta.event_id,
                context = %context,
                "{message}"
            );
        }
    }
}
