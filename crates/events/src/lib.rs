#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Event system for async communication in kiln
//!
//! Library crates never print. Everything a user might want to see goes
//! through an [`AppEvent`] on an unbounded channel, and the CLI decides how
//! to render it and at which tracing level to log it.

pub mod meta;
pub use meta::EventSource;

pub mod events;
pub use events::{AppEvent, BuildEvent, FailureContext, GeneralEvent, PlatformEvent};

use kiln_errors::UserFacingError;
use kiln_types::Stage;
use tokio::sync::mpsc::UnboundedSender;

/// Type alias for event sender
pub type EventSender = UnboundedSender<AppEvent>;

/// Type alias for event receiver
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<AppEvent>;

/// Create a new event channel
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// The unified trait for emitting events throughout kiln
///
/// Implemented for a raw [`EventSender`] and for any context struct that
/// carries one.
pub trait EventEmitter {
    /// Get the event sender for this emitter
    fn event_sender(&self) -> Option<&EventSender>;

    /// Emit an event through this emitter
    fn emit(&self, event: AppEvent) {
        if let Some(sender) = self.event_sender() {
            // Ignore send errors - if receiver is dropped, we just continue
            let _ = sender.send(event);
        }
    }

    /// Emit a debug log event
    fn emit_debug(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::debug(message)));
    }

    /// Emit a debug log event with context
    fn emit_debug_with_context(
        &self,
        message: impl Into<String>,
        context: std::collections::HashMap<String, String>,
    ) {
        self.emit(AppEvent::General(GeneralEvent::debug_with_context(
            message, context,
        )));
    }

    /// Emit a warning event
    fn emit_warning(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning(message)));
    }

    /// Emit a warning event with context
    fn emit_warning_with_context(&self, message: impl Into<String>, context: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning_with_context(
            message, context,
        )));
    }

    /// Emit an error event
    fn emit_error(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::error(message)));
    }

    /// Emit an error event with details
    fn emit_error_with_details(&self, message: impl Into<String>, details: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::error_with_details(
            message, details,
        )));
    }

    /// Emit an operation started event
    fn emit_operation_started(&self, operation: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::OperationStarted {
            operation: operation.into(),
        }));
    }

    /// Emit an operation completed event
    fn emit_operation_completed(&self, operation: impl Into<String>, success: bool) {
        self.emit(AppEvent::General(GeneralEvent::OperationCompleted {
            operation: operation.into(),
            success,
        }));
    }

    /// Emit a stage started event
    fn emit_stage_started(&self, formula: impl Into<String>, stage: Stage) {
        self.emit(AppEvent::Build(BuildEvent::StageStarted {
            formula: formula.into(),
            stage,
        }));
    }

    /// Emit a stage completed event
    fn emit_stage_completed(&self, formula: impl Into<String>, stage: Stage, duration_ms: u64) {
        self.emit(AppEvent::Build(BuildEvent::StageCompleted {
            formula: formula.into(),
            stage,
            duration_ms,
        }));
    }

    /// Emit a stage failed event built from the error's user-facing form
    fn emit_stage_failed<E: UserFacingError + ?Sized>(
        &self,
        formula: impl Into<String>,
        stage: Stage,
        error: &E,
    ) {
        self.emit(AppEvent::Build(BuildEvent::StageFailed {
            formula: formula.into(),
            stage,
            failure: FailureContext::from_error(error),
        }));
    }
}

/// Implementation of `EventEmitter` for the raw `EventSender`
impl EventEmitter for EventSender {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_errors::PatchError;

    #[tokio::test]
    async fn test_sender_emits_in_order() {
        let (tx, mut rx) = channel();
        tx.emit_stage_started("pcl", Stage::PatchesApplied);
        tx.emit_stage_failed(
            "pcl",
            Stage::PatchesApplied,
            &PatchError::NoMatch {
                file: "CMakeLists.txt".to_string(),
                search: "foo".to_string(),
            },
        );
        drop(tx);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.log_level(), tracing::Level::INFO);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.log_level(), tracing::Level::ERROR);
        match second {
            AppEvent::Build(BuildEvent::StageFailed { failure, stage, .. }) => {
                assert_eq!(stage, Stage::PatchesApplied);
                assert_eq!(failure.code.as_deref(), Some("patch.no_match"));
                assert!(!failure.retryable);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let (tx, rx) = channel();
        drop(rx);
        tx.emit_warning("nobody is listening");
    }

    #[test]
    fn test_log_target_and_fields() {
        let event = AppEvent::General(GeneralEvent::warning("careful"));
        assert_eq!(event.log_target(), "kiln::events::general");
        assert_eq!(event.event_source(), EventSource::GENERAL);
        assert!(event.log_fields().contains("careful"));
    }
}
