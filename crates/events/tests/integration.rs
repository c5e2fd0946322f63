//! Integration tests for events

#[cfg(test)]
mod tests {
    use kiln_errors::{Error, PatchError};
    use kiln_events::*;
    use kiln_types::Stage;

    #[tokio::test]
    async fn test_event_sender_emits_in_order() {
        let (tx, mut rx) = channel();

        tx.emit_stage_started("pcl", Stage::PatchesApplied);
        tx.emit_warning_with_context("tests failed", "make test");
        tx.emit_stage_completed("pcl", Stage::PatchesApplied, 12);

        let first = rx.recv().await.unwrap();
        assert!(matches!(
            first,
            AppEvent::Build(BuildEvent::StageStarted {
                stage: Stage::PatchesApplied,
                ..
            })
        ));
        let second = rx.recv().await.unwrap();
        assert_eq!(second.log_level(), tracing::Level::WARN);
        let third = rx.recv().await.unwrap();
        assert_eq!(third.log_level(), tracing::Level::DEBUG);
    }

    #[tokio::test]
    async fn test_stage_failure_carries_user_facing_fields() {
        let (tx, mut rx) = channel();
        let error: Error = PatchError::NoMatch {
            file: "apps/src/viewer.cpp".to_string(),
            search: "<GL/glu.h>".to_string(),
        }
        .into();
        tx.emit_stage_failed("pcl", Stage::PatchesApplied, &error);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.log_level(), tracing::Level::ERROR);
        assert_eq!(event.event_source(), EventSource::BUILD);
        let AppEvent::Build(BuildEvent::StageFailed { failure, .. }) = event else {
            panic!("expected a stage failure");
        };
        assert!(failure.message.contains("<GL/glu.h>"));
        assert!(!failure.retryable);
    }

    #[test]
    fn test_emit_without_receiver_is_ignored() {
        let (tx, rx) = channel();
        drop(rx);
        tx.emit_error("nobody listening");
    }

    #[test]
    fn test_log_fields_are_json() {
        let event = AppEvent::Build(BuildEvent::PatchApplied {
            formula: "pcl".to_string(),
            patch: "glew-qhull".to_string(),
        });
        let fields: serde_json::Value = serde_json::from_str(&event.log_fields()).unwrap();
        assert_eq!(fields["domain"], "build");
        assert_eq!(fields["event"]["patch"], "glew-qhull");
    }
}
