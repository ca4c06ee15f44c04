#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::sync::Mutex;
    use std::time::Duration;

    use httpmock::prelude::*;
    use serde_json::json;

    use crate::error::NotifyError;
    use crate::notifier::{dispatch, EvictionNotice, HttpNotifier, Notifier};
    use crate::types::{EvictedLease, EvictionReason};

    fn notice(callback: Option<String>) -> EvictionNotice {
        EvictionNotice {
            collaborator: "image-gen".to_string(),
            callback,
            reason: EvictionReason::Pressure,
            leases: vec![EvictedLease {
                collaborator: "image-gen".to_string(),
                resource: "sdxl".to_string(),
                amount: 8_000,
            }],
        }
    }

    #[test]
    fn test_http_notifier_posts_resources() {
        let server = MockServer::start();
        let unload = server.mock(|when, then| {
            when.method(POST)
                .path("/unload_model")
                .header("content-type", "application/json")
                .json_body(json!({
                    "collaborator": "image-gen",
                    "resources": ["sdxl"],
                    "reason": "pressure",
                }));
            then.status(200).json_body(json!({
                "status": "success",
                "message": "Model unloaded from memory",
            }));
        });
        let notifier = HttpNotifier::new(Duration::from_secs(5));

        notifier
            .notify(&notice(Some(server.url("/unload_model"))))
            .unwrap();
        unload.assert();
    }

    #[test]
    fn test_http_notifier_accepts_empty_success_body() {
        let server = MockServer::start();
        let unload = server.mock(|when, then| {
            when.method(POST).path("/unload_model");
            then.status(204);
        });
        let notifier = HttpNotifier::new(Duration::from_secs(5));

        notifier
            .notify(&notice(Some(server.url("/unload_model"))))
            .unwrap();
        unload.assert();
    }

    #[test]
    fn test_http_notifier_reports_error_status() {
        let server = MockServer::start();
        let unload = server.mock(|when, then| {
            when.method(POST).path("/unload_model");
            then.status(500).json_body(json!({ "detail": "boom" }));
        });
        let notifier = HttpNotifier::new(Duration::from_secs(5));

        let err = notifier
            .notify(&notice(Some(server.url("/unload_model"))))
            .unwrap_err();
        assert!(matches!(err, NotifyError::Rejected { status: 500 }));
        unload.assert();
    }

    #[test]
    fn test_http_notifier_reports_declined_release() {
        let server = MockServer::start();
        let unload = server.mock(|when, then| {
            when.method(POST).path("/unload_model");
            then.status(200)
                .json_body(json!({ "status": "error", "message": "busy" }));
        });
        let notifier = HttpNotifier::new(Duration::from_secs(5));

        let err = notifier
            .notify(&notice(Some(server.url("/unload_model"))))
            .unwrap_err();
        assert!(matches!(err, NotifyError::Declined(ref m) if m == "busy"));
        unload.assert();
    }

    #[test]
    fn test_http_notifier_unreachable_is_transport_error() {
        // Bind then drop to get a port nobody listens on
        let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
        let notifier = HttpNotifier::new(Duration::from_millis(500));

        let err = notifier
            .notify(&notice(Some(format!("http://{}/unload_model", addr))))
            .unwrap_err();
        assert!(matches!(err, NotifyError::Transport(_)));
    }

    struct RecordingNotifier {
        seen: Mutex<Vec<String>>,
        fail_for: &'static str,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notice: &EvictionNotice) -> Result<(), NotifyError> {
            self.seen.lock().unwrap().push(notice.collaborator.clone());
            if notice.collaborator == self.fail_for {
                return Err(NotifyError::Transport("connection refused".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_dispatch_skips_missing_callbacks_and_survives_failures() {
        let notifier = RecordingNotifier {
            seen: Mutex::new(Vec::new()),
            fail_for: "broken",
        };

        let mut broken = notice(Some("http://broken.local".to_string()));
        broken.collaborator = "broken".to_string();
        let notices = vec![
            broken,
            notice(None),
            notice(Some("http://image-gen.local".to_string())),
        ];

        let delivered = dispatch(&notifier, &notices);
        assert_eq!(delivered, 1);
        assert_eq!(
            *notifier.seen.lock().unwrap(),
            vec!["broken".to_string(), "image-gen".to_string()]
        );
    }
}
