//! Webhook delivery against a mock HTTP endpoint.

#![allow(clippy::unwrap_used)]

use content_pipeline_core::PostStatus;
use content_pipeline_core::notify::{LifecycleNotification, Notifier, NotifyError};
use content_pipeline_testing::fixtures::post_in;
use content_pipeline_testing::test_epoch;
use content_pipeline_webhook::{SECRET_HEADER, WebhookNotifier};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn regenerate_notification() -> LifecycleNotification {
    let post = post_in(PostStatus::Regenerate, test_epoch());
    LifecycleNotification::regenerate(post, test_epoch())
}

#[tokio::test]
async fn posts_json_with_secret_header() {
    let server = MockServer::start().await;
    let notification = regenerate_notification();

    Mock::given(method("POST"))
        .and(path("/hooks/content"))
        .and(header(SECRET_HEADER, "shared-secret"))
        .and(body_partial_json(json!({
            "event": "post.regenerate",
            "postId": notification.post_id.as_str(),
            "post": { "status": "REGENERATE" },
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = WebhookNotifier::new(format!("{}/hooks/content", server.uri()), "shared-secret");
    tokio_test::assert_ok!(notifier.notify(notification).await);
}

#[tokio::test]
async fn non_success_status_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let notifier = WebhookNotifier::new(server.uri(), "shared-secret");
    let error = notifier.notify(regenerate_notification()).await.unwrap_err();

    assert_eq!(
        error,
        NotifyError::Rejected {
            status: 500,
            body: "boom".to_string()
        }
    );
}

#[tokio::test]
async fn slow_endpoint_times_out_as_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let notifier =
        WebhookNotifier::new(server.uri(), "shared-secret").with_timeout(Duration::from_millis(50));
    let error = notifier.notify(regenerate_notification()).await.unwrap_err();

    assert!(matches!(error, NotifyError::Transport(_)));
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() {
    // Port 9 (discard) is not listening in the test environment.
    let notifier = WebhookNotifier::new("http://127.0.0.1:9/hooks", "shared-secret")
        .with_timeout(Duration::from_secs(2));
    let error = notifier.notify(regenerate_notification()).await.unwrap_err();

    assert!(matches!(error, NotifyError::Transport(_)));
}
