use std::time::Duration;

use bson::oid::ObjectId;
use televisit_services::MetadataStore;

use crate::fixtures::test_app::TestApp;
use crate::fixtures::ws_client::TestClient;
use crate::fixtures::eventually;

#[tokio::test]
async fn sweep_deactivates_orphaned_sessions() {
    let app = TestApp::spawn_with_settings(|s| {
        s.session.sweep_interval_secs = 1;
        s.session.max_duration_secs = 60;
    })
    .await;

    // An active session with no runtime, as left behind by a process restart.
    let session = app
        .store
        .create_session(ObjectId::new(), 16_000, 1)
        .await
        .unwrap();
    let session_id = session.id.unwrap();
    app.store.backdate_session(session_id, 120);

    eventually("orphaned session reclaimed", Duration::from_secs(5), || {
        app.store
            .session_snapshot(session_id)
            .map(|s| !s.active)
            .unwrap_or(false)
    })
    .await;
}

#[tokio::test]
async fn sweep_leaves_fresh_sessions_alone() {
    let app = TestApp::spawn_with_settings(|s| {
        s.session.sweep_interval_secs = 1;
        s.session.max_duration_secs = 60;
    })
    .await;

    let session = app
        .store
        .create_session(ObjectId::new(), 16_000, 1)
        .await
        .unwrap();
    let session_id = session.id.unwrap();

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(
        app.store.session_snapshot(session_id).map(|s| s.active),
        Some(true)
    );
}

#[tokio::test]
async fn max_duration_timer_force_ends_the_session() {
    let app = TestApp::spawn_with_settings(|s| {
        s.session.max_duration_secs = 1;
    })
    .await;

    let clinician = app.create_user("Dr. Osei", "clinician").await;
    let patient = app.create_user("Kim", "patient").await;
    let room = app.create_room(&clinician, &patient).await;

    let mut cw = TestClient::connect(&app.ws_url(&clinician)).await;
    cw.expect_event("connected").await;
    let mut pw = TestClient::connect(&app.ws_url(&patient)).await;
    pw.expect_event("connected").await;

    app.invite(&room, &clinician).await;
    pw.expect_event("session_invite").await;
    pw.send_json(serde_json::json!({
        "type": "session_invite_response",
        "accept": true,
    }))
    .await;
    let started = pw.expect_event("session_started").await;
    let session_id = started["sessionId"].as_str().unwrap().to_string();
    cw.expect_event("session_started").await;

    // The timer fires after ~1s: error notice, session end, forced close.
    let error = pw.wait_for(|v| v["type"] == "error").await;
    assert_eq!(error["message"], "session time limit reached");
    pw.expect_event("session_ended").await;
    assert_eq!(pw.expect_close().await, Some(1000));

    eventually("session deactivated", Duration::from_secs(5), || {
        app.session_active(&session_id) == Some(false)
    })
    .await;
}
