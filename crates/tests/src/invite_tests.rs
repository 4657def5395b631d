use std::time::Duration;

use crate::fixtures::test_app::TestApp;
use crate::fixtures::ws_client::TestClient;

async fn seed_pair(app: &TestApp) -> (String, String, String) {
    let clinician = app.create_user("Dr. Osei", "clinician").await;
    let patient = app.create_user("Kim", "patient").await;
    let room = app.create_room(&clinician, &patient).await;
    (clinician, patient, room)
}

#[tokio::test]
async fn accept_starts_one_session_for_both() {
    let app = TestApp::spawn().await;
    let (clinician, patient, room) = seed_pair(&app).await;

    let mut cw = TestClient::connect(&app.ws_url(&clinician)).await;
    cw.expect_event("connected").await;
    let mut pw = TestClient::connect(&app.ws_url(&patient)).await;
    pw.expect_event("connected").await;

    let resp = app.invite(&room, &clinician).await;
    assert_eq!(resp.status().as_u16(), 200);

    let invite = pw.expect_event("session_invite").await;
    assert_eq!(invite["roomId"], room.as_str());
    assert_eq!(invite["creatorId"], clinician.as_str());

    pw.send_json(serde_json::json!({
        "type": "session_invite_response",
        "accept": true,
    }))
    .await;

    let started_c = cw.expect_event("session_started").await;
    let started_p = pw.expect_event("session_started").await;
    assert_eq!(started_c["sessionId"], started_p["sessionId"]);
    assert_eq!(started_c["roomId"], room.as_str());

    // Both ids left the unassigned registry: a fresh proposal has no peers.
    let resp = app.invite(&room, &clinician).await;
    assert_eq!(resp.status().as_u16(), 409);
}

#[tokio::test]
async fn decline_notifies_the_creator_and_consumes_the_invite() {
    let app = TestApp::spawn().await;
    let (clinician, patient, room) = seed_pair(&app).await;

    let mut cw = TestClient::connect(&app.ws_url(&clinician)).await;
    cw.expect_event("connected").await;
    let mut pw = TestClient::connect(&app.ws_url(&patient)).await;
    pw.expect_event("connected").await;

    app.invite(&room, &clinician).await;
    pw.expect_event("session_invite").await;

    pw.send_json(serde_json::json!({
        "type": "session_invite_response",
        "accept": false,
    }))
    .await;

    let declined = cw.expect_event("session_declined").await;
    assert_eq!(declined["roomId"], room.as_str());

    // Both sockets are still unassigned; a new round is possible.
    let resp = app.invite(&room, &clinician).await;
    assert_eq!(resp.status().as_u16(), 200);
    pw.expect_event("session_invite").await;
}

#[tokio::test]
async fn propose_fails_when_a_peer_is_offline() {
    let app = TestApp::spawn().await;
    let (clinician, _patient, room) = seed_pair(&app).await;

    let mut cw = TestClient::connect(&app.ws_url(&clinician)).await;
    cw.expect_event("connected").await;

    let resp = app.invite(&room, &clinician).await;
    assert_eq!(resp.status().as_u16(), 409);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn propose_fails_for_unknown_room() {
    let app = TestApp::spawn().await;
    let clinician = app.create_user("Dr. Osei", "clinician").await;

    let resp = app
        .invite(&bson::oid::ObjectId::new().to_hex(), &clinician)
        .await;
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn propose_fails_for_a_non_participant_creator() {
    let app = TestApp::spawn().await;
    let (_clinician, _patient, room) = seed_pair(&app).await;
    let outsider = app.create_user("Nos", "clinician").await;

    let resp = app.invite(&room, &outsider).await;
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn response_without_a_pending_invite_is_a_no_op() {
    let app = TestApp::spawn().await;
    let (_clinician, patient, _room) = seed_pair(&app).await;

    let mut pw = TestClient::connect(&app.ws_url(&patient)).await;
    pw.expect_event("connected").await;

    pw.send_json(serde_json::json!({
        "type": "session_invite_response",
        "accept": true,
    }))
    .await;

    pw.expect_silence(Duration::from_millis(300)).await;
}

#[tokio::test]
async fn second_proposal_supersedes_the_first() {
    let app = TestApp::spawn().await;
    // Two clinicians sharing one patient, one room each.
    let clin1 = app.create_user("Dr. One", "clinician").await;
    let clin2 = app.create_user("Dr. Two", "clinician").await;
    let patient = app.create_user("Kim", "patient").await;
    let room1 = app.create_room(&clin1, &patient).await;
    let room2 = app.create_room(&clin2, &patient).await;

    let mut c1 = TestClient::connect(&app.ws_url(&clin1)).await;
    c1.expect_event("connected").await;
    let mut c2 = TestClient::connect(&app.ws_url(&clin2)).await;
    c2.expect_event("connected").await;
    let mut pw = TestClient::connect(&app.ws_url(&patient)).await;
    pw.expect_event("connected").await;

    app.invite(&room1, &clin1).await;
    let first = pw.expect_event("session_invite").await;
    assert_eq!(first["roomId"], room1.as_str());

    app.invite(&room2, &clin2).await;
    let second = pw.expect_event("session_invite").await;
    assert_eq!(second["roomId"], room2.as_str());

    pw.send_json(serde_json::json!({
        "type": "session_invite_response",
        "accept": true,
    }))
    .await;

    // The accept pairs with the surviving (latest) invite.
    let started = pw.expect_event("session_started").await;
    assert_eq!(started["roomId"], room2.as_str());
    c2.expect_event("session_started").await;

    // The superseded proposer hears nothing.
    c1.expect_silence(Duration::from_millis(300)).await;
}

#[tokio::test]
async fn disconnect_consumes_a_pending_invite() {
    let app = TestApp::spawn().await;
    let (clinician, patient, room) = seed_pair(&app).await;

    let mut cw = TestClient::connect(&app.ws_url(&clinician)).await;
    cw.expect_event("connected").await;
    let mut pw = TestClient::connect(&app.ws_url(&patient)).await;
    pw.expect_event("connected").await;

    app.invite(&room, &clinician).await;
    pw.expect_event("session_invite").await;

    // The invitee drops; a late accept from a reconnect must not resurrect
    // the consumed invite.
    pw.close().await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let mut pw = TestClient::connect(&app.ws_url(&patient)).await;
    pw.expect_event("connected").await;
    pw.send_json(serde_json::json!({
        "type": "session_invite_response",
        "accept": true,
    }))
    .await;

    pw.expect_silence(Duration::from_millis(300)).await;
    cw.expect_silence(Duration::from_millis(100)).await;
}
