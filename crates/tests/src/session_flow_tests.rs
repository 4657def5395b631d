use std::time::Duration;

use crate::fixtures::fake_provider::{
    final_result, final_result_with_speaker, interim, utterance_end,
};
use crate::fixtures::test_app::TestApp;
use crate::fixtures::ws_client::TestClient;
use crate::fixtures::eventually;

/// An accepted session with both participants connected.
struct LiveSession {
    session_id: String,
    room_id: String,
    clinician_id: String,
    clinician: TestClient,
    patient: TestClient,
}

/// Seeds a clinician/patient pair, connects both, and walks the invite
/// handshake to an accepted session.
async fn accepted_session(app: &TestApp) -> LiveSession {
    let clinician_id = app.create_user("Dr. Osei", "clinician").await;
    let patient_id = app.create_user("Kim", "patient").await;
    let room_id = app.create_room(&clinician_id, &patient_id).await;

    let mut clinician = TestClient::connect(&app.ws_url(&clinician_id)).await;
    clinician.expect_event("connected").await;
    let mut patient = TestClient::connect(&app.ws_url(&patient_id)).await;
    patient.expect_event("connected").await;

    let resp = app.invite(&room_id, &clinician_id).await;
    assert_eq!(resp.status().as_u16(), 200);
    patient.expect_event("session_invite").await;
    patient
        .send_json(serde_json::json!({
            "type": "session_invite_response",
            "accept": true,
        }))
        .await;

    let started = clinician.expect_event("session_started").await;
    patient.expect_event("session_started").await;
    let session_id = started["sessionId"].as_str().unwrap().to_string();

    LiveSession {
        session_id,
        room_id,
        clinician_id,
        clinician,
        patient,
    }
}

#[tokio::test]
async fn start_reports_recording_and_ready() {
    let app = TestApp::spawn().await;
    app.provider.push_script(vec![]);
    let mut live = accepted_session(&app).await;

    live.clinician
        .send_json(serde_json::json!({ "type": "start", "sessionId": live.session_id }))
        .await;

    for ws in [&mut live.clinician, &mut live.patient] {
        let started = ws.expect_event("recording_started").await;
        assert_eq!(started["sessionId"], live.session_id.as_str());
        ws.expect_event("ready").await;
    }
    assert_eq!(app.provider.open_count(), 1);
}

#[tokio::test]
async fn full_session_flow_with_disconnect_teardown() {
    let app = TestApp::spawn().await;
    app.provider.push_script(vec![
        interim("hel", 100, 400),
        final_result("hello", 100, 800),
        utterance_end(800),
    ]);

    let mut live = accepted_session(&app).await;
    let session_id = live.session_id.clone();

    live.clinician
        .send_json(serde_json::json!({ "type": "start", "sessionId": session_id }))
        .await;
    live.clinician.expect_event("recording_started").await;

    // Audio frames are buffered for the recording and forwarded upstream in
    // arrival order.
    live.clinician.send_binary(vec![0u8; 320]).await;
    live.clinician.send_binary(vec![1u8; 320]).await;
    eventually("audio forwarded to the bridge", Duration::from_secs(5), || {
        app.provider.audio_frame_count() == 2
    })
    .await;

    // Interim first, then the final with the same start time replaces it in
    // the client's view.
    for ws in [&mut live.clinician, &mut live.patient] {
        let interim_event = ws
            .wait_for(|v| v["type"] == "transcript" && v["payload"]["isFinal"] == false)
            .await;
        assert_eq!(interim_event["payload"]["text"], "hel");
        assert_eq!(interim_event["payload"]["startMs"], 100);
        assert!(interim_event["payload"]["role"].is_null());

        let final_event = ws
            .wait_for(|v| v["type"] == "transcript" && v["payload"]["isFinal"] == true)
            .await;
        assert_eq!(final_event["payload"]["text"], "hello");
        assert_eq!(final_event["payload"]["startMs"], 100);

        let utterance = ws.expect_event("utterance").await;
        assert_eq!(utterance["payload"]["text"], "hello");
    }

    // The clinician drops abruptly; the patient is told, and the artifacts
    // are persisted.
    live.clinician.close().await;
    let ended = live.patient.expect_event("session_ended").await;
    assert_eq!(ended["sessionId"], session_id.as_str());

    let wav_path = app.blob_path(&live.room_id, &session_id, "recording.wav");
    eventually("recording blob written", Duration::from_secs(5), || {
        wav_path.exists()
    })
    .await;
    let wav = std::fs::read(&wav_path).unwrap();
    assert_eq!(wav.len(), 44 + 640);
    let data_len = u32::from_le_bytes(wav[40..44].try_into().unwrap());
    assert_eq!(data_len, 640);

    let transcript_path = app.blob_path(&live.room_id, &session_id, "transcript.json");
    assert!(transcript_path.exists());
    let transcript: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&transcript_path).unwrap()).unwrap();
    assert_eq!(transcript.as_array().unwrap().len(), 1);
    assert_eq!(transcript[0]["text"], "hello");

    assert_eq!(app.session_active(&session_id), Some(false));
}

#[tokio::test]
async fn concurrent_stops_persist_exactly_once() {
    let app = TestApp::spawn().await;
    app.provider.push_script(vec![final_result("hello", 0, 500)]);

    let mut live = accepted_session(&app).await;
    let session_id = live.session_id.clone();

    live.clinician
        .send_json(serde_json::json!({ "type": "start", "sessionId": session_id }))
        .await;
    live.clinician.expect_event("recording_started").await;

    live.clinician.send_binary(vec![0u8; 320]).await;
    eventually("audio forwarded to the bridge", Duration::from_secs(5), || {
        app.provider.audio_frame_count() == 1
    })
    .await;

    // Both sides race to stop; only one teardown performs work.
    live.clinician
        .send_json(serde_json::json!({ "type": "stop", "sessionId": session_id }))
        .await;
    live.patient
        .send_json(serde_json::json!({ "type": "stop", "sessionId": session_id }))
        .await;

    live.clinician.wait_for(|v| v["type"] == "session_ended").await;
    live.patient.wait_for(|v| v["type"] == "session_ended").await;

    eventually("single recording write", Duration::from_secs(5), || {
        app.recordings.write_count("recording.wav") == 1
    })
    .await;
    assert_eq!(app.session_active(&session_id), Some(false));

    // Teardown returned both sockets to the unassigned registry: a fresh
    // invite round works immediately.
    let resp = app.invite(&live.room_id, &live.clinician_id).await;
    assert_eq!(resp.status().as_u16(), 200);
    live.patient.expect_event("session_invite").await;
}

#[tokio::test]
async fn stop_reports_a_final_summary() {
    let app = TestApp::spawn().await;
    app.provider.push_script(vec![
        final_result("first", 0, 400),
        final_result("second", 500, 900),
    ]);

    let mut live = accepted_session(&app).await;
    let session_id = live.session_id.clone();

    live.clinician
        .send_json(serde_json::json!({ "type": "start", "sessionId": session_id }))
        .await;
    live.clinician
        .wait_for(|v| v["type"] == "transcript" && v["payload"]["text"] == "second")
        .await;
    live.patient
        .wait_for(|v| v["type"] == "transcript" && v["payload"]["text"] == "second")
        .await;

    live.clinician
        .send_json(serde_json::json!({ "type": "stop", "sessionId": session_id }))
        .await;

    for ws in [&mut live.clinician, &mut live.patient] {
        let stopped_frame = ws.wait_for(|v| v["type"] == "recording_stopped").await;
        assert_eq!(stopped_frame["sessionId"], session_id.as_str());
        let summary = ws.expect_event("stopped").await;
        assert_eq!(
            summary["finalTranscriptSummary"]["sessionId"],
            session_id.as_str()
        );
        assert_eq!(summary["finalTranscriptSummary"]["segmentCount"], 2);
        ws.expect_event("session_ended").await;
    }
}

#[tokio::test]
async fn auto_map_resolves_speaker_roles() {
    let app = TestApp::spawn().await;
    app.provider.push_script(vec![
        final_result_with_speaker("good morning", 0, 800, "speaker_1"),
        final_result_with_speaker("hi", 900, 1300, "speaker_0"),
    ]);

    let mut live = accepted_session(&app).await;

    live.clinician
        .send_json(serde_json::json!({ "type": "start", "sessionId": live.session_id }))
        .await;
    live.clinician
        .wait_for(|v| v["type"] == "transcript" && v["payload"]["text"] == "hi")
        .await;

    live.clinician
        .send_json(serde_json::json!({ "type": "map_speakers" }))
        .await;

    for ws in [&mut live.clinician, &mut live.patient] {
        let mapped = ws.expect_event("speakers_mapped").await;
        // The first observed speaker becomes the clinician.
        assert_eq!(mapped["assignments"]["speaker_1"], "clinician");
        assert_eq!(mapped["assignments"]["speaker_0"], "patient");
    }
}

#[tokio::test]
async fn auto_map_before_any_final_fails() {
    let app = TestApp::spawn().await;
    let mut live = accepted_session(&app).await;

    live.clinician
        .send_json(serde_json::json!({ "type": "map_speakers" }))
        .await;

    let error = live.clinician.expect_event("error").await;
    assert_eq!(error["message"], "no speaker observed yet");
}

#[tokio::test]
async fn explicit_speaker_assignments_are_broadcast() {
    let app = TestApp::spawn().await;
    let mut live = accepted_session(&app).await;

    live.clinician
        .send_json(serde_json::json!({
            "type": "map_speakers",
            "assignments": { "speaker_0": "patient", "speaker_1": "clinician" },
        }))
        .await;

    for ws in [&mut live.clinician, &mut live.patient] {
        let mapped = ws.expect_event("speakers_mapped").await;
        assert_eq!(mapped["assignments"]["speaker_0"], "patient");
        assert_eq!(mapped["assignments"]["speaker_1"], "clinician");
    }
}

#[tokio::test]
async fn stop_for_an_unknown_session_reports_an_error() {
    let app = TestApp::spawn().await;
    let mut live = accepted_session(&app).await;

    live.clinician
        .send_json(serde_json::json!({
            "type": "stop",
            "sessionId": bson::oid::ObjectId::new().to_hex(),
        }))
        .await;

    let error = live.clinician.expect_event("error").await;
    assert_eq!(error["message"], "session not found");
}
