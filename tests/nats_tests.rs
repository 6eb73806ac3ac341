use base64::Engine;
use loqa_room::inference::ActionType;
use loqa_room::nats::messages::{
    AudioFrameMessage, ImageRequest, LivenessCommitRequest, ServiceReply, SpeechCommand,
    SpeechControlMessage, TranscriptMessage,
};
use loqa_room::nats::sample_to_data_url;
use loqa_room::rtc::MediaSample;

#[test]
fn test_audio_frame_serialization() {
    let msg = AudioFrameMessage {
        session_id: "room-session".to_string(),
        sequence: 0,
        pcm: base64::engine::general_purpose::STANDARD.encode([0u8; 100]),
        sample_rate: 16000,
        channels: 1,
        timestamp: "2026-10-18T09:30:00Z".to_string(),
        final_frame: false,
    };

    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("room-session"));
    assert!(json.contains("\"final\":false"));
    assert!(json.contains("\"sequence\":0"));

    let deserialized: AudioFrameMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized.session_id, "room-session");
    assert_eq!(deserialized.sample_rate, 16000);
    assert!(!deserialized.final_frame);
}

#[test]
fn test_transcript_partial() {
    let json = r#"{
        "session_id": "room-session",
        "text": "please nod",
        "partial": true,
        "timestamp": "2026-10-18T09:30:05Z",
        "confidence": 0.87
    }"#;

    let msg: TranscriptMessage = serde_json::from_str(json).unwrap();
    assert!(msg.partial);
    assert_eq!(msg.text, "please nod");
    assert_eq!(msg.confidence, Some(0.87));
}

#[test]
fn test_transcript_no_confidence() {
    let json = r#"{
        "session_id": "room-session",
        "text": "No confidence score",
        "partial": false,
        "timestamp": "2026-10-18T09:30:05Z"
    }"#;

    let msg: TranscriptMessage = serde_json::from_str(json).unwrap();
    assert_eq!(msg.confidence, None);
}

#[test]
fn test_speech_control_carries_hot_words() {
    let start = SpeechControlMessage {
        session_id: "room-session".to_string(),
        command: SpeechCommand::Start,
        hot_words: "清楚,10;清晰,1".to_string(),
    };
    let json = serde_json::to_value(&start).unwrap();
    assert_eq!(json["command"], "start");
    assert_eq!(json["hot_words"], "清楚,10;清晰,1");

    let stop = SpeechControlMessage {
        session_id: "room-session".to_string(),
        command: SpeechCommand::Stop,
        hot_words: String::new(),
    };
    let json = serde_json::to_value(&stop).unwrap();
    assert_eq!(json["command"], "stop");
    assert!(json.get("hot_words").is_none());
}

#[test]
fn test_liveness_commit_request_shape() {
    let request = LivenessCommitRequest {
        session_id: "room-session".to_string(),
        detector_id: "detector-1".to_string(),
        action_types: vec![ActionType::Nod],
        frames: vec!["data:image/jpeg;base64,AAAA".to_string()],
    };
    let json = serde_json::to_value(&request).unwrap();
    assert_eq!(json["action_types"][0], "nod");
    assert_eq!(json["frames"].as_array().unwrap().len(), 1);

    // Flash commits carry no gesture
    let flash = LivenessCommitRequest {
        action_types: Vec::new(),
        ..request
    };
    let json = serde_json::to_value(&flash).unwrap();
    assert!(json.get("action_types").is_none());
}

#[test]
fn test_image_request_omits_missing_reference() {
    let request = ImageRequest {
        session_id: "room-session".to_string(),
        image: "data:image/png;base64,AQID".to_string(),
        reference: None,
    };
    let json = serde_json::to_string(&request).unwrap();
    assert!(!json.contains("reference"));
}

#[test]
fn test_reply_envelope_status_mapping() {
    let ok: ServiceReply =
        serde_json::from_str(r#"{"status":201,"body":{"score":0.98}}"#).unwrap();
    assert_eq!(ok.into_result().unwrap()["score"], 0.98);

    let failed: ServiceReply = serde_json::from_str(r#"{"status":502}"#).unwrap();
    let err = failed.into_result().unwrap_err();
    assert_eq!(err.remote_status(), Some(502));
    assert_eq!(err.code(), "REMOTE_SERVICE_ERROR");
}

#[test]
fn test_sampled_frame_becomes_data_url() {
    let frame = MediaSample::Image {
        mime: "image/jpeg".to_string(),
        data: vec![0xff, 0xd8, 0xff],
    };
    assert_eq!(sample_to_data_url(&frame).unwrap(), "data:image/jpeg;base64,/9j/");

    let audio = MediaSample::Audio {
        samples: vec![0; 4],
        sample_rate: 16000,
        channels: 1,
    };
    assert!(sample_to_data_url(&audio).is_err());
}

#[test]
fn test_pcm_encoding_roundtrip() {
    let original_samples: Vec<i16> = vec![100, -200, 300, -400];

    let pcm_bytes: Vec<u8> = original_samples
        .iter()
        .flat_map(|&s| s.to_le_bytes())
        .collect();

    let msg = AudioFrameMessage {
        session_id: "test".to_string(),
        sequence: 0,
        pcm: base64::engine::general_purpose::STANDARD.encode(&pcm_bytes),
        sample_rate: 16000,
        channels: 1,
        timestamp: "2026-10-18T09:30:00Z".to_string(),
        final_frame: false,
    };

    let json = serde_json::to_string(&msg).unwrap();
    let deserialized: AudioFrameMessage = serde_json::from_str(&json).unwrap();

    let decoded_bytes = base64::engine::general_purpose::STANDARD
        .decode(&deserialized.pcm)
        .unwrap();
    let decoded_samples: Vec<i16> = decoded_bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
        .collect();

    assert_eq!(decoded_samples, original_samples);
}
