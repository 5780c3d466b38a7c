use super::*;

#[test]
fn apply_request_serializes_to_type_payload_envelope() {
    let msg = Message::ApplyRequest(ApplyRequest {
        agents: vec![gcluster_core::AgentDef::with_computed_id("builder", "def-text")],
    });
    let v: serde_json::Value = serde_json::to_value(&msg).unwrap();
    assert_eq!(v["type"], "apply_request");
    assert_eq!(v["payload"]["agents"][0]["name"], "builder");
}

#[test]
fn unknown_payload_fields_are_tolerated() {
    let raw = r#"{"type":"steer_subscribe","payload":{"future_field":42}}"#;
    let msg: Message = serde_json::from_str(raw).unwrap();
    assert_eq!(msg, Message::SteerSubscribe(SteerSubscribe {}));
}

#[test]
fn shutdown_notice_round_trips() {
    let msg = Message::ShutdownNotice(ShutdownNotice { reason: "bye".into() });
    let s = serde_json::to_string(&msg).unwrap();
    let back: Message = serde_json::from_str(&s).unwrap();
    assert_eq!(msg, back);
}
