use domain::{ConnectionState, InboundMessage};

#[test]
fn valid_utf8_payload_decodes() {
    let payload = vec![0x7B, 0x22, 0x76, 0x22, 0x3A, 0x32, 0x32, 0x2E, 0x35, 0x7D];
    let message = InboundMessage::new("sensors/temp", 1, false, payload.clone());
    assert_eq!(message.payload_text(), Some("{\"v\":22.5}"));
    assert_eq!(message.payload, payload);
}

#[test]
fn empty_payload_decodes_to_empty_text() {
    let message = InboundMessage::new("sensors/temp", 0, false, Vec::new());
    assert_eq!(message.payload_text(), Some(""));
}

#[test]
fn multibyte_payload_decodes() {
    let text = "温度 22.5℃";
    let message = InboundMessage::new("sensors/temp", 0, false, text.as_bytes().to_vec());
    assert_eq!(message.payload_text(), Some(text));
}

#[test]
fn invalid_utf8_payload_has_no_text() {
    let payload = vec![0xC3, 0x28, 0xFF, 0x00];
    let message = InboundMessage::new("sensors/raw", 2, true, payload.clone());
    assert!(message.payload_text().is_none());
    assert_eq!(message.payload, payload);
}

#[test]
fn user_properties_keep_order_and_duplicates() {
    let message = InboundMessage::new("a/b", 1, false, Vec::new())
        .with_client_id("bridge-1")
        .with_user_property("k", "1")
        .with_user_property("k", "2");
    assert_eq!(message.client_id, "bridge-1");
    assert_eq!(
        message.user_properties,
        vec![("k".to_string(), "1".to_string()), ("k".to_string(), "2".to_string())]
    );
}

#[test]
fn shutting_down_is_terminal() {
    assert!(ConnectionState::ShuttingDown.is_terminal());
    assert!(!ConnectionState::ReconnectPending.is_terminal());
    assert_eq!(ConnectionState::ReconnectPending.to_string(), "reconnect_pending");
}
