//! Property tests for inbound frame decoding.

use kursi_proto::{ClientMessage, ProtocolError};
use proptest::prelude::*;
use serde_json::json;

proptest! {
    #[test]
    fn arbitrary_text_never_panics(text in ".{0,256}") {
        let _ = ClientMessage::decode(&text);
    }

    #[test]
    fn positional_and_keyed_confirm_agree(
        room in "room[1-5]",
        seat in 1u32..=35,
        name in "[a-z]{1,12}",
        color in "[a-z]{0,8}",
        vip in any::<bool>(),
        badge in 0u32..10,
    ) {
        let positional = json!(["updateKursi", room, seat, "img", name, color, "low", "up", vip, badge]);
        let keyed = json!({
            "type": "confirmSeat",
            "room": room,
            "seat": seat,
            "noimageUrl": "img",
            "namauser": name,
            "color": color,
            "itembawah": "low",
            "itematas": "up",
            "vip": vip,
            "viptanda": badge,
        });

        let a = ClientMessage::from_value(&positional).unwrap();
        let b = ClientMessage::from_value(&keyed).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn unknown_tags_are_rejected(tag in "[A-Z][a-zA-Z]{2,10}") {
        let frame = json!([tag.clone(), "room1"]).to_string();
        prop_assert_eq!(ClientMessage::decode(&frame), Err(ProtocolError::UnknownEvent(tag)));
    }
}

#[test]
fn keyed_private_message_uses_wire_names() {
    let frame = r#"{"type":"private","idtarget":"bob","noimageUrl":"x.png","message":"yo","sender":"alice"}"#;
    let msg = ClientMessage::decode(frame).unwrap();
    assert_eq!(
        msg,
        ClientMessage::Private {
            target: "bob".to_string(),
            image_url: "x.png".to_string(),
            message: "yo".to_string(),
            sender: "alice".to_string(),
        }
    );
}

#[test]
fn empty_display_name_is_rejected() {
    let err = ClientMessage::decode(r#"["updateKursi","room1",1,"img",""]"#).unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidArgument { name: "namauser", .. }));
}
