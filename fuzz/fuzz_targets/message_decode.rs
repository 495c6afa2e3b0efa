//! Fuzz target for ClientMessage::decode
//!
//! Arbitrary text must never panic the decoder. Anything that decodes must
//! carry a known tag, and every error must render a reply frame.

#![no_main]

use kursi_proto::{ClientMessage, ServerMessage};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else { return };

    match ClientMessage::decode(text) {
        Ok(message) => assert!(!message.tag().is_empty()),
        Err(err) => {
            let reply = ServerMessage::error(err.to_string());
            assert!(reply.encode().is_ok());
        },
    }
});
