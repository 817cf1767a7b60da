#![no_main]

use bytes::BytesMut;
use keyferry_core::migrate::interpret_reply;
use keyferry_core::protocol::parse_frame;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut buf = BytesMut::from(data);
    if let Ok(Some(frame)) = parse_frame(&mut buf) {
        let was_error = frame.is_error();
        match interpret_reply(frame) {
            Ok(_) => assert!(!was_error),
            // Error replies always keep the server text.
            Err(e) if was_error => assert!(e.server_message().is_some()),
            Err(e) => assert!(!e.is_transport()),
        }
    }
});
