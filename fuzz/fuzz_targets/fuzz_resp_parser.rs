#![no_main]

use bytes::BytesMut;
use keyferry_core::protocol::{encode_to_bytes, parse_frame};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes from a peer must never panic the reply reader.
    let mut buf = BytesMut::from(data);
    while let Ok(Some(frame)) = parse_frame(&mut buf) {
        // Anything we accepted must re-encode to something we accept again.
        let mut again = encode_to_bytes(&frame);
        let reparsed = parse_frame(&mut again).expect("re-encoded frame should parse");
        assert_eq!(reparsed, Some(frame));
    }
});
