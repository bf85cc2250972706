#![no_main]

use bytes::{Buf, BytesMut};
use pgconn::protocol::decode_message;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut buf = BytesMut::from(data);

    // Several frames may arrive in one read
    while !buf.is_empty() {
        match decode_message(&buf) {
            Ok(Some((_, consumed))) => {
                assert!(consumed >= 5 && consumed <= buf.len());
                buf.advance(consumed);
            }
            Ok(None) | Err(_) => break,
        }
    }
});
