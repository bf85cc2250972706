#![no_main]

use bytes::{Buf, BytesMut};
use pgconn::protocol::decode_message;
use libfuzzer_sys::fuzz_target;
use libfuzzer_sys::arbitrary::{Arbitrary, Unstructured};

#[derive(Debug)]
struct StreamingInput {
    data: Vec<u8>,
    split_points: Vec<u8>,
}

impl<'a> Arbitrary<'a> for StreamingInput {
    fn arbitrary(u: &mut Unstructured<'a>) -> libfuzzer_sys::arbitrary::Result<Self> {
        Ok(Self {
            data: u.arbitrary()?,
            split_points: u.arbitrary()?,
        })
    }
}

fn decode_all(buf: &mut BytesMut, out: &mut Vec<String>) -> bool {
    loop {
        match decode_message(buf) {
            Ok(Some((msg, consumed))) => {
                out.push(format!("{:?}", msg));
                buf.advance(consumed);
            }
            Ok(None) => return true,
            Err(_) => return false,
        }
    }
}

// Decoding must not depend on how the bytes were split across reads
fuzz_target!(|input: StreamingInput| {
    if input.data.is_empty() {
        return;
    }

    let mut whole = Vec::new();
    let whole_ok = decode_all(&mut BytesMut::from(&input.data[..]), &mut whole);

    let mut splits: Vec<usize> = input
        .split_points
        .iter()
        .map(|&b| (b as usize) % (input.data.len() + 1))
        .collect();
    splits.push(0);
    splits.push(input.data.len());
    splits.sort_unstable();
    splits.dedup();

    let mut chunked = Vec::new();
    let mut chunked_ok = true;
    let mut buf = BytesMut::new();
    for window in splits.windows(2) {
        buf.extend_from_slice(&input.data[window[0]..window[1]]);
        if !decode_all(&mut buf, &mut chunked) {
            chunked_ok = false;
            break;
        }
    }

    if whole_ok && chunked_ok {
        assert_eq!(whole, chunked);
    }
});
