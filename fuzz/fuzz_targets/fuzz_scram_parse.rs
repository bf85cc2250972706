#![no_main]

use pgconn::auth::ScramSha256;
use libfuzzer_sys::fuzz_target;
use libfuzzer_sys::arbitrary::{Arbitrary, Unstructured};

#[derive(Debug)]
struct ScramInput {
    password: String,
    nonce: String,
    server_first: Vec<u8>,
    server_final: Vec<u8>,
}

impl<'a> Arbitrary<'a> for ScramInput {
    fn arbitrary(u: &mut Unstructured<'a>) -> libfuzzer_sys::arbitrary::Result<Self> {
        Ok(Self {
            password: u.arbitrary()?,
            nonce: u.arbitrary()?,
            server_first: u.arbitrary()?,
            server_final: u.arbitrary()?,
        })
    }
}

fuzz_target!(|input: ScramInput| {
    let mut client = ScramSha256::with_nonce("", input.password, input.nonce);
    if client.client_first().is_err() {
        return;
    }

    if client.handle_server_first(&input.server_first).is_ok() {
        let _ = client.handle_server_final(&input.server_final);
    }
});
