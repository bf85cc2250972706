//! SCRAM-SHA-256 client (RFC 5802, RFC 7677) without channel binding

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// SASL mechanism name
pub const SCRAM_SHA_256: &str = "SCRAM-SHA-256";

/// GS2 header: no channel binding, no authzid
const GS2_HEADER: &str = "n,,";

/// Upper bound on the server-chosen PBKDF2 iteration count
///
/// Postgres defaults to 4096.
pub const MAX_ITERATIONS: u32 = 1_000_000;

/// Failure while running the SCRAM exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScramError {
    /// A server message could not be parsed or violates the protocol
    InvalidServerMessage(String),
    /// The server reported an error in its final message (`e=...`)
    ServerRejected(String),
    /// The server signature did not match; the server does not know the password
    InvalidServerSignature,
    /// A message arrived out of order
    OutOfOrder(&'static str),
}

impl fmt::Display for ScramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScramError::InvalidServerMessage(msg) => write!(f, "invalid server message: {}", msg),
            ScramError::ServerRejected(msg) => write!(f, "server rejected authentication: {}", msg),
            ScramError::InvalidServerSignature => f.write_str("server signature mismatch"),
            ScramError::OutOfOrder(msg) => write!(f, "unexpected SCRAM message: {}", msg),
        }
    }
}

impl std::error::Error for ScramError {}

enum Stage {
    Initial,
    SentClientFirst { client_first_bare: String },
    SentClientFinal { server_signature: Vec<u8> },
    Complete,
}

/// Client side of one SCRAM-SHA-256 exchange
pub struct ScramSha256 {
    user: String,
    password: String,
    nonce: String,
    stage: Stage,
}

impl fmt::Debug for ScramSha256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScramSha256")
            .field("nonce", &self.nonce)
            .field("complete", &self.is_complete())
            .finish()
    }
}

impl ScramSha256 {
    /// Start an exchange with a fresh random nonce.
    ///
    /// The user name is left empty: Postgres takes it from the startup message.
    pub fn new(password: impl Into<String>) -> Self {
        let mut raw = [0u8; 18];
        rand::thread_rng().fill_bytes(&mut raw);
        Self::with_nonce("", password, BASE64.encode(raw))
    }

    /// Start an exchange with a fixed user name and nonce
    pub fn with_nonce(
        user: impl Into<String>,
        password: impl Into<String>,
        nonce: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            nonce: nonce.into(),
            stage: Stage::Initial,
        }
    }

    /// Whether the server signature has been verified
    pub fn is_complete(&self) -> bool {
        matches!(self.stage, Stage::Complete)
    }

    /// Produce the client-first message
    pub fn client_first(&mut self) -> Result<Vec<u8>, ScramError> {
        if !matches!(self.stage, Stage::Initial) {
            return Err(ScramError::OutOfOrder("client-first already sent"));
        }
        let client_first_bare = format!("n={},r={}", escape_username(&self.user), self.nonce);
        let message = format!("{}{}", GS2_HEADER, client_first_bare);
        self.stage = Stage::SentClientFirst { client_first_bare };
        Ok(message.into_bytes())
    }

    /// Consume the server-first message and produce the client-final message
    pub fn handle_server_first(&mut self, data: &[u8]) -> Result<Vec<u8>, ScramError> {
        let client_first_bare = match &self.stage {
            Stage::SentClientFirst { client_first_bare } => client_first_bare.clone(),
            _ => return Err(ScramError::OutOfOrder("server-first")),
        };

        let server_first = std::str::from_utf8(data)
            .map_err(|_| ScramError::InvalidServerMessage("server-first is not UTF-8".into()))?;
        let parsed = ServerFirst::parse(server_first)?;

        if parsed.nonce.len() <= self.nonce.len() || !parsed.nonce.starts_with(&self.nonce) {
            return Err(ScramError::InvalidServerMessage(
                "server nonce does not extend client nonce".into(),
            ));
        }

        let salted_password = salted_password(&self.password, &parsed.salt, parsed.iterations);
        let client_key = hmac(&salted_password, b"Client Key");
        let stored_key = Sha256::digest(&client_key);
        let server_key = hmac(&salted_password, b"Server Key");

        let channel_binding = BASE64.encode(GS2_HEADER);
        let client_final_without_proof = format!("c={},r={}", channel_binding, parsed.nonce);
        let auth_message = format!(
            "{},{},{}",
            client_first_bare, server_first, client_final_without_proof
        );

        let client_signature = hmac(&stored_key, auth_message.as_bytes());
        let proof: Vec<u8> = client_key
            .iter()
            .zip(client_signature.iter())
            .map(|(k, s)| k ^ s)
            .collect();

        self.stage = Stage::SentClientFinal {
            server_signature: hmac(&server_key, auth_message.as_bytes()),
        };

        Ok(format!("{},p={}", client_final_without_proof, BASE64.encode(proof)).into_bytes())
    }

    /// Verify the server-final message
    pub fn handle_server_final(&mut self, data: &[u8]) -> Result<(), ScramError> {
        let expected = match &self.stage {
            Stage::SentClientFinal { server_signature } => server_signature,
            _ => return Err(ScramError::OutOfOrder("server-final")),
        };

        let server_final = std::str::from_utf8(data)
            .map_err(|_| ScramError::InvalidServerMessage("server-final is not UTF-8".into()))?;

        if let Some(err) = server_final.strip_prefix("e=") {
            return Err(ScramError::ServerRejected(err.to_string()));
        }

        let verifier = server_final
            .split(',')
            .find_map(|attr| attr.strip_prefix("v="))
            .ok_or_else(|| ScramError::InvalidServerMessage("missing 'v=' attribute".into()))?;
        let signature = BASE64
            .decode(verifier)
            .map_err(|_| ScramError::InvalidServerMessage("invalid server signature encoding".into()))?;

        if !constant_time_eq(&signature, expected) {
            return Err(ScramError::InvalidServerSignature);
        }

        self.stage = Stage::Complete;
        Ok(())
    }
}

struct ServerFirst {
    nonce: String,
    salt: Vec<u8>,
    iterations: u32,
}

impl ServerFirst {
    /// `r=<nonce>,s=<salt>,i=<iterations>[,extensions]`
    fn parse(msg: &str) -> Result<Self, ScramError> {
        if msg.starts_with("m=") {
            return Err(ScramError::InvalidServerMessage(
                "mandatory extensions are not supported".into(),
            ));
        }

        let mut parts = msg.split(',');
        let nonce = attribute(parts.next(), "r=")?.to_string();
        let salt = BASE64
            .decode(attribute(parts.next(), "s=")?)
            .map_err(|_| ScramError::InvalidServerMessage("invalid salt encoding".into()))?;
        let iterations = attribute(parts.next(), "i=")?
            .parse::<u32>()
            .ok()
            .filter(|&i| i > 0 && i <= MAX_ITERATIONS)
            .ok_or_else(|| ScramError::InvalidServerMessage("invalid iteration count".into()))?;

        if nonce.is_empty() {
            return Err(ScramError::InvalidServerMessage("empty nonce".into()));
        }

        Ok(Self {
            nonce,
            salt,
            iterations,
        })
    }
}

fn attribute<'a>(part: Option<&'a str>, key: &str) -> Result<&'a str, ScramError> {
    part.and_then(|p| p.strip_prefix(key))
        .ok_or_else(|| ScramError::InvalidServerMessage(format!("expected '{}' attribute", key)))
}

/// SaltedPassword := PBKDF2-HMAC-SHA256(password, salt, iterations)
fn salted_password(password: &str, salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut out = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// `=` and `,` must be escaped in SCRAM user names
fn escape_username(user: &str) -> String {
    user.replace('=', "=3D").replace(',', "=2C")
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 7677, section 3
    const NONCE: &str = "rOprNGfwEbeRWgbNEkqO";
    const SERVER_FIRST: &str =
        "r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,s=W22ZaJ0SNY7soEsUEjb6gQ==,i=4096";
    const CLIENT_FINAL: &str = "c=biws,r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,p=dHzbZapWIk4jUhN+Ute9ytag9zjfMHgsqmmiz7AndVQ=";
    const SERVER_FINAL: &str = "v=6rriTRBi23WpRR/wtup+mMhUZUn/dB5nLTJRsjl95G4=";

    fn rfc_client() -> ScramSha256 {
        ScramSha256::with_nonce("user", "pencil", NONCE)
    }

    #[test]
    fn test_rfc7677_exchange() {
        let mut scram = rfc_client();

        let first = scram.client_first().unwrap();
        assert_eq!(first, b"n,,n=user,r=rOprNGfwEbeRWgbNEkqO");

        let client_final = scram.handle_server_first(SERVER_FIRST.as_bytes()).unwrap();
        assert_eq!(String::from_utf8(client_final).unwrap(), CLIENT_FINAL);

        scram.handle_server_final(SERVER_FINAL.as_bytes()).unwrap();
        assert!(scram.is_complete());
    }

    #[test]
    fn test_new_uses_empty_user_and_random_nonce() {
        let mut a = ScramSha256::new("pw");
        let b = ScramSha256::new("pw");
        assert_ne!(a.nonce, b.nonce);

        let first = String::from_utf8(a.client_first().unwrap()).unwrap();
        assert!(first.starts_with("n,,n=,r="));
    }

    #[test]
    fn test_wrong_server_signature() {
        let mut scram = rfc_client();
        scram.client_first().unwrap();
        scram.handle_server_first(SERVER_FIRST.as_bytes()).unwrap();

        let forged = format!("v={}", BASE64.encode([0u8; 32]));
        assert_eq!(
            scram.handle_server_final(forged.as_bytes()),
            Err(ScramError::InvalidServerSignature)
        );
        assert!(!scram.is_complete());
    }

    #[test]
    fn test_server_error_attribute() {
        let mut scram = rfc_client();
        scram.client_first().unwrap();
        scram.handle_server_first(SERVER_FIRST.as_bytes()).unwrap();

        assert_eq!(
            scram.handle_server_final(b"e=invalid-proof"),
            Err(ScramError::ServerRejected("invalid-proof".into()))
        );
    }

    #[test]
    fn test_nonce_must_extend_client_nonce() {
        let mut scram = rfc_client();
        scram.client_first().unwrap();

        let err = scram
            .handle_server_first(b"r=someoneelse,s=W22ZaJ0SNY7soEsUEjb6gQ==,i=4096")
            .unwrap_err();
        assert!(matches!(err, ScramError::InvalidServerMessage(_)));
    }

    #[test]
    fn test_server_first_missing_iterations() {
        let mut scram = rfc_client();
        scram.client_first().unwrap();

        let msg = format!("r={}xyz,s=W22ZaJ0SNY7soEsUEjb6gQ==", NONCE);
        assert!(scram.handle_server_first(msg.as_bytes()).is_err());
    }

    #[test]
    fn test_server_first_zero_iterations() {
        let mut scram = rfc_client();
        scram.client_first().unwrap();

        let msg = format!("r={}xyz,s=W22ZaJ0SNY7soEsUEjb6gQ==,i=0", NONCE);
        assert!(scram.handle_server_first(msg.as_bytes()).is_err());
    }

    #[test]
    fn test_server_first_excessive_iterations() {
        let mut scram = rfc_client();
        scram.client_first().unwrap();

        let msg = format!("r={}xyz,s=W22ZaJ0SNY7soEsUEjb6gQ==,i=4294967295", NONCE);
        assert!(matches!(
            scram.handle_server_first(msg.as_bytes()),
            Err(ScramError::InvalidServerMessage(_))
        ));

        // Rejected before any key derivation, so the exchange can't continue
        assert!(matches!(
            scram.handle_server_final(b"v=AAAA"),
            Err(ScramError::OutOfOrder(_))
        ));
    }

    #[test]
    fn test_out_of_order_messages() {
        let mut scram = rfc_client();
        assert_eq!(
            scram.handle_server_first(SERVER_FIRST.as_bytes()),
            Err(ScramError::OutOfOrder("server-first"))
        );
        assert_eq!(
            scram.handle_server_final(SERVER_FINAL.as_bytes()),
            Err(ScramError::OutOfOrder("server-final"))
        );

        scram.client_first().unwrap();
        assert!(scram.client_first().is_err());
    }

    #[test]
    fn test_escape_username() {
        assert_eq!(escape_username("a=b,c"), "a=3Db=2Cc");
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
