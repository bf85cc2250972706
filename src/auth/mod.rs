//! Authentication sub-protocol
//!
//! [`Authenticator`] turns each authentication request from the server into at
//! most one reply frame. It keeps SCRAM state between requests, so the
//! handshake loop can feed it every `Authentication` message as it arrives.

mod md5;
mod scram;

pub use self::md5::md5_password;
pub use self::scram::{ScramError, ScramSha256, SCRAM_SHA_256};

use crate::metrics::labels;
use crate::protocol::{AuthenticationMessage, FrontendMessage};
use crate::{Error, Result};

/// Credentials and per-handshake state for answering authentication requests
pub struct Authenticator {
    user: String,
    password: String,
    scram: Option<ScramSha256>,
    mechanism: &'static str,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("user", &self.user)
            .field("mechanism", &self.mechanism)
            .field("scram", &self.scram)
            .finish()
    }
}

impl Authenticator {
    /// Create an authenticator. A missing password is sent as the empty string.
    pub fn new(user: impl Into<String>, password: Option<&str>) -> Self {
        Self {
            user: user.into(),
            password: password.unwrap_or_default().to_string(),
            scram: None,
            mechanism: labels::MECHANISM_NONE,
        }
    }

    /// Mechanism the server asked for, for metrics and logs
    pub fn mechanism(&self) -> &'static str {
        self.mechanism
    }

    /// Compute the reply to one authentication request.
    ///
    /// Returns `Ok(None)` when nothing has to be sent.
    pub fn respond(&mut self, challenge: AuthenticationMessage) -> Result<Option<FrontendMessage>> {
        match challenge {
            AuthenticationMessage::Ok => {
                if let Some(scram) = &self.scram {
                    if !scram.is_complete() {
                        return Err(Error::Authentication(
                            "server finished SCRAM without proving knowledge of the password"
                                .into(),
                        ));
                    }
                }
                tracing::debug!(mechanism = self.mechanism, "authentication successful");
                Ok(None)
            }
            AuthenticationMessage::CleartextPassword => {
                self.mechanism = labels::MECHANISM_CLEARTEXT;
                crate::metrics::counters::auth_attempted(self.mechanism);
                Ok(Some(FrontendMessage::Password(self.password.clone())))
            }
            AuthenticationMessage::Md5Password { salt } => {
                self.mechanism = labels::MECHANISM_MD5;
                crate::metrics::counters::auth_attempted(self.mechanism);
                Ok(Some(FrontendMessage::Password(md5_password(
                    &self.user,
                    &self.password,
                    &salt,
                ))))
            }
            AuthenticationMessage::Sasl { mechanisms } => {
                if !mechanisms.iter().any(|m| m == SCRAM_SHA_256) {
                    return Err(Error::Authentication(format!(
                        "server does not offer {}. Available: {}",
                        SCRAM_SHA_256,
                        mechanisms.join(", ")
                    )));
                }
                if self.scram.is_some() {
                    return Err(Error::Protocol("SASL exchange started twice".into()));
                }
                self.mechanism = labels::MECHANISM_SCRAM;
                crate::metrics::counters::auth_attempted(self.mechanism);
                tracing::debug!("initiating SCRAM-SHA-256 authentication");

                let mut scram = ScramSha256::new(self.password.clone());
                let data = scram.client_first().map_err(scram_error)?;
                self.scram = Some(scram);
                Ok(Some(FrontendMessage::SaslInitialResponse {
                    mechanism: SCRAM_SHA_256.to_string(),
                    data,
                }))
            }
            AuthenticationMessage::SaslContinue { data } => {
                let scram = self.scram.as_mut().ok_or_else(|| {
                    Error::Protocol("unexpected SaslContinue outside of SASL flow".into())
                })?;
                let data = scram.handle_server_first(&data).map_err(scram_error)?;
                Ok(Some(FrontendMessage::SaslResponse { data }))
            }
            AuthenticationMessage::SaslFinal { data } => {
                let scram = self.scram.as_mut().ok_or_else(|| {
                    Error::Protocol("unexpected SaslFinal outside of SASL flow".into())
                })?;
                scram.handle_server_final(&data).map_err(scram_error)?;
                tracing::debug!("SCRAM server signature verified");
                Ok(None)
            }
            AuthenticationMessage::Unsupported(code) => Err(Error::UnsupportedAuth(code)),
        }
    }
}

fn scram_error(err: ScramError) -> Error {
    match err {
        ScramError::OutOfOrder(what) => {
            Error::Protocol(format!("unexpected SCRAM message: {}", what))
        }
        other => Error::Authentication(format!("SCRAM error: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_sends_nothing() {
        let mut auth = Authenticator::new("alice", Some("secret"));
        assert_eq!(auth.respond(AuthenticationMessage::Ok).unwrap(), None);
    }

    #[test]
    fn test_cleartext_sends_password_verbatim() {
        let mut auth = Authenticator::new("alice", Some("s3cr3t with spaces"));
        let reply = auth
            .respond(AuthenticationMessage::CleartextPassword)
            .unwrap();
        assert_eq!(
            reply,
            Some(FrontendMessage::Password("s3cr3t with spaces".into()))
        );
        assert_eq!(auth.mechanism(), labels::MECHANISM_CLEARTEXT);
    }

    #[test]
    fn test_missing_password_is_sent_empty() {
        let mut auth = Authenticator::new("alice", None);
        let reply = auth
            .respond(AuthenticationMessage::CleartextPassword)
            .unwrap();
        assert_eq!(reply, Some(FrontendMessage::Password(String::new())));
    }

    #[test]
    fn test_md5_sends_digest() {
        let mut auth = Authenticator::new("alice", Some("secret"));
        let reply = auth
            .respond(AuthenticationMessage::Md5Password { salt: [1, 2, 3, 4] })
            .unwrap();
        assert_eq!(
            reply,
            Some(FrontendMessage::Password(
                "md598a0412b9c31436fc53776e863350083".into()
            ))
        );
    }

    #[test]
    fn test_unsupported_method_fails() {
        let mut auth = Authenticator::new("alice", Some("secret"));
        let err = auth
            .respond(AuthenticationMessage::Unsupported(7))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedAuth(7)));
        assert_eq!(err.to_string(), "unknown authentication method: 7");
    }

    #[test]
    fn test_sasl_without_scram_sha_256() {
        let mut auth = Authenticator::new("alice", Some("secret"));
        let err = auth
            .respond(AuthenticationMessage::Sasl {
                mechanisms: vec!["SCRAM-SHA-256-PLUS".into()],
            })
            .unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }

    #[test]
    fn test_sasl_starts_scram() {
        let mut auth = Authenticator::new("alice", Some("secret"));
        let reply = auth
            .respond(AuthenticationMessage::Sasl {
                mechanisms: vec!["SCRAM-SHA-256-PLUS".into(), "SCRAM-SHA-256".into()],
            })
            .unwrap();

        match reply {
            Some(FrontendMessage::SaslInitialResponse { mechanism, data }) => {
                assert_eq!(mechanism, "SCRAM-SHA-256");
                assert!(data.starts_with(b"n,,n=,r="));
            }
            other => panic!("expected SaslInitialResponse, got {:?}", other),
        }
    }

    #[test]
    fn test_sasl_continue_outside_flow() {
        let mut auth = Authenticator::new("alice", Some("secret"));
        let err = auth
            .respond(AuthenticationMessage::SaslContinue { data: vec![] })
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));

        let err = auth
            .respond(AuthenticationMessage::SaslFinal { data: vec![] })
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_ok_before_scram_final_is_rejected() {
        let mut auth = Authenticator::new("alice", Some("secret"));
        auth.respond(AuthenticationMessage::Sasl {
            mechanisms: vec!["SCRAM-SHA-256".into()],
        })
        .unwrap();

        let err = auth.respond(AuthenticationMessage::Ok).unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }
}
