//! Session handle, the startup handshake and the message receive loop

use super::channel::MessageChannel;
use super::config::{ConnConfig, IdentityProvider, OsIdentity};
use super::state::HandshakePhase;
use super::tls::TlsConfig;
use super::transport::Transport;
use crate::auth::Authenticator;
use crate::error::ServerError;
use crate::metrics::{counters, histograms, labels};
use crate::protocol::constants::{PROTOCOL_VERSION, SSL_ACCEPT};
use crate::protocol::{AuthenticationMessage, BackendMessage, FrontendMessage};
use crate::{Error, Result};
use std::collections::HashMap;
use std::time::Instant;
use tracing::Instrument;

/// Open an authenticated session, taking the default user from the OS.
///
/// Returns only after the server reported ReadyForQuery. On failure the
/// stream is dropped and only the error is returned.
pub async fn connect(config: ConnConfig) -> Result<Session> {
    connect_with_identity(config, &OsIdentity).await
}

/// Open an authenticated session using `identity` for the default user name
pub async fn connect_with_identity(
    mut config: ConnConfig,
    identity: &dyn IdentityProvider,
) -> Result<Session> {
    config.assign_defaults(identity)?;

    let addr = config.network_address();
    let dialer = config
        .dialer
        .clone()
        .ok_or_else(|| Error::Config("no dialer configured".into()))?;

    tracing::debug!(network = addr.network(), address = %addr, "dialing");
    let transport = dialer.dial(&addr).await?;

    Session::startup(transport, config).await
}

/// An authenticated, ready-to-query connection
///
/// Every operation takes `&mut self`, so at most one send or receive is in
/// flight at a time.
#[derive(Debug)]
pub struct Session {
    channel: MessageChannel,
    process_id: u32,
    secret_key: u32,
    tx_status: u8,
    parameters: HashMap<String, String>,
    config: ConnConfig,
}

impl Session {
    /// Run the startup handshake over an already open stream.
    ///
    /// `config` must already have its defaults assigned; [`connect`] does that.
    pub async fn startup(transport: Transport, config: ConnConfig) -> Result<Self> {
        let started = Instant::now();
        let span = tracing::info_span!(
            "startup",
            user = %config.user,
            database = %config.database
        );

        let result = Self::handshake(transport, config).instrument(span).await;

        let outcome = if result.is_ok() {
            labels::OUTCOME_SUCCESS
        } else {
            labels::OUTCOME_FAILURE
        };
        counters::handshake_completed(outcome);
        histograms::handshake_duration(started.elapsed().as_millis() as u64);

        result
    }

    async fn handshake(transport: Transport, config: ConnConfig) -> Result<Self> {
        let mut phase = HandshakePhase::Initial;
        let result = Self::drive(&mut phase, transport, config).await;

        if let Err(err) = &result {
            tracing::debug!(%phase, error = %err, "handshake aborted");
            phase.transition(HandshakePhase::Failed)?;
        }
        result
    }

    async fn drive(
        phase: &mut HandshakePhase,
        transport: Transport,
        config: ConnConfig,
    ) -> Result<Self> {
        let mut channel = MessageChannel::new(transport);

        if let Some(tls) = &config.tls {
            phase.transition(HandshakePhase::NegotiatingTls)?;
            channel = negotiate_tls(channel, tls, &config.host).await?;
        }

        phase.transition(HandshakePhase::AwaitingAuth)?;
        channel
            .send(&FrontendMessage::Startup {
                version: PROTOCOL_VERSION,
                params: config.startup_params(),
            })
            .await?;

        let mut auth = Authenticator::new(config.user.clone(), config.password.as_deref());
        let mut authenticated = false;
        let mut session = Session {
            channel,
            process_id: 0,
            secret_key: 0,
            tx_status: 0,
            parameters: HashMap::new(),
            config,
        };

        loop {
            match session.receive().await? {
                BackendMessage::BackendKeyData {
                    process_id,
                    secret_key,
                } => {
                    session.process_id = process_id;
                    session.secret_key = secret_key;
                }
                BackendMessage::Authentication(challenge) => {
                    if challenge == AuthenticationMessage::Ok {
                        authenticated = true;
                    }
                    let reply = match auth.respond(challenge) {
                        Ok(reply) => reply,
                        Err(err) => {
                            counters::auth_failed(auth.mechanism(), "client_error");
                            return Err(err);
                        }
                    };
                    if let Some(reply) = reply {
                        session.channel.send(&reply).await?;
                    }
                }
                BackendMessage::ReadyForQuery { .. } => {
                    phase.transition(HandshakePhase::Ready)?;
                    tracing::info!(
                        process_id = session.process_id,
                        "startup complete"
                    );
                    return Ok(session);
                }
                BackendMessage::ParameterStatus { name, value } => {
                    tracing::debug!("parameter status: {} = {}", name, value);
                }
                BackendMessage::ErrorResponse(fields) => {
                    if !authenticated && auth.mechanism() != labels::MECHANISM_NONE {
                        counters::auth_failed(auth.mechanism(), "server_error");
                    }
                    return Err(ServerError::from(fields).into());
                }
                other => return Err(Error::UnexpectedMessage(other.kind())),
            }
        }
    }

    /// Receive the next message from the server.
    ///
    /// ReadyForQuery updates [`tx_status`](Self::tx_status) and ParameterStatus
    /// updates the parameter map before the message is handed back unchanged.
    pub async fn receive(&mut self) -> Result<BackendMessage> {
        let msg = self.channel.recv().await?;

        match &msg {
            BackendMessage::ReadyForQuery { status } => self.tx_status = *status,
            BackendMessage::ParameterStatus { name, value } => {
                self.parameters.insert(name.clone(), value.clone());
            }
            _ => {}
        }

        Ok(msg)
    }

    /// Send one message to the server
    pub async fn send(&mut self, msg: &FrontendMessage) -> Result<()> {
        self.channel.send(msg).await
    }

    /// Send Terminate and shut the stream down
    pub async fn close(mut self) -> Result<()> {
        self.channel.send(&FrontendMessage::Terminate).await?;
        self.channel.shutdown().await?;
        tracing::debug!(process_id = self.process_id, "session closed");
        Ok(())
    }

    /// Backend process id, needed to build a cancel request
    pub fn process_id(&self) -> u32 {
        self.process_id
    }

    /// Backend secret key, needed to build a cancel request
    pub fn secret_key(&self) -> u32 {
        self.secret_key
    }

    /// Transaction status byte from the latest ReadyForQuery (`I`, `T` or `E`)
    pub fn tx_status(&self) -> u8 {
        self.tx_status
    }

    /// Value the server reported for parameter `name`, or `""` if it never did
    pub fn parameter_status(&self, name: &str) -> &str {
        self.parameters.get(name).map(String::as_str).unwrap_or("")
    }

    /// Whether the stream is TLS-encrypted
    pub fn is_tls(&self) -> bool {
        self.channel.transport().is_tls()
    }

    /// Configuration the session was opened with, defaults included
    pub fn config(&self) -> &ConnConfig {
        &self.config
    }
}

/// Send an SSLRequest and upgrade the stream if the server answers `S`
async fn negotiate_tls(
    mut channel: MessageChannel,
    tls: &TlsConfig,
    host: &str,
) -> Result<MessageChannel> {
    channel.send(&FrontendMessage::SslRequest).await?;

    let response = channel.read_byte().await?;
    if response != SSL_ACCEPT {
        counters::tls_negotiated(labels::TLS_REFUSED);
        tracing::debug!(response, "server refused TLS");
        return Err(Error::TlsRefused);
    }

    counters::tls_negotiated(labels::TLS_ACCEPTED);
    tracing::debug!("server accepted TLS, upgrading connection");

    let transport = channel.into_transport().upgrade_to_tls(tls, host).await?;
    tracing::info!("TLS connection established");

    Ok(MessageChannel::new(transport))
}
