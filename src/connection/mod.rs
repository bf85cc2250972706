//! Connection management
//!
//! This module handles:
//! * Address resolution (Unix socket vs TCP)
//! * Configuration defaulting and the pluggable dialer
//! * Transport abstraction and TLS upgrade
//! * The startup handshake and the session receive loop

mod address;
mod channel;
mod config;
mod dial;
mod session;
mod state;
mod tls;
mod transport;

pub use address::NetworkAddress;
pub use config::{ConnConfig, ConnConfigBuilder, FixedIdentity, IdentityProvider, OsIdentity};
pub use dial::{Dialer, TcpDialer, DEFAULT_KEEPALIVE};
pub use session::{connect, connect_with_identity, Session};
pub use state::HandshakePhase;
pub use tls::{parse_server_name, SslMode, TlsConfig, TlsConfigBuilder};
pub use transport::{AsyncStream, Transport};
