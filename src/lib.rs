//! pgconn: connection establishment and authentication for the Postgres wire protocol
//!
//! This crate turns a byte-stream endpoint (TCP or a Unix domain socket) into an
//! authenticated, ready-to-query [`Session`]:
//!
//! * address resolution (socket directory vs `host:port`)
//! * in-band TLS upgrade via the SSLRequest exchange
//! * startup message and protocol 3.0 negotiation
//! * cleartext, MD5 and SCRAM-SHA-256 authentication
//! * a receive primitive that tracks transaction status and server parameters
//!
//! Query execution, row decoding, pooling and cancellation are left to callers.
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> pgconn::Result<()> {
//! use pgconn::ConnConfig;
//!
//! let config = ConnConfig::builder("localhost", "mydb")
//!     .user("postgres")
//!     .password("secret")
//!     .build();
//!
//! let session = pgconn::connect(config).await?;
//! println!("server_version = {}", session.parameter_status("server_version"));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod auth;
pub mod client;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod protocol;

pub use client::ConnectionInfo;
pub use connection::{
    connect, connect_with_identity, ConnConfig, ConnConfigBuilder, Dialer, FixedIdentity,
    IdentityProvider, NetworkAddress, OsIdentity, Session, SslMode, TcpDialer, TlsConfig,
    Transport,
};
pub use error::{Error, Result, ServerError};
