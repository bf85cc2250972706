//! Connection configuration and defaulting

use super::address::NetworkAddress;
use super::dial::{Dialer, TcpDialer};
use super::tls::TlsConfig;
use crate::protocol::constants::DEFAULT_PORT;
use crate::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Source of the default user name
pub trait IdentityProvider: Send + Sync {
    /// Name of the current user
    fn current_user(&self) -> Result<String>;
}

/// Reads the user name of the running process from the OS
#[derive(Debug, Clone, Copy, Default)]
pub struct OsIdentity;

impl IdentityProvider for OsIdentity {
    fn current_user(&self) -> Result<String> {
        whoami::fallible::username()
            .map_err(|e| Error::Config(format!("cannot determine current OS user: {}", e)))
    }
}

/// Always reports the same user name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedIdentity(pub String);

impl IdentityProvider for FixedIdentity {
    fn current_user(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Connection configuration
///
/// Use `ConnConfig::builder()` for a fluent setup, or
/// [`ConnectionInfo`](crate::client::ConnectionInfo) to start from a connection string.
#[derive(Clone, Default)]
pub struct ConnConfig {
    /// Host name, IP address, or Unix socket directory / socket path
    pub host: String,
    /// Port (0 means the default, 5432)
    pub port: u16,
    /// Database name (empty lets the server default to the user name)
    pub database: String,
    /// User name (empty means the current OS user)
    pub user: String,
    /// Password (optional)
    pub password: Option<String>,
    /// TLS policy; `None` disables encryption
    pub tls: Option<TlsConfig>,
    /// Dial strategy; `None` means [`TcpDialer::default`]
    pub dialer: Option<Arc<dyn Dialer>>,
    /// Run-time parameters sent as session defaults (e.g. `search_path`, `application_name`)
    pub runtime_params: HashMap<String, String>,
}

impl ConnConfig {
    /// Create new configuration for `host` and `database`, leaving everything else to defaults
    pub fn new(host: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            database: database.into(),
            ..Default::default()
        }
    }

    /// Create a builder for advanced configuration
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let config = ConnConfig::builder("localhost", "mydb")
    ///     .user("app")
    ///     .password("secret")
    ///     .runtime_param("application_name", "my_app")
    ///     .build();
    /// ```
    pub fn builder(host: impl Into<String>, database: impl Into<String>) -> ConnConfigBuilder {
        ConnConfigBuilder {
            config: Self::new(host, database),
        }
    }

    /// Resolve the dial target for the configured host and port
    pub fn network_address(&self) -> NetworkAddress {
        NetworkAddress::resolve(&self.host, self.effective_port())
    }

    /// Port with the default applied
    pub fn effective_port(&self) -> u16 {
        if self.port == 0 {
            DEFAULT_PORT
        } else {
            self.port
        }
    }

    /// Fill in the user, port and dialer defaults.
    ///
    /// Fields that are already set are left alone, so calling this twice is harmless.
    pub fn assign_defaults(&mut self, identity: &dyn IdentityProvider) -> Result<()> {
        if self.user.is_empty() {
            self.user = identity.current_user()?;
        }

        if self.port == 0 {
            self.port = DEFAULT_PORT;
        }

        if self.dialer.is_none() {
            self.dialer = Some(Arc::new(TcpDialer::default()));
        }

        Ok(())
    }

    /// Startup parameters: run-time defaults, then `user`, then `database` if set.
    ///
    /// `user` and `database` replace same-named run-time parameters. The order is
    /// sorted by name so the startup frame is deterministic.
    pub fn startup_params(&self) -> Vec<(String, String)> {
        let mut params: std::collections::BTreeMap<String, String> = self
            .runtime_params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        params.insert("user".to_string(), self.user.clone());
        if !self.database.is_empty() {
            params.insert("database".to_string(), self.database.clone());
        }

        params.into_iter().collect()
    }
}

impl fmt::Debug for ConnConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("tls", &self.tls)
            .field("dialer", &self.dialer.as_ref().map(|_| "<dialer>"))
            .field("runtime_params", &self.runtime_params)
            .finish()
    }
}

/// Builder for creating `ConnConfig`
#[derive(Clone)]
pub struct ConnConfigBuilder {
    config: ConnConfig,
}

impl ConnConfigBuilder {
    /// Set the port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the user name
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.config.user = user.into();
        self
    }

    /// Set the password
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    /// Require TLS with the given policy
    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.config.tls = Some(tls);
        self
    }

    /// Replace the default dial strategy
    pub fn dialer(mut self, dialer: impl Dialer + 'static) -> Self {
        self.config.dialer = Some(Arc::new(dialer));
        self
    }

    /// Add a run-time parameter sent in the startup message
    pub fn runtime_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.runtime_params.insert(key.into(), value.into());
        self
    }

    /// Set application name for Postgres logs
    pub fn application_name(self, name: impl Into<String>) -> Self {
        self.runtime_param("application_name", name)
    }

    /// Build the configuration
    pub fn build(self) -> ConnConfig {
        self.config
    }
}
