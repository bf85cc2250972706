//! Network address resolution (Unix socket vs TCP)

use crate::protocol::constants::SOCKET_FILE_PREFIX;
use std::fmt;
use std::path::{Path, PathBuf};

/// Canonical dial target derived from a host string and port
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkAddress {
    /// Unix domain socket file
    Unix(PathBuf),
    /// TCP endpoint formatted as `host:port`
    Tcp(String),
}

impl NetworkAddress {
    /// Decide between a Unix socket and a TCP endpoint.
    ///
    /// A host naming an existing filesystem entry is a socket directory (or the
    /// socket file itself if the path already contains `/.s.PGSQL.`). Anything
    /// else, including paths that cannot be inspected, is treated as TCP.
    pub fn resolve(host: &str, port: u16) -> Self {
        if !host.is_empty() && Path::new(host).exists() {
            let marker = format!("/{}", SOCKET_FILE_PREFIX);
            if host.contains(&marker) {
                return NetworkAddress::Unix(PathBuf::from(host));
            }
            return NetworkAddress::Unix(
                Path::new(host).join(format!("{}{}", SOCKET_FILE_PREFIX, port)),
            );
        }

        // IPv6 literals need brackets to stay parseable as host:port
        if host.contains(':') && !host.starts_with('[') {
            NetworkAddress::Tcp(format!("[{}]:{}", host, port))
        } else {
            NetworkAddress::Tcp(format!("{}:{}", host, port))
        }
    }

    /// Network kind: `"unix"` or `"tcp"`
    pub fn network(&self) -> &'static str {
        match self {
            NetworkAddress::Unix(_) => "unix",
            NetworkAddress::Tcp(_) => "tcp",
        }
    }
}

impl fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkAddress::Unix(path) => write!(f, "{}", path.display()),
            NetworkAddress::Tcp(addr) => f.write_str(addr),
        }
    }
}
