//! Metrics emitted during connection establishment
//!
//! Thin wrappers over the `metrics` facade. Nothing is recorded unless the
//! application installs a recorder.

/// Label values shared by the counters below
pub mod labels {
    /// Handshake reached ReadyForQuery
    pub const OUTCOME_SUCCESS: &str = "success";
    /// Handshake aborted
    pub const OUTCOME_FAILURE: &str = "failure";

    /// No authentication requested yet (trust)
    pub const MECHANISM_NONE: &str = "none";
    /// Cleartext password
    pub const MECHANISM_CLEARTEXT: &str = "cleartext";
    /// MD5 password digest
    pub const MECHANISM_MD5: &str = "md5";
    /// SCRAM-SHA-256
    pub const MECHANISM_SCRAM: &str = "scram-sha-256";

    /// Server accepted the SSLRequest
    pub const TLS_ACCEPTED: &str = "accepted";
    /// Server answered something other than 'S'
    pub const TLS_REFUSED: &str = "refused";
}

/// Counter helpers
pub mod counters {
    use metrics::counter;

    /// A handshake finished with the given outcome
    pub fn handshake_completed(outcome: &'static str) {
        counter!("pgconn_handshake_total", "outcome" => outcome).increment(1);
    }

    /// The server requested authentication with `mechanism`
    pub fn auth_attempted(mechanism: &'static str) {
        counter!("pgconn_auth_attempts_total", "mechanism" => mechanism).increment(1);
    }

    /// Authentication with `mechanism` failed
    pub fn auth_failed(mechanism: &'static str, reason: &'static str) {
        counter!(
            "pgconn_auth_failures_total",
            "mechanism" => mechanism,
            "reason" => reason
        )
        .increment(1);
    }

    /// The server answered an SSLRequest
    pub fn tls_negotiated(result: &'static str) {
        counter!("pgconn_tls_negotiations_total", "result" => result).increment(1);
    }
}

/// Histogram helpers
pub mod histograms {
    use metrics::histogram;

    /// Wall-clock duration of a handshake on an open stream, from the first
    /// byte sent to ReadyForQuery or the failure
    pub fn handshake_duration(duration_ms: u64) {
        histogram!("pgconn_handshake_duration_ms").record(duration_ms as f64);
    }
}
