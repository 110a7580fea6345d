//! Listener scopes, authentication modes and their fixed ports.
//!
//! Every (scope, auth) combination a node may expose gets its own port, so the
//! old and new listeners of a migration can run side by side:
//!
//! | protocol/mechanism           | client | internal | external | controller |
//! |------------------------------|--------|----------|----------|------------|
//! | SASL_PLAINTEXT/SCRAM-SHA-512 | 9092   | 19092    | 29092    | 9097       |
//! | SASL_SSL/SCRAM-SHA-512       | 9093   | 19093    | 29093    | 9098       |
//! | SSL/SSL                      | 9094   | 19094    | 29094    | 9099       |
//! | SASL_PLAINTEXT/OAUTHBEARER   | 9095   | 19095    | 29095    | -          |
//! | SASL_SSL/OAUTHBEARER         | 9096   | 19096    | 29096    | -          |

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tracing::debug;

use super::error::{ReconcileError, ReconcileResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenerScope {
    /// Clients outside the cluster network.
    Client,
    /// Broker-to-broker replication.
    Internal,
    External,
    /// KRaft controller quorum traffic.
    Controller,
}

impl ListenerScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListenerScope::Client => "CLIENT",
            ListenerScope::Internal => "INTERNAL",
            ListenerScope::External => "EXTERNAL",
            ListenerScope::Controller => "CONTROLLER",
        }
    }

    /// Metric label.
    pub fn as_label(&self) -> &'static str {
        match self {
            ListenerScope::Client => "client",
            ListenerScope::Internal => "internal",
            ListenerScope::External => "external",
            ListenerScope::Controller => "controller",
        }
    }
}

impl fmt::Display for ListenerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecurityProtocol {
    SaslPlaintext,
    SaslSsl,
    Ssl,
}

impl SecurityProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityProtocol::SaslPlaintext => "SASL_PLAINTEXT",
            SecurityProtocol::SaslSsl => "SASL_SSL",
            SecurityProtocol::Ssl => "SSL",
        }
    }
}

impl FromStr for SecurityProtocol {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SASL_PLAINTEXT" => Ok(SecurityProtocol::SaslPlaintext),
            "SASL_SSL" => Ok(SecurityProtocol::SaslSsl),
            "SSL" => Ok(SecurityProtocol::Ssl),
            other => Err(ReconcileError::Config(format!(
                "unknown security protocol '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthMechanism {
    ScramSha512,
    OAuthBearer,
    /// Mutual TLS; only valid with [`SecurityProtocol::Ssl`].
    Ssl,
}

impl AuthMechanism {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMechanism::ScramSha512 => "SCRAM-SHA-512",
            AuthMechanism::OAuthBearer => "OAUTHBEARER",
            AuthMechanism::Ssl => "SSL",
        }
    }
}

impl FromStr for AuthMechanism {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SCRAM-SHA-512" => Ok(AuthMechanism::ScramSha512),
            "OAUTHBEARER" => Ok(AuthMechanism::OAuthBearer),
            "SSL" => Ok(AuthMechanism::Ssl),
            other => Err(ReconcileError::Config(format!(
                "unknown auth mechanism '{}'",
                other
            ))),
        }
    }
}

/// A protocol/mechanism pair, written `PROTOCOL/MECHANISM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthMode {
    pub protocol: SecurityProtocol,
    pub mechanism: AuthMechanism,
}

impl AuthMode {
    pub const fn new(protocol: SecurityProtocol, mechanism: AuthMechanism) -> Self {
        Self {
            protocol,
            mechanism,
        }
    }

    /// Row offset into the port table, or `None` for unsupported pairs.
    fn port_offset(&self) -> Option<u16> {
        use AuthMechanism as M;
        use SecurityProtocol as P;
        match (self.protocol, self.mechanism) {
            (P::SaslPlaintext, M::ScramSha512) => Some(0),
            (P::SaslSsl, M::ScramSha512) => Some(1),
            (P::Ssl, M::Ssl) => Some(2),
            (P::SaslPlaintext, M::OAuthBearer) => Some(3),
            (P::SaslSsl, M::OAuthBearer) => Some(4),
            _ => None,
        }
    }

    /// Fixed port of the listener for `scope` in this mode.
    pub fn port(&self, scope: ListenerScope) -> ReconcileResult<u16> {
        let unsupported = || ReconcileError::UnsupportedListener {
            scope: scope.to_string(),
            auth: self.to_string(),
        };
        let offset = self.port_offset().ok_or_else(unsupported)?;
        match scope {
            ListenerScope::Client => Ok(9092 + offset),
            ListenerScope::Internal => Ok(19092 + offset),
            ListenerScope::External => Ok(29092 + offset),
            // Controllers do not speak OAUTHBEARER.
            ListenerScope::Controller if self.mechanism == AuthMechanism::OAuthBearer => {
                Err(unsupported())
            }
            ListenerScope::Controller => Ok(9097 + offset),
        }
    }

    /// Listener name, e.g. `INTERNAL_SASL_PLAINTEXT_SCRAM_SHA_512`.
    pub fn listener_name(&self, scope: ListenerScope) -> String {
        format!(
            "{}_{}_{}",
            scope.as_str(),
            self.protocol.as_str(),
            self.mechanism.as_str()
        )
        .replace('-', "_")
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.protocol.as_str(), self.mechanism.as_str())
    }
}

impl FromStr for AuthMode {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (protocol, mechanism) = s.split_once('/').ok_or_else(|| {
            ReconcileError::Config(format!("auth mode '{}' is not PROTOCOL/MECHANISM", s))
        })?;
        let mode = AuthMode::new(protocol.parse()?, mechanism.parse()?);
        if mode.port_offset().is_none() {
            return Err(ReconcileError::Config(format!(
                "unsupported auth mode '{}'",
                mode
            )));
        }
        Ok(mode)
    }
}

/// Liveness check for one listener endpoint.
#[async_trait]
pub trait ListenerProbe: Send + Sync {
    async fn is_reachable(&self, host: &str, port: u16, timeout: Duration) -> bool;
}

/// Probes by opening a TCP connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProbe;

#[async_trait]
impl ListenerProbe for TcpProbe {
    async fn is_reachable(&self, host: &str, port: u16, timeout: Duration) -> bool {
        probe_tcp(host, port, timeout).await
    }
}

/// Whether a TCP connection to `host:port` opens within `timeout`.
pub async fn probe_tcp(host: &str, port: u16, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            debug!(host, port, error = %e, "Listener probe refused");
            false
        }
        Err(_) => {
            debug!(host, port, timeout_ms = timeout.as_millis() as u64, "Listener probe timed out");
            false
        }
    }
}
