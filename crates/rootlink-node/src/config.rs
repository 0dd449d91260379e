// ============================================
// File: crates/rootlink-node/src/config.rs
// ============================================
//! # Node Configuration
//!
//! ## Creation Reason
//! Provides configuration management for a rootlink node, loaded from a
//! TOML file and validated before any socket is opened.
//!
//! ## Main Functionality
//! - `NodeConfig`: Main configuration structure
//! - TOML file loading and parsing
//! - Configuration validation
//! - Conversion to the core `ProtocolSettings`
//!
//! ## Configuration Sections
//! - `network`: listen address (host) and connect address (guest)
//! - `protocol`: version, path length, framing step lengths, timeouts, charset
//! - `identity`: end-point certificate, private key and chain files
//! - `trust`: pinned anchor and cadastre store
//! - `limits`: byte rate limiting
//! - `logging`: Log level
//!
//! ## Example Configuration
//! ```toml
//! [network]
//! listen_addr = "0.0.0.0:7420"
//! connect_addr = "127.0.0.1:7420"
//!
//! [protocol]
//! path_length = 4
//! step_length = 4096
//! max_step_length = 65536
//!
//! [identity]
//! certificate = "/etc/rootlink/endpoint.der"
//! private_key = "/etc/rootlink/endpoint.key.pem"
//! chain = ["/etc/rootlink/regional.der", "/etc/rootlink/root-link.der", "/etc/rootlink/root.der"]
//!
//! [trust]
//! anchor = "/etc/rootlink/root.der"
//! store = "/var/lib/rootlink/cadastre.json"
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Both end-points must agree on `protocol` out of band
//! - `identity.chain` holds exactly `path_length - 1` files, regional first
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration implementation

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use rootlink_common::Charset;
use rootlink_core::protocol::{
    ProtocolSettings, ProtocolVersion, BLOCK_PAYLOAD, CONTROL_STEP, DEFAULT_PATH_LENGTH,
};

use crate::error::{NodeError, Result};

// ============================================
// NodeConfig
// ============================================

/// Main node configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Network configuration.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Protocol tunables.
    #[serde(default)]
    pub protocol: ProtocolConfig,

    /// End-point identity files.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Trust anchor and cadastre store.
    #[serde(default)]
    pub trust: TrustConfig,

    /// Rate limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NodeConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns error if file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        info!("Loading configuration from: {}", path_str);

        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::config_load(&path_str, e.to_string()))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| NodeError::config_load(&path_str, e.to_string()))?;

        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Loads configuration from a string (useful for testing).
    ///
    /// # Errors
    /// Returns error if the text cannot be parsed or validated.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| NodeError::config_load("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// `ConfigInvalid` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        self.network.validate()?;
        self.protocol.validate()?;
        self.identity.validate(self.protocol.path_length)?;
        self.limits.validate()?;
        Ok(())
    }

    /// Serializes configuration to TOML string.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Builds the core protocol settings.
    #[must_use]
    pub fn protocol_settings(&self) -> ProtocolSettings {
        self.protocol.settings()
    }
}

// ============================================
// NetworkConfig
// ============================================

/// Network configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Address the host role listens on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Address the guest role connects to.
    #[serde(default = "default_connect_addr")]
    pub connect_addr: String,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 7420))
}

fn default_connect_addr() -> String {
    "127.0.0.1:7420".to_string()
}

impl NetworkConfig {
    fn validate(&self) -> Result<()> {
        if self.listen_addr.port() == 0 {
            return Err(NodeError::config_invalid(
                "network.listen_addr",
                "port cannot be 0",
            ));
        }
        if self.connect_addr.trim().is_empty() {
            return Err(NodeError::config_invalid(
                "network.connect_addr",
                "cannot be empty",
            ));
        }
        Ok(())
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            connect_addr: default_connect_addr(),
        }
    }
}

// ============================================
// ProtocolConfig
// ============================================

/// Protocol configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Protocol version byte.
    #[serde(default = "default_version")]
    pub version: u8,

    /// Certificates in a complete chain, end-point included.
    #[serde(default = "default_path_length")]
    pub path_length: usize,

    /// Bytes between framing checkpoints.
    #[serde(default = "default_step_length")]
    pub step_length: usize,

    /// Unverified bytes a reader accepts before faulting.
    #[serde(default = "default_max_step_length")]
    pub max_step_length: usize,

    /// Handshake read timeout in milliseconds (0 = infinite).
    #[serde(default = "default_initiation_timeout_ms")]
    pub initiation_timeout_ms: u64,

    /// Session read timeout in milliseconds (0 = infinite).
    #[serde(default)]
    pub io_timeout_ms: u64,

    /// Charset proposed by the guest.
    #[serde(default)]
    pub charset: Charset,
}

fn default_version() -> u8 {
    ProtocolVersion::current().as_u8()
}

fn default_path_length() -> usize {
    DEFAULT_PATH_LENGTH
}

fn default_step_length() -> usize {
    4096
}

fn default_max_step_length() -> usize {
    64 * 1024
}

fn default_initiation_timeout_ms() -> u64 {
    10_000
}

impl ProtocolConfig {
    fn validate(&self) -> Result<()> {
        if self.path_length < 2 {
            return Err(NodeError::config_invalid(
                "protocol.path_length",
                "must be at least 2 (end-point and anchor)",
            ));
        }
        if self.step_length < CONTROL_STEP {
            return Err(NodeError::config_invalid(
                "protocol.step_length",
                format!("must be at least {CONTROL_STEP}"),
            ));
        }
        if self.max_step_length < self.step_length + BLOCK_PAYLOAD {
            return Err(NodeError::config_invalid(
                "protocol.max_step_length",
                format!("must be at least step_length + {BLOCK_PAYLOAD}"),
            ));
        }
        Ok(())
    }

    fn settings(&self) -> ProtocolSettings {
        ProtocolSettings {
            version: ProtocolVersion::new(self.version),
            path_length: self.path_length,
            step_length: self.step_length,
            max_step_length: self.max_step_length,
            initiation_timeout: ProtocolSettings::timeout_from_millis(self.initiation_timeout_ms),
            io_timeout: ProtocolSettings::timeout_from_millis(self.io_timeout_ms),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            path_length: default_path_length(),
            step_length: default_step_length(),
            max_step_length: default_max_step_length(),
            initiation_timeout_ms: default_initiation_timeout_ms(),
            io_timeout_ms: 0,
            charset: Charset::default(),
        }
    }
}

// ============================================
// IdentityConfig
// ============================================

/// End-point identity section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// DER certificate of this end-point.
    #[serde(default = "default_certificate")]
    pub certificate: PathBuf,

    /// PKCS#8 PEM private key matching the certificate.
    #[serde(default = "default_private_key")]
    pub private_key: PathBuf,

    /// Issuer certificates, regional first, anchor last.
    #[serde(default = "default_chain")]
    pub chain: Vec<PathBuf>,
}

fn default_certificate() -> PathBuf {
    PathBuf::from("/etc/rootlink/endpoint.der")
}

fn default_private_key() -> PathBuf {
    PathBuf::from("/etc/rootlink/endpoint.key.pem")
}

fn default_chain() -> Vec<PathBuf> {
    ["regional.der", "root-link.der", "root.der"]
        .iter()
        .map(|name| Path::new("/etc/rootlink").join(name))
        .collect()
}

impl IdentityConfig {
    fn validate(&self, path_length: usize) -> Result<()> {
        if self.chain.len() + 1 != path_length {
            return Err(NodeError::config_invalid(
                "identity.chain",
                format!(
                    "expected {} issuer certificates for path_length {path_length}, got {}",
                    path_length.saturating_sub(1),
                    self.chain.len()
                ),
            ));
        }
        Ok(())
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            certificate: default_certificate(),
            private_key: default_private_key(),
            chain: default_chain(),
        }
    }
}

// ============================================
// TrustConfig
// ============================================

/// Trust section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustConfig {
    /// Pinned self-signed anchor certificate (DER).
    #[serde(default = "default_anchor")]
    pub anchor: PathBuf,

    /// JSON cadastre store; omitted keeps trust in memory only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<PathBuf>,
}

fn default_anchor() -> PathBuf {
    PathBuf::from("/etc/rootlink/root.der")
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            anchor: default_anchor(),
            store: None,
        }
    }
}

// ============================================
// LimitsConfig
// ============================================

/// Rate limiting section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Bytes per second per connection (0 = unlimited).
    #[serde(default)]
    pub bytes_per_sec: u64,

    /// Largest burst in bytes.
    #[serde(default = "default_burst_bytes")]
    pub burst_bytes: u64,
}

fn default_burst_bytes() -> u64 {
    64 * 1024
}

impl LimitsConfig {
    fn validate(&self) -> Result<()> {
        if self.bytes_per_sec > 0 && self.burst_bytes == 0 {
            return Err(NodeError::config_invalid(
                "limits.burst_bytes",
                "must be greater than 0 when bytes_per_sec is set",
            ));
        }
        Ok(())
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            bytes_per_sec: 0,
            burst_bytes: default_burst_bytes(),
        }
    }
}

// ============================================
// LoggingConfig
// ============================================

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.trust.store.is_none());
        assert_eq!(config.protocol_settings(), ProtocolSettings::default());
    }

    #[test]
    fn test_full_config_format() {
        let toml = r#"
            [network]
            listen_addr = "0.0.0.0:9000"
            connect_addr = "peer.example:9000"

            [protocol]
            version = 1
            path_length = 3
            step_length = 1024
            max_step_length = 8192
            initiation_timeout_ms = 500
            io_timeout_ms = 0
            charset = "utf-16le"

            [identity]
            certificate = "node.der"
            private_key = "node.key.pem"
            chain = ["regional.der", "root.der"]

            [trust]
            anchor = "root.der"
            store = "cadastre.json"

            [limits]
            bytes_per_sec = 1000000
            burst_bytes = 4096

            [logging]
            level = "debug"
        "#;

        let config = NodeConfig::from_str(toml).unwrap();
        assert_eq!(config.network.listen_addr.port(), 9000);
        assert_eq!(config.protocol.charset, Charset::Utf16Le);
        assert_eq!(config.identity.chain.len(), 2);
        assert_eq!(config.trust.store, Some(PathBuf::from("cadastre.json")));

        let settings = config.protocol_settings();
        assert_eq!(settings.path_length, 3);
        assert_eq!(settings.initiation_timeout, Some(Duration::from_millis(500)));
        assert_eq!(settings.io_timeout, None);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_shipped_config_is_valid() {
        let config = NodeConfig::from_str(include_str!("../config/rootlink.toml")).unwrap();
        assert_eq!(config.protocol_settings(), ProtocolSettings::default());
        assert!(config.trust.store.is_some());
    }

    #[test]
    fn test_chain_must_match_path_length() {
        let toml = r#"
            [protocol]
            path_length = 4

            [identity]
            chain = ["regional.der", "root.der"]
        "#;
        let err = NodeConfig::from_str(toml).unwrap_err();
        assert!(matches!(err, NodeError::ConfigInvalid { ref field, .. } if field == "identity.chain"));
    }

    #[test]
    fn test_reader_bound_below_step_rejected() {
        let toml = r#"
            [protocol]
            step_length = 4096
            max_step_length = 4100
        "#;
        assert!(NodeConfig::from_str(toml).unwrap_err().is_config_error());
    }

    #[test]
    fn test_unknown_charset_rejected() {
        let toml = r#"
            [protocol]
            charset = "latin-1"
        "#;
        assert!(matches!(
            NodeConfig::from_str(toml),
            Err(NodeError::ConfigLoad { .. })
        ));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = NodeConfig::default();
        let reparsed = NodeConfig::from_str(&config.to_toml()).unwrap();
        assert_eq!(reparsed.protocol.step_length, config.protocol.step_length);
        assert_eq!(reparsed.identity.chain, config.identity.chain);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

        let config = NodeConfig::load(&path).unwrap();
        assert_eq!(config.logging.level, "debug");

        let missing = NodeConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(missing, NodeError::ConfigLoad { .. }));
        assert!(missing.is_fatal());
    }
}
