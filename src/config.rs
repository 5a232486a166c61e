//! Session engine configuration.
//!
//! Defaults match the protocol constants shared with the peer. A JSON file
//! may override any subset of the fields.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};
use crate::trs_proto;

const MAX_CONNECTIONS: usize = 4;

/// Full engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum simultaneous connections (connection table capacity).
    pub max_connections: usize,
    /// Credits granted to the peer on uplink enable. Also the inbound
    /// queue capacity, so correct accounting can never overflow it.
    pub initial_credit: u16,
    /// Consumed payloads after which credits are returned.
    pub return_threshold: u16,
    /// Payload ceiling until the first MTU update.
    pub default_mtu: u16,
    /// Bytes of write header subtracted from the MTU.
    pub write_overhead: u16,
    /// Start the enable handshake as soon as discovery completes.
    pub auto_enable_on_discovery: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_connections: MAX_CONNECTIONS,
            initial_credit: trs_proto::INITIAL_CREDIT as u16,
            return_threshold: trs_proto::RETURN_THRESHOLD as u16,
            default_mtu: trs_proto::ATT_DEFAULT_MTU,
            write_overhead: trs_proto::ATT_WRITE_HEADER_SIZE,
            auto_enable_on_discovery: true,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document; missing fields keep their defaults.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: EngineConfig = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values that would break the credit protocol.
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(SessionError::InvalidConfig("max_connections must be non-zero".into()));
        }
        if self.initial_credit == 0 || self.initial_credit > u8::MAX as u16 {
            return Err(SessionError::InvalidConfig(format!(
                "initial_credit {} must be in 1..=255",
                self.initial_credit
            )));
        }
        if self.return_threshold == 0 || self.return_threshold > self.initial_credit {
            return Err(SessionError::InvalidConfig(format!(
                "return_threshold {} must be in 1..={}",
                self.return_threshold, self.initial_credit
            )));
        }
        if self.default_mtu <= self.write_overhead {
            return Err(SessionError::InvalidConfig(format!(
                "default_mtu {} leaves no room after {} bytes of write overhead",
                self.default_mtu, self.write_overhead
            )));
        }
        Ok(())
    }
}

/// Load and validate a JSON configuration file.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    let content = fs::read_to_string(path)?;
    EngineConfig::from_json_str(&content)
}
