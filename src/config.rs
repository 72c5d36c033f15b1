//! Application configuration
//!
//! Defaults mirror the classic voice-call setup: 16 kHz mono, 320-frame
//! blocks (20 ms), a 50 ms receive timeout, relay on port 9000. Values
//! can come from a TOML file in the platform config directory or an
//! explicit path, with CLI flags overriding both.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    DEFAULT_FRAMES_PER_BUFFER, DEFAULT_RECV_TIMEOUT_MS, DEFAULT_SAMPLE_RATE, DEFAULT_UDP_PORT,
};
use crate::error::Error;

/// Top-level configuration for both binaries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub call: CallConfig,
    pub relay: RelayConfig,
}

/// Caller-side configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// Peer or relay address as host:port
    pub server: String,
    pub sample_rate: u32,
    /// Frames exchanged per device call and per datagram
    pub frames_per_buffer: usize,
    /// How long the downlink waits for a datagram before substituting silence
    pub recv_timeout_ms: u64,
    /// Device id as printed by `caller list`; default input when unset
    pub input_device: Option<String>,
    /// Device id as printed by `caller list`; default output when unset
    pub output_device: Option<String>,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            server: format!("127.0.0.1:{}", DEFAULT_UDP_PORT),
            sample_rate: DEFAULT_SAMPLE_RATE,
            frames_per_buffer: DEFAULT_FRAMES_PER_BUFFER,
            recv_timeout_ms: DEFAULT_RECV_TIMEOUT_MS,
            input_device: None,
            output_device: None,
        }
    }
}

impl CallConfig {
    /// Real-time duration of one block at the configured rate.
    pub fn block_duration(&self) -> Duration {
        Duration::from_micros(
            (self.frames_per_buffer as u64).saturating_mul(1_000_000) / self.sample_rate.max(1) as u64,
        )
    }

    /// Validate before any device or socket is opened.
    ///
    /// The receive timeout must cover at least one block's real-time
    /// duration; a shorter timeout would make the downlink substitute
    /// silence faster than the peer can produce audio.
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".to_string());
        }
        if self.frames_per_buffer == 0 {
            return Err("frames per buffer must be positive".to_string());
        }
        if self.recv_timeout_ms == 0 {
            return Err("receive timeout must be positive".to_string());
        }
        let block = self.block_duration();
        let timeout = Duration::from_millis(self.recv_timeout_ms);
        if timeout < block {
            return Err(format!(
                "receive timeout {}ms is shorter than one {}ms audio block",
                self.recv_timeout_ms,
                block.as_millis()
            ));
        }
        Ok(())
    }
}

/// Relay server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// UDP listen address as host:port
    pub listen: String,
    /// OS receive buffer size in bytes, 0 keeps the OS default
    pub read_buffer_bytes: usize,
    /// Largest datagram the relay will read and forward
    pub max_packet_size: usize,
    /// Internal packet queue capacity
    pub queue_size: usize,
    /// Read timeout used to poll the stop flag
    pub read_timeout_ms: u64,
    /// Remove callers idle longer than this, 0 disables pruning
    pub client_ttl_secs: u64,
    /// How often idle callers are pruned
    pub cleanup_interval_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen: format!("0.0.0.0:{}", DEFAULT_UDP_PORT),
            read_buffer_bytes: 0,
            max_packet_size: 4096,
            queue_size: 1024,
            read_timeout_ms: 200,
            client_ttl_secs: 30,
            cleanup_interval_secs: 5,
        }
    }
}

impl RelayConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn client_ttl(&self) -> Option<Duration> {
        (self.client_ttl_secs > 0).then(|| Duration::from_secs(self.client_ttl_secs))
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.listen.is_empty() {
            return Err("listen address required".to_string());
        }
        if self.max_packet_size == 0 {
            return Err("max packet size must be positive".to_string());
        }
        if self.queue_size == 0 {
            return Err("queue size must be positive".to_string());
        }
        if self.read_timeout_ms == 0 {
            return Err("read timeout must be positive".to_string());
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load from an explicit path, or from the platform config directory
    /// when present, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let text = fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&text)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Platform config file location, e.g. `~/.config/lan-voice-caller/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "lan-voice-caller")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = AppConfig::default();
        config.call.validate().unwrap();
        config.relay.validate().unwrap();
    }

    #[test]
    fn default_block_duration_is_20ms() {
        let call = CallConfig::default();
        assert_eq!(call.block_duration(), Duration::from_millis(20));
    }

    #[test]
    fn rejects_zero_values() {
        let mut call = CallConfig::default();
        call.frames_per_buffer = 0;
        assert!(call.validate().is_err());

        let mut call = CallConfig::default();
        call.sample_rate = 0;
        assert!(call.validate().is_err());

        let mut relay = RelayConfig::default();
        relay.queue_size = 0;
        assert!(relay.validate().is_err());
    }

    #[test]
    fn rejects_timeout_shorter_than_one_block() {
        let mut call = CallConfig::default();
        // 320 frames at 16kHz is a 20ms block
        call.recv_timeout_ms = 10;
        assert!(call.validate().is_err());

        call.recv_timeout_ms = 20;
        call.validate().unwrap();
    }

    #[test]
    fn parses_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [call]
            server = "10.0.0.2:9100"
            frames_per_buffer = 160

            [relay]
            queue_size = 64
            "#,
        )
        .unwrap();

        assert_eq!(config.call.server, "10.0.0.2:9100");
        assert_eq!(config.call.frames_per_buffer, 160);
        assert_eq!(config.call.sample_rate, 16_000);
        assert_eq!(config.relay.queue_size, 64);
        assert_eq!(config.relay.max_packet_size, 4096);
    }
}
