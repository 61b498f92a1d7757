use serde::Deserialize;
use signalhub_core::error::{HubError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HubConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub limits: LimitsSection,

    #[serde(default)]
    pub compression: CompressionSection,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            server: ServerSection::default(),
            limits: LimitsSection::default(),
            compression: CompressionSection::default(),
        }
    }
}

impl HubConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(HubError::UnsupportedVersion);
        }
        self.server.validate()?;
        self.limits.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Upgrade endpoint path.
    #[serde(default = "default_hub_path")]
    pub hub_path: String,

    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,

    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            hub_path: default_hub_path(),
            ping_interval_ms: default_ping_interval_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        if !self.hub_path.starts_with('/') || self.hub_path == "/" {
            return Err(HubError::BadRequest(
                "server.hub_path must start with '/' and must not be the root".into(),
            ));
        }
        if !(1000..=120000).contains(&self.ping_interval_ms) {
            return Err(HubError::BadRequest(
                "server.ping_interval_ms must be between 1000 and 120000".into(),
            ));
        }
        if !(2000..=600000).contains(&self.idle_timeout_ms) {
            return Err(HubError::BadRequest(
                "server.idle_timeout_ms must be between 2000 and 600000".into(),
            ));
        }
        if self.idle_timeout_ms <= self.ping_interval_ms {
            return Err(HubError::BadRequest(
                "server.idle_timeout_ms must be greater than ping_interval_ms".into(),
            ));
        }
        if !(100..=60000).contains(&self.handshake_timeout_ms) {
            return Err(HubError::BadRequest(
                "server.handshake_timeout_ms must be between 100 and 60000".into(),
            ));
        }
        Ok(())
    }
}

/// What to do when a recipient's outbound queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Discard the oldest queued frame to make room.
    #[default]
    DropOldest,
    /// Close the slow connection.
    Disconnect,
}

impl OverflowPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            OverflowPolicy::DropOldest => "drop_oldest",
            OverflowPolicy::Disconnect => "disconnect",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsSection {
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,

    #[serde(default)]
    pub overflow_policy: OverflowPolicy,

    /// Inbound messages per second per connection (0 disables the limiter).
    #[serde(default = "default_rate_limit_rps")]
    pub rate_limit_rps: u32,

    #[serde(default = "default_rate_limit_burst")]
    pub rate_limit_burst: u32,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            max_frame_bytes: default_max_frame_bytes(),
            outbound_queue_capacity: default_outbound_queue_capacity(),
            overflow_policy: OverflowPolicy::default(),
            rate_limit_rps: default_rate_limit_rps(),
            rate_limit_burst: default_rate_limit_burst(),
        }
    }
}

impl LimitsSection {
    pub fn validate(&self) -> Result<()> {
        if !(64..=16 * 1024 * 1024).contains(&self.max_frame_bytes) {
            return Err(HubError::BadRequest(
                "limits.max_frame_bytes must be between 64 and 16777216".into(),
            ));
        }
        if !(1..=65536).contains(&self.outbound_queue_capacity) {
            return Err(HubError::BadRequest(
                "limits.outbound_queue_capacity must be between 1 and 65536".into(),
            ));
        }
        if self.rate_limit_rps > 0 && self.rate_limit_burst == 0 {
            return Err(HubError::BadRequest(
                "limits.rate_limit_burst must be > 0 when rate limiting is enabled".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct CompressionSection {
    /// MIME types compressed in addition to the built-in list.
    #[serde(default)]
    pub extra_mime_types: Vec<String>,
}

fn default_version() -> u32 {
    1
}
fn default_listen() -> String {
    "0.0.0.0:5000".into()
}
fn default_hub_path() -> String {
    "/chathub".into()
}
fn default_ping_interval_ms() -> u64 {
    15000
}
fn default_idle_timeout_ms() -> u64 {
    30000
}
fn default_handshake_timeout_ms() -> u64 {
    15000
}
fn default_max_frame_bytes() -> usize {
    32 * 1024
}
fn default_outbound_queue_capacity() -> usize {
    256
}
fn default_rate_limit_rps() -> u32 {
    50
}
fn default_rate_limit_burst() -> u32 {
    100
}
