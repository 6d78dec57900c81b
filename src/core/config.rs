//! Engine configuration.

use std::net::SocketAddr;
use std::time::Duration;

use super::constants::{
    DEFAULT_KEEPALIVE_INTERVAL, DEFAULT_LISTEN_PORT, DEFAULT_MAX_FRAME_LENGTH,
    DEFAULT_SETUP_QUEUE_LIMIT,
};
use super::types::ProtocolVersion;

/// Configuration consumed by the engine.
///
/// Loading this from a file or CLI is the enclosing application's concern;
/// the engine only consumes the finished struct.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Address the switch listener binds to.
    pub listen_addr: SocketAddr,

    /// Protocol versions offered during hello negotiation.
    pub supported_versions: Vec<ProtocolVersion>,

    /// Period of the keepalive / polling scheduler.
    pub keepalive_interval: Duration,

    /// Send periodic echo requests on established connections.
    pub send_echo_requests: bool,

    /// Send periodic flow-stats refresh requests on established connections.
    pub poll_flow_stats: bool,

    /// Send a set-config message at the end of the handshake.
    pub send_set_config: bool,

    /// Follow every echo reply the engine sends with a features request
    /// (compatibility knob for legacy switches, normally off).
    pub send_features_request_on_echo: bool,

    /// Largest frame length accepted from a peer.
    pub max_frame_length: u16,

    /// Cap on frames deferred while waiting for the features reply.
    pub setup_queue_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_LISTEN_PORT)),
            supported_versions: vec![ProtocolVersion::OF10, ProtocolVersion::OF13],
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            send_echo_requests: true,
            poll_flow_stats: true,
            send_set_config: true,
            send_features_request_on_echo: false,
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            setup_queue_limit: DEFAULT_SETUP_QUEUE_LIMIT,
        }
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the listener address.
    pub fn listen_addr(mut self, addr: SocketAddr) -> Self {
        self.config.listen_addr = addr;
        self
    }

    /// Set the offered protocol versions.
    pub fn supported_versions(mut self, versions: Vec<ProtocolVersion>) -> Self {
        self.config.supported_versions = versions;
        self
    }

    /// Set the keepalive / polling period.
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.config.keepalive_interval = interval;
        self
    }

    /// Enable or disable periodic echo requests.
    pub fn echo_requests(mut self, enabled: bool) -> Self {
        self.config.send_echo_requests = enabled;
        self
    }

    /// Enable or disable periodic flow-stats polling.
    pub fn flow_stats_polling(mut self, enabled: bool) -> Self {
        self.config.poll_flow_stats = enabled;
        self
    }

    /// Enable or disable the post-handshake set-config message.
    pub fn set_config(mut self, enabled: bool) -> Self {
        self.config.send_set_config = enabled;
        self
    }

    /// Enable or disable the features-request-after-echo-reply knob.
    pub fn features_request_on_echo(mut self, enabled: bool) -> Self {
        self.config.send_features_request_on_echo = enabled;
        self
    }

    /// Set the largest frame length accepted from a peer.
    pub fn max_frame_length(mut self, max: u16) -> Self {
        self.config.max_frame_length = max;
        self
    }

    /// Set the handshake deferral queue cap.
    pub fn setup_queue_limit(mut self, limit: usize) -> Self {
        self.config.setup_queue_limit = limit;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> EngineConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(
            config.supported_versions,
            vec![ProtocolVersion::OF10, ProtocolVersion::OF13]
        );
        assert!(config.send_echo_requests);
        assert!(config.send_set_config);
        assert!(!config.send_features_request_on_echo);
    }

    #[test]
    fn test_builder() {
        let config = EngineConfigBuilder::new()
            .supported_versions(vec![ProtocolVersion::OF13])
            .echo_requests(false)
            .setup_queue_limit(8)
            .build();
        assert_eq!(config.supported_versions, vec![ProtocolVersion::OF13]);
        assert!(!config.send_echo_requests);
        assert_eq!(config.setup_queue_limit, 8);
    }
}
