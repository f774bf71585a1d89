//! Configuration for the topology engine

use std::time::Duration;

/// Configuration for [`Engine`](crate::Engine)
#[derive(Debug, Clone)]
pub struct TopologyConfig {
    /// Number of reusable jobs; producers block once all are in flight
    /// Default: 20
    pub max_job_count: usize,

    /// Name given to the dispatch thread
    /// Default: "ohtopology-dispatch"
    pub dispatch_thread_name: String,

    /// Wrap the device list in a `ModeratedDeviceList`
    /// Default: true
    pub moderate_refresh: bool,

    /// Quiet period after a refresh before held removals are delivered
    /// Default: 180 seconds
    pub refresh_moderation: Duration,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            max_job_count: 20,
            dispatch_thread_name: "ohtopology-dispatch".to_string(),
            moderate_refresh: true,
            refresh_moderation: Duration::from_secs(3 * 60),
        }
    }
}

impl TopologyConfig {
    /// Create a new TopologyConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Short moderation window for interactive tools
    pub fn low_latency() -> Self {
        Self {
            refresh_moderation: Duration::from_secs(10),
            ..Default::default()
        }
    }

    /// Small job pool for memory constrained hosts
    pub fn constrained() -> Self {
        Self {
            max_job_count: 4,
            ..Default::default()
        }
    }

    pub fn with_max_job_count(mut self, count: usize) -> Self {
        self.max_job_count = count;
        self
    }

    pub fn with_dispatch_thread_name(mut self, name: impl Into<String>) -> Self {
        self.dispatch_thread_name = name.into();
        self
    }

    pub fn with_refresh_moderation(mut self, window: Duration) -> Self {
        self.refresh_moderation = window;
        self
    }

    pub fn with_moderated_refresh(mut self, enabled: bool) -> Self {
        self.moderate_refresh = enabled;
        self
    }

    /// Job pool size actually used; never zero.
    pub fn job_capacity(&self) -> usize {
        self.max_job_count.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TopologyConfig::default();
        assert_eq!(config.max_job_count, 20);
        assert_eq!(config.refresh_moderation, Duration::from_secs(180));
        assert!(config.moderate_refresh);
    }

    #[test]
    fn test_presets_and_builders() {
        assert_eq!(TopologyConfig::constrained().max_job_count, 4);
        assert_eq!(
            TopologyConfig::low_latency().refresh_moderation,
            Duration::from_secs(10)
        );

        let config = TopologyConfig::new()
            .with_max_job_count(0)
            .with_dispatch_thread_name("dispatch-test")
            .with_moderated_refresh(false);
        assert_eq!(config.job_capacity(), 1);
        assert_eq!(config.dispatch_thread_name, "dispatch-test");
        assert!(!config.moderate_refresh);
    }
}
