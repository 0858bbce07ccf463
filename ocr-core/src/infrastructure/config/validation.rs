use crate::infrastructure::config::types::NodeConfig;

const MAX_INBOX_CAPACITY: usize = 1 << 20;

impl NodeConfig {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.node.data_dir.trim().is_empty() {
            errors.push("node.data_dir must not be empty".to_string());
        }

        if self.timeouts.data_source_timeout_ms == 0 {
            errors.push("timeouts.data_source_timeout_ms must be > 0".to_string());
        }
        if self.timeouts.chain_timeout_ms == 0 {
            errors.push("timeouts.chain_timeout_ms must be > 0".to_string());
        }

        if self.config_sync.poll_interval_ms == 0 {
            errors.push("config_sync.poll_interval_ms must be > 0".to_string());
        }
        if self.config_sync.subscribe_interval_ms == 0 {
            errors.push("config_sync.subscribe_interval_ms must be > 0".to_string());
        }

        if let Err(err) = self.transmission.retry.validate() {
            errors.push(format!("transmission.{err}"));
        }
        if self.transmission.poll_interval_ms == 0 {
            errors.push("transmission.poll_interval_ms must be > 0".to_string());
        }
        if self.transmission.confirm_timeout_ms < self.transmission.poll_interval_ms {
            errors.push("transmission.confirm_timeout_ms must be >= transmission.poll_interval_ms".to_string());
        }
        if self.transmission.pending_retention_secs == 0 {
            errors.push("transmission.pending_retention_secs must be > 0".to_string());
        }
        if self.transmission.gc_interval_secs == 0 {
            errors.push("transmission.gc_interval_secs must be > 0".to_string());
        }

        if self.transport.inbox_capacity == 0 || self.transport.inbox_capacity > MAX_INBOX_CAPACITY {
            errors.push(format!("transport.inbox_capacity must be in 1..={MAX_INBOX_CAPACITY}"));
        }
        if self.logging.level.trim().is_empty() {
            errors.push("logging.level must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
