// Tue Jan 13 2026 - Alex

use crate::engine::queue::DEFAULT_CAPACITY;
use crate::engine::reorder::DEFAULT_SLACK;
use crate::error::FlowError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    pub verbose: bool,
    pub keep_order: bool,
    pub offset: usize,
    pub head_count: Option<usize>,
    pub queue_capacity: usize,
    pub reorder_slack: usize,
    pub progress_step: usize,
    pub poll_interval_ms: u64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            keep_order: false,
            offset: 0,
            head_count: None,
            queue_capacity: DEFAULT_CAPACITY,
            reorder_slack: DEFAULT_SLACK,
            progress_step: 20,
            poll_interval_ms: 20,
        }
    }
}

impl FlowConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(path: &Path) -> Result<Self, FlowError> {
        let content = fs::read_to_string(path)?;
        let config: FlowConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_keep_order(mut self, keep_order: bool) -> Self {
        self.keep_order = keep_order;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_head_count(mut self, head_count: Option<usize>) -> Self {
        self.head_count = head_count;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_reorder_slack(mut self, slack: usize) -> Self {
        self.reorder_slack = slack;
        self
    }

    pub fn with_progress_step(mut self, step: usize) -> Self {
        self.progress_step = step;
        self
    }

    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), FlowError> {
        if self.queue_capacity == 0 {
            return Err(FlowError::Config("queue_capacity must be greater than 0".to_string()));
        }
        if self.progress_step == 0 {
            return Err(FlowError::Config("progress_step must be greater than 0".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(FlowError::Config("poll_interval_ms must be greater than 0".to_string()));
        }
        Ok(())
    }
}
