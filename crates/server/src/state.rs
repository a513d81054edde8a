use std::sync::Arc;

use contentgate_core::{Config, ConsumerLifecycle, SanitizedConfig, SubmissionService};

/// Shared application state
pub struct AppState {
    config: Config,
    submissions: SubmissionService,
    lifecycle: Arc<ConsumerLifecycle>,
}

impl AppState {
    pub fn new(
        config: Config,
        submissions: SubmissionService,
        lifecycle: Arc<ConsumerLifecycle>,
    ) -> Self {
        Self {
            config,
            submissions,
            lifecycle,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn submissions(&self) -> &SubmissionService {
        &self.submissions
    }

    pub fn lifecycle(&self) -> &ConsumerLifecycle {
        self.lifecycle.as_ref()
    }
}
