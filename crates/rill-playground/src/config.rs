//! Playground configuration.

use rill_engine::EngineSettings;

use crate::controller::ControllerConfig;
use crate::queue::QueueConfig;
use crate::share::ShareConfig;

/// Configuration for one playground instance.
#[derive(Debug, Clone, Default)]
pub struct PlaygroundConfig {
    pub engine: EngineSettings,
    pub queue: QueueConfig,
    pub controller: ControllerConfig,
    pub share: ShareConfig,
}
