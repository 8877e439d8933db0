//! Per-invocation context handed to kinds and operations

use std::sync::Arc;

use apppack_core::{DriverConfig, Gateway, ProgressReporter, Questionnaire, Release, StackDriver};
use apppack_directory::Directory;

use crate::settings::Settings;

/// Global options of one CLI invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    pub region: Option<String>,
    /// Account id or alias the caller expects to operate in
    pub account: Option<String>,
    pub release: Release,
    /// Preview through a changeset instead of applying
    pub check: bool,
    pub non_interactive: bool,
    pub aws_credentials: bool,
    pub verbose: bool,
}

/// Everything an operation needs, passed down explicitly
#[derive(Clone)]
pub struct Session {
    pub context: Context,
    pub settings: Settings,
    pub gateway: Gateway,
    pub directory: Directory,
    pub questionnaire: Questionnaire,
    pub reporter: Arc<dyn ProgressReporter>,
}

impl Session {
    pub fn region(&self) -> &str {
        &self.gateway.region
    }

    pub fn driver(&self) -> StackDriver {
        StackDriver::new(
            self.gateway.clone(),
            DriverConfig {
                template_bucket: self.settings.template_bucket.clone(),
                release: self.context.release.clone(),
                poll_interval: self.settings.poll_interval,
            },
            self.reporter.clone(),
        )
    }
}
