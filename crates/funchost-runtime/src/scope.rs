//! Per-scope bundle of a controller and its configuration.
//!
//! A test run creates one scope per feature, scenario or fixture and passes
//! it to whatever step code needs to start or inspect functions instances.

use std::sync::Arc;

use funchost_core::{FunctionConfiguration, FunctionsResult, HarnessSettings, InstanceRequest};

use crate::controller::FunctionsController;
use crate::output::ProcessOutput;
use crate::process::ManagedProcess;

/// One controller plus the configuration applied to instances it starts.
#[derive(Debug)]
pub struct FunctionsScope {
    controller: FunctionsController,
    configuration: FunctionConfiguration,
}

impl FunctionsScope {
    pub fn new(settings: HarnessSettings) -> Self {
        Self::with_controller(FunctionsController::new(settings))
    }

    pub fn with_controller(controller: FunctionsController) -> Self {
        Self {
            controller,
            configuration: FunctionConfiguration::new(),
        }
    }

    pub const fn controller(&self) -> &FunctionsController {
        &self.controller
    }

    pub const fn configuration(&self) -> &FunctionConfiguration {
        &self.configuration
    }

    /// Mutable configuration for setup steps that run before `start`.
    pub fn configuration_mut(&mut self) -> &mut FunctionConfiguration {
        &mut self.configuration
    }

    /// Start an instance with this scope's configuration.
    ///
    /// Variables already on the request override the scope's values.
    pub async fn start(&self, request: InstanceRequest) -> FunctionsResult<Arc<ManagedProcess>> {
        let mut configuration = self.configuration.clone();
        if let Some(own) = &request.configuration {
            for (key, value) in own.environment_variables() {
                configuration.set(key.clone(), value.clone());
            }
        }
        self.controller
            .start_instance(request.with_configuration(configuration))
            .await
    }

    pub fn output(&self) -> Vec<Arc<dyn ProcessOutput>> {
        self.controller.get_output()
    }

    pub async fn teardown(&self) -> FunctionsResult<()> {
        self.controller.teardown_all().await
    }
}
