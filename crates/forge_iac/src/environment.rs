//! The two-tier environment: database stack first, service stack second.

use forge_core::{App, AttributeTable, CloudAssembly, Manifest, SynthResult};
use tracing::info;

use crate::config::EnvironmentConfig;
use crate::database::DatabaseStack;
use crate::error::IacResult;
use crate::service::{DatabaseLink, ServiceStack};

/// A synthesized environment.
#[derive(Debug)]
pub struct Environment {
    app: App,
}

impl Environment {
    /// Declare, synthesize and publish both stacks.
    pub fn synthesize(config: &EnvironmentConfig, attributes: AttributeTable) -> IacResult<Self> {
        config.validate()?;

        let mut app = App::new().with_attributes(attributes);

        app.stack(&config.database_stack_name, |stack, _| DatabaseStack::new(config).declare(stack))?;

        app.stack(&config.service_stack_name, |stack, bridge| -> SynthResult<_> {
            let link = DatabaseLink::import(stack, bridge, &config.database_stack_name)?;
            ServiceStack::new(config, &link).declare(stack)
        })?;

        info!("Synthesized {} stack(s)", app.len());
        Ok(Self { app })
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    /// Manifests in deployment order.
    pub fn manifests(&self) -> impl Iterator<Item = &Manifest> {
        self.app.manifests()
    }

    pub fn manifest(&self, stack: &str) -> Option<&Manifest> {
        self.app.manifest(stack)
    }

    pub fn assembly(&self) -> CloudAssembly {
        self.app.assembly()
    }
}
