use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{RestJobError, Result};
use crate::scheduler::Job;
use crate::worker::{ExecutionHandle, HandleFactory};

/// Routes each job to the factory registered for its provider.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: HashMap<String, Arc<dyn HandleFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        provider: impl Into<String>,
        factory: Arc<dyn HandleFactory>,
    ) -> &mut Self {
        let provider = provider.into();
        tracing::info!(provider = %provider, "Provider registered");
        self.factories.insert(provider, factory);
        self
    }

    pub fn providers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl HandleFactory for ProviderRegistry {
    fn create(&self, job: Job) -> Result<Arc<dyn ExecutionHandle>> {
        let factory = self
            .factories
            .get(&job.provider)
            .ok_or_else(|| RestJobError::UnknownProvider(job.provider.clone()))?;
        factory.create(job)
    }
}
