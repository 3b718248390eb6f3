//! Serves the composition capability with a [`Compositor`].

use std::sync::Arc;

use async_trait::async_trait;
use shortforge_av::{CompositionRequest, Compositor};
use shortforge_core::{Capability, Payload, ProviderError};

use crate::context::ResolveContext;
use crate::provider::ProviderClient;

/// File name of the composed short inside the run workspace.
pub const OUTPUT_FILE: &str = "short.mp4";

pub struct CompositionProvider {
    name: String,
    compositor: Arc<dyn Compositor>,
}

impl CompositionProvider {
    pub fn new(name: impl Into<String>, compositor: Arc<dyn Compositor>) -> Self {
        Self {
            name: name.into(),
            compositor,
        }
    }
}

#[async_trait]
impl ProviderClient for CompositionProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> Capability {
        Capability::Composition
    }

    async fn invoke(&self, ctx: &ResolveContext) -> Result<Payload, ProviderError> {
        let visual = ctx
            .visual()
            .ok_or_else(|| ProviderError::unavailable("no visual to compose"))?;

        let request = CompositionRequest {
            visual: visual.clone(),
            audio: ctx.audio().cloned(),
            target: ctx.target,
            output: ctx.file(OUTPUT_FILE),
        };

        self.compositor
            .compose(&request)
            .await
            .map(Payload::Media)
            .map_err(|e| ProviderError::composition(e))
    }
}
