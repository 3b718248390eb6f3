//! Stub providers shared by the unit tests of this crate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use shortforge_core::{Capability, Payload, ProviderError};

use crate::context::ResolveContext;
use crate::provider::ProviderClient;

type Respond = Box<dyn Fn(&ResolveContext) -> Result<Payload, ProviderError> + Send + Sync>;

pub struct StubProvider {
    name: String,
    capability: Capability,
    terminal: bool,
    delay: Option<Duration>,
    respond: Respond,
    calls: AtomicUsize,
}

impl StubProvider {
    pub fn new(
        name: &str,
        capability: Capability,
        respond: impl Fn(&ResolveContext) -> Result<Payload, ProviderError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            capability,
            terminal: false,
            delay: None,
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn text(name: &str, text: &str) -> Self {
        let text = text.to_string();
        Self::new(name, Capability::Prompt, move |_| Ok(Payload::text(text.clone())))
    }

    pub fn failing(name: &str, capability: Capability) -> Self {
        Self::new(name, capability, |_| Err(ProviderError::status(503, "unavailable")))
    }

    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl ProviderClient for StubProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> Capability {
        self.capability
    }

    fn is_terminal(&self) -> bool {
        self.terminal
    }

    async fn invoke(&self, ctx: &ResolveContext) -> Result<Payload, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.respond)(ctx)
    }
}
