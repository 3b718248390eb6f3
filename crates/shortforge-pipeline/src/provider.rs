//! The [`ProviderClient`] trait: uniform access to one external capability.

use async_trait::async_trait;
use shortforge_core::{Capability, Payload, ProviderError};

use crate::context::ResolveContext;

/// One concrete provider of a capability (a text model, a stock-footage
/// search, a local asset directory, a compositor, a publisher, ...).
///
/// Implementations report failure through [`ProviderError`]; they never
/// retry in place. The resolver chain bounds every call with a timeout.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Unique name, used in reports and logs.
    fn name(&self) -> &str;

    fn capability(&self) -> Capability;

    /// `true` for providers that cannot fail under normal conditions
    /// (static prompt list, solid color, silence). A terminal provider must
    /// be last in its chain.
    fn is_terminal(&self) -> bool {
        false
    }

    async fn invoke(&self, ctx: &ResolveContext) -> Result<Payload, ProviderError>;
}
