//! Run-scoped data handed to every provider call.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use shortforge_core::{Artifact, Capability, MediaFile, RunId, TargetSpec};
use tokio_util::sync::CancellationToken;

/// Context for resolving one capability within a run.
///
/// Holds the artifacts produced by earlier stages; a provider only ever sees
/// upstream artifacts.
#[derive(Debug, Clone)]
pub struct ResolveContext {
    pub run_id: RunId,
    /// Run workspace directory; providers write downloads and renders here.
    pub workdir: PathBuf,
    pub target: TargetSpec,
    pub cancellation: CancellationToken,
    artifacts: BTreeMap<Capability, Artifact>,
}

impl ResolveContext {
    pub fn new(run_id: RunId, workdir: impl Into<PathBuf>, target: TargetSpec) -> Self {
        Self {
            run_id,
            workdir: workdir.into(),
            target,
            cancellation: CancellationToken::new(),
            artifacts: BTreeMap::new(),
        }
    }

    /// Builder: attach a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Builder: add an upstream artifact.
    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.insert(artifact);
        self
    }

    /// Record the accepted artifact of a completed stage.
    pub fn insert(&mut self, artifact: Artifact) {
        self.artifacts.insert(artifact.capability, artifact);
    }

    pub fn upstream(&self, capability: Capability) -> Option<&Artifact> {
        self.artifacts.get(&capability)
    }

    /// The accepted prompt text.
    pub fn prompt(&self) -> Option<&str> {
        self.upstream(Capability::Prompt).and_then(Artifact::as_text)
    }

    pub fn visual(&self) -> Option<&MediaFile> {
        self.upstream(Capability::Visual).and_then(Artifact::as_media)
    }

    pub fn audio(&self) -> Option<&MediaFile> {
        self.upstream(Capability::Audio).and_then(Artifact::as_media)
    }

    pub fn composition(&self) -> Option<&MediaFile> {
        self.upstream(Capability::Composition).and_then(Artifact::as_media)
    }

    /// Path for a file inside the run workspace.
    pub fn file(&self, name: &str) -> PathBuf {
        self.workdir.join(name)
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }
}
