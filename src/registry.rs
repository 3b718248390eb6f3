//! Builds resolver chains, stages, the job runner and the scheduler from a
//! validated [`Config`].
//!
//! Chains are built once at startup and shared read-only by every run.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use shortforge_core::Capability;
use shortforge_pipeline::{
    ChainEntry, JobRunner, PipelineStage, ResolverChain, RunnerOptions, ScheduleMode, Scheduler,
};

use crate::config::{Config, RunMode};
use crate::providers::{build_provider, ProviderEnv};

/// The resolver chain for one capability, in priority order.
pub fn build_chain(capability: Capability, config: &Config, env: &ProviderEnv) -> Result<ResolverChain> {
    let mut entries = Vec::new();
    for spec in config.chain(capability) {
        let client = build_provider(spec, config, env)
            .with_context(|| format!("Failed to build provider '{}'", spec.name))?;
        entries.push(ChainEntry::new(client, spec.timeout(config)));
    }

    let chain = ResolverChain::new(capability, entries)?;
    tracing::info!(
        capability = %capability,
        providers = ?chain.provider_names(),
        "resolver chain ready"
    );
    Ok(chain)
}

/// One stage per capability, in pipeline order.
pub fn build_stages(config: &Config, env: &ProviderEnv) -> Result<Vec<PipelineStage>> {
    let limits = config.limits.validation();
    Capability::ALL
        .into_iter()
        .map(|capability| Ok(PipelineStage::new(build_chain(capability, config, env)?, limits)))
        .collect()
}

pub fn runner_options(config: &Config) -> RunnerOptions {
    RunnerOptions {
        target: config.target.spec(),
        work_dir: config.run.work_dir.clone(),
        keep_artifacts: config.run.keep_artifacts,
    }
}

pub fn build_runner(config: &Config, env: &ProviderEnv) -> Result<JobRunner> {
    let stages = build_stages(config, env)?;
    Ok(JobRunner::new(stages, runner_options(config))?)
}

pub fn schedule_mode(config: &Config) -> ScheduleMode {
    match config.run.mode {
        RunMode::Once => ScheduleMode::Once,
        RunMode::Interval => ScheduleMode::Interval(Duration::from_secs(config.run.interval_secs)),
    }
}

pub fn build_scheduler(config: &Config, runner: Arc<JobRunner>) -> Scheduler<JobRunner> {
    Scheduler::new(runner, schedule_mode(config)).with_max_runs(config.run.max_runs)
}
