mod types;

pub use types::*;

use anyhow::{Context, Result};
use shortforge_core::Capability;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    parse_config(&content).with_context(|| format!("Invalid config file: {:?}", path))
}

/// Parse, expand and validate configuration text
pub fn parse_config(content: &str) -> Result<Config> {
    let mut value: toml::Value = toml::from_str(content).context("Failed to parse TOML")?;
    expand_strings(&mut value)?;

    let config: Config = value
        .try_into()
        .context("Configuration does not match the expected schema")?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./shortforge.toml",
        "./config.toml",
        "~/.config/shortforge/config.toml",
        "/etc/shortforge/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    let config = Config::default();
    validate_config(&config)?;
    Ok(config)
}

/// Shell-expand `~`, `$VAR` and `${VAR}` in every string value.
///
/// Unset variables expand to an empty string; providers without credentials
/// then report themselves unavailable at run time.
fn expand_strings(value: &mut toml::Value) -> Result<()> {
    match value {
        toml::Value::String(s) => {
            let expanded = shellexpand::full_with_context(
                s.as_str(),
                || std::env::var("HOME").ok(),
                |var| Ok::<_, std::env::VarError>(Some(std::env::var(var).unwrap_or_default())),
            )
            .with_context(|| format!("Failed to expand {:?}", s))?;
            *s = expanded.into_owned();
        }
        toml::Value::Array(items) => {
            for item in items {
                expand_strings(item)?;
            }
        }
        toml::Value::Table(table) => {
            for (_, item) in table.iter_mut() {
                expand_strings(item)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    let target = &config.target;
    if target.duration_secs == 0 || target.width == 0 || target.height == 0 || target.fps == 0 {
        anyhow::bail!("Target duration, width, height and fps must all be non-zero");
    }

    let limits = &config.limits;
    if limits.provider_timeout_secs == 0 || limits.publish_timeout_secs == 0 {
        anyhow::bail!("limits.provider_timeout_secs and limits.publish_timeout_secs cannot be 0");
    }
    if config.tools.timeout_secs == 0 {
        anyhow::bail!("tools.timeout_secs cannot be 0");
    }
    if limits.prompt_max_chars == 0 {
        anyhow::bail!("limits.prompt_max_chars cannot be 0");
    }
    if !(limits.min_crop_keep > 0.0 && limits.min_crop_keep <= 1.0) {
        anyhow::bail!(
            "limits.min_crop_keep must be in (0, 1], got {}",
            limits.min_crop_keep
        );
    }

    if config.run.mode == RunMode::Interval && config.run.interval_secs == 0 {
        anyhow::bail!("run.interval_secs cannot be 0 in interval mode");
    }

    if config.publish.retry.max_attempts == 0 {
        anyhow::bail!("publish.retry.max_attempts must be at least 1");
    }

    let mut names = HashSet::new();
    for provider in &config.providers {
        if provider.name.trim().is_empty() {
            anyhow::bail!("Provider names cannot be empty");
        }
        if !names.insert(provider.name.as_str()) {
            anyhow::bail!("Duplicate provider name '{}'", provider.name);
        }
        if provider.settings.capability() != provider.capability {
            anyhow::bail!(
                "Provider '{}' of type '{}' cannot serve capability '{}' (serves '{}')",
                provider.name,
                provider.settings.type_name(),
                provider.capability,
                provider.settings.capability()
            );
        }
        if provider.timeout_secs == Some(0) {
            anyhow::bail!("Provider '{}' has a zero timeout", provider.name);
        }
    }

    for capability in Capability::ALL {
        let chain = config.chain(capability);
        if chain.is_empty() {
            anyhow::bail!("No provider configured for capability '{}'", capability);
        }

        let mut priorities: HashMap<u32, &str> = HashMap::new();
        for provider in &chain {
            if let Some(other) = priorities.insert(provider.priority, &provider.name) {
                anyhow::bail!(
                    "Providers '{}' and '{}' share priority {} for capability '{}'",
                    other,
                    provider.name,
                    provider.priority,
                    capability
                );
            }
        }

        let last = chain.len() - 1;
        for (i, provider) in chain.iter().enumerate() {
            if provider.settings.is_terminal() && i != last {
                anyhow::bail!(
                    "Terminal provider '{}' must be last in the '{}' chain",
                    provider.name,
                    capability
                );
            }
        }
    }

    Ok(())
}
