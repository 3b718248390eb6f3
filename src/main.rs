mod cli;

use shortforge::{config, providers::ProviderEnv, registry};
use shortforge_av::ToolRegistry;
use shortforge_core::{RunReport, RunStatus};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "shortforge=trace,shortforge_pipeline=trace,shortforge_av=debug,shortforge_core=debug"
                .to_string()
        } else {
            "shortforge=info,shortforge_pipeline=info,shortforge_av=info,shortforge_core=info"
                .to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            json,
            keep_artifacts,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_once(cli.config.as_deref(), json, keep_artifacts))
        }
        Commands::Start => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start(cli.config.as_deref()))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Version => {
            println!("shortforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling");
            token.cancel();
        }
    });
}

async fn run_once(config_path: Option<&Path>, json: bool, keep_artifacts: bool) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;
    if keep_artifacts {
        config.run.keep_artifacts = true;
    }

    let env = ProviderEnv::from_config(&config)?;
    let runner = registry::build_runner(&config, &env)?;

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let report = runner.run(&cancel).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    match &report.status {
        Some(RunStatus::Succeeded { .. }) => Ok(()),
        Some(status) => anyhow::bail!("Run {} {}", report.run_id, status.label()),
        None => anyhow::bail!("Run {} did not finish", report.run_id),
    }
}

async fn start(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let env = ProviderEnv::from_config(&config)?;
    let runner = Arc::new(registry::build_runner(&config, &env)?);

    tracing::info!(
        mode = ?config.run.mode,
        interval_secs = config.run.interval_secs,
        "Starting shortforge"
    );

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let scheduler = registry::build_scheduler(&config, runner).with_cancellation(cancel);
    let summary = scheduler.run().await;

    println!(
        "Runs: {} (succeeded {}, failed {}, cancelled {}, panicked {})",
        summary.runs, summary.succeeded, summary.failed, summary.cancelled, summary.panicked
    );
    if let Some(ref report) = summary.last_report {
        println!();
        print_report(report);
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    println!("Run {}", report.run_id);
    for stage in &report.stages {
        let mark = if stage.succeeded() { "✓" } else { "✗" };
        print!("{} {}", mark, stage.capability);
        if let Some(provider) = stage.resolved_by() {
            print!(" via {}", provider);
        }
        println!();
        for failure in stage.failures() {
            if let Some(error) = failure.error() {
                println!("    {} failed: {}", failure.provider, error);
            }
        }
    }

    match &report.status {
        Some(RunStatus::Succeeded { receipt }) => {
            print!("Published: {}", receipt.id);
            if let Some(ref url) = receipt.url {
                print!(" ({})", url);
            }
            println!();
        }
        Some(RunStatus::Failed {
            capability,
            failure,
        }) => println!("Failed at {}: {}", capability, failure),
        Some(RunStatus::Cancelled { before }) => match before {
            Some(capability) => println!("Cancelled before {}", capability),
            None => println!("Cancelled"),
        },
        None => println!("Unfinished"),
    }

    if let Some(elapsed) = report.elapsed() {
        println!("Elapsed: {:.1}s", elapsed.as_secs_f64());
    }
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let tools_config = match config_path {
        Some(path) => config::load_config(path)?.tools,
        None => config::load_config_or_default(None)
            .map(|c| c.tools)
            .unwrap_or_default(),
    };
    let registry = ToolRegistry::discover(&tools_config);
    let tools = registry.check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All tools are available!");
    } else if registry.get("ffmpeg").is_none() {
        println!("ffmpeg is missing; composition will not work until it is installed.");
    } else {
        println!("Some optional tools are missing. Providers that need them will be skipped.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            config::load_config(p)?
        }
        None => {
            println!("No config file specified, using defaults");
            config::load_config_or_default(None)?
        }
    };

    println!("✓ Configuration is valid");
    println!("  Mode: {:?}", config.run.mode);
    println!(
        "  Target: {}s {}x{} @ {}fps",
        config.target.duration_secs, config.target.width, config.target.height, config.target.fps
    );
    for capability in shortforge_core::Capability::ALL {
        let names: Vec<&str> = config
            .chain(capability)
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        println!("  {}: {}", capability, names.join(" -> "));
    }

    Ok(())
}
