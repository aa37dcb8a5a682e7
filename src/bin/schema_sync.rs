//! Schema Registry Sync CLI
//!
//! Registers, downloads and checks schemas against a Confluent-style schema
//! registry, driven by a schema-sync.toml configuration file.
//!
//! Usage:
//!   schema-sync register
//!   schema-sync check --fail-fast
//!   schema-sync download --pattern 'user-.*'
//!   schema-sync --help

use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use schema_sync::config::SyncConfig;
use schema_sync::tasks::download::DownloadRequest;
use schema_sync::tasks::{self, TaskContext, TaskReport};
use schema_sync::HttpRegistryClient;

#[derive(Parser)]
#[command(name = "schema-sync")]
#[command(about = "Synchronize local schema files with a schema registry")]
#[command(version)]
struct Cli {
    /// Path to the config file (default: schema-sync.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Registry URL (overrides the config file)
    #[arg(short, long)]
    registry: Option<String>,

    /// Abort remaining subjects on the first failure
    #[arg(long)]
    fail_fast: bool,

    /// Log warnings and errors only
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve and register all configured subjects
    Register,

    /// Check all configured subjects for compatibility with the registry
    Check,

    /// Download schemas from the registry
    Download {
        /// Additional subject-name patterns to download
        #[arg(short, long)]
        pattern: Vec<String>,

        /// Output directory (overrides the config file)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Apply the configured per-subject compatibility levels
    SetCompatibility,

    /// Write a starter config file
    InitConfig {
        /// Where to write it
        #[arg(default_value = "schema-sync.toml")]
        path: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if let Err(e) = run(cli) {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if let Command::InitConfig { path } = &cli.command {
        return init_config(path);
    }

    let mut config = SyncConfig::load_from(cli.config.as_deref())?;
    if let Some(url) = &cli.registry {
        config.registry.url = url.clone();
    }
    if cli.fail_fast {
        config.output.fail_fast = true;
    }

    let mut client = HttpRegistryClient::with_timeout(
        &config.registry.url,
        std::time::Duration::from_secs(config.registry.timeout_secs),
    )?;
    if let Some(username) = &config.registry.username {
        let password = config.registry.password.clone().unwrap_or_default();
        client = client.with_basic_auth(username, password);
    }

    let base_dir = config.base_dir();
    let ctx = TaskContext {
        base_dir: &base_dir,
        client: &client,
        fail_fast: config.output.fail_fast,
    };

    let report = match &cli.command {
        Command::Register => {
            println!("📝 Registering {} subject(s)\n", config.subjects.len());
            let subjects = config.build_subjects()?;
            tasks::register::run(&subjects, &ctx, &config.output.dir)?
        }
        Command::Check => {
            println!("🔍 Checking {} subject(s)\n", config.subjects.len());
            let subjects = config.build_subjects()?;
            tasks::compatibility::run(&subjects, &ctx)?
        }
        Command::Download { pattern, output } => {
            let requests: Vec<DownloadRequest> = config
                .subjects
                .iter()
                .map(|s| s.to_download_request())
                .collect();
            let mut patterns = config.download.patterns.clone();
            patterns.extend(pattern.iter().cloned());
            let output_dir = output.as_ref().unwrap_or(&config.output.dir);
            println!("📥 Downloading schemas to {:?}\n", output_dir);
            tasks::download::run(&requests, &patterns, &ctx, output_dir, config.output.metadata)?
        }
        Command::SetCompatibility => {
            let mut levels = Vec::new();
            for subject in &config.subjects {
                if let Some(level) = subject.compatibility_level()? {
                    levels.push((subject.name.clone(), level));
                }
            }
            println!("⚙️  Configuring {} subject(s)\n", levels.len());
            tasks::configure::run(&levels, &ctx)?
        }
        Command::InitConfig { .. } => unreachable!(),
    };

    print_report(&report);
    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_report(report: &TaskReport) {
    println!();
    if report.is_success() {
        println!("✅ {} subject(s) processed", report.succeeded);
        return;
    }
    for failure in &report.failures {
        eprintln!("   ❌ {}: {}", failure.subject, failure.error);
    }
    if report.aborted {
        eprintln!("⚠️  Aborted after first failure (fail-fast)");
    }
    eprintln!(
        "❌ {} succeeded, {} failed",
        report.succeeded,
        report.failures.len()
    );
}

fn init_config(path: &str) -> anyhow::Result<()> {
    if std::path::Path::new(path).exists() {
        bail!("{} already exists", path);
    }
    SyncConfig::default().save(path)?;
    println!("✅ Wrote starter config to {}", path);
    println!("   Add [[subjects]] tables, then run: schema-sync register");
    Ok(())
}
