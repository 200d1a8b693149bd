//! Web Store Publisher CLI
//!
//! Uploads and publishes browser extensions to the web store

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use webstore_publisher::orchestration::{select, to_account};
use webstore_publisher::{
    BatchPublisher, CONFIG_FILENAME, CommandHooks, ConfigLoadOptions, ConfigLoader,
    ConfigOverrides, ConsoleReporter, HookChain, JsonReportWriter, PluginLoader, SelectionFilters,
    UploadConfig, UploadError, logging,
};

const EXIT_PACKAGE_FAILURES: i32 = 1;
const EXIT_FATAL: i32 = 2;

/// Browser extension web store upload and publish tool
#[derive(Parser)]
#[command(name = "webstore-publisher")]
#[command(version)]
#[command(about = "Upload and publish browser extensions to the web store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(short, long, default_value = CONFIG_FILENAME, global = true)]
    config: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload (and optionally publish) extensions
    Upload {
        /// Extensions to upload (defaults to all)
        #[arg(value_name = "PACKAGES")]
        packages: Vec<String>,

        /// Only use these accounts
        #[arg(short, long)]
        account: Vec<String>,

        /// Only upload extensions in these groups
        #[arg(long)]
        group: Vec<String>,

        /// Skip extensions in these groups
        #[arg(long)]
        exclude_group: Vec<String>,

        /// Skip these extensions
        #[arg(long)]
        exclude_single: Vec<String>,

        /// Confirm an upload of every extension
        #[arg(long)]
        global: bool,

        /// Message passed to completion hooks
        #[arg(short, long)]
        message: Option<String>,

        /// Extensions uploaded concurrently
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Simulate uploads without network calls
        #[arg(long)]
        fake_upload: bool,

        /// Write a JSON report to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Never prompt for authorization codes (CI/CD)
        #[arg(long)]
        non_interactive: bool,
    },

    /// Validate the configuration and show what would be uploaded
    Check,

    /// Authorize an account through the authorization-code flow
    Auth {
        /// Account name from the configuration
        account: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match run(cli).await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("\n❌ Error");
            eprintln!("{:#}", e);

            if let Some(error) = e.downcast_ref::<UploadError>() {
                eprintln!("\n💡 Suggested actions:");
                for action in error.suggested_actions() {
                    eprintln!("  - {}", action);
                }
            }

            process::exit(EXIT_FATAL);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Upload {
            packages,
            account,
            group,
            exclude_group,
            exclude_single,
            global,
            message,
            chunk_size,
            fake_upload,
            report,
            non_interactive,
        } => {
            let overrides = ConfigOverrides {
                chunk_size,
                fake_upload: fake_upload.then_some(true),
            };
            let filters = SelectionFilters {
                packages,
                accounts: account,
                groups: group,
                excluded_groups: exclude_group,
                excluded_packages: exclude_single,
                allow_global: global,
                message,
            };
            let interactive = !non_interactive && std::io::stdin().is_terminal();

            upload_command(&cli.config, overrides, filters, report, interactive).await
        }
        Commands::Check => check_command(&cli.config).await,
        Commands::Auth { account } => auth_command(&cli.config, &account).await,
    }
}

async fn load_config(config_path: &Path, overrides: ConfigOverrides) -> Result<UploadConfig> {
    let config = ConfigLoader::load(ConfigLoadOptions {
        config_path: config_path.to_path_buf(),
        overrides,
        env: std::env::vars().collect(),
    })
    .await?;

    let validation = ConfigLoader::validate(&config);
    for warning in &validation.warnings {
        tracing::warn!(field = %warning.field, "{}", warning.message);
    }
    if let Some(error) = validation.into_error() {
        return Err(error.into());
    }

    Ok(config)
}

fn base_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

async fn upload_command(
    config_path: &Path,
    overrides: ConfigOverrides,
    filters: SelectionFilters,
    report: Option<PathBuf>,
    interactive: bool,
) -> Result<i32> {
    println!("\n📦 webstore-publisher\n");

    let config = load_config(config_path, overrides).await?;
    let selection = select(&config, &filters)?;

    if selection.packages.is_empty() {
        println!("⚠️  No extensions selected");
    }

    let loader = if interactive {
        PluginLoader::new(&config)
    } else {
        PluginLoader::new(&config).non_interactive()
    };
    let publisher = BatchPublisher::from_config(&config, loader.transport()?, loader.credentials()?);

    let mut hooks = HookChain::new().with(Arc::new(ConsoleReporter)).with(Arc::new(
        CommandHooks::new(config.hooks.clone().unwrap_or_default(), base_dir(config_path)),
    ));
    if let Some(path) = report {
        hooks = hooks.with(Arc::new(JsonReportWriter::new(path)));
    }

    let result = publisher.run(selection, &hooks).await?;

    tracing::info!(
        run_id = %result.run_id,
        duration_ms = result.duration_ms(),
        published = result.published_count(),
        "run finished"
    );

    if result.has_failures() {
        Ok(EXIT_PACKAGE_FAILURES)
    } else {
        Ok(0)
    }
}

async fn check_command(config_path: &Path) -> Result<i32> {
    println!("\n🔍 Configuration Check\n");

    let config = ConfigLoader::load(ConfigLoadOptions {
        config_path: config_path.to_path_buf(),
        overrides: ConfigOverrides::default(),
        env: std::env::vars().collect(),
    })
    .await?;

    let validation = ConfigLoader::validate(&config);
    println!("{}", ConfigLoader::format_validation_result(&validation));

    if !validation.valid {
        return Ok(EXIT_FATAL);
    }

    let filters = SelectionFilters {
        allow_global: true,
        ..Default::default()
    };
    let selection = select(&config, &filters)?;

    println!("\n📋 Extensions ({}):", selection.packages.len());
    for package in &selection.packages {
        let publish = if package.publish { ", publish" } else { "" };
        let simulated = if package.simulation.is_active() {
            ", simulated"
        } else {
            ""
        };
        println!(
            "  - {} ({}) <- {} [{}{}{}]",
            package.name,
            package.item_id,
            package.archive.display(),
            package.account,
            publish,
            simulated
        );
    }

    println!();
    Ok(0)
}

async fn auth_command(config_path: &Path, account_name: &str) -> Result<i32> {
    println!("\n🔑 Authorize account '{}'\n", account_name);

    let config = load_config(config_path, ConfigOverrides::default()).await?;
    let account_config = config
        .accounts
        .get(account_name)
        .with_context(|| format!("Account '{}' is not configured", account_name))?;
    let account = to_account(account_name, account_config);

    PluginLoader::new(&config)
        .oauth()?
        .authorize(&account)
        .await?;

    println!("\n✅ Account '{}' authorized", account_name);
    Ok(0)
}
