use anyhow::{Context, Result};
use azgov::azure::client::AzureClient;
use azgov::azure::http::format_api_error;
use azgov::config::Config;
use azgov::error::{AdapterError, GovernanceError};
use azgov::policy::{Policy, PolicyFile};
use azgov::resource::{
    compile, execute, get_registry, Lookup, ResourceClient, ResourceManager, RunOptions,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Resource governance for Azure
#[derive(Parser, Debug)]
#[command(name = "azgov", version, about, long_about = None)]
struct Args {
    /// Azure subscription to use
    #[arg(short, long, global = true)]
    subscription: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run policies from a file
    Run {
        /// Policy file (YAML or JSON)
        #[arg(short, long)]
        policy: PathBuf,

        /// Only run the named policies
        #[arg(short, long = "name")]
        names: Vec<String>,

        /// Enumerate and filter, but do not run actions
        #[arg(long)]
        dry_run: bool,
    },
    /// Check a policy file against the registry without calling Azure
    Validate {
        #[arg(short, long)]
        policy: PathBuf,
    },
    /// List registered resource kinds with their filters and actions
    ListKinds,
    /// Look resources up by id
    Get {
        /// Resource kind, e.g. azure.resourcegroup
        #[arg(short, long)]
        resource: String,

        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Print the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        save: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file {}: {}", log_path.display(), e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    // RUST_LOG narrows per-target output; --log-level caps it
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(tracing_level.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("azgov started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("azgov").join("azgov.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".azgov").join("azgov.log");
    }
    PathBuf::from("azgov.log")
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("Error: {}", describe(&err));
            ExitCode::from(2)
        }
    }
}

/// Dispatch a subcommand; `Ok(false)` means it ran but reported failures
async fn run(args: Args) -> Result<bool> {
    let config = Config::load();

    match args.command {
        Command::Run {
            policy,
            names,
            dry_run,
        } => {
            let policies = PolicyFile::load(&policy)?.select(&names)?;
            let client = connect(args.subscription, &config)?;
            run_policies(&policies, client, &config, dry_run).await
        }
        Command::Validate { policy } => validate(&policy),
        Command::ListKinds => {
            let registry = get_registry();
            for name in registry.kind_names() {
                let definition = registry.resolve(name)?;
                println!("azure.{}", name);
                println!("  filters: {}", definition.filters.names().join(", "));
                println!("  actions: {}", definition.actions.names().join(", "));
            }
            Ok(true)
        }
        Command::Get { resource, ids } => {
            let definition = get_registry().resolve(&resource)?;
            let client = connect(args.subscription, &config)?;
            let manager =
                ResourceManager::new(definition.descriptor, client, config.manager_settings());
            let Lookup {
                records,
                missing,
                aborted,
            } = manager.get_by_ids(ids.as_slice()).await;
            let complete = missing.is_empty() && aborted.is_none();

            for err in &missing {
                eprintln!("{}", err);
            }
            if let Some(err) = aborted {
                eprintln!("{}", describe(&err.into()));
            }
            let records: Vec<_> = records.into_iter().map(|r| r.into_value()).collect();
            println!("{}", serde_json::to_string_pretty(&records)?);
            Ok(complete)
        }
        Command::Config { save } => {
            let mut config = config;
            if let Some(subscription) = args.subscription {
                config.subscription_id = Some(subscription);
            }
            if save {
                config.save()?;
                if let Some(path) = Config::config_path() {
                    eprintln!("Saved {}", path.display());
                }
            }
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(true)
        }
    }
}

/// Resolve the subscription (CLI > config > environment > az default) and build a client
fn connect(subscription: Option<String>, config: &Config) -> Result<Arc<dyn ResourceClient>> {
    let subscription = subscription
        .or_else(|| config.effective_subscription())
        .context(
            "No Azure subscription configured. Set AZURE_SUBSCRIPTION_ID or use --subscription",
        )?;

    tracing::info!("Using subscription: {}", subscription);
    Ok(Arc::new(AzureClient::new(&subscription)?))
}

fn validate(path: &Path) -> Result<bool> {
    let policies = PolicyFile::load(path)?.policies;
    let registry = get_registry();
    let mut valid = true;

    for policy in &policies {
        match compile(registry, policy) {
            Ok(_) => println!("{}: ok", policy.name),
            Err(e) => {
                valid = false;
                println!("{}: {}", policy.name, e);
            }
        }
    }

    Ok(valid)
}

async fn run_policies(
    policies: &[Policy],
    client: Arc<dyn ResourceClient>,
    config: &Config,
    dry_run: bool,
) -> Result<bool> {
    let registry = get_registry();

    // Validate everything up front so a bad policy does not run half a file
    let compiled = policies
        .iter()
        .map(|policy| compile(registry, policy))
        .collect::<Result<Vec<_>, _>>()?;

    let settings = config.manager_settings();
    let options = RunOptions {
        dry_run,
        deadline: config.deadline(),
    };

    let mut clean = true;
    for policy in &compiled {
        let report = execute(policy, Arc::clone(&client), settings, options)
            .await
            .with_context(|| format!("Policy '{}' failed", policy.policy.name))?;
        clean &= report.is_clean();
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(clean)
}

/// User-facing message, with API failures rendered without raw response bodies
fn describe(err: &anyhow::Error) -> String {
    for cause in err.chain() {
        if let Some(adapter) = cause.downcast_ref::<AdapterError>() {
            return format!("{}: {}", err, format_api_error(adapter));
        }
        if let Some(
            GovernanceError::SchemaValidation { .. } | GovernanceError::PolicyInvalid { .. },
        ) = cause.downcast_ref()
        {
            return cause.to_string();
        }
    }
    format!("{:#}", err)
}
