use bollard::Docker;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use emulator::{AzuriteContainer, EmulatorError, ServiceEndpoints};
use models::{ConfigError, EmulatorConfig};
use runtime::container::{ContainerError, ContainerRuntime};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(
    name = "azurite-kit",
    about = "Disposable Azurite storage emulator for integration tests",
    version,
    long_about = "Starts an Azurite blob/queue/table emulator in Docker and prints a connection string for it.\n\nExamples:\n  azurite-kit start                                  # Start with the default dev account\n  azurite-kit start --account-name custom --account-key Y2JkZQ==\n  azurite-kit start --json --detach                  # Print JSON and leave the container running\n  azurite-kit start --emulate                        # Dry run without Docker\n  azurite-kit check-config ./emulator.yml            # Validate a config file\n  azurite-kit cleanup                                # Remove containers left by earlier runs"
)]
struct AzuriteKit {
    #[command(subcommand)]
    command: Commands,

    /// Run in verbose mode with detailed output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Run in debug mode with extensive runtime details
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start an emulator and print its connection string
    Start(StartArgs),

    /// Validate an emulator config file
    CheckConfig {
        /// Path to the config file (defaults to the user config location)
        path: Option<PathBuf>,
    },

    /// Remove emulator containers left behind by earlier runs
    Cleanup,
}

#[derive(Debug, Args)]
struct StartArgs {
    /// YAML config file (defaults to the user config location if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Storage account name
    #[arg(long)]
    account_name: Option<String>,

    /// Base64 storage account key
    #[arg(long)]
    account_key: Option<String>,

    /// Image repository, without tag
    #[arg(long)]
    image: Option<String>,

    /// Image tag
    #[arg(long)]
    tag: Option<String>,

    /// Keep emulator data in memory
    #[arg(long)]
    in_memory: bool,

    /// Ignore unsupported headers and parameters
    #[arg(long)]
    loose: bool,

    /// Accept requests from newer SDK versions
    #[arg(long)]
    skip_api_version_check: bool,

    /// Use emulation mode instead of Docker
    #[arg(short, long)]
    emulate: bool,

    /// Print a JSON document instead of the bare connection string
    #[arg(long)]
    json: bool,

    /// Exit after printing and leave the container running
    #[arg(long)]
    detach: bool,
}

impl StartArgs {
    // Explicit flags win over file values
    fn apply(&self, config: &mut EmulatorConfig) {
        if let Some(name) = &self.account_name {
            config.account_name = name.clone();
        }
        if let Some(key) = &self.account_key {
            config.account_key = key.clone();
        }
        if let Some(image) = &self.image {
            config.image = image.clone();
        }
        if let Some(tag) = &self.tag {
            config.tag = tag.clone();
        }
        config.in_memory_persistence |= self.in_memory;
        config.loose |= self.loose;
        config.skip_api_version_check |= self.skip_api_version_check;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuntimeType {
    Docker,
    Emulation,
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Emulator(#[from] EmulatorError),

    #[error(transparent)]
    Runtime(#[from] ContainerError),
}

#[derive(Serialize)]
struct StartOutput<'a> {
    container: &'a str,
    account_name: &'a str,
    connection_string: String,
    endpoints: ServiceEndpoints,
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("azurite-kit").join("emulator.yml"))
}

fn resolve_config(explicit: Option<&Path>) -> Result<EmulatorConfig, ConfigError> {
    if let Some(path) = explicit {
        logging::debug(&format!("Loading config from {}", path.display()));
        return EmulatorConfig::load(path);
    }

    match default_config_path() {
        Some(path) if path.is_file() => {
            logging::debug(&format!("Loading config from {}", path.display()));
            EmulatorConfig::load(&path)
        }
        _ => Ok(EmulatorConfig::default()),
    }
}

async fn initialize_runtime(
    runtime_type: RuntimeType,
) -> Result<Arc<dyn ContainerRuntime>, ContainerError> {
    match runtime_type {
        RuntimeType::Docker => {
            if !docker::is_available().await {
                return Err(ContainerError::ConnectionFailed(
                    "Docker is not available; start the Docker daemon or use --emulate"
                        .to_string(),
                ));
            }
            Ok(Arc::new(docker::DockerRuntime::new()?))
        }
        RuntimeType::Emulation => Ok(Arc::new(runtime::emulation::EmulationRuntime::new())),
    }
}

async fn cleanup_on_exit() {
    // Clean up Docker resources if available, but don't let it block indefinitely
    match tokio::time::timeout(Duration::from_secs(3), async {
        match Docker::connect_with_local_defaults() {
            Ok(client) => docker::cleanup_containers(&client).await,
            Err(_) => logging::info("Docker not available, skipping Docker cleanup"),
        }
    })
    .await
    {
        Ok(_) => logging::debug("Docker cleanup completed successfully"),
        Err(_) => {
            logging::warning("Docker cleanup timed out after 3 seconds, continuing with shutdown")
        }
    }

    match tokio::time::timeout(
        Duration::from_secs(2),
        runtime::emulation::cleanup_resources(),
    )
    .await
    {
        Ok(_) => logging::debug("Emulation cleanup completed successfully"),
        Err(_) => logging::warning("Emulation cleanup timed out, continuing with shutdown"),
    }
}

// -v and -d win over the config file's log_level
fn config_log_level(
    cli_level: Option<logging::LogLevel>,
    config: &EmulatorConfig,
) -> Option<logging::LogLevel> {
    if cli_level.is_some() {
        return None;
    }
    match config.log_level.as_ref()?.parse::<logging::LogLevel>() {
        Ok(level) => Some(level),
        Err(e) => {
            logging::warning(&format!("Ignoring config log level: {}", e));
            None
        }
    }
}

async fn start_emulator(
    args: &StartArgs,
    cli_level: Option<logging::LogLevel>,
) -> Result<(), CliError> {
    let mut config = resolve_config(args.config.as_deref())?;
    args.apply(&mut config);

    if let Some(level) = config_log_level(cli_level, &config) {
        logging::set_log_level(level);
    }

    let runtime_type = if args.emulate {
        RuntimeType::Emulation
    } else {
        RuntimeType::Docker
    };
    let runtime = initialize_runtime(runtime_type).await?;

    let mut azurite = AzuriteContainer::from_config(runtime.clone(), &config);
    azurite.validate()?;

    tokio::select! {
        started = azurite.start() => started?,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Received Ctrl+C during startup, cleaning up...");
            cleanup_on_exit().await;
            std::process::exit(130);
        }
    }

    let connection_string = azurite.connection_string().await?;
    let container = azurite
        .handle()
        .map(|handle| handle.name().to_string())
        .unwrap_or_default();

    if args.json {
        let output = StartOutput {
            container: &container,
            account_name: connection_string.account_name(),
            connection_string: connection_string.to_string(),
            endpoints: connection_string.endpoints().clone(),
        };
        match serde_json::to_string_pretty(&output) {
            Ok(json) => println!("{}", json),
            Err(e) => logging::error(&format!("Failed to serialize output: {}", e)),
        }
    } else {
        eprintln!(
            "{} Azurite is running as {}",
            "✅".green(),
            container.bold()
        );
        println!("{}", connection_string);
    }

    if args.detach {
        if runtime_type == RuntimeType::Emulation {
            logging::warning("Emulated containers do not outlive this process");
        }
        eprintln!(
            "Leaving {} running; remove it with `azurite-kit cleanup`",
            container
        );
        return Ok(());
    }

    eprintln!("{}", "Press Ctrl+C to stop the emulator".dimmed());
    if let Err(e) = tokio::signal::ctrl_c().await {
        logging::warning(&format!("Failed to listen for Ctrl+C: {}", e));
    }

    if let Some(handle) = azurite.take_handle() {
        eprintln!("Stopping {}...", handle.name());
        match tokio::time::timeout(Duration::from_secs(10), runtime.stop(&handle)).await {
            Ok(result) => result?,
            Err(_) => {
                logging::warning("Stopping the emulator timed out, forcing cleanup");
                cleanup_on_exit().await;
            }
        }
    }

    Ok(())
}

fn check_config(path: Option<&Path>) -> Result<bool, ConfigError> {
    let config = resolve_config(path)?;
    let result = config.validate();

    if result.is_valid {
        println!(
            "{} Config is valid (account {}, image {})",
            "✅".green(),
            config.account_name,
            config.image_reference()
        );
    } else {
        println!("{} Config has {} issue(s):", "❌".red(), result.issues.len());
        for issue in &result.issues {
            println!("   - {}", issue);
        }
    }

    Ok(result.is_valid)
}

async fn cleanup_leftovers() -> Result<usize, ContainerError> {
    let runtime = docker::DockerRuntime::new()?;
    docker::cleanup_labelled_containers(runtime.client()).await
}

#[tokio::main]
async fn main() {
    let cli = AzuriteKit::parse();

    // Set log level based on command line flags
    let cli_level = if cli.debug {
        Some(logging::LogLevel::Debug)
    } else if cli.verbose {
        Some(logging::LogLevel::Info)
    } else {
        None
    };
    logging::set_log_level(cli_level.unwrap_or(logging::LogLevel::Warning));
    match cli_level {
        Some(logging::LogLevel::Debug) => {
            logging::debug("Debug mode enabled - showing detailed logs")
        }
        Some(_) => logging::info("Verbose mode enabled"),
        None => {}
    }

    match &cli.command {
        Commands::Start(args) => {
            if let Err(e) = start_emulator(args, cli_level).await {
                logging::error(&e.to_string());
                cleanup_on_exit().await;
                std::process::exit(1);
            }
        }
        Commands::CheckConfig { path } => match check_config(path.as_deref()) {
            Ok(true) => {}
            Ok(false) => std::process::exit(1),
            Err(e) => {
                logging::error(&e.to_string());
                std::process::exit(1);
            }
        },
        Commands::Cleanup => match cleanup_leftovers().await {
            Ok(count) => println!("Removed {} container(s)", count),
            Err(e) => {
                logging::error(&e.to_string());
                std::process::exit(1);
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn start_flags_parse() {
        let cli = AzuriteKit::try_parse_from([
            "azurite-kit",
            "start",
            "--account-name",
            "custom",
            "--account-key",
            "Y2JkZQ==",
            "--in-memory",
            "--emulate",
            "--json",
        ])
        .expect("arguments should parse");

        match cli.command {
            Commands::Start(args) => {
                assert_eq!(args.account_name.as_deref(), Some("custom"));
                assert_eq!(args.account_key.as_deref(), Some("Y2JkZQ=="));
                assert!(args.in_memory && args.emulate && args.json);
                assert!(!args.detach);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn flags_override_file_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "account_name: fromfile\ntag: \"3.28.0\"\nloose: true").unwrap();

        let cli = AzuriteKit::try_parse_from([
            "azurite-kit",
            "start",
            "--config",
            file.path().to_str().unwrap(),
            "--account-name",
            "fromflag",
        ])
        .unwrap();
        let Commands::Start(args) = cli.command else {
            panic!("expected start");
        };

        let mut config = resolve_config(args.config.as_deref()).unwrap();
        args.apply(&mut config);

        assert_eq!(config.account_name, "fromflag");
        assert_eq!(config.tag, "3.28.0");
        // Absent boolean flags do not switch file settings off
        assert!(config.loose);
        assert!(!config.in_memory_persistence);
    }

    #[test]
    fn config_log_level_applies_only_without_flags() {
        let config = EmulatorConfig {
            log_level: Some("error".to_string()),
            ..Default::default()
        };

        // Quieter than the Warning default still takes effect
        assert_eq!(
            config_log_level(None, &config),
            Some(logging::LogLevel::Error)
        );
        assert_eq!(
            config_log_level(Some(logging::LogLevel::Info), &config),
            None
        );

        let unset = EmulatorConfig::default();
        assert_eq!(config_log_level(None, &unset), None);

        let bogus = EmulatorConfig {
            log_level: Some("loud".to_string()),
            ..Default::default()
        };
        assert_eq!(config_log_level(None, &bogus), None);
    }

    #[test]
    fn check_config_reports_invalid_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "account_name: \"bad;name\"").unwrap();

        assert!(!check_config(Some(file.path())).unwrap());
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        assert!(resolve_config(Some(Path::new("/nonexistent/emulator.yml"))).is_err());
    }

    #[tokio::test]
    async fn emulated_start_produces_a_connection_string() {
        let runtime = initialize_runtime(RuntimeType::Emulation).await.unwrap();
        let mut azurite = AzuriteContainer::from_config(runtime.clone(), &EmulatorConfig::default());

        azurite.start().await.unwrap();
        let connection_string = azurite.connection_string().await.unwrap().to_string();
        assert!(connection_string.contains("AccountName=devstoreaccount1;"));

        let handle = azurite.take_handle().unwrap();
        runtime.stop(&handle).await.unwrap();
    }
}
