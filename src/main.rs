//! linode-provider CLI entrypoint.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use linode_provider::cli::{
    Cli, Commands, Driver, Manifest, OutputFormatter, StateCommands, validate_manifest,
};
use linode_provider::config::{ConfigParser, ProviderConfig, find_config_file};
use linode_provider::error::{ReconcileError, Result};
use linode_provider::provider::{Provider, Registry};
use linode_provider::state::{LocalStateStore, StateStore};

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr; `RUST_LOG` overrides the verbosity flag.
fn init_logging(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Writes command output to stdout.
fn emit(text: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    if !text.ends_with('\n') && !text.is_empty() {
        stdout.write_all(b"\n")?;
    }
    Ok(())
}

/// Runs a command; `Ok(false)` means it finished with reported errors.
async fn run(cli: Cli) -> Result<bool> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Resources => {
            emit(&formatter.format_types(&Registry::with_defaults()))?;
            Ok(true)
        }
        Commands::Schema { type_name } => cmd_schema(&type_name, &formatter),
        Commands::Validate { file } => cmd_validate(&file, &formatter),
        Commands::Plan { file, refresh } => {
            let driver = build_driver(cli.config.as_deref(), cli.state.as_deref(), false)?;
            cmd_plan(&driver, &file, refresh, &formatter).await
        }
        Commands::Apply {
            file,
            yes,
            refresh,
            continue_on_error,
        } => {
            let driver = build_driver(cli.config.as_deref(), cli.state.as_deref(), continue_on_error)?;
            let lock = driver.lock().await?;
            let outcome = cmd_apply(&driver, &file, yes, refresh, &formatter).await;
            driver.unlock(&lock).await;
            outcome
        }
        Commands::Refresh { target } => {
            let driver = build_driver(cli.config.as_deref(), cli.state.as_deref(), false)?;
            let lock = driver.lock().await?;
            let outcome = cmd_refresh(&driver, target.as_deref(), &formatter).await;
            driver.unlock(&lock).await;
            outcome
        }
        Commands::Destroy { target, yes } => {
            let driver = build_driver(cli.config.as_deref(), cli.state.as_deref(), false)?;
            let lock = driver.lock().await?;
            let outcome = cmd_destroy(&driver, target.as_deref(), yes, &formatter).await;
            driver.unlock(&lock).await;
            outcome
        }
        Commands::State { command } => match command {
            StateCommands::Show { address } => {
                let store = state_store(cli.state.as_deref())?;
                let state = store.load().await?.unwrap_or_default();
                emit(&formatter.format_state(&state, &Registry::with_defaults(), address.as_deref()))?;
                Ok(address.is_none_or(|a| state.get(&a).is_some()))
            }
        },
    }
}

/// Loads the provider configuration: explicit path, else the nearest
/// `linode-provider.yaml`, else defaults; then profile and environment.
fn load_config(config_path: Option<&Path>) -> Result<ProviderConfig> {
    let file = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => std::env::current_dir().ok().and_then(|dir| find_config_file(&dir)),
    };

    let base = file
        .as_deref()
        .and_then(Path::parent)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let parser = ConfigParser::new().with_base_path(base);
    parser.load_dotenv()?;

    match &file {
        Some(path) => debug!("Using configuration file {}", path.display()),
        None => debug!("No configuration file found, using defaults"),
    }
    parser.load_with_env(file.as_deref())
}

fn state_store(state_path: Option<&Path>) -> Result<LocalStateStore> {
    match state_path {
        Some(path) => Ok(LocalStateStore::with_state_path(path)),
        None => LocalStateStore::new(),
    }
}

fn build_driver(
    config_path: Option<&Path>,
    state_path: Option<&Path>,
    continue_on_error: bool,
) -> Result<Driver<LocalStateStore>> {
    let provider = Provider::new(load_config(config_path)?)?;
    let store = state_store(state_path)?;
    info!("Using {} state at {}", store.backend_type(), store.state_path().display());
    Ok(Driver::new(provider, store).with_continue_on_error(continue_on_error))
}

fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{prompt} [y/N]: ");
    std::io::stderr().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

fn cmd_schema(type_name: &str, formatter: &OutputFormatter) -> Result<bool> {
    let registry = Registry::with_defaults();
    let schema = match registry.resource(type_name) {
        Ok(resource) => resource.schema().clone(),
        Err(_) => match registry.data_source(type_name) {
            Ok(data_source) => data_source.schema().clone(),
            Err(_) => {
                return Err(ReconcileError::UnknownResource {
                    name: type_name.to_string(),
                }
                .into());
            }
        },
    };
    emit(&formatter.format_schema(type_name, &schema))?;
    Ok(true)
}

fn cmd_validate(file: &Path, formatter: &OutputFormatter) -> Result<bool> {
    let manifest = Manifest::load(file)?;
    let results = validate_manifest(&Registry::with_defaults(), &manifest)?;

    let mut valid = true;
    for (address, diags) in &results {
        valid &= !diags.has_error();
        let text = formatter.format_diagnostics(address, diags);
        if !text.is_empty() {
            emit(&text)?;
        }
    }

    if valid {
        eprintln!(
            "{} is valid ({} resources, {} data sources).",
            file.display(),
            manifest.resources.len(),
            manifest.data.len()
        );
    }
    Ok(valid)
}

async fn cmd_plan(
    driver: &Driver<LocalStateStore>,
    file: &Path,
    refresh: bool,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let manifest = Manifest::load(file)?;
    let mut state = driver.load_state().await?;
    if refresh {
        // Refreshing writes the state, so it needs the lock.
        let lock = driver.lock().await?;
        let refreshed = driver.refresh(&mut state, None).await;
        driver.unlock(&lock).await;
        refreshed?;
    }

    let plan = driver.plan(&manifest, &state).await?;
    emit(&formatter.format_plan(&plan, driver.provider().registry()))?;
    Ok(!plan.has_errors())
}

async fn cmd_apply(
    driver: &Driver<LocalStateStore>,
    file: &Path,
    auto_approve: bool,
    refresh: bool,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let manifest = Manifest::load(file)?;
    let mut state = driver.load_state().await?;
    if refresh {
        driver.refresh(&mut state, None).await?;
    }

    let plan = driver.plan(&manifest, &state).await?;
    emit(&formatter.format_plan(&plan, driver.provider().registry()))?;

    if plan.has_errors() {
        eprintln!("Plan has errors, nothing was applied.");
        return Ok(false);
    }
    if plan.is_empty() {
        return Ok(true);
    }
    if !auto_approve && !confirm("Do you want to apply this plan?")? {
        eprintln!("Apply cancelled.");
        return Ok(true);
    }

    let report = driver.execute(plan, &mut state).await?;
    emit(&formatter.format_report(&report))?;
    Ok(report.success())
}

async fn cmd_refresh(
    driver: &Driver<LocalStateStore>,
    target: Option<&str>,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let mut state = driver.load_state().await?;
    let report = driver.refresh(&mut state, target).await?;
    emit(&formatter.format_report(&report))?;
    Ok(report.success())
}

async fn cmd_destroy(
    driver: &Driver<LocalStateStore>,
    target: Option<&str>,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let mut state = driver.load_state().await?;
    let plan = driver.plan_destroy(&state, target);
    if plan.steps.is_empty() {
        eprintln!("Nothing to destroy.");
        return Ok(true);
    }

    emit(&formatter.format_plan(&plan, driver.provider().registry()))?;
    if !auto_approve && !confirm("Do you really want to destroy these resources?")? {
        eprintln!("Destroy cancelled.");
        return Ok(true);
    }

    let report = driver.execute(plan, &mut state).await?;
    emit(&formatter.format_report(&report))?;
    Ok(report.success())
}
