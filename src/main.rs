use std::env;
use std::path::PathBuf;

use clap::Parser;
use dialoguer::{Input, Password};
use tracing_subscriber::EnvFilter;

use lmboot::bootstrap::{bootstrap_fleet, BootstrapOutcome, FleetReport};
use lmboot::client::http::HttpManagementApi;
use lmboot::config::init_config;
use lmboot::errors::{BootstrapError, BootstrapResult};
use lmboot::inventory::Inventory;
use lmboot::params::ParameterFailurePolicy;
use lmboot::secrets::{KempIdentity, RunSecrets, SecretSource};

/// Bootstrap a fleet of load balancer appliances into a known state.
#[derive(Parser)]
#[command(
    name = "lmboot",
    version,
    about = "Fleet bootstrap orchestrator for LoadMaster-class appliances",
    long_about = "Drives each appliance's management API through license \
                  detection, EULA acceptance, online activation, credential \
                  establishment, parameter configuration and interface \
                  assignment. Appliances are processed one at a time; a \
                  failure on one never blocks the rest of the fleet."
)]
struct Cli {
    /// Inventory file (TOML or JSON) listing appliances and parameters
    #[arg(short, long)]
    inventory: PathBuf,

    /// Override the configured per-parameter failure policy
    #[arg(long, value_enum)]
    parameter_policy: Option<ParameterFailurePolicy>,

    /// Log at debug level (EULA text and tokens become visible)
    #[arg(short, long)]
    verbose: bool,
}

/// Secrets from the environment, falling back to interactive prompts.
///
/// Prompting happens at most once per secret per run: the admin password is
/// resolved before orchestration starts, the KEMP identity only if some
/// appliance actually needs activation.
struct PromptSecretSource;

impl SecretSource for PromptSecretSource {
    fn admin_password(&self) -> BootstrapResult<String> {
        if let Ok(password) = env::var("LMBOOT_ADMIN_PASSWORD") {
            return Ok(password);
        }

        Password::new()
            .with_prompt("Administrative password for 'bal'")
            .with_confirmation("Confirm password", "Passwords do not match")
            .interact()
            .map_err(|e| BootstrapError::Secret(e.to_string()))
    }

    fn kemp_identity(&self) -> BootstrapResult<KempIdentity> {
        let id = match env::var("LMBOOT_KEMP_ID") {
            Ok(id) => id,
            Err(_) => Input::<String>::new()
                .with_prompt("KEMP ID for online activation")
                .interact_text()
                .map_err(|e| BootstrapError::Secret(e.to_string()))?,
        };

        let password = match env::var("LMBOOT_KEMP_PASSWORD") {
            Ok(password) => password,
            Err(_) => Password::new()
                .with_prompt("KEMP password")
                .interact()
                .map_err(|e| BootstrapError::Secret(e.to_string()))?,
        };

        Ok(KempIdentity::new(id, password))
    }
}

fn print_summary(report: &FleetReport) {
    println!();
    println!("Bootstrap summary");
    println!("───────────────────────────────────────────");
    for appliance in &report.reports {
        match &appliance.outcome {
            BootstrapOutcome::Completed {
                already_licensed,
                warnings,
            } => {
                let note = if *already_licensed {
                    " (was already licensed)"
                } else {
                    ""
                };
                println!("[DONE]   {}{}", appliance.hostname, note);
                for warning in warnings {
                    println!("         warning: parameter '{}': {}", warning.name, warning.error);
                }
            }
            BootstrapOutcome::Failed { step, error } => {
                println!("[FAILED] {} at {}: {}", appliance.hostname, step, error);
            }
        }
    }
    println!("───────────────────────────────────────────");
    println!(
        "{} appliance(s), {} failed",
        report.reports.len(),
        report.failed_count()
    );
}

#[tokio::main]
async fn main() -> BootstrapResult<()> {
    let cli = Cli::parse();

    let config = init_config()?;

    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&level).map_err(|e| BootstrapError::Config(e.to_string()))?,
        )
        .init();

    let inventory = Inventory::load(&cli.inventory)?;
    inventory.validate()?;

    let secrets = RunSecrets::resolve(PromptSecretSource)?;
    let api = HttpManagementApi::from_config(&config.api)?;

    let policy = cli
        .parameter_policy
        .unwrap_or(config.policy.parameter_failure);

    let report = bootstrap_fleet(&api, &inventory, &secrets, policy, config.api.port).await?;

    print_summary(&report);

    if !report.all_succeeded() {
        std::process::exit(1);
    }

    Ok(())
}
