//! The per-appliance bootstrap state machine and the fleet runner.
//!
//! One appliance at a time, strictly sequential:
//!
//! ```text
//! validate -> detect license -> [unlicensed: EULA -> activate -> password]
//!          -> hostname -> parameters -> interfaces -> done
//! ```
//!
//! Already-licensed appliances skip straight from detection to hostname, so
//! re-running the tool against a bootstrapped fleet is a no-op beyond the
//! configuration writes. A failure is terminal for the current appliance
//! only; the fleet runner reports it and moves to the next inventory entry.

use tracing::{error, info};

use crate::activation::{activate_online, establish_initial_password};
use crate::client::api::{LicenseState, ManagementApi};
use crate::client::connection::ConnectionTarget;
use crate::client::credentials::CredentialStore;
use crate::errors::{BootstrapError, BootstrapResult};
use crate::eula::run_eula_handshake;
use crate::interfaces::apply_interfaces;
use crate::inventory::{Appliance, Inventory, Parameter};
use crate::params::{apply_hostname, apply_parameters, ParameterFailurePolicy, ParameterWarning};
use crate::secrets::{RunSecrets, SecretSource};

/// The step an appliance's bootstrap was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Validate,
    DetectLicense,
    EulaHandshake,
    ActivateOnline,
    EstablishPassword,
    SetHostname,
    ApplyParameters,
    ApplyInterfaces,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Step::Validate => "validate",
            Step::DetectLicense => "detect-license",
            Step::EulaHandshake => "eula-handshake",
            Step::ActivateOnline => "activate-online",
            Step::EstablishPassword => "establish-password",
            Step::SetHostname => "set-hostname",
            Step::ApplyParameters => "apply-parameters",
            Step::ApplyInterfaces => "apply-interfaces",
        };
        write!(f, "{s}")
    }
}

/// Terminal result for one appliance.
#[derive(Debug)]
pub enum BootstrapOutcome {
    Completed {
        /// Detection found the appliance licensed, so licensing steps were
        /// skipped entirely.
        already_licensed: bool,
        /// Non-fatal parameter failures recorded under the `Continue` policy.
        warnings: Vec<ParameterWarning>,
    },
    Failed {
        step: Step,
        error: BootstrapError,
    },
}

/// One appliance's bootstrap result.
#[derive(Debug)]
pub struct ApplianceReport {
    pub hostname: String,
    pub outcome: BootstrapOutcome,
}

impl ApplianceReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, BootstrapOutcome::Completed { .. })
    }
}

/// Results for the whole run.
#[derive(Debug, Default)]
pub struct FleetReport {
    pub reports: Vec<ApplianceReport>,
}

impl FleetReport {
    pub fn failed_count(&self) -> usize {
        self.reports.iter().filter(|r| !r.succeeded()).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed_count() == 0
    }
}

/// Everything a run shares across appliances, read-only.
pub struct RunContext<'a, S> {
    pub parameters: &'a [Parameter],
    pub secrets: &'a RunSecrets<S>,
    pub parameter_policy: ParameterFailurePolicy,
    /// Management port for appliances whose inventory entry has none.
    pub default_port: u16,
}

/// Bootstrap a single appliance through the full state machine.
///
/// Never panics and never returns `Err`: every failure is folded into the
/// report so the caller can simply continue with the next appliance.
pub async fn bootstrap_appliance<A, S>(
    api: &A,
    appliance: &Appliance,
    run: &RunContext<'_, S>,
) -> ApplianceReport
where
    A: ManagementApi,
    S: SecretSource,
{
    let fail = |step: Step, error: BootstrapError| {
        error!(appliance = %appliance.hostname, step = %step, %error, "bootstrap failed");
        ApplianceReport {
            hostname: appliance.hostname.clone(),
            outcome: BootstrapOutcome::Failed { step, error },
        }
    };

    // Malformed inventory must surface before any network call.
    if let Err(err) = appliance.validate() {
        return fail(Step::Validate, err);
    }

    let mut target = ConnectionTarget::for_appliance(appliance, run.default_port);
    let mut credentials = CredentialStore::new();
    let admin_credential = run.secrets.admin_credential();

    info!(appliance = %appliance.hostname, address = %target, "bootstrap started");

    // Classify first. A transport failure here is fatal, never "unlicensed".
    let license = match api.query_license(&target, Some(&admin_credential)).await {
        Ok(info) => info,
        Err(err) => return fail(Step::DetectLicense, err),
    };

    let already_licensed = match license.state {
        LicenseState::Licensed => {
            info!(appliance = %appliance.hostname, "already licensed, skipping licensing steps");
            credentials.rotate(admin_credential);
            true
        }
        LicenseState::Unlicensed => {
            // Two-phase EULA handshake, pre-authentication.
            if let Err(err) = run_eula_handshake(api, &target).await {
                return fail(Step::EulaHandshake, err);
            }

            // Online activation. The KEMP identity is resolved here,
            // lazily, so a fully-licensed fleet never asks for it.
            let kemp = match run.secrets.kemp() {
                Ok(kemp) => kemp,
                Err(err) => return fail(Step::ActivateOnline, err),
            };
            if let Err(err) = activate_online(api, &target, kemp).await {
                return fail(Step::ActivateOnline, err);
            }

            // Establish the admin password, then rotate. Everything
            // after this line authenticates with the new credential.
            match establish_initial_password(api, &target, run.secrets.admin_password()).await {
                Ok(rotated) => {
                    credentials.rotate(rotated);
                }
                Err(err) => return fail(Step::EstablishPassword, err),
            }
            false
        }
    };

    let credential = match credentials.current() {
        Ok(credential) => credential,
        Err(err) => return fail(Step::SetHostname, err),
    };

    // Identity first, always before the generic parameter list.
    if let Err(err) = apply_hostname(api, &target, credential, &appliance.hostname).await {
        return fail(Step::SetHostname, err);
    }

    // Uniform parameters, per configured failure policy.
    let warnings = match apply_parameters(
        api,
        &target,
        credential,
        run.parameters,
        run.parameter_policy,
    )
    .await
    {
        Ok(warnings) => warnings,
        Err(err) => return fail(Step::ApplyParameters, err),
    };

    // Interfaces, retargeting mid-loop when the management address moves.
    if let Err(err) = apply_interfaces(api, &mut target, credential, &appliance.interfaces).await {
        return fail(Step::ApplyInterfaces, err);
    }

    info!(appliance = %appliance.hostname, "bootstrap complete");
    ApplianceReport {
        hostname: appliance.hostname.clone(),
        outcome: BootstrapOutcome::Completed {
            already_licensed,
            warnings,
        },
    }
}

/// Bootstrap every appliance in the inventory, strictly sequentially.
///
/// A failed appliance never blocks the rest of the fleet.
pub async fn bootstrap_fleet<A, S>(
    api: &A,
    inventory: &Inventory,
    secrets: &RunSecrets<S>,
    parameter_policy: ParameterFailurePolicy,
    default_port: u16,
) -> BootstrapResult<FleetReport>
where
    A: ManagementApi,
    S: SecretSource,
{
    inventory.validate()?;

    let run = RunContext {
        parameters: &inventory.parameters,
        secrets,
        parameter_policy,
        default_port,
    };

    let mut report = FleetReport::default();
    for appliance in &inventory.appliances {
        let appliance_report = bootstrap_appliance(api, appliance, &run).await;
        report.reports.push(appliance_report);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_display_names() {
        assert_eq!(Step::DetectLicense.to_string(), "detect-license");
        assert_eq!(Step::EulaHandshake.to_string(), "eula-handshake");
        assert_eq!(Step::ApplyInterfaces.to_string(), "apply-interfaces");
    }

    #[test]
    fn fleet_report_counts_failures() {
        let report = FleetReport {
            reports: vec![
                ApplianceReport {
                    hostname: "A".into(),
                    outcome: BootstrapOutcome::Completed {
                        already_licensed: false,
                        warnings: vec![],
                    },
                },
                ApplianceReport {
                    hostname: "B".into(),
                    outcome: BootstrapOutcome::Failed {
                        step: Step::DetectLicense,
                        error: BootstrapError::Transport("refused".into()),
                    },
                },
            ],
        };
        assert_eq!(report.failed_count(), 1);
        assert!(!report.all_succeeded());
    }
}
