//! Bulk parameter application.
//!
//! The hostname is the same primitive as any other parameter but is always
//! applied first: downstream tooling keys off appliance identity, so identity
//! must be set before anything else. Each parameter application is an
//! independent call with no batch atomicity; what a single failure does is a
//! policy choice, not a guess.

use serde::Deserialize;
use tracing::{info, warn};

use crate::client::api::ManagementApi;
use crate::client::connection::ConnectionTarget;
use crate::client::credentials::Credential;
use crate::errors::BootstrapResult;
use crate::inventory::Parameter;

/// Parameter name carrying the appliance's display name.
pub const HOSTNAME_PARAMETER: &str = "hostname";

/// What to do when a single parameter fails to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ParameterFailurePolicy {
    /// Fail the appliance's bootstrap on the first parameter failure.
    Abort,
    /// Record the failure as a warning and keep applying the rest.
    Continue,
}

/// A non-fatal parameter failure recorded under the `Continue` policy.
#[derive(Debug, Clone)]
pub struct ParameterWarning {
    pub name: String,
    pub error: String,
}

/// Apply the hostname parameter. Always the first authenticated write.
pub async fn apply_hostname<A: ManagementApi>(
    api: &A,
    target: &ConnectionTarget,
    credential: &Credential,
    hostname: &str,
) -> BootstrapResult<()> {
    api.set_parameter(target, credential, HOSTNAME_PARAMETER, hostname)
        .await?;
    info!(appliance = %target, hostname, "hostname set");
    Ok(())
}

/// Apply the uniform parameter list, honoring the failure policy.
///
/// Under `Abort` the first failure propagates; under `Continue` failures are
/// collected as warnings and the remaining parameters are still applied.
pub async fn apply_parameters<A: ManagementApi>(
    api: &A,
    target: &ConnectionTarget,
    credential: &Credential,
    parameters: &[Parameter],
    policy: ParameterFailurePolicy,
) -> BootstrapResult<Vec<ParameterWarning>> {
    let mut warnings = Vec::new();

    for parameter in parameters {
        match api
            .set_parameter(target, credential, &parameter.name, &parameter.value)
            .await
        {
            Ok(()) => {}
            Err(err) => match policy {
                ParameterFailurePolicy::Abort => return Err(err),
                ParameterFailurePolicy::Continue => {
                    warn!(
                        appliance = %target,
                        parameter = %parameter.name,
                        error = %err,
                        "parameter not applied, continuing"
                    );
                    warnings.push(ParameterWarning {
                        name: parameter.name.clone(),
                        error: err.to_string(),
                    });
                }
            },
        }
    }

    Ok(warnings)
}
