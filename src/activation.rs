//! Online license activation and initial credential establishment.
//!
//! Both steps run only for appliances detected as unlicensed, strictly after
//! the EULA handshake. Activation needs the KEMP identity (resolved at most
//! once per run, see [`crate::secrets`]); password establishment rotates the
//! working credential, invalidating whatever authenticated the detection
//! probe.

use tracing::info;

use crate::client::api::ManagementApi;
use crate::client::connection::ConnectionTarget;
use crate::client::credentials::Credential;
use crate::errors::BootstrapResult;
use crate::secrets::KempIdentity;

/// Retrieve and install a license from the online licensing service.
pub async fn activate_online<A: ManagementApi>(
    api: &A,
    target: &ConnectionTarget,
    kemp: &KempIdentity,
) -> BootstrapResult<()> {
    api.activate_online(target, kemp).await?;
    info!(appliance = %target, "online license activation complete");
    Ok(())
}

/// Establish the administrative password for the `bal` principal and return
/// the credential every later call must authenticate with.
///
/// Called exactly once per unlicensed appliance. The returned value is a new
/// credential, not a mutation of any prior one.
pub async fn establish_initial_password<A: ManagementApi>(
    api: &A,
    target: &ConnectionTarget,
    admin_password: &str,
) -> BootstrapResult<Credential> {
    api.set_initial_password(target, admin_password).await?;
    info!(appliance = %target, "initial administrative password established");
    Ok(Credential::admin(admin_password.to_string()))
}
