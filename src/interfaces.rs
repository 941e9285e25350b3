//! Per-interface address assignment, including the management retarget.
//!
//! Assignments are applied in inventory order. When the management interface
//! (id 0) is successfully reassigned, the connection target is repointed at
//! the new address *inside the loop*: interfaces after it in the same list
//! must already be addressed at the appliance's new management address, or
//! they would be sent to an address the appliance no longer answers on.

use tracing::info;

use crate::client::api::ManagementApi;
use crate::client::connection::ConnectionTarget;
use crate::client::credentials::Credential;
use crate::errors::BootstrapResult;
use crate::inventory::{ip_portion, InterfaceAssignment};

/// Apply every interface assignment for one appliance.
///
/// All CIDRs must have been validated before this is called; parsing here can
/// only fail on inventory that skipped validation, and it fails before the
/// corresponding network call is made. Any interface failure is fatal for the
/// appliance.
pub async fn apply_interfaces<A: ManagementApi>(
    api: &A,
    target: &mut ConnectionTarget,
    credential: &Credential,
    interfaces: &[InterfaceAssignment],
) -> BootstrapResult<()> {
    for assignment in interfaces {
        // Resolved before the call so a malformed entry cannot leave the
        // interface set and the tracked address out of step.
        let new_management_ip = if assignment.is_management() {
            Some(ip_portion(&assignment.cidr_address)?)
        } else {
            None
        };

        api.set_interface(
            target,
            credential,
            assignment.interface_id,
            &assignment.cidr_address,
        )
        .await?;

        if let Some(ip) = new_management_ip {
            info!(
                appliance = %target,
                new_address = %ip,
                "management interface moved, retargeting"
            );
            target.retarget(ip);
        }
    }

    Ok(())
}
