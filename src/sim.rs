//! In-memory appliance simulator.
//!
//! Stands in for a real appliance behind the [`ManagementApi`] seam, the way
//! a simulated license database stands in for a licensing server. The
//! simulator models the pieces of appliance behavior the orchestrator
//! depends on:
//!
//! - license state, EULA progression and magic-token checking,
//! - password establishment and credential checking on authenticated calls,
//! - *reachability*: a call addressed to anything other than the appliance's
//!   current management address fails with a transport error, which is what
//!   makes the mid-loop retarget observable in tests,
//! - a full call log for ordering and addressing assertions.
//!
//! Failure injection (`fail_on`) turns any single command into an HTTP 500.

use std::sync::Mutex;

use crate::client::api::{EulaPage, LicenseInfo, LicenseState, ManagementApi};
use crate::client::connection::ConnectionTarget;
use crate::client::credentials::Credential;
use crate::errors::{BootstrapError, BootstrapResult};
use crate::inventory::ip_portion;
use crate::secrets::KempIdentity;

/// First-EULA correlation token handed out by the simulator.
pub const MAGIC_ONE: &str = "magic-f00d-0001";
/// Second-EULA correlation token handed out by the simulator.
pub const MAGIC_TWO: &str = "magic-f00d-0002";

/// One recorded API call.
#[derive(Debug, Clone)]
pub struct SimCall {
    /// Command name, e.g. "licensestate", "accepteula", "setip".
    pub command: String,
    /// Address the call was sent to.
    pub address: String,
    /// Credential the call carried, if any.
    pub credential: Option<(String, String)>,
    /// Command-specific detail: magic token, "name=value", "id cidr".
    pub detail: String,
}

#[derive(Debug)]
struct SimState {
    licensed: bool,
    first_eula_accepted: bool,
    second_eula_accepted: bool,
    admin_password: Option<String>,
    reachable_address: String,
    parameters: Vec<(String, String)>,
    interfaces: Vec<(u32, String)>,
    calls: Vec<SimCall>,
    fail_command: Option<String>,
    fail_detail: Option<String>,
}

/// A single simulated appliance.
#[derive(Debug)]
pub struct ApplianceSim {
    state: Mutex<SimState>,
}

impl ApplianceSim {
    /// A factory-fresh, unlicensed appliance reachable at `address`.
    pub fn unlicensed(address: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(SimState {
                licensed: false,
                first_eula_accepted: false,
                second_eula_accepted: false,
                admin_password: None,
                reachable_address: address.into(),
                parameters: Vec::new(),
                interfaces: Vec::new(),
                calls: Vec::new(),
                fail_command: None,
                fail_detail: None,
            }),
        }
    }

    /// An appliance that finished a previous bootstrap: licensed, with an
    /// established administrative password.
    pub fn licensed(address: impl Into<String>, admin_password: impl Into<String>) -> Self {
        let sim = Self::unlicensed(address);
        {
            let mut state = sim.state.lock().expect("sim lock poisoned");
            state.licensed = true;
            state.first_eula_accepted = true;
            state.second_eula_accepted = true;
            state.admin_password = Some(admin_password.into());
        }
        sim
    }

    /// Make the named command fail with an HTTP 500 on every attempt.
    pub fn fail_on(self, command: impl Into<String>) -> Self {
        self.state.lock().expect("sim lock poisoned").fail_command = Some(command.into());
        self
    }

    /// Like [`fail_on`](Self::fail_on), but only for calls whose detail
    /// contains `detail` (e.g. a single parameter name).
    pub fn fail_on_matching(self, command: impl Into<String>, detail: impl Into<String>) -> Self {
        {
            let mut state = self.state.lock().expect("sim lock poisoned");
            state.fail_command = Some(command.into());
            state.fail_detail = Some(detail.into());
        }
        self
    }

    pub fn calls(&self) -> Vec<SimCall> {
        self.state.lock().expect("sim lock poisoned").calls.clone()
    }

    pub fn calls_for(&self, command: &str) -> Vec<SimCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.command == command)
            .collect()
    }

    pub fn is_licensed(&self) -> bool {
        self.state.lock().expect("sim lock poisoned").licensed
    }

    pub fn admin_password(&self) -> Option<String> {
        self.state
            .lock()
            .expect("sim lock poisoned")
            .admin_password
            .clone()
    }

    pub fn reachable_address(&self) -> String {
        self.state
            .lock()
            .expect("sim lock poisoned")
            .reachable_address
            .clone()
    }

    pub fn parameters(&self) -> Vec<(String, String)> {
        self.state
            .lock()
            .expect("sim lock poisoned")
            .parameters
            .clone()
    }

    pub fn interfaces(&self) -> Vec<(u32, String)> {
        self.state
            .lock()
            .expect("sim lock poisoned")
            .interfaces
            .clone()
    }

    /// Record the call, then enforce reachability and failure injection.
    fn admit(
        state: &mut SimState,
        target: &ConnectionTarget,
        command: &str,
        credential: Option<&Credential>,
        detail: impl Into<String>,
    ) -> BootstrapResult<()> {
        state.calls.push(SimCall {
            command: command.to_string(),
            address: target.address().to_string(),
            credential: credential.map(|c| (c.principal().to_string(), c.secret().to_string())),
            detail: detail.into(),
        });

        if target.address() != state.reachable_address {
            return Err(BootstrapError::Transport(format!(
                "no route to {} (appliance answers at {})",
                target.address(),
                state.reachable_address
            )));
        }

        if state.fail_command.as_deref() == Some(command) {
            let detail_matches = match &state.fail_detail {
                Some(needle) => state
                    .calls
                    .last()
                    .map(|call| call.detail.contains(needle))
                    .unwrap_or(false),
                None => true,
            };
            if detail_matches {
                return Err(BootstrapError::Api {
                    command: command.to_string(),
                    status: 500,
                });
            }
        }

        Ok(())
    }

    /// Authenticated commands require the established password.
    fn authorize(state: &SimState, credential: &Credential, command: &str) -> BootstrapResult<()> {
        let established = state.admin_password.as_deref().ok_or(BootstrapError::Api {
            command: command.to_string(),
            status: 401,
        })?;

        if credential.principal() != "bal" || credential.secret() != established {
            return Err(BootstrapError::Api {
                command: command.to_string(),
                status: 401,
            });
        }

        Ok(())
    }
}

impl ManagementApi for ApplianceSim {
    async fn query_license(
        &self,
        target: &ConnectionTarget,
        credential: Option<&Credential>,
    ) -> BootstrapResult<LicenseInfo> {
        let mut state = self.state.lock().expect("sim lock poisoned");
        Self::admit(&mut state, target, "licensestate", credential, "")?;

        if state.licensed {
            // A bootstrapped appliance answers the probe only when the
            // credential matches; a factory-fresh one ignores it.
            let credential = credential.ok_or(BootstrapError::Api {
                command: "licensestate".to_string(),
                status: 401,
            })?;
            Self::authorize(&state, credential, "licensestate")?;
            Ok(LicenseInfo {
                state: LicenseState::Licensed,
                license_type: Some("perm".to_string()),
            })
        } else {
            Ok(LicenseInfo {
                state: LicenseState::Unlicensed,
                license_type: None,
            })
        }
    }

    async fn read_first_eula(&self, target: &ConnectionTarget) -> BootstrapResult<EulaPage> {
        let mut state = self.state.lock().expect("sim lock poisoned");
        Self::admit(&mut state, target, "readeula", None, "")?;

        Ok(EulaPage {
            text: "END USER LICENSE AGREEMENT (1 of 2)".to_string(),
            magic: MAGIC_ONE.to_string(),
        })
    }

    async fn confirm_first_eula(
        &self,
        target: &ConnectionTarget,
        magic: &str,
    ) -> BootstrapResult<EulaPage> {
        let mut state = self.state.lock().expect("sim lock poisoned");
        Self::admit(&mut state, target, "accepteula", None, magic)?;

        if magic != MAGIC_ONE {
            return Err(BootstrapError::Sequence(format!(
                "appliance rejected unknown magic token '{magic}'"
            )));
        }

        state.first_eula_accepted = true;
        Ok(EulaPage {
            text: "END USER LICENSE AGREEMENT (2 of 2)".to_string(),
            magic: MAGIC_TWO.to_string(),
        })
    }

    async fn confirm_second_eula(
        &self,
        target: &ConnectionTarget,
        magic: &str,
        accept: bool,
    ) -> BootstrapResult<()> {
        let mut state = self.state.lock().expect("sim lock poisoned");
        Self::admit(&mut state, target, "accepteula2", None, magic)?;

        if !state.first_eula_accepted {
            return Err(BootstrapError::Sequence(
                "second acceptance before first".to_string(),
            ));
        }
        if magic != MAGIC_TWO {
            return Err(BootstrapError::Sequence(format!(
                "appliance rejected unknown magic token '{magic}'"
            )));
        }
        if !accept {
            return Err(BootstrapError::Sequence(
                "rejection is not supported".to_string(),
            ));
        }

        state.second_eula_accepted = true;
        Ok(())
    }

    async fn activate_online(
        &self,
        target: &ConnectionTarget,
        kemp: &KempIdentity,
    ) -> BootstrapResult<()> {
        let mut state = self.state.lock().expect("sim lock poisoned");
        Self::admit(&mut state, target, "alicense", None, kemp.id().to_string())?;

        if !state.second_eula_accepted {
            return Err(BootstrapError::Sequence(
                "activation before EULA acceptance".to_string(),
            ));
        }

        state.licensed = true;
        Ok(())
    }

    async fn set_initial_password(
        &self,
        target: &ConnectionTarget,
        password: &str,
    ) -> BootstrapResult<()> {
        let mut state = self.state.lock().expect("sim lock poisoned");
        Self::admit(&mut state, target, "set_initpasswd", None, "")?;

        if !state.licensed {
            return Err(BootstrapError::Sequence(
                "password establishment before licensing".to_string(),
            ));
        }

        state.admin_password = Some(password.to_string());
        Ok(())
    }

    async fn set_parameter(
        &self,
        target: &ConnectionTarget,
        credential: &Credential,
        name: &str,
        value: &str,
    ) -> BootstrapResult<()> {
        let mut state = self.state.lock().expect("sim lock poisoned");
        Self::admit(
            &mut state,
            target,
            "set",
            Some(credential),
            format!("{name}={value}"),
        )?;
        Self::authorize(&state, credential, "set")?;

        state.parameters.push((name.to_string(), value.to_string()));
        Ok(())
    }

    async fn set_interface(
        &self,
        target: &ConnectionTarget,
        credential: &Credential,
        interface_id: u32,
        cidr_address: &str,
    ) -> BootstrapResult<()> {
        let mut state = self.state.lock().expect("sim lock poisoned");
        Self::admit(
            &mut state,
            target,
            "setip",
            Some(credential),
            format!("{interface_id} {cidr_address}"),
        )?;
        Self::authorize(&state, credential, "setip")?;

        state
            .interfaces
            .push((interface_id, cidr_address.to_string()));

        // Reassigning the management interface moves the appliance: it stops
        // answering on the old address immediately.
        if interface_id == 0 {
            state.reachable_address = ip_portion(cidr_address)?;
        }

        Ok(())
    }
}

/// A routable set of simulated appliances.
///
/// Calls are dispatched to whichever appliance currently answers on the
/// target address; anything else is a transport error, like the real network.
#[derive(Debug, Default)]
pub struct SimFleet {
    appliances: Vec<ApplianceSim>,
}

impl SimFleet {
    pub fn new(appliances: Vec<ApplianceSim>) -> Self {
        Self { appliances }
    }

    pub fn appliance(&self, index: usize) -> &ApplianceSim {
        &self.appliances[index]
    }

    fn route(&self, target: &ConnectionTarget) -> BootstrapResult<&ApplianceSim> {
        self.appliances
            .iter()
            .find(|sim| sim.reachable_address() == target.address())
            .ok_or_else(|| {
                BootstrapError::Transport(format!("no route to {}", target.address()))
            })
    }
}

impl ManagementApi for SimFleet {
    async fn query_license(
        &self,
        target: &ConnectionTarget,
        credential: Option<&Credential>,
    ) -> BootstrapResult<LicenseInfo> {
        self.route(target)?.query_license(target, credential).await
    }

    async fn read_first_eula(&self, target: &ConnectionTarget) -> BootstrapResult<EulaPage> {
        self.route(target)?.read_first_eula(target).await
    }

    async fn confirm_first_eula(
        &self,
        target: &ConnectionTarget,
        magic: &str,
    ) -> BootstrapResult<EulaPage> {
        self.route(target)?.confirm_first_eula(target, magic).await
    }

    async fn confirm_second_eula(
        &self,
        target: &ConnectionTarget,
        magic: &str,
        accept: bool,
    ) -> BootstrapResult<()> {
        self.route(target)?
            .confirm_second_eula(target, magic, accept)
            .await
    }

    async fn activate_online(
        &self,
        target: &ConnectionTarget,
        kemp: &KempIdentity,
    ) -> BootstrapResult<()> {
        self.route(target)?.activate_online(target, kemp).await
    }

    async fn set_initial_password(
        &self,
        target: &ConnectionTarget,
        password: &str,
    ) -> BootstrapResult<()> {
        self.route(target)?
            .set_initial_password(target, password)
            .await
    }

    async fn set_parameter(
        &self,
        target: &ConnectionTarget,
        credential: &Credential,
        name: &str,
        value: &str,
    ) -> BootstrapResult<()> {
        self.route(target)?
            .set_parameter(target, credential, name, value)
            .await
    }

    async fn set_interface(
        &self,
        target: &ConnectionTarget,
        credential: &Credential,
        interface_id: u32,
        cidr_address: &str,
    ) -> BootstrapResult<()> {
        self.route(target)?
            .set_interface(target, credential, interface_id, cidr_address)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(address: &str) -> ConnectionTarget {
        ConnectionTarget::new(address, 443)
    }

    #[tokio::test]
    async fn unlicensed_appliance_ignores_probe_credential() {
        let sim = ApplianceSim::unlicensed("10.0.1.109");
        let info = sim
            .query_license(&target("10.0.1.109"), Some(&Credential::admin("whatever")))
            .await
            .unwrap();
        assert_eq!(info.state, LicenseState::Unlicensed);
    }

    #[tokio::test]
    async fn licensed_appliance_rejects_wrong_probe_credential() {
        let sim = ApplianceSim::licensed("10.0.1.109", "rightpw");
        let err = sim
            .query_license(&target("10.0.1.109"), Some(&Credential::admin("wrongpw")))
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::Api { status: 401, .. }));
    }

    #[tokio::test]
    async fn stale_address_is_unreachable() {
        let sim = ApplianceSim::unlicensed("10.0.1.109");
        let err = sim.read_first_eula(&target("10.9.9.9")).await.unwrap_err();
        assert!(matches!(err, BootstrapError::Transport(_)));
    }

    #[tokio::test]
    async fn management_reassignment_moves_the_appliance() {
        let sim = ApplianceSim::licensed("10.0.1.109", "pw");
        let credential = Credential::admin("pw");

        sim.set_interface(&target("10.0.1.109"), &credential, 0, "10.0.1.31/24")
            .await
            .unwrap();

        assert_eq!(sim.reachable_address(), "10.0.1.31");
        // The old address no longer answers.
        let err = sim
            .set_interface(&target("10.0.1.109"), &credential, 1, "10.0.2.31/24")
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::Transport(_)));
    }

    #[tokio::test]
    async fn second_acceptance_requires_first() {
        let sim = ApplianceSim::unlicensed("10.0.1.109");
        let err = sim
            .confirm_second_eula(&target("10.0.1.109"), MAGIC_TWO, true)
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::Sequence(_)));
    }
}
