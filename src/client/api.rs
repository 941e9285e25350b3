//! The management API contract for one appliance.
//!
//! [`ManagementApi`] is the single I/O seam of the orchestrator: the state
//! machine only ever talks to an appliance through this trait. The HTTP
//! implementation lives in [`crate::client::http`]; the scenario tests drive
//! the same state machine against the in-memory simulator instead.

use serde::Deserialize;

use crate::client::connection::ConnectionTarget;
use crate::client::credentials::Credential;
use crate::errors::BootstrapResult;
use crate::secrets::KempIdentity;

/// License classification of an appliance, used purely to branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseState {
    Licensed,
    Unlicensed,
}

/// Answer to the license-state query.
#[derive(Debug, Clone, Deserialize)]
pub struct LicenseInfo {
    pub state: LicenseState,
    /// License type reported by an already-licensed appliance, if any.
    #[serde(default)]
    pub license_type: Option<String>,
}

/// One page of the EULA handshake: agreement text plus the opaque
/// correlation token ("magic") required by the next step.
#[derive(Debug, Clone, Deserialize)]
pub struct EulaPage {
    pub text: String,
    pub magic: String,
}

/// Authenticated, request/response access to one appliance's management API.
///
/// Every method targets whatever address the passed [`ConnectionTarget`]
/// currently holds; callers are responsible for retargeting it when the
/// management interface moves.
pub trait ManagementApi {
    /// Query the appliance's license state. The credential is optional:
    /// factory-fresh appliances answer the probe pre-authentication.
    fn query_license(
        &self,
        target: &ConnectionTarget,
        credential: Option<&Credential>,
    ) -> impl std::future::Future<Output = BootstrapResult<LicenseInfo>> + Send;

    /// Step 1 of the EULA handshake (pre-authentication).
    fn read_first_eula(
        &self,
        target: &ConnectionTarget,
    ) -> impl std::future::Future<Output = BootstrapResult<EulaPage>> + Send;

    /// Step 2: acknowledge EULA 1 with its magic token, receive EULA 2.
    fn confirm_first_eula(
        &self,
        target: &ConnectionTarget,
        magic: &str,
    ) -> impl std::future::Future<Output = BootstrapResult<EulaPage>> + Send;

    /// Step 3: final acceptance, keyed by the second magic token.
    fn confirm_second_eula(
        &self,
        target: &ConnectionTarget,
        magic: &str,
        accept: bool,
    ) -> impl std::future::Future<Output = BootstrapResult<()>> + Send;

    /// Retrieve and install a license from the online licensing service.
    fn activate_online(
        &self,
        target: &ConnectionTarget,
        kemp: &KempIdentity,
    ) -> impl std::future::Future<Output = BootstrapResult<()>> + Send;

    /// Establish the administrative password for the `bal` principal.
    fn set_initial_password(
        &self,
        target: &ConnectionTarget,
        password: &str,
    ) -> impl std::future::Future<Output = BootstrapResult<()>> + Send;

    /// Set one named configuration parameter.
    fn set_parameter(
        &self,
        target: &ConnectionTarget,
        credential: &Credential,
        name: &str,
        value: &str,
    ) -> impl std::future::Future<Output = BootstrapResult<()>> + Send;

    /// Assign an address to one network interface.
    fn set_interface(
        &self,
        target: &ConnectionTarget,
        credential: &Credential,
        interface_id: u32,
        cidr_address: &str,
    ) -> impl std::future::Future<Output = BootstrapResult<()>> + Send;
}
