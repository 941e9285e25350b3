//! HTTPS implementation of the management API contract.
//!
//! Appliances expose their management API over HTTPS with self-signed
//! certificates; certificate verification is therefore off by default and
//! controlled by `api.verify_tls`. All requests are plain request/response
//! with basic authentication where a credential applies.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::client::api::{EulaPage, LicenseInfo, ManagementApi};
use crate::client::connection::ConnectionTarget;
use crate::client::credentials::Credential;
use crate::config::ApiConfig;
use crate::errors::{BootstrapError, BootstrapResult};
use crate::secrets::KempIdentity;

/// Reqwest-backed management API client, shared across all appliances in a
/// run. Per-appliance addressing comes from the [`ConnectionTarget`] passed
/// into each call.
#[derive(Debug, Clone)]
pub struct HttpManagementApi {
    http: Client,
}

#[derive(Debug, Serialize)]
struct MagicRequest<'a> {
    magic: &'a str,
}

#[derive(Debug, Serialize)]
struct AcceptRequest<'a> {
    magic: &'a str,
    accept: bool,
}

#[derive(Debug, Serialize)]
struct ActivateRequest<'a> {
    kemp_id: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct PasswordRequest<'a> {
    passwd: &'a str,
}

#[derive(Debug, Serialize)]
struct ParameterRequest<'a> {
    param: &'a str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct InterfaceRequest<'a> {
    interface: u32,
    address: &'a str,
}

impl HttpManagementApi {
    /// Build a client from the API section of the run configuration.
    pub fn from_config(config: &ApiConfig) -> BootstrapResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| BootstrapError::Transport(format!("failed to build client: {e}")))?;

        Ok(Self { http })
    }

    fn url(target: &ConnectionTarget, command: &str) -> String {
        format!("{}/access/{}", target.base_url(), command)
    }

    /// Issue a request and translate a non-success status into an API error.
    async fn check(
        command: &str,
        response: reqwest::Response,
    ) -> BootstrapResult<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            return Err(BootstrapError::Api {
                command: command.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

impl ManagementApi for HttpManagementApi {
    async fn query_license(
        &self,
        target: &ConnectionTarget,
        credential: Option<&Credential>,
    ) -> BootstrapResult<LicenseInfo> {
        let mut request = self.http.get(Self::url(target, "licensestate"));
        if let Some(credential) = credential {
            request = request.basic_auth(credential.principal(), Some(credential.secret()));
        }

        let response = Self::check("licensestate", request.send().await?).await?;
        let info: LicenseInfo = response.json().await.map_err(|e| {
            BootstrapError::Transport(format!("failed to parse license state: {e}"))
        })?;

        debug!(appliance = %target, state = ?info.state, "queried license state");
        Ok(info)
    }

    async fn read_first_eula(&self, target: &ConnectionTarget) -> BootstrapResult<EulaPage> {
        let response = self.http.get(Self::url(target, "readeula")).send().await?;
        let response = Self::check("readeula", response).await?;

        response
            .json()
            .await
            .map_err(|e| BootstrapError::Transport(format!("failed to parse EULA page: {e}")))
    }

    async fn confirm_first_eula(
        &self,
        target: &ConnectionTarget,
        magic: &str,
    ) -> BootstrapResult<EulaPage> {
        let response = self
            .http
            .post(Self::url(target, "accepteula"))
            .json(&MagicRequest { magic })
            .send()
            .await?;
        let response = Self::check("accepteula", response).await?;

        response
            .json()
            .await
            .map_err(|e| BootstrapError::Transport(format!("failed to parse EULA page: {e}")))
    }

    async fn confirm_second_eula(
        &self,
        target: &ConnectionTarget,
        magic: &str,
        accept: bool,
    ) -> BootstrapResult<()> {
        let response = self
            .http
            .post(Self::url(target, "accepteula2"))
            .json(&AcceptRequest { magic, accept })
            .send()
            .await?;
        Self::check("accepteula2", response).await?;
        Ok(())
    }

    async fn activate_online(
        &self,
        target: &ConnectionTarget,
        kemp: &KempIdentity,
    ) -> BootstrapResult<()> {
        let response = self
            .http
            .post(Self::url(target, "alicense"))
            .json(&ActivateRequest {
                kemp_id: kemp.id(),
                password: kemp.password(),
            })
            .send()
            .await?;
        Self::check("alicense", response).await?;
        Ok(())
    }

    async fn set_initial_password(
        &self,
        target: &ConnectionTarget,
        password: &str,
    ) -> BootstrapResult<()> {
        let response = self
            .http
            .post(Self::url(target, "set_initpasswd"))
            .json(&PasswordRequest { passwd: password })
            .send()
            .await?;
        Self::check("set_initpasswd", response).await?;
        Ok(())
    }

    async fn set_parameter(
        &self,
        target: &ConnectionTarget,
        credential: &Credential,
        name: &str,
        value: &str,
    ) -> BootstrapResult<()> {
        let response = self
            .http
            .post(Self::url(target, "set"))
            .basic_auth(credential.principal(), Some(credential.secret()))
            .json(&ParameterRequest { param: name, value })
            .send()
            .await?;
        Self::check("set", response).await?;
        Ok(())
    }

    async fn set_interface(
        &self,
        target: &ConnectionTarget,
        credential: &Credential,
        interface_id: u32,
        cidr_address: &str,
    ) -> BootstrapResult<()> {
        let response = self
            .http
            .post(Self::url(target, "setip"))
            .basic_auth(credential.principal(), Some(credential.secret()))
            .json(&InterfaceRequest {
                interface: interface_id,
                address: cidr_address,
            })
            .send()
            .await?;
        Self::check("setip", response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_urls_follow_access_prefix() {
        let target = ConnectionTarget::new("10.0.1.109", 443);
        assert_eq!(
            HttpManagementApi::url(&target, "licensestate"),
            "https://10.0.1.109:443/access/licensestate"
        );
    }

    #[test]
    fn client_builds_from_default_config() {
        let api = HttpManagementApi::from_config(&ApiConfig::default());
        assert!(api.is_ok());
    }
}
