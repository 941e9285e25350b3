//! Static appliance inventory: the declarative input to a bootstrap run.
//!
//! The inventory file lists the appliances to bootstrap and the parameter set
//! applied uniformly to all of them. It is read once, validated up front, and
//! never written back. Validation happens before any network call so that a
//! malformed entry cannot leave an appliance half-configured.

use std::net::IpAddr;
use std::path::Path;

use serde::Deserialize;

use crate::errors::{BootstrapError, BootstrapResult};

/// Interface id of the distinguished management interface.
pub const MANAGEMENT_INTERFACE_ID: u32 = 0;

/// One managed appliance, as declared in the inventory file.
#[derive(Debug, Clone, Deserialize)]
pub struct Appliance {
    /// Desired display name, set once during bootstrap.
    pub hostname: String,
    /// Management address the appliance is initially reachable at.
    pub address: String,
    /// Management API port. Falls back to `api.port` from the config when absent.
    #[serde(default)]
    pub management_port: Option<u16>,
    /// Ordered interface assignments. The management interface (id 0) causes
    /// a live retarget of the connection when applied.
    #[serde(default)]
    pub interfaces: Vec<InterfaceAssignment>,
}

/// One interface configuration fact.
#[derive(Debug, Clone, Deserialize)]
pub struct InterfaceAssignment {
    pub interface_id: u32,
    /// IP address plus prefix length, e.g. "10.0.1.31/24".
    pub cidr_address: String,
}

impl InterfaceAssignment {
    pub fn is_management(&self) -> bool {
        self.interface_id == MANAGEMENT_INTERFACE_ID
    }
}

/// A name/value pair applied uniformly to every appliance.
#[derive(Debug, Clone, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

/// The full declarative input to a run.
#[derive(Debug, Clone, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub appliances: Vec<Appliance>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

/// Split a CIDR string into its IP portion and prefix length.
///
/// Returns a validation error for anything that is not `ip/prefix` with a
/// parsable address and an in-range prefix.
pub fn parse_cidr(cidr: &str) -> BootstrapResult<(IpAddr, u8)> {
    let (ip_part, prefix_part) = cidr.split_once('/').ok_or_else(|| {
        BootstrapError::validation("cidr_address", format!("'{cidr}' is missing '/prefix'"))
    })?;

    let ip: IpAddr = ip_part.parse().map_err(|_| {
        BootstrapError::validation("cidr_address", format!("'{ip_part}' is not a valid IP address"))
    })?;

    let prefix: u8 = prefix_part.parse().map_err(|_| {
        BootstrapError::validation(
            "cidr_address",
            format!("'{prefix_part}' is not a valid prefix length"),
        )
    })?;

    let max_prefix = if ip.is_ipv4() { 32 } else { 128 };
    if prefix > max_prefix {
        return Err(BootstrapError::validation(
            "cidr_address",
            format!("prefix /{prefix} out of range for {ip}"),
        ));
    }

    Ok((ip, prefix))
}

/// The IP portion of a CIDR string, without the prefix length.
pub fn ip_portion(cidr: &str) -> BootstrapResult<String> {
    let (ip, _) = parse_cidr(cidr)?;
    Ok(ip.to_string())
}

impl Appliance {
    /// Validate one appliance entry without touching the network.
    ///
    /// Checks the hostname, the initial management address, every interface
    /// CIDR, and that at most one interface claims the management id.
    pub fn validate(&self) -> BootstrapResult<()> {
        if self.hostname.trim().is_empty() {
            return Err(BootstrapError::validation("hostname", "must not be empty"));
        }

        if self.address.parse::<IpAddr>().is_err() {
            return Err(BootstrapError::validation(
                "address",
                format!("'{}' is not a valid IP address", self.address),
            ));
        }

        let mut management_seen = false;
        for iface in &self.interfaces {
            parse_cidr(&iface.cidr_address)?;
            if iface.is_management() {
                if management_seen {
                    return Err(BootstrapError::validation(
                        "interfaces",
                        format!(
                            "appliance '{}' declares more than one management interface",
                            self.hostname
                        ),
                    ));
                }
                management_seen = true;
            }
        }

        Ok(())
    }
}

impl Inventory {
    /// Load an inventory from a TOML or JSON file.
    pub fn load(path: &Path) -> BootstrapResult<Self> {
        let source = config::File::from(path);
        let settings = config::Config::builder()
            .add_source(source)
            .build()
            .map_err(|e| BootstrapError::Inventory(format!("failed to read inventory: {e}")))?;

        let inventory: Inventory = settings.try_deserialize().map_err(|e| {
            BootstrapError::Inventory(format!("failed to deserialize inventory: {e}"))
        })?;

        Ok(inventory)
    }

    /// Validate the whole fleet file before any orchestration starts.
    ///
    /// Individual appliance validation is also re-checked per appliance at
    /// bootstrap time; this pass additionally rejects duplicate hostnames.
    pub fn validate(&self) -> BootstrapResult<()> {
        let mut seen = std::collections::HashSet::new();
        for appliance in &self.appliances {
            appliance.validate()?;
            if !seen.insert(appliance.hostname.as_str()) {
                return Err(BootstrapError::validation(
                    "hostname",
                    format!("duplicate appliance hostname '{}'", appliance.hostname),
                ));
            }
        }

        for parameter in &self.parameters {
            if parameter.name.trim().is_empty() {
                return Err(BootstrapError::validation(
                    "parameters",
                    "parameter name must not be empty",
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn appliance(interfaces: Vec<InterfaceAssignment>) -> Appliance {
        Appliance {
            hostname: "KEMP1".to_string(),
            address: "10.0.1.109".to_string(),
            management_port: None,
            interfaces,
        }
    }

    fn iface(id: u32, cidr: &str) -> InterfaceAssignment {
        InterfaceAssignment {
            interface_id: id,
            cidr_address: cidr.to_string(),
        }
    }

    #[test]
    fn parse_cidr_accepts_ipv4() {
        let (ip, prefix) = parse_cidr("10.0.1.31/24").unwrap();
        assert_eq!(ip.to_string(), "10.0.1.31");
        assert_eq!(prefix, 24);
    }

    #[test]
    fn parse_cidr_rejects_missing_slash() {
        let err = parse_cidr("10.0.1.31").unwrap_err();
        assert!(matches!(err, BootstrapError::Validation { .. }));
    }

    #[test]
    fn parse_cidr_rejects_bad_ip_and_prefix() {
        assert!(parse_cidr("10.0.1/24").is_err());
        assert!(parse_cidr("10.0.1.31/33").is_err());
        assert!(parse_cidr("10.0.1.31/abc").is_err());
    }

    #[test]
    fn ip_portion_strips_prefix() {
        assert_eq!(ip_portion("10.0.1.31/24").unwrap(), "10.0.1.31");
    }

    #[test]
    fn appliance_with_two_management_interfaces_rejected() {
        let a = appliance(vec![iface(0, "10.0.1.31/24"), iface(0, "10.0.2.31/24")]);
        let err = a.validate().unwrap_err();
        assert!(err.to_string().contains("management"));
    }

    #[test]
    fn appliance_with_ordinary_interfaces_validates() {
        let a = appliance(vec![iface(0, "10.0.1.31/24"), iface(1, "10.0.2.31/24")]);
        assert!(a.validate().is_ok());
    }

    #[test]
    fn empty_hostname_rejected() {
        let mut a = appliance(vec![]);
        a.hostname = "  ".to_string();
        assert!(a.validate().is_err());
    }

    #[test]
    fn duplicate_hostnames_rejected() {
        let inventory = Inventory {
            appliances: vec![appliance(vec![]), appliance(vec![])],
            parameters: vec![],
        };
        let err = inventory.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }
}
