//! The mutable connection target for one appliance.
//!
//! The appliance's reachable management address changes live when the
//! management interface is reassigned mid-bootstrap. Rather than mutating
//! ambient state, the target is an explicit value threaded through every
//! call, and retargeting is an explicit, loggable transition.

use crate::inventory::Appliance;

/// Where the management API of one appliance is currently reachable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    address: String,
    port: u16,
}

impl ConnectionTarget {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    /// Build the initial target for an appliance, falling back to the given
    /// default port when the inventory does not specify one.
    pub fn for_appliance(appliance: &Appliance, default_port: u16) -> Self {
        Self::new(
            appliance.address.clone(),
            appliance.management_port.unwrap_or(default_port),
        )
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Base URL for management API requests against the current address.
    pub fn base_url(&self) -> String {
        format!("https://{}:{}", self.address, self.port)
    }

    /// Point all subsequent calls at a new address. The port is unchanged;
    /// only the management interface address moves during bootstrap.
    pub fn retarget(&mut self, new_address: impl Into<String>) {
        self.address = new_address.into();
    }
}

impl std::fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_uses_current_address() {
        let target = ConnectionTarget::new("10.0.1.109", 443);
        assert_eq!(target.base_url(), "https://10.0.1.109:443");
    }

    #[test]
    fn retarget_replaces_address_keeps_port() {
        let mut target = ConnectionTarget::new("10.0.1.109", 8443);
        target.retarget("10.0.1.31");
        assert_eq!(target.address(), "10.0.1.31");
        assert_eq!(target.port(), 8443);
        assert_eq!(target.to_string(), "10.0.1.31:8443");
    }
}
