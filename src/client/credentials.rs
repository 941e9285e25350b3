//! Credentials for the appliance management API.
//!
//! A [`Credential`] is an immutable principal/secret pair. Establishing the
//! initial appliance password does not mutate the credential in place; it
//! produces a new value through [`CredentialStore::rotate`], so which
//! credential authenticated any given call stays auditable in tests.

use crate::errors::{BootstrapError, BootstrapResult};

/// Administrative principal on the appliance.
pub const ADMIN_PRINCIPAL: &str = "bal";

/// An immutable principal/secret pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    principal: String,
    secret: String,
}

impl Credential {
    pub fn new(principal: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            secret: secret.into(),
        }
    }

    /// The run's administrative credential for the `bal` principal.
    pub fn admin(secret: impl Into<String>) -> Self {
        Self::new(ADMIN_PRINCIPAL, secret)
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

// Secrets must never appear in logs or debug dumps.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("principal", &self.principal)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Holds the single current credential for one appliance bootstrap.
///
/// The store starts empty: a factory-fresh appliance has no working
/// credential until its initial password is established. Attempting an
/// authenticated call before then is a sequence error, not a transport one.
#[derive(Debug, Default)]
pub struct CredentialStore {
    current: Option<Credential>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held credential with a new value and return it.
    pub fn rotate(&mut self, credential: Credential) -> &Credential {
        self.current = Some(credential);
        self.current.as_ref().expect("credential was just stored")
    }

    /// The current credential, or a sequence error if none is held yet.
    pub fn current(&self) -> BootstrapResult<&Credential> {
        self.current.as_ref().ok_or_else(|| {
            BootstrapError::Sequence(
                "authenticated call attempted before a credential was established".to_string(),
            )
        })
    }

    pub fn is_established(&self) -> bool {
        self.current.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secret() {
        let credential = Credential::admin("hunter2");
        let dump = format!("{credential:?}");
        assert!(dump.contains("bal"));
        assert!(!dump.contains("hunter2"));
        assert!(dump.contains("<redacted>"));
    }

    #[test]
    fn store_starts_empty() {
        let store = CredentialStore::new();
        assert!(!store.is_established());
        assert!(matches!(
            store.current(),
            Err(BootstrapError::Sequence(_))
        ));
    }

    #[test]
    fn rotate_replaces_not_merges() {
        let mut store = CredentialStore::new();
        store.rotate(Credential::new("bal", "first"));
        store.rotate(Credential::new("bal", "second"));
        assert_eq!(store.current().unwrap().secret(), "second");
    }
}
