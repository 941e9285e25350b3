//! Run-scoped secrets: the administrative password and the KEMP identity
//! used for online activation.
//!
//! Secrets are supplied once per run. The administrative password is resolved
//! before orchestration begins; the KEMP identity is only needed when at
//! least one appliance requires activation, so it is resolved lazily, at most
//! once, no matter how many appliances need it. Nothing here is persisted or
//! logged.

use std::sync::OnceLock;

use crate::client::credentials::Credential;
use crate::errors::BootstrapResult;

/// Identity used against the online licensing service.
#[derive(Clone, PartialEq, Eq)]
pub struct KempIdentity {
    id: String,
    password: String,
}

impl KempIdentity {
    pub fn new(id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            password: password.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for KempIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KempIdentity")
            .field("id", &self.id)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where secrets come from when they are first needed.
///
/// The binary implements this with environment-variable lookup falling back
/// to an interactive password prompt; tests implement it with fixed values.
pub trait SecretSource {
    fn admin_password(&self) -> BootstrapResult<String>;
    fn kemp_identity(&self) -> BootstrapResult<KempIdentity>;
}

/// Fixed secrets, for non-interactive runs and tests.
#[derive(Debug, Clone)]
pub struct StaticSecretSource {
    pub admin_password: String,
    pub kemp: KempIdentity,
}

impl SecretSource for StaticSecretSource {
    fn admin_password(&self) -> BootstrapResult<String> {
        Ok(self.admin_password.clone())
    }

    fn kemp_identity(&self) -> BootstrapResult<KempIdentity> {
        Ok(self.kemp.clone())
    }
}

/// The secrets for one bootstrap run.
///
/// The admin password is resolved eagerly at construction; the KEMP identity
/// is cached after its first resolution so the source is consulted at most
/// once per run.
pub struct RunSecrets<S> {
    admin_password: String,
    kemp: OnceLock<KempIdentity>,
    source: S,
}

impl<S: SecretSource> RunSecrets<S> {
    /// Resolve the up-front secrets and capture the source for lazy ones.
    pub fn resolve(source: S) -> BootstrapResult<Self> {
        let admin_password = source.admin_password()?;
        Ok(Self {
            admin_password,
            kemp: OnceLock::new(),
            source,
        })
    }

    pub fn admin_password(&self) -> &str {
        &self.admin_password
    }

    /// The credential every appliance should end up with.
    pub fn admin_credential(&self) -> Credential {
        Credential::admin(self.admin_password.clone())
    }

    /// The KEMP identity, resolved from the source on first use only.
    pub fn kemp(&self) -> BootstrapResult<&KempIdentity> {
        if let Some(identity) = self.kemp.get() {
            return Ok(identity);
        }

        let identity = self.source.kemp_identity()?;
        let _ = self.kemp.set(identity);

        Ok(self.kemp.get().expect("kemp identity was just set"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        kemp_calls: AtomicUsize,
    }

    impl SecretSource for CountingSource {
        fn admin_password(&self) -> BootstrapResult<String> {
            Ok("adminpw".to_string())
        }

        fn kemp_identity(&self) -> BootstrapResult<KempIdentity> {
            self.kemp_calls.fetch_add(1, Ordering::SeqCst);
            Ok(KempIdentity::new("ops@example.com", "kemppw"))
        }
    }

    #[test]
    fn kemp_identity_resolved_at_most_once() {
        let secrets = RunSecrets::resolve(CountingSource {
            kemp_calls: AtomicUsize::new(0),
        })
        .unwrap();

        assert_eq!(secrets.kemp().unwrap().id(), "ops@example.com");
        assert_eq!(secrets.kemp().unwrap().id(), "ops@example.com");
        assert_eq!(secrets.kemp().unwrap().id(), "ops@example.com");
        assert_eq!(secrets.source.kemp_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn admin_credential_uses_bal_principal() {
        let secrets = RunSecrets::resolve(StaticSecretSource {
            admin_password: "adminpw".to_string(),
            kemp: KempIdentity::new("id", "pw"),
        })
        .unwrap();

        let credential = secrets.admin_credential();
        assert_eq!(credential.principal(), "bal");
        assert_eq!(credential.secret(), "adminpw");
    }

    #[test]
    fn kemp_debug_redacts_password() {
        let identity = KempIdentity::new("ops@example.com", "kemppw");
        let dump = format!("{identity:?}");
        assert!(!dump.contains("kemppw"));
    }
}
