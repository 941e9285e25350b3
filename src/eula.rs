//! The two-phase EULA handshake.
//!
//! A factory-fresh appliance will not license itself until both license
//! agreements have been accepted, in order, each acknowledgement keyed by
//! the opaque magic token returned by the previous step. The tokens are
//! passed through verbatim; a missing token aborts before the next call is
//! issued. Rejection is not modeled: acceptance is always affirmative.

use tracing::debug;

use crate::client::api::{EulaPage, ManagementApi};
use crate::client::connection::ConnectionTarget;
use crate::errors::{BootstrapError, BootstrapResult};

fn require_magic(step: &str, page: &EulaPage) -> BootstrapResult<()> {
    if page.magic.is_empty() {
        return Err(BootstrapError::Sequence(format!(
            "{step} returned no correlation token"
        )));
    }
    Ok(())
}

/// Run the full handshake against one appliance.
///
/// Strictly sequential: step 2 is only attempted with the token from step 1,
/// step 3 only with the token from step 2. Any failure propagates and aborts
/// the appliance's bootstrap.
pub async fn run_eula_handshake<A: ManagementApi>(
    api: &A,
    target: &ConnectionTarget,
) -> BootstrapResult<()> {
    let first = api.read_first_eula(target).await?;
    require_magic("readeula", &first)?;
    debug!(eula = %first.text, "received first license agreement");

    let second = api.confirm_first_eula(target, &first.magic).await?;
    require_magic("accepteula", &second)?;
    debug!(eula = %second.text, "received second license agreement");

    api.confirm_second_eula(target, &second.magic, true).await?;
    debug!("license agreements accepted");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_magic_is_a_sequence_error() {
        let page = EulaPage {
            text: "TERMS".to_string(),
            magic: String::new(),
        };
        let err = require_magic("readeula", &page).unwrap_err();
        assert!(matches!(err, BootstrapError::Sequence(_)));
    }

    #[test]
    fn present_magic_passes() {
        let page = EulaPage {
            text: "TERMS".to_string(),
            magic: "m-1".to_string(),
        };
        assert!(require_magic("readeula", &page).is_ok());
    }
}
