//! Cleartext-credentials gate applied before AUTH.

use crate::{Error, Result};

/// Policy options for authentication over plaintext connections.
#[derive(Debug, Clone, Copy)]
pub struct AuthOptions {
    /// Require a TLS session before credentials may be sent.
    pub require_tls_for_auth: bool,
    /// Explicitly allow credentials over plaintext despite the above.
    pub allow_cleartext_auth: bool,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            require_tls_for_auth: true,
            allow_cleartext_auth: false,
        }
    }
}

/// Checks whether authentication is permitted on this connection.
///
/// # Errors
///
/// Returns [`Error::AuthForbidden`] when credentials would cross
/// plaintext without the explicit opt-in.
pub fn ensure_auth_allowed(is_tls: bool, options: &AuthOptions) -> Result<()> {
    if is_tls || !options.require_tls_for_auth {
        return Ok(());
    }
    if options.allow_cleartext_auth {
        tracing::warn!("authenticating without TLS; allowed by configuration");
        return Ok(());
    }
    Err(Error::AuthForbidden)
}
