//! Opaque viewer credentials and the source seam that supplies them

use std::fmt;

/// Opaque authentication token presented to the signaling peer at connect
/// time.
///
/// The token is read once when a connection is opened and never inspected
/// by the core. `Debug` output is redacted so credentials cannot leak
/// through logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw token string
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token value, for the connect-time query parameter
    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Supplier of the viewer credential.
///
/// `None` means no credential is available, which is a precondition failure
/// for opening a connection; callers handle it before involving the
/// coordinator (the terminal shell prints login guidance and exits).
pub trait CredentialSource {
    /// Fetch the current credential, if any
    fn get(&self) -> Option<Credential>;
}

/// Credential source backed by an environment variable
pub struct EnvCredentialSource {
    var: String,
}

impl EnvCredentialSource {
    /// Read the credential from `var` at lookup time
    pub fn new(var: &str) -> Self {
        Self {
            var: var.to_string(),
        }
    }
}

impl CredentialSource for EnvCredentialSource {
    fn get(&self) -> Option<Credential> {
        match std::env::var(&self.var) {
            Ok(token) if !token.is_empty() => Some(Credential::new(token)),
            _ => None,
        }
    }
}
