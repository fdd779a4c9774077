//! Authentication and authorization hooks.
//!
//! The relay does not ship any access policy. These traits are the seams
//! where a deployment plugs one in; the defaults accept everybody.

use async_trait::async_trait;

use crate::error::RelayError;

/// Caller name used when no identity was presented.
pub const ANONYMOUS: &str = "anonymous";

/// Raw credentials taken from the inbound request.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Claimed caller name (`x-rpc-user`)
    pub user: Option<String>,
    /// Session token (`authorization: Bearer ...`)
    pub token: Option<String>,
    /// Client address (`x-forwarded-for`)
    pub remote_addr: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("remote_addr", &self.remote_addr)
            .finish()
    }
}

/// An authenticated caller.
#[derive(Clone, PartialEq, Eq)]
pub struct Caller {
    /// Caller name
    pub name: String,
    /// Session token the caller authenticated with, if any
    pub session: Option<String>,
}

impl std::fmt::Debug for Caller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Caller")
            .field("name", &self.name)
            .field("session", &self.session.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Turns credentials into a [`Caller`].
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Authenticate the caller or reject the call.
    async fn authenticate(&self, credentials: &Credentials) -> Result<Caller, RelayError>;
}

/// Decides whether a caller may invoke a method.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Allow the call or reject it.
    async fn authorize(&self, caller: &Caller, method: &str) -> Result<(), RelayError>;
}

/// Trusts the claimed user name; falls back to [`ANONYMOUS`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousAuthenticator;

#[async_trait]
impl Authenticator for AnonymousAuthenticator {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Caller, RelayError> {
        let name = credentials
            .user
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(ANONYMOUS)
            .to_string();
        Ok(Caller {
            name,
            session: credentials.token.clone(),
        })
    }
}

/// Allows every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl Authorizer for AllowAll {
    async fn authorize(&self, _caller: &Caller, _method: &str) -> Result<(), RelayError> {
        Ok(())
    }
}
