//! The credential-provider boundary: an opaque collaborator that may add headers to an
//! outbound request before it is sent.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use http::{header::HeaderValue, Request};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// Errors while attaching credentials to a request.
#[derive(Debug, Error)]
pub enum Error {
    /// A credential value was not a legal HTTP header value (e.g. contained a newline).
    #[error("invalid header value in credential: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),
}

/// A pluggable source of per-request authentication.
///
/// The default implementations cover static bearer tokens and HTTP basic auth; callers with an
/// exec-plugin, OIDC, or cloud-provider token refresh flow supply their own implementation.
pub trait CredentialProvider: Send + Sync {
    /// Mutate the outbound request's headers to attach credentials.
    fn authorize<B>(&self, request: &mut Request<B>) -> Result<(), Error>;
}

/// The built-in, non-refreshing credential providers.
#[derive(Clone)]
pub enum Auth {
    /// No credentials are attached.
    None,
    /// HTTP `Authorization: Basic <base64(user:pass)>`.
    Basic {
        /// Username.
        username: String,
        /// Password, held as a [`SecretString`] so it is not accidentally logged.
        password: SecretString,
    },
    /// HTTP `Authorization: Bearer <token>`.
    Bearer(SecretString),
}

impl Auth {
    /// Construct a bearer-token credential.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer(SecretString::from(token.into()))
    }

    /// Construct a basic-auth credential.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

impl CredentialProvider for Auth {
    fn authorize<B>(&self, request: &mut Request<B>) -> Result<(), Error> {
        let header = match self {
            Auth::None => return Ok(()),
            Auth::Bearer(token) => {
                let mut value = HeaderValue::try_from(format!("Bearer {}", token.expose_secret()))?;
                value.set_sensitive(true);
                value
            }
            Auth::Basic { username, password } => {
                let raw = format!("{username}:{}", password.expose_secret());
                let mut value = HeaderValue::try_from(format!("Basic {}", STANDARD.encode(raw)))?;
                value.set_sensitive(true);
                value
            }
        };
        request.headers_mut().insert(http::header::AUTHORIZATION, header);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_sets_authorization_header() {
        let auth = Auth::bearer("tok123");
        let mut req = Request::builder().uri("/").body(()).unwrap();
        auth.authorize(&mut req).unwrap();
        assert_eq!(req.headers().get(http::header::AUTHORIZATION).unwrap(), "Bearer tok123");
    }

    #[test]
    fn basic_encodes_user_and_pass() {
        let auth = Auth::basic("alice", "wonderland");
        let mut req = Request::builder().uri("/").body(()).unwrap();
        auth.authorize(&mut req).unwrap();
        let value = req.headers().get(http::header::AUTHORIZATION).unwrap();
        assert!(value.to_str().unwrap().starts_with("Basic "));
    }

    #[test]
    fn none_leaves_headers_untouched() {
        let auth = Auth::None;
        let mut req = Request::builder().uri("/").body(()).unwrap();
        auth.authorize(&mut req).unwrap();
        assert!(req.headers().get(http::header::AUTHORIZATION).is_none());
    }
}
