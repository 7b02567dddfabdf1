//! Request authentication boundary

use std::collections::HashMap;

use crate::error::ApiErrorCode;
use crate::http::HttpRequest;

/// The identity a request was authenticated as. The principal id may be
/// empty for anonymous but otherwise authorized requests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Principal {
    /// Opaque principal identifier
    pub id: String,
}

impl Principal {
    /// Creates a principal with the given id.
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string() }
    }

    /// The anonymous (empty) principal.
    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Validates a request and returns the requester's identity.
///
/// `ApiErrorCode::None` means authorized; any other code must
/// short-circuit the request with that error surfaced to the client.
pub trait Authenticator: Send + Sync {
    /// Authenticates the request.
    fn authenticate(&self, req: &HttpRequest) -> (Principal, ApiErrorCode);
}

/// In-process authenticator backed by a static token table. Requests
/// present their token in the `authorization` header.
pub struct StaticAuthenticator {
    tokens: HashMap<String, Principal>,
    allow_anonymous: bool,
}

impl StaticAuthenticator {
    /// Creates an authenticator with no registered tokens.
    pub fn new() -> Self {
        Self {
            tokens: HashMap::new(),
            allow_anonymous: false,
        }
    }

    /// An authenticator that admits every request as anonymous.
    pub fn allow_all() -> Self {
        Self {
            tokens: HashMap::new(),
            allow_anonymous: true,
        }
    }

    /// Registers a token for a principal.
    pub fn register(&mut self, token: &str, principal: Principal) {
        self.tokens.insert(token.to_string(), principal);
    }
}

impl Default for StaticAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

impl Authenticator for StaticAuthenticator {
    fn authenticate(&self, req: &HttpRequest) -> (Principal, ApiErrorCode) {
        match req.header("authorization") {
            Some(token) => match self.tokens.get(token) {
                Some(principal) => (principal.clone(), ApiErrorCode::None),
                None => (Principal::anonymous(), ApiErrorCode::SignatureDoesNotMatch),
            },
            None => {
                if self.allow_anonymous {
                    (Principal::anonymous(), ApiErrorCode::None)
                } else {
                    (Principal::anonymous(), ApiErrorCode::AccessDenied)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_token_authenticates() {
        let mut auth = StaticAuthenticator::new();
        auth.register("tok-1", Principal::new("alice"));
        let req = HttpRequest::new("GET", "/b").with_header("authorization", "tok-1");
        let (principal, code) = auth.authenticate(&req);
        assert_eq!(code, ApiErrorCode::None);
        assert_eq!(principal.id, "alice");
    }

    #[test]
    fn test_unknown_token_is_rejected() {
        let auth = StaticAuthenticator::new();
        let req = HttpRequest::new("GET", "/b").with_header("authorization", "bogus");
        let (_, code) = auth.authenticate(&req);
        assert_eq!(code, ApiErrorCode::SignatureDoesNotMatch);
    }

    #[test]
    fn test_missing_credentials_denied_by_default() {
        let auth = StaticAuthenticator::new();
        let req = HttpRequest::new("GET", "/b");
        let (_, code) = auth.authenticate(&req);
        assert_eq!(code, ApiErrorCode::AccessDenied);
    }

    #[test]
    fn test_allow_all_admits_anonymous() {
        let auth = StaticAuthenticator::allow_all();
        let req = HttpRequest::new("GET", "/b");
        let (principal, code) = auth.authenticate(&req);
        assert_eq!(code, ApiErrorCode::None);
        assert_eq!(principal, Principal::anonymous());
    }
}
