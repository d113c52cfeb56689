//! Control-parameter extraction and shared-secret authentication.
//!
//! # Responsibilities
//! - Pull every `<prefix><Name>` header out of the inner request
//! - Keep gateway directives away from the destination
//! - Enforce the configured password before anything is forwarded
//!
//! # Design Decisions
//! - Prefix match is case-sensitive; parameter keys are stored lowercased
//! - An empty secret disables authentication entirely
//! - Password comparison runs in constant time

use std::collections::HashMap;

use subtle::ConstantTimeEq;

use crate::envelope::headers::{normalize_key, strip_prefix_exact};
use crate::envelope::InnerRequest;
use crate::error::{GatewayError, Result};

/// Default reserved header prefix for control parameters.
pub const DEFAULT_CONTROL_PREFIX: &str = "X-Urlfetch-";

/// Name of the parameter checked against the shared secret.
pub const PASSWORD_PARAM: &str = "password";

/// Gateway directives carried inside the inner header set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlParameters {
    values: HashMap<String, String>,
}

impl ControlParameters {
    /// Move every control header out of `request`.
    pub fn extract(request: &mut InnerRequest, prefix: &str) -> Self {
        let mut values = HashMap::new();
        request.headers.retain(|name, value| match strip_prefix_exact(name, prefix) {
            Some(rest) => {
                values.insert(normalize_key(rest), value.to_string());
                false
            }
            None => true,
        });
        Self { values }
    }

    /// Look up a parameter by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(&normalize_key(name)).map(String::as_str)
    }

    /// Parameter names, for logging. Values are never logged.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Checks the `password` control parameter against the configured secret.
#[derive(Clone)]
pub struct Authenticator {
    secret: Option<String>,
}

impl Authenticator {
    /// An empty secret turns authentication off.
    pub fn new(secret: impl Into<String>) -> Self {
        let secret = secret.into();
        Self {
            secret: (!secret.is_empty()).then_some(secret),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    pub fn verify(&self, params: &ControlParameters) -> Result<()> {
        let Some(secret) = &self.secret else {
            return Ok(());
        };
        match params.get(PASSWORD_PARAM) {
            Some(given) if bool::from(given.as_bytes().ct_eq(secret.as_bytes())) => Ok(()),
            _ => Err(GatewayError::Forbidden),
        }
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
