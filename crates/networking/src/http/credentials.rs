//! Opaque bearer-token supply for REST calls

/// Provides the current bearer token, if any
///
/// Token acquisition and refresh live outside this crate.
pub trait CredentialSupplier: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// A fixed token (or none)
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    token: Option<String>,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

impl CredentialSupplier for StaticCredentials {
    fn bearer_token(&self) -> Option<String> {
        self.token.clone().filter(|t| !t.is_empty())
    }
}
