use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum AuthError {
    #[error("no authenticated user")]
    NotAuthenticated,
}

/// Where the bearer token attached to upstream calls comes from. Checked
/// before every request so an unauthenticated session fails fast instead of
/// burning retries against a 401.
pub trait TokenSource: Send + Sync {
    fn bearer_token(&self) -> Result<String, AuthError>;
}

/// Token fixed at construction time, typically read from configuration.
/// `None` models a session that never signed in.
pub struct StaticTokenSource {
    token: Option<String>,
}

impl StaticTokenSource {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

impl TokenSource for StaticTokenSource {
    fn bearer_token(&self) -> Result<String, AuthError> {
        self.token.clone().ok_or(AuthError::NotAuthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_token_is_returned() {
        let source = StaticTokenSource::new(Some("id-token".to_owned()));
        assert_eq!(source.bearer_token(), Ok("id-token".to_owned()));
    }

    #[test]
    fn missing_token_fails_fast() {
        let source = StaticTokenSource::new(None);
        assert_eq!(source.bearer_token(), Err(AuthError::NotAuthenticated));
    }
}
