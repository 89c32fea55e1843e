use std::path::Path;

use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};

use crate::error::StorageError;

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Supplies a bearer token for each request to the sheets API.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> Result<String, StorageError>;
}

/// A token handed in from outside. Never refreshed.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<String, StorageError> {
        Ok(self.0.clone())
    }
}

/// Tokens minted from a service-account key file. A token is reused until
/// it nears expiry, then exchanged for a fresh one.
pub struct ServiceAccount {
    account: CustomServiceAccount,
}

impl ServiceAccount {
    pub fn from_file(path: &Path) -> Result<Self, StorageError> {
        let account = CustomServiceAccount::from_file(path)?;
        Ok(Self { account })
    }
}

#[async_trait]
impl TokenSource for ServiceAccount {
    async fn token(&self) -> Result<String, StorageError> {
        let token = self.account.token(&[SHEETS_SCOPE]).await?;
        Ok(token.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_token_is_returned_as_is() -> Result<(), StorageError> {
        assert_eq!(StaticToken::new("t0k").token().await?, "t0k");
        Ok(())
    }

    #[test]
    fn unreadable_key_file_is_an_auth_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        assert!(matches!(
            ServiceAccount::from_file(&dir.path().join("missing.json")),
            Err(StorageError::Auth(_))
        ));

        let garbage = dir.path().join("key.json");
        std::fs::write(&garbage, "{\"type\": \"service_account\"}")?;
        assert!(matches!(ServiceAccount::from_file(&garbage), Err(StorageError::Auth(_))));
        Ok(())
    }
}
