//! Registry credentials with memory-safe handling and masking capabilities
//!
//! The registry password is held in a `secrecy::SecretString` so it cannot
//! leak through `Debug` output or logs. It only leaves the secret wrapper
//! when it is written to the container tool's stdin.

use crate::core::error::PublishError;
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// Username ECR expects for token-based logins
pub const ECR_USERNAME: &str = "AWS";

/// Credentials for a container registry login
pub struct RegistryCredentials {
    username: String,
    password: SecretString,
}

impl RegistryCredentials {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    /// Decode an ECR authorization token (base64 of `user:password`)
    ///
    /// # Examples
    ///
    /// ```
    /// use ecr_publisher::security::RegistryCredentials;
    ///
    /// // base64("AWS:password123")
    /// let creds = RegistryCredentials::from_authorization_token("QVdTOnBhc3N3b3JkMTIz").unwrap();
    /// assert_eq!(creds.username(), "AWS");
    /// ```
    pub fn from_authorization_token(token: &str) -> Result<Self, PublishError> {
        let auth_failed = |message: String| PublishError::AuthenticationFailed {
            registry: "ecr".to_string(),
            message,
        };

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(token.trim())
            .map_err(|e| auth_failed(format!("Failed to decode authorization token: {}", e)))?;

        let decoded = String::from_utf8(decoded)
            .map_err(|e| auth_failed(format!("Invalid UTF-8 in authorization token: {}", e)))?;

        let (username, password) = decoded
            .split_once(':')
            .ok_or_else(|| auth_failed("Malformed authorization token".to_string()))?;

        if password.is_empty() {
            return Err(auth_failed("Authorization token has an empty password".to_string()));
        }

        Ok(Self::new(
            username,
            SecretString::new(password.to_string().into()),
        ))
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &SecretString {
        &self.password
    }

    /// Replace every occurrence of the password in `text` with its masked form
    pub fn mask_in(&self, text: &str) -> String {
        let secret = self.password.expose_secret();
        if secret.is_empty() {
            return text.to_string();
        }
        text.replace(secret, &mask_token(secret))
    }
}

impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("username", &self.username)
            .field("password", &mask_token(self.password.expose_secret()))
            .finish()
    }
}

/// Masks a token for safe logging
///
/// Shows only the first 3 and last 3 characters for identification purposes.
/// Tokens shorter than 10 characters are fully masked as "****".
///
/// # Examples
///
/// ```
/// use ecr_publisher::security::mask_token;
///
/// assert_eq!(mask_token("abcdef123456"), "abc...456");
/// assert_eq!(mask_token("short"), "****");
/// ```
pub fn mask_token(token: &str) -> String {
    if token.len() < 10 || !token.is_ascii() {
        return "****".to_string();
    }

    let prefix = &token[..3];
    let suffix = &token[token.len() - 3..];
    format!("{}...{}", prefix, suffix)
}
