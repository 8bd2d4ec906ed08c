use std::fmt;

use zeroize::Zeroize;

/// Value shipped in sample env files; treated the same as a missing key.
pub const PLACEHOLDER_API_KEY: &str = "your_openai_api_key_here";

/// Bearer credential for the upstream endpoint.
///
/// Key material is wiped on drop and never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey {
    secret: String,
}

impl ApiKey {
    /// Returns `None` for blank values and the placeholder sentinel.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let mut value: String = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed == PLACEHOLDER_API_KEY {
            value.zeroize();
            return None;
        }
        let secret = trimmed.to_string();
        value.zeroize();
        Some(Self { secret })
    }

    pub fn expose(&self) -> &str {
        &self.secret
    }

    pub(crate) fn bearer(&self) -> String {
        format!("Bearer {}", self.secret)
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

impl Drop for ApiKey {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_and_blank_keys_are_rejected() {
        assert!(ApiKey::new("").is_none());
        assert!(ApiKey::new("   ").is_none());
        assert!(ApiKey::new(PLACEHOLDER_API_KEY).is_none());
        assert!(ApiKey::new(format!("  {}\n", PLACEHOLDER_API_KEY)).is_none());
        assert!(ApiKey::new("sk-test").is_some());
    }

    #[test]
    fn debug_output_is_redacted() {
        let key = ApiKey::new(" sk-secret-value ").expect("key");
        assert_eq!(key.expose(), "sk-secret-value");
        assert_eq!(key.bearer(), "Bearer sk-secret-value");
        assert!(!format!("{:?}", key).contains("sk-secret"));
    }
}
