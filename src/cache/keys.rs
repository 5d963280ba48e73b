//! Type-safe cache key builders

use std::fmt;

pub const VERSION: &str = "v1";

pub mod checkout {
    use super::*;

    pub const NAMESPACE: &str = "checkout";

    /// Key for an in-flight checkout correlation, addressed by the opaque
    /// session token handed to the browser.
    #[derive(Debug, Clone)]
    pub struct CorrelationKey {
        pub token: String,
    }

    impl CorrelationKey {
        pub fn new(token: impl Into<String>) -> Self {
            Self {
                token: token.into(),
            }
        }
    }

    impl fmt::Display for CorrelationKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}:{}:corr:{}", VERSION, NAMESPACE, self.token)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_key() {
        let key = checkout::CorrelationKey::new("ab12cd34");
        assert_eq!(key.to_string(), "v1:checkout:corr:ab12cd34");
    }
}
