//! Room secret verification
//!
//! Every inbound command carries the room password. It is compared
//! against the locally held secret only; there is no remote fallback.

use std::fmt;

/// Locally held shared secret for the control room
#[derive(Clone)]
pub struct RoomSecret(String);

impl RoomSecret {
    /// Wrap a secret, refusing an empty one
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Option<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            None
        } else {
            Some(Self(secret))
        }
    }

    /// Verify a provided password (timing-safe comparison)
    #[must_use]
    pub fn verify(&self, provided: &str) -> bool {
        constant_time_eq(self.0.as_bytes(), provided.as_bytes())
    }

    /// Raw secret, for building local one-shot commands
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RoomSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RoomSecret(**redacted**)")
    }
}

/// Constant-time byte comparison to prevent timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_secret_refused() {
        assert!(RoomSecret::new("").is_none());
    }

    #[test]
    fn test_secret_verification() {
        let secret = RoomSecret::new("studio-b").unwrap();

        assert!(secret.verify("studio-b"));
        assert!(!secret.verify("studio-a"));
        assert!(!secret.verify("studio-")); // Partial match
        assert!(!secret.verify(""));
    }

    #[test]
    fn test_debug_redacts() {
        let secret = RoomSecret::new("hunter2").unwrap();
        assert!(!format!("{secret:?}").contains("hunter2"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"hello", b"hell"));
    }
}
