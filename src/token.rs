//! Round-robin access token rotation

use std::sync::atomic::{AtomicUsize, Ordering};

/// Hands out configured tokens in strict round-robin order.
///
/// Safe to share across tasks; the cursor is a single wrapping atomic so no
/// two callers observe the same pre-increment value.
#[derive(Debug, Default)]
pub struct TokenRotator {
    tokens: Vec<String>,
    cursor: AtomicUsize,
}

impl TokenRotator {
    pub fn new(tokens: Vec<String>) -> Self {
        Self {
            tokens,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Next token in rotation, or an empty string when no tokens are configured
    pub fn next(&self) -> String {
        if self.tokens.is_empty() {
            return String::new();
        }

        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.tokens[index % self.tokens.len()].clone()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}
