//! Banner-level error modeling for the repertoire page.

use crate::api::ApiFailure;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    /// Rejected locally before any request was made.
    Validation,
    Network,
    Permission,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiError {
    category: UiErrorCategory,
    message: String,
}

impl UiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            category: UiErrorCategory::Validation,
            message: message.into(),
        }
    }

    pub fn from_failure(failure: &ApiFailure) -> Self {
        let category = match failure.status() {
            Some(401 | 403) => UiErrorCategory::Permission,
            _ => UiErrorCategory::Network,
        };
        Self {
            category,
            message: failure.to_string(),
        }
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
