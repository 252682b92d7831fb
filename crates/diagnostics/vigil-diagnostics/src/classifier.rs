//! Maps raw fault text to a user-facing message.
//!
//! Classification walks an ordered rule table and returns the message of the
//! first rule whose pattern occurs in the raw text. Matching ignores ASCII
//! case. A rule may be scoped to one category; unscoped rules apply to all.

use once_cell::sync::Lazy;

use crate::event::FaultCategory;

/// Message used when no rule matches
pub const FALLBACK_MESSAGE: &str = "An unexpected error occurred. Please try again.";

/// Message for connectivity failures
pub const NETWORK_MESSAGE: &str =
    "Unable to connect to the server. Please check your internet connection.";

const TIMEOUT_MESSAGE: &str = "The request took too long to complete. Please try again.";
const SESSION_MESSAGE: &str = "Your session has expired. Please sign in again.";
const FORBIDDEN_MESSAGE: &str = "You do not have permission to perform this action.";
const NOT_FOUND_MESSAGE: &str = "The requested resource was not found.";
const THROTTLED_MESSAGE: &str = "Too many requests. Please wait a moment and try again.";
const SERVER_MESSAGE: &str = "The server encountered an error. Please try again later.";
const SLOW_LOAD_MESSAGE: &str = "The application is taking longer than usual to load.";
const SLOW_API_MESSAGE: &str = "The server is responding slowly. Please bear with us.";
const MEMORY_MESSAGE: &str = "The application ran out of memory. Please restart it.";

/// One entry of the rule table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRule {
    pattern: String,
    message: String,
    scope: Option<FaultCategory>,
}

impl ClassificationRule {
    /// Rule applying to every category
    pub fn new(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into().to_ascii_lowercase(),
            message: message.into(),
            scope: None,
        }
    }

    /// Rule applying to a single category
    pub fn scoped(
        pattern: impl Into<String>,
        message: impl Into<String>,
        category: FaultCategory,
    ) -> Self {
        Self {
            scope: Some(category),
            ..Self::new(pattern, message)
        }
    }

    /// Lowercased pattern
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Friendly message
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    fn matches(&self, haystack: &str, category: FaultCategory) -> bool {
        self.scope.map_or(true, |scope| scope == category) && haystack.contains(&self.pattern)
    }
}

/// The built-in rule table, in evaluation order.
#[must_use]
pub fn default_rules() -> Vec<ClassificationRule> {
    use FaultCategory::{Api, Performance};

    // "Failed to fetch" wins in every category. The scoped rules come next:
    // Api and Performance messages embed a URL that the remaining unscoped
    // substrings could otherwise match.
    vec![
        ClassificationRule::new("Failed to fetch", NETWORK_MESSAGE),
        ClassificationRule::scoped("API Error: 401", SESSION_MESSAGE, Api),
        ClassificationRule::scoped("API Error: 403", FORBIDDEN_MESSAGE, Api),
        ClassificationRule::scoped("API Error: 404", NOT_FOUND_MESSAGE, Api),
        ClassificationRule::scoped("API Error: 429", THROTTLED_MESSAGE, Api),
        ClassificationRule::scoped("API Error: 5", SERVER_MESSAGE, Api),
        ClassificationRule::scoped("Slow page load", SLOW_LOAD_MESSAGE, Performance),
        ClassificationRule::scoped("Slow API response", SLOW_API_MESSAGE, Performance),
        ClassificationRule::new("NetworkError", NETWORK_MESSAGE),
        ClassificationRule::new("Network request failed", NETWORK_MESSAGE),
        ClassificationRule::new("error sending request", NETWORK_MESSAGE),
        ClassificationRule::new("connection refused", NETWORK_MESSAGE),
        ClassificationRule::new("dns error", NETWORK_MESSAGE),
        ClassificationRule::new("timed out", TIMEOUT_MESSAGE),
        ClassificationRule::new("timeout", TIMEOUT_MESSAGE),
        ClassificationRule::new("memory allocation", MEMORY_MESSAGE),
        ClassificationRule::new("out of memory", MEMORY_MESSAGE),
    ]
}

static DEFAULT_CLASSIFIER: Lazy<Classifier> = Lazy::new(Classifier::new);

/// Classify with the built-in table.
#[must_use]
pub fn classify(raw_message: &str, category: FaultCategory) -> String {
    DEFAULT_CLASSIFIER.classify(raw_message, category)
}

/// Ordered rule table with a fallback.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<ClassificationRule>,
    fallback: String,
}

impl Classifier {
    /// Classifier over the built-in table
    #[must_use]
    pub fn new() -> Self {
        Self::with_rules(default_rules())
    }

    /// Classifier over a custom table
    #[must_use]
    pub fn with_rules(rules: Vec<ClassificationRule>) -> Self {
        Self {
            rules,
            fallback: FALLBACK_MESSAGE.to_string(),
        }
    }

    /// Replace the fallback message
    #[must_use]
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    /// Rules in evaluation order
    #[must_use]
    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// First matching rule's message, or the fallback.
    #[must_use]
    pub fn classify(&self, raw_message: &str, category: FaultCategory) -> String {
        let haystack = raw_message.to_ascii_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&haystack, category))
            .map_or_else(|| self.fallback.clone(), |rule| rule.message.clone())
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}
