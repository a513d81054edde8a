//! Built-in length + pattern rule set.

use regex_lite::Regex;

use crate::config::ValidatorConfig;

use super::{ContentValidator, ValidationError};

const DEFAULT_MIN_LENGTH: usize = 10;
const DEFAULT_PATTERN: &str = "[0-9]";

/// Accepts content that is at least `min_length` characters long and contains
/// a match for the required pattern.
#[derive(Debug, Clone)]
pub struct ContentRules {
    min_length: usize,
    required: Option<Regex>,
}

impl ContentRules {
    /// Build a rule set. `None` or an empty pattern disables the pattern check.
    pub fn new(min_length: usize, pattern: Option<&str>) -> Result<Self, ValidationError> {
        let required = match pattern {
            Some(p) if !p.is_empty() => {
                Some(Regex::new(p).map_err(|e| ValidationError::InvalidRule(e.to_string()))?)
            }
            _ => None,
        };

        Ok(Self {
            min_length,
            required,
        })
    }

    pub fn from_config(config: &ValidatorConfig) -> Result<Self, ValidationError> {
        Self::new(config.min_length, config.required_pattern.as_deref())
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }
}

impl Default for ContentRules {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_LENGTH,
            required: Regex::new(DEFAULT_PATTERN).ok(),
        }
    }
}

impl ContentValidator for ContentRules {
    fn name(&self) -> &str {
        "content_rules"
    }

    fn validate(&self, content: &str) -> Result<bool, ValidationError> {
        // Length is measured in characters, not bytes.
        if content.chars().count() < self.min_length {
            return Ok(false);
        }

        Ok(self
            .required
            .as_ref()
            .map_or(true, |re| re.is_match(content)))
    }
}
