//! Safety classification of relative paths.

use crate::config::SafetyRules;
use crate::model::Safety;
use crate::patterns::PathPatterns;
use crate::Result;

/// Assigns a [`Safety`] tier to a relative path.
///
/// Classification is a pure function of the path string. The highest
/// matching tier wins; unmatched paths are [`Safety::Safe`].
#[derive(Debug, Clone)]
pub struct SafetyClassifier {
    dangerous: PathPatterns,
    caution: PathPatterns,
}

impl SafetyClassifier {
    pub fn new(rules: &SafetyRules) -> Result<Self> {
        Ok(Self {
            dangerous: PathPatterns::new(&rules.dangerous)?,
            caution: PathPatterns::new(&rules.caution)?,
        })
    }

    pub fn classify(&self, key: &str) -> Safety {
        if self.dangerous.matches(key) {
            Safety::Dangerous
        } else if self.caution.matches(key) {
            Safety::Caution
        } else {
            Safety::Safe
        }
    }
}

impl Default for SafetyClassifier {
    fn default() -> Self {
        let rules = SafetyRules::default();
        Self {
            dangerous: PathPatterns::new(&rules.dangerous).unwrap_or_default(),
            caution: PathPatterns::new(&rules.caution).unwrap_or_default(),
        }
    }
}
