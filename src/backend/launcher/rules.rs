//! Rule evaluation for libraries and conditional arguments.

use std::collections::HashSet;

use super::models::{Library, Rule, RuleAction};
use crate::backend::utils::os::Platform;

/// Launcher features that rules may test (`has_custom_resolution`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSet {
    enabled: HashSet<String>,
}

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, feature: impl Into<String>) -> Self {
        self.enabled.insert(feature.into());
        self
    }

    pub fn is_enabled(&self, feature: &str) -> bool {
        self.enabled.contains(feature)
    }
}

impl Rule {
    /// Whether this rule applies to `platform`; the action is not considered.
    pub fn applies_to(&self, platform: &Platform, features: &FeatureSet) -> bool {
        if let Some(os) = &self.os {
            if let Some(name) = &os.name
                && name != platform.os_name()
            {
                return false;
            }
            if let Some(arch) = &os.arch
                && arch != platform.arch_name()
            {
                return false;
            }
        }

        self.features.as_ref().is_none_or(|required| {
            required
                .iter()
                .all(|(feature, wanted)| features.is_enabled(feature) == *wanted)
        })
    }
}

/// Last-match-wins evaluation.
///
/// No rules means allowed. Otherwise the verdict is the action of the last
/// rule that applies to the platform, or disallowed if none applies.
pub fn is_allowed(rules: &[Rule], platform: &Platform, features: &FeatureSet) -> bool {
    if rules.is_empty() {
        return true;
    }

    rules
        .iter()
        .rev()
        .find(|rule| rule.applies_to(platform, features))
        .is_some_and(|rule| rule.action == RuleAction::Allow)
}

impl Library {
    /// Determines if this library should be used on the given platform.
    pub fn is_allowed(&self, platform: &Platform, features: &FeatureSet) -> bool {
        self.rules
            .as_deref()
            .is_none_or(|rules| is_allowed(rules, platform, features))
    }
}
