//! Feature flags
//!
//! Passed explicitly into the services that consult them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Retrying a job resets skipped jobs of later stages to `created`
    RetryResetsSkipped,
    /// Pipeline views replace masked variable values
    MaskTriggerVariables,
}

impl Feature {
    pub const ALL: [Feature; 2] = [Feature::RetryResetsSkipped, Feature::MaskTriggerVariables];

    pub fn as_str(self) -> &'static str {
        match self {
            Feature::RetryResetsSkipped => "retry_resets_skipped",
            Feature::MaskTriggerVariables => "mask_trigger_variables",
        }
    }
}

impl FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .into_iter()
            .find(|feature| feature.as_str() == s)
            .ok_or_else(|| format!("unknown feature '{}'", s))
    }
}

/// The set of enabled features
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSet {
    enabled: BTreeSet<Feature>,
}

impl Default for FeatureSet {
    fn default() -> Self {
        Self {
            enabled: Feature::ALL.into_iter().collect(),
        }
    }
}

impl FeatureSet {
    pub fn none() -> Self {
        Self {
            enabled: BTreeSet::new(),
        }
    }

    pub fn is_enabled(&self, feature: Feature) -> bool {
        self.enabled.contains(&feature)
    }

    pub fn enable(&mut self, feature: Feature) {
        self.enabled.insert(feature);
    }

    pub fn disable(&mut self, feature: Feature) {
        self.enabled.remove(&feature);
    }

    /// Applies a comma separated list on top of the defaults
    ///
    /// `name` enables a feature, `-name` disables it.
    pub fn parse_overrides(value: &str) -> Result<Self, String> {
        let mut set = FeatureSet::default();

        for item in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match item.strip_prefix('-') {
                Some(name) => set.disable(name.parse()?),
                None => set.enable(item.parse()?),
            }
        }

        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_enable_everything() {
        let set = FeatureSet::default();
        assert!(set.is_enabled(Feature::RetryResetsSkipped));
        assert!(!FeatureSet::none().is_enabled(Feature::RetryResetsSkipped));
    }

    #[test]
    fn test_parse_overrides() {
        let set = FeatureSet::parse_overrides("-retry_resets_skipped, mask_trigger_variables").unwrap();
        assert!(!set.is_enabled(Feature::RetryResetsSkipped));
        assert!(set.is_enabled(Feature::MaskTriggerVariables));

        assert!(FeatureSet::parse_overrides("warp_drive").is_err());
        assert_eq!(FeatureSet::parse_overrides("").unwrap(), FeatureSet::default());
    }
}
