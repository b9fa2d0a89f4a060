//! Exclusion policy: workloads that opt out of automated rollout.

use promoter_core::SegmentPattern;

#[derive(Debug, Clone, Default)]
pub struct ExclusionPolicy {
    patterns: Vec<SegmentPattern>,
}

impl ExclusionPolicy {
    pub fn new<S: AsRef<str>>(tokens: &[S]) -> Result<Self, regex::Error> {
        let patterns = tokens
            .iter()
            .map(|t| SegmentPattern::new(t.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// The token that excludes `workload`, if any.
    pub fn excluded_by(&self, workload: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| p.matches(workload))
            .map(SegmentPattern::token)
    }

    pub fn is_excluded(&self, workload: &str) -> bool {
        self.excluded_by(workload).is_some()
    }
}
