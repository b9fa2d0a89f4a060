//! Matching a token against `-`-delimited segments of a workload name.
//!
//! `crm` matches `crm`, `crm-api`, `shop-crm` and `a-crm-b`, but not
//! `crmapi` or `my_crm`.

use regex::Regex;

#[derive(Debug, Clone)]
pub struct SegmentPattern {
    token: String,
    re: Regex,
}

impl SegmentPattern {
    pub fn new(token: &str) -> Result<Self, regex::Error> {
        let pattern = format!(r"(?:^|-){}(?:-|$)", regex::escape(token));
        Ok(Self {
            token: token.to_string(),
            re: Regex::new(&pattern)?,
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn matches(&self, name: &str) -> bool {
        self.re.is_match(name)
    }
}
