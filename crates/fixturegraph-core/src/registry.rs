//! Preferred value makers: per-member overrides matched by fully-qualified
//! name (`Owner#member` or `Owner(argN)`).
//!
//! Rules are checked in registration order and the first match wins. The
//! registry belongs to a [`MakeContext`](crate::MakeContext); clear it (or use
//! a fresh one) between independent sessions.

use crate::maker::{Maker, PreferredMaker};
use parking_lot::RwLock;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum NamePattern {
    Exact(String),
    Contains(String),
    Regex(Regex),
}

impl NamePattern {
    pub fn exact(name: impl Into<String>) -> Self {
        NamePattern::Exact(name.into())
    }

    pub fn contains(fragment: impl Into<String>) -> Self {
        NamePattern::Contains(fragment.into())
    }

    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(NamePattern::Regex)
    }

    pub fn matches(&self, fully_qualified_name: &str) -> bool {
        match self {
            NamePattern::Exact(name) => name == fully_qualified_name,
            NamePattern::Contains(fragment) => fully_qualified_name.contains(fragment.as_str()),
            NamePattern::Regex(re) => re.is_match(fully_qualified_name),
        }
    }
}

impl fmt::Display for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamePattern::Exact(name) => write!(f, "== {name}"),
            NamePattern::Contains(fragment) => write!(f, "contains {fragment}"),
            NamePattern::Regex(re) => write!(f, "~ {}", re.as_str()),
        }
    }
}

/// Cloning shares the rule list.
#[derive(Clone, Default)]
pub struct PreferredValueMakers {
    rules: Arc<RwLock<Vec<(NamePattern, Arc<dyn Maker>)>>>,
}

impl PreferredValueMakers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, pattern: NamePattern, maker: impl Maker + 'static) -> &Self {
        self.add_shared(pattern, Arc::new(maker))
    }

    pub fn add_shared(&self, pattern: NamePattern, maker: Arc<dyn Maker>) -> &Self {
        self.rules.write().push((pattern, maker));
        self
    }

    pub fn add_field_or_property_maker(
        &self,
        owner: &str,
        member: &str,
        maker: impl Maker + 'static,
    ) -> &Self {
        self.add(NamePattern::exact(format!("{owner}#{member}")), maker)
    }

    pub fn add_constructor_parameter_maker(
        &self,
        owner: &str,
        index: usize,
        maker: impl Maker + 'static,
    ) -> &Self {
        self.add(NamePattern::exact(format!("{owner}(arg{index})")), maker)
    }

    pub fn find(&self, fully_qualified_name: &str) -> Option<PreferredMaker> {
        self.rules
            .read()
            .iter()
            .find(|(pattern, _)| pattern.matches(fully_qualified_name))
            .map(|(pattern, maker)| PreferredMaker::new(pattern.to_string(), maker.clone()))
    }

    pub fn clear(&self) {
        self.rules.write().clear();
    }

    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }
}

impl fmt::Debug for PreferredValueMakers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let patterns: Vec<String> = self
            .rules
            .read()
            .iter()
            .map(|(pattern, _)| pattern.to_string())
            .collect();
        f.debug_struct("PreferredValueMakers")
            .field("patterns", &patterns)
            .finish()
    }
}
