//! Per-scope sequence watermarks

use shared::ResourceType;
use std::collections::HashMap;
use std::fmt;

/// Partition within which sequence ids are monotonic
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scope {
    pub resource: ResourceType,
    pub outlet_id: String,
}

impl Scope {
    pub fn new(resource: ResourceType, outlet_id: impl Into<String>) -> Self {
        Self {
            resource,
            outlet_id: outlet_id.into(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.resource, self.outlet_id)
    }
}

/// Highest applied sequence id per scope. Never decreases until reset.
#[derive(Debug, Default)]
pub struct Watermarks {
    marks: HashMap<Scope, u64>,
}

impl Watermarks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, scope: &Scope) -> Option<u64> {
        self.marks.get(scope).copied()
    }

    /// An event with no sequence id is never stale
    pub fn is_stale(&self, scope: &Scope, sequence_id: Option<u64>) -> bool {
        match (sequence_id, self.get(scope)) {
            (Some(seq), Some(mark)) => seq <= mark,
            _ => false,
        }
    }

    /// `watermark = max(watermark, seq)`; returns the resulting mark
    pub fn advance(&mut self, scope: &Scope, sequence_id: Option<u64>) -> Option<u64> {
        let Some(seq) = sequence_id else {
            return self.get(scope);
        };
        let mark = self.marks.entry(scope.clone()).or_insert(seq);
        *mark = (*mark).max(seq);
        Some(*mark)
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    pub fn reset(&mut self) {
        self.marks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watermark_is_monotonic() {
        let scope = Scope::new(ResourceType::Order, "o-1");
        let mut marks = Watermarks::new();

        assert_eq!(marks.advance(&scope, Some(5)), Some(5));
        assert_eq!(marks.advance(&scope, Some(3)), Some(5));
        assert_eq!(marks.advance(&scope, None), Some(5));
        assert_eq!(marks.advance(&scope, Some(8)), Some(8));
    }

    #[test]
    fn test_staleness_per_scope() {
        let a = Scope::new(ResourceType::Order, "o-1");
        let b = Scope::new(ResourceType::Order, "o-2");
        let mut marks = Watermarks::new();
        marks.advance(&a, Some(10));

        assert!(marks.is_stale(&a, Some(10)));
        assert!(marks.is_stale(&a, Some(2)));
        assert!(!marks.is_stale(&a, Some(11)));
        assert!(!marks.is_stale(&a, None));
        assert!(!marks.is_stale(&b, Some(1)));
    }
}
