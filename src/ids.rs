//! Identifier generation for store records.
//!
//! Ids are opaque strings and are never reused once handed out.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Random v4 UUIDs. The default outside of tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Monotonic `<prefix>-<n>` ids, starting at 1.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.prefix, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_ids_are_monotonic() {
        let ids = SequentialIds::new("sh");
        assert_eq!(ids.next_id(), "sh-1");
        assert_eq!(ids.next_id(), "sh-2");
        assert_eq!(ids.next_id(), "sh-3");
    }

    #[test]
    fn uuid_ids_differ() {
        let ids = UuidIds;
        assert_ne!(ids.next_id(), ids.next_id());
    }
}
