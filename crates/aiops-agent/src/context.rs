//! Per-conversation memory of the most recently touched resources.

use std::collections::HashMap;

use aiops_protocol::{ResourceKind, ResourceRef};

/// One slot per resource kind, holding the last resource a successful
/// action created or affected.
///
/// Owned by the operator path only. Never rolled back on failure.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    slots: HashMap<ResourceKind, ResourceRef>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: ResourceKind) -> Option<&ResourceRef> {
        self.slots.get(&kind)
    }

    /// Replace the slot for the reference's kind.
    pub fn remember(&mut self, reference: ResourceRef) {
        tracing::debug!(kind = %reference.kind, id = %reference.id, "session context updated");
        self.slots.insert(reference.kind, reference);
    }

    pub fn reset(&mut self) {
        self.slots.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_per_kind() {
        let mut ctx = SessionContext::new();
        ctx.remember(ResourceRef::instance("i-0aaaaaaaa"));
        ctx.remember(ResourceRef::new(ResourceKind::Network, "vpc-0bbbbbbbb"));
        ctx.remember(ResourceRef::instance("i-0cccccccc"));

        assert_eq!(ctx.get(ResourceKind::Instance).unwrap().id, "i-0cccccccc");
        assert_eq!(ctx.get(ResourceKind::Network).unwrap().id, "vpc-0bbbbbbbb");
        assert!(ctx.get(ResourceKind::Subnet).is_none());

        ctx.reset();
        assert!(ctx.is_empty());
    }
}
