//! Isolation domains.
//!
//! Every heap item is stamped with the domain that was current when it was allocated. A weak
//! handle or registration whose target lives in a different domain than its owner holds the
//! target strongly, so collection timing is never observable across domains.

use core::fmt;

use super::finalization::Edge;
use super::ObjectRef;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DomainId(u32);

impl DomainId {
    /// The domain a context starts in.
    pub const MAIN: DomainId = DomainId(0);

    #[inline]
    pub fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "domain#{}", self.0)
    }
}

pub struct Domains {
    current: DomainId,
    next_id: u32,
}

impl Domains {
    pub fn new() -> Domains {
        Domains { current: DomainId::MAIN, next_id: 1 }
    }

    #[inline]
    pub fn current(&self) -> DomainId {
        self.current
    }

    pub fn set_current(&mut self, domain: DomainId) -> DomainId {
        core::mem::replace(&mut self.current, domain)
    }

    pub fn create(&mut self) -> DomainId {
        let domain = DomainId(self.next_id);
        self.next_id += 1;
        domain
    }
}

/// Choose how an owner in `owner_domain` holds `target`.
pub fn edge_for_target(owner_domain: DomainId, target: ObjectRef) -> Edge {
    if target.domain() == owner_domain {
        Edge::Weak(target)
    } else {
        tracing::trace!(
            owner = %owner_domain,
            target = %target.domain(),
            "cross-domain target held strongly"
        );
        Edge::Strong(target)
    }
}
