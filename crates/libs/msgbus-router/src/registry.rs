//! A thin directory of known *other* routers this one could open a
//! parent-link to. Populated from `"topoRutrCn"` responses and consulted
//! by a higher-level bootstrap step, never by the router's per-message
//! hot path — it does not open sockets itself, since transports are out
//! of scope.

use std::collections::BTreeMap;

use msgbus_wire::{ConnectionKind, EndpointId, ProcessInstanceId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterDescriptor {
    pub router_id: EndpointId,
    pub instance_id: ProcessInstanceId,
    pub connect_kind: ConnectionKind,
}

#[derive(Default)]
pub struct RouterRegistry {
    known: BTreeMap<EndpointId, RouterDescriptor>,
}

impl RouterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records (or refreshes) what a `"topoRutrCn"` response told us about
    /// another router.
    pub fn observe(&mut self, descriptor: RouterDescriptor) {
        self.known.insert(descriptor.router_id, descriptor);
    }

    pub fn get(&self, router_id: EndpointId) -> Option<&RouterDescriptor> {
        self.known.get(&router_id)
    }

    pub fn known_routers(&self) -> impl Iterator<Item = &RouterDescriptor> {
        self.known.values()
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}
