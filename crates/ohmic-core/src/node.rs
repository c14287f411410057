//! Node references and the dynamic-topology primitive.
//!
//! Nodes are owned by an external topology registry; devices hold
//! non-owning `NodeId` associations and address their matrix entries by
//! local terminal index. The only topology operation a device may perform
//! is requesting a fresh internal node for an auxiliary sub-device.

use std::fmt;

/// Unique identifier for a node owned by the external topology registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// The ground node (node 0).
    pub const GROUND: NodeId = NodeId(0);

    /// Create a new NodeId from a raw value.
    pub fn new(id: u32) -> Self {
        NodeId(id)
    }

    /// Get the raw node ID value.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Check if this is the ground node.
    pub fn is_ground(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ground() {
            write!(f, "GND")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Topology operations a device may request during `init<Mode>`.
///
/// Implemented by the external node registry. Devices that insert
/// auxiliary sub-circuits (series resistances) use this to obtain internal
/// nodes; all other devices ignore it.
pub trait NodeRegistry {
    /// Allocate a fresh internal node. `name` is a diagnostic label such
    /// as `"M1:drain"`; registries may record it for reporting.
    fn allocate_internal(&mut self, name: &str) -> NodeId;
}

/// Minimal registry handing out consecutive node IDs.
///
/// Sufficient for standalone device evaluation and tests; a full
/// simulator supplies its own registry with renumbering support.
#[derive(Debug, Clone)]
pub struct SequentialRegistry {
    next: u32,
}

impl SequentialRegistry {
    /// Create a registry whose first internal node comes after `max_node`.
    pub fn new(max_node: u32) -> Self {
        Self { next: max_node + 1 }
    }
}

impl NodeRegistry for SequentialRegistry {
    fn allocate_internal(&mut self, _name: &str) -> NodeId {
        let id = NodeId::new(self.next);
        self.next += 1;
        id
    }
}
