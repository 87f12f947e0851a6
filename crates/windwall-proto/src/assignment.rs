//! Node addressing table.
//!
//! Each node owns a contiguous, half-open range of frame positions. The table
//! is static configuration: it is fixed when a node is built or booted and is
//! never negotiated on the wire.

use std::{fmt, ops::Range};

use serde::{Deserialize, Serialize};

use crate::errors::{ProtocolError, Result};

/// Identity of an actuation node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u8);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node{}", self.0)
    }
}

/// Maps frame positions to slots in a node's receive buffer.
///
/// The node parser only ever asks "does this position belong to me, and if
/// so where do I store it". Positional addressing answers with a range check;
/// other schemes can be plugged in without touching the parser.
pub trait Addressing {
    /// Buffer slot for a byte at `position` in the frame, if this node owns it.
    fn slot(&self, position: usize) -> Option<usize>;

    /// Number of slots (motors) this node owns.
    fn slots(&self) -> usize;
}

/// A node and the half-open range of motor indices it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAssignment {
    /// Owning node
    pub node: NodeId,
    /// First owned motor index
    pub start: usize,
    /// One past the last owned motor index
    pub end: usize,
}

impl NodeAssignment {
    /// Create an assignment of `start..end` to `node`.
    pub fn new(node: NodeId, range: Range<usize>) -> Self {
        Self { node, start: range.start, end: range.end }
    }

    /// Owned motor indices.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Number of owned motors.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// True if the range is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if `index` falls inside this node's range.
    pub fn contains(&self, index: usize) -> bool {
        self.range().contains(&index)
    }
}

impl Addressing for NodeAssignment {
    fn slot(&self, position: usize) -> Option<usize> {
        self.contains(position).then(|| position - self.start)
    }

    fn slots(&self) -> usize {
        self.len()
    }
}

/// Complete node table: a partition of `0..n_motors` into node ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTable {
    n_motors: usize,
    entries: Vec<NodeAssignment>,
}

impl NodeTable {
    /// Validate and build a table.
    ///
    /// Entries may be given in any order; they are stored sorted by range.
    ///
    /// # Errors
    ///
    /// Fails if a node is listed twice, a range is empty or out of bounds, or
    /// the ranges leave a gap or overlap.
    pub fn new(n_motors: usize, mut entries: Vec<NodeAssignment>) -> Result<Self> {
        let mut seen = Vec::with_capacity(entries.len());
        for entry in &entries {
            if seen.contains(&entry.node) {
                return Err(ProtocolError::DuplicateNode { node: entry.node.0 });
            }
            seen.push(entry.node);

            if entry.is_empty() {
                return Err(ProtocolError::EmptyAssignment { node: entry.node.0 });
            }
            if entry.end > n_motors {
                return Err(ProtocolError::AssignmentOutOfRange {
                    node: entry.node.0,
                    start: entry.start,
                    end: entry.end,
                    n_motors,
                });
            }
        }

        entries.sort_by_key(|entry| entry.start);

        let mut cursor = 0;
        for entry in &entries {
            if entry.start > cursor {
                return Err(ProtocolError::AssignmentGap { index: cursor });
            }
            if entry.start < cursor {
                return Err(ProtocolError::AssignmentOverlap { index: entry.start });
            }
            cursor = entry.end;
        }
        if cursor < n_motors {
            return Err(ProtocolError::AssignmentGap { index: cursor });
        }

        Ok(Self { n_motors, entries })
    }

    /// `nodes` nodes of `per_node` motors each, node `k` owning
    /// `k * per_node..(k + 1) * per_node`.
    pub fn uniform(nodes: u8, per_node: usize) -> Self {
        let entries = (0..nodes)
            .map(|k| {
                let start = usize::from(k) * per_node;
                NodeAssignment::new(NodeId(k), start..start + per_node)
            })
            .collect();

        Self { n_motors: usize::from(nodes) * per_node, entries }
    }

    /// Total motor count (frame length).
    pub fn n_motors(&self) -> usize {
        self.n_motors
    }

    /// All assignments, sorted by range.
    pub fn entries(&self) -> &[NodeAssignment] {
        &self.entries
    }

    /// Assignment of a node.
    pub fn get(&self, node: NodeId) -> Option<&NodeAssignment> {
        self.entries.iter().find(|entry| entry.node == node)
    }

    /// Assignment owning a motor index.
    pub fn owner_of(&self, index: usize) -> Option<&NodeAssignment> {
        self.entries.iter().find(|entry| entry.contains(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(node: u8, range: Range<usize>) -> NodeAssignment {
        NodeAssignment::new(NodeId(node), range)
    }

    #[test]
    fn uniform_partitions_motor_space() {
        let table = NodeTable::uniform(4, 9);
        assert_eq!(table.n_motors(), 36);
        assert_eq!(table.get(NodeId(2)).map(NodeAssignment::range), Some(18..27));
        assert_eq!(table.owner_of(35).map(|e| e.node), Some(NodeId(3)));
        assert!(table.owner_of(36).is_none());

        let rebuilt = NodeTable::new(36, table.entries().to_vec());
        assert_eq!(rebuilt, Ok(table));
    }

    #[test]
    fn accepts_unsorted_entries() {
        let table = NodeTable::new(6, vec![entry(1, 3..6), entry(0, 0..3)]).unwrap();
        assert_eq!(table.entries()[0].node, NodeId(0));
    }

    #[test]
    fn rejects_gap() {
        let result = NodeTable::new(6, vec![entry(0, 0..2), entry(1, 3..6)]);
        assert_eq!(result, Err(ProtocolError::AssignmentGap { index: 2 }));

        let result = NodeTable::new(6, vec![entry(0, 0..3)]);
        assert_eq!(result, Err(ProtocolError::AssignmentGap { index: 3 }));
    }

    #[test]
    fn rejects_overlap() {
        let result = NodeTable::new(6, vec![entry(0, 0..4), entry(1, 3..6)]);
        assert_eq!(result, Err(ProtocolError::AssignmentOverlap { index: 3 }));
    }

    #[test]
    fn rejects_out_of_range_and_empty() {
        assert!(matches!(
            NodeTable::new(6, vec![entry(0, 0..7)]),
            Err(ProtocolError::AssignmentOutOfRange { .. })
        ));
        assert_eq!(
            NodeTable::new(6, vec![entry(0, 0..6), entry(1, 6..6)]),
            Err(ProtocolError::EmptyAssignment { node: 1 })
        );
    }

    #[test]
    fn rejects_duplicate_node() {
        let result = NodeTable::new(6, vec![entry(0, 0..3), entry(0, 3..6)]);
        assert_eq!(result, Err(ProtocolError::DuplicateNode { node: 0 }));
    }

    #[test]
    fn positional_slots() {
        let assignment = entry(1, 9..18);
        assert_eq!(assignment.slot(8), None);
        assert_eq!(assignment.slot(9), Some(0));
        assert_eq!(assignment.slot(17), Some(8));
        assert_eq!(assignment.slot(18), None);
        assert_eq!(assignment.slots(), 9);
    }
}
