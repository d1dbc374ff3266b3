//! Boundary targets
//!
//! Targets describe boundary lines and surfaces by node chains, as contact
//! and surface constructs reference them. The pipeline can materialize them
//! into segment and face cells for writers that need explicit geometry.

use crate::reference::{Identifiable, Identity};

/// Closed subtype enumeration for targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TargetType {
    BoundaryNodeLine,
    BoundaryNodeSurface,
}

/// Per-variant payload of a target
#[derive(Debug, Clone)]
pub enum TargetKind {
    /// An ordered chain of node positions forming a boundary line
    BoundaryNodeLine { node_positions: Vec<usize> },
    /// Quadruples of node positions forming boundary faces; degenerate
    /// fourth nodes repeat the third to describe triangles
    BoundaryNodeSurface { node_positions: Vec<[usize; 4]> },
}

/// A boundary descriptor of the model
#[derive(Debug, Clone)]
pub struct Target {
    ident: Identity,
    pub kind: TargetKind,
}

impl Target {
    pub fn boundary_node_line(original_id: Option<u32>, node_positions: Vec<usize>) -> Target {
        Target {
            ident: Identity::new(original_id),
            kind: TargetKind::BoundaryNodeLine { node_positions },
        }
    }

    pub fn boundary_node_surface(
        original_id: Option<u32>,
        node_positions: Vec<[usize; 4]>,
    ) -> Target {
        Target {
            ident: Identity::new(original_id),
            kind: TargetKind::BoundaryNodeSurface { node_positions },
        }
    }

    /// Every node position the target references, in description order
    pub fn node_positions(&self) -> Vec<usize> {
        match &self.kind {
            TargetKind::BoundaryNodeLine { node_positions } => node_positions.clone(),
            TargetKind::BoundaryNodeSurface { node_positions } => {
                node_positions.iter().flatten().copied().collect()
            }
        }
    }
}

impl Identifiable for Target {
    type Type = TargetType;
    const KIND: &'static str = "Target";

    fn ident(&self) -> &Identity {
        &self.ident
    }

    fn ident_mut(&mut self) -> &mut Identity {
        &mut self.ident
    }

    fn subtype(&self) -> TargetType {
        match self.kind {
            TargetKind::BoundaryNodeLine { .. } => TargetType::BoundaryNodeLine,
            TargetKind::BoundaryNodeSurface { .. } => TargetType::BoundaryNodeSurface,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_positions_keep_order() {
        let line = Target::boundary_node_line(Some(1), vec![3, 1, 2]);
        assert_eq!(line.node_positions(), vec![3, 1, 2]);
        assert_eq!(line.subtype(), TargetType::BoundaryNodeLine);
    }

    #[test]
    fn test_surface_positions_flatten() {
        let surface = Target::boundary_node_surface(None, vec![[0, 1, 2, 2], [1, 3, 4, 5]]);
        assert_eq!(surface.node_positions(), vec![0, 1, 2, 2, 1, 3, 4, 5]);
    }
}
