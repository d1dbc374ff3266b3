//! Direct matrix elements
//!
//! A direct matrix couples degrees of freedom of arbitrary node pairs with
//! explicit coefficients, bypassing any geometric formulation. Data is held
//! as one small [`DofMatrix`] per unordered node-position pair.

use std::collections::{BTreeMap, BTreeSet};

use crate::dof::{Dof, DofMatrix, Dofs};

/// What physical quantity the coefficients describe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatrixType {
    Stiffness,
    Mass,
    Damping,
}

/// A direct coupling matrix over node positions
#[derive(Debug, Clone)]
pub struct MatrixElement {
    pub matrix_type: MatrixType,
    submatrices: BTreeMap<(usize, usize), DofMatrix>,
}

impl MatrixElement {
    pub fn new(matrix_type: MatrixType) -> MatrixElement {
        MatrixElement {
            matrix_type,
            submatrices: BTreeMap::new(),
        }
    }

    fn key(p1: usize, p2: usize) -> (usize, usize) {
        if p1 <= p2 {
            (p1, p2)
        } else {
            (p2, p1)
        }
    }

    /// Store one coefficient between (node1, dof1) and (node2, dof2)
    pub fn add_component(&mut self, p1: usize, dof1: Dof, p2: usize, dof2: Dof, value: f64) {
        let (a, b) = Self::key(p1, p2);
        // keep the dof pair aligned with the canonical node order
        let (d1, d2) = if (a, b) == (p1, p2) {
            (dof1, dof2)
        } else {
            (dof2, dof1)
        };
        self.submatrices
            .entry((a, b))
            .or_insert_with(|| DofMatrix::new(a == b))
            .add_component(d1, d2, value);
    }

    pub fn submatrix(&self, p1: usize, p2: usize) -> Option<&DofMatrix> {
        self.submatrices.get(&Self::key(p1, p2))
    }

    /// Every node position touched by a coefficient, ascending
    pub fn node_positions(&self) -> BTreeSet<usize> {
        let mut positions = BTreeSet::new();
        for &(p1, p2) in self.submatrices.keys() {
            positions.insert(p1);
            positions.insert(p2);
        }
        positions
    }

    /// Canonical node-position pairs with stored submatrices, ascending
    pub fn node_pairs(&self) -> Vec<(usize, usize)> {
        self.submatrices.keys().copied().collect()
    }

    /// Union of the dofs coupled at one node position
    pub fn dofs_for_node(&self, position: usize) -> Dofs {
        let mut dofs = Dofs::NONE;
        for (&(p1, p2), submatrix) in &self.submatrices {
            if p1 != position && p2 != position {
                continue;
            }
            for (&(d1, d2), _) in submatrix.components() {
                if p1 == position {
                    dofs += d1;
                }
                if p2 == position {
                    dofs += d2;
                }
            }
        }
        dofs
    }

    pub fn clear(&mut self) {
        self.submatrices.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.submatrices.is_empty()
    }

    /// Total number of stored coefficients
    pub fn component_count(&self) -> usize {
        self.submatrices.values().map(|m| m.len()).sum()
    }

    /// Sum of all stored coefficients; invariant under splitting
    pub fn component_sum(&self) -> f64 {
        self.submatrices
            .values()
            .flat_map(|m| m.components().map(|(_, &v)| v))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_canonicalization() {
        let mut m = MatrixElement::new(MatrixType::Stiffness);
        m.add_component(5, Dof::Dx, 2, Dof::Dy, 3.0);
        let sub = m.submatrix(2, 5).unwrap();
        assert_eq!(sub.component(Dof::Dy, Dof::Dx), 3.0);
        assert!(m.submatrix(5, 2).is_some());
        assert_eq!(m.node_pairs(), vec![(2, 5)]);
    }

    #[test]
    fn test_node_positions_and_dofs() {
        let mut m = MatrixElement::new(MatrixType::Mass);
        m.add_component(1, Dof::Dx, 1, Dof::Dx, 1.0);
        m.add_component(1, Dof::Rz, 4, Dof::Dy, 2.0);
        assert_eq!(m.node_positions().into_iter().collect::<Vec<_>>(), vec![1, 4]);
        assert_eq!(m.dofs_for_node(1), Dofs::from(Dof::Dx) + Dof::Rz);
        assert_eq!(m.dofs_for_node(4), Dofs::from(Dof::Dy));
    }

    #[test]
    fn test_component_sum() {
        let mut m = MatrixElement::new(MatrixType::Stiffness);
        m.add_component(0, Dof::Dx, 0, Dof::Dx, 1.5);
        m.add_component(0, Dof::Dx, 1, Dof::Dx, -0.5);
        assert_eq!(m.component_sum(), 1.0);
        assert_eq!(m.component_count(), 2);
    }
}
