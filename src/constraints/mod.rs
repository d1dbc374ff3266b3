//! Constraints and constraint sets
//!
//! A constraint restricts degrees of freedom of one or more nodes; a
//! constraint set names a collection of constraints an analysis can
//! reference. Sets own references only — membership lives in the model's
//! cross-reference tables.

use std::collections::BTreeSet;

use nalgebra::Vector3;

use crate::dof::{Dof, Dofs};
use crate::reference::{Identifiable, Identity};

/// Closed subtype enumeration for constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConstraintType {
    SinglePoint,
    QuasiRigid,
    Rbe3,
    Lmpc,
    Gap,
}

/// One slave node of a weighted-average constraint
#[derive(Debug, Clone)]
pub struct Rbe3Slave {
    pub position: usize,
    pub dofs: Dofs,
    pub coefficient: f64,
}

/// One term of a linear multi-point equation
#[derive(Debug, Clone)]
pub struct LmpcTerm {
    pub position: usize,
    pub dof: Dof,
    pub coefficient: f64,
}

/// Per-variant payload of a constraint
#[derive(Debug, Clone)]
pub enum ConstraintKind {
    /// Fixed values on individual degrees of freedom of a node set
    SinglePoint {
        node_positions: BTreeSet<usize>,
        /// Fixed value per degree of freedom, position order; `Some` means
        /// blocked
        values: [Option<f64>; 6],
    },
    /// Homogeneous rigid link: the slaves follow the master on the given
    /// dofs
    QuasiRigid {
        master_position: usize,
        slave_positions: BTreeSet<usize>,
        dofs: Dofs,
    },
    /// Weighted average: the master follows a weighted combination of the
    /// slaves
    Rbe3 {
        master_position: usize,
        master_dofs: Dofs,
        slaves: Vec<Rbe3Slave>,
    },
    /// Linear multi-point equation: sum of coefficient * dof = constant
    Lmpc {
        terms: Vec<LmpcTerm>,
        constant: f64,
    },
    /// Two-node clearance
    Gap {
        start_position: usize,
        end_position: usize,
        initial_gap: f64,
        direction: Option<Vector3<f64>>,
    },
}

/// A constraint of the model
#[derive(Debug, Clone)]
pub struct Constraint {
    ident: Identity,
    pub kind: ConstraintKind,
}

impl Constraint {
    /// Single point constraint fixing `dofs` to one common value
    pub fn single_point(original_id: Option<u32>, dofs: Dofs, value: f64) -> Constraint {
        let mut values = [None; 6];
        for dof in dofs {
            values[dof.position()] = Some(value);
        }
        Constraint {
            ident: Identity::new(original_id),
            kind: ConstraintKind::SinglePoint {
                node_positions: BTreeSet::new(),
                values,
            },
        }
    }

    pub fn quasi_rigid(
        original_id: Option<u32>,
        master_position: usize,
        dofs: Dofs,
    ) -> Constraint {
        Constraint {
            ident: Identity::new(original_id),
            kind: ConstraintKind::QuasiRigid {
                master_position,
                slave_positions: BTreeSet::new(),
                dofs,
            },
        }
    }

    pub fn rbe3(
        original_id: Option<u32>,
        master_position: usize,
        master_dofs: Dofs,
    ) -> Constraint {
        Constraint {
            ident: Identity::new(original_id),
            kind: ConstraintKind::Rbe3 {
                master_position,
                master_dofs,
                slaves: Vec::new(),
            },
        }
    }

    pub fn lmpc(original_id: Option<u32>, terms: Vec<LmpcTerm>, constant: f64) -> Constraint {
        Constraint {
            ident: Identity::new(original_id),
            kind: ConstraintKind::Lmpc { terms, constant },
        }
    }

    pub fn gap(
        original_id: Option<u32>,
        start_position: usize,
        end_position: usize,
        initial_gap: f64,
    ) -> Constraint {
        Constraint {
            ident: Identity::new(original_id),
            kind: ConstraintKind::Gap {
                start_position,
                end_position,
                initial_gap,
                direction: None,
            },
        }
    }

    /// Attach a node to a single point constraint or a slave to a rigid
    /// link; no-op for other kinds
    pub fn add_node_position(&mut self, position: usize) {
        match &mut self.kind {
            ConstraintKind::SinglePoint { node_positions, .. } => {
                node_positions.insert(position);
            }
            ConstraintKind::QuasiRigid {
                slave_positions, ..
            } => {
                slave_positions.insert(position);
            }
            _ => {}
        }
    }

    pub fn with_node_positions(mut self, positions: &[usize]) -> Constraint {
        for &position in positions {
            self.add_node_position(position);
        }
        self
    }

    pub fn add_rbe3_slave(&mut self, slave: Rbe3Slave) {
        if let ConstraintKind::Rbe3 { slaves, .. } = &mut self.kind {
            slaves.push(slave);
        }
    }

    /// Fix one degree of freedom of a single point constraint to a value
    pub fn set_dof_value(&mut self, dof: Dof, value: f64) {
        if let ConstraintKind::SinglePoint { values, .. } = &mut self.kind {
            values[dof.position()] = Some(value);
        }
    }

    /// Fixed value for a degree of freedom, for single point constraints
    pub fn value_for_dof(&self, dof: Dof) -> Option<f64> {
        match &self.kind {
            ConstraintKind::SinglePoint { values, .. } => values[dof.position()],
            _ => None,
        }
    }

    /// Every node position the constraint touches, ascending
    pub fn node_positions(&self) -> Vec<usize> {
        match &self.kind {
            ConstraintKind::SinglePoint { node_positions, .. } => {
                node_positions.iter().copied().collect()
            }
            ConstraintKind::QuasiRigid {
                master_position,
                slave_positions,
                ..
            } => {
                let mut positions: BTreeSet<usize> = slave_positions.clone();
                positions.insert(*master_position);
                positions.into_iter().collect()
            }
            ConstraintKind::Rbe3 {
                master_position,
                slaves,
                ..
            } => {
                let mut positions: BTreeSet<usize> =
                    slaves.iter().map(|s| s.position).collect();
                positions.insert(*master_position);
                positions.into_iter().collect()
            }
            ConstraintKind::Lmpc { terms, .. } => {
                let positions: BTreeSet<usize> = terms.iter().map(|t| t.position).collect();
                positions.into_iter().collect()
            }
            ConstraintKind::Gap {
                start_position,
                end_position,
                ..
            } => {
                let mut positions = BTreeSet::new();
                positions.insert(*start_position);
                positions.insert(*end_position);
                positions.into_iter().collect()
            }
        }
    }

    /// Degrees of freedom the constraint blocks or couples at a node
    pub fn dofs_for_node(&self, position: usize) -> Dofs {
        match &self.kind {
            ConstraintKind::SinglePoint {
                node_positions,
                values,
            } => {
                if !node_positions.contains(&position) {
                    return Dofs::NONE;
                }
                let mut dofs = Dofs::NONE;
                for (i, value) in values.iter().enumerate() {
                    if value.is_some() {
                        dofs += Dof::from_position(i);
                    }
                }
                dofs
            }
            ConstraintKind::QuasiRigid {
                master_position,
                slave_positions,
                dofs,
            } => {
                if position == *master_position || slave_positions.contains(&position) {
                    *dofs
                } else {
                    Dofs::NONE
                }
            }
            ConstraintKind::Rbe3 {
                master_position,
                master_dofs,
                slaves,
            } => {
                if position == *master_position {
                    return *master_dofs;
                }
                slaves
                    .iter()
                    .filter(|s| s.position == position)
                    .fold(Dofs::NONE, |acc, s| acc + s.dofs)
            }
            ConstraintKind::Lmpc { terms, .. } => terms
                .iter()
                .filter(|t| t.position == position)
                .fold(Dofs::NONE, |acc, t| acc + t.dof),
            ConstraintKind::Gap {
                start_position,
                end_position,
                ..
            } => {
                if position == *start_position || position == *end_position {
                    Dofs::TRANSLATIONS
                } else {
                    Dofs::NONE
                }
            }
        }
    }

    /// Detach a node from a single point constraint (redundancy removal)
    pub fn remove_node(&mut self, position: usize) {
        match &mut self.kind {
            ConstraintKind::SinglePoint { node_positions, .. } => {
                node_positions.remove(&position);
            }
            ConstraintKind::QuasiRigid {
                slave_positions, ..
            } => {
                slave_positions.remove(&position);
            }
            _ => {}
        }
    }

    /// Empty application or nothing blocked; such constraints are dropped
    /// by the hygiene pass
    pub fn ineffective(&self) -> bool {
        match &self.kind {
            ConstraintKind::SinglePoint {
                node_positions,
                values,
            } => node_positions.is_empty() || values.iter().all(|v| v.is_none()),
            ConstraintKind::QuasiRigid {
                slave_positions,
                dofs,
                ..
            } => slave_positions.is_empty() || dofs.is_empty(),
            ConstraintKind::Rbe3 { slaves, master_dofs, .. } => {
                slaves.is_empty() || master_dofs.is_empty()
            }
            ConstraintKind::Lmpc { terms, .. } => terms.is_empty(),
            ConstraintKind::Gap { .. } => false,
        }
    }
}

impl Identifiable for Constraint {
    type Type = ConstraintType;
    const KIND: &'static str = "Constraint";

    fn ident(&self) -> &Identity {
        &self.ident
    }

    fn ident_mut(&mut self) -> &mut Identity {
        &mut self.ident
    }

    fn subtype(&self) -> ConstraintType {
        match self.kind {
            ConstraintKind::SinglePoint { .. } => ConstraintType::SinglePoint,
            ConstraintKind::QuasiRigid { .. } => ConstraintType::QuasiRigid,
            ConstraintKind::Rbe3 { .. } => ConstraintType::Rbe3,
            ConstraintKind::Lmpc { .. } => ConstraintType::Lmpc,
            ConstraintKind::Gap { .. } => ConstraintType::Gap,
        }
    }

    fn validate(&self) -> bool {
        !self.ineffective() || matches!(self.kind, ConstraintKind::Gap { .. })
    }
}

/// Closed subtype enumeration for constraint sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConstraintSetType {
    /// Single point constraint collection
    Spc,
    /// Multi-point constraint collection
    Mpc,
    /// The common set implicitly applied to every analysis
    All,
}

/// A named collection of constraints
#[derive(Debug, Clone)]
pub struct ConstraintSet {
    ident: Identity,
    pub set_type: ConstraintSetType,
    pub label: Option<String>,
}

impl ConstraintSet {
    pub fn new(set_type: ConstraintSetType, original_id: Option<u32>) -> ConstraintSet {
        ConstraintSet {
            ident: Identity::new(original_id),
            set_type,
            label: None,
        }
    }

    pub fn with_label(mut self, label: &str) -> ConstraintSet {
        self.label = Some(label.to_string());
        self
    }
}

impl Identifiable for ConstraintSet {
    type Type = ConstraintSetType;
    const KIND: &'static str = "ConstraintSet";

    fn ident(&self) -> &Identity {
        &self.ident
    }

    fn ident_mut(&mut self) -> &mut Identity {
        &mut self.ident
    }

    fn subtype(&self) -> ConstraintSetType {
        self.set_type
    }
}
