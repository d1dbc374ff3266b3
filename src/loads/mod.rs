//! Loadings and load sets
//!
//! A loading applies forces, accelerations or imposed motion to nodes or
//! cells; a load set names a collection of loadings an analysis can
//! reference. Sets own references only — membership lives in the model's
//! cross-reference tables.

use std::collections::BTreeSet;

use nalgebra::Vector3;

use crate::dof::{Dof, Dofs};
use crate::mesh::Mesh;
use crate::reference::{Identifiable, Identity, Reference};

/// Closed subtype enumeration for loadings
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoadingType {
    NodalForce,
    Gravity,
    ForceSurface,
    ImposedDisplacement,
}

/// Where a surface force applies
#[derive(Debug, Clone)]
pub enum SurfaceApplication {
    /// All cells of a named mesh cell group
    CellGroup(String),
    /// One face of a volume cell, by node positions; materialized into a
    /// skin cell by the pipeline
    CellFace {
        cell_position: usize,
        face_node_positions: Vec<usize>,
    },
    /// A skin cell created by the pipeline
    SkinCell { cell_position: usize },
}

/// Per-variant payload of a loading
#[derive(Debug, Clone)]
pub enum LoadingKind {
    NodalForce {
        node_positions: BTreeSet<usize>,
        force: Vector3<f64>,
        moment: Vector3<f64>,
    },
    Gravity {
        acceleration: Vector3<f64>,
    },
    ForceSurface {
        application: SurfaceApplication,
        force: Vector3<f64>,
    },
    ImposedDisplacement {
        node_positions: BTreeSet<usize>,
        /// Imposed value per degree of freedom, position order
        values: [Option<f64>; 6],
    },
}

/// A loading of the model
#[derive(Debug, Clone)]
pub struct Loading {
    ident: Identity,
    pub kind: LoadingKind,
}

impl Loading {
    pub fn nodal_force(
        original_id: Option<u32>,
        force: Vector3<f64>,
        moment: Vector3<f64>,
    ) -> Loading {
        Loading {
            ident: Identity::new(original_id),
            kind: LoadingKind::NodalForce {
                node_positions: BTreeSet::new(),
                force,
                moment,
            },
        }
    }

    pub fn gravity(original_id: Option<u32>, acceleration: Vector3<f64>) -> Loading {
        Loading {
            ident: Identity::new(original_id),
            kind: LoadingKind::Gravity { acceleration },
        }
    }

    pub fn force_surface(
        original_id: Option<u32>,
        application: SurfaceApplication,
        force: Vector3<f64>,
    ) -> Loading {
        Loading {
            ident: Identity::new(original_id),
            kind: LoadingKind::ForceSurface { application, force },
        }
    }

    pub fn imposed_displacement(original_id: Option<u32>, dofs: Dofs, value: f64) -> Loading {
        let mut values = [None; 6];
        for dof in dofs {
            values[dof.position()] = Some(value);
        }
        Loading {
            ident: Identity::new(original_id),
            kind: LoadingKind::ImposedDisplacement {
                node_positions: BTreeSet::new(),
                values,
            },
        }
    }

    /// Attach a node position to a nodal loading; no-op for volumic and
    /// cell-applied kinds
    pub fn add_node_position(&mut self, position: usize) {
        match &mut self.kind {
            LoadingKind::NodalForce { node_positions, .. }
            | LoadingKind::ImposedDisplacement { node_positions, .. } => {
                node_positions.insert(position);
            }
            LoadingKind::Gravity { .. } | LoadingKind::ForceSurface { .. } => {}
        }
    }

    pub fn with_node_positions(mut self, positions: &[usize]) -> Loading {
        for &position in positions {
            self.add_node_position(position);
        }
        self
    }

    /// Node positions the loading applies to directly
    pub fn node_positions(&self, mesh: &Mesh) -> Vec<usize> {
        match &self.kind {
            LoadingKind::NodalForce { node_positions, .. }
            | LoadingKind::ImposedDisplacement { node_positions, .. } => {
                node_positions.iter().copied().collect()
            }
            LoadingKind::Gravity { .. } => Vec::new(),
            LoadingKind::ForceSurface { application, .. } => match application {
                SurfaceApplication::CellGroup(name) => mesh.cell_group_node_positions(name),
                SurfaceApplication::CellFace {
                    face_node_positions, ..
                } => face_node_positions.clone(),
                SurfaceApplication::SkinCell { cell_position } => mesh
                    .cell(*cell_position)
                    .map(|cell| cell.node_positions)
                    .unwrap_or_default(),
            },
        }
    }

    /// Degrees of freedom the loading demands at a node. Forces demand the
    /// dofs of their non-zero components; element-borne kinds demand none.
    pub fn dofs_for_node(&self, position: usize) -> Dofs {
        match &self.kind {
            LoadingKind::NodalForce {
                node_positions,
                force,
                moment,
            } => {
                if !node_positions.contains(&position) {
                    return Dofs::NONE;
                }
                let mut dofs = Dofs::NONE;
                for (i, component) in force.iter().enumerate() {
                    if *component != 0.0 {
                        dofs += Dof::from_position(i);
                    }
                }
                for (i, component) in moment.iter().enumerate() {
                    if *component != 0.0 {
                        dofs += Dof::from_position(i + 3);
                    }
                }
                dofs
            }
            LoadingKind::ImposedDisplacement {
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
            LoadingKind::Gravity { .. } | LoadingKind::ForceSurface { .. } => Dofs::NONE,
        }
    }

    /// Imposed value for a degree of freedom, for displacement loadings
    pub fn imposed_value(&self, dof: Dof) -> Option<f64> {
        match &self.kind {
            LoadingKind::ImposedDisplacement { values, .. } => values[dof.position()],
            _ => None,
        }
    }

    /// Scale every magnitude by a factor (combined load set flattening)
    pub fn scale(&mut self, factor: f64) {
        match &mut self.kind {
            LoadingKind::NodalForce { force, moment, .. } => {
                *force *= factor;
                *moment *= factor;
            }
            LoadingKind::Gravity { acceleration } => *acceleration *= factor,
            LoadingKind::ForceSurface { force, .. } => *force *= factor,
            LoadingKind::ImposedDisplacement { values, .. } => {
                for value in values.iter_mut().flatten() {
                    *value *= factor;
                }
            }
        }
    }

    /// Zero magnitude or empty application; such loadings are dropped by
    /// the hygiene pass
    pub fn ineffective(&self) -> bool {
        match &self.kind {
            LoadingKind::NodalForce {
                node_positions,
                force,
                moment,
            } => node_positions.is_empty() || (force.norm() == 0.0 && moment.norm() == 0.0),
            LoadingKind::Gravity { acceleration } => acceleration.norm() == 0.0,
            LoadingKind::ForceSurface { force, .. } => force.norm() == 0.0,
            LoadingKind::ImposedDisplacement {
                node_positions,
                values,
            } => node_positions.is_empty() || values.iter().all(|v| v.is_none()),
        }
    }
}

impl Identifiable for Loading {
    type Type = LoadingType;
    const KIND: &'static str = "Loading";

    fn ident(&self) -> &Identity {
        &self.ident
    }

    fn ident_mut(&mut self) -> &mut Identity {
        &mut self.ident
    }

    fn subtype(&self) -> LoadingType {
        match self.kind {
            LoadingKind::NodalForce { .. } => LoadingType::NodalForce,
            LoadingKind::Gravity { .. } => LoadingType::Gravity,
            LoadingKind::ForceSurface { .. } => LoadingType::ForceSurface,
            LoadingKind::ImposedDisplacement { .. } => LoadingType::ImposedDisplacement,
        }
    }
}

/// Closed subtype enumeration for load sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoadSetType {
    /// Static loading collection
    Load,
    /// Dynamic excitation collection
    Dload,
    /// The common set implicitly applied to every analysis
    All,
}

/// A named collection of loadings
#[derive(Debug, Clone)]
pub struct LoadSet {
    ident: Identity,
    pub set_type: LoadSetType,
    pub label: Option<String>,
    /// Other load sets combined into this one with a coefficient; flattened
    /// by the pipeline
    pub embedded_load_sets: Vec<(Reference<LoadSet>, f64)>,
}

impl LoadSet {
    pub fn new(set_type: LoadSetType, original_id: Option<u32>) -> LoadSet {
        LoadSet {
            ident: Identity::new(original_id),
            set_type,
            label: None,
            embedded_load_sets: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: &str) -> LoadSet {
        self.label = Some(label.to_string());
        self
    }

    pub fn embed(&mut self, other: Reference<LoadSet>, coefficient: f64) {
        self.embedded_load_sets.push((other, coefficient));
    }
}

impl Identifiable for LoadSet {
    type Type = LoadSetType;
    const KIND: &'static str = "LoadSet";

    fn ident(&self) -> &Identity {
        &self.ident
    }

    fn ident_mut(&mut self) -> &mut Identity {
        &mut self.ident
    }

    fn subtype(&self) -> LoadSetType {
        self.set_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nodal_force_dofs_follow_nonzero_components() {
        let load = Loading::nodal_force(
            Some(1),
            Vector3::new(0.0, -100.0, 0.0),
            Vector3::new(0.0, 0.0, 5.0),
        )
        .with_node_positions(&[3]);
        assert_eq!(load.dofs_for_node(3), Dofs::from(Dof::Dy) + Dof::Rz);
        assert_eq!(load.dofs_for_node(4), Dofs::NONE);
    }

    #[test]
    fn test_imposed_displacement_values() {
        let load = Loading::imposed_displacement(None, Dofs::TRANSLATIONS, 0.01)
            .with_node_positions(&[0]);
        assert_eq!(load.imposed_value(Dof::Dx), Some(0.01));
        assert_eq!(load.imposed_value(Dof::Rx), None);
        assert_eq!(load.dofs_for_node(0), Dofs::TRANSLATIONS);
    }

    #[test]
    fn test_scale() {
        let mut load = Loading::nodal_force(None, Vector3::new(2.0, 0.0, 0.0), Vector3::zeros())
            .with_node_positions(&[0]);
        load.scale(1.5);
        match &load.kind {
            LoadingKind::NodalForce { force, .. } => assert_eq!(force.x, 3.0),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_ineffective_detection() {
        let zero = Loading::nodal_force(None, Vector3::zeros(), Vector3::zeros())
            .with_node_positions(&[0]);
        assert!(zero.ineffective());

        let unapplied = Loading::nodal_force(None, Vector3::x(), Vector3::zeros());
        assert!(unapplied.ineffective());

        let live = Loading::nodal_force(None, Vector3::x(), Vector3::zeros())
            .with_node_positions(&[0]);
        assert!(!live.ineffective());

        assert!(Loading::gravity(None, Vector3::zeros()).ineffective());
    }
}
