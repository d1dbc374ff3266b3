//! Element sets
//!
//! An element set groups cells sharing a formulation and its properties:
//! beams, shells, continuum solids, discrete springs, direct matrices and
//! rigid links. The set owns properties and a cell-group association, never
//! the cells themselves.

pub mod material;
pub mod matrix;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::dof::Dofs;
use crate::mesh::Mesh;
use crate::reference::{Identifiable, Identity, Reference};

pub use material::{ElasticProperties, Material, MaterialType};
pub use matrix::{MatrixElement, MatrixType};

/// Closed subtype enumeration for element sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementSetType {
    Beam,
    Shell,
    Continuum,
    Discrete,
    Matrix,
    Rigid,
}

/// Cross-section constants of a beam formulation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeamSection {
    /// Cross-sectional area
    pub area: f64,
    /// Second moment about the local y axis
    pub iy: f64,
    /// Second moment about the local z axis
    pub iz: f64,
    /// Torsional constant
    pub j: f64,
}

impl BeamSection {
    pub fn new(area: f64, iy: f64, iz: f64, j: f64) -> BeamSection {
        BeamSection { area, iy, iz, j }
    }
}

/// The rigid idiom an element set was expanded from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigidNature {
    /// Two-node rigid bar
    Rbar,
    /// One master, many rigidly driven slaves
    Rbe2,
    /// Weighted-average master
    Rbe3,
}

/// Per-variant payload of an element set
#[derive(Debug, Clone)]
pub enum ElementSetKind {
    Beam {
        section: BeamSection,
        /// Trusses carry no rotational stiffness
        truss: bool,
    },
    Shell {
        thickness: f64,
    },
    Continuum,
    Discrete {
        /// Diagonal stiffness per degree of freedom, position order
        stiffness: [f64; 6],
        /// False for translation-only springs
        with_rotations: bool,
    },
    Matrix(MatrixElement),
    Rigid {
        nature: RigidNature,
    },
}

/// A set of elements sharing one formulation
#[derive(Debug, Clone)]
pub struct ElementSet {
    ident: Identity,
    pub label: Option<String>,
    /// Name of the mesh cell group holding this set's cells
    pub cell_group: Option<String>,
    pub material: Option<Reference<Material>>,
    pub kind: ElementSetKind,
}

impl ElementSet {
    pub fn new(original_id: Option<u32>, kind: ElementSetKind) -> ElementSet {
        ElementSet {
            ident: Identity::new(original_id),
            label: None,
            cell_group: None,
            material: None,
            kind,
        }
    }

    pub fn beam(original_id: Option<u32>, section: BeamSection) -> ElementSet {
        ElementSet::new(original_id, ElementSetKind::Beam {
            section,
            truss: false,
        })
    }

    pub fn truss(original_id: Option<u32>, section: BeamSection) -> ElementSet {
        ElementSet::new(original_id, ElementSetKind::Beam {
            section,
            truss: true,
        })
    }

    pub fn shell(original_id: Option<u32>, thickness: f64) -> ElementSet {
        ElementSet::new(original_id, ElementSetKind::Shell { thickness })
    }

    pub fn continuum(original_id: Option<u32>) -> ElementSet {
        ElementSet::new(original_id, ElementSetKind::Continuum)
    }

    /// Translation-only discrete spring
    pub fn discrete_point(stiffness: [f64; 3]) -> ElementSet {
        ElementSet::new(
            None,
            ElementSetKind::Discrete {
                stiffness: [stiffness[0], stiffness[1], stiffness[2], 0.0, 0.0, 0.0],
                with_rotations: false,
            },
        )
    }

    /// Discrete spring with rotational terms
    pub fn discrete_point_with_rotations(stiffness: [f64; 6]) -> ElementSet {
        ElementSet::new(
            None,
            ElementSetKind::Discrete {
                stiffness,
                with_rotations: true,
            },
        )
    }

    pub fn matrix(original_id: Option<u32>, matrix_type: MatrixType) -> ElementSet {
        ElementSet::new(
            original_id,
            ElementSetKind::Matrix(MatrixElement::new(matrix_type)),
        )
    }

    pub fn rigid(nature: RigidNature) -> ElementSet {
        ElementSet::new(None, ElementSetKind::Rigid { nature })
    }

    pub fn with_label(mut self, label: &str) -> ElementSet {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_cell_group(mut self, name: &str) -> ElementSet {
        self.cell_group = Some(name.to_string());
        self
    }

    pub fn with_material(mut self, material: Reference<Material>) -> ElementSet {
        self.material = Some(material);
        self
    }

    pub fn is_matrix(&self) -> bool {
        matches!(self.kind, ElementSetKind::Matrix(_))
    }

    pub fn matrix_element(&self) -> Option<&MatrixElement> {
        match &self.kind {
            ElementSetKind::Matrix(matrix) => Some(matrix),
            _ => None,
        }
    }

    pub fn matrix_element_mut(&mut self) -> Option<&mut MatrixElement> {
        match &mut self.kind {
            ElementSetKind::Matrix(matrix) => Some(matrix),
            _ => None,
        }
    }

    /// Every node position this set's elements touch: the nodes of its cell
    /// group plus, for matrices, the coupled positions
    pub fn node_positions(&self, mesh: &Mesh) -> BTreeSet<usize> {
        let mut positions = BTreeSet::new();
        if let Some(name) = &self.cell_group {
            positions.extend(mesh.cell_group_node_positions(name));
        }
        if let ElementSetKind::Matrix(matrix) = &self.kind {
            positions.extend(matrix.node_positions());
        }
        positions
    }

    /// Degrees of freedom this set's formulation supplies at a node
    pub fn dofs_for_node(&self, position: usize) -> Dofs {
        match &self.kind {
            ElementSetKind::Beam { truss: true, .. } => Dofs::TRANSLATIONS,
            ElementSetKind::Beam { truss: false, .. } => Dofs::ALL,
            ElementSetKind::Shell { .. } => Dofs::ALL,
            ElementSetKind::Continuum => Dofs::TRANSLATIONS,
            ElementSetKind::Discrete { with_rotations, .. } => {
                if *with_rotations {
                    Dofs::ALL
                } else {
                    Dofs::TRANSLATIONS
                }
            }
            ElementSetKind::Matrix(matrix) => matrix.dofs_for_node(position),
            ElementSetKind::Rigid { .. } => Dofs::ALL,
        }
    }

    /// Empty sets are dropped by the hygiene pass
    pub fn is_effective(&self, mesh: &Mesh) -> bool {
        match &self.kind {
            ElementSetKind::Matrix(matrix) => !matrix.is_empty(),
            _ => self
                .cell_group
                .as_deref()
                .and_then(|name| mesh.cell_group(name))
                .map(|group| !group.is_empty())
                .unwrap_or(false),
        }
    }
}

impl Identifiable for ElementSet {
    type Type = ElementSetType;
    const KIND: &'static str = "ElementSet";

    fn ident(&self) -> &Identity {
        &self.ident
    }

    fn ident_mut(&mut self) -> &mut Identity {
        &mut self.ident
    }

    fn subtype(&self) -> ElementSetType {
        match self.kind {
            ElementSetKind::Beam { .. } => ElementSetType::Beam,
            ElementSetKind::Shell { .. } => ElementSetType::Shell,
            ElementSetKind::Continuum => ElementSetType::Continuum,
            ElementSetKind::Discrete { .. } => ElementSetType::Discrete,
            ElementSetKind::Matrix(_) => ElementSetType::Matrix,
            ElementSetKind::Rigid { .. } => ElementSetType::Rigid,
        }
    }
}
