//! Solver-neutral finite element model core
//!
//! This library holds a structural-analysis model in a solver-neutral form
//! between an input dialect parser and an output dialect writer. Input
//! adapters populate the model through factory operations, a normalization
//! pipeline rewrites it into a self-consistent form the target dialect can
//! express, and output adapters read the result back through position-indexed
//! storage, entity containers and cross-reference lookups. No physics is
//! solved here — the model is prepared and validated, never factorized.
//!
//! ## Example
//! ```rust
//! use fem_translator::prelude::*;
//!
//! let mut model = Model::new("cantilever");
//!
//! // Geometry: a constraint may reference node 2 before it is defined
//! model.mesh.add_node(1, 0.0, 0.0, 0.0);
//! let tip = model.mesh.find_or_reserve_node(2);
//! model.mesh.add_node(2, 1.0, 0.0, 0.0);
//!
//! // Clamp the root in the common constraint set
//! let root = model.mesh.node_position(1).unwrap();
//! let spc = model
//!     .constraints
//!     .add(Constraint::single_point(Some(1), Dofs::ALL, 0.0).with_node_positions(&[root]));
//! model.add_constraint_into_constraint_set(&spc, &model.common_constraint_set());
//!
//! // A tip load in its own load set
//! let load = model.loadings.add(
//!     Loading::nodal_force(Some(1), nalgebra::Vector3::new(0.0, -1000.0, 0.0), nalgebra::Vector3::zeros())
//!         .with_node_positions(&[tip]),
//! );
//! let load_set = model.get_or_create_load_set(LoadSetType::Load, 1);
//! model.add_loading_into_load_set(&load, &load_set);
//!
//! // Normalize and check
//! model.finish().unwrap();
//! assert!(model.validate());
//! assert_eq!(model.analyses.len(), 1); // a default analysis was synthesized
//! ```

pub mod analysis;
pub mod config;
pub mod constraints;
pub mod dof;
pub mod elements;
pub mod error;
pub mod loads;
pub mod mesh;
pub mod model;
pub mod objectives;
pub mod reference;
pub mod targets;

// Re-export common types
pub mod prelude {
    pub use crate::analysis::{Analysis, AnalysisKind, AnalysisType};
    pub use crate::config::ModelConfiguration;
    pub use crate::constraints::{
        Constraint, ConstraintKind, ConstraintSet, ConstraintSetType, ConstraintType, LmpcTerm,
        Rbe3Slave,
    };
    pub use crate::dof::{Dof, DofMatrix, Dofs};
    pub use crate::elements::{
        BeamSection, ElasticProperties, ElementSet, ElementSetKind, ElementSetType, Material,
        MaterialType, MatrixElement, MatrixType, RigidNature,
    };
    pub use crate::error::{TranslationError, TranslationResult};
    pub use crate::loads::{
        LoadSet, LoadSetType, Loading, LoadingKind, LoadingType, SurfaceApplication,
    };
    pub use crate::mesh::{
        Basis, Cell, CellGroup, CellType, CoordinateSystem, CoordinateSystemKind, Mesh, Node,
        NodeGroup,
    };
    pub use crate::model::{Container, Model, ModelStats, COMMON_SET_ID};
    pub use crate::objectives::{Objective, ObjectiveKind, ObjectiveSet, ObjectiveSetType};
    pub use crate::reference::{Identifiable, Identity, Reference};
    pub use crate::targets::{Target, TargetKind, TargetType};
}
