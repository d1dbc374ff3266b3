//! Model configuration
//!
//! A flat set of named switches and thresholds gating the normalization
//! passes run by `Model::finish`. Diagnostic verbosity is the standard
//! `log` max-level filter, consulted by every pass through the logging
//! macros.

use serde::{Deserialize, Serialize};

/// Switches and thresholds for the normalization pipeline
///
/// Defaults keep the hygiene passes on and the dialect-specific expansion
/// passes off; an output adapter enables the expansions its dialect needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfiguration {
    /// Flatten combined load sets into scaled copies of their members
    pub replace_combined_load_sets: bool,
    /// Materialize implicit coordinate-system definitions into bases
    pub build_coordinate_systems: bool,
    /// Propagate element dof capabilities onto the nodes they touch
    pub propagate_element_dofs: bool,
    /// Synthesize a default analysis when the deck defines none
    pub auto_analysis: bool,
    /// Accumulate per-analysis boundary dofs from constraints and loads
    pub collect_boundary_dofs: bool,
    /// Assign materials to element sets and cell ownership to cells
    pub assign_materials: bool,
    /// Materialize skin cells for surface loads applied on volume cell faces
    pub create_skin: bool,
    /// Materialize boundary line/surface targets into segment/face cells
    pub make_boundary_cells: bool,
    /// Expand fully-rigid homogeneous constraints into multi-point equations
    pub expand_rigid_constraints: bool,
    /// Split direct matrices touching more nodes than
    /// `direct_matrix_max_nodes`
    pub split_direct_matrices: bool,
    /// Maximum node count of a direct matrix element before splitting
    pub direct_matrix_max_nodes: usize,
    /// Build segment cells and a rigid material for rigid / weighted-average
    /// constraints
    pub make_cells_from_rigid_sets: bool,
    /// Build point/segment cells for direct matrices that have none
    pub make_cells_from_direct_matrices: bool,
    /// Deduplicate single point constraints per analysis
    pub remove_redundant_spcs: bool,
    /// Drop constraint dofs shadowed by an imposed displacement
    pub remove_constrained_imposed: bool,
    /// Drop ineffective loadings/constraints, empty sets and orphaned
    /// reservations
    pub remove_ineffectives: bool,
    /// Drop assertions whose dof is neither element-owned nor
    /// boundary-supplied
    pub remove_unreachable_assertions: bool,
    /// Generate near-zero-stiffness discrete elements for dofs no element
    /// supplies
    pub virtual_discrets: bool,
    /// Give synthetic element sets a virtual material
    pub add_virtual_material: bool,
    /// Build display node groups named after their owning sets
    pub create_set_groups: bool,
}

impl Default for ModelConfiguration {
    fn default() -> Self {
        Self {
            replace_combined_load_sets: false,
            build_coordinate_systems: true,
            propagate_element_dofs: true,
            auto_analysis: true,
            collect_boundary_dofs: true,
            assign_materials: true,
            create_skin: false,
            make_boundary_cells: false,
            expand_rigid_constraints: false,
            split_direct_matrices: false,
            direct_matrix_max_nodes: 999,
            make_cells_from_rigid_sets: false,
            make_cells_from_direct_matrices: false,
            remove_redundant_spcs: true,
            remove_constrained_imposed: true,
            remove_ineffectives: true,
            remove_unreachable_assertions: true,
            virtual_discrets: false,
            add_virtual_material: false,
            create_set_groups: false,
        }
    }
}

impl ModelConfiguration {
    /// Configuration with every pass disabled; useful to test passes in
    /// isolation
    pub fn minimal() -> Self {
        Self {
            replace_combined_load_sets: false,
            build_coordinate_systems: false,
            propagate_element_dofs: false,
            auto_analysis: false,
            collect_boundary_dofs: false,
            assign_materials: false,
            create_skin: false,
            make_boundary_cells: false,
            expand_rigid_constraints: false,
            split_direct_matrices: false,
            direct_matrix_max_nodes: 999,
            make_cells_from_rigid_sets: false,
            make_cells_from_direct_matrices: false,
            remove_redundant_spcs: false,
            remove_constrained_imposed: false,
            remove_ineffectives: false,
            remove_unreachable_assertions: false,
            virtual_discrets: false,
            add_virtual_material: false,
            create_set_groups: false,
        }
    }

    pub fn with_split_direct_matrices(mut self, max_nodes: usize) -> Self {
        self.split_direct_matrices = true;
        self.direct_matrix_max_nodes = max_nodes;
        self
    }

    pub fn with_create_skin(mut self) -> Self {
        self.create_skin = true;
        self
    }

    pub fn with_virtual_discrets(mut self) -> Self {
        self.virtual_discrets = true;
        self
    }

    pub fn with_virtual_material(mut self) -> Self {
        self.add_virtual_material = true;
        self
    }

    pub fn with_rigid_set_cells(mut self) -> Self {
        self.make_cells_from_rigid_sets = true;
        self
    }

    pub fn with_set_groups(mut self) -> Self {
        self.create_set_groups = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let config = ModelConfiguration::default();
        assert_eq!(config.direct_matrix_max_nodes, 999);
        assert!(config.remove_redundant_spcs);
        assert!(!config.split_direct_matrices);
    }

    #[test]
    fn test_builder_helpers() {
        let config = ModelConfiguration::minimal().with_split_direct_matrices(20);
        assert!(config.split_direct_matrices);
        assert_eq!(config.direct_matrix_max_nodes, 20);
        assert!(!config.remove_redundant_spcs);
    }
}
