//! The model graph
//!
//! The model owns one container per entity kind, the mesh, and the
//! cross-reference tables resolving set membership. Everything an input
//! adapter creates goes through here; after [`Model::finish`] and
//! [`Model::validate`] an output adapter reads it back through the same
//! accessors.

pub mod container;
mod passes;

use std::collections::{BTreeMap, BTreeSet};

use log::warn;
use serde::Serialize;

use crate::analysis::Analysis;
use crate::config::ModelConfiguration;
use crate::constraints::{Constraint, ConstraintSet, ConstraintSetType};
use crate::elements::{ElementSet, Material};
use crate::loads::{LoadSet, LoadSetType, Loading};
use crate::mesh::Mesh;
use crate::objectives::{Objective, ObjectiveSet, ObjectiveSetType};
use crate::reference::{Identifiable, Reference};
use crate::targets::Target;

pub use container::Container;

/// Internal id reserved for the three common sets
pub const COMMON_SET_ID: u32 = 0;

/// Aggregate of every entity of one translation problem
#[derive(Debug)]
pub struct Model {
    pub name: String,
    pub configuration: ModelConfiguration,

    /// Geometrical information
    pub mesh: Mesh,

    pub analyses: Container<Analysis>,
    pub loadings: Container<Loading>,
    pub load_sets: Container<LoadSet>,
    pub constraints: Container<Constraint>,
    pub constraint_sets: Container<ConstraintSet>,
    pub objectives: Container<Objective>,
    pub objective_sets: Container<ObjectiveSet>,
    pub element_sets: Container<ElementSet>,
    pub materials: Container<Material>,
    pub targets: Container<Target>,

    common_load_set: Reference<LoadSet>,
    common_constraint_set: Reference<ConstraintSet>,
    common_objective_set: Reference<ObjectiveSet>,

    loadings_by_set_id: BTreeMap<u32, BTreeSet<Reference<Loading>>>,
    loadings_by_set_original: BTreeMap<(LoadSetType, u32), BTreeSet<Reference<Loading>>>,
    constraints_by_set_id: BTreeMap<u32, BTreeSet<Reference<Constraint>>>,
    constraints_by_set_original:
        BTreeMap<(ConstraintSetType, u32), BTreeSet<Reference<Constraint>>>,
    objectives_by_set_id: BTreeMap<u32, BTreeSet<Reference<Objective>>>,
    objectives_by_set_original:
        BTreeMap<(ObjectiveSetType, u32), BTreeSet<Reference<Objective>>>,

    /// Cells assigned to a material directly, next to element-set
    /// assignment
    cells_by_material: BTreeMap<u32, BTreeSet<usize>>,

    pub(crate) virtual_material: Option<Reference<Material>>,
    pub(crate) rigid_material: Option<Reference<Material>>,
    pub(crate) finished: bool,
}

/// Entity counts of a model, for diagnostics and adapters
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ModelStats {
    pub nodes: usize,
    pub cells: usize,
    pub analyses: usize,
    pub loadings: usize,
    pub load_sets: usize,
    pub constraints: usize,
    pub constraint_sets: usize,
    pub objectives: usize,
    pub objective_sets: usize,
    pub element_sets: usize,
    pub materials: usize,
    pub targets: usize,
}

impl Model {
    /// A fresh model with the default configuration. The three common sets
    /// are created first so they take the reserved internal id 0.
    pub fn new(name: &str) -> Model {
        Model::with_configuration(name, ModelConfiguration::default())
    }

    pub fn with_configuration(name: &str, configuration: ModelConfiguration) -> Model {
        let mut load_sets = Container::new();
        let mut constraint_sets = Container::new();
        let mut objective_sets = Container::new();
        let common_load_set = load_sets.add(LoadSet::new(LoadSetType::All, None));
        let common_constraint_set =
            constraint_sets.add(ConstraintSet::new(ConstraintSetType::All, None));
        let common_objective_set =
            objective_sets.add(ObjectiveSet::new(ObjectiveSetType::All, None));
        debug_assert_eq!(common_load_set.id, Some(COMMON_SET_ID));
        debug_assert_eq!(common_constraint_set.id, Some(COMMON_SET_ID));
        debug_assert_eq!(common_objective_set.id, Some(COMMON_SET_ID));

        Model {
            name: name.to_string(),
            configuration,
            mesh: Mesh::new(name),
            analyses: Container::new(),
            loadings: Container::new(),
            load_sets,
            constraints: Container::new(),
            constraint_sets,
            objectives: Container::new(),
            objective_sets,
            element_sets: Container::new(),
            materials: Container::new(),
            targets: Container::new(),
            common_load_set,
            common_constraint_set,
            common_objective_set,
            loadings_by_set_id: BTreeMap::new(),
            loadings_by_set_original: BTreeMap::new(),
            constraints_by_set_id: BTreeMap::new(),
            constraints_by_set_original: BTreeMap::new(),
            objectives_by_set_id: BTreeMap::new(),
            objectives_by_set_original: BTreeMap::new(),
            cells_by_material: BTreeMap::new(),
            virtual_material: None,
            rigid_material: None,
            finished: false,
        }
    }

    /// The load set implicitly applied to every analysis
    pub fn common_load_set(&self) -> Reference<LoadSet> {
        self.common_load_set
    }

    /// The constraint set implicitly applied to every analysis
    pub fn common_constraint_set(&self) -> Reference<ConstraintSet> {
        self.common_constraint_set
    }

    /// The objective set implicitly applied to every analysis
    pub fn common_objective_set(&self) -> Reference<ObjectiveSet> {
        self.common_objective_set
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    // ========================
    // Set membership
    // ========================

    /// Record a loading as member of a load set. A set referenced by its
    /// original id before its definition line is created on the fly.
    pub fn add_loading_into_load_set(
        &mut self,
        loading: &Reference<Loading>,
        set: &Reference<LoadSet>,
    ) {
        if let Some(original) = set.original_id {
            if self.load_sets.find(set).is_none() {
                self.load_sets.add(LoadSet::new(set.rtype, Some(original)));
            }
            self.loadings_by_set_original
                .entry((set.rtype, original))
                .or_default()
                .insert(*loading);
        } else if let Some(id) = set.id {
            self.loadings_by_set_id.entry(id).or_default().insert(*loading);
        } else {
            warn!("load set reference without any id ignored for {loading}");
        }
    }

    /// Record a constraint as member of a constraint set, creating a set
    /// referenced ahead of its definition
    pub fn add_constraint_into_constraint_set(
        &mut self,
        constraint: &Reference<Constraint>,
        set: &Reference<ConstraintSet>,
    ) {
        if let Some(original) = set.original_id {
            if self.constraint_sets.find(set).is_none() {
                self.constraint_sets
                    .add(ConstraintSet::new(set.rtype, Some(original)));
            }
            self.constraints_by_set_original
                .entry((set.rtype, original))
                .or_default()
                .insert(*constraint);
        } else if let Some(id) = set.id {
            self.constraints_by_set_id
                .entry(id)
                .or_default()
                .insert(*constraint);
        } else {
            warn!("constraint set reference without any id ignored for {constraint}");
        }
    }

    /// Record an objective as member of an objective set
    pub fn add_objective_into_objective_set(
        &mut self,
        objective: &Reference<Objective>,
        set: &Reference<ObjectiveSet>,
    ) {
        if let Some(original) = set.original_id {
            if self.objective_sets.find(set).is_none() {
                self.objective_sets
                    .add(ObjectiveSet::new(set.rtype, Some(original)));
            }
            self.objectives_by_set_original
                .entry((set.rtype, original))
                .or_default()
                .insert(*objective);
        } else if let Some(id) = set.id {
            self.objectives_by_set_id
                .entry(id)
                .or_default()
                .insert(*objective);
        } else {
            warn!("objective set reference without any id ignored for {objective}");
        }
    }

    /// Members of a load set, sorted by reference
    pub fn loadings_for(&self, set: &Reference<LoadSet>) -> Vec<Reference<Loading>> {
        let mut members = BTreeSet::new();
        let resolved = self.load_sets.find(set);
        let id = set.id.or_else(|| resolved.map(|s| s.ident().id()));
        let original = set
            .original_id
            .or_else(|| resolved.and_then(|s| s.ident().original_id()));
        if let Some(id) = id {
            if let Some(found) = self.loadings_by_set_id.get(&id) {
                members.extend(found.iter().copied());
            }
        }
        if let Some(original) = original {
            if let Some(found) = self.loadings_by_set_original.get(&(set.rtype, original)) {
                members.extend(found.iter().copied());
            }
        }
        members.into_iter().collect()
    }

    /// Members of a constraint set, sorted by reference
    pub fn constraints_for(&self, set: &Reference<ConstraintSet>) -> Vec<Reference<Constraint>> {
        let mut members = BTreeSet::new();
        let resolved = self.constraint_sets.find(set);
        let id = set.id.or_else(|| resolved.map(|s| s.ident().id()));
        let original = set
            .original_id
            .or_else(|| resolved.and_then(|s| s.ident().original_id()));
        if let Some(id) = id {
            if let Some(found) = self.constraints_by_set_id.get(&id) {
                members.extend(found.iter().copied());
            }
        }
        if let Some(original) = original {
            if let Some(found) = self
                .constraints_by_set_original
                .get(&(set.rtype, original))
            {
                members.extend(found.iter().copied());
            }
        }
        members.into_iter().collect()
    }

    /// Members of an objective set, sorted by reference
    pub fn objectives_for(&self, set: &Reference<ObjectiveSet>) -> Vec<Reference<Objective>> {
        let mut members = BTreeSet::new();
        let resolved = self.objective_sets.find(set);
        let id = set.id.or_else(|| resolved.map(|s| s.ident().id()));
        let original = set
            .original_id
            .or_else(|| resolved.and_then(|s| s.ident().original_id()));
        if let Some(id) = id {
            if let Some(found) = self.objectives_by_set_id.get(&id) {
                members.extend(found.iter().copied());
            }
        }
        if let Some(original) = original {
            if let Some(found) = self.objectives_by_set_original.get(&(set.rtype, original)) {
                members.extend(found.iter().copied());
            }
        }
        members.into_iter().collect()
    }

    /// Every constraint set containing the constraint
    pub fn constraint_sets_containing(
        &self,
        constraint: &Reference<Constraint>,
    ) -> Vec<Reference<ConstraintSet>> {
        self.constraint_sets
            .iter()
            .filter(|set| self.constraints_for(&set.reference()).contains(constraint))
            .map(|set| set.reference())
            .collect()
    }

    // ========================
    // Analysis resolution
    // ========================

    /// Load sets of one analysis: the explicitly referenced ones plus the
    /// common set, which applies to every analysis
    pub fn load_sets_of(&self, analysis: &Analysis) -> Vec<&LoadSet> {
        let mut sets = Vec::new();
        for reference in analysis.load_set_refs() {
            match self.load_sets.find(reference) {
                Some(set) => sets.push(set),
                None => warn!("analysis references unresolved {reference}"),
            }
        }
        if let Some(common) = self.load_sets.find(&self.common_load_set) {
            if !sets
                .iter()
                .any(|set| set.ident().id() == common.ident().id())
            {
                sets.push(common);
            }
        }
        sets
    }

    /// Constraint sets of one analysis, common set included
    pub fn constraint_sets_of(&self, analysis: &Analysis) -> Vec<&ConstraintSet> {
        let mut sets = Vec::new();
        for reference in analysis.constraint_set_refs() {
            match self.constraint_sets.find(reference) {
                Some(set) => sets.push(set),
                None => warn!("analysis references unresolved {reference}"),
            }
        }
        if let Some(common) = self.constraint_sets.find(&self.common_constraint_set) {
            if !sets
                .iter()
                .any(|set| set.ident().id() == common.ident().id())
            {
                sets.push(common);
            }
        }
        sets
    }

    /// Objective sets of one analysis, common set included
    pub fn objective_sets_of(&self, analysis: &Analysis) -> Vec<&ObjectiveSet> {
        let mut sets = Vec::new();
        for reference in analysis.objective_set_refs() {
            match self.objective_sets.find(reference) {
                Some(set) => sets.push(set),
                None => warn!("analysis references unresolved {reference}"),
            }
        }
        if let Some(common) = self.objective_sets.find(&self.common_objective_set) {
            if !sets
                .iter()
                .any(|set| set.ident().id() == common.ident().id())
            {
                sets.push(common);
            }
        }
        sets
    }

    /// Every loading one analysis applies, through its sets
    pub fn loadings_of(&self, analysis: &Analysis) -> Vec<&Loading> {
        let mut result = Vec::new();
        let mut seen = BTreeSet::new();
        for set in self.load_sets_of(analysis) {
            for reference in self.loadings_for(&set.reference()) {
                if !seen.insert(reference) {
                    continue;
                }
                match self.loadings.find(&reference) {
                    Some(loading) => result.push(loading),
                    None => warn!("load set member {reference} cannot be resolved"),
                }
            }
        }
        result
    }

    /// Every constraint one analysis enforces, through its sets
    pub fn constraints_of(&self, analysis: &Analysis) -> Vec<&Constraint> {
        let mut result = Vec::new();
        let mut seen = BTreeSet::new();
        for set in self.constraint_sets_of(analysis) {
            for reference in self.constraints_for(&set.reference()) {
                if !seen.insert(reference) {
                    continue;
                }
                match self.constraints.find(&reference) {
                    Some(constraint) => result.push(constraint),
                    None => warn!("constraint set member {reference} cannot be resolved"),
                }
            }
        }
        result
    }

    /// Output assertions one analysis checks, through its objective sets
    pub fn assertions_of(&self, analysis: &Analysis) -> Vec<&Objective> {
        let mut result = Vec::new();
        let mut seen = BTreeSet::new();
        for set in self.objective_sets_of(analysis) {
            for reference in self.objectives_for(&set.reference()) {
                if !seen.insert(reference) {
                    continue;
                }
                if let Some(objective) = self.objectives.find(&reference) {
                    if objective.is_assertion() {
                        result.push(objective);
                    }
                }
            }
        }
        result
    }

    // ========================
    // Factories
    // ========================

    /// Load set by original id, created when absent
    pub fn get_or_create_load_set(
        &mut self,
        set_type: LoadSetType,
        original_id: u32,
    ) -> Reference<LoadSet> {
        let reference = Reference::new(set_type, original_id);
        match self.load_sets.find(&reference) {
            Some(set) => set.reference(),
            None => self.load_sets.add(LoadSet::new(set_type, Some(original_id))),
        }
    }

    /// Objective set by original id, created when absent
    pub fn get_or_create_objective_set(
        &mut self,
        set_type: ObjectiveSetType,
        original_id: u32,
    ) -> Reference<ObjectiveSet> {
        let reference = Reference::new(set_type, original_id);
        match self.objective_sets.find(&reference) {
            Some(set) => set.reference(),
            None => self
                .objective_sets
                .add(ObjectiveSet::new(set_type, Some(original_id))),
        }
    }

    /// Material by original id, created when absent
    pub fn get_or_create_material(&mut self, original_id: u32) -> Reference<Material> {
        match self.materials.find_by_original_id(original_id) {
            Some(material) => material.reference(),
            None => self.materials.add(Material::new(Some(original_id))),
        }
    }

    // ========================
    // Material assignment
    // ========================

    /// Assign cells to a material directly, next to element-set assignment
    pub fn assign_material(&mut self, material: &Reference<Material>, cell_positions: &[usize]) {
        let Some(resolved) = self.materials.find(material) else {
            warn!("cannot assign cells to unresolved {material}");
            return;
        };
        self.cells_by_material
            .entry(resolved.ident().id())
            .or_default()
            .extend(cell_positions.iter().copied());
    }

    /// Every cell position a material covers: direct assignment merged with
    /// the cell groups of element sets carrying the material
    pub fn material_assignment(&self, material: &Reference<Material>) -> Vec<usize> {
        let mut positions = BTreeSet::new();
        if let Some(resolved) = self.materials.find(material) {
            if let Some(direct) = self.cells_by_material.get(&resolved.ident().id()) {
                positions.extend(direct.iter().copied());
            }
        }
        for element_set in self.element_sets.iter() {
            if element_set.material.as_ref() == Some(material) {
                if let Some(name) = &element_set.cell_group {
                    if let Some(group) = self.mesh.cell_group(name) {
                        positions.extend(group.cell_positions());
                    }
                }
            }
        }
        positions.into_iter().collect()
    }

    // ========================
    // Removal cascades
    // ========================

    /// Remove a loading and detach it from every load set
    pub fn remove_loading(&mut self, reference: &Reference<Loading>) {
        for members in self.loadings_by_set_id.values_mut() {
            members.remove(reference);
        }
        for members in self.loadings_by_set_original.values_mut() {
            members.remove(reference);
        }
        self.loadings.erase(reference);
    }

    /// Remove a constraint and detach it from every constraint set
    pub fn remove_constraint(&mut self, reference: &Reference<Constraint>) {
        for members in self.constraints_by_set_id.values_mut() {
            members.remove(reference);
        }
        for members in self.constraints_by_set_original.values_mut() {
            members.remove(reference);
        }
        self.constraints.erase(reference);
    }

    /// Remove an objective and detach it from every objective set
    pub fn remove_objective(&mut self, reference: &Reference<Objective>) {
        for members in self.objectives_by_set_id.values_mut() {
            members.remove(reference);
        }
        for members in self.objectives_by_set_original.values_mut() {
            members.remove(reference);
        }
        self.objectives.erase(reference);
    }

    /// Remove a load set, detaching it from every analysis first
    pub fn remove_load_set(&mut self, reference: &Reference<LoadSet>) {
        let resolved = self.load_sets.find(reference);
        let id = reference.id.or_else(|| resolved.map(|s| s.ident().id()));
        let original = reference
            .original_id
            .or_else(|| resolved.and_then(|s| s.ident().original_id()));
        for analysis in self.analyses.iter_mut() {
            analysis.remove_load_set(reference);
        }
        if let Some(id) = id {
            self.loadings_by_set_id.remove(&id);
        }
        if let Some(original) = original {
            self.loadings_by_set_original
                .remove(&(reference.rtype, original));
        }
        self.load_sets.erase(reference);
    }

    /// Remove a constraint set, detaching it from every analysis first
    pub fn remove_constraint_set(&mut self, reference: &Reference<ConstraintSet>) {
        let resolved = self.constraint_sets.find(reference);
        let id = reference.id.or_else(|| resolved.map(|s| s.ident().id()));
        let original = reference
            .original_id
            .or_else(|| resolved.and_then(|s| s.ident().original_id()));
        for analysis in self.analyses.iter_mut() {
            analysis.remove_constraint_set(reference);
        }
        if let Some(id) = id {
            self.constraints_by_set_id.remove(&id);
        }
        if let Some(original) = original {
            self.constraints_by_set_original
                .remove(&(reference.rtype, original));
        }
        self.constraint_sets.erase(reference);
    }

    /// Remove an objective set, detaching it from every analysis first
    pub fn remove_objective_set(&mut self, reference: &Reference<ObjectiveSet>) {
        let resolved = self.objective_sets.find(reference);
        let id = reference.id.or_else(|| resolved.map(|s| s.ident().id()));
        let original = reference
            .original_id
            .or_else(|| resolved.and_then(|s| s.ident().original_id()));
        for analysis in self.analyses.iter_mut() {
            analysis.remove_objective_set(reference);
        }
        if let Some(id) = id {
            self.objectives_by_set_id.remove(&id);
        }
        if let Some(original) = original {
            self.objectives_by_set_original
                .remove(&(reference.rtype, original));
        }
        self.objective_sets.erase(reference);
    }

    // ========================
    // Validation and statistics
    // ========================

    /// Aggregate structural validation: the mesh, every container and every
    /// analysis's references are checked — all of them, even after the
    /// first failure. Returns the overall verdict, never raises.
    pub fn validate(&mut self) -> bool {
        let mesh_ok = self.mesh.validate();
        let analyses_ok = self.analyses.validate();
        let loadings_ok = self.loadings.validate();
        let load_sets_ok = self.load_sets.validate();
        let constraints_ok = self.constraints.validate();
        let constraint_sets_ok = self.constraint_sets.validate();
        let objectives_ok = self.objectives.validate();
        let objective_sets_ok = self.objective_sets.validate();
        let element_sets_ok = self.element_sets.validate();
        let materials_ok = self.materials.validate();
        let targets_ok = self.targets.validate();

        let mut references_ok = true;
        for analysis in self.analyses.iter() {
            for reference in analysis.load_set_refs() {
                if self.load_sets.find(reference).is_none() {
                    warn!(
                        "analysis {} references unresolved {reference}",
                        analysis.best_id()
                    );
                    references_ok = false;
                }
            }
            for reference in analysis.constraint_set_refs() {
                if self.constraint_sets.find(reference).is_none() {
                    warn!(
                        "analysis {} references unresolved {reference}",
                        analysis.best_id()
                    );
                    references_ok = false;
                }
            }
            for reference in analysis.objective_set_refs() {
                if self.objective_sets.find(reference).is_none() {
                    warn!(
                        "analysis {} references unresolved {reference}",
                        analysis.best_id()
                    );
                    references_ok = false;
                }
            }
        }

        mesh_ok
            && analyses_ok
            && loadings_ok
            && load_sets_ok
            && constraints_ok
            && constraint_sets_ok
            && objectives_ok
            && objective_sets_ok
            && element_sets_ok
            && materials_ok
            && targets_ok
            && references_ok
    }

    /// Entity counts, serializable for diagnostics
    pub fn stats(&self) -> ModelStats {
        ModelStats {
            nodes: self.mesh.node_count(),
            cells: self.mesh.cell_count(),
            analyses: self.analyses.len(),
            loadings: self.loadings.len(),
            load_sets: self.load_sets.len(),
            constraints: self.constraints.len(),
            constraint_sets: self.constraint_sets.len(),
            objectives: self.objectives.len(),
            objective_sets: self.objective_sets.len(),
            element_sets: self.element_sets.len(),
            materials: self.materials.len(),
            targets: self.targets.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dof::Dofs;

    #[test]
    fn test_common_sets_take_id_zero() {
        let model = Model::new("test");
        assert_eq!(model.common_load_set().id, Some(COMMON_SET_ID));
        assert_eq!(model.common_constraint_set().id, Some(COMMON_SET_ID));
        assert_eq!(model.common_objective_set().id, Some(COMMON_SET_ID));
        assert_eq!(model.load_sets.len(), 1);
    }

    #[test]
    fn test_membership_with_forward_set_reference() {
        let mut model = Model::new("test");
        let spc = model
            .constraints
            .add(Constraint::single_point(Some(1), Dofs::ALL, 0.0));
        // the set 9 does not exist yet: it is created on the fly
        let forward = Reference::new(ConstraintSetType::Spc, 9);
        model.add_constraint_into_constraint_set(&spc, &forward);
        assert!(model.constraint_sets.find(&forward).is_some());
        assert_eq!(model.constraints_for(&forward), vec![spc]);
    }

    #[test]
    fn test_remove_constraint_detaches_from_sets() {
        let mut model = Model::new("test");
        let spc = model
            .constraints
            .add(Constraint::single_point(Some(1), Dofs::ALL, 0.0));
        let set = Reference::new(ConstraintSetType::Spc, 2);
        model.add_constraint_into_constraint_set(&spc, &set);
        model.remove_constraint(&spc);
        assert!(model.constraints_for(&set).is_empty());
        assert!(model.constraints.find(&spc).is_none());
    }

    #[test]
    fn test_remove_set_detaches_from_analyses() {
        let mut model = Model::new("test");
        let set = model
            .constraint_sets
            .add(ConstraintSet::new(ConstraintSetType::Spc, Some(4)));
        let analysis = model.analyses.add(Analysis::linear_static(Some(1)));
        model
            .analyses
            .find_mut(&analysis)
            .unwrap()
            .add_constraint_set(set);
        model.remove_constraint_set(&set);
        let analysis = model.analyses.find(&analysis).unwrap();
        assert!(analysis.constraint_set_refs().is_empty());
        assert!(model.constraint_sets.find(&set).is_none());
    }

    #[test]
    fn test_constraint_sets_of_always_includes_common() {
        let mut model = Model::new("test");
        let analysis_ref = model.analyses.add(Analysis::linear_static(None));
        let analysis = model.analyses.find(&analysis_ref).unwrap();
        let sets = model.constraint_sets_of(analysis);
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].ident().id(), COMMON_SET_ID);
    }

    #[test]
    fn test_material_assignment_merges_both_paths() {
        use crate::elements::BeamSection;
        use crate::mesh::CellType;

        let mut model = Model::new("test");
        let material = model.get_or_create_material(1);
        model.mesh.add_node(1, 0.0, 0.0, 0.0);
        model.mesh.add_node(2, 1.0, 0.0, 0.0);
        let direct_cell = model
            .mesh
            .add_cell(None, CellType::Seg2, &[1, 2], false, None);
        model.assign_material(&material, &[direct_cell]);

        let group_cell = model
            .mesh
            .add_cell(None, CellType::Seg2, &[2, 1], false, None);
        model
            .mesh
            .find_or_create_cell_group("beams", None, "")
            .add_cell_position(group_cell);
        model.element_sets.add(
            ElementSet::beam(Some(1), BeamSection::new(1.0, 1.0, 1.0, 1.0))
                .with_cell_group("beams")
                .with_material(material),
        );

        assert_eq!(
            model.material_assignment(&material),
            vec![direct_cell, group_cell]
        );
    }

    #[test]
    fn test_stats_counts() {
        let mut model = Model::new("test");
        model.mesh.add_node(1, 0.0, 0.0, 0.0);
        model.analyses.add(Analysis::linear_static(None));
        let stats = model.stats();
        assert_eq!(stats.nodes, 1);
        assert_eq!(stats.analyses, 1);
        assert_eq!(stats.load_sets, 1); // the common set
    }
}
