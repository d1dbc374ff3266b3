//! The normalization pipeline
//!
//! `Model::finish` runs the passes in a fixed order; configuration flags
//! enable or disable individual passes but never reorder them. Structural
//! impossibilities abort the pipeline; data-quality findings remove the
//! offending entity and log the loss. Every pass snapshots its removal
//! candidates before mutating — no erase goes through a live iterator.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info, warn};

use crate::analysis::Analysis;
use crate::constraints::{
    Constraint, ConstraintKind, ConstraintSet, ConstraintSetType, ConstraintType, LmpcTerm,
};
use crate::dof::{Dof, Dofs};
use crate::elements::{
    ElementSet, ElementSetKind, Material, MaterialType, MatrixElement, RigidNature,
};
use crate::error::{TranslationError, TranslationResult};
use crate::loads::{LoadSet, Loading, LoadingKind, LoadingType, SurfaceApplication};
use crate::mesh::CellType;
use crate::model::{Model, COMMON_SET_ID};
use crate::objectives::{Objective, ObjectiveType};
use crate::reference::{Identifiable, Reference};
use crate::targets::TargetKind;

fn is_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-12 * a.abs().max(b.abs()).max(1.0)
}

impl Model {
    /// Run the normalization pipeline. Idempotent: a second call is a
    /// no-op. On a fatal error the model is left unfinished.
    pub fn finish(&mut self) -> TranslationResult<()> {
        if self.finished {
            return Ok(());
        }

        if self.configuration.replace_combined_load_sets {
            self.replace_combined_load_sets();
        }
        if self.configuration.build_coordinate_systems {
            self.mesh.build_coordinate_systems()?;
        }
        if self.configuration.propagate_element_dofs {
            self.propagate_element_dofs();
        }
        if self.configuration.auto_analysis {
            self.add_default_analysis();
        }
        if self.configuration.create_skin {
            self.generate_skin()?;
        }
        if self.configuration.make_boundary_cells {
            self.make_boundary_cells()?;
        }
        if self.configuration.collect_boundary_dofs {
            self.collect_boundary_dofs();
        }
        if self.configuration.remove_unreachable_assertions {
            self.remove_unreachable_assertions();
        }
        if self.configuration.expand_rigid_constraints {
            self.expand_rigid_constraints();
        }
        if self.configuration.split_direct_matrices {
            let max_nodes = self.configuration.direct_matrix_max_nodes;
            self.split_direct_matrices(max_nodes)?;
        }
        if self.configuration.make_cells_from_rigid_sets {
            self.make_cells_from_rigid_sets();
        }
        if self.configuration.make_cells_from_direct_matrices {
            self.make_cells_from_direct_matrices();
        }
        if self.configuration.remove_redundant_spcs {
            self.remove_redundant_spcs()?;
        }
        if self.configuration.remove_constrained_imposed {
            self.remove_constrained_imposed();
        }
        if self.configuration.remove_ineffectives {
            self.remove_ineffectives();
        }
        if self.configuration.virtual_discrets {
            self.generate_virtual_discrets();
        }
        if self.configuration.assign_materials {
            self.assign_materials();
        }
        if self.configuration.create_set_groups {
            self.create_set_groups();
        }

        self.mesh.finish();
        self.finished = true;
        Ok(())
    }

    /// Flatten combined load sets: members of every embedded set are cloned
    /// with fresh ids, scaled by the combination coefficient and attached
    /// to the combining set.
    fn replace_combined_load_sets(&mut self) {
        let set_refs: Vec<Reference<LoadSet>> = self.load_sets.references();
        for set_ref in set_refs {
            let embedded: Vec<(Reference<LoadSet>, f64)> = match self.load_sets.find(&set_ref) {
                Some(set) => set.embedded_load_sets.clone(),
                None => continue,
            };
            if embedded.is_empty() {
                continue;
            }
            for (other_ref, coefficient) in embedded {
                if self.load_sets.find(&other_ref).is_none() {
                    warn!("combined load set misses {other_ref}");
                }
                for member in self.loadings_for(&other_ref) {
                    let Some(loading) = self.loadings.find(&member) else {
                        continue;
                    };
                    let mut copy = loading.clone();
                    copy.ident_mut().reset();
                    copy.scale(coefficient);
                    let new_ref = self.loadings.add(copy);
                    self.add_loading_into_load_set(&new_ref, &set_ref);
                    debug!(
                        "cloned {member} into {new_ref} scaled by {coefficient} for {set_ref}"
                    );
                }
            }
            if let Some(set) = self.load_sets.find_mut(&set_ref) {
                set.embedded_load_sets.clear();
            }
        }
    }

    /// Propagate each element set's dof capability onto every node it
    /// touches
    fn propagate_element_dofs(&mut self) {
        let mut grants: Vec<(usize, Dofs)> = Vec::new();
        for element_set in self.element_sets.iter() {
            for position in element_set.node_positions(&self.mesh) {
                grants.push((position, element_set.dofs_for_node(position)));
            }
        }
        for (position, dofs) in grants {
            self.mesh.allow_dofs(position, dofs);
        }
    }

    /// Synthesize a default analysis when the deck defines none but carries
    /// loads or constraints; modal when a frequency band objective exists
    fn add_default_analysis(&mut self) {
        if !self.analyses.is_empty() {
            return;
        }
        if self.loadings.is_empty() && self.constraints.is_empty() {
            return;
        }
        let modal = self
            .objectives
            .contains_subtype(ObjectiveType::FrequencyBand);
        let base = if modal {
            Analysis::linear_modal(None)
        } else {
            Analysis::linear_static(None)
        };
        let mut analysis = base.with_label("auto");
        for set in self.load_sets.iter() {
            if set.ident().id() != COMMON_SET_ID {
                analysis.add_load_set(set.reference());
            }
        }
        for set in self.constraint_sets.iter() {
            if set.ident().id() != COMMON_SET_ID {
                analysis.add_constraint_set(set.reference());
            }
        }
        for set in self.objective_sets.iter() {
            if set.ident().id() != COMMON_SET_ID {
                analysis.add_objective_set(set.reference());
            }
        }
        let reference = self.analyses.add(analysis);
        info!(
            "no analysis defined, added default {} {reference}",
            if modal { "modal" } else { "linear static" }
        );
    }

    /// Materialize skin cells for surface loads applied on volume cell
    /// faces
    fn generate_skin(&mut self) -> TranslationResult<()> {
        let loading_refs: Vec<Reference<Loading>> = self.loadings.references();
        for loading_ref in loading_refs {
            let mut face = None;
            if let Some(loading) = self.loadings.find(&loading_ref) {
                if let LoadingKind::ForceSurface {
                    application:
                        SurfaceApplication::CellFace {
                            cell_position,
                            face_node_positions,
                        },
                    ..
                } = &loading.kind
                {
                    face = Some((*cell_position, face_node_positions.clone()));
                }
            }
            let Some((parent, face_nodes)) = face else {
                continue;
            };
            let skin = self.mesh.generate_skin_cell(&face_nodes)?;
            self.mesh
                .find_or_create_cell_group("SKIN", None, "skin cells of surface loads")
                .add_cell_position(skin);
            if let Some(loading) = self.loadings.find_mut(&loading_ref) {
                if let LoadingKind::ForceSurface { application, .. } = &mut loading.kind {
                    *application = SurfaceApplication::SkinCell {
                        cell_position: skin,
                    };
                }
            }
            debug!(
                "materialized skin cell at position {skin} from a face of cell position {parent}"
            );
        }
        Ok(())
    }

    /// Materialize boundary line/surface targets into explicit cells
    fn make_boundary_cells(&mut self) -> TranslationResult<()> {
        let target_refs = self.targets.references();
        for target_ref in target_refs {
            let kind = self.targets.find(&target_ref).map(|t| t.kind.clone());
            match kind {
                Some(TargetKind::BoundaryNodeLine { node_positions }) => {
                    let mut cells = Vec::new();
                    for pair in node_positions.windows(2) {
                        cells.push(
                            self.mesh
                                .add_cell_from_positions(CellType::Seg2, pair, true),
                        );
                    }
                    let name = format!("BL{}", target_ref.best_id());
                    let group =
                        self.mesh
                            .find_or_create_cell_group(&name, None, "boundary line cells");
                    for cell in cells {
                        group.add_cell_position(cell);
                    }
                    debug!("materialized boundary line {target_ref} into group {name}");
                }
                Some(TargetKind::BoundaryNodeSurface { node_positions }) => {
                    let mut cells = Vec::new();
                    for quad in node_positions {
                        let face: Vec<usize> = if quad[3] == quad[2] {
                            quad[..3].to_vec()
                        } else {
                            quad.to_vec()
                        };
                        cells.push(self.mesh.generate_skin_cell(&face)?);
                    }
                    let name = format!("BS{}", target_ref.best_id());
                    let group = self.mesh.find_or_create_cell_group(
                        &name,
                        None,
                        "boundary surface cells",
                    );
                    for cell in cells {
                        group.add_cell_position(cell);
                    }
                    debug!("materialized boundary surface {target_ref} into group {name}");
                }
                None => {}
            }
        }
        Ok(())
    }

    /// Accumulate, per analysis, the union of dofs its constraints and
    /// loads require at each node
    fn collect_boundary_dofs(&mut self) {
        for analysis_id in self.analyses.ids() {
            let mut contributions: Vec<(usize, Dofs)> = Vec::new();
            {
                let Some(analysis) = self.analyses.get(analysis_id) else {
                    continue;
                };
                for constraint in self.constraints_of(analysis) {
                    for position in constraint.node_positions() {
                        contributions.push((position, constraint.dofs_for_node(position)));
                    }
                }
                for loading in self.loadings_of(analysis) {
                    for position in loading.node_positions(&self.mesh) {
                        contributions.push((position, loading.dofs_for_node(position)));
                    }
                }
            }
            if let Some(analysis) = self.analyses.get_mut(analysis_id) {
                for (position, dofs) in contributions {
                    analysis.add_boundary_dofs(position, dofs);
                }
            }
        }
    }

    /// Drop assertions observing a dof that no element owns and no boundary
    /// condition supplies. The data loss is logged, never silent.
    fn remove_unreachable_assertions(&mut self) {
        let mut unreachable: Vec<Reference<Objective>> = Vec::new();
        for analysis in self.analyses.iter() {
            for objective in self.assertions_of(analysis) {
                let Some((position, dof)) = objective.asserted_node_dof() else {
                    continue;
                };
                let available =
                    self.mesh.node_dofs(position) + analysis.find_boundary_dofs(position);
                if !available.contains(dof) {
                    unreachable.push(objective.reference());
                }
            }
        }
        unreachable.sort();
        unreachable.dedup();
        for reference in unreachable {
            info!(
                "removed assertion {reference}: its dof is neither element-owned nor \
                 boundary-supplied"
            );
            self.remove_objective(&reference);
        }
    }

    /// Expand fully-rigid homogeneous constraints into linear multi-point
    /// equations (slave minus master on every dof)
    fn expand_rigid_constraints(&mut self) {
        let constraint_refs = self.constraints.references();
        for constraint_ref in constraint_refs {
            let rigid = match self.constraints.find(&constraint_ref) {
                Some(constraint) => match &constraint.kind {
                    ConstraintKind::QuasiRigid {
                        master_position,
                        slave_positions,
                        dofs,
                    } if dofs.contains_all(Dofs::ALL) => Some((
                        *master_position,
                        slave_positions.iter().copied().collect::<Vec<usize>>(),
                        *dofs,
                    )),
                    _ => None,
                },
                None => None,
            };
            let Some((master, slaves, dofs)) = rigid else {
                continue;
            };
            let owning_sets = self.constraint_sets_containing(&constraint_ref);
            for slave in slaves {
                for dof in dofs {
                    let equation = Constraint::lmpc(
                        None,
                        vec![
                            LmpcTerm {
                                position: slave,
                                dof,
                                coefficient: 1.0,
                            },
                            LmpcTerm {
                                position: master,
                                dof,
                                coefficient: -1.0,
                            },
                        ],
                        0.0,
                    );
                    let equation_ref = self.constraints.add(equation);
                    for set in &owning_sets {
                        self.add_constraint_into_constraint_set(&equation_ref, set);
                    }
                }
            }
            debug!("expanded rigid constraint {constraint_ref} into multi point equations");
            self.remove_constraint(&constraint_ref);
        }
    }

    /// Split every direct matrix touching more than `max_nodes` positions
    /// into smaller matrices, pairs of nodes bucketed into half-threshold
    /// stacks. All coefficients are kept, just redistributed.
    fn split_direct_matrices(&mut self, max_nodes: usize) -> TranslationResult<()> {
        if max_nodes < 2 {
            return Err(TranslationError::InvalidConfiguration(format!(
                "cannot split direct matrices to fewer than 2 nodes, got {max_nodes}"
            )));
        }
        let stack_size = max_nodes / 2;
        let set_refs: Vec<Reference<ElementSet>> = self.element_sets.references();
        for set_ref in set_refs {
            let source = {
                let Some(set) = self.element_sets.find(&set_ref) else {
                    continue;
                };
                let Some(matrix) = set.matrix_element() else {
                    continue;
                };
                if matrix.node_positions().len() <= max_nodes {
                    continue;
                }
                (matrix.clone(), set.label.clone(), set.material)
            };
            let (matrix, label, material) = source;

            let mut stack_by_node: BTreeMap<usize, usize> = BTreeMap::new();
            let mut piece_by_stack_pair: BTreeMap<(usize, usize), usize> = BTreeMap::new();
            let mut pieces: Vec<MatrixElement> = Vec::new();

            for (p1, p2) in matrix.node_pairs() {
                let s1 = match stack_by_node.get(&p1) {
                    Some(&stack) => stack,
                    None => {
                        let stack = stack_by_node.len() / stack_size;
                        stack_by_node.insert(p1, stack);
                        stack
                    }
                };
                let s2 = match stack_by_node.get(&p2) {
                    Some(&stack) => stack,
                    None => {
                        let stack = stack_by_node.len() / stack_size;
                        stack_by_node.insert(p2, stack);
                        stack
                    }
                };
                let key = if s1 <= s2 { (s1, s2) } else { (s2, s1) };
                let index = match piece_by_stack_pair.get(&key) {
                    Some(&index) => index,
                    None => {
                        let index = pieces.len();
                        pieces.push(MatrixElement::new(matrix.matrix_type));
                        piece_by_stack_pair.insert(key, index);
                        // one piece serves the whole 2x2 stack block around
                        // the diagonal
                        let base1 = key.0 - key.0 % 2;
                        let base2 = key.1 - key.1 % 2;
                        if base1 == base2 {
                            piece_by_stack_pair.entry((base1, base1)).or_insert(index);
                            piece_by_stack_pair
                                .entry((base1, base1 + 1))
                                .or_insert(index);
                            piece_by_stack_pair
                                .entry((base1 + 1, base1 + 1))
                                .or_insert(index);
                        }
                        index
                    }
                };
                if let Some(submatrix) = matrix.submatrix(p1, p2) {
                    for (&(d1, d2), &value) in submatrix.components() {
                        pieces[index].add_component(p1, d1, p2, d2, value);
                    }
                }
            }

            self.element_sets.erase(&set_ref);
            let mut piece_count = 0;
            for piece in pieces {
                if piece.is_empty() {
                    continue;
                }
                let mut new_set = ElementSet::new(None, ElementSetKind::Matrix(piece));
                new_set.label = label.clone();
                new_set.material = material;
                self.element_sets.add(new_set);
                piece_count += 1;
            }
            debug!("split direct matrix {set_ref} into {piece_count} smaller matrices");
        }
        Ok(())
    }

    /// Build segment cells, a cell group and a rigid material for every
    /// rigid or weighted-average constraint, so generic cell writers can
    /// express them
    fn make_cells_from_rigid_sets(&mut self) {
        let constraint_refs = self.constraints.references();
        for constraint_ref in constraint_refs {
            let rigid = match self.constraints.find(&constraint_ref) {
                Some(constraint) => match &constraint.kind {
                    ConstraintKind::QuasiRigid {
                        master_position,
                        slave_positions,
                        ..
                    } => Some((
                        RigidNature::Rbe2,
                        *master_position,
                        slave_positions.iter().copied().collect::<Vec<usize>>(),
                    )),
                    ConstraintKind::Rbe3 {
                        master_position,
                        slaves,
                        ..
                    } => Some((
                        RigidNature::Rbe3,
                        *master_position,
                        slaves.iter().map(|s| s.position).collect(),
                    )),
                    _ => None,
                },
                None => None,
            };
            let Some((nature, master, slaves)) = rigid else {
                continue;
            };
            if slaves.is_empty() {
                continue;
            }
            let material = self.rigid_material_ref();
            let name = match nature {
                RigidNature::Rbar => format!("RBAR_{}", constraint_ref.best_id()),
                RigidNature::Rbe2 => format!("RBE2_{}", constraint_ref.best_id()),
                RigidNature::Rbe3 => format!("RBE3_{}", constraint_ref.best_id()),
            };
            let mut cells = Vec::new();
            for slave in slaves {
                cells.push(
                    self.mesh
                        .add_cell_from_positions(CellType::Seg2, &[master, slave], true),
                );
            }
            {
                let group = self.mesh.find_or_create_cell_group(
                    &name,
                    None,
                    "segment cells of a rigid constraint",
                );
                for &cell in &cells {
                    group.add_cell_position(cell);
                }
            }
            let set_ref = self.element_sets.add(
                ElementSet::rigid(nature)
                    .with_cell_group(&name)
                    .with_material(material),
            );
            if let Some(element_set_id) = set_ref.id {
                for cell in cells {
                    self.mesh.assign_element_set(cell, element_set_id);
                }
            }
            debug!("materialized {constraint_ref} into rigid cells of group {name}");
        }
    }

    /// Give point/segment cells to direct matrices that have none, so
    /// generic cell writers can place them
    fn make_cells_from_direct_matrices(&mut self) {
        let set_refs: Vec<Reference<ElementSet>> = self.element_sets.references();
        for set_ref in set_refs {
            let pairs = match self.element_sets.find(&set_ref) {
                Some(set) => match (&set.kind, &set.cell_group) {
                    (ElementSetKind::Matrix(matrix), None) => Some(matrix.node_pairs()),
                    _ => None,
                },
                None => None,
            };
            let Some(pairs) = pairs else {
                continue;
            };
            if pairs.is_empty() {
                continue;
            }
            let name = format!("DM{}", set_ref.best_id());
            let mut cells = Vec::new();
            for (p1, p2) in pairs {
                let cell = if p1 == p2 {
                    self.mesh
                        .add_cell_from_positions(CellType::Point1, &[p1], true)
                } else {
                    self.mesh
                        .add_cell_from_positions(CellType::Seg2, &[p1, p2], true)
                };
                cells.push(cell);
            }
            {
                let group = self.mesh.find_or_create_cell_group(
                    &name,
                    None,
                    "cells of a direct matrix",
                );
                for &cell in &cells {
                    group.add_cell_position(cell);
                }
            }
            let element_set_id = self.element_sets.find(&set_ref).map(|s| s.ident().id());
            if let Some(set) = self.element_sets.find_mut(&set_ref) {
                set.cell_group = Some(name.clone());
            }
            if let Some(element_set_id) = element_set_id {
                for cell in cells {
                    self.mesh.assign_element_set(cell, element_set_id);
                }
            }
            debug!("materialized cells for direct matrix {set_ref} in group {name}");
        }
    }

    /// Deduplicate single point constraints per analysis: equal values on
    /// the same (node, dof) collapse to one blocking; disagreeing values
    /// are a fatal inconsistency naming both constraints.
    fn remove_redundant_spcs(&mut self) -> TranslationResult<()> {
        for analysis_id in self.analyses.ids() {
            let mut value_by_node_dof: BTreeMap<(usize, Dof), (f64, Reference<Constraint>)> =
                BTreeMap::new();
            let mut removals: BTreeMap<(Reference<Constraint>, usize), Dofs> = BTreeMap::new();
            {
                let Some(analysis) = self.analyses.get(analysis_id) else {
                    continue;
                };
                let set_refs: Vec<Reference<ConstraintSet>> = self
                    .constraint_sets_of(analysis)
                    .iter()
                    .map(|set| set.reference())
                    .collect();
                let mut visited: BTreeSet<Reference<Constraint>> = BTreeSet::new();
                for set_ref in set_refs {
                    for constraint_ref in self.constraints_for(&set_ref) {
                        if !visited.insert(constraint_ref) {
                            continue;
                        }
                        let Some(constraint) = self.constraints.find(&constraint_ref) else {
                            continue;
                        };
                        if constraint.subtype() != ConstraintType::SinglePoint {
                            continue;
                        }
                        for position in constraint.node_positions() {
                            for dof in constraint.dofs_for_node(position) {
                                let value = constraint.value_for_dof(dof).unwrap_or(0.0);
                                match value_by_node_dof.get(&(position, dof)) {
                                    None => {
                                        value_by_node_dof
                                            .insert((position, dof), (value, constraint_ref));
                                    }
                                    Some(&(existing, first_ref)) => {
                                        if !is_equal(existing, value) {
                                            let node_id = self
                                                .mesh
                                                .node_id(position)
                                                .unwrap_or(position as u32);
                                            return Err(
                                                TranslationError::InconsistentConstraint {
                                                    node_id,
                                                    dof,
                                                    first: first_ref.to_string(),
                                                    first_value: existing,
                                                    second: constraint_ref.to_string(),
                                                    second_value: value,
                                                },
                                            );
                                        }
                                        *removals
                                            .entry((constraint_ref, position))
                                            .or_default() += dof;
                                    }
                                }
                            }
                        }
                    }
                }
            }
            for ((constraint_ref, position), dofs) in removals {
                debug!(
                    "removing redundant dofs {dofs} of node position {position} from \
                     {constraint_ref}"
                );
                self.remove_spc_node_dofs(analysis_id, &constraint_ref, position, dofs);
            }
        }
        Ok(())
    }

    /// Drop constraint dofs that coincide with an imposed displacement on
    /// the same node: the displacement loading wins
    fn remove_constrained_imposed(&mut self) {
        for analysis_id in self.analyses.ids() {
            let mut imposed_by_node: BTreeMap<usize, Dofs> = BTreeMap::new();
            let mut removals: BTreeMap<(Reference<Constraint>, usize), Dofs> = BTreeMap::new();
            {
                let Some(analysis) = self.analyses.get(analysis_id) else {
                    continue;
                };
                for loading in self.loadings_of(analysis) {
                    if loading.subtype() != LoadingType::ImposedDisplacement {
                        continue;
                    }
                    for position in loading.node_positions(&self.mesh) {
                        *imposed_by_node.entry(position).or_default() +=
                            loading.dofs_for_node(position);
                    }
                }
                if imposed_by_node.is_empty() {
                    continue;
                }
                let mut visited: BTreeSet<Reference<Constraint>> = BTreeSet::new();
                let set_refs: Vec<Reference<ConstraintSet>> = self
                    .constraint_sets_of(analysis)
                    .iter()
                    .map(|set| set.reference())
                    .collect();
                for set_ref in set_refs {
                    for constraint_ref in self.constraints_for(&set_ref) {
                        if !visited.insert(constraint_ref) {
                            continue;
                        }
                        let Some(constraint) = self.constraints.find(&constraint_ref) else {
                            continue;
                        };
                        if constraint.subtype() != ConstraintType::SinglePoint {
                            continue;
                        }
                        for position in constraint.node_positions() {
                            let imposed = imposed_by_node
                                .get(&position)
                                .copied()
                                .unwrap_or(Dofs::NONE);
                            let shadowed =
                                constraint.dofs_for_node(position).intersection(imposed);
                            if !shadowed.is_empty() {
                                *removals.entry((constraint_ref, position)).or_default() +=
                                    shadowed;
                            }
                        }
                    }
                }
            }
            for ((constraint_ref, position), dofs) in removals {
                debug!(
                    "imposed displacement supersedes {dofs} of {constraint_ref} on node \
                     position {position}"
                );
                self.remove_spc_node_dofs(analysis_id, &constraint_ref, position, dofs);
            }
        }
    }

    /// Drop zero-magnitude loadings, empty constraints, empty sets, empty
    /// element sets and reservation-only nodes nothing references. Each
    /// removal is logged; the common sets are never dropped.
    fn remove_ineffectives(&mut self) {
        let dead_loadings: Vec<Reference<Loading>> = self
            .loadings
            .iter()
            .filter(|loading| loading.ineffective())
            .map(|loading| loading.reference())
            .collect();
        for reference in dead_loadings {
            info!("removed ineffective {reference}");
            self.remove_loading(&reference);
        }

        let dead_load_sets: Vec<Reference<LoadSet>> = self
            .load_sets
            .iter()
            .filter(|set| set.ident().id() != COMMON_SET_ID)
            .filter(|set| {
                set.embedded_load_sets.is_empty()
                    && self.loadings_for(&set.reference()).is_empty()
            })
            .map(|set| set.reference())
            .collect();
        for reference in dead_load_sets {
            info!("removed empty {reference}");
            self.remove_load_set(&reference);
        }

        let dead_constraints: Vec<Reference<Constraint>> = self
            .constraints
            .iter()
            .filter(|constraint| constraint.ineffective())
            .map(|constraint| constraint.reference())
            .collect();
        for reference in dead_constraints {
            info!("removed ineffective {reference}");
            self.remove_constraint(&reference);
        }

        let dead_constraint_sets: Vec<Reference<ConstraintSet>> = self
            .constraint_sets
            .iter()
            .filter(|set| set.ident().id() != COMMON_SET_ID)
            .filter(|set| self.constraints_for(&set.reference()).is_empty())
            .map(|set| set.reference())
            .collect();
        for reference in dead_constraint_sets {
            info!("removed empty {reference}");
            self.remove_constraint_set(&reference);
        }

        let dead_element_sets: Vec<Reference<ElementSet>> = self
            .element_sets
            .iter()
            .filter(|set| !set.is_effective(&self.mesh))
            .map(|set| set.reference())
            .collect();
        for reference in dead_element_sets {
            info!("removed empty {reference}");
            self.element_sets.erase(&reference);
        }

        let used = self.referenced_node_positions();
        let orphans: Vec<usize> = self
            .mesh
            .nodes()
            .reserved_positions()
            .filter(|position| !used.contains(position))
            .collect();
        for position in orphans {
            info!("released orphaned node reservation at position {position}");
            self.mesh.nodes_mut().release_reservation(position);
        }
    }

    /// Every node position something still references
    fn referenced_node_positions(&self) -> BTreeSet<usize> {
        let mut used = BTreeSet::new();
        for cell in self.mesh.cells().iter() {
            used.extend(cell.node_positions);
        }
        for constraint in self.constraints.iter() {
            used.extend(constraint.node_positions());
        }
        for loading in self.loadings.iter() {
            used.extend(loading.node_positions(&self.mesh));
        }
        for target in self.targets.iter() {
            used.extend(target.node_positions());
        }
        for objective in self.objectives.iter() {
            if let Some((position, _)) = objective.asserted_node_dof() {
                used.insert(position);
            }
        }
        for element_set in self.element_sets.iter() {
            used.extend(element_set.node_positions(&self.mesh));
        }
        used
    }

    /// Generate near-zero-stiffness discrete elements wherever an analysis
    /// requires dofs at a node that no element supplies, keeping every
    /// analysis's system square. Extra dofs brought in by the discrete are
    /// re-blocked with synthetic constraints.
    fn generate_virtual_discrets(&mut self) {
        let node_snapshot: Vec<(usize, Dofs)> = {
            let nodes = self.mesh.nodes();
            nodes
                .positions()
                .map(|(_, position)| (position, nodes.dofs(position)))
                .collect()
        };
        let analysis_ids = self.analyses.ids();

        for (position, node_dofs) in node_snapshot {
            let mut missing = Dofs::NONE;
            for &analysis_id in &analysis_ids {
                if let Some(analysis) = self.analyses.get(analysis_id) {
                    let required = analysis.find_boundary_dofs(position);
                    if !node_dofs.contains_all(required) {
                        missing += required - node_dofs;
                    }
                }
            }
            if missing.is_empty() {
                continue;
            }

            let added;
            if missing.contains_any(Dofs::ROTATIONS) {
                added = Dofs::ALL - node_dofs - missing;
                self.ensure_virtual_discret_set("VDISCRTR", true);
                let cell = self
                    .mesh
                    .add_cell_from_positions(CellType::Point1, &[position], true);
                if let Some(group) = self.mesh.cell_group_mut("VDISCRTR") {
                    group.add_cell_position(cell);
                }
                self.mesh.allow_dofs(position, Dofs::ALL);
            } else {
                added = Dofs::TRANSLATIONS - node_dofs - missing;
                self.ensure_virtual_discret_set("VDISCRT", false);
                let cell = self
                    .mesh
                    .add_cell_from_positions(CellType::Point1, &[position], true);
                if let Some(group) = self.mesh.cell_group_mut("VDISCRT") {
                    group.add_cell_position(cell);
                }
                self.mesh.allow_dofs(position, Dofs::TRANSLATIONS);
            }
            info!(
                "generated a virtual discrete element on node position {position} for \
                 missing dofs {missing}"
            );

            for &analysis_id in &analysis_ids {
                let Some(analysis) = self.analyses.get(analysis_id) else {
                    continue;
                };
                let required = analysis.find_boundary_dofs(position);
                if node_dofs.contains_all(required) {
                    continue;
                }
                let extra = added - required - node_dofs;
                if extra.is_empty() {
                    continue;
                }
                let set_ref = self
                    .constraint_sets
                    .add(ConstraintSet::new(ConstraintSetType::Spc, None));
                let spc = Constraint::single_point(None, extra, 0.0)
                    .with_node_positions(&[position]);
                let spc_ref = self.constraints.add(spc);
                self.add_constraint_into_constraint_set(&spc_ref, &set_ref);
                if let Some(analysis) = self.analyses.get_mut(analysis_id) {
                    analysis.add_constraint_set(set_ref);
                }
                debug!("blocking extra virtual dofs {extra} on node position {position}");
            }
        }
    }

    fn ensure_virtual_discret_set(&mut self, name: &str, with_rotations: bool) {
        if self.mesh.has_group(name) {
            return;
        }
        self.mesh.find_or_create_cell_group(
            name,
            None,
            "virtual discrete elements for analysis-required dofs",
        );
        let base = if with_rotations {
            ElementSet::discrete_point_with_rotations([0.0; 6])
        } else {
            ElementSet::discrete_point([0.0; 3])
        };
        let set = base.with_label(name).with_cell_group(name);
        let set = if self.configuration.add_virtual_material {
            let material = self.virtual_material_ref();
            set.with_material(material)
        } else {
            set
        };
        self.element_sets.add(set);
    }

    /// Assign each element set to a material and record cell ownership on
    /// the mesh. Synthetic discrete/matrix sets get the virtual material
    /// when configured; anything else without one falls back to the first
    /// deck material.
    fn assign_materials(&mut self) {
        let mut ownership: Vec<(usize, u32)> = Vec::new();
        for set in self.element_sets.iter() {
            if let Some(name) = &set.cell_group {
                if let Some(group) = self.mesh.cell_group(name) {
                    for cell_position in group.cell_positions() {
                        ownership.push((cell_position, set.ident().id()));
                    }
                }
            }
        }
        for (cell_position, element_set_id) in ownership {
            self.mesh.assign_element_set(cell_position, element_set_id);
        }

        let default_material: Option<Reference<Material>> = self
            .materials
            .filter(MaterialType::Standard)
            .into_iter()
            .next()
            .map(|material| material.reference());
        let needy: Vec<(Reference<ElementSet>, bool)> = self
            .element_sets
            .iter()
            .filter(|set| set.material.is_none())
            .map(|set| {
                let synthetic = matches!(
                    set.kind,
                    ElementSetKind::Discrete { .. } | ElementSetKind::Matrix(_)
                );
                (set.reference(), synthetic)
            })
            .collect();
        for (set_ref, synthetic) in needy {
            if synthetic && self.configuration.add_virtual_material {
                let material = self.virtual_material_ref();
                if let Some(set) = self.element_sets.find_mut(&set_ref) {
                    set.material = Some(material);
                }
                debug!("assigned the virtual material to {set_ref}");
            } else if let Some(material) = default_material {
                if let Some(set) = self.element_sets.find_mut(&set_ref) {
                    set.material = Some(material);
                }
                debug!("assigned the default material to {set_ref}");
            } else {
                warn!("{set_ref} has no material and the model defines none");
            }
        }
    }

    /// Build display node groups named after the sets they mirror
    fn create_set_groups(&mut self) {
        let mut planned: Vec<(String, Vec<usize>)> = Vec::new();
        for set in self.constraint_sets.iter() {
            let mut positions: BTreeSet<usize> = BTreeSet::new();
            for constraint_ref in self.constraints_for(&set.reference()) {
                if let Some(constraint) = self.constraints.find(&constraint_ref) {
                    positions.extend(constraint.node_positions());
                }
            }
            if positions.is_empty() {
                continue;
            }
            let name = set
                .label
                .clone()
                .unwrap_or_else(|| format!("CS{}", set.best_id()));
            planned.push((name, positions.into_iter().collect()));
        }
        for set in self.load_sets.iter() {
            let mut positions: BTreeSet<usize> = BTreeSet::new();
            for loading_ref in self.loadings_for(&set.reference()) {
                if let Some(loading) = self.loadings.find(&loading_ref) {
                    positions.extend(loading.node_positions(&self.mesh));
                }
            }
            if positions.is_empty() {
                continue;
            }
            let name = set
                .label
                .clone()
                .unwrap_or_else(|| format!("LS{}", set.best_id()));
            planned.push((name, positions.into_iter().collect()));
        }
        for (name, positions) in planned {
            if self.mesh.cell_group(&name).is_some() {
                warn!("cannot create display group {name}: a cell group owns the name");
                continue;
            }
            let group = self
                .mesh
                .find_or_create_node_group(&name, None, "set display group");
            for position in positions {
                group.add_node_position(position);
            }
            debug!("created display group {name}");
        }
    }

    /// Detach `dofs_to_remove` of one node from a single point constraint,
    /// preserving the node's remaining dofs through a fresh constraint and
    /// preserving sibling analyses sharing the constraint's sets through a
    /// compensating set.
    pub(crate) fn remove_spc_node_dofs(
        &mut self,
        analysis_id: u32,
        spc: &Reference<Constraint>,
        node_position: usize,
        dofs_to_remove: Dofs,
    ) {
        let Some(constraint) = self.constraints.find(spc) else {
            return;
        };
        let blocked = constraint.dofs_for_node(node_position);
        let remaining = blocked - dofs_to_remove;
        let mut values: [Option<f64>; 6] = [None; 6];
        for dof in blocked {
            values[dof.position()] = constraint.value_for_dof(dof);
        }
        let affected_sets = self.constraint_sets_containing(spc);

        if !remaining.is_empty() {
            let mut remainder = Constraint::single_point(None, Dofs::NONE, 0.0);
            remainder.add_node_position(node_position);
            for dof in remaining {
                if let Some(value) = values[dof.position()] {
                    remainder.set_dof_value(dof, value);
                }
            }
            let remainder_ref = self.constraints.add(remainder);
            for set in &affected_sets {
                self.add_constraint_into_constraint_set(&remainder_ref, set);
            }
            debug!(
                "created {remainder_ref} keeping dofs {remaining} of node position \
                 {node_position}"
            );
        }

        if self.analyses.len() >= 2 {
            let mut sibling_ids: Vec<u32> = Vec::new();
            for analysis in self.analyses.iter() {
                if analysis.ident().id() == analysis_id {
                    continue;
                }
                let shares = affected_sets.iter().any(|set| {
                    set.id == Some(COMMON_SET_ID) || analysis.contains_constraint_set(set)
                });
                if shares {
                    sibling_ids.push(analysis.ident().id());
                }
            }
            if !sibling_ids.is_empty() {
                let compensating_set = self
                    .constraint_sets
                    .add(ConstraintSet::new(ConstraintSetType::Spc, None));
                let mut compensating = Constraint::single_point(None, Dofs::NONE, 0.0);
                compensating.add_node_position(node_position);
                for dof in dofs_to_remove {
                    if let Some(value) = values[dof.position()] {
                        compensating.set_dof_value(dof, value);
                    }
                }
                let compensating_ref = self.constraints.add(compensating);
                self.add_constraint_into_constraint_set(&compensating_ref, &compensating_set);
                for sibling_id in sibling_ids {
                    if let Some(analysis) = self.analyses.get_mut(sibling_id) {
                        analysis.add_constraint_set(compensating_set);
                    }
                }
                debug!(
                    "created compensating {compensating_ref} so sibling analyses keep dofs \
                     {dofs_to_remove} of node position {node_position}"
                );
            }
        }

        if let Some(constraint) = self.constraints.find_mut(spc) {
            constraint.remove_node(node_position);
        }
    }

    fn rigid_material_ref(&mut self) -> Reference<Material> {
        if let Some(reference) = self.rigid_material {
            return reference;
        }
        let reference = self.materials.add(Material::rigid());
        self.rigid_material = Some(reference);
        reference
    }

    fn virtual_material_ref(&mut self) -> Reference<Material> {
        if let Some(reference) = self.virtual_material {
            return reference;
        }
        let reference = self.materials.add(Material::virtual_());
        self.virtual_material = Some(reference);
        reference
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfiguration;
    use nalgebra::Vector3;

    fn empty_model() -> Model {
        Model::with_configuration("test", ModelConfiguration::minimal())
    }

    #[test]
    fn test_default_analysis_only_when_content_exists() {
        let mut model = empty_model();
        model.add_default_analysis();
        assert!(model.analyses.is_empty());

        let position = model.mesh.add_node(1, 0.0, 0.0, 0.0);
        let load = model.loadings.add(
            Loading::nodal_force(Some(1), Vector3::x(), Vector3::zeros())
                .with_node_positions(&[position]),
        );
        let set = model.get_or_create_load_set(crate::loads::LoadSetType::Load, 1);
        model.add_loading_into_load_set(&load, &set);
        model.add_default_analysis();
        assert_eq!(model.analyses.len(), 1);
        let analysis = model.analyses.first().unwrap();
        assert!(analysis.contains_load_set(&set));
    }

    #[test]
    fn test_default_analysis_goes_modal_with_frequency_band() {
        let mut model = empty_model();
        let position = model.mesh.add_node(1, 0.0, 0.0, 0.0);
        let spc = model
            .constraints
            .add(Constraint::single_point(None, Dofs::ALL, 0.0).with_node_positions(&[position]));
        model.add_constraint_into_constraint_set(&spc.clone(), &model.common_constraint_set());
        model
            .objectives
            .add(Objective::frequency_band(None, Some(0.0), Some(50.0), None));
        model.add_default_analysis();
        let analysis = model.analyses.first().unwrap();
        assert_eq!(
            analysis.analysis_type(),
            crate::analysis::AnalysisType::LinearModal
        );
    }

    #[test]
    fn test_propagate_element_dofs() {
        use crate::elements::BeamSection;

        let mut model = empty_model();
        model.mesh.add_node(1, 0.0, 0.0, 0.0);
        model.mesh.add_node(2, 1.0, 0.0, 0.0);
        let cell = model
            .mesh
            .add_cell(None, CellType::Seg2, &[1, 2], false, None);
        model
            .mesh
            .find_or_create_cell_group("beams", None, "")
            .add_cell_position(cell);
        model.element_sets.add(
            ElementSet::truss(Some(1), BeamSection::new(1.0, 1.0, 1.0, 1.0))
                .with_cell_group("beams"),
        );
        model.propagate_element_dofs();
        assert_eq!(model.mesh.node_dofs(0), Dofs::TRANSLATIONS);
        assert_eq!(model.mesh.node_dofs(1), Dofs::TRANSLATIONS);
    }

    #[test]
    fn test_split_direct_matrices_respects_threshold() {
        let mut model = empty_model();
        let positions: Vec<usize> = (1..=25)
            .map(|id| model.mesh.add_node(id, id as f64, 0.0, 0.0))
            .collect();
        let mut set = ElementSet::matrix(Some(1), crate::elements::MatrixType::Stiffness);
        {
            let matrix = set.matrix_element_mut().unwrap();
            for &position in &positions {
                matrix.add_component(position, Dof::Dx, position, Dof::Dx, 100.0);
            }
            for window in positions.windows(2) {
                matrix.add_component(window[0], Dof::Dx, window[1], Dof::Dx, -1.0);
            }
        }
        let original_sum: f64 = set.matrix_element().unwrap().component_sum();
        let original_ref = model.element_sets.add(set);

        model.split_direct_matrices(20).unwrap();

        assert!(model.element_sets.find(&original_ref).is_none());
        let mut covered = BTreeSet::new();
        let mut total = 0.0;
        for set in model.element_sets.iter() {
            let matrix = set.matrix_element().expect("only matrices remain");
            let nodes = matrix.node_positions();
            assert!(nodes.len() <= 20, "a split matrix still has {} nodes", nodes.len());
            covered.extend(nodes);
            total += matrix.component_sum();
        }
        assert_eq!(covered.len(), 25);
        assert!(is_equal(total, original_sum));
    }

    #[test]
    fn test_split_rejects_tiny_threshold() {
        let mut model = empty_model();
        assert!(matches!(
            model.split_direct_matrices(1),
            Err(TranslationError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_expand_rigid_constraints() {
        let mut model = empty_model();
        let master = model.mesh.add_node(1, 0.0, 0.0, 0.0);
        let slave = model.mesh.add_node(2, 1.0, 0.0, 0.0);
        let rigid = model.constraints.add(
            Constraint::quasi_rigid(Some(5), master, Dofs::ALL).with_node_positions(&[slave]),
        );
        model.add_constraint_into_constraint_set(&rigid.clone(), &model.common_constraint_set());

        model.expand_rigid_constraints();

        assert!(model.constraints.find(&rigid).is_none());
        let equations = model.constraints.filter(ConstraintType::Lmpc);
        assert_eq!(equations.len(), 6);
        let members = model.constraints_for(&model.common_constraint_set());
        assert_eq!(members.len(), 6);
    }

    #[test]
    fn test_make_cells_from_direct_matrices() {
        let mut model = empty_model();
        let p1 = model.mesh.add_node(1, 0.0, 0.0, 0.0);
        let p2 = model.mesh.add_node(2, 1.0, 0.0, 0.0);
        let mut set = ElementSet::matrix(Some(3), crate::elements::MatrixType::Mass);
        {
            let matrix = set.matrix_element_mut().unwrap();
            matrix.add_component(p1, Dof::Dx, p1, Dof::Dx, 1.0);
            matrix.add_component(p1, Dof::Dx, p2, Dof::Dx, 0.5);
        }
        let set_ref = model.element_sets.add(set);
        model.make_cells_from_direct_matrices();
        let set = model.element_sets.find(&set_ref).unwrap();
        assert_eq!(set.cell_group.as_deref(), Some("DM3"));
        let group = model.mesh.cell_group("DM3").unwrap();
        assert_eq!(group.len(), 2); // one point cell, one segment cell
    }

    #[test]
    fn test_generate_virtual_discrets_covers_missing_dofs() {
        let mut model = empty_model();
        let position = model.mesh.add_node(1, 0.0, 0.0, 0.0);
        let mut analysis = Analysis::linear_static(None);
        analysis.add_boundary_dofs(position, Dofs::TRANSLATIONS);
        model.analyses.add(analysis);

        model.generate_virtual_discrets();

        assert!(model.mesh.node_dofs(position).contains_all(Dofs::TRANSLATIONS));
        assert!(model.mesh.cell_group("VDISCRT").is_some());
        assert_eq!(model.mesh.cell_count(), 1);
    }

    #[test]
    fn test_remove_ineffectives_drops_orphan_reservation() {
        let mut model = empty_model();
        model.mesh.add_node(1, 0.0, 0.0, 0.0);
        model.mesh.find_or_reserve_node(99);
        assert!(!model.mesh.validate());
        model.remove_ineffectives();
        assert!(model.mesh.validate());
    }

    #[test]
    fn test_remove_ineffectives_keeps_common_sets() {
        let mut model = empty_model();
        model.remove_ineffectives();
        assert!(model.load_sets.find(&model.common_load_set()).is_some());
        assert!(model
            .constraint_sets
            .find(&model.common_constraint_set())
            .is_some());
    }

    #[test]
    fn test_finish_is_idempotent() {
        let mut model = Model::new("test");
        let position = model.mesh.add_node(1, 0.0, 0.0, 0.0);
        let spc = model
            .constraints
            .add(Constraint::single_point(Some(1), Dofs::ALL, 0.0).with_node_positions(&[position]));
        model.add_constraint_into_constraint_set(&spc, &model.common_constraint_set());

        model.finish().unwrap();
        assert!(model.is_finished());
        let stats = model.stats();
        model.finish().unwrap();
        assert_eq!(model.stats(), stats);
    }
}
