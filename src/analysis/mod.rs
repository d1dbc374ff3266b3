//! Analyses
//!
//! An analysis names the solver run to prepare: its kind, the load,
//! constraint and objective sets it references, and the per-node record of
//! boundary degrees of freedom already satisfied by its boundary
//! conditions.

use std::collections::BTreeMap;

use crate::constraints::ConstraintSet;
use crate::dof::Dofs;
use crate::loads::LoadSet;
use crate::objectives::{Objective, ObjectiveSet};
use crate::reference::{Identifiable, Identity, Reference};

/// Closed subtype enumeration for analyses
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AnalysisType {
    LinearMecaStat,
    LinearModal,
    LinearBuckling,
    LinearDynaModalFreq,
    NonLinearMecaStat,
}

/// Per-variant payload of an analysis
#[derive(Debug, Clone)]
pub enum AnalysisKind {
    LinearMecaStat,
    LinearModal {
        frequency_band: Option<Reference<Objective>>,
    },
    LinearBuckling {
        frequency_band: Option<Reference<Objective>>,
    },
    LinearDynaModalFreq {
        structural_damping: f64,
    },
    NonLinearMecaStat {
        strategy: Option<Reference<Objective>>,
    },
}

/// One solver run to prepare
#[derive(Debug, Clone)]
pub struct Analysis {
    ident: Identity,
    pub label: Option<String>,
    pub kind: AnalysisKind,
    load_sets: Vec<Reference<LoadSet>>,
    constraint_sets: Vec<Reference<ConstraintSet>>,
    objective_sets: Vec<Reference<ObjectiveSet>>,
    boundary_dofs: BTreeMap<usize, Dofs>,
}

impl Analysis {
    pub fn new(original_id: Option<u32>, kind: AnalysisKind) -> Analysis {
        Analysis {
            ident: Identity::new(original_id),
            label: None,
            kind,
            load_sets: Vec::new(),
            constraint_sets: Vec::new(),
            objective_sets: Vec::new(),
            boundary_dofs: BTreeMap::new(),
        }
    }

    pub fn linear_static(original_id: Option<u32>) -> Analysis {
        Analysis::new(original_id, AnalysisKind::LinearMecaStat)
    }

    pub fn linear_modal(original_id: Option<u32>) -> Analysis {
        Analysis::new(
            original_id,
            AnalysisKind::LinearModal {
                frequency_band: None,
            },
        )
    }

    pub fn with_label(mut self, label: &str) -> Analysis {
        self.label = Some(label.to_string());
        self
    }

    pub fn analysis_type(&self) -> AnalysisType {
        match self.kind {
            AnalysisKind::LinearMecaStat => AnalysisType::LinearMecaStat,
            AnalysisKind::LinearModal { .. } => AnalysisType::LinearModal,
            AnalysisKind::LinearBuckling { .. } => AnalysisType::LinearBuckling,
            AnalysisKind::LinearDynaModalFreq { .. } => AnalysisType::LinearDynaModalFreq,
            AnalysisKind::NonLinearMecaStat { .. } => AnalysisType::NonLinearMecaStat,
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(
            self.kind,
            AnalysisKind::LinearMecaStat | AnalysisKind::NonLinearMecaStat { .. }
        )
    }

    pub fn is_linear(&self) -> bool {
        !matches!(self.kind, AnalysisKind::NonLinearMecaStat { .. })
    }

    // ========================
    // Referenced sets
    // ========================

    pub fn add_load_set(&mut self, reference: Reference<LoadSet>) {
        if !self.load_sets.contains(&reference) {
            self.load_sets.push(reference);
        }
    }

    pub fn add_constraint_set(&mut self, reference: Reference<ConstraintSet>) {
        if !self.constraint_sets.contains(&reference) {
            self.constraint_sets.push(reference);
        }
    }

    pub fn add_objective_set(&mut self, reference: Reference<ObjectiveSet>) {
        if !self.objective_sets.contains(&reference) {
            self.objective_sets.push(reference);
        }
    }

    pub fn remove_load_set(&mut self, reference: &Reference<LoadSet>) {
        self.load_sets.retain(|r| r != reference);
    }

    pub fn remove_constraint_set(&mut self, reference: &Reference<ConstraintSet>) {
        self.constraint_sets.retain(|r| r != reference);
    }

    pub fn remove_objective_set(&mut self, reference: &Reference<ObjectiveSet>) {
        self.objective_sets.retain(|r| r != reference);
    }

    pub fn contains_load_set(&self, reference: &Reference<LoadSet>) -> bool {
        self.load_sets.contains(reference)
    }

    pub fn contains_constraint_set(&self, reference: &Reference<ConstraintSet>) -> bool {
        self.constraint_sets.contains(reference)
    }

    /// Explicitly referenced load sets, in reference order. The model's
    /// common set applies on top of these.
    pub fn load_set_refs(&self) -> &[Reference<LoadSet>] {
        &self.load_sets
    }

    pub fn constraint_set_refs(&self) -> &[Reference<ConstraintSet>] {
        &self.constraint_sets
    }

    pub fn objective_set_refs(&self) -> &[Reference<ObjectiveSet>] {
        &self.objective_sets
    }

    // ========================
    // Boundary degrees of freedom
    // ========================

    /// Union in degrees of freedom satisfied at a node by this analysis's
    /// boundary conditions
    pub fn add_boundary_dofs(&mut self, node_position: usize, dofs: Dofs) {
        if dofs.is_empty() {
            return;
        }
        *self.boundary_dofs.entry(node_position).or_default() += dofs;
    }

    pub fn find_boundary_dofs(&self, node_position: usize) -> Dofs {
        self.boundary_dofs
            .get(&node_position)
            .copied()
            .unwrap_or(Dofs::NONE)
    }

    pub fn boundary_node_positions(&self) -> Vec<usize> {
        self.boundary_dofs.keys().copied().collect()
    }
}

impl Identifiable for Analysis {
    type Type = AnalysisType;
    const KIND: &'static str = "Analysis";

    fn ident(&self) -> &Identity {
        &self.ident
    }

    fn ident_mut(&mut self) -> &mut Identity {
        &mut self.ident
    }

    fn subtype(&self) -> AnalysisType {
        self.analysis_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::ConstraintSetType;
    use crate::dof::{Dof, Dofs};

    #[test]
    fn test_set_references_are_deduplicated() {
        let mut analysis = Analysis::linear_static(Some(1));
        let reference = Reference::new(ConstraintSetType::Spc, 4);
        analysis.add_constraint_set(reference);
        analysis.add_constraint_set(reference);
        assert_eq!(analysis.constraint_set_refs().len(), 1);
        assert!(analysis.contains_constraint_set(&reference));
        analysis.remove_constraint_set(&reference);
        assert!(analysis.constraint_set_refs().is_empty());
    }

    #[test]
    fn test_boundary_dofs_accumulate() {
        let mut analysis = Analysis::linear_static(None);
        analysis.add_boundary_dofs(3, Dofs::from(Dof::Dx));
        analysis.add_boundary_dofs(3, Dofs::from(Dof::Dy));
        analysis.add_boundary_dofs(5, Dofs::ROTATIONS);
        analysis.add_boundary_dofs(9, Dofs::NONE);
        assert_eq!(
            analysis.find_boundary_dofs(3),
            Dofs::from(Dof::Dx) + Dof::Dy
        );
        assert_eq!(analysis.find_boundary_dofs(4), Dofs::NONE);
        assert_eq!(analysis.boundary_node_positions(), vec![3, 5]);
    }

    #[test]
    fn test_kind_predicates() {
        assert!(Analysis::linear_static(None).is_static());
        assert!(Analysis::linear_static(None).is_linear());
        assert!(!Analysis::linear_modal(None).is_static());
        assert_eq!(
            Analysis::linear_modal(None).analysis_type(),
            AnalysisType::LinearModal
        );
    }
}
