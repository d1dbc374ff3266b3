//! End-to-end scenarios for the normalization pipeline

use fem_translator::prelude::*;
use nalgebra::Vector3;
use std::collections::BTreeMap;

/// A model with one clamped node and one loaded node, ready to finish
fn cantilever_model() -> Model {
    let mut model = Model::new("cantilever");
    model.mesh.add_node(1, 0.0, 0.0, 0.0);
    model.mesh.add_node(2, 1.0, 0.0, 0.0);
    let root = model.mesh.node_position(1).unwrap();
    let tip = model.mesh.node_position(2).unwrap();

    let spc = model
        .constraints
        .add(Constraint::single_point(Some(1), Dofs::ALL, 0.0).with_node_positions(&[root]));
    model.add_constraint_into_constraint_set(&spc, &model.common_constraint_set());

    let load = model.loadings.add(
        Loading::nodal_force(Some(1), Vector3::new(0.0, -1000.0, 0.0), Vector3::zeros())
            .with_node_positions(&[tip]),
    );
    let load_set = model.get_or_create_load_set(LoadSetType::Load, 1);
    model.add_loading_into_load_set(&load, &load_set);
    model
}

#[test]
fn reference_round_trip_survives_unrelated_additions() {
    let mut model = Model::new("test");
    let position = model.mesh.add_node(1, 0.0, 0.0, 0.0);
    let spc = model
        .constraints
        .add(Constraint::single_point(Some(42), Dofs::ALL, 0.0).with_node_positions(&[position]));

    let resolved = model.constraints.find(&spc).unwrap();
    assert_eq!(resolved.reference(), spc);

    // adding an entity of a different kind does not disturb resolution
    model
        .loadings
        .add(Loading::gravity(Some(42), Vector3::new(0.0, 0.0, -9.81)));
    let resolved = model.constraints.find(&spc).unwrap();
    assert_eq!(resolved.reference(), spc);
}

#[test]
fn internal_ids_stay_monotonic_across_erases() {
    let mut model = Model::new("test");
    let first = model
        .loadings
        .add(Loading::gravity(None, Vector3::new(0.0, 0.0, -9.81)));
    let second = model
        .loadings
        .add(Loading::gravity(None, Vector3::new(0.0, 0.0, -1.0)));
    model.remove_loading(&second);
    let third = model
        .loadings
        .add(Loading::gravity(None, Vector3::new(0.0, 0.0, -2.0)));

    let ids: Vec<u32> = [first, second, third]
        .iter()
        .map(|reference| reference.id.unwrap())
        .collect();
    assert!(ids[0] < ids[1] && ids[1] < ids[2]);
}

#[test]
fn reservation_then_definition_is_one_stable_node() {
    let mut model = Model::new("test");
    let reserved = model.mesh.find_or_reserve_node(7);
    let defined = model.mesh.add_node(7, 1.0, 2.0, 3.0);
    assert_eq!(reserved, defined);
    assert_eq!(model.mesh.node_count(), 1);
    let node = model.mesh.node(defined).unwrap();
    assert_eq!((node.x, node.y, node.z), (1.0, 2.0, 3.0));
}

#[test]
fn common_load_set_applies_to_every_analysis() {
    let mut model = Model::new("test");
    let position = model.mesh.add_node(1, 0.0, 0.0, 0.0);

    let common_load = model.loadings.add(
        Loading::nodal_force(Some(10), Vector3::x(), Vector3::zeros())
            .with_node_positions(&[position]),
    );
    model.add_loading_into_load_set(&common_load, &model.common_load_set());

    let own_load = model.loadings.add(
        Loading::nodal_force(Some(11), Vector3::y(), Vector3::zeros())
            .with_node_positions(&[position]),
    );
    let own_set = model.get_or_create_load_set(LoadSetType::Load, 1);
    model.add_loading_into_load_set(&own_load, &own_set);

    let mut first = Analysis::linear_static(Some(1));
    first.add_load_set(own_set);
    let first = model.analyses.add(first);
    let second = model.analyses.add(Analysis::linear_static(Some(2)));

    for reference in [first, second] {
        let analysis = model.analyses.find(&reference).unwrap();
        let loads: Vec<u32> = model
            .loadings_of(analysis)
            .iter()
            .map(|loading| loading.best_id())
            .collect();
        assert!(loads.contains(&10), "analysis misses the common loading");
    }
    let first_analysis = model.analyses.find(&first).unwrap();
    assert_eq!(model.loadings_of(first_analysis).len(), 2);
    let second_analysis = model.analyses.find(&second).unwrap();
    assert_eq!(model.loadings_of(second_analysis).len(), 1);
}

#[test]
fn finish_twice_changes_nothing() {
    let mut model = cantilever_model();
    model.finish().unwrap();
    let stats = model.stats();
    let boundary: Vec<usize> = {
        let analysis = model.analyses.first().unwrap();
        analysis.boundary_node_positions()
    };

    model.finish().unwrap();
    assert_eq!(model.stats(), stats);
    let analysis = model.analyses.first().unwrap();
    assert_eq!(analysis.boundary_node_positions(), boundary);
}

/// Count, per degree of freedom, how many single point constraints of one
/// analysis block it at a node position
fn blocking_counts(model: &Model, analysis: &Analysis, position: usize) -> BTreeMap<Dof, usize> {
    let mut counts = BTreeMap::new();
    for constraint in model.constraints_of(analysis) {
        if constraint.subtype() != ConstraintType::SinglePoint {
            continue;
        }
        for dof in constraint.dofs_for_node(position) {
            *counts.entry(dof).or_insert(0) += 1;
        }
    }
    counts
}

#[test]
fn duplicate_spcs_with_equal_values_collapse() {
    let mut model = Model::new("test");
    model.mesh.add_node(7, 0.0, 0.0, 0.0);
    let position = model.mesh.node_position(7).unwrap();

    let wide = model.constraints.add(
        Constraint::single_point(Some(1), Dofs::TRANSLATIONS, 0.0).with_node_positions(&[position]),
    );
    let narrow = model.constraints.add(
        Constraint::single_point(Some(2), Dofs::from(Dof::Dx), 0.0)
            .with_node_positions(&[position]),
    );
    let set_a = Reference::new(ConstraintSetType::Spc, 1);
    let set_b = Reference::new(ConstraintSetType::Spc, 2);
    model.add_constraint_into_constraint_set(&wide, &set_a);
    model.add_constraint_into_constraint_set(&narrow, &set_b);

    let mut analysis = Analysis::linear_static(Some(1));
    analysis.add_constraint_set(set_a);
    analysis.add_constraint_set(set_b);
    model.analyses.add(analysis);

    model.finish().unwrap();

    let analysis = model.analyses.first().unwrap();
    let counts = blocking_counts(&model, analysis, position);
    assert_eq!(counts.get(&Dof::Dx), Some(&1), "DX must be blocked exactly once");
    assert_eq!(counts.get(&Dof::Dy), Some(&1));
    assert_eq!(counts.get(&Dof::Dz), Some(&1));
}

#[test]
fn conflicting_spc_values_are_fatal_and_identified() {
    let mut model = Model::new("test");
    model.mesh.add_node(7, 0.0, 0.0, 0.0);
    let position = model.mesh.node_position(7).unwrap();

    let zero = model.constraints.add(
        Constraint::single_point(Some(1), Dofs::from(Dof::Dx), 0.0)
            .with_node_positions(&[position]),
    );
    let one = model.constraints.add(
        Constraint::single_point(Some(2), Dofs::from(Dof::Dx), 1.0)
            .with_node_positions(&[position]),
    );
    let set_a = Reference::new(ConstraintSetType::Spc, 1);
    let set_b = Reference::new(ConstraintSetType::Spc, 2);
    model.add_constraint_into_constraint_set(&zero, &set_a);
    model.add_constraint_into_constraint_set(&one, &set_b);

    let mut analysis = Analysis::linear_static(Some(1));
    analysis.add_constraint_set(set_a);
    analysis.add_constraint_set(set_b);
    model.analyses.add(analysis);

    let error = model.finish().unwrap_err();
    match error {
        TranslationError::InconsistentConstraint {
            node_id,
            dof,
            first,
            second,
            first_value,
            second_value,
        } => {
            assert_eq!(node_id, 7);
            assert_eq!(dof, Dof::Dx);
            assert!(first.contains("original_id=1"));
            assert!(second.contains("original_id=2"));
            assert_ne!(first_value, second_value);
        }
        other => panic!("expected an inconsistent constraint error, got {other}"),
    }
    assert!(!model.is_finished());
}

#[test]
fn oversized_direct_matrix_splits_under_threshold() {
    let configuration = ModelConfiguration::default().with_split_direct_matrices(20);
    let mut model = Model::with_configuration("test", configuration);
    let positions: Vec<usize> = (1..=25)
        .map(|id| model.mesh.add_node(id, id as f64, 0.0, 0.0))
        .collect();

    let mut set = ElementSet::matrix(Some(1), MatrixType::Stiffness);
    {
        let matrix = set.matrix_element_mut().unwrap();
        for &position in &positions {
            matrix.add_component(position, Dof::Dx, position, Dof::Dx, 100.0);
        }
        for window in positions.windows(2) {
            matrix.add_component(window[0], Dof::Dx, window[1], Dof::Dx, -1.0);
        }
    }
    let component_count = set.matrix_element().unwrap().component_count();
    let component_sum = set.matrix_element().unwrap().component_sum();
    let original = model.element_sets.add(set);

    model.finish().unwrap();

    assert!(
        model.element_sets.find(&original).is_none(),
        "the oversized matrix must be gone"
    );
    let mut covered = std::collections::BTreeSet::new();
    let mut total_components = 0;
    let mut total_sum = 0.0;
    for set in model.element_sets.iter() {
        let matrix = set.matrix_element().expect("only matrix sets were added");
        let nodes = matrix.node_positions();
        assert!(nodes.len() <= 20, "split matrix touches {} nodes", nodes.len());
        covered.extend(nodes);
        total_components += matrix.component_count();
        total_sum += matrix.component_sum();
    }
    assert_eq!(covered.len(), 25, "every position must stay covered");
    assert_eq!(total_components, component_count);
    assert!((total_sum - component_sum).abs() < 1e-9);
}

#[test]
fn unreachable_assertions_are_dropped_but_reachable_kept() {
    let mut model = Model::new("test");
    let constrained = model.mesh.add_node(1, 0.0, 0.0, 0.0);
    let floating = model.mesh.add_node(2, 1.0, 0.0, 0.0);

    let spc = model.constraints.add(
        Constraint::single_point(Some(1), Dofs::TRANSLATIONS, 0.0)
            .with_node_positions(&[constrained]),
    );
    model.add_constraint_into_constraint_set(&spc, &model.common_constraint_set());

    let reachable = model.objectives.add(Objective::nodal_displacement_assertion(
        Some(1),
        constrained,
        Dof::Dx,
        0.0,
        0.01,
    ));
    let unreachable = model.objectives.add(Objective::nodal_displacement_assertion(
        Some(2),
        floating,
        Dof::Rz,
        0.0,
        0.01,
    ));
    model.add_objective_into_objective_set(&reachable, &model.common_objective_set());
    model.add_objective_into_objective_set(&unreachable, &model.common_objective_set());

    model.finish().unwrap();

    assert!(model.objectives.find(&reachable).is_some());
    assert!(model.objectives.find(&unreachable).is_none());
}

#[test]
fn virtual_discrets_square_the_system() {
    let configuration = ModelConfiguration::default()
        .with_virtual_discrets()
        .with_virtual_material();
    let mut model = Model::with_configuration("test", configuration);
    let position = model.mesh.add_node(1, 0.0, 0.0, 0.0);

    // a force demands DY at a node no element supplies
    let load = model.loadings.add(
        Loading::nodal_force(Some(1), Vector3::new(0.0, -1.0, 0.0), Vector3::zeros())
            .with_node_positions(&[position]),
    );
    model.add_loading_into_load_set(&load, &model.common_load_set());

    model.finish().unwrap();

    assert!(model.mesh.node_dofs(position).contains(Dof::Dy));
    let discretes = model.element_sets.filter(ElementSetType::Discrete);
    assert_eq!(discretes.len(), 1);
    assert!(
        discretes[0].material.is_some(),
        "the virtual discrete set must carry the virtual material"
    );
    assert!(model.validate());
}

#[test]
fn rigid_constraints_materialize_into_cells() {
    let configuration = ModelConfiguration::default().with_rigid_set_cells();
    let mut model = Model::with_configuration("test", configuration);
    let master = model.mesh.add_node(1, 0.0, 0.0, 0.0);
    let slave_a = model.mesh.add_node(2, 1.0, 0.0, 0.0);
    let slave_b = model.mesh.add_node(3, 0.0, 1.0, 0.0);

    let rigid = model.constraints.add(
        Constraint::quasi_rigid(Some(4), master, Dofs::ALL)
            .with_node_positions(&[slave_a, slave_b]),
    );
    model.add_constraint_into_constraint_set(&rigid, &model.common_constraint_set());

    model.finish().unwrap();

    let group = model.mesh.cell_group("RBE2_4").expect("rigid cell group");
    assert_eq!(group.len(), 2);
    let rigid_sets = model.element_sets.filter(ElementSetType::Rigid);
    assert_eq!(rigid_sets.len(), 1);
    let material_ref = rigid_sets[0].material.expect("rigid sets carry a material");
    let material = model.materials.find(&material_ref).unwrap();
    assert_eq!(material.material_type, MaterialType::Rigid);
}

#[test]
fn imposed_displacement_wins_over_spc() {
    let mut model = Model::new("test");
    model.mesh.add_node(7, 0.0, 0.0, 0.0);
    let position = model.mesh.node_position(7).unwrap();

    let spc = model.constraints.add(
        Constraint::single_point(Some(1), Dofs::TRANSLATIONS, 0.0)
            .with_node_positions(&[position]),
    );
    model.add_constraint_into_constraint_set(&spc, &model.common_constraint_set());

    let imposed = model.loadings.add(
        Loading::imposed_displacement(Some(1), Dofs::from(Dof::Dx), 0.01)
            .with_node_positions(&[position]),
    );
    model.add_loading_into_load_set(&imposed, &model.common_load_set());

    model.analyses.add(Analysis::linear_static(Some(1)));

    model.finish().unwrap();

    let analysis = model.analyses.first().unwrap();
    let counts = blocking_counts(&model, analysis, position);
    assert_eq!(counts.get(&Dof::Dx), None, "DX is imposed, not blocked");
    assert_eq!(counts.get(&Dof::Dy), Some(&1));
    assert_eq!(counts.get(&Dof::Dz), Some(&1));
}

#[test]
fn finished_model_validates_and_reports_stats() {
    let mut model = cantilever_model();
    model.finish().unwrap();
    assert!(model.validate());

    let stats = model.stats();
    assert_eq!(stats.nodes, 2);
    assert_eq!(stats.analyses, 1);
    assert!(stats.load_sets >= 1);

    // stats serialize for diagnostics
    let rendered = serde_json::to_string(&stats).unwrap();
    assert!(rendered.contains("\"nodes\":2"));
}
