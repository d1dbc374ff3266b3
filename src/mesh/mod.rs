//! Mesh storage
//!
//! The mesh owns the geometric side of the model: dense position-indexed
//! node and cell arrays with sparse id indexes, named groups, and the
//! coordinate-system storage. Positions are the internal currency; deck ids
//! are only resolved at the boundaries.

pub mod cells;
pub mod csys;
pub mod groups;
pub mod nodes;

use std::collections::BTreeMap;

use log::debug;
use nalgebra::Vector3;

use crate::dof::Dofs;
use crate::error::{TranslationError, TranslationResult};

pub use cells::{Cell, CellData, CellStorage, CellType};
pub use csys::{
    Basis, CoordinateSystem, CoordinateSystemKind, CoordinateSystemStorage,
    CoordinateSystemType, GLOBAL_CS_ID, GLOBAL_CS_POSITION,
};
pub use groups::{assign_families, CellGroup, Family, FamilyAssignment, Group, NodeGroup};
pub use nodes::{Node, NodeData, NodeStorage};

/// Geometric storage of one model
#[derive(Debug)]
pub struct Mesh {
    pub name: String,
    nodes: NodeStorage,
    cells: CellStorage,
    csys: CoordinateSystemStorage,
    groups: BTreeMap<String, Group>,
    finished: bool,
}

impl Mesh {
    pub fn new(name: &str) -> Mesh {
        Mesh {
            name: name.to_string(),
            nodes: NodeStorage::new(),
            cells: CellStorage::new(),
            csys: CoordinateSystemStorage::new(),
            groups: BTreeMap::new(),
            finished: false,
        }
    }

    // ========================
    // Nodes
    // ========================

    /// Position of a node id, reserving a position if the id is new. The
    /// reservation lets a referencing entity be built before the node's
    /// geometry line is parsed.
    pub fn find_or_reserve_node(&mut self, id: u32) -> usize {
        self.nodes.find_or_reserve(id)
    }

    /// Positions of several node ids, reserving the unknown ones
    pub fn find_or_reserve_nodes(&mut self, ids: &[u32]) -> Vec<usize> {
        ids.iter().map(|&id| self.nodes.find_or_reserve(id)).collect()
    }

    /// Define a node in the global coordinate system
    pub fn add_node(&mut self, id: u32, x: f64, y: f64, z: f64) -> usize {
        self.nodes.define(id, x, y, z, GLOBAL_CS_POSITION)
    }

    /// Define a node with its coordinates expressed in a local system
    pub fn add_node_in_cs(&mut self, id: u32, x: f64, y: f64, z: f64, cs_pos: usize) -> usize {
        self.nodes.define(id, x, y, z, cs_pos)
    }

    /// Define a synthetic node with a mesh-assigned id
    pub fn add_auto_node(&mut self, x: f64, y: f64, z: f64) -> usize {
        let id = self.nodes.auto_id();
        self.nodes.define(id, x, y, z, GLOBAL_CS_POSITION)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, position: usize) -> Option<Node> {
        self.nodes.node(position)
    }

    pub fn node_position(&self, id: u32) -> Option<usize> {
        self.nodes.position(id)
    }

    pub fn node_id(&self, position: usize) -> Option<u32> {
        self.nodes.id_at(position)
    }

    /// Union in the degrees of freedom some element supplies at a position
    pub fn allow_dofs(&mut self, position: usize, dofs: Dofs) {
        self.nodes.allow_dofs(position, dofs);
    }

    pub fn node_dofs(&self, position: usize) -> Dofs {
        self.nodes.dofs(position)
    }

    pub fn nodes(&self) -> &NodeStorage {
        &self.nodes
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut NodeStorage {
        &mut self.nodes
    }

    // ========================
    // Cells
    // ========================

    /// Add a cell from deck node ids, reserving any node not yet defined.
    /// `id` of `None` takes a mesh-assigned id.
    pub fn add_cell(
        &mut self,
        id: Option<u32>,
        cell_type: CellType,
        node_ids: &[u32],
        is_virtual: bool,
        cs_pos: Option<usize>,
    ) -> usize {
        let node_positions = self.find_or_reserve_nodes(node_ids);
        let id = id.unwrap_or_else(|| self.cells.auto_id());
        self.cells
            .add(id, cell_type, &node_positions, is_virtual, cs_pos)
    }

    /// Add a cell directly from node positions (pipeline-created cells)
    pub fn add_cell_from_positions(
        &mut self,
        cell_type: CellType,
        node_positions: &[usize],
        is_virtual: bool,
    ) -> usize {
        let id = self.cells.auto_id();
        self.cells.add(id, cell_type, node_positions, is_virtual, None)
    }

    /// Materialize a boundary cell (point/segment/face) over existing node
    /// positions, as needed by skin derivation and boundary targets
    pub fn generate_skin_cell(&mut self, node_positions: &[usize]) -> TranslationResult<usize> {
        let cell_type = CellType::from_boundary_node_count(node_positions.len()).ok_or_else(
            || {
                TranslationError::InvalidGeometry(format!(
                    "a boundary cell takes 1 to 4 nodes, got {}",
                    node_positions.len()
                ))
            },
        )?;
        Ok(self.add_cell_from_positions(cell_type, node_positions, true))
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn cell(&self, position: usize) -> Option<Cell> {
        self.cells.cell(position)
    }

    pub fn cell_position(&self, id: u32) -> Option<usize> {
        self.cells.position(id)
    }

    pub fn has_cell(&self, id: u32) -> bool {
        self.cells.contains(id)
    }

    /// Record which element set owns a cell
    pub fn assign_element_set(&mut self, cell_position: usize, element_set_id: u32) {
        self.cells.assign_element_set(cell_position, element_set_id);
    }

    pub fn cells(&self) -> &CellStorage {
        &self.cells
    }

    // ========================
    // Groups
    // ========================

    /// Create a node group; a no-op when the name already names one
    pub fn find_or_create_node_group(
        &mut self,
        name: &str,
        original_id: Option<u32>,
        comment: &str,
    ) -> &mut NodeGroup {
        let entry = self
            .groups
            .entry(name.to_string())
            .or_insert_with(|| Group::Node(NodeGroup::new(name, original_id, comment)));
        match entry {
            Group::Node(group) => group,
            Group::Cell(_) => panic!("group {name} already exists as a cell group"),
        }
    }

    /// Create a cell group; a no-op when the name already names one
    pub fn find_or_create_cell_group(
        &mut self,
        name: &str,
        original_id: Option<u32>,
        comment: &str,
    ) -> &mut CellGroup {
        let entry = self
            .groups
            .entry(name.to_string())
            .or_insert_with(|| Group::Cell(CellGroup::new(name, original_id, comment)));
        match entry {
            Group::Cell(group) => group,
            Group::Node(_) => panic!("group {name} already exists as a node group"),
        }
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    pub fn node_group(&self, name: &str) -> Option<&NodeGroup> {
        match self.groups.get(name) {
            Some(Group::Node(group)) => Some(group),
            _ => None,
        }
    }

    pub fn cell_group(&self, name: &str) -> Option<&CellGroup> {
        match self.groups.get(name) {
            Some(Group::Cell(group)) => Some(group),
            _ => None,
        }
    }

    pub fn cell_group_mut(&mut self, name: &str) -> Option<&mut CellGroup> {
        match self.groups.get_mut(name) {
            Some(Group::Cell(group)) => Some(group),
            _ => None,
        }
    }

    pub fn node_group_mut(&mut self, name: &str) -> Option<&mut NodeGroup> {
        match self.groups.get_mut(name) {
            Some(Group::Node(group)) => Some(group),
            _ => None,
        }
    }

    /// Remove the group with this name; does nothing if it does not exist
    pub fn remove_group(&mut self, name: &str) {
        self.groups.remove(name);
    }

    pub fn rename_group(&mut self, old_name: &str, new_name: &str) {
        if let Some(mut group) = self.groups.remove(old_name) {
            match &mut group {
                Group::Node(g) => g.name = new_name.to_string(),
                Group::Cell(g) => g.name = new_name.to_string(),
            }
            self.groups.insert(new_name.to_string(), group);
        }
    }

    /// Find a group by the id the source deck gave it
    pub fn group_by_original_id(&self, original_id: u32) -> Option<&Group> {
        self.groups
            .values()
            .find(|group| group.original_id() == Some(original_id))
    }

    pub fn node_groups(&self) -> impl Iterator<Item = &NodeGroup> {
        self.groups.values().filter_map(|group| match group {
            Group::Node(g) => Some(g),
            Group::Cell(_) => None,
        })
    }

    pub fn cell_groups(&self) -> impl Iterator<Item = &CellGroup> {
        self.groups.values().filter_map(|group| match group {
            Group::Cell(g) => Some(g),
            Group::Node(_) => None,
        })
    }

    /// Node positions covered by a cell group
    pub fn cell_group_node_positions(&self, name: &str) -> Vec<usize> {
        let mut positions = std::collections::BTreeSet::new();
        if let Some(group) = self.cell_group(name) {
            for cell_position in group.cell_positions() {
                if let Some(cell) = self.cells.cell(cell_position) {
                    positions.extend(cell.node_positions);
                }
            }
        }
        positions.into_iter().collect()
    }

    /// Minimal stable family encoding of node group memberships
    pub fn node_families(&self) -> FamilyAssignment {
        let names: Vec<String> = self.node_groups().map(|g| g.name.clone()).collect();
        assign_families(names.iter().map(|s| s.as_str()), |name| {
            self.node_group(name)
                .map(|g| g.node_positions().collect())
                .unwrap_or_default()
        })
    }

    /// Minimal stable family encoding of cell group memberships
    pub fn cell_families(&self) -> FamilyAssignment {
        let names: Vec<String> = self.cell_groups().map(|g| g.name.clone()).collect();
        assign_families(names.iter().map(|s| s.as_str()), |name| {
            self.cell_group(name)
                .map(|g| g.cell_positions().collect())
                .unwrap_or_default()
        })
    }

    // ========================
    // Coordinate systems
    // ========================

    /// Position of a coordinate-system deck id, reserving one if unknown
    pub fn find_or_reserve_csys(&mut self, original_id: u32) -> usize {
        self.csys.find_or_reserve(original_id)
    }

    pub fn add_csys(&mut self, cs: CoordinateSystem) -> usize {
        self.csys.add(cs)
    }

    /// Position of an orientation definition, reusing an identical one
    pub fn add_or_find_orientation(
        &mut self,
        origin_node: u32,
        axis_node: u32,
        plane_node: u32,
    ) -> usize {
        self.csys
            .add_or_find_orientation(origin_node, axis_node, plane_node)
    }

    pub fn csys(&self, position: usize) -> Option<&CoordinateSystem> {
        self.csys.get(position)
    }

    pub fn csys_storage(&self) -> &CoordinateSystemStorage {
        &self.csys
    }

    /// Materialize every implicit coordinate-system definition into a
    /// concrete basis. Degenerate or unresolvable definitions are fatal.
    pub fn build_coordinate_systems(&mut self) -> TranslationResult<()> {
        let nodes = &self.nodes;
        for position in self.csys.positions() {
            if let Some(cs) = self.csys.get_mut(position) {
                cs.build(|id| {
                    nodes
                        .position(id)
                        .and_then(|p| nodes.node(p))
                        .map(|n| Vector3::new(n.x, n.y, n.z))
                })?;
            }
        }
        Ok(())
    }

    // ========================
    // Lifecycle
    // ========================

    pub fn finish(&mut self) {
        self.finished = true;
        debug!(
            "mesh {} finished: {} nodes, {} cells",
            self.name,
            self.nodes.len(),
            self.cells.len()
        );
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Structural validity: every reservation defined, every coordinate
    /// system present. Checks everything before answering.
    pub fn validate(&self) -> bool {
        let nodes_ok = self.nodes.validate();
        let csys_ok = self.csys.validate();
        nodes_ok && csys_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_creation_reserves_forward_nodes() {
        let mut mesh = Mesh::new("test");
        mesh.add_node(1, 0.0, 0.0, 0.0);
        let cell_position = mesh.add_cell(Some(10), CellType::Seg2, &[1, 2], false, None);
        // node 2 was never defined: reserved, so the mesh does not validate
        assert!(!mesh.validate());
        mesh.add_node(2, 1.0, 0.0, 0.0);
        assert!(mesh.validate());
        let cell = mesh.cell(cell_position).unwrap();
        assert_eq!(cell.node_positions.len(), 2);
        assert_eq!(mesh.node_id(cell.node_positions[1]), Some(2));
    }

    #[test]
    fn test_skin_cell_types() {
        let mut mesh = Mesh::new("test");
        let positions: Vec<usize> = (1..=4).map(|i| mesh.add_node(i, 0.0, 0.0, 0.0)).collect();
        let tri = mesh.generate_skin_cell(&positions[..3]).unwrap();
        let quad = mesh.generate_skin_cell(&positions[..4]).unwrap();
        assert_eq!(mesh.cell(tri).unwrap().cell_type, CellType::Tri3);
        assert_eq!(mesh.cell(quad).unwrap().cell_type, CellType::Quad4);
        assert!(mesh.cell(tri).unwrap().is_virtual);
        assert!(mesh.generate_skin_cell(&[0, 1, 2, 3, 0]).is_err());
    }

    #[test]
    fn test_group_node_positions_through_cells() {
        let mut mesh = Mesh::new("test");
        mesh.add_node(1, 0.0, 0.0, 0.0);
        mesh.add_node(2, 1.0, 0.0, 0.0);
        mesh.add_node(3, 2.0, 0.0, 0.0);
        let c1 = mesh.add_cell(None, CellType::Seg2, &[1, 2], false, None);
        let c2 = mesh.add_cell(None, CellType::Seg2, &[2, 3], false, None);
        let group = mesh.find_or_create_cell_group("beams", None, "");
        group.add_cell_position(c1);
        group.add_cell_position(c2);
        assert_eq!(mesh.cell_group_node_positions("beams"), vec![0, 1, 2]);
    }

    #[test]
    fn test_build_coordinate_systems() {
        let mut mesh = Mesh::new("test");
        mesh.add_node(1, 0.0, 0.0, 0.0);
        mesh.add_node(2, 1.0, 0.0, 0.0);
        mesh.add_node(3, 0.0, 1.0, 0.0);
        let position = mesh.add_or_find_orientation(1, 2, 3);
        assert!(mesh.csys(position).unwrap().basis().is_none());
        mesh.build_coordinate_systems().unwrap();
        assert!(mesh.csys(position).unwrap().basis().is_some());
    }

    #[test]
    fn test_finish_flag() {
        let mut mesh = Mesh::new("test");
        assert!(!mesh.is_finished());
        mesh.finish();
        assert!(mesh.is_finished());
    }
}
