//! Cell storage
//!
//! Cells are stored like nodes: a dense position-indexed record array plus a
//! sparse id index. Connectivity lives in one flat node-position list per
//! cell type, addressed by the cell's per-type sequence index.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Supported cell shapes
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum CellType {
    /// Single node
    Point1,
    /// 2-node segment
    Seg2,
    /// 3-node triangle
    Tri3,
    /// 4-node quadrilateral
    Quad4,
    /// 4-node tetrahedron
    Tetra4,
    /// 5-node pyramid
    Pyra5,
    /// 6-node pentahedron (wedge)
    Penta6,
    /// 8-node hexahedron
    Hexa8,
}

impl CellType {
    /// Number of nodes for this cell type
    pub fn node_count(self) -> usize {
        match self {
            CellType::Point1 => 1,
            CellType::Seg2 => 2,
            CellType::Tri3 => 3,
            CellType::Quad4 => 4,
            CellType::Tetra4 => 4,
            CellType::Pyra5 => 5,
            CellType::Penta6 => 6,
            CellType::Hexa8 => 8,
        }
    }

    /// Spatial dimension of the shape
    pub fn dimension(self) -> usize {
        match self {
            CellType::Point1 => 0,
            CellType::Seg2 => 1,
            CellType::Tri3 | CellType::Quad4 => 2,
            CellType::Tetra4 | CellType::Pyra5 | CellType::Penta6 | CellType::Hexa8 => 3,
        }
    }

    /// Boundary faces of a volume cell as local node indices; empty for
    /// shapes of dimension below 3
    pub fn faces(self) -> &'static [&'static [usize]] {
        match self {
            CellType::Tetra4 => &[&[0, 2, 1], &[0, 1, 3], &[1, 2, 3], &[0, 3, 2]],
            CellType::Pyra5 => &[
                &[0, 3, 2, 1],
                &[0, 1, 4],
                &[1, 2, 4],
                &[2, 3, 4],
                &[3, 0, 4],
            ],
            CellType::Penta6 => &[
                &[0, 2, 1],
                &[3, 4, 5],
                &[0, 1, 4, 3],
                &[1, 2, 5, 4],
                &[2, 0, 3, 5],
            ],
            CellType::Hexa8 => &[
                &[0, 3, 2, 1],
                &[4, 5, 6, 7],
                &[0, 1, 5, 4],
                &[1, 2, 6, 5],
                &[2, 3, 7, 6],
                &[3, 0, 4, 7],
            ],
            _ => &[],
        }
    }

    /// Surface or line cell type with the given node count, used to
    /// materialize skin faces and boundary targets
    pub fn from_boundary_node_count(count: usize) -> Option<CellType> {
        match count {
            1 => Some(CellType::Point1),
            2 => Some(CellType::Seg2),
            3 => Some(CellType::Tri3),
            4 => Some(CellType::Quad4),
            _ => None,
        }
    }
}

/// Per-position cell record
#[derive(Debug, Clone)]
pub struct CellData {
    /// Deck-meaningful cell id
    pub id: u32,
    pub cell_type: CellType,
    /// True for cells materialized by the pipeline rather than the deck
    pub is_virtual: bool,
    /// Internal id of the owning element set, once assigned
    pub element_set_id: Option<u32>,
    /// Position of the local coordinate system, if any
    pub cs_pos: Option<usize>,
    /// Sequence index inside the flat connectivity list of this cell type
    pub type_index: usize,
}

/// Copyable view of one cell with its resolved connectivity
#[derive(Debug, Clone)]
pub struct Cell {
    pub position: usize,
    pub id: u32,
    pub cell_type: CellType,
    pub node_positions: Vec<usize>,
    pub is_virtual: bool,
    pub element_set_id: Option<u32>,
    pub cs_pos: Option<usize>,
}

/// Dense position-indexed cell array with a sparse id index
#[derive(Debug, Default)]
pub struct CellStorage {
    cell_data: Vec<CellData>,
    position_by_id: BTreeMap<u32, usize>,
    node_positions_by_type: BTreeMap<CellType, Vec<usize>>,
    next_auto_id: u32,
}

impl CellStorage {
    pub fn new() -> CellStorage {
        CellStorage {
            cell_data: Vec::new(),
            position_by_id: BTreeMap::new(),
            node_positions_by_type: BTreeMap::new(),
            next_auto_id: u32::MAX,
        }
    }

    pub fn len(&self) -> usize {
        self.position_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.position_by_id.is_empty()
    }

    pub fn position(&self, id: u32) -> Option<usize> {
        self.position_by_id.get(&id).copied()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.position_by_id.contains_key(&id)
    }

    /// A free id for a synthetic cell, counting down from the top of the id
    /// space
    pub fn auto_id(&mut self) -> u32 {
        while self.position_by_id.contains_key(&self.next_auto_id) {
            self.next_auto_id -= 1;
        }
        let id = self.next_auto_id;
        self.next_auto_id -= 1;
        id
    }

    /// Add a cell with resolved node positions, returning its position.
    ///
    /// Re-adding an existing id re-links the id to a fresh record; the old
    /// record stays allocated so other positions are unaffected.
    ///
    /// # Panics
    /// Panics if the connectivity length does not match the cell type.
    pub fn add(
        &mut self,
        id: u32,
        cell_type: CellType,
        node_positions: &[usize],
        is_virtual: bool,
        cs_pos: Option<usize>,
    ) -> usize {
        assert_eq!(
            node_positions.len(),
            cell_type.node_count(),
            "cell {id} of type {cell_type:?} takes {} nodes, got {}",
            cell_type.node_count(),
            node_positions.len()
        );
        let flat = self.node_positions_by_type.entry(cell_type).or_default();
        let type_index = flat.len() / cell_type.node_count();
        flat.extend_from_slice(node_positions);

        let position = self.cell_data.len();
        self.cell_data.push(CellData {
            id,
            cell_type,
            is_virtual,
            element_set_id: None,
            cs_pos,
            type_index,
        });
        self.position_by_id.insert(id, position);
        position
    }

    /// View of the cell at a position, if the position is live
    pub fn cell(&self, position: usize) -> Option<Cell> {
        let data = self.cell_data.get(position)?;
        if self.position_by_id.get(&data.id) != Some(&position) {
            return None;
        }
        let n = data.cell_type.node_count();
        let flat = self.node_positions_by_type.get(&data.cell_type)?;
        let offset = data.type_index * n;
        Some(Cell {
            position,
            id: data.id,
            cell_type: data.cell_type,
            node_positions: flat[offset..offset + n].to_vec(),
            is_virtual: data.is_virtual,
            element_set_id: data.element_set_id,
            cs_pos: data.cs_pos,
        })
    }

    pub fn assign_element_set(&mut self, position: usize, element_set_id: u32) {
        if let Some(data) = self.cell_data.get_mut(position) {
            data.element_set_id = Some(element_set_id);
        }
    }

    /// Iterate live cells in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = Cell> + '_ {
        self.position_by_id
            .values()
            .filter_map(move |&position| self.cell(position))
    }

    /// Cell types present, in a stable order
    pub fn cell_types(&self) -> Vec<CellType> {
        self.node_positions_by_type.keys().copied().collect()
    }

    /// Number of cells of one type, dead records included
    pub fn count_of_type(&self, cell_type: CellType) -> usize {
        self.node_positions_by_type
            .get(&cell_type)
            .map(|flat| flat.len() / cell_type.node_count())
            .unwrap_or(0)
    }

    /// Raw dense records, for position-indexed output adapters
    pub fn cell_data(&self) -> &[CellData] {
        &self.cell_data
    }
}
