//! Node storage
//!
//! Node data lives in a dense array indexed by position; a sparse map takes
//! the deck-meaningful node id to its position. A position can be reserved
//! for an id before the node's geometry is known, which lets referencing
//! entities be built ahead of the node definition line.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};

use crate::dof::Dofs;

/// Per-position node record
#[derive(Debug, Clone)]
pub struct NodeData {
    /// Deck-meaningful node id
    pub id: u32,
    /// Union of the degrees of freedom some element supplies at this node
    pub dofs: Dofs,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Position of the coordinate system the coordinates are expressed in
    pub cs_pos: usize,
}

/// Copyable view of one node
#[derive(Debug, Clone, Copy)]
pub struct Node {
    pub position: usize,
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub dofs: Dofs,
    pub cs_pos: usize,
}

/// Dense position-indexed node array with a sparse id index
#[derive(Debug, Default)]
pub struct NodeStorage {
    node_data: Vec<NodeData>,
    position_by_id: BTreeMap<u32, usize>,
    reserved: BTreeSet<usize>,
    next_auto_id: u32,
}

impl NodeStorage {
    pub fn new() -> NodeStorage {
        NodeStorage {
            node_data: Vec::new(),
            position_by_id: BTreeMap::new(),
            reserved: BTreeSet::new(),
            next_auto_id: u32::MAX,
        }
    }

    pub fn len(&self) -> usize {
        self.position_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.position_by_id.is_empty()
    }

    /// Position of a node id, if the id is known (defined or reserved)
    pub fn position(&self, id: u32) -> Option<usize> {
        self.position_by_id.get(&id).copied()
    }

    /// Deck id stored at a position, if the position is live
    pub fn id_at(&self, position: usize) -> Option<u32> {
        let data = self.node_data.get(position)?;
        // a released reservation leaves a dead record behind
        if self.position_by_id.get(&data.id) == Some(&position) {
            Some(data.id)
        } else {
            None
        }
    }

    /// View of the node at a position; `None` for unknown or reserved
    /// positions
    pub fn node(&self, position: usize) -> Option<Node> {
        if self.reserved.contains(&position) {
            return None;
        }
        let data = self.node_data.get(position)?;
        self.id_at(position)?;
        Some(Node {
            position,
            id: data.id,
            x: data.x,
            y: data.y,
            z: data.z,
            dofs: data.dofs,
            cs_pos: data.cs_pos,
        })
    }

    /// Position of an id, allocating a reservation if the id is new
    pub fn find_or_reserve(&mut self, id: u32) -> usize {
        if let Some(position) = self.position(id) {
            return position;
        }
        let position = self.node_data.len();
        self.node_data.push(NodeData {
            id,
            dofs: Dofs::NONE,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            cs_pos: 0,
        });
        self.position_by_id.insert(id, position);
        self.reserved.insert(position);
        position
    }

    /// Define a node, filling its reservation if one exists or overwriting
    /// the previous definition in place (idempotent re-definition)
    pub fn define(&mut self, id: u32, x: f64, y: f64, z: f64, cs_pos: usize) -> usize {
        let position = self.find_or_reserve(id);
        let data = &mut self.node_data[position];
        data.x = x;
        data.y = y;
        data.z = z;
        data.cs_pos = cs_pos;
        self.reserved.remove(&position);
        position
    }

    /// A free id for a synthetic node, counting down from the top of the id
    /// space to stay clear of deck ids
    pub fn auto_id(&mut self) -> u32 {
        while self.position_by_id.contains_key(&self.next_auto_id) {
            self.next_auto_id -= 1;
        }
        let id = self.next_auto_id;
        self.next_auto_id -= 1;
        id
    }

    /// Monotonic union of the degrees of freedom supplied at a position;
    /// never retracts
    pub fn allow_dofs(&mut self, position: usize, dofs: Dofs) {
        if let Some(data) = self.node_data.get_mut(position) {
            data.dofs += dofs;
        }
    }

    pub fn dofs(&self, position: usize) -> Dofs {
        self.node_data
            .get(position)
            .map(|d| d.dofs)
            .unwrap_or(Dofs::NONE)
    }

    pub fn is_reserved(&self, position: usize) -> bool {
        self.reserved.contains(&position)
    }

    pub fn reserved_positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.reserved.iter().copied()
    }

    /// Unregister a reservation that nothing ended up using. The position
    /// stays allocated so that other positions remain stable, but the id is
    /// freed and validation no longer counts it.
    pub fn release_reservation(&mut self, position: usize) {
        if !self.reserved.remove(&position) {
            return;
        }
        let id = self.node_data[position].id;
        if self.position_by_id.get(&id) == Some(&position) {
            self.position_by_id.remove(&id);
        }
        debug!("released unused node reservation id {id} at position {position}");
    }

    /// Iterate live nodes in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = Node> + '_ {
        self.position_by_id.iter().filter_map(move |(&id, &position)| {
            let data = &self.node_data[position];
            if self.reserved.contains(&position) {
                return None;
            }
            Some(Node {
                position,
                id,
                x: data.x,
                y: data.y,
                z: data.z,
                dofs: data.dofs,
                cs_pos: data.cs_pos,
            })
        })
    }

    /// Every known position with its id, reservations included
    pub fn positions(&self) -> impl Iterator<Item = (u32, usize)> + '_ {
        self.position_by_id.iter().map(|(&id, &pos)| (id, pos))
    }

    pub fn min_id(&self) -> Option<u32> {
        self.position_by_id.keys().next().copied()
    }

    pub fn max_id(&self) -> Option<u32> {
        self.position_by_id.keys().next_back().copied()
    }

    /// Raw dense records, for position-indexed output adapters
    pub fn node_data(&self) -> &[NodeData] {
        &self.node_data
    }

    /// False iff a reserved position was never defined. Checks and reports
    /// every offender, never stops at the first.
    pub fn validate(&self) -> bool {
        let mut valid = true;
        for &position in &self.reserved {
            valid = false;
            warn!(
                "node id {} at position {} has been reserved but never defined",
                self.node_data[position].id, position
            );
        }
        if valid {
            debug!("all reserved nodes have been defined");
        }
        valid
    }
}
