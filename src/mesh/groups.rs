//! Node and cell groups
//!
//! Groups are named, stable-ordered position sets owned by the mesh. The
//! family service encodes each position's combination of group memberships
//! as a small integer, for output formats without native multi-group
//! support.

use std::collections::{BTreeMap, BTreeSet};

/// A named set of node positions
#[derive(Debug, Clone)]
pub struct NodeGroup {
    pub name: String,
    /// Id given by the source deck, when it provided one
    pub original_id: Option<u32>,
    pub comment: String,
    node_positions: BTreeSet<usize>,
}

impl NodeGroup {
    pub fn new(name: &str, original_id: Option<u32>, comment: &str) -> NodeGroup {
        NodeGroup {
            name: name.to_string(),
            original_id,
            comment: comment.to_string(),
            node_positions: BTreeSet::new(),
        }
    }

    pub fn add_node_position(&mut self, position: usize) {
        self.node_positions.insert(position);
    }

    pub fn node_positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.node_positions.iter().copied()
    }

    pub fn contains(&self, position: usize) -> bool {
        self.node_positions.contains(&position)
    }

    pub fn len(&self) -> usize {
        self.node_positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_positions.is_empty()
    }
}

/// A named set of cell positions
#[derive(Debug, Clone)]
pub struct CellGroup {
    pub name: String,
    pub original_id: Option<u32>,
    pub comment: String,
    cell_positions: BTreeSet<usize>,
}

impl CellGroup {
    pub fn new(name: &str, original_id: Option<u32>, comment: &str) -> CellGroup {
        CellGroup {
            name: name.to_string(),
            original_id,
            comment: comment.to_string(),
            cell_positions: BTreeSet::new(),
        }
    }

    pub fn add_cell_position(&mut self, position: usize) {
        self.cell_positions.insert(position);
    }

    pub fn cell_positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.cell_positions.iter().copied()
    }

    pub fn contains(&self, position: usize) -> bool {
        self.cell_positions.contains(&position)
    }

    pub fn len(&self) -> usize {
        self.cell_positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_positions.is_empty()
    }
}

/// Either kind of group, as stored by the mesh under a unique name
#[derive(Debug, Clone)]
pub enum Group {
    Node(NodeGroup),
    Cell(CellGroup),
}

impl Group {
    pub fn name(&self) -> &str {
        match self {
            Group::Node(g) => &g.name,
            Group::Cell(g) => &g.name,
        }
    }

    pub fn original_id(&self) -> Option<u32> {
        match self {
            Group::Node(g) => g.original_id,
            Group::Cell(g) => g.original_id,
        }
    }
}

/// One family: a distinct combination of group memberships
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Family {
    /// Small positive integer id; 0 is implicitly "member of no group"
    pub id: u32,
    /// Names of the groups every position of this family belongs to, sorted
    pub group_names: Vec<String>,
}

/// Assignment of family ids to positions for a given group set
#[derive(Debug, Clone, Default)]
pub struct FamilyAssignment {
    pub families: Vec<Family>,
    family_by_position: BTreeMap<usize, u32>,
}

impl FamilyAssignment {
    /// Family id of a position; 0 when the position is in no group
    pub fn family_of(&self, position: usize) -> u32 {
        self.family_by_position.get(&position).copied().unwrap_or(0)
    }

    pub fn positions(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.family_by_position.iter().map(|(&p, &f)| (p, f))
    }
}

/// Compute the minimal stable family assignment for a set of groups.
///
/// Two positions share a family exactly when they belong to the same groups;
/// family ids are numbered from 1 in lexicographic order of the member group
/// name lists, so the assignment is reproducible for a given group set.
pub fn assign_families<'a, I, F>(groups: I, positions_of: F) -> FamilyAssignment
where
    I: IntoIterator<Item = &'a str>,
    F: Fn(&str) -> Vec<usize>,
{
    let mut memberships: BTreeMap<usize, BTreeSet<String>> = BTreeMap::new();
    for name in groups {
        for position in positions_of(name) {
            memberships
                .entry(position)
                .or_default()
                .insert(name.to_string());
        }
    }

    let mut combos: BTreeSet<Vec<String>> = BTreeSet::new();
    for combo in memberships.values() {
        combos.insert(combo.iter().cloned().collect());
    }

    let mut families = Vec::new();
    let mut id_by_combo: BTreeMap<Vec<String>, u32> = BTreeMap::new();
    for (index, combo) in combos.into_iter().enumerate() {
        let id = index as u32 + 1;
        id_by_combo.insert(combo.clone(), id);
        families.push(Family {
            id,
            group_names: combo,
        });
    }

    let family_by_position = memberships
        .into_iter()
        .map(|(position, combo)| {
            let combo: Vec<String> = combo.into_iter().collect();
            (position, id_by_combo[&combo])
        })
        .collect();

    FamilyAssignment {
        families,
        family_by_position,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(name: &str) -> Vec<usize> {
        match name {
            "left" => vec![0, 1, 2],
            "right" => vec![2, 3],
            "top" => vec![3],
            _ => vec![],
        }
    }

    #[test]
    fn test_families_are_minimal() {
        let assignment = assign_families(["left", "right", "top"], positions);
        // combinations: {left}, {left,right}, {right,top}
        assert_eq!(assignment.families.len(), 3);
        assert_eq!(assignment.family_of(0), assignment.family_of(1));
        assert_ne!(assignment.family_of(0), assignment.family_of(2));
        assert_ne!(assignment.family_of(2), assignment.family_of(3));
        assert_eq!(assignment.family_of(99), 0);
    }

    #[test]
    fn test_family_ids_are_stable() {
        let first = assign_families(["left", "right", "top"], positions);
        let second = assign_families(["top", "left", "right"], positions);
        for p in 0..4 {
            assert_eq!(first.family_of(p), second.family_of(p));
        }
    }

    #[test]
    fn test_group_membership_is_sorted() {
        let mut group = NodeGroup::new("g", None, "");
        group.add_node_position(5);
        group.add_node_position(1);
        group.add_node_position(5);
        let collected: Vec<usize> = group.node_positions().collect();
        assert_eq!(collected, vec![1, 5]);
    }
}
