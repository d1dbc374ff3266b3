//! Coordinate systems
//!
//! Definitions arrive in two flavors: concrete (an origin and basis, or a
//! cylindrical axis) and implicit (an orientation given by reference nodes).
//! Implicit definitions are materialized into orthonormal bases by the
//! pipeline before anything consumes them.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{TranslationError, TranslationResult};
use crate::reference::{Identifiable, Identity};

/// Position of the implicit global cartesian system
pub const GLOBAL_CS_POSITION: usize = 0;

/// Deck id of the implicit global cartesian system
pub const GLOBAL_CS_ID: u32 = 0;

/// Closed subtype enumeration for coordinate systems
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CoordinateSystemType {
    Cartesian,
    Cylindrical,
    Orientation,
}

/// A concrete origin and orthonormal basis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Basis {
    pub origin: Vector3<f64>,
    pub ex: Vector3<f64>,
    pub ey: Vector3<f64>,
    pub ez: Vector3<f64>,
}

impl Basis {
    /// The global cartesian basis
    pub fn global() -> Basis {
        Basis {
            origin: Vector3::zeros(),
            ex: Vector3::x(),
            ey: Vector3::y(),
            ez: Vector3::z(),
        }
    }

    /// Build an orthonormal basis from an origin, a point on the X axis and
    /// a point in the XY plane
    pub fn from_points(
        origin: Vector3<f64>,
        axis_point: Vector3<f64>,
        plane_point: Vector3<f64>,
    ) -> TranslationResult<Basis> {
        let ex = axis_point - origin;
        if ex.norm() <= f64::EPSILON {
            return Err(TranslationError::InvalidGeometry(
                "coordinate system axis point coincides with its origin".to_string(),
            ));
        }
        let ex = ex.normalize();
        let in_plane = plane_point - origin;
        let ez = ex.cross(&in_plane);
        if ez.norm() <= f64::EPSILON {
            return Err(TranslationError::InvalidGeometry(
                "coordinate system plane point is collinear with its axis".to_string(),
            ));
        }
        let ez = ez.normalize();
        let ey = ez.cross(&ex);
        Ok(Basis { origin, ex, ey, ez })
    }
}

/// Payload of one coordinate system
#[derive(Debug, Clone)]
pub enum CoordinateSystemKind {
    /// Concrete cartesian basis
    Cartesian(Basis),
    /// Cylindrical system: origin, axis direction and a point fixing the
    /// angular reference
    Cylindrical {
        origin: Vector3<f64>,
        axis: Vector3<f64>,
        reference: Vector3<f64>,
        built: Option<Basis>,
    },
    /// Orientation defined by three reference nodes, materialized into a
    /// basis by the pipeline
    Orientation {
        origin_node: u32,
        axis_node: u32,
        plane_node: u32,
        built: Option<Basis>,
    },
}

/// A coordinate system entity
#[derive(Debug, Clone)]
pub struct CoordinateSystem {
    ident: Identity,
    pub kind: CoordinateSystemKind,
}

impl CoordinateSystem {
    pub fn cartesian(original_id: Option<u32>, basis: Basis) -> CoordinateSystem {
        CoordinateSystem {
            ident: Identity::new(original_id),
            kind: CoordinateSystemKind::Cartesian(basis),
        }
    }

    pub fn cylindrical(
        original_id: Option<u32>,
        origin: Vector3<f64>,
        axis: Vector3<f64>,
        reference: Vector3<f64>,
    ) -> CoordinateSystem {
        CoordinateSystem {
            ident: Identity::new(original_id),
            kind: CoordinateSystemKind::Cylindrical {
                origin,
                axis,
                reference,
                built: None,
            },
        }
    }

    pub fn orientation(
        original_id: Option<u32>,
        origin_node: u32,
        axis_node: u32,
        plane_node: u32,
    ) -> CoordinateSystem {
        CoordinateSystem {
            ident: Identity::new(original_id),
            kind: CoordinateSystemKind::Orientation {
                origin_node,
                axis_node,
                plane_node,
                built: None,
            },
        }
    }

    /// The materialized basis, if building already happened (cartesian
    /// systems are always materialized)
    pub fn basis(&self) -> Option<&Basis> {
        match &self.kind {
            CoordinateSystemKind::Cartesian(basis) => Some(basis),
            CoordinateSystemKind::Cylindrical { built, .. } => built.as_ref(),
            CoordinateSystemKind::Orientation { built, .. } => built.as_ref(),
        }
    }

    /// Materialize the definition into a concrete basis. `node_coords`
    /// resolves a reference node id to its coordinates.
    pub fn build<F>(&mut self, node_coords: F) -> TranslationResult<()>
    where
        F: Fn(u32) -> Option<Vector3<f64>>,
    {
        match &mut self.kind {
            CoordinateSystemKind::Cartesian(_) => Ok(()),
            CoordinateSystemKind::Cylindrical {
                origin,
                axis,
                reference,
                built,
            } => {
                let basis = Basis::from_points(*origin, *origin + *axis, *reference)?;
                *built = Some(basis);
                Ok(())
            }
            CoordinateSystemKind::Orientation {
                origin_node,
                axis_node,
                plane_node,
                built,
            } => {
                let resolve = |id: u32| {
                    node_coords(id).ok_or_else(|| TranslationError::UnresolvedReference {
                        kind: "Node",
                        reference: format!("node id {id} of an orientation coordinate system"),
                    })
                };
                let origin = resolve(*origin_node)?;
                let axis = resolve(*axis_node)?;
                let plane = resolve(*plane_node)?;
                *built = Some(Basis::from_points(origin, axis, plane)?);
                Ok(())
            }
        }
    }
}

impl Identifiable for CoordinateSystem {
    type Type = CoordinateSystemType;
    const KIND: &'static str = "CoordinateSystem";

    fn ident(&self) -> &Identity {
        &self.ident
    }

    fn ident_mut(&mut self) -> &mut Identity {
        &mut self.ident
    }

    fn subtype(&self) -> CoordinateSystemType {
        match self.kind {
            CoordinateSystemKind::Cartesian(_) => CoordinateSystemType::Cartesian,
            CoordinateSystemKind::Cylindrical { .. } => CoordinateSystemType::Cylindrical,
            CoordinateSystemKind::Orientation { .. } => CoordinateSystemType::Orientation,
        }
    }
}

#[derive(Debug)]
enum Slot {
    /// Position allocated for a deck id whose definition has not arrived yet
    Reserved { original_id: u32 },
    Present(CoordinateSystem),
}

/// Position-handle storage for coordinate systems, with reservation support
#[derive(Debug)]
pub struct CoordinateSystemStorage {
    slots: Vec<Slot>,
    position_by_id: BTreeMap<u32, usize>,
    next_internal_id: u32,
}

impl Default for CoordinateSystemStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinateSystemStorage {
    /// Storage seeded with the global cartesian system at position 0
    pub fn new() -> CoordinateSystemStorage {
        let mut storage = CoordinateSystemStorage {
            slots: Vec::new(),
            position_by_id: BTreeMap::new(),
            next_internal_id: 0,
        };
        let global = CoordinateSystem::cartesian(Some(GLOBAL_CS_ID), Basis::global());
        let position = storage.place(global);
        debug_assert_eq!(position, GLOBAL_CS_POSITION);
        storage.position_by_id.insert(GLOBAL_CS_ID, position);
        storage
    }

    fn place(&mut self, mut cs: CoordinateSystem) -> usize {
        cs.ident_mut().assign(self.next_internal_id);
        self.next_internal_id += 1;
        self.slots.push(Slot::Present(cs));
        self.slots.len() - 1
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Position of a deck id, allocating a reservation if the id is new
    pub fn find_or_reserve(&mut self, original_id: u32) -> usize {
        if let Some(&position) = self.position_by_id.get(&original_id) {
            return position;
        }
        let position = self.slots.len();
        self.slots.push(Slot::Reserved { original_id });
        self.position_by_id.insert(original_id, position);
        position
    }

    /// Add a defined coordinate system, filling its reservation when the
    /// deck referenced it beforehand
    pub fn add(&mut self, mut cs: CoordinateSystem) -> usize {
        match cs.ident().original_id() {
            Some(original_id) => {
                if let Some(&position) = self.position_by_id.get(&original_id) {
                    cs.ident_mut().assign(self.next_internal_id);
                    self.next_internal_id += 1;
                    self.slots[position] = Slot::Present(cs);
                    position
                } else {
                    let position = self.place(cs);
                    self.position_by_id.insert(original_id, position);
                    position
                }
            }
            None => self.place(cs),
        }
    }

    /// Add an orientation definition, reusing the position of an identical
    /// one when it already exists
    pub fn add_or_find_orientation(
        &mut self,
        origin_node: u32,
        axis_node: u32,
        plane_node: u32,
    ) -> usize {
        for (position, slot) in self.slots.iter().enumerate() {
            if let Slot::Present(cs) = slot {
                if let CoordinateSystemKind::Orientation {
                    origin_node: o,
                    axis_node: a,
                    plane_node: p,
                    ..
                } = cs.kind
                {
                    if (o, a, p) == (origin_node, axis_node, plane_node) {
                        return position;
                    }
                }
            }
        }
        self.place(CoordinateSystem::orientation(
            None,
            origin_node,
            axis_node,
            plane_node,
        ))
    }

    pub fn position(&self, original_id: u32) -> Option<usize> {
        self.position_by_id.get(&original_id).copied()
    }

    pub fn get(&self, position: usize) -> Option<&CoordinateSystem> {
        match self.slots.get(position)? {
            Slot::Present(cs) => Some(cs),
            Slot::Reserved { .. } => None,
        }
    }

    pub fn get_mut(&mut self, position: usize) -> Option<&mut CoordinateSystem> {
        match self.slots.get_mut(position)? {
            Slot::Present(cs) => Some(cs),
            Slot::Reserved { .. } => None,
        }
    }

    /// Iterate defined systems with their positions
    pub fn iter(&self) -> impl Iterator<Item = (usize, &CoordinateSystem)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| match slot {
            Slot::Present(cs) => Some((i, cs)),
            Slot::Reserved { .. } => None,
        })
    }

    pub(crate) fn positions(&self) -> Vec<usize> {
        (0..self.slots.len()).collect()
    }

    /// False iff a reserved position was never defined
    pub fn validate(&self) -> bool {
        let mut valid = true;
        for slot in &self.slots {
            if let Slot::Reserved { original_id } = slot {
                valid = false;
                log::warn!(
                    "coordinate system id {original_id} has been referenced but never defined"
                );
            }
        }
        valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_basis_from_points_is_orthonormal() {
        let basis = Basis::from_points(
            Vector3::zeros(),
            Vector3::new(2.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
        )
        .unwrap();
        assert_relative_eq!(basis.ex.dot(&basis.ey), 0.0, epsilon = 1e-12);
        assert_relative_eq!(basis.ex.dot(&basis.ez), 0.0, epsilon = 1e-12);
        assert_relative_eq!(basis.ex.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(basis.ez.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(basis.ez, Vector3::z(), epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_definitions_fail() {
        assert!(Basis::from_points(Vector3::zeros(), Vector3::zeros(), Vector3::y()).is_err());
        assert!(Basis::from_points(
            Vector3::zeros(),
            Vector3::x(),
            Vector3::new(3.0, 0.0, 0.0)
        )
        .is_err());
    }

    #[test]
    fn test_reserve_then_define() {
        let mut storage = CoordinateSystemStorage::new();
        let reserved = storage.find_or_reserve(5);
        assert!(storage.get(reserved).is_none());
        assert!(!storage.validate());

        let defined = storage.add(CoordinateSystem::cartesian(Some(5), Basis::global()));
        assert_eq!(reserved, defined);
        assert!(storage.get(defined).is_some());
        assert!(storage.validate());
    }

    #[test]
    fn test_global_system_is_position_zero() {
        let storage = CoordinateSystemStorage::new();
        assert_eq!(storage.position(GLOBAL_CS_ID), Some(GLOBAL_CS_POSITION));
        assert!(storage.get(GLOBAL_CS_POSITION).unwrap().basis().is_some());
    }

    #[test]
    fn test_orientation_dedup() {
        let mut storage = CoordinateSystemStorage::new();
        let first = storage.add_or_find_orientation(1, 2, 3);
        let again = storage.add_or_find_orientation(1, 2, 3);
        let other = storage.add_or_find_orientation(1, 2, 4);
        assert_eq!(first, again);
        assert_ne!(first, other);
    }

    #[test]
    fn test_orientation_build_resolves_nodes() {
        let mut cs = CoordinateSystem::orientation(None, 1, 2, 3);
        let coords = |id: u32| match id {
            1 => Some(Vector3::zeros()),
            2 => Some(Vector3::x()),
            3 => Some(Vector3::new(0.5, 2.0, 0.0)),
            _ => None,
        };
        cs.build(coords).unwrap();
        assert!(cs.basis().is_some());

        let mut missing = CoordinateSystem::orientation(None, 1, 2, 9);
        assert!(missing.build(coords).is_err());
    }
}
