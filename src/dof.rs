//! Degree-of-freedom algebra
//!
//! A closed 6-valued domain (three translations, three rotations) and a
//! bitset over it. The bit layout doubles as an interchange code at the
//! parsing/writing boundary and must never change.

use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{TranslationError, TranslationResult};

/// A single degree of freedom of a 3D structural node
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Dof {
    /// Translation along X
    Dx,
    /// Translation along Y
    Dy,
    /// Translation along Z
    Dz,
    /// Rotation about X
    Rx,
    /// Rotation about Y
    Ry,
    /// Rotation about Z
    Rz,
}

impl Dof {
    /// All six degrees of freedom, in position order
    pub const ALL: [Dof; 6] = [Dof::Dx, Dof::Dy, Dof::Dz, Dof::Rx, Dof::Ry, Dof::Rz];

    /// Bit mask of this degree of freedom (1, 2, 4, 8, 16, 32)
    pub fn code(self) -> u8 {
        1 << self.position()
    }

    /// Position index 0..=5
    pub fn position(self) -> usize {
        match self {
            Dof::Dx => 0,
            Dof::Dy => 1,
            Dof::Dz => 2,
            Dof::Rx => 3,
            Dof::Ry => 4,
            Dof::Rz => 5,
        }
    }

    /// Look a degree of freedom up by its position index
    ///
    /// # Panics
    /// Panics if `position` is not in 0..=5.
    pub fn from_position(position: usize) -> Dof {
        Dof::ALL[position]
    }

    /// True for DX, DY, DZ
    pub fn is_translation(self) -> bool {
        self.position() < 3
    }

    /// True for RX, RY, RZ
    pub fn is_rotation(self) -> bool {
        !self.is_translation()
    }

    /// Short uppercase label, e.g. "DX"
    pub fn label(self) -> &'static str {
        match self {
            Dof::Dx => "DX",
            Dof::Dy => "DY",
            Dof::Dz => "DZ",
            Dof::Rx => "RX",
            Dof::Ry => "RY",
            Dof::Rz => "RZ",
        }
    }
}

impl fmt::Display for Dof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A set of degrees of freedom, stored as a 6-bit bitset
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Dofs(u8);

impl Dofs {
    /// The empty set
    pub const NONE: Dofs = Dofs(0);
    /// DX, DY, DZ
    pub const TRANSLATIONS: Dofs = Dofs(0b000111);
    /// RX, RY, RZ
    pub const ROTATIONS: Dofs = Dofs(0b111000);
    /// All six degrees of freedom
    pub const ALL: Dofs = Dofs(0b111111);

    /// Build a set from individual flags, in position order
    pub fn combine(dx: bool, dy: bool, dz: bool, rx: bool, ry: bool, rz: bool) -> Dofs {
        let mut dofs = Dofs::NONE;
        for (flag, dof) in [dx, dy, dz, rx, ry, rz].into_iter().zip(Dof::ALL) {
            if flag {
                dofs += dof;
            }
        }
        dofs
    }

    /// Raw bit pattern, stable across versions
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Rebuild a set from its raw bit pattern
    ///
    /// # Panics
    /// Panics if bits outside the six valid positions are set.
    pub fn from_bits(bits: u8) -> Dofs {
        assert!(bits <= Dofs::ALL.0, "invalid dof bit pattern {bits:#x}");
        Dofs(bits)
    }

    /// Number of degrees of freedom in the set
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, dof: Dof) -> bool {
        self.0 & dof.code() != 0
    }

    /// True if every member of `other` is also in `self`
    pub fn contains_all(self, other: Dofs) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if at least one member of `other` is in `self`
    pub fn contains_any(self, other: Dofs) -> bool {
        self.0 & other.0 != 0
    }

    pub fn intersection(self, other: Dofs) -> Dofs {
        Dofs(self.0 & other.0)
    }

    /// Only the translation members
    pub fn translations(self) -> Dofs {
        self.intersection(Dofs::TRANSLATIONS)
    }

    /// Only the rotation members
    pub fn rotations(self) -> Dofs {
        self.intersection(Dofs::ROTATIONS)
    }

    /// Iterate members in position order
    pub fn iter(self) -> DofsIter {
        DofsIter {
            bits: self.0,
            position: 0,
        }
    }

    /// Numeric interchange code: the member digits 1..=6 concatenated in
    /// ascending order, e.g. {DX,DY,DZ} -> 123, {RZ} -> 6, {} -> 0
    pub fn to_numeric_code(self) -> u32 {
        self.iter()
            .fold(0, |code, dof| code * 10 + (dof.position() as u32 + 1))
    }

    /// Inverse of [`Dofs::to_numeric_code`] for every non-empty set.
    ///
    /// Code 0 is the legacy scalar-point convention and maps to {DX},
    /// not to the empty set.
    pub fn from_numeric_code(code: u32) -> TranslationResult<Dofs> {
        if code == 0 {
            return Ok(Dofs::from(Dof::Dx));
        }
        let mut remaining = code;
        let mut dofs = Dofs::NONE;
        while remaining != 0 {
            let digit = remaining % 10;
            remaining /= 10;
            if !(1..=6).contains(&digit) {
                return Err(TranslationError::InvalidDofCode(code));
            }
            dofs += Dof::from_position(digit as usize - 1);
        }
        Ok(dofs)
    }
}

impl From<Dof> for Dofs {
    fn from(dof: Dof) -> Dofs {
        Dofs(dof.code())
    }
}

impl Add for Dofs {
    type Output = Dofs;
    fn add(self, rhs: Dofs) -> Dofs {
        Dofs(self.0 | rhs.0)
    }
}

impl Add<Dof> for Dofs {
    type Output = Dofs;
    fn add(self, rhs: Dof) -> Dofs {
        Dofs(self.0 | rhs.code())
    }
}

impl Sub for Dofs {
    type Output = Dofs;
    fn sub(self, rhs: Dofs) -> Dofs {
        Dofs(self.0 & !rhs.0)
    }
}

impl Sub<Dof> for Dofs {
    type Output = Dofs;
    fn sub(self, rhs: Dof) -> Dofs {
        Dofs(self.0 & !rhs.code())
    }
}

impl AddAssign for Dofs {
    fn add_assign(&mut self, rhs: Dofs) {
        self.0 |= rhs.0;
    }
}

impl AddAssign<Dof> for Dofs {
    fn add_assign(&mut self, rhs: Dof) {
        self.0 |= rhs.code();
    }
}

impl SubAssign for Dofs {
    fn sub_assign(&mut self, rhs: Dofs) {
        self.0 &= !rhs.0;
    }
}

impl SubAssign<Dof> for Dofs {
    fn sub_assign(&mut self, rhs: Dof) {
        self.0 &= !rhs.code();
    }
}

impl IntoIterator for Dofs {
    type Item = Dof;
    type IntoIter = DofsIter;
    fn into_iter(self) -> DofsIter {
        self.iter()
    }
}

/// Position-ordered iterator over the members of a [`Dofs`]
#[derive(Debug, Clone)]
pub struct DofsIter {
    bits: u8,
    position: usize,
}

impl Iterator for DofsIter {
    type Item = Dof;

    fn next(&mut self) -> Option<Dof> {
        while self.position < 6 {
            let dof = Dof::from_position(self.position);
            self.position += 1;
            if self.bits & dof.code() != 0 {
                return Some(dof);
            }
        }
        None
    }
}

impl fmt::Display for Dofs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }
        let mut first = true;
        for dof in self.iter() {
            if !first {
                f.write_str("+")?;
            }
            first = false;
            f.write_str(dof.label())?;
        }
        Ok(())
    }
}

/// Small coefficient matrix between the degrees of freedom of a node pair
/// (or of one node with itself, on the diagonal of a direct matrix)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DofMatrix {
    symmetric: bool,
    components: BTreeMap<(Dof, Dof), f64>,
}

impl DofMatrix {
    pub fn new(symmetric: bool) -> DofMatrix {
        DofMatrix {
            symmetric,
            components: BTreeMap::new(),
        }
    }

    /// Store one coefficient. In symmetric mode the key is canonicalized so
    /// (d1, d2) and (d2, d1) address the same component.
    pub fn add_component(&mut self, dof1: Dof, dof2: Dof, value: f64) {
        let key = if self.symmetric && dof2 < dof1 {
            (dof2, dof1)
        } else {
            (dof1, dof2)
        };
        self.components.insert(key, value);
    }

    /// Coefficient for a dof pair, 0.0 if absent
    pub fn component(&self, dof1: Dof, dof2: Dof) -> f64 {
        let key = if self.symmetric && dof2 < dof1 {
            (dof2, dof1)
        } else {
            (dof1, dof2)
        };
        self.components.get(&key).copied().unwrap_or(0.0)
    }

    /// Deterministic iteration over the stored components
    pub fn components(&self) -> impl Iterator<Item = (&(Dof, Dof), &f64)> {
        self.components.iter()
    }

    pub fn is_symmetric(&self) -> bool {
        self.symmetric
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn has_translations(&self) -> bool {
        self.components
            .keys()
            .any(|(d1, d2)| d1.is_translation() || d2.is_translation())
    }

    pub fn has_rotations(&self) -> bool {
        self.components
            .keys()
            .any(|(d1, d2)| d1.is_rotation() || d2.is_rotation())
    }

    pub fn is_diagonal(&self) -> bool {
        self.components.keys().all(|(d1, d2)| d1 == d2)
    }

    /// Union of all dofs appearing on either side of a stored component
    pub fn dofs(&self) -> Dofs {
        let mut dofs = Dofs::NONE;
        for (d1, d2) in self.components.keys() {
            dofs += *d1;
            dofs += *d2;
        }
        dofs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_layout_is_frozen() {
        assert_eq!(Dof::Dx.code(), 1);
        assert_eq!(Dof::Dy.code(), 2);
        assert_eq!(Dof::Dz.code(), 4);
        assert_eq!(Dof::Rx.code(), 8);
        assert_eq!(Dof::Ry.code(), 16);
        assert_eq!(Dof::Rz.code(), 32);
        for (i, dof) in Dof::ALL.into_iter().enumerate() {
            assert_eq!(dof.position(), i);
            assert_eq!(Dof::from_position(i), dof);
        }
    }

    #[test]
    fn test_set_operations() {
        let fixed = Dofs::TRANSLATIONS + Dof::Rx;
        assert_eq!(fixed.len(), 4);
        assert!(fixed.contains(Dof::Dx));
        assert!(!fixed.contains(Dof::Rz));
        assert!(fixed.contains_all(Dofs::TRANSLATIONS));
        assert!(fixed.contains_any(Dofs::ROTATIONS));
        assert_eq!(fixed - Dofs::TRANSLATIONS, Dofs::from(Dof::Rx));
        assert_eq!(fixed.intersection(Dofs::ROTATIONS), Dofs::from(Dof::Rx));
        assert_eq!(Dofs::TRANSLATIONS + Dofs::ROTATIONS, Dofs::ALL);
    }

    #[test]
    fn test_iteration_is_position_ordered() {
        let dofs = Dofs::combine(true, false, true, false, false, true);
        let collected: Vec<Dof> = dofs.iter().collect();
        assert_eq!(collected, vec![Dof::Dx, Dof::Dz, Dof::Rz]);
    }

    #[test]
    fn test_numeric_code_round_trip_all_subsets() {
        for bits in 1u8..=0b111111 {
            let dofs = Dofs::from_bits(bits);
            let code = dofs.to_numeric_code();
            assert_eq!(Dofs::from_numeric_code(code).unwrap(), dofs);
        }
    }

    #[test]
    fn test_numeric_code_zero_is_scalar_point() {
        assert_eq!(
            Dofs::from_numeric_code(0).unwrap(),
            Dofs::from(Dof::Dx)
        );
    }

    #[test]
    fn test_numeric_code_examples() {
        assert_eq!(Dofs::TRANSLATIONS.to_numeric_code(), 123);
        assert_eq!(Dofs::ALL.to_numeric_code(), 123_456);
        assert_eq!(Dofs::from(Dof::Rz).to_numeric_code(), 6);
        assert!(Dofs::from_numeric_code(127).is_err());
    }

    #[test]
    fn test_dof_matrix_symmetric_lookup() {
        let mut m = DofMatrix::new(true);
        m.add_component(Dof::Dy, Dof::Dx, 42.0);
        assert_eq!(m.component(Dof::Dx, Dof::Dy), 42.0);
        assert_eq!(m.component(Dof::Dy, Dof::Dx), 42.0);
        assert_eq!(m.len(), 1);
        assert!(!m.is_diagonal());
        assert!(m.has_translations());
        assert!(!m.has_rotations());
    }

    #[test]
    fn test_dof_matrix_dofs_union() {
        let mut m = DofMatrix::new(false);
        m.add_component(Dof::Dx, Dof::Rz, 1.0);
        assert_eq!(m.dofs(), Dofs::from(Dof::Dx) + Dof::Rz);
    }
}
