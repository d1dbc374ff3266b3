//! Identity and cross-references
//!
//! Every model entity carries two identifiers: the id given by the source
//! deck (optional, immutable) and an internal id assigned by the owning
//! container at insertion (monotonic per kind, never reused). A
//! [`Reference`] carries both plus the entity's subtype tag and can be built
//! before the target entity exists.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Dual identity carried by every model entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    original_id: Option<u32>,
    id: Option<u32>,
}

impl Identity {
    /// Identity from an optional source-deck id; the internal id is
    /// assigned when the entity is added to its container
    pub fn new(original_id: Option<u32>) -> Identity {
        Identity {
            original_id,
            id: None,
        }
    }

    /// Identity of an entity created by the pipeline, not present in the
    /// source deck
    pub fn synthetic() -> Identity {
        Identity::new(None)
    }

    /// Was the entity present in the source deck?
    pub fn is_original(&self) -> bool {
        self.original_id.is_some()
    }

    pub fn original_id(&self) -> Option<u32> {
        self.original_id
    }

    /// Internal id of the entity
    ///
    /// # Panics
    /// Panics if the entity has not yet been added to a container.
    pub fn id(&self) -> u32 {
        self.id
            .expect("entity has not been added to a container yet")
    }

    pub(crate) fn id_opt(&self) -> Option<u32> {
        self.id
    }

    /// The id a human would use to name the entity: the source-deck id when
    /// there is one, the internal id otherwise
    pub fn best_id(&self) -> u32 {
        self.original_id.unwrap_or_else(|| self.id())
    }

    pub(crate) fn assign(&mut self, id: u32) {
        debug_assert!(self.id.is_none(), "internal id assigned twice");
        self.id = Some(id);
    }

    /// Drop both ids so a cloned entity can be re-added as a fresh one
    pub(crate) fn reset(&mut self) {
        self.id = None;
        self.original_id = None;
    }
}

/// Capability shared by every model entity kind
pub trait Identifiable {
    /// The closed subtype enumeration of this entity kind
    type Type: Copy + Eq + Ord + Hash + fmt::Debug;

    /// Kind name used in diagnostics, e.g. "Constraint"
    const KIND: &'static str;

    fn ident(&self) -> &Identity;
    fn ident_mut(&mut self) -> &mut Identity;
    fn subtype(&self) -> Self::Type;

    /// Structural self-check consulted by container validation
    fn validate(&self) -> bool {
        true
    }

    fn reference(&self) -> Reference<Self>
    where
        Self: Sized,
    {
        Reference {
            rtype: self.subtype(),
            original_id: self.ident().original_id(),
            id: self.ident().id_opt(),
        }
    }

    fn best_id(&self) -> u32 {
        self.ident().best_id()
    }
}

/// A cross-link to an entity: subtype tag plus either or both of its ids
///
/// Equality and ordering prefer the original id when both sides carry one of
/// the same subtype, and fall back to the internal id otherwise; a reference
/// with an original id always orders before a purely synthetic one.
pub struct Reference<T: Identifiable> {
    pub rtype: T::Type,
    pub original_id: Option<u32>,
    pub id: Option<u32>,
}

impl<T: Identifiable> Reference<T> {
    /// Forward reference to an entity of the given subtype and source-deck
    /// id that may not exist yet
    pub fn new(rtype: T::Type, original_id: u32) -> Reference<T> {
        Reference {
            rtype,
            original_id: Some(original_id),
            id: None,
        }
    }

    pub fn has_original_id(&self) -> bool {
        self.original_id.is_some()
    }

    pub fn has_id(&self) -> bool {
        self.id.is_some()
    }

    /// The id a human would use to name the target
    ///
    /// # Panics
    /// Panics if the reference carries neither id.
    pub fn best_id(&self) -> u32 {
        self.original_id
            .or(self.id)
            .expect("reference carries no id at all")
    }
}

impl<T: Identifiable> Clone for Reference<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Identifiable> Copy for Reference<T> {}

impl<T: Identifiable> PartialEq for Reference<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T: Identifiable> Eq for Reference<T> {}

impl<T: Identifiable> PartialOrd for Reference<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Identifiable> Ord for Reference<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.rtype.cmp(&other.rtype) {
            Ordering::Equal => match (self.original_id, other.original_id) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => self.id.cmp(&other.id),
            },
            unequal => unequal,
        }
    }
}

impl<T: Identifiable> Hash for Reference<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rtype.hash(state);
        match self.original_id {
            Some(original) => {
                0u8.hash(state);
                original.hash(state);
            }
            None => {
                1u8.hash(state);
                self.id.hash(state);
            }
        }
    }
}

impl<T: Identifiable> fmt::Debug for Reference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl<T: Identifiable> fmt::Display for Reference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<{:?}>[", T::KIND, self.rtype)?;
        match (self.original_id, self.id) {
            (Some(original), _) => write!(f, "original_id={original}")?,
            (None, Some(id)) => write!(f, "id={id}")?,
            (None, None) => write!(f, "unresolved")?,
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Probe {
        ident: Identity,
        subtype: ProbeType,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    enum ProbeType {
        A,
        B,
    }

    impl Identifiable for Probe {
        type Type = ProbeType;
        const KIND: &'static str = "Probe";

        fn ident(&self) -> &Identity {
            &self.ident
        }
        fn ident_mut(&mut self) -> &mut Identity {
            &mut self.ident
        }
        fn subtype(&self) -> ProbeType {
            self.subtype
        }
    }

    fn probe(subtype: ProbeType, original_id: Option<u32>, id: u32) -> Probe {
        let mut ident = Identity::new(original_id);
        ident.assign(id);
        Probe { ident, subtype }
    }

    #[test]
    fn test_equality_prefers_original_id() {
        let a = probe(ProbeType::A, Some(5), 1).reference();
        let b = probe(ProbeType::A, Some(5), 9).reference();
        assert_eq!(a, b);

        let c = probe(ProbeType::A, None, 1).reference();
        assert_ne!(a, c);
        let d = probe(ProbeType::A, None, 1).reference();
        assert_eq!(c, d);
    }

    #[test]
    fn test_subtype_distinguishes() {
        let a = probe(ProbeType::A, Some(5), 1).reference();
        let b = probe(ProbeType::B, Some(5), 2).reference();
        assert_ne!(a, b);
    }

    #[test]
    fn test_ordering_original_wins_over_synthetic() {
        let original = probe(ProbeType::A, Some(100), 7).reference();
        let synthetic = probe(ProbeType::A, None, 1).reference();
        assert!(original < synthetic);
    }

    #[test]
    fn test_best_id() {
        assert_eq!(probe(ProbeType::A, Some(42), 3).best_id(), 42);
        assert_eq!(probe(ProbeType::A, None, 3).best_id(), 3);
    }

    #[test]
    fn test_forward_reference_display() {
        let fwd: Reference<Probe> = Reference::new(ProbeType::B, 12);
        assert_eq!(format!("{fwd}"), "Probe<B>[original_id=12]");
    }
}
