//! Generic entity container
//!
//! One container per entity kind owns its entities by value, indexed both by
//! internal id and by (subtype, original id). Internal ids are assigned here
//! at insertion, strictly increase, and are never reused after an erase.
//! Iteration order is internal-id order, which deterministic output depends
//! on.

use std::collections::BTreeMap;

use log::warn;

use crate::reference::{Identifiable, Reference};

/// Insertion-ordered container of one entity kind
#[derive(Debug)]
pub struct Container<T: Identifiable> {
    by_id: BTreeMap<u32, T>,
    by_original: BTreeMap<(T::Type, u32), u32>,
    next_id: u32,
}

impl<T: Identifiable> Default for Container<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Identifiable> Container<T> {
    pub fn new() -> Container<T> {
        Container {
            by_id: BTreeMap::new(),
            by_original: BTreeMap::new(),
            next_id: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Add an entity, assigning its internal id, and return its reference.
    ///
    /// # Panics
    /// Panics if the entity already belongs to a container, or if another
    /// entity of the same subtype carries the same original id — both are
    /// caller errors.
    pub fn add(&mut self, mut entity: T) -> Reference<T> {
        assert!(
            entity.ident().id_opt().is_none(),
            "{} already belongs to a container",
            T::KIND
        );
        let id = self.next_id;
        self.next_id += 1;
        entity.ident_mut().assign(id);
        if let Some(original) = entity.ident().original_id() {
            let key = (entity.subtype(), original);
            assert!(
                !self.by_original.contains_key(&key),
                "{} with original id {} is already in the model",
                T::KIND,
                original
            );
            self.by_original.insert(key, id);
        }
        let reference = entity.reference();
        self.by_id.insert(id, entity);
        reference
    }

    /// Resolve a reference: internal id first, then (subtype, original id).
    /// Fails softly with `None` — callers probe optimistically.
    pub fn find(&self, reference: &Reference<T>) -> Option<&T> {
        if let Some(id) = reference.id {
            if let Some(entity) = self.by_id.get(&id) {
                return Some(entity);
            }
        }
        let original = reference.original_id?;
        let id = self.by_original.get(&(reference.rtype, original))?;
        self.by_id.get(id)
    }

    pub(crate) fn find_mut(&mut self, reference: &Reference<T>) -> Option<&mut T> {
        let id = self.resolve_id(reference)?;
        self.by_id.get_mut(&id)
    }

    fn resolve_id(&self, reference: &Reference<T>) -> Option<u32> {
        if let Some(id) = reference.id {
            if self.by_id.contains_key(&id) {
                return Some(id);
            }
        }
        let original = reference.original_id?;
        self.by_original.get(&(reference.rtype, original)).copied()
    }

    /// Find an entity by its original id, whatever its subtype
    pub fn find_by_original_id(&self, original_id: u32) -> Option<&T> {
        self.by_original
            .iter()
            .find(|((_, original), _)| *original == original_id)
            .and_then(|(_, id)| self.by_id.get(id))
    }

    /// Entity by internal id
    pub fn get(&self, id: u32) -> Option<&T> {
        self.by_id.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: u32) -> Option<&mut T> {
        self.by_id.get_mut(&id)
    }

    /// Erase the referenced entity; does nothing when it is absent. The
    /// internal id is retired, never reissued.
    pub fn erase(&mut self, reference: &Reference<T>) {
        let Some(id) = self.resolve_id(reference) else {
            return;
        };
        if let Some(entity) = self.by_id.remove(&id) {
            if let Some(original) = entity.ident().original_id() {
                self.by_original.remove(&(entity.subtype(), original));
            }
        }
    }

    /// Iterate entities in internal-id (insertion) order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.by_id.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.by_id.values_mut()
    }

    /// Snapshot of every reference, for passes that erase while walking
    pub fn references(&self) -> Vec<Reference<T>> {
        self.by_id.values().map(|entity| entity.reference()).collect()
    }

    /// Snapshot of every internal id
    pub fn ids(&self) -> Vec<u32> {
        self.by_id.keys().copied().collect()
    }

    /// Entities of one subtype, in insertion order
    pub fn filter(&self, subtype: T::Type) -> Vec<&T> {
        self.by_id
            .values()
            .filter(|entity| entity.subtype() == subtype)
            .collect()
    }

    pub fn contains_subtype(&self, subtype: T::Type) -> bool {
        self.by_id.values().any(|entity| entity.subtype() == subtype)
    }

    pub fn first(&self) -> Option<&T> {
        self.by_id.values().next()
    }

    pub fn last(&self) -> Option<&T> {
        self.by_id.values().next_back()
    }

    /// Run every entity's structural self-check; failing entities are
    /// removed and reported. All entities are checked even after the first
    /// failure. Never raises.
    pub fn validate(&mut self) -> bool {
        let mut failed: Vec<Reference<T>> = Vec::new();
        for entity in self.by_id.values() {
            if !entity.validate() {
                warn!(
                    "{} {} is not structurally valid, removing it",
                    T::KIND,
                    entity.best_id()
                );
                failed.push(entity.reference());
            }
        }
        for reference in &failed {
            self.erase(reference);
        }
        failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::Identity;

    #[derive(Debug)]
    struct Widget {
        ident: Identity,
        subtype: WidgetType,
        sound: bool,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    enum WidgetType {
        Plain,
        Fancy,
    }

    impl Widget {
        fn new(subtype: WidgetType, original_id: Option<u32>) -> Widget {
            Widget {
                ident: Identity::new(original_id),
                subtype,
                sound: true,
            }
        }
    }

    impl Identifiable for Widget {
        type Type = WidgetType;
        const KIND: &'static str = "Widget";

        fn ident(&self) -> &Identity {
            &self.ident
        }
        fn ident_mut(&mut self) -> &mut Identity {
            &mut self.ident
        }
        fn subtype(&self) -> WidgetType {
            self.subtype
        }
        fn validate(&self) -> bool {
            self.sound
        }
    }

    #[test]
    fn test_ids_are_monotonic_and_never_reused() {
        let mut container: Container<Widget> = Container::new();
        let a = container.add(Widget::new(WidgetType::Plain, None));
        let b = container.add(Widget::new(WidgetType::Plain, None));
        assert_eq!(a.id, Some(0));
        assert_eq!(b.id, Some(1));

        container.erase(&b);
        let c = container.add(Widget::new(WidgetType::Plain, None));
        assert_eq!(c.id, Some(2));
        assert_eq!(container.len(), 2);
    }

    #[test]
    fn test_find_by_reference_round_trip() {
        let mut container: Container<Widget> = Container::new();
        let reference = container.add(Widget::new(WidgetType::Fancy, Some(17)));
        assert!(container.find(&reference).is_some());
        // a forward reference carrying only the original id also resolves
        let forward = Reference::new(WidgetType::Fancy, 17);
        assert!(container.find(&forward).is_some());
        // the wrong subtype does not
        let wrong = Reference::new(WidgetType::Plain, 17);
        assert!(container.find(&wrong).is_none());
    }

    #[test]
    fn test_same_original_id_different_subtypes_coexist() {
        let mut container: Container<Widget> = Container::new();
        container.add(Widget::new(WidgetType::Plain, Some(5)));
        container.add(Widget::new(WidgetType::Fancy, Some(5)));
        assert_eq!(container.len(), 2);
    }

    #[test]
    #[should_panic(expected = "already in the model")]
    fn test_duplicate_original_id_panics() {
        let mut container: Container<Widget> = Container::new();
        container.add(Widget::new(WidgetType::Plain, Some(5)));
        container.add(Widget::new(WidgetType::Plain, Some(5)));
    }

    #[test]
    fn test_iteration_is_insertion_ordered() {
        let mut container: Container<Widget> = Container::new();
        container.add(Widget::new(WidgetType::Plain, Some(30)));
        container.add(Widget::new(WidgetType::Plain, Some(10)));
        container.add(Widget::new(WidgetType::Fancy, Some(20)));
        let originals: Vec<Option<u32>> = container
            .iter()
            .map(|w| w.ident().original_id())
            .collect();
        assert_eq!(originals, vec![Some(30), Some(10), Some(20)]);
    }

    #[test]
    fn test_validate_removes_and_reports() {
        let mut container: Container<Widget> = Container::new();
        container.add(Widget::new(WidgetType::Plain, Some(1)));
        let mut bad = Widget::new(WidgetType::Plain, Some(2));
        bad.sound = false;
        container.add(bad);
        assert!(!container.validate());
        assert_eq!(container.len(), 1);
        assert!(container.validate());
    }

    #[test]
    fn test_erase_unknown_is_noop() {
        let mut container: Container<Widget> = Container::new();
        container.add(Widget::new(WidgetType::Plain, Some(1)));
        container.erase(&Reference::new(WidgetType::Plain, 99));
        assert_eq!(container.len(), 1);
    }
}
