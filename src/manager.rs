//! Slot factory and interning cache
//!
//! The [`SlotManager`] is the sole authority for slot identity: every slot
//! is created through one of its get-or-create operations, keyed by the
//! structural identity of the request. Structurally equal requests always
//! return the same slot, so the same source expression can never produce two
//! different variables. Ids are issued monotonically starting at 1.

use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

use crate::error::{QualError, Result};
use crate::lattice::{Lattice, Qualifier};
use crate::model::{Annotation, Branch, Location, Slot, SlotId};

/// Factory and interning cache for all slots of one inference pass
///
/// The id counter is pass-scoped state owned by this instance; separate
/// passes (or tests) never interfere with each other.
pub struct SlotManager {
    lattice: Lattice,
    next_id: u32,
    /// All issued slots in creation order; a slot with id `n` lives at
    /// index `n - 1`.
    slots: Vec<Slot>,

    constant_cache: FxHashMap<Qualifier, SlotId>,
    source_cache: FxHashMap<Location, SlotId>,
    refinement_cache: FxHashMap<Location, SlotId>,
    combination_cache: FxHashMap<(SlotId, SlotId), SlotId>,
    lub_cache: FxHashMap<(SlotId, SlotId), SlotId>,
    existential_cache: FxHashMap<(SlotId, SlotId), SlotId>,
    arithmetic_cache: FxHashMap<Location, SlotId>,
    comparison_then_cache: FxHashMap<Location, SlotId>,
    comparison_else_cache: FxHashMap<Location, SlotId>,

    merged_to: FxHashMap<SlotId, FxHashSet<SlotId>>,
    refined_to: FxHashMap<SlotId, FxHashSet<SlotId>>,

    best_effort: bool,
}

impl SlotManager {
    /// Creates a slot manager over the given lattice
    pub fn new(lattice: Lattice) -> Self {
        Self::with_options(lattice, false, false)
    }

    /// Creates a slot manager with explicit options
    ///
    /// When `store_constants` is set, one constant slot per lattice
    /// qualifier is pre-registered in declaration order, so constants get
    /// stable low ids. Best-effort mode implies `store_constants`, since
    /// degraded lookups resolve to the top constant.
    pub fn with_options(lattice: Lattice, store_constants: bool, best_effort: bool) -> Self {
        let mut manager = Self {
            lattice: lattice.clone(),
            next_id: 1,
            slots: Vec::new(),
            constant_cache: FxHashMap::default(),
            source_cache: FxHashMap::default(),
            refinement_cache: FxHashMap::default(),
            combination_cache: FxHashMap::default(),
            lub_cache: FxHashMap::default(),
            existential_cache: FxHashMap::default(),
            arithmetic_cache: FxHashMap::default(),
            comparison_then_cache: FxHashMap::default(),
            comparison_else_cache: FxHashMap::default(),
            merged_to: FxHashMap::default(),
            refined_to: FxHashMap::default(),
            best_effort,
        };
        if store_constants || best_effort {
            for q in lattice.qualifiers() {
                manager.create_constant(q);
            }
        }
        manager
    }

    /// Returns the lattice this manager issues constants from
    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    /// Enables or disables best-effort lookups
    pub fn set_best_effort(&mut self, best_effort: bool) {
        self.best_effort = best_effort;
    }

    fn issue(&mut self, slot: Slot) -> Slot {
        debug_assert_eq!(slot.id().get() as usize, self.slots.len() + 1);
        self.slots.push(slot.clone());
        slot
    }

    fn next_id(&mut self) -> SlotId {
        let id = SlotId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Creates or returns the source variable slot at the given location
    ///
    /// A missing location is never cached: each such request yields a fresh
    /// slot.
    pub fn create_source_variable(
        &mut self,
        location: Location,
        type_name: &str,
        insertable: bool,
    ) -> Slot {
        if !location.is_missing() {
            if let Some(&id) = self.source_cache.get(&location) {
                return self.slots[id.get() as usize - 1].clone();
            }
        }
        let id = self.next_id();
        if !location.is_missing() {
            self.source_cache.insert(location.clone(), id);
        }
        self.issue(Slot::SourceVariable {
            id,
            location,
            type_name: Arc::from(type_name),
            insertable,
        })
    }

    /// Creates or returns the constant slot for the given lattice value
    pub fn create_constant(&mut self, value: Qualifier) -> Slot {
        if let Some(&id) = self.constant_cache.get(&value) {
            return self.slots[id.get() as usize - 1].clone();
        }
        let id = self.next_id();
        self.constant_cache.insert(value, id);
        self.issue(Slot::Constant { id, value })
    }

    /// Creates or returns the refinement variable slot at the given location
    ///
    /// Records a refined-to back-reference from the refined slot. A missing
    /// location is never cached.
    pub fn create_refinement_variable(&mut self, location: Location, refined: &Slot) -> Slot {
        if !location.is_missing() {
            if let Some(&id) = self.refinement_cache.get(&location) {
                return self.slots[id.get() as usize - 1].clone();
            }
        }
        let id = self.next_id();
        if !location.is_missing() {
            self.refinement_cache.insert(location.clone(), id);
        }
        self.refined_to.entry(refined.id()).or_default().insert(id);
        self.issue(Slot::RefinementVariable {
            id,
            location,
            refined: refined.id(),
        })
    }

    /// Creates or returns the combination variable slot for the ordered
    /// `(receiver, declared)` pair
    ///
    /// # Errors
    /// Fails if the location is missing; combination slots are meaningless
    /// without one.
    pub fn create_combination_variable(
        &mut self,
        location: Location,
        receiver: &Slot,
        declared: &Slot,
    ) -> Result<Slot> {
        if location.is_missing() {
            return Err(QualError::MissingLocation(
                "cannot create a combination variable slot with a missing location".to_string(),
            ));
        }
        let key = (receiver.id(), declared.id());
        if let Some(&id) = self.combination_cache.get(&key) {
            return Ok(self.slots[id.get() as usize - 1].clone());
        }
        let id = self.next_id();
        self.combination_cache.insert(key, id);
        Ok(self.issue(Slot::CombinationVariable {
            id,
            location,
            receiver: receiver.id(),
            declared: declared.id(),
        }))
    }

    /// Creates or returns the lub variable slot joining the two inputs
    ///
    /// The pair is unordered: `(a, b)` and `(b, a)` resolve to the same
    /// slot. Both inputs record a merged-to back-reference to the result.
    pub fn create_lub_variable(&mut self, left: &Slot, right: &Slot) -> Slot {
        // normalize the unordered pair by id
        let key = if left.id() <= right.id() {
            (left.id(), right.id())
        } else {
            (right.id(), left.id())
        };
        if let Some(&id) = self.lub_cache.get(&key) {
            return self.slots[id.get() as usize - 1].clone();
        }
        let id = self.next_id();
        self.lub_cache.insert(key, id);
        self.merged_to.entry(left.id()).or_default().insert(id);
        self.merged_to.entry(right.id()).or_default().insert(id);
        self.issue(Slot::LubVariable {
            id,
            location: Location::missing(),
            left: left.id(),
            right: right.id(),
        })
    }

    /// Creates or returns the existential variable slot for the ordered
    /// `(potential, alternative)` pair
    pub fn create_existential_variable(&mut self, potential: &Slot, alternative: &Slot) -> Slot {
        let key = (potential.id(), alternative.id());
        if let Some(&id) = self.existential_cache.get(&key) {
            return self.slots[id.get() as usize - 1].clone();
        }
        let id = self.next_id();
        self.existential_cache.insert(key, id);
        self.issue(Slot::ExistentialVariable {
            id,
            potential: potential.id(),
            alternative: alternative.id(),
        })
    }

    /// Creates or returns the arithmetic variable slot at the given location
    ///
    /// # Errors
    /// Fails if the location is missing.
    pub fn create_arithmetic_variable(&mut self, location: Location) -> Result<Slot> {
        if location.is_missing() {
            return Err(QualError::MissingLocation(
                "cannot create an arithmetic variable slot with a missing location".to_string(),
            ));
        }
        if let Some(&id) = self.arithmetic_cache.get(&location) {
            return Ok(self.slots[id.get() as usize - 1].clone());
        }
        let id = self.next_id();
        self.arithmetic_cache.insert(location.clone(), id);
        Ok(self.issue(Slot::ArithmeticVariable { id, location }))
    }

    /// Returns the arithmetic variable slot at the given location, if one
    /// was created
    pub fn arithmetic_variable(&self, location: &Location) -> Option<Slot> {
        self.arithmetic_cache
            .get(location)
            .map(|&id| self.slots[id.get() as usize - 1].clone())
    }

    /// Creates or returns the comparison variable slot for the given
    /// location and branch
    ///
    /// Refinements are cached per branch: the then- and else-branch of the
    /// same comparison yield distinct slots.
    ///
    /// # Errors
    /// Fails if the location is missing.
    pub fn create_comparison_variable(
        &mut self,
        location: Location,
        refined: &Slot,
        branch: Branch,
    ) -> Result<Slot> {
        if location.is_missing() {
            return Err(QualError::MissingLocation(
                "cannot create a comparison variable slot with a missing location".to_string(),
            ));
        }
        let cache = match branch {
            Branch::Then => &self.comparison_then_cache,
            Branch::Else => &self.comparison_else_cache,
        };
        if let Some(&id) = cache.get(&location) {
            return Ok(self.slots[id.get() as usize - 1].clone());
        }
        let id = self.next_id();
        match branch {
            Branch::Then => self.comparison_then_cache.insert(location.clone(), id),
            Branch::Else => self.comparison_else_cache.insert(location.clone(), id),
        };
        self.refined_to.entry(refined.id()).or_default().insert(id);
        Ok(self.issue(Slot::ComparisonVariable {
            id,
            location,
            refined: refined.id(),
            branch,
        }))
    }

    /// Returns the comparison variable slot for the given location and
    /// branch, if one was created
    pub fn comparison_variable(&self, location: &Location, branch: Branch) -> Option<Slot> {
        let cache = match branch {
            Branch::Then => &self.comparison_then_cache,
            Branch::Else => &self.comparison_else_cache,
        };
        cache
            .get(location)
            .map(|&id| self.slots[id.get() as usize - 1].clone())
    }

    /// Looks up a slot by id
    ///
    /// # Errors
    /// Fails for an id that was never issued, unless best-effort mode is
    /// active, in which case the lookup resolves to the lattice top
    /// constant.
    pub fn slot(&self, id: SlotId) -> Result<&Slot> {
        let index = id.get() as usize;
        if index >= 1 && index <= self.slots.len() {
            return Ok(&self.slots[index - 1]);
        }
        if self.best_effort {
            if let Some(&top_id) = self.constant_cache.get(&self.lattice.top()) {
                return Ok(&self.slots[top_id.get() as usize - 1]);
            }
        }
        Err(QualError::UnknownSlot(format!("no slot with id {}", id)))
    }

    /// Returns all issued slots in creation order
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Returns all variable slots in creation order
    pub fn variable_slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|s| s.is_variable())
    }

    /// Returns all constant slots in creation order
    pub fn constant_slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|s| s.is_constant())
    }

    /// Returns the number of ids issued so far
    pub fn num_slots(&self) -> usize {
        self.next_id as usize - 1
    }

    /// Converts a slot into its opaque external representation
    pub fn annotation(&self, slot: &Slot) -> Annotation {
        Annotation::Variable(slot.id())
    }

    /// Resolves an external representation back to a slot
    ///
    /// A qualifier annotation resolves to the constant slot for that value,
    /// creating it if necessary.
    ///
    /// # Errors
    /// Fails for a variable annotation whose id was never issued, unless
    /// best-effort mode is active, in which case the lookup resolves to the
    /// lattice top constant.
    pub fn slot_for_annotation(&mut self, annotation: &Annotation) -> Result<Slot> {
        match annotation {
            Annotation::Variable(id) => self.slot(*id).cloned(),
            Annotation::Qualifier(q) => Ok(self.create_constant(*q)),
        }
    }

    /// Returns the lub slots the given slot has been merged into
    pub fn merged_to(&self, id: SlotId) -> Vec<SlotId> {
        let mut out: Vec<SlotId> = self
            .merged_to
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        out.sort();
        out
    }

    /// Returns true if `id` transitively merges into `target`
    ///
    /// The merged-to graph is forward-pointing and acyclic by construction;
    /// the walk is bounded by a visited set as a defense against accidental
    /// cycles.
    pub fn is_merged_to(&self, id: SlotId, target: SlotId) -> bool {
        let mut visited = FxHashSet::default();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(merged) = self.merged_to.get(&current) {
                for &next in merged {
                    if next == target {
                        return true;
                    }
                    stack.push(next);
                }
            }
        }
        false
    }

    /// Returns the refinement slots that refine the given slot
    pub fn refined_to(&self, id: SlotId) -> Vec<SlotId> {
        let mut out: Vec<SlotId> = self
            .refined_to
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> Lattice {
        Lattice::builder()
            .qualifier("Top")
            .qualifier("A")
            .qualifier("B")
            .qualifier("Bottom")
            .edge("A", "Top")
            .edge("B", "Top")
            .edge("Bottom", "A")
            .edge("Bottom", "B")
            .top("Top")
            .bottom("Bottom")
            .build()
            .unwrap()
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let mut manager = SlotManager::new(diamond());
        let a = manager.create_source_variable(Location::source("A.java", 1), "int", true);
        let b = manager.create_source_variable(Location::source("A.java", 2), "int", true);
        assert_eq!(a.id().get(), 1);
        assert_eq!(b.id().get(), 2);
        assert_eq!(manager.num_slots(), 2);
    }

    #[test]
    fn source_variables_intern_by_location() {
        let mut manager = SlotManager::new(diamond());
        let loc = Location::source("A.java", 7);
        let a = manager.create_source_variable(loc.clone(), "int", true);
        let b = manager.create_source_variable(loc, "int", true);
        assert_eq!(a, b);
        assert_eq!(manager.num_slots(), 1);
    }

    #[test]
    fn missing_location_is_never_cached() {
        let mut manager = SlotManager::new(diamond());
        let a = manager.create_source_variable(Location::missing(), "int", true);
        let b = manager.create_source_variable(Location::missing(), "int", true);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn combination_slots_intern_by_ordered_pair() {
        let lattice = diamond();
        let mut manager = SlotManager::new(lattice);
        let r = manager.create_source_variable(Location::source("A.java", 1), "int", true);
        let d = manager.create_source_variable(Location::source("A.java", 2), "int", true);
        let loc = Location::source("A.java", 3);

        let c1 = manager
            .create_combination_variable(loc.clone(), &r, &d)
            .unwrap();
        let c2 = manager
            .create_combination_variable(loc.clone(), &r, &d)
            .unwrap();
        assert_eq!(c1, c2);

        // the reversed pair is a different combination
        let c3 = manager.create_combination_variable(loc, &d, &r).unwrap();
        assert_ne!(c1.id(), c3.id());
    }

    #[test]
    fn lub_slots_intern_by_unordered_pair() {
        let mut manager = SlotManager::new(diamond());
        let a = manager.create_source_variable(Location::source("A.java", 1), "int", true);
        let b = manager.create_source_variable(Location::source("A.java", 2), "int", true);

        let l1 = manager.create_lub_variable(&a, &b);
        let l2 = manager.create_lub_variable(&b, &a);
        assert_eq!(l1, l2);
        assert_eq!(manager.num_slots(), 3);
    }

    #[test]
    fn lub_records_merged_to_back_references() {
        let mut manager = SlotManager::new(diamond());
        let a = manager.create_source_variable(Location::source("A.java", 1), "int", true);
        let b = manager.create_source_variable(Location::source("A.java", 2), "int", true);
        let lub = manager.create_lub_variable(&a, &b);

        assert_eq!(manager.merged_to(a.id()), vec![lub.id()]);
        assert!(manager.is_merged_to(a.id(), lub.id()));
        assert!(manager.is_merged_to(b.id(), lub.id()));
        assert!(!manager.is_merged_to(lub.id(), a.id()));

        // transitive: lub of the lub
        let c = manager.create_source_variable(Location::source("A.java", 3), "int", true);
        let outer = manager.create_lub_variable(&lub, &c);
        assert!(manager.is_merged_to(a.id(), outer.id()));
    }

    #[test]
    fn comparison_slots_cache_per_branch() {
        let mut manager = SlotManager::new(diamond());
        let v = manager.create_source_variable(Location::source("A.java", 1), "int", true);
        let loc = Location::source("A.java", 9);

        let then1 = manager
            .create_comparison_variable(loc.clone(), &v, Branch::Then)
            .unwrap();
        let then2 = manager
            .create_comparison_variable(loc.clone(), &v, Branch::Then)
            .unwrap();
        let els = manager
            .create_comparison_variable(loc.clone(), &v, Branch::Else)
            .unwrap();

        assert_eq!(then1, then2);
        assert_ne!(then1.id(), els.id());
        assert_eq!(
            manager.comparison_variable(&loc, Branch::Else).unwrap(),
            els
        );
    }

    #[test]
    fn derived_slots_require_location() {
        let mut manager = SlotManager::new(diamond());
        let v = manager.create_source_variable(Location::source("A.java", 1), "int", true);
        assert!(manager.create_arithmetic_variable(Location::missing()).is_err());
        assert!(manager
            .create_comparison_variable(Location::missing(), &v, Branch::Then)
            .is_err());
        assert!(manager
            .create_combination_variable(Location::missing(), &v, &v)
            .is_err());
    }

    #[test]
    fn constants_intern_by_value() {
        let lattice = diamond();
        let mut manager = SlotManager::new(lattice.clone());
        let a1 = manager.create_constant(lattice.top());
        let a2 = manager.create_constant(lattice.top());
        let b = manager.create_constant(lattice.bottom());
        assert_eq!(a1, a2);
        assert_ne!(a1.id(), b.id());
        assert_eq!(manager.constant_slots().count(), 2);
    }

    #[test]
    fn annotation_round_trip() {
        let lattice = diamond();
        let mut manager = SlotManager::new(lattice.clone());
        let v = manager.create_source_variable(Location::source("A.java", 1), "int", true);

        let annotation = manager.annotation(&v);
        let resolved = manager.slot_for_annotation(&annotation).unwrap();
        assert_eq!(resolved.id(), v.id());

        let constant = manager
            .slot_for_annotation(&Annotation::Qualifier(lattice.top()))
            .unwrap();
        assert_eq!(constant.constant_value(), Some(lattice.top()));
    }

    #[test]
    fn unknown_id_fails_unless_best_effort() {
        let lattice = diamond();
        let manager = SlotManager::new(lattice.clone());
        assert!(manager.slot(SlotId(42)).is_err());

        let degraded = SlotManager::with_options(lattice.clone(), false, true);
        let slot = degraded.slot(SlotId(42)).unwrap();
        assert_eq!(slot.constant_value(), Some(lattice.top()));
    }

    #[test]
    fn stored_constants_get_stable_low_ids() {
        let lattice = diamond();
        let manager = SlotManager::with_options(lattice.clone(), true, false);
        assert_eq!(manager.num_slots(), lattice.size());
        let first = manager.slot(SlotId(1)).unwrap();
        assert_eq!(first.constant_value(), Some(lattice.top()));
    }
}
