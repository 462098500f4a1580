mod common;

use std::rc::Rc;
use std::sync::Arc;

use common::fixtures::*;
use common::*;
use indexmap::IndexMap;
use proptest::prelude::*;
use viewmap::association::{
    reconcile_mapped, reconcile_ordered, reconcile_to_one, reconcile_unordered, AssociateBinder,
    PropertyListManager, PropertyMapManager, PropertyToOneManager, ReconcileStats,
    ToManyIndexedAssociationManager, ToManyMappedAssociationManager,
};
use viewmap::model::{with_entity, with_entity_mut};
use viewmap::{
    AccessMode, EntityRef, Node, NodeBuilder, ScopeContext, ViewError, ViewObject, ViewServices,
};

fn pets_array() -> Node {
    NodeBuilder::new().array(person_pets(), pet_type())
}

fn pets_of(owner: &EntityRef) -> Vec<EntityRef> {
    with_entity::<Person, _>(owner, |p| p.pets.clone()).unwrap()
}

fn views(names: &[&str]) -> Vec<ViewObject> {
    names.iter().map(|n| pet_view(n)).collect()
}

fn stats(created: usize, updated: usize, relocated: usize, discarded: usize) -> ReconcileStats {
    ReconcileStats {
        created,
        updated,
        relocated,
        discarded,
    }
}

fn keyed_list() -> PropertyListManager {
    PropertyListManager::new(person_pets(), Some(pet_key()))
}

// -------------------------------------------------------------------------
// Ordered

#[test]
fn ordered_reorders_and_trims() {
    let recorder = Arc::new(Recorder::default());
    let services = ViewServices::default().with_listener(recorder.clone());
    let mut ctx = ScopeContext::new(&services, AccessMode::Write);
    let node = pets_array();
    let owner = person("Ann", &["a", "b", "c"]);
    let before = pets_of(&owner);
    let manager = CountingPetList::default();
    let mut binder = PetBinder::default();

    let v = views(&["c", "a"]);
    let candidates: Vec<&ViewObject> = v.iter().collect();
    let got = reconcile_ordered(&owner, &candidates, &manager, &mut binder, &node, &mut ctx).unwrap();

    assert_eq!(pet_names(&owner), ["c", "a"]);
    assert_eq!(got, stats(0, 2, 1, 1));
    assert_eq!(binder.injected, ["c", "a"]);
    assert!(recorder.created().is_empty());
    assert_eq!(recorder.discarded(), ["b"]);
    let after = pets_of(&owner);
    assert!(Rc::ptr_eq(&after[0], &before[2]));
    assert!(Rc::ptr_eq(&after[1], &before[0]));
    // One relocation of c; b trimmed from the tail.
    assert_eq!(manager.inserts(), 1);
    assert_eq!(manager.removals(), 2);
}

#[test]
fn ordered_second_pass_only_injects() {
    let services = ViewServices::default();
    let mut ctx = ScopeContext::new(&services, AccessMode::Write);
    let node = pets_array();
    let owner = person("Ann", &["a", "b", "c"]);
    let manager = CountingPetList::default();
    let v = views(&["c", "x", "a"]);
    let candidates: Vec<&ViewObject> = v.iter().collect();

    reconcile_ordered(&owner, &candidates, &manager, &mut PetBinder::default(), &node, &mut ctx).unwrap();
    let (inserts, removals) = (manager.inserts(), manager.removals());

    let mut binder = PetBinder::default();
    let got = reconcile_ordered(&owner, &candidates, &manager, &mut binder, &node, &mut ctx).unwrap();
    assert_eq!(got, stats(0, 3, 0, 0));
    assert_eq!(binder.injected, ["c", "x", "a"]);
    assert_eq!(manager.inserts(), inserts);
    assert_eq!(manager.removals(), removals);
}

#[test]
fn ordered_creates_missing_and_fills_empty() {
    let recorder = Arc::new(Recorder::default());
    let services = ViewServices::default().with_listener(recorder.clone());
    let mut ctx = ScopeContext::new(&services, AccessMode::Write);
    let node = pets_array();
    let owner = person("Ann", &[]);
    let v = views(&["a", "b"]);
    let candidates: Vec<&ViewObject> = v.iter().collect();

    let got = reconcile_ordered(&owner, &candidates, &keyed_list(), &mut PetBinder::default(), &node, &mut ctx)
        .unwrap();
    assert_eq!(got, stats(2, 0, 0, 0));
    assert_eq!(pet_names(&owner), ["a", "b"]);
    assert_eq!(recorder.created(), ["a", "b"]);
}

#[test]
fn ordered_duplicate_candidate_gets_its_own_associate() {
    let services = ViewServices::default();
    let mut ctx = ScopeContext::new(&services, AccessMode::Write);
    let node = pets_array();
    let owner = person("Ann", &["a"]);
    let v = views(&["a", "a"]);
    let candidates: Vec<&ViewObject> = v.iter().collect();

    let got = reconcile_ordered(&owner, &candidates, &keyed_list(), &mut PetBinder::default(), &node, &mut ctx)
        .unwrap();
    assert_eq!(got, stats(1, 1, 0, 0));
    let pets = pets_of(&owner);
    assert_eq!(pets.len(), 2);
    assert!(!Rc::ptr_eq(&pets[0], &pets[1]));
}

#[test]
fn without_identity_key_every_candidate_is_new() {
    let services = ViewServices::default();
    let mut ctx = ScopeContext::new(&services, AccessMode::Write);
    let node = pets_array();
    let owner = person("Ann", &["a"]);
    let v = views(&["a"]);
    let candidates: Vec<&ViewObject> = v.iter().collect();
    let manager = PropertyListManager::new(person_pets(), None);

    let got = reconcile_ordered(&owner, &candidates, &manager, &mut PetBinder::default(), &node, &mut ctx)
        .unwrap();
    assert_eq!(got, stats(1, 0, 0, 1));
}

// -------------------------------------------------------------------------
// Brackets

#[test]
fn default_managers_reject_mutation_outside_a_bracket() {
    let owner = person("Ann", &[]);
    let list = keyed_list();
    assert!(matches!(
        list.insert(&owner, 0, pet("a")),
        Err(ViewError::IllegalState(_))
    ));
    assert!(matches!(
        viewmap::ToManyAssociationManager::end(&list, &owner),
        Err(ViewError::IllegalState(_))
    ));

    let map = PropertyMapManager::new(person_friends());
    assert!(matches!(
        map.put(&owner, "k".to_string(), pet("a")),
        Err(ViewError::IllegalState(_))
    ));
    // Reads are fine anywhere.
    assert!(map.keys(&owner).unwrap().is_empty());
}

struct FailingBinder;

impl AssociateBinder for FailingBinder {
    fn new_associate(&mut self, _candidate: &ViewObject, _ctx: &mut ScopeContext<'_>) -> viewmap::Result<EntityRef> {
        Err(ViewError::access("no more pets"))
    }

    fn inject(
        &mut self,
        _associate: &EntityRef,
        _candidate: &ViewObject,
        _ctx: &mut ScopeContext<'_>,
    ) -> viewmap::Result<()> {
        Ok(())
    }
}

#[test]
fn failure_keeps_partial_changes_and_closes_the_bracket() {
    let services = ViewServices::default();
    let mut ctx = ScopeContext::new(&services, AccessMode::Write);
    let node = pets_array();
    let owner = person("Ann", &["a", "b"]);
    let manager = keyed_list();
    let v = views(&["b", "new"]);
    let candidates: Vec<&ViewObject> = v.iter().collect();

    let err = reconcile_ordered(&owner, &candidates, &manager, &mut FailingBinder, &node, &mut ctx).unwrap_err();
    assert!(matches!(err, ViewError::ModelAccess { .. }));
    // b was already relocated before the failure.
    assert_eq!(pet_names(&owner), ["b", "a"]);
    assert!(matches!(
        manager.insert(&owner, 0, pet("z")),
        Err(ViewError::IllegalState(_))
    ));
}

// -------------------------------------------------------------------------
// Unordered

#[test]
fn unordered_matches_by_identity() {
    let recorder = Arc::new(Recorder::default());
    let services = ViewServices::default().with_listener(recorder.clone());
    let mut ctx = ScopeContext::new(&services, AccessMode::Write);
    let node = pets_array();
    let owner = person("Ann", &["a", "b", "c"]);
    let before = pets_of(&owner);
    let v = views(&["c", "d", "a"]);
    let candidates: Vec<&ViewObject> = v.iter().collect();

    let got = reconcile_unordered(&owner, &candidates, &keyed_list(), &mut PetBinder::default(), &node, &mut ctx)
        .unwrap();
    assert_eq!(got, stats(1, 2, 0, 1));
    // Survivors keep their slots; new ones are appended.
    assert_eq!(pet_names(&owner), ["a", "c", "d"]);
    let after = pets_of(&owner);
    assert!(Rc::ptr_eq(&after[0], &before[0]));
    assert!(Rc::ptr_eq(&after[1], &before[2]));
    assert_eq!(recorder.created(), ["d"]);
    assert_eq!(recorder.discarded(), ["b"]);
}

// -------------------------------------------------------------------------
// To-one

fn best_of(owner: &EntityRef) -> Option<EntityRef> {
    with_entity::<Person, _>(owner, |p| p.best.clone()).unwrap()
}

#[test]
fn to_one_updates_same_associate_in_place() {
    let services = ViewServices::default();
    let mut ctx = ScopeContext::new(&services, AccessMode::Write);
    let node = pets_array();
    let owner = person("Ann", &[]);
    let rex = pet("Rex");
    with_entity_mut::<Person, _>(&owner, |p| p.best = Some(rex.clone())).unwrap();
    let manager = PropertyToOneManager::new(person_best(), Some(pet_key()));

    let got = reconcile_to_one(&owner, Some(&pet_view("Rex")), &manager, &mut PetBinder::default(), &node, &mut ctx)
        .unwrap();
    assert_eq!(got, stats(0, 1, 0, 0));
    assert!(Rc::ptr_eq(&best_of(&owner).unwrap(), &rex));
}

#[test]
fn to_one_replaces_a_different_associate() {
    let recorder = Arc::new(Recorder::default());
    let services = ViewServices::default().with_listener(recorder.clone());
    let mut ctx = ScopeContext::new(&services, AccessMode::Write);
    let node = pets_array();
    let owner = person("Ann", &[]);
    with_entity_mut::<Person, _>(&owner, |p| p.best = Some(pet("Rex"))).unwrap();
    let manager = PropertyToOneManager::new(person_best(), Some(pet_key()));

    let got = reconcile_to_one(&owner, Some(&pet_view("Bo")), &manager, &mut PetBinder::default(), &node, &mut ctx)
        .unwrap();
    assert_eq!(got, stats(1, 0, 0, 1));
    assert_eq!(label(&best_of(&owner).unwrap()), "Bo");
    assert_eq!(recorder.discarded(), ["Rex"]);
    assert_eq!(recorder.created(), ["Bo"]);
}

#[test]
fn to_one_null_clears_and_absent_is_noop() {
    let services = ViewServices::default();
    let mut ctx = ScopeContext::new(&services, AccessMode::Write);
    let node = pets_array();
    let owner = person("Ann", &[]);
    let manager = PropertyToOneManager::new(person_best(), None);

    let got = reconcile_to_one(&owner, None, &manager, &mut PetBinder::default(), &node, &mut ctx).unwrap();
    assert_eq!(got, ReconcileStats::default());

    with_entity_mut::<Person, _>(&owner, |p| p.best = Some(pet("Rex"))).unwrap();
    let got = reconcile_to_one(&owner, None, &manager, &mut PetBinder::default(), &node, &mut ctx).unwrap();
    assert_eq!(got, stats(0, 0, 0, 1));
    assert!(best_of(&owner).is_none());
}

/// Takes pets in place unless their name is listed.
#[derive(Default)]
struct Picky {
    inner: PetBinder,
    rejected: Vec<&'static str>,
}

impl Picky {
    fn rejecting(rejected: &[&'static str]) -> Self {
        Self {
            rejected: rejected.to_vec(),
            ..Self::default()
        }
    }
}

impl AssociateBinder for Picky {
    fn new_associate(&mut self, candidate: &ViewObject, ctx: &mut ScopeContext<'_>) -> viewmap::Result<EntityRef> {
        self.inner.new_associate(candidate, ctx)
    }

    fn inject(&mut self, associate: &EntityRef, candidate: &ViewObject, ctx: &mut ScopeContext<'_>) -> viewmap::Result<()> {
        self.inner.inject(associate, candidate, ctx)
    }

    fn accepts(&mut self, existing: &EntityRef, _candidate: &ViewObject, _ctx: &mut ScopeContext<'_>) -> viewmap::Result<bool> {
        Ok(!self.rejected.contains(&label(existing).as_str()))
    }
}

#[test]
fn to_one_without_key_defers_to_the_binder() {
    let recorder = Arc::new(Recorder::default());
    let services = ViewServices::default().with_listener(recorder.clone());
    let mut ctx = ScopeContext::new(&services, AccessMode::Write);
    let node = pets_array();
    let owner = person("Ann", &[]);
    let rex = pet("Rex");
    with_entity_mut::<Person, _>(&owner, |p| p.best = Some(rex.clone())).unwrap();
    let manager = PropertyToOneManager::new(person_best(), None);
    let bo = pet_view("Bo");

    let got = reconcile_to_one(&owner, Some(&bo), &manager, &mut Picky::default(), &node, &mut ctx).unwrap();
    assert_eq!(got, stats(0, 1, 0, 0));
    assert!(Rc::ptr_eq(&best_of(&owner).unwrap(), &rex));

    let got = reconcile_to_one(&owner, Some(&bo), &manager, &mut Picky::rejecting(&["Rex"]), &node, &mut ctx)
        .unwrap();
    assert_eq!(got, stats(1, 0, 0, 1));
    assert_eq!(label(&best_of(&owner).unwrap()), "Bo");
    assert_eq!(recorder.discarded(), ["Rex"]);
    assert_eq!(recorder.created(), ["Bo"]);
}

#[test]
fn ordered_replaces_rejected_matches_in_place() {
    let recorder = Arc::new(Recorder::default());
    let services = ViewServices::default().with_listener(recorder.clone());
    let mut ctx = ScopeContext::new(&services, AccessMode::Write);
    let node = pets_array();
    let owner = person("Ann", &["a", "b", "c"]);
    let before = pets_of(&owner);
    let v = views(&["a", "b", "c"]);
    let candidates: Vec<&ViewObject> = v.iter().collect();

    let got = reconcile_ordered(&owner, &candidates, &keyed_list(), &mut Picky::rejecting(&["b"]), &node, &mut ctx)
        .unwrap();
    assert_eq!(got, stats(1, 2, 0, 1));
    assert_eq!(pet_names(&owner), ["a", "b", "c"]);
    let after = pets_of(&owner);
    assert!(Rc::ptr_eq(&after[0], &before[0]));
    assert!(!Rc::ptr_eq(&after[1], &before[1]));
    assert!(Rc::ptr_eq(&after[2], &before[2]));
    assert_eq!(recorder.discarded(), ["b"]);
}

#[test]
fn unordered_and_mapped_replace_rejected_matches() {
    let services = ViewServices::default();
    let mut ctx = ScopeContext::new(&services, AccessMode::Write);
    let owner = person("Ann", &["a", "b"]);
    let v = views(&["a", "b"]);
    let candidates: Vec<&ViewObject> = v.iter().collect();

    let got = reconcile_unordered(
        &owner,
        &candidates,
        &keyed_list(),
        &mut Picky::rejecting(&["a"]),
        &pets_array(),
        &mut ctx,
    )
    .unwrap();
    assert_eq!(got, stats(1, 1, 0, 1));
    assert_eq!(pet_names(&owner), ["b", "a"]);

    let al = pet("Al");
    let owner = viewmap::entity(Person {
        friends: IndexMap::from([("y".to_string(), al.clone())]),
        ..Person::default()
    });
    let al_view = pet_view("Al");
    let got = reconcile_mapped(
        &owner,
        &[("y".to_string(), &al_view)],
        &PropertyMapManager::new(person_friends()),
        &mut Picky::rejecting(&["Al"]),
        &NodeBuilder::new().map(person_friends(), pet_type()),
        &mut ctx,
    )
    .unwrap();
    assert_eq!(got, stats(1, 0, 0, 1));
    let friends = with_entity::<Person, _>(&owner, |p| p.friends.clone()).unwrap();
    assert!(!Rc::ptr_eq(&friends["y"], &al));
    assert_eq!(label(&friends["y"]), "Al");
}

// -------------------------------------------------------------------------
// Mapped

#[test]
fn mapped_pairs_entries_by_key() {
    let recorder = Arc::new(Recorder::default());
    let services = ViewServices::default().with_listener(recorder.clone());
    let mut ctx = ScopeContext::new(&services, AccessMode::Write);
    let node = NodeBuilder::new().map(person_friends(), pet_type());
    let al = pet("Al");
    let owner = viewmap::entity(Person {
        friends: IndexMap::from([("x".to_string(), pet("Bo")), ("y".to_string(), al.clone())]),
        ..Person::default()
    });
    let (al_view, cy_view) = (pet_view("Al"), pet_view("Cy"));
    let entries = vec![("y".to_string(), &al_view), ("z".to_string(), &cy_view)];

    let got = reconcile_mapped(
        &owner,
        &entries,
        &PropertyMapManager::new(person_friends()),
        &mut PetBinder::default(),
        &node,
        &mut ctx,
    )
    .unwrap();
    assert_eq!(got, stats(1, 1, 0, 1));
    let friends = with_entity::<Person, _>(&owner, |p| p.friends.clone()).unwrap();
    assert_eq!(friends.keys().collect::<Vec<_>>(), ["y", "z"]);
    assert!(Rc::ptr_eq(&friends["y"], &al));
    assert_eq!(recorder.discarded(), ["Bo"]);
    assert_eq!(recorder.created(), ["Cy"]);
}

// -------------------------------------------------------------------------
// Properties

const NAMES: [&str; 6] = ["a", "b", "c", "d", "e", "f"];

fn name_lists() -> impl Strategy<Value = Vec<&'static str>> {
    proptest::sample::subsequence(NAMES.to_vec(), 0..=NAMES.len()).prop_shuffle()
}

proptest! {
    #[test]
    fn ordered_reconciliation_matches_the_view(m in name_lists(), v in name_lists()) {
        let services = ViewServices::default();
        let mut ctx = ScopeContext::new(&services, AccessMode::Write);
        let node = pets_array();
        let owner = person("Ann", &m);
        let before = pets_of(&owner);
        let manager = keyed_list();
        let objects = views(&v);
        let candidates: Vec<&ViewObject> = objects.iter().collect();

        let first = reconcile_ordered(&owner, &candidates, &manager, &mut PetBinder::default(), &node, &mut ctx).unwrap();
        prop_assert_eq!(pet_names(&owner), v.clone());
        prop_assert_eq!(first.created + first.updated, v.len());
        // Survivors keep their identity.
        for (after, name) in pets_of(&owner).iter().zip(&v) {
            if let Some(i) = m.iter().position(|n| n == name) {
                prop_assert!(Rc::ptr_eq(after, &before[i]));
            }
        }

        let second = reconcile_ordered(&owner, &candidates, &manager, &mut PetBinder::default(), &node, &mut ctx).unwrap();
        prop_assert_eq!(second, stats(0, v.len(), 0, 0));
        prop_assert_eq!(pet_names(&owner), v);
    }

    #[test]
    fn unordered_reconciliation_matches_the_view_as_a_set(m in name_lists(), v in name_lists()) {
        let services = ViewServices::default();
        let mut ctx = ScopeContext::new(&services, AccessMode::Write);
        let node = pets_array();
        let owner = person("Ann", &m);
        let objects = views(&v);
        let candidates: Vec<&ViewObject> = objects.iter().collect();

        let got = reconcile_unordered(&owner, &candidates, &keyed_list(), &mut PetBinder::default(), &node, &mut ctx).unwrap();
        let mut names = pet_names(&owner);
        names.sort();
        let mut expected: Vec<String> = v.iter().map(|s| s.to_string()).collect();
        expected.sort();
        prop_assert_eq!(names, expected);
        prop_assert_eq!(got.discarded, m.iter().filter(|n| !v.contains(*n)).count());
        prop_assert_eq!(got.created, v.iter().filter(|n| !m.contains(*n)).count());
    }
}
