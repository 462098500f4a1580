//! Association reconciliation.
//!
//! Each function brings one association of `owner` into agreement with the
//! view-derived candidates, going only through the manager capability it is
//! given. Creating and updating associates is delegated to an
//! [`AssociateBinder`] (normally the applicator, which recurses into the
//! node's children). Mutations already applied are not rolled back when a
//! later step fails.

use std::rc::Rc;

use tracing::debug;

use super::{
    ToManyAssociationManager, ToManyIndexedAssociationManager, ToManyMappedAssociationManager,
    ToOneAssociationManager,
};
use crate::context::ScopeContext;
use crate::error::Result;
use crate::event::ViewObject;
use crate::model::EntityRef;
use crate::node::Node;
use crate::pipeline;

/// Creates and updates associates on behalf of the reconciliation functions.
pub trait AssociateBinder {
    /// A fresh associate for `candidate`, not yet populated.
    fn new_associate(&mut self, candidate: &ViewObject, ctx: &mut ScopeContext<'_>) -> Result<EntityRef>;

    /// Writes `candidate` onto `associate`.
    fn inject(
        &mut self,
        associate: &EntityRef,
        candidate: &ViewObject,
        ctx: &mut ScopeContext<'_>,
    ) -> Result<()>;

    /// Whether `existing`, which the manager paired with `candidate`, may be
    /// updated in place. `false` replaces it: the old associate is discarded
    /// and a new one is created for the candidate.
    fn accepts(
        &mut self,
        _existing: &EntityRef,
        _candidate: &ViewObject,
        _ctx: &mut ScopeContext<'_>,
    ) -> Result<bool> {
        Ok(true)
    }
}

/// What a reconciliation did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub created: usize,
    pub updated: usize,
    pub relocated: usize,
    pub discarded: usize,
}

fn create(
    candidate: &ViewObject,
    binder: &mut dyn AssociateBinder,
    ctx: &mut ScopeContext<'_>,
) -> Result<EntityRef> {
    let associate = binder.new_associate(candidate, ctx)?;
    binder.inject(&associate, candidate, ctx)?;
    Ok(associate)
}

/// To-one: update in place when both the manager and the binder agree that
/// the candidate denotes the current associate, otherwise discard the current
/// one and install a new one.
pub fn reconcile_to_one(
    owner: &EntityRef,
    candidate: Option<&ViewObject>,
    manager: &dyn ToOneAssociationManager,
    binder: &mut dyn AssociateBinder,
    node: &Node,
    ctx: &mut ScopeContext<'_>,
) -> Result<ReconcileStats> {
    let mut stats = ReconcileStats::default();
    let current = manager.get(owner)?;
    let Some(candidate) = candidate else {
        if let Some(current) = current {
            pipeline::entity_discarded(owner, &current, node, ctx)?;
            manager.set(owner, None)?;
            stats.discarded += 1;
        }
        return Ok(stats);
    };

    if let Some(current) = &current {
        if manager.is_same_associate(owner, candidate, ctx)? && binder.accepts(current, candidate, ctx)? {
            binder.inject(current, candidate, ctx)?;
            stats.updated += 1;
            return Ok(stats);
        }
        pipeline::entity_discarded(owner, current, node, ctx)?;
        stats.discarded += 1;
    }
    let associate = create(candidate, binder, ctx)?;
    manager.set(owner, Some(associate.clone()))?;
    pipeline::entity_created(owner, &associate, node, ctx)?;
    stats.created += 1;
    Ok(stats)
}

/// Ordered to-many: afterwards the collection holds one associate per
/// candidate, in candidate order.
///
/// Left to right over the candidates: a missing associate is created and
/// inserted at its position; a found one is updated in place and, when it sits
/// elsewhere, moved by `remove_at` + `insert`. Leftovers past the last
/// candidate are removed from the tail. A match before the current position
/// belongs to an earlier, duplicate candidate and counts as missing. A match
/// the binder rejects is removed and replaced by a new associate.
pub fn reconcile_ordered(
    owner: &EntityRef,
    candidates: &[&ViewObject],
    manager: &dyn ToManyIndexedAssociationManager,
    binder: &mut dyn AssociateBinder,
    node: &Node,
    ctx: &mut ScopeContext<'_>,
) -> Result<ReconcileStats> {
    manager.begin(owner)?;
    let result = ordered_body(owner, candidates, manager, binder, node, ctx);
    let ended = manager.end(owner);
    let stats = result?;
    ended?;
    debug!(
        path = %ctx.path_string(),
        created = stats.created,
        updated = stats.updated,
        relocated = stats.relocated,
        discarded = stats.discarded,
        "reconciled ordered association"
    );
    Ok(stats)
}

fn ordered_body(
    owner: &EntityRef,
    candidates: &[&ViewObject],
    manager: &dyn ToManyIndexedAssociationManager,
    binder: &mut dyn AssociateBinder,
    node: &Node,
    ctx: &mut ScopeContext<'_>,
) -> Result<ReconcileStats> {
    let mut stats = ReconcileStats::default();
    for (position, candidate) in candidates.iter().copied().enumerate() {
        let matched = match manager.index_of(owner, candidate, ctx)? {
            Some(found) if found >= position => {
                let existing = manager.get(owner, found)?;
                if binder.accepts(&existing, candidate, ctx)? {
                    Some((found, existing))
                } else {
                    // Rejected: leaves its slot before the replacement is inserted.
                    manager.remove_at(owner, found)?;
                    pipeline::entity_discarded(owner, &existing, node, ctx)?;
                    stats.discarded += 1;
                    None
                }
            }
            _ => None,
        };
        match matched {
            Some((found, existing)) => {
                binder.inject(&existing, candidate, ctx)?;
                if found > position {
                    let moved = manager.remove_at(owner, found)?;
                    manager.insert(owner, position, moved)?;
                    stats.relocated += 1;
                }
                stats.updated += 1;
            }
            None => {
                let associate = create(candidate, binder, ctx)?;
                manager.insert(owner, position, associate.clone())?;
                pipeline::entity_created(owner, &associate, node, ctx)?;
                stats.created += 1;
            }
        }
    }
    let mut size = manager.size(owner)?;
    while size > candidates.len() {
        let last = size - 1;
        let extra = manager.get(owner, last)?;
        manager.remove_at(owner, last)?;
        pipeline::entity_discarded(owner, &extra, node, ctx)?;
        stats.discarded += 1;
        size = manager.size(owner)?;
    }
    Ok(stats)
}

/// Unordered to-many: identity, not position, pairs candidates with
/// associates. Anything not matched or created is removed afterwards.
pub fn reconcile_unordered(
    owner: &EntityRef,
    candidates: &[&ViewObject],
    manager: &dyn ToManyAssociationManager,
    binder: &mut dyn AssociateBinder,
    node: &Node,
    ctx: &mut ScopeContext<'_>,
) -> Result<ReconcileStats> {
    manager.begin(owner)?;
    let result = unordered_body(owner, candidates, manager, binder, node, ctx);
    let ended = manager.end(owner);
    let stats = result?;
    ended?;
    debug!(
        path = %ctx.path_string(),
        created = stats.created,
        updated = stats.updated,
        discarded = stats.discarded,
        "reconciled unordered association"
    );
    Ok(stats)
}

fn unordered_body(
    owner: &EntityRef,
    candidates: &[&ViewObject],
    manager: &dyn ToManyAssociationManager,
    binder: &mut dyn AssociateBinder,
    node: &Node,
    ctx: &mut ScopeContext<'_>,
) -> Result<ReconcileStats> {
    let mut stats = ReconcileStats::default();
    let mut kept: Vec<EntityRef> = Vec::with_capacity(candidates.len());
    for candidate in candidates.iter().copied() {
        let existing = match manager.find_associate(owner, candidate, ctx)? {
            Some(existing) if binder.accepts(&existing, candidate, ctx)? => Some(existing),
            _ => None,
        };
        match existing {
            Some(existing) => {
                binder.inject(&existing, candidate, ctx)?;
                stats.updated += 1;
                kept.push(existing);
            }
            None => {
                let associate = create(candidate, binder, ctx)?;
                manager.add(owner, associate.clone())?;
                pipeline::entity_created(owner, &associate, node, ctx)?;
                stats.created += 1;
                kept.push(associate);
            }
        }
    }
    for item in manager.iter(owner)? {
        if kept.iter().any(|k| Rc::ptr_eq(k, &item)) {
            continue;
        }
        manager.remove(owner, &item)?;
        pipeline::entity_discarded(owner, &item, node, ctx)?;
        stats.discarded += 1;
    }
    Ok(stats)
}

/// Keyed to-many: the map key pairs candidates with associates.
pub fn reconcile_mapped(
    owner: &EntityRef,
    entries: &[(String, &ViewObject)],
    manager: &dyn ToManyMappedAssociationManager,
    binder: &mut dyn AssociateBinder,
    node: &Node,
    ctx: &mut ScopeContext<'_>,
) -> Result<ReconcileStats> {
    manager.begin(owner)?;
    let result = mapped_body(owner, entries, manager, binder, node, ctx);
    let ended = manager.end(owner);
    let stats = result?;
    ended?;
    debug!(
        path = %ctx.path_string(),
        created = stats.created,
        updated = stats.updated,
        discarded = stats.discarded,
        "reconciled mapped association"
    );
    Ok(stats)
}

fn mapped_body(
    owner: &EntityRef,
    entries: &[(String, &ViewObject)],
    manager: &dyn ToManyMappedAssociationManager,
    binder: &mut dyn AssociateBinder,
    node: &Node,
    ctx: &mut ScopeContext<'_>,
) -> Result<ReconcileStats> {
    let mut stats = ReconcileStats::default();
    for (key, candidate) in entries {
        let existing = manager.get(owner, key)?;
        if let Some(existing) = &existing {
            if binder.accepts(existing, candidate, ctx)? {
                binder.inject(existing, candidate, ctx)?;
                stats.updated += 1;
                continue;
            }
        }
        let associate = create(candidate, binder, ctx)?;
        if let Some(replaced) = manager.put(owner, key.clone(), associate.clone())? {
            pipeline::entity_discarded(owner, &replaced, node, ctx)?;
            stats.discarded += 1;
        }
        pipeline::entity_created(owner, &associate, node, ctx)?;
        stats.created += 1;
    }
    for key in manager.keys(owner)? {
        if entries.iter().any(|(k, _)| *k == key) {
            continue;
        }
        if let Some(removed) = manager.remove(owner, &key)? {
            pipeline::entity_discarded(owner, &removed, node, ctx)?;
            stats.discarded += 1;
        }
    }
    Ok(stats)
}
