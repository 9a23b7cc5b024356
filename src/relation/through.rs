//! One-through and many-through relations: a mediator table links owner keys
//! to target keys.
//!
//! A read costs two statements whatever the number of owners: the mediator
//! rows for every owner key, then the targets for every linked key. Writes
//! store each target, read the mediator rows of the processed owners once,
//! insert the (owner, target) pairs that are missing and drop those no
//! longer held by a container.

use super::{coerce_identity, Identity, Relation};
use crate::entity::Entity;
use crate::error::{Result, StorageError};
use crate::model::Model;
use crate::query::Condition;
use crate::storage::Storage;
use indexmap::{IndexMap, IndexSet};
use std::collections::{HashMap, HashSet};

fn mediator(relation: &Relation) -> &Model {
    relation.first_hop()
}

fn owner_side(relation: &Relation, row: &Entity) -> Option<Identity> {
    Identity::of(row, relation.hop_fields.iter().map(String::as_str))
}

fn target_side(relation: &Relation, row: &Entity) -> Option<Identity> {
    Identity::of(row, relation.link_fields.iter().map(String::as_str))
}

/// Delete the mediator row linking `owner` to `target`.
fn unlink(relation: &Relation, storage: &Storage, owner: &Identity, target: &Identity) -> Result<u64> {
    let mut query = storage.delete_where(mediator(relation).entity());
    let keys = relation
        .hop_fields
        .iter()
        .zip(owner.iter())
        .chain(relation.link_fields.iter().zip(target.iter()));
    for (field, value) in keys {
        query = query.constrain(Condition::eq(field.clone(), value.clone()));
    }
    for (field, value) in &relation.foreign_values {
        query = query.constrain(Condition::eq(field.clone(), value.clone()));
    }
    query.execute().map(|outcome| outcome.count())
}

pub(super) fn read(relation: &Relation, storage: &Storage, owners: Vec<Entity>) -> Result<Vec<Entity>> {
    let mut keys = Vec::with_capacity(owners.len());
    let mut wanted = IndexSet::new();
    for owner in &owners {
        let key = relation.owner_key(owner)?;
        if let Some(key) = &key {
            wanted.insert(key.clone());
        }
        keys.push(key);
    }

    // owner key -> target keys, in mediator fetch order
    let mut links: HashMap<Identity, Vec<Identity>> = HashMap::new();
    let mut linked = IndexSet::new();
    if !wanted.is_empty() {
        let rows = relation.fetch(storage, mediator(relation), &relation.hop_fields, &wanted, true, None)?;
        for row in rows {
            let (Some(owner), Some(target)) = (owner_side(relation, &row), target_side(relation, &row)) else {
                continue;
            };
            let target = coerce_identity(relation.target(), &relation.target_fields, target)?;
            linked.insert(target.clone());
            links.entry(owner).or_default().push(target);
        }
    }

    let mut targets: IndexMap<Identity, Vec<Entity>> = IndexMap::new();
    if !linked.is_empty() {
        let rows = relation.fetch(
            storage,
            relation.target(),
            &relation.target_fields,
            &linked,
            false,
            Some(relation.scope()),
        )?;
        for row in rows {
            if let Some(key) = Identity::of(&row, relation.target_fields.iter().map(String::as_str)) {
                targets.entry(key).or_default().push(row);
            }
        }
    }
    log::trace!(
        "{}: {} link(s) to {} target key(s), {} fetched",
        relation.name(),
        links.values().map(Vec::len).sum::<usize>(),
        linked.len(),
        targets.len()
    );

    // an explicit order on the target wins over mediator order
    let target_order = !relation.scope().orders().is_empty();

    Ok(owners
        .into_iter()
        .zip(keys)
        .map(|(mut owner, key)| {
            let items = match key.and_then(|key| links.get(&key)) {
                None => Vec::new(),
                Some(linked) if target_order => {
                    let linked: HashSet<&Identity> = linked.iter().collect();
                    targets
                        .iter()
                        .filter(|(key, _)| linked.contains(key))
                        .flat_map(|(_, rows)| rows.iter().cloned())
                        .collect()
                }
                Some(linked) => linked
                    .iter()
                    .filter_map(|key| targets.get(key))
                    .flat_map(|rows| rows.iter().cloned())
                    .collect(),
            };
            relation.fill(&mut owner, items);
            owner
        })
        .collect())
}

/// Mediator row for `owner` and `target`, with the relation's foreign values.
fn link_row(relation: &Relation, owner: &Identity, target: &Identity) -> Entity {
    let mut link = Entity::new();
    let keys = relation
        .hop_fields
        .iter()
        .zip(owner.iter())
        .chain(relation.link_fields.iter().zip(target.iter()));
    for (field, value) in keys {
        link.set(field.as_str(), value.clone());
    }
    for (field, value) in &relation.foreign_values {
        link.set(field.as_str(), value.clone());
    }
    link
}

pub(super) fn write(relation: &Relation, storage: &Storage, owners: Vec<Entity>) -> Result<Vec<Entity>> {
    let mediator = mediator(relation);
    let target = relation.target();
    let mut processed = IndexSet::new();
    // (owner key, mediator-side target key) pairs held by the containers
    let mut wanted: IndexSet<(Identity, Identity)> = IndexSet::new();
    let mut result = Vec::with_capacity(owners.len());

    for mut owner in owners {
        let Some(items) = relation.container_items(&owner)? else {
            result.push(owner);
            continue;
        };
        let Some(key) = relation.owner_key(&owner)? else {
            if relation.participates(&owner) && !items.is_empty() {
                return Err(StorageError::relation(
                    relation.name(),
                    format!("owner has related data but no value for {:?}", relation.owner_fields),
                ));
            }
            result.push(owner);
            continue;
        };

        let mut saved = Vec::with_capacity(items.len());
        for item in items {
            let item = storage
                .write(target.entity(), item.clone())
                .nested(relation.scope())
                .one()?
                .unwrap_or(item);
            let target_key = Identity::of(&item, relation.target_fields.iter().map(String::as_str))
                .ok_or_else(|| {
                    StorageError::relation(
                        relation.name(),
                        format!(
                            "written '{}' has no value for {:?}, cannot link it",
                            target.entity(),
                            relation.target_fields
                        ),
                    )
                })?;
            let link_key = coerce_identity(mediator, &relation.link_fields, target_key)?;
            wanted.insert((key.clone(), link_key));
            saved.push(item);
        }
        processed.insert(key);
        relation.fill(&mut owner, saved);
        result.push(owner);
    }

    if processed.is_empty() {
        return Ok(result);
    }

    // links match on their key tuple, never on the mediator's primary key
    let rows = relation.fetch(storage, mediator, &relation.hop_fields, &processed, true, None)?;
    let mut existing: IndexSet<(Identity, Identity)> = IndexSet::new();
    for row in rows {
        if let (Some(owner), Some(linked)) = (owner_side(relation, &row), target_side(relation, &row)) {
            if processed.contains(&owner) {
                existing.insert((owner, linked));
            }
        }
    }

    let mut linked = 0usize;
    for (owner, link) in wanted.iter().filter(|pair| !existing.contains(*pair)) {
        storage.insert(mediator.entity(), link_row(relation, owner, link)).execute()?;
        linked += 1;
    }
    let mut unlinked = 0u64;
    for (owner, linked) in existing.iter().filter(|pair| !wanted.contains(*pair)) {
        unlinked += unlink(relation, storage, owner, linked)?;
    }
    log::trace!(
        "{}: {} link(s) added, {} stale link(s) removed",
        relation.name(),
        linked,
        unlinked
    );
    Ok(result)
}

pub(super) fn delete(relation: &Relation, storage: &Storage, owners: Vec<Entity>) -> Result<Vec<Entity>> {
    let mediator = mediator(relation);
    for owner in &owners {
        let Some(items) = relation.container_items(owner)? else {
            continue;
        };
        let Some(key) = relation.owner_key(owner)? else {
            continue;
        };
        for item in &items {
            let Some(target) = Identity::of(item, relation.target_fields.iter().map(String::as_str)) else {
                continue;
            };
            let link = coerce_identity(mediator, &relation.link_fields, target)?;
            unlink(relation, storage, &key, &link)?;
        }
    }
    Ok(owners)
}
