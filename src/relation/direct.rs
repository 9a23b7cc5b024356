//! One and many relations: the target table holds the owner's key.

use super::{same_row, Identity, Relation};
use crate::entity::Entity;
use crate::error::{Result, StorageError};
use crate::storage::Storage;
use indexmap::IndexSet;
use std::collections::HashMap;

fn hop_key(relation: &Relation, row: &Entity) -> Option<Identity> {
    Identity::of(row, relation.hop_fields.iter().map(String::as_str))
}

fn missing_key(relation: &Relation) -> StorageError {
    StorageError::relation(
        relation.name(),
        format!("owner has related data but no value for {:?}", relation.owner_fields),
    )
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

    let mut related: HashMap<Identity, Vec<Entity>> = HashMap::new();
    if !wanted.is_empty() {
        let rows = relation.fetch(
            storage,
            relation.target(),
            &relation.hop_fields,
            &wanted,
            true,
            Some(relation.scope()),
        )?;
        for row in rows {
            if let Some(key) = hop_key(relation, &row) {
                related.entry(key).or_default().push(row);
            }
        }
    }

    Ok(owners
        .into_iter()
        .zip(keys)
        .map(|(mut owner, key)| {
            let items = key.and_then(|key| related.get(&key).cloned()).unwrap_or_default();
            relation.fill(&mut owner, items);
            owner
        })
        .collect())
}

pub(super) fn write(relation: &Relation, storage: &Storage, owners: Vec<Entity>) -> Result<Vec<Entity>> {
    let target = relation.target();
    let mut processed = IndexSet::new();
    let mut written = Vec::new();
    let mut result = Vec::with_capacity(owners.len());

    for mut owner in owners {
        let Some(items) = relation.container_items(&owner)? else {
            result.push(owner);
            continue;
        };
        let Some(key) = relation.owner_key(&owner)? else {
            if relation.participates(&owner) && !items.is_empty() {
                return Err(missing_key(relation));
            }
            result.push(owner);
            continue;
        };

        let mut saved = Vec::with_capacity(items.len());
        for mut item in items {
            for (field, value) in relation.hop_fields.iter().zip(key.iter()) {
                item.set(field.as_str(), value.clone());
            }
            for (field, value) in &relation.foreign_values {
                item.set(field.as_str(), value.clone());
            }
            let item = storage
                .write(target.entity(), item.clone())
                .nested(relation.scope())
                .one()?
                .unwrap_or(item);
            written.push(item.clone());
            saved.push(item);
        }
        processed.insert(key);
        relation.fill(&mut owner, saved);
        result.push(owner);
    }

    if processed.is_empty() {
        return Ok(result);
    }

    // rows still pointing at a processed owner but no longer in its container
    let existing = relation.fetch(storage, target, &relation.hop_fields, &processed, true, None)?;
    let mut pruned = 0usize;
    for row in existing {
        let owned = hop_key(relation, &row).is_some_and(|key| processed.contains(&key));
        if owned && !written.iter().any(|w| same_row(target, w, &row)) {
            storage.delete(target.entity(), row).execute()?;
            pruned += 1;
        }
    }
    log::trace!("{}: pruned {} stale row(s)", relation.name(), pruned);
    Ok(result)
}

pub(super) fn delete(relation: &Relation, storage: &Storage, owners: Vec<Entity>) -> Result<Vec<Entity>> {
    let target = relation.target();
    for owner in &owners {
        if !relation.participates(owner) {
            continue;
        }
        let Some(items) = relation.container_items(owner)? else {
            continue;
        };
        for item in items {
            storage
                .delete(target.entity(), item)
                .nested(relation.scope())
                .execute()?;
        }
    }
    Ok(owners)
}
