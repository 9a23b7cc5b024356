//! Entity models.
//!
//! A [`Model`] describes one entity: the table it lives in, its fields,
//! indexes and relations. Models are built once, validated as a whole and
//! then shared read-only through the [`ModelBag`].
//!
//! # Example
//!
//! ```no_run
//! use mooring::model::{FieldDef, FieldType, IndexDef, Model, RelationDef, Attribute};
//!
//! let post = Model::new(
//!     "post",
//!     "posts",
//!     vec![
//!         FieldDef::new("id", FieldType::Integer).attribute(Attribute::AutoIncrement),
//!         FieldDef::new("title", FieldType::String),
//!     ],
//!     vec![IndexDef::primary(["id"])?],
//!     vec![RelationDef::many_through("tags", "tag", "post_tag", [("id", "post_id")], [("tag_id", "id")])?],
//! )?;
//! assert_eq!(post.primary_fields().len(), 1);
//! # Ok::<(), mooring::StorageError>(())
//! ```

pub mod bag;
pub mod field;
pub mod index;
pub mod relation;

pub use bag::ModelBag;
pub use field::{Attribute, FieldDef, FieldType};
pub use index::{IndexDef, IndexType, PRIMARY};
pub use relation::{RelationDef, RelationType};

use crate::error::{Lookup, Result, StorageError};
use indexmap::IndexMap;

/// Description of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    entity: String,
    table: String,
    fields: IndexMap<String, FieldDef>,
    indexes: IndexMap<String, IndexDef>,
    relations: IndexMap<String, RelationDef>,
}

impl Model {
    /// Build and validate a model.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Definition` if a field name repeats, or if an
    /// index or relation refers to a field that is not declared. Nothing is
    /// returned in that case; there is no partially built model.
    pub fn new(
        entity: impl Into<String>,
        table: impl Into<String>,
        fields: Vec<FieldDef>,
        indexes: Vec<IndexDef>,
        relations: Vec<RelationDef>,
    ) -> Result<Self> {
        let entity = entity.into();
        let table = table.into();

        let mut field_map = IndexMap::with_capacity(fields.len());
        for mut field in fields {
            field.set_table(&table);
            let name = field.name().to_string();
            if field_map.insert(name.clone(), field).is_some() {
                return Err(StorageError::Definition(format!(
                    "duplicate field '{name}' in entity '{entity}'"
                )));
            }
        }

        let mut index_map = IndexMap::with_capacity(indexes.len());
        for mut index in indexes {
            if let Some(missing) = index.fields().find(|f| !field_map.contains_key(*f)) {
                return Err(StorageError::Definition(format!(
                    "index '{}' in entity '{entity}' uses unknown field '{missing}'",
                    index.name()
                )));
            }
            if index.index_type() != IndexType::Foreign {
                index.set_table(&table);
            }
            let name = index.name().to_string();
            if index_map.insert(name.clone(), index).is_some() {
                return Err(StorageError::Definition(format!(
                    "duplicate index '{name}' in entity '{entity}'"
                )));
            }
        }

        let mut relation_map = IndexMap::with_capacity(relations.len());
        for relation in relations {
            let missing = relation
                .local_keys()
                .map(|(local, _)| local)
                .chain(relation.local_values_map().keys().map(String::as_str))
                .find(|f| !field_map.contains_key(*f))
                .map(str::to_string);
            if let Some(missing) = missing {
                return Err(StorageError::Definition(format!(
                    "relation '{}' in entity '{entity}' uses unknown field '{missing}'",
                    relation.name()
                )));
            }
            let name = relation.name().to_string();
            if relation_map.insert(name.clone(), relation).is_some() {
                return Err(StorageError::Definition(format!(
                    "duplicate relation '{name}' in entity '{entity}'"
                )));
            }
        }

        Ok(Model {
            entity,
            table,
            fields: field_map,
            indexes: index_map,
            relations: relation_map,
        })
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.values()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field(&self, name: &str) -> Result<&FieldDef> {
        self.fields
            .get(name)
            .ok_or_else(|| StorageError::not_found(Lookup::Field, name, &self.entity))
    }

    /// Field stored in `column`, matching either a mapped column or a field name.
    pub fn column_field(&self, column: &str) -> Option<&FieldDef> {
        self.fields
            .get(column)
            .or_else(|| self.fields.values().find(|f| f.column() == column))
    }

    pub fn auto_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.values().filter(|f| f.is_auto_increment())
    }

    pub fn is_primary(&self, field: &str) -> Result<bool> {
        self.field(field)?;
        Ok(self
            .indexes
            .values()
            .any(|i| i.is_primary() && i.has_field(field)))
    }

    /// Fields of the primary index, in the index's declared order.
    /// Empty when no primary index is declared.
    pub fn primary_fields(&self) -> Vec<&FieldDef> {
        self.indexes
            .values()
            .find(|i| i.is_primary())
            .map(|primary| primary.fields().filter_map(|f| self.fields.get(f)).collect())
            .unwrap_or_default()
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.indexes.contains_key(name)
    }

    /// Whether `field` is covered by any index.
    pub fn is_index(&self, field: &str) -> Result<bool> {
        self.field(field)?;
        Ok(self.indexes.values().any(|i| i.has_field(field)))
    }

    /// Every index covering `field`.
    pub fn in_index(&self, field: &str) -> Result<Vec<&IndexDef>> {
        self.field(field)?;
        Ok(self.indexes.values().filter(|i| i.has_field(field)).collect())
    }

    /// Fields covered by at least one index, in field declaration order.
    pub fn index_fields(&self) -> Vec<&FieldDef> {
        self.fields
            .values()
            .filter(|f| self.indexes.values().any(|i| i.has_field(f.name())))
            .collect()
    }

    pub fn indexes(&self) -> impl Iterator<Item = &IndexDef> {
        self.indexes.values()
    }

    pub fn index(&self, name: &str) -> Result<&IndexDef> {
        self.indexes
            .get(name)
            .ok_or_else(|| StorageError::not_found(Lookup::Index, name, &self.entity))
    }

    pub fn has_relations(&self) -> bool {
        !self.relations.is_empty()
    }

    pub fn has_relation(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    pub fn relations(&self) -> impl Iterator<Item = &RelationDef> {
        self.relations.values()
    }

    pub fn relation(&self, name: &str) -> Result<&RelationDef> {
        self.relations
            .get(name)
            .ok_or_else(|| StorageError::not_found(Lookup::Relation, name, &self.entity))
    }
}
