//! Index definitions.

use crate::error::{Result, StorageError};
use indexmap::IndexMap;

/// Name every primary index is registered under.
pub const PRIMARY: &str = "primary";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    Primary,
    Unique,
    Index,
    Foreign,
}

impl IndexType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexType::Primary => "primary",
            IndexType::Unique => "unique",
            IndexType::Index => "index",
            IndexType::Foreign => "foreign",
        }
    }
}

/// Definition of one index.
///
/// For a foreign index `fields` maps each local field to the field it
/// references in `foreign_table`; for every other type the map's keys are
/// the indexed fields and the values repeat them.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDef {
    table: Option<String>,
    name: String,
    index_type: IndexType,
    fields: IndexMap<String, String>,
    foreign_table: Option<String>,
}

impl IndexDef {
    fn plain<I, S>(name: String, index_type: IndexType, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: IndexMap<String, String> = fields
            .into_iter()
            .map(|f| {
                let f = f.into();
                (f.clone(), f)
            })
            .collect();

        if fields.is_empty() {
            return Err(StorageError::Definition(format!(
                "no fields in {} index '{}'",
                index_type.as_str(),
                name
            )));
        }

        Ok(IndexDef {
            table: None,
            name,
            index_type,
            fields,
            foreign_table: None,
        })
    }

    pub fn primary<I, S>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::plain(PRIMARY.to_string(), IndexType::Primary, fields)
    }

    pub fn unique<I, S>(name: impl Into<String>, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::plain(name.into(), IndexType::Unique, fields)
    }

    pub fn index<I, S>(name: impl Into<String>, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::plain(name.into(), IndexType::Index, fields)
    }

    /// Foreign key from local fields to the fields of `table`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Definition` if `fields` is empty.
    pub fn foreign<I, L, F>(name: impl Into<String>, table: impl Into<String>, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (L, F)>,
        L: Into<String>,
        F: Into<String>,
    {
        let name = name.into();
        let fields: IndexMap<String, String> = fields
            .into_iter()
            .map(|(l, f)| (l.into(), f.into()))
            .collect();

        if fields.is_empty() {
            return Err(StorageError::Definition(format!(
                "no fields in foreign key '{name}'"
            )));
        }

        Ok(IndexDef {
            table: None,
            name,
            index_type: IndexType::Foreign,
            fields,
            foreign_table: Some(table.into()),
        })
    }

    pub(crate) fn set_table(&mut self, table: &str) {
        self.table = Some(table.to_string());
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    /// Referenced table of a foreign index.
    pub fn foreign_table(&self) -> Option<&str> {
        self.foreign_table.as_deref()
    }

    /// Local field names, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Local field to referenced field pairs of a foreign index.
    pub fn foreign_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(l, f)| (l.as_str(), f.as_str()))
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn is_primary(&self) -> bool {
        self.index_type == IndexType::Primary
    }

    pub fn is_unique(&self) -> bool {
        matches!(self.index_type, IndexType::Primary | IndexType::Unique)
    }
}
