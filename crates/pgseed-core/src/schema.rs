use serde::{Deserialize, Serialize};

use crate::constraints::{ForeignKey, PrimaryKey, RelationshipKind};
use crate::types::ColumnType;

/// A named, closed set of entity definitions reset and loaded together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    pub definitions: Vec<EntityDefinition>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, definitions: Vec<EntityDefinition>) -> Self {
        Self {
            name: name.into(),
            definitions,
        }
    }
}

/// Role an entity plays in the insert-dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Standard,
    /// Many-to-many link record; always inserted in the last tier.
    Association,
}

/// A record type with a primary key and zero or more foreign keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub name: String,
    pub kind: EntityKind,
    pub columns: Vec<Column>,
    pub primary_key: PrimaryKey,
    pub foreign_keys: Vec<ForeignKey>,
}

impl EntityDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntityKind::Standard,
            columns: Vec::new(),
            primary_key: PrimaryKey::default(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn association(name: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Association,
            ..Self::new(name)
        }
    }

    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = PrimaryKey::new(columns.iter().copied());
        self
    }

    pub fn with_foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    pub fn is_association(&self) -> bool {
        self.kind == EntityKind::Association
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Foreign keys paired with the relationship kind they express.
    pub fn relationships(&self) -> impl Iterator<Item = (RelationshipKind, &ForeignKey)> {
        let kind = match self.kind {
            EntityKind::Standard => RelationshipKind::DirectForeignKey,
            EntityKind::Association => RelationshipKind::Association,
        };
        self.foreign_keys.iter().map(move |fk| (kind, fk))
    }

    /// Names of other entities this one must be inserted after.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.foreign_keys
            .iter()
            .filter(|fk| !fk.is_self_reference(&self.name))
            .map(|fk| fk.referenced_entity.as_str())
    }
}

/// Column metadata for an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub is_nullable: bool,
}

impl Column {
    /// Non-nullable column.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            is_nullable: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.is_nullable = true;
        self
    }
}

pub fn find_definition<'a>(
    definitions: &'a [EntityDefinition],
    name: &str,
) -> Option<&'a EntityDefinition> {
    definitions.iter().find(|definition| definition.name == name)
}
