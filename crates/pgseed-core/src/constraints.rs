use serde::{Deserialize, Serialize};

/// Primary key definition preserving column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKey {
    pub columns: Vec<String>,
}

impl PrimaryKey {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Constraint name following the Postgres default (`<table>_pkey`).
    pub fn constraint_name(&self, entity: &str) -> String {
        format!("{entity}_pkey")
    }
}

/// Foreign key definition preserving column ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub referenced_entity: String,
    pub referenced_columns: Vec<String>,
}

impl ForeignKey {
    /// Single-column foreign key with a generated constraint name.
    pub fn new(column: &str, referenced_entity: &str, referenced_column: &str) -> Self {
        Self {
            name: None,
            columns: vec![column.to_string()],
            referenced_entity: referenced_entity.to_string(),
            referenced_columns: vec![referenced_column.to_string()],
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_self_reference(&self, owner: &str) -> bool {
        self.referenced_entity == owner
    }

    /// Explicit name, or the Postgres default `<table>_<columns>_fkey`.
    pub fn constraint_name(&self, owner: &str) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{owner}_{}_fkey", self.columns.join("_")),
        }
    }
}

/// How an entity relates to the entity a foreign key points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// An attribute on the entity itself references another entity's key.
    DirectForeignKey,
    /// The owning entity only exists to pair two keys.
    Association,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_constraint_names_follow_postgres() {
        let fk = ForeignKey::new("author_id", "authors", "id");
        assert_eq!(fk.constraint_name("book_authors"), "book_authors_author_id_fkey");
        assert_eq!(
            fk.named("fk_author").constraint_name("book_authors"),
            "fk_author"
        );
        assert_eq!(PrimaryKey::new(["isbn"]).constraint_name("books"), "books_pkey");
    }
}
