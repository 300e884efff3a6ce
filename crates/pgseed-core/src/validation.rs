use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::graph::creation_order;
use crate::plan::Batch;
use crate::schema::{EntityDefinition, EntityKind};

/// Validate internal consistency of a closed set of entity definitions.
///
/// This checks:
/// - duplicate entities/columns
/// - primary key columns exist
/// - foreign key columns, referenced entities and referenced columns exist
/// - self-referencing foreign key columns are nullable
/// - nothing depends on an association entity
/// - the insert-dependency graph is acyclic
pub fn validate_definitions(definitions: &[EntityDefinition]) -> Result<()> {
    let mut catalog: BTreeMap<&str, (&EntityDefinition, BTreeSet<&str>)> = BTreeMap::new();

    for definition in definitions {
        let mut columns = BTreeSet::new();
        for column in &definition.columns {
            if !columns.insert(column.name.as_str()) {
                return Err(Error::InvalidDefinition(format!(
                    "duplicate column name: {}.{}",
                    definition.name, column.name
                )));
            }
        }

        if catalog
            .insert(definition.name.as_str(), (definition, columns))
            .is_some()
        {
            return Err(Error::InvalidDefinition(format!(
                "duplicate entity name: {}",
                definition.name
            )));
        }
    }

    for definition in definitions {
        let columns = &catalog[definition.name.as_str()].1;

        if definition.primary_key.columns.is_empty() {
            return Err(Error::InvalidDefinition(format!(
                "entity has no primary key: {}",
                definition.name
            )));
        }

        for column in &definition.primary_key.columns {
            if !columns.contains(column.as_str()) {
                return Err(Error::InvalidDefinition(format!(
                    "primary key column not found: {}.{}",
                    definition.name, column
                )));
            }
        }

        for fk in &definition.foreign_keys {
            for column in &fk.columns {
                if !columns.contains(column.as_str()) {
                    return Err(Error::InvalidDefinition(format!(
                        "foreign key column not found: {}.{}",
                        definition.name, column
                    )));
                }
            }

            // A row can only reach the root of a self-referencing chain if
            // the reference may be left empty.
            if fk.is_self_reference(&definition.name)
                && fk
                    .columns
                    .iter()
                    .filter_map(|column| definition.column(column))
                    .any(|column| !column.is_nullable)
            {
                return Err(Error::InvalidDefinition(format!(
                    "self reference must be nullable: {}({})",
                    definition.name,
                    fk.columns.join(", ")
                )));
            }

            let (referenced, ref_columns) = catalog
                .get(fk.referenced_entity.as_str())
                .ok_or_else(|| {
                    Error::InvalidDefinition(format!(
                        "referenced entity not found: {} (from {})",
                        fk.referenced_entity, definition.name
                    ))
                })?;

            if fk.columns.len() != fk.referenced_columns.len() {
                return Err(Error::InvalidDefinition(format!(
                    "foreign key arity mismatch: {}({}) -> {}({})",
                    definition.name,
                    fk.columns.join(", "),
                    fk.referenced_entity,
                    fk.referenced_columns.join(", ")
                )));
            }

            for column in &fk.referenced_columns {
                if !ref_columns.contains(column.as_str()) {
                    return Err(Error::InvalidDefinition(format!(
                        "referenced column not found: {}.{}",
                        fk.referenced_entity, column
                    )));
                }
            }

            if referenced.kind == EntityKind::Association {
                return Err(Error::InvalidDefinition(format!(
                    "{} references association entity {}",
                    definition.name, referenced.name
                )));
            }
        }
    }

    creation_order(definitions).map(|_| ())
}

/// Validate a batch against its entity definition before any destination work.
///
/// Unknown columns and rows that omit a non-nullable column are rejected here.
/// NULLs, types and key constraints are left to the destination.
pub fn validate_batch(definition: &EntityDefinition, batch: &Batch) -> Result<()> {
    for (index, row) in batch.rows.iter().enumerate() {
        for column in row.columns() {
            if definition.column(column).is_none() {
                return Err(Error::InvalidDefinition(format!(
                    "row {index} of {} has unknown column {column}",
                    definition.name
                )));
            }
        }

        for column in definition.columns.iter().filter(|column| !column.is_nullable) {
            if !row.contains(&column.name) {
                return Err(Error::InvalidDefinition(format!(
                    "row {index} of {} is missing required column {}",
                    definition.name, column.name
                )));
            }
        }
    }

    Ok(())
}
