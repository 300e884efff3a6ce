use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::graph::{build_adjacency, layered_toposort};
use crate::schema::{EntityDefinition, find_definition};
use crate::types::Row;
use crate::validation::{validate_batch, validate_definitions};

/// Ordered rows of a single entity supplied for one load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub entity: String,
    pub rows: Vec<Row>,
}

impl Batch {
    pub fn new(entity: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            entity: entity.into(),
            rows,
        }
    }
}

/// A batch together with its position in the caller-supplied order.
#[derive(Debug, Clone)]
pub struct PlannedBatch {
    pub position: usize,
    pub batch: Batch,
}

/// Batches whose dependencies are all satisfied by earlier tiers.
#[derive(Debug, Clone)]
pub struct Tier {
    pub index: usize,
    pub batches: Vec<PlannedBatch>,
}

impl Tier {
    pub fn row_count(&self) -> usize {
        self.batches.iter().map(|planned| planned.batch.rows.len()).sum()
    }

    pub fn entities(&self) -> Vec<String> {
        self.batches
            .iter()
            .map(|planned| planned.batch.entity.clone())
            .collect()
    }
}

/// Serializable view of a tier used for logs and `pgseed plan`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierSummary {
    pub index: usize,
    pub entities: Vec<String>,
    pub rows: usize,
}

/// Partition of a load's batches into ordered insertion tiers.
#[derive(Debug, Clone, Default)]
pub struct LoadPlan {
    pub tiers: Vec<Tier>,
}

impl LoadPlan {
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    pub fn batch_count(&self) -> usize {
        self.tiers.iter().map(|tier| tier.batches.len()).sum()
    }

    pub fn row_count(&self) -> usize {
        self.tiers.iter().map(Tier::row_count).sum()
    }

    pub fn summary(&self) -> Vec<TierSummary> {
        self.tiers
            .iter()
            .map(|tier| TierSummary {
                index: tier.index,
                entities: tier.entities(),
                rows: tier.row_count(),
            })
            .collect()
    }
}

/// Compute the tiered load plan for `batches`.
///
/// Standard entities are layered by their foreign keys among the entities
/// being loaded; references to entities outside the batch set count as
/// satisfied and self references are ignored. Association batches always form
/// the final tier. Within a tier, batches keep the caller's order.
pub fn plan_load(definitions: &[EntityDefinition], batches: Vec<Batch>) -> Result<LoadPlan> {
    validate_definitions(definitions)?;

    let mut standard: Vec<&EntityDefinition> = Vec::new();
    for batch in &batches {
        let definition = find_definition(definitions, &batch.entity).ok_or_else(|| {
            Error::InvalidDefinition(format!("batch for unknown entity: {}", batch.entity))
        })?;
        validate_batch(definition, batch)?;

        if !definition.is_association()
            && !standard.iter().any(|known| known.name == definition.name)
        {
            standard.push(definition);
        }
    }

    let layers = layered_toposort(&build_adjacency(&standard)).map_err(Error::Cycle)?;
    let levels: BTreeMap<String, usize> = layers
        .iter()
        .enumerate()
        .flat_map(|(level, names)| names.iter().map(move |name| (name.clone(), level)))
        .collect();
    let association_level = layers.len();

    let mut grouped: Vec<Vec<PlannedBatch>> = (0..=association_level).map(|_| Vec::new()).collect();
    for (position, batch) in batches.into_iter().enumerate() {
        let level = match levels.get(&batch.entity) {
            Some(level) => *level,
            None => association_level,
        };
        grouped[level].push(PlannedBatch { position, batch });
    }

    let tiers = grouped
        .into_iter()
        .filter(|batches| !batches.is_empty())
        .enumerate()
        .map(|(index, batches)| Tier { index, batches })
        .collect();

    Ok(LoadPlan { tiers })
}
