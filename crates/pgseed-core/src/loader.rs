use serde::{Deserialize, Serialize};

use crate::error::{Error, LoadError, Result};
use crate::lifecycle::{ResetReport, lookup, reset};
use crate::plan::{Batch, LoadPlan, Tier, plan_load};
use crate::schema::EntityDefinition;
use crate::session::Session;
use crate::transaction::TransactionScope;

/// Rows inserted per tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierReport {
    pub index: usize,
    pub entities: Vec<String>,
    pub rows: u64,
}

/// Outcome of a successful load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadReport {
    pub tiers: Vec<TierReport>,
    pub total_rows: u64,
    /// False when the load joined a transaction opened by the caller, in
    /// which case nothing is committed until that outer scope commits.
    pub owned_transaction: bool,
}

/// Insert `batches` tier by tier inside one transaction scope.
///
/// Every tier is flushed before the next one starts. Any insert or flush
/// failure rolls back the outermost scope and is reported as a [`LoadError`]
/// naming the tier and caller-supplied batch position.
pub async fn load<S: Session + ?Sized>(
    session: &mut S,
    definitions: &[EntityDefinition],
    batches: Vec<Batch>,
) -> Result<LoadReport> {
    let plan = plan_load(definitions, batches)?;
    tracing::info!(
        event = "load_planned",
        tiers = plan.tiers.len(),
        batches = plan.batch_count(),
        rows = plan.row_count()
    );

    let mut scope = TransactionScope::acquire(session).await?;
    let owned_transaction = scope.is_outermost();

    match insert_tiers(scope.session(), definitions, &plan).await {
        Ok(tiers) => {
            scope.commit().await?;
            let total_rows = tiers.iter().map(|tier| tier.rows).sum();
            if owned_transaction {
                tracing::info!(event = "load_committed", rows = total_rows);
            } else {
                tracing::info!(event = "load_joined_outer_scope", rows = total_rows);
            }
            Ok(LoadReport {
                tiers,
                total_rows,
                owned_transaction,
            })
        }
        Err(err) => {
            if owned_transaction {
                tracing::error!(event = "load_rolled_back", error = %err);
            } else {
                tracing::warn!(event = "load_marked_rollback_only", error = %err);
            }
            if let Err(rollback_err) = scope.rollback().await {
                tracing::warn!(event = "rollback_failed", error = %rollback_err);
            }
            Err(err)
        }
    }
}

/// Reset the dataset and load `batches` as one all-or-nothing unit.
pub async fn reset_and_load<S: Session + ?Sized>(
    session: &mut S,
    definitions: &[EntityDefinition],
    batches: Vec<Batch>,
) -> Result<(ResetReport, LoadReport)> {
    let mut scope = TransactionScope::acquire(session).await?;

    let outcome = match reset(scope.session(), definitions).await {
        Ok(reset_report) => load(scope.session(), definitions, batches)
            .await
            .map(|load_report| (reset_report, load_report)),
        Err(err) => Err(err),
    };

    match outcome {
        Ok(reports) => {
            scope.commit().await?;
            Ok(reports)
        }
        Err(err) => {
            if let Err(rollback_err) = scope.rollback().await {
                tracing::warn!(event = "rollback_failed", error = %rollback_err);
            }
            Err(err)
        }
    }
}

async fn insert_tiers<S: Session + ?Sized>(
    session: &mut S,
    definitions: &[EntityDefinition],
    plan: &LoadPlan,
) -> Result<Vec<TierReport>> {
    let mut reports = Vec::with_capacity(plan.tiers.len());

    for tier in &plan.tiers {
        tracing::debug!(event = "tier_started", tier = tier.index, batches = tier.batches.len());
        let mut rows = 0;

        for planned in &tier.batches {
            let entity = &planned.batch.entity;
            let definition = lookup(definitions, entity)?;
            let inserted = session
                .insert_rows(definition, &planned.batch.rows)
                .await
                .map_err(|cause| load_error(tier, planned.position, entity, cause))?;
            rows += inserted;
            tracing::debug!(
                event = "batch_inserted",
                tier = tier.index,
                batch = planned.position,
                entity = %entity,
                rows = inserted
            );
        }

        session.flush().await.map_err(|cause| {
            let (position, entity) = tier
                .batches
                .last()
                .map(|planned| (planned.position, planned.batch.entity.as_str()))
                .unwrap_or((0, ""));
            load_error(tier, position, entity, cause)
        })?;
        tracing::debug!(event = "tier_flushed", tier = tier.index, rows);

        reports.push(TierReport {
            index: tier.index,
            entities: tier.entities(),
            rows,
        });
    }

    Ok(reports)
}

fn load_error(tier: &Tier, batch: usize, entity: &str, cause: Error) -> Error {
    Error::Load(LoadError {
        tier: tier.index,
        batch,
        entity: entity.to_string(),
        cause: Box::new(cause),
    })
}
