use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, SchemaError};
use crate::graph::creation_order;
use crate::schema::{EntityDefinition, find_definition};
use crate::session::Session;
use crate::transaction::TransactionScope;
use crate::validation::validate_definitions;

/// Drop and create orders for a whole dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetPlan {
    pub drop_order: Vec<String>,
    pub create_order: Vec<String>,
}

/// Outcome of a successful reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetReport {
    pub dropped: Vec<String>,
    pub created: Vec<String>,
    pub owned_transaction: bool,
}

/// Compute drop (reverse dependency) and create (dependency) orders.
pub fn plan_reset(definitions: &[EntityDefinition]) -> Result<ResetPlan> {
    validate_definitions(definitions)?;
    let create_order = creation_order(definitions)?;
    let drop_order = create_order.iter().rev().cloned().collect();
    Ok(ResetPlan {
        drop_order,
        create_order,
    })
}

/// Drop every table of the dataset if present, then create them fresh.
///
/// Runs inside a transaction scope, so it joins an enclosing transaction when
/// one is open on `session`. On failure the scope is rolled back and no
/// further cleanup is attempted.
pub async fn reset<S: Session + ?Sized>(
    session: &mut S,
    definitions: &[EntityDefinition],
) -> Result<ResetReport> {
    let plan =
        plan_reset(definitions).map_err(|cause| SchemaError::Invalid(Box::new(cause)))?;

    let mut scope = TransactionScope::acquire(session)
        .await
        .map_err(|err| SchemaError::Unreachable(err.to_string()))?;
    let owned_transaction = scope.is_outermost();

    tracing::info!(
        event = "reset_started",
        entities = plan.create_order.len(),
        owned_transaction
    );

    match apply_reset(scope.session(), definitions, &plan).await {
        Ok(()) => {
            scope
                .commit()
                .await
                .map_err(|cause| SchemaError::Commit(Box::new(cause)))?;
            tracing::info!(event = "reset_finished", entities = plan.create_order.len());
            Ok(ResetReport {
                dropped: plan.drop_order,
                created: plan.create_order,
                owned_transaction,
            })
        }
        Err(err) => {
            tracing::error!(event = "reset_failed", error = %err);
            if let Err(rollback_err) = scope.rollback().await {
                tracing::warn!(event = "rollback_failed", error = %rollback_err);
            }
            Err(err)
        }
    }
}

async fn apply_reset<S: Session + ?Sized>(
    session: &mut S,
    definitions: &[EntityDefinition],
    plan: &ResetPlan,
) -> Result<()> {
    for name in &plan.drop_order {
        let definition = lookup(definitions, name)?;
        session
            .drop_entity(definition)
            .await
            .map_err(|cause| SchemaError::Drop {
                entity: name.clone(),
                cause: Box::new(cause),
            })?;
        tracing::debug!(event = "entity_dropped", entity = %name);
    }

    for name in &plan.create_order {
        let definition = lookup(definitions, name)?;
        session
            .create_entity(definition)
            .await
            .map_err(|cause| SchemaError::Create {
                entity: name.clone(),
                cause: Box::new(cause),
            })?;
        tracing::debug!(event = "entity_created", entity = %name);
    }

    Ok(())
}

pub(crate) fn lookup<'a>(
    definitions: &'a [EntityDefinition],
    name: &str,
) -> Result<&'a EntityDefinition> {
    find_definition(definitions, name)
        .ok_or_else(|| Error::InvalidDefinition(format!("unknown entity: {name}")))
}
