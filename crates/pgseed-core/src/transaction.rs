use crate::error::{Error, Result};
use crate::session::Session;

/// Reentrant transaction scope over a [`Session`].
///
/// The first scope acquired on a session opens the physical transaction and is
/// the outermost scope. Scopes acquired while a transaction is already open
/// join it: their `commit` is a no-op and their `rollback` only marks the
/// transaction rollback-only, leaving the physical rollback to the outermost
/// scope.
pub struct TransactionScope<'s, S: Session + ?Sized> {
    session: &'s mut S,
    outermost: bool,
    finished: bool,
}

impl<'s, S: Session + ?Sized> TransactionScope<'s, S> {
    /// Open a transaction, or join the one already open on `session`.
    pub async fn acquire(session: &'s mut S) -> Result<Self> {
        let outermost = !session.in_transaction();
        if outermost {
            session.begin().await?;
            tracing::debug!(event = "transaction_started", engine = session.engine());
        } else {
            tracing::debug!(event = "transaction_joined", engine = session.engine());
        }

        Ok(Self {
            session,
            outermost,
            finished: false,
        })
    }

    pub fn is_outermost(&self) -> bool {
        self.outermost
    }

    pub fn session(&mut self) -> &mut S {
        &mut *self.session
    }

    pub async fn commit(mut self) -> Result<()> {
        self.finished = true;
        if !self.outermost {
            return Ok(());
        }

        if self.session.is_rollback_only() {
            self.session.rollback().await?;
            return Err(Error::Transaction(
                "transaction was marked rollback-only by an inner scope and has been rolled back"
                    .to_string(),
            ));
        }

        self.session.commit().await?;
        tracing::debug!(event = "transaction_committed", engine = self.session.engine());
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<()> {
        self.finished = true;
        if !self.outermost {
            self.session.mark_rollback_only();
            return Ok(());
        }

        self.session.rollback().await?;
        tracing::debug!(event = "transaction_rolled_back", engine = self.session.engine());
        Ok(())
    }
}

impl<S: Session + ?Sized> Drop for TransactionScope<'_, S> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        if self.outermost {
            tracing::warn!(event = "transaction_abandoned", engine = self.session.engine());
            self.session.abandon();
        } else {
            self.session.mark_rollback_only();
        }
    }
}
