use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::StoreError;

/// Handle to an open transaction, shared by the writes of one unit of work.
#[async_trait]
pub trait TxHandle: Clone + Send + Sync + 'static {
    async fn commit(&self) -> Result<(), StoreError>;

    async fn rollback(&self) -> Result<(), StoreError>;
}

/// Runs units of work inside a single transaction.
#[async_trait]
pub trait TransactionCoordinator: Send + Sync {
    type Tx: TxHandle;

    async fn begin_tx(&self) -> Result<Self::Tx, StoreError>;

    /// Begin a transaction, hand it to `work`, then commit on `Ok` or roll back
    /// on `Err`. The error from `work` is returned unchanged; a failed rollback
    /// is only logged. Nested calls are not supported.
    async fn run<F, Fut, T, E>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(Self::Tx) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: From<StoreError> + Send,
    {
        let tx = self.begin_tx().await?;

        match work(tx.clone()).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Failed to roll back transaction");
                }
                Err(err)
            }
        }
    }
}

/// Postgres transaction that can be cloned into concurrent writes.
///
/// Statements are serialized through the inner lock. When the last clone is
/// dropped without commit or rollback, sqlx rolls the transaction back.
#[derive(Clone)]
pub struct PgTransaction {
    inner: Arc<Mutex<Option<Transaction<'static, Postgres>>>>,
}

impl PgTransaction {
    fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(tx))),
        }
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, Option<Transaction<'static, Postgres>>> {
        self.inner.lock().await
    }

    async fn take(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        self.inner
            .lock()
            .await
            .take()
            .ok_or(StoreError::TransactionFinished)
    }
}

#[async_trait]
impl TxHandle for PgTransaction {
    async fn commit(&self) -> Result<(), StoreError> {
        self.take().await?.commit().await?;
        debug!("Transaction committed");
        Ok(())
    }

    async fn rollback(&self) -> Result<(), StoreError> {
        self.take().await?.rollback().await?;
        debug!("Transaction rolled back");
        Ok(())
    }
}

pub struct PgTransactionCoordinator {
    pool: PgPool,
}

impl PgTransactionCoordinator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionCoordinator for PgTransactionCoordinator {
    type Tx = PgTransaction;

    async fn begin_tx(&self) -> Result<PgTransaction, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(PgTransaction::new(tx))
    }
}
