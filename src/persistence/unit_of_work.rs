use sqlx::{PgPool, Postgres, Transaction};
use std::future::Future;

use crate::error::{AppError, AppResult};

/// C4: runs `work` inside one database transaction. Commit is all-or-nothing —
/// a failure rolls back every write `work` performed, including outbox appends
/// (§4.2 invariant: transactional outbox).
///
/// Re-entrancy: there is no separate "begin nested transaction" API here. Every
/// repository method in this crate accepts `&mut Transaction<'_, Postgres>`
/// rather than acquiring its own connection from the pool, so a saga step that
/// calls another step's persistence helper from within `work` is structurally
/// forced to reuse this same ambient transaction — there is nothing else for
/// it to acquire. A second, independent call to `run()` always opens its own
/// connection and transaction scope.
#[derive(Clone)]
pub struct UnitOfWork {
    pool: PgPool,
}

impl UnitOfWork {
    pub fn new(pool: PgPool) -> Self {
        UnitOfWork { pool }
    }

    pub async fn run<F, Fut, T>(&self, work: F) -> AppResult<T>
    where
        F: FnOnce(&mut Transaction<'static, Postgres>) -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut tx: Transaction<'static, Postgres> =
            self.pool.begin().await.map_err(AppError::from)?;

        match work(&mut tx).await {
            Ok(value) => {
                tx.commit().await.map_err(AppError::from)?;
                Ok(value)
            }
            Err(err) => {
                let _ = tx.rollback().await;
                Err(err)
            }
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
