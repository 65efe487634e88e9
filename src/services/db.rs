//! Database transaction utilities
//!
//! Domain functions keep using sqlx's generic Executor pattern. What this
//! module adds is a way to scope several of them in one transaction without
//! passing `&mut tx` through every signature: the transaction travels inside a
//! [`Context`].
//!
//! ```ignore
//! with_transaction(&ctx, &state.db, |ctx| async move {
//!     let mut conn = ctx.acquire().await?;
//!     domain::do_something(&mut *conn, ...).await?;
//!     domain::do_another_thing(&mut *conn, ...).await?;
//!     Ok(())
//! })
//! .await?;
//! ```
//!
//! If `ctx` already carries a transaction, the work joins it and the outermost
//! call decides between commit and rollback.

use std::any::Any;
use std::error::Error as StdError;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use sqlx::{Database, Pool};

use super::context::{Context, TxHandle};
use super::error::{LogErr, TxError};

/// Run `work` inside a transaction
///
/// Outer call: begins a transaction on `pool`, runs `work` with a context
/// carrying it, then commits on `Ok` and rolls back on `Err` or panic. A panic
/// in `work` is caught and returned as an error: the `E`, [`TxError`] or
/// `sqlx::Error` it carried, otherwise [`TxError::Panicked`] with its message.
///
/// Nested call (`ctx` already in a transaction): runs `work` with the same
/// context and returns its result untouched. Drop any [`TxConn`] before
/// making a nested call; acquiring while the connection is held returns
/// [`TxError::Busy`].
///
/// [`TxConn`]: super::context::TxConn
pub async fn with_transaction<DB, F, Fut, T, E>(
    ctx: &Context<DB>,
    pool: &Pool<DB>,
    work: F,
) -> Result<T, E>
where
    DB: Database,
    F: FnOnce(Context<DB>) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<TxError> + 'static,
{
    if ctx.in_transaction() {
        tracing::debug!("Joining transaction from context");
        return work(ctx.clone()).await;
    }

    let tx = pool.begin().await.map_err(TxError::Begin)?;
    tracing::debug!("Transaction started");

    let handle = TxHandle::new(tx);
    let scoped = ctx.with_tx(handle.clone());

    // Calling `work` can panic before any future exists, so it runs inside the
    // guarded future as well.
    let outcome = AssertUnwindSafe(async move { work(scoped).await })
        .catch_unwind()
        .await;

    let Some(tx) = handle.take().await else {
        return Err(TxError::Finished.into());
    };

    match outcome {
        Ok(Ok(value)) => {
            tx.commit().await.map_err(TxError::Commit)?;
            tracing::debug!("Transaction committed");
            Ok(value)
        }
        Ok(Err(e)) => {
            tx.rollback().await.log_warn("Rollback after error failed");
            tracing::debug!("Transaction rolled back");
            Err(e)
        }
        Err(payload) => {
            tracing::warn!("Unit of work panicked, rolling back");
            tx.rollback().await.log_warn("Rollback after panic failed");
            Err(error_from_panic(payload))
        }
    }
}

/// Turn a panic payload into an error, keeping the error it carried if any
fn error_from_panic<E>(payload: Box<dyn Any + Send>) -> E
where
    E: From<TxError> + 'static,
{
    let payload = match payload.downcast::<E>() {
        Ok(e) => return *e,
        Err(payload) => payload,
    };
    let payload = match payload.downcast::<TxError>() {
        Ok(e) => return (*e).into(),
        Err(payload) => payload,
    };
    let payload = match payload.downcast::<sqlx::Error>() {
        Ok(e) => return TxError::Database(*e).into(),
        Err(payload) => payload,
    };
    let payload = match payload.downcast::<Box<dyn StdError + Send + Sync>>() {
        Ok(e) => return TxError::PanickedWith(*e).into(),
        Err(payload) => payload,
    };

    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown error".to_string()
    };
    TxError::Panicked(message).into()
}
