//! Request-scoped context carrying an optional open transaction
//!
//! A [`Context`] is threaded by value through a call chain. It never changes
//! in place: attaching a transaction yields a new context, and only that new
//! value is handed to nested work. Repository code that wants to take part in
//! the caller's transaction reads it through [`Context::acquire`]:
//!
//! ```ignore
//! let mut conn = ctx.acquire().await?;
//! sqlx::query("UPDATE articles SET title = $1 WHERE id = $2")
//!     .bind(title)
//!     .bind(id)
//!     .execute(&mut *conn)
//!     .await?;
//! ```

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use sqlx::{Database, Postgres, Transaction};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use super::error::TxError;

type Shared<DB> = Arc<Mutex<Option<Transaction<'static, DB>>>>;

/// Shared handle to one open transaction
///
/// Clones refer to the same transaction. Only the `with_transaction` call that
/// opened it ever commits or rolls it back; afterwards every clone reports
/// [`TxError::Finished`].
pub struct TxHandle<DB: Database = Postgres> {
    inner: Shared<DB>,
}

impl<DB: Database> TxHandle<DB> {
    pub(crate) fn new(tx: Transaction<'static, DB>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(tx))),
        }
    }

    /// Lock the transaction's connection for issuing queries
    ///
    /// A transaction is a single connection, so only one [`TxConn`] can be
    /// out at a time. Acquiring while another is held, typically by the same
    /// call chain further up, returns [`TxError::Busy`] instead of waiting on
    /// a lock that would never be released.
    pub async fn acquire(&self) -> Result<TxConn<'_, DB>, TxError> {
        let guard = self.inner.try_lock().map_err(|_| TxError::Busy)?;
        MutexGuard::try_map(guard, Option::as_mut)
            .map(TxConn)
            .map_err(|_| TxError::Finished)
    }

    /// Whether both handles refer to the same transaction
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) async fn take(&self) -> Option<Transaction<'static, DB>> {
        self.inner.lock().await.take()
    }
}

impl<DB: Database> Clone for TxHandle<DB> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<DB: Database> fmt::Debug for TxHandle<DB> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxHandle")
            .field("ptr", &Arc::as_ptr(&self.inner))
            .finish()
    }
}

/// Locked connection of an open transaction
///
/// Derefs to the driver connection, so `&mut *conn` is an executor.
pub struct TxConn<'a, DB: Database>(MappedMutexGuard<'a, Transaction<'static, DB>>);

impl<DB: Database> Deref for TxConn<'_, DB> {
    type Target = DB::Connection;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<DB: Database> DerefMut for TxConn<'_, DB> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

pub struct Context<DB: Database = Postgres> {
    tx: Option<TxHandle<DB>>,
}

impl<DB: Database> Context<DB> {
    pub fn new() -> Self {
        Self { tx: None }
    }

    pub fn transaction(&self) -> Option<&TxHandle<DB>> {
        self.tx.as_ref()
    }

    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    /// Lock the carried transaction's connection
    ///
    /// Fails with [`TxError::Busy`] while a `TxConn` from this transaction is
    /// still held; drop it before calling into nested work that queries.
    pub async fn acquire(&self) -> Result<TxConn<'_, DB>, TxError> {
        match &self.tx {
            Some(tx) => tx.acquire().await,
            None => Err(TxError::NoTransaction),
        }
    }

    pub(crate) fn with_tx(&self, tx: TxHandle<DB>) -> Self {
        Self { tx: Some(tx) }
    }
}

impl<DB: Database> Default for Context<DB> {
    fn default() -> Self {
        Self::new()
    }
}

impl<DB: Database> Clone for Context<DB> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<DB: Database> fmt::Debug for Context<DB> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("tx", &self.tx).finish()
    }
}
