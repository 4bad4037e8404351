//! Connection handle and transactions.
//!
//! A [`DbConnection`] is a cheap, cloneable handle to one driver connection.
//! Clones share the same underlying connection, which is how a borrowed
//! connection and a transaction refer to the connection a command runs on.

use crate::db::driver::{DriverConnection, ProviderFactory};
use crate::error::{Error, Result};
use crate::models::{TransactionState, masked_connection_string};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

struct ConnectionInner {
    id: Uuid,
    provider: String,
    /// Contains sensitive data - never log
    connection_string: String,
    factory: Arc<dyn ProviderFactory>,
    driver: AsyncMutex<Option<Box<dyn DriverConnection>>>,
    /// Bumped every time a driver connection is closed.
    generation: AtomicU64,
}

/// Handle to a (possibly closed) database connection.
#[derive(Clone)]
pub struct DbConnection {
    inner: Arc<ConnectionInner>,
}

impl std::fmt::Debug for DbConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConnection")
            .field("id", &self.inner.id)
            .field("provider", &self.inner.provider)
            .field("connection_string", &self.masked_connection_string())
            .finish()
    }
}

impl DbConnection {
    /// Create a closed connection handle.
    pub fn new(
        provider: impl Into<String>,
        connection_string: impl Into<String>,
        factory: Arc<dyn ProviderFactory>,
    ) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                id: Uuid::new_v4(),
                provider: provider.into(),
                connection_string: connection_string.into(),
                factory,
                driver: AsyncMutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn provider(&self) -> &str {
        &self.inner.provider
    }

    pub fn connection_string(&self) -> &str {
        &self.inner.connection_string
    }

    /// Connection string with credentials masked, safe for logs.
    pub fn masked_connection_string(&self) -> String {
        masked_connection_string(&self.inner.connection_string)
    }

    /// True when both handles refer to the same underlying connection.
    pub fn same_as(&self, other: &DbConnection) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    pub async fn is_open(&self) -> bool {
        self.inner.driver.lock().await.is_some()
    }

    /// Open the connection if it is not open yet.
    pub async fn open(&self) -> Result<()> {
        let mut driver = self.inner.driver.lock().await;
        if driver.is_some() {
            return Ok(());
        }

        debug!(
            connection_id = %self.inner.id,
            provider = %self.inner.provider,
            connection = %self.masked_connection_string(),
            "Opening connection"
        );
        let conn = self.inner.factory.connect(&self.inner.connection_string).await?;
        *driver = Some(conn);

        info!(
            connection_id = %self.inner.id,
            provider = %self.inner.provider,
            "Connection opened"
        );
        Ok(())
    }

    /// Gracefully close the connection. Closing a closed connection is a no-op.
    ///
    /// Close failures are logged and swallowed; the driver connection is gone
    /// either way.
    pub async fn close(&self) {
        let driver = self.inner.driver.lock().await.take();
        let Some(driver) = driver else {
            return;
        };
        self.inner.generation.fetch_add(1, Ordering::SeqCst);

        match driver.close().await {
            Ok(()) => info!(connection_id = %self.inner.id, "Connection closed"),
            Err(e) => warn!(
                connection_id = %self.inner.id,
                error = %e,
                "Error closing connection"
            ),
        }
    }

    /// Drop the driver connection without a graceful shutdown.
    ///
    /// Used from synchronous release paths (`Drop`, exhausted streams). If the
    /// connection is busy the close is skipped and left to the last handle.
    pub fn close_now(&self) {
        match self.inner.driver.try_lock() {
            Ok(mut guard) => {
                if guard.take().is_some() {
                    self.inner.generation.fetch_add(1, Ordering::SeqCst);
                    info!(connection_id = %self.inner.id, "Connection closed");
                }
            }
            Err(_) => warn!(
                connection_id = %self.inner.id,
                "Connection busy, close deferred"
            ),
        }
    }

    /// Lock the open driver connection.
    pub(crate) async fn driver(&self) -> Result<DriverGuard<'_>> {
        let guard = self.inner.driver.lock().await;
        if guard.is_none() {
            return Err(Error::ConnectionClosed);
        }
        Ok(DriverGuard { guard })
    }

    /// Begin a transaction on this connection, opening it if needed.
    ///
    /// The transaction lives as long as the driver connection it was begun
    /// on; once that connection closes the transaction counts as rolled back.
    pub async fn begin_transaction(&self) -> Result<Transaction> {
        self.open().await?;
        let generation = {
            let mut driver = self.driver().await?;
            driver.get()?.begin().await?;
            self.generation()
        };

        let transaction = Transaction::new(self.clone(), generation);
        debug!(
            connection_id = %self.inner.id,
            transaction_id = %transaction.id(),
            "Transaction started"
        );
        Ok(transaction)
    }
}

/// Exclusive access to an open driver connection.
pub(crate) struct DriverGuard<'a> {
    guard: MutexGuard<'a, Option<Box<dyn DriverConnection>>>,
}

impl DriverGuard<'_> {
    pub(crate) fn get(&mut self) -> Result<&mut (dyn DriverConnection + 'static)> {
        match self.guard.as_mut() {
            Some(driver) => Ok(driver.as_mut()),
            None => Err(Error::ConnectionClosed),
        }
    }
}

struct TransactionInner {
    id: Uuid,
    connection: DbConnection,
    started_at: DateTime<Utc>,
    generation: u64,
    state: Mutex<TransactionState>,
}

/// A transaction begun on a [`DbConnection`].
///
/// Cloneable; clones observe the same state. Attach it to a command with
/// `set_transaction` so the command runs inside it.
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<TransactionInner>,
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.inner.id)
            .field("connection_id", &self.inner.connection.id())
            .field("state", &self.state())
            .finish()
    }
}

impl Transaction {
    fn new(connection: DbConnection, generation: u64) -> Self {
        Self {
            inner: Arc::new(TransactionInner {
                id: Uuid::new_v4(),
                connection,
                started_at: Utc::now(),
                generation,
                state: Mutex::new(TransactionState::Active),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn connection(&self) -> &DbConnection {
        &self.inner.connection
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.started_at
    }

    pub fn state(&self) -> TransactionState {
        let mut state = self
            .inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if state.is_active() && self.inner.connection.generation() != self.inner.generation {
            debug!(
                transaction_id = %self.inner.id,
                "Connection closed under transaction, marking rolled back"
            );
            *state = TransactionState::RolledBack;
        }
        *state
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// True when this transaction was begun on `connection`.
    pub fn belongs_to(&self, connection: &DbConnection) -> bool {
        self.inner.connection.same_as(connection)
    }

    /// Fail unless the transaction is active.
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::transaction_not_active(self.inner.id.to_string()))
        }
    }

    pub async fn commit(&self) -> Result<()> {
        self.finish(TransactionState::Committed).await
    }

    pub async fn rollback(&self) -> Result<()> {
        self.finish(TransactionState::RolledBack).await
    }

    async fn finish(&self, target: TransactionState) -> Result<()> {
        self.ensure_active()?;

        {
            let mut driver = self.inner.connection.driver().await?;
            // closed and reopened while waiting for the lock
            self.ensure_active()?;
            match target {
                TransactionState::Committed => driver.get()?.commit().await?,
                _ => driver.get()?.rollback().await?,
            }
        }

        *self
            .inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = target;

        let duration_ms = Utc::now()
            .signed_duration_since(self.inner.started_at)
            .num_milliseconds();
        debug!(
            transaction_id = %self.inner.id,
            state = ?target,
            duration_ms,
            "Transaction finished"
        );
        Ok(())
    }
}
