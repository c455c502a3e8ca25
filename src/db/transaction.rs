/*!
 * Transaction Helper Utilities
 *
 * Runs a closure inside a database transaction, committing on `Ok` and
 * rolling back on `Err`, while keeping the closure's own `ServiceError`.
 */

use crate::errors::ServiceError;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionError, TransactionTrait};
use std::future::Future;
use std::pin::Pin;

/// Type alias for boxed future used in transactions
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Execute a function within a database transaction
///
/// ```rust,ignore
/// with_transaction(&db, |txn| {
///     Box::pin(async move {
///         site::Entity::delete_many().exec(txn).await?;
///         Ok(())
///     })
/// })
/// .await?;
/// ```
pub async fn with_transaction<F, T>(db: &DatabaseConnection, f: F) -> Result<T, ServiceError>
where
    F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, Result<T, ServiceError>> + Send,
    T: Send,
{
    db.transaction::<F, T, ServiceError>(f)
        .await
        .map_err(|e| match e {
            TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
            TransactionError::Transaction(err) => err,
        })
}
