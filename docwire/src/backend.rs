//! The [`Backend`] trait.
use crate::{Result, row::Rows};

/// Executes SQL against the relational store.
///
/// Every call is independently schedulable, the implementor owns any
/// serialization or connection checkout.
pub trait Backend: Clone + Send + Sync + 'static {
    /// Execute a query and buffer its rows.
    fn query(&self, sql: &str) -> impl Future<Output = Result<Rows>> + Send;

    /// Execute a statement, returns the rows affected.
    fn execute(&self, sql: &str) -> impl Future<Output = Result<u64>> + Send {
        async move {
            let rows = self.query(sql).await?;
            Ok(rows.rows_affected())
        }
    }
}
