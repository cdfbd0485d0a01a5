//! Execution context for read-side query objects.

use sqlx::PgPool;

/// Executes query objects (`kanau::processor::Processor` implementations)
/// against the connection pool. Write paths that need multi-statement
/// atomicity take a `sqlx::Transaction` directly instead.
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

impl DatabaseProcessor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}
