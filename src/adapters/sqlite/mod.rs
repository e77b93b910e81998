//! SQLite database adapters for the approval engine.

pub mod connection;
pub mod definition_repository;
pub mod delegation_repository;
pub mod directory;
pub mod history_repository;
pub mod instance_repository;
pub mod migrations;
pub mod task_repository;
pub(crate) mod util;

pub use connection::{
    create_migrated_test_pool, create_pool, create_test_pool, verify_connection, ConnectionError, PoolConfig,
};
pub use definition_repository::SqliteDefinitionRepository;
pub use delegation_repository::SqliteDelegationRepository;
pub use directory::SqliteDirectory;
pub use history_repository::SqliteHistoryRepository;
pub use instance_repository::SqliteInstanceRepository;
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};
pub use task_repository::SqliteTaskRepository;

use sqlx::SqlitePool;

/// Open (or create) the database at `database_url` and bring the schema up to
/// date.
pub async fn initialize_database(database_url: &str, config: Option<PoolConfig>) -> Result<SqlitePool, ConnectionError> {
    let pool = create_pool(database_url, config).await?;
    let migrator = Migrator::new(pool.clone());
    migrator.run_embedded_migrations(all_embedded_migrations()).await?;
    Ok(pool)
}
