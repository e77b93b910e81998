use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::HistoryEntry;

/// Read port over the append-only history trail.
///
/// Writes happen only inside the transactional paths of the instance and
/// task repositories; nothing outside those transactions may append.
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// All entries for one instance, in commit order.
    async fn for_instance(&self, instance_id: Uuid) -> DomainResult<Vec<HistoryEntry>>;
}
