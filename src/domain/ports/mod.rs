//! Ports: the traits the engine's services depend on.
//!
//! Adapters implement these; services hold `Arc<dyn Port>` so hosts can swap
//! the persistence, identity, and notification backends.

pub mod definition_repository;
pub mod delegation_repository;
pub mod directory;
pub mod history_repository;
pub mod instance_repository;
pub mod notifier;
pub mod task_repository;

pub use definition_repository::DefinitionRepository;
pub use delegation_repository::DelegationRepository;
pub use directory::Directory;
pub use history_repository::HistoryRepository;
pub use instance_repository::{GuardedInstance, GuardedTask, InstanceRepository, TransitionWrite};
pub use notifier::Notifier;
pub use task_repository::{InboxFilter, TaskRepository};
