//! Optimistic state-synchronization engine for goal/task trees.
//!
//! ```text
//! UI action
//!     |
//!     v
//! MutationCoordinator --(sync)--> Store --(read)--> StoreHandle --> tree::build_forest
//!     |
//!     +--(async)--> RemoteGateway --> Settlement::{Confirmed, RolledBack}
//! ```

pub mod error;
pub mod order;
pub mod plan;
pub mod store;
pub mod sync;
pub mod tree;

pub use error::{SyncError, ValidationError};
pub use order::{OrderError, ReorderPlan, ReorderScope};
pub use plan::{GenerationOutcome, GenerationState, PendingGeneration, PlanGenerationBridge, PlanTarget};
pub use store::{Store, StoreHandle, StoreSnapshot};
pub use sync::{CoordinatorConfig, MutationCoordinator, Notice, Pending, Settlement};
pub use tree::{Forest, TaskNode, build_forest};
