// =====================================================================================
// SHARED DATABASE - READ-ONLY TELEMETRY EVENT STORE
// =====================================================================================

pub mod error;
pub mod memory;
pub mod models;
pub mod schema;
pub mod sqlite;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryEventStore;
pub use models::{AnomalyEvent, AnomalyGrouping, CostEvent, GatewayMetric, MetricSnapshot, TimeRange};
pub use sqlite::{SqliteEventStore, StorePaths};
pub use store::EventStore;
