pub mod anomalies;
pub mod channels;
pub mod costs;
pub mod gateway;
pub mod performance;
pub mod query;
pub mod resources;

pub use anomalies::AnomalyAggregator;
pub use channels::{ChannelAggregator, ChannelProbe, HttpChannelProbe};
pub use costs::CostAggregator;
pub use gateway::GatewayProbe;
pub use performance::PerformanceAggregator;
pub use resources::ResourceInspector;
