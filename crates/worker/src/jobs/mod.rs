use decaywatch_core::config::{DecayDetectionConfig, TrendConfig};
use decaywatch_db::gateway::PgGateway;
use decaywatch_dispatch::{Dispatcher, HttpSenders};

pub mod analysis;

/// Shared handles for one sweep. Cheap to reference from every per-URL task.
pub struct WorkerState {
    pub gateway: PgGateway,
    pub dispatcher: Dispatcher<HttpSenders, PgGateway>,
    pub decay_config: DecayDetectionConfig,
    pub trend_config: TrendConfig,
    pub dry_run: bool,
}
