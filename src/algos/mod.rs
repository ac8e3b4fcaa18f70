//! Policy gradient training algorithms
mod batch;
mod config;
#[cfg(test)]
mod testing;
mod trpo;
mod vpg;

pub use batch::{BatchError, Path, SampleBatch};
pub use config::{ConfigError, EntropyMethod, VpgConfig};
pub use trpo::{Trpo, TrpoConfig, TrpoRule};
pub use vpg::{
    AdvantageEstimator, AdvantageParams, Baseline, PolicyLoss, PolicyUpdateRule,
    SurrogateObjective, Vpg, VpgRule, ZeroBaseline,
};
