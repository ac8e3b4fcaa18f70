//! Trust Region Policy Optimization on a vanilla policy gradient trainer.
#![warn(clippy::cast_lossless)]
#![warn(clippy::doc_markdown)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::missing_const_for_fn)] // has some false positives
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_pass_by_value)]
#![warn(clippy::redundant_closure_for_method_calls)]
#![warn(clippy::use_self)]
pub mod algos;
pub mod envs;
mod error;
pub mod logging;
pub mod torch;
pub mod utils;

pub use algos::{Trpo, TrpoConfig, TrpoRule, Vpg, VpgConfig, VpgRule};
pub use envs::{ActionSpace, EnvSpec};
pub use error::TrainError;
pub use logging::{DisplayLogger, StatsLogger};
