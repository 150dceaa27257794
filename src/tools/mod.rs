//! Pluggable validators and the registry that holds them

pub mod base;
pub mod compute;
pub mod cost_estimator;
pub mod network;
pub mod registry;
pub mod storage;

pub use base::{check_contract, parse_input, Validator};
pub use compute::{ComputeValidator, COMPUTE_VALIDATOR};
pub use cost_estimator::{CostEstimator, COST_ESTIMATOR};
pub use network::{NetworkValidator, NETWORK_VALIDATOR};
pub use registry::ToolRegistry;
pub use storage::{StorageValidator, STORAGE_VALIDATOR};
