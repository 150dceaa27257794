//! Cloud provider capabilities consumed by the validators
//!
//! Validators only see these traits. A live adapter (SDK-backed) or the
//! offline [`StaticCatalog`] can sit behind them.

pub mod static_catalog;

use crate::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use static_catalog::{estimate_hourly_by_family, fallback_hourly_price, region_name, StaticCatalog};

/// Result of an instance-type availability lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    /// Type exists but is not offered in the requested region
    NotOffered,
    /// Type is unknown to the provider
    NotFound,
}

/// Release metadata for a machine image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmiInfo {
    pub ami_id: String,
    pub ami_name: String,
    pub os_name: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AvailabilityLookup: Send + Sync {
    async fn check_availability(&self, instance_type: &str, region: &str) -> Result<Availability, ProviderError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceLookup: Send + Sync {
    /// On-demand hourly price in USD, `None` when the provider has no price
    async fn hourly_price(&self, instance_type: &str, region: &str) -> Result<Option<f64>, ProviderError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AmiLookup: Send + Sync {
    async fn ami_metadata(&self, ami_id: &str) -> Result<Option<AmiInfo>, ProviderError>;
}
