//! Offline answers for availability, pricing and AMI lookups

use super::{AmiInfo, AmiLookup, Availability, AvailabilityLookup, PriceLookup};
use crate::error::ProviderError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use tracing::debug;

/// On-demand hourly prices (us-east-1, Linux, shared tenancy)
static FALLBACK_PRICES: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    HashMap::from([
        ("t3.nano", 0.0052),
        ("t3.micro", 0.0104),
        ("t3.small", 0.0208),
        ("t3.medium", 0.0416),
        ("t3.large", 0.0832),
        ("t3.xlarge", 0.1664),
        ("t3.2xlarge", 0.3328),
        ("t3a.nano", 0.0047),
        ("t3a.micro", 0.0094),
        ("t3a.small", 0.0188),
        ("t3a.medium", 0.0376),
        ("t3a.large", 0.0752),
        ("t3a.xlarge", 0.1504),
        ("t3a.2xlarge", 0.3008),
        ("m5.large", 0.096),
        ("m5.xlarge", 0.192),
        ("m5.2xlarge", 0.384),
        ("m5.4xlarge", 0.768),
        ("c5.large", 0.085),
        ("c5.xlarge", 0.17),
        ("c5.2xlarge", 0.34),
        ("c5.4xlarge", 0.68),
    ])
});

/// Micro-size hourly base rate per family
static FAMILY_BASE_RATES: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    HashMap::from([
        ("t3", 0.0104),
        ("t3a", 0.0094),
        ("t2", 0.0116),
        ("m5", 0.024),
        ("m6i", 0.024),
        ("c5", 0.0212),
        ("c6i", 0.0212),
        ("r5", 0.0315),
        ("r6i", 0.0315),
    ])
});

static SIZE_MULTIPLIERS: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    HashMap::from([
        ("nano", 0.5),
        ("micro", 1.0),
        ("small", 2.0),
        ("medium", 4.0),
        ("large", 8.0),
        ("xlarge", 16.0),
        ("2xlarge", 32.0),
        ("4xlarge", 64.0),
        ("8xlarge", 128.0),
    ])
});

const DEFAULT_BASE_RATE: f64 = 0.0104;
const MALFORMED_TYPE_RATE: f64 = 0.10;

static REGION_NAMES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("us-east-1", "US East (N. Virginia)"),
        ("us-east-2", "US East (Ohio)"),
        ("us-west-1", "US West (N. California)"),
        ("us-west-2", "US West (Oregon)"),
        ("eu-west-1", "EU (Ireland)"),
        ("eu-west-2", "EU (London)"),
        ("eu-west-3", "EU (Paris)"),
        ("eu-central-1", "EU (Frankfurt)"),
        ("eu-north-1", "EU (Stockholm)"),
        ("ap-northeast-1", "Asia Pacific (Tokyo)"),
        ("ap-northeast-2", "Asia Pacific (Seoul)"),
        ("ap-southeast-1", "Asia Pacific (Singapore)"),
        ("ap-southeast-2", "Asia Pacific (Sydney)"),
        ("ap-south-1", "Asia Pacific (Mumbai)"),
        ("ca-central-1", "Canada (Central)"),
        ("sa-east-1", "South America (Sao Paulo)"),
    ])
});

const KNOWN_FAMILIES: &[&str] = &[
    "t2", "t3", "t3a", "t4g", "m4", "m5", "m5a", "m6a", "m6g", "m6i", "m7g", "m7i", "c4", "c5", "c5a", "c5n",
    "c6a", "c6g", "c6i", "c7g", "c7i", "r4", "r5", "r5a", "r6g", "r6i", "r7g", "r7i", "i3", "i4i", "x1", "x2idn",
    "z1d", "p3", "p4d", "g4dn", "g5", "inf1",
];

const KNOWN_SIZES: &[&str] = &[
    "nano", "micro", "small", "medium", "large", "xlarge", "2xlarge", "4xlarge", "8xlarge", "9xlarge", "12xlarge",
    "16xlarge", "18xlarge", "24xlarge", "32xlarge", "48xlarge", "metal",
];

/// Name prefixes of ECS-optimized Amazon Linux images
const ECS_AMI_PREFIXES: &[&str] = &["amzn2-ami-ecs-", "al2023-ami-ecs-", "amzn-ami-2018.03", "amzn2-ami-minimal-ecs-"];

/// Pricing region name for a region code, defaulting to N. Virginia
pub fn region_name(region: &str) -> &'static str {
    REGION_NAMES.get(region).copied().unwrap_or("US East (N. Virginia)")
}

pub fn fallback_hourly_price(instance_type: &str) -> Option<f64> {
    FALLBACK_PRICES.get(instance_type).copied()
}

/// Hourly rate from family base rate times size multiplier
///
/// Unknown families use the t3 rate and unknown sizes a multiplier of 1.0.
/// A type that is not `family.size` is priced at a flat 0.10/hour.
pub fn estimate_hourly_by_family(instance_type: &str) -> f64 {
    let Some((family, size)) = split_instance_type(instance_type) else {
        return MALFORMED_TYPE_RATE;
    };
    let base = FAMILY_BASE_RATES.get(family).copied().unwrap_or(DEFAULT_BASE_RATE);
    let multiplier = SIZE_MULTIPLIERS.get(size).copied().unwrap_or(1.0);
    base * multiplier
}

/// Split `family.size`; anything else is malformed
pub fn split_instance_type(instance_type: &str) -> Option<(&str, &str)> {
    let mut parts = instance_type.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(family), Some(size), None) if !family.is_empty() && !size.is_empty() => Some((family, size)),
        _ => None,
    }
}

pub fn is_ecs_optimized(ami_name: &str) -> bool {
    ECS_AMI_PREFIXES.iter().any(|p| ami_name.starts_with(p))
}

/// Catalog backed by built-in tables, used when no live provider is wired
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    amis: HashMap<String, AmiInfo>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register image metadata; only ECS-optimized images are reported
    pub fn with_ami(mut self, info: AmiInfo) -> Self {
        self.amis.insert(info.ami_id.clone(), info);
        self
    }
}

#[async_trait]
impl AvailabilityLookup for StaticCatalog {
    async fn check_availability(&self, instance_type: &str, _region: &str) -> Result<Availability, ProviderError> {
        let known = split_instance_type(instance_type)
            .map(|(family, size)| KNOWN_FAMILIES.contains(&family) && KNOWN_SIZES.contains(&size))
            .unwrap_or(false);
        Ok(if known {
            Availability::Available
        } else {
            Availability::NotFound
        })
    }
}

#[async_trait]
impl PriceLookup for StaticCatalog {
    async fn hourly_price(&self, instance_type: &str, region: &str) -> Result<Option<f64>, ProviderError> {
        // table prices are for N. Virginia; other locations are approximated
        debug!(instance_type = %instance_type, location = region_name(region), "Static price lookup");
        Ok(fallback_hourly_price(instance_type))
    }
}

#[async_trait]
impl AmiLookup for StaticCatalog {
    async fn ami_metadata(&self, ami_id: &str) -> Result<Option<AmiInfo>, ProviderError> {
        Ok(self
            .amis
            .get(ami_id)
            .filter(|info| is_ecs_optimized(&info.ami_name))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("t3.micro", 0.0104)]
    #[case("m5.large", 0.024 * 8.0)]
    #[case("r6i.2xlarge", 0.0315 * 32.0)]
    #[case("zz9.large", 0.0104 * 8.0)]
    #[case("m5.huge", 0.024)]
    #[case("notatype", 0.10)]
    #[case("a.b.c", 0.10)]
    fn test_estimate_hourly_by_family(#[case] instance_type: &str, #[case] expected: f64) {
        assert!((estimate_hourly_by_family(instance_type) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_region_name_mapping() {
        assert_eq!(region_name("eu-west-1"), "EU (Ireland)");
        assert_eq!(region_name("mars-north-1"), "US East (N. Virginia)");
    }

    #[test]
    fn test_fallback_prices() {
        assert_eq!(fallback_hourly_price("c5.xlarge"), Some(0.17));
        assert_eq!(fallback_hourly_price("r5.large"), None);
    }

    #[tokio::test]
    async fn test_static_availability() {
        let catalog = StaticCatalog::new();
        assert_eq!(
            catalog.check_availability("t3.micro", "us-east-1").await.unwrap(),
            Availability::Available
        );
        assert_eq!(
            catalog.check_availability("t9.micro", "us-east-1").await.unwrap(),
            Availability::NotFound
        );
        assert_eq!(
            catalog.check_availability("t3", "us-east-1").await.unwrap(),
            Availability::NotFound
        );
    }

    #[tokio::test]
    async fn test_static_ami_lookup_only_reports_ecs_images() {
        let catalog = StaticCatalog::new()
            .with_ami(AmiInfo {
                ami_id: "ami-ecs".into(),
                ami_name: "al2023-ami-ecs-hvm-2023.0.20240109-kernel-6.1-x86_64".into(),
                os_name: Some("Amazon Linux 2023".into()),
            })
            .with_ami(AmiInfo {
                ami_id: "ami-plain".into(),
                ami_name: "ubuntu-jammy-22.04".into(),
                os_name: Some("Ubuntu".into()),
            });

        assert!(catalog.ami_metadata("ami-ecs").await.unwrap().is_some());
        assert!(catalog.ami_metadata("ami-plain").await.unwrap().is_none());
        assert!(catalog.ami_metadata("ami-unknown").await.unwrap().is_none());
    }
}
