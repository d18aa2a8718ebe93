/// MIG partition profiles and target modes
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when a partition size is not one of the supported profiles
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported MIG partition size `{0}` (expected one of 1g.5gb, 2g.10gb, 3g.20gb)")]
pub struct UnknownPartitionSize(pub String);

/// GPU partition size requested per accelerator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PartitionSize {
    #[serde(rename = "1g.5gb")]
    OneG5Gb,
    #[serde(rename = "2g.10gb")]
    TwoG10Gb,
    #[serde(rename = "3g.20gb")]
    ThreeG20Gb,
}

impl PartitionSize {
    pub const ALL: [PartitionSize; 3] = [
        PartitionSize::OneG5Gb,
        PartitionSize::TwoG10Gb,
        PartitionSize::ThreeG20Gb,
    ];

    /// Profile string as the provider and the device driver spell it
    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionSize::OneG5Gb => "1g.5gb",
            PartitionSize::TwoG10Gb => "2g.10gb",
            PartitionSize::ThreeG20Gb => "3g.20gb",
        }
    }

    /// Profile with dots replaced, usable inside resource names (`1g-5gb`)
    pub fn slug(&self) -> String {
        self.as_str().replace('.', "-")
    }
}

impl fmt::Display for PartitionSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartitionSize {
    type Err = UnknownPartitionSize;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        PartitionSize::ALL
            .into_iter()
            .find(|size| size.as_str() == wanted)
            .ok_or_else(|| UnknownPartitionSize(s.to_string()))
    }
}

/// GPU driver installation mode passed with the accelerator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverVersion {
    Disabled,
    Default,
    Latest,
}

impl DriverVersion {
    /// Map the provider's raw `gpuDriverVersion` value. Unknown or unset values fall back to `default`.
    pub fn from_provider(raw: Option<&str>) -> Self {
        match raw {
            Some("INSTALLATION_DISABLED") => DriverVersion::Disabled,
            Some("DEFAULT") => DriverVersion::Default,
            Some("LATEST") => DriverVersion::Latest,
            _ => DriverVersion::Default,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DriverVersion::Disabled => "disabled",
            DriverVersion::Default => "default",
            DriverVersion::Latest => "latest",
        }
    }
}

impl fmt::Display for DriverVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a single target pool is derived as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigMode {
    /// One `-mig-enabled` clone per source pool, original scaling kept
    Legacy,
    /// One clone per partition size, scaled from zero
    Partition(PartitionSize),
}

impl MigMode {
    /// Suffix appended to the source pool name
    pub fn suffix(&self) -> String {
        match self {
            MigMode::Legacy => "-mig-enabled".to_string(),
            MigMode::Partition(size) => format!("-mig-{}", size.slug()),
        }
    }
}

/// A migration run: either the legacy single-pool clone or a set of partition sizes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Variant {
    Legacy,
    Partitioned(Vec<PartitionSize>),
}

const LEGACY_MARKERS: &[&str] = &["-mig-enabled"];
const PARTITION_MARKERS: &[&str] = &["-mig-1g-", "-mig-2g-", "-mig-3g-"];

impl Variant {
    /// Partitioned variant with repeated sizes dropped, first occurrence kept
    pub fn partitioned<I: IntoIterator<Item = PartitionSize>>(sizes: I) -> Self {
        let mut unique = Vec::new();
        for size in sizes {
            if !unique.contains(&size) {
                unique.push(size);
            }
        }
        Variant::Partitioned(unique)
    }

    /// Target modes produced for every source pool
    pub fn modes(&self) -> Vec<MigMode> {
        match self {
            Variant::Legacy => vec![MigMode::Legacy],
            Variant::Partitioned(sizes) => sizes.iter().copied().map(MigMode::Partition).collect(),
        }
    }

    /// Substrings marking a pool as already produced by this variant
    pub fn skip_markers(&self) -> &'static [&'static str] {
        match self {
            Variant::Legacy => LEGACY_MARKERS,
            Variant::Partitioned(_) => PARTITION_MARKERS,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Legacy => write!(f, "legacy"),
            Variant::Partitioned(sizes) => {
                let sizes: Vec<&str> = sizes.iter().map(|s| s.as_str()).collect();
                write!(f, "partitioned ({})", sizes.join(", "))
            }
        }
    }
}
