/// Target pool naming and skip rules
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

use super::profile::Variant;

/// Longest node pool name the provider accepts
pub const MAX_POOL_NAME_LEN: usize = 40;

/// Why a source pool (or one of its targets) was not migrated
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The source pool is itself a MIG pool produced by this variant
    AlreadyMig { marker: String },
    /// The derived name is already taken in the cluster
    TargetExists { target: String },
    /// The derived name was already planned for a different source pool in this run
    NameCollision { target: String, planned_from: String },
    /// The source pool carries no accelerator
    NoGpu,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyMig { marker } => write!(f, "already a MIG pool (contains `{}`)", marker),
            SkipReason::TargetExists { target } => write!(f, "target pool {} already exists", target),
            SkipReason::NameCollision {
                target,
                planned_from,
            } => write!(
                f,
                "truncated name {} collides with the target planned for {}",
                target, planned_from
            ),
            SkipReason::NoGpu => write!(f, "no accelerator attached"),
        }
    }
}

/// Append `suffix` to `source`, shortening the source part so the result fits in `max_len`.
///
/// The suffix is always kept whole. When the suffix alone is longer than `max_len`
/// only its first `max_len` characters survive.
pub fn derive_target_name(source: &str, suffix: &str, max_len: usize) -> String {
    let source_len = source.chars().count();
    let suffix_len = suffix.chars().count();

    if source_len + suffix_len <= max_len {
        return format!("{}{}", source, suffix);
    }

    if suffix_len >= max_len {
        return suffix.chars().take(max_len).collect();
    }

    let keep = max_len - suffix_len;
    let mut name: String = source.chars().take(keep).collect();
    name.push_str(suffix);
    name
}

/// Reason to leave `source` alone for the given target suffix, if any
pub fn skip_reason(
    source: &str,
    existing: &BTreeSet<String>,
    variant: &Variant,
    suffix: &str,
) -> Option<SkipReason> {
    if let Some(marker) = variant.skip_markers().iter().find(|m| source.contains(*m)) {
        return Some(SkipReason::AlreadyMig {
            marker: marker.to_string(),
        });
    }

    let target = derive_target_name(source, suffix, MAX_POOL_NAME_LEN);
    if existing.contains(&target) {
        return Some(SkipReason::TargetExists { target });
    }

    None
}

/// True when `source` is already a MIG pool or its derived name is taken
pub fn should_skip(source: &str, existing: &BTreeSet<String>, variant: &Variant, suffix: &str) -> bool {
    skip_reason(source, existing, variant, suffix).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mig::profile::PartitionSize;

    #[test]
    fn test_short_name_unchanged() {
        assert_eq!(
            derive_target_name("gpu-pool", "-mig-enabled", MAX_POOL_NAME_LEN),
            "gpu-pool-mig-enabled"
        );

        let exact = "a".repeat(28);
        let name = derive_target_name(&exact, "-mig-enabled", MAX_POOL_NAME_LEN);
        assert_eq!(name, format!("{}-mig-enabled", exact));
        assert_eq!(name.len(), 40);
    }

    #[test]
    fn test_long_name_truncated_to_limit() {
        let name = derive_target_name(&"a".repeat(50), "-mig-enabled", MAX_POOL_NAME_LEN);
        assert_eq!(name.len(), 40);
        assert!(name.ends_with("-mig-enabled"));
        assert_eq!(name, format!("{}-mig-enabled", "a".repeat(28)));
    }

    #[test]
    fn test_name_never_exceeds_limit() {
        for source_len in 1..80 {
            for suffix in ["-mig-enabled", "-mig-1g-5gb", "-mig-3g-20gb", ""] {
                let source = "p".repeat(source_len);
                let name = derive_target_name(&source, suffix, MAX_POOL_NAME_LEN);
                assert!(name.len() <= MAX_POOL_NAME_LEN, "{} too long", name);
                assert!(name.ends_with(suffix));
            }
        }
    }

    #[test]
    fn test_oversized_suffix() {
        let name = derive_target_name("pool", &"s".repeat(45), MAX_POOL_NAME_LEN);
        assert_eq!(name, "s".repeat(40));
    }

    #[test]
    fn test_should_skip_existing_mig_pool() {
        let existing = BTreeSet::new();
        assert!(should_skip("pool-mig-enabled", &existing, &Variant::Legacy, "-mig-enabled"));
        assert!(!should_skip("pool", &existing, &Variant::Legacy, "-mig-enabled"));
    }

    #[test]
    fn test_should_skip_partition_markers() {
        let existing = BTreeSet::new();
        let variant = Variant::Partitioned(vec![PartitionSize::OneG5Gb]);
        assert_eq!(
            skip_reason("a100-mig-2g-10gb", &existing, &variant, "-mig-1g-5gb"),
            Some(SkipReason::AlreadyMig {
                marker: "-mig-2g-".to_string()
            })
        );
        assert!(!should_skip("a100", &existing, &variant, "-mig-1g-5gb"));
    }

    #[test]
    fn test_should_skip_existing_target() {
        let existing: BTreeSet<String> = ["pool-mig-enabled".to_string()].into_iter().collect();
        assert_eq!(
            skip_reason("pool", &existing, &Variant::Legacy, "-mig-enabled"),
            Some(SkipReason::TargetExists {
                target: "pool-mig-enabled".to_string()
            })
        );
    }
}
