/// MIG node pool mapping: naming, skip rules and creation parameters
pub mod descriptor;
pub mod mapper;
pub mod naming;
pub mod params;
pub mod profile;

pub use descriptor::SourcePoolDescriptor;
pub use mapper::plan_target;
pub use naming::{derive_target_name, should_skip, skip_reason, SkipReason, MAX_POOL_NAME_LEN};
pub use params::TargetPoolSpec;
pub use profile::{MigMode, PartitionSize, Variant};
