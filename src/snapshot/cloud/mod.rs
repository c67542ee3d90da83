//! The cloud control-plane seam.
//!
//! The engine is written against [`CloudProvider`]; the only implementation
//! shipped here drives the aws CLI ([`aws_cli`]), and tests use an in-memory
//! mock. Snapshots are identified and queried purely through the tag schema
//! below.

pub mod aws_cli;

use crate::snapshot::result_error::result::Result;
use crate::snapshot::tier::Tier;
use crate::snapshot::volume::VolumeAttachment;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Human short label: instance name, tier, device without `/dev/`, timestamp.
pub const TAG_NAME: &str = "Name";
/// Creation timestamp, formatted `YYYYy-MMm-DDd HHhMMm`. Tier-independent.
pub const TAG_DATETIME: &str = "Backup-Datetime";
/// Originating device path, e.g. `/dev/sdf`.
pub const TAG_DEVICE: &str = "Backup-Device";
/// Instance `Name` tag, or the instance id when the tag is absent.
pub const TAG_INSTANCE_NAME: &str = "Backup-Instance-Name";
/// Tier name, e.g. `daily`.
pub const TAG_TYPE: &str = "Backup-Type";

/// A snapshot as reported by the provider: an id and its tag set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotRecord {
    pub id: Arc<str>,
    pub tags: BTreeMap<String, String>,
}

impl SnapshotRecord {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Tag filter for snapshot listings: one tier, one instance, all devices.
#[derive(Clone, Copy, Debug)]
pub struct SnapshotFilter<'a> {
    pub backup_type: Tier,
    pub instance_name: &'a str,
}

pub trait CloudProvider {
    /// Id of the instance this process runs on.
    fn instance_id(&self) -> Result<Arc<str>>;

    /// The instance's `Name` tag, when it has one.
    fn instance_name(&self, instance_id: &str) -> Result<Option<Arc<str>>>;

    /// Every volume visible to this account, with attachment state.
    fn volumes(&self) -> Result<Vec<VolumeAttachment>>;

    /// Snapshots matching the tag filter.
    fn snapshots(&self, filter: &SnapshotFilter<'_>) -> Result<Vec<SnapshotRecord>>;

    /// Creates a snapshot of `volume_id` and returns its id.
    fn create_snapshot(&self, volume_id: &str, description: &str) -> Result<Arc<str>>;

    /// Applies tags to a freshly created snapshot.
    fn tag_snapshot(&self, snapshot_id: &str, tags: &[(&str, String)]) -> Result<()>;

    fn delete_snapshot(&self, snapshot_id: &str) -> Result<()>;
}
