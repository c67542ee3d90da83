//! Retention engine: decides when a tier is due, creates tagged snapshots
//! for every member device, and prunes surplus snapshots per
//! (rule, tier, device).

use crate::snapshot::cloud::{
    CloudProvider, SnapshotFilter, SnapshotRecord, TAG_DATETIME, TAG_DEVICE, TAG_INSTANCE_NAME,
    TAG_NAME, TAG_TYPE,
};
use crate::snapshot::result_error::error::Error;
use crate::snapshot::result_error::result::Result;
use crate::snapshot::result_error::WithMsg;
use crate::snapshot::tier::Tier;
use crate::snapshot::topology::Storage;
use crate::snapshot::volume::Volume;
use chrono::{DateTime, NaiveDateTime, Utc};
use itertools::Itertools;
use std::cmp::Reverse;
use tracing::{info, warn};

/// Timestamp format used in the `Backup-Datetime` tag, e.g.
/// `2024y-03m-15d 10h30m`.
pub const BACKUP_DATETIME_FORMAT: &str = "%Yy-%mm-%dd %Hh%Mm";

pub fn format_backup_datetime(datetime: DateTime<Utc>) -> String {
    datetime.format(BACKUP_DATETIME_FORMAT).to_string()
}

pub fn parse_backup_datetime(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, BACKUP_DATETIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// A snapshot whose `Backup-Datetime` tag parsed successfully.
#[derive(Clone, Debug)]
pub struct TaggedSnapshot {
    pub record: SnapshotRecord,
    pub taken_at: DateTime<Utc>,
}

/// All snapshots for this tier and instance name, across all devices, newest
/// first. Records with a missing or unparsable timestamp tag are dropped
/// with a warning; they take no part in due-checking or pruning.
///
/// The descending order is load-bearing: index 0 is the most recent snapshot
/// for the due check, and pruning deletes from the tail.
pub fn tier_snapshots(
    provider: &dyn CloudProvider,
    instance_name: &str,
    tier: Tier,
) -> Result<Vec<TaggedSnapshot>> {
    let records = provider.snapshots(&SnapshotFilter {
        backup_type: tier,
        instance_name,
    })?;
    Ok(records
        .into_iter()
        .filter_map(|record| match record.tag(TAG_DATETIME).and_then(parse_backup_datetime) {
            Some(taken_at) => Some(TaggedSnapshot { record, taken_at }),
            None => {
                warn!(
                    "Ignoring snapshot {} with missing or unparsable {TAG_DATETIME} tag",
                    record.id
                );
                None
            }
        })
        .sorted_unstable_by_key(|snapshot| Reverse(snapshot.taken_at))
        .collect())
}

/// Everything a tier pass needs to know about the rule being processed.
pub struct TierRun<'a> {
    pub provider: &'a dyn CloudProvider,
    pub rule_name: &'a str,
    pub instance_id: &'a str,
    pub instance_name: &'a str,
    pub storage: &'a Storage,
    pub volumes: &'a [Volume],
    pub extra_description: &'a str,
}

impl TierRun<'_> {
    /// Runs one tier: skip when the most recent snapshot is younger than the
    /// tier interval, otherwise snapshot every member device and prune that
    /// device's surplus.
    ///
    /// Pruning operates on the listing fetched before creation, so a run can
    /// momentarily hold `max_backups + 1` snapshots per device; the count
    /// converges back to `max_backups` on the next due run.
    pub fn process(&self, tier: Tier, max_backups: usize, now: DateTime<Utc>) -> Result<()> {
        let existing = tier_snapshots(self.provider, self.instance_name, tier)?;
        if let Some(most_recent) = existing.first() {
            if now.signed_duration_since(most_recent.taken_at) < tier.interval() {
                info!(
                    "Not snapshotting {} / {tier} because it's too soon",
                    self.rule_name
                );
                return Ok(());
            }
        }

        let datetime = format_backup_datetime(now);
        let tier_name = tier.to_string();
        for volume in self.volumes {
            let description = self.full_description(&datetime, tier, &volume.device);
            let short_name = [
                self.instance_name,
                tier_name.as_str(),
                volume.device.trim_start_matches("/dev/"),
                datetime.as_str(),
            ]
            .join(" ");

            let snapshot_id = self
                .provider
                .create_snapshot(&volume.id, &description)
                .map_err(|err| Error::SnapshotCreation {
                    volume_id: volume.id.clone(),
                    source: Box::new(err),
                })?;
            self.provider
                .tag_snapshot(
                    &snapshot_id,
                    &[
                        (TAG_NAME, short_name),
                        (TAG_DATETIME, datetime.clone()),
                        (TAG_DEVICE, volume.device.to_string()),
                        (TAG_INSTANCE_NAME, self.instance_name.to_string()),
                        (TAG_TYPE, tier.to_string()),
                    ],
                )
                .with_msg(format!("Tagging snapshot {snapshot_id} failed"))?;
            info!("Snapshot {snapshot_id} taken of volume {}", volume.id);

            prune(self.provider, &existing, tier, &volume.device, max_backups)?;
        }
        Ok(())
    }

    fn full_description(&self, datetime: &str, tier: Tier, device: &str) -> String {
        format!(
            "{} instance_id={} date={} type={} mount_point={} device={} primary_device={} {}",
            self.rule_name,
            self.instance_id,
            datetime,
            tier,
            self.storage.mount_point,
            device.trim_start_matches("/dev/"),
            self.storage.primary_device.trim_start_matches("/dev/"),
            self.extra_description,
        )
    }
}

/// Deletes this device's oldest snapshots (from the tail of the descending
/// listing) while it still holds `max_backups` or more.
pub fn prune(
    provider: &dyn CloudProvider,
    snapshots: &[TaggedSnapshot],
    tier: Tier,
    device: &str,
    max_backups: usize,
) -> Result<()> {
    debug_assert!(max_backups > 0, "The number of backups must be > 0");

    let mut device_snapshots = snapshots
        .iter()
        .filter(|s| s.record.tag(TAG_DEVICE) == Some(device))
        .collect_vec();

    info!("Checking old snapshots for {tier} {device}");
    while device_snapshots.len() >= max_backups {
        let Some(oldest) = device_snapshots.pop() else {
            break;
        };
        info!(
            "Deleting snapshot {}",
            oldest.record.tag(TAG_NAME).unwrap_or(oldest.record.id.as_ref())
        );
        provider.delete_snapshot(&oldest.record.id)?;
    }
    Ok(())
}
