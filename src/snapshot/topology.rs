//! Topology resolver: builds a logical view of every mounted filesystem on
//! the host from the mount table, expanding software-RAID arrays into their
//! member devices.

use crate::snapshot::command::CommandRunner;
use crate::snapshot::result_error::result::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

const FSTAB_PATH: &str = "/etc/fstab";
const MDADM_SCAN_COMMAND: &str = "sudo mdadm --detail --scan";

/// One mounted filesystem. For RAID arrays `devices` lists every member;
/// otherwise it is exactly the primary device.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Storage {
    pub devices: Vec<Arc<str>>,
    pub primary_device: Arc<str>,
    pub mount_point: Arc<str>,
    pub file_system_type: Arc<str>,
    pub is_raid: bool,
}

/// Resolves all mounted storages, indexed by mount point.
///
/// A mount-table line that does not yield the expected three tokens still
/// produces an entry, with every field empty and indexed under the empty
/// mount point; callers must treat an empty mount point as "no usable
/// storage" rather than erroring on the line.
pub fn mounted_storages(runner: &dyn CommandRunner) -> Result<BTreeMap<Arc<str>, Storage>> {
    let mount_table = runner.run(&format!("cat {FSTAB_PATH}"))?;
    let raid_scan = match runner.run(MDADM_SCAN_COMMAND) {
        Ok(output) => output,
        Err(err) => {
            warn!("RAID scan failed, treating every device as a plain volume: {err}");
            String::new()
        }
    };

    let mut storages = BTreeMap::new();
    for line in mount_table.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("LABEL=") {
            // Blank lines, comments and the table header.
            continue;
        }

        let mut storage = parse_mount_line(trimmed);
        if !storage.primary_device.is_empty() {
            if raid_scan.contains(&format!("ARRAY {}", storage.primary_device)) {
                storage.is_raid = true;
                storage.devices = raid_members(runner, &storage.primary_device)?;
            } else {
                storage.devices = vec![storage.primary_device.clone()];
            }
        }

        if !storage.mount_point.is_empty() && storage.mount_point.as_ref() != "none" {
            debug!("Resolved {storage:?}");
        }
        storages.insert(storage.mount_point.clone(), storage);
    }

    Ok(storages)
}

fn parse_mount_line(line: &str) -> Storage {
    let mut fields = line.split_whitespace();
    match (fields.next(), fields.next(), fields.next()) {
        (Some(device), Some(mount_point), Some(fs_type)) => Storage {
            primary_device: device.into(),
            mount_point: mount_point.into(),
            file_system_type: fs_type.into(),
            ..Storage::default()
        },
        _ => Storage::default(),
    }
}

/// Full member listing of a RAID array, from its detail output. Member lines
/// look like:
///
/// ```text
///    0     202       97        0      active sync   /dev/sdg1
/// ```
fn raid_members(runner: &dyn CommandRunner, array_device: &str) -> Result<Vec<Arc<str>>> {
    let detail = runner.run(&format!("sudo mdadm --detail {array_device}"))?;
    Ok(detail.lines().filter_map(raid_member).map(Arc::from).collect())
}

fn raid_member(line: &str) -> Option<&str> {
    let mut fields = line.split_whitespace();
    for _ in 0..4 {
        fields.next()?.parse::<u64>().ok()?;
    }
    let start = line.find("/dev/")?;
    Some(line[start..].trim_end())
}
