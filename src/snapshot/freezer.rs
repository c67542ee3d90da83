//! Freeze coordinator: issues filesystem freeze/unfreeze commands and owns
//! the set of storages currently frozen, so that everything can be
//! force-unfrozen at every rule boundary.

use crate::snapshot::command::CommandRunner;
use crate::snapshot::notifications::{Notification, NotificationConfig};
use crate::snapshot::result_error::error::Error;
use crate::snapshot::result_error::result::Result;
use crate::snapshot::result_error::WithDebugObjectAndFnName;
use crate::snapshot::topology::Storage;
use tracing::{error, info};

type FreezeCommand = fn(&str) -> String;

/// Filesystem-type → freeze command. New filesystem types are supported by
/// adding a row here and in [`UNFREEZE_COMMANDS`].
const FREEZE_COMMANDS: &[(&str, FreezeCommand)] =
    &[("xfs", |mount_point| format!("sudo xfs_freeze -f {mount_point}"))];

const UNFREEZE_COMMANDS: &[(&str, FreezeCommand)] =
    &[("xfs", |mount_point| format!("sudo xfs_freeze -u {mount_point}"))];

fn lookup(table: &[(&str, FreezeCommand)], file_system_type: &str) -> Option<FreezeCommand> {
    table
        .iter()
        .find(|(fs, _)| *fs == file_system_type)
        .map(|(_, build)| *build)
}

/// Tracks what it has frozen, in freeze order, at most one entry per mount
/// point. If anything goes wrong mid-rule, [`Freezer::unfreeze_all`] brings
/// the host back to an unfrozen state.
pub struct Freezer<'a> {
    runner: &'a dyn CommandRunner,
    notifier: Option<&'a NotificationConfig>,
    frozen: Vec<Storage>,
}

impl<'a> Freezer<'a> {
    pub fn new(runner: &'a dyn CommandRunner, notifier: Option<&'a NotificationConfig>) -> Self {
        Self {
            runner,
            notifier,
            frozen: Vec::new(),
        }
    }

    /// Freezes the filesystem mounted at the storage's mount point. Freezing
    /// is best-effort: a filesystem type with no known freeze command is
    /// logged and skipped without error.
    pub fn freeze(&mut self, storage: &Storage) -> Result<()> {
        let Some(build) = lookup(FREEZE_COMMANDS, &storage.file_system_type) else {
            info!(
                "Does not know how to freeze file system type {}",
                storage.file_system_type
            );
            info!("Continuing without freezing {}", storage.mount_point);
            return Ok(());
        };
        if self
            .frozen
            .iter()
            .any(|s| s.mount_point == storage.mount_point)
        {
            return Ok(());
        }

        info!("Freezing {}", storage.mount_point);
        self.runner
            .run(&build(&storage.mount_point))
            .map(drop)
            .with_debug_object_and_fn_name(storage.clone(), "freeze")?;
        self.frozen.push(storage.clone());
        Ok(())
    }

    /// Unfreezes one storage and drops it from the frozen set on success.
    pub fn unfreeze(&mut self, storage: &Storage) -> Result<()> {
        let Some(build) = lookup(UNFREEZE_COMMANDS, &storage.file_system_type) else {
            info!(
                "Does not know how to unfreeze file system type {}",
                storage.file_system_type
            );
            info!("Continuing without unfreezing {}", storage.mount_point);
            return Ok(());
        };

        info!("Unfreezing {}", storage.mount_point);
        self.runner
            .run(&build(&storage.mount_point))
            .map_err(|err| Error::Unfreeze {
                mount_point: storage.mount_point.clone(),
                source: Box::new(err),
            })?;
        self.frozen.retain(|s| s.mount_point != storage.mount_point);
        Ok(())
    }

    /// Unfreezes everything still marked frozen. A failure for one storage is
    /// reported (best-effort notification, then the log) and never stops the
    /// attempt on the remaining storages; the failed storage stays in the set
    /// and is retried at the next rule boundary.
    pub fn unfreeze_all(&mut self) {
        info!("Unfreezing all");
        for storage in self.frozen.clone() {
            if let Err(err) = self.unfreeze(&storage) {
                let mut reason =
                    format!("Could not unfreeze {} because {err}", storage.mount_point);
                if let Some(notifier) = self.notifier {
                    if notifier.send("Backup could not unfreeze!", &reason).is_err() {
                        reason.push_str(" (and failed to send the notification too!)");
                    }
                }
                error!("{reason}");
            }
        }
    }

    pub fn frozen(&self) -> &[Storage] {
        &self.frozen
    }
}
