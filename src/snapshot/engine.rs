//! Rule orchestrator: drives every configured backup rule end to end and
//! keeps one rule's failure from touching the others.

use crate::snapshot::backup_config::{BackupConfig, RuleConfig};
use crate::snapshot::cloud::CloudProvider;
use crate::snapshot::command::{self, CommandRunner};
use crate::snapshot::freezer::Freezer;
use crate::snapshot::notifications::{Notification, NotificationConfig};
use crate::snapshot::result_error::error::Error;
use crate::snapshot::result_error::result::Result;
use crate::snapshot::retention::{self, TierRun};
use crate::snapshot::topology::{self, Storage};
use crate::snapshot::volume::{self, Volume};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// The result of one rule's processing, as collected by the run loop.
#[derive(Debug)]
pub struct RuleOutcome {
    pub name: Arc<str>,
    pub result: Result<()>,
}

struct RunContext {
    instance_id: Arc<str>,
    instance_name: Arc<str>,
    volumes: Vec<Volume>,
    storages: BTreeMap<Arc<str>, Storage>,
}

pub struct BackupEngine<'a> {
    provider: &'a dyn CloudProvider,
    runner: &'a dyn CommandRunner,
    notifier: Option<&'a NotificationConfig>,
}

impl<'a> BackupEngine<'a> {
    pub fn new(
        provider: &'a dyn CloudProvider,
        runner: &'a dyn CommandRunner,
        notifier: Option<&'a NotificationConfig>,
    ) -> Self {
        Self {
            provider,
            runner,
            notifier,
        }
    }

    /// Processes every configured rule once, sequentially.
    pub fn run(&self, config: &BackupConfig) -> Vec<RuleOutcome> {
        self.run_at(config, Utc::now())
    }

    /// Like [`BackupEngine::run`] with an explicit clock, so due-time gating
    /// is reproducible.
    ///
    /// A rule's failure is reported (logged, best-effort notified) and the
    /// loop continues; `unfreeze_all` runs after every rule no matter how it
    /// ended, so no storage stays frozen past its rule boundary.
    pub fn run_at(&self, config: &BackupConfig, now: DateTime<Utc>) -> Vec<RuleOutcome> {
        info!(
            "Running backup. It is now {}",
            retention::format_backup_datetime(now)
        );

        let context = match self.prepare() {
            Ok(context) => context,
            Err(err) => {
                self.report("Backup run setup failed", &err);
                return Vec::new();
            }
        };

        let mut freezer = Freezer::new(self.runner, self.notifier);
        let mut outcomes = Vec::with_capacity(config.rules().len());
        for (name, rule) in config.rules() {
            info!("Processing backup rule {name:?}");
            let result = self.process_rule(name, rule, &context, &mut freezer, now);
            if let Err(err) = &result {
                self.report(&format!("Backup rule {name:?} failed"), err);
            }
            freezer.unfreeze_all();
            outcomes.push(RuleOutcome {
                name: name.clone(),
                result,
            });
        }
        outcomes
    }

    fn prepare(&self) -> Result<RunContext> {
        let instance_id = self.provider.instance_id()?;
        let instance_name = self
            .provider
            .instance_name(&instance_id)?
            .unwrap_or_else(|| instance_id.clone());
        let volumes = volume::attached_volumes(self.provider, &instance_id)?;
        let storages = topology::mounted_storages(self.runner)?;
        Ok(RunContext {
            instance_id,
            instance_name,
            volumes,
            storages,
        })
    }

    fn process_rule(
        &self,
        name: &str,
        rule: &RuleConfig,
        context: &RunContext,
        freezer: &mut Freezer<'_>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let storage = context
            .storages
            .get(rule.path.as_ref())
            .ok_or_else(|| Error::MountNotFound(rule.path.clone()))?;

        let volumes = storage
            .devices
            .iter()
            .map(|device| {
                volume::volume_for_device(device, &context.volumes)
                    .cloned()
                    .ok_or_else(|| Error::VolumeNotFound(device.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        command::run_all(self.runner, &rule.before_commands)?;

        info!("Preparing to back up {}", storage.mount_point);
        freezer.freeze(storage)?;

        let tier_run = TierRun {
            provider: self.provider,
            rule_name: name,
            instance_id: &context.instance_id,
            instance_name: &context.instance_name,
            storage,
            volumes: &volumes,
            extra_description: rule.description.as_deref().unwrap_or(""),
        };
        for (tier, max_backups) in rule.tier_maximums() {
            tier_run.process(tier, max_backups, now)?;
        }

        freezer.unfreeze(storage)?;
        command::run_all(self.runner, &rule.after_commands)?;
        Ok(())
    }

    /// Logs a failure and forwards it through the notifier when one is
    /// configured. A notification failure is recorded in the log line and
    /// never escalated past this point.
    fn report(&self, context: &str, err: &Error) {
        let mut reason = format!("{context}: {err}");
        if let Some(notifier) = self.notifier {
            match notifier.send("Backup error!", &reason) {
                Ok(()) => {}
                Err(notify_err) => {
                    debug!("Notification failure: {notify_err}");
                    reason.push_str(" (and failed to send the notification too!)");
                }
            }
        }
        error!("{reason}");
    }
}
