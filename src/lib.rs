//! # ebs-backup
//!
//! Tiered EBS snapshot automation for EC2 instances, with filesystem
//! freezing for crash-consistent snapshots.
//!
//! ## Features
//!
//! - **Tiered Retention**: minutely/hourly/daily/weekly/monthly frequencies,
//!   each with its own retained-snapshot maximum per device
//! - **Consistency**: freezes the filesystem (xfs) around snapshot creation
//!   and force-unfreezes everything on every exit path
//! - **RAID Aware**: snapshots every member device of a software-RAID array
//! - **Provenance Tags**: every snapshot carries name, timestamp, device,
//!   instance and tier tags, and is scheduled/pruned purely through them
//! - **Hooks**: per-rule before/after shell commands
//! - **Best-Effort Notifications**: SMTP error reporting that never masks
//!   the failure it reports
//!
//! ## Quick Start
//!
//! ```no_run
//! use ebs_backup::snapshot::backup_config::BackupConfig;
//! use ebs_backup::snapshot::cloud::aws_cli::AwsCliProvider;
//! use ebs_backup::snapshot::command::ShellRunner;
//! use ebs_backup::snapshot::engine::BackupEngine;
//!
//! // Load configuration from a JSON file
//! let config: BackupConfig =
//!     serde_json::from_reader(std::fs::File::open("backup_config.json")?)?;
//!
//! // Process every configured rule once
//! let runner = ShellRunner;
//! let provider = AwsCliProvider::new(&runner);
//! let engine = BackupEngine::new(&provider, &runner, config.notification.as_ref());
//! engine.run(&config);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod snapshot;
