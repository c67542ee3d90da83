//! Declarative backup configuration, loaded once per run from a JSON file.
//!
//! The file is a mapping from a human-readable backup name to a rule object:
//!
//! ```json
//! {
//!   "The raid array": {
//!     "path": "/mnt/raid",
//!     "weekly": 6,
//!     "monthly": 6,
//!     "description": "Additional info to add to the description."
//!   },
//!   "Some mounted volume": {
//!     "path": "/home/ec2-user/mydirectory",
//!     "hourly": 6,
//!     "daily": 30,
//!     "before_commands": ["echo before > /tmp/commands.txt"],
//!     "after_commands": ["echo after >> /tmp/commands.txt"]
//!   }
//! }
//! ```
//!
//! The top-level key `notification` is reserved: when present it configures
//! the error-notification transport instead of naming a backup rule.

use crate::snapshot::notifications::NotificationConfig;
use crate::snapshot::tier::Tier;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::BTreeMap;
use std::sync::Arc;
use validator::{Validate, ValidationError, ValidationErrors};

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct BackupConfig {
    pub notification: Option<NotificationConfig>,
    #[serde(flatten)]
    rules: BTreeMap<Arc<str>, RuleConfig>,
}

impl BackupConfig {
    /// The configured rules, in deterministic (name) order.
    pub fn rules(&self) -> &BTreeMap<Arc<str>, RuleConfig> {
        &self.rules
    }
}

impl Validate for BackupConfig {
    fn validate(&self) -> Result<(), ValidationErrors> {
        for (name, rule) in &self.rules {
            rule.validate()?;
            if rule.tier_maximums().next().is_none() {
                let mut errors = ValidationErrors::new();
                errors.add(
                    "rules".into(),
                    ValidationError::new("NoTiers").with_message(
                        format!(
                            "Rule {name:?} configures no backup frequency \
                             (minutely/hourly/daily/weekly/monthly)"
                        )
                        .into(),
                    ),
                );
                return Err(errors);
            }
        }
        if let Some(notification) = &self.notification {
            notification.validate()?;
        }
        Ok(())
    }
}

/// One named backup target. Each present tier field is the maximum number of
/// snapshots retained per device for that frequency.
#[skip_serializing_none]
#[derive(Clone, Serialize, Deserialize, Debug, Validate)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    #[validate(custom(function = validate_path_not_empty))]
    pub path: Arc<str>,
    #[validate(range(min = 1))]
    pub minutely: Option<usize>,
    #[validate(range(min = 1))]
    pub hourly: Option<usize>,
    #[validate(range(min = 1))]
    pub daily: Option<usize>,
    #[validate(range(min = 1))]
    pub weekly: Option<usize>,
    #[validate(range(min = 1))]
    pub monthly: Option<usize>,
    #[serde(default)]
    pub before_commands: Vec<Arc<str>>,
    #[serde(default)]
    pub after_commands: Vec<Arc<str>>,
    pub description: Option<String>,
}

fn validate_path_not_empty(path: &Arc<str>) -> Result<(), ValidationError> {
    if path.is_empty() {
        return Err(ValidationError::new("EmptyPath")
            .with_message("path must name a mount point".into()));
    }

    Ok(())
}

impl RuleConfig {
    pub fn max_backups(&self, tier: Tier) -> Option<usize> {
        match tier {
            Tier::Minutely => self.minutely,
            Tier::Hourly => self.hourly,
            Tier::Daily => self.daily,
            Tier::Weekly => self.weekly,
            Tier::Monthly => self.monthly,
        }
    }

    /// Configured tiers with their retention maximums, in [`Tier::ALL`]
    /// declared order.
    pub fn tier_maximums(&self) -> impl Iterator<Item = (Tier, usize)> + '_ {
        Tier::ALL
            .iter()
            .filter_map(|&tier| self.max_backups(tier).map(|max| (tier, max)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> BackupConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_example_config() {
        let config = parse(
            r#"{
                "The raid array": {
                    "path": "/mnt/raid",
                    "weekly": 6,
                    "monthly": 6,
                    "description": "Additional info."
                },
                "Some mounted volume": {
                    "path": "/home/ec2-user/mydirectory",
                    "hourly": 6,
                    "daily": 30,
                    "before_commands": ["echo before"],
                    "after_commands": ["echo after", "echo after2"]
                }
            }"#,
        );

        assert!(config.validate().is_ok());
        assert_eq!(config.rules().len(), 2);

        let raid = &config.rules()["The raid array"];
        assert_eq!(raid.path.as_ref(), "/mnt/raid");
        assert_eq!(raid.max_backups(Tier::Weekly), Some(6));
        assert_eq!(raid.max_backups(Tier::Hourly), None);
        assert_eq!(raid.description.as_deref(), Some("Additional info."));

        let volume = &config.rules()["Some mounted volume"];
        assert_eq!(volume.before_commands.len(), 1);
        assert_eq!(volume.after_commands.len(), 2);
    }

    #[test]
    fn test_tier_maximums_iterate_in_declared_order() {
        let config = parse(
            r#"{ "Everything": {
                "path": "/mnt/all",
                "monthly": 4, "hourly": 6, "weekly": 5, "daily": 30, "minutely": 2
            } }"#,
        );

        let tiers: Vec<_> = config.rules()["Everything"].tier_maximums().collect();
        assert_eq!(
            tiers,
            vec![
                (Tier::Minutely, 2),
                (Tier::Hourly, 6),
                (Tier::Daily, 30),
                (Tier::Weekly, 5),
                (Tier::Monthly, 4),
            ]
        );
    }

    #[test]
    fn test_rule_without_tier_fails_validation() {
        let config = parse(r#"{ "Cache volume": { "path": "/mnt/data" } }"#);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Cache volume"));
    }

    #[test]
    fn test_zero_retention_count_fails_validation() {
        let config = parse(r#"{ "Zero": { "path": "/mnt/data", "daily": 0 } }"#);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_rule_key_is_rejected() {
        let result = serde_json::from_str::<BackupConfig>(
            r#"{ "Typo": { "path": "/mnt/data", "dayly": 3 } }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_notification_key_is_not_a_rule() {
        let config = parse(
            r#"{
                "Data volume": { "path": "/mnt/data", "daily": 3 },
                "notification": {
                    "type": "smtp",
                    "host": "smtp.example.com",
                    "smtp_mode": "Ssl",
                    "from": "backup@example.com",
                    "to": ["ops@example.com"],
                    "username": "backup",
                    "password": "hunter2hunter2"
                }
            }"#,
        );

        assert_eq!(config.rules().len(), 1);
        assert!(config.notification.is_some());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_survives_file_round_trip() {
        let config = parse(r#"{ "Data volume": { "path": "/mnt/data", "daily": 3 } }"#);
        let file = tempfile::NamedTempFile::new().unwrap();
        serde_json::to_writer(&file, &config).unwrap();

        let reloaded: BackupConfig =
            serde_json::from_reader(std::fs::File::open(file.path()).unwrap()).unwrap();
        assert_eq!(reloaded.rules()["Data volume"].daily, Some(3));
    }
}
