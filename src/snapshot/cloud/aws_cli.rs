//! [`CloudProvider`] implementation that drives the `aws ec2` CLI through
//! the injected command runner and parses its `--output json` responses.
//! Instance identity comes from the EC2 instance-metadata endpoint.

use crate::snapshot::cloud::{CloudProvider, SnapshotFilter, SnapshotRecord};
use crate::snapshot::command::CommandRunner;
use crate::snapshot::result_error::error::Error;
use crate::snapshot::result_error::result::Result;
use crate::snapshot::result_error::WithMsg;
use crate::snapshot::volume::VolumeAttachment;
use itertools::Itertools;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

const INSTANCE_ID_COMMAND: &str =
    "wget -q -O - http://169.254.169.254/latest/meta-data/instance-id";

pub struct AwsCliProvider<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> AwsCliProvider<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    fn json(&self, command: &str) -> Result<Value> {
        let output = self.runner.run(command)?;
        serde_json::from_str(&output)
            .map_err(Error::from)
            .with_msg(format!("Unexpected output from {command:?}"))
    }
}

/// Single-quotes a value for interpolation into an `sh -c` command line.
fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn tag_value<'v>(tags: &'v Value, key: &str) -> Option<&'v str> {
    tags.as_array()?
        .iter()
        .find(|tag| tag.get("Key").and_then(Value::as_str) == Some(key))?
        .get("Value")?
        .as_str()
}

fn required_str(value: &Value, key: &str, what: &str) -> Result<Arc<str>> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(Arc::from)
        .ok_or_else(|| Error::Cloud(format!("{what} response is missing {key}")))
}

impl CloudProvider for AwsCliProvider<'_> {
    fn instance_id(&self) -> Result<Arc<str>> {
        let output = self.runner.run(INSTANCE_ID_COMMAND)?;
        let instance_id = output.trim();
        if instance_id.is_empty() {
            return Err(Error::Cloud(
                "instance metadata returned an empty instance id".to_string(),
            ));
        }
        Ok(instance_id.into())
    }

    fn instance_name(&self, instance_id: &str) -> Result<Option<Arc<str>>> {
        let value = self.json(&format!(
            "aws ec2 describe-instances --instance-ids {instance_id} --output json"
        ))?;
        let instance = value
            .get("Reservations")
            .and_then(|r| r.get(0))
            .and_then(|r| r.get("Instances"))
            .and_then(|i| i.get(0))
            .ok_or_else(|| Error::Cloud(format!("no reservation found for {instance_id}")))?;
        Ok(instance
            .get("Tags")
            .and_then(|tags| tag_value(tags, "Name"))
            .map(Arc::from))
    }

    fn volumes(&self) -> Result<Vec<VolumeAttachment>> {
        let value = self.json("aws ec2 describe-volumes --output json")?;
        let volumes = value
            .get("Volumes")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::Cloud("describe-volumes response is missing Volumes".into()))?;

        let null = Value::Null;
        volumes
            .iter()
            .map(|volume| {
                let attachment = volume
                    .get("Attachments")
                    .and_then(|a| a.get(0))
                    .unwrap_or(&null);
                Ok(VolumeAttachment {
                    volume_id: required_str(volume, "VolumeId", "describe-volumes")?,
                    instance_id: attachment
                        .get("InstanceId")
                        .and_then(Value::as_str)
                        .map(Arc::from),
                    device: attachment
                        .get("Device")
                        .and_then(Value::as_str)
                        .map(Arc::from),
                    state: attachment
                        .get("State")
                        .and_then(Value::as_str)
                        .map(Arc::from),
                })
            })
            .collect()
    }

    fn snapshots(&self, filter: &SnapshotFilter<'_>) -> Result<Vec<SnapshotRecord>> {
        let command = format!(
            "aws ec2 describe-snapshots --owner-ids self --filters \
             {} {} --output json",
            sh_quote(&format!("Name=tag:Backup-Type,Values={}", filter.backup_type)),
            sh_quote(&format!(
                "Name=tag:Backup-Instance-Name,Values={}",
                filter.instance_name
            )),
        );
        let value = self.json(&command)?;
        let snapshots = value
            .get("Snapshots")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                Error::Cloud("describe-snapshots response is missing Snapshots".into())
            })?;

        snapshots
            .iter()
            .map(|snapshot| {
                let tags = snapshot
                    .get("Tags")
                    .and_then(Value::as_array)
                    .map(|tags| {
                        tags.iter()
                            .filter_map(|tag| {
                                Some((
                                    tag.get("Key")?.as_str()?.to_string(),
                                    tag.get("Value")?.as_str()?.to_string(),
                                ))
                            })
                            .collect::<BTreeMap<_, _>>()
                    })
                    .unwrap_or_default();
                Ok(SnapshotRecord {
                    id: required_str(snapshot, "SnapshotId", "describe-snapshots")?,
                    tags,
                })
            })
            .collect()
    }

    fn create_snapshot(&self, volume_id: &str, description: &str) -> Result<Arc<str>> {
        let value = self.json(&format!(
            "aws ec2 create-snapshot --volume-id {volume_id} --description {} --output json",
            sh_quote(description)
        ))?;
        required_str(&value, "SnapshotId", "create-snapshot")
    }

    fn tag_snapshot(&self, snapshot_id: &str, tags: &[(&str, String)]) -> Result<()> {
        let tag_args = tags
            .iter()
            .map(|(key, value)| sh_quote(&format!("Key={key},Value={value}")))
            .join(" ");
        self.runner
            .run(&format!(
                "aws ec2 create-tags --resources {snapshot_id} --tags {tag_args}"
            ))
            .map(drop)
    }

    fn delete_snapshot(&self, snapshot_id: &str) -> Result<()> {
        self.runner
            .run(&format!("aws ec2 delete-snapshot --snapshot-id {snapshot_id}"))
            .map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::command::testing::ScriptedRunner;
    use crate::snapshot::tier::Tier;

    #[test]
    fn test_sh_quote() {
        assert_eq!(sh_quote("plain"), "'plain'");
        assert_eq!(sh_quote("with space"), "'with space'");
        assert_eq!(sh_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_instance_id_trims_metadata_output() {
        let runner = ScriptedRunner::new();
        runner.respond(INSTANCE_ID_COMMAND, "i-0abc123\n");

        let provider = AwsCliProvider::new(&runner);
        assert_eq!(provider.instance_id().unwrap().as_ref(), "i-0abc123");
    }

    #[test]
    fn test_empty_instance_id_is_an_error() {
        let runner = ScriptedRunner::new();
        runner.respond(INSTANCE_ID_COMMAND, "\n");

        let provider = AwsCliProvider::new(&runner);
        assert!(matches!(provider.instance_id(), Err(Error::Cloud(_))));
    }

    #[test]
    fn test_instance_name_reads_name_tag() {
        let runner = ScriptedRunner::new();
        runner.respond(
            "aws ec2 describe-instances --instance-ids i-0abc123 --output json",
            r#"{ "Reservations": [ { "Instances": [ {
                "InstanceId": "i-0abc123",
                "Tags": [ { "Key": "env", "Value": "prod" },
                          { "Key": "Name", "Value": "web-1" } ]
            } ] } ] }"#,
        );

        let provider = AwsCliProvider::new(&runner);
        let name = provider.instance_name("i-0abc123").unwrap();
        assert_eq!(name.as_deref(), Some("web-1"));
    }

    #[test]
    fn test_instance_without_name_tag() {
        let runner = ScriptedRunner::new();
        runner.respond(
            "aws ec2 describe-instances --instance-ids i-0abc123 --output json",
            r#"{ "Reservations": [ { "Instances": [ { "InstanceId": "i-0abc123" } ] } ] }"#,
        );

        let provider = AwsCliProvider::new(&runner);
        assert_eq!(provider.instance_name("i-0abc123").unwrap(), None);
    }

    #[test]
    fn test_volumes_carry_attachment_fields() {
        let runner = ScriptedRunner::new();
        runner.respond(
            "aws ec2 describe-volumes --output json",
            r#"{ "Volumes": [
                { "VolumeId": "vol-1",
                  "Attachments": [ { "InstanceId": "i-0abc123",
                                     "Device": "/dev/sdf",
                                     "State": "attached" } ] },
                { "VolumeId": "vol-2", "Attachments": [] }
            ] }"#,
        );

        let provider = AwsCliProvider::new(&runner);
        let volumes = provider.volumes().unwrap();

        assert_eq!(volumes.len(), 2);
        assert_eq!(volumes[0].device.as_deref(), Some("/dev/sdf"));
        assert_eq!(volumes[0].state.as_deref(), Some("attached"));
        assert_eq!(volumes[1].volume_id.as_ref(), "vol-2");
        assert_eq!(volumes[1].device, None);
    }

    #[test]
    fn test_snapshots_filter_command_and_tag_parsing() {
        let runner = ScriptedRunner::new();
        let command = "aws ec2 describe-snapshots --owner-ids self --filters \
                       'Name=tag:Backup-Type,Values=daily' \
                       'Name=tag:Backup-Instance-Name,Values=web 1' --output json";
        runner.respond(
            command,
            r#"{ "Snapshots": [ { "SnapshotId": "snap-1",
                "Tags": [ { "Key": "Backup-Device", "Value": "/dev/sdf" } ] } ] }"#,
        );

        let provider = AwsCliProvider::new(&runner);
        let snapshots = provider
            .snapshots(&SnapshotFilter {
                backup_type: Tier::Daily,
                instance_name: "web 1",
            })
            .unwrap();

        assert!(runner.ran(command));
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].tag("Backup-Device"), Some("/dev/sdf"));
    }

    #[test]
    fn test_create_snapshot_returns_id_and_quotes_description() {
        let runner = ScriptedRunner::new();
        let command = "aws ec2 create-snapshot --volume-id vol-1 \
                       --description 'nightly backup' --output json";
        runner.respond(command, r#"{ "SnapshotId": "snap-9" }"#);

        let provider = AwsCliProvider::new(&runner);
        let id = provider.create_snapshot("vol-1", "nightly backup").unwrap();

        assert_eq!(id.as_ref(), "snap-9");
    }

    #[test]
    fn test_malformed_response_is_a_cloud_error() {
        let runner = ScriptedRunner::new();
        runner.respond("aws ec2 describe-volumes --output json", r#"{ "Nope": [] }"#);

        let provider = AwsCliProvider::new(&runner);
        assert!(matches!(provider.volumes(), Err(Error::Cloud(_))));
    }
}
