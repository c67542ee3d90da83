//! Volume resolver: narrows the provider's volume listing down to the
//! volumes attached to this instance and maps device paths to them.

use crate::snapshot::cloud::CloudProvider;
use crate::snapshot::result_error::result::Result;
use std::sync::Arc;
use tracing::debug;

/// A block-storage volume attached to a device path on this host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Volume {
    pub id: Arc<str>,
    pub device: Arc<str>,
}

/// One entry of the provider's raw volume listing. Attachment fields are
/// absent for volumes not attached anywhere.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VolumeAttachment {
    pub volume_id: Arc<str>,
    pub instance_id: Option<Arc<str>>,
    pub device: Option<Arc<str>>,
    pub state: Option<Arc<str>>,
}

/// All volumes currently attached to `instance_id`.
pub fn attached_volumes(provider: &dyn CloudProvider, instance_id: &str) -> Result<Vec<Volume>> {
    let volumes = provider
        .volumes()?
        .into_iter()
        .filter(|v| {
            v.instance_id.as_deref() == Some(instance_id) && v.state.as_deref() == Some("attached")
        })
        .filter_map(attachment_to_volume)
        .collect();
    Ok(volumes)
}

fn attachment_to_volume(attachment: VolumeAttachment) -> Option<Volume> {
    Some(Volume {
        id: attachment.volume_id,
        device: attachment.device?,
    })
}

/// The volume attached at `device`, if any.
pub fn volume_for_device<'a>(device: &str, volumes: &'a [Volume]) -> Option<&'a Volume> {
    debug!("Getting volume id used by {device}");
    volumes.iter().find(|v| v.device.as_ref() == device)
}
