//! Partitioning of multi-device targets by destination server.

use crate::request::Device;
use indexmap::IndexMap;

pub type ServerOrigin = String;

/// Groups devices by their declared server, exactly as written.
///
/// Groups appear in the order their server is first seen, and devices keep
/// their relative input order inside a group. Devices without a server are
/// left out of every group.
pub fn group_by_server(devices: &[Device]) -> IndexMap<ServerOrigin, Vec<&Device>> {
    let mut groups: IndexMap<ServerOrigin, Vec<&Device>> = IndexMap::new();

    for device in devices {
        match device.server.as_deref().filter(|s| !s.is_empty()) {
            Some(server) => groups.entry(server.to_string()).or_default().push(device),
            None => {
                tracing::warn!(
                    api_url = %device.api_url,
                    device_key = %device.device_key,
                    "Device has no server, excluding it from the push"
                );
            }
        }
    }

    groups
}
