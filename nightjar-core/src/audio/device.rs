//! Input device enumeration for `nightjar devices` and device selection.

use serde::{Deserialize, Serialize};

/// One capture device as reported by the host audio API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub name: String,
    pub is_default: bool,
    /// Default capture rate; clip indices from this device use it.
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
}

/// Order devices for display: default first, then by case-insensitive name.
pub fn sort_devices(devices: &mut [DeviceInfo]) {
    devices.sort_by_key(|d| (!d.is_default, d.name.to_ascii_lowercase()));
}

/// Every input device on the default host, default device first.
///
/// Enumeration failures are logged and yield whatever could be found,
/// possibly nothing.
#[cfg(feature = "audio-cpal")]
pub fn list_input_devices() -> Vec<DeviceInfo> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let default_device = host.default_input_device();
    let default_name = default_device.as_ref().and_then(|d| d.name().ok());

    let describe = |device: &cpal::Device, fallback_name: String| {
        let name = device.name().unwrap_or(fallback_name);
        let config = device.default_input_config().ok();
        DeviceInfo {
            is_default: default_name.as_deref() == Some(name.as_str()),
            sample_rate: config.as_ref().map(|c| c.sample_rate().0),
            channels: config.as_ref().map(|c| c.channels()),
            name,
        }
    };

    let mut list: Vec<DeviceInfo> = match host.input_devices() {
        Ok(devices) => devices
            .enumerate()
            .map(|(idx, device)| describe(&device, format!("input {}", idx + 1)))
            .collect(),
        Err(e) => {
            tracing::warn!("input device enumeration failed: {e}");
            default_device
                .iter()
                .map(|device| describe(device, "default input".into()))
                .collect()
        }
    };

    sort_devices(&mut list);
    list
}

#[cfg(not(feature = "audio-cpal"))]
pub fn list_input_devices() -> Vec<DeviceInfo> {
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str, is_default: bool) -> DeviceInfo {
        DeviceInfo {
            name: name.into(),
            is_default,
            sample_rate: Some(48_000),
            channels: Some(2),
        }
    }

    #[test]
    fn default_device_sorts_first() {
        let mut devices = vec![
            device("b usb", false),
            device("Zoom F3", true),
            device("A line in", false),
        ];
        sort_devices(&mut devices);
        let names: Vec<&str> = devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Zoom F3", "A line in", "b usb"]);
    }

    #[test]
    fn device_info_serializes_camel_case() {
        let json = serde_json::to_value(device("mic", true)).unwrap();
        assert_eq!(json["isDefault"], true);
        assert_eq!(json["sampleRate"], 48_000);
    }
}
