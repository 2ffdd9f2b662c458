use serde::{Deserialize, Deserializer, Serialize};

/// Treat an explicit `null` like an absent key. The feed sends `null` for
/// devices without a fix and for fields it has no value for.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Body of the device-list endpoint, also the payload of every stream frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceListResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub result_list: Vec<Device>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Device {
    #[serde(default, deserialize_with = "null_as_default")]
    pub device_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub display_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub online: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub latest_device_point: LatestDevicePoint,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatestDevicePoint {
    #[serde(default, deserialize_with = "null_as_default")]
    pub lat: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub lng: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub angle: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub formatted_address: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub device_point_detail: DevicePointDetail,
    #[serde(default, deserialize_with = "null_as_default")]
    pub device_state: DeviceState,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DevicePointDetail {
    #[serde(default, deserialize_with = "null_as_default")]
    pub speed: ValueUnitDisplay,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    /// `driving`, `idle` or `off`
    #[serde(default, deserialize_with = "null_as_default")]
    pub drive_status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub drive_status_duration: ValueUnitDisplay,
    #[serde(default, deserialize_with = "null_as_default")]
    pub odometer: ValueUnitDisplay,
}

/// A measurement with its unit and the upstream's preformatted text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueUnitDisplay {
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub unit: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub display: String,
}
