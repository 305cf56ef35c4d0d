//! Home Assistant MQTT discovery payloads for the genset entities.

use serde::Serialize;

use crate::home_assistant::availability::{Availability, AvailabilityMode};
use crate::home_assistant::device::Device;

/// Keys every SmartGen entity carries, flattened into each payload.
#[derive(Serialize, Debug, Clone)]
pub struct EntityBase {
    pub device: Device,
    pub name: String,
    pub unique_id: String,
    pub object_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub availability: Vec<Availability>,
    pub availability_mode: AvailabilityMode,
}

#[derive(Serialize, Debug, Clone)]
pub struct SensorConfig {
    #[serde(flatten)]
    pub base: EntityBase,
    pub state_topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_class: Option<&'static str>,
}

#[derive(Serialize, Debug, Clone)]
pub struct BinarySensorConfig {
    #[serde(flatten)]
    pub base: EntityBase,
    pub state_topic: String,
    pub payload_on: &'static str,
    pub payload_off: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'static str>,
}

/// A switch without a state topic is optimistic in Home Assistant.
#[derive(Serialize, Debug, Clone)]
pub struct SwitchConfig {
    #[serde(flatten)]
    pub base: EntityBase,
    pub command_topic: String,
    pub payload_on: &'static str,
    pub payload_off: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_on: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_off: Option<&'static str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub optimistic: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> EntityBase {
        EntityBase {
            device: Device::genset("42", "smartgen_42"),
            name: "Start".to_string(),
            unique_id: "smartgen_42_start".to_string(),
            object_id: "smartgen_42_start".to_string(),
            icon: None,
            availability: vec![Availability::for_topic("smartgen/42/availability")],
            availability_mode: AvailabilityMode::Latest,
        }
    }

    #[test]
    fn base_keys_are_flattened() {
        let config = SwitchConfig {
            base: base(),
            command_topic: "smartgen/42/command/start".to_string(),
            payload_on: "ON",
            payload_off: "OFF",
            state_topic: None,
            state_on: None,
            state_off: None,
            optimistic: true,
        };
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["unique_id"], "smartgen_42_start");
        assert_eq!(value["device"]["manufacturer"], "SmartGen");
        assert_eq!(value["optimistic"], true);
        assert!(value.get("base").is_none());
        assert!(value.get("icon").is_none());
        assert!(value.get("state_topic").is_none());
    }

    #[test]
    fn stateful_switch_omits_optimistic() {
        let config = SwitchConfig {
            base: base(),
            command_topic: "smartgen/42/command/power".to_string(),
            payload_on: "ON",
            payload_off: "OFF",
            state_topic: Some("smartgen/42/running".to_string()),
            state_on: Some("ON"),
            state_off: Some("OFF"),
            optimistic: false,
        };
        let value = serde_json::to_value(&config).unwrap();
        assert!(value.get("optimistic").is_none());
        assert_eq!(value["state_on"], json!("ON"));
    }
}
