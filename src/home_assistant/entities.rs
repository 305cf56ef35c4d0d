use crate::smartgen_api::models::action::GensetAction;
use crate::smartgen_api::models::genset_status::GensetStatus;

pub const PAYLOAD_ON: &str = "ON";
pub const PAYLOAD_OFF: &str = "OFF";

pub struct SensorEntity {
    pub key: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub unit: Option<&'static str>,
    pub device_class: Option<&'static str>,
    pub state_class: Option<&'static str>,
    pub value: fn(&GensetStatus) -> String,
}

pub struct BinarySensorEntity {
    pub key: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub device_class: Option<&'static str>,
    pub value: fn(&GensetStatus) -> bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchKind {
    /// Only `ON` does something.
    Momentary(GensetAction),
    /// `ON` and `OFF` map to opposite actions.
    Toggle { on: GensetAction, off: GensetAction },
}

pub struct SwitchEntity {
    pub key: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub kind: SwitchKind,
    /// Binary sensor whose state mirrors this switch.
    pub state_key: Option<&'static str>,
}

impl SwitchEntity {
    pub fn action_for(&self, on: bool) -> Option<GensetAction> {
        match (self.kind, on) {
            (SwitchKind::Momentary(action), true) => Some(action),
            (SwitchKind::Momentary(_), false) => None,
            (SwitchKind::Toggle { on: action, .. }, true) => Some(action),
            (SwitchKind::Toggle { off: action, .. }, false) => Some(action),
        }
    }
}

fn state_text(s: &GensetStatus) -> String {
    s.state_text().to_string()
}
fn rpm(s: &GensetStatus) -> String {
    s.rpm.to_string()
}
fn frequency(s: &GensetStatus) -> String {
    s.frequency_hz.to_string()
}
fn voltage_l1l2(s: &GensetStatus) -> String {
    s.voltage_l1l2.to_string()
}
fn voltage_l2l3(s: &GensetStatus) -> String {
    s.voltage_l2l3.to_string()
}
fn voltage_l3l1(s: &GensetStatus) -> String {
    s.voltage_l3l1.to_string()
}
fn power(s: &GensetStatus) -> String {
    s.power_kw.to_string()
}
fn run_hours(s: &GensetStatus) -> String {
    s.run_hours.to_string()
}
fn alarm_count(s: &GensetStatus) -> String {
    s.active_alarms.len().to_string()
}

pub const SENSORS: &[SensorEntity] = &[
    SensorEntity {
        key: "state",
        name: "State",
        icon: "mdi:engine",
        unit: None,
        device_class: None,
        state_class: None,
        value: state_text,
    },
    SensorEntity {
        key: "rpm",
        name: "RPM",
        icon: "mdi:engine",
        unit: Some("rpm"),
        device_class: None,
        state_class: Some("measurement"),
        value: rpm,
    },
    SensorEntity {
        key: "frequency_hz",
        name: "Frequency",
        icon: "mdi:flash",
        unit: Some("Hz"),
        device_class: Some("frequency"),
        state_class: Some("measurement"),
        value: frequency,
    },
    SensorEntity {
        key: "voltage_l1_l2",
        name: "Voltage L1-L2",
        icon: "mdi:flash",
        unit: Some("V"),
        device_class: Some("voltage"),
        state_class: Some("measurement"),
        value: voltage_l1l2,
    },
    SensorEntity {
        key: "voltage_l2_l3",
        name: "Voltage L2-L3",
        icon: "mdi:flash",
        unit: Some("V"),
        device_class: Some("voltage"),
        state_class: Some("measurement"),
        value: voltage_l2l3,
    },
    SensorEntity {
        key: "voltage_l3_l1",
        name: "Voltage L3-L1",
        icon: "mdi:flash",
        unit: Some("V"),
        device_class: Some("voltage"),
        state_class: Some("measurement"),
        value: voltage_l3l1,
    },
    SensorEntity {
        key: "kw",
        name: "Active Power",
        icon: "mdi:transmission-tower",
        unit: Some("kW"),
        device_class: Some("power"),
        state_class: Some("measurement"),
        value: power,
    },
    SensorEntity {
        key: "run_hours",
        name: "Run Hours",
        icon: "mdi:timer-outline",
        unit: Some("h"),
        device_class: None,
        state_class: Some("total_increasing"),
        value: run_hours,
    },
    SensorEntity {
        key: "alarms_active",
        name: "Active Alarms",
        icon: "mdi:alert",
        unit: None,
        device_class: None,
        state_class: Some("measurement"),
        value: alarm_count,
    },
];

pub const BINARY_SENSORS: &[BinarySensorEntity] = &[
    BinarySensorEntity {
        key: "running",
        name: "Running",
        icon: "mdi:engine-outline",
        device_class: Some("running"),
        value: |s| s.running,
    },
    BinarySensorEntity {
        key: "alarm",
        name: "Alarm Present",
        icon: "mdi:alert",
        device_class: Some("problem"),
        value: |s| s.alarm_present,
    },
    BinarySensorEntity {
        key: "mains_available",
        name: "Mains Available",
        icon: "mdi:flash",
        device_class: Some("power"),
        value: |s| s.mains_available,
    },
    BinarySensorEntity {
        key: "genset_breaker_closed",
        name: "Genset Breaker Closed",
        icon: "mdi:transmission-tower",
        device_class: None,
        value: |s| s.genset_breaker_closed,
    },
    BinarySensorEntity {
        key: "mains_breaker_closed",
        name: "Mains Breaker Closed",
        icon: "mdi:transmission-tower-export",
        device_class: None,
        value: |s| s.mains_breaker_closed,
    },
    BinarySensorEntity {
        key: "auto_mode",
        name: "Auto Mode",
        icon: "mdi:alpha-a-circle",
        device_class: None,
        value: |s| s.auto_mode,
    },
    BinarySensorEntity {
        key: "manual_mode",
        name: "Manual Mode",
        icon: "mdi:hand",
        device_class: None,
        value: |s| s.manual_mode,
    },
];

pub const SWITCHES: &[SwitchEntity] = &[
    SwitchEntity {
        key: "start",
        name: "Start",
        icon: "mdi:power",
        kind: SwitchKind::Momentary(GensetAction::Start),
        state_key: None,
    },
    SwitchEntity {
        key: "stop",
        name: "Stop",
        icon: "mdi:stop",
        kind: SwitchKind::Momentary(GensetAction::Stop),
        state_key: None,
    },
    SwitchEntity {
        key: "power",
        name: "Power",
        icon: "mdi:power-plug",
        kind: SwitchKind::Toggle {
            on: GensetAction::Start,
            off: GensetAction::Stop,
        },
        state_key: Some("running"),
    },
    SwitchEntity {
        key: "auto",
        name: "Auto Mode",
        icon: "mdi:alpha-a-circle-outline",
        kind: SwitchKind::Momentary(GensetAction::SetAuto),
        state_key: Some("auto_mode"),
    },
    SwitchEntity {
        key: "manual",
        name: "Manual Mode",
        icon: "mdi:hand",
        kind: SwitchKind::Momentary(GensetAction::SetManual),
        state_key: Some("manual_mode"),
    },
    SwitchEntity {
        key: "genset_breaker",
        name: "Genset Breaker",
        icon: "mdi:transmission-tower",
        kind: SwitchKind::Toggle {
            on: GensetAction::CloseGensetBreaker,
            off: GensetAction::OpenGensetBreaker,
        },
        state_key: Some("genset_breaker_closed"),
    },
    SwitchEntity {
        key: "mains_breaker",
        name: "Mains Breaker",
        icon: "mdi:transmission-tower-export",
        kind: SwitchKind::Toggle {
            on: GensetAction::CloseMainsBreaker,
            off: GensetAction::OpenMainsBreaker,
        },
        state_key: Some("mains_breaker_closed"),
    },
];

pub fn switch(key: &str) -> Option<&'static SwitchEntity> {
    SWITCHES.iter().find(|s| s.key == key)
}

pub fn on_off(value: bool) -> &'static str {
    if value { PAYLOAD_ON } else { PAYLOAD_OFF }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn entity_counts_match_the_published_set() {
        assert_eq!(SWITCHES.len(), 7);
        assert_eq!(SENSORS.len(), 9);
        assert_eq!(BINARY_SENSORS.len(), 7);
    }

    #[test]
    fn keys_are_unique_across_state_topics() {
        let mut keys = HashSet::new();
        for key in SENSORS.iter().map(|s| s.key).chain(BINARY_SENSORS.iter().map(|b| b.key)) {
            assert!(keys.insert(key), "duplicate state key {}", key);
        }
    }

    #[test]
    fn switch_state_keys_point_at_binary_sensors() {
        for switch in SWITCHES {
            if let Some(state_key) = switch.state_key {
                assert!(BINARY_SENSORS.iter().any(|b| b.key == state_key));
            }
        }
    }

    #[test]
    fn every_action_is_reachable_from_a_switch() {
        let reachable: HashSet<_> = SWITCHES
            .iter()
            .flat_map(|s| [s.action_for(true), s.action_for(false)])
            .flatten()
            .collect();
        assert_eq!(reachable.len(), 8);
    }

    #[test]
    fn numbers_render_without_trailing_zeroes() {
        let status = GensetStatus {
            rpm: 1500.0,
            frequency_hz: 50.25,
            ..GensetStatus::default()
        };
        assert_eq!((SENSORS[1].value)(&status), "1500");
        assert_eq!((SENSORS[2].value)(&status), "50.25");
    }
}
