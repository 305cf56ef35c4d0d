use serde::Serialize;
use serde_json::{Map, Value};

/// Normalized genset telemetry. Every field has a fallback, so a status can
/// always be produced from whatever the vendor sent.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct GensetStatus {
    pub running: bool,
    pub mains_available: bool,
    pub genset_breaker_closed: bool,
    pub mains_breaker_closed: bool,
    pub auto_mode: bool,
    pub manual_mode: bool,
    pub alarm_present: bool,
    pub rpm: f64,
    pub frequency_hz: f64,
    pub voltage_l1l2: f64,
    pub voltage_l2l3: f64,
    pub voltage_l3l1: f64,
    pub power_kw: f64,
    pub run_hours: f64,
    pub active_alarms: Vec<String>,
}

/// Result of mapping one vendor payload.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusMapping {
    pub status: GensetStatus,
    pub degraded: bool,
    /// Fields that were present but could not be coerced.
    pub malformed: Vec<&'static str>,
}

const RPM_KEYS: &[&str] = &["rpm", "RPM", "speed", "gensetrpm"];
const FREQUENCY_KEYS: &[&str] = &["hz", "frequency", "Frequency", "frequency_hz"];
const VOLTAGE_L1L2_KEYS: &[&str] = &["voltage_l1_l2", "uab", "Uab", "u_ab", "ua"];
const VOLTAGE_L2L3_KEYS: &[&str] = &["voltage_l2_l3", "ubc", "Ubc", "u_bc", "ub"];
const VOLTAGE_L3L1_KEYS: &[&str] = &["voltage_l3_l1", "uca", "Uca", "u_ca", "uc"];
const POWER_KEYS: &[&str] = &["kw", "power_kw", "active_power", "kW"];
const RUN_HOURS_KEYS: &[&str] = &["run_hours", "runtime", "TotalRunTime", "runhour", "runtotal"];
const ALARM_KEYS: &[&str] = &["alarms", "alarm_list", "AlarmList", "alarm_count"];
const RUNNING_KEYS: &[&str] = &["running", "run_state", "runState", "is_running", "Run"];
const AUTO_KEYS: &[&str] = &["auto", "auto_mode", "AutoMode", "IsAuto"];
const MANUAL_KEYS: &[&str] = &["manual", "manual_mode", "ManualMode"];
const MAINS_KEYS: &[&str] = &["mains", "mains_available", "GridAvailable", "MainsAvailable"];
const GENSET_BREAKER_KEYS: &[&str] = &[
    "genset_breaker",
    "genset_breaker_closed",
    "GenBreaker",
    "GenBreakerClosed",
];
const MAINS_BREAKER_KEYS: &[&str] = &[
    "mains_breaker",
    "mains_breaker_closed",
    "MainsBreaker",
    "MainsBreakerClosed",
];

/// Upper bound on synthetic alarm codes generated from a bare count.
const MAX_PLACEHOLDER_ALARMS: u64 = 64;

fn lookup<'a>(payload: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| match payload.get(*key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(value) => Some(value),
    })
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        Value::String(s) => {
            let s = s.trim().to_ascii_lowercase();
            match s.as_str() {
                "true" | "1" | "on" | "yes" => Some(true),
                "false" | "0" | "off" | "no" => Some(false),
                _ => s.parse::<f64>().ok().map(|n| n != 0.0),
            }
        }
        _ => None,
    }
}

fn placeholder_alarms(count: f64) -> Vec<String> {
    let count = if count.is_finite() && count > 0.0 {
        (count as u64).min(MAX_PLACEHOLDER_ALARMS)
    } else {
        0
    };
    (1..=count).map(|n| format!("alarm_{}", n)).collect()
}

fn alarm_code(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => ["code", "id", "name"]
            .iter()
            .find_map(|key| map.get(*key))
            .map(alarm_code)
            .unwrap_or_else(|| value.to_string()),
        other => other.to_string(),
    }
}

fn coerce_alarms(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(items.iter().map(alarm_code).collect()),
        other => coerce_number(other).map(placeholder_alarms),
    }
}

struct Mapper<'a> {
    payload: &'a Map<String, Value>,
    recognized: usize,
    malformed: Vec<&'static str>,
}

impl<'a> Mapper<'a> {
    fn field<T>(
        &mut self,
        name: &'static str,
        keys: &[&str],
        coerce: impl Fn(&Value) -> Option<T>,
    ) -> Option<T> {
        let value = lookup(self.payload, keys)?;
        self.recognized += 1;
        let coerced = coerce(value);
        if coerced.is_none() {
            self.malformed.push(name);
        }
        coerced
    }

    fn number(&mut self, name: &'static str, keys: &[&str]) -> f64 {
        self.field(name, keys, coerce_number).unwrap_or_default()
    }

    fn flag(&mut self, name: &'static str, keys: &[&str]) -> bool {
        self.field(name, keys, coerce_bool).unwrap_or_default()
    }
}

impl GensetStatus {
    /// Maps a raw vendor payload. Total: unexpected shapes fall back to
    /// defaults and mark the mapping degraded.
    pub fn from_vendor(payload: &Map<String, Value>) -> StatusMapping {
        let mut mapper = Mapper {
            payload,
            recognized: 0,
            malformed: Vec::new(),
        };

        let active_alarms = mapper
            .field("active_alarms", ALARM_KEYS, coerce_alarms)
            .unwrap_or_default();
        let alarm_flag = mapper.flag("alarm", &["alarm", "alarm_present"]);

        let status = GensetStatus {
            running: mapper.flag("running", RUNNING_KEYS),
            mains_available: mapper.flag("mains_available", MAINS_KEYS),
            genset_breaker_closed: mapper.flag("genset_breaker_closed", GENSET_BREAKER_KEYS),
            mains_breaker_closed: mapper.flag("mains_breaker_closed", MAINS_BREAKER_KEYS),
            auto_mode: mapper.flag("auto_mode", AUTO_KEYS),
            manual_mode: mapper.flag("manual_mode", MANUAL_KEYS),
            alarm_present: alarm_flag || !active_alarms.is_empty(),
            rpm: mapper.number("rpm", RPM_KEYS),
            frequency_hz: mapper.number("frequency_hz", FREQUENCY_KEYS),
            voltage_l1l2: mapper.number("voltage_l1l2", VOLTAGE_L1L2_KEYS),
            voltage_l2l3: mapper.number("voltage_l2l3", VOLTAGE_L2L3_KEYS),
            voltage_l3l1: mapper.number("voltage_l3l1", VOLTAGE_L3L1_KEYS),
            power_kw: mapper.number("power_kw", POWER_KEYS),
            run_hours: mapper.number("run_hours", RUN_HOURS_KEYS),
            active_alarms,
        };

        StatusMapping {
            status,
            degraded: mapper.recognized == 0 || !mapper.malformed.is_empty(),
            malformed: mapper.malformed,
        }
    }

    pub fn state_text(&self) -> &'static str {
        if self.alarm_present {
            "alarm"
        } else if self.running {
            "running"
        } else {
            "stopped"
        }
    }
}
