use serde::Serialize;

/// Availability entry of a discovery payload. Every SmartGen entity points at
/// the same bridge-wide topic, so Home Assistant greys them out together.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Availability {
    pub topic: String,
    pub payload_available: &'static str,
    pub payload_not_available: &'static str,
}

impl Availability {
    pub fn for_topic(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload_available: AvailabilityState::Online.as_str(),
            payload_not_available: AvailabilityState::Offline.as_str(),
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AvailabilityMode {
    Latest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityState {
    Online,
    Offline,
}

impl AvailabilityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AvailabilityState::Online => "online",
            AvailabilityState::Offline => "offline",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn availability_entry_serializes_payloads() {
        let value = serde_json::to_value(Availability::for_topic("smartgen/1/availability")).unwrap();
        assert_eq!(
            value,
            json!({
                "payload_available": "online",
                "payload_not_available": "offline",
                "topic": "smartgen/1/availability"
            })
        );
        assert_eq!(serde_json::to_value(AvailabilityMode::Latest).unwrap(), json!("latest"));
    }
}
