use chrono::Utc;
use rumqttc::QoS;
use serde_json::{Map, Value};

use crate::home_assistant::entities::{BINARY_SENSORS, SENSORS, on_off};
use crate::mqtt_client::MqttPublisher;
use crate::processors::ProcessorState;
use crate::smartgen_api::models::genset_status::GensetStatus;

/// Publishes one poll's worth of telemetry. Nothing here is retained.
#[derive(Clone)]
pub struct StatusProcessor<M>
where
    M: MqttPublisher,
{
    pub mqtt: M,
    pub publish_flat_topics: bool,
}

impl<M: MqttPublisher> StatusProcessor<M> {
    pub async fn handle(
        &self,
        state: &ProcessorState,
        raw: &Map<String, Value>,
        status: &GensetStatus,
    ) -> anyhow::Result<()> {
        let topics = &state.topics;
        let raw_json = serde_json::to_string(raw)?;

        self.mqtt
            .publish(topics.telemetry(), QoS::AtMostOnce, false, raw_json.clone())
            .await?;

        for sensor in SENSORS {
            self.mqtt
                .publish(topics.state(sensor.key), QoS::AtMostOnce, false, (sensor.value)(status))
                .await?;
        }

        for binary in BINARY_SENSORS {
            self.mqtt
                .publish(
                    topics.state(binary.key),
                    QoS::AtMostOnce,
                    false,
                    on_off((binary.value)(status)),
                )
                .await?;
        }

        if self.publish_flat_topics {
            let flat = [
                ("status", status.state_text().to_string()),
                ("data", raw_json),
                ("alarm", serde_json::to_string(&status.active_alarms)?),
                ("runtime", status.run_hours.to_string()),
                ("last_seen", Utc::now().timestamp().to_string()),
            ];
            for (key, value) in flat {
                self.mqtt
                    .publish(topics.flat(key), QoS::AtMostOnce, false, value)
                    .await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::home_assistant::topics::Topics;
    use crate::mqtt_client::testing::RecordingMqttClient;
    use serde_json::json;

    fn raw() -> Map<String, Value> {
        match json!({"rpm": "1500", "alarms": ["E1"]}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn publishes_telemetry_and_states_unretained() {
        let mqtt = RecordingMqttClient::default();
        let processor = StatusProcessor { mqtt: mqtt.clone(), publish_flat_topics: false };
        let state = ProcessorState::new(Topics::new("smartgen", "42", "homeassistant"));
        let raw = raw();
        let status = GensetStatus::from_vendor(&raw).status;

        processor.handle(&state, &raw, &status).await.unwrap();

        let published = mqtt.published();
        assert_eq!(published.len(), 1 + 9 + 7);
        assert!(published.iter().all(|p| !p.retain));
        assert_eq!(mqtt.published_to("smartgen/42/rpm")[0].payload, "1500");
        assert_eq!(mqtt.published_to("smartgen/42/state")[0].payload, "alarm");
        assert_eq!(mqtt.published_to("smartgen/42/alarm")[0].payload, "ON");
        assert_eq!(mqtt.published_to("smartgen/42/running")[0].payload, "OFF");
        assert_eq!(mqtt.published_to("smartgen/42/alarms_active")[0].payload, "1");

        let telemetry: Value =
            serde_json::from_str(&mqtt.published_to("smartgen/42/telemetry")[0].payload).unwrap();
        assert_eq!(telemetry["rpm"], "1500");
    }

    #[tokio::test]
    async fn flat_topics_are_optional() {
        let mqtt = RecordingMqttClient::default();
        let processor = StatusProcessor { mqtt: mqtt.clone(), publish_flat_topics: true };
        let state = ProcessorState::new(Topics::new("smartgen", "42", "homeassistant"));
        let raw = raw();
        let status = GensetStatus::from_vendor(&raw).status;

        processor.handle(&state, &raw, &status).await.unwrap();

        assert_eq!(mqtt.published_to("smartgen/generator/status")[0].payload, "alarm");
        assert_eq!(mqtt.published_to("smartgen/generator/alarm")[0].payload, "[\"E1\"]");
        assert_eq!(mqtt.published_to("smartgen/generator/runtime")[0].payload, "0");
        assert_eq!(mqtt.published_to("smartgen/generator/last_seen").len(), 1);
        assert!(mqtt.published_to("smartgen/generator/data")[0].payload.contains("1500"));
        assert!(mqtt.published().iter().all(|p| !p.retain));
    }
}
