use rumqttc::QoS;
use serde::Serialize;
use tracing::{debug, info};

use crate::home_assistant::availability::{Availability, AvailabilityMode};
use crate::home_assistant::discovery::{BinarySensorConfig, EntityBase, SensorConfig, SwitchConfig};
use crate::home_assistant::entities::{
    BINARY_SENSORS, PAYLOAD_OFF, PAYLOAD_ON, SENSORS, SWITCHES, SwitchEntity,
};
use crate::mqtt_client::MqttPublisher;
use crate::processors::ProcessorState;

#[derive(Clone)]
pub struct DiscoveryProcessor<M>
where
    M: MqttPublisher,
{
    pub mqtt: M,
}

impl<M: MqttPublisher> DiscoveryProcessor<M> {
    /// Publishes every discovery config not yet sent on this connection and
    /// subscribes to the matching command topics. Returns how many configs
    /// went out.
    pub async fn handle(&self, state: &ProcessorState) -> anyhow::Result<usize> {
        let topics = &state.topics;
        let mut published = 0;

        for sensor in SENSORS {
            let config = SensorConfig {
                base: entity_base(state, sensor.key, sensor.name, sensor.icon),
                state_topic: topics.state(sensor.key),
                unit_of_measurement: sensor.unit,
                device_class: sensor.device_class,
                state_class: sensor.state_class,
            };
            if self.publish_once(state, "sensor", sensor.key, &config).await? {
                published += 1;
            }
        }

        for binary in BINARY_SENSORS {
            let config = BinarySensorConfig {
                base: entity_base(state, binary.key, binary.name, binary.icon),
                state_topic: topics.state(binary.key),
                payload_on: PAYLOAD_ON,
                payload_off: PAYLOAD_OFF,
                device_class: binary.device_class,
            };
            if self.publish_once(state, "binary_sensor", binary.key, &config).await? {
                published += 1;
            }
        }

        for switch in SWITCHES {
            let config = switch_config(state, switch);
            if self.publish_once(state, "switch", switch.key, &config).await? {
                let subscribed = self
                    .mqtt
                    .subscribe(topics.command(switch.key), QoS::AtLeastOnce)
                    .await;
                if let Err(e) = subscribed {
                    state.published_discovery.remove(&topics.object_id(switch.key));
                    return Err(e.into());
                }
                published += 1;
            }
        }

        if published > 0 {
            info!("Published {} discovery configs for genset {}", published, topics.address());
        }
        Ok(published)
    }

    async fn publish_once<P: Serialize + Sync>(
        &self,
        state: &ProcessorState,
        component: &str,
        key: &str,
        config: &P,
    ) -> anyhow::Result<bool> {
        let unique_id = state.topics.object_id(key);
        if !state.published_discovery.insert(unique_id.clone()) {
            return Ok(false);
        }

        let topic = state.topics.discovery(component, key);
        debug!("Publishing discovery config to {}", topic);
        let result = async {
            let body = serde_json::to_string(config)?;
            self.mqtt
                .publish(topic, QoS::AtLeastOnce, true, body)
                .await?;
            Ok::<(), anyhow::Error>(())
        }
        .await;

        if let Err(e) = result {
            // allow a retry on the next attempt
            state.published_discovery.remove(&unique_id);
            return Err(e);
        }
        Ok(true)
    }
}

fn entity_base(state: &ProcessorState, key: &str, name: &str, icon: &str) -> EntityBase {
    EntityBase {
        device: state.device.clone(),
        name: name.to_string(),
        unique_id: state.topics.object_id(key),
        object_id: state.topics.object_id(key),
        icon: Some(icon.to_string()),
        availability: vec![Availability::for_topic(state.topics.availability())],
        availability_mode: AvailabilityMode::Latest,
    }
}

fn switch_config(state: &ProcessorState, switch: &SwitchEntity) -> SwitchConfig {
    let state_topic = switch.state_key.map(|key| state.topics.state(key));
    SwitchConfig {
        base: entity_base(state, switch.key, switch.name, switch.icon),
        command_topic: state.topics.command(switch.key),
        payload_on: PAYLOAD_ON,
        payload_off: PAYLOAD_OFF,
        state_on: state_topic.as_ref().map(|_| PAYLOAD_ON),
        state_off: state_topic.as_ref().map(|_| PAYLOAD_OFF),
        optimistic: state_topic.is_none(),
        state_topic,
    }
}
