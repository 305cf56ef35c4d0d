use rumqttc::{Event, EventLoop, Outgoing, Packet};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::home_assistant::command::{CommandDecodeError, CommandRequest};
use crate::home_assistant::topics::Topics;
use crate::poll_loop::ConnectionEvent;

#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub reconnect_delay: Duration,
    /// Failed attempts tolerated before the first successful connection.
    pub connect_retries: u32,
}

/// Decodes an inbound publish into a command, logging anything that is not one.
/// Retained publishes are stale and never trigger an action.
pub fn decode_publish(
    topics: &Topics,
    topic: &str,
    payload: &[u8],
    retained: bool,
) -> Option<CommandRequest> {
    if retained {
        debug!("Ignoring retained publish on {}", topic);
        return None;
    }
    match CommandRequest::decode(topics, topic, payload) {
        Ok(request) => {
            debug!("Command {} received on {}", request.action, topic);
            Some(request)
        }
        Err(e @ CommandDecodeError::NoAction { .. }) => {
            debug!("Ignoring command: {}", e);
            None
        }
        Err(e) => {
            warn!("Ignoring command: {}", e);
            None
        }
    }
}

/// Owns the rumqttc event loop. Inbound commands are forwarded to the poll
/// loop, connection changes are reported so discovery can be republished.
/// Returns once our own disconnect has gone out or the poll loop is gone.
pub async fn route_events(
    mut event_loop: EventLoop,
    topics: Topics,
    commands: mpsc::Sender<CommandRequest>,
    connection: mpsc::Sender<ConnectionEvent>,
    settings: RouterSettings,
) {
    let mut ever_connected = false;
    let mut connected = false;
    let mut failed_attempts: u32 = 0;

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                info!("Connected to MQTT broker (session present: {})", ack.session_present);
                ever_connected = true;
                connected = true;
                failed_attempts = 0;
                if connection.send(ConnectionEvent::Connected).await.is_err() {
                    return;
                }
            }
            Ok(Event::Incoming(Packet::Publish(p))) => {
                if let Some(request) = decode_publish(&topics, &p.topic, &p.payload, p.retain)
                    && commands.send(request).await.is_err()
                {
                    return;
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                info!("MQTT session closed");
                return;
            }
            Ok(event) => trace!("{:?}", event),
            Err(e) => {
                if connected {
                    connected = false;
                    warn!("MQTT connection lost: {:?}", e);
                    if connection.send(ConnectionEvent::Lost).await.is_err() {
                        return;
                    }
                } else if !ever_connected {
                    failed_attempts += 1;
                    warn!(
                        "MQTT connect attempt {}/{} failed: {:?}",
                        failed_attempts,
                        settings.connect_retries + 1,
                        e
                    );
                    if failed_attempts > settings.connect_retries {
                        let _ = connection
                            .send(ConnectionEvent::Unreachable(e.to_string()))
                            .await;
                        return;
                    }
                } else {
                    debug!("MQTT reconnect failed: {:?}", e);
                }
                tokio::time::sleep(settings.reconnect_delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smartgen_api::models::action::GensetAction;
    use rumqttc::MqttOptions;

    fn topics() -> Topics {
        Topics::new("smartgen", "42", "homeassistant")
    }

    #[test]
    fn switch_commands_are_decoded() {
        let request = decode_publish(&topics(), "smartgen/42/command/stop", b"ON", false).unwrap();
        assert_eq!(request.action, GensetAction::Stop);
    }

    #[test]
    fn foreign_and_garbage_publishes_are_dropped() {
        let topics = topics();
        assert!(decode_publish(&topics, "homeassistant/status", b"online", false).is_none());
        assert!(decode_publish(&topics, "smartgen/42/command/start", b"maybe", false).is_none());
        assert!(decode_publish(&topics, "smartgen/42/command/start", b"OFF", false).is_none());
    }

    #[test]
    fn retained_commands_are_ignored() {
        let topics = topics();
        assert!(decode_publish(&topics, "smartgen/42/command/start", b"ON", true).is_none());
        assert!(decode_publish(&topics, "smartgen/42/command/start", b"ON", false).is_some());
    }

    #[tokio::test]
    async fn unreachable_broker_is_reported_after_retries() {
        // nothing listens on port 1 locally
        let mut options = MqttOptions::new("router-test", "127.0.0.1", 1);
        options.set_keep_alive(Duration::from_secs(5));
        let (_client, event_loop) = rumqttc::AsyncClient::new(options, 10);
        let (cmd_tx, _cmd_rx) = mpsc::channel(1);
        let (conn_tx, mut conn_rx) = mpsc::channel(4);

        route_events(
            event_loop,
            topics(),
            cmd_tx,
            conn_tx,
            RouterSettings {
                reconnect_delay: Duration::from_millis(10),
                connect_retries: 2,
            },
        )
        .await;

        assert!(matches!(
            conn_rx.recv().await,
            Some(ConnectionEvent::Unreachable(_))
        ));
    }
}
