use anyhow::anyhow;
use rumqttc::QoS;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::home_assistant::availability::AvailabilityState;
use crate::home_assistant::command::CommandRequest;
use crate::home_assistant::topics::Topics;
use crate::mqtt_client::MqttPublisher;
use crate::processors::ProcessorState;
use crate::processors::discovery_processor::DiscoveryProcessor;
use crate::processors::ha_processor::{CommandOutcome, HaProcessor};
use crate::processors::status_processor::StatusProcessor;
use crate::smartgen_api::error::ApiError;
use crate::smartgen_api::models::genset_status::GensetStatus;
use crate::smartgen_api::smartgen_client::GensetApiTrait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Disconnected,
    Connecting,
    Polling,
    Backoff,
    ShuttingDown,
}

/// Broker connectivity as reported by the MQTT event router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    Lost,
    /// The initial connection never succeeded.
    Unreachable(String),
}

#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub poll_interval: Duration,
    pub failure_threshold: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub refresh_after_command: bool,
    pub publish_flat_topics: bool,
}

impl LoopSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.intervals.poll_interval(),
            failure_threshold: config.limits.failure_threshold.max(1),
            backoff_base: Duration::from_secs(config.intervals.backoff_base_seconds),
            backoff_max: Duration::from_secs(config.intervals.backoff_max_seconds),
            refresh_after_command: config.intervals.refresh_after_command,
            publish_flat_topics: config.mqtt.publish_flat_topics,
        }
    }
}

/// Exponential retry delay, doubling from `base` up to `max`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        let max = max.max(base);
        Self {
            base,
            max,
            current: base,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn saturate(&mut self) -> Duration {
        self.current = self.max;
        self.max
    }

    pub fn reset(&mut self) {
        self.current = self.base;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishState {
    pub availability: Option<AvailabilityState>,
    pub discovery_sent: bool,
}

pub struct LoopInputs {
    pub commands: mpsc::Receiver<CommandRequest>,
    pub connection: mpsc::Receiver<ConnectionEvent>,
    pub shutdown: watch::Receiver<bool>,
}

/// Drives fetch, map and publish on a fixed interval. Commands are handled
/// in the same task, so the vendor never sees two requests at once.
pub struct PollLoop<A, M>
where
    A: GensetApiTrait + Clone + Send + Sync + 'static,
    M: MqttPublisher,
{
    api: A,
    mqtt: M,
    processor_state: ProcessorState,
    discovery: DiscoveryProcessor<M>,
    status: StatusProcessor<M>,
    commands: HaProcessor<A>,
    settings: LoopSettings,
    state: LoopState,
    resume_state: LoopState,
    failures: u32,
    credential_fault: bool,
    backoff: Backoff,
    publish_state: PublishState,
    last_status: Option<GensetStatus>,
    next_poll_at: Option<Instant>,
}

impl<A, M> PollLoop<A, M>
where
    A: GensetApiTrait + Clone + Send + Sync + 'static,
    M: MqttPublisher,
{
    pub fn new(api: A, mqtt: M, topics: Topics, settings: LoopSettings) -> Self {
        Self {
            discovery: DiscoveryProcessor { mqtt: mqtt.clone() },
            status: StatusProcessor {
                mqtt: mqtt.clone(),
                publish_flat_topics: settings.publish_flat_topics,
            },
            commands: HaProcessor {
                http_smartgen_client: api.clone(),
            },
            backoff: Backoff::new(settings.backoff_base, settings.backoff_max),
            api,
            mqtt,
            processor_state: ProcessorState::new(topics),
            settings,
            state: LoopState::Disconnected,
            resume_state: LoopState::Polling,
            failures: 0,
            credential_fault: false,
            publish_state: PublishState::default(),
            last_status: None,
            next_poll_at: None,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn publish_state(&self) -> &PublishState {
        &self.publish_state
    }

    pub fn next_poll_at(&self) -> Option<Instant> {
        self.next_poll_at
    }

    fn transition(&mut self, to: LoopState) {
        if self.state != to {
            info!("Poll loop {:?} -> {:?}", self.state, to);
            self.state = to;
        }
    }

    pub async fn handle_connection(&mut self, event: ConnectionEvent) -> anyhow::Result<()> {
        match event {
            ConnectionEvent::Connected => {
                self.transition(LoopState::Connecting);
                self.publish_discovery().await;
                if let Some(availability) = self.publish_state.availability {
                    // the broker may have fired our last will meanwhile
                    self.set_availability(availability, true).await;
                }
                self.transition(self.resume_state);
                if self.next_poll_at.is_none() {
                    self.next_poll_at = Some(Instant::now());
                }
            }
            ConnectionEvent::Lost => {
                if matches!(self.state, LoopState::Polling | LoopState::Backoff) {
                    self.resume_state = self.state;
                }
                self.transition(LoopState::Disconnected);
                self.processor_state.forget_discovery();
                self.publish_state.discovery_sent = false;
                self.transition(LoopState::Connecting);
            }
            ConnectionEvent::Unreachable(reason) => {
                return Err(anyhow!("MQTT broker unreachable: {}", reason));
            }
        }
        Ok(())
    }

    async fn publish_discovery(&mut self) {
        match self.discovery.handle(&self.processor_state).await {
            Ok(_) => self.publish_state.discovery_sent = true,
            Err(e) => error!("Failed to publish discovery configs: {:?}", e),
        }
    }

    async fn set_availability(&mut self, availability: AvailabilityState, force: bool) {
        if !force && self.publish_state.availability == Some(availability) {
            return;
        }
        let topic = self.processor_state.topics.availability();
        match self
            .mqtt
            .publish(&topic, QoS::AtLeastOnce, true, availability.as_str())
            .await
        {
            Ok(()) => {
                info!("Availability {} -> {}", topic, availability.as_str());
                self.publish_state.availability = Some(availability);
            }
            Err(e) => error!("Error occurred while publishing to {}: {:?}", topic, e),
        }
    }

    pub async fn poll_once(&mut self) {
        let result = self.api.fetch_status().await;
        let now = Instant::now();
        match result {
            Ok(raw) => {
                let mapping = GensetStatus::from_vendor(&raw);
                if mapping.degraded {
                    warn!(
                        "SmartGen status looks degraded, malformed fields: {:?}",
                        mapping.malformed
                    );
                }
                if !self.publish_state.discovery_sent {
                    self.publish_discovery().await;
                }
                if let Err(e) = self
                    .status
                    .handle(&self.processor_state, &raw, &mapping.status)
                    .await
                {
                    error!("Failed to publish genset status: {:?}", e);
                }

                if self.failures > 0 {
                    info!("SmartGen reachable again after {} failed polls", self.failures);
                }
                self.failures = 0;
                self.credential_fault = false;
                if self.state == LoopState::Backoff {
                    self.backoff.reset();
                    self.transition(LoopState::Polling);
                }
                self.set_availability(AvailabilityState::Online, false).await;
                self.last_status = Some(mapping.status);
                self.next_poll_at = Some(now + self.settings.poll_interval);
            }
            Err(e) => self.on_poll_failure(e, now).await,
        }
    }

    async fn on_poll_failure(&mut self, e: ApiError, now: Instant) {
        self.failures = self.failures.saturating_add(1);
        if let ApiError::Malformed { snippet, .. } = &e {
            debug!("Unparseable SmartGen body: {}", snippet);
        }
        warn!(
            "SmartGen poll failed ({}), {} consecutive: {}",
            e.kind(),
            self.failures,
            e
        );

        let delay = if e.is_credential_problem() {
            if !self.credential_fault {
                error!(
                    "SmartGen refused the configured token/utoken; staying offline until a poll succeeds"
                );
            }
            self.credential_fault = true;
            self.enter_backoff().await;
            self.backoff.saturate()
        } else if self.state == LoopState::Backoff {
            self.backoff.next_delay()
        } else if self.failures >= self.settings.failure_threshold {
            self.enter_backoff().await;
            self.backoff.next_delay()
        } else {
            self.settings.poll_interval
        };

        debug!("Next SmartGen poll in {:?}", delay);
        self.next_poll_at = Some(now + delay);
    }

    async fn enter_backoff(&mut self) {
        if self.state != LoopState::Backoff {
            self.backoff.reset();
            self.transition(LoopState::Backoff);
        }
        self.set_availability(AvailabilityState::Offline, false).await;
    }

    pub async fn handle_command(&mut self, cmd: CommandRequest) {
        match self
            .commands
            .process_ha_command(&cmd, self.last_status.as_ref())
            .await
        {
            Ok(CommandOutcome::Sent(ack)) => {
                info!(
                    "SmartGen accepted {}: {}",
                    ack.action,
                    ack.message().unwrap_or("ok")
                );
                if self.settings.refresh_after_command {
                    self.next_poll_at = Some(Instant::now());
                }
            }
            Ok(CommandOutcome::AlreadySatisfied) => {}
            Err(e) => warn!("SmartGen action {} from {} failed: {}", cmd.action, cmd.topic, e),
        }
    }

    pub async fn shutdown(&mut self) {
        self.transition(LoopState::ShuttingDown);
        self.set_availability(AvailabilityState::Offline, true).await;
        if let Err(e) = self.mqtt.disconnect().await {
            warn!("MQTT disconnect failed: {:?}", e);
        }
    }

    fn poll_deadline(&self) -> Option<Instant> {
        match self.state {
            LoopState::Polling | LoopState::Backoff => self.next_poll_at,
            _ => None,
        }
    }

    pub async fn run(mut self, mut inputs: LoopInputs) -> anyhow::Result<()> {
        info!(
            "Polling genset {} every {:?}",
            self.processor_state.topics.address(),
            self.settings.poll_interval
        );
        self.transition(LoopState::Connecting);

        let outcome = loop {
            let deadline = self.poll_deadline();
            let wake_at = deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                biased;
                _ = inputs.shutdown.changed() => {
                    info!("Shutdown requested");
                    break Ok(());
                }
                event = inputs.connection.recv() => match event {
                    Some(event) => {
                        if let Err(e) = self.handle_connection(event).await {
                            break Err(e);
                        }
                    }
                    None => break Err(anyhow!("MQTT event router stopped")),
                },
                Some(cmd) = inputs.commands.recv() => self.handle_command(cmd).await,
                _ = tokio::time::sleep_until(wake_at), if deadline.is_some() => self.poll_once().await,
            }
        };

        self.shutdown().await;
        outcome
    }
}
