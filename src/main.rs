mod config;
mod home_assistant;
mod mqtt_client;
mod mqtt_event_router;
mod poll_loop;
mod processors;
mod smartgen_api;
mod supervisor;
#[cfg(test)]
mod testing;

use rumqttc::{AsyncClient, LastWill, MqttOptions, QoS};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_appender::rolling;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt};

use crate::config::{Config, LoggingConfig};
use crate::home_assistant::availability::AvailabilityState;
use crate::home_assistant::topics::Topics;
use crate::mqtt_event_router::{RouterSettings, route_events};
use crate::poll_loop::{LoopInputs, LoopSettings, PollLoop};
use crate::smartgen_api::smartgen_client::SmartGenClient;

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("SMARTGEN_CONFIG").ok())
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::from_file(&config_path).or_else(|e| {
        if e.is_missing_file() {
            println!("Config file not found. Creating example {}...", config_path);
            Config::save_example(&config_path)?;
            println!("Please edit {} with your settings and restart the application.", config_path);
        }
        Err::<Config, anyhow::Error>(e.into())
    })?;

    init_logging(&config.logging);

    let api = SmartGenClient::new(
        config.smartgen.credentials(),
        config.smartgen.variant.build(),
        config.smartgen.api_base.clone(),
        config.intervals.request_timeout(),
    )?;
    info!(
        "Starting SmartGen bridge for genset {} ({} API)",
        api.address(),
        api.variant_name()
    );

    let topics = Topics::new(
        &config.mqtt.base_topic,
        api.address(),
        &config.mqtt.discovery_prefix,
    );

    let broker = supervisor::resolve_broker(&config.mqtt).await;
    let mut mqtt_options = MqttOptions::new(&config.mqtt.client_id, &broker.host, broker.port);
    mqtt_options.set_clean_session(true);
    mqtt_options.set_keep_alive(Duration::from_secs(config.mqtt.keep_alive_seconds.max(5)));
    if let Some(username) = &broker.username {
        mqtt_options.set_credentials(
            username,
            broker.password.as_ref().map(|p| p.expose()).unwrap_or_default(),
        );
    }
    mqtt_options.set_last_will(LastWill::new(
        topics.availability(),
        AvailabilityState::Offline.as_str(),
        QoS::AtLeastOnce,
        true,
    ));
    let (mqtt_client, event_loop) = AsyncClient::new(mqtt_options, config.limits.mqtt_queue_size);

    let (command_tx, command_rx) = mpsc::channel(config.limits.command_channel_size);
    let (connection_tx, connection_rx) = mpsc::channel(8);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let router = tokio::spawn(route_events(
        event_loop,
        topics.clone(),
        command_tx,
        connection_tx,
        RouterSettings {
            reconnect_delay: config.intervals.reconnect_delay(),
            connect_retries: config.limits.broker_connect_retries,
        },
    ));

    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let poll_loop = PollLoop::new(api, mqtt_client, topics, LoopSettings::from_config(&config));
    let result = poll_loop
        .run(LoopInputs {
            commands: command_rx,
            connection: connection_rx,
            shutdown: shutdown_rx,
        })
        .await;

    // let the event loop flush the offline message and the disconnect
    if tokio::time::timeout(Duration::from_secs(5), router).await.is_err() {
        warn!("MQTT event loop did not finish in time");
    }

    match &result {
        Ok(()) => info!("SmartGen bridge stopped"),
        Err(e) => error!("SmartGen bridge stopped: {:?}", e),
    }
    result
}

fn init_logging(logging: &LoggingConfig) {
    // Console pretty logger (like pretty_env_logger)
    let mut layers = vec![
        fmt::layer()
            .pretty()
            .with_filter(EnvFilter::new(&logging.console_level))
            .boxed(),
    ];

    // One file per level
    if let Some(log_dir) = &logging.directory {
        layers.push(
            fmt::layer()
                .with_writer(rolling::daily(log_dir, &logging.debug_file))
                .with_ansi(false)
                .with_filter(EnvFilter::new("debug"))
                .boxed(),
        );
        layers.push(
            fmt::layer()
                .with_writer(rolling::daily(log_dir, &logging.info_file))
                .with_ansi(false)
                .with_filter(tracing_subscriber::filter::LevelFilter::INFO)
                .boxed(),
        );
        layers.push(
            fmt::layer()
                .with_writer(rolling::daily(log_dir, &logging.warn_file))
                .with_ansi(false)
                .with_filter(tracing_subscriber::filter::LevelFilter::WARN)
                .boxed(),
        );
        layers.push(
            fmt::layer()
                .with_writer(rolling::daily(log_dir, &logging.error_file))
                .with_ansi(false)
                .with_filter(tracing_subscriber::filter::LevelFilter::ERROR)
                .boxed(),
        );
    }

    tracing_subscriber::registry().with(layers).init();
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
                return;
            }
            Err(e) => warn!("Unable to listen for SIGTERM: {:?}", e),
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received SIGINT"),
        Err(e) => {
            error!("Unable to listen for shutdown signals: {:?}", e);
            std::future::pending::<()>().await;
        }
    }
}
