//! Test doubles shared by processor and poll loop tests.

use serde_json::{Map, Value, json};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::smartgen_api::error::ApiError;
use crate::smartgen_api::models::action::GensetAction;
use crate::smartgen_api::models::response::command_ack::CommandAck;
use crate::smartgen_api::smartgen_client::GensetApiTrait;

pub fn healthy_payload() -> Map<String, Value> {
    match json!({"rpm": "1500", "hz": 50, "running": 1, "device_id": "42"}) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

#[derive(Default)]
struct Script {
    statuses: VecDeque<Result<Map<String, Value>, ApiError>>,
    command_error: Option<ApiError>,
    commands: Vec<GensetAction>,
    fetches: usize,
    latency: Duration,
}

/// Vendor API fake. Status results are consumed in order; once the script is
/// empty every fetch succeeds with [`healthy_payload`].
#[derive(Clone, Default)]
pub struct ScriptedApi {
    script: Arc<Mutex<Script>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl ScriptedApi {
    pub fn push_status(&self, result: Result<Map<String, Value>, ApiError>) {
        self.script.lock().unwrap().statuses.push_back(result);
    }

    pub fn push_failures(&self, count: usize) {
        for _ in 0..count {
            self.push_status(Err(ApiError::Transport("connection refused".to_string())));
        }
    }

    pub fn fail_commands(&self, error: ApiError) {
        self.script.lock().unwrap().command_error = Some(error);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.script.lock().unwrap().latency = latency;
    }

    pub fn commands(&self) -> Vec<GensetAction> {
        self.script.lock().unwrap().commands.clone()
    }

    pub fn fetches(&self) -> usize {
        self.script.lock().unwrap().fetches
    }

    /// Highest number of vendor calls observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let latency = self.script.lock().unwrap().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl GensetApiTrait for ScriptedApi {
    async fn fetch_status(&self) -> Result<Map<String, Value>, ApiError> {
        self.enter().await;
        let result = {
            let mut script = self.script.lock().unwrap();
            script.fetches += 1;
            script
                .statuses
                .pop_front()
                .unwrap_or_else(|| Ok(healthy_payload()))
        };
        self.leave();
        result
    }

    async fn send_command(&self, action: GensetAction) -> Result<CommandAck, ApiError> {
        self.enter().await;
        let result = {
            let mut script = self.script.lock().unwrap();
            script.commands.push(action);
            match &script.command_error {
                Some(e) => Err(e.clone()),
                None => Ok(CommandAck {
                    action,
                    body: Map::new(),
                }),
            }
        };
        self.leave();
        result
    }
}
