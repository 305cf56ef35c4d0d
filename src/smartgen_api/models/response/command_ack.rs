use serde_json::{Map, Value};

use crate::smartgen_api::models::action::GensetAction;

#[derive(Debug, Clone, PartialEq)]
pub struct CommandAck {
    pub action: GensetAction,
    pub body: Map<String, Value>,
}

impl CommandAck {
    pub fn message(&self) -> Option<&str> {
        ["msg", "message"]
            .iter()
            .find_map(|key| self.body.get(*key).and_then(Value::as_str))
    }
}
