use serde::Serialize;

/// Device block shared by every entity of one genset.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Device {
    pub identifiers: Vec<String>,
    pub manufacturer: &'static str,
    pub model: &'static str,
    pub name: String,
}

impl Device {
    pub fn genset(address: &str, object_prefix: &str) -> Self {
        Self {
            identifiers: vec![object_prefix.to_string()],
            manufacturer: "SmartGen",
            model: "Cloud Plus",
            name: format!("SmartGen {}", address),
        }
    }
}
