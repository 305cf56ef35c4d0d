/// Topic layout for one genset.
///
/// Discovery-managed entities live under `<base>/<address>/...`, the
/// simplified set for non-discovery consumers under `<base>/generator/...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    base: String,
    address: String,
    discovery_prefix: String,
    object_prefix: String,
}

impl Topics {
    pub fn new(base_topic: &str, address: &str, discovery_prefix: &str) -> Self {
        let address = address.trim();
        let sanitized: String = address
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        Self {
            base: base_topic.trim().trim_end_matches('/').to_string(),
            address: address.to_string(),
            discovery_prefix: discovery_prefix.trim().trim_end_matches('/').to_string(),
            object_prefix: format!("smartgen_{}", sanitized),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// `smartgen_<address>`, shared prefix of every unique id.
    pub fn object_prefix(&self) -> &str {
        &self.object_prefix
    }

    pub fn object_id(&self, key: &str) -> String {
        format!("{}_{}", self.object_prefix, key)
    }

    fn device_base(&self) -> String {
        format!("{}/{}", self.base, self.address)
    }

    pub fn availability(&self) -> String {
        format!("{}/availability", self.device_base())
    }

    pub fn state(&self, key: &str) -> String {
        format!("{}/{}", self.device_base(), key)
    }

    pub fn command(&self, key: &str) -> String {
        format!("{}/command/{}", self.device_base(), key)
    }

    pub fn telemetry(&self) -> String {
        format!("{}/telemetry", self.device_base())
    }

    pub fn flat(&self, key: &str) -> String {
        format!("{}/generator/{}", self.base, key)
    }

    pub fn discovery(&self, component: &str, key: &str) -> String {
        format!(
            "{}/{}/{}/config",
            self.discovery_prefix,
            component,
            self.object_id(key)
        )
    }

    /// Switch key addressed by a command topic, if it is one of ours.
    pub fn command_key<'t>(&self, topic: &'t str) -> Option<&'t str> {
        let prefix = format!("{}/command/", self.device_base());
        topic
            .strip_prefix(prefix.as_str())
            .filter(|key| !key.is_empty() && !key.contains('/'))
    }
}
