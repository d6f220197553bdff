/// Namespaced key and channel names in the coordination store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    namespace: String,
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new("landlord")
    }
}

impl KeySpace {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    fn key(&self, parts: &[&str]) -> String {
        let mut key = self.namespace.clone();
        for part in parts {
            key.push(':');
            key.push_str(part);
        }
        key
    }

    pub fn possible_ports(&self) -> String {
        self.key(&["ports", "possible"])
    }

    pub fn occupied_ports(&self) -> String {
        self.key(&["ports", "occupied"])
    }

    pub fn available_ports(&self) -> String {
        self.key(&["ports", "available"])
    }

    pub fn tenants(&self) -> String {
        self.key(&["tenants"])
    }

    /// Prefix shared by every `tenant:<id>:port` key.
    pub fn tenant_prefix(&self) -> String {
        self.key(&["tenant"])
    }

    pub fn tenant_port(&self, id: &str) -> String {
        tenant_port_key(&self.tenant_prefix(), id)
    }

    pub fn request_channel(&self) -> String {
        format!("{}.request", self.namespace)
    }

    pub fn response_channel(&self, reply_to: &str) -> String {
        format!("{}.response.{}", self.namespace, reply_to)
    }
}

/// `<prefix>:<id>:port`. Store scripts rebuild this layout on their side too.
pub fn tenant_port_key(prefix: &str, id: &str) -> String {
    format!("{}:{}:port", prefix, id)
}
