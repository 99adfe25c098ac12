use serde_json::{Map, Value};

/// A set of datapoint values keyed by dp id, as found under `"dps"` in Tuya
/// messages. Used both for outgoing payloads and for device snapshots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dps(Map<String, Value>);

impl Dps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract the dps object from a JSON value; anything but an object is rejected.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_object().map(|map| Self(map.clone()))
    }

    pub fn get(&self, index: u8) -> Option<&Value> {
        self.0.get(&index.to_string())
    }

    pub fn insert(&mut self, index: u8, value: impl Into<Value>) {
        self.insert_id(index.to_string(), value);
    }

    pub fn insert_id(&mut self, dp_id: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(dp_id.into(), value.into());
    }

    /// Overwrite the keys present in `update`, keeping everything else.
    /// Returns whether any value actually changed.
    pub fn merge(&mut self, update: &Dps) -> bool {
        let mut changed = false;
        for (dp_id, value) in &update.0 {
            if self.0.get(dp_id) != Some(value) {
                self.0.insert(dp_id.clone(), value.clone());
                changed = true;
            }
        }
        changed
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl std::fmt::Display for Dps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Value::Object(self.0.clone()))
    }
}
