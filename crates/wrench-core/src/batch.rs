//! The operation batch applied to every project.

use serde_json::Value;
use std::sync::Arc;

use crate::CoreError;

/// Ordered list of operation descriptors.
///
/// The descriptors are opaque to the engine and sent to the service exactly as
/// loaded. Cloning shares the underlying list.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationBatch {
    operations: Arc<Vec<Value>>,
}

impl OperationBatch {
    /// Create a batch from already parsed descriptors.
    pub fn new(operations: Vec<Value>) -> Self {
        Self {
            operations: Arc::new(operations),
        }
    }

    /// Parse a batch from its JSON form, which must be an array.
    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(operations)) => Ok(Self::new(operations)),
            Ok(other) => Err(CoreError::InvalidBatch(format!(
                "expected a JSON array of operations, got {}",
                json_kind(&other)
            ))),
            Err(e) => Err(CoreError::InvalidBatch(e.to_string())),
        }
    }

    /// Serialize the batch for the `operations` form field.
    pub fn to_json_string(&self) -> Result<String, CoreError> {
        serde_json::to_string(self.operations.as_ref())
            .map_err(|e| CoreError::Serialization(e.to_string()))
    }

    /// The descriptors, in application order.
    pub fn operations(&self) -> &[Value] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
