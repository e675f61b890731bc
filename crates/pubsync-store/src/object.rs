use pubsync_types::ContentAddress;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::hasher::ContentHasher;

/// The kind of object stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Opaque uploaded bytes.
    Blob,
    /// Canonical JSON of a structured value.
    Structured,
}

impl ObjectKind {
    pub fn hasher(&self) -> &'static ContentHasher {
        match self {
            Self::Blob => &ContentHasher::BLOB,
            Self::Structured => &ContentHasher::STRUCTURED,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Structured => "structured",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored object: kind tag plus the exact bytes that were addressed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub kind: ObjectKind,
    pub data: Vec<u8>,
}

impl StoredObject {
    pub fn new(kind: ObjectKind, data: Vec<u8>) -> Self {
        Self { kind, data }
    }

    /// Build a structured object from a JSON value.
    pub fn structured(value: &Value) -> StoreResult<Self> {
        Ok(Self::new(ObjectKind::Structured, canonical_json(value)?))
    }

    /// Compute the content address using the kind's domain hasher.
    pub fn compute_address(&self) -> ContentAddress {
        self.kind.hasher().hash(&self.data)
    }

    /// Decode a structured object back into a JSON value.
    pub fn to_value(&self) -> StoreResult<Value> {
        if self.kind != ObjectKind::Structured {
            return Err(StoreError::Serialization(format!(
                "expected structured object, got {}",
                self.kind
            )));
        }
        serde_json::from_slice(&self.data).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

/// Canonical byte form of a JSON value.
///
/// `serde_json` keeps object keys in a `BTreeMap`, so equal values always
/// serialize to equal bytes regardless of insertion order.
pub fn canonical_json(value: &Value) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_json_ignores_insertion_order() {
        let mut a = serde_json::Map::new();
        a.insert("name".into(), json!("p"));
        a.insert("assets".into(), json!([]));
        let mut b = serde_json::Map::new();
        b.insert("assets".into(), json!([]));
        b.insert("name".into(), json!("p"));
        assert_eq!(
            canonical_json(&Value::Object(a)).unwrap(),
            canonical_json(&Value::Object(b)).unwrap()
        );
    }

    #[test]
    fn kinds_produce_different_addresses() {
        let blob = StoredObject::new(ObjectKind::Blob, b"{}".to_vec());
        let structured = StoredObject::new(ObjectKind::Structured, b"{}".to_vec());
        assert_ne!(blob.compute_address(), structured.compute_address());
    }

    #[test]
    fn blob_is_not_a_value() {
        let blob = StoredObject::new(ObjectKind::Blob, b"{}".to_vec());
        assert!(matches!(blob.to_value(), Err(StoreError::Serialization(_))));
        let structured = StoredObject::structured(&json!({"a": 1})).unwrap();
        assert_eq!(structured.to_value().unwrap(), json!({"a": 1}));
    }
}
