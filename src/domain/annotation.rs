//! Template and result annotation schema.
//!
//! The same document layout is read as the manually authored template and
//! written as the aligned result:
//!
//! ```json
//! { "image": "invoice_01.jpg", "width": 1240, "height": 1754,
//!   "annotations": [
//!     {"id": 1, "type": "key", "bbox": [10, 10, 60, 30], "text": "Class", "key_id": 1},
//!     {"id": 2, "type": "value", "bbox": [70, 10, 200, 30], "text": "8", "key_id": 1, "order": 1},
//!     {"id": 3, "type": "etc", "bbox": [0, 0, 300, 40], "text": "BILL OF LADING"}
//!   ]}
//! ```
//!
//! Identifiers may be JSON numbers or strings; both normalise to [`AnnotationId`].
//! Unknown fields are preserved on round trip.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::core::errors::{KvMapError, KvMapResult};
use crate::domain::words::parse_box;
use crate::processors::geometry::BoundingBox;

/// Identifier of an annotation, normalised on ingestion.
///
/// `1`, `1.0` and `"1"` all become the same id. Ids that are canonical
/// integers serialise back as JSON numbers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnnotationId(String);

impl AnnotationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id as an integer when its text is a canonical integer.
    pub fn as_integer(&self) -> Option<i64> {
        let value: i64 = self.0.parse().ok()?;
        (value.to_string() == self.0).then_some(value)
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AnnotationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AnnotationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<i64> for AnnotationId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<i32> for AnnotationId {
    fn from(id: i32) -> Self {
        Self(id.to_string())
    }
}

impl Serialize for AnnotationId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_integer() {
            Some(value) => serializer.serialize_i64(value),
            None => serializer.serialize_str(&self.0),
        }
    }
}

struct AnnotationIdVisitor;

impl Visitor<'_> for AnnotationIdVisitor {
    type Value = AnnotationId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an annotation id (number or string)")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<AnnotationId, E> {
        Ok(AnnotationId(value.to_string()))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<AnnotationId, E> {
        Ok(AnnotationId(value.to_string()))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<AnnotationId, E> {
        if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15 {
            Ok(AnnotationId((value as i64).to_string()))
        } else {
            Ok(AnnotationId(value.to_string()))
        }
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<AnnotationId, E> {
        Ok(AnnotationId(value.trim().to_string()))
    }
}

impl<'de> Deserialize<'de> for AnnotationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AnnotationIdVisitor)
    }
}

/// Role of an annotated region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    /// Names a field.
    Key,
    /// Holds a field's answer, linked to a KEY through `key_id`.
    Value,
    /// Any other region of interest.
    Etc,
}

impl AnnotationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationKind::Key => "key",
            AnnotationKind::Value => "value",
            AnnotationKind::Etc => "etc",
        }
    }
}

/// One labelled region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,
    #[serde(rename = "type")]
    pub kind: AnnotationKind,
    /// Region in image coordinates. Template entries without a usable box are
    /// ignored by the aligner.
    #[serde(default, deserialize_with = "deserialize_bbox")]
    pub bbox: Option<BoundingBox>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<AnnotationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    /// Provenance flag set on aligned output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched: Option<bool>,
    /// Fields this schema does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn deserialize_bbox<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<BoundingBox>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_box))
}

impl Annotation {
    /// Creates an annotation with no text, links or provenance.
    pub fn new(id: impl Into<AnnotationId>, kind: AnnotationKind, bbox: BoundingBox) -> Self {
        Self {
            id: id.into(),
            kind,
            bbox: Some(bbox),
            text: None,
            key_id: None,
            order: None,
            matched: None,
            extra: Map::new(),
        }
    }

    pub fn key(id: impl Into<AnnotationId>, bbox: BoundingBox, text: impl Into<String>) -> Self {
        Self::new(id, AnnotationKind::Key, bbox).with_text(text)
    }

    pub fn value(
        id: impl Into<AnnotationId>,
        key_id: impl Into<AnnotationId>,
        bbox: BoundingBox,
    ) -> Self {
        Self::new(id, AnnotationKind::Value, bbox).with_key_id(key_id)
    }

    pub fn etc(id: impl Into<AnnotationId>, bbox: BoundingBox, text: impl Into<String>) -> Self {
        Self::new(id, AnnotationKind::Etc, bbox).with_text(text)
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_key_id(mut self, key_id: impl Into<AnnotationId>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_matched(mut self, matched: bool) -> Self {
        self.matched = Some(matched);
        self
    }

    /// Text of the annotation, empty when absent.
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// The id VALUEs use to reference this KEY: its `key_id` when present,
    /// otherwise its own `id`.
    pub fn link_id(&self) -> &AnnotationId {
        self.key_id.as_ref().unwrap_or(&self.id)
    }
}

/// An image's annotation set, used for both template and result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationDocument {
    #[serde(default)]
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AnnotationDocument {
    pub fn new(image: impl Into<String>, annotations: Vec<Annotation>) -> Self {
        Self {
            image: image.into(),
            width: None,
            height: None,
            annotations,
            extra: Map::new(),
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Parses a document from JSON text.
    pub fn from_json_str(raw: &str) -> KvMapResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| KvMapError::invalid_input(format!("annotation document: {e}")))
    }

    /// Parses a document from an already decoded JSON value.
    pub fn from_value(value: Value) -> KvMapResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| KvMapError::invalid_input(format!("annotation document: {e}")))
    }

    /// Pretty-printed JSON.
    pub fn to_json_pretty(&self) -> KvMapResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Compact export: ids and null texts are dropped and box coordinates are
    /// rounded to integers.
    pub fn to_compact_json(&self) -> KvMapResult<Value> {
        let mut document = serde_json::to_value(self)?;
        let annotations = document
            .get_mut("annotations")
            .and_then(Value::as_array_mut);
        for annotation in annotations.into_iter().flatten() {
            let Some(fields) = annotation.as_object_mut() else {
                continue;
            };
            fields.remove("id");
            if fields.get("text").is_some_and(Value::is_null) {
                fields.remove("text");
            }
            if let Some(Value::Array(coords)) = fields.get_mut("bbox") {
                for coord in coords.iter_mut() {
                    if let Some(c) = coord.as_f64() {
                        *coord = Value::from(c.round() as i64);
                    }
                }
            }
        }
        Ok(document)
    }
}
