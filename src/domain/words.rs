//! Canonical OCR words and the normalizer that produces them.
//!
//! Both OCR sources arrive as loosely structured JSON. [`WordNormalizer`]
//! detects the payload shape (first match wins) and reduces every record to a
//! [`Word`] with an axis-aligned box. Records without a usable box or without
//! text are dropped; an unrecognized payload yields an empty word list.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::processors::geometry::{BoundingBox, Point};

/// Keys that may hold the text of an OCR record, in priority order.
const TEXT_FIELDS: [&str; 4] = ["text", "transcription", "label", "data"];

/// Keys that may hold the box of an OCR record, in priority order.
const BOX_FIELDS: [&str; 4] = ["bbox", "box", "bounding_box", "points"];

/// An atomic OCR detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    /// Axis-aligned box with `x1 < x2` and `y1 < y2`.
    pub bbox: BoundingBox,
    /// Recognized text, never blank.
    pub text: String,
}

impl Word {
    pub fn new(bbox: BoundingBox, text: impl Into<String>) -> Self {
        Self {
            bbox,
            text: text.into(),
        }
    }
}

/// Pixel size of the image an OCR payload was computed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// The payload shape a normalizer recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrFormat {
    /// `{Images: {width, height}, bbox: [{x: [..], y: [..], data}]}`
    DomainFourPoint,
    /// `[{bbox, text}, ...]`
    BareArray,
    /// `{results: [...]}`
    Results,
    /// `{words: [...]}`
    Words,
    /// `{texts: [...]}`
    Texts,
    /// `{rec_texts: [...], rec_boxes|rec_polys|bbox: [...]}`
    ParallelArrays,
    /// `{lines: [{text, bbox|points}]}`
    Lines,
    /// labelme `{shapes: [{label, points}]}`
    Labelme,
    /// Nothing recognizable; no words.
    Unrecognized,
}

/// Words extracted from one OCR payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedOcr {
    /// Canonical words in payload order.
    pub words: Vec<Word>,
    /// Image size advertised by the payload, if any.
    pub image_size: Option<ImageSize>,
    /// Detected payload shape.
    pub format: OcrFormat,
    /// Records that could not be turned into a word.
    pub dropped: usize,
}

/// Parses heterogeneous OCR JSON into canonical [`Word`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordNormalizer;

impl WordNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Detects the payload shape and extracts its words.
    pub fn normalize(&self, payload: &Value) -> NormalizedOcr {
        let (format, records) = detect_records(payload);
        let image_size = payload.get("Images").and_then(parse_image_size);

        let mut words = Vec::with_capacity(records.len());
        let mut dropped = 0;
        for record in records {
            match record.into_word() {
                Some(word) => words.push(word),
                None => dropped += 1,
            }
        }

        if format == OcrFormat::Unrecognized {
            tracing::warn!("OCR payload shape not recognized, no words extracted");
        } else if dropped > 0 {
            tracing::debug!(?format, dropped, kept = words.len(), "dropped malformed OCR records");
        }

        NormalizedOcr {
            words,
            image_size,
            format,
            dropped,
        }
    }

    /// Shortcut returning only the words.
    pub fn words(&self, payload: &Value) -> Vec<Word> {
        self.normalize(payload).words
    }
}

/// One raw record before validation.
enum RawRecord<'a> {
    /// A JSON object carrying its own text and box.
    Item(&'a Value),
    /// A text/box pair taken from parallel arrays.
    Pair(&'a Value, Option<&'a Value>),
}

impl RawRecord<'_> {
    fn into_word(self) -> Option<Word> {
        let (text, bbox) = match self {
            RawRecord::Item(item) => (item_text(item)?, item_box(item)?),
            RawRecord::Pair(text, bbox) => (text.as_str()?, parse_box(bbox?)?),
        };
        if text.trim().is_empty() {
            return None;
        }
        Some(Word::new(bbox, text))
    }
}

fn detect_records(payload: &Value) -> (OcrFormat, Vec<RawRecord<'_>>) {
    fn items(values: &[Value]) -> Vec<RawRecord<'_>> {
        values.iter().map(RawRecord::Item).collect()
    }
    let array_field = |name: &'static str| payload.get(name).and_then(Value::as_array);

    if let Some(entries) = array_field("bbox") {
        let four_point = entries
            .first()
            .and_then(|first| first.get("x"))
            .is_some_and(|x| !x.is_null());
        if four_point {
            return (OcrFormat::DomainFourPoint, items(entries));
        }
    }

    if let Some(entries) = payload.as_array() {
        return (OcrFormat::BareArray, items(entries));
    }
    if let Some(entries) = array_field("results") {
        return (OcrFormat::Results, items(entries));
    }
    if let Some(entries) = array_field("words") {
        return (OcrFormat::Words, items(entries));
    }
    if let Some(entries) = array_field("texts") {
        return (OcrFormat::Texts, items(entries));
    }

    if let Some(texts) = array_field("rec_texts") {
        let boxes = ["rec_boxes", "rec_polys", "bbox"]
            .iter()
            .find_map(|name| array_field(*name));
        if let Some(boxes) = boxes {
            let pairs = texts
                .iter()
                .enumerate()
                .map(|(idx, text)| RawRecord::Pair(text, boxes.get(idx)))
                .collect();
            return (OcrFormat::ParallelArrays, pairs);
        }
    }

    if let Some(entries) = array_field("lines") {
        return (OcrFormat::Lines, items(entries));
    }
    if let Some(entries) = array_field("shapes") {
        return (OcrFormat::Labelme, items(entries));
    }

    (OcrFormat::Unrecognized, Vec::new())
}

fn item_text(item: &Value) -> Option<&str> {
    TEXT_FIELDS
        .iter()
        .filter_map(|field| item.get(field).and_then(Value::as_str))
        .find(|text| !text.is_empty())
}

fn item_box(item: &Value) -> Option<BoundingBox> {
    let boxed = BOX_FIELDS
        .iter()
        .filter_map(|field| item.get(field))
        .find(|value| !value.is_null());
    match boxed {
        Some(value) => parse_box(value),
        None => parse_xy_arrays(item.get("x")?, item.get("y")?),
    }
}

/// Parses a box given as `[x1,y1,x2,y2]`, a flat 8-number quad, or a polygon
/// `[[x,y], ...]`, reducing it to its axis-aligned hull.
pub fn parse_box(value: &Value) -> Option<BoundingBox> {
    let entries = value.as_array()?;
    let first = entries.first()?;

    let bbox = if first.is_array() {
        let points = entries
            .iter()
            .map(parse_point)
            .collect::<Option<Vec<_>>>()?;
        if points.len() < 2 {
            return None;
        }
        BoundingBox::from_points(&points)?
    } else {
        let numbers = entries
            .iter()
            .map(as_coord)
            .collect::<Option<Vec<_>>>()?;
        match numbers.len() {
            4 => BoundingBox::from_coords(numbers[0], numbers[1], numbers[2], numbers[3])
                .normalized(),
            8 => {
                let points: Vec<Point> = numbers
                    .chunks_exact(2)
                    .map(|pair| Point::new(pair[0], pair[1]))
                    .collect();
                BoundingBox::from_points(&points)?
            }
            _ => return None,
        }
    };

    bbox.is_valid().then_some(bbox)
}

fn parse_xy_arrays(xs: &Value, ys: &Value) -> Option<BoundingBox> {
    let xs = xs.as_array()?;
    let ys = ys.as_array()?;
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let points = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| Some(Point::new(as_coord(x)?, as_coord(y)?)))
        .collect::<Option<Vec<_>>>()?;
    BoundingBox::from_points(&points).filter(BoundingBox::is_valid)
}

fn parse_point(value: &Value) -> Option<Point> {
    let coords = value.as_array()?;
    if coords.len() < 2 {
        return None;
    }
    Some(Point::new(as_coord(&coords[0])?, as_coord(&coords[1])?))
}

fn as_coord(value: &Value) -> Option<f32> {
    let coord = value.as_f64()? as f32;
    coord.is_finite().then_some(coord)
}

fn parse_image_size(value: &Value) -> Option<ImageSize> {
    let width = value.get("width")?.as_f64()?;
    let height = value.get("height")?.as_f64()?;
    if width <= 0.0 || height <= 0.0 {
        return None;
    }
    Some(ImageSize {
        width: width.round() as u32,
        height: height.round() as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bbox(x1: f32, y1: f32, x2: f32, y2: f32) -> BoundingBox {
        BoundingBox::from_coords(x1, y1, x2, y2)
    }

    #[test]
    fn test_domain_four_point_form() {
        let payload = json!({
            "Images": {"width": 1240, "height": 1754},
            "bbox": [
                {"x": [10, 60, 60, 10], "y": [5, 5, 25, 25], "data": "KOREA"},
                {"x": [70, 120, 120, 70], "y": [5, 6, 26, 25], "data": ""}
            ]
        });
        let ocr = WordNormalizer::new().normalize(&payload);
        assert_eq!(ocr.format, OcrFormat::DomainFourPoint);
        assert_eq!(ocr.image_size, Some(ImageSize { width: 1240, height: 1754 }));
        assert_eq!(ocr.words, vec![Word::new(bbox(10.0, 5.0, 60.0, 25.0), "KOREA")]);
        assert_eq!(ocr.dropped, 1);
    }

    #[test]
    fn test_polygon_boxes_reduce_to_hull() {
        let payload = json!([
            {"text": "Class:8", "bbox": [[100, 101], [180, 100], [181, 120], [99, 119]]}
        ]);
        let words = WordNormalizer::new().words(&payload);
        assert_eq!(words[0].bbox, bbox(99.0, 100.0, 181.0, 120.0));
    }

    #[test]
    fn test_object_shapes_and_field_aliases() {
        let normalizer = WordNormalizer::new();
        let results = json!({"results": [{"transcription": "A", "box": [0, 0, 10, 10]}]});
        let words = json!({"words": [{"label": "B", "bounding_box": [0, 0, 10, 10]}]});
        let texts = json!({"texts": [{"data": "C", "points": [[0, 0], [10, 10]]}]});
        let lines = json!({"lines": [{"text": "D", "points": [0, 0, 10, 0, 10, 10, 0, 10]}]});
        let labelme = json!({"shapes": [{"label": "E", "points": [[10, 10], [0, 0]]}]});

        let cases = [
            (results, OcrFormat::Results, "A"),
            (words, OcrFormat::Words, "B"),
            (texts, OcrFormat::Texts, "C"),
            (lines, OcrFormat::Lines, "D"),
            (labelme, OcrFormat::Labelme, "E"),
        ];
        for (payload, format, text) in cases {
            let ocr = normalizer.normalize(&payload);
            assert_eq!(ocr.format, format);
            assert_eq!(ocr.words, vec![Word::new(bbox(0.0, 0.0, 10.0, 10.0), text)]);
        }
    }

    #[test]
    fn test_parallel_arrays() {
        let normalizer = WordNormalizer::new();
        let payload = json!({
            "rec_texts": ["Shipper", "", "Consignee"],
            "rec_boxes": [[0, 0, 50, 20], [0, 30, 50, 50], [0, 60, 80, 80]]
        });
        let ocr = normalizer.normalize(&payload);
        assert_eq!(ocr.format, OcrFormat::ParallelArrays);
        assert_eq!(ocr.words.len(), 2);
        assert_eq!(ocr.words[1].text, "Consignee");

        // boxes shorter than texts: the extra text is dropped
        let payload = json!({"rec_texts": ["a", "b"], "bbox": [[0, 0, 5, 5]]});
        let ocr = normalizer.normalize(&payload);
        assert_eq!(ocr.words.len(), 1);
        assert_eq!(ocr.dropped, 1);
    }

    #[test]
    fn test_malformed_records_are_dropped() {
        let payload = json!([
            {"text": "ok", "bbox": [0, 0, 10, 10]},
            {"text": "no box"},
            {"bbox": [0, 0, 10, 10]},
            {"text": "   ", "bbox": [0, 0, 10, 10]},
            {"text": "flat", "bbox": [0, 0, 0, 10]},
            {"text": "bad", "bbox": [0, "a", 10, 10]},
            {"text": "short", "bbox": [0, 0, 10]},
            {"text": "one point", "bbox": [[1, 1]]},
            "not an object",
            {"text": "flipped", "bbox": [10, 10, 0, 0]}
        ]);
        let ocr = WordNormalizer::new().normalize(&payload);
        let texts: Vec<_> = ocr.words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["ok", "flipped"]);
        assert_eq!(ocr.words[1].bbox, bbox(0.0, 0.0, 10.0, 10.0));
        assert_eq!(ocr.dropped, 8);
    }

    #[test]
    fn test_unrecognized_payload_is_empty() {
        let ocr = WordNormalizer::new().normalize(&json!({"foo": 1}));
        assert_eq!(ocr.format, OcrFormat::Unrecognized);
        assert!(ocr.words.is_empty());
        assert!(WordNormalizer::new().words(&json!("text")).is_empty());
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let payload = json!({
            "words": [
                {"text": "Invoice", "bbox": [[12, 5], [40, 7], [39, 20], [10, 18]]},
                {"text": "No.", "bbox": [45, 5, 60, 20]}
            ]
        });
        let normalizer = WordNormalizer::new();
        let once = normalizer.words(&payload);
        let canonical = serde_json::to_value(&once).unwrap();
        let twice = normalizer.words(&canonical);
        assert_eq!(once, twice);
    }
}
