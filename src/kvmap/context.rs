//! Per-run state of the alignment pipeline.
//!
//! An [`AlignmentContext`] is built for one target image, threaded through the
//! stages and dropped afterwards. Nothing in it outlives the run.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::config::AlignConfig;
use crate::domain::annotation::{Annotation, AnnotationDocument, AnnotationId, AnnotationKind};
use crate::domain::words::Word;
use crate::kvmap::result::CandidateSet;
use crate::processors::geometry::BoundingBox;
use crate::processors::line_merge::LineMerger;
use crate::processors::text_match::TextMatcher;

/// Position of an annotation in the template's `annotations` array.
///
/// Working maps are keyed by slot rather than by id so that templates with
/// duplicate ids still move each box independently.
pub type Slot = usize;

/// Stage in which a KEY was anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u8")]
pub enum MatchStage {
    /// Text-anchored match on a generic OCR word.
    TextAnchor,
    /// Fallback through a linked VALUE and a merged value span.
    ValueAnchor,
}

impl From<MatchStage> for u8 {
    fn from(stage: MatchStage) -> Self {
        match stage {
            MatchStage::TextAnchor => 1,
            MatchStage::ValueAnchor => 2,
        }
    }
}

/// How an ETC annotation found its word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EtcMatchMethod {
    /// A text-matching word overlapping the original box.
    Overlap,
    /// The text-matching word nearest to the original box centre.
    NearestText,
}

/// Final placement of a matched ETC annotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EtcPlacement {
    pub bbox: BoundingBox,
    pub delta: (f32, f32),
    pub method: EtcMatchMethod,
}

/// A template annotation that takes part in the run.
#[derive(Debug, Clone, Copy)]
pub struct TemplateEntry<'a> {
    pub slot: Slot,
    pub annotation: &'a Annotation,
    /// The box as authored in the template.
    pub original: BoundingBox,
}

/// Current (possibly relocated) box of every template annotation.
#[derive(Debug, Clone, Default)]
pub struct MovedBoxMap {
    boxes: Vec<Option<BoundingBox>>,
}

impl MovedBoxMap {
    /// Seeds the map with every annotation's original box.
    pub fn seeded(annotations: &[Annotation]) -> Self {
        Self {
            boxes: annotations.iter().map(|a| a.bbox).collect(),
        }
    }

    pub fn get(&self, slot: Slot) -> Option<BoundingBox> {
        self.boxes.get(slot).copied().flatten()
    }

    pub fn set(&mut self, slot: Slot, bbox: BoundingBox) {
        if let Some(entry) = self.boxes.get_mut(slot) {
            *entry = Some(bbox);
        }
    }

    pub fn translate(&mut self, slot: Slot, dx: f32, dy: f32) {
        if let Some(Some(bbox)) = self.boxes.get_mut(slot) {
            *bbox = bbox.translate(dx, dy);
        }
    }
}

/// Cumulative `(dx, dy)` applied to every template annotation.
#[derive(Debug, Clone, Default)]
pub struct DeltaMap {
    deltas: Vec<(f32, f32)>,
}

impl DeltaMap {
    pub fn zeroed(len: usize) -> Self {
        Self {
            deltas: vec![(0.0, 0.0); len],
        }
    }

    pub fn get(&self, slot: Slot) -> (f32, f32) {
        self.deltas.get(slot).copied().unwrap_or((0.0, 0.0))
    }

    pub fn add(&mut self, slot: Slot, dx: f32, dy: f32) {
        if let Some(delta) = self.deltas.get_mut(slot) {
            delta.0 += dx;
            delta.1 += dy;
        }
    }
}

/// Everything one alignment run reads and writes.
pub struct AlignmentContext<'a> {
    pub config: &'a AlignConfig,
    pub matcher: TextMatcher,
    pub merger: LineMerger,
    pub template: &'a AnnotationDocument,
    pub generic_words: &'a [Word],
    pub domain_words: &'a [Word],

    pub keys: Vec<TemplateEntry<'a>>,
    pub values: Vec<TemplateEntry<'a>>,
    pub etcs: Vec<TemplateEntry<'a>>,
    /// For each KEY (by position in `keys`), positions in `values` it links to.
    pub key_links: Vec<Vec<usize>>,
    /// For each VALUE, positions in `keys` whose link id equals its `key_id`.
    pub value_owners: Vec<Vec<usize>>,

    pub moved: MovedBoxMap,
    pub deltas: DeltaMap,
    pub key_stages: Vec<Option<MatchStage>>,
    pub key_refined: Vec<bool>,
    pub values_moved_by_text: Vec<bool>,
    pub etc_placements: Vec<Option<EtcPlacement>>,
    pub candidates: CandidateSet,
}

impl<'a> AlignmentContext<'a> {
    pub fn new(
        config: &'a AlignConfig,
        template: &'a AnnotationDocument,
        generic_words: &'a [Word],
        domain_words: &'a [Word],
    ) -> Self {
        let mut keys = Vec::new();
        let mut values = Vec::new();
        let mut etcs = Vec::new();
        for (slot, annotation) in template.annotations.iter().enumerate() {
            let Some(original) = annotation.bbox else {
                continue;
            };
            let entry = TemplateEntry {
                slot,
                annotation,
                original,
            };
            match annotation.kind {
                AnnotationKind::Key => keys.push(entry),
                AnnotationKind::Value => values.push(entry),
                AnnotationKind::Etc => etcs.push(entry),
            }
        }

        let mut values_by_key_id: HashMap<&AnnotationId, Vec<usize>> = HashMap::new();
        for (pos, value) in values.iter().enumerate() {
            if let Some(key_id) = value.annotation.key_id.as_ref() {
                values_by_key_id.entry(key_id).or_default().push(pos);
            }
        }

        let mut value_owners = vec![Vec::new(); values.len()];
        let key_links: Vec<Vec<usize>> = keys
            .iter()
            .enumerate()
            .map(|(key_pos, key)| {
                let linked = values_by_key_id
                    .get(key.annotation.link_id())
                    .cloned()
                    .unwrap_or_default();
                for &value_pos in &linked {
                    value_owners[value_pos].push(key_pos);
                }
                linked
            })
            .collect();

        let dangling = value_owners.iter().filter(|owners| owners.is_empty()).count();
        if dangling > 0 {
            tracing::debug!(dangling, "VALUE annotations reference no KEY");
        }

        let len = template.annotations.len();
        Self {
            config,
            matcher: TextMatcher::from_config(config),
            merger: LineMerger::from_config(config),
            template,
            generic_words,
            domain_words,
            key_stages: vec![None; keys.len()],
            key_refined: vec![false; keys.len()],
            values_moved_by_text: vec![false; values.len()],
            etc_placements: vec![None; etcs.len()],
            keys,
            values,
            etcs,
            key_links,
            value_owners,
            moved: MovedBoxMap::seeded(&template.annotations),
            deltas: DeltaMap::zeroed(len),
            candidates: CandidateSet::default(),
        }
    }

    /// Current box of a template entry.
    pub fn current_box(&self, entry: &TemplateEntry<'_>) -> BoundingBox {
        self.moved.get(entry.slot).unwrap_or(entry.original)
    }

    /// Moves a KEY to `bbox` and translates its linked VALUEs (or the given
    /// subset) by the same offset.
    pub fn move_key(&mut self, key_pos: usize, bbox: BoundingBox, linked: &[usize]) -> (f32, f32) {
        let key = self.keys[key_pos];
        let current = self.current_box(&key);
        let (dx, dy) = current.top_left_delta(&bbox);

        self.moved.set(key.slot, bbox);
        self.deltas.add(key.slot, dx, dy);
        for &value_pos in linked {
            let slot = self.values[value_pos].slot;
            self.moved.translate(slot, dx, dy);
            self.deltas.add(slot, dx, dy);
        }
        (dx, dy)
    }

    /// Stage a KEY was anchored in, if any.
    pub fn key_stage(&self, key_pos: usize) -> Option<MatchStage> {
        self.key_stages.get(key_pos).copied().flatten()
    }

    /// The first matched KEY owning a VALUE.
    pub fn matched_owner(&self, value_pos: usize) -> Option<(usize, MatchStage)> {
        self.value_owners
            .get(value_pos)?
            .iter()
            .find_map(|&key_pos| self.key_stage(key_pos).map(|stage| (key_pos, stage)))
    }

    /// Boxes of matched KEYs and of their VALUEs, after relocation.
    pub fn relocated_regions(&self) -> Vec<BoundingBox> {
        let mut regions = Vec::new();
        for (key_pos, key) in self.keys.iter().enumerate() {
            if self.key_stage(key_pos).is_none() {
                continue;
            }
            regions.push(self.current_box(key));
            for &value_pos in &self.key_links[key_pos] {
                regions.push(self.current_box(&self.values[value_pos]));
            }
        }
        regions
    }
}
