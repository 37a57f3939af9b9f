//! Builds the two outputs of a run from the final [`AlignmentContext`] state.
//!
//! The auto-mapping result replaces relocated boxes by real OCR geometry where
//! the evidence is strong enough and tags everything else as unmatched. The
//! matched-manual view keeps the template annotations themselves, restricted
//! to what some stage actually anchored.

use crate::domain::annotation::{Annotation, AnnotationDocument, AnnotationId, AnnotationKind};
use crate::domain::words::Word;
use crate::kvmap::context::{AlignmentContext, MatchStage, TemplateEntry};
use crate::kvmap::result::{AlignmentResult, AlignmentStats, RelocatedAnnotation};
use crate::processors::geometry::BoundingBox;

/// Assembles the full result of a run.
pub fn assemble(ctx: &AlignmentContext<'_>) -> AlignmentResult {
    let annotations = auto_mapping(ctx);
    let stats = collect_stats(ctx, &annotations);

    let mut document = AnnotationDocument::new(ctx.template.image.clone(), annotations);
    document.width = ctx.template.width;
    document.height = ctx.template.height;

    AlignmentResult {
        document,
        matched_manual: matched_manual(ctx),
        stats,
        candidates: ctx.candidates.clone(),
    }
}

fn output_id(prefix: &str, id: &AnnotationId, line: Option<usize>) -> AnnotationId {
    match line {
        Some(n) => AnnotationId::new(format!("{prefix}_{id}_{n}")),
        None => AnnotationId::new(format!("{prefix}_{id}")),
    }
}

fn output_annotation(
    id: AnnotationId,
    kind: AnnotationKind,
    bbox: BoundingBox,
    text: Option<String>,
    matched: bool,
) -> Annotation {
    let mut annotation = Annotation::new(id, kind, bbox).with_matched(matched);
    annotation.text = text;
    annotation
}

/// Fresh annotation list: KEYs, then VALUEs, then ETCs, each in template order.
pub fn auto_mapping(ctx: &AlignmentContext<'_>) -> Vec<Annotation> {
    let mut out = Vec::with_capacity(ctx.keys.len() + ctx.values.len() + ctx.etcs.len());

    for key in &ctx.keys {
        out.push(refine_key(ctx, key));
    }
    for value_pos in 0..ctx.values.len() {
        out.extend(refine_value(ctx, value_pos));
    }
    for (etc_pos, etc) in ctx.etcs.iter().enumerate() {
        let id = output_id("auto_etc", &etc.annotation.id, None);
        let annotation = match ctx.etc_placements[etc_pos] {
            Some(placement) => output_annotation(
                id,
                AnnotationKind::Etc,
                placement.bbox,
                etc.annotation.text.clone(),
                true,
            ),
            None => output_annotation(
                id,
                AnnotationKind::Etc,
                etc.original,
                etc.annotation.text.clone(),
                false,
            ),
        };
        out.push(annotation);
    }
    out
}

/// Replaces the relocated KEY box by the best-overlapping generic word.
fn refine_key(ctx: &AlignmentContext<'_>, key: &TemplateEntry<'_>) -> Annotation {
    let relocated = ctx.current_box(key);
    let threshold = ctx.config.key_refine_iou;

    let mut best: Option<(f32, &Word)> = None;
    for word in ctx.generic_words {
        let iou = word.bbox.iou(&relocated);
        if iou < threshold {
            continue;
        }
        if best.is_none_or(|(best_iou, _)| iou > best_iou) {
            best = Some((iou, word));
        }
    }

    let (bbox, matched) = match best {
        Some((_, word)) if word.bbox.width() > relocated.width() => {
            (word.bbox.clip_x(relocated.x1, relocated.x2), true)
        }
        Some((_, word)) => (word.bbox, true),
        None => (relocated, false),
    };

    output_annotation(
        output_id("auto_key", &key.annotation.id, None),
        AnnotationKind::Key,
        bbox,
        key.annotation.text.clone(),
        matched,
    )
    .with_key_id(key.annotation.link_id().clone())
}

/// Collects domain words inside the relocated VALUE box, one record per line.
fn refine_value(ctx: &AlignmentContext<'_>, value_pos: usize) -> Vec<Annotation> {
    let value = &ctx.values[value_pos];
    let template = value.annotation;
    let finish = |annotation: Annotation| match template.key_id.clone() {
        Some(key_id) => annotation.with_key_id(key_id),
        None => annotation,
    };

    if ctx.value_owners[value_pos].is_empty() {
        tracing::debug!(value = %template.id, "VALUE has no KEY; emitted unrefined");
        return vec![finish(
            output_annotation(
                output_id("auto_value", &template.id, None),
                AnnotationKind::Value,
                value.original,
                template.text.clone(),
                false,
            )
            .with_order(1),
        )];
    }

    let relocated = ctx.current_box(value);
    let ratio = ctx.config.value_overlap_ratio;
    let inside: Vec<&Word> = ctx
        .domain_words
        .iter()
        .filter(|word| word.bbox.ioa(&relocated) >= ratio)
        .collect();

    let lines = ctx.merger.split_into_lines(&inside);
    if lines.is_empty() {
        return vec![finish(
            output_annotation(
                output_id("auto_value", &template.id, None),
                AnnotationKind::Value,
                relocated,
                template.text.clone(),
                false,
            )
            .with_order(1),
        )];
    }

    let numbered = lines.len() > 1;
    lines
        .into_iter()
        .enumerate()
        .map(|(i, line)| {
            let n = i + 1;
            let id = output_id("auto_value", &template.id, numbered.then_some(n));
            finish(
                output_annotation(id, AnnotationKind::Value, line.bbox, Some(line.text), true)
                    .with_order(n as u32),
            )
        })
        .collect()
}

/// Template annotations of matched KEYs, their VALUEs and matched ETCs.
pub fn matched_manual(ctx: &AlignmentContext<'_>) -> Vec<RelocatedAnnotation> {
    let relocate = |entry: &TemplateEntry<'_>, bbox: BoundingBox| {
        let mut annotation = entry.annotation.clone();
        annotation.bbox = Some(bbox);
        let (dx, dy) = ctx.deltas.get(entry.slot);
        (annotation, entry.original, [dx, dy])
    };

    let mut out = Vec::new();
    for (key_pos, key) in ctx.keys.iter().enumerate() {
        let Some(stage) = ctx.key_stage(key_pos) else {
            continue;
        };
        let (annotation, moved_from, delta) = relocate(key, ctx.current_box(key));
        out.push(RelocatedAnnotation {
            annotation,
            moved_from,
            delta,
            stage: Some(stage),
        });
    }
    for (value_pos, value) in ctx.values.iter().enumerate() {
        let Some((_, stage)) = ctx.matched_owner(value_pos) else {
            continue;
        };
        let (annotation, moved_from, delta) = relocate(value, ctx.current_box(value));
        out.push(RelocatedAnnotation {
            annotation,
            moved_from,
            delta,
            stage: Some(stage),
        });
    }
    for (etc_pos, etc) in ctx.etcs.iter().enumerate() {
        let Some(placement) = ctx.etc_placements[etc_pos] else {
            continue;
        };
        let (annotation, moved_from, delta) = relocate(etc, placement.bbox);
        out.push(RelocatedAnnotation {
            annotation,
            moved_from,
            delta,
            stage: None,
        });
    }
    out
}

fn collect_stats(ctx: &AlignmentContext<'_>, annotations: &[Annotation]) -> AlignmentStats {
    let mut stats = AlignmentStats {
        generic_words: ctx.generic_words.len(),
        domain_words: ctx.domain_words.len(),
        value_spans: ctx.candidates.value_spans.len(),
        candidate_keys: ctx.candidates.key_words.len(),
        keys_total: ctx.keys.len(),
        values_total: ctx.values.len(),
        etcs_total: ctx.etcs.len(),
        ..AlignmentStats::default()
    };

    for key_pos in 0..ctx.keys.len() {
        match ctx.key_stage(key_pos) {
            Some(MatchStage::TextAnchor) => stats.keys_text_anchored += 1,
            Some(MatchStage::ValueAnchor) => stats.keys_value_anchored += 1,
            None => stats.keys_unmatched += 1,
        }
    }
    stats.keys_refined = ctx.key_refined.iter().filter(|refined| **refined).count();
    stats.etcs_matched = ctx.etc_placements.iter().flatten().count();

    for annotation in annotations.iter().filter(|a| a.kind == AnnotationKind::Value) {
        if annotation.matched == Some(true) {
            stats.value_lines += 1;
        } else {
            stats.values_unmatched += 1;
        }
    }
    stats
}
