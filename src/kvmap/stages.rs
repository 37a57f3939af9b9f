//! The staged matching procedure.
//!
//! Stages run in a fixed order and each only touches annotations left
//! unanchored by the earlier ones:
//!
//! 0. [`prepare`] builds merged VALUE spans from the domain OCR and the
//!    candidate KEY words from the generic OCR.
//! 1. [`anchor_keys_by_text`] moves each KEY onto the top-left-most generic
//!    word matching its text and drags its VALUEs along.
//! 2. [`anchor_keys_by_value`] places still unmatched KEYs through a linked
//!    VALUE that lines up with a merged span, then micro-snaps the KEY.
//! 3. [`refine_value_anchored_keys`] snaps stage-2 KEYs onto an overlapping
//!    word with the same leading character.
//!
//! [`match_etcs`] places ETC annotations independently of the KEY/VALUE state.
//!
//! Every "best candidate" choice uses one explicit key (top-left score or
//! distance); the first candidate in payload order wins ties.

use crate::domain::words::Word;
use crate::kvmap::context::{AlignmentContext, EtcMatchMethod, EtcPlacement, MatchStage};
use crate::processors::geometry::BoundingBox;

/// First element with the smallest key.
fn first_min_by_key<T, F>(items: impl IntoIterator<Item = T>, mut key: F) -> Option<T>
where
    F: FnMut(&T) -> f32,
{
    let mut best: Option<(f32, T)> = None;
    for item in items {
        let score = key(&item);
        match &best {
            Some((best_score, _)) if score >= *best_score => {}
            _ => best = Some((score, item)),
        }
    }
    best.map(|(_, item)| item)
}

/// Stage 0: merged VALUE spans and candidate KEY words.
pub fn prepare(ctx: &mut AlignmentContext<'_>) {
    let spans: Vec<Word> = ctx
        .merger
        .merge_into_spans(ctx.domain_words)
        .into_iter()
        .map(|group| group.into_word())
        .collect();

    let exclusion = ctx.config.key_exclusion_overlap;
    let key_words: Vec<Word> = ctx
        .generic_words
        .iter()
        .filter(|word| {
            !spans
                .iter()
                .any(|span| word.bbox.overlap_with_smaller(&span.bbox) >= exclusion)
        })
        .cloned()
        .collect();

    tracing::debug!(
        value_spans = spans.len(),
        candidate_keys = key_words.len(),
        excluded = ctx.generic_words.len() - key_words.len(),
        "prepared candidate sets"
    );
    ctx.candidates.value_spans = spans;
    ctx.candidates.key_words = key_words;
}

/// Stage 1: text-anchored KEY match.
pub fn anchor_keys_by_text(ctx: &mut AlignmentContext<'_>) {
    for key_pos in 0..ctx.keys.len() {
        let key = ctx.keys[key_pos];
        let current = ctx.current_box(&key);
        let text = key.annotation.text_or_empty();

        let textual = first_min_by_key(
            ctx.generic_words
                .iter()
                .filter(|word| ctx.matcher.matches_any_line(text, &word.text)),
            |word| word.bbox.top_left_score(),
        );

        let anchor = match textual {
            Some(word) => Some(word),
            None => ctx
                .config
                .key_iou_fallback
                .and_then(|threshold| best_iou_word(ctx.generic_words, &current, threshold)),
        };

        let Some(anchor) = anchor else {
            tracing::debug!(key = %key.annotation.id, "no text anchor for KEY");
            continue;
        };

        let target = current.moved_to(anchor.bbox.top_left());
        let linked = ctx.key_links[key_pos].clone();
        let (dx, dy) = ctx.move_key(key_pos, target, &linked);
        for &value_pos in &linked {
            ctx.values_moved_by_text[value_pos] = true;
        }
        ctx.key_stages[key_pos] = Some(MatchStage::TextAnchor);
        tracing::debug!(
            key = %key.annotation.id,
            word = %anchor.text,
            dx,
            dy,
            values = linked.len(),
            "KEY anchored by text"
        );
    }
}

/// Highest IoU at or above `threshold`, first on ties.
fn best_iou_word<'w>(words: &'w [Word], bbox: &BoundingBox, threshold: f32) -> Option<&'w Word> {
    let mut best: Option<(f32, &Word)> = None;
    for word in words {
        let iou = word.bbox.iou(bbox);
        if iou < threshold {
            continue;
        }
        if best.is_none_or(|(best_iou, _)| iou > best_iou) {
            best = Some((iou, word));
        }
    }
    best.map(|(_, word)| word)
}

/// Stage 2: VALUE-anchored fallback for KEYs without a text anchor.
pub fn anchor_keys_by_value(ctx: &mut AlignmentContext<'_>) {
    let margin = ctx.config.value_containment_margin;
    let anchor_radius = ctx.config.value_anchor_radius;
    let snap_radius = ctx.config.key_snap_radius;

    for key_pos in 0..ctx.keys.len() {
        if ctx.key_stage(key_pos).is_some() {
            continue;
        }
        let linked: Vec<usize> = ctx.key_links[key_pos]
            .iter()
            .copied()
            .filter(|&value_pos| !ctx.values_moved_by_text[value_pos])
            .collect();
        if linked.is_empty() {
            continue;
        }

        let key = ctx.keys[key_pos];
        for &value_pos in &linked {
            let value_box = ctx.current_box(&ctx.values[value_pos]);
            let span = first_min_by_key(
                ctx.candidates.value_spans.iter().filter(|span| {
                    span.bbox.is_within(&value_box, margin)
                        || span.bbox.top_left_distance(&value_box) < anchor_radius
                }),
                |span| span.bbox.top_left_score(),
            );
            let Some(span) = span else {
                continue;
            };

            let (vdx, vdy) = value_box.top_left_delta(&span.bbox);
            let key_box = ctx.current_box(&key);
            let shifted = key_box.translate(vdx, vdy);

            let snap = first_min_by_key(
                ctx.generic_words
                    .iter()
                    .filter(|word| word.bbox.top_left_distance(&shifted) < snap_radius),
                |word| word.bbox.top_left_distance(&shifted),
            );
            let target = match snap {
                Some(word) => shifted.moved_to(word.bbox.top_left()),
                None => shifted,
            };

            let span_text = span.text.clone();
            let snapped = snap.is_some();
            let (dx, dy) = ctx.move_key(key_pos, target, &linked);
            ctx.key_stages[key_pos] = Some(MatchStage::ValueAnchor);
            tracing::debug!(
                key = %key.annotation.id,
                span = %span_text,
                snapped,
                dx,
                dy,
                "KEY anchored through VALUE"
            );
            break;
        }
    }
}

/// Stage 3: snap stage-2 KEYs onto an overlapping word with the same leading character.
pub fn refine_value_anchored_keys(ctx: &mut AlignmentContext<'_>) {
    for key_pos in 0..ctx.keys.len() {
        if ctx.key_stage(key_pos) != Some(MatchStage::ValueAnchor) {
            continue;
        }
        let key = ctx.keys[key_pos];
        let current = ctx.current_box(&key);
        let text = key.annotation.text_or_empty();

        let word = first_min_by_key(
            ctx.generic_words.iter().filter(|word| {
                word.bbox.touches(&current) && ctx.matcher.leading_char_matches(text, &word.text)
            }),
            |word| word.bbox.top_left_score(),
        );
        let Some(word) = word else {
            continue;
        };

        let target = current.moved_to(word.bbox.top_left());
        let linked = ctx.key_links[key_pos].clone();
        let (dx, dy) = ctx.move_key(key_pos, target, &linked);
        ctx.key_refined[key_pos] = true;
        tracing::debug!(key = %key.annotation.id, word = %word.text, dx, dy, "KEY refined");
    }
}

/// ETC placement with the lenient text rule.
///
/// Words whose centre lies inside a relocated KEY or VALUE are never used.
/// Text-matching words overlapping the original box are preferred (top-left
/// most); otherwise the text-matching word nearest to the original centre wins.
pub fn match_etcs(ctx: &mut AlignmentContext<'_>) {
    let regions = ctx.relocated_regions();
    let eligible: Vec<&Word> = ctx
        .generic_words
        .iter()
        .filter(|word| {
            let center = word.bbox.center();
            !regions.iter().any(|region| region.contains_point(&center))
        })
        .collect();

    for etc_pos in 0..ctx.etcs.len() {
        let etc = ctx.etcs[etc_pos];
        let text = etc.annotation.text_or_empty();
        if text.trim().is_empty() {
            continue;
        }
        let original = etc.original;
        let textual: Vec<&Word> = eligible
            .iter()
            .copied()
            .filter(|word| ctx.matcher.etc_matches(text, &word.text))
            .collect();

        let overlapping = first_min_by_key(
            textual.iter().copied().filter(|word| word.bbox.touches(&original)),
            |word| word.bbox.top_left_score(),
        );
        let (word, method) = match overlapping {
            Some(word) => (word, EtcMatchMethod::Overlap),
            None => {
                let nearest = first_min_by_key(textual.iter().copied(), |word| {
                    word.bbox.center_distance(&original)
                });
                match nearest {
                    Some(word) => (word, EtcMatchMethod::NearestText),
                    None => {
                        tracing::debug!(etc = %etc.annotation.id, "no word for ETC");
                        continue;
                    }
                }
            }
        };

        let bbox = original.moved_to(word.bbox.top_left());
        let delta = original.top_left_delta(&bbox);
        ctx.moved.set(etc.slot, bbox);
        ctx.deltas.add(etc.slot, delta.0, delta.1);
        ctx.etc_placements[etc_pos] = Some(EtcPlacement {
            bbox,
            delta,
            method,
        });
        tracing::debug!(etc = %etc.annotation.id, word = %word.text, ?method, "ETC placed");
    }
}
