//! Reconstruction of text lines from word-level OCR fragments.
//!
//! Two groupings are provided. [`LineMerger::merge_into_spans`] joins words
//! that sit on the same row separated by roughly one space into a single span.
//! [`LineMerger::split_into_lines`] works on the larger scale: it cuts a set of
//! words into physical lines wherever the vertical gap between consecutive
//! words exceeds a multiple of the mean word height.

use itertools::Itertools;

use crate::core::config::AlignConfig;
use crate::domain::words::Word;
use crate::processors::geometry::BoundingBox;

/// A group of words emitted as one line.
#[derive(Debug, Clone, PartialEq)]
pub struct LineGroup {
    /// Union of the member boxes.
    pub bbox: BoundingBox,
    /// Member texts joined with a single space.
    pub text: String,
    /// Number of merged words.
    pub word_count: usize,
}

impl LineGroup {
    fn from_members(members: &[&Word]) -> Option<Self> {
        let bbox = BoundingBox::union_all(members.iter().map(|w| &w.bbox))?;
        Some(Self {
            bbox,
            text: members.iter().map(|w| w.text.as_str()).join(" "),
            word_count: members.len(),
        })
    }

    /// The group as a canonical word.
    pub fn into_word(self) -> Word {
        Word::new(self.bbox, self.text)
    }
}

/// Groups words into rows and lines using height-relative thresholds.
#[derive(Debug, Clone)]
pub struct LineMerger {
    same_line_factor: f32,
    space_gap_factor: f32,
    line_break_factor: f32,
}

impl Default for LineMerger {
    fn default() -> Self {
        Self::from_config(&AlignConfig::default())
    }
}

impl LineMerger {
    pub fn from_config(config: &AlignConfig) -> Self {
        Self {
            same_line_factor: config.same_line_factor,
            space_gap_factor: config.space_gap_factor,
            line_break_factor: config.line_break_factor,
        }
    }

    /// Mean box height, 0.0 for an empty set.
    pub fn average_height<'a>(words: impl IntoIterator<Item = &'a Word>) -> f32 {
        let (sum, count) = words
            .into_iter()
            .fold((0.0f32, 0usize), |(sum, count), w| (sum + w.bbox.height(), count + 1));
        if count == 0 { 0.0 } else { sum / count as f32 }
    }

    /// Greedy row assembly.
    ///
    /// Words are put in [`reading_order`]. Starting from each
    /// unconsumed word, every later unconsumed word is absorbed when it shares
    /// the row with the last absorbed word and the horizontal gap to it lies
    /// within `[0, avg_height * space_gap_factor]`. Each row becomes one span,
    /// its members ordered left to right.
    pub fn merge_into_spans(&self, words: &[Word]) -> Vec<LineGroup> {
        if words.is_empty() {
            return Vec::new();
        }

        let avg_height = Self::average_height(words);
        let row_tolerance = avg_height * self.same_line_factor;
        let max_gap = avg_height * self.space_gap_factor;

        let sorted = reading_order(words, row_tolerance);

        let mut used = vec![false; sorted.len()];
        let mut spans = Vec::new();

        for i in 0..sorted.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            let mut cluster = vec![sorted[i]];
            let mut last = sorted[i];

            for j in (i + 1)..sorted.len() {
                if used[j] {
                    continue;
                }
                let current = sorted[j];
                if (last.bbox.y_mid() - current.bbox.y_mid()).abs() >= row_tolerance {
                    continue;
                }
                let gap = current.bbox.x1 - last.bbox.x2;
                if (0.0..=max_gap).contains(&gap) {
                    cluster.push(current);
                    used[j] = true;
                    last = current;
                }
            }

            cluster.sort_by(|a, b| a.bbox.x1.total_cmp(&b.bbox.x1));
            spans.extend(LineGroup::from_members(&cluster));
        }

        tracing::debug!(words = words.len(), spans = spans.len(), "merged words into spans");
        spans
    }

    /// Line-break grouping.
    ///
    /// Words are stably ordered by top edge; a new group starts whenever the
    /// gap between a word's top and the previous word's bottom exceeds
    /// `avg_height * line_break_factor`. Each group is joined in
    /// [`reading_order`].
    pub fn split_into_lines(&self, words: &[&Word]) -> Vec<LineGroup> {
        if words.is_empty() {
            return Vec::new();
        }

        let mut sorted: Vec<&Word> = words.to_vec();
        sorted.sort_by(|a, b| a.bbox.y1.total_cmp(&b.bbox.y1));

        let avg_height = Self::average_height(sorted.iter().copied());
        let threshold = avg_height * self.line_break_factor;
        let row_tolerance = avg_height * self.same_line_factor;

        let mut groups: Vec<Vec<&Word>> = Vec::new();
        let mut current: Vec<&Word> = Vec::new();
        for word in sorted {
            if let Some(prev) = current.last() {
                if word.bbox.y1 - prev.bbox.y2 > threshold {
                    groups.push(std::mem::take(&mut current));
                }
            }
            current.push(word);
        }
        groups.push(current);

        groups
            .into_iter()
            .filter_map(|members| {
                LineGroup::from_members(&reading_order(members, row_tolerance))
            })
            .collect()
    }
}

/// Orders words in row bands, top to bottom, then left to right inside a band.
///
/// Words are scanned by vertical centre; a band holds every word whose centre
/// lies within `row_tolerance` of the band's first word.
pub fn reading_order<'a>(
    words: impl IntoIterator<Item = &'a Word>,
    row_tolerance: f32,
) -> Vec<&'a Word> {
    let by_centre: Vec<&Word> = words
        .into_iter()
        .sorted_by(|a, b| a.bbox.y_mid().total_cmp(&b.bbox.y_mid()))
        .collect();

    let mut ordered = Vec::with_capacity(by_centre.len());
    let mut band: Vec<&Word> = Vec::new();
    for word in by_centre {
        if let Some(first) = band.first() {
            if (word.bbox.y_mid() - first.bbox.y_mid()).abs() >= row_tolerance {
                band.sort_by(|a, b| a.bbox.x1.total_cmp(&b.bbox.x1));
                ordered.append(&mut band);
            }
        }
        band.push(word);
    }
    band.sort_by(|a, b| a.bbox.x1.total_cmp(&b.bbox.x1));
    ordered.append(&mut band);
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, x1: f32, y1: f32, x2: f32, y2: f32) -> Word {
        Word::new(BoundingBox::from_coords(x1, y1, x2, y2), text)
    }

    #[test]
    fn test_space_sized_gap_merges() {
        let words = vec![word("A", 0.0, 0.0, 40.0, 20.0), word("B", 45.0, 0.0, 80.0, 20.0)];
        let spans = LineMerger::default().merge_into_spans(&words);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "A B");
        assert_eq!(spans[0].bbox, BoundingBox::from_coords(0.0, 0.0, 80.0, 20.0));
        assert_eq!(spans[0].word_count, 2);
    }

    #[test]
    fn test_wide_gap_and_overlap_split_fields() {
        let words = vec![
            word("Date", 0.0, 0.0, 40.0, 20.0),
            word("2024-01-03", 100.0, 0.0, 200.0, 20.0),
            // overlaps the first word: negative gap
            word("x", 30.0, 2.0, 50.0, 18.0),
        ];
        let spans = LineMerger::default().merge_into_spans(&words);
        let texts: Vec<_> = spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["Date", "x", "2024-01-03"]);
    }

    #[test]
    fn test_row_chain_skips_distant_words() {
        // "Stamp" sorts between "Port" and "of" by vertical centre but is too
        // far right; it is skipped without ending the row
        let words = vec![
            word("Port", 0.0, 0.0, 40.0, 20.0),
            word("Stamp", 500.0, 2.0, 560.0, 22.0),
            word("of", 50.0, 3.0, 70.0, 23.0),
            word("below", 0.0, 40.0, 40.0, 60.0),
        ];
        let spans = LineMerger::default().merge_into_spans(&words);
        let texts: Vec<_> = spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["Port of", "Stamp", "below"]);
    }

    #[test]
    fn test_vertical_jitter_keeps_row_together() {
        // "B" sits one pixel higher than "A"
        let words = vec![word("A", 0.0, 1.0, 40.0, 21.0), word("B", 45.0, 0.0, 80.0, 20.0)];
        let spans = LineMerger::default().merge_into_spans(&words);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "A B");
        assert_eq!(spans[0].bbox, BoundingBox::from_coords(0.0, 0.0, 80.0, 21.0));
    }

    #[test]
    fn test_reading_order_bands_rows() {
        let words = vec![
            word("C", 0.0, 40.0, 30.0, 60.0),
            word("B", 50.0, 0.0, 80.0, 20.0),
            word("A", 0.0, 3.0, 40.0, 23.0),
        ];
        let ordered = reading_order(&words, 10.0);
        let texts: Vec<_> = ordered.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_merge_input_order_does_not_matter() {
        let words = vec![
            word("B", 45.0, 0.0, 80.0, 20.0),
            word("C", 0.0, 50.0, 30.0, 70.0),
            word("A", 0.0, 0.0, 40.0, 20.0),
        ];
        let mut reversed = words.clone();
        reversed.reverse();
        let merger = LineMerger::default();
        assert_eq!(merger.merge_into_spans(&words), merger.merge_into_spans(&reversed));
    }

    #[test]
    fn test_line_break_split() {
        let first = word("SEOUL", 0.0, 0.0, 60.0, 20.0);
        let second = word("KOREA", 0.0, 60.0, 60.0, 80.0);
        let merger = LineMerger::default();

        // gap 40 > 20 * 1.5
        let lines = merger.split_into_lines(&[&second, &first]);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "SEOUL");
        assert_eq!(lines[1].text, "KOREA");

        // gap 5 stays in one group
        let close = word("KOREA", 0.0, 25.0, 60.0, 45.0);
        let lines = merger.split_into_lines(&[&first, &close]);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "SEOUL KOREA");
        assert_eq!(lines[0].bbox, BoundingBox::from_coords(0.0, 0.0, 60.0, 45.0));
    }

    #[test]
    fn test_line_joins_left_to_right() {
        let amount = word("1,200", 0.0, 1.0, 50.0, 21.0);
        let unit = word("KG", 60.0, 0.0, 85.0, 20.0);
        let below = word("NET", 0.0, 24.0, 40.0, 44.0);
        let lines = LineMerger::default().split_into_lines(&[&unit, &below, &amount]);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "1,200 KG NET");
    }

    #[test]
    fn test_empty_inputs() {
        let merger = LineMerger::default();
        assert!(merger.merge_into_spans(&[]).is_empty());
        assert!(merger.split_into_lines(&[]).is_empty());
        assert_eq!(LineMerger::average_height(&[]), 0.0);
    }
}
