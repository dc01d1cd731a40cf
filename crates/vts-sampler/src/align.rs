use rand::Rng;

use vts_core::types::{CaptionRecord, Window};

/// The caption chosen for a sample.
///
/// `index` is the table row the selection started from (the embedding
/// store is keyed by it); `record` is an owned, possibly merged record
/// whose bounds become the frame-sampling window. The table itself is
/// never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedCaption {
    pub index: usize,
    pub record: CaptionRecord,
}

/// Selects one caption record for the target window.
///
/// With a known window the best-overlapping record wins, ties broken
/// by first occurrence. With no window (train-time, no prior
/// alignment) a record is drawn uniformly at random. When the chosen
/// text is shorter than `min_words`, neighbors at growing distance are
/// pulled in on both sides (non-empty text only), widening the merged
/// record's bounds, until the threshold is met or the table is
/// exhausted.
pub fn select_caption<R: Rng>(
    records: &[CaptionRecord],
    window: Option<Window>,
    min_words: usize,
    rng: &mut R,
) -> Option<AlignedCaption> {
    if records.is_empty() {
        return None;
    }
    let index = match window {
        Some(w) => argmax_overlap(records, w),
        None => rng.gen_range(0..records.len()),
    };

    let selected = &records[index];
    let mut text = selected.text.clone();
    let mut start = selected.start;
    let mut end = selected.end;

    if min_words > 0 {
        let mut dist = 1usize;
        while word_count(&text) < min_words {
            let prev = index.checked_sub(dist).map(|i| &records[i]);
            let next = records.get(index + dist);
            if prev.is_none() && next.is_none() {
                break;
            }
            if let Some(r) = prev {
                if !r.text.is_empty() {
                    text = format!("{} {}", r.text, text);
                    start = r.start;
                }
            }
            if let Some(r) = next {
                if !r.text.is_empty() {
                    text = format!("{} {}", text, r.text);
                    end = r.end;
                }
            }
            dist += 1;
        }
    }

    Some(AlignedCaption {
        index,
        record: CaptionRecord { start, end, text },
    })
}

fn argmax_overlap(records: &[CaptionRecord], window: Window) -> usize {
    let mut best = 0usize;
    let mut best_overlap = f64::NEG_INFINITY;
    for (i, r) in records.iter().enumerate() {
        let overlap = window.overlap(r.start, r.end);
        if overlap > best_overlap {
            best_overlap = overlap;
            best = i;
        }
    }
    best
}

fn word_count(text: &str) -> usize {
    text.split(' ').filter(|w| !w.is_empty()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(3)
    }

    fn record(start: f64, end: f64, text: &str) -> CaptionRecord {
        CaptionRecord {
            start,
            end,
            text: text.to_string(),
        }
    }

    #[test]
    fn overlap_ties_break_first() {
        let records = vec![
            record(0.0, 5.0, "a"),
            record(4.0, 10.0, "b"),
            record(20.0, 25.0, "c"),
        ];
        let aligned =
            select_caption(&records, Some(Window::new(3.0, 6.0)), 0, &mut rng()).unwrap();
        assert_eq!(aligned.index, 0);
        assert_eq!(aligned.record.text, "a");
    }

    #[test]
    fn no_window_picks_uniformly() {
        let records = vec![
            record(0.0, 1.0, "a"),
            record(1.0, 2.0, "b"),
            record(2.0, 3.0, "c"),
        ];
        let mut r = rng();
        let mut seen = [false; 3];
        for _ in 0..64 {
            let aligned = select_caption(&records, None, 0, &mut r).unwrap();
            seen[aligned.index] = true;
        }
        assert!(seen.iter().all(|&s| s), "all records reachable: {seen:?}");
    }

    #[test]
    fn merge_stops_at_min_words() {
        let records = vec![
            record(0.0, 2.0, "one two"),
            record(2.0, 4.0, "three four"),
            record(4.0, 6.0, "five six"),
        ];
        let aligned =
            select_caption(&records, Some(Window::new(2.5, 3.5)), 5, &mut rng()).unwrap();
        assert_eq!(aligned.index, 1);
        assert_eq!(aligned.record.text, "one two three four five six");
        assert_eq!(aligned.record.start, 0.0);
        assert_eq!(aligned.record.end, 6.0);
    }

    #[test]
    fn merge_exhausts_without_panicking() {
        let records = vec![record(0.0, 2.0, "one"), record(2.0, 4.0, "two")];
        let aligned =
            select_caption(&records, Some(Window::new(0.0, 1.0)), 50, &mut rng()).unwrap();
        assert_eq!(aligned.record.text, "one two");
        assert_eq!(aligned.record.start, 0.0);
        assert_eq!(aligned.record.end, 4.0);
    }

    #[test]
    fn merge_skips_empty_neighbors() {
        let records = vec![
            record(0.0, 2.0, ""),
            record(2.0, 4.0, "middle words"),
            record(4.0, 6.0, "tail"),
        ];
        let aligned =
            select_caption(&records, Some(Window::new(2.5, 3.5)), 3, &mut rng()).unwrap();
        assert_eq!(aligned.record.text, "middle words tail");
        // The empty left neighbor contributes neither text nor bounds.
        assert_eq!(aligned.record.start, 2.0);
        assert_eq!(aligned.record.end, 6.0);
    }

    #[test]
    fn source_table_is_untouched() {
        let records = vec![record(0.0, 2.0, "one"), record(2.0, 4.0, "two")];
        let before = records.clone();
        let _ = select_caption(&records, Some(Window::new(0.0, 4.0)), 10, &mut rng());
        assert_eq!(records, before);
    }

    #[test]
    fn empty_table_yields_none() {
        assert!(select_caption(&[], None, 0, &mut rng()).is_none());
    }
}
