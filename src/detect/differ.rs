use serde::Serialize;

use crate::history::History;
use crate::record::UsageRecord;

/// Returns the records of `raw` that are absent from `history`, in `raw` order.
///
/// Membership is whole-record equality; no column acts as a key, so a
/// re-published period with one corrected cell counts as new. A record that
/// repeats inside `raw` is only returned for its first occurrence.
pub fn detect_new_records(raw: &[UsageRecord], history: &History) -> Vec<UsageRecord> {
    let mut fresh: Vec<UsageRecord> = Vec::new();
    for record in raw {
        if history.contains(record) || fresh.contains(record) {
            continue;
        }
        fresh.push(record.clone());
    }
    fresh
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DetectionSummary {
    pub checked: usize,
    pub known: usize,
    pub new: usize,
}

impl DetectionSummary {
    pub fn from_counts(checked: usize, new: usize) -> Self {
        Self {
            checked,
            known: checked.saturating_sub(new),
            new,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(year: &str, month: &str, balance: &str) -> UsageRecord {
        let mut fields = vec![year.to_string(), month.to_string()];
        fields.extend((2..11).map(|i| format!("{i}.00")));
        fields.push(balance.to_string());
        fields.push("120".to_string());
        UsageRecord::new(fields)
    }

    #[test]
    fn returns_only_rows_missing_from_history() {
        let jan = row("2024", "01", "300");
        let feb = row("2024", "02", "250");
        let history = History::new(vec![jan.clone()]);

        let fresh = detect_new_records(&[jan, feb.clone()], &history);
        assert_eq!(fresh, vec![feb]);
    }

    #[test]
    fn known_rows_are_never_reported() {
        let rows = vec![row("2024", "01", "1"), row("2024", "02", "2")];
        let history = History::new(rows.clone());
        assert!(detect_new_records(&rows, &history).is_empty());
    }

    #[test]
    fn preserves_raw_order_not_history_order() {
        let history = History::new(vec![row("2023", "11", "9")]);
        let raw = vec![
            row("2024", "03", "3"),
            row("2023", "11", "9"),
            row("2024", "01", "1"),
            row("2024", "02", "2"),
        ];
        let fresh = detect_new_records(&raw, &history);
        let months: Vec<_> = fresh.iter().map(UsageRecord::period_label).collect();
        assert_eq!(months, vec!["2024/03", "2024/01", "2024/02"]);
    }

    #[test]
    fn corrected_cell_is_treated_as_new_record() {
        let original = row("2024", "01", "300");
        let corrected = row("2024", "01", "310");
        let history = History::new(vec![original]);
        assert_eq!(
            detect_new_records(&[corrected.clone()], &history),
            vec![corrected]
        );
    }

    #[test]
    fn repeated_raw_row_is_reported_once() {
        let feb = row("2024", "02", "250");
        let fresh = detect_new_records(&[feb.clone(), feb.clone()], &History::default());
        assert_eq!(fresh, vec![feb]);
    }

    #[test]
    fn detection_is_idempotent_and_leaves_inputs_untouched() {
        let history = History::new(vec![row("2024", "01", "1")]);
        let raw = vec![row("2024", "01", "1"), row("2024", "02", "2")];
        let snapshot = history.clone();

        let first = detect_new_records(&raw, &history);
        let second = detect_new_records(&raw, &history);
        assert_eq!(first, second);
        assert_eq!(history, snapshot);
        assert_eq!(raw.len(), 2);
    }

    #[test]
    fn short_rows_compare_structurally() {
        let short: UsageRecord = ["2024", "01"].into_iter().collect();
        let history = History::new(vec![row("2024", "01", "1")]);
        assert_eq!(detect_new_records(&[short.clone()], &history), vec![short]);
    }

    #[test]
    fn summary_counts_known_rows() {
        let summary = DetectionSummary::from_counts(12, 1);
        assert_eq!(summary.known, 11);
    }
}
