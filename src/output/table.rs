use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::notify::ChannelResult;
use crate::record::{UsageField, UsageRecord};
use crate::run::{Persistence, RunReport};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn render_history_table(rows: &[UsageRecord]) -> String {
    let mut table = new_table();
    table.set_header(vec![
        "#",
        "Period",
        "Total Recharge",
        "Energy Cost",
        "Energy (kWh)",
        "Month-End Balance",
        "Total Deduction",
    ]);
    for (idx, row) in rows.iter().enumerate() {
        let field = |f: UsageField| row.get(f).unwrap_or("-").to_string();
        table.add_row(vec![
            (idx + 1).to_string(),
            row.period_label(),
            field(UsageField::TotalRecharge),
            field(UsageField::EnergyCost),
            field(UsageField::EnergyKwh),
            field(UsageField::MonthEndBalance),
            field(UsageField::TotalDeduction),
        ]);
    }
    table.to_string()
}

pub fn render_delivery_table(results: &[ChannelResult]) -> String {
    let mut table = new_table();
    table.set_header(vec![
        "Channel",
        "Period",
        "Status",
        "Category",
        "Duration (ms)",
        "Error",
    ]);
    for r in results {
        let status = if r.success {
            Cell::new("SENT").fg(Color::Green)
        } else {
            Cell::new("FAILED").fg(Color::Red)
        };
        table.add_row(Row::from(vec![
            Cell::new(&r.channel),
            Cell::new(&r.period),
            status,
            Cell::new(r.category.as_deref().unwrap_or("-")),
            Cell::new(r.duration_ms),
            Cell::new(r.error.as_deref().unwrap_or("")),
        ]));
    }
    table.to_string()
}

pub fn render_report(report: &RunReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Run started {}\n",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some(error) = &report.extraction_error {
        out.push_str(&format!("Extraction failed: {error}\n"));
        return out;
    }

    let summary = report.summary();
    out.push_str(&format!(
        "Customer: {} ({})\n",
        report.customer_name.as_deref().unwrap_or("-"),
        report.consumer_number.as_deref().unwrap_or("-")
    ));
    out.push_str(&format!(
        "Records checked: {}  known: {}  new: {}\n",
        summary.checked, summary.known, summary.new
    ));
    if !report.new_records.is_empty() {
        out.push_str(&format!("New periods: {}\n", report.new_records.join(", ")));
    }
    if !report.deliveries.is_empty() {
        out.push_str(&render_delivery_table(&report.deliveries));
        out.push('\n');
    }
    let persistence = match &report.persistence {
        Persistence::Skipped if report.new_records.is_empty() => {
            "skipped (nothing new)".to_string()
        }
        Persistence::Skipped => "skipped (no channel configured)".to_string(),
        Persistence::Saved { rows } => format!("saved ({rows} rows)"),
        Persistence::Failed { error } => format!("FAILED: {error}"),
    };
    out.push_str(&format!("History: {persistence}"));
    out
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::notify::ChannelError;

    #[test]
    fn history_table_shows_placeholders_for_short_rows() {
        let rows: Vec<UsageRecord> = vec![["2024", "01"].into_iter().collect()];
        let rendered = render_history_table(&rows);
        assert!(rendered.contains("2024/01"));
        assert!(rendered.contains('-'));
    }

    #[test]
    fn report_lists_failed_channel() {
        let report = RunReport {
            started_at: Utc::now(),
            customer_name: Some("Rahim".to_string()),
            consumer_number: Some("77001234".to_string()),
            checked: 2,
            new_records: vec!["2024/02".to_string()],
            deliveries: vec![
                ChannelResult::delivered("telegram", "2024/02", 120),
                ChannelResult::failed(
                    "discord",
                    "2024/02",
                    &ChannelError::Forbidden("missing access".to_string()),
                    80,
                ),
            ],
            persistence: Persistence::Saved { rows: 2 },
            extraction_error: None,
        };
        let rendered = render_report(&report);
        assert!(rendered.contains("known: 1  new: 1"));
        assert!(rendered.contains("permission"));
        assert!(rendered.contains("saved (2 rows)"));
    }

    #[test]
    fn report_explains_unsaved_new_rows() {
        let report = RunReport {
            started_at: Utc::now(),
            customer_name: Some("Rahim".to_string()),
            consumer_number: Some("77001234".to_string()),
            checked: 1,
            new_records: vec!["2024/06".to_string()],
            deliveries: Vec::new(),
            persistence: Persistence::Skipped,
            extraction_error: None,
        };
        assert!(render_report(&report).contains("skipped (no channel configured)"));
    }
}
