//! One end-to-end check: extract, detect, announce, persist.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::detect::{detect_new_records, DetectionSummary};
use crate::extract::UsageExtractor;
use crate::history::HistoryStore;
use crate::notify::dispatcher::Dispatcher;
use crate::notify::{format_usage, ChannelResult, Language};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Persistence {
    /// Nothing new or no channel to announce on, so the history file was not touched.
    Skipped,
    Saved { rows: usize },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub customer_name: Option<String>,
    pub consumer_number: Option<String>,
    pub checked: usize,
    pub new_records: Vec<String>,
    pub deliveries: Vec<ChannelResult>,
    pub persistence: Persistence,
    pub extraction_error: Option<String>,
}

impl RunReport {
    fn started(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            customer_name: None,
            consumer_number: None,
            checked: 0,
            new_records: Vec::new(),
            deliveries: Vec::new(),
            persistence: Persistence::Skipped,
            extraction_error: None,
        }
    }

    pub fn summary(&self) -> DetectionSummary {
        DetectionSummary::from_counts(self.checked, self.new_records.len())
    }

    pub fn failed_deliveries(&self) -> usize {
        self.deliveries.iter().filter(|d| !d.success).count()
    }
}

pub struct RunCoordinator {
    extractor: Box<dyn UsageExtractor>,
    store: Box<dyn HistoryStore>,
    dispatcher: Dispatcher,
    language: Language,
}

impl RunCoordinator {
    pub fn new(
        extractor: Box<dyn UsageExtractor>,
        store: Box<dyn HistoryStore>,
        dispatcher: Dispatcher,
        language: Language,
    ) -> Self {
        Self {
            extractor,
            store,
            dispatcher,
            language,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Runs one check. Failures end up in the report; nothing here is fatal.
    pub async fn run_once(&self) -> RunReport {
        let mut report = RunReport::started(Utc::now());
        info!(source = self.extractor.name(), "checking for new usage records");

        let usage = match self.extractor.extract().await {
            Ok(usage) => usage,
            Err(err) => {
                error!(source = self.extractor.name(), error = %err, "extraction failed, run aborted");
                report.extraction_error = Some(err.to_string());
                return report;
            }
        };
        report.customer_name = Some(usage.customer_name.clone());
        report.consumer_number = Some(usage.consumer_number.clone());
        report.checked = usage.rows.len();
        info!(rows = usage.rows.len(), "usage table extracted");

        let mut history = self.store.load();
        let fresh = detect_new_records(&usage.rows, &history);
        info!(
            known = history.len(),
            new = fresh.len(),
            "detection complete"
        );
        if fresh.is_empty() {
            info!("no new records, history left untouched");
            return report;
        }

        if self.dispatcher.is_empty() {
            // Nothing can be announced; keep the rows new for a later run.
            report.new_records = fresh.iter().map(|r| r.period_label()).collect();
            warn!(
                new = fresh.len(),
                "no notification channel configured, history left untouched"
            );
            return report;
        }

        let identity = usage.identity();
        for record in fresh {
            let message = format_usage(&record, &identity, self.language);
            let results = self.dispatcher.dispatch(&message).await;
            report.deliveries.extend(results);
            report.new_records.push(message.period);
            history.append(record);
        }

        report.persistence = match self.store.save(&history) {
            Ok(()) => {
                info!(rows = history.len(), "history persisted");
                Persistence::Saved {
                    rows: history.len(),
                }
            }
            Err(err) => {
                error!(error = %err, "failed to persist history");
                Persistence::Failed {
                    error: err.to_string(),
                }
            }
        };
        report
    }
}
