//! Fans one rendered message out to every configured sink.
//!
//! Sinks are attempted one after another in configuration order. Each attempt
//! is bounded by the dispatcher timeout and its outcome is recorded on its own;
//! a failing or hanging sink never stops the remaining ones.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::notify::format::NotificationMessage;
use crate::notify::sink::{ChannelError, ChannelResult, NotificationSink};

pub struct Dispatcher {
    sinks: Vec<Box<dyn NotificationSink>>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(sinks: Vec<Box<dyn NotificationSink>>, timeout: Duration) -> Self {
        Self { sinks, timeout }
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.sinks.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn dispatch(&self, message: &NotificationMessage) -> Vec<ChannelResult> {
        let mut results = Vec::with_capacity(self.sinks.len());

        for sink in &self.sinks {
            let start = Instant::now();
            let outcome = match tokio::time::timeout(self.timeout, sink.send(message)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ChannelError::Timeout(self.timeout)),
            };
            let duration_ms = start.elapsed().as_millis() as u64;

            let result = match outcome {
                Ok(()) => {
                    info!(
                        channel = sink.name(),
                        period = %message.period,
                        duration_ms,
                        "notification delivered"
                    );
                    ChannelResult::delivered(sink.name(), &message.period, duration_ms)
                }
                Err(err) => {
                    warn!(
                        channel = sink.name(),
                        period = %message.period,
                        category = err.category(),
                        error = %err,
                        duration_ms,
                        "notification delivery failed"
                    );
                    ChannelResult::failed(sink.name(), &message.period, &err, duration_ms)
                }
            };
            results.push(result);
        }

        results
    }
}
