use anyhow::Result;

use crate::notify::ChannelResult;
use crate::record::{UsageField, UsageRecord};

pub fn history_to_csv(rows: &[UsageRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(UsageField::ALL.iter().map(|f| f.to_string()))?;
    for row in rows {
        writer.write_record(
            UsageField::ALL
                .iter()
                .map(|f| row.get(*f).unwrap_or_default()),
        )?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn deliveries_to_csv(results: &[ChannelResult]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "channel",
        "period",
        "success",
        "category",
        "duration_ms",
        "error",
    ])?;
    for r in results {
        writer.write_record([
            r.channel.clone(),
            r.period.clone(),
            r.success.to_string(),
            r.category.clone().unwrap_or_default(),
            r.duration_ms.to_string(),
            r.error.clone().unwrap_or_default(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}
