use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::{CustomerIdentity, UsageField, UsageRecord};

/// Stands in for any column the record is too short to carry.
pub const MISSING_FIELD_PLACEHOLDER: &str = "N/A";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    #[serde(alias = "english")]
    En,
    #[serde(alias = "bangla", alias = "bengali")]
    Bn,
}

impl Display for Language {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::En => write!(f, "en"),
            Self::Bn => write!(f, "bn"),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown message language: {0}")]
pub struct LanguageParseError(pub String);

impl FromStr for Language {
    type Err = LanguageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Self::En),
            "bn" | "bangla" | "bengali" => Ok(Self::Bn),
            _ => Err(LanguageParseError(s.to_string())),
        }
    }
}

/// Rendered, channel-agnostic notification text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationMessage {
    pub period: String,
    pub text: String,
}

impl NotificationMessage {
    pub fn new(period: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            period: period.into(),
            text: text.into(),
        }
    }
}

impl Display for NotificationMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

struct Labels {
    header: &'static str,
    name: &'static str,
    consumer_no: &'static str,
    month: &'static str,
    year: &'static str,
    total_recharge: &'static str,
    energy_cost: &'static str,
    energy_kwh: &'static str,
    balance: &'static str,
    meter_rent: &'static str,
    demand_charge: &'static str,
    vat: &'static str,
    rebate: &'static str,
    total_deduction: &'static str,
    currency: &'static str,
}

const ENGLISH: Labels = Labels {
    header: "📉Monthly Usage📉",
    name: "👤 Consumer Name:",
    consumer_no: "🔢 Consumer No.:",
    month: "🗓️ Month:",
    year: "📅 Year:",
    total_recharge: "💳 Total Recharge (Tk.):",
    energy_cost: "⚡ Energy Usage (Tk):",
    energy_kwh: "🪫 Energy Usage (KWH):",
    balance: "💲 Month End Meter Balance (Tk.):",
    meter_rent: "📜 Meter Rent:",
    demand_charge: "📜 Demand Charge:",
    vat: "🧾 VAT:",
    rebate: "🎁 Rebate:",
    total_deduction: "💰 Total Usage/Deduction (Tk.):",
    currency: "Tk",
};

const BANGLA: Labels = Labels {
    header: "📉মাসিক ব্যবহার📉",
    name: "👤 গ্রাহকের নাম:",
    consumer_no: "🔢 কনজ্যুমার নম্বর:",
    month: "🗓️ মাস:",
    year: "📅 বছর:",
    total_recharge: "💳 সর্বমোট রিচার্জ:",
    energy_cost: "⚡ ব্যবহৃত বিদ্যুৎ (টাকা):",
    energy_kwh: "🪫 ব্যবহৃত বিদ্যুৎ (kWh):",
    balance: "💲 মাস শেষে মিটার ব্যালেন্স:",
    meter_rent: "📜 মিটার রেন্ট:",
    demand_charge: "📜 ডিমান্ড চার্জ:",
    vat: "🧾 ভ্যাট:",
    rebate: "🎁 রেয়াত:",
    total_deduction: "💰 সর্বমোট ব্যবহার/কর্তন:",
    currency: "টাকা",
};

impl Language {
    fn labels(self) -> &'static Labels {
        match self {
            Self::En => &ENGLISH,
            Self::Bn => &BANGLA,
        }
    }
}

/// Renders one usage record. Never fails; short rows get placeholders.
pub fn format_usage(
    record: &UsageRecord,
    identity: &CustomerIdentity,
    language: Language,
) -> NotificationMessage {
    let l = language.labels();
    let field = |f: UsageField| record.get(f).unwrap_or(MISSING_FIELD_PLACEHOLDER);
    let money = |label: &str, f: UsageField| format!("{label} {} {}\n", field(f), l.currency);

    let mut text = String::with_capacity(512);
    text.push_str(l.header);
    text.push_str("\n\n");
    text.push_str(&format!("{} {}\n", l.name, identity.name));
    text.push_str(&format!("{} {}\n\n", l.consumer_no, identity.consumer_number));
    text.push_str(&format!("{} {}\n", l.month, field(UsageField::Month)));
    text.push_str(&format!("{} {}\n\n", l.year, field(UsageField::Year)));
    text.push_str(&money(l.total_recharge, UsageField::TotalRecharge));
    text.push_str(&money(l.energy_cost, UsageField::EnergyCost));
    text.push_str(&format!("{} {} kwh\n", l.energy_kwh, field(UsageField::EnergyKwh)));
    text.push_str(&money(l.balance, UsageField::MonthEndBalance));
    text.push('\n');
    text.push_str(&money(l.meter_rent, UsageField::MeterRent));
    text.push_str(&money(l.demand_charge, UsageField::DemandCharge));
    text.push_str(&money(l.vat, UsageField::Vat));
    text.push_str(&money(l.rebate, UsageField::Rebate));
    text.push_str(&money(l.total_deduction, UsageField::TotalDeduction));

    NotificationMessage::new(record.period_label(), text)
}

/// Message used by `notify-test` to probe every configured channel.
pub fn test_message(identity: &CustomerIdentity, language: Language) -> NotificationMessage {
    let text = match language {
        Language::En => format!(
            "✅ meter-watch test message\n\n{} {}\n{} {}",
            ENGLISH.name, identity.name, ENGLISH.consumer_no, identity.consumer_number
        ),
        Language::Bn => format!(
            "✅ meter-watch পরীক্ষামূলক বার্তা\n\n{} {}\n{} {}",
            BANGLA.name, identity.name, BANGLA.consumer_no, identity.consumer_number
        ),
    };
    NotificationMessage::new("test", text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_row() -> UsageRecord {
        [
            "2024", "02", "1500.00", "7.50", "980.25", "40", "84", "0", "0", "53.21", "1157.46",
            "342.54", "131",
        ]
        .into_iter()
        .collect()
    }

    fn identity() -> CustomerIdentity {
        CustomerIdentity::new("RAHIM UDDIN", "77001234")
    }

    #[test]
    fn english_message_maps_positions_to_labels() {
        let msg = format_usage(&full_row(), &identity(), Language::En);
        let text = msg.text;
        assert!(text.starts_with("📉Monthly Usage📉\n\n👤 Consumer Name: RAHIM UDDIN\n"));
        assert!(text.contains("🔢 Consumer No.: 77001234\n\n"));
        assert!(text.contains("🗓️ Month: 02\n📅 Year: 2024\n\n"));
        assert!(text.contains("💳 Total Recharge (Tk.): 1500.00 Tk\n"));
        assert!(text.contains("⚡ Energy Usage (Tk): 980.25 Tk\n"));
        assert!(text.contains("🪫 Energy Usage (KWH): 131 kwh\n"));
        assert!(text.contains("💲 Month End Meter Balance (Tk.): 342.54 Tk\n\n"));
        assert!(text.contains("📜 Meter Rent: 40 Tk\n"));
        assert!(text.contains("📜 Demand Charge: 84 Tk\n"));
        assert!(text.contains("🧾 VAT: 53.21 Tk\n"));
        assert!(text.contains("🎁 Rebate: 7.50 Tk\n"));
        assert!(text.ends_with("💰 Total Usage/Deduction (Tk.): 1157.46 Tk\n"));
        assert_eq!(msg.period, "2024/02");
    }

    #[test]
    fn bangla_message_uses_taka_suffix() {
        let text = format_usage(&full_row(), &identity(), Language::Bn).text;
        assert!(text.starts_with("📉মাসিক ব্যবহার📉"));
        assert!(text.contains("💳 সর্বমোট রিচার্জ: 1500.00 টাকা\n"));
        assert!(text.contains("🪫 ব্যবহৃত বিদ্যুৎ (kWh): 131 kwh\n"));
    }

    #[test]
    fn short_record_degrades_to_placeholders() {
        let short: UsageRecord = ["2024", "03", "800"].into_iter().collect();
        let text = format_usage(&short, &identity(), Language::En).text;
        assert!(text.contains("🗓️ Month: 03\n"));
        assert!(text.contains("💳 Total Recharge (Tk.): 800 Tk\n"));
        assert!(text.contains("🪫 Energy Usage (KWH): N/A kwh\n"));
        assert!(text.contains("🧾 VAT: N/A Tk\n"));
    }

    #[test]
    fn empty_record_still_renders() {
        let msg = format_usage(&UsageRecord::new(Vec::new()), &identity(), Language::En);
        assert!(msg.text.contains("📅 Year: N/A\n"));
        assert_eq!(msg.period, "?/?");
    }

    #[test]
    fn parses_language_aliases() {
        assert_eq!("Bangla".parse::<Language>().expect("bangla"), Language::Bn);
        assert_eq!("en".parse::<Language>().expect("en"), Language::En);
        assert!("fr".parse::<Language>().is_err());
    }
}
