use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Text reported by the portal adapters when the page carries no identity.
pub const IDENTITY_NOT_FOUND: &str = "Not Found";

/// One billing period as published by the portal, kept as the raw cell text.
///
/// Equality is positional over every field. Meaning is only attached to the
/// cells through [`UsageField`] when a notification is rendered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageRecord(Vec<String>);

impl UsageRecord {
    pub fn new(fields: Vec<String>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: UsageField) -> Option<&str> {
        self.0.get(field.index()).map(String::as_str)
    }

    /// `year/month` label used in logs; falls back to `?` for short rows.
    pub fn period_label(&self) -> String {
        format!(
            "{}/{}",
            self.get(UsageField::Year).unwrap_or("?"),
            self.get(UsageField::Month).unwrap_or("?")
        )
    }
}

impl<S: Into<String>> FromIterator<S> for UsageRecord {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<String>> for UsageRecord {
    fn from(value: Vec<String>) -> Self {
        Self(value)
    }
}

/// Positional columns of the monthly consumption table.
///
/// Columns 7 and 8 are provider specific and never rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsageField {
    Year,
    Month,
    TotalRecharge,
    Rebate,
    EnergyCost,
    MeterRent,
    DemandCharge,
    Vat,
    TotalDeduction,
    MonthEndBalance,
    EnergyKwh,
}

impl UsageField {
    pub const ALL: [UsageField; 11] = [
        Self::Year,
        Self::Month,
        Self::TotalRecharge,
        Self::Rebate,
        Self::EnergyCost,
        Self::MeterRent,
        Self::DemandCharge,
        Self::Vat,
        Self::TotalDeduction,
        Self::MonthEndBalance,
        Self::EnergyKwh,
    ];

    pub fn index(self) -> usize {
        match self {
            Self::Year => 0,
            Self::Month => 1,
            Self::TotalRecharge => 2,
            Self::Rebate => 3,
            Self::EnergyCost => 4,
            Self::MeterRent => 5,
            Self::DemandCharge => 6,
            Self::Vat => 9,
            Self::TotalDeduction => 10,
            Self::MonthEndBalance => 11,
            Self::EnergyKwh => 12,
        }
    }
}

impl Display for UsageField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Year => "year",
            Self::Month => "month",
            Self::TotalRecharge => "total_recharge",
            Self::Rebate => "rebate",
            Self::EnergyCost => "energy_cost",
            Self::MeterRent => "meter_rent",
            Self::DemandCharge => "demand_charge",
            Self::Vat => "vat",
            Self::TotalDeduction => "total_deduction",
            Self::MonthEndBalance => "month_end_balance",
            Self::EnergyKwh => "energy_kwh",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerIdentity {
    pub name: String,
    pub consumer_number: String,
}

impl CustomerIdentity {
    pub fn new(name: impl Into<String>, consumer_number: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            consumer_number: consumer_number.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::new(IDENTITY_NOT_FOUND, IDENTITY_NOT_FOUND)
    }
}

/// Everything one extraction pass yields, in page order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedUsage {
    pub customer_name: String,
    pub consumer_number: String,
    pub rows: Vec<UsageRecord>,
}

impl ExtractedUsage {
    pub fn identity(&self) -> CustomerIdentity {
        CustomerIdentity::new(self.customer_name.clone(), self.consumer_number.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::{UsageField, UsageRecord};

    #[test]
    fn equality_is_positional() {
        let a: UsageRecord = ["2024", "01", "500"].into_iter().collect();
        let b: UsageRecord = ["2024", "01", "500"].into_iter().collect();
        let swapped: UsageRecord = ["01", "2024", "500"].into_iter().collect();
        assert_eq!(a, b);
        assert_ne!(a, swapped);
    }

    #[test]
    fn field_lookup_respects_record_length() {
        let record: UsageRecord = ["2024", "03"].into_iter().collect();
        assert_eq!(record.get(UsageField::Month), Some("03"));
        assert_eq!(record.get(UsageField::EnergyKwh), None);
        assert_eq!(record.period_label(), "2024/03");
    }

    #[test]
    fn serializes_as_plain_array() {
        let record: UsageRecord = ["2024", "01"].into_iter().collect();
        let json = serde_json::to_string(&record).expect("serialize record");
        assert_eq!(json, r#"["2024","01"]"#);
    }
}
