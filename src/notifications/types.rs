//! Domain types shared by the notification subsystem.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::templates::TemplateError;

/// Backend identifier of a merchant company.
pub type CompanyId = i64;

/// Lifecycle stage of a transaction, derived from the backend's payment status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionKind {
    /// A sale was created and is waiting for payment.
    SaleGenerated,
    /// The payment for a sale was confirmed.
    PaymentConfirmed,
    /// Any other status; the raw backend value is kept for display.
    Other(String),
}

impl TransactionKind {
    pub fn from_status(status: &str) -> Self {
        match status {
            "waiting_payment" => Self::SaleGenerated,
            "paid" => Self::PaymentConfirmed,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentMethod {
    Pix,
    CreditCard,
}

impl PaymentMethod {
    pub fn from_wire(method: &str) -> Self {
        if method.eq_ignore_ascii_case("pix") {
            Self::Pix
        } else {
            Self::CreditCard
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pix => "PIX",
            Self::CreditCard => "Cartão de Crédito",
        }
    }
}

/// A transaction alert record as returned by the notifications feed.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionNotification {
    pub id: i64,
    pub company_id: CompanyId,
    pub kind: TransactionKind,
    pub amount_minor_units: i64,
    pub payment_method: PaymentMethod,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Fixed hours at which revenue summaries can be announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum SummaryHour {
    Morning,
    Noon,
    Evening,
    Night,
}

impl SummaryHour {
    pub const ALL: [SummaryHour; 4] = [Self::Morning, Self::Noon, Self::Evening, Self::Night];

    pub fn hour(self) -> u32 {
        match self {
            Self::Morning => 8,
            Self::Noon => 12,
            Self::Evening => 18,
            Self::Night => 23,
        }
    }
}

impl TryFrom<u32> for SummaryHour {
    type Error = TemplateError;

    fn try_from(hour: u32) -> Result<Self, Self::Error> {
        match hour {
            8 => Ok(Self::Morning),
            12 => Ok(Self::Noon),
            18 => Ok(Self::Evening),
            23 => Ok(Self::Night),
            _ => Err(TemplateError::InvalidHour(hour)),
        }
    }
}

impl From<SummaryHour> for u32 {
    fn from(hour: SummaryHour) -> Self {
        hour.hour()
    }
}

impl fmt::Display for SummaryHour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}h", self.hour())
    }
}

/// Tone of the summary messages ("modelo" in the backend).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SummaryStyle {
    #[default]
    Creative,
    Casual,
    Formal,
}

impl SummaryStyle {
    pub fn id(self) -> u8 {
        match self {
            Self::Creative => 1,
            Self::Casual => 2,
            Self::Formal => 3,
        }
    }
}

impl TryFrom<u8> for SummaryStyle {
    type Error = TemplateError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        match id {
            1 => Ok(Self::Creative),
            2 => Ok(Self::Casual),
            3 => Ok(Self::Formal),
            _ => Err(TemplateError::InvalidStyle(id)),
        }
    }
}

impl From<SummaryStyle> for u8 {
    fn from(style: SummaryStyle) -> Self {
        style.id()
    }
}

/// Which summary hours are enabled for a company, and in which tone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryScheduleConfig {
    pub company_id: CompanyId,
    pub enabled_hours: BTreeSet<SummaryHour>,
    pub style: SummaryStyle,
}

impl SummaryScheduleConfig {
    /// Everything off, creative tone.
    pub fn disabled(company_id: CompanyId) -> Self {
        Self {
            company_id,
            enabled_hours: BTreeSet::new(),
            style: SummaryStyle::default(),
        }
    }

    pub fn is_enabled(&self, hour: SummaryHour) -> bool {
        self.enabled_hours.contains(&hour)
    }
}

/// Summary settings in the backend's shape (`resumo_8`, ..., `modelo`).
///
/// Flags arrive either as booleans or as 0/1 integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryFlags {
    #[serde(default, deserialize_with = "flexible_bool")]
    pub resumo_8: bool,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub resumo_12: bool,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub resumo_18: bool,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub resumo_23: bool,
    #[serde(default = "default_modelo")]
    pub modelo: u8,
}

fn default_modelo() -> u8 {
    1
}

impl Default for SummaryFlags {
    fn default() -> Self {
        Self {
            resumo_8: false,
            resumo_12: false,
            resumo_18: false,
            resumo_23: false,
            modelo: default_modelo(),
        }
    }
}

impl SummaryFlags {
    pub fn into_config(
        self,
        company_id: CompanyId,
    ) -> Result<SummaryScheduleConfig, TemplateError> {
        let style = SummaryStyle::try_from(self.modelo)?;
        let enabled_hours = [
            (SummaryHour::Morning, self.resumo_8),
            (SummaryHour::Noon, self.resumo_12),
            (SummaryHour::Evening, self.resumo_18),
            (SummaryHour::Night, self.resumo_23),
        ]
        .into_iter()
        .filter_map(|(hour, enabled)| enabled.then_some(hour))
        .collect();

        Ok(SummaryScheduleConfig {
            company_id,
            enabled_hours,
            style,
        })
    }
}

impl From<&SummaryScheduleConfig> for SummaryFlags {
    fn from(config: &SummaryScheduleConfig) -> Self {
        Self {
            resumo_8: config.is_enabled(SummaryHour::Morning),
            resumo_12: config.is_enabled(SummaryHour::Noon),
            resumo_18: config.is_enabled(SummaryHour::Evening),
            resumo_23: config.is_enabled(SummaryHour::Night),
            modelo: config.style.id(),
        }
    }
}

/// Accepts `true`/`false`, `0`/`1` and `"0"`/`"1"`.
pub(crate) fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => Ok(value),
        Flag::Int(value) => Ok(value != 0),
        Flag::Text(value) => Ok(matches!(value.as_str(), "1" | "true")),
    }
}

/// Parses backend timestamps: RFC 3339, or a naive `YYYY-MM-DD HH:MM:SS` in local time.
pub fn parse_backend_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}
