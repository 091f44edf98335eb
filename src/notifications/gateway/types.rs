//! Backend wire types and gateway errors

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::notifications::types::{
    flexible_bool, parse_backend_timestamp, CompanyId, PaymentMethod, SummaryFlags,
    TransactionKind, TransactionNotification,
};

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {0}")]
    Status(reqwest::StatusCode),

    #[error("API error: {0}")]
    Unsuccessful(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// One record of `notificacoes.php`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TransactionRecord {
    pub id: i64,
    pub company_id: CompanyId,
    #[serde(deserialize_with = "flexible_amount")]
    pub valor: i64,
    pub status_pagamento: String,
    #[serde(default)]
    pub metodo_pagamento: String,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub lida: bool,
    pub criada_em: String,
}

/// Centavos, as a JSON number or a numeric string.
fn flexible_amount<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Amount {
        Int(i64),
        Float(f64),
        Text(String),
    }

    match Amount::deserialize(deserializer)? {
        Amount::Int(value) => Ok(value),
        Amount::Float(value) => Ok(value.round() as i64),
        Amount::Text(value) => value
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("valor {:?} is not a number", value))),
    }
}

impl TryFrom<TransactionRecord> for TransactionNotification {
    type Error = GatewayError;

    fn try_from(record: TransactionRecord) -> Result<Self, Self::Error> {
        let created_at = parse_backend_timestamp(&record.criada_em).ok_or_else(|| {
            GatewayError::Malformed(format!(
                "notification {} has invalid criada_em {:?}",
                record.id, record.criada_em
            ))
        })?;

        Ok(Self {
            id: record.id,
            company_id: record.company_id,
            kind: TransactionKind::from_status(&record.status_pagamento),
            amount_minor_units: record.valor,
            payment_method: PaymentMethod::from_wire(&record.metodo_pagamento),
            read: record.lida,
            created_at,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct NotificationsResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl NotificationsResponse {
    /// Records that cannot be read are logged and skipped; the rest are kept.
    pub fn into_notifications(self) -> Result<Vec<TransactionNotification>, GatewayError> {
        if !self.success {
            return Err(GatewayError::Unsuccessful(
                self.error.unwrap_or_else(|| "success: false".into()),
            ));
        }

        let notifications = self
            .data
            .unwrap_or_default()
            .into_iter()
            .filter_map(|raw| match parse_record(raw) {
                Ok(notification) => Some(notification),
                Err(e) => {
                    tracing::warn!("Skipping unreadable notification record: {}", e);
                    None
                }
            })
            .collect();

        Ok(notifications)
    }
}

fn parse_record(raw: serde_json::Value) -> Result<TransactionNotification, GatewayError> {
    let record: TransactionRecord =
        serde_json::from_value(raw).map_err(|e| GatewayError::Malformed(e.to_string()))?;
    TransactionNotification::try_from(record)
}

#[derive(Debug, Deserialize)]
pub(crate) struct SummaryTotalResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub total: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl SummaryTotalResponse {
    /// Total in centavos. The backend sometimes sends the number as a string.
    pub fn into_total(self) -> Result<i64, GatewayError> {
        if !self.success {
            return Err(GatewayError::Unsuccessful(
                self.error.unwrap_or_else(|| "success: false".into()),
            ));
        }

        match self.total {
            None | Some(serde_json::Value::Null) => Ok(0),
            Some(serde_json::Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.round() as i64))
                .ok_or_else(|| GatewayError::Malformed(format!("total {} out of range", n))),
            Some(serde_json::Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| GatewayError::Malformed(format!("total {:?} is not a number", s))),
            Some(other) => Err(GatewayError::Malformed(format!("unexpected total {}", other))),
        }
    }
}

/// Response of `buscar_config.php`. A missing `status` means no config is stored.
#[derive(Debug, Deserialize)]
pub(crate) struct SummaryConfigResponse {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub status: Option<serde_json::Value>,
    #[serde(default)]
    pub config: Option<SummaryFlags>,
}

/// Body of `salvar_config.php`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct SaveConfigRequest {
    pub id: i64,
    pub company_id: CompanyId,
    pub resumo_8: u8,
    pub resumo_12: u8,
    pub resumo_18: u8,
    pub resumo_23: u8,
    pub modelo: u8,
}

impl SaveConfigRequest {
    pub fn new(id: i64, company_id: CompanyId, flags: &SummaryFlags) -> Self {
        Self {
            id,
            company_id,
            resumo_8: flags.resumo_8.into(),
            resumo_12: flags.resumo_12.into(),
            resumo_18: flags.resumo_18.into(),
            resumo_23: flags.resumo_23.into(),
            modelo: flags.modelo,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SaveConfigResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
