//! HTTP client for the Master Pagamentos backend

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::types::{
    GatewayError, NotificationsResponse, SaveConfigRequest, SaveConfigResponse,
    SummaryConfigResponse, SummaryTotalResponse,
};
use super::{NotificationGateway, RemoteSummaryConfig};
use crate::notifications::types::{CompanyId, SummaryFlags, TransactionNotification};

pub const DEFAULT_API_BASE: &str = "https://master.bellinitech.com.br";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpGateway {
    http: Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        let response = self
            .http
            .get(self.endpoint(path))
            .header("Content-Type", "application/json")
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::Status(response.status()));
        }

        let body = response.text().await?;
        tracing::debug!("{} responded: {}", path, body);

        serde_json::from_str(&body).map_err(|e| GatewayError::Malformed(e.to_string()))
    }

    pub async fn try_fetch_transaction_notifications(
        &self,
        company_id: CompanyId,
    ) -> Result<Vec<TransactionNotification>, GatewayError> {
        let response: NotificationsResponse = self
            .get_json("notificacoes.php", &[("companyId", company_id.to_string())])
            .await?;
        response.into_notifications()
    }

    pub async fn try_fetch_summary_total(
        &self,
        company_id: CompanyId,
    ) -> Result<i64, GatewayError> {
        let response: SummaryTotalResponse = self
            .get_json("buscar_resumo.php", &[("company_id", company_id.to_string())])
            .await?;
        response.into_total()
    }

    pub async fn try_fetch_summary_config(
        &self,
        company_id: CompanyId,
    ) -> Result<Option<RemoteSummaryConfig>, GatewayError> {
        let response: SummaryConfigResponse = self
            .get_json("buscar_config.php", &[("company_id", company_id.to_string())])
            .await?;

        if response.status.is_none() {
            return Ok(None);
        }

        let config = response
            .config
            .unwrap_or_default()
            .into_config(company_id)
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;

        Ok(Some(RemoteSummaryConfig {
            id: response.id.unwrap_or(0),
            config,
        }))
    }
}

#[async_trait]
impl NotificationGateway for HttpGateway {
    async fn fetch_transaction_notifications(
        &self,
        company_id: CompanyId,
    ) -> Vec<TransactionNotification> {
        tracing::debug!("Fetching notifications for company {}", company_id);

        match self.try_fetch_transaction_notifications(company_id).await {
            Ok(notifications) => notifications,
            Err(e) => {
                tracing::warn!("Failed to fetch notifications for company {}: {}", company_id, e);
                Vec::new()
            }
        }
    }

    async fn fetch_summary_total(&self, company_id: CompanyId) -> i64 {
        match self.try_fetch_summary_total(company_id).await {
            Ok(total) => total,
            Err(e) => {
                tracing::warn!("Failed to fetch summary total for company {}: {}", company_id, e);
                0
            }
        }
    }

    async fn fetch_summary_config(&self, company_id: CompanyId) -> Option<RemoteSummaryConfig> {
        match self.try_fetch_summary_config(company_id).await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to fetch summary config for company {}: {}", company_id, e);
                None
            }
        }
    }

    async fn save_summary_config(&self, remote: &RemoteSummaryConfig) -> Result<(), GatewayError> {
        let flags = SummaryFlags::from(&remote.config);
        let body = SaveConfigRequest::new(remote.id, remote.config.company_id, &flags);

        let response = self
            .http
            .post(self.endpoint("salvar_config.php"))
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::Status(response.status()));
        }

        let response: SaveConfigResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;

        if !response.success {
            return Err(GatewayError::Unsuccessful(
                response
                    .error
                    .unwrap_or_else(|| "Falha ao salvar configurações".into()),
            ));
        }

        tracing::info!(
            "Saved summary config for company {}: {}",
            remote.config.company_id,
            response.message.as_deref().unwrap_or("ok")
        );
        Ok(())
    }
}
