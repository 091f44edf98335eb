//! Typed accessors for the persisted keys.

use chrono::{DateTime, Utc};

use super::{StateStore, StoreError};
use crate::notifications::types::{CompanyId, SummaryScheduleConfig};

const MONITORING_TARGET_KEY: &str = "monitoring_company_id";
const SUMMARY_CONFIG_KEY: &str = "summary_config";

fn watermark_key(company_id: CompanyId) -> String {
    format!("last_checked:{}", company_id)
}

/// Last dedup check for a company; the Unix epoch if it never ran.
pub async fn load_watermark(
    store: &dyn StateStore,
    company_id: CompanyId,
) -> Result<DateTime<Utc>, StoreError> {
    let key = watermark_key(company_id);
    match store.get(&key).await? {
        None => Ok(DateTime::<Utc>::UNIX_EPOCH),
        Some(value) => DateTime::parse_from_rfc3339(&value)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| StoreError::InvalidValue { key, value }),
    }
}

pub async fn save_watermark(
    store: &dyn StateStore,
    company_id: CompanyId,
    checked_at: DateTime<Utc>,
) -> Result<(), StoreError> {
    store
        .set(&watermark_key(company_id), &checked_at.to_rfc3339())
        .await
}

pub async fn load_monitoring_target(
    store: &dyn StateStore,
) -> Result<Option<CompanyId>, StoreError> {
    match store.get(MONITORING_TARGET_KEY).await? {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| StoreError::InvalidValue {
                key: MONITORING_TARGET_KEY.to_string(),
                value,
            }),
    }
}

pub async fn save_monitoring_target(
    store: &dyn StateStore,
    company_id: CompanyId,
) -> Result<(), StoreError> {
    store
        .set(MONITORING_TARGET_KEY, &company_id.to_string())
        .await
}

pub async fn clear_monitoring_target(store: &dyn StateStore) -> Result<(), StoreError> {
    store.remove(MONITORING_TARGET_KEY).await
}

pub async fn load_summary_config(
    store: &dyn StateStore,
) -> Result<Option<SummaryScheduleConfig>, StoreError> {
    match store.get(SUMMARY_CONFIG_KEY).await? {
        None => Ok(None),
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
    }
}

pub async fn save_summary_config(
    store: &dyn StateStore,
    config: &SummaryScheduleConfig,
) -> Result<(), StoreError> {
    let json = serde_json::to_string(config)?;
    store.set(SUMMARY_CONFIG_KEY, &json).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, MemoryStateStore};
    use crate::notifications::types::{SummaryHour, SummaryStyle};
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_watermark_defaults_to_epoch() {
        let store = MemoryStateStore::new();
        assert_eq!(
            load_watermark(&store, 5).await.unwrap(),
            DateTime::<Utc>::UNIX_EPOCH
        );
    }

    #[tokio::test]
    async fn test_watermark_is_per_company() {
        let store = Database::in_memory().await.unwrap();
        let checked_at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();

        save_watermark(&store, 5, checked_at).await.unwrap();

        assert_eq!(load_watermark(&store, 5).await.unwrap(), checked_at);
        assert_eq!(
            load_watermark(&store, 7).await.unwrap(),
            DateTime::<Utc>::UNIX_EPOCH
        );
    }

    #[tokio::test]
    async fn test_corrupt_watermark_is_reported() {
        let store = MemoryStateStore::new();
        store.set("last_checked:5", "garbage").await.unwrap();

        assert!(matches!(
            load_watermark(&store, 5).await,
            Err(StoreError::InvalidValue { .. })
        ));
    }

    #[tokio::test]
    async fn test_monitoring_target_roundtrip() {
        let store = MemoryStateStore::new();
        assert_eq!(load_monitoring_target(&store).await.unwrap(), None);

        save_monitoring_target(&store, 42).await.unwrap();
        assert_eq!(load_monitoring_target(&store).await.unwrap(), Some(42));

        clear_monitoring_target(&store).await.unwrap();
        assert_eq!(load_monitoring_target(&store).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_summary_config_is_persisted_as_json() {
        let store = Database::in_memory().await.unwrap();
        let config = SummaryScheduleConfig {
            company_id: 5,
            enabled_hours: [SummaryHour::Morning, SummaryHour::Night].into_iter().collect(),
            style: SummaryStyle::Formal,
        };

        save_summary_config(&store, &config).await.unwrap();
        assert_eq!(load_summary_config(&store).await.unwrap(), Some(config));
    }
}
