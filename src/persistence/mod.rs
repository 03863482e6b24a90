use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use tokio::time::{timeout, Duration};

use crate::error::{EngineError, Result};

/// Durable per-market scalar: the band deviation recorded when a position was
/// entered. Read once and written at most once per cycle, so plain
/// read-modify-write needs no locking.
#[async_trait]
pub trait ScalarStore: Send + Sync {
    async fn load_scalar(&self, market: &str) -> Result<Option<f64>>;
    async fn save_scalar(&self, market: &str, value: f64) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct ScalarRecord {
    value: f64,
    recorded_at: DateTime<Utc>,
}

/// Redis-backed scalar store behind one long-lived connection manager; no
/// per-call connection churn.
pub struct RedisScalarStore {
    conn: ConnectionManager,
}

impl RedisScalarStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;

        let conn = timeout(Duration::from_secs(5), ConnectionManager::new(client))
            .await
            .map_err(|_| {
                EngineError::DataUnavailable("redis connection timeout after 5 seconds".into())
            })??;

        tracing::info!("connected to redis at {}", redis_url);

        Ok(Self { conn })
    }

    fn key(market: &str) -> String {
        format!("target_sigma:{market}")
    }
}

#[async_trait]
impl ScalarStore for RedisScalarStore {
    async fn load_scalar(&self, market: &str) -> Result<Option<f64>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(Self::key(market)).await?;

        match raw {
            Some(json) => {
                let record: ScalarRecord = serde_json::from_str(&json).map_err(|e| {
                    EngineError::DataUnavailable(format!(
                        "corrupt scalar record for {market}: {e}"
                    ))
                })?;
                Ok(Some(record.value))
            }
            None => Ok(None),
        }
    }

    async fn save_scalar(&self, market: &str, value: f64) -> Result<()> {
        let record = ScalarRecord {
            value,
            recorded_at: Utc::now(),
        };
        let json = serde_json::to_string(&record)
            .map_err(|e| EngineError::DataUnavailable(e.to_string()))?;

        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(Self::key(market), json).await?;
        tracing::debug!(market = %market, value, "scalar recorded");
        Ok(())
    }
}
