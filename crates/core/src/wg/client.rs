//! Vendor API client: regional routing, retry with backoff, rate limit

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::types::*;
use crate::error::{Error, Result};
use crate::refdata::{AccountId, TankId};

const MAX_RETRIES: u32 = 3;
const RETRY_SLEEP: Duration = Duration::from_secs(2);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Vendor allowance: requests per second, also used as the burst size.
const RATE_LIMIT: f64 = 10.0;

/// Token bucket over `tokio::time`. One token per request; refills at
/// `RATE_LIMIT` tokens per second up to the burst size.
struct TokenBucket {
    state: Mutex<BucketState>,
    rate: f64,
    burst: f64,
}

struct BucketState {
    tokens: f64,
    refilled: Instant,
}

impl TokenBucket {
    fn new(rate: f64) -> Self {
        Self {
            state: Mutex::new(BucketState {
                tokens: rate,
                refilled: Instant::now(),
            }),
            rate,
            burst: rate,
        }
    }

    async fn acquire(&self) {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let elapsed = now.duration_since(state.refilled).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate).min(self.burst);
        state.refilled = now;

        if state.tokens < 1.0 {
            let deficit = (1.0 - state.tokens) / self.rate;
            // Hold the lock while waiting so callers queue in order.
            tokio::time::sleep(Duration::from_secs_f64(deficit)).await;
            state.tokens = 1.0;
            state.refilled = Instant::now();
        }
        state.tokens -= 1.0;
    }
}

/// Expected payload shape per endpoint, checked before deserialising.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    PlayerStats,
    TankStats,
    Tankopedia,
    AccountList,
    ClanInfo,
}

impl ResponseShape {
    /// Predicate over the `data` payload of an `"ok"` envelope.
    fn check(&self, data: &Value) -> bool {
        match self {
            // data: { "<account_id>": { "statistics": {...} } | null }
            ResponseShape::PlayerStats => data
                .as_object()
                .is_some_and(|m| m.values().all(|v| v.is_null() || v.is_object())),
            // data: { "<account_id>": [ {tank_id, all}, ... ] | null }
            ResponseShape::TankStats => data
                .as_object()
                .is_some_and(|m| m.values().all(|v| v.is_null() || v.is_array())),
            // data: { "<tank_id>": { ... } }
            ResponseShape::Tankopedia => data
                .as_object()
                .is_some_and(|m| m.values().all(Value::is_object)),
            // data: [ {nickname, account_id}, ... ]
            ResponseShape::AccountList => data.is_array(),
            // data: { "<account_id>": { ... } | null }
            ResponseShape::ClanInfo => data.is_object(),
        }
    }
}

/// HTTP client for the vendor stats API.
pub struct VendorClient {
    client: Client,
    app_id: String,
    limiter: TokenBucket,
}

impl VendorClient {
    pub fn new(app_id: String) -> Result<Self> {
        if app_id.is_empty() {
            return Err(Error::Config(
                "vendor application id is not set (WG_APP_ID)".to_string(),
            ));
        }
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            app_id,
            limiter: TokenBucket::new(RATE_LIMIT),
        })
    }

    fn region_for(account_id: AccountId) -> Result<Region> {
        Region::from_account_id(account_id)
            .ok_or_else(|| Error::Vendor(format!("account id {} outside known regions", account_id)))
    }

    /// GET with retry and fixed backoff. Transport errors, `"error"`
    /// envelopes, and shape-check failures all count as a failed
    /// attempt; after `MAX_RETRIES` the result is `None` so the caller
    /// can tombstone the key.
    async fn get_with_retry(
        &self,
        url: &str,
        query: &[(&str, String)],
        shape: ResponseShape,
    ) -> Option<Value> {
        for attempt in 1..=MAX_RETRIES {
            self.limiter.acquire().await;

            let outcome = self
                .client
                .get(url)
                .query(&[("application_id", self.app_id.as_str())])
                .query(query)
                .send()
                .await;

            match outcome {
                Ok(response) => match response.json::<ApiEnvelope>().await {
                    Ok(envelope) if envelope.status == "ok" => {
                        if let Some(data) = envelope.data {
                            if shape.check(&data) {
                                return Some(data);
                            }
                            warn!(url, ?shape, "response failed shape check");
                        } else {
                            warn!(url, "ok response without data");
                        }
                    }
                    Ok(envelope) => {
                        let message = envelope
                            .error
                            .map(|e| format!("{} ({})", e.message, e.code))
                            .unwrap_or_else(|| envelope.status.clone());
                        warn!(url, attempt, error = %message, "vendor API error");
                    }
                    Err(e) => warn!(url, attempt, error = %e, "vendor response not JSON"),
                },
                Err(e) => warn!(url, attempt, error = %e, "vendor request failed"),
            }

            if attempt < MAX_RETRIES {
                tokio::time::sleep(RETRY_SLEEP).await;
            }
        }
        None
    }

    /// Resolve a nickname to an account id on the given regional server.
    pub async fn account_id_by_nick(
        &self,
        nickname: &str,
        region: Region,
    ) -> Result<Option<AccountId>> {
        let url = format!("{}/account/list/", region.base_url());
        let query = [
            ("search", nickname.to_string()),
            ("type", "exact".to_string()),
        ];
        let Some(data) = self
            .get_with_retry(&url, &query, ResponseShape::AccountList)
            .await
        else {
            return Ok(None);
        };

        let entries: Vec<AccountListEntry> = serde_json::from_value(data)?;
        Ok(entries
            .into_iter()
            .find(|e| e.nickname.eq_ignore_ascii_case(nickname))
            .map(|e| e.account_id))
    }

    /// Overall career stats for one player. `None` covers both "no
    /// such player" and exhausted retries.
    pub async fn player_stats(&self, account_id: AccountId) -> Result<Option<PlayerStats>> {
        let region = Self::region_for(account_id)?;
        let url = format!("{}/account/info/", region.base_url());
        let query = [
            ("account_id", account_id.to_string()),
            ("fields", "nickname,statistics.all".to_string()),
        ];
        let Some(data) = self
            .get_with_retry(&url, &query, ResponseShape::PlayerStats)
            .await
        else {
            return Ok(None);
        };

        let info = data.get(account_id.to_string().as_str()).cloned();
        match info {
            Some(Value::Null) | None => Ok(None),
            Some(value) => {
                let info: AccountInfo = serde_json::from_value(value)?;
                debug!(account_id, "fetched player stats");
                Ok(info.statistics.map(|s| s.all))
            }
        }
    }

    /// Per-tank career stats for one player, restricted to `tank_ids`.
    pub async fn tank_stats(
        &self,
        account_id: AccountId,
        tank_ids: &[TankId],
    ) -> Result<Option<Vec<TankStatsEntry>>> {
        let region = Self::region_for(account_id)?;
        let url = format!("{}/tanks/stats/", region.base_url());
        let ids = tank_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let query = [
            ("account_id", account_id.to_string()),
            ("tank_id", ids),
            ("fields", "tank_id,all.battles,all.wins,all.damage_dealt".to_string()),
        ];
        let Some(data) = self
            .get_with_retry(&url, &query, ResponseShape::TankStats)
            .await
        else {
            return Ok(None);
        };

        let list = data.get(account_id.to_string().as_str()).cloned();
        match list {
            Some(Value::Null) | None => Ok(None),
            Some(value) => {
                let entries: Vec<TankStatsEntry> = serde_json::from_value(value)?;
                debug!(account_id, tanks = entries.len(), "fetched tank stats");
                Ok(Some(entries))
            }
        }
    }

    /// Clan membership for one player; `None` when clanless or the
    /// lookup failed.
    pub async fn clan_info(&self, account_id: AccountId) -> Result<Option<ClanAccountInfo>> {
        let region = Self::region_for(account_id)?;
        let url = format!("{}/clans/accountinfo/", region.base_url());
        let query = [("account_id", account_id.to_string())];
        let Some(data) = self
            .get_with_retry(&url, &query, ResponseShape::ClanInfo)
            .await
        else {
            return Ok(None);
        };

        let info = data.get(account_id.to_string().as_str()).cloned();
        match info {
            Some(Value::Null) | None => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_shape_player_stats() {
        let good = json!({"100": {"statistics": {"all": {"battles": 1}}}});
        let absent = json!({"100": null});
        let bad = json!([1, 2, 3]);
        assert!(ResponseShape::PlayerStats.check(&good));
        assert!(ResponseShape::PlayerStats.check(&absent));
        assert!(!ResponseShape::PlayerStats.check(&bad));
    }

    #[test]
    fn test_shape_tank_stats() {
        let good = json!({"100": [{"tank_id": 1, "all": {"battles": 2}}]});
        let absent = json!({"100": null});
        let bad = json!({"100": {"tank_id": 1}});
        assert!(ResponseShape::TankStats.check(&good));
        assert!(ResponseShape::TankStats.check(&absent));
        assert!(!ResponseShape::TankStats.check(&bad));
    }

    #[test]
    fn test_shape_account_list() {
        assert!(ResponseShape::AccountList.check(&json!([])));
        assert!(!ResponseShape::AccountList.check(&json!({})));
    }

    #[test]
    fn test_empty_app_id_rejected() {
        assert!(VendorClient::new(String::new()).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_bucket_allows_burst() {
        let bucket = TokenBucket::new(10.0);
        let before = Instant::now();
        for _ in 0..10 {
            bucket.acquire().await;
        }
        // A full burst must not wait.
        assert_eq!(Instant::now(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_bucket_throttles_after_burst() {
        let bucket = TokenBucket::new(10.0);
        for _ in 0..10 {
            bucket.acquire().await;
        }
        let before = Instant::now();
        bucket.acquire().await;
        let waited = Instant::now().duration_since(before);
        assert!(waited >= Duration::from_millis(99), "waited {:?}", waited);
    }
}
