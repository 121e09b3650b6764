use chrono::{DateTime, Utc};
use kxian_core::common::Symbol;
use kxian_core::common::time::TimeProvider;
use kxian_core::market::error::MarketError;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

struct Snapshot {
    loaded_at: DateTime<Utc>,
    listings: Arc<HashMap<Symbol, Symbol>>,
}

/// # Summary
/// 证券目录：数据源上市标的的定期快照，用于在抓取前识别未上市代码。
///
/// # Invariants
/// - 同一时刻最多一个加载在进行，并发的查询等待同一次加载。
/// - 快照过期后重新加载；加载失败时继续使用过期快照，没有快照时返回错误。
/// - 空目录表示数据源不提供目录，所有格式合法的代码都放行。
pub struct SymbolDirectory {
    ttl: Duration,
    clock: Arc<dyn TimeProvider>,
    state: Mutex<Option<Snapshot>>,
}

impl SymbolDirectory {
    pub fn new(ttl: Duration, clock: Arc<dyn TimeProvider>) -> Self {
        Self {
            ttl,
            clock,
            state: Mutex::new(None),
        }
    }

    /// # Summary
    /// 在目录中查找标的。
    ///
    /// # Logic
    /// 1. 取得有效快照，必要时调用 `load` 重新加载。
    /// 2. 目录为空时原样返回标的。
    /// 3. 否则返回目录中的标的（带名称），找不到返回 `InvalidSymbol`。
    ///
    /// # Arguments
    /// * `symbol`: 已规范化的标的。
    /// * `load`: 从数据源加载完整目录。
    pub async fn resolve<F, Fut>(&self, symbol: &Symbol, load: F) -> Result<Symbol, MarketError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Symbol>, MarketError>>,
    {
        let listings = self.listings(load).await?;
        if listings.is_empty() {
            return Ok(symbol.clone());
        }
        listings.get(symbol).cloned().ok_or_else(|| {
            MarketError::InvalidSymbol(format!("{} is not listed", symbol.canonical()))
        })
    }

    fn is_fresh(&self, snapshot: &Snapshot, now: DateTime<Utc>) -> bool {
        match now.signed_duration_since(snapshot.loaded_at).to_std() {
            Ok(age) => age < self.ttl,
            // 时钟回拨
            Err(_) => true,
        }
    }

    async fn listings<F, Fut>(&self, load: F) -> Result<Arc<HashMap<Symbol, Symbol>>, MarketError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Symbol>, MarketError>>,
    {
        let mut state = self.state.lock().await;
        let now = self.clock.now();
        if let Some(snapshot) = state.as_ref().filter(|s| self.is_fresh(s, now)) {
            return Ok(snapshot.listings.clone());
        }

        match load().await {
            Ok(symbols) => {
                let listings: HashMap<Symbol, Symbol> =
                    symbols.into_iter().map(|s| (s.clone(), s)).collect();
                info!(count = listings.len(), "Symbol directory loaded");
                let listings = Arc::new(listings);
                *state = Some(Snapshot {
                    loaded_at: now,
                    listings: listings.clone(),
                });
                Ok(listings)
            }
            Err(error) => match state.as_ref() {
                Some(stale) => {
                    warn!(
                        loaded_at = %stale.loaded_at,
                        "Directory reload failed, using stale snapshot: {}", error
                    );
                    Ok(stale.listings.clone())
                }
                None => Err(error),
            },
        }
    }
}
