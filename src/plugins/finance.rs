//! Finance dashboard: live quotes and the dragon-tiger board.

use crate::host::AppContext;
use crate::plugin::descriptor::{Component, HookResult, InstallHook, RouteContribution};
use crate::plugin::validation::{CandidateMeta, PluginCandidate};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Setting key holding the index watchlist.
pub const WATCHLIST_KEY: &str = "finance.watchlist";

/// A market index shown on the dashboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketIndex {
    pub code: String,
    pub name: String,
}

impl MarketIndex {
    fn new(code: &str, name: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
        }
    }
}

/// Indices watched when the host has none configured.
pub fn default_watchlist() -> Vec<MarketIndex> {
    vec![
        MarketIndex::new("sh000001", "上证指数"),
        MarketIndex::new("sz399001", "深证成指"),
        MarketIndex::new("sz399006", "创业板指"),
    ]
}

/// Seeds the index watchlist unless the host already set one.
pub struct SeedWatchlist;

#[async_trait]
impl InstallHook for SeedWatchlist {
    async fn install(&self, ctx: &mut AppContext) -> HookResult {
        if ctx.get_setting::<Vec<MarketIndex>>(WATCHLIST_KEY).is_some() {
            return Ok(());
        }
        let watchlist = serde_json::to_value(default_watchlist()).map_err(|e| e.to_string())?;
        ctx.set_setting(WATCHLIST_KEY, watchlist);
        Ok(())
    }
}

/// Finance plugin candidate.
pub fn candidate() -> PluginCandidate {
    let meta = CandidateMeta::new("finance", "金融", "1.0.0")
        .with_author("Sloan")
        .with_description("实时股票行情和龙虎榜数据")
        .with_icon("💰");

    PluginCandidate::new(meta)
        .with_config(json!({
            "enabled": true,
            "autoLoad": true
        }))
        .with_renderable(Component::shared("FinancePlugin"))
        .with_route(RouteContribution::new("/finance", "finance", "FinancePlugin"))
        .with_install(Arc::new(SeedWatchlist))
}

crate::plugin_module!("finance", 10, candidate);
