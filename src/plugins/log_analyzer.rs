//! PM:INFO log analyzer.

use crate::plugin::descriptor::{Component, RouteContribution};
use crate::plugin::validation::{CandidateMeta, PluginCandidate};
use serde_json::json;

/// Log analyzer plugin candidate.
pub fn candidate() -> PluginCandidate {
    let meta = CandidateMeta::new("log-analyzer", "PM:INFO 日志分析", "2.0.0")
        .with_author("sloan")
        .with_description("分析 PM:INFO 日志文件，生成可视化图表和统计数据")
        .with_icon("📊");

    PluginCandidate::new(meta)
        .with_config(json!({ "enabled": true }))
        .with_renderable(Component::shared("LogAnalyzer"))
        .with_route(RouteContribution::new("/log-analyzer", "log-analyzer", "LogAnalyzer"))
}

crate::plugin_module!("log-analyzer", 30, candidate);
