//! 日志工具模块
//!
//! 提供日志初始化、格式化和输出的辅助函数

use chrono::{DateTime, Local};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// 报告 / 记录中的时间格式
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// 输出文件名中的时间戳格式
pub const FILE_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// 初始化 tracing 日志
///
/// 日志级别由 `RUST_LOG` 控制，默认 `info`。重复调用不会报错。
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

pub fn format_time(time: &DateTime<Local>) -> String {
    time.format(TIME_FORMAT).to_string()
}

pub fn file_stamp(time: &DateTime<Local>) -> String {
    time.format(FILE_STAMP_FORMAT).to_string()
}

/// 格式化时长为 `H小时M分钟S秒`
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{}小时{}分钟{}秒", hours, minutes, seconds)
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（字符数）
///
/// # 返回
/// 返回截断后的文本，超长时追加 `...`
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - AI 题库批量评测");
    info!("[配置] 运行模式: {}", config.mode);
    info!("[配置] 题库文件: {}", config.items_file.display());
    info!("[配置] 输出目录: {}", config.output_dir.display());
    info!("[配置] 失败记录目录: {}", config.fail_dir.display());
    info!("[配置] 模型: {} @ {}", config.model_name, config.api_base_url);
    info!("[配置] 最大并发数: {}", config.max_workers);
    info!("{}", "=".repeat(60));
}

/// 记录调度规模
///
/// # 参数
/// - `items`: 题目总数
/// - `credentials`: 可用密钥数
/// - `max_workers`: 请求的并发数
/// - `workers`: 实际并发数
pub fn log_dispatch_plan(items: usize, credentials: usize, max_workers: usize, workers: usize) {
    info!("✓ 找到 {} 道题目, {} 个API密钥", items, credentials);
    info!(
        "📋 将使用 {} 个并发任务 (请求的并发数: {})",
        workers, max_workers
    );
}
