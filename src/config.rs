use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

use crate::error::{EvalError, Result};
use crate::models::Mode;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 运行模式
    pub mode: Mode,
    /// 题库文件（JSON 或 TOML）
    pub items_file: PathBuf,
    /// 密钥文件
    pub keys_file: PathBuf,
    /// 结果输出目录
    pub output_dir: PathBuf,
    /// 失败题目记录目录
    pub fail_dir: PathBuf,
    /// 最大并发数
    pub max_workers: usize,
    // --- LLM 配置 ---
    pub api_base_url: String,
    pub model_name: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
    // --- 进度显示 ---
    pub show_progress: bool,
    pub progress_interval_secs: u64,
    /// 密钥空闲多久后显示为"空闲"
    pub status_idle_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let items_file = PathBuf::from("questions.json");
        let mode = Mode::default();
        let output_dir = default_output_dir(&items_file, mode);
        Self {
            mode,
            keys_file: PathBuf::from("keys.md"),
            fail_dir: output_dir.join("fail_questions"),
            output_dir,
            items_file,
            max_workers: 100,
            api_base_url: "https://api.siliconflow.cn/v1".to_string(),
            model_name: "deepseek-ai/DeepSeek-V3".to_string(),
            max_tokens: 1000,
            temperature: 0.1,
            top_p: 0.9,
            request_timeout_secs: 120,
            show_progress: true,
            progress_interval_secs: 2,
            status_idle_secs: 5,
        }
    }
}

/// 默认输出目录：题库文件所在目录下按模式命名
fn default_output_dir(items_file: &Path, mode: Mode) -> PathBuf {
    let parent = items_file.parent().unwrap_or_else(|| Path::new("."));
    match mode {
        Mode::Evaluate => parent.join("ai_answers"),
        Mode::Filter => parent.join("classification_results"),
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|raw| parse_env_value(name, &raw))
}

/// 解析环境变量的值，设置了但无法解析时告警并回退默认值
fn parse_env_value<T: std::str::FromStr>(name: &str, raw: &str) -> Option<T> {
    let parsed = raw.trim().parse().ok();
    if parsed.is_none() {
        warn!("⚠️  环境变量 {}={:?} 无法解析，使用默认值", name, raw);
    }
    parsed
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        let mode = env_parse("EVAL_MODE").unwrap_or(default.mode);
        let items_file = std::env::var("EVAL_ITEMS_FILE")
            .map(PathBuf::from)
            .unwrap_or(default.items_file);
        let output_dir = std::env::var("EVAL_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_output_dir(&items_file, mode));
        let fail_dir = std::env::var("EVAL_FAIL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| output_dir.join("fail_questions"));

        Self {
            mode,
            items_file,
            keys_file: std::env::var("EVAL_KEYS_FILE").map(PathBuf::from).unwrap_or(default.keys_file),
            output_dir,
            fail_dir,
            max_workers: env_parse("MAX_WORKERS").unwrap_or(default.max_workers),
            api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.api_base_url),
            model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.model_name),
            max_tokens: env_parse("LLM_MAX_TOKENS").unwrap_or(default.max_tokens),
            temperature: env_parse("LLM_TEMPERATURE").unwrap_or(default.temperature),
            top_p: env_parse("LLM_TOP_P").unwrap_or(default.top_p),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS").unwrap_or(default.request_timeout_secs),
            show_progress: env_parse("SHOW_PROGRESS").unwrap_or(default.show_progress),
            progress_interval_secs: env_parse("PROGRESS_INTERVAL_SECS").unwrap_or(default.progress_interval_secs),
            status_idle_secs: env_parse("STATUS_IDLE_SECS").unwrap_or(default.status_idle_secs),
        }
    }

    /// 校验配置，调度开始前调用
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(EvalError::InvalidConfig("并发数量必须大于0".into()));
        }
        if self.api_base_url.trim().is_empty() {
            return Err(EvalError::InvalidConfig("API 地址不能为空".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(EvalError::InvalidConfig("请求超时必须大于0".into()));
        }
        if self.show_progress && self.progress_interval_secs == 0 {
            return Err(EvalError::InvalidConfig("进度刷新间隔必须大于0".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }

    pub fn status_idle_after(&self) -> Duration {
        Duration::from_secs(self.status_idle_secs)
    }
}
