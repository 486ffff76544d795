//! 错误类型
//!
//! 单题错误（`EmptyInput` / `Transport` / `MalformedResponse`）在工作任务边界被转换为
//! `Failed` 结果，永远不会中断调度；前置条件错误（`NoItems` / `NoCredentials` /
//! `InvalidConfig`）在调度开始之前报告。

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 评测引擎错误类型
#[derive(Debug, Error)]
pub enum EvalError {
    /// 题目内容为空，不会调用远程服务
    #[error("题目 {index} 内容为空，跳过 API 调用")]
    EmptyInput { index: usize },

    /// 网络 / HTTP 层失败（非 2xx、连接失败、超时）
    #[error("API 调用失败: {message}")]
    Transport { message: String },

    /// 本地构建请求体失败，请求没有发出
    #[error("构建请求失败: {message}")]
    RequestBuild { message: String },

    /// 响应无法解析为要求的结构
    #[error("AI 返回的内容不是有效的 JSON 格式: {message}")]
    MalformedResponse { message: String },

    /// 结果汇总失败（锁中毒、重复记录等，正常情况下不可达）
    #[error("结果汇总失败: {message}")]
    AggregationFailure { message: String },

    /// 工作任务 panic 或被取消
    #[error("工作任务异常退出: {message}")]
    WorkerPanicked { message: String },

    /// 调度器内部错误
    #[error("调度失败: {message}")]
    Dispatch { message: String },

    /// 题库为空
    #[error("题库为空或加载失败")]
    NoItems,

    /// 没有可用密钥
    #[error("没有可用的 API 密钥")]
    NoCredentials,

    /// 配置非法
    #[error("配置错误: {0}")]
    InvalidConfig(String),

    /// 文件读写失败
    #[error("文件错误 ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON 序列化失败
    #[error("JSON 序列化失败: {0}")]
    Json(#[from] serde_json::Error),
}

/// 失败类别，写入失败日志
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    EmptyInput,
    Transport,
    MalformedResponse,
    Aggregation,
    WorkerPanicked,
    Other,
}

impl FailureKind {
    pub fn name(self) -> &'static str {
        match self {
            FailureKind::EmptyInput => "EmptyInput",
            FailureKind::Transport => "TransportError",
            FailureKind::MalformedResponse => "MalformedResponse",
            FailureKind::Aggregation => "AggregationFailure",
            FailureKind::WorkerPanicked => "WorkerPanicked",
            FailureKind::Other => "Other",
        }
    }
}

// ========== 便捷构造函数 ==========

impl EvalError {
    pub fn transport(message: impl Into<String>) -> Self {
        EvalError::Transport {
            message: message.into(),
        }
    }

    pub fn request_build(message: impl Into<String>) -> Self {
        EvalError::RequestBuild {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        EvalError::MalformedResponse {
            message: message.into(),
        }
    }

    pub fn aggregation(message: impl Into<String>) -> Self {
        EvalError::AggregationFailure {
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        EvalError::Io {
            path: path.into(),
            source,
        }
    }

    /// 该错误在失败日志中的类别
    pub fn kind(&self) -> FailureKind {
        match self {
            EvalError::EmptyInput { .. } => FailureKind::EmptyInput,
            EvalError::Transport { .. } => FailureKind::Transport,
            EvalError::MalformedResponse { .. } => FailureKind::MalformedResponse,
            EvalError::AggregationFailure { .. } => FailureKind::Aggregation,
            EvalError::WorkerPanicked { .. } => FailureKind::WorkerPanicked,
            _ => FailureKind::Other,
        }
    }
}

/// 评测引擎结果类型
pub type Result<T> = std::result::Result<T, EvalError>;
