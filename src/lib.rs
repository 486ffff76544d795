//! # Question Eval
//!
//! 使用一组 API 密钥并发调用 AI 补全服务，批量评测题库的 Rust 应用程序
//!
//! 支持两种模式：
//! - 作答评测（evaluate）：让 AI 作答并与标准答案比对，统计准确率
//! - 分类筛选（filter）：判断题目所属的医学影像学方向并分组输出
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 客户端层（Clients）
//! - `clients/` - 远程补全服务，一次调用 = 一次请求/响应
//! - `CompletionService` - 可替换的服务接口
//! - `CompletionClient` - OpenAI 兼容的 HTTP 实现
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个 Item 或一份最终结果
//! - `CredentialPool` - 密钥轮转分配
//! - `Evaluator` - 单题评测和响应解析
//! - `ResultAggregator` - 加锁汇总结果
//! - `ProgressMonitor` - 定时输出进度
//! - `ReportGenerator` / `ArtifactWriter` - 运行结束后的报告和结果文件
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一道题"的完整处理流程
//! - `ItemCtx` - 上下文封装（题号 + 密钥前缀）
//! - `ItemFlow` - 流程编排（标记 → 评测 → 记录）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/dispatcher` - 有界并发调度
//! - `orchestrator/batch_processor` - 应用生命周期
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{CompletionClient, CompletionService};
pub use config::Config;
pub use error::{EvalError, Result};
pub use models::{Credential, Item, Mode};
pub use orchestrator::{App, Dispatcher};
pub use services::RunSummary;
pub use workflow::{ItemCtx, ItemFlow, ProcessResult};
