//! 批量评测处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责一次评测运行的完整生命周期。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：校验配置、创建输出目录、创建补全客户端
//! 2. **批量加载**：加载题库和密钥，任一为空时在调度前报错
//! 3. **并发调度**：委托 `Dispatcher` 在有界并发下处理全部题目
//! 4. **结果落盘**：运行结束后一次性写出结果文件和报告
//! 5. **全局统计**：输出最终统计信息

use anyhow::{Context, Result};
use chrono::Local;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::clients::{CompletionClient, CompletionService};
use crate::config::Config;
use crate::error::EvalError;
use crate::models::{load_credentials, load_items};
use crate::orchestrator::dispatcher::Dispatcher;
use crate::services::{
    ArtifactWriter, CredentialPool, Evaluator, MonitorSettings, ReportGenerator, RunSummary,
};
use crate::utils::logging::{self, file_stamp};

/// 应用主结构
pub struct App {
    config: Config,
    service: Arc<dyn CompletionService>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        config.validate()?;
        logging::log_startup(&config);

        let client = CompletionClient::new(&config).context("创建补全客户端失败")?;
        Ok(Self::with_service(config, Arc::new(client)))
    }

    /// 使用指定的补全服务创建应用
    pub fn with_service(config: Config, service: Arc<dyn CompletionService>) -> Self {
        Self { config, service }
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<RunSummary> {
        let writer = ArtifactWriter::new(&self.config.output_dir, &self.config.fail_dir);
        writer.ensure_dirs().await.context("创建输出目录失败")?;

        info!("\n📁 正在加载题库和密钥...");
        let items = load_items(&self.config.items_file).await?;
        if items.is_empty() {
            error!("❌ 题库为空，程序结束");
            return Err(EvalError::NoItems.into());
        }

        let credentials = load_credentials(&self.config.keys_file).await?;
        if credentials.is_empty() {
            error!("❌ 没有找到有效的API密钥，程序结束");
            return Err(EvalError::NoCredentials.into());
        }

        let credential_count = credentials.len();
        let pool = CredentialPool::new(credentials, self.config.max_workers, items.len());
        logging::log_dispatch_plan(
            items.len(),
            credential_count,
            self.config.max_workers,
            pool.effective_workers(),
        );

        let evaluator = Arc::new(Evaluator::new(self.config.mode, self.service.clone()));
        let mut dispatcher = Dispatcher::new(pool, evaluator);
        if self.config.show_progress {
            dispatcher = dispatcher.with_monitor(MonitorSettings {
                interval: self.config.progress_interval(),
                idle_after: self.config.status_idle_after(),
            });
        }

        let summary = dispatcher.run(items).await?;

        // 结果落盘和报告都是尽力而为，失败只记录日志
        let generated_at = Local::now();
        let written = writer.write_all(&summary, &file_stamp(&generated_at)).await;
        info!("💾 共写出 {} 个结果文件", written.len());

        let reports = ReportGenerator::new(&self.config.output_dir)
            .write_all(&summary, &generated_at)
            .await;
        if reports.is_empty() {
            warn!("⚠️ 没有生成任何报告");
        }

        ReportGenerator::log_final_summary(&summary, &self.config.output_dir, &self.config.fail_dir);
        Ok(summary)
    }
}
