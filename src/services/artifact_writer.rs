//! 结果落盘服务 - 业务能力层
//!
//! 只负责"把最终结果写成 JSON 文件"，不关心流程。运行结束后调用一次，
//! 工作任务本身不做文件 I/O。单个文件写入失败只记录警告。

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{EvalError, Result};
use crate::models::{AnswerArtifact, FailedEntry, Mode, ProcessedEntry, RawQuestion};
use crate::services::run_state::RunSummary;

/// 结果落盘服务
///
/// 职责：
/// - 作答模式：每题一个 `question_0001.json` 和合并的 `all_answers_*.json`
/// - 筛选模式：每个非空目标分类一个 `{分类}_questions.json`
/// - 两种模式：`processed_questions_*.json`，有失败时写 `failed_questions_*.json`
pub struct ArtifactWriter {
    output_dir: PathBuf,
    fail_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(output_dir: impl Into<PathBuf>, fail_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            fail_dir: fail_dir.into(),
        }
    }

    /// 创建输出目录和失败记录目录
    pub async fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.output_dir, &self.fail_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| EvalError::io(dir.display().to_string(), e))?;
        }
        Ok(())
    }

    /// 写出全部结果文件，返回成功写入的路径
    pub async fn write_all(&self, summary: &RunSummary, stamp: &str) -> Vec<PathBuf> {
        let mut written = Vec::new();

        match summary.mode {
            Mode::Evaluate => {
                let answers: Vec<(usize, AnswerArtifact)> = summary
                    .classified
                    .iter()
                    .map(|r| (r.item.number(), AnswerArtifact::from_record(r)))
                    .collect();

                for (number, artifact) in &answers {
                    let path = self.output_dir.join(AnswerArtifact::file_name(*number));
                    self.write_logged(&path, artifact, &mut written).await;
                }
                debug!("已写出 {} 个单题结果文件", answers.len());

                if !answers.is_empty() {
                    let all: Vec<&AnswerArtifact> = answers.iter().map(|(_, a)| a).collect();
                    let path = self.output_dir.join(format!("all_answers_{}.json", stamp));
                    if self.write_logged(&path, &all, &mut written).await {
                        info!("💾 已合并所有AI回答到: {}", path.display());
                    }
                }
            }
            Mode::Filter => {
                for (category, items) in &summary.groups {
                    let questions: Vec<RawQuestion> = items.iter().map(|item| item.to_raw()).collect();
                    let path = self.output_dir.join(category.file_name());
                    if self.write_logged(&path, &questions, &mut written).await {
                        info!(
                            "💾 {}相关题目已保存到: {} (共{}道题目)",
                            category.name(),
                            path.display(),
                            questions.len()
                        );
                    }
                }
            }
        }

        if !summary.classified.is_empty() {
            let processed: Vec<ProcessedEntry> = summary
                .classified
                .iter()
                .map(ProcessedEntry::from_record)
                .collect();
            let path = self
                .output_dir
                .join(format!("processed_questions_{}.json", stamp));
            if self.write_logged(&path, &processed, &mut written).await {
                info!("💾 已保存处理成功题目列表到: {}", path.display());
            }
        }

        if !summary.failures.is_empty() {
            let failed: Vec<FailedEntry> = summary.failures.iter().map(FailedEntry::from_record).collect();
            let path = self.fail_dir.join(format!("failed_questions_{}.json", stamp));
            if self.write_logged(&path, &failed, &mut written).await {
                info!("💾 已保存失败题目列表到: {}", path.display());
            }
        }

        written
    }

    async fn write_logged<T: Serialize + ?Sized>(
        &self,
        path: &Path,
        value: &T,
        written: &mut Vec<PathBuf>,
    ) -> bool {
        match write_json(path, value).await {
            Ok(()) => {
                written.push(path.to_path_buf());
                true
            }
            Err(e) => {
                warn!("⚠️ 写入 {} 失败: {}", path.display(), e);
                false
            }
        }
    }
}

/// 以缩进格式写 JSON，中文不转义
async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, content)
        .await
        .map_err(|e| EvalError::io(path.display().to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Credential, Evaluation, Item, Outcome, Payload};
    use crate::services::credential_pool::CredentialPool;
    use crate::services::run_state::RunState;
    use chrono::Local;
    use std::time::Instant;

    fn summary(mode: Mode, labels: &[&str]) -> RunSummary {
        let items: Vec<Item> = (0..labels.len() + 1)
            .map(|i| Item::new(i, format!("题目{}", i), "A"))
            .collect();
        let pool = CredentialPool::new(vec![Credential::new("sk-test0001")], 10, items.len());
        let mut state = RunState::new(mode, &pool, &items);
        let now = Instant::now();
        for (item, label) in items.iter().zip(labels) {
            let payload = match mode {
                Mode::Evaluate => Payload::Answer {
                    selected_answer: label.to_string(),
                    reasoning: "r".into(),
                },
                Mode::Filter => Payload::Category {
                    label: label.to_string(),
                    reasoning: "r".into(),
                },
            };
            let evaluation = Evaluation {
                payload,
                captured_at: Local::now(),
            };
            state
                .apply(Outcome::classified(item.clone(), 0, evaluation).into(), now)
                .unwrap();
        }
        let last = items[labels.len()].clone();
        state
            .apply(Outcome::failed(last, 0, EvalError::transport("超时")).into(), now)
            .unwrap();
        state.finish()
    }

    #[tokio::test]
    async fn test_evaluate_mode_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path().join("out"), dir.path().join("out/fail"));
        writer.ensure_dirs().await.unwrap();

        let written = writer.write_all(&summary(Mode::Evaluate, &["A", "B"]), "20240101_000000").await;
        assert_eq!(written.len(), 5);

        let first = std::fs::read_to_string(dir.path().join("out/question_0001.json")).unwrap();
        let artifact: AnswerArtifact = serde_json::from_str(&first).unwrap();
        assert!(artifact.is_correct);
        assert_eq!(artifact.question, "题目0");

        let failed =
            std::fs::read_to_string(dir.path().join("out/fail/failed_questions_20240101_000000.json"))
                .unwrap();
        let entries: Vec<FailedEntry> = serde_json::from_str(&failed).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].index, 3);
        assert_eq!(entries[0].question.question, "题目2");
    }

    #[tokio::test]
    async fn test_filter_mode_category_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path(), dir.path().join("fail"));
        writer.ensure_dirs().await.unwrap();

        writer
            .write_all(&summary(Mode::Filter, &["CT", "不相关", "CT"]), "20240101_000000")
            .await;

        let ct = std::fs::read_to_string(dir.path().join("CT_questions.json")).unwrap();
        let questions: Vec<RawQuestion> = serde_json::from_str(&ct).unwrap();
        let texts: Vec<&str> = questions.iter().map(|q| q.question.as_str()).collect();
        assert_eq!(texts, vec!["题目0", "题目2"]);
        assert!(!dir.path().join("MRI_questions.json").exists());
    }
}
