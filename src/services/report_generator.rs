//! 报告生成服务 - 业务能力层
//!
//! 运行结束后读取一次 `RunSummary`，生成 Markdown 统计报告。
//! 渲染是纯函数：同一份结果、同一个生成时间，输出完全一致。

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{EvalError, Result};
use crate::models::{Category, Mode};
use crate::services::run_state::{CredentialUsage, RunSummary};
use crate::utils::logging::{file_stamp, format_time};
use crate::utils::truncate_text;

/// 报告表格中题目预览的长度
const TABLE_PREVIEW_CHARS: usize = 50;

/// 由最终结果计算出的统计数据
#[derive(Debug, Clone, PartialEq)]
pub struct RunStatistics {
    pub mode: Mode,
    pub total: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed_secs: f64,
    /// 平均每题耗时（秒），没有完成题目时为 None
    pub avg_secs: Option<f64>,
    /// 吞吐量（题目/秒）
    pub throughput: Option<f64>,
    pub correct: usize,
    pub wrong: usize,
    pub accuracy_pct: f64,
    pub wrong_pct: f64,
    /// 目标分类分布：(分类, 数量, 占已分类题目的百分比)，按数量降序
    pub distribution: Vec<(Category, usize, f64)>,
    pub unrelated: usize,
    pub unrelated_pct: f64,
    pub credential_usage: Vec<CredentialUsage>,
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

impl RunStatistics {
    pub fn from_summary(summary: &RunSummary) -> Self {
        let elapsed_secs = summary.elapsed.as_secs_f64();
        let (avg_secs, throughput) = if summary.completed > 0 && elapsed_secs > 0.0 {
            (
                Some(elapsed_secs / summary.completed as f64),
                Some(summary.completed as f64 / elapsed_secs),
            )
        } else {
            (None, None)
        };

        let classified_targets: usize = summary.groups.values().map(Vec::len).sum();
        let mut distribution: Vec<(Category, usize, f64)> = summary
            .groups
            .iter()
            .map(|(category, items)| {
                (*category, items.len(), percent(items.len(), classified_targets))
            })
            .collect();
        distribution.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let wrong = summary.wrong();
        Self {
            mode: summary.mode,
            total: summary.total,
            completed: summary.completed,
            succeeded: summary.succeeded,
            failed: summary.failed,
            elapsed_secs,
            avg_secs,
            throughput,
            correct: summary.correct,
            wrong,
            accuracy_pct: percent(summary.correct, summary.succeeded),
            wrong_pct: percent(wrong, summary.succeeded),
            distribution,
            unrelated: summary.unrelated,
            unrelated_pct: percent(summary.unrelated, summary.total),
            credential_usage: summary.credential_usage.clone(),
        }
    }
}

/// Markdown 表格单元格转义
fn cell(text: &str) -> String {
    text.replace('|', "\\|")
        .replace("\r\n", " ")
        .replace('\n', " ")
}

fn basic_table(out: &mut String, stats: &RunStatistics) {
    let success_label = match stats.mode {
        Mode::Evaluate => "成功生成AI回答数",
        Mode::Filter => "成功分类题目数",
    };
    out.push_str("## 基本统计\n\n");
    out.push_str("| 统计项目 | 数值 |\n");
    out.push_str("|---------|------|\n");
    out.push_str(&format!("| 总题目数 | {} |\n", stats.total));
    out.push_str(&format!("| 已处理题目数 | {} |\n", stats.completed));
    out.push_str(&format!("| {} | {} |\n", success_label, stats.succeeded));
    out.push_str(&format!("| 处理失败数 | {} |\n", stats.failed));
    out.push_str(&format!("| 总处理时间 | {:.2} 秒 |\n", stats.elapsed_secs));
    if let (Some(avg), Some(throughput)) = (stats.avg_secs, stats.throughput) {
        out.push_str(&format!("| 平均每题处理时间 | {:.2} 秒 |\n", avg));
        out.push_str(&format!("| 实际吞吐量 | {:.2} 题目/秒 |\n", throughput));
    }
}

fn usage_table(out: &mut String, usage: &[CredentialUsage]) {
    out.push_str("\n## API密钥使用统计\n\n");
    out.push_str("| 密钥编号 | 使用次数 |\n");
    out.push_str("|---------|----------|\n");
    for credential in usage {
        out.push_str(&format!(
            "| {}... | {} |\n",
            credential.display_key, credential.usage_count
        ));
    }
}

/// 作答模式的准确率报告
pub fn render_accuracy_report(summary: &RunSummary, generated_at: &DateTime<Local>) -> String {
    let stats = RunStatistics::from_summary(summary);
    let mut out = String::new();
    out.push_str("# AI题库测试准确率报告\n\n");
    out.push_str(&format!("**生成时间**: {}\n\n", format_time(generated_at)));
    basic_table(&mut out, &stats);

    out.push_str("\n## 准确率统计\n\n");
    out.push_str("| 准确率指标 | 数值 | 百分比 |\n");
    out.push_str("|-----------|------|--------|\n");
    out.push_str(&format!(
        "| AI答对题目 | {}/{} | {:.2}% |\n",
        stats.correct, stats.succeeded, stats.accuracy_pct
    ));
    out.push_str(&format!(
        "| AI答错题目 | {}/{} | {:.2}% |\n",
        stats.wrong, stats.succeeded, stats.wrong_pct
    ));

    if !summary.classified.is_empty() {
        out.push_str("\n## 题目详细统计\n\n");
        out.push_str("| 题目编号 | 题目预览 | 正确答案 | AI答案 | 是否正确 | 处理时间 |\n");
        out.push_str("|---------|---------|---------|--------|---------|----------|\n");
        for record in &summary.classified {
            let status = if record.is_correct() == Some(true) { "✅" } else { "❌" };
            out.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} |\n",
                record.item.number(),
                cell(&truncate_text(&record.item.text, TABLE_PREVIEW_CHARS)),
                cell(&record.item.expected_answer),
                cell(record.payload.label()),
                status,
                format_time(&record.captured_at)
            ));
        }
    }

    usage_table(&mut out, &stats.credential_usage);
    out
}

/// 错题汇总，没有错题时返回 None
pub fn render_wrong_answers(summary: &RunSummary, generated_at: &DateTime<Local>) -> Option<String> {
    let wrong: Vec<_> = summary.wrong_answers().collect();
    if wrong.is_empty() {
        return None;
    }

    let mut out = String::new();
    out.push_str("# AI错题汇总报告\n\n");
    out.push_str(&format!("**生成时间**: {}\n\n", format_time(generated_at)));
    out.push_str(&format!("**错题统计**: 共 {} 道题目\n", wrong.len()));
    out.push_str(&format!(
        "**错误率**: {:.2}%\n\n",
        percent(wrong.len(), summary.classified.len())
    ));
    out.push_str("## 错题详情\n\n");

    for (i, record) in wrong.iter().enumerate() {
        out.push_str(&format!(
            "### 错题 {} (原题目编号: {})\n\n",
            i + 1,
            record.item.number()
        ));
        out.push_str(&format!("**题目内容**:\n```\n{}\n```\n\n", record.item.text));
        out.push_str(&format!("**正确答案**: {}\n\n", record.item.expected_answer));
        out.push_str(&format!("**AI答案**: {}\n\n", record.payload.label()));
        out.push_str(&format!(
            "**AI推理过程**:\n```\n{}\n```\n\n",
            record.payload.reasoning()
        ));
        out.push_str(&format!("**处理时间**: {}\n\n", format_time(&record.captured_at)));
        out.push_str("---\n\n");
    }
    Some(out)
}

/// 筛选模式的分类报告
pub fn render_classification_report(summary: &RunSummary, generated_at: &DateTime<Local>) -> String {
    let stats = RunStatistics::from_summary(summary);
    let mut out = String::new();
    out.push_str("# AI题库医学影像学分类报告\n\n");
    out.push_str(&format!("**生成时间**: {}\n\n", format_time(generated_at)));
    basic_table(&mut out, &stats);

    out.push_str("\n## 医学影像学分类分布统计\n\n");
    out.push_str("| 影像学分类 | 题目数量 | 占比 |\n");
    out.push_str("|---------|---------|------|\n");
    for (category, count, pct) in &stats.distribution {
        out.push_str(&format!("| {} | {} | {:.1}% |\n", category.name(), count, pct));
    }
    if stats.unrelated > 0 {
        out.push_str(&format!(
            "| 不相关题目 | {} | {:.1}% |\n",
            stats.unrelated, stats.unrelated_pct
        ));
    }

    if !summary.classified.is_empty() {
        out.push_str("\n## 题目详细分类结果\n\n");
        out.push_str("| 题目编号 | 题目预览 | 原答案 | 分类结果 | 处理时间 |\n");
        out.push_str("|---------|---------|--------|----------|----------|\n");
        for record in &summary.classified {
            out.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                record.item.number(),
                cell(&truncate_text(&record.item.text, TABLE_PREVIEW_CHARS)),
                cell(&record.item.expected_answer),
                cell(record.payload.label()),
                format_time(&record.captured_at)
            ));
        }
    }

    usage_table(&mut out, &stats.credential_usage);
    out
}

/// 失败题目报告，没有失败时返回 None
pub fn render_failure_report(summary: &RunSummary, generated_at: &DateTime<Local>) -> Option<String> {
    if summary.failures.is_empty() {
        return None;
    }

    let mut out = String::new();
    out.push_str("# 处理失败题目报告\n\n");
    out.push_str(&format!("**生成时间**: {}\n\n", format_time(generated_at)));
    out.push_str(&format!(
        "**失败题目统计**: 共 {} 道题目\n\n",
        summary.failures.len()
    ));
    out.push_str("## 失败题目详情\n\n");

    for (i, record) in summary.failures.iter().enumerate() {
        out.push_str(&format!(
            "### 失败题目 {} (原题目编号: {})\n\n",
            i + 1,
            record.item.number()
        ));
        out.push_str(&format!("**错误类型**: {}\n\n", record.kind.name()));
        out.push_str(&format!("**错误信息**: {}\n\n", record.error));
        out.push_str(&format!("**处理时间**: {}\n\n", format_time(&record.failed_at)));
        out.push_str(&format!("**题目内容**:\n```\n{}\n```\n\n", record.item.text));
        out.push_str("---\n\n");
    }
    Some(out)
}

/// 报告生成服务
pub struct ReportGenerator {
    output_dir: PathBuf,
}

impl ReportGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// 按模式渲染全部报告：(文件名, 内容)
    pub fn render_all(summary: &RunSummary, generated_at: &DateTime<Local>) -> Vec<(String, String)> {
        let stamp = file_stamp(generated_at);
        let mut reports = Vec::new();

        match summary.mode {
            Mode::Evaluate => {
                reports.push((
                    format!("accuracy_report_{}.md", stamp),
                    render_accuracy_report(summary, generated_at),
                ));
                if let Some(content) = render_wrong_answers(summary, generated_at) {
                    reports.push((format!("wrong_questions_summary_{}.md", stamp), content));
                }
            }
            Mode::Filter => {
                reports.push((
                    format!("classification_report_{}.md", stamp),
                    render_classification_report(summary, generated_at),
                ));
            }
        }

        if let Some(content) = render_failure_report(summary, generated_at) {
            reports.push((format!("failed_questions_report_{}.md", stamp), content));
        }
        reports
    }

    /// 写出全部报告
    ///
    /// 单个文件写入失败只记录警告，返回成功写入的路径。
    pub async fn write_all(&self, summary: &RunSummary, generated_at: &DateTime<Local>) -> Vec<PathBuf> {
        let mut written = Vec::new();
        for (name, content) in Self::render_all(summary, generated_at) {
            let path = self.output_dir.join(&name);
            match write_text(&path, &content).await {
                Ok(()) => {
                    info!("📄 报告已保存到: {}", path.display());
                    written.push(path);
                }
                Err(e) => warn!("⚠️ 保存报告 {} 失败: {}", name, e),
            }
        }
        written
    }

    /// 在控制台输出最终统计
    pub fn log_final_summary(summary: &RunSummary, output_dir: &Path, fail_dir: &Path) {
        let stats = RunStatistics::from_summary(summary);

        info!("{}", "=".repeat(60));
        info!("🎉 处理完成!");
        info!("[统计] 总题目数: {}", stats.total);
        info!("[统计] 已处理: {}", stats.completed);
        info!("[统计] 成功: {} 道", stats.succeeded);
        info!("[统计] 结果保存位置: {}", output_dir.display());
        info!("[统计] 处理失败: {}", stats.failed);
        if stats.failed > 0 {
            info!("[统计] 失败题目记录保存到: {}", fail_dir.display());
        }
        info!("[统计] 总处理时间: {:.2} 秒", stats.elapsed_secs);
        if let (Some(avg), Some(throughput)) = (stats.avg_secs, stats.throughput) {
            info!("[统计] 平均每题处理时间: {:.2} 秒", avg);
            info!("[统计] 实际吞吐量: {:.2} 题目/秒", throughput);
        }

        match stats.mode {
            Mode::Evaluate if stats.succeeded > 0 => {
                info!("[准确率] AI答对题目: {}/{}", stats.correct, stats.succeeded);
                info!("[准确率] 整体准确率: {:.2}%", stats.accuracy_pct);
                info!("[准确率] AI答错题目: {}/{}", stats.wrong, stats.succeeded);
                info!("[准确率] 错误率: {:.2}%", stats.wrong_pct);
            }
            Mode::Filter => {
                for (category, count, pct) in &stats.distribution {
                    info!("[分类] {}: {} 道 ({:.1}%)", category.name(), count, pct);
                }
                info!("[分类] 不相关题目: {} 道", stats.unrelated);
            }
            _ => {}
        }

        info!("[密钥使用统计]");
        for credential in &stats.credential_usage {
            info!(
                "  - 密钥 {}...: 使用了 {} 次",
                credential.display_key, credential.usage_count
            );
        }
        info!("{}", "=".repeat(60));
    }
}

async fn write_text(path: &Path, content: &str) -> Result<()> {
    tokio::fs::write(path, content)
        .await
        .map_err(|e| EvalError::io(path.display().to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;
    use crate::models::{Credential, Evaluation, Item, Outcome, Payload};
    use crate::services::credential_pool::CredentialPool;
    use crate::services::run_state::RunState;
    use chrono::TimeZone;
    use std::time::Instant;

    fn evaluate_summary() -> RunSummary {
        let items: Vec<Item> = (0..4)
            .map(|i| Item::new(i, format!("题目 {} | 选项", i), "A"))
            .collect();
        let pool = CredentialPool::new(
            vec![Credential::new("sk-aaaaaaaaaa"), Credential::new("sk-bbbbbbbbbb")],
            100,
            items.len(),
        );
        let mut state = RunState::new(Mode::Evaluate, &pool, &items);
        let now = Instant::now();
        for (item, answer) in items.iter().take(3).zip(["A", "a", "C"]) {
            let evaluation = Evaluation {
                payload: Payload::Answer {
                    selected_answer: answer.into(),
                    reasoning: "推理".into(),
                },
                captured_at: Local::now(),
            };
            state
                .apply(Outcome::classified(item.clone(), item.index % 2, evaluation).into(), now)
                .unwrap();
        }
        state
            .apply(
                Outcome::failed(items[3].clone(), 1, EvalError::transport("HTTP 500")).into(),
                now,
            )
            .unwrap();
        state.finish()
    }

    fn filter_summary() -> RunSummary {
        let items: Vec<Item> = (0..6).map(|i| Item::new(i, format!("q{}", i), "B")).collect();
        let pool = CredentialPool::new(vec![Credential::new("sk-cccccccccc")], 100, items.len());
        let mut state = RunState::new(Mode::Filter, &pool, &items);
        let now = Instant::now();
        for (item, label) in items.iter().zip(["MRI", "CT", "CT", "不相关", "X线", "MRI"]) {
            let evaluation = Evaluation {
                payload: Payload::Category {
                    label: label.into(),
                    reasoning: "r".into(),
                },
                captured_at: Local::now(),
            };
            state
                .apply(Outcome::classified(item.clone(), 0, evaluation).into(), now)
                .unwrap();
        }
        state.finish()
    }

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_statistics_evaluate_mode() {
        let stats = RunStatistics::from_summary(&evaluate_summary());
        assert_eq!((stats.total, stats.completed, stats.succeeded, stats.failed), (4, 4, 3, 1));
        assert_eq!((stats.correct, stats.wrong), (2, 1));
        assert!((stats.accuracy_pct - 66.666).abs() < 0.01);
        let usage: Vec<usize> = stats.credential_usage.iter().map(|u| u.usage_count).collect();
        assert_eq!(usage, vec![2, 2]);
    }

    #[test]
    fn test_distribution_sorted_by_count_then_label() {
        let stats = RunStatistics::from_summary(&filter_summary());
        let order: Vec<(Category, usize)> =
            stats.distribution.iter().map(|(c, n, _)| (*c, *n)).collect();
        assert_eq!(
            order,
            vec![(Category::Ct, 2), (Category::Mri, 2), (Category::XRay, 1)]
        );
        assert_eq!(stats.unrelated, 1);
        assert!((stats.distribution[0].2 - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let summary = evaluate_summary();
        let first = ReportGenerator::render_all(&summary, &fixed_time());
        let second = ReportGenerator::render_all(&summary, &fixed_time());
        assert_eq!(first, second);

        let names: Vec<&str> = first.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "accuracy_report_20240501_083000.md",
                "wrong_questions_summary_20240501_083000.md",
                "failed_questions_report_20240501_083000.md",
            ]
        );
    }

    #[test]
    fn test_accuracy_report_content() {
        let report = render_accuracy_report(&evaluate_summary(), &fixed_time());
        assert!(report.contains("**生成时间**: 2024-05-01 08:30:00"));
        assert!(report.contains("| AI答对题目 | 2/3 | 66.67% |"));
        assert!(report.contains("题目 0 \\| 选项"));
        assert!(report.contains("| sk-aaaaa... | 2 |"));
    }

    #[test]
    fn test_wrong_and_failure_digests() {
        let summary = evaluate_summary();
        let wrong = render_wrong_answers(&summary, &fixed_time()).unwrap();
        assert!(wrong.contains("### 错题 1 (原题目编号: 3)"));
        assert!(wrong.contains("**AI答案**: C"));

        let failed = render_failure_report(&summary, &fixed_time()).unwrap();
        assert!(failed.contains("### 失败题目 1 (原题目编号: 4)"));
        assert!(failed.contains("HTTP 500"));
        assert!(failed.contains("TransportError"));
    }

    #[test]
    fn test_classification_report_has_no_digests() {
        let summary = filter_summary();
        let reports = ReportGenerator::render_all(&summary, &fixed_time());
        assert_eq!(reports.len(), 1);
        assert!(reports[0].1.contains("| CT | 2 | 40.0% |"));
        assert!(reports[0].1.contains("| 不相关题目 | 1 | 16.7% |"));
    }

    #[tokio::test]
    async fn test_write_all_creates_files() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ReportGenerator::new(dir.path());
        let written = generator.write_all(&evaluate_summary(), &fixed_time()).await;
        assert_eq!(written.len(), 3);
        for path in written {
            assert!(path.exists());
        }
    }
}
