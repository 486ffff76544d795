use crate::models::item::{Item, RawQuestion};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

/// TOML 题库格式：`[[questions]]` 表数组
#[derive(Debug, Deserialize)]
struct TomlQuestionBank {
    #[serde(default)]
    questions: Vec<RawQuestion>,
}

/// 解析 JSON 题库（`[{"question": ..., "answer": ...}, ...]`）
pub fn parse_json_items(content: &str) -> Result<Vec<Item>> {
    let raw: Vec<RawQuestion> = serde_json::from_str(content).context("无法解析JSON题库")?;
    Ok(into_items(raw))
}

/// 解析 TOML 题库
pub fn parse_toml_items(content: &str) -> Result<Vec<Item>> {
    let bank: TomlQuestionBank = toml::from_str(content).context("无法解析TOML题库")?;
    Ok(into_items(bank.questions))
}

fn into_items(raw: Vec<RawQuestion>) -> Vec<Item> {
    raw.into_iter()
        .enumerate()
        .map(|(index, q)| Item::from_raw(index, q))
        .collect()
}

/// 从文件加载题库，按扩展名选择格式（默认 JSON）
///
/// 空题干的题目会保留，调度时记为 `EmptyInput` 失败。
pub async fn load_items(path: &Path) -> Result<Vec<Item>> {
    tracing::info!("正在从 {} 加载题库", path.display());

    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取题库文件: {}", path.display()))?;

    let items = match path.extension().and_then(|s| s.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("toml") => parse_toml_items(&content),
        _ => parse_json_items(&content),
    }
    .with_context(|| format!("题库文件格式错误: {}", path.display()))?;

    let blank = items.iter().filter(|item| item.is_blank()).count();
    if blank > 0 {
        tracing::warn!("题库中有 {} 道题目内容为空，将记为失败", blank);
    }
    tracing::info!("成功加载 {} 道题目", items.len());

    Ok(items)
}
