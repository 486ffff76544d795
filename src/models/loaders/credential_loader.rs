use crate::models::credential::Credential;
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use tokio::fs;

/// 从文本中提取所有带引号的 `"sk-..."` 密钥，去重并保持首次出现的顺序
pub fn extract_credentials(content: &str) -> Result<Vec<Credential>> {
    let re = Regex::new(r#""(sk-[a-zA-Z0-9]+)""#)?;
    let mut seen = HashSet::new();

    Ok(re
        .captures_iter(content)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str()))
        .filter(|key| seen.insert(key.to_string()))
        .map(Credential::new)
        .collect())
}

/// 从密钥文件加载密钥列表
pub async fn load_credentials(path: &Path) -> Result<Vec<Credential>> {
    tracing::info!("正在从 {} 加载API密钥", path.display());

    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取密钥文件: {}", path.display()))?;

    let credentials = extract_credentials(&content)?;
    tracing::info!("成功加载 {} 个API密钥", credentials.len());

    Ok(credentials)
}
