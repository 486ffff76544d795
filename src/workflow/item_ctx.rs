//! 题目处理上下文
//!
//! 封装"我正在用哪个密钥处理第几题"这一信息

use std::fmt::Display;

use crate::models::Credential;

/// 题目处理上下文
#[derive(Debug, Clone)]
pub struct ItemCtx {
    /// 题目索引（从0开始）
    pub index: usize,

    /// 密钥槽位
    pub slot: usize,

    /// 密钥前缀（仅用于日志显示）
    pub display_key: String,
}

impl ItemCtx {
    pub fn new(index: usize, slot: usize, credential: &Credential) -> Self {
        Self {
            index,
            slot,
            display_key: credential.display_key().to_string(),
        }
    }
}

impl Display for ItemCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[题目 #{} 密钥 {}]", self.index + 1, self.display_key)
    }
}
