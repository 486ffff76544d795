use serde::{Deserialize, Serialize};

use crate::utils::logging::truncate_text;

/// 预览文本长度（字符数）
pub const PREVIEW_CHARS: usize = 50;

/// 题库文件中的原始题目格式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawQuestion {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
}

/// 一道待评测的题目
///
/// 加载后不可变；`index` 是在输入序列中的位置（从 0 开始），稳定且唯一。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub index: usize,
    pub text: String,
    /// 为空表示"未知"
    pub expected_answer: String,
}

impl Item {
    pub fn new(index: usize, text: impl Into<String>, expected_answer: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            expected_answer: expected_answer.into(),
        }
    }

    pub fn from_raw(index: usize, raw: RawQuestion) -> Self {
        Self::new(index, raw.question, raw.answer)
    }

    /// 题干去除空白后是否为空
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// 对外显示的题号（从 1 开始）
    pub fn number(&self) -> usize {
        self.index + 1
    }

    pub fn preview(&self) -> String {
        truncate_text(&self.text, PREVIEW_CHARS)
    }

    pub fn to_raw(&self) -> RawQuestion {
        RawQuestion {
            question: self.text.clone(),
            answer: self.expected_answer.clone(),
        }
    }
}
