use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// 让 AI 作答并判断正误
    Evaluate,
    /// 让 AI 按影像学方向分类筛选题目
    Filter,
}

impl Mode {
    pub fn name(self) -> &'static str {
        match self {
            Mode::Evaluate => "evaluate-correctness",
            Mode::Filter => "filter-by-category",
        }
    }

    /// 响应 JSON 中必须出现的标签字段
    pub fn label_key(self) -> &'static str {
        match self {
            Mode::Evaluate => "selected_answer",
            Mode::Filter => "category",
        }
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Evaluate
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "evaluate" | "eval" | "evaluate-correctness" => Ok(Mode::Evaluate),
            "filter" | "filter-by-category" => Ok(Mode::Filter),
            other => Err(format!("未知的运行模式: {}", other)),
        }
    }
}
