//! 单题处理结果
//!
//! 状态机：`Pending → InFlight → {Classified | Failed}`，终态不可回退。

use chrono::{DateTime, Local};

use crate::error::{EvalError, FailureKind};
use crate::models::category::Category;
use crate::models::item::Item;

/// 远程服务返回的结构化内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// 作答模式：`selected_answer` + `reasoning`
    Answer {
        selected_answer: String,
        reasoning: String,
    },
    /// 筛选模式：`category` + `reasoning`
    Category { label: String, reasoning: String },
}

impl Payload {
    /// AI 给出的答案或分类标签
    pub fn label(&self) -> &str {
        match self {
            Payload::Answer {
                selected_answer, ..
            } => selected_answer,
            Payload::Category { label, .. } => label,
        }
    }

    pub fn reasoning(&self) -> &str {
        match self {
            Payload::Answer { reasoning, .. } | Payload::Category { reasoning, .. } => reasoning,
        }
    }

    /// 目标影像学分类，不相关或作答模式返回 None
    pub fn category(&self) -> Option<Category> {
        match self {
            Payload::Category { label, .. } => Category::from_label(label),
            Payload::Answer { .. } => None,
        }
    }
}

/// 一次成功调用的解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub payload: Payload,
    pub captured_at: DateTime<Local>,
}

/// 题目状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    InFlight,
    Classified,
    Failed,
}

impl ItemState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemState::Classified | ItemState::Failed)
    }
}

/// 单题终态结果
#[derive(Debug)]
pub enum Outcome {
    Classified {
        item: Item,
        slot: usize,
        evaluation: Evaluation,
    },
    Failed {
        item: Item,
        slot: usize,
        error: EvalError,
        failed_at: DateTime<Local>,
    },
}

impl Outcome {
    pub fn classified(item: Item, slot: usize, evaluation: Evaluation) -> Self {
        Outcome::Classified {
            item,
            slot,
            evaluation,
        }
    }

    pub fn failed(item: Item, slot: usize, error: EvalError) -> Self {
        Outcome::Failed {
            item,
            slot,
            error,
            failed_at: Local::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Classified { .. })
    }
}

/// 判断 AI 答案是否正确：去空白后忽略大小写完全相等，标准答案为空时一律判错
pub fn answers_match(selected: &str, expected: &str) -> bool {
    !expected.trim().is_empty() && selected.trim().to_uppercase() == expected.to_uppercase()
}

/// 成功记录
#[derive(Debug, Clone)]
pub struct ClassifiedRecord {
    pub item: Item,
    pub slot: usize,
    pub payload: Payload,
    pub captured_at: DateTime<Local>,
}

impl ClassifiedRecord {
    /// 作答模式下是否答对，筛选模式返回 None
    pub fn is_correct(&self) -> Option<bool> {
        match &self.payload {
            Payload::Answer {
                selected_answer, ..
            } => Some(answers_match(selected_answer, &self.item.expected_answer)),
            Payload::Category { .. } => None,
        }
    }
}

/// 失败记录
#[derive(Debug, Clone)]
pub struct FailedRecord {
    pub item: Item,
    pub slot: usize,
    pub kind: FailureKind,
    pub error: String,
    pub failed_at: DateTime<Local>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answers_match_is_case_insensitive() {
        assert!(answers_match("a", "A"));
        assert!(answers_match(" B ", "b"));
        assert!(!answers_match("A.", "A"));
        assert!(!answers_match("A", ""));
        assert!(!answers_match("  ", ""));
        assert!(!answers_match("", "  "));
    }

    #[test]
    fn test_blank_answer_against_unknown_expected_is_wrong() {
        let payload = crate::services::evaluator::parse_payload(
            crate::models::Mode::Evaluate,
            r#"{"selected_answer":"  ","reasoning":"x"}"#,
        )
        .unwrap();
        let record = ClassifiedRecord {
            item: Item::new(0, "q", ""),
            slot: 0,
            payload,
            captured_at: Local::now(),
        };
        assert_eq!(record.is_correct(), Some(false));
    }

    #[test]
    fn test_is_correct_only_in_answer_mode() {
        let record = ClassifiedRecord {
            item: Item::new(0, "q", "C"),
            slot: 0,
            payload: Payload::Answer {
                selected_answer: "c".into(),
                reasoning: "r".into(),
            },
            captured_at: Local::now(),
        };
        assert_eq!(record.is_correct(), Some(true));

        let record = ClassifiedRecord {
            payload: Payload::Category {
                label: "CT".into(),
                reasoning: "r".into(),
            },
            ..record
        };
        assert_eq!(record.is_correct(), None);
        assert_eq!(record.payload.category(), Some(Category::Ct));
    }

    #[test]
    fn test_failed_outcome_is_not_success() {
        let outcome = Outcome::failed(Item::new(1, "", ""), 0, EvalError::EmptyInput { index: 1 });
        assert!(!outcome.is_success());
        assert!(ItemState::Failed.is_terminal());
        assert!(ItemState::Classified.is_terminal());
        assert!(!ItemState::InFlight.is_terminal());
    }
}
