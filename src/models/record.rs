//! 落盘记录格式

use serde::{Deserialize, Serialize};

use crate::error::FailureKind;
use crate::models::item::RawQuestion;
use crate::models::outcome::{ClassifiedRecord, FailedRecord};
use crate::utils::logging::format_time;

/// 单题作答结果（`question_0001.json`）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerArtifact {
    pub question: String,
    pub correct_answer: String,
    pub ai_answer: String,
    pub reasoning: String,
    pub is_correct: bool,
    pub timestamp: String,
}

impl AnswerArtifact {
    pub fn from_record(record: &ClassifiedRecord) -> Self {
        Self {
            question: record.item.text.clone(),
            correct_answer: record.item.expected_answer.clone(),
            ai_answer: record.payload.label().to_string(),
            reasoning: record.payload.reasoning().to_string(),
            is_correct: record.is_correct().unwrap_or(false),
            timestamp: format_time(&record.captured_at),
        }
    }

    /// 输出文件名，题号从 1 开始补零到 4 位
    pub fn file_name(number: usize) -> String {
        format!("question_{:04}.json", number)
    }
}

/// 已处理题目日志条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedEntry {
    pub index: usize,
    pub question_preview: String,
    pub expected_answer: String,
    /// 作答模式为 AI 答案，筛选模式为分类标签
    pub result: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    pub reasoning: String,
    pub time: String,
}

impl ProcessedEntry {
    pub fn from_record(record: &ClassifiedRecord) -> Self {
        Self {
            index: record.item.number(),
            question_preview: record.item.preview(),
            expected_answer: record.item.expected_answer.clone(),
            result: record.payload.label().to_string(),
            is_correct: record.is_correct(),
            reasoning: record.payload.reasoning().to_string(),
            time: format_time(&record.captured_at),
        }
    }
}

/// 失败题目日志条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedEntry {
    pub index: usize,
    pub question: RawQuestion,
    pub kind: FailureKind,
    pub error: String,
    pub time: String,
}

impl FailedEntry {
    pub fn from_record(record: &FailedRecord) -> Self {
        Self {
            index: record.item.number(),
            question: record.item.to_raw(),
            kind: record.kind,
            error: record.error.clone(),
            time: format_time(&record.failed_at),
        }
    }
}
