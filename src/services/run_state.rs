//! 运行状态
//!
//! 一次运行中所有工作任务共享的计数器、密钥状态和结果集合。只通过
//! `ResultAggregator` 的互斥锁访问；锁内只做内存操作。

use chrono::{DateTime, Local};
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use crate::error::{EvalError, Result};
use crate::models::{
    Category, ClassifiedRecord, FailedRecord, Item, ItemState, Mode, Outcome,
};
use crate::services::credential_pool::CredentialPool;
use crate::services::progress_monitor::ProgressSnapshot;

/// 密钥状态中保留的失败原因长度
const STATUS_REASON_CHARS: usize = 30;

/// 密钥当前活动
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activity {
    Idle,
    Processing { index: usize },
    Done { index: usize },
    Failed { index: usize, reason: String },
}

/// 单个密钥的使用情况
#[derive(Debug, Clone)]
pub struct CredentialSlot {
    pub display_key: String,
    /// 分配给该密钥的题目数（分配时确定）
    pub usage_count: usize,
    pub in_flight: usize,
    pub activity: Activity,
    pub last_activity: Option<Instant>,
}

impl CredentialSlot {
    fn new(display_key: impl Into<String>, usage_count: usize) -> Self {
        Self {
            display_key: display_key.into(),
            usage_count,
            in_flight: 0,
            activity: Activity::Idle,
            last_activity: None,
        }
    }

    /// 进度面板上显示的状态
    ///
    /// 没有进行中的请求且最后活动早于 `idle_after` 时显示为空闲。
    pub fn status_label(&self, now: Instant, idle_after: Duration) -> String {
        let idle = self
            .last_activity
            .map(|t| now.saturating_duration_since(t) >= idle_after)
            .unwrap_or(true);

        match &self.activity {
            Activity::Processing { index } => format!("处理题目 {}", index + 1),
            _ if idle => "空闲".to_string(),
            Activity::Idle => "空闲".to_string(),
            Activity::Done { index } => format!("完成题目 {}", index + 1),
            Activity::Failed { index, reason } => {
                format!("题目{}: 失败 - {}...", index + 1, reason)
            }
        }
    }
}

/// 单个密钥的最终使用次数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialUsage {
    pub display_key: String,
    pub usage_count: usize,
}

/// 已在锁外准备好的记录
#[derive(Debug)]
pub enum RecordEntry {
    Classified(ClassifiedRecord),
    Failed(FailedRecord),
}

impl From<Outcome> for RecordEntry {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Classified {
                item,
                slot,
                evaluation,
            } => RecordEntry::Classified(ClassifiedRecord {
                item,
                slot,
                payload: evaluation.payload,
                captured_at: evaluation.captured_at,
            }),
            Outcome::Failed {
                item,
                slot,
                error,
                failed_at,
            } => RecordEntry::Failed(FailedRecord {
                item,
                slot,
                kind: error.kind(),
                error: format!("题目处理错误: {}", error),
                failed_at,
            }),
        }
    }
}

impl RecordEntry {
    fn item(&self) -> &Item {
        match self {
            RecordEntry::Classified(r) => &r.item,
            RecordEntry::Failed(r) => &r.item,
        }
    }

    fn slot(&self) -> usize {
        match self {
            RecordEntry::Classified(r) => r.slot,
            RecordEntry::Failed(r) => r.slot,
        }
    }
}

/// 运行期间的共享状态
#[derive(Debug)]
pub struct RunState {
    mode: Mode,
    total: usize,
    completed: usize,
    succeeded: usize,
    failed: usize,
    correct: usize,
    unrelated: usize,
    item_states: HashMap<usize, ItemState>,
    credentials: Vec<CredentialSlot>,
    classified: Vec<ClassifiedRecord>,
    failures: Vec<FailedRecord>,
    groups: BTreeMap<Category, Vec<Item>>,
    started_at: Instant,
    started_wall: DateTime<Local>,
}

impl RunState {
    /// 创建运行状态，使用次数按分配结果确定
    pub fn new(mode: Mode, pool: &CredentialPool, items: &[Item]) -> Self {
        let usage = pool.usage_plan(items.iter().map(|item| item.index));
        let credentials: Vec<CredentialSlot> = pool
            .credentials()
            .iter()
            .zip(usage)
            .map(|(c, count)| CredentialSlot::new(c.display_key(), count))
            .collect();

        Self {
            mode,
            total: items.len(),
            completed: 0,
            succeeded: 0,
            failed: 0,
            correct: 0,
            unrelated: 0,
            item_states: items.iter().map(|item| (item.index, ItemState::Pending)).collect(),
            credentials,
            classified: Vec::new(),
            failures: Vec::new(),
            groups: BTreeMap::new(),
            started_at: Instant::now(),
            started_wall: Local::now(),
        }
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn is_recorded(&self, index: usize) -> bool {
        self.item_states
            .get(&index)
            .map(|state| state.is_terminal())
            .unwrap_or(false)
    }

    /// `Pending → InFlight`
    pub fn mark_in_flight(&mut self, index: usize, slot: usize, now: Instant) -> Result<()> {
        if slot >= self.credentials.len() {
            return Err(EvalError::aggregation(format!("未知的密钥槽位 {}", slot)));
        }
        let state = self
            .item_states
            .get_mut(&index)
            .ok_or_else(|| EvalError::aggregation(format!("未知的题目 {}", index + 1)))?;
        if *state != ItemState::Pending {
            return Err(EvalError::aggregation(format!(
                "题目 {} 状态为 {:?}，不能重复开始",
                index + 1,
                state
            )));
        }
        *state = ItemState::InFlight;

        let credential = &mut self.credentials[slot];
        credential.in_flight += 1;
        credential.activity = Activity::Processing { index };
        credential.last_activity = Some(now);
        Ok(())
    }

    /// 记录终态结果，每道题只能记录一次
    pub fn apply(&mut self, entry: RecordEntry, now: Instant) -> Result<()> {
        let index = entry.item().index;
        let slot = entry.slot();
        if slot >= self.credentials.len() {
            return Err(EvalError::aggregation(format!("未知的密钥槽位 {}", slot)));
        }
        let state = self
            .item_states
            .get_mut(&index)
            .ok_or_else(|| EvalError::aggregation(format!("未知的题目 {}", index + 1)))?;
        if state.is_terminal() {
            return Err(EvalError::aggregation(format!("题目 {} 重复记录", index + 1)));
        }
        let was_in_flight = *state == ItemState::InFlight;

        let credential = &mut self.credentials[slot];
        if was_in_flight {
            credential.in_flight = credential.in_flight.saturating_sub(1);
        }
        credential.last_activity = Some(now);

        self.completed += 1;
        match entry {
            RecordEntry::Classified(record) => {
                *state = ItemState::Classified;
                self.succeeded += 1;
                if credential.in_flight == 0 {
                    credential.activity = Activity::Done { index };
                }
                if record.is_correct() == Some(true) {
                    self.correct += 1;
                }
                if self.mode == Mode::Filter {
                    match record.payload.category() {
                        Some(category) => self.groups.entry(category).or_default().push(record.item.clone()),
                        None => self.unrelated += 1,
                    }
                }
                self.classified.push(record);
            }
            RecordEntry::Failed(record) => {
                *state = ItemState::Failed;
                self.failed += 1;
                if credential.in_flight == 0 {
                    credential.activity = Activity::Failed {
                        index,
                        reason: record.error.chars().take(STATUS_REASON_CHARS).collect(),
                    };
                }
                self.failures.push(record);
            }
        }
        Ok(())
    }

    /// 复制计数器和密钥状态，格式化在锁外进行
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            mode: self.mode,
            total: self.total,
            completed: self.completed,
            succeeded: self.succeeded,
            failed: self.failed,
            correct: self.correct,
            elapsed: self.started_at.elapsed(),
            taken_at: Instant::now(),
            credentials: self.credentials.clone(),
        }
    }

    /// 结束运行，结果按题号排序
    pub fn finish(self) -> RunSummary {
        let mut classified = self.classified;
        classified.sort_by_key(|r| r.item.index);
        let mut failures = self.failures;
        failures.sort_by_key(|r| r.item.index);
        let mut groups = self.groups;
        for items in groups.values_mut() {
            items.sort_by_key(|item| item.index);
        }

        RunSummary {
            mode: self.mode,
            total: self.total,
            completed: self.completed,
            succeeded: self.succeeded,
            failed: self.failed,
            correct: self.correct,
            unrelated: self.unrelated,
            elapsed: self.started_at.elapsed(),
            started_at: self.started_wall,
            finished_at: Local::now(),
            credential_usage: self
                .credentials
                .into_iter()
                .map(|c| CredentialUsage {
                    display_key: c.display_key,
                    usage_count: c.usage_count,
                })
                .collect(),
            classified,
            failures,
            groups,
        }
    }
}

/// 运行结束后的只读结果，供报告和落盘使用
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub mode: Mode,
    pub total: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub correct: usize,
    pub unrelated: usize,
    pub elapsed: Duration,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub credential_usage: Vec<CredentialUsage>,
    /// 成功记录，按题号排序
    pub classified: Vec<ClassifiedRecord>,
    /// 失败记录，按题号排序
    pub failures: Vec<FailedRecord>,
    /// 筛选模式下按目标分类分组的题目
    pub groups: BTreeMap<Category, Vec<Item>>,
}

impl RunSummary {
    pub fn wrong(&self) -> usize {
        self.succeeded - self.correct
    }

    /// 作答错误的记录
    pub fn wrong_answers(&self) -> impl Iterator<Item = &ClassifiedRecord> {
        self.classified
            .iter()
            .filter(|r| r.is_correct() == Some(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;
    use crate::models::{Credential, Evaluation, Payload};

    fn setup(mode: Mode, keys: usize, items: usize) -> (RunState, Vec<Item>) {
        let credentials = (0..keys).map(|i| Credential::new(format!("sk-{:08}", i))).collect();
        let items: Vec<Item> = (0..items).map(|i| Item::new(i, format!("q{}", i), "A")).collect();
        let pool = CredentialPool::new(credentials, 100, items.len());
        (RunState::new(mode, &pool, &items), items)
    }

    fn answer(label: &str) -> Evaluation {
        Evaluation {
            payload: Payload::Answer {
                selected_answer: label.into(),
                reasoning: "r".into(),
            },
            captured_at: Local::now(),
        }
    }

    #[test]
    fn test_usage_counts_follow_assignment() {
        let (state, _) = setup(Mode::Evaluate, 3, 10);
        let usage: Vec<usize> = state.credentials.iter().map(|c| c.usage_count).collect();
        assert_eq!(usage, vec![4, 3, 3]);
    }

    #[test]
    fn test_usage_counts_use_item_indices() {
        let credentials = (0..3).map(|i| Credential::new(format!("sk-{:08}", i))).collect();
        let items: Vec<Item> = [0, 3, 6, 7].iter().map(|&i| Item::new(i, "q", "A")).collect();
        let pool = CredentialPool::new(credentials, 100, items.len());
        let state = RunState::new(Mode::Evaluate, &pool, &items);

        let usage: Vec<usize> = state.credentials.iter().map(|c| c.usage_count).collect();
        assert_eq!(usage, vec![3, 1, 0]);
        assert_eq!(usage, pool.usage_plan(items.iter().map(|item| item.index)));
    }

    #[test]
    fn test_apply_counts_and_rejects_duplicates() {
        let (mut state, items) = setup(Mode::Evaluate, 2, 3);
        let now = Instant::now();

        state.mark_in_flight(0, 0, now).unwrap();
        state
            .apply(Outcome::classified(items[0].clone(), 0, answer("a")).into(), now)
            .unwrap();
        state
            .apply(Outcome::classified(items[1].clone(), 1, answer("B")).into(), now)
            .unwrap();
        state
            .apply(
                Outcome::failed(items[2].clone(), 0, EvalError::transport("boom")).into(),
                now,
            )
            .unwrap();

        assert_eq!((state.completed, state.succeeded, state.failed, state.correct), (3, 2, 1, 1));

        let dup = state.apply(Outcome::classified(items[0].clone(), 0, answer("A")).into(), now);
        assert!(matches!(dup, Err(EvalError::AggregationFailure { .. })));
        assert_eq!(state.completed, 3);
        assert!(state.mark_in_flight(1, 1, now).is_err());
    }

    #[test]
    fn test_status_label_goes_idle() {
        let (mut state, items) = setup(Mode::Evaluate, 1, 1);
        let start = Instant::now();
        let idle_after = Duration::from_secs(5);

        state.mark_in_flight(0, 0, start).unwrap();
        assert_eq!(state.credentials[0].status_label(start, idle_after), "处理题目 1");

        state
            .apply(
                Outcome::failed(items[0].clone(), 0, EvalError::transport("连接被重置")).into(),
                start,
            )
            .unwrap();
        let label = state.credentials[0].status_label(start, idle_after);
        assert!(label.starts_with("题目1: 失败 - "), "{}", label);
        assert_eq!(
            state.credentials[0].status_label(start + Duration::from_secs(6), idle_after),
            "空闲"
        );
    }

    #[test]
    fn test_filter_mode_groups_target_categories() {
        let (mut state, items) = setup(Mode::Filter, 2, 3);
        let now = Instant::now();
        for (item, label) in items.iter().zip(["CT", "不相关", "CT"]) {
            let evaluation = Evaluation {
                payload: Payload::Category {
                    label: label.into(),
                    reasoning: "r".into(),
                },
                captured_at: Local::now(),
            };
            state
                .apply(Outcome::classified(item.clone(), item.index % 2, evaluation).into(), now)
                .unwrap();
        }

        let summary = state.finish();
        assert_eq!(summary.unrelated, 1);
        let ct: Vec<usize> = summary.groups[&Category::Ct].iter().map(|i| i.index).collect();
        assert_eq!(ct, vec![0, 2]);
    }
}
