//! 密钥池 - 业务能力层
//!
//! 并发数 `effective_workers = min(max_workers, 密钥数, 题目数)`，只使用前
//! `effective_workers` 个密钥；第 `i` 道题固定分配第 `i % effective_workers` 个密钥。
//! 分配是 `i` 的纯函数，不需要加锁。

use crate::models::Credential;

/// 实际并发数
pub fn effective_workers(max_workers: usize, credentials: usize, items: usize) -> usize {
    max_workers.min(credentials).min(items)
}

/// 密钥池
#[derive(Debug, Clone)]
pub struct CredentialPool {
    credentials: Vec<Credential>,
}

impl CredentialPool {
    /// 按配置的最大并发数和题目数截取可用密钥（保持原有顺序）
    pub fn new(mut credentials: Vec<Credential>, max_workers: usize, item_count: usize) -> Self {
        let workers = effective_workers(max_workers, credentials.len(), item_count);
        credentials.truncate(workers);
        Self { credentials }
    }

    pub fn effective_workers(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }

    /// 第 `index` 道题使用的密钥槽位
    pub fn slot_for(&self, index: usize) -> Option<usize> {
        match self.credentials.len() {
            0 => None,
            n => Some(index % n),
        }
    }

    /// 第 `index` 道题分配到的 (槽位, 密钥)
    pub fn assign(&self, index: usize) -> Option<(usize, &Credential)> {
        self.slot_for(index).map(|slot| (slot, &self.credentials[slot]))
    }

    /// 按题号分配后每个密钥的使用次数
    pub fn usage_plan<I>(&self, indices: I) -> Vec<usize>
    where
        I: IntoIterator<Item = usize>,
    {
        let mut usage = vec![0; self.credentials.len()];
        for index in indices {
            if let Some(slot) = self.slot_for(index) {
                usage[slot] += 1;
            }
        }
        usage
    }
}
