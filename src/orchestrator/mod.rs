//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和并发调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量评测处理器
//! - 管理应用生命周期（初始化、运行）
//! - 加载题库和密钥
//! - 运行结束后写出结果文件和报告
//!
//! ### `dispatcher` - 调度器
//! - 按题号轮转分配密钥
//! - 控制并发数量（Semaphore）
//! - 等待全部任务结束，补记异常退出的任务
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (加载 / 落盘 / 报告)
//!     ↓
//! dispatcher (处理 Vec<Item>)
//!     ↓
//! workflow::ItemFlow (处理单个 Item)
//!     ↓
//! services (能力层：evaluator / aggregator / monitor / report)
//!     ↓
//! clients (远程补全服务)
//! ```

pub mod batch_processor;
pub mod dispatcher;

// 重新导出主要类型
pub use batch_processor::App;
pub use dispatcher::Dispatcher;
