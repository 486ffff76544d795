pub mod artifact_writer;
pub mod credential_pool;
pub mod evaluator;
pub mod progress_monitor;
pub mod report_generator;
pub mod result_aggregator;
pub mod run_state;

pub use artifact_writer::ArtifactWriter;
pub use credential_pool::{effective_workers, CredentialPool};
pub use evaluator::Evaluator;
pub use progress_monitor::{MonitorHandle, MonitorSettings, ProgressMonitor, ProgressSnapshot};
pub use report_generator::{ReportGenerator, RunStatistics};
pub use result_aggregator::ResultAggregator;
pub use run_state::{CredentialUsage, RunState, RunSummary};
