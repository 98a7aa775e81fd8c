//! Repository pattern implementations for database access
//!
//! One repository per table: orchestration runs, execution sources,
//! execution records, pending executions and source watermarks.

pub mod execution_record_repo;
pub mod execution_source_repo;
pub mod orchestration_run_repo;
pub mod pending_execution_repo;
pub mod watermark_repo;

pub use execution_record_repo::ExecutionRecordRepository;
pub use execution_source_repo::ExecutionSourceRepository;
pub use orchestration_run_repo::OrchestrationRunRepository;
pub use pending_execution_repo::PendingExecutionRepository;
pub use watermark_repo::WatermarkRepository;
