//! Metric names emitted by the engine.

/// Executions created (counter).
pub const EXECUTIONS_CREATED_TOTAL: &str = "executions_created_total";
/// Executions removed by the sweep (counter).
pub const EXECUTIONS_SWEPT_TOTAL: &str = "executions_swept_total";
/// Registered executions (gauge).
pub const EXECUTIONS_ACTIVE: &str = "executions_active";
/// State frames that could not be queued (counter).
pub const BROADCAST_SEND_FAILURES_TOTAL: &str = "broadcast_send_failures_total";
/// Timer-driven question finishes (counter).
pub const AUTO_ADVANCE_TOTAL: &str = "auto_advance_total";
