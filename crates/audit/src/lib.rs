//! # `kxian-audit` - 审计日志
//!
//! `AuditLogger` 在后台线程中把记录扇出到多个 `AuditSink`，调用方只做非阻塞投递。

pub mod logger;
pub mod ring;
pub mod sink;
