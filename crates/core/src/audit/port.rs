use crate::audit::entity::AuditRecord;
use crate::audit::error::AuditError;

/// # Summary
/// 审计记录输出端接口（控制台、文件、远端收集器等）。
///
/// # Invariants
/// - 在后台线程中被串行调用，可以执行阻塞 I/O。
/// - 实现必须是 `Send` 和 `Sync`。
pub trait AuditSink: Send + Sync {
    /// 输出端名称，用于次级故障记录。
    fn name(&self) -> &str;

    /// # Summary
    /// 写出一条记录。
    ///
    /// # Returns
    /// * 成功返回 `Ok(())`。
    /// * 失败返回 `Err(AuditError)`，由调用方降级处理。
    fn write(&self, record: &AuditRecord) -> Result<(), AuditError>;

    /// 刷新缓冲区，默认无操作。
    fn flush(&self) -> Result<(), AuditError> {
        Ok(())
    }
}
