use thiserror::Error;

/// # Summary
/// 审计输出错误枚举。
///
/// # Invariants
/// - 审计错误只会被降级为次级记录，绝不向请求方传播。
#[derive(Error, Debug)]
pub enum AuditError {
    // 写入底层介质失败
    #[error("Sink write error: {0}")]
    Write(String),
    // 记录序列化失败
    #[error("Serialize error: {0}")]
    Serialize(String),
    // 后台通道已关闭
    #[error("Audit channel closed")]
    Closed,
}
