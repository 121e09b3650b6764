use kxian_core::audit::entity::{AuditKind, AuditRecord};
use kxian_core::audit::error::AuditError;
use kxian_core::audit::port::AuditSink;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

/// # Summary
/// 把审计记录写成结构化 `tracing` 事件（target = `kxian::audit`）。
///
/// # Invariants
/// - `error` 类记录使用 WARN 级别，其余使用 INFO。
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    fn write(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let origin = record.origin.map(|o| o.to_string()).unwrap_or_default();
        let detail = record
            .error
            .as_ref()
            .map(|e| e.detail.as_str())
            .unwrap_or_default();
        match record.kind {
            AuditKind::Error => tracing::warn!(
                target: "kxian::audit",
                id = %record.id,
                at = %record.at.to_rfc3339(),
                kind = %record.kind,
                operation = %record.operation,
                symbol = %record.symbol,
                params = ?record.params,
                outcome = record.outcome(),
                detail,
                "audit"
            ),
            _ => tracing::info!(
                target: "kxian::audit",
                id = %record.id,
                at = %record.at.to_rfc3339(),
                kind = %record.kind,
                operation = %record.operation,
                symbol = %record.symbol,
                params = ?record.params,
                origin = %origin,
                attempt = record.attempt,
                retries = record.retries,
                rows = record.rows,
                summary = ?record.summary,
                outcome = record.outcome(),
                "audit"
            ),
        }
        Ok(())
    }
}

/// # Summary
/// 每条记录一行 JSON 的输出端，可写入任意 `Write` 实现（文件、内存等）。
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// 取回底层 writer。
    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl JsonLinesSink<BufWriter<File>> {
    /// # Summary
    /// 以追加模式打开审计文件，必要时创建父目录。
    ///
    /// # Arguments
    /// * `path`: 文件路径。
    ///
    /// # Returns
    /// 成功返回输出端，失败返回 `AuditError::Write`。
    pub fn create(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| AuditError::Write(e.to_string()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| AuditError::Write(e.to_string()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write + Send> AuditSink for JsonLinesSink<W> {
    fn name(&self) -> &str {
        "json-lines"
    }

    fn write(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let mut line =
            serde_json::to_vec(record).map_err(|e| AuditError::Serialize(e.to_string()))?;
        line.push(b'\n');
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write_all(&line)
            .map_err(|e| AuditError::Write(e.to_string()))
    }

    fn flush(&self) -> Result<(), AuditError> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()
            .map_err(|e| AuditError::Write(e.to_string()))
    }
}
