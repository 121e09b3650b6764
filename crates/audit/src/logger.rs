use kxian_core::audit::entity::{AuditKind, AuditRecord};
use kxian_core::audit::error::AuditError;
use kxian_core::audit::port::AuditSink;
use kxian_core::common::time::TimeProvider;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

// 投递队列容量，满时丢弃并告警
const QUEUE_CAPACITY: usize = 4096;

enum Command {
    Record(Box<AuditRecord>),
    Flush(oneshot::Sender<()>),
}

/// # Summary
/// 审计日志器：非阻塞投递，后台线程串行扇出到各输出端。
///
/// # Invariants
/// - `emit` 永不阻塞、永不返回错误；投递失败只产生一条 tracing 告警。
/// - 单个输出端失败时，其余输出端会收到一条 `audit-sink-failure` 次级记录。
/// - 记录按投递顺序到达每个输出端。
pub struct AuditLogger {
    tx: Mutex<Option<mpsc::Sender<Command>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AuditLogger {
    /// # Summary
    /// 显式初始化并启动后台扇出线程。
    ///
    /// # Logic
    /// 1. 创建有界命令通道。
    /// 2. 在阻塞线程池中运行接收循环（输出端可执行同步 I/O）。
    ///
    /// # Arguments
    /// * `sinks`: 输出端列表。
    /// * `clock`: 用于次级故障记录的时间戳。
    ///
    /// # Returns
    /// 已启动的日志器。必须在 Tokio 运行时内调用。
    pub fn start(sinks: Vec<Arc<dyn AuditSink>>, clock: Arc<dyn TimeProvider>) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let names: Vec<&str> = sinks.iter().map(|s| s.name()).collect();
        info!(sinks = ?names, "audit logger started");

        let worker = tokio::task::spawn_blocking(move || run(rx, &sinks, clock.as_ref()));
        Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    fn sender(&self) -> Option<mpsc::Sender<Command>> {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// # Summary
    /// 投递一条记录（非阻塞）。
    ///
    /// # Logic
    /// 队列已满或日志器已关闭时丢弃该记录并输出告警。
    pub fn emit(&self, record: AuditRecord) {
        let Some(tx) = self.sender() else {
            warn!(operation = %record.operation, "audit logger closed, record dropped");
            return;
        };
        if let Err(e) = tx.try_send(Command::Record(Box::new(record))) {
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "queue full",
                mpsc::error::TrySendError::Closed(_) => "worker gone",
            };
            warn!(reason, "audit record dropped");
        }
    }

    /// # Summary
    /// 等待此前投递的所有记录写入各输出端并刷新。
    ///
    /// # Returns
    /// 日志器已关闭时返回 `AuditError::Closed`。
    pub async fn flush(&self) -> Result<(), AuditError> {
        let tx = self.sender().ok_or(AuditError::Closed)?;
        let (done_tx, done_rx) = oneshot::channel();
        tx.send(Command::Flush(done_tx))
            .await
            .map_err(|_| AuditError::Closed)?;
        done_rx.await.map_err(|_| AuditError::Closed)
    }

    /// # Summary
    /// 刷新、关闭通道并等待后台线程退出。重复调用无副作用。
    pub async fn shutdown(&self) {
        if let Err(e) = self.flush().await {
            debug!(error = %e, "audit flush skipped during shutdown");
        }
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = worker
            && let Err(e) = handle.await
        {
            warn!(error = %e, "audit worker terminated abnormally");
        }
        info!("audit logger stopped");
    }
}

fn run(mut rx: mpsc::Receiver<Command>, sinks: &[Arc<dyn AuditSink>], clock: &dyn TimeProvider) {
    while let Some(command) = rx.blocking_recv() {
        match command {
            Command::Record(record) => fan_out(&record, sinks, clock),
            Command::Flush(done) => {
                for sink in sinks {
                    if let Err(e) = sink.flush() {
                        warn!(sink = sink.name(), error = %e, "audit sink flush failed");
                    }
                }
                if done.send(()).is_err() {
                    debug!("flush requester went away");
                }
            }
        }
    }
}

/// # Summary
/// 将一条记录写入所有输出端。
///
/// # Logic
/// 1. 依次写入每个输出端。
/// 2. 写入失败时输出 tracing 告警，并向其余输出端补写一条 `audit-sink-failure` 记录。
/// 3. 次级记录的写入失败只告警，不再递归。
fn fan_out(record: &AuditRecord, sinks: &[Arc<dyn AuditSink>], clock: &dyn TimeProvider) {
    for (index, sink) in sinks.iter().enumerate() {
        let Err(e) = sink.write(record) else {
            continue;
        };
        warn!(sink = sink.name(), record = %record.id, error = %e, "audit sink write failed");

        let secondary = AuditRecord::new(
            clock.now(),
            AuditKind::Error,
            record.operation.clone(),
            record.symbol.clone(),
        )
        .param("sink", sink.name())
        .param("record", record.id)
        .failure("audit-sink-failure", e.to_string());

        for (other_index, other) in sinks.iter().enumerate() {
            if other_index == index {
                continue;
            }
            if let Err(e) = other.write(&secondary) {
                warn!(sink = other.name(), error = %e, "secondary audit record lost");
            }
        }
    }
}
