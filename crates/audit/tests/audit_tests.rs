use chrono::{TimeZone, Utc};
use kxian_audit::logger::AuditLogger;
use kxian_audit::ring::RingSink;
use kxian_audit::sink::{JsonLinesSink, TracingSink};
use kxian_core::audit::entity::{AuditKind, AuditRecord};
use kxian_core::audit::error::AuditError;
use kxian_core::audit::port::AuditSink;
use kxian_core::cache::entity::CacheOrigin;
use kxian_core::common::time::{ManualClock, RealTimeProvider};
use std::sync::Arc;

/// # Summary
/// 总是写入失败的输出端。
struct BrokenSink;

impl AuditSink for BrokenSink {
    fn name(&self) -> &str {
        "broken"
    }

    fn write(&self, _record: &AuditRecord) -> Result<(), AuditError> {
        Err(AuditError::Write("disk full".to_string()))
    }
}

fn fetch_record(operation: &str) -> AuditRecord {
    AuditRecord::new(Utc::now(), AuditKind::Fetch, operation, "600519.SH")
        .param("granularity", "day")
        .origin(CacheOrigin::Computed)
        .attempt(1)
        .rows(10)
}

#[tokio::test]
async fn test_records_reach_sinks_in_order() {
    let ring = Arc::new(RingSink::new(16));
    let sinks: Vec<Arc<dyn AuditSink>> = vec![ring.clone(), Arc::new(TracingSink)];
    let logger = AuditLogger::start(sinks, Arc::new(RealTimeProvider));

    logger.emit(fetch_record("profile"));
    logger.emit(fetch_record("quote"));
    logger.emit(fetch_record("history"));
    logger.flush().await.unwrap();

    let operations: Vec<String> = ring.records().into_iter().map(|r| r.operation).collect();
    assert_eq!(operations, vec!["profile", "quote", "history"]);

    logger.shutdown().await;
}

#[tokio::test]
async fn test_json_lines_sink_writes_one_object_per_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit").join("records.jsonl");

    let sink: Arc<dyn AuditSink> = Arc::new(JsonLinesSink::create(&path).unwrap());
    let logger = AuditLogger::start(vec![sink], Arc::new(RealTimeProvider));
    logger.emit(fetch_record("history"));
    logger.emit(
        AuditRecord::new(Utc::now(), AuditKind::Error, "history", "600519.SH")
            .failure("unparseable-required-field", "row 3: close"),
    );
    logger.shutdown().await;

    let content = std::fs::read_to_string(&path).unwrap();
    let records: Vec<AuditRecord> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].rows, Some(10));
    assert_eq!(records[1].outcome(), "unparseable-required-field");
}

#[tokio::test]
async fn test_failing_sink_produces_secondary_record() {
    let at = Utc.with_ymd_and_hms(2024, 6, 3, 1, 0, 0).unwrap();
    let ring = Arc::new(RingSink::new(16));
    let sinks: Vec<Arc<dyn AuditSink>> = vec![Arc::new(BrokenSink), ring.clone()];
    let logger = AuditLogger::start(sinks, Arc::new(ManualClock::new(at)));

    let original = fetch_record("quote");
    let original_id = original.id;
    logger.emit(original);
    logger.flush().await.unwrap();

    let records = ring.records();
    assert_eq!(records.len(), 2);
    // 次级记录先于原记录写入 ring（坏输出端排在前面）
    let secondary = &records[0];
    assert_eq!(secondary.kind, AuditKind::Error);
    assert_eq!(secondary.at, at);
    assert_eq!(secondary.outcome(), "audit-sink-failure");
    assert_eq!(secondary.params.get("sink").map(String::as_str), Some("broken"));
    assert_eq!(records[1].id, original_id);

    logger.shutdown().await;
}

#[tokio::test]
async fn test_emit_after_shutdown_is_harmless() {
    let ring = Arc::new(RingSink::new(4));
    let sinks: Vec<Arc<dyn AuditSink>> = vec![ring.clone()];
    let logger = AuditLogger::start(sinks, Arc::new(RealTimeProvider));
    logger.shutdown().await;

    logger.emit(fetch_record("news"));
    assert!(matches!(logger.flush().await, Err(AuditError::Closed)));
    assert!(ring.records().is_empty());

    // 重复关闭无副作用
    logger.shutdown().await;
}

#[tokio::test]
async fn test_ring_sink_retention_is_bounded() {
    let ring = Arc::new(RingSink::new(2));
    let sinks: Vec<Arc<dyn AuditSink>> = vec![ring.clone()];
    let logger = AuditLogger::start(sinks, Arc::new(RealTimeProvider));
    for operation in ["profile", "quote", "history"] {
        logger.emit(fetch_record(operation));
    }
    logger.flush().await.unwrap();

    let records = ring.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].operation, "quote");
    assert_eq!(records[1].operation, "history");

    ring.clear();
    assert!(ring.records().is_empty());
    logger.shutdown().await;
}
