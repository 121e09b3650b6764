use crate::cache::entity::CacheOrigin;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// # Summary
/// 审计记录种类。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    // 一次抓取尝试（含缓存命中）
    Fetch,
    // 一次指标计算
    Compute,
    // 失败或被拒收的数据
    Error,
}

impl std::fmt::Display for AuditKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditKind::Fetch => write!(f, "fetch"),
            AuditKind::Compute => write!(f, "compute"),
            AuditKind::Error => write!(f, "error"),
        }
    }
}

/// 失败详情。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFailure {
    pub kind: String,
    pub detail: String,
}

/// # Summary
/// 一条审计记录。
///
/// # Invariants
/// - 只追加，不修改。
/// - 携带足够的上下文（标的、参数、行数、关键字段）以复现用户看到的结果。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub kind: AuditKind,
    // profile / quote / history / news / indicators / request
    pub operation: String,
    pub symbol: String,
    pub params: BTreeMap<String, String>,
    pub origin: Option<CacheOrigin>,
    // 第几次尝试（从 1 开始）
    pub attempt: Option<u32>,
    // 成功前经历的重试次数
    pub retries: Option<u32>,
    pub rows: Option<usize>,
    // 关键规范字段摘要，例如报价的收盘价
    pub summary: BTreeMap<String, String>,
    pub error: Option<AuditFailure>,
}

impl AuditRecord {
    /// 创建一条空白记录。
    pub fn new(
        at: DateTime<Utc>,
        kind: AuditKind,
        operation: impl Into<String>,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            at,
            kind,
            operation: operation.into(),
            symbol: symbol.into(),
            params: BTreeMap::new(),
            origin: None,
            attempt: None,
            retries: None,
            rows: None,
            summary: BTreeMap::new(),
            error: None,
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(key.into(), value.to_string());
        self
    }

    pub fn origin(mut self, origin: CacheOrigin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn rows(mut self, rows: usize) -> Self {
        self.rows = Some(rows);
        self
    }

    pub fn summary(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.summary.insert(key.into(), value.to_string());
        self
    }

    pub fn failure(mut self, kind: impl Into<String>, detail: impl Into<String>) -> Self {
        self.error = Some(AuditFailure {
            kind: kind.into(),
            detail: detail.into(),
        });
        self
    }

    /// 结果摘要：成功为 "ok"，失败为错误种类。
    pub fn outcome(&self) -> &str {
        self.error.as_ref().map_or("ok", |e| e.kind.as_str())
    }
}
