//! # 行情编排
//!
//! 把数据源适配器、单飞缓存、指标引擎与审计日志组合成一次带超时的数据请求。

pub mod directory;
pub mod orchestrator;
pub mod retry;
