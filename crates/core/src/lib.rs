//! # `kxian-core` - 领域模型与端口
//!
//! 定义规范化的证券、K 线、指标、缓存与审计实体，以及各层之间的 trait 契约。
//! 本 crate 不做任何 I/O，具体实现分布在 `kxian-feed`、`kxian-cache`、`kxian-indicator`、
//! `kxian-audit` 与 `kxian-market` 中。

pub mod common;
pub mod config;

pub mod market {
    pub mod entity;
    pub mod error;
    pub mod port;
    pub mod request;
}

pub mod indicator {
    pub mod entity;
}

pub mod cache {
    pub mod entity;
    pub mod port;
}

pub mod audit {
    pub mod entity;
    pub mod error;
    pub mod port;
}

#[cfg(feature = "test-utils")]
pub mod testing;
