//! 进程内记忆化缓存：TTL + LRU 容量上限 + 单飞合并 + 负缓存。

pub mod mem;
