use kxian_core::audit::entity::AuditRecord;
use kxian_core::audit::error::AuditError;
use kxian_core::audit::port::AuditSink;
use std::sync::{Mutex, PoisonError};

/// # Summary
/// 固定容量的环形缓冲区，满后覆盖最旧的元素。
///
/// # Invariants
/// - 存储空间在首次填满后不再增长。
/// - `snapshot` 始终按插入顺序返回。
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<T>,
    capacity: usize,
    // 下一次覆盖的位置（仅在已满时有意义）
    head: usize,
}

impl<T: Clone> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        }
    }

    /// # Summary
    /// 追加一个元素。
    ///
    /// # Logic
    /// 1. 容量为 0 时直接丢弃。
    /// 2. 未满时追加到尾部。
    /// 3. 已满时覆盖 `head` 处最旧的元素，`head` 前移一位（取模）。
    pub fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        if self.slots.len() < self.capacity {
            self.slots.push(item);
        } else {
            self.slots[self.head] = item;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// 按插入顺序复制全部元素。
    pub fn snapshot(&self) -> Vec<T> {
        let (newer, older) = self.slots.split_at(self.head);
        older.iter().chain(newer).cloned().collect()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.head = 0;
    }
}

/// # Summary
/// 保留最近 N 条审计记录的内存输出端，用于近期回溯与测试断言。
pub struct RingSink {
    records: Mutex<RingBuffer<AuditRecord>>,
}

impl RingSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(RingBuffer::new(capacity)),
        }
    }

    /// 当前保留的记录（旧到新）。
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl AuditSink for RingSink {
    fn name(&self) -> &str {
        "ring"
    }

    fn write(&self, record: &AuditRecord) -> Result<(), AuditError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_keeps_latest_in_order() {
        let mut ring = RingBuffer::new(3);
        for i in 1..=5 {
            ring.push(i);
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.snapshot(), vec![3, 4, 5]);

        ring.push(6);
        assert_eq!(ring.snapshot(), vec![4, 5, 6]);
    }

    #[test]
    fn test_ring_partial_fill() {
        let mut ring = RingBuffer::new(4);
        ring.push("a");
        ring.push("b");
        assert_eq!(ring.snapshot(), vec!["a", "b"]);
    }

    #[test]
    fn test_zero_capacity_retains_nothing() {
        let mut ring = RingBuffer::new(0);
        ring.push(1);
        assert!(ring.is_empty());
        assert!(ring.snapshot().is_empty());
    }
}
