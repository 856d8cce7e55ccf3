//! MemoryEventSink - テスト用にイベントを溜めておく sink

use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::SubscriberEvent;
use crate::ports::EventSink;

/// Clone しても同じバッファを共有する
#[derive(Debug, Clone, Default)]
pub struct MemoryEventSink {
    events: Arc<Mutex<Vec<SubscriberEvent>>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// これまでに記録したイベントのコピー
    pub fn events(&self) -> Vec<SubscriberEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 条件に合うイベントの数
    pub fn count(&self, predicate: impl Fn(&SubscriberEvent) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|ev| predicate(ev))
            .count()
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: SubscriberEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
