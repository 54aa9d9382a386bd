//! 元素存活表与辅助结构登记处
//!
//! 图与其辅助结构共享同一个 `Registry`：图在创建/删除元素时更新存活表，
//! 辅助结构据此校验键，并登记清理钩子，在元素删除时被同步清除对应条目。

use super::element::{Element, ElementKind};
use crate::error::{Error, Result};
use crate::types::GraphUid;
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};

/// 元素删除时由图回调
pub(crate) trait Purge: Send + Sync {
    fn purge(&self, id: u32, stamp: u64);
}

#[derive(Default)]
struct KindTable {
    /// 槽位 -> 创建序号，0 表示空闲
    stamps: RwLock<Vec<u64>>,
    hooks: Mutex<Vec<Weak<dyn Purge>>>,
}

pub(crate) struct Registry {
    uid: GraphUid,
    tables: [KindTable; 2],
}

impl Registry {
    pub(crate) fn new(uid: GraphUid) -> Arc<Self> {
        Arc::new(Self {
            uid,
            tables: [KindTable::default(), KindTable::default()],
        })
    }

    pub(crate) fn uid(&self) -> GraphUid {
        self.uid
    }

    fn table(&self, kind: ElementKind) -> &KindTable {
        &self.tables[kind.index()]
    }

    pub(crate) fn activate(&self, kind: ElementKind, id: u32, stamp: u64) {
        let mut stamps = self.table(kind).stamps.write();
        let idx = id as usize;
        if stamps.len() <= idx {
            stamps.resize(idx + 1, 0);
        }
        stamps[idx] = stamp;
    }

    pub(crate) fn retire(&self, kind: ElementKind, id: u32) {
        if let Some(s) = self.table(kind).stamps.write().get_mut(id as usize) {
            *s = 0;
        }
    }

    /// 编号计数器归零时截断存活表
    pub(crate) fn reset(&self, kind: ElementKind) {
        self.table(kind).stamps.write().clear();
    }

    pub(crate) fn retire_all(&self) {
        self.reset(ElementKind::Node);
        self.reset(ElementKind::Edge);
    }

    /// 存活表长度（即最大编号 + 1）
    pub(crate) fn capacity(&self, kind: ElementKind) -> usize {
        self.table(kind).stamps.read().len()
    }

    pub(crate) fn is_live<K: Element>(&self, k: &K) -> bool {
        k.owner_uid() == self.uid
            && k.stamp() != 0
            && self
                .table(K::KIND)
                .stamps
                .read()
                .get(k.index())
                .is_some_and(|&s| s == k.stamp())
    }

    pub(crate) fn check<K: Element>(&self, k: &K) -> Result<()> {
        if self.is_live(k) {
            Ok(())
        } else {
            Err(Error::NotOwner(format!(
                "{} {} (属于 {}, 当前图 {})",
                K::KIND.name(),
                k,
                k.owner_uid(),
                self.uid
            )))
        }
    }

    /// 所有存活槽位 (编号, 序号)，按编号升序
    pub(crate) fn live_slots(&self, kind: ElementKind) -> Vec<(u32, u64)> {
        self.table(kind)
            .stamps
            .read()
            .iter()
            .enumerate()
            .filter(|(_, &s)| s != 0)
            .map(|(i, &s)| (i as u32, s))
            .collect()
    }

    pub(crate) fn register(&self, kind: ElementKind, hook: Weak<dyn Purge>) {
        let mut hooks = self.table(kind).hooks.lock();
        hooks.retain(|h| h.strong_count() > 0);
        hooks.push(hook);
    }

    /// 按地址注销（辅助结构 drop 时调用）
    pub(crate) fn deregister(&self, kind: ElementKind, ptr: *const ()) {
        self.table(kind)
            .hooks
            .lock()
            .retain(|h| h.strong_count() > 0 && h.as_ptr() as *const () != ptr);
    }

    /// 同步清除所有登记结构中该元素的条目
    pub(crate) fn purge(&self, kind: ElementKind, id: u32, stamp: u64) {
        let live: Vec<Arc<dyn Purge>> = {
            let mut hooks = self.table(kind).hooks.lock();
            hooks.retain(|h| h.strong_count() > 0);
            hooks.iter().filter_map(Weak::upgrade).collect()
        };
        for hook in live {
            hook.purge(id, stamp);
        }
    }

    pub(crate) fn hook_count(&self, kind: ElementKind) -> usize {
        let mut hooks = self.table(kind).hooks.lock();
        hooks.retain(|h| h.strong_count() > 0);
        hooks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(AtomicUsize);

    impl Purge for Counter {
        fn purge(&self, _id: u32, _stamp: u64) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_liveness() {
        let reg = Registry::new(GraphUid(42));
        reg.activate(ElementKind::Node, 2, 5);

        let v = Node {
            graph: GraphUid(42),
            id: 2,
            stamp: 5,
        };
        assert!(reg.is_live(&v));
        assert!(!reg.is_live(&Node { stamp: 6, ..v }));
        assert!(!reg.is_live(&Node {
            graph: GraphUid(43),
            ..v
        }));
        assert_eq!(reg.capacity(ElementKind::Node), 3);
        assert_eq!(reg.live_slots(ElementKind::Node), vec![(2, 5)]);

        reg.retire(ElementKind::Node, 2);
        assert!(reg.check(&v).unwrap_err().is_not_owner());
    }

    #[test]
    fn test_hooks_prune_and_purge() {
        let reg = Registry::new(GraphUid(1));
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let weak: Weak<dyn Purge> = Arc::downgrade(&counter) as Weak<dyn Purge>;
        reg.register(ElementKind::Edge, weak);

        {
            let temp = Arc::new(Counter(AtomicUsize::new(0)));
            reg.register(ElementKind::Edge, Arc::downgrade(&temp) as Weak<dyn Purge>);
            assert_eq!(reg.hook_count(ElementKind::Edge), 2);
        }
        assert_eq!(reg.hook_count(ElementKind::Edge), 1);

        reg.purge(ElementKind::Edge, 0, 1);
        reg.purge(ElementKind::Node, 0, 1);
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);

        reg.deregister(ElementKind::Edge, Arc::as_ptr(&counter) as *const ());
        assert_eq!(reg.hook_count(ElementKind::Edge), 0);
    }
}
