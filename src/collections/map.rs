//! 关联映射
//!
//! 与数组相同的契约，但按元素身份存储在 `IndexMap` 中，适合编号稀疏或长期存在的场景。

use super::ElementAssociation;
use crate::error::Result;
use crate::graph::registry::{Purge, Registry};
use crate::graph::{Element, Graph};
use crate::types::GraphUid;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

struct MapStore<K, T> {
    entries: IndexMap<u32, (K, T)>,
    default: Option<T>,
    clear: bool,
}

impl<K: Element, T: Send> Purge for Mutex<MapStore<K, T>> {
    fn purge(&self, id: u32, stamp: u64) {
        let mut store = self.lock();
        if store
            .entries
            .get(&id)
            .is_some_and(|(k, _)| k.stamp() == stamp)
        {
            store.entries.shift_remove(&id);
        }
    }
}

/// 以节点或边为键的映射，迭代按插入顺序
pub struct ElementMap<K: Element, T> {
    registry: Arc<Registry>,
    store: Arc<Mutex<MapStore<K, T>>>,
}

impl<K: Element, T: Clone + PartialEq + Send + 'static> ElementMap<K, T> {
    /// 无默认值的映射：`get_or_default` 需要 `T: Default`
    pub fn new(graph: &Graph) -> Self {
        Self::attach(
            Arc::clone(graph.registry()),
            MapStore {
                entries: IndexMap::new(),
                default: None,
                clear: true,
            },
        )
    }

    pub fn filled(graph: &Graph, default: T) -> Self {
        Self::attach(
            Arc::clone(graph.registry()),
            MapStore {
                entries: IndexMap::new(),
                default: Some(default),
                clear: true,
            },
        )
    }

    fn attach(registry: Arc<Registry>, store: MapStore<K, T>) -> Self {
        let store = Arc::new(Mutex::new(store));
        let hook: Weak<dyn Purge> = Arc::downgrade(&store) as Weak<dyn Purge>;
        registry.register(K::KIND, hook);
        Self { registry, store }
    }

    pub fn graph_uid(&self) -> GraphUid {
        self.registry.uid()
    }

    pub fn get(&self, key: K) -> Result<Option<T>> {
        self.registry.check(&key)?;
        Ok(self
            .store
            .lock()
            .entries
            .get(&(key.index() as u32))
            .map(|(_, v)| v.clone()))
    }

    pub fn contains_key(&self, key: K) -> Result<bool> {
        self.registry.check(&key)?;
        Ok(self.store.lock().entries.contains_key(&(key.index() as u32)))
    }

    pub fn set(&mut self, key: K, value: T) -> Result<Option<T>> {
        self.registry.check(&key)?;
        let mut store = self.store.lock();
        if store.default.as_ref() != Some(&value) {
            store.clear = false;
        }
        Ok(store
            .entries
            .insert(key.index() as u32, (key, value))
            .map(|(_, old)| old))
    }

    pub fn unset(&mut self, key: K) -> Result<Option<T>> {
        self.registry.check(&key)?;
        Ok(self
            .store
            .lock()
            .entries
            .shift_remove(&(key.index() as u32))
            .map(|(_, old)| old))
    }

    /// 为所有存活元素存储同一个值，按编号顺序插入
    pub fn set_all(&mut self, value: T) {
        let uid = self.registry.uid();
        let live = self.registry.live_slots(K::KIND);
        let mut store = self.store.lock();
        if store.default.as_ref() != Some(&value) {
            store.clear = false;
        }
        for (id, stamp) in live {
            let key = K::from_parts(uid, id, stamp);
            store.entries.insert(id, (key, value.clone()));
        }
    }

    pub fn clear(&mut self) {
        let mut store = self.store.lock();
        store.entries.clear();
        store.clear = true;
    }

    pub fn is_clear(&self) -> bool {
        self.store.lock().clear
    }

    pub fn len(&self) -> usize {
        self.store.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 条目快照（插入顺序）
    pub fn entries(&self) -> Vec<(K, T)> {
        self.store.lock().entries.values().cloned().collect()
    }

    pub fn keys(&self) -> Vec<K> {
        self.store.lock().entries.values().map(|(k, _)| *k).collect()
    }
}

impl<K: Element, T: Clone + PartialEq + Default + Send + 'static> ElementMap<K, T> {
    pub fn get_or_default(&self, key: K) -> Result<T> {
        let stored = self.get(key)?;
        Ok(match stored {
            Some(v) => v,
            None => self.store.lock().default.clone().unwrap_or_default(),
        })
    }
}

impl<K: Element, T: Clone + PartialEq + Default + Send + 'static> ElementAssociation<K, T>
    for ElementMap<K, T>
{
    fn get(&self, key: K) -> Result<Option<T>> {
        ElementMap::get(self, key)
    }

    fn get_or_default(&self, key: K) -> Result<T> {
        ElementMap::get_or_default(self, key)
    }

    fn set(&mut self, key: K, value: T) -> Result<Option<T>> {
        ElementMap::set(self, key, value)
    }

    fn unset(&mut self, key: K) -> Result<Option<T>> {
        ElementMap::unset(self, key)
    }

    fn set_all(&mut self, value: T) {
        ElementMap::set_all(self, value)
    }

    fn clear(&mut self) {
        ElementMap::clear(self)
    }

    fn is_clear(&self) -> bool {
        ElementMap::is_clear(self)
    }
}

impl<K: Element, T: Clone + PartialEq + Send + 'static> Clone for ElementMap<K, T> {
    fn clone(&self) -> Self {
        let copy = {
            let store = self.store.lock();
            MapStore {
                entries: store.entries.clone(),
                default: store.default.clone(),
                clear: store.clear,
            }
        };
        Self::attach(Arc::clone(&self.registry), copy)
    }
}

impl<K: Element, T> Drop for ElementMap<K, T> {
    fn drop(&mut self) {
        self.registry
            .deregister(K::KIND, Arc::as_ptr(&self.store) as *const ());
    }
}

impl<K: Element, T> fmt::Debug for ElementMap<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementMap")
            .field("kind", &K::KIND)
            .field("graph", &self.registry.uid())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::{EdgeMap, NodeMap};

    #[test]
    fn test_insertion_order_and_purge() {
        let mut g = Graph::new();
        let a = g.new_node();
        let b = g.new_node();
        let c = g.new_node();
        let mut map: NodeMap<&'static str> = NodeMap::new(&g);
        map.set(c, "c").unwrap();
        map.set(a, "a").unwrap();
        map.set(b, "b").unwrap();
        assert_eq!(map.keys(), vec![c, a, b]);

        g.delete_node(a).unwrap();

        assert_eq!(map.entries(), vec![(c, "c"), (b, "b")]);
        assert!(map.get(a).unwrap_err().is_not_owner());
        assert!(map.contains_key(b).unwrap());
    }

    #[test]
    fn test_default_and_clear_flag() {
        let mut g = Graph::new();
        let a = g.new_node();
        let b = g.new_node();
        let e = g.new_edge(a, b).unwrap();
        let mut map: EdgeMap<i32> = EdgeMap::filled(&g, 7);

        assert_eq!(map.get(e).unwrap(), None);
        assert_eq!(map.get_or_default(e).unwrap(), 7);
        map.set(e, 7).unwrap();
        assert!(map.is_clear());
        map.set(e, 8).unwrap();
        assert!(!map.is_clear());
        assert_eq!(map.unset(e).unwrap(), Some(8));

        let plain: EdgeMap<i32> = EdgeMap::new(&g);
        assert_eq!(plain.get_or_default(e).unwrap(), 0);
    }

    #[test]
    fn test_set_all_and_clone_independent() {
        let mut g = Graph::new();
        let a = g.new_node();
        let b = g.new_node();
        let mut map: NodeMap<u32> = NodeMap::new(&g);
        map.set_all(1);
        assert_eq!(map.len(), 2);

        let mut copy = map.clone();
        copy.set(a, 5).unwrap();
        assert_eq!(map.get(a).unwrap(), Some(1));
        assert_eq!(copy.get(a).unwrap(), Some(5));

        g.delete_node(b).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(copy.len(), 1);

        copy.clear();
        assert!(copy.is_empty());
        assert!(copy.is_clear());
    }

    #[test]
    fn test_stale_entry_not_visible_after_reset() {
        let mut g = Graph::new();
        let a = g.new_node();
        let mut map: NodeMap<i32> = NodeMap::new(&g);
        map.set(a, 1).unwrap();
        g.clear();
        let fresh = g.new_node();
        assert_eq!(fresh.id(), a.id());
        assert_eq!(map.get(fresh).unwrap(), None);
    }
}
