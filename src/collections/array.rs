//! 稠密关联数组
//!
//! 以元素编号为下标的可增长缓冲区，越界写入时容量成倍增长。

use super::ElementAssociation;
use crate::error::Result;
use crate::graph::registry::{Purge, Registry};
use crate::graph::{Element, Graph};
use crate::types::GraphUid;
use num_traits::Num;
use parking_lot::Mutex;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

struct ArrayStore<T> {
    slots: Vec<Option<T>>,
    default: T,
    clear: bool,
}

impl<T: Clone> ArrayStore<T> {
    fn slot_mut(&mut self, idx: usize) -> &mut Option<T> {
        if idx >= self.slots.len() {
            let mut len = self.slots.len().max(1);
            while len <= idx {
                len *= 2;
            }
            self.slots.resize(len, None);
        }
        &mut self.slots[idx]
    }
}

impl<T: Send> Purge for Mutex<ArrayStore<T>> {
    fn purge(&self, id: u32, _stamp: u64) {
        if let Some(slot) = self.lock().slots.get_mut(id as usize) {
            *slot = None;
        }
    }
}

/// 以节点或边为键的数组
pub struct ElementArray<K: Element, T> {
    registry: Arc<Registry>,
    store: Arc<Mutex<ArrayStore<T>>>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: Element, T: Clone + PartialEq + Send + 'static> ElementArray<K, T> {
    /// 默认值为 `T::default()` 的数组
    pub fn new(graph: &Graph) -> Self
    where
        T: Default,
    {
        Self::filled(graph, T::default())
    }

    /// 所有键默认映射到 `default`
    pub fn filled(graph: &Graph, default: T) -> Self {
        let registry = Arc::clone(graph.registry());
        let capacity = registry.capacity(K::KIND);
        Self::attach(
            registry,
            ArrayStore {
                slots: vec![None; capacity],
                default,
                clear: true,
            },
        )
    }

    fn attach(registry: Arc<Registry>, store: ArrayStore<T>) -> Self {
        let store = Arc::new(Mutex::new(store));
        let hook: Weak<dyn Purge> = Arc::downgrade(&store) as Weak<dyn Purge>;
        registry.register(K::KIND, hook);
        Self {
            registry,
            store,
            _kind: PhantomData,
        }
    }

    /// 所属图
    pub fn graph_uid(&self) -> GraphUid {
        self.registry.uid()
    }

    fn index(&self, key: K) -> Result<usize> {
        self.registry.check(&key)?;
        Ok(key.index())
    }

    pub fn get(&self, key: K) -> Result<Option<T>> {
        let idx = self.index(key)?;
        Ok(self.store.lock().slots.get(idx).cloned().flatten())
    }

    pub fn get_or_default(&self, key: K) -> Result<T> {
        let idx = self.index(key)?;
        let store = self.store.lock();
        Ok(match store.slots.get(idx) {
            Some(Some(v)) => v.clone(),
            _ => store.default.clone(),
        })
    }

    pub fn set(&mut self, key: K, value: T) -> Result<Option<T>> {
        let idx = self.index(key)?;
        let mut store = self.store.lock();
        if value != store.default {
            store.clear = false;
        }
        Ok(store.slot_mut(idx).replace(value))
    }

    pub fn unset(&mut self, key: K) -> Result<Option<T>> {
        let idx = self.index(key)?;
        Ok(self
            .store
            .lock()
            .slots
            .get_mut(idx)
            .and_then(Option::take))
    }

    pub fn set_all(&mut self, value: T) {
        let live = self.registry.live_slots(K::KIND);
        let mut store = self.store.lock();
        if value != store.default {
            store.clear = false;
        }
        for (id, _) in live {
            *store.slot_mut(id as usize) = Some(value.clone());
        }
    }

    pub fn clear(&mut self) {
        let mut store = self.store.lock();
        store.slots.iter_mut().for_each(|s| *s = None);
        store.clear = true;
    }

    pub fn is_clear(&self) -> bool {
        self.store.lock().clear
    }

    /// 显式存储的条目数
    pub fn len(&self) -> usize {
        self.store.lock().slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 当前缓冲区长度
    pub fn capacity(&self) -> usize {
        self.store.lock().slots.len()
    }
}

/// 数值访问：缺省条目按零处理
impl<K: Element, T: Num + Clone + Send + 'static> ElementArray<K, T> {
    pub fn value(&self, key: K) -> Result<T> {
        Ok(self.get(key)?.unwrap_or_else(T::zero))
    }

    /// 累加并返回新值
    pub fn add(&mut self, key: K, delta: T) -> Result<T> {
        let next = self.value(key)? + delta;
        self.set(key, next.clone())?;
        Ok(next)
    }

    pub fn increment(&mut self, key: K) -> Result<T> {
        self.add(key, T::one())
    }

    pub fn decrement(&mut self, key: K) -> Result<T> {
        let next = self.value(key)? - T::one();
        self.set(key, next.clone())?;
        Ok(next)
    }
}

impl<K: Element, T: Clone + PartialEq + Send + 'static> ElementAssociation<K, T>
    for ElementArray<K, T>
{
    fn get(&self, key: K) -> Result<Option<T>> {
        ElementArray::get(self, key)
    }

    fn get_or_default(&self, key: K) -> Result<T> {
        ElementArray::get_or_default(self, key)
    }

    fn set(&mut self, key: K, value: T) -> Result<Option<T>> {
        ElementArray::set(self, key, value)
    }

    fn unset(&mut self, key: K) -> Result<Option<T>> {
        ElementArray::unset(self, key)
    }

    fn set_all(&mut self, value: T) {
        ElementArray::set_all(self, value)
    }

    fn clear(&mut self) {
        ElementArray::clear(self)
    }

    fn is_clear(&self) -> bool {
        ElementArray::is_clear(self)
    }
}

/// 复制构造：同一图上的独立数组，保留各键的值与 `is_clear` 状态
impl<K: Element, T: Clone + PartialEq + Send + 'static> Clone for ElementArray<K, T> {
    fn clone(&self) -> Self {
        let copy = {
            let store = self.store.lock();
            ArrayStore {
                slots: store.slots.clone(),
                default: store.default.clone(),
                clear: store.clear,
            }
        };
        Self::attach(Arc::clone(&self.registry), copy)
    }
}

impl<K: Element, T> Drop for ElementArray<K, T> {
    fn drop(&mut self) {
        self.registry
            .deregister(K::KIND, Arc::as_ptr(&self.store) as *const ());
    }
}

impl<K: Element, T> fmt::Debug for ElementArray<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementArray")
            .field("kind", &K::KIND)
            .field("graph", &self.registry.uid())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::{EdgeArray, NodeArray};
    use crate::graph::ElementKind;

    #[test]
    fn test_get_set_default() {
        let mut g = Graph::new();
        let a = g.new_node();
        let b = g.new_node();
        let mut arr: NodeArray<i64> = NodeArray::filled(&g, -1);

        assert_eq!(arr.get(a).unwrap(), None);
        assert_eq!(arr.get_or_default(a).unwrap(), -1);
        assert!(arr.is_clear());

        assert_eq!(arr.set(a, 10).unwrap(), None);
        assert_eq!(arr.set(a, 11).unwrap(), Some(10));
        assert_eq!(arr.get_or_default(a).unwrap(), 11);
        assert_eq!(arr.get_or_default(b).unwrap(), -1);
        assert!(!arr.is_clear());

        assert_eq!(arr.unset(a).unwrap(), Some(11));
        assert_eq!(arr.get(a).unwrap(), None);

        arr.clear();
        assert!(arr.is_clear());
        assert!(arr.is_empty());
    }

    #[test]
    fn test_storing_default_keeps_clear() {
        let mut g = Graph::new();
        let a = g.new_node();
        let mut arr: NodeArray<i32> = NodeArray::new(&g);
        arr.set(a, 0).unwrap();
        assert!(arr.is_clear());
        arr.set(a, 5).unwrap();
        assert!(!arr.is_clear());
    }

    #[test]
    fn test_capacity_doubles() {
        let mut g = Graph::new();
        let mut arr: NodeArray<u8> = NodeArray::new(&g);
        assert_eq!(arr.capacity(), 0);

        let nodes: Vec<_> = (0..5).map(|_| g.new_node()).collect();
        arr.set(nodes[4], 1).unwrap();
        assert_eq!(arr.capacity(), 8);
        arr.set(nodes[0], 1).unwrap();
        assert_eq!(arr.capacity(), 8);
        assert_eq!(arr.len(), 2);
    }

    #[test]
    fn test_purged_on_delete() {
        let mut g = Graph::new();
        let a = g.new_node();
        let b = g.new_node();
        let e = g.new_edge(a, b).unwrap();
        let mut nodes: NodeArray<String> = NodeArray::new(&g);
        let mut edges: EdgeArray<f64> = EdgeArray::new(&g);
        nodes.set(a, "a".to_string()).unwrap();
        edges.set(e, 2.5).unwrap();

        g.delete_node(a).unwrap();

        assert!(nodes.get(a).unwrap_err().is_not_owner());
        assert!(edges.get(e).unwrap_err().is_not_owner());
        assert_eq!(nodes.len(), 0);
        assert_eq!(edges.len(), 0);
    }

    #[test]
    fn test_reused_id_sees_no_stale_value() {
        let mut g = Graph::new();
        let a = g.new_node();
        let mut arr: NodeArray<i32> = NodeArray::new(&g);
        arr.set(a, 42).unwrap();

        g.delete_node(a).unwrap();
        let fresh = g.new_node();

        assert_eq!(fresh.id(), a.id());
        assert_eq!(arr.get(fresh).unwrap(), None);
        assert!(arr.get(a).unwrap_err().is_not_owner());
    }

    #[test]
    fn test_foreign_key_and_dropped_graph() {
        let mut g = Graph::new();
        let a = g.new_node();
        let mut other = Graph::new();
        let x = other.new_node();
        let mut arr: NodeArray<i32> = NodeArray::new(&g);

        assert!(arr.set(x, 1).unwrap_err().is_not_owner());
        arr.set(a, 1).unwrap();

        drop(g);
        assert!(arr.get(a).unwrap_err().is_not_owner());
    }

    #[test]
    fn test_numeric_accessors() {
        let mut g = Graph::new();
        let a = g.new_node();
        let b = g.new_node();
        let mut counts: NodeArray<usize> = NodeArray::new(&g);
        let mut weights: NodeArray<f64> = NodeArray::new(&g);

        assert_eq!(counts.value(a).unwrap(), 0);
        assert_eq!(counts.increment(a).unwrap(), 1);
        assert_eq!(counts.increment(a).unwrap(), 2);
        assert_eq!(counts.decrement(a).unwrap(), 1);
        assert_eq!(counts.add(b, 10).unwrap(), 10);

        assert_eq!(weights.add(a, 0.5).unwrap(), 0.5);
        assert_eq!(weights.value(b).unwrap(), 0.0);
    }

    #[test]
    fn test_set_all_and_clone() {
        let mut g = Graph::new();
        let a = g.new_node();
        let b = g.new_node();
        let mut arr: NodeArray<i32> = NodeArray::new(&g);
        arr.set_all(3);
        assert_eq!(arr.get(a).unwrap(), Some(3));
        assert_eq!(arr.get(b).unwrap(), Some(3));

        let mut copy = arr.clone();
        assert!(!copy.is_clear());
        copy.set(a, 9).unwrap();
        assert_eq!(arr.get(a).unwrap(), Some(3));

        // 两份都登记了清理钩子
        g.delete_node(b).unwrap();
        assert_eq!(arr.len(), 1);
        assert_eq!(copy.len(), 1);
    }

    #[test]
    fn test_drop_deregisters() {
        let g = Graph::new();
        let arr: NodeArray<i32> = NodeArray::new(&g);
        let copy = arr.clone();
        assert_eq!(g.registry().hook_count(ElementKind::Node), 2);
        drop(arr);
        assert_eq!(g.registry().hook_count(ElementKind::Node), 1);
        drop(copy);
        assert_eq!(g.registry().hook_count(ElementKind::Node), 0);
    }
}
