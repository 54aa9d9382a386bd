//! 位集合
//!
//! 成员按编号存放在位向量中；有序遍历沿图的全局元素顺序（含隐藏元素），
//! 而非加入集合的顺序。

use super::bitset::BitSet;
use crate::error::{Error, Result};
use crate::graph::registry::{Purge, Registry};
use crate::graph::{Element, Graph};
use crate::types::GraphUid;
use parking_lot::Mutex;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

impl Purge for Mutex<BitSet> {
    fn purge(&self, id: u32, _stamp: u64) {
        self.lock().remove(id as usize);
    }
}

/// 节点或边的集合
pub struct ElementSet<K: Element> {
    registry: Arc<Registry>,
    bits: Arc<Mutex<BitSet>>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: Element> ElementSet<K> {
    pub fn new(graph: &Graph) -> Self {
        let registry = Arc::clone(graph.registry());
        let bits = BitSet::with_capacity(registry.capacity(K::KIND));
        Self::attach(registry, bits)
    }

    fn attach(registry: Arc<Registry>, bits: BitSet) -> Self {
        let bits = Arc::new(Mutex::new(bits));
        let hook: Weak<dyn Purge> = Arc::downgrade(&bits) as Weak<dyn Purge>;
        registry.register(K::KIND, hook);
        Self {
            registry,
            bits,
            _kind: PhantomData,
        }
    }

    pub fn graph_uid(&self) -> GraphUid {
        self.registry.uid()
    }

    fn check_graph(&self, graph: &Graph) -> Result<()> {
        if graph.uid() == self.registry.uid() {
            Ok(())
        } else {
            Err(Error::NotOwner(format!(
                "{}集合属于 {}, 传入图 {}",
                K::KIND.name(),
                self.registry.uid(),
                graph.uid()
            )))
        }
    }

    fn check_peer(&self, other: &ElementSet<K>) -> Result<()> {
        if other.registry.uid() == self.registry.uid() {
            Ok(())
        } else {
            Err(Error::NotOwner(format!(
                "{}集合属于不同的图: {} / {}",
                K::KIND.name(),
                self.registry.uid(),
                other.registry.uid()
            )))
        }
    }

    /// 校验全部键后生成位向量
    fn collect_bits<I: IntoIterator<Item = K>>(&self, keys: I) -> Result<BitSet> {
        let mut bits = BitSet::default();
        for k in keys {
            self.registry.check(&k)?;
            bits.insert(k.index());
        }
        Ok(bits)
    }

    /// 加入元素，返回此前是否不在集合中
    pub fn add(&mut self, key: K) -> Result<bool> {
        self.registry.check(&key)?;
        Ok(self.bits.lock().insert(key.index()))
    }

    pub fn remove(&mut self, key: K) -> Result<bool> {
        self.registry.check(&key)?;
        Ok(self.bits.lock().remove(key.index()))
    }

    pub fn contains(&self, key: K) -> Result<bool> {
        self.registry.check(&key)?;
        Ok(self.bits.lock().contains(key.index()))
    }

    pub fn clear(&mut self) {
        self.bits.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.bits.lock().count()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.lock().is_empty()
    }

    /// 批量加入；任一键无效时不做修改。返回新加入的个数
    pub fn add_all<I: IntoIterator<Item = K>>(&mut self, keys: I) -> Result<usize> {
        let incoming = self.collect_bits(keys)?;
        let mut bits = self.bits.lock();
        let before = bits.count();
        bits.union_with(&incoming);
        Ok(bits.count() - before)
    }

    pub fn union_with(&mut self, other: &ElementSet<K>) -> Result<bool> {
        self.check_peer(other)?;
        let incoming = other.bits.lock().clone();
        Ok(self.bits.lock().union_with(&incoming))
    }

    pub fn intersect_with(&mut self, other: &ElementSet<K>) -> Result<bool> {
        self.check_peer(other)?;
        let incoming = other.bits.lock().clone();
        Ok(self.bits.lock().intersect_with(&incoming))
    }

    /// 只保留出现在 `keys` 中的元素，返回是否有变化
    pub fn retain_all<I: IntoIterator<Item = K>>(&mut self, keys: I) -> Result<bool> {
        let keep = self.collect_bits(keys)?;
        Ok(self.bits.lock().intersect_with(&keep))
    }

    /// 移除 `keys` 中的元素，返回是否有变化
    pub fn remove_all<I: IntoIterator<Item = K>>(&mut self, keys: I) -> Result<bool> {
        let removed = self.collect_bits(keys)?;
        Ok(self.bits.lock().difference_with(&removed))
    }

    fn scan(&self, graph: &Graph, from: Option<K>, forward: bool) -> Option<K> {
        let bits = self.bits.lock();
        if bits.is_empty() {
            return None;
        }
        let mut cur = K::step(graph, from, forward);
        while let Some(k) = cur {
            if bits.contains(k.index()) {
                return Some(k);
            }
            cur = K::step(graph, Some(k), forward);
        }
        None
    }

    /// 按图的全局顺序第一个成员
    pub fn first(&self, graph: &Graph) -> Result<Option<K>> {
        self.check_graph(graph)?;
        Ok(self.scan(graph, None, true))
    }

    pub fn last(&self, graph: &Graph) -> Result<Option<K>> {
        self.check_graph(graph)?;
        Ok(self.scan(graph, None, false))
    }

    /// 全局顺序中 `key` 之后的下一个成员（`key` 本身不必是成员）
    pub fn next(&self, graph: &Graph, key: K) -> Result<Option<K>> {
        self.check_graph(graph)?;
        self.registry.check(&key)?;
        Ok(self.scan(graph, Some(key), true))
    }

    pub fn prev(&self, graph: &Graph, key: K) -> Result<Option<K>> {
        self.check_graph(graph)?;
        self.registry.check(&key)?;
        Ok(self.scan(graph, Some(key), false))
    }

    /// 按全局顺序列出成员
    pub fn to_vec(&self, graph: &Graph) -> Result<Vec<K>> {
        self.check_graph(graph)?;
        let mut out = Vec::with_capacity(self.len());
        let mut cur = self.scan(graph, None, true);
        while let Some(k) = cur {
            out.push(k);
            cur = self.scan(graph, Some(k), true);
        }
        Ok(out)
    }
}

/// 同一图上成员相同的独立集合
impl<K: Element> Clone for ElementSet<K> {
    fn clone(&self) -> Self {
        let bits = self.bits.lock().clone();
        Self::attach(Arc::clone(&self.registry), bits)
    }
}

impl<K: Element> Drop for ElementSet<K> {
    fn drop(&mut self) {
        self.registry
            .deregister(K::KIND, Arc::as_ptr(&self.bits) as *const ());
    }
}

impl<K: Element> fmt::Debug for ElementSet<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementSet")
            .field("kind", &K::KIND)
            .field("graph", &self.registry.uid())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::{EdgeSet, NodeSet};
    use crate::graph::Node;

    fn nodes(g: &mut Graph, n: usize) -> Vec<Node> {
        (0..n).map(|_| g.new_node()).collect()
    }

    #[test]
    fn test_membership() {
        let mut g = Graph::new();
        let v = nodes(&mut g, 3);
        let mut set = NodeSet::new(&g);

        assert!(set.add(v[1]).unwrap());
        assert!(!set.add(v[1]).unwrap());
        assert!(set.contains(v[1]).unwrap());
        assert!(!set.contains(v[0]).unwrap());
        assert_eq!(set.len(), 1);
        assert!(set.remove(v[1]).unwrap());
        assert!(set.is_empty());
    }

    #[test]
    fn test_iteration_follows_graph_order() {
        let mut g = Graph::new();
        let v = nodes(&mut g, 4);
        let mut set = NodeSet::new(&g);
        set.add(v[3]).unwrap();
        set.add(v[0]).unwrap();
        set.add(v[2]).unwrap();

        assert_eq!(set.to_vec(&g).unwrap(), vec![v[0], v[2], v[3]]);

        g.move_node_to_front(v[3]).unwrap();
        g.set_node_hidden(v[2], true).unwrap();
        assert_eq!(set.to_vec(&g).unwrap(), vec![v[3], v[0], v[2]]);
        assert_eq!(set.first(&g).unwrap(), Some(v[3]));
        assert_eq!(set.last(&g).unwrap(), Some(v[2]));
        assert_eq!(set.next(&g, v[0]).unwrap(), Some(v[2]));
        // 非成员也可作为起点
        assert_eq!(set.next(&g, v[1]).unwrap(), Some(v[2]));
        assert_eq!(set.prev(&g, v[3]).unwrap(), None);
    }

    #[test]
    fn test_purged_on_delete() {
        let mut g = Graph::new();
        let v = nodes(&mut g, 3);
        let e = g.new_edge(v[0], v[1]).unwrap();
        let mut node_set = NodeSet::new(&g);
        let mut edge_set = EdgeSet::new(&g);
        node_set.add_all(v.iter().copied()).unwrap();
        edge_set.add(e).unwrap();

        g.delete_node(v[1]).unwrap();

        assert_eq!(node_set.len(), 2);
        assert!(edge_set.is_empty());
        assert!(node_set.contains(v[1]).unwrap_err().is_not_owner());
        assert_eq!(node_set.to_vec(&g).unwrap(), vec![v[0], v[2]]);
    }

    #[test]
    fn test_bulk_operations() {
        let mut g = Graph::new();
        let v = nodes(&mut g, 5);
        let mut a = NodeSet::new(&g);
        let mut b = NodeSet::new(&g);
        assert_eq!(a.add_all([v[0], v[1], v[2]]).unwrap(), 3);
        b.add_all([v[2], v[3]]).unwrap();

        let mut u = a.clone();
        assert!(u.union_with(&b).unwrap());
        assert_eq!(u.len(), 4);

        let mut i = a.clone();
        assert!(i.intersect_with(&b).unwrap());
        assert_eq!(i.to_vec(&g).unwrap(), vec![v[2]]);

        assert!(!a.retain_all([v[0], v[1], v[2], v[4]]).unwrap());
        assert!(a.retain_all([v[1]]).unwrap());
        assert_eq!(a.to_vec(&g).unwrap(), vec![v[1]]);

        assert!(b.remove_all([v[3]]).unwrap());
        assert!(!b.remove_all([v[3]]).unwrap());
    }

    #[test]
    fn test_invalid_keys_leave_set_unchanged() {
        let mut g = Graph::new();
        let v = nodes(&mut g, 2);
        let mut other = Graph::new();
        let x = other.new_node();
        let mut set = NodeSet::new(&g);
        set.add(v[0]).unwrap();

        assert!(set.add_all([v[1], x]).unwrap_err().is_not_owner());
        assert_eq!(set.len(), 1);
        assert!(set.retain_all([x]).unwrap_err().is_not_owner());
        assert_eq!(set.len(), 1);

        let foreign = NodeSet::new(&other);
        assert!(set.union_with(&foreign).unwrap_err().is_not_owner());
        assert!(set.to_vec(&other).unwrap_err().is_not_owner());
    }

    #[test]
    fn test_navigation_rejects_foreign_and_deleted_keys() {
        let mut g = Graph::new();
        let v = nodes(&mut g, 3);
        let e = g.new_edge(v[0], v[1]).unwrap();
        let kept = g.new_edge(v[1], v[2]).unwrap();
        let mut node_set = NodeSet::new(&g);
        node_set.add_all(v.iter().copied()).unwrap();
        let mut edge_set = EdgeSet::new(&g);
        edge_set.add(kept).unwrap();

        // 外图句柄的编号在本图中也存活
        let mut other = Graph::new();
        let x = nodes(&mut other, 2)[1];
        assert!(node_set.next(&g, x).unwrap_err().is_not_owner());
        assert!(node_set.prev(&g, x).unwrap_err().is_not_owner());

        g.delete_edge(e).unwrap();
        assert!(edge_set.next(&g, e).unwrap_err().is_not_owner());
        assert!(edge_set.prev(&g, e).unwrap_err().is_not_owner());
        assert_eq!(edge_set.first(&g).unwrap(), Some(kept));
    }

    #[test]
    fn test_clone_is_independent() {
        let mut g = Graph::new();
        let v = nodes(&mut g, 2);
        let mut set = NodeSet::new(&g);
        set.add(v[0]).unwrap();
        let mut copy = set.clone();
        copy.add(v[1]).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(copy.len(), 2);

        g.delete_node(v[0]).unwrap();
        assert_eq!(set.len(), 0);
        assert_eq!(copy.len(), 1);
    }
}
