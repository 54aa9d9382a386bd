//! 图数据结构
//!
//! 关联表（incidence list）图核心：节点与边存放在以编号为下标的槽位中，
//! 全局节点/边链表给出迭代顺序，每个节点维护一条有序的关联边链表。
//! 所有接受句柄的公开方法都先校验归属，再做修改。

use super::edge::{Edge, EdgeRecord};
use super::element::{ElementKind, Placement};
use super::list::ListEnds;
use super::listener::{GraphUpdateListener, ListenerId};
use super::node::{Node, NodeRecord};
use super::registry::Registry;
use crate::collections::{EdgeMap, EdgeSet, NodeMap, NodeSet};
use crate::config::GraphConfig;
use crate::error::{Error, Result};
use crate::types::{GraphUid, Value};
use smallvec::SmallVec;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// 关联边过滤
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Any,
    Out,
    In,
}

/// `copy_from` 的结果：源图元素到新图元素的对应关系
pub struct GraphCopy {
    /// 源图节点 -> 新节点（登记在源图上）
    pub nodes: NodeMap<Node>,
    /// 源图边 -> 新边（登记在源图上）
    pub edges: EdgeMap<Edge>,
}

/// 图
pub struct Graph {
    registry: Arc<Registry>,
    nodes: Vec<Option<NodeRecord>>,
    edges: Vec<Option<EdgeRecord>>,
    node_list: ListEnds,
    edge_list: ListEnds,
    node_count: usize,
    edge_count: usize,
    hidden_nodes: usize,
    hidden_edges: usize,
    special_edges: usize,
    /// 最近分配的创建序号（从不回收）
    next_stamp: u64,
    listeners: Vec<(ListenerId, Arc<dyn GraphUpdateListener>)>,
    next_listener: u64,
}

impl Graph {
    /// 创建空图
    pub fn new() -> Self {
        Self::with_config(&GraphConfig::default())
    }

    /// 按配置预分配槽位
    pub fn with_config(config: &GraphConfig) -> Self {
        let uid = GraphUid::next();
        debug!(
            graph = %uid,
            node_capacity = config.node_capacity,
            edge_capacity = config.edge_capacity,
            "graph created"
        );
        Self {
            registry: Registry::new(uid),
            nodes: Vec::with_capacity(config.node_capacity),
            edges: Vec::with_capacity(config.edge_capacity),
            node_list: ListEnds::default(),
            edge_list: ListEnds::default(),
            node_count: 0,
            edge_count: 0,
            hidden_nodes: 0,
            hidden_edges: 0,
            special_edges: 0,
            next_stamp: 0,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    pub fn uid(&self) -> GraphUid {
        self.registry.uid()
    }

    pub(crate) fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    // ==================== 内部访问 ====================

    fn n(&self, id: u32) -> &NodeRecord {
        match self.nodes.get(id as usize) {
            Some(Some(rec)) => rec,
            _ => panic!("节点槽位 {} 已释放", id),
        }
    }

    fn n_mut(&mut self, id: u32) -> &mut NodeRecord {
        match self.nodes.get_mut(id as usize) {
            Some(Some(rec)) => rec,
            _ => panic!("节点槽位 {} 已释放", id),
        }
    }

    fn e(&self, id: u32) -> &EdgeRecord {
        match self.edges.get(id as usize) {
            Some(Some(rec)) => rec,
            _ => panic!("边槽位 {} 已释放", id),
        }
    }

    fn e_mut(&mut self, id: u32) -> &mut EdgeRecord {
        match self.edges.get_mut(id as usize) {
            Some(Some(rec)) => rec,
            _ => panic!("边槽位 {} 已释放", id),
        }
    }

    pub(crate) fn node_handle(&self, id: u32) -> Node {
        Node {
            graph: self.uid(),
            id,
            stamp: self.n(id).stamp,
        }
    }

    pub(crate) fn edge_handle(&self, id: u32) -> Edge {
        Edge {
            graph: self.uid(),
            id,
            stamp: self.e(id).stamp,
        }
    }

    /// 校验节点归属，返回槽位
    fn node_index(&self, v: Node) -> Result<u32> {
        match self.nodes.get(v.id as usize) {
            Some(Some(rec)) if v.graph == self.uid() && rec.stamp == v.stamp => Ok(v.id),
            _ => Err(Error::NotOwner(format!(
                "节点 {} (属于 {}, 当前图 {})",
                v,
                v.graph,
                self.uid()
            ))),
        }
    }

    /// 校验边归属，返回槽位
    fn edge_index(&self, e: Edge) -> Result<u32> {
        match self.edges.get(e.id as usize) {
            Some(Some(rec)) if e.graph == self.uid() && rec.stamp == e.stamp => Ok(e.id),
            _ => Err(Error::NotOwner(format!(
                "边 {} (属于 {}, 当前图 {})",
                e,
                e.graph,
                self.uid()
            ))),
        }
    }

    /// 校验边与节点关联
    fn incident_index(&self, e: Edge, v: Node) -> Result<(u32, u32)> {
        let eid = self.edge_index(e)?;
        let vid = self.node_index(v)?;
        if self.e(eid).is_incident(vid) {
            Ok((eid, vid))
        } else {
            Err(Error::NotIncident {
                edge: e.to_string(),
                node: v.to_string(),
            })
        }
    }

    /// 新元素的槽位编号；超出 `u32` 范围时直接终止而不回绕
    fn slot_id(len: usize, kind: ElementKind) -> u32 {
        u32::try_from(len)
            .unwrap_or_else(|_| panic!("{}编号超出 u32 范围: {}", kind.name(), len))
    }

    fn alloc_stamp(&mut self) -> u64 {
        self.next_stamp += 1;
        self.next_stamp
    }

    // ==================== 事件 ====================

    /// 注册监听器
    pub fn add_listener(&mut self, listener: Arc<dyn GraphUpdateListener>) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, listener));
        id
    }

    /// 移除监听器，返回是否存在
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// 按快照通知，回调期间的登记变化不影响本轮
    fn fire<F: Fn(&dyn GraphUpdateListener)>(&self, f: F) {
        if self.listeners.is_empty() {
            return;
        }
        let snapshot: Vec<Arc<dyn GraphUpdateListener>> =
            self.listeners.iter().map(|(_, l)| Arc::clone(l)).collect();
        for listener in snapshot {
            f(listener.as_ref());
        }
    }

    fn fire_changed(&self) {
        self.fire(|l| l.graph_has_changed(self));
    }

    pub(crate) fn fire_graph_was_read(&self, nodes: &NodeSet, edges: &EdgeSet) {
        self.fire(|l| l.graph_was_read(self, nodes, edges));
    }

    // ==================== 节点操作 ====================

    /// 添加节点
    pub fn new_node(&mut self) -> Node {
        self.create_node(None)
    }

    /// 添加带负载的节点
    pub fn new_node_with(&mut self, info: impl Into<Value>) -> Node {
        self.create_node(Some(info.into()))
    }

    fn create_node(&mut self, info: Option<Value>) -> Node {
        let id = Self::slot_id(self.nodes.len(), ElementKind::Node);
        let stamp = self.alloc_stamp();
        self.nodes.push(Some(NodeRecord::new(stamp, info)));
        self.node_list.push_back(&mut self.nodes, id);
        self.node_count += 1;
        self.registry.activate(ElementKind::Node, id, stamp);

        let v = self.node_handle(id);
        trace!(node = %v, "new node");
        self.fire(|l| l.new_node(self, v));
        self.fire_changed();
        v
    }

    /// 删除节点（先删除所有关联边）
    pub fn delete_node(&mut self, v: Node) -> Result<()> {
        let id = self.node_index(v)?;
        self.remove_node(id);
        self.fire_changed();
        Ok(())
    }

    /// 删除节点本体，不触发 `graph_has_changed`
    fn remove_node(&mut self, id: u32) {
        let v = self.node_handle(id);
        self.fire(|l| l.delete_node(self, v));

        while let Some(e) = self.n(id).first_adj {
            self.remove_edge(e);
        }

        self.node_list.unlink(&mut self.nodes, id);
        self.registry.purge(ElementKind::Node, id, v.stamp);
        if let Some(rec) = self.nodes[id as usize].take() {
            if rec.hidden {
                self.hidden_nodes -= 1;
            }
        }
        self.registry.retire(ElementKind::Node, id);
        self.node_count -= 1;
        debug!(node = %v, remaining = self.node_count, "node deleted");

        if self.node_count == 0 {
            self.nodes.clear();
            self.registry.reset(ElementKind::Node);
            debug!("node ids reset");
        }
    }

    /// 删除全部节点（及全部边），结束时只通知一次变更
    pub fn delete_all_nodes(&mut self) {
        let count = self.node_count;
        while let Some(id) = self.node_list.first {
            self.remove_node(id);
        }
        debug!(count, "all nodes deleted");
        self.fire_changed();
    }

    /// 清空图
    pub fn clear(&mut self) {
        self.delete_all_nodes();
    }

    /// 不含隐藏节点的节点数
    pub fn number_of_nodes(&self) -> usize {
        self.node_count - self.hidden_nodes
    }

    pub fn number_of_nodes_including_hidden(&self) -> usize {
        self.node_count
    }

    pub fn number_of_hidden_nodes(&self) -> usize {
        self.hidden_nodes
    }

    /// 当前最大可能节点编号 + 1
    pub fn max_node_id(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_count == 0
    }

    /// 节点存活且属于本图时返回本图标识，否则 `None`
    pub fn node_owner(&self, v: Node) -> Option<GraphUid> {
        self.node_index(v).ok().map(|_| self.uid())
    }

    pub fn contains_node(&self, v: Node) -> bool {
        self.node_index(v).is_ok()
    }

    /// 按编号查找存活节点
    pub fn node_by_id(&self, id: usize) -> Option<Node> {
        match self.nodes.get(id) {
            Some(Some(_)) => Some(self.node_handle(id as u32)),
            _ => None,
        }
    }

    pub fn node_info(&self, v: Node) -> Result<Option<&Value>> {
        let id = self.node_index(v)?;
        Ok(self.n(id).info.as_ref())
    }

    /// 设置节点负载，返回旧值
    pub fn set_node_info(&mut self, v: Node, info: Option<Value>) -> Result<Option<Value>> {
        let id = self.node_index(v)?;
        Ok(std::mem::replace(&mut self.n_mut(id).info, info))
    }

    pub fn node_data(&self, v: Node) -> Result<Option<&Value>> {
        let id = self.node_index(v)?;
        Ok(self.n(id).data.as_ref())
    }

    pub fn set_node_data(&mut self, v: Node, data: Option<Value>) -> Result<Option<Value>> {
        let id = self.node_index(v)?;
        Ok(std::mem::replace(&mut self.n_mut(id).data, data))
    }

    /// 清除所有节点的 data 槽
    pub fn clear_node_data(&mut self) {
        for rec in self.nodes.iter_mut().flatten() {
            rec.data = None;
        }
    }

    pub fn in_degree(&self, v: Node) -> Result<usize> {
        let id = self.node_index(v)?;
        Ok(self.n(id).in_degree)
    }

    pub fn out_degree(&self, v: Node) -> Result<usize> {
        let id = self.node_index(v)?;
        Ok(self.n(id).out_degree)
    }

    pub fn degree(&self, v: Node) -> Result<usize> {
        let id = self.node_index(v)?;
        Ok(self.n(id).degree())
    }

    // ==================== 边操作 ====================

    /// 添加边，追加到两端关联边链表的末尾
    pub fn new_edge(&mut self, source: Node, target: Node) -> Result<Edge> {
        self.new_edge_at(source, None, target, None, None)
    }

    /// 添加带负载的边
    pub fn new_edge_with(
        &mut self,
        source: Node,
        target: Node,
        info: impl Into<Value>,
    ) -> Result<Edge> {
        self.new_edge_at(source, None, target, None, Some(info.into()))
    }

    /// 添加边并指定在两端关联边链表中的位置
    ///
    /// `source_ref` / `target_ref` 为 `(参照边, 前/后)`，参照边必须与对应端点关联；
    /// 省略时追加到末尾。
    pub fn new_edge_at(
        &mut self,
        source: Node,
        source_ref: Option<(Edge, Placement)>,
        target: Node,
        target_ref: Option<(Edge, Placement)>,
        info: Option<Value>,
    ) -> Result<Edge> {
        let s = self.node_index(source)?;
        let t = self.node_index(target)?;
        if s == t {
            return Err(Error::IllegalSelfEdge(format!("{} -> {}", source, target)));
        }
        let s_ref = match source_ref {
            Some((e, place)) => Some((self.incident_index(e, source)?.0, place)),
            None => None,
        };
        let t_ref = match target_ref {
            Some((e, place)) => Some((self.incident_index(e, target)?.0, place)),
            None => None,
        };

        let id = Self::slot_id(self.edges.len(), ElementKind::Edge);
        let stamp = self.alloc_stamp();
        self.edges.push(Some(EdgeRecord::new(stamp, s, t, info)));
        self.link_adjacent(s, id, s_ref);
        self.link_adjacent(t, id, t_ref);
        self.n_mut(s).out_degree += 1;
        self.n_mut(t).in_degree += 1;
        self.edge_list.push_back(&mut self.edges, id);
        self.edge_count += 1;
        self.registry.activate(ElementKind::Edge, id, stamp);

        let e = self.edge_handle(id);
        trace!(edge = %e, source = %source, target = %target, "new edge");
        self.fire(|l| l.new_edge(self, e));
        self.fire_changed();
        Ok(e)
    }

    /// 把边 `e` 插入节点 `v` 的关联边链表
    fn link_adjacent(&mut self, v: u32, e: u32, reference: Option<(u32, Placement)>) {
        let after = match reference {
            None => self.n(v).last_adj,
            Some((r, Placement::After)) => Some(r),
            Some((r, Placement::Before)) => self.e(r).prev_at(v),
        };
        let next = match after {
            Some(a) => self.e(a).next_at(v),
            None => self.n(v).first_adj,
        };

        let rec = self.e_mut(e);
        rec.set_prev_at(v, after);
        rec.set_next_at(v, next);
        match after {
            Some(a) => self.e_mut(a).set_next_at(v, Some(e)),
            None => self.n_mut(v).first_adj = Some(e),
        }
        match next {
            Some(b) => self.e_mut(b).set_prev_at(v, Some(e)),
            None => self.n_mut(v).last_adj = Some(e),
        }
    }

    /// 从节点 `v` 的关联边链表摘除边 `e`
    fn unlink_adjacent(&mut self, v: u32, e: u32) {
        let (prev, next) = {
            let rec = self.e(e);
            (rec.prev_at(v), rec.next_at(v))
        };
        match prev {
            Some(p) => self.e_mut(p).set_next_at(v, next),
            None => {
                assert_eq!(self.n(v).first_adj, Some(e), "关联边链表头不一致");
                self.n_mut(v).first_adj = next;
            }
        }
        match next {
            Some(n) => self.e_mut(n).set_prev_at(v, prev),
            None => {
                assert_eq!(self.n(v).last_adj, Some(e), "关联边链表尾不一致");
                self.n_mut(v).last_adj = prev;
            }
        }
        let rec = self.e_mut(e);
        rec.set_prev_at(v, None);
        rec.set_next_at(v, None);
    }

    /// 删除边
    pub fn delete_edge(&mut self, e: Edge) -> Result<()> {
        let id = self.edge_index(e)?;
        self.remove_edge(id);
        self.fire_changed();
        Ok(())
    }

    /// 删除边本体，不触发 `graph_has_changed`
    fn remove_edge(&mut self, id: u32) {
        let e = self.edge_handle(id);
        self.fire(|l| l.delete_edge(self, e));

        let (s, t) = {
            let rec = self.e(id);
            (rec.source, rec.target)
        };
        self.unlink_adjacent(s, id);
        self.unlink_adjacent(t, id);
        self.edge_list.unlink(&mut self.edges, id);
        self.registry.purge(ElementKind::Edge, id, e.stamp);
        self.n_mut(s).out_degree -= 1;
        self.n_mut(t).in_degree -= 1;
        if let Some(rec) = self.edges[id as usize].take() {
            if rec.hidden {
                self.hidden_edges -= 1;
            }
            if rec.special {
                self.special_edges -= 1;
            }
        }
        self.registry.retire(ElementKind::Edge, id);
        self.edge_count -= 1;
        debug!(edge = %e, remaining = self.edge_count, "edge deleted");

        if self.edge_count == 0 {
            self.edges.clear();
            self.registry.reset(ElementKind::Edge);
            debug!("edge ids reset");
        }
    }

    /// 删除全部边，结束时只通知一次变更
    pub fn delete_all_edges(&mut self) {
        let count = self.edge_count;
        while let Some(id) = self.edge_list.first {
            self.remove_edge(id);
        }
        debug!(count, "all edges deleted");
        self.fire_changed();
    }

    /// 不含隐藏边的边数
    pub fn number_of_edges(&self) -> usize {
        self.edge_count - self.hidden_edges
    }

    pub fn number_of_edges_including_hidden(&self) -> usize {
        self.edge_count
    }

    pub fn number_of_hidden_edges(&self) -> usize {
        self.hidden_edges
    }

    pub fn max_edge_id(&self) -> usize {
        self.edges.len()
    }

    pub fn edge_owner(&self, e: Edge) -> Option<GraphUid> {
        self.edge_index(e).ok().map(|_| self.uid())
    }

    pub fn contains_edge(&self, e: Edge) -> bool {
        self.edge_index(e).is_ok()
    }

    pub fn edge_by_id(&self, id: usize) -> Option<Edge> {
        match self.edges.get(id) {
            Some(Some(_)) => Some(self.edge_handle(id as u32)),
            _ => None,
        }
    }

    pub fn source(&self, e: Edge) -> Result<Node> {
        let id = self.edge_index(e)?;
        Ok(self.node_handle(self.e(id).source))
    }

    pub fn target(&self, e: Edge) -> Result<Node> {
        let id = self.edge_index(e)?;
        Ok(self.node_handle(self.e(id).target))
    }

    /// 边 `e` 在节点 `v` 另一侧的端点
    pub fn opposite(&self, v: Node, e: Edge) -> Result<Node> {
        let (eid, vid) = self.incident_index(e, v)?;
        Ok(self.node_handle(self.e(eid).opposite(vid)))
    }

    pub fn edge_info(&self, e: Edge) -> Result<Option<&Value>> {
        let id = self.edge_index(e)?;
        Ok(self.e(id).info.as_ref())
    }

    pub fn set_edge_info(&mut self, e: Edge, info: Option<Value>) -> Result<Option<Value>> {
        let id = self.edge_index(e)?;
        Ok(std::mem::replace(&mut self.e_mut(id).info, info))
    }

    /// 标记/取消特殊边，返回是否有变化
    pub fn set_special(&mut self, e: Edge, special: bool) -> Result<bool> {
        let id = self.edge_index(e)?;
        let rec = self.e_mut(id);
        if rec.special == special {
            return Ok(false);
        }
        rec.special = special;
        if special {
            self.special_edges += 1;
        } else {
            self.special_edges -= 1;
        }
        Ok(true)
    }

    pub fn is_special(&self, e: Edge) -> Result<bool> {
        let id = self.edge_index(e)?;
        Ok(self.e(id).special)
    }

    pub fn number_special_edges(&self) -> usize {
        self.special_edges
    }

    /// 反转边方向，两端关联边链表中的位置不变
    pub fn reverse_edge(&mut self, e: Edge) -> Result<()> {
        let id = self.edge_index(e)?;
        let (s, t) = {
            let rec = self.e_mut(id);
            rec.reverse();
            (rec.source, rec.target)
        };
        // 新源点原为目标点
        let new_source = self.n_mut(s);
        new_source.in_degree -= 1;
        new_source.out_degree += 1;
        let new_target = self.n_mut(t);
        new_target.out_degree -= 1;
        new_target.in_degree += 1;
        debug!(edge = %e, "edge reversed");
        self.fire_changed();
        Ok(())
    }

    /// 连接 `v` 与 `w` 的第一条边（任一方向）
    pub fn common_edge(&self, v: Node, w: Node) -> Result<Option<Edge>> {
        let vid = self.node_index(v)?;
        let wid = self.node_index(w)?;
        let mut cur = self.n(vid).first_adj;
        while let Some(e) = cur {
            let rec = self.e(e);
            if rec.opposite(vid) == wid {
                return Ok(Some(self.edge_handle(e)));
            }
            cur = rec.next_at(vid);
        }
        Ok(None)
    }

    // ==================== 隐藏 ====================

    /// 设置节点隐藏标志，返回是否有变化
    pub fn set_node_hidden(&mut self, v: Node, hidden: bool) -> Result<bool> {
        let id = self.node_index(v)?;
        let rec = self.n_mut(id);
        if rec.hidden == hidden {
            return Ok(false);
        }
        rec.hidden = hidden;
        if hidden {
            self.hidden_nodes += 1;
        } else {
            self.hidden_nodes -= 1;
        }
        Ok(true)
    }

    pub fn is_node_hidden(&self, v: Node) -> Result<bool> {
        let id = self.node_index(v)?;
        Ok(self.n(id).hidden)
    }

    pub fn set_edge_hidden(&mut self, e: Edge, hidden: bool) -> Result<bool> {
        let id = self.edge_index(e)?;
        let rec = self.e_mut(id);
        if rec.hidden == hidden {
            return Ok(false);
        }
        rec.hidden = hidden;
        if hidden {
            self.hidden_edges += 1;
        } else {
            self.hidden_edges -= 1;
        }
        Ok(true)
    }

    pub fn is_edge_hidden(&self, e: Edge) -> Result<bool> {
        let id = self.edge_index(e)?;
        Ok(self.e(id).hidden)
    }

    // ==================== 全局遍历 ====================

    pub(crate) fn step_node(
        &self,
        from: Option<u32>,
        forward: bool,
        include_hidden: bool,
    ) -> Option<u32> {
        let advance = |id: u32| {
            let links = self.n(id).links;
            if forward {
                links.next
            } else {
                links.prev
            }
        };
        let mut cur = match from {
            None if forward => self.node_list.first,
            None => self.node_list.last,
            Some(id) => advance(id),
        };
        while let Some(id) = cur {
            if include_hidden || !self.n(id).hidden {
                return Some(id);
            }
            cur = advance(id);
        }
        None
    }

    pub(crate) fn step_edge(
        &self,
        from: Option<u32>,
        forward: bool,
        include_hidden: bool,
    ) -> Option<u32> {
        let advance = |id: u32| {
            let links = self.e(id).links;
            if forward {
                links.next
            } else {
                links.prev
            }
        };
        let mut cur = match from {
            None if forward => self.edge_list.first,
            None => self.edge_list.last,
            Some(id) => advance(id),
        };
        while let Some(id) = cur {
            if include_hidden || !self.e(id).hidden {
                return Some(id);
            }
            cur = advance(id);
        }
        None
    }

    fn node_step(
        &self,
        from: Option<Node>,
        forward: bool,
        include_hidden: bool,
    ) -> Result<Option<Node>> {
        let from = match from {
            Some(v) => Some(self.node_index(v)?),
            None => None,
        };
        Ok(self
            .step_node(from, forward, include_hidden)
            .map(|id| self.node_handle(id)))
    }

    fn edge_step(
        &self,
        from: Option<Edge>,
        forward: bool,
        include_hidden: bool,
    ) -> Result<Option<Edge>> {
        let from = match from {
            Some(e) => Some(self.edge_index(e)?),
            None => None,
        };
        Ok(self
            .step_edge(from, forward, include_hidden)
            .map(|id| self.edge_handle(id)))
    }

    pub fn first_node(&self) -> Option<Node> {
        self.step_node(None, true, false).map(|id| self.node_handle(id))
    }

    pub fn last_node(&self) -> Option<Node> {
        self.step_node(None, false, false).map(|id| self.node_handle(id))
    }

    pub fn next_node(&self, v: Node) -> Result<Option<Node>> {
        self.node_step(Some(v), true, false)
    }

    pub fn prev_node(&self, v: Node) -> Result<Option<Node>> {
        self.node_step(Some(v), false, false)
    }

    pub fn first_node_including_hidden(&self) -> Option<Node> {
        self.step_node(None, true, true).map(|id| self.node_handle(id))
    }

    pub fn last_node_including_hidden(&self) -> Option<Node> {
        self.step_node(None, false, true).map(|id| self.node_handle(id))
    }

    pub fn next_node_including_hidden(&self, v: Node) -> Result<Option<Node>> {
        self.node_step(Some(v), true, true)
    }

    pub fn prev_node_including_hidden(&self, v: Node) -> Result<Option<Node>> {
        self.node_step(Some(v), false, true)
    }

    pub fn first_edge(&self) -> Option<Edge> {
        self.step_edge(None, true, false).map(|id| self.edge_handle(id))
    }

    pub fn last_edge(&self) -> Option<Edge> {
        self.step_edge(None, false, false).map(|id| self.edge_handle(id))
    }

    pub fn next_edge(&self, e: Edge) -> Result<Option<Edge>> {
        self.edge_step(Some(e), true, false)
    }

    pub fn prev_edge(&self, e: Edge) -> Result<Option<Edge>> {
        self.edge_step(Some(e), false, false)
    }

    pub fn first_edge_including_hidden(&self) -> Option<Edge> {
        self.step_edge(None, true, true).map(|id| self.edge_handle(id))
    }

    pub fn last_edge_including_hidden(&self) -> Option<Edge> {
        self.step_edge(None, false, true).map(|id| self.edge_handle(id))
    }

    pub fn next_edge_including_hidden(&self, e: Edge) -> Result<Option<Edge>> {
        self.edge_step(Some(e), true, true)
    }

    pub fn prev_edge_including_hidden(&self, e: Edge) -> Result<Option<Edge>> {
        self.edge_step(Some(e), false, true)
    }

    /// 按全局顺序遍历未隐藏节点
    pub fn nodes(&self) -> NodeIter<'_> {
        NodeIter {
            graph: self,
            cur: self.step_node(None, true, false),
            include_hidden: false,
        }
    }

    pub fn nodes_including_hidden(&self) -> NodeIter<'_> {
        NodeIter {
            graph: self,
            cur: self.step_node(None, true, true),
            include_hidden: true,
        }
    }

    /// 按全局顺序遍历未隐藏边
    pub fn edges(&self) -> EdgeIter<'_> {
        EdgeIter {
            graph: self,
            cur: self.step_edge(None, true, false),
            include_hidden: false,
        }
    }

    pub fn edges_including_hidden(&self) -> EdgeIter<'_> {
        EdgeIter {
            graph: self,
            cur: self.step_edge(None, true, true),
            include_hidden: true,
        }
    }

    // ==================== 关联边遍历 ====================

    fn side_matches(&self, e: u32, v: u32, side: Side) -> bool {
        match side {
            Side::Any => true,
            Side::Out => self.e(e).source == v,
            Side::In => self.e(e).target == v,
        }
    }

    fn scan_adjacent(&self, v: u32, from: Option<u32>, forward: bool, side: Side) -> Option<u32> {
        let advance = |e: u32| {
            if forward {
                self.e(e).next_at(v)
            } else {
                self.e(e).prev_at(v)
            }
        };
        let mut cur = match from {
            None if forward => self.n(v).first_adj,
            None => self.n(v).last_adj,
            Some(e) => advance(e),
        };
        while let Some(e) = cur {
            if self.side_matches(e, v, side) {
                return Some(e);
            }
            cur = advance(e);
        }
        None
    }

    fn adjacent_step(
        &self,
        v: Node,
        from: Option<Edge>,
        forward: bool,
        side: Side,
    ) -> Result<Option<Edge>> {
        let (vid, from) = match from {
            Some(e) => {
                let (eid, vid) = self.incident_index(e, v)?;
                (vid, Some(eid))
            }
            None => (self.node_index(v)?, None),
        };
        Ok(self
            .scan_adjacent(vid, from, forward, side)
            .map(|id| self.edge_handle(id)))
    }

    pub fn first_adjacent_edge(&self, v: Node) -> Result<Option<Edge>> {
        self.adjacent_step(v, None, true, Side::Any)
    }

    pub fn last_adjacent_edge(&self, v: Node) -> Result<Option<Edge>> {
        self.adjacent_step(v, None, false, Side::Any)
    }

    /// `v` 的关联边链表中 `e` 的后继
    pub fn next_adjacent_edge(&self, e: Edge, v: Node) -> Result<Option<Edge>> {
        self.adjacent_step(v, Some(e), true, Side::Any)
    }

    pub fn prev_adjacent_edge(&self, e: Edge, v: Node) -> Result<Option<Edge>> {
        self.adjacent_step(v, Some(e), false, Side::Any)
    }

    /// 循环后继：到表尾时回到表头
    pub fn next_adjacent_edge_cyclic(&self, e: Edge, v: Node) -> Result<Edge> {
        let (eid, vid) = self.incident_index(e, v)?;
        let next = self
            .e(eid)
            .next_at(vid)
            .or(self.n(vid).first_adj)
            .unwrap_or(eid);
        Ok(self.edge_handle(next))
    }

    /// 循环前驱：到表头时回到表尾
    pub fn prev_adjacent_edge_cyclic(&self, e: Edge, v: Node) -> Result<Edge> {
        let (eid, vid) = self.incident_index(e, v)?;
        let prev = self
            .e(eid)
            .prev_at(vid)
            .or(self.n(vid).last_adj)
            .unwrap_or(eid);
        Ok(self.edge_handle(prev))
    }

    pub fn first_out_edge(&self, v: Node) -> Result<Option<Edge>> {
        self.adjacent_step(v, None, true, Side::Out)
    }

    pub fn last_out_edge(&self, v: Node) -> Result<Option<Edge>> {
        self.adjacent_step(v, None, false, Side::Out)
    }

    /// 源点关联边链表中 `e` 之后的下一条出边
    pub fn next_out_edge(&self, e: Edge) -> Result<Option<Edge>> {
        let source = self.source(e)?;
        self.adjacent_step(source, Some(e), true, Side::Out)
    }

    pub fn prev_out_edge(&self, e: Edge) -> Result<Option<Edge>> {
        let source = self.source(e)?;
        self.adjacent_step(source, Some(e), false, Side::Out)
    }

    pub fn first_in_edge(&self, v: Node) -> Result<Option<Edge>> {
        self.adjacent_step(v, None, true, Side::In)
    }

    pub fn last_in_edge(&self, v: Node) -> Result<Option<Edge>> {
        self.adjacent_step(v, None, false, Side::In)
    }

    /// 目标点关联边链表中 `e` 之后的下一条入边
    pub fn next_in_edge(&self, e: Edge) -> Result<Option<Edge>> {
        let target = self.target(e)?;
        self.adjacent_step(target, Some(e), true, Side::In)
    }

    pub fn prev_in_edge(&self, e: Edge) -> Result<Option<Edge>> {
        let target = self.target(e)?;
        self.adjacent_step(target, Some(e), false, Side::In)
    }

    fn adjacency(&self, v: Node, side: Side) -> Result<AdjacentEdges<'_>> {
        let vid = self.node_index(v)?;
        Ok(AdjacentEdges {
            graph: self,
            node: vid,
            cur: self.scan_adjacent(vid, None, true, side),
            side,
        })
    }

    /// 按关联边链表顺序遍历（含隐藏边）
    pub fn adjacent_edges(&self, v: Node) -> Result<AdjacentEdges<'_>> {
        self.adjacency(v, Side::Any)
    }

    pub fn out_edges(&self, v: Node) -> Result<AdjacentEdges<'_>> {
        self.adjacency(v, Side::Out)
    }

    pub fn in_edges(&self, v: Node) -> Result<AdjacentEdges<'_>> {
        self.adjacency(v, Side::In)
    }

    /// 按关联边顺序列出相邻节点（多重边会重复出现）
    pub fn adjacent_nodes(&self, v: Node) -> Result<Vec<Node>> {
        let vid = self.node_index(v)?;
        let mut out = Vec::with_capacity(self.n(vid).degree());
        let mut cur = self.n(vid).first_adj;
        while let Some(e) = cur {
            let rec = self.e(e);
            out.push(self.node_handle(rec.opposite(vid)));
            cur = rec.next_at(vid);
        }
        Ok(out)
    }

    // ==================== 顺序调整 ====================

    pub fn move_node_to_front(&mut self, v: Node) -> Result<()> {
        let id = self.node_index(v)?;
        self.node_list.unlink(&mut self.nodes, id);
        self.node_list.push_front(&mut self.nodes, id);
        Ok(())
    }

    pub fn move_node_to_back(&mut self, v: Node) -> Result<()> {
        let id = self.node_index(v)?;
        self.node_list.unlink(&mut self.nodes, id);
        self.node_list.push_back(&mut self.nodes, id);
        Ok(())
    }

    pub fn move_edge_to_front(&mut self, e: Edge) -> Result<()> {
        let id = self.edge_index(e)?;
        self.edge_list.unlink(&mut self.edges, id);
        self.edge_list.push_front(&mut self.edges, id);
        Ok(())
    }

    pub fn move_edge_to_back(&mut self, e: Edge) -> Result<()> {
        let id = self.edge_index(e)?;
        self.edge_list.unlink(&mut self.edges, id);
        self.edge_list.push_back(&mut self.edges, id);
        Ok(())
    }

    /// 以给定顺序重排节点的关联边链表
    ///
    /// `order` 必须恰好是 `v` 的全部关联边的一个排列；否则返回
    /// `InvalidAdjacencyOrder`（外图的边返回 `NotOwner`），图保持不变。
    pub fn rearrange_adjacent_edges(&mut self, v: Node, order: &[Edge]) -> Result<()> {
        let vid = self.node_index(v)?;
        let ids = order
            .iter()
            .map(|&e| self.edge_index(e))
            .collect::<Result<SmallVec<[u32; 8]>>>()?;
        let degree = self.n(vid).degree();
        if ids.len() != degree {
            return Err(Error::InvalidAdjacencyOrder(format!(
                "节点 {} 有 {} 条关联边, 给出 {} 条",
                v,
                degree,
                order.len()
            )));
        }

        let mut seen = HashSet::with_capacity(ids.len());
        for (&e, &eid) in order.iter().zip(&ids) {
            if !self.e(eid).is_incident(vid) {
                return Err(Error::InvalidAdjacencyOrder(format!(
                    "边 {} 不与节点 {} 关联",
                    e, v
                )));
            }
            if !seen.insert(eid) {
                return Err(Error::InvalidAdjacencyOrder(format!("边 {} 重复出现", e)));
            }
        }

        for (i, &eid) in ids.iter().enumerate() {
            let prev = if i > 0 { Some(ids[i - 1]) } else { None };
            let next = ids.get(i + 1).copied();
            let rec = self.e_mut(eid);
            rec.set_prev_at(vid, prev);
            rec.set_next_at(vid, next);
        }
        let rec = self.n_mut(vid);
        rec.first_adj = ids.first().copied();
        rec.last_adj = ids.last().copied();

        debug!(node = %v, degree, "adjacency rearranged");
        self.fire_changed();
        Ok(())
    }

    // ==================== 复制 ====================

    /// 清空本图并复制 `src`：保留编号、全局顺序、关联边顺序、隐藏/特殊标志与负载
    pub fn copy_from(&mut self, src: &Graph) -> Result<GraphCopy> {
        // 清空后编号计数器已归零
        self.clear();

        let mut node_map = NodeMap::new(src);
        let mut edge_map = EdgeMap::new(src);

        self.nodes.reserve(src.nodes.len());
        for slot in &src.nodes {
            let copied = match slot {
                Some(rec) => {
                    let stamp = self.alloc_stamp();
                    self.registry
                        .activate(ElementKind::Node, self.nodes.len() as u32, stamp);
                    Some(NodeRecord {
                        stamp,
                        ..rec.clone()
                    })
                }
                None => None,
            };
            self.nodes.push(copied);
        }
        self.edges.reserve(src.edges.len());
        for slot in &src.edges {
            let copied = match slot {
                Some(rec) => {
                    let stamp = self.alloc_stamp();
                    self.registry
                        .activate(ElementKind::Edge, self.edges.len() as u32, stamp);
                    Some(EdgeRecord {
                        stamp,
                        ..rec.clone()
                    })
                }
                None => None,
            };
            self.edges.push(copied);
        }
        self.node_list = src.node_list;
        self.edge_list = src.edge_list;
        self.node_count = src.node_count;
        self.edge_count = src.edge_count;
        self.hidden_nodes = src.hidden_nodes;
        self.hidden_edges = src.hidden_edges;
        self.special_edges = src.special_edges;

        for v in src.nodes_including_hidden() {
            let copy = self.node_handle(v.id);
            node_map.set(v, copy)?;
            self.fire(|l| l.new_node(self, copy));
        }
        for e in src.edges_including_hidden() {
            let copy = self.edge_handle(e.id);
            edge_map.set(e, copy)?;
            self.fire(|l| l.new_edge(self, copy));
        }

        debug!(
            from = %src.uid(),
            to = %self.uid(),
            nodes = self.node_count,
            edges = self.edge_count,
            "graph copied"
        );
        self.fire_changed();
        Ok(GraphCopy {
            nodes: node_map,
            edges: edge_map,
        })
    }

    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        use std::collections::HashMap;

        // 全局节点链表
        let mut count = 0;
        let mut hidden = 0;
        let mut prev = None;
        let mut cur = self.node_list.first;
        while let Some(id) = cur {
            let rec = self.n(id);
            assert_eq!(rec.links.prev, prev, "节点链表前驱不一致");
            assert!(self.registry.is_live(&self.node_handle(id)));
            count += 1;
            if rec.hidden {
                hidden += 1;
            }
            prev = Some(id);
            cur = rec.links.next;
        }
        assert_eq!(self.node_list.last, prev);
        assert_eq!(count, self.node_count);
        assert_eq!(hidden, self.hidden_nodes);
        assert_eq!(self.nodes.iter().flatten().count(), self.node_count);

        // 全局边链表
        let mut count = 0;
        let mut prev = None;
        let mut cur = self.edge_list.first;
        while let Some(id) = cur {
            let rec = self.e(id);
            assert_eq!(rec.links.prev, prev, "边链表前驱不一致");
            assert_ne!(rec.source, rec.target);
            count += 1;
            prev = Some(id);
            cur = rec.links.next;
        }
        assert_eq!(self.edge_list.last, prev);
        assert_eq!(count, self.edge_count);

        // 关联边链表与度数
        let mut seen: HashMap<(u32, u32), usize> = HashMap::new();
        for (vid, slot) in self.nodes.iter().enumerate() {
            let Some(rec) = slot else { continue };
            let vid = vid as u32;
            let mut prev = None;
            let mut cur = rec.first_adj;
            let mut degree = 0;
            let mut out = 0;
            while let Some(e) = cur {
                let erec = self.e(e);
                assert!(erec.is_incident(vid), "关联边链表含非关联边");
                assert_eq!(erec.prev_at(vid), prev, "关联边前驱不一致");
                *seen.entry((vid, e)).or_default() += 1;
                degree += 1;
                if erec.source == vid {
                    out += 1;
                }
                prev = Some(e);
                cur = erec.next_at(vid);
            }
            assert_eq!(rec.last_adj, prev);
            assert_eq!(degree, rec.degree());
            assert_eq!(out, rec.out_degree);
        }
        for (eid, slot) in self.edges.iter().enumerate() {
            let Some(rec) = slot else { continue };
            let eid = eid as u32;
            assert_eq!(seen.get(&(rec.source, eid)), Some(&1));
            assert_eq!(seen.get(&(rec.target, eid)), Some(&1));
        }
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Graph {
    fn drop(&mut self) {
        // 存活的辅助结构此后对任何键都报告 NotOwner
        self.registry.retire_all();
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("uid", &self.uid())
            .field("nodes", &self.node_count)
            .field("edges", &self.edge_count)
            .field("hidden_nodes", &self.hidden_nodes)
            .field("hidden_edges", &self.hidden_edges)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// 全局节点迭代器
pub struct NodeIter<'a> {
    graph: &'a Graph,
    cur: Option<u32>,
    include_hidden: bool,
}

impl Iterator for NodeIter<'_> {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        let id = self.cur?;
        self.cur = self.graph.step_node(Some(id), true, self.include_hidden);
        Some(self.graph.node_handle(id))
    }
}

/// 全局边迭代器
pub struct EdgeIter<'a> {
    graph: &'a Graph,
    cur: Option<u32>,
    include_hidden: bool,
}

impl Iterator for EdgeIter<'_> {
    type Item = Edge;

    fn next(&mut self) -> Option<Edge> {
        let id = self.cur?;
        self.cur = self.graph.step_edge(Some(id), true, self.include_hidden);
        Some(self.graph.edge_handle(id))
    }
}

/// 关联边迭代器
pub struct AdjacentEdges<'a> {
    graph: &'a Graph,
    node: u32,
    cur: Option<u32>,
    side: Side,
}

impl Iterator for AdjacentEdges<'_> {
    type Item = Edge;

    fn next(&mut self) -> Option<Edge> {
        let id = self.cur?;
        self.cur = self
            .graph
            .scan_adjacent(self.node, Some(id), true, self.side);
        Some(self.graph.edge_handle(id))
    }
}
