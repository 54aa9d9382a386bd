//! 图变更监听协议
//!
//! 触发顺序：新建元素在完全链入后通知；删除元素在摘除前通知（此时仍可查询其邻接）；
//! 结构操作完成后通知 `graph_has_changed`，批量删除只在末尾通知一次。

use super::edge::Edge;
use super::graph::Graph;
use super::node::Node;
use crate::collections::{EdgeSet, NodeSet};
use parking_lot::Mutex;

/// 监听器登记号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

/// 图变更监听器，所有方法默认为空操作
pub trait GraphUpdateListener: Send + Sync {
    fn new_node(&self, _graph: &Graph, _v: Node) {}

    fn delete_node(&self, _graph: &Graph, _v: Node) {}

    fn new_edge(&self, _graph: &Graph, _e: Edge) {}

    fn delete_edge(&self, _graph: &Graph, _e: Edge) {}

    fn graph_has_changed(&self, _graph: &Graph) {}

    /// 批量读入完成，参数为本次新建的节点与边
    fn graph_was_read(&self, _graph: &Graph, _nodes: &NodeSet, _edges: &EdgeSet) {}
}

/// 记录到的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphEvent {
    NewNode(Node),
    DeleteNode(Node),
    NewEdge(Edge),
    DeleteEdge(Edge),
    Changed,
    Read { nodes: usize, edges: usize },
}

/// 按顺序记录全部事件的监听器
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: Mutex<Vec<GraphEvent>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<GraphEvent> {
        self.events.lock().clone()
    }

    /// 取出并清空已记录事件
    pub fn take(&self) -> Vec<GraphEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    fn push(&self, event: GraphEvent) {
        self.events.lock().push(event);
    }
}

impl GraphUpdateListener for EventRecorder {
    fn new_node(&self, _graph: &Graph, v: Node) {
        self.push(GraphEvent::NewNode(v));
    }

    fn delete_node(&self, _graph: &Graph, v: Node) {
        self.push(GraphEvent::DeleteNode(v));
    }

    fn new_edge(&self, _graph: &Graph, e: Edge) {
        self.push(GraphEvent::NewEdge(e));
    }

    fn delete_edge(&self, _graph: &Graph, e: Edge) {
        self.push(GraphEvent::DeleteEdge(e));
    }

    fn graph_has_changed(&self, _graph: &Graph) {
        self.push(GraphEvent::Changed);
    }

    fn graph_was_read(&self, _graph: &Graph, nodes: &NodeSet, edges: &EdgeSet) {
        self.push(GraphEvent::Read {
            nodes: nodes.len(),
            edges: edges.len(),
        });
    }
}
