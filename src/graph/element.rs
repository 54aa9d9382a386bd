//! 节点与边的公共抽象
//!
//! 辅助结构（数组、映射、集合）对节点和边的实现是同一份代码，靠 `Element` 区分种类。

use super::edge::Edge;
use super::graph::Graph;
use super::node::Node;
use crate::types::GraphUid;
use std::fmt;
use std::hash::Hash;

/// 元素种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Node,
    Edge,
}

impl ElementKind {
    pub(crate) fn index(self) -> usize {
        match self {
            ElementKind::Node => 0,
            ElementKind::Edge => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementKind::Node => "节点",
            ElementKind::Edge => "边",
        }
    }
}

/// 新边插入到参照边之前还是之后
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    Before,
    #[default]
    After,
}

pub(crate) mod sealed {
    use super::{Graph, GraphUid};

    /// 仅供库内部使用的元素操作，调用方负责先做归属校验
    pub trait Sealed: Sized {
        fn from_parts(graph: GraphUid, id: u32, stamp: u64) -> Self;

        /// 按全局顺序（含隐藏元素）移动一步；`from` 为 `None` 时取首/尾
        fn step(graph: &Graph, from: Option<Self>, forward: bool) -> Option<Self>;
    }

    impl Sealed for super::Node {
        fn from_parts(graph: GraphUid, id: u32, stamp: u64) -> Self {
            super::Node { graph, id, stamp }
        }

        fn step(graph: &Graph, from: Option<Self>, forward: bool) -> Option<Self> {
            graph
                .step_node(from.map(|v| v.id), forward, true)
                .map(|id| graph.node_handle(id))
        }
    }

    impl Sealed for super::Edge {
        fn from_parts(graph: GraphUid, id: u32, stamp: u64) -> Self {
            super::Edge { graph, id, stamp }
        }

        fn step(graph: &Graph, from: Option<Self>, forward: bool) -> Option<Self> {
            graph
                .step_edge(from.map(|e| e.id), forward, true)
                .map(|id| graph.edge_handle(id))
        }
    }
}

/// 图元素句柄（`Node` 或 `Edge`）
pub trait Element:
    sealed::Sealed + Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    const KIND: ElementKind;

    /// 图内编号
    fn index(&self) -> usize;

    /// 创建该元素的图
    fn owner_uid(&self) -> GraphUid;

    #[doc(hidden)]
    fn stamp(&self) -> u64;
}

impl Element for Node {
    const KIND: ElementKind = ElementKind::Node;

    fn index(&self) -> usize {
        self.id as usize
    }

    fn owner_uid(&self) -> GraphUid {
        self.graph
    }

    fn stamp(&self) -> u64 {
        self.stamp
    }
}

impl Element for Edge {
    const KIND: ElementKind = ElementKind::Edge;

    fn index(&self) -> usize {
        self.id as usize
    }

    fn owner_uid(&self) -> GraphUid {
        self.graph
    }

    fn stamp(&self) -> u64 {
        self.stamp
    }
}
