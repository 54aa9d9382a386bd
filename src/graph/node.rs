//! 节点定义
//!
//! 节点句柄与图内部的节点记录（关联边链表端点、出入度、负载）

use super::list::{Linked, Links};
use crate::types::{GraphUid, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 节点句柄
///
/// 轻量、可复制。`id` 即节点在所属图中的槽位下标，`stamp` 是创建序号，
/// 节点删除后旧句柄不会再被该图接受。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    pub(crate) graph: GraphUid,
    pub(crate) id: u32,
    pub(crate) stamp: u64,
}

impl Node {
    /// 图内编号（仅在存活节点之间唯一）
    pub fn id(&self) -> usize {
        self.id as usize
    }

    /// 创建该节点的图
    pub fn graph_uid(&self) -> GraphUid {
        self.graph
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.id)
    }
}

/// 图内部的节点记录
#[derive(Debug, Clone)]
pub(crate) struct NodeRecord {
    pub(crate) stamp: u64,
    /// 全局节点链表中的位置
    pub(crate) links: Links,
    /// 关联边链表
    pub(crate) first_adj: Option<u32>,
    pub(crate) last_adj: Option<u32>,
    pub(crate) in_degree: usize,
    pub(crate) out_degree: usize,
    pub(crate) hidden: bool,
    pub(crate) info: Option<Value>,
    pub(crate) data: Option<Value>,
}

impl NodeRecord {
    pub(crate) fn new(stamp: u64, info: Option<Value>) -> Self {
        Self {
            stamp,
            links: Links::default(),
            first_adj: None,
            last_adj: None,
            in_degree: 0,
            out_degree: 0,
            hidden: false,
            info,
            data: None,
        }
    }

    pub(crate) fn degree(&self) -> usize {
        self.in_degree + self.out_degree
    }
}

impl Linked for NodeRecord {
    fn links(&self) -> &Links {
        &self.links
    }

    fn links_mut(&mut self) -> &mut Links {
        &mut self.links
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_display() {
        let v = Node {
            graph: GraphUid(7),
            id: 3,
            stamp: 11,
        };
        assert_eq!(v.to_string(), "v3");
        assert_eq!(v.id(), 3);
        assert_eq!(v.graph_uid(), GraphUid(7));
    }

    #[test]
    fn test_node_record_degree() {
        let mut rec = NodeRecord::new(1, Some(Value::from("a")));
        rec.in_degree = 2;
        rec.out_degree = 1;
        assert_eq!(rec.degree(), 3);
        assert!(rec.data.is_none());
    }
}
