//! 边定义
//!
//! 有向边：端点 + 四个兄弟指针（分别位于源节点与目标节点的关联边链表中）

use super::list::{Linked, Links};
use crate::types::{GraphUid, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 边句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub(crate) graph: GraphUid,
    pub(crate) id: u32,
    pub(crate) stamp: u64,
}

impl Edge {
    /// 图内编号（仅在存活边之间唯一）
    pub fn id(&self) -> usize {
        self.id as usize
    }

    pub fn graph_uid(&self) -> GraphUid {
        self.graph
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.id)
    }
}

/// 图内部的边记录
#[derive(Debug, Clone)]
pub(crate) struct EdgeRecord {
    pub(crate) stamp: u64,
    pub(crate) source: u32,
    pub(crate) target: u32,
    /// 在源节点关联边链表中的前驱/后继
    pub(crate) s_prev: Option<u32>,
    pub(crate) s_next: Option<u32>,
    /// 在目标节点关联边链表中的前驱/后继
    pub(crate) t_prev: Option<u32>,
    pub(crate) t_next: Option<u32>,
    /// 全局边链表中的位置
    pub(crate) links: Links,
    pub(crate) hidden: bool,
    pub(crate) special: bool,
    pub(crate) info: Option<Value>,
}

impl EdgeRecord {
    pub(crate) fn new(stamp: u64, source: u32, target: u32, info: Option<Value>) -> Self {
        Self {
            stamp,
            source,
            target,
            s_prev: None,
            s_next: None,
            t_prev: None,
            t_next: None,
            links: Links::default(),
            hidden: false,
            special: false,
            info,
        }
    }

    pub(crate) fn is_incident(&self, v: u32) -> bool {
        self.source == v || self.target == v
    }

    /// 另一端点。调用方保证 `v` 是端点之一。
    pub(crate) fn opposite(&self, v: u32) -> u32 {
        if self.source == v {
            self.target
        } else {
            self.source
        }
    }

    pub(crate) fn next_at(&self, v: u32) -> Option<u32> {
        if self.source == v {
            self.s_next
        } else {
            self.t_next
        }
    }

    pub(crate) fn prev_at(&self, v: u32) -> Option<u32> {
        if self.source == v {
            self.s_prev
        } else {
            self.t_prev
        }
    }

    pub(crate) fn set_next_at(&mut self, v: u32, next: Option<u32>) {
        if self.source == v {
            self.s_next = next;
        } else {
            self.t_next = next;
        }
    }

    pub(crate) fn set_prev_at(&mut self, v: u32, prev: Option<u32>) {
        if self.source == v {
            self.s_prev = prev;
        } else {
            self.t_prev = prev;
        }
    }

    /// 交换方向，两侧链表位置保持不变
    pub(crate) fn reverse(&mut self) {
        std::mem::swap(&mut self.source, &mut self.target);
        std::mem::swap(&mut self.s_prev, &mut self.t_prev);
        std::mem::swap(&mut self.s_next, &mut self.t_next);
    }
}

impl Linked for EdgeRecord {
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
    fn test_sibling_pointers_by_endpoint() {
        let mut rec = EdgeRecord::new(1, 10, 20, None);
        rec.set_next_at(10, Some(5));
        rec.set_prev_at(20, Some(6));

        assert_eq!(rec.s_next, Some(5));
        assert_eq!(rec.t_prev, Some(6));
        assert_eq!(rec.next_at(10), Some(5));
        assert_eq!(rec.next_at(20), None);
        assert_eq!(rec.opposite(10), 20);
        assert!(rec.is_incident(20));
        assert!(!rec.is_incident(30));
    }

    #[test]
    fn test_reverse_keeps_positions() {
        let mut rec = EdgeRecord::new(1, 10, 20, None);
        rec.s_next = Some(1);
        rec.t_next = Some(2);

        rec.reverse();

        assert_eq!(rec.source, 20);
        assert_eq!(rec.target, 10);
        // 在节点 10 的链表中的后继不变
        assert_eq!(rec.next_at(10), Some(1));
        assert_eq!(rec.next_at(20), Some(2));
    }

    #[test]
    fn test_edge_display() {
        let e = Edge {
            graph: GraphUid(1),
            id: 4,
            stamp: 9,
        };
        assert_eq!(e.to_string(), "e4");
    }
}
