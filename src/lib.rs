//! IncidenceGraph - 关联表图数据结构
//!
//! 可变有向图核心，支持：
//! - O(1) 增删节点与边，每个节点维护有序的关联边链表
//! - 隐藏元素（只影响全局遍历与计数）
//! - 随删除自动清理的辅助结构（数组、映射、集合）
//! - 变更监听协议
//! - 纯文本交换格式与连通分量计算

pub mod algorithm;
pub mod collections;
pub mod config;
pub mod error;
pub mod graph;
pub mod io;
pub mod types;

// 重导出常用类型
pub use collections::{
    EdgeArray, EdgeMap, EdgeSet, ElementArray, ElementAssociation, ElementMap, ElementSet,
    NodeArray, NodeMap, NodeSet,
};
pub use config::GraphConfig;
pub use error::{Error, Result};
pub use graph::{
    Edge, Element, ElementKind, Graph, GraphCopy, GraphUpdateListener, ListenerId, Node,
    Placement,
};
pub use types::{GraphUid, Value};

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
