//! 辅助结构
//!
//! 以节点/边为键的外部存储：稠密数组、关联映射与位集合。
//! 每个结构在构造时向图登记清理钩子，元素删除时由图同步清除对应条目；
//! 对已删除或外图元素的访问返回 `NotOwner`。

mod array;
mod bitset;
mod map;
mod set;

pub use array::ElementArray;
pub use map::ElementMap;
pub use set::ElementSet;

use crate::error::Result;
use crate::graph::{Edge, Element, Node};

pub type NodeArray<T> = ElementArray<Node, T>;
pub type EdgeArray<T> = ElementArray<Edge, T>;
pub type NodeMap<T> = ElementMap<Node, T>;
pub type EdgeMap<T> = ElementMap<Edge, T>;
pub type NodeSet = ElementSet<Node>;
pub type EdgeSet = ElementSet<Edge>;

/// 数组与映射共有的关联接口
pub trait ElementAssociation<K: Element, T> {
    /// 显式存储的值；未存储时为 `None`
    fn get(&self, key: K) -> Result<Option<T>>;

    /// 存储的值，未存储时返回默认值
    fn get_or_default(&self, key: K) -> Result<T>;

    /// 存储并返回旧值
    fn set(&mut self, key: K, value: T) -> Result<Option<T>>;

    fn unset(&mut self, key: K) -> Result<Option<T>>;

    /// 为所有存活元素存储同一个值
    fn set_all(&mut self, value: T);

    fn clear(&mut self);

    /// 自构造或上次 `clear` 以来是否未存储过非默认值
    fn is_clear(&self) -> bool;
}
