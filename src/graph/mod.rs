//! 图核心模块
//!
//! 定义节点、边和图的核心数据结构，以及辅助结构依赖的存活登记处

mod edge;
mod element;
#[allow(clippy::module_inception)]
mod graph;
mod list;
mod listener;
mod node;
pub(crate) mod registry;

pub use edge::Edge;
pub use element::{Element, ElementKind, Placement};
pub use graph::{AdjacentEdges, EdgeIter, Graph, GraphCopy, NodeIter};
pub use listener::{EventRecorder, GraphEvent, GraphUpdateListener, ListenerId};
pub use node::Node;
