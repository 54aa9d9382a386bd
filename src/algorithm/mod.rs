//! 图算法模块
//!
//! 包含连通分量计算

mod components;

pub use components::{
    component_sizes, connected_components, number_connected_components,
    visit_connected_component,
};
