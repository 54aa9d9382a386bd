//! 图构造配置

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 图构造参数（容量提示）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// 节点槽位预分配数
    pub node_capacity: usize,
    /// 边槽位预分配数
    pub edge_capacity: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            node_capacity: 16,
            edge_capacity: 16,
        }
    }
}

impl GraphConfig {
    /// 从 JSON 文件加载，缺省字段取默认值
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    pub fn with_node_capacity(mut self, n: usize) -> Self {
        self.node_capacity = n;
        self
    }

    pub fn with_edge_capacity(mut self, n: usize) -> Self {
        self.edge_capacity = n;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_partial_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"node_capacity\": 128}}").unwrap();

        let config = GraphConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.node_capacity, 128);
        assert_eq!(config.edge_capacity, GraphConfig::default().edge_capacity);
    }

    #[test]
    fn test_config_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(GraphConfig::from_json_file(file.path()).is_err());
    }
}
