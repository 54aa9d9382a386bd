//! 错误类型定义

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("不允许自环边: {0}")]
    IllegalSelfEdge(String),

    #[error("元素不属于该图或已被删除: {0}")]
    NotOwner(String),

    #[error("边 {edge} 与节点 {node} 不关联")]
    NotIncident { edge: String, node: String },

    #[error("无效的邻接顺序: {0}")]
    InvalidAdjacencyOrder(String),

    #[error("解析错误: {0}")]
    ParseError(String),

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    SerializationError(String),
}

impl Error {
    /// 是否为归属校验失败
    pub fn is_not_owner(&self) -> bool {
        matches!(self, Error::NotOwner(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::SerializationError(e.to_string())
    }
}
