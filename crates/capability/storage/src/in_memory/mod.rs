//! 内存存储实现模块
//!
//! 仅用于测试和本地接线。
//!
//! 包含以下实现：
//! - MessageStore: InMemoryMessageStore

pub mod message;

pub use message::*;
