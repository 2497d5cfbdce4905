//! # mqsink Storage 模块
//!
//! 消息表的存储抽象层：建表（幂等）与单行追加写入。
//!
//! ## 架构设计
//!
//! 1. **接口抽象层** (`traits.rs`)：`MessageStore` 异步 Trait
//! 2. **数据模型层** (`models.rs`)：`StoredRow`、`TableName`
//! 3. **错误处理层** (`error.rs`)：`StorageError`（写入）、`SchemaError`（建表）
//! 4. **验证辅助层** (`validation.rs`)：SQL 标识符校验
//! 5. **连接管理层** (`connection.rs`)：单次调用的数据库会话
//! 6. **实现层**：
//!    - `in_memory/`：内存实现（测试与本地接线）
//!    - `postgres/`：PostgreSQL 实现（生产环境使用）
//!
//! ## 设计约束
//!
//! - **每次写入独立连接**：不依赖连接池，卡死的连接不会阻塞后续写入；
//!   连接在每条退出路径上关闭。
//! - **不做内部重试**：重试策略属于调用方。
//! - **只追加**：行从不更新或删除。
//! - **参数化写入**：表名在构造时校验后拼入 SQL，其余字段全部参数绑定。
//!
//! ## 表结构
//!
//! | 列 | 类型 |
//! |----|------|
//! | `id` | `bigint` identity 主键 |
//! | `received_at` | `timestamptz(3)`，接收时刻（UTC，毫秒） |
//! | `topic` | `varchar(1024)` |
//! | `qos` | `smallint`（0–2） |
//! | `retained` | `boolean` |
//! | `client_id` | `varchar(256)`，可空 |
//! | `payload_text` | `text`，可空（非 UTF-8 负载为空） |
//! | `payload_bytes` | `bytea` |
//! | `user_properties` | `text`，JSON 对象，默认 `{}` |
//!
//! 索引：`ix_<table>_received_at`（received_at desc，include topic）与
//! `ix_<table>_topic_received_at`（topic, received_at desc），仅服务于查询侧。

pub mod connection;
pub mod error;
pub mod in_memory;
pub mod models;
pub mod postgres;
pub mod traits;
pub mod validation;

pub use connection::*;
pub use error::*;
pub use models::*;
pub use traits::*;
pub use validation::*;

pub use in_memory::InMemoryMessageStore;
pub use postgres::PgMessageStore;
