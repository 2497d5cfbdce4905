//! # PostgreSQL 存储实现模块
//!
//! - **schema** (`schema.rs`)：建表/建索引 DDL 与按名存在性查询
//! - **message** (`message.rs`)：`PgMessageStore`，单行写入
//!
//! ## 会话
//!
//! 每次 `insert_row` / `provision_schema` 都打开一个新连接并在返回前关闭，
//! 不持有连接池（驱动内部缓存除外）。
//!
//! ## 幂等建表
//!
//! 先查询 `information_schema.schemata`、`information_schema.tables`、`pg_indexes`，
//! 只有缺失的对象才执行 `create`，不依赖捕获 "already exists" 错误。

pub mod message;
pub mod schema;

pub use message::*;
