//! 消息表 DDL 与存在性查询。

use crate::models::TableName;

pub const SCHEMA_EXISTS_SQL: &str =
    "select exists (select 1 from information_schema.schemata where schema_name = $1)";

pub const TABLE_EXISTS_SQL: &str = "select exists (select 1 from information_schema.tables \
     where table_schema = $1 and table_name = $2)";

pub const INDEX_EXISTS_SQL: &str = "select exists (select 1 from pg_indexes \
     where schemaname = $1 and tablename = $2 and indexname = $3)";

pub fn create_schema_sql(name: &TableName) -> String {
    format!("create schema \"{}\"", name.schema())
}

pub fn create_table_sql(name: &TableName) -> String {
    format!(
        "create table {} ( \
            id bigint generated always as identity primary key, \
            received_at timestamptz(3) not null, \
            topic varchar(1024) not null, \
            qos smallint not null check (qos between 0 and 2), \
            retained boolean not null, \
            client_id varchar(256), \
            payload_text text, \
            payload_bytes bytea, \
            user_properties text not null default '{{}}' \
         )",
        name.qualified()
    )
}

/// 需要存在的索引：(索引名, 创建语句)。
pub fn index_statements(name: &TableName) -> Vec<(String, String)> {
    let received_at = name.received_at_index();
    let topic_received_at = name.topic_received_at_index();
    vec![
        (
            received_at.clone(),
            format!(
                "create index \"{}\" on {} (received_at desc) include (topic)",
                received_at,
                name.qualified()
            ),
        ),
        (
            topic_received_at.clone(),
            format!(
                "create index \"{}\" on {} (topic, received_at desc)",
                topic_received_at,
                name.qualified()
            ),
        ),
    ]
}

pub fn insert_sql(name: &TableName) -> String {
    format!(
        "insert into {} \
         (received_at, topic, qos, retained, client_id, payload_text, payload_bytes, user_properties) \
         values (to_timestamp($1 / 1000.0), $2, $3, $4, $5, $6, $7, $8)",
        name.qualified()
    )
}
