//! 应用运行配置加载。

use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 落库并发上限默认值。
pub const DEFAULT_MAX_CONCURRENT_WRITES: usize = 1000;

/// 单次写入超时默认值（秒）。
pub const DEFAULT_WRITE_TIMEOUT_SECONDS: u64 = 30;

/// 应用运行配置（启动时加载一次，之后只读）。
#[derive(Debug, Clone)]
pub struct Settings {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_client_id: String,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    /// 订阅顺序即配置顺序，允许重复。
    pub mqtt_topics: Vec<String>,
    pub mqtt_qos: u8,
    pub mqtt_keep_alive_seconds: u64,
    pub mqtt_connect_timeout_seconds: u64,
    pub database_url: String,
    pub table_schema: String,
    pub table_name: String,
    pub create_table: bool,
    pub startup_delay_seconds: u64,
    pub max_concurrent_writes: usize,
    /// 单次写入（建连 + insert）的时间上限。
    pub write_timeout_seconds: u64,
}

impl Settings {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意 key → value 来源读取配置。
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let reader = Reader { lookup };
        let database_url = reader
            .optional("MQSINK_DATABASE_URL")
            .ok_or_else(|| ConfigError::Missing("MQSINK_DATABASE_URL".to_string()))?;
        let mqtt_host = reader
            .optional("MQSINK_MQTT_HOST")
            .unwrap_or_else(|| "127.0.0.1".to_string());
        let mqtt_port = reader.parse_with_default("MQSINK_MQTT_PORT", 1883u16)?;
        let mqtt_client_id = reader
            .optional("MQSINK_MQTT_CLIENT_ID")
            .unwrap_or_else(|| format!("mqsink-{}", uuid::Uuid::new_v4().simple()));
        let mqtt_username = reader.optional("MQSINK_MQTT_USERNAME");
        let mqtt_password = reader.optional("MQSINK_MQTT_PASSWORD");
        // 凭据必须成对出现，只配一半视为配置错误。
        match (&mqtt_username, &mqtt_password) {
            (Some(_), None) => {
                return Err(ConfigError::Missing("MQSINK_MQTT_PASSWORD".to_string()));
            }
            (None, Some(_)) => {
                return Err(ConfigError::Missing("MQSINK_MQTT_USERNAME".to_string()));
            }
            _ => {}
        }
        let mqtt_topics = match reader.raw("MQSINK_MQTT_TOPICS") {
            Some(value) => parse_topics("MQSINK_MQTT_TOPICS", &value)?,
            None => vec!["#".to_string()],
        };
        let mqtt_qos = reader.parse_with_default("MQSINK_MQTT_QOS", 1u8)?;
        if mqtt_qos > 2 {
            return Err(ConfigError::Invalid(
                "MQSINK_MQTT_QOS".to_string(),
                mqtt_qos.to_string(),
            ));
        }
        let mqtt_keep_alive_seconds =
            reader.parse_with_default("MQSINK_MQTT_KEEP_ALIVE_SECONDS", 30u64)?;
        let mqtt_connect_timeout_seconds =
            reader.parse_with_default("MQSINK_MQTT_CONNECT_TIMEOUT_SECONDS", 10u64)?;
        let table_schema = reader
            .optional("MQSINK_TABLE_SCHEMA")
            .unwrap_or_else(|| "public".to_string());
        let table_name = reader
            .optional("MQSINK_TABLE_NAME")
            .unwrap_or_else(|| "mqtt_messages".to_string());
        let create_table = reader.bool_with_default("MQSINK_CREATE_TABLE", false)?;
        let startup_delay_seconds =
            reader.parse_with_default("MQSINK_STARTUP_DELAY_SECONDS", 0u64)?;
        let max_concurrent_writes = reader.parse_with_default(
            "MQSINK_MAX_CONCURRENT_WRITES",
            DEFAULT_MAX_CONCURRENT_WRITES,
        )?;
        let write_timeout_seconds = reader.parse_with_default(
            "MQSINK_WRITE_TIMEOUT_SECONDS",
            DEFAULT_WRITE_TIMEOUT_SECONDS,
        )?;
        if write_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "MQSINK_WRITE_TIMEOUT_SECONDS".to_string(),
                "0".to_string(),
            ));
        }
        if max_concurrent_writes == 0 {
            return Err(ConfigError::Invalid(
                "MQSINK_MAX_CONCURRENT_WRITES".to_string(),
                "0".to_string(),
            ));
        }

        Ok(Self {
            mqtt_host,
            mqtt_port,
            mqtt_client_id,
            mqtt_username,
            mqtt_password,
            mqtt_topics,
            mqtt_qos,
            mqtt_keep_alive_seconds,
            mqtt_connect_timeout_seconds,
            database_url,
            table_schema,
            table_name,
            create_table,
            startup_delay_seconds,
            max_concurrent_writes,
            write_timeout_seconds,
        })
    }
}

struct Reader<F> {
    lookup: F,
}

impl<F> Reader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
    }

    fn optional(&self, key: &str) -> Option<String> {
        match self.raw(key) {
            Some(value) if !value.is_empty() => Some(value),
            _ => None,
        }
    }

    fn parse_with_default<T: std::str::FromStr>(
        &self,
        key: &str,
        default: T,
    ) -> Result<T, ConfigError> {
        let value = match self.optional(key) {
            Some(value) => value,
            None => return Ok(default),
        };
        value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid(key.to_string(), value))
    }

    fn bool_with_default(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        let Some(value) = self.optional(key) else {
            return Ok(default);
        };
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "yes" => Ok(true),
            "0" | "false" | "off" | "no" => Ok(false),
            _ => Err(ConfigError::Invalid(key.to_string(), value)),
        }
    }
}

/// 逗号分隔的 topic filter 列表：去除空白项，保留顺序与重复项。
fn parse_topics(key: &str, value: &str) -> Result<Vec<String>, ConfigError> {
    let topics: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|topic| !topic.is_empty())
        .map(str::to_string)
        .collect();
    if topics.is_empty() {
        return Err(ConfigError::Invalid(key.to_string(), value.to_string()));
    }
    Ok(topics)
}
