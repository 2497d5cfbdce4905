/// 入站消息：每次投递回调生成一条，由一次落库流水线调用独占消费。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    /// 实际投递的 QoS（0/1/2）。
    pub qos: u8,
    pub retained: bool,
    /// 本桥接自身配置的 client id（broker 不转发发布者的 id）。
    pub client_id: String,
    pub payload: Vec<u8>,
    /// 发布者附带的用户属性，保持原始顺序，允许重复 key。
    pub user_properties: Vec<(String, String)>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, qos: u8, retained: bool, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            qos,
            retained,
            client_id: String::new(),
            payload,
            user_properties: Vec::new(),
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_user_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_properties.push((key.into(), value.into()));
        self
    }

    /// 负载的 UTF-8 文本。
    ///
    /// 空负载解码为空字符串；非法字节序列返回 `None`，原始字节不受影响。
    pub fn payload_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}
