use serde::{Deserialize, Serialize};

/// PLC连接状态
///
/// 状态唯一归轮询控制器所有，仅由其connect/disconnect/错误处理路径变更，
/// 外部调用方只读
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// 离线
    Offline,
    /// 连接中
    Connecting,
    /// 在线（轮询循环运行中）
    Online,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::Offline
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ConnectionState::Offline => "Offline",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Online => "Online",
        };
        write!(f, "{}", text)
    }
}
