use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 应用程序统一错误类型
/// 用于封装系统中可能出现的各种错误，提供统一的错误处理机制
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum AppError {
    /// 通用错误，包含错误消息
    #[error("通用错误: {message}")]
    Generic { message: String },

    /// PLC通信相关错误
    ///
    /// **业务含义**: 表示与PLC设备通信过程中发生的意外故障
    /// 与设备返回的非零结果码不同：结果码由轮询控制器就地吸收并记录日志，
    /// 本错误变体对应的是连接尝试期间的不可预期故障（网络栈异常等），
    /// 是唯一会穿透公共接口传播给调用方的错误路径
    #[error("PLC通信错误: {message}")]
    PlcCommunicationError { message: String },

    /// 地址格式错误
    ///
    /// 文本地址不符合 "DB<块>.DBX<字节>.<位>" 语法时返回
    /// 在任何设备调用发生之前即刻失败，与设备层错误严格区分
    #[error("地址格式错误: {address} - {message}")]
    AddressFormatError { address: String, message: String },

    /// 配置相关错误
    #[error("配置错误: {message}")]
    ConfigurationError { message: String },

    /// 并发/异步操作错误
    #[error("并发错误: {message}")]
    ConcurrencyError { message: String },
}

impl AppError {
    /// 创建通用错误
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// 创建PLC通信错误
    pub fn plc_communication_error(message: impl Into<String>) -> Self {
        Self::PlcCommunicationError {
            message: message.into(),
        }
    }

    /// 创建地址格式错误
    pub fn address_format_error(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AddressFormatError {
            address: address.into(),
            message: message.into(),
        }
    }

    /// 创建配置错误
    pub fn configuration_error(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }
}

/// 应用程序统一结果类型
pub type AppResult<T> = Result<T, AppError>;
