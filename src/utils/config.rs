use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::structs::PlcBitAddress;
use crate::utils::error::{AppError, AppResult};

/// 提供给 serde 的默认轮询周期（毫秒）
fn default_poll_interval_ms() -> u64 {
    100
}

/// 提供给 serde 的默认监控地址
fn default_monitored_address() -> String {
    "DB1.DBX0.0".to_string()
}

/// S7监控服务配置结构
/// 包含轮询控制器运行所需的所有配置信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S7MonitorConfig {
    /// PLC IP地址
    pub ip_address: String,
    /// 机架号
    pub rack: u16,
    /// 槽号
    pub slot: u16,
    /// 轮询周期（毫秒），标称值100ms
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// 监控位地址（文本格式 "DB<块>.DBX<字节>.<位>"）
    #[serde(default = "default_monitored_address")]
    pub monitored_address: String,
}

impl Default for S7MonitorConfig {
    fn default() -> Self {
        Self {
            ip_address: "192.168.0.1".to_string(),
            rack: 0,
            slot: 1,
            poll_interval_ms: default_poll_interval_ms(),
            monitored_address: default_monitored_address(),
        }
    }
}

impl S7MonitorConfig {
    /// 轮询周期
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 校验配置有效性
    ///
    /// 轮询周期必须大于0，监控地址必须可解析
    pub fn validate(&self) -> AppResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(AppError::configuration_error("轮询周期必须大于0毫秒"));
        }
        if self.ip_address.trim().is_empty() {
            return Err(AppError::configuration_error("PLC IP地址不能为空"));
        }
        self.monitored_address.parse::<PlcBitAddress>()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = S7MonitorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.monitored_address, "DB1.DBX0.0");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = S7MonitorConfig::default();
        config.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = S7MonitorConfig::default();
        config.monitored_address = "DB1.0.0".to_string();
        assert!(matches!(
            config.validate(),
            Err(AppError::AddressFormatError { .. })
        ));
    }
}
