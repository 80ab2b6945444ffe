/// PLC通信相关模块

/// S7轮询监控服务实现
pub mod s7_poll_service;

/// Mock S7客户端实现（用于开发和测试）
pub mod mock_s7_client;

/// 单元测试模块
#[cfg(test)]
pub mod tests;

// 为后续步骤准备的真实客户端实现（暂时注释）
// pub mod snap7_client;

// 重新导出主要接口和类型
pub use mock_s7_client::*;
pub use s7_poll_service::*;
