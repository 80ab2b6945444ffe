/// 基础设施层服务模块
/// 负责与外部系统的交互，如PLC通信、事件发布等

/// PLC通信相关模块
pub mod plc;

/// 事件发布相关模块
pub mod event_publisher;

// 重新导出常用接口和实现
pub use event_publisher::{SubscriptionId, ValuesRefreshedEvent};
pub use plc::*;
