/// 服务层模块
/// 包含服务接口定义与基础设施层实现

/// 核心服务接口定义
pub mod traits;

/// 基础设施层服务模块
pub mod infrastructure;

// 重新导出常用接口和实现
pub use traits::*;
pub use infrastructure::*;
