/// S7_MONITOR S7 PLC轮询监控 - Rust核心库
pub mod models;
pub mod utils;
pub mod services;
pub mod error;

// 重新导出常用类型，方便使用
pub use models::*;
pub use utils::{AppError, AppResult, S7MonitorConfig};
pub use services::*;
