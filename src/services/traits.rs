/// 核心服务接口定义
///
/// 定义服务生命周期接口与S7设备客户端适配器接口
use async_trait::async_trait;

use crate::utils::error::AppResult;

/// 基础服务接口
/// 所有服务实现必须遵循的生命周期规范
#[async_trait]
pub trait BaseService: Send + Sync {
    /// 服务名称
    fn service_name(&self) -> &'static str;

    /// 初始化服务
    async fn initialize(&mut self) -> AppResult<()> {
        Ok(())
    }

    /// 关闭服务
    async fn shutdown(&mut self) -> AppResult<()> {
        Ok(())
    }

    /// 健康检查
    async fn health_check(&self) -> AppResult<()> {
        Ok(())
    }
}

/// S7设备客户端适配器接口
///
/// 对底层现场协议客户端能力的抽象（会话协商、报文组帧、原始套接字IO
/// 均封装在实现内部）。协议层结果以数值结果码表达，0表示成功，
/// 非零结果码通过 [`error_text`](S7ClientAdapter::error_text) 解码为可读文本。
///
/// 约定：实现本身不要求对并发调用线程安全——所有设备内存访问由
/// 轮询控制器经单一互斥临界区串行化
#[async_trait]
pub trait S7ClientAdapter: Send {
    /// 按地址连接设备
    ///
    /// Ok(结果码)表示协议层结果（0为成功）；Err表示连接尝试期间的
    /// 不可预期故障，是唯一会被控制器向调用方重新抛出的路径
    async fn connect_to(&mut self, ip_address: &str, rack: u16, slot: u16) -> AppResult<i32>;

    /// 断开设备会话
    async fn disconnect(&mut self);

    /// 适配器自身维护的连接存活标志
    fn connected(&self) -> bool;

    /// 读取DB区字节区域，成功时填充buffer并返回0
    async fn db_read(&mut self, db: u16, start: u16, buffer: &mut [u8]) -> AppResult<i32>;

    /// 写入DB区字节区域，返回协议层结果码
    async fn db_write(&mut self, db: u16, start: u16, buffer: &[u8]) -> AppResult<i32>;

    /// 将数值结果码解码为可读错误文本
    fn error_text(&self, code: i32) -> String;
}
