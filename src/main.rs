// 应用程序主入口函数
//
// 演示用途：用Mock客户端跑通"连接→轮询→写入→断开"的完整流程，
// 真实现场部署时把MockS7Client替换为实际的S7客户端适配器实现即可

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use s7_monitor::{AppResult, ConnectionState, MockS7Client, S7MonitorConfig, S7PollService};

#[tokio::main]
async fn main() -> AppResult<()> {
    // 初始化日志（通过RUST_LOG环境变量控制级别）
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let config = S7MonitorConfig::default();
    log::info!(
        "=== S7轮询监控服务示例 === 目标: {} 周期: {:?} 监控地址: {}",
        config.ip_address,
        config.poll_interval(),
        config.monitored_address
    );

    let mock = MockS7Client::new();
    let service = Arc::new(S7PollService::new(Box::new(mock.clone()), config)?);

    // 订阅刷新信号，收到后重读公开属性
    let observer = service.clone();
    let _subscription = service.on_values_refreshed(move || {
        log::info!(
            "刷新: 状态={} 监控位={} 扫描间隔={:?}",
            observer.connection_state(),
            observer.monitored_value(),
            observer.scan_time()
        );
    });

    service.connect("192.168.0.1", 0, 1).await?;
    assert_eq!(service.connection_state(), ConnectionState::Online);

    sleep(Duration::from_millis(500)).await;

    // 按需写入监控位，随后的扫描会读回新值
    service.write_bit(true)?;
    sleep(Duration::from_millis(500)).await;

    service.disconnect().await;

    let stats = service.stats();
    log::info!(
        "统计: 成功读取={} 失败读取={} 成功写入={} 失败写入={}",
        stats.successful_reads,
        stats.failed_reads,
        stats.successful_writes,
        stats.failed_writes
    );
    Ok(())
}
