// 文件: src/services/infrastructure/plc/tests.rs
// 详细注释：轮询监控服务相关的单元测试

#[cfg(test)]
mod tests {
    // 从父模块 (services::infrastructure::plc) 的子模块导入
    use crate::services::infrastructure::plc::mock_s7_client::MockS7Client;
    use crate::services::infrastructure::plc::s7_poll_service::S7PollService;

    // 从项目其他地方导入
    use crate::models::enums::ConnectionState;
    use crate::services::traits::BaseService;
    use crate::utils::config::S7MonitorConfig;
    use crate::utils::error::AppError;

    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::sleep;
    use tokio_test::assert_ok;

    /// 构造测试配置（缩短轮询周期以加快测试）
    fn test_config(poll_interval_ms: u64) -> S7MonitorConfig {
        S7MonitorConfig {
            ip_address: "127.0.0.1".to_string(),
            poll_interval_ms,
            ..S7MonitorConfig::default()
        }
    }

    /// 构造服务，mock的克隆保留在测试侧用于预设与检查
    fn build_service(mock: &MockS7Client, poll_interval_ms: u64) -> S7PollService {
        S7PollService::new(Box::new(mock.clone()), test_config(poll_interval_ms)).unwrap()
    }

    /// 订阅刷新信号并返回计数器
    fn subscribe_counter(service: &S7PollService) -> Arc<AtomicUsize> {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        service.on_values_refreshed(move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });
        counter
    }

    /// 轮询等待条件成立（带超时）
    async fn wait_until(mut condition: impl FnMut() -> bool, timeout_ms: u64) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
        while tokio::time::Instant::now() < deadline {
            if condition() {
                return true;
            }
            sleep(Duration::from_millis(5)).await;
        }
        condition()
    }

    /// 连接成功后进入Online并启动轮询循环
    #[tokio::test]
    async fn test_connect_success_starts_polling() {
        let mock = MockS7Client::new();
        let service = build_service(&mock, 20);
        let notifications = subscribe_counter(&service);

        assert_eq!(service.connection_state(), ConnectionState::Offline);
        assert_ok!(service.connect("127.0.0.1", 0, 1).await);

        assert_eq!(service.connection_state(), ConnectionState::Online);
        assert!(service.is_polling());
        // 连接成功本身发布一次刷新信号
        assert!(notifications.load(Ordering::SeqCst) >= 1);

        // 等待若干个扫描周期：连接1次 + 至少3次扫描发布
        assert!(wait_until(|| notifications.load(Ordering::SeqCst) >= 4, 500).await);
        assert!(service.stats().successful_reads >= 3);
        assert!(mock.read_call_count() >= 3);

        service.disconnect().await;
    }

    /// 协议层连接失败：状态回落Offline、发布一次信号、不向调用方报错、不启动轮询
    #[tokio::test]
    async fn test_connect_failure_absorbed_into_state() {
        let mock = MockS7Client::new();
        mock.set_connect_result(0x0002);
        let service = build_service(&mock, 20);
        let notifications = subscribe_counter(&service);

        assert_ok!(service.connect("127.0.0.1", 0, 1).await);

        assert_eq!(service.connection_state(), ConnectionState::Offline);
        assert!(!service.is_polling());
        assert_eq!(notifications.load(Ordering::SeqCst), 1);

        // 确认轮询确实没有启动
        sleep(Duration::from_millis(80)).await;
        assert_eq!(mock.read_call_count(), 0);
    }

    /// 连接期间的不可预期故障：Offline + 信号 + 错误重新抛给调用方
    #[tokio::test]
    async fn test_connect_fault_propagates_to_caller() {
        let mock = MockS7Client::new();
        mock.set_connect_fault(true);
        let service = build_service(&mock, 20);
        let notifications = subscribe_counter(&service);

        let result = service.connect("127.0.0.1", 0, 1).await;
        assert!(matches!(
            result,
            Err(AppError::PlcCommunicationError { .. })
        ));
        assert_eq!(service.connection_state(), ConnectionState::Offline);
        assert!(!service.is_polling());
        assert_eq!(notifications.load(Ordering::SeqCst), 1);
    }

    /// 从未连接时disconnect是无副作用的空操作，且不发布信号
    #[tokio::test]
    async fn test_disconnect_when_never_connected_is_noop() {
        let mock = MockS7Client::new();
        let service = build_service(&mock, 20);
        let notifications = subscribe_counter(&service);

        service.disconnect().await;
        service.disconnect().await;

        assert_eq!(service.connection_state(), ConnectionState::Offline);
        assert_eq!(notifications.load(Ordering::SeqCst), 0);
        assert_eq!(mock.disconnect_call_count(), 0);
    }

    /// disconnect停止调度并拆除会话，之后不再有任何信号；重复调用幂等
    #[tokio::test]
    async fn test_disconnect_stops_polling_and_is_idempotent() {
        let mock = MockS7Client::new();
        let service = build_service(&mock, 20);
        let notifications = subscribe_counter(&service);

        assert_ok!(service.connect("127.0.0.1", 0, 1).await);
        assert!(wait_until(|| mock.read_call_count() >= 2, 500).await);

        service.disconnect().await;
        assert_eq!(service.connection_state(), ConnectionState::Offline);
        assert!(!service.is_polling());
        assert!(!mock.is_connected());
        assert_eq!(mock.disconnect_call_count(), 1);

        // 之后不再有信号
        let count_after_disconnect = notifications.load(Ordering::SeqCst);
        sleep(Duration::from_millis(100)).await;
        assert_eq!(notifications.load(Ordering::SeqCst), count_after_disconnect);

        // 第二次disconnect：适配器已离线，守卫直接放行，无新信号
        service.disconnect().await;
        assert_eq!(mock.disconnect_call_count(), 1);
        assert_eq!(notifications.load(Ordering::SeqCst), count_after_disconnect);
    }

    /// 读取失败保持旧值与连接状态不变，信号照发，循环在后续成功扫描中存活
    #[tokio::test]
    async fn test_failed_read_keeps_value_and_recurrence_survives() {
        let mock = MockS7Client::new();
        mock.preset_bit(1, 0, 0, true);
        let service = build_service(&mock, 20);
        let notifications = subscribe_counter(&service);

        assert_ok!(service.connect("127.0.0.1", 0, 1).await);
        assert!(wait_until(|| service.monitored_value(), 500).await);

        // 注入瞬态读取故障
        mock.set_read_result(0x0003);
        let count_before_fault = notifications.load(Ordering::SeqCst);
        assert!(wait_until(|| service.stats().failed_reads >= 2, 500).await);

        // 旧值与连接状态不受影响，信号仍在发布
        assert!(service.monitored_value());
        assert_eq!(service.connection_state(), ConnectionState::Online);
        assert!(notifications.load(Ordering::SeqCst) > count_before_fault);

        // 故障解除后循环继续工作：至少一次后续成功扫描
        mock.set_read_result(0);
        mock.preset_bit(1, 0, 0, false);
        assert!(wait_until(|| !service.monitored_value(), 500).await);

        service.disconnect().await;
    }

    /// 写入的位在有限个后续扫描内反映到监控值上
    #[tokio::test]
    async fn test_write_bit_reflected_by_subsequent_scan() {
        let mock = MockS7Client::new();
        let service = build_service(&mock, 20);

        assert_ok!(service.connect("127.0.0.1", 0, 1).await);
        assert!(!service.monitored_value());

        assert_ok!(service.write_bit(true));

        assert!(wait_until(|| mock.bit_at(1, 0, 0), 500).await);
        assert!(wait_until(|| service.monitored_value(), 500).await);

        // 写入范围恰为该位所在的单字节
        assert!(mock.was_address_written("DB1.DBB0"));
        let last_write = mock.last_write().unwrap();
        assert_eq!(last_write.operation_type, "db_write");
        assert_eq!(last_write.value, Value::from(vec![0b0000_0001u8]));

        service.disconnect().await;
    }

    /// 非法文本地址在任何设备调用之前立即失败
    #[tokio::test]
    async fn test_write_bit_malformed_address_fails_fast() {
        let mock = MockS7Client::new();
        let service = build_service(&mock, 20);

        for bad in ["DBX.0.0", "DB1.0.0", "", "DB1.DBX0.9"] {
            let result = service.write_bit_at(bad, true);
            assert!(
                matches!(result, Err(AppError::AddressFormatError { .. })),
                "地址 {:?} 应当立即失败",
                bad
            );
        }

        // 没有任何写入到达设备
        sleep(Duration::from_millis(50)).await;
        assert!(mock.write_log().is_empty());
    }

    /// 设备层写入失败只记日志，不向调用方回传
    #[tokio::test]
    async fn test_write_failure_is_silent_to_caller() {
        let mock = MockS7Client::new();
        mock.set_write_result(0x0004);
        let service = build_service(&mock, 20);

        assert_ok!(service.connect("127.0.0.1", 0, 1).await);
        assert_ok!(service.write_bit(true));

        assert!(wait_until(|| service.stats().failed_writes >= 1, 500).await);
        assert!(!mock.bit_at(1, 0, 0));
        assert!(mock.write_log().is_empty());

        service.disconnect().await;
    }

    /// 并发压力下写请求与轮询读取绝不交叉进入设备调用
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_interleaved_device_access_under_stress() {
        let mock = MockS7Client::new();
        // 拉宽每次设备调用的时间窗口，放大潜在竞争
        mock.set_device_delay_ms(3);
        let service = Arc::new(build_service(&mock, 5));

        assert_ok!(service.connect("127.0.0.1", 0, 1).await);

        let mut writers = Vec::new();
        for task_index in 0..4u8 {
            let service = service.clone();
            writers.push(tokio::spawn(async move {
                for i in 0..20u8 {
                    service.write_bit((i + task_index) % 2 == 0).unwrap();
                    sleep(Duration::from_millis(2)).await;
                }
            }));
        }
        for writer in writers {
            writer.await.unwrap();
        }

        // 等所有排队的写任务穿过临界区
        assert!(wait_until(|| service.stats().successful_writes >= 80, 2000).await);
        assert!(!mock.overlap_detected(), "检测到读写调用交叉进入");

        service.disconnect().await;
        assert!(!mock.overlap_detected());
    }

    /// 端到端场景：连接→若干次扫描→写入生效→断开后静默
    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let mock = MockS7Client::new();
        let service = build_service(&mock, 30);
        let notifications = subscribe_counter(&service);

        assert_ok!(service.connect("127.0.0.1", 0, 1).await);
        assert_eq!(service.connection_state(), ConnectionState::Online);

        // 约3个扫描周期内至少3次刷新信号（连接本身贡献1次）
        assert!(wait_until(|| notifications.load(Ordering::SeqCst) >= 4, 1000).await);

        // 扫描间隔应与轮询周期同量级（容忍调度抖动）
        let scan_time = service.scan_time();
        assert!(scan_time >= Duration::from_millis(1), "扫描间隔过小: {:?}", scan_time);
        assert!(scan_time <= Duration::from_millis(300), "扫描间隔过大: {:?}", scan_time);

        assert_ok!(service.write_bit(true));
        assert!(wait_until(|| service.monitored_value(), 1000).await);

        service.disconnect().await;
        let count_after_disconnect = notifications.load(Ordering::SeqCst);
        sleep(Duration::from_millis(150)).await;
        assert_eq!(notifications.load(Ordering::SeqCst), count_after_disconnect);
        assert_eq!(service.connection_state(), ConnectionState::Offline);
    }

    /// BaseService生命周期：健康检查反映在线状态，shutdown等价断开
    #[tokio::test]
    async fn test_base_service_lifecycle() {
        let mock = MockS7Client::new();
        let mut service = build_service(&mock, 20);

        assert_eq!(service.service_name(), "S7PollService");
        assert!(service.health_check().await.is_err());

        assert_ok!(service.connect("127.0.0.1", 0, 1).await);
        assert_ok!(service.health_check().await);

        assert_ok!(service.shutdown().await);
        assert_eq!(service.connection_state(), ConnectionState::Offline);
        assert!(!mock.is_connected());
    }

    /// 退订后不再收到刷新信号
    #[tokio::test]
    async fn test_unsubscribe_stops_notifications() {
        let mock = MockS7Client::new();
        let service = build_service(&mock, 20);

        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        let id = service.on_values_refreshed(move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_ok!(service.connect("127.0.0.1", 0, 1).await);
        assert!(wait_until(|| counter.load(Ordering::SeqCst) >= 2, 500).await);

        service.unsubscribe(id);
        // 留出一个周期让在途的发布完成
        sleep(Duration::from_millis(30)).await;
        let count_after_unsubscribe = counter.load(Ordering::SeqCst);
        sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), count_after_unsubscribe);

        service.disconnect().await;
    }
}
