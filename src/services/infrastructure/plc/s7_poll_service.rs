/// S7轮询监控服务
///
/// 业务说明：
/// 持有与单台PLC的连接生命周期，以标称100ms周期驱动扫描循环，
/// 解码被监控的位并对外暴露最新值，同时支持按需写入单个位。
/// 一个服务实例只管理一条连接和一个固定的关注区域。
///
/// 并发纪律：
/// - 所有设备内存访问（轮询读取与按需写入）经由同一把互斥锁串行化，
///   保证字节级传输不会互相交叉
/// - 扫描循环为单任务非重入结构：慢读取只会推迟下一次触发，不会堆叠
/// - ConnectionState/监控值/扫描耗时仅由控制器自身的任务写入，
///   外部调用方无需同步即可读取（接受最终一致）
use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::models::enums::ConnectionState;
use crate::models::structs::{PlcBitAddress, ScanStats};
use crate::services::infrastructure::event_publisher::{SubscriptionId, ValuesRefreshedEvent};
use crate::services::traits::{BaseService, S7ClientAdapter};
use crate::utils::config::S7MonitorConfig;
use crate::utils::error::{AppError, AppResult};
use crate::utils::time_utils::timestamp_hms;

/// 共享设备客户端
/// 这把锁就是读路径与写路径共用的唯一临界区
type SharedClient = Arc<Mutex<Box<dyn S7ClientAdapter>>>;

/// 运行中的轮询任务句柄
struct PollTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// S7轮询监控服务实现
pub struct S7PollService {
    /// 设备客户端适配器（单一互斥临界区）
    client: SharedClient,
    /// 服务配置
    config: S7MonitorConfig,
    /// 被监控位地址（由配置解析，解析后不可变）
    monitored_address: PlcBitAddress,
    /// 连接状态（仅由控制器自身变更）
    connection_state: Arc<RwLock<ConnectionState>>,
    /// 被监控位的最新已知值（读取失败时保持旧值）
    monitored_value: Arc<AtomicBool>,
    /// 相邻两次扫描起点的间隔（健康诊断信号）
    scan_time: Arc<RwLock<Duration>>,
    /// 读写统计
    stats: Arc<RwLock<ScanStats>>,
    /// "数值已刷新"事件
    refreshed: Arc<ValuesRefreshedEvent>,
    /// 运行中的轮询任务
    poll_task: StdMutex<Option<PollTask>>,
}

impl S7PollService {
    /// 创建新的轮询监控服务
    ///
    /// 配置校验失败或监控地址无法解析时返回配置错误
    pub fn new(client: Box<dyn S7ClientAdapter>, config: S7MonitorConfig) -> AppResult<Self> {
        config.validate()?;
        let monitored_address: PlcBitAddress = config.monitored_address.parse()?;
        Ok(Self {
            client: Arc::new(Mutex::new(client)),
            config,
            monitored_address,
            connection_state: Arc::new(RwLock::new(ConnectionState::Offline)),
            monitored_value: Arc::new(AtomicBool::new(false)),
            scan_time: Arc::new(RwLock::new(Duration::ZERO)),
            stats: Arc::new(RwLock::new(ScanStats::default())),
            refreshed: Arc::new(ValuesRefreshedEvent::new()),
            poll_task: StdMutex::new(None),
        })
    }

    /// 当前连接状态
    pub fn connection_state(&self) -> ConnectionState {
        *self.connection_state.read().unwrap()
    }

    /// 被监控位的最新已知值
    /// 离线期间返回最后一次成功读取的值，可能已过期
    pub fn monitored_value(&self) -> bool {
        self.monitored_value.load(Ordering::Acquire)
    }

    /// 最近一次扫描间隔
    pub fn scan_time(&self) -> Duration {
        *self.scan_time.read().unwrap()
    }

    /// 读写统计快照
    pub fn stats(&self) -> ScanStats {
        self.stats.read().unwrap().clone()
    }

    /// 轮询循环是否在运行
    pub fn is_polling(&self) -> bool {
        self.poll_task.lock().unwrap().is_some()
    }

    /// 订阅"数值已刷新"信号
    ///
    /// 回调在产生变化的线程上同步执行，不得阻塞
    pub fn on_values_refreshed(
        &self,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.refreshed.subscribe(callback)
    }

    /// 退订刷新信号
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.refreshed.unsubscribe(id);
    }

    /// 连接PLC并启动轮询循环
    ///
    /// - 协议层返回非零结果码：记录诊断日志，状态回落Offline，不向调用方报错
    /// - 连接期间发生不可预期故障：状态回落Offline后将错误重新抛给调用方
    ///   （这是唯一向外传播错误的路径）
    /// - 两种结局都会发布一次刷新信号
    pub async fn connect(&self, ip_address: &str, rack: u16, slot: u16) -> AppResult<()> {
        info!(
            "🔗 [S7PollService] 连接PLC: {} (rack={}, slot={})",
            ip_address, rack, slot
        );

        // 重复connect时先停止既有轮询（底层适配器的重连语义由其自身定义）
        self.stop_poll_loop().await;

        self.set_state(ConnectionState::Connecting);

        let result = {
            let mut client = self.client.lock().await;
            client.connect_to(ip_address, rack, slot).await
        };

        match result {
            Ok(0) => {
                self.set_state(ConnectionState::Online);
                self.spawn_poll_loop();
                info!("✅ [S7PollService] PLC连接成功: {}", ip_address);
                self.refreshed.emit();
                Ok(())
            }
            Ok(code) => {
                let text = {
                    let client = self.client.lock().await;
                    client.error_text(code)
                };
                error!("{}\t 连接错误: {}", timestamp_hms(), text);
                self.set_state(ConnectionState::Offline);
                self.refreshed.emit();
                Ok(())
            }
            Err(e) => {
                error!("{}\t 连接错误(意外故障): {}", timestamp_hms(), e);
                self.set_state(ConnectionState::Offline);
                self.refreshed.emit();
                Err(e)
            }
        }
    }

    /// 断开连接并停止轮询
    ///
    /// 守卫检查的是适配器自身的存活标志而非控制器状态，
    /// 以容忍两者发生漂移；未连接时为无副作用的空操作（不发布信号）。
    /// 幂等，可重复调用
    pub async fn disconnect(&self) {
        let adapter_connected = {
            let client = self.client.lock().await;
            client.connected()
        };
        if !adapter_connected {
            debug!("[S7PollService] disconnect: 适配器未连接，忽略");
            return;
        }

        // 先停调度再拆会话：等待当前扫描释放临界区后任务退出
        self.stop_poll_loop().await;
        {
            let mut client = self.client.lock().await;
            client.disconnect().await;
        }
        self.set_state(ConnectionState::Offline);
        info!("🛑 [S7PollService] PLC连接已断开");
        self.refreshed.emit();
    }

    /// 向默认监控地址写入位值（即发即弃）
    ///
    /// 写请求脱离调用方执行，调用方不会因设备锁或网络往返而阻塞；
    /// 设备层失败仅记录日志，不向调用方回传
    pub fn write_bit(&self, value: bool) -> AppResult<()> {
        self.spawn_write(self.monitored_address, value);
        Ok(())
    }

    /// 向指定文本地址写入位值（即发即弃）
    ///
    /// 地址格式错误在任何设备调用之前立即返回给调用方，
    /// 与设备层错误严格区分
    pub fn write_bit_at(&self, address_text: &str, value: bool) -> AppResult<()> {
        let address: PlcBitAddress = address_text.parse()?;
        self.spawn_write(address, value);
        Ok(())
    }

    /// 派发一次位写入任务
    fn spawn_write(&self, address: PlcBitAddress, value: bool) {
        let client = self.client.clone();
        let stats = self.stats.clone();
        tokio::spawn(async move {
            // 单字节缓冲，只设置目标位，写入范围恰为该位所在字节
            let mut buffer = [0u8; 1];
            address.apply(&mut buffer[0], value);

            let mut client = client.lock().await;
            match client.db_write(address.db, address.byte, &buffer).await {
                Ok(0) => {
                    debug!("[S7PollService] 写入成功: {} = {}", address, value);
                    stats.write().unwrap().successful_writes += 1;
                }
                Ok(code) => {
                    let text = client.error_text(code);
                    error!("{}\t 写入错误: {}", timestamp_hms(), text);
                    stats.write().unwrap().failed_writes += 1;
                }
                Err(e) => {
                    error!("{}\t 写入错误: {}", timestamp_hms(), e);
                    stats.write().unwrap().failed_writes += 1;
                }
            }
        });
    }

    /// 更新连接状态
    fn set_state(&self, state: ConnectionState) {
        *self.connection_state.write().unwrap() = state;
    }

    /// 启动轮询任务
    fn spawn_poll_loop(&self) {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Self::poll_loop(
            self.client.clone(),
            self.monitored_address,
            self.config.poll_interval(),
            self.monitored_value.clone(),
            self.scan_time.clone(),
            self.stats.clone(),
            self.refreshed.clone(),
            cancel.clone(),
        ));

        let mut guard = self.poll_task.lock().unwrap();
        if let Some(previous) = guard.replace(PollTask { cancel, handle }) {
            // 不应出现：connect入口已停止旧任务
            warn!("[S7PollService] 检测到残留轮询任务，强制终止");
            previous.cancel.cancel();
            previous.handle.abort();
        }
    }

    /// 停止轮询任务并等待其退出
    async fn stop_poll_loop(&self) {
        let task = { self.poll_task.lock().unwrap().take() };
        if let Some(task) = task {
            task.cancel.cancel();
            if let Err(e) = task.handle.await {
                if !e.is_cancelled() {
                    warn!("[S7PollService] 轮询任务退出异常: {}", e);
                }
            }
        }
    }

    /// 轮询循环主体
    ///
    /// 每次触发执行恰好一轮"读取-解码-发布"；任何一轮的失败都只是
    /// 日志加观测状态，循环本身永不因单次故障停摆
    #[allow(clippy::too_many_arguments)]
    async fn poll_loop(
        client: SharedClient,
        address: PlcBitAddress,
        period: Duration,
        monitored_value: Arc<AtomicBool>,
        scan_time: Arc<RwLock<Duration>>,
        stats: Arc<RwLock<ScanStats>>,
        refreshed: Arc<ValuesRefreshedEvent>,
        cancel: CancellationToken,
    ) {
        // 首次触发推迟一个周期；慢扫描只推迟下一次触发，不允许堆叠
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_tick_started = Instant::now();

        info!("🔁 [S7PollService] 轮询循环启动，周期 {:?}", period);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("[S7PollService] 轮询循环已停止");
                    break;
                }
                _ = ticker.tick() => {
                    let tick_started = Instant::now();
                    *scan_time.write().unwrap() = tick_started - last_tick_started;

                    Self::refresh_values(&client, address, &monitored_value, &stats).await;

                    // 成功与否都发布刷新信号
                    refreshed.emit();
                    last_tick_started = tick_started;
                }
            }
        }
    }

    /// 单轮扫描：读取监控位所在字节并解码
    ///
    /// 读取失败（非零结果码或意外故障）时保持上一个已知值不变，
    /// 不触碰连接状态——读取失败是瞬态的，只记日志
    async fn refresh_values(
        client: &SharedClient,
        address: PlcBitAddress,
        monitored_value: &AtomicBool,
        stats: &RwLock<ScanStats>,
    ) {
        let mut buffer = [0u8; 1];

        let mut client = client.lock().await;
        match client.db_read(address.db, address.byte, &mut buffer).await {
            Ok(0) => {
                monitored_value.store(address.extract(buffer[0]), Ordering::Release);
                let mut stats = stats.write().unwrap();
                stats.successful_reads += 1;
                stats.last_scan_time = Some(chrono::Utc::now());
            }
            Ok(code) => {
                let text = client.error_text(code);
                error!("{}\t 读取错误: {}", timestamp_hms(), text);
                stats.write().unwrap().failed_reads += 1;
            }
            Err(e) => {
                error!("{}\t 读取错误: {}", timestamp_hms(), e);
                stats.write().unwrap().failed_reads += 1;
            }
        }
    }
}

#[async_trait]
impl BaseService for S7PollService {
    fn service_name(&self) -> &'static str {
        "S7PollService"
    }

    async fn shutdown(&mut self) -> AppResult<()> {
        self.disconnect().await;
        Ok(())
    }

    async fn health_check(&self) -> AppResult<()> {
        match self.connection_state() {
            ConnectionState::Online => Ok(()),
            state => Err(AppError::plc_communication_error(format!(
                "PLC未在线: {}",
                state
            ))),
        }
    }
}
