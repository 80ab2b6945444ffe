/// Mock S7客户端实现
/// 用于开发和测试阶段，模拟真实的S7设备客户端行为
///
/// 除了基本的连接/读写模拟外，内置一个设备调用重入探测器：
/// 任何时刻若读写调用发生交叉进入，将被记录下来供测试断言，
/// 用于验证轮询控制器的临界区串行化纪律
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::services::traits::S7ClientAdapter;
use crate::utils::error::{AppError, AppResult};

/// 写入操作记录
/// 用于测试验证写入操作是否按预期执行
#[derive(Debug, Clone)]
pub struct WriteOperation {
    /// 写入时间戳
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// 写入地址（"DB<块>.DBB<字节>" 形式）
    pub address: String,
    /// 写入的原始字节
    pub value: Value,
    /// 操作类型描述
    pub operation_type: String,
}

/// Mock客户端内部共享状态
struct MockS7Inner {
    /// 连接存活标志（适配器自身维护）
    connected: AtomicBool,
    /// 模拟的设备内存（(DB块, 字节偏移) -> 字节值）
    memory: Mutex<HashMap<(u16, u16), u8>>,
    /// connect_to 返回的协议结果码
    connect_result_code: AtomicI32,
    /// 是否模拟连接期间的不可预期故障（返回Err而非结果码）
    connect_fault: AtomicBool,
    /// db_read 返回的协议结果码
    read_result_code: AtomicI32,
    /// db_write 返回的协议结果码
    write_result_code: AtomicI32,
    /// 模拟设备往返延迟（毫秒），用于拉宽并发竞争窗口
    device_delay_ms: AtomicU64,
    /// 当前是否有设备调用在执行中
    in_device_call: AtomicBool,
    /// 是否曾检测到读写调用交叉进入
    overlap_detected: AtomicBool,
    /// 读取调用计数
    read_calls: AtomicU64,
    /// 断开调用计数
    disconnect_calls: AtomicU64,
    /// 写入操作记录
    write_log: Mutex<Vec<WriteOperation>>,
}

/// 设备调用进入守卫
/// 进入时检测重入，离开（任何退出路径）时清除在call标志
struct DeviceCallGuard<'a> {
    inner: &'a MockS7Inner,
}

impl<'a> DeviceCallGuard<'a> {
    fn enter(inner: &'a MockS7Inner) -> Self {
        if inner.in_device_call.swap(true, Ordering::SeqCst) {
            inner.overlap_detected.store(true, Ordering::SeqCst);
        }
        Self { inner }
    }
}

impl Drop for DeviceCallGuard<'_> {
    fn drop(&mut self) {
        self.inner.in_device_call.store(false, Ordering::SeqCst);
    }
}

/// Mock S7客户端实现
///
/// Clone共享同一份内部状态：测试可以保留一个克隆，
/// 在把另一个克隆交给服务之后继续预设数据和检查调用记录
#[derive(Clone)]
pub struct MockS7Client {
    inner: Arc<MockS7Inner>,
}

impl MockS7Client {
    /// 创建新的Mock客户端实例
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MockS7Inner {
                connected: AtomicBool::new(false),
                memory: Mutex::new(HashMap::new()),
                connect_result_code: AtomicI32::new(0),
                connect_fault: AtomicBool::new(false),
                read_result_code: AtomicI32::new(0),
                write_result_code: AtomicI32::new(0),
                device_delay_ms: AtomicU64::new(0),
                in_device_call: AtomicBool::new(false),
                overlap_detected: AtomicBool::new(false),
                read_calls: AtomicU64::new(0),
                disconnect_calls: AtomicU64::new(0),
                write_log: Mutex::new(Vec::new()),
            }),
        }
    }

    /// 预设设备内存中某个位的值
    pub fn preset_bit(&self, db: u16, byte: u16, bit: u8, value: bool) {
        let mut memory = self.inner.memory.lock().unwrap();
        let slot = memory.entry((db, byte)).or_insert(0);
        if value {
            *slot |= 1u8 << bit;
        } else {
            *slot &= !(1u8 << bit);
        }
    }

    /// 读取设备内存中某个位的当前值
    pub fn bit_at(&self, db: u16, byte: u16, bit: u8) -> bool {
        let memory = self.inner.memory.lock().unwrap();
        memory.get(&(db, byte)).copied().unwrap_or(0) & (1u8 << bit) != 0
    }

    /// 设置connect_to返回的协议结果码
    pub fn set_connect_result(&self, code: i32) {
        self.inner.connect_result_code.store(code, Ordering::SeqCst);
    }

    /// 设置连接期间是否抛出不可预期故障
    pub fn set_connect_fault(&self, fault: bool) {
        self.inner.connect_fault.store(fault, Ordering::SeqCst);
    }

    /// 设置db_read返回的协议结果码
    pub fn set_read_result(&self, code: i32) {
        self.inner.read_result_code.store(code, Ordering::SeqCst);
    }

    /// 设置db_write返回的协议结果码
    pub fn set_write_result(&self, code: i32) {
        self.inner.write_result_code.store(code, Ordering::SeqCst);
    }

    /// 设置模拟设备往返延迟
    pub fn set_device_delay_ms(&self, delay_ms: u64) {
        self.inner.device_delay_ms.store(delay_ms, Ordering::SeqCst);
    }

    /// 是否曾检测到读写调用交叉进入
    pub fn overlap_detected(&self) -> bool {
        self.inner.overlap_detected.load(Ordering::SeqCst)
    }

    /// 读取调用计数
    pub fn read_call_count(&self) -> u64 {
        self.inner.read_calls.load(Ordering::SeqCst)
    }

    /// 断开调用计数
    pub fn disconnect_call_count(&self) -> u64 {
        self.inner.disconnect_calls.load(Ordering::SeqCst)
    }

    /// 连接存活标志（测试检查用）
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// 获取写入日志
    pub fn write_log(&self) -> Vec<WriteOperation> {
        self.inner.write_log.lock().unwrap().clone()
    }

    /// 获取最后一次写入操作
    pub fn last_write(&self) -> Option<WriteOperation> {
        self.inner.write_log.lock().unwrap().last().cloned()
    }

    /// 检查是否写入过指定地址
    pub fn was_address_written(&self, address: &str) -> bool {
        self.inner
            .write_log
            .lock()
            .unwrap()
            .iter()
            .any(|op| op.address == address)
    }

    /// 按配置模拟设备往返耗时
    async fn simulate_roundtrip(&self) {
        let delay_ms = self.inner.device_delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            sleep(Duration::from_millis(delay_ms)).await;
        }
    }
}

impl Default for MockS7Client {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl S7ClientAdapter for MockS7Client {
    async fn connect_to(&mut self, _ip_address: &str, _rack: u16, _slot: u16) -> AppResult<i32> {
        if self.inner.connect_fault.load(Ordering::SeqCst) {
            return Err(AppError::plc_communication_error("模拟连接故障"));
        }
        self.simulate_roundtrip().await;
        let code = self.inner.connect_result_code.load(Ordering::SeqCst);
        if code == 0 {
            self.inner.connected.store(true, Ordering::SeqCst);
        }
        Ok(code)
    }

    async fn disconnect(&mut self) {
        self.inner.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.connected.store(false, Ordering::SeqCst);
    }

    fn connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    async fn db_read(&mut self, db: u16, start: u16, buffer: &mut [u8]) -> AppResult<i32> {
        let _guard = DeviceCallGuard::enter(&self.inner);
        self.inner.read_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_roundtrip().await;

        let code = self.inner.read_result_code.load(Ordering::SeqCst);
        if code != 0 {
            return Ok(code);
        }

        let memory = self.inner.memory.lock().unwrap();
        for (offset, slot) in buffer.iter_mut().enumerate() {
            *slot = memory.get(&(db, start + offset as u16)).copied().unwrap_or(0);
        }
        Ok(0)
    }

    async fn db_write(&mut self, db: u16, start: u16, buffer: &[u8]) -> AppResult<i32> {
        let _guard = DeviceCallGuard::enter(&self.inner);
        self.simulate_roundtrip().await;

        let code = self.inner.write_result_code.load(Ordering::SeqCst);
        if code != 0 {
            return Ok(code);
        }

        {
            let mut memory = self.inner.memory.lock().unwrap();
            for (offset, value) in buffer.iter().enumerate() {
                memory.insert((db, start + offset as u16), *value);
            }
        }

        let mut write_log = self.inner.write_log.lock().unwrap();
        write_log.push(WriteOperation {
            timestamp: Utc::now(),
            address: format!("DB{}.DBB{}", db, start),
            value: Value::from(buffer.to_vec()),
            operation_type: "db_write".to_string(),
        });
        Ok(0)
    }

    fn error_text(&self, code: i32) -> String {
        match code {
            0 => "OK".to_string(),
            0x0001 => "连接超时".to_string(),
            0x0002 => "设备拒绝连接".to_string(),
            0x0003 => "读取区域越界".to_string(),
            0x0004 => "写入区域越界".to_string(),
            _ => format!("模拟错误 (code=0x{:08X})", code),
        }
    }
}
