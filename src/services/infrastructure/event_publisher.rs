/// 简单的事件发布器实现
///
/// 用于向零个或多个订阅者推送"数值已刷新"信号。信号不携带任何负载，
/// 订阅者收到后应自行重读控制器的公开属性。
/// 回调在产生变化的线程上同步执行（轮询任务线程，或connect/disconnect
/// 的调用线程），订阅者不得在回调中阻塞
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// 订阅句柄
/// 由 [`ValuesRefreshedEvent::subscribe`] 返回，用于退订
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// 订阅回调类型
type RefreshCallback = Arc<dyn Fn() + Send + Sync>;

/// "数值已刷新"事件发布器
///
/// 订阅者之间的通知顺序不作保证
pub struct ValuesRefreshedEvent {
    /// 订阅者注册表
    subscribers: Mutex<HashMap<u64, RefreshCallback>>,
    /// 订阅ID生成器
    next_id: AtomicU64,
}

impl ValuesRefreshedEvent {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// 注册订阅回调，返回可用于退订的句柄
    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.insert(id, Arc::new(callback));
        debug!("[EventPublisher] 新增订阅者: id={}", id);
        SubscriptionId(id)
    }

    /// 退订
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subscribers = self.subscribers.lock().unwrap();
        if subscribers.remove(&id.0).is_none() {
            warn!("[EventPublisher] 退订失败，订阅不存在: id={}", id.0);
        }
    }

    /// 当前订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    /// 向所有订阅者同步发布刷新信号
    ///
    /// 先在锁内快照回调列表再执行，回调中允许再次订阅/退订
    pub fn emit(&self) {
        let callbacks: Vec<RefreshCallback> = {
            let subscribers = self.subscribers.lock().unwrap();
            subscribers.values().cloned().collect()
        };
        for callback in callbacks {
            callback();
        }
    }
}

impl Default for ValuesRefreshedEvent {
    fn default() -> Self {
        Self::new()
    }
}
