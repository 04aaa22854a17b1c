//! 控制器事件通知

use alloc::{sync::Arc, vec::Vec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyEvent {
    /// 核心初始化完成
    PostReset,
    PmSuspend,
    PmResume,
    GsiEvtBufAlloc,
    GsiEvtBufSetup,
    GsiEvtBufCleanup,
    GsiEvtBufFree,
}

/// 平台胶水层实现该 trait 来观察控制器事件
///
/// 返回 `true` 表示事件已被处理。对于 PM 事件，处理即意味着由胶水层
/// 负责挂起/恢复，核心不再执行默认流程。
pub trait Dwc3Notifier: Send + Sync {
    fn notify(&self, core_id: u32, event: NotifyEvent, value: u32) -> bool;
}

#[derive(Clone, Default)]
pub(crate) struct Notifiers {
    listeners: Vec<Arc<dyn Dwc3Notifier>>,
}

impl Notifiers {
    pub fn new(listeners: Vec<Arc<dyn Dwc3Notifier>>) -> Self {
        Self { listeners }
    }

    pub fn add(&mut self, listener: Arc<dyn Dwc3Notifier>) {
        self.listeners.push(listener);
    }

    /// 所有监听者都会收到事件，任意一个返回 `true` 即视为已处理
    pub fn notify(&self, core_id: u32, event: NotifyEvent, value: u32) -> bool {
        let mut handled = false;
        for l in &self.listeners {
            handled |= l.notify(core_id, event, value);
        }
        trace!("DWC3: notify {:?} handled={}", event, handled);
        handled
    }
}
