//! 双角色模式切换
//!
//! 任意上下文都可以通过 [`DrdHandle`] 请求切换角色，请求只记录期望角色并
//! 唤醒等待者。真正的切换由持有 [`Dwc3`] 的一方在 [`Dwc3::drd_work`] 中串行执行，
//! 连续多次请求只会执行最后一次。

use alloc::sync::Arc;
use core::{
    future::poll_fn,
    sync::atomic::{AtomicBool, Ordering},
    task::Poll,
};

use futures::task::AtomicWaker;
use spin::Mutex;

use super::Dwc3;
use crate::types::PrtCap;

#[derive(Debug, Default)]
pub(crate) struct RoleState {
    pub desired: Option<PrtCap>,
    pub current: Option<PrtCap>,
}

pub(crate) struct DrdShared {
    pub state: Mutex<RoleState>,
    /// gadget 侧是否已连接到主机，gadget 回调中也会更新，不放在锁内
    connected: AtomicBool,
    pending: AtomicBool,
    waker: AtomicWaker,
}

impl DrdShared {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RoleState::default()),
            connected: AtomicBool::new(false),
            pending: AtomicBool::new(false),
            waker: AtomicWaker::new(),
        }
    }
}

/// 模式切换请求句柄，可以跨线程/中断上下文克隆使用
#[derive(Clone)]
pub struct DrdHandle {
    shared: Arc<DrdShared>,
}

impl DrdHandle {
    /// 请求切换到 `mode`，不会阻塞
    pub fn set_mode(&self, mode: PrtCap) {
        self.shared.state.lock().desired = Some(mode);
        self.shared.pending.store(true, Ordering::Release);
        self.shared.waker.wake();
    }

    pub fn set_connected(&self, connected: bool) {
        self.shared.connected.store(connected, Ordering::Release);
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    pub fn current_role(&self) -> Option<PrtCap> {
        self.shared.state.lock().current
    }

    pub fn desired_role(&self) -> Option<PrtCap> {
        self.shared.state.lock().desired
    }

    pub fn is_pending(&self) -> bool {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// 等待下一次切换请求
    pub async fn requested(&self) {
        poll_fn(|cx| {
            if self.is_pending() {
                return Poll::Ready(());
            }
            self.shared.waker.register(cx.waker());
            if self.is_pending() {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
        .await
    }
}

impl Dwc3 {
    pub fn drd_handle(&self) -> DrdHandle {
        DrdHandle {
            shared: self.shared.clone(),
        }
    }

    pub fn current_role(&self) -> Option<PrtCap> {
        self.shared.state.lock().current
    }

    pub fn desired_role(&self) -> Option<PrtCap> {
        self.shared.state.lock().desired
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// 处理挂起的模式切换请求，没有请求时返回 `false`
    pub fn drd_work(&mut self) -> bool {
        if !self.shared.pending.swap(false, Ordering::AcqRel) {
            return false;
        }

        let (desired, current) = {
            let state = self.shared.state.lock();
            (state.desired, state.current)
        };

        match desired {
            Some(desired) if Some(desired) != current => self.switch_role(current, desired),
            _ => trace!("DWC3: role unchanged {:?}", current),
        }
        true
    }

    /// 等待一次切换请求并执行
    pub async fn mode_switch_task_once(&mut self) {
        self.drd_handle().requested().await;
        self.drd_work();
    }

    fn switch_role(&mut self, current: Option<PrtCap>, desired: PrtCap) {
        info!("DWC3: switch role {:?} -> {:?}", current, desired);

        match current {
            Some(PrtCap::Host) => self.roles.host_exit(),
            Some(PrtCap::Device) => {
                self.roles.peripheral_exit();
                self.cleanup_event_buffer();
            }
            Some(PrtCap::Otg) => self.roles.otg_exit(),
            None => {}
        }

        self.set_prtcap(desired);

        let ret = match desired {
            PrtCap::Host => self.roles.host_init(),
            PrtCap::Device => {
                self.program_event_buffer();
                self.roles.peripheral_init()
            }
            PrtCap::Otg => self.roles.otg_init(),
        };
        if let Err(e) = ret {
            error!("DWC3: failed to initialize {:?} role: {:?}", desired, e);
        }
    }
}
