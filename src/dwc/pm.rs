//! 电源管理
//!
//! 系统挂起/恢复和运行时挂起/恢复。每个流程先通知观察者，只要有观察者
//! 处理了事件，核心就跳过默认流程，由平台胶水层负责。

use core::time::Duration;

use super::{Dwc3, notify::NotifyEvent};
use crate::{
    err::{Dwc3Error, Result},
    types::PrtCap,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PmState {
    #[default]
    Active,
    Suspended,
    RuntimeSuspended,
    RuntimeIdle,
}

impl Dwc3 {
    fn suspend_common(&mut self) {
        if self.dr_mode.has_gadget() {
            self.roles.peripheral_suspend();
        }
        self.exit();
    }

    fn resume_common(&mut self) -> Result {
        self.init()?;
        if self.dr_mode.has_gadget() {
            self.roles.peripheral_resume();
        }
        Ok(())
    }

    /// gadget 侧已连接时不允许运行时挂起
    fn runtime_checks(&self) -> Result {
        if self.dr_mode.has_gadget() && self.is_connected() {
            debug!("DWC3: gadget connected, refuse runtime suspend");
            return Err(Dwc3Error::Busy);
        }
        Ok(())
    }

    pub fn suspend(&mut self) -> Result {
        if self.notify(NotifyEvent::PmSuspend, 0) {
            debug!("DWC3: suspend handled by glue");
            self.pm_state = PmState::Suspended;
            return Ok(());
        }

        self.suspend_common();
        self.pm_state = PmState::Suspended;
        info!("DWC3: suspended");
        Ok(())
    }

    /// 系统恢复
    ///
    /// 胶水层处理了恢复事件时，若当前为 Host 角色且配置了
    /// `ignore_wakeup_src_in_hostmode`，直接标记为活动状态。
    pub fn resume(&mut self) -> Result {
        if self.notify(NotifyEvent::PmResume, 0) {
            if self.current_role() == Some(PrtCap::Host)
                && self.params.ignore_wakeup_src_in_hostmode
            {
                self.pm_state = PmState::Active;
            }
            return Ok(());
        }

        self.resume_common()
            .inspect_err(|e| error!("DWC3: resume failed: {:?}", e))?;
        self.pm_state = PmState::Active;
        info!("DWC3: resumed");
        Ok(())
    }

    pub fn runtime_suspend(&mut self) -> Result {
        if self.notify(NotifyEvent::PmSuspend, 0) {
            self.pm_state = PmState::RuntimeSuspended;
            return Ok(());
        }

        self.runtime_checks()?;
        self.suspend_common();
        self.wakeup_enabled = true;
        self.pm_state = PmState::RuntimeSuspended;
        debug!("DWC3: runtime suspended");
        Ok(())
    }

    pub fn runtime_resume(&mut self) -> Result {
        if self.notify(NotifyEvent::PmResume, 0) {
            self.pm_state = PmState::Active;
            return Ok(());
        }

        self.wakeup_enabled = false;
        self.resume_common()?;
        if self.dr_mode.has_gadget() {
            self.roles.peripheral_process_pending_events();
        }
        self.pm_state = PmState::Active;
        debug!("DWC3: runtime resumed");
        Ok(())
    }

    pub fn runtime_idle(&mut self) -> Result {
        self.runtime_checks()?;
        self.pm_state = PmState::RuntimeIdle;
        Ok(())
    }

    /// 胶水层自行完成恢复后调用，把控制器标记为活动状态
    pub fn pm_set_active(&mut self) {
        self.pm_state = PmState::Active;
    }

    pub fn pm_state(&self) -> PmState {
        self.pm_state
    }

    pub fn wakeup_enabled(&self) -> bool {
        self.wakeup_enabled
    }

    /// 运行时自动挂起延迟，未启用总线挂起时为 `None`
    pub fn autosuspend_delay(&self) -> Option<Duration> {
        self.params.autosuspend_delay()
    }
}
