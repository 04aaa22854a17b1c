//! DWC3 (DesignWare USB3 Controller) 控制器核心
//!
//! DWC3 是一个 USB3 DRD (Dual Role Device) 控制器，支持 Host、Device 和 OTG。
//! 这里实现与角色无关的核心部分：识别和复位、PHY 接口配置、事件/暂存缓冲区、
//! 全局控制寄存器、模式切换与电源管理。Host/Device 协议栈通过 [`RoleOp`] 接入。

use alloc::{boxed::Box, sync::Arc, vec::Vec};

use crate::{
    Mmio,
    err::Result,
    osal::KernelOp,
    types::{DeviceSpeed, DrMode, PrtCap},
};

pub mod consts;
mod ctrl;
pub mod drd;
pub mod event;
pub mod hwparams;
pub mod notify;
pub mod params;
pub mod phy;
pub mod pm;
pub mod quirks;
pub mod reg;
pub mod scratch;

pub use ctrl::resolve_dr_mode;

use drd::DrdShared;
use event::EventBuffer;
use hwparams::Dwc3Hwparams;
use notify::{Dwc3Notifier, NotifyEvent, Notifiers};
use params::Dwc3Params;
use phy::{Dwc3Phys, PhyProvider};
use pm::PmState;
use quirks::CoreIdentity;
use reg::Dwc3Regs;
use scratch::ScratchBuffer;

/// Host/Device/OTG 子系统的入口
///
/// 由模式切换和电源管理流程调用，默认实现什么都不做。
pub trait RoleOp: Send {
    fn peripheral_init(&mut self) -> Result {
        Ok(())
    }
    fn peripheral_exit(&mut self) {}
    /// 在控制器锁内调用
    fn peripheral_suspend(&mut self) {}
    /// 在控制器锁内调用
    fn peripheral_resume(&mut self) {}
    fn peripheral_process_pending_events(&mut self) {}
    fn host_init(&mut self) -> Result {
        Ok(())
    }
    fn host_exit(&mut self) {}
    fn otg_init(&mut self) -> Result {
        Ok(())
    }
    fn otg_exit(&mut self) {}
}

pub struct Dwc3NewParams {
    pub mmio: Mmio,
    pub kernel: &'static dyn KernelOp,
    pub params: Dwc3Params,
    pub phys: Box<dyn PhyProvider>,
    pub roles: Box<dyn RoleOp>,
    pub notifiers: Vec<Arc<dyn Dwc3Notifier>>,
}

/// DWC3 控制器
///
/// 全局寄存器区域 (0xc100 - 0xc718) 包含 DWC3 特定配置，
/// 其余区域由 xHCI / gadget 驱动使用。
pub struct Dwc3 {
    regs: Dwc3Regs,
    kernel: &'static dyn KernelOp,
    params: Dwc3Params,
    provider: Box<dyn PhyProvider>,
    phys: Dwc3Phys,
    roles: Box<dyn RoleOp>,
    notifiers: Notifiers,
    shared: Arc<DrdShared>,

    revision: u32,
    version_type: u32,
    hwparams: Dwc3Hwparams,
    dr_mode: DrMode,
    maximum_speed: DeviceSpeed,
    max_hw_supported_speed: DeviceSpeed,
    imod_interval: u32,
    has_hibernation: bool,
    nr_scratch: u32,
    is_fpga: bool,
    num_eps: u8,
    num_in_eps: u8,

    ulpi_ready: bool,
    phys_ready: bool,

    event_buffer: Option<EventBuffer>,
    scratch: Option<ScratchBuffer>,

    pm_state: PmState,
    wakeup_enabled: bool,
}

impl Dwc3 {
    /// 创建控制器上下文，不访问硬件
    pub fn new(p: Dwc3NewParams) -> Self {
        let regs = unsafe { Dwc3Regs::new(p.mmio.as_ptr() as usize) };
        let params = p.params;

        Self {
            regs,
            kernel: p.kernel,
            dr_mode: params.dr_mode,
            maximum_speed: params.maximum_speed,
            max_hw_supported_speed: params.maximum_speed,
            imod_interval: params.imod_interval,
            params,
            provider: p.phys,
            phys: Dwc3Phys::default(),
            roles: p.roles,
            notifiers: Notifiers::new(p.notifiers),
            shared: Arc::new(DrdShared::new()),
            revision: 0,
            version_type: 0,
            hwparams: Dwc3Hwparams::default(),
            has_hibernation: false,
            nr_scratch: 0,
            is_fpga: false,
            num_eps: 0,
            num_in_eps: 0,
            ulpi_ready: false,
            phys_ready: false,
            event_buffer: None,
            scratch: None,
            pm_state: PmState::Active,
            wakeup_enabled: false,
        }
    }

    /// 创建并初始化控制器，然后通过模式切换进入初始角色
    ///
    /// 软复位超时时会重新执行完整的初始化，最多尝试
    /// [`consts::DWC3_PROBE_INIT_ATTEMPTS`] 次。
    pub fn probe(p: Dwc3NewParams) -> Result<Self> {
        let mut dwc = Self::new(p);

        let mut attempt = 1;
        loop {
            match dwc.init() {
                Ok(()) => break,
                Err(crate::err::Dwc3Error::ResetTimeout)
                    if attempt < consts::DWC3_PROBE_INIT_ATTEMPTS =>
                {
                    warn!("DWC3: soft reset timeout, retrying init ({})", attempt);
                    attempt += 1;
                }
                Err(e) => {
                    error!("DWC3: probe failed: {:?}", e);
                    return Err(e);
                }
            }
        }

        if let Some(mode) = dwc.dr_mode.prtcap() {
            dwc.drd_handle().set_mode(mode);
            dwc.drd_work();
        }

        info!(
            "✓ DWC3: core {} probed, dr_mode {:?}",
            dwc.params.core_id, dwc.dr_mode
        );
        Ok(dwc)
    }

    /// 退出当前角色并释放控制器持有的所有资源
    pub fn remove(mut self) {
        info!("DWC3: removing core {}", self.params.core_id);
        self.exit_mode();
        self.exit();
        self.core_ulpi_exit();
        self.free_event_buffer();
        self.free_scratch_buffers();
    }

    fn exit_mode(&mut self) {
        match self.dr_mode {
            DrMode::Peripheral => self.roles.peripheral_exit(),
            DrMode::Host => self.roles.host_exit(),
            DrMode::Otg => self.roles.otg_exit(),
            DrMode::Unknown => {}
        }
        // 撤销 HOST/OTG 模式下的 DRVVBUS
        self.set_prtcap(PrtCap::Device);
    }

    pub(crate) fn notify(&self, event: NotifyEvent, value: u32) -> bool {
        self.notifiers.notify(self.params.core_id, event, value)
    }

    pub fn add_notifier(&mut self, notifier: Arc<dyn Dwc3Notifier>) {
        self.notifiers.add(notifier);
    }

    pub(crate) fn identity(&self) -> CoreIdentity {
        CoreIdentity {
            revision: self.revision,
            version_type: self.version_type,
            quirks: self.params.quirks,
        }
    }

    pub fn core_id(&self) -> u32 {
        self.params.core_id
    }

    pub fn params(&self) -> &Dwc3Params {
        &self.params
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn version_type(&self) -> u32 {
        self.version_type
    }

    pub fn is_usb31(&self) -> bool {
        self.identity().is_usb31()
    }

    pub fn hwparams(&self) -> &Dwc3Hwparams {
        &self.hwparams
    }

    pub fn dr_mode(&self) -> DrMode {
        self.dr_mode
    }

    pub fn maximum_speed(&self) -> DeviceSpeed {
        self.maximum_speed
    }

    pub fn max_hw_supported_speed(&self) -> DeviceSpeed {
        self.max_hw_supported_speed
    }

    pub fn imod_interval(&self) -> u32 {
        self.imod_interval
    }

    pub fn has_hibernation(&self) -> bool {
        self.has_hibernation
    }

    pub fn nr_scratch(&self) -> u32 {
        self.nr_scratch
    }

    pub fn is_fpga(&self) -> bool {
        self.is_fpga
    }

    pub fn num_eps(&self) -> u8 {
        self.num_eps
    }

    pub fn num_in_eps(&self) -> u8 {
        self.num_in_eps
    }
}
