#![allow(dead_code)]

use std::{
    alloc::Layout,
    result::Result,
    ptr::NonNull,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicIsize, AtomicU32, AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use crab_dwc3::*;

pub const GLOBALS: usize = 0xc100;

pub const GCTL: usize = 0x010;
pub const GUCTL1: usize = 0x01c;
pub const GSNPSID: usize = 0x020;
pub const GUID: usize = 0x028;
pub const GHWPARAMS0: usize = 0x040;
pub const GHWPARAMS1: usize = 0x044;
pub const GHWPARAMS3: usize = 0x04c;
pub const GHWPARAMS4: usize = 0x050;
pub const GHWPARAMS6: usize = 0x058;
pub const VER_NUMBER: usize = 0x0a0;
pub const VER_TYPE: usize = 0x0a4;
pub const GUSB2PHYCFG0: usize = 0x100;
pub const GUSB2PHYCFG1: usize = 0x104;
pub const GUSB3PIPECTL0: usize = 0x1c0;
pub const GUSB3PIPECTL1: usize = 0x1c4;
pub const GEVNTADRLO: usize = 0x300;
pub const GEVNTADRHI: usize = 0x304;
pub const GEVNTSIZ: usize = 0x308;
pub const GEVNTCOUNT: usize = 0x30c;
pub const GFLADJ: usize = 0x530;
pub const DCTL: usize = 0x604;
pub const DSTS: usize = 0x60c;
pub const DGCMDPAR: usize = 0x610;
pub const DGCMD: usize = 0x614;

pub const DCTL_CSFTRST: u32 = 1 << 30;
pub const DSTS_DEVCTRLHLT: u32 = 1 << 22;
pub const DGCMD_CMDACT: u32 = 1 << 10;

pub const GCTL_DSBLCLKGTNG: u32 = 1 << 0;
pub const GCTL_GBLHIBERNATIONEN: u32 = 1 << 1;
pub const GCTL_DISSCRAMBLE: u32 = 1 << 3;
pub const GCTL_SOFITPSYNC: u32 = 1 << 10;
pub const GCTL_U2RSTECN: u32 = 1 << 16;

pub const REV_240A: u32 = 0x5533_240a;
pub const REV_250A: u32 = 0x5533_250a;
pub const REV_290A: u32 = 0x5533_290a;
pub const REV_300A: u32 = 0x5533_300a;

pub fn prtcap(gctl: u32) -> u32 {
    (gctl >> 12) & 0x3
}

/// 用普通内存模拟的寄存器空间
#[derive(Clone, Copy)]
pub struct FakeHw {
    base: usize,
}

impl FakeHw {
    pub fn new() -> Self {
        let mem: &'static mut [u32] = vec![0u32; (GLOBALS + 0x1000) / 4].leak();
        Self {
            base: mem.as_mut_ptr() as usize,
        }
    }

    pub fn mmio(&self) -> NonNull<u8> {
        NonNull::new(self.base as *mut u8).unwrap()
    }

    pub fn get(&self, off: usize) -> u32 {
        unsafe { ((self.base + GLOBALS + off) as *const u32).read_volatile() }
    }

    pub fn set(&self, off: usize, value: u32) {
        unsafe { ((self.base + GLOBALS + off) as *mut u32).write_volatile(value) }
    }
}

/// 延时回调里模拟硬件完成软复位和 generic command
pub struct FakeKernel {
    hw: FakeHw,
    pub stuck_reset: AtomicBool,
    pub reset_polls: AtomicUsize,
    pub cmd_stuck: AtomicBool,
    pub cmd_status: AtomicU32,
    pub commands: Mutex<Vec<(u32, u32)>>,
    pub long_delays: Mutex<Vec<Duration>>,
    pub fail_alloc: AtomicBool,
    pub fail_map: AtomicBool,
    pub coherent_live: AtomicIsize,
    pub maps_live: AtomicIsize,
    next_dma: AtomicU64,
}

impl FakeKernel {
    pub fn new(hw: FakeHw) -> &'static Self {
        Box::leak(Box::new(Self {
            hw,
            stuck_reset: AtomicBool::new(false),
            reset_polls: AtomicUsize::new(0),
            cmd_stuck: AtomicBool::new(false),
            cmd_status: AtomicU32::new(0),
            commands: Mutex::new(Vec::new()),
            long_delays: Mutex::new(Vec::new()),
            fail_alloc: AtomicBool::new(false),
            fail_map: AtomicBool::new(false),
            coherent_live: AtomicIsize::new(0),
            maps_live: AtomicIsize::new(0),
            next_dma: AtomicU64::new(0),
        }))
    }

    pub fn commands(&self) -> Vec<(u32, u32)> {
        self.commands.lock().unwrap().clone()
    }
}

impl KernelOp for FakeKernel {
    fn delay(&self, duration: Duration) {
        if duration >= Duration::from_millis(1) {
            self.long_delays.lock().unwrap().push(duration);
            return;
        }

        let dctl = self.hw.get(DCTL);
        if dctl & DCTL_CSFTRST != 0 {
            self.reset_polls.fetch_add(1, Ordering::SeqCst);
            if !self.stuck_reset.load(Ordering::SeqCst) {
                self.hw.set(DCTL, dctl & !DCTL_CSFTRST);
            }
        }

        let cmd = self.hw.get(DGCMD);
        if cmd & DGCMD_CMDACT != 0 && !self.cmd_stuck.load(Ordering::SeqCst) {
            let param = self.hw.get(DGCMDPAR);
            self.commands.lock().unwrap().push((cmd & 0xff, param));
            let status = self.cmd_status.load(Ordering::SeqCst) & 0xf;
            self.hw.set(DGCMD, (cmd & !DGCMD_CMDACT) | (status << 12));
        }
    }

    unsafe fn alloc_coherent(&self, layout: Layout) -> Option<DmaHandle> {
        if self.fail_alloc.load(Ordering::SeqCst) {
            return None;
        }
        let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
        let cpu_addr = NonNull::new(ptr)?;
        self.coherent_live.fetch_add(1, Ordering::SeqCst);
        let n = self.next_dma.fetch_add(1, Ordering::SeqCst);
        Some(DmaHandle {
            cpu_addr,
            dma_addr: 0x1_0000_0000 + n * 0x1_0000,
            layout,
        })
    }

    unsafe fn dealloc_coherent(&self, handle: DmaHandle) {
        self.coherent_live.fetch_sub(1, Ordering::SeqCst);
        unsafe { std::alloc::dealloc(handle.cpu_addr.as_ptr(), handle.layout) };
    }

    unsafe fn map_single(
        &self,
        addr: NonNull<u8>,
        size: usize,
        direction: Direction,
    ) -> Result<MapHandle, DmaError> {
        if self.fail_map.load(Ordering::SeqCst) {
            return Err(DmaError::MappingFailed);
        }
        self.maps_live.fetch_add(1, Ordering::SeqCst);
        let n = self.next_dma.fetch_add(1, Ordering::SeqCst);
        Ok(MapHandle {
            cpu_addr: addr,
            dma_addr: 0x2_0000_0000 + n * 0x1_0000,
            size,
            direction,
        })
    }

    unsafe fn unmap_single(&self, _handle: MapHandle) {
        self.maps_live.fetch_sub(1, Ordering::SeqCst);
    }
}

pub type Log = Arc<Mutex<Vec<String>>>;

pub fn push(log: &Log, msg: impl Into<String>) {
    log.lock().unwrap().push(msg.into());
}

pub struct FakeUsbPhy {
    name: &'static str,
    log: Log,
    init_err: Option<PhyError>,
}

impl UsbPhy for FakeUsbPhy {
    fn reset(&mut self) {
        push(&self.log, format!("{} reset", self.name));
    }

    fn init(&mut self) -> Result<(), PhyError> {
        push(&self.log, format!("{} init", self.name));
        self.init_err.map_or(Ok(()), Err)
    }

    fn shutdown(&mut self) {
        push(&self.log, format!("{} shutdown", self.name));
    }

    fn set_suspend(&mut self, suspend: bool) -> Result<(), PhyError> {
        push(&self.log, format!("{} suspend {}", self.name, suspend));
        Ok(())
    }
}

pub struct FakeGenericPhy {
    name: &'static str,
    log: Log,
    power_on_err: Option<PhyError>,
}

impl GenericPhy for FakeGenericPhy {
    fn init(&mut self) -> Result<(), PhyError> {
        push(&self.log, format!("{} init", self.name));
        Ok(())
    }

    fn exit(&mut self) -> Result<(), PhyError> {
        push(&self.log, format!("{} exit", self.name));
        Ok(())
    }

    fn power_on(&mut self) -> Result<(), PhyError> {
        push(&self.log, format!("{} power_on", self.name));
        self.power_on_err.map_or(Ok(()), Err)
    }

    fn power_off(&mut self) -> Result<(), PhyError> {
        push(&self.log, format!("{} power_off", self.name));
        Ok(())
    }
}

#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub enum Lookup {
    #[default]
    Present,
    Absent,
    Defer,
    Fail,
}

#[derive(Clone, Default)]
pub struct PhyConfig {
    pub usb2_init: Option<PhyError>,
    pub usb3_init: Option<PhyError>,
    pub usb3_lookup: Lookup,
    pub usb2_generic_power_on: Option<PhyError>,
    pub usb3_generic_power_on: Option<PhyError>,
    pub ulpi_init: Option<PhyError>,
}

pub struct FakeProvider {
    cfg: PhyConfig,
    log: Log,
}

impl FakeProvider {
    fn usb_phy(&mut self, index: usize) -> PhyLookup<Box<dyn UsbPhy>> {
        let name = ["usb2", "usb3", "usb2_1", "usb3_1"][index];
        push(&self.log, format!("lookup {}", name));

        if index == 1 {
            match self.cfg.usb3_lookup {
                Lookup::Present => {}
                Lookup::Absent => return PhyLookup::Absent,
                Lookup::Defer => return PhyLookup::DeferredRetry,
                Lookup::Fail => return PhyLookup::Error(PhyError::Io),
            }
        }

        let init_err = match index {
            0 => self.cfg.usb2_init,
            1 => self.cfg.usb3_init,
            _ => None,
        };
        PhyLookup::Present(Box::new(FakeUsbPhy {
            name,
            log: self.log.clone(),
            init_err,
        }))
    }
}

impl PhyProvider for FakeProvider {
    fn usb_phy_by_phandle(&mut self, index: usize) -> PhyLookup<Box<dyn UsbPhy>> {
        self.usb_phy(index)
    }

    fn usb_phy_by_type(&mut self, ty: UsbPhyType) -> PhyLookup<Box<dyn UsbPhy>> {
        match ty {
            UsbPhyType::Usb2 => self.usb_phy(0),
            UsbPhyType::Usb3 => self.usb_phy(1),
        }
    }

    fn generic_phy(&mut self, name: &str) -> PhyLookup<Box<dyn GenericPhy>> {
        let (name, power_on_err) = match name {
            "usb2-phy" => ("usb2_generic", self.cfg.usb2_generic_power_on),
            "usb3-phy" => ("usb3_generic", self.cfg.usb3_generic_power_on),
            _ => return PhyLookup::Absent,
        };
        PhyLookup::Present(Box::new(FakeGenericPhy {
            name,
            log: self.log.clone(),
            power_on_err,
        }))
    }

    fn ulpi_init(&mut self) -> Result<(), PhyError> {
        push(&self.log, "ulpi init");
        self.cfg.ulpi_init.map_or(Ok(()), Err)
    }

    fn ulpi_exit(&mut self) {
        push(&self.log, "ulpi exit");
    }
}

pub struct FakeRoles {
    log: Log,
    pub host_init_err: Option<Dwc3Error>,
    /// gadget 在挂起/恢复回调中通过句柄上报连接状态
    link: Link,
}

pub type Link = Arc<Mutex<Option<DrdHandle>>>;

impl RoleOp for FakeRoles {
    fn peripheral_init(&mut self) -> crab_dwc3::Result {
        push(&self.log, "peripheral_init");
        Ok(())
    }

    fn peripheral_exit(&mut self) {
        push(&self.log, "peripheral_exit");
    }

    fn peripheral_suspend(&mut self) {
        push(&self.log, "peripheral_suspend");
        if let Some(handle) = self.link.lock().unwrap().as_ref() {
            handle.set_connected(false);
        }
    }

    fn peripheral_resume(&mut self) {
        push(&self.log, "peripheral_resume");
        if let Some(handle) = self.link.lock().unwrap().as_ref() {
            handle.set_connected(true);
        }
    }

    fn peripheral_process_pending_events(&mut self) {
        push(&self.log, "peripheral_pending");
    }

    fn host_init(&mut self) -> crab_dwc3::Result {
        push(&self.log, "host_init");
        self.host_init_err.map_or(Ok(()), Err)
    }

    fn host_exit(&mut self) {
        push(&self.log, "host_exit");
    }

    fn otg_init(&mut self) -> crab_dwc3::Result {
        push(&self.log, "otg_init");
        Ok(())
    }

    fn otg_exit(&mut self) {
        push(&self.log, "otg_exit");
    }
}

pub struct FakeNotifier {
    pub events: Mutex<Vec<(u32, NotifyEvent)>>,
    pub handle_pm: AtomicBool,
}

impl FakeNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            handle_pm: AtomicBool::new(false),
        })
    }

    pub fn events(&self) -> Vec<NotifyEvent> {
        self.events.lock().unwrap().iter().map(|(_, e)| *e).collect()
    }
}

impl Dwc3Notifier for FakeNotifier {
    fn notify(&self, core_id: u32, event: NotifyEvent, _value: u32) -> bool {
        self.events.lock().unwrap().push((core_id, event));
        matches!(event, NotifyEvent::PmSuspend | NotifyEvent::PmResume)
            && self.handle_pm.load(Ordering::SeqCst)
    }
}

/// 一个 DWC_usb3 2.90a 双角色控制器：USB2 UTMI + USB3 Gen1，16 个端点
pub struct Harness {
    pub hw: FakeHw,
    pub kernel: &'static FakeKernel,
    pub log: Log,
    pub notifier: Arc<FakeNotifier>,
    pub phy_cfg: PhyConfig,
    pub host_init_err: Option<Dwc3Error>,
    pub link: Link,
}

impl Harness {
    pub fn new() -> Self {
        let hw = FakeHw::new();
        hw.set(GSNPSID, REV_290A);
        hw.set(GHWPARAMS0, 2);
        hw.set(GHWPARAMS3, 1 | (1 << 2) | (16 << 12) | (8 << 18));
        hw.set(DSTS, DSTS_DEVCTRLHLT);

        Self {
            hw,
            kernel: FakeKernel::new(hw),
            log: Arc::new(Mutex::new(Vec::new())),
            notifier: FakeNotifier::new(),
            phy_cfg: PhyConfig::default(),
            host_init_err: None,
            link: Arc::new(Mutex::new(None)),
        }
    }

    pub fn new_params(&self, params: Dwc3Params) -> Dwc3NewParams {
        Dwc3NewParams {
            mmio: self.hw.mmio(),
            kernel: self.kernel,
            params,
            phys: Box::new(FakeProvider {
                cfg: self.phy_cfg.clone(),
                log: self.log.clone(),
            }),
            roles: Box::new(FakeRoles {
                log: self.log.clone(),
                host_init_err: self.host_init_err,
                link: self.link.clone(),
            }),
            notifiers: vec![self.notifier.clone() as Arc<dyn Dwc3Notifier>],
        }
    }

    pub fn probe(&self, params: Dwc3Params) -> crab_dwc3::Result<Dwc3> {
        Dwc3::probe(self.new_params(params))
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn logged(&self, msg: &str) -> bool {
        self.log().iter().any(|m| m == msg)
    }

    pub fn count(&self, msg: &str) -> usize {
        self.log().iter().filter(|m| *m == msg).count()
    }

    pub fn clear_log(&self) {
        self.log.lock().unwrap().clear();
    }

    pub fn reg(&self, off: usize) -> u32 {
        self.hw.get(off)
    }
}
