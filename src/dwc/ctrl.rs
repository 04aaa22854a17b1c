//! 核心初始化、软复位与退出

use mbarrier::mb;
use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};

use super::{
    Dwc3,
    consts::*,
    hwparams::{HwMode, PowerOpt, SsphyIfc},
    quirks::{Dwc3Quirks, apply_workarounds},
    reg::{DCTL, DGCMD, GCTL, GFLADJ},
};
use crate::{
    err::{Dwc3Error, PhyError, Result},
    osal::{delay_ms, delay_us},
    types::{BuildMode, DeviceSpeed, DrMode, PrtCap},
};

/// 初始化失败时需要回滚到的位置，值越大回滚的步骤越多
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Unwind {
    /// 退出 ULPI
    Ulpi,
    /// 关闭 PHY
    PhyShutdown,
    /// 挂起 PHY 并释放暂存缓冲区
    PhySuspend,
    /// 关闭 USB2 generic PHY 电源
    Usb2PowerOff,
}

/// 本次软复位中初始化过的传统 PHY
#[derive(Default)]
struct ResetPhys {
    usb2: bool,
    usb2_1: bool,
    usb3: bool,
    usb3_1: bool,
}

/// 根据硬件能力和构建配置决定最终的 dr_mode
///
/// `Unknown` 视为 OTG。只支持单侧的硬件在构建缺少该侧时返回配置错误。
pub fn resolve_dr_mode(requested: DrMode, hw: HwMode, build: BuildMode) -> Result<DrMode> {
    let requested = match requested {
        DrMode::Unknown => DrMode::Otg,
        mode => mode,
    };

    let mode = match hw {
        HwMode::Gadget => {
            if build == BuildMode::HostOnly {
                return Err(Dwc3Error::Configuration(
                    "Controller does not support host mode.",
                ));
            }
            DrMode::Peripheral
        }
        HwMode::Host => {
            if build == BuildMode::GadgetOnly {
                return Err(Dwc3Error::Configuration(
                    "Controller does not support device mode.",
                ));
            }
            DrMode::Host
        }
        HwMode::Drd => match build {
            BuildMode::HostOnly => DrMode::Host,
            BuildMode::GadgetOnly => DrMode::Peripheral,
            BuildMode::DualRole => requested,
        },
    };

    Ok(mode)
}

impl Dwc3 {
    /// 读取 GSNPSID 识别控制器，并记录版本号
    pub fn validate_and_identify(&mut self) -> Result {
        let g = self.regs.globals();
        let snpsid = g.gsnpsid.get();

        match snpsid & DWC3_GSNPSID_MASK {
            DWC3_GSNPSID_USB3 => {
                self.revision = snpsid;
                self.version_type = 0;
            }
            DWC3_GSNPSID_USB31 => {
                self.revision = g.ver_number.get() | DWC3_REVISION_IS_DWC31;
                self.version_type = g.ver_type.get();
            }
            _ => {
                error!(
                    "DWC3: this is not a DesignWare USB3 DRD Core (GSNPSID {:#010x})",
                    snpsid
                );
                return Err(Dwc3Error::UnrecognizedHardware { snpsid });
            }
        }

        info!(
            "DWC3: revision {:#010x} version_type {:#010x}",
            self.revision, self.version_type
        );
        Ok(())
    }

    fn has_imod(&self) -> bool {
        let usb3 = !self.is_usb31() && self.revision >= DWC3_REVISION_300A;
        let usb31 = self.is_usb31() && self.revision >= DWC3_USB31_REVISION_120A;
        usb3 || usb31
    }

    fn check_params(&mut self) {
        if self.imod_interval != 0 && !self.has_imod() {
            warn!("DWC3: Interrupt moderation not supported");
            self.imod_interval = 0;
        }

        // 3.00a 需要非零的 imod 间隔才能正常工作
        if self.imod_interval == 0 && self.revision == DWC3_REVISION_300A {
            self.imod_interval = 1;
        }

        match self.maximum_speed {
            DeviceSpeed::Low
            | DeviceSpeed::Full
            | DeviceSpeed::High
            | DeviceSpeed::SuperSpeed
            | DeviceSpeed::SuperSpeedPlus => {}
            other => {
                if other != DeviceSpeed::Unknown {
                    error!("DWC3: invalid maximum_speed parameter {:?}", other);
                }
                self.maximum_speed = DeviceSpeed::SuperSpeed;
                if self.is_usb31() && self.hwparams.ssphy_ifc() == SsphyIfc::Gen2 {
                    self.maximum_speed = DeviceSpeed::SuperSpeedPlus;
                }
            }
        }
    }

    fn resolve_role(&mut self) -> Result {
        let requested = match self.dr_mode {
            DrMode::Unknown => DrMode::Otg,
            mode => mode,
        };
        let mode = resolve_dr_mode(requested, self.hwparams.mode(), self.params.build)
            .inspect_err(|e| error!("DWC3: {}", e))?;

        if mode != requested {
            let name = if mode == DrMode::Host { "host" } else { "gadget" };
            warn!("DWC3: Configuration mismatch. dr_mode forced to {}", name);
        }
        self.dr_mode = mode;
        Ok(())
    }

    fn clamp_speed(&mut self) {
        self.max_hw_supported_speed = match self.hwparams.ssphy_ifc() {
            SsphyIfc::Disabled => DeviceSpeed::High,
            SsphyIfc::Gen2 if self.is_usb31() => DeviceSpeed::SuperSpeedPlus,
            _ => DeviceSpeed::SuperSpeed,
        };

        if self.maximum_speed > self.max_hw_supported_speed {
            info!(
                "DWC3: maximum_speed {:?} limited to {:?}",
                self.maximum_speed, self.max_hw_supported_speed
            );
            self.maximum_speed = self.max_hw_supported_speed;
        }
    }

    fn init_usb_phys(&mut self, done: &mut ResetPhys) -> Result {
        self.phys.usb2.reset();
        self.phys.usb2.init()?;
        done.usb2 = true;

        self.phys.usb2_1.reset();
        self.phys.usb2_1.init()?;
        done.usb2_1 = true;

        if self.maximum_speed <= DeviceSpeed::High {
            return Ok(());
        }

        self.phys.usb3.reset();
        match self.phys.usb3.init() {
            Ok(()) => done.usb3 = true,
            Err(PhyError::Busy) => {
                warn!("DWC3: usb3 phy busy, limit maximum_speed to high-speed");
                self.maximum_speed = DeviceSpeed::High;
            }
            Err(e) => return Err(e.into()),
        }

        self.phys.usb3_1.reset();
        self.phys.usb3_1.init()?;
        done.usb3_1 = true;
        Ok(())
    }

    fn shutdown_usb_phys(&mut self, done: &ResetPhys) {
        if done.usb3_1 {
            self.phys.usb3_1.shutdown();
        }
        if done.usb3 {
            self.phys.usb3.shutdown();
        }
        if done.usb2_1 {
            self.phys.usb2_1.shutdown();
        }
        if done.usb2 {
            self.phys.usb2.shutdown();
        }
    }

    /// 初始化 PHY 并对控制器执行软复位
    ///
    /// 主机模式下不做设备侧软复位，xHCI 初始化时会自行复位。
    /// 失败时本次初始化过的 PHY 都会被关闭。
    pub fn soft_reset(&mut self) -> Result {
        trace!("DWC3: soft reset, maximum_speed {:?}", self.maximum_speed);

        let mut done = ResetPhys::default();
        if let Err(e) = self.init_usb_phys(&mut done) {
            error!("DWC3: usb phy init failed: {:?}", e);
            self.shutdown_usb_phys(&done);
            return Err(e);
        }

        if let Err(e) = self.phys.usb2_generic.init() {
            self.shutdown_usb_phys(&done);
            return Err(e.into());
        }
        if let Err(e) = self.phys.usb3_generic.init() {
            self.phys.usb2_generic.exit();
            self.shutdown_usb_phys(&done);
            return Err(e.into());
        }

        if self.dr_mode == DrMode::Host {
            return Ok(());
        }

        let g = self.regs.globals();
        g.dctl.modify(DCTL::CSFTRST::SET);
        mb();

        for _ in 0..DWC3_SOFT_RESET_RETRIES {
            if !g.dctl.is_set(DCTL::CSFTRST) {
                // DWC_usb31 复位完成后还需要等待 50ms 才能访问 PHY 相关寄存器
                if self.is_usb31() {
                    delay_ms(self.kernel, DWC31_SOFT_RESET_SETTLE_MS);
                }
                return Ok(());
            }
            delay_us(self.kernel, 1);
        }

        error!("DWC3: soft reset timeout");
        self.phys.usb3_generic.exit();
        self.phys.usb2_generic.exit();
        self.shutdown_usb_phys(&done);
        Err(Dwc3Error::ResetTimeout)
    }

    /// 配置 GCTL：时钟门控、休眠、scrambler 以及旧版本的修正
    pub fn configure_global_control(&mut self) {
        let g = self.regs.globals();
        let quirks = self.params.quirks;
        let mut reg = g.gctl.extract();

        reg.modify(GCTL::SCALEDOWN.val(0));

        self.has_hibernation = false;
        match self.hwparams.power_opt() {
            PowerOpt::Clock => {
                // 2.10a 到 2.50a 的 Host/OTG 在时钟门控打开时 SOF 计数有问题
                if matches!(self.dr_mode, DrMode::Host | DrMode::Otg)
                    && (DWC3_REVISION_210A..=DWC3_REVISION_250A).contains(&self.revision)
                {
                    reg.modify(GCTL::DSBLCLKGTNG::SET + GCTL::SOFITPSYNC::SET);
                } else {
                    reg.modify(GCTL::DSBLCLKGTNG::CLEAR);
                }
            }
            PowerOpt::Hibernation => {
                self.nr_scratch = self.hwparams.hiber_scratchbufs();
                self.has_hibernation = true;
                reg.modify(GCTL::GBLHIBERNATIONEN::SET);
            }
            PowerOpt::None => debug!("DWC3: no power optimization available"),
        }

        if self.hwparams.is_fpga() {
            info!("DWC3: Running with FPGA optimizations");
            self.is_fpga = true;
        }

        let disable_scramble = quirks.contains(Dwc3Quirks::DISABLE_SCRAMBLE);
        if disable_scramble && !self.is_fpga {
            warn!("DWC3: disable_scramble cannot be used on non-FPGA builds");
        }
        if disable_scramble && self.is_fpga {
            reg.modify(GCTL::DISSCRAMBLE::SET);
        } else {
            reg.modify(GCTL::DISSCRAMBLE::CLEAR);
        }

        if quirks.contains(Dwc3Quirks::U2EXIT_LFPS) {
            reg.modify(GCTL::U2EXIT_LFPS::SET);
        }

        // 1.90a 之前的版本 U2 复位时需要额外处理
        if self.revision < DWC3_REVISION_190A {
            reg.modify(GCTL::U2RSTECN::SET);
        }

        if quirks.contains(Dwc3Quirks::DISABLE_CLK_GATING) {
            reg.modify(GCTL::DSBLCLKGTNG::SET);
        }

        g.gctl.set(reg.get());
        debug!("DWC3: GCTL = {:#010x}", reg.get());
    }

    fn frame_length_adjustment(&mut self) {
        let fladj = self.params.fladj;
        if self.revision < DWC3_REVISION_250A || fladj == 0 {
            return;
        }

        let gfladj = &self.regs.globals().gfladj;
        if gfladj.read(GFLADJ::FLADJ_30MHZ) != fladj {
            gfladj.modify(GFLADJ::FLADJ_30MHZ.val(fladj) + GFLADJ::FLADJ_30MHZ_SDBND_SEL::SET);
        }
    }

    fn core_num_eps(&mut self) {
        self.num_eps = self.hwparams.num_eps();
        self.num_in_eps = self.hwparams.num_in_eps();
        debug!(
            "DWC3: found {} IN and {} OUT endpoints",
            self.num_in_eps,
            self.num_eps - self.num_in_eps.min(self.num_eps)
        );
    }

    /// 执行 generic command，轮询 CMDACT 直到硬件完成
    pub fn send_generic_command(&self, cmd: u32, param: u32) -> Result {
        let g = self.regs.globals();

        g.dgcmdpar.set(param);
        g.dgcmd.write(DGCMD::CMD.val(cmd) + DGCMD::CMDACT::SET);
        mb();

        for _ in 0..DWC3_GENERIC_CMD_TIMEOUT {
            let reg = g.dgcmd.extract();
            if !reg.is_set(DGCMD::CMDACT) {
                let status = reg.read(DGCMD::STATUS);
                if status != 0 {
                    error!("DWC3: generic command {:#x} failed, status {}", cmd, status);
                    return Err(Dwc3Error::Command { cmd, status });
                }
                return Ok(());
            }
            delay_us(self.kernel, 1);
        }

        error!("DWC3: generic command {:#x} timeout", cmd);
        Err(Dwc3Error::Timeout)
    }

    /// 写 GCTL.PRTCAPDIR 并记录当前角色
    pub(crate) fn set_prtcap(&mut self, mode: PrtCap) {
        let mut state = self.shared.state.lock();
        self.regs
            .globals()
            .gctl
            .modify(GCTL::PRTCAPDIR.val(u32::from(mode)));
        state.current = Some(mode);
    }

    fn unwind(&mut self, from: Unwind) {
        if from >= Unwind::Usb2PowerOff {
            self.phys.usb2_generic.power_off();
        }
        if from >= Unwind::PhySuspend {
            self.phys.usb2_1.set_suspend(true);
            self.phys.usb3_1.set_suspend(true);
            self.phys.usb2.set_suspend(true);
            self.phys.usb3.set_suspend(true);
            self.unmap_scratch_buffers();
            self.free_scratch_buffers();
        }
        if from >= Unwind::PhyShutdown {
            self.phys.usb2_1.shutdown();
            self.phys.usb3_1.shutdown();
            self.phys.usb2.shutdown();
            self.phys.usb3.shutdown();
            self.phys.usb2_generic.exit();
            self.phys.usb3_generic.exit();
        }
        self.core_ulpi_exit();
    }

    fn init_failed(&mut self, from: Unwind, fresh_evt: bool, e: Dwc3Error) -> Dwc3Error {
        error!("DWC3: core init failed: {:?}", e);
        if fresh_evt {
            self.free_event_buffer();
        }
        self.unwind(from);
        e
    }

    /// 初始化控制器核心
    ///
    /// 失败时按相反顺序回滚已完成的步骤。ULPI 超时返回
    /// [`Dwc3Error::DeferredRetry`]，调用者稍后重试。
    pub fn init(&mut self) -> Result {
        info!("DWC3: Starting core initialization");

        self.validate_and_identify()?;
        self.hwparams = super::hwparams::Dwc3Hwparams::read(&self.regs);
        self.check_params();
        self.resolve_role()?;

        self.regs.globals().guid.set(DWC3_DRIVER_VERSION_CODE);
        self.clamp_speed();

        self.phy_setup();

        if !self.ulpi_ready {
            match self.core_ulpi_init() {
                Ok(()) => {}
                Err(Dwc3Error::Phy(PhyError::Timeout)) => {
                    warn!("DWC3: ULPI bus timeout, defer");
                    if let Err(e) = self.soft_reset() {
                        debug!("DWC3: soft reset after ULPI timeout: {:?}", e);
                    }
                    return Err(Dwc3Error::DeferredRetry);
                }
                Err(e) => return Err(e),
            }
            self.ulpi_ready = true;
        }

        if !self.phys_ready {
            if let Err(e) = self.core_get_phys() {
                return Err(self.init_failed(Unwind::Ulpi, false, e));
            }
            self.phys_ready = true;
        }

        if let Err(e) = self.soft_reset() {
            return Err(self.init_failed(Unwind::Ulpi, false, e));
        }

        self.configure_global_control();
        self.core_num_eps();

        let fresh_evt = self.event_buffer.is_none() && self.hwparams.mode() != HwMode::Host;
        if fresh_evt {
            let len = self.params.event_buffer_size;
            if let Err(e) = self.alloc_event_buffer(len) {
                return Err(self.init_failed(Unwind::PhyShutdown, false, e));
            }
        }

        if let Err(e) = self
            .alloc_scratch_buffers()
            .and_then(|_| self.setup_scratch_buffers())
        {
            self.scratch = None;
            return Err(self.init_failed(Unwind::PhyShutdown, fresh_evt, e));
        }

        self.frame_length_adjustment();

        self.phys.usb2.set_suspend(false);
        self.phys.usb2_1.set_suspend(false);
        if self.maximum_speed >= DeviceSpeed::SuperSpeed {
            self.phys.usb3.set_suspend(false);
            self.phys.usb3_1.set_suspend(false);
        }

        if let Err(e) = self.phys.usb2_generic.power_on() {
            return Err(self.init_failed(Unwind::PhySuspend, fresh_evt, e.into()));
        }
        if let Err(e) = self.phys.usb3_generic.power_on() {
            return Err(self.init_failed(Unwind::Usb2PowerOff, fresh_evt, e.into()));
        }

        let applied = apply_workarounds(self.regs.globals(), &self.identity());
        debug!("DWC3: {} revision workarounds applied", applied);

        self.program_event_buffer();
        self.notify(super::notify::NotifyEvent::PostReset, 0);

        info!(
            "✓ DWC3: core initialized, dr_mode {:?}, maximum_speed {:?}",
            self.dr_mode, self.maximum_speed
        );
        Ok(())
    }

    /// 关闭核心：清理事件缓冲区、挂起并关闭 PHY、解除暂存缓冲区映射
    ///
    /// 缓冲区本身保留，下次 [`Dwc3::init`] 时复用。
    pub fn exit(&mut self) {
        info!("DWC3: core exit");
        self.cleanup_event_buffer();
        self.phys.suspend_all();
        self.phys.usb2_generic.power_off();
        self.phys.usb3_generic.power_off();
        self.phys.shutdown_all();
        self.unmap_scratch_buffers();
    }
}
