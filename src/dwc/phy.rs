//! PHY 管理
//!
//! 控制器最多持有四个传统 USB PHY（双端口时 USB2/USB3 各两个）和两个
//! generic PHY。所有句柄都是可选的：缺失的 PHY 上的任何操作都直接成功。

use alloc::boxed::Box;

use mbarrier::mb;
use tock_registers::{
    LocalRegisterCopy,
    interfaces::{Readable, Writeable},
};

use super::{
    Dwc3,
    consts::*,
    hwparams::HsphyIfc,
    params::{Dwc3Params, PhyLookupStyle},
    quirks::Dwc3Quirks,
    reg::{GUSB2PHYCFG, GUSB3PIPECTL},
};
use crate::{
    err::{Dwc3Error, PhyError, Result},
    types::{HsphyInterface, UsbPhyInterfaceMode},
};

/// 传统 USB PHY
pub trait UsbPhy: Send {
    fn reset(&mut self) {}
    fn init(&mut self) -> core::result::Result<(), PhyError>;
    fn shutdown(&mut self);
    fn set_suspend(&mut self, suspend: bool) -> core::result::Result<(), PhyError> {
        let _ = suspend;
        Ok(())
    }
}

/// generic PHY
pub trait GenericPhy: Send {
    fn init(&mut self) -> core::result::Result<(), PhyError>;
    fn exit(&mut self) -> core::result::Result<(), PhyError>;
    fn power_on(&mut self) -> core::result::Result<(), PhyError>;
    fn power_off(&mut self) -> core::result::Result<(), PhyError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsbPhyType {
    Usb2,
    Usb3,
}

/// PHY 查找结果
pub enum PhyLookup<T> {
    Present(T),
    /// 平台没有配置该 PHY，句柄永久为空
    Absent,
    /// PHY 驱动还没准备好，整个初始化需要稍后重试
    DeferredRetry,
    Error(PhyError),
}

/// 平台提供的 PHY 来源以及 ULPI 总线
pub trait PhyProvider: Send {
    /// 按 "usb-phy" phandle 下标查找
    fn usb_phy_by_phandle(&mut self, index: usize) -> PhyLookup<Box<dyn UsbPhy>>;
    fn usb_phy_by_type(&mut self, ty: UsbPhyType) -> PhyLookup<Box<dyn UsbPhy>>;
    /// 按名字查找 generic PHY（"usb2-phy" / "usb3-phy"）
    fn generic_phy(&mut self, name: &str) -> PhyLookup<Box<dyn GenericPhy>>;

    fn ulpi_init(&mut self) -> core::result::Result<(), PhyError> {
        Ok(())
    }

    fn ulpi_exit(&mut self) {}
}

#[derive(Default)]
pub struct UsbPhyHandle(Option<Box<dyn UsbPhy>>);

impl UsbPhyHandle {
    pub fn is_present(&self) -> bool {
        self.0.is_some()
    }

    pub fn reset(&mut self) {
        if let Some(phy) = self.0.as_mut() {
            phy.reset();
        }
    }

    pub fn init(&mut self) -> core::result::Result<(), PhyError> {
        match self.0.as_mut() {
            Some(phy) => phy.init(),
            None => Ok(()),
        }
    }

    pub fn shutdown(&mut self) {
        if let Some(phy) = self.0.as_mut() {
            phy.shutdown();
        }
    }

    pub fn set_suspend(&mut self, suspend: bool) {
        if let Some(phy) = self.0.as_mut() {
            if let Err(e) = phy.set_suspend(suspend) {
                warn!("DWC3: phy set_suspend({}) failed: {:?}", suspend, e);
            }
        }
    }
}

#[derive(Default)]
pub struct GenericPhyHandle(Option<Box<dyn GenericPhy>>);

impl GenericPhyHandle {
    pub fn is_present(&self) -> bool {
        self.0.is_some()
    }

    pub fn init(&mut self) -> core::result::Result<(), PhyError> {
        match self.0.as_mut() {
            Some(phy) => phy.init(),
            None => Ok(()),
        }
    }

    pub fn exit(&mut self) {
        if let Some(Err(e)) = self.0.as_mut().map(|phy| phy.exit()) {
            warn!("DWC3: generic phy exit failed: {:?}", e);
        }
    }

    pub fn power_on(&mut self) -> core::result::Result<(), PhyError> {
        match self.0.as_mut() {
            Some(phy) => phy.power_on(),
            None => Ok(()),
        }
    }

    pub fn power_off(&mut self) {
        if let Some(Err(e)) = self.0.as_mut().map(|phy| phy.power_off()) {
            warn!("DWC3: generic phy power off failed: {:?}", e);
        }
    }
}

#[derive(Default)]
pub struct Dwc3Phys {
    pub usb2: UsbPhyHandle,
    pub usb3: UsbPhyHandle,
    /// 双端口时的第二个 USB2 PHY
    pub usb2_1: UsbPhyHandle,
    pub usb3_1: UsbPhyHandle,
    pub usb2_generic: GenericPhyHandle,
    pub usb3_generic: GenericPhyHandle,
}

impl Dwc3Phys {
    /// 关闭所有传统 PHY 并退出 generic PHY
    pub fn shutdown_all(&mut self) {
        self.usb2_1.shutdown();
        self.usb2.shutdown();
        self.usb3_1.shutdown();
        self.usb3.shutdown();
        self.usb2_generic.exit();
        self.usb3_generic.exit();
    }

    pub fn suspend_all(&mut self) {
        self.usb2_1.set_suspend(true);
        self.usb2.set_suspend(true);
        self.usb3_1.set_suspend(true);
        self.usb3.set_suspend(true);
    }
}

fn resolve<T>(lookup: PhyLookup<T>, what: &str) -> Result<Option<T>> {
    match lookup {
        PhyLookup::Present(phy) => Ok(Some(phy)),
        PhyLookup::Absent => Ok(None),
        PhyLookup::DeferredRetry => Err(Dwc3Error::DeferredRetry),
        PhyLookup::Error(e) => {
            error!("DWC3: no {} configured: {:?}", what, e);
            Err(e.into())
        }
    }
}

/// 计算 GUSB3PIPECTL 的配置值，每次都基于当前寄存器值和 quirk 重新计算
pub(crate) fn usb3_pipectl_config(reg: u32, revision: u32, params: &Dwc3Params) -> u32 {
    let mut r = LocalRegisterCopy::<u32, GUSB3PIPECTL::Register>::new(reg);
    let q = params.quirks;

    // UX_EXIT_PX 在正常操作中不应置位，部分 PHY 会出问题
    r.modify(GUSB3PIPECTL::UX_EXIT_PX::CLEAR);

    // 1.94a 之后 SUSPHY 复位值为 0，需要软件置位
    if revision > DWC3_REVISION_194A {
        r.modify(GUSB3PIPECTL::SUSPHY::SET);
    }

    let mut set = 0u32;
    if q.contains(Dwc3Quirks::U2SS_INP3) {
        set |= GUSB3PIPECTL::U2SSINP3OK::SET.value;
    }
    if q.contains(Dwc3Quirks::DIS_RXDET_INP3) {
        set |= GUSB3PIPECTL::DISRXDETINP3::SET.value;
    }
    if q.contains(Dwc3Quirks::REQ_P1P2P3) {
        set |= GUSB3PIPECTL::REQP1P2P3::SET.value;
    }
    if q.contains(Dwc3Quirks::DEL_P1P2P3) {
        set |= GUSB3PIPECTL::DEP1P2P3::Enable.value;
    }
    if q.contains(Dwc3Quirks::DEL_PHY_POWER_CHG) {
        set |= GUSB3PIPECTL::DEPOCHANGE::SET.value;
    }
    if q.contains(Dwc3Quirks::LFPS_FILTER) {
        set |= GUSB3PIPECTL::LFPSFILT::SET.value;
    }
    if q.contains(Dwc3Quirks::RX_DETECT_POLL) {
        set |= GUSB3PIPECTL::RX_DETOPOLL::SET.value;
    }
    if q.contains(Dwc3Quirks::TX_DE_EMPHASIS) {
        set |= GUSB3PIPECTL::TX_DEEPH.val(params.tx_de_emphasis as u32).value;
    }
    r.set(r.get() | set);

    if q.contains(Dwc3Quirks::DIS_U3_SUSPHY) {
        r.modify(GUSB3PIPECTL::SUSPHY::CLEAR);
    }
    if q.contains(Dwc3Quirks::DIS_DEL_PHY_POWER_CHG) {
        r.modify(GUSB3PIPECTL::DEPOCHANGE::CLEAR);
    }
    if q.contains(Dwc3Quirks::SSP_U3_U0) {
        r.set(r.get() | (GUSB3PIPECTL::UX_EXIT_PX::SET + GUSB3PIPECTL::P3EXSIGP2::SET).value);
    }

    r.get()
}

/// 计算 GUSB2PHYCFG 的配置值
pub(crate) fn usb2_phycfg_config(
    reg: u32,
    revision: u32,
    hsphy_ifc: HsphyIfc,
    params: &Dwc3Params,
) -> u32 {
    let mut r = LocalRegisterCopy::<u32, GUSB2PHYCFG::Register>::new(reg);
    let q = params.quirks;

    // 同时支持 UTMI+ 和 ULPI 时按配置选择，未配置则保留默认值
    if hsphy_ifc == HsphyIfc::UtmiUlpi {
        match params.hsphy_interface {
            Some(HsphyInterface::Utmi) => r.modify(GUSB2PHYCFG::ULPI_UTMI::CLEAR),
            Some(HsphyInterface::Ulpi) => r.modify(GUSB2PHYCFG::ULPI_UTMI::SET),
            None => {}
        }
    }

    match params.hsphy_mode {
        UsbPhyInterfaceMode::Utmi => r.modify(
            GUSB2PHYCFG::PHYIF.val(UTMI_PHYIF_8_BIT)
                + GUSB2PHYCFG::USBTRDTIM.val(USBTRDTIM_UTMI_8_BIT),
        ),
        UsbPhyInterfaceMode::UtmiWide => r.modify(
            GUSB2PHYCFG::PHYIF.val(UTMI_PHYIF_16_BIT)
                + GUSB2PHYCFG::USBTRDTIM.val(USBTRDTIM_UTMI_16_BIT),
        ),
        _ => {}
    }

    if revision > DWC3_REVISION_194A {
        r.modify(GUSB2PHYCFG::SUSPHY::SET);
    }
    if q.contains(Dwc3Quirks::DIS_U2_SUSPHY) {
        r.modify(GUSB2PHYCFG::SUSPHY::CLEAR);
    }
    if q.contains(Dwc3Quirks::DIS_ENBLSLPM) {
        r.modify(GUSB2PHYCFG::ENBLSLPM::CLEAR);
    }
    if q.contains(Dwc3Quirks::DIS_U2_FREECLK_EXISTS) {
        r.modify(GUSB2PHYCFG::U2_FREECLK_EXISTS::CLEAR);
    }

    r.get()
}

impl Dwc3 {
    /// 配置 USB PHY 接口寄存器
    ///
    /// 只配置接口，PHY 本身在软复位流程中初始化。
    pub(crate) fn phy_setup(&mut self) {
        let g = self.regs.globals();
        let dual = self.params.dual_port;

        let reg = g.gusb3pipectl[0].get();
        if dual && reg != g.gusb3pipectl[1].get() {
            warn!("DWC3: Reset values of pipectl registers are different!");
        }
        let reg = usb3_pipectl_config(reg, self.revision, &self.params);
        g.gusb3pipectl[0].set(reg);
        if dual {
            g.gusb3pipectl[1].set(reg);
        }
        debug!("DWC3: GUSB3PIPECTL = {:#010x}", reg);

        let reg = g.gusb2phycfg[0].get();
        if dual && reg != g.gusb2phycfg[1].get() {
            warn!("DWC3: Reset values of usb2phycfg registers are different!");
        }
        let reg = usb2_phycfg_config(
            reg,
            self.revision,
            self.hwparams.hsphy_ifc(),
            &self.params,
        );
        g.gusb2phycfg[0].set(reg);
        if dual {
            g.gusb2phycfg[1].set(reg);
        }
        mb();
        debug!("DWC3: GUSB2PHYCFG = {:#010x}", reg);
    }

    /// 挂起/恢复 USB3 PHY 接口
    pub fn usb3_phy_suspend(&mut self, suspend: bool) {
        if self.params.quirks.contains(Dwc3Quirks::DIS_U3_SUSPHY) {
            return;
        }
        let ports = if self.params.dual_port { 2 } else { 1 };
        for reg in &self.regs.globals().gusb3pipectl[..ports] {
            let mut v = reg.extract();
            if suspend {
                v.modify(GUSB3PIPECTL::SUSPHY::SET);
            } else {
                v.modify(GUSB3PIPECTL::SUSPHY::CLEAR);
            }
            reg.set(v.get());
        }
    }

    pub fn en_sleep_mode(&mut self) {
        if self.params.quirks.contains(Dwc3Quirks::DIS_ENBLSLPM) {
            return;
        }
        let ports = if self.params.dual_port { 2 } else { 1 };
        for reg in &self.regs.globals().gusb2phycfg[..ports] {
            let v = reg.get();
            reg.set(v | GUSB2PHYCFG::ENBLSLPM::SET.value);
        }
    }

    /// 只作用于端口 0
    pub fn dis_sleep_mode(&mut self) {
        let reg = &self.regs.globals().gusb2phycfg[0];
        let v = reg.get();
        reg.set(v & !GUSB2PHYCFG::ENBLSLPM::SET.value);
    }

    /// 硬件接口为 ULPI，或 UTMI+ULPI 且配置为 ULPI 时初始化 ULPI 总线
    pub(crate) fn core_ulpi_init(&mut self) -> Result {
        let intf = self.hwparams.hsphy_ifc();
        if intf == HsphyIfc::Ulpi
            || (intf == HsphyIfc::UtmiUlpi
                && self.params.hsphy_interface == Some(HsphyInterface::Ulpi))
        {
            debug!("DWC3: initializing ULPI bus");
            self.provider.ulpi_init()?;
        }
        Ok(())
    }

    pub(crate) fn core_ulpi_exit(&mut self) {
        self.provider.ulpi_exit();
        self.ulpi_ready = false;
    }

    /// 获取所有 PHY 句柄，全部成功后才替换当前句柄
    pub(crate) fn core_get_phys(&mut self) -> Result {
        let mut phys = Dwc3Phys::default();
        let provider = &mut self.provider;

        match self.params.phy_lookup {
            PhyLookupStyle::Phandle => {
                let usb2 = provider.usb_phy_by_phandle(0);
                let usb3 = provider.usb_phy_by_phandle(1);
                phys.usb2 = UsbPhyHandle(resolve(usb2, "usb2 phy")?);
                phys.usb3 = UsbPhyHandle(resolve(usb3, "usb3 phy")?);
                if self.params.dual_port {
                    let usb2_1 = provider.usb_phy_by_phandle(2);
                    let usb3_1 = provider.usb_phy_by_phandle(3);
                    phys.usb2_1 = UsbPhyHandle(resolve(usb2_1, "usb2 phy1")?);
                    phys.usb3_1 = UsbPhyHandle(resolve(usb3_1, "usb3 phy1")?);
                }
            }
            PhyLookupStyle::Type => {
                let usb2 = provider.usb_phy_by_type(UsbPhyType::Usb2);
                let usb3 = provider.usb_phy_by_type(UsbPhyType::Usb3);
                phys.usb2 = UsbPhyHandle(resolve(usb2, "usb2 phy")?);
                phys.usb3 = UsbPhyHandle(resolve(usb3, "usb3 phy")?);
            }
        }

        let usb2 = provider.generic_phy("usb2-phy");
        phys.usb2_generic = GenericPhyHandle(resolve(usb2, "usb2 generic phy")?);
        let usb3 = provider.generic_phy("usb3-phy");
        phys.usb3_generic = GenericPhyHandle(resolve(usb3, "usb3 generic phy")?);

        debug!(
            "DWC3: phys usb2={} usb3={} usb2_1={} usb3_1={} generic2={} generic3={}",
            phys.usb2.is_present(),
            phys.usb3.is_present(),
            phys.usb2_1.is_present(),
            phys.usb3_1.is_present(),
            phys.usb2_generic.is_present(),
            phys.usb3_generic.is_present()
        );

        self.phys = phys;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipectl_clears_ux_exit_and_sets_susphy() {
        let params = Dwc3Params::default();
        let reg = usb3_pipectl_config(1 << 27, DWC3_REVISION_250A, &params);
        assert_eq!(reg, 1 << 17);
        let reg = usb3_pipectl_config(1 << 27, DWC3_REVISION_190A, &params);
        assert_eq!(reg, 0);
    }

    #[test]
    fn test_pipectl_quirks() {
        let params = Dwc3Params {
            quirks: Dwc3Quirks::U2SS_INP3
                | Dwc3Quirks::DEL_P1P2P3
                | Dwc3Quirks::TX_DE_EMPHASIS
                | Dwc3Quirks::DIS_U3_SUSPHY
                | Dwc3Quirks::DEL_PHY_POWER_CHG
                | Dwc3Quirks::DIS_DEL_PHY_POWER_CHG,
            tx_de_emphasis: 2,
            ..Default::default()
        };
        let reg = usb3_pipectl_config(0, DWC3_REVISION_250A, &params);
        assert_eq!(reg, (1 << 29) | (1 << 19) | (2 << 1));
    }

    #[test]
    fn test_pipectl_is_recomputed_not_patched() {
        let params = Dwc3Params {
            quirks: Dwc3Quirks::SSP_U3_U0,
            ..Default::default()
        };
        let once = usb3_pipectl_config(0, DWC3_REVISION_310A, &params);
        let twice = usb3_pipectl_config(once, DWC3_REVISION_310A, &params);
        assert_eq!(once, twice);
        assert_ne!(once & GUSB3PIPECTL::UX_EXIT_PX::SET.value, 0);
    }

    #[test]
    fn test_phycfg_utmi_modes() {
        let mut params = Dwc3Params {
            hsphy_mode: UsbPhyInterfaceMode::Utmi,
            ..Default::default()
        };
        let reg = usb2_phycfg_config(1 << 3, DWC3_REVISION_190A, HsphyIfc::Utmi, &params);
        assert_eq!(reg, 9 << 10);

        params.hsphy_mode = UsbPhyInterfaceMode::UtmiWide;
        let reg = usb2_phycfg_config(0, DWC3_REVISION_190A, HsphyIfc::Utmi, &params);
        assert_eq!(reg, (1 << 3) | (5 << 10));
    }

    #[test]
    fn test_phycfg_interface_select_and_quirks() {
        let mut params = Dwc3Params {
            hsphy_interface: Some(HsphyInterface::Ulpi),
            quirks: Dwc3Quirks::DIS_ENBLSLPM | Dwc3Quirks::DIS_U2_FREECLK_EXISTS,
            ..Default::default()
        };
        let reset = (1 << 29) | (1 << 30);
        let reg = usb2_phycfg_config(reset, DWC3_REVISION_250A, HsphyIfc::UtmiUlpi, &params);
        assert_eq!(reg, (1 << 4) | (1 << 6));

        // 仅 ULPI 的硬件不改动接口选择
        let reg = usb2_phycfg_config(0, DWC3_REVISION_250A, HsphyIfc::Ulpi, &params);
        assert_eq!(reg, 1 << 6);

        params.hsphy_interface = Some(HsphyInterface::Utmi);
        params.quirks = Dwc3Quirks::DIS_U2_SUSPHY;
        let reg = usb2_phycfg_config(1 << 4, DWC3_REVISION_250A, HsphyIfc::UtmiUlpi, &params);
        assert_eq!(reg, 0);
    }
}
