//! 控制器的静态配置，来自平台在 attach 时提供的属性

use core::time::Duration;

use super::consts::{DWC3_DEFAULT_AUTOSUSPEND_DELAY_MS, DWC3_EVENT_BUFFERS_SIZE};
use super::quirks::{Dwc3Quirks, QUIRK_PROPERTIES};
use crate::types::{BuildMode, DeviceSpeed, DrMode, HsphyInterface, UsbPhyInterfaceMode};

/// PHY 的查找方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhyLookupStyle {
    /// 按 "usb-phy" phandle 下标
    #[default]
    Phandle,
    /// 按 PHY 类型
    Type,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropValue<'a> {
    Bool(bool),
    U32(u32),
    Str(&'a str),
}

/// 一条设备树风格的属性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Property<'a> {
    pub name: &'a str,
    pub value: PropValue<'a>,
}

impl<'a> Property<'a> {
    pub fn flag(name: &'a str) -> Self {
        Self {
            name,
            value: PropValue::Bool(true),
        }
    }

    pub fn u32(name: &'a str, value: u32) -> Self {
        Self {
            name,
            value: PropValue::U32(value),
        }
    }

    pub fn str(name: &'a str, value: &'a str) -> Self {
        Self {
            name,
            value: PropValue::Str(value),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dwc3Params {
    pub dr_mode: DrMode,
    pub build: BuildMode,
    pub maximum_speed: DeviceSpeed,
    pub hsphy_mode: UsbPhyInterfaceMode,
    pub hsphy_interface: Option<HsphyInterface>,
    pub quirks: Dwc3Quirks,
    /// GUSB3PIPECTL.TX_DEEPH，默认 -3.5dB
    pub tx_de_emphasis: u8,
    /// GFLADJ 30MHz 帧长调整值，0 表示不调整
    pub fladj: u32,
    pub lpm_nyet_threshold: u8,
    pub hird_threshold: u8,
    pub is_utmi_l1_suspend: bool,
    pub imod_interval: u32,
    pub core_id: u32,
    pub dual_port: bool,
    pub phy_lookup: PhyLookupStyle,
    pub enable_bus_suspend: bool,
    pub ignore_wakeup_src_in_hostmode: bool,
    pub event_buffer_size: usize,
}

impl Default for Dwc3Params {
    fn default() -> Self {
        Self {
            dr_mode: DrMode::Unknown,
            build: BuildMode::DualRole,
            maximum_speed: DeviceSpeed::Unknown,
            hsphy_mode: UsbPhyInterfaceMode::Unknown,
            hsphy_interface: None,
            quirks: Dwc3Quirks::empty(),
            tx_de_emphasis: 1,
            fladj: 0,
            lpm_nyet_threshold: 0xf,
            hird_threshold: 12,
            is_utmi_l1_suspend: false,
            imod_interval: 0,
            core_id: 0,
            dual_port: false,
            phy_lookup: PhyLookupStyle::Phandle,
            enable_bus_suspend: false,
            ignore_wakeup_src_in_hostmode: false,
            event_buffer_size: DWC3_EVENT_BUFFERS_SIZE,
        }
    }
}

impl Dwc3Params {
    /// 从属性列表解析配置，未出现的属性保持默认值
    pub fn from_properties(props: &[Property<'_>]) -> Self {
        let mut params = Self::default();

        for prop in props {
            match (prop.name, prop.value) {
                ("dr_mode", PropValue::Str(s)) => params.dr_mode = parse_dr_mode(s),
                ("maximum-speed", PropValue::Str(s)) => params.maximum_speed = parse_speed(s),
                ("phy_type", PropValue::Str(s)) => params.hsphy_mode = parse_phy_mode(s),
                ("snps,hsphy_interface", PropValue::Str(s)) => {
                    params.hsphy_interface = parse_hsphy_interface(s)
                }
                ("snps,quirk-frame-length-adjustment", PropValue::U32(v)) => params.fladj = v,
                ("snps,tx_de_emphasis", PropValue::U32(v)) => params.tx_de_emphasis = v as u8,
                ("snps,lpm-nyet-threshold", PropValue::U32(v)) => {
                    params.lpm_nyet_threshold = v as u8
                }
                ("snps,hird-threshold", PropValue::U32(v)) => params.hird_threshold = v as u8,
                ("snps,is-utmi-l1-suspend", PropValue::Bool(b)) => params.is_utmi_l1_suspend = b,
                ("snps,xhci-imod-value", PropValue::U32(v)) => params.imod_interval = v,
                ("usb-core-id", PropValue::U32(v)) => params.core_id = v,
                ("snps,dual-port", PropValue::Bool(b)) => params.dual_port = b,
                ("snps,bus-suspend-enable", PropValue::Bool(b)) => params.enable_bus_suspend = b,
                ("snps,ignore-wakeup-src-in-hostmode", PropValue::Bool(b)) => {
                    params.ignore_wakeup_src_in_hostmode = b
                }
                (name, PropValue::Bool(b)) => {
                    match QUIRK_PROPERTIES.iter().find(|(n, _)| *n == name) {
                        Some((_, quirk)) => params.quirks.set(*quirk, b),
                        None => debug!("DWC3: ignoring property {}", name),
                    }
                }
                (name, value) => debug!("DWC3: ignoring property {} = {:?}", name, value),
            }
        }

        params
    }

    /// 写入 DCTL 时使用的 HIRD 阈值，bit4 为 utmi_sleep_n 选择
    pub fn effective_hird_threshold(&self) -> u8 {
        self.hird_threshold | ((self.is_utmi_l1_suspend as u8) << 4)
    }

    /// 开启总线挂起时使用的 autosuspend 延时
    pub fn autosuspend_delay(&self) -> Option<Duration> {
        self.enable_bus_suspend
            .then(|| Duration::from_millis(DWC3_DEFAULT_AUTOSUSPEND_DELAY_MS))
    }
}

fn parse_dr_mode(s: &str) -> DrMode {
    match s {
        "host" => DrMode::Host,
        "peripheral" => DrMode::Peripheral,
        "otg" => DrMode::Otg,
        _ => {
            warn!("DWC3: unknown dr_mode {:?}", s);
            DrMode::Unknown
        }
    }
}

fn parse_speed(s: &str) -> DeviceSpeed {
    match s {
        "low-speed" => DeviceSpeed::Low,
        "full-speed" => DeviceSpeed::Full,
        "high-speed" => DeviceSpeed::High,
        "wireless" => DeviceSpeed::Wireless,
        "super-speed" => DeviceSpeed::SuperSpeed,
        "super-speed-plus" => DeviceSpeed::SuperSpeedPlus,
        _ => DeviceSpeed::Unknown,
    }
}

fn parse_phy_mode(s: &str) -> UsbPhyInterfaceMode {
    match s {
        "utmi" => UsbPhyInterfaceMode::Utmi,
        "utmi_wide" => UsbPhyInterfaceMode::UtmiWide,
        "ulpi" => UsbPhyInterfaceMode::Ulpi,
        "serial" => UsbPhyInterfaceMode::Serial,
        "hsic" => UsbPhyInterfaceMode::Hsic,
        _ => UsbPhyInterfaceMode::Unknown,
    }
}

fn parse_hsphy_interface(s: &str) -> Option<HsphyInterface> {
    if s.starts_with("utmi") {
        Some(HsphyInterface::Utmi)
    } else if s.starts_with("ulpi") {
        Some(HsphyInterface::Ulpi)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = Dwc3Params::from_properties(&[]);
        assert_eq!(params.tx_de_emphasis, 1);
        assert_eq!(params.lpm_nyet_threshold, 0xf);
        assert_eq!(params.hird_threshold, 12);
        assert_eq!(params.event_buffer_size, 256);
        assert_eq!(params.dr_mode, DrMode::Unknown);
        assert_eq!(params.maximum_speed, DeviceSpeed::Unknown);
        assert!(params.quirks.is_empty());
        assert_eq!(params.autosuspend_delay(), None);
    }

    #[test]
    fn test_parse_properties() {
        let params = Dwc3Params::from_properties(&[
            Property::str("dr_mode", "peripheral"),
            Property::str("maximum-speed", "high-speed"),
            Property::str("phy_type", "utmi_wide"),
            Property::str("snps,hsphy_interface", "ulpi"),
            Property::u32("snps,quirk-frame-length-adjustment", 0x20),
            Property::u32("usb-core-id", 2),
            Property::flag("snps,dis_u3_susphy_quirk"),
            Property::flag("snps,parkmode-disable-ss-quirk"),
            Property::flag("snps,bus-suspend-enable"),
            Property::flag("snps,is-utmi-l1-suspend"),
        ]);

        assert_eq!(params.dr_mode, DrMode::Peripheral);
        assert_eq!(params.maximum_speed, DeviceSpeed::High);
        assert_eq!(params.hsphy_mode, UsbPhyInterfaceMode::UtmiWide);
        assert_eq!(params.hsphy_interface, Some(HsphyInterface::Ulpi));
        assert_eq!(params.fladj, 0x20);
        assert_eq!(params.core_id, 2);
        assert_eq!(
            params.quirks,
            Dwc3Quirks::DIS_U3_SUSPHY | Dwc3Quirks::PARKMODE_DISABLE_SS
        );
        assert_eq!(params.autosuspend_delay(), Some(Duration::from_millis(500)));
        assert_eq!(params.effective_hird_threshold(), 12 | 1 << 4);
    }

    #[test]
    fn test_unknown_values() {
        let params = Dwc3Params::from_properties(&[
            Property::str("dr_mode", "bogus"),
            Property::str("maximum-speed", "warp"),
            Property::flag("vendor,unrelated"),
        ]);
        assert_eq!(params.dr_mode, DrMode::Unknown);
        assert_eq!(params.maximum_speed, DeviceSpeed::Unknown);
        assert!(params.quirks.is_empty());
    }
}
