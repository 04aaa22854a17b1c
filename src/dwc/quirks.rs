//! 平台/版本相关的 quirk 标志以及按版本门控的寄存器修正表

use bitflags::bitflags;
use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};

use super::consts::*;
use super::reg::{Dwc3Globals, GUCTL1, GUCTL2, GUCTL3};

bitflags! {
    /// 由属性设置的 quirk，初始化后不再改变
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Dwc3Quirks: u32 {
        const DISABLE_SCRAMBLE = 1 << 0;
        const U2EXIT_LFPS = 1 << 1;
        const U2SS_INP3 = 1 << 2;
        const REQ_P1P2P3 = 1 << 3;
        const DEL_P1P2P3 = 1 << 4;
        const DEL_PHY_POWER_CHG = 1 << 5;
        const LFPS_FILTER = 1 << 6;
        const RX_DETECT_POLL = 1 << 7;
        const DIS_U3_SUSPHY = 1 << 8;
        const DIS_U2_SUSPHY = 1 << 9;
        const DIS_ENBLSLPM = 1 << 10;
        const DIS_RXDET_INP3 = 1 << 11;
        const DIS_U2_FREECLK_EXISTS = 1 << 12;
        const DIS_DEL_PHY_POWER_CHG = 1 << 13;
        const DIS_TX_IPGAP_LINECHECK = 1 << 14;
        const PARKMODE_DISABLE_SS = 1 << 15;
        const TX_DE_EMPHASIS = 1 << 16;
        const SSP_U3_U0 = 1 << 17;
        const DISABLE_CLK_GATING = 1 << 18;
        const HAS_LPM_ERRATUM = 1 << 19;
        const USB3_LPM_CAPABLE = 1 << 20;
        const USB3_U1U2_DISABLE = 1 << 21;
        const DIS_METASTABILITY = 1 << 22;
    }
}

/// 布尔属性名到 quirk 位的映射
pub const QUIRK_PROPERTIES: &[(&str, Dwc3Quirks)] = &[
    ("snps,disable_scramble_quirk", Dwc3Quirks::DISABLE_SCRAMBLE),
    ("snps,u2exit_lfps_quirk", Dwc3Quirks::U2EXIT_LFPS),
    ("snps,u2ss_inp3_quirk", Dwc3Quirks::U2SS_INP3),
    ("snps,req_p1p2p3_quirk", Dwc3Quirks::REQ_P1P2P3),
    ("snps,del_p1p2p3_quirk", Dwc3Quirks::DEL_P1P2P3),
    ("snps,del_phy_power_chg_quirk", Dwc3Quirks::DEL_PHY_POWER_CHG),
    ("snps,lfps_filter_quirk", Dwc3Quirks::LFPS_FILTER),
    ("snps,rx_detect_poll_quirk", Dwc3Quirks::RX_DETECT_POLL),
    ("snps,dis_u3_susphy_quirk", Dwc3Quirks::DIS_U3_SUSPHY),
    ("snps,dis_u2_susphy_quirk", Dwc3Quirks::DIS_U2_SUSPHY),
    ("snps,dis_enblslpm_quirk", Dwc3Quirks::DIS_ENBLSLPM),
    ("snps,dis_rxdet_inp3_quirk", Dwc3Quirks::DIS_RXDET_INP3),
    (
        "snps,dis-u2-freeclk-exists-quirk",
        Dwc3Quirks::DIS_U2_FREECLK_EXISTS,
    ),
    (
        "snps,dis-del-phy-power-chg-quirk",
        Dwc3Quirks::DIS_DEL_PHY_POWER_CHG,
    ),
    (
        "snps,dis-tx-ipgap-linecheck-quirk",
        Dwc3Quirks::DIS_TX_IPGAP_LINECHECK,
    ),
    (
        "snps,parkmode-disable-ss-quirk",
        Dwc3Quirks::PARKMODE_DISABLE_SS,
    ),
    ("snps,tx_de_emphasis_quirk", Dwc3Quirks::TX_DE_EMPHASIS),
    ("snps,ssp-u3-u0-quirk", Dwc3Quirks::SSP_U3_U0),
    ("snps,disable-clk-gating", Dwc3Quirks::DISABLE_CLK_GATING),
    ("snps,has-lpm-erratum", Dwc3Quirks::HAS_LPM_ERRATUM),
    ("snps,usb3_lpm_capable", Dwc3Quirks::USB3_LPM_CAPABLE),
    ("snps,usb3-u1u2-disable", Dwc3Quirks::USB3_U1U2_DISABLE),
    ("snps,dis_metastability_quirk", Dwc3Quirks::DIS_METASTABILITY),
];

/// 修正表判断条件所需的核心身份信息
#[derive(Debug, Clone, Copy)]
pub struct CoreIdentity {
    pub revision: u32,
    pub version_type: u32,
    pub quirks: Dwc3Quirks,
}

impl CoreIdentity {
    pub fn is_usb31(&self) -> bool {
        self.revision & DWC3_REVISION_IS_DWC31 != 0
    }
}

/// 一条按版本门控的寄存器修正
pub struct Workaround {
    pub name: &'static str,
    pub applies: fn(&CoreIdentity) -> bool,
    pub apply: fn(&Dwc3Globals, &CoreIdentity),
}

fn set_bits<R: tock_registers::RegisterLongName>(
    reg: &tock_registers::registers::ReadWrite<u32, R>,
    bits: u32,
) {
    let v = reg.get();
    reg.set(v | bits);
}

/// 按顺序执行，每一项只做位设置/清除，互不依赖
pub static WORKAROUNDS: &[Workaround] = &[
    Workaround {
        // ENDXFER 轮询，DWC_usb31 没有该功能
        name: "endxfer-polling",
        applies: |id| !id.is_usb31() && id.revision >= DWC3_REVISION_310A,
        apply: |g, _| set_bits(&g.guctl2, GUCTL2::RST_ACTBITLATER::SET.value),
    },
    Workaround {
        name: "dev-l1-exit-by-hw",
        applies: |id| id.revision >= DWC3_REVISION_290A,
        apply: |g, _| set_bits(&g.guctl1, GUCTL1::DEV_L1_EXIT_BY_HW::SET.value),
    },
    Workaround {
        name: "tx-ipgap-linecheck-disable",
        applies: |id| {
            id.revision >= DWC3_REVISION_250A
                && id.quirks.contains(Dwc3Quirks::DIS_TX_IPGAP_LINECHECK)
        },
        apply: |g, _| set_bits(&g.guctl1, GUCTL1::TX_IPGAP_LINECHECK_DIS::SET.value),
    },
    Workaround {
        name: "parkmode-disable-ss",
        applies: |id| {
            id.revision >= DWC3_REVISION_250A
                && id.quirks.contains(Dwc3Quirks::PARKMODE_DISABLE_SS)
        },
        apply: |g, _| set_bits(&g.guctl1, GUCTL1::PARKMODE_DISABLE_SS::SET.value),
    },
    Workaround {
        // STAR 9001415732: Gen1 控制器 park mode 下多端点传输卡死
        name: "gen1-parkmode-disable",
        applies: |id| !id.is_usb31() && id.revision >= DWC3_REVISION_250A,
        apply: |g, _| {
            set_bits(
                &g.guctl1,
                (GUCTL1::PARKMODE_DISABLE_SS::SET
                    + GUCTL1::PARKMODE_DISABLE_HS::SET
                    + GUCTL1::PARKMODE_DISABLE_FSLS::SET)
                    .value,
            )
        },
    },
    Workaround {
        // STAR 9001346572
        name: "usb20-retry-disable",
        applies: |id| {
            id.revision == DWC3_USB31_REVISION_170A && id.version_type == DWC3_USB31_VER_TYPE_GA
        },
        apply: |g, _| set_bits(&g.guctl3, GUCTL3::USB20_RETRY_DISABLE::SET.value),
    },
    Workaround {
        // STAR 9001198391: 3.20a 默认 HP timer 为 3us
        name: "hp-timer",
        applies: |id| !id.is_usb31() && id.revision == DWC3_REVISION_320A,
        apply: |g, _| g.guctl2.modify(GUCTL2::HP_TIMER.val(11)),
    },
    Workaround {
        // STAR 9001285599
        name: "lc-timer-disable",
        applies: |id| id.revision == DWC3_REVISION_320A,
        apply: |g, _| g.guctl2.modify(GUCTL2::LC_TIMER::CLEAR),
    },
    Workaround {
        name: "ip-gap-add-on",
        applies: |id| id.revision >= DWC3_USB31_REVISION_170A,
        apply: |g, _| set_bits(&g.guctl1, GUCTL1::IP_GAP_ADD_ON.val(1).value),
    },
];

/// 执行所有适用的修正，返回生效的条目数
pub fn apply_workarounds(globals: &Dwc3Globals, id: &CoreIdentity) -> usize {
    let mut applied = 0;
    for w in WORKAROUNDS {
        if (w.applies)(id) {
            debug!("DWC3: workaround {}", w.name);
            (w.apply)(globals, id);
            applied += 1;
        }
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(revision: u32) -> CoreIdentity {
        CoreIdentity {
            revision,
            version_type: 0,
            quirks: Dwc3Quirks::empty(),
        }
    }

    fn applicable(id: &CoreIdentity) -> Vec<&'static str> {
        WORKAROUNDS
            .iter()
            .filter(|w| (w.applies)(id))
            .map(|w| w.name)
            .collect()
    }

    #[test]
    fn test_old_core_has_no_workarounds() {
        assert!(applicable(&id(DWC3_REVISION_210A)).is_empty());
    }

    #[test]
    fn test_320a_workarounds() {
        assert_eq!(
            applicable(&id(DWC3_REVISION_320A)),
            [
                "endxfer-polling",
                "dev-l1-exit-by-hw",
                "gen1-parkmode-disable",
                "hp-timer",
                "lc-timer-disable"
            ]
        );
    }

    #[test]
    fn test_usb31_170a_ga() {
        let mut core = id(DWC3_USB31_REVISION_170A);
        core.version_type = DWC3_USB31_VER_TYPE_GA;
        core.quirks = Dwc3Quirks::PARKMODE_DISABLE_SS;
        assert_eq!(
            applicable(&core),
            [
                "dev-l1-exit-by-hw",
                "parkmode-disable-ss",
                "usb20-retry-disable",
                "ip-gap-add-on"
            ]
        );
    }

    #[test]
    fn test_quirk_gated_entries() {
        let mut core = id(DWC3_REVISION_250A);
        assert_eq!(applicable(&core), ["gen1-parkmode-disable"]);
        core.quirks = Dwc3Quirks::DIS_TX_IPGAP_LINECHECK;
        assert_eq!(
            applicable(&core),
            ["tx-ipgap-linecheck-disable", "gen1-parkmode-disable"]
        );
    }

    #[test]
    fn test_quirk_property_names_unique() {
        for (i, (name, bit)) in QUIRK_PROPERTIES.iter().enumerate() {
            for (other, other_bit) in &QUIRK_PROPERTIES[i + 1..] {
                assert_ne!(name, other);
                assert_ne!(bit, other_bit);
            }
        }
    }
}
