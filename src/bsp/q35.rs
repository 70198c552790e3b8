// SPDX-License-Identifier: MIT
//! Q35/ICH9-class chipset tables.

use super::{PlatformDesc, SleepHw, TimerHw, TimerInterval};
use crate::hw::bit::{BitDesc, FieldDesc, NULL_BIT};
use crate::hw::source::{SourceDesc, SourceFlags, NULL_SOURCE};
use crate::hw::{Address, PciAddress, Width};

/// ACPI power-management I/O block base.
pub const PM_BASE: u16 = 0x600;
/// General-purpose-event I/O block base.
pub const GPE_BASE: u16 = 0x628;

// Offsets within the PM block.
const PM1_STS: u16 = 0x00;
const PM1_EN: u16 = 0x02;
const PM1_CNT: u16 = 0x04;
const SMI_EN: u16 = 0x30;
const SMI_STS: u16 = 0x34;

// Offsets within the GPE block.
const GPE0_STS: u16 = 0x00;
const GPE0_EN: u16 = 0x04;

/// APM command port; software SMI values are written here.
pub const APM_CNT: u16 = 0xb2;

/// Root-complex register block; the BIOS write-protect logic lives there.
const RCBA: u64 = 0xfed1_c000;

const LPC: PciAddress = PciAddress::new(0, 31, 0);
/// General PM configuration register carrying the periodic rate select.
const GEN_PMCON_1: u16 = 0xa0;

const GPI_PINS: usize = 16;

const fn smi_en_bit(bit: u8) -> BitDesc {
    BitDesc::new(Address::Acpi { offset: SMI_EN }, Width::Dword, bit)
}

const fn smi_sts_bit(bit: u8) -> BitDesc {
    BitDesc::new(Address::Acpi { offset: SMI_STS }, Width::Dword, bit)
}

const fn smi_source(bit: u8) -> SourceDesc {
    SourceDesc::new(
        SourceFlags::empty(),
        [smi_en_bit(bit), NULL_BIT],
        smi_sts_bit(bit),
    )
}

const fn gpi_source(pin: u8) -> SourceDesc {
    SourceDesc::new(
        SourceFlags::empty(),
        [
            BitDesc::new(Address::Gpe { offset: GPE0_EN }, Width::Dword, pin),
            NULL_BIT,
        ],
        BitDesc::new(Address::Gpe { offset: GPE0_STS }, Width::Dword, pin),
    )
}

static GPI_SOURCES: [SourceDesc; GPI_PINS] = {
    let mut sources = [NULL_SOURCE; GPI_PINS];
    let mut pin = 0;
    while pin < GPI_PINS {
        sources[pin] = gpi_source(pin as u8);
        pin += 1;
    }
    sources
};

/// Indexed by `ChipsetEvent`.
static CHIPSET_SOURCES: [SourceDesc; 4] = [
    // LegacyUsb
    smi_source(3),
    // TcoTimeout
    smi_source(13),
    // PowerButton: PM1 wiring, handed to the OS once SCI is up.
    SourceDesc::new(
        SourceFlags::SCI_DEPENDENT,
        [
            BitDesc::new(Address::Acpi { offset: PM1_EN }, Width::Word, 8),
            NULL_BIT,
        ],
        BitDesc::new(Address::Acpi { offset: PM1_STS }, Width::Word, 8),
    ),
    // BiosWriteProtect: MMIO logic that acknowledges on zero.
    SourceDesc::new(
        SourceFlags::CLEAR_WITH_ZERO,
        [
            BitDesc::new(Address::Mmio { base: RCBA + 0x3410 }, Width::Dword, 5),
            NULL_BIT,
        ],
        BitDesc::new(Address::Mmio { base: RCBA + 0x3414 }, Width::Dword, 5),
    ),
];

static TIMER_INTERVALS: [TimerInterval; 4] = [
    TimerInterval {
        interval_us: 64_000_000,
        select: 0,
    },
    TimerInterval {
        interval_us: 32_000_000,
        select: 1,
    },
    TimerInterval {
        interval_us: 16_000_000,
        select: 2,
    },
    TimerInterval {
        interval_us: 8_000_000,
        select: 3,
    },
];

pub static PLATFORM: PlatformDesc = PlatformDesc {
    pm_base: PM_BASE,
    gpe_base: GPE_BASE,
    sci_en: BitDesc::new(Address::Acpi { offset: PM1_CNT }, Width::Dword, 0),
    eos: smi_en_bit(1),
    pin_assert: smi_sts_bit(31),
    swi_port: APM_CNT,
    sw_source: smi_source(5),
    sleep: SleepHw {
        source: smi_source(4),
        typ: FieldDesc {
            addr: Address::Acpi { offset: PM1_CNT },
            width: Width::Dword,
            shift: 10,
            mask: 0x7,
        },
        slp_en: BitDesc::new(Address::Acpi { offset: PM1_CNT }, Width::Dword, 13),
        // S2 is not implemented by this chipset.
        typ_codes: [Some(0), Some(1), None, Some(5), Some(6), Some(7)],
        wake_typ: 0,
    },
    timer: TimerHw {
        source: smi_source(14),
        control: FieldDesc {
            addr: Address::Pci {
                addr: LPC,
                register: GEN_PMCON_1,
            },
            width: Width::Word,
            shift: 0,
            mask: 0x3,
        },
        intervals: &TIMER_INTERVALS,
    },
    gpi_sources: &GPI_SOURCES,
    chipset_sources: &CHIPSET_SOURCES,
};
