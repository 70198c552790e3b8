// SPDX-License-Identifier: MIT
//! Source descriptors: the enable/status bit sets that identify one logical
//! SMI source.

use bitflags::bitflags;

use crate::bsp::PlatformDesc;
use crate::hw::bit::{self, BitDesc, NULL_BIT};
use crate::hw::interface::HardwareIo;

bitflags! {
    /// Modifiers for a source's clear and activity semantics.
    pub struct SourceFlags: u8 {
        /// Status is acknowledged by writing 0 instead of 1.
        const CLEAR_WITH_ZERO = 1 << 0;
        /// The OS owns this source once SCI is enabled; it is never active
        /// while the OS is present.
        const SCI_DEPENDENT = 1 << 1;
    }
}

/// The enable and status bits identifying one logical interrupt source.
///
/// Sources with one physical enable leave `en[1]` null.
#[derive(Debug, Clone, Copy)]
pub struct SourceDesc {
    pub flags: SourceFlags,
    pub en: [BitDesc; 2],
    pub sts: BitDesc,
}

/// Descriptor for an unwired source slot.
pub const NULL_SOURCE: SourceDesc = SourceDesc {
    flags: SourceFlags::empty(),
    en: [NULL_BIT; 2],
    sts: NULL_BIT,
};

impl SourceDesc {
    pub const fn new(flags: SourceFlags, en: [BitDesc; 2], sts: BitDesc) -> Self {
        Self { flags, en, sts }
    }

    /// Structural identity: same registers and bit positions, regardless of
    /// what the bits currently read. Flags do not participate; they alter
    /// clear semantics, not which source this is.
    pub fn is_same(&self, other: &SourceDesc) -> bool {
        self.en[0] == other.en[0] && self.en[1] == other.en[1] && self.sts == other.sts
    }

    pub fn is_null(&self) -> bool {
        self.en[0].is_null() && self.en[1].is_null() && self.sts.is_null()
    }
}

/// Whether the source is asserting.
///
/// SCI-dependent sources are never active while the OS is present. Otherwise
/// every wired enable bit and the status bit must read set; an unwired status
/// cannot assert.
pub fn is_active(
    hw: &dyn HardwareIo,
    plat: &PlatformDesc,
    src: &SourceDesc,
    os_present: bool,
) -> bool {
    if src.flags.contains(SourceFlags::SCI_DEPENDENT) && os_present {
        return false;
    }
    for en in &src.en {
        if !en.is_null() && !bit::read_bit(hw, plat, en) {
            return false;
        }
    }
    !src.sts.is_null() && bit::read_bit(hw, plat, &src.sts)
}

/// Acknowledge the source. Write-one-to-clear unless the source says
/// otherwise.
pub fn clear(hw: &dyn HardwareIo, plat: &PlatformDesc, src: &SourceDesc) {
    let ack = !src.flags.contains(SourceFlags::CLEAR_WITH_ZERO);
    if !src.sts.is_null() {
        bit::write_bit(hw, plat, &src.sts, ack);
    }
}

/// Arm the source. Stale status is acknowledged first so a freshly enabled
/// source cannot fire on history.
pub fn enable(hw: &dyn HardwareIo, plat: &PlatformDesc, src: &SourceDesc) {
    clear(hw, plat, src);
    for en in &src.en {
        if !en.is_null() {
            bit::write_bit(hw, plat, en, true);
        }
    }
}

/// Disarm the source.
pub fn disable(hw: &dyn HardwareIo, plat: &PlatformDesc, src: &SourceDesc) {
    for en in &src.en {
        if !en.is_null() {
            bit::write_bit(hw, plat, en, false);
        }
    }
}
