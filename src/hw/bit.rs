// SPDX-License-Identifier: MIT
//! Bit- and field-granular register access over the four address families.

use crate::bsp::PlatformDesc;
use crate::hw::interface::HardwareIo;
use crate::hw::{Address, Width};

/// One addressed bit inside one chipset register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitDesc {
    pub addr: Address,
    pub width: Width,
    pub bit: u8,
}

/// Descriptor for an unused slot. Reads false, ignores writes.
pub const NULL_BIT: BitDesc = BitDesc {
    addr: Address::None,
    width: Width::Byte,
    bit: 0,
};

impl BitDesc {
    /// The bit index must fall inside the register; the platform tables are
    /// static, so a bad index fails their const evaluation.
    pub const fn new(addr: Address, width: Width, bit: u8) -> Self {
        assert!(bit < (width as u8) * 8);
        Self { addr, width, bit }
    }

    pub const fn is_null(&self) -> bool {
        self.addr.is_none()
    }
}

/// A multi-bit register field (sleep type, timer rate select). `mask` is
/// right-aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDesc {
    pub addr: Address,
    pub width: Width,
    pub shift: u8,
    pub mask: u32,
}

fn register_read(hw: &dyn HardwareIo, plat: &PlatformDesc, addr: Address, width: Width) -> u32 {
    match addr {
        Address::None => 0,
        Address::Acpi { offset } => hw.io_read(plat.pm_base + offset, width),
        Address::Gpe { offset } => hw.io_read(plat.gpe_base + offset, width),
        Address::Mmio { base } => {
            let mut buf = [0u8; 4];
            hw.mem_read(base, &mut buf[..width.bytes()]);
            u32::from_le_bytes(buf)
        }
        Address::Pci { addr, register } => hw.pci_read(addr, register, width),
    }
}

fn register_write(
    hw: &dyn HardwareIo,
    plat: &PlatformDesc,
    addr: Address,
    width: Width,
    value: u32,
) {
    match addr {
        Address::None => {}
        Address::Acpi { offset } => hw.io_write(plat.pm_base + offset, width, value),
        Address::Gpe { offset } => hw.io_write(plat.gpe_base + offset, width, value),
        Address::Mmio { base } => {
            hw.mem_write(base, &value.to_le_bytes()[..width.bytes()]);
        }
        Address::Pci { addr, register } => hw.pci_write(addr, register, width, value),
    }
}

/// Whether the addressed bit currently reads set. Null descriptors read
/// false.
pub fn read_bit(hw: &dyn HardwareIo, plat: &PlatformDesc, desc: &BitDesc) -> bool {
    if desc.is_null() {
        return false;
    }
    register_read(hw, plat, desc.addr, desc.width) & (1 << desc.bit) != 0
}

/// Read-modify-write of the addressed bit: the register is read, the target
/// bit masked out, OR-ed back in as `value`, and written. Null descriptors
/// drop the write.
pub fn write_bit(hw: &dyn HardwareIo, plat: &PlatformDesc, desc: &BitDesc, value: bool) {
    if desc.is_null() {
        return;
    }
    let mut v = register_read(hw, plat, desc.addr, desc.width);
    v &= !(1u32 << desc.bit);
    if value {
        v |= 1u32 << desc.bit;
    }
    register_write(hw, plat, desc.addr, desc.width, v);
}

/// Read a multi-bit field, right-aligned.
pub fn read_field(hw: &dyn HardwareIo, plat: &PlatformDesc, field: &FieldDesc) -> u32 {
    (register_read(hw, plat, field.addr, field.width) >> field.shift) & field.mask
}

/// Read-modify-write of a multi-bit field.
pub fn write_field(hw: &dyn HardwareIo, plat: &PlatformDesc, field: &FieldDesc, value: u32) {
    if field.addr.is_none() {
        return;
    }
    let mut v = register_read(hw, plat, field.addr, field.width);
    v &= !(field.mask << field.shift);
    v |= (value & field.mask) << field.shift;
    register_write(hw, plat, field.addr, field.width, v);
}
