// SPDX-License-Identifier: MIT
//! Hardware access: the four chipset address families and the I/O seam the
//! engine performs every register touch through.

pub mod bit;
#[cfg(test)]
pub mod mock;
pub mod source;
#[cfg(target_arch = "x86_64")]
pub mod x86;

pub mod interface {
    use super::{PciAddress, Width};

    /// Foreground I/O state saved around a dispatch, opaque to the engine.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SharedIoState(pub u64);

    /// Synchronous chipset register access.
    ///
    /// Every hardware touch the engine makes goes through this trait, so the
    /// same engine drives real silicon or a mock register file in tests.
    pub trait HardwareIo {
        /// Read `width` bytes from an I/O port.
        fn io_read(&self, port: u16, width: Width) -> u32;

        /// Write `width` bytes to an I/O port.
        fn io_write(&self, port: u16, width: Width, value: u32);

        /// Byte-wise memory-mapped read; `buf.len()` is at most 8 and no
        /// alignment is assumed.
        fn mem_read(&self, base: u64, buf: &mut [u8]);

        /// Byte-wise memory-mapped write.
        fn mem_write(&self, base: u64, buf: &[u8]);

        /// Read `width` bytes from PCI configuration space.
        fn pci_read(&self, addr: PciAddress, register: u16, width: Width) -> u32;

        /// Write `width` bytes to PCI configuration space.
        fn pci_write(&self, addr: PciAddress, register: u16, width: Width, value: u32);

        /// Snapshot the shared indirect-addressing state the interrupted
        /// foreground code may be mid-way through using (the PCI config
        /// address port). Restored verbatim when dispatch finishes.
        fn save_shared(&self) -> SharedIoState;

        /// Restore state captured by [`save_shared`](HardwareIo::save_shared).
        fn restore_shared(&self, state: SharedIoState);

        /// Write back and invalidate caches ahead of a sleep transition.
        fn flush_cache(&self);
    }
}

/// PCI configuration-space function address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PciAddress {
    pub bus: u8,
    pub device: u8,
    pub function: u8,
}

impl PciAddress {
    pub const fn new(bus: u8, device: u8, function: u8) -> Self {
        Self {
            bus,
            device,
            function,
        }
    }
}

/// Register width in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Byte = 1,
    Word = 2,
    Dword = 4,
}

impl Width {
    pub const fn bytes(self) -> usize {
        self as usize
    }
}

/// One register location in one of the four chipset address families.
///
/// `None` is the sentinel for an unused slot: it reads as zero and drops
/// writes, which lets source descriptors leave their second enable bit
/// unwired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Address {
    /// Unused slot.
    None,
    /// Offset into the ACPI power-management I/O block.
    Acpi { offset: u16 },
    /// Offset into the general-purpose-event I/O block.
    Gpe { offset: u16 },
    /// Memory-mapped register.
    Mmio { base: u64 },
    /// PCI configuration-space register.
    Pci { addr: PciAddress, register: u16 },
}

impl Address {
    pub const fn is_none(&self) -> bool {
        matches!(*self, Address::None)
    }
}
