// SPDX-License-Identifier: MIT
//! Real chipset access for x86 platforms.

use x86_64::instructions::port::Port;

use crate::hw::interface::{HardwareIo, SharedIoState};
use crate::hw::{PciAddress, Width};

const PCI_CONFIG_ADDRESS: u16 = 0xcf8;
const PCI_CONFIG_DATA: u16 = 0xcfc;

/// Port, MMIO and PCI-config backend for when the engine runs on the platform
/// it dispatches for.
pub struct X86Io;

/// The canonical backend instance.
pub static X86_IO: X86Io = X86Io;

impl X86Io {
    pub const fn new() -> Self {
        Self
    }

    fn config_address(addr: PciAddress, register: u16) -> u32 {
        (1 << 31)
            | (u32::from(addr.bus) << 16)
            | (u32::from(addr.device) << 11)
            | (u32::from(addr.function) << 8)
            | (u32::from(register) & 0xfc)
    }
}

impl HardwareIo for X86Io {
    fn io_read(&self, port: u16, width: Width) -> u32 {
        // SAFETY: SMM owns the machine while the engine runs; the port is one
        // the platform tables name.
        unsafe {
            match width {
                Width::Byte => u32::from(Port::<u8>::new(port).read()),
                Width::Word => u32::from(Port::<u16>::new(port).read()),
                Width::Dword => Port::<u32>::new(port).read(),
            }
        }
    }

    fn io_write(&self, port: u16, width: Width, value: u32) {
        // SAFETY: as for `io_read`.
        unsafe {
            match width {
                Width::Byte => Port::<u8>::new(port).write(value as u8),
                Width::Word => Port::<u16>::new(port).write(value as u16),
                Width::Dword => Port::<u32>::new(port).write(value),
            }
        }
    }

    fn mem_read(&self, base: u64, buf: &mut [u8]) {
        debug_assert!(buf.len() <= 8);
        for (i, b) in buf.iter_mut().enumerate() {
            // SAFETY: byte-granular volatile access; the address comes from
            // the platform tables and carries no alignment assumption.
            *b = unsafe { core::ptr::read_volatile((base as usize + i) as *const u8) };
        }
    }

    fn mem_write(&self, base: u64, buf: &[u8]) {
        debug_assert!(buf.len() <= 8);
        for (i, b) in buf.iter().enumerate() {
            // SAFETY: as for `mem_read`.
            unsafe { core::ptr::write_volatile((base as usize + i) as *mut u8, *b) };
        }
    }

    fn pci_read(&self, addr: PciAddress, register: u16, width: Width) -> u32 {
        self.io_write(
            PCI_CONFIG_ADDRESS,
            Width::Dword,
            Self::config_address(addr, register),
        );
        self.io_read(PCI_CONFIG_DATA + (register & 3), width)
    }

    fn pci_write(&self, addr: PciAddress, register: u16, width: Width, value: u32) {
        self.io_write(
            PCI_CONFIG_ADDRESS,
            Width::Dword,
            Self::config_address(addr, register),
        );
        self.io_write(PCI_CONFIG_DATA + (register & 3), width, value);
    }

    fn save_shared(&self) -> SharedIoState {
        // The config address port is the one piece of indirect-addressing
        // state the interrupted foreground code may be mid-way through using.
        SharedIoState(u64::from(self.io_read(PCI_CONFIG_ADDRESS, Width::Dword)))
    }

    fn restore_shared(&self, state: SharedIoState) {
        self.io_write(PCI_CONFIG_ADDRESS, Width::Dword, state.0 as u32);
    }

    fn flush_cache(&self) {
        // SAFETY: `wbinvd` is unconditionally valid at SMM privilege.
        unsafe {
            core::arch::asm!("wbinvd", options(nostack, preserves_flags));
        }
    }
}
