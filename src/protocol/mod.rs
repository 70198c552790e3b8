// SPDX-License-Identifier: MIT
//! Protocol families: the child-facing registration interfaces.
//!
//! Each family validates its own registration context, derives the source
//! descriptor the child binds to, and — for the families where the source
//! bits alone are not enough — supplies the context functions that decide
//! which of the source's children actually fire.

pub mod gpi;
pub mod ichn;
pub mod sw;
pub mod sx;
pub mod timer;

pub use gpi::GpiContext;
pub use ichn::{ChipsetContext, ChipsetEvent};
pub use sw::{SwContext, SW_AUTO_ASSIGN};
pub use sx::{SleepKind, SxContext, SxPhase};
pub use timer::TimerContext;

use crate::bsp::PlatformDesc;
use crate::dispatch::Record;
use crate::hw::interface::HardwareIo;

/// Identifies one child-facing interface kind. Discriminants index
/// [`PROTOCOLS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolKind {
    Sx,
    Sw,
    Gpi,
    Chipset,
    PeriodicTimer,
}

/// Identity a family is published under to the surrounding firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    pub const fn new(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self {
            data1,
            data2,
            data3,
            data4,
        }
    }
}

/// One registry entry: publication identity plus the hardware capability
/// bound registration arguments are validated against.
pub struct ProtocolDesc {
    pub kind: ProtocolKind,
    pub guid: Guid,
    /// Highest legal software SMI value; 0 for families without one.
    pub max_swi_num: u64,
}

/// The supported families. Order matches `ProtocolKind`.
pub static PROTOCOLS: [ProtocolDesc; 5] = [
    ProtocolDesc {
        kind: ProtocolKind::Sx,
        guid: Guid::new(
            0x456d2859,
            0xa84b,
            0x4e47,
            [0xa2, 0xee, 0x32, 0x76, 0xd8, 0x86, 0x99, 0x7d],
        ),
        max_swi_num: 0,
    },
    ProtocolDesc {
        kind: ProtocolKind::Sw,
        guid: Guid::new(
            0x18a3c6dc,
            0x5eea,
            0x48c8,
            [0xa1, 0xc1, 0xb5, 0x33, 0x89, 0xf9, 0x89, 0x99],
        ),
        max_swi_num: 0xff,
    },
    ProtocolDesc {
        kind: ProtocolKind::Gpi,
        guid: Guid::new(
            0x25566b03,
            0xb577,
            0x4cbf,
            [0x95, 0x8c, 0xed, 0x66, 0x3e, 0xa2, 0x43, 0x80],
        ),
        max_swi_num: 0,
    },
    ProtocolDesc {
        kind: ProtocolKind::Chipset,
        guid: Guid::new(
            0xc50b323e,
            0x9075,
            0x4f2a,
            [0xac, 0x8e, 0xd2, 0x59, 0x6a, 0x10, 0x85, 0xcc],
        ),
        max_swi_num: 0,
    },
    ProtocolDesc {
        kind: ProtocolKind::PeriodicTimer,
        guid: Guid::new(
            0x4cec368e,
            0x8e8e,
            0x4d71,
            [0x8b, 0xe1, 0x95, 0x8c, 0x45, 0xfc, 0x8a, 0x53],
        ),
        max_swi_num: 0,
    },
];

impl ProtocolKind {
    pub fn registry(self) -> &'static ProtocolDesc {
        &PROTOCOLS[self as usize]
    }
}

/// Family-specific registration payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterContext {
    Sx(SxContext),
    Sw(SwContext),
    Gpi(GpiContext),
    Chipset(ChipsetContext),
    PeriodicTimer(TimerContext),
}

impl RegisterContext {
    pub fn kind(&self) -> ProtocolKind {
        match self {
            Self::Sx(_) => ProtocolKind::Sx,
            Self::Sw(_) => ProtocolKind::Sw,
            Self::Gpi(_) => ProtocolKind::Gpi,
            Self::Chipset(_) => ProtocolKind::Chipset,
            Self::PeriodicTimer(_) => ProtocolKind::PeriodicTimer,
        }
    }
}

/// Hardware context snapshot handed to an eligible callback. Families
/// without context functions pass none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchData {
    Sx { kind: SleepKind, phase: SxPhase },
    Sw { swi_num: u64 },
    Timer { elapsed_us: u64 },
}

/// Context functions for families that qualify dispatch beyond the source
/// bits themselves.
pub(crate) trait FamilyOps: Sync {
    /// Snapshot the live hardware context for this family. `None` means the
    /// hardware reports a context the platform tables cannot name; nothing
    /// dispatches on it.
    fn snapshot(&self, hw: &dyn HardwareIo, plat: &PlatformDesc) -> Option<DispatchData>;

    /// Whether `rec`'s child should fire for this snapshot.
    fn eligible(&self, rec: &Record, snap: &DispatchData) -> bool;

    /// Materialize the callback payload for `rec`.
    fn payload(&self, rec: &Record, snap: &DispatchData) -> DispatchData;
}

/// Families without context functions dispatch every child on the source
/// unconditionally.
pub(crate) fn family_ops(kind: ProtocolKind) -> Option<&'static dyn FamilyOps> {
    match kind {
        ProtocolKind::Sx => Some(&sx::SxOps),
        ProtocolKind::Sw => Some(&sw::SwOps),
        ProtocolKind::PeriodicTimer => Some(&timer::TimerOps),
        ProtocolKind::Gpi | ProtocolKind::Chipset => None,
    }
}
