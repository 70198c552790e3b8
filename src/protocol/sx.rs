// SPDX-License-Identifier: MIT
//! Sleep-state family: children fire on entry to a sleep level.

use super::{DispatchData, FamilyOps, RegisterContext};
use crate::bsp::PlatformDesc;
use crate::dispatch::Record;
use crate::error::{Error, Result};
use crate::hw::bit;
use crate::hw::interface::HardwareIo;
use crate::hw::source::{self, SourceDesc};

/// ACPI sleep level. Indexes the platform's sleep-type code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepKind {
    S0,
    S1,
    S2,
    S3,
    S4,
    S5,
}

/// Callback phase relative to the transition. Only entry is dispatchable;
/// the exit phase is reserved by the interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SxPhase {
    Entry,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SxContext {
    pub kind: SleepKind,
    pub phase: SxPhase,
}

pub(crate) fn validate(plat: &PlatformDesc, ctx: &SxContext) -> Result<SourceDesc> {
    if ctx.phase != SxPhase::Entry {
        return Err(Error::InvalidParameter);
    }
    if plat.sleep.typ_codes[ctx.kind as usize].is_none() {
        return Err(Error::Unsupported);
    }
    Ok(plat.sleep.source)
}

const KINDS: [SleepKind; 6] = [
    SleepKind::S0,
    SleepKind::S1,
    SleepKind::S2,
    SleepKind::S3,
    SleepKind::S4,
    SleepKind::S5,
];

fn kind_for_code(plat: &PlatformDesc, code: u32) -> Option<SleepKind> {
    KINDS
        .iter()
        .copied()
        .find(|k| plat.sleep.typ_codes[*k as usize] == Some(code))
}

pub(crate) struct SxOps;

impl FamilyOps for SxOps {
    fn snapshot(&self, hw: &dyn HardwareIo, plat: &PlatformDesc) -> Option<DispatchData> {
        let code = bit::read_field(hw, plat, &plat.sleep.typ);
        let kind = kind_for_code(plat, code)?;
        Some(DispatchData::Sx {
            kind,
            phase: SxPhase::Entry,
        })
    }

    fn eligible(&self, rec: &Record, snap: &DispatchData) -> bool {
        match (rec.context, snap) {
            (RegisterContext::Sx(ctx), DispatchData::Sx { kind, phase }) => {
                ctx.kind == *kind && ctx.phase == *phase
            }
            _ => false,
        }
    }

    fn payload(&self, _rec: &Record, snap: &DispatchData) -> DispatchData {
        *snap
    }
}

/// Drive the platform into `kind`. Control returns only for S1-class levels
/// or an aborted entry.
pub(crate) fn go_to_sleep(
    hw: &dyn HardwareIo,
    plat: &PlatformDesc,
    kind: SleepKind,
    os_present: bool,
) {
    let code = match plat.sleep.typ_codes[kind as usize] {
        Some(code) => code,
        None => return,
    };
    hw.flush_cache();
    // Quiesce the sleep source so the trigger write cannot re-enter us.
    source::disable(hw, plat, &plat.sleep.source);
    source::clear(hw, plat, &plat.sleep.source);
    bit::write_field(hw, plat, &plat.sleep.typ, code);
    bit::write_bit(hw, plat, &plat.sleep.slp_en, true);
    // Execution resumes here after an S1-class wake or an aborted entry.
    // Leave the type field consistent for whoever reads it next; a powered-
    // off machine with no OS has no next reader.
    if !(matches!(kind, SleepKind::S5) && !os_present) {
        bit::write_field(hw, plat, &plat.sleep.typ, plat.sleep.wake_typ);
    }
    source::enable(hw, plat, &plat.sleep.source);
}
