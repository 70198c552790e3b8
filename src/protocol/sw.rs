// SPDX-License-Identifier: MIT
//! Software SMI family: children fire on the value found in the APM command
//! port.

use super::{DispatchData, FamilyOps, ProtocolKind, RegisterContext};
use crate::bsp::PlatformDesc;
use crate::dispatch::{Database, Record};
use crate::error::{Error, Result};
use crate::hw::interface::HardwareIo;
use crate::hw::Width;

/// Register with this value to have the engine pick the lowest free one.
pub const SW_AUTO_ASSIGN: u64 = u64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwContext {
    pub swi_num: u64,
}

fn in_use(db: &Database, swi_num: u64) -> bool {
    db.iter()
        .any(|r| matches!(r.context, RegisterContext::Sw(c) if c.swi_num == swi_num))
}

/// Validate and normalize the requested value: auto-assignment resolves to
/// the lowest unused value, explicit requests are checked for range and
/// duplicates.
pub(crate) fn validate(db: &Database, ctx: &SwContext) -> Result<SwContext> {
    let max = ProtocolKind::Sw.registry().max_swi_num;
    if ctx.swi_num == SW_AUTO_ASSIGN {
        for candidate in 1..=max {
            if !in_use(db, candidate) {
                return Ok(SwContext {
                    swi_num: candidate,
                });
            }
        }
        return Err(Error::OutOfResources);
    }
    if ctx.swi_num == 0 || ctx.swi_num > max || in_use(db, ctx.swi_num) {
        return Err(Error::InvalidParameter);
    }
    Ok(*ctx)
}

pub(crate) struct SwOps;

impl FamilyOps for SwOps {
    fn snapshot(&self, hw: &dyn HardwareIo, plat: &PlatformDesc) -> Option<DispatchData> {
        Some(DispatchData::Sw {
            swi_num: u64::from(hw.io_read(plat.swi_port, Width::Byte)),
        })
    }

    fn eligible(&self, rec: &Record, snap: &DispatchData) -> bool {
        match (rec.context, snap) {
            (RegisterContext::Sw(ctx), DispatchData::Sw { swi_num }) => ctx.swi_num == *swi_num,
            _ => false,
        }
    }

    fn payload(&self, _rec: &Record, snap: &DispatchData) -> DispatchData {
        *snap
    }
}
