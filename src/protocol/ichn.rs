// SPDX-License-Identifier: MIT
//! Chipset-event family: fixed conditions with dedicated SMI wiring.
//!
//! Like GPI, each event has its own source, so dispatch is unconditional.

use crate::bsp::PlatformDesc;
use crate::error::{Error, Result};
use crate::hw::source::SourceDesc;

/// Chipset conditions children can bind to. Indexes the platform's chipset
/// source table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipsetEvent {
    LegacyUsb,
    TcoTimeout,
    PowerButton,
    BiosWriteProtect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipsetContext {
    pub event: ChipsetEvent,
}

pub(crate) fn validate(plat: &PlatformDesc, ctx: &ChipsetContext) -> Result<SourceDesc> {
    let src = plat
        .chipset_sources
        .get(ctx.event as usize)
        .ok_or(Error::InvalidParameter)?;
    if src.is_null() {
        return Err(Error::Unsupported);
    }
    Ok(*src)
}
