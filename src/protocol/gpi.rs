// SPDX-License-Identifier: MIT
//! GPI family: children fire on a general-purpose input pin's SMI.
//!
//! Every pin has its own source descriptor, so the source bits alone decide
//! dispatch; the family needs no context functions.

use crate::bsp::PlatformDesc;
use crate::error::{Error, Result};
use crate::hw::source::SourceDesc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpiContext {
    pub pin: usize,
}

pub(crate) fn validate(plat: &PlatformDesc, ctx: &GpiContext) -> Result<SourceDesc> {
    let src = plat
        .gpi_sources
        .get(ctx.pin)
        .ok_or(Error::InvalidParameter)?;
    if src.is_null() {
        return Err(Error::Unsupported);
    }
    Ok(*src)
}
