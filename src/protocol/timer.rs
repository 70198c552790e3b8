// SPDX-License-Identifier: MIT
//! Periodic-timer family.
//!
//! One physical timer serves every timer child. The armed rate is always the
//! smallest interval any child asked for; children with longer periods
//! accumulate elapsed time across ticks and fire only once their own period
//! is reached.

use super::{DispatchData, FamilyOps, RegisterContext};
use crate::bsp::PlatformDesc;
use crate::dispatch::{Record, SmiDispatcher, SourceClearer};
use crate::error::{Error, Result};
use crate::hw::bit;
use crate::hw::interface::HardwareIo;
use crate::hw::source::{self, SourceDesc};
use crate::sync::interface::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerContext {
    /// Requested callback period in microseconds.
    pub period_us: u64,
    /// Explicit hardware tick interval. 0 lets the engine pick the nearest
    /// supported interval at or above the period.
    pub tick_interval_us: u64,
}

/// Resolve the tick interval: an explicit request must match the platform
/// table exactly; otherwise the nearest supported interval at or above the
/// period is chosen.
pub(crate) fn validate(plat: &PlatformDesc, ctx: &TimerContext) -> Result<TimerContext> {
    if ctx.period_us == 0 {
        return Err(Error::InvalidParameter);
    }
    let table = plat.timer.intervals;
    let tick = if ctx.tick_interval_us != 0 {
        if !table.iter().any(|t| t.interval_us == ctx.tick_interval_us) {
            return Err(Error::InvalidParameter);
        }
        ctx.tick_interval_us
    } else {
        // Longest first, so the last qualifying entry is the nearest one.
        table
            .iter()
            .filter(|t| t.interval_us >= ctx.period_us)
            .last()
            .map(|t| t.interval_us)
            .ok_or(Error::InvalidParameter)?
    };
    Ok(TimerContext {
        period_us: ctx.period_us,
        tick_interval_us: tick,
    })
}

/// Walk the supported intervals longest-first. `None` starts the walk; past
/// the shortest interval the walk ends.
pub fn next_shorter_interval(plat: &PlatformDesc, prev: Option<u64>) -> Option<u64> {
    let table = plat.timer.intervals;
    match prev {
        None => table.first().map(|t| t.interval_us),
        Some(p) => {
            let idx = table.iter().position(|t| t.interval_us == p)?;
            table.get(idx + 1).map(|t| t.interval_us)
        }
    }
}

/// The interval currently armed, read back from the rate-select field.
fn armed_interval(hw: &dyn HardwareIo, plat: &PlatformDesc) -> Option<u64> {
    let select = bit::read_field(hw, plat, &plat.timer.control);
    plat.timer
        .intervals
        .iter()
        .find(|t| t.select == select)
        .map(|t| t.interval_us)
}

fn record_tick(rec: &Record) -> Option<u64> {
    match rec.context {
        RegisterContext::PeriodicTimer(ctx) => Some(ctx.tick_interval_us),
        _ => None,
    }
}

/// Re-arm the shared timer from the aggregate of all registered children:
/// the fastest child wins, and with none left the timer is disarmed
/// entirely. Pending status is dropped either way so a stale tick cannot
/// fire at the new rate.
pub(crate) fn reprogram(engine: &SmiDispatcher) {
    let hw = engine.hw();
    let plat = engine.plat();
    let fastest = engine.db().lock(|db| db.iter().filter_map(record_tick).min());
    match fastest {
        Some(tick) => {
            if let Some(entry) = plat.timer.intervals.iter().find(|t| t.interval_us == tick) {
                bit::write_field(hw, plat, &plat.timer.control, entry.select);
            }
        }
        None => {
            source::disable(hw, plat, &plat.timer.source);
        }
    }
    source::clear(hw, plat, &plat.timer.source);
}

pub(crate) struct TimerOps;

impl FamilyOps for TimerOps {
    /// The snapshot carries the armed interval: the time one pending tick
    /// represents.
    fn snapshot(&self, hw: &dyn HardwareIo, plat: &PlatformDesc) -> Option<DispatchData> {
        armed_interval(hw, plat).map(|armed| DispatchData::Timer { elapsed_us: armed })
    }

    fn eligible(&self, rec: &Record, snap: &DispatchData) -> bool {
        match (rec.context, snap) {
            (RegisterContext::PeriodicTimer(ctx), DispatchData::Timer { elapsed_us: armed }) => {
                rec.elapsed_us + armed >= ctx.period_us
            }
            _ => false,
        }
    }

    fn payload(&self, rec: &Record, snap: &DispatchData) -> DispatchData {
        match snap {
            DispatchData::Timer { elapsed_us: armed } => DispatchData::Timer {
                elapsed_us: rec.elapsed_us + armed,
            },
            _ => *snap,
        }
    }
}

/// Clear-source override installed on every timer record. Clearing the
/// shared source is where per-child elapsed accounting and re-arming happen.
pub(crate) struct TimerClearer;

pub(crate) static TIMER_CLEARER: TimerClearer = TimerClearer;

impl SourceClearer for TimerClearer {
    fn clear_source(&self, engine: &SmiDispatcher, src: &SourceDesc) {
        let hw = engine.hw();
        let plat = engine.plat();
        // Registration also routes through here to honor the override; only
        // a pending tick advances the accounting.
        let ticked = bit::read_bit(hw, plat, &src.sts);
        if ticked {
            if let Some(armed) = armed_interval(hw, plat) {
                engine.db().lock(|db| {
                    for rec in db.iter_mut() {
                        if let RegisterContext::PeriodicTimer(ctx) = rec.context {
                            rec.elapsed_us += armed;
                            if rec.elapsed_us >= ctx.period_us {
                                rec.elapsed_us = 0;
                            }
                        }
                    }
                });
            }
        }
        reprogram(engine);
    }
}
