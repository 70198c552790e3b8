// SPDX-License-Identifier: MIT
//! Board support: the chipset data tables the engine dispatches from.
//!
//! Everything the engine knows about a specific chipset lives in a
//! [`PlatformDesc`] — which registers carry which enable/status bits, how the
//! sleep and periodic-timer machinery is wired, and which sources exist at
//! all. The engine contains no chipset constants of its own.

pub mod q35;

use crate::hw::bit::{BitDesc, FieldDesc};
use crate::hw::source::SourceDesc;

/// One supported periodic-timer rate.
#[derive(Debug, Clone, Copy)]
pub struct TimerInterval {
    /// Tick interval in microseconds.
    pub interval_us: u64,
    /// Rate-select code programmed into the timer control field.
    pub select: u32,
}

/// The shared periodic-SMI timer hardware.
pub struct TimerHw {
    pub source: SourceDesc,
    /// Rate-select field.
    pub control: FieldDesc,
    /// Supported intervals, longest first.
    pub intervals: &'static [TimerInterval],
}

/// The sleep-state machinery.
pub struct SleepHw {
    pub source: SourceDesc,
    /// Sleep-type field in the PM control register.
    pub typ: FieldDesc,
    /// Trigger bit; writing it starts the transition.
    pub slp_en: BitDesc,
    /// Sleep-type code per level, indexed by `SleepKind`. `None` marks levels
    /// this chipset cannot enter.
    pub typ_codes: [Option<u32>; 6],
    /// Sleep-type code written back once execution resumes, so the field is
    /// consistent after a wake.
    pub wake_typ: u32,
}

/// Static description of one chipset.
pub struct PlatformDesc {
    /// ACPI power-management I/O block base.
    pub pm_base: u16,
    /// General-purpose-event I/O block base.
    pub gpe_base: u16,
    /// Set once the OS owns ACPI; SCI-dependent sources defer to it.
    pub sci_en: BitDesc,
    /// End-of-SMI latch. The chipset refuses the latch while SMIs are still
    /// pending.
    pub eos: BitDesc,
    /// "SMI pin still asserted" indicator, acknowledged on every dispatch
    /// exit.
    pub pin_assert: BitDesc,
    /// Port carrying the software SMI value.
    pub swi_port: u16,
    pub sw_source: SourceDesc,
    pub sleep: SleepHw,
    pub timer: TimerHw,
    /// Per-pin GPI sources.
    pub gpi_sources: &'static [SourceDesc],
    /// Chipset-event sources, indexed by `ChipsetEvent`. Unwired slots hold
    /// the null source.
    pub chipset_sources: &'static [SourceDesc],
}
