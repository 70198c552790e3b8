// SPDX-License-Identifier: MIT
//! The dispatch engine: registration, the record database, and the drain
//! loop invoked on every SMI.

mod record;

pub use record::DispatchHandle;
pub(crate) use record::{Database, Record};

use core::marker::PhantomData;

use crate::bsp::PlatformDesc;
use crate::hw::bit;
use crate::hw::interface::HardwareIo;
use crate::hw::source::{self, SourceDesc};
use crate::protocol::{self, family_ops, DispatchData, ProtocolKind, RegisterContext, SleepKind};
use crate::sync::interface::{Mutex, ReadWriteEx};
use crate::sync::{InitStateLock, NullLock};
use crate::{info, warn, Result};

/// Upper bound on drain passes per activation. Sources that fail to quiesce
/// within this many passes indicate broken hardware or a broken bit table;
/// the loop must still hand the machine back.
const ESCAPE_CEILING: usize = 32;

/// One registered child's callback.
pub trait SmiHandler {
    /// Invoked once per activation of the child's source. `data` carries the
    /// family's hardware context snapshot for the families that have one.
    ///
    /// Re-entering [`SmiDispatcher::register`] and
    /// [`SmiDispatcher::unregister`] from here is legal, including for the
    /// record currently being dispatched. Re-entering
    /// [`SmiDispatcher::dispatch`] is not.
    fn handle(&self, engine: &SmiDispatcher, handle: DispatchHandle, data: Option<&DispatchData>);
}

/// Family-supplied replacement for the default source acknowledge.
pub(crate) trait SourceClearer: Sync {
    fn clear_source(&self, engine: &SmiDispatcher, src: &SourceDesc);
}

/// Zero-sized proof that the caller is executing in SMM context.
///
/// Concept derived from the `CriticalSection` introduced in
/// <https://github.com/rust-embedded/bare-metal>.
pub struct SmiToken<'smm> {
    _0: PhantomData<&'smm ()>,
}

impl<'smm> SmiToken<'smm> {
    /// # Safety
    ///
    /// - Only create this from the platform's SMI entry vector.
    /// - The lifetime is unconstrained. User code must not be able to
    ///   influence it, otherwise it might become inferred to `'static`.
    #[inline(always)]
    pub unsafe fn new() -> Self {
        Self { _0: PhantomData }
    }
}

/// Outcome of one dispatch invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// At least one child was dispatched.
    Handled,
    /// A source was found and cleared, but no registered child was eligible
    /// for it.
    Quiesced,
    /// Nothing was pending.
    Idle,
    /// Sources were still asserting when the escape ceiling was reached. The
    /// surrounding firmware owns the recovery policy.
    Stuck,
}

pub struct SmiDispatcher {
    hw: &'static (dyn HardwareIo + Sync),
    plat: &'static PlatformDesc,
    db: NullLock<Database>,
}

impl SmiDispatcher {
    pub const fn new(hw: &'static (dyn HardwareIo + Sync), plat: &'static PlatformDesc) -> Self {
        Self {
            hw,
            plat,
            db: NullLock::new(Database::new()),
        }
    }

    pub(crate) fn hw(&self) -> &'static (dyn HardwareIo + Sync) {
        self.hw
    }

    pub(crate) fn plat(&self) -> &'static PlatformDesc {
        self.plat
    }

    pub(crate) fn db(&self) -> &NullLock<Database> {
        &self.db
    }

    /// Register `handler` for the source selected by `context`.
    ///
    /// The context is validated against the family's rules and capability
    /// bounds; on success the source is acknowledged and armed, and the
    /// returned handle tears the registration down again. A failed
    /// registration leaves no trace.
    pub fn register(
        &self,
        handler: &'static (dyn SmiHandler + Sync),
        context: RegisterContext,
    ) -> Result<DispatchHandle> {
        let kind = context.kind();

        // Family validation and source derivation. The software family hands
        // back a normalized context when it auto-assigns a value.
        let (src, context, clear_override): (
            SourceDesc,
            RegisterContext,
            Option<&'static (dyn SourceClearer + Sync)>,
        ) = match context {
            RegisterContext::Sx(ctx) => (
                protocol::sx::validate(self.plat, &ctx)?,
                RegisterContext::Sx(ctx),
                None,
            ),
            RegisterContext::Sw(ctx) => {
                let ctx = self.db.lock(|db| protocol::sw::validate(db, &ctx))?;
                (self.plat.sw_source, RegisterContext::Sw(ctx), None)
            }
            RegisterContext::Gpi(ctx) => (
                protocol::gpi::validate(self.plat, &ctx)?,
                RegisterContext::Gpi(ctx),
                None,
            ),
            RegisterContext::Chipset(ctx) => (
                protocol::ichn::validate(self.plat, &ctx)?,
                RegisterContext::Chipset(ctx),
                None,
            ),
            RegisterContext::PeriodicTimer(ctx) => {
                let ctx = protocol::timer::validate(self.plat, &ctx)?;
                (
                    self.plat.timer.source,
                    RegisterContext::PeriodicTimer(ctx),
                    Some(&protocol::timer::TIMER_CLEARER),
                )
            }
        };

        let record = Record {
            source: src,
            handler,
            context,
            kind,
            clear_override,
            processed: false,
            elapsed_us: 0,
        };
        let handle = self.db.lock(|db| db.insert(record))?;

        // Arm the hardware only now that the record is fully linked; a failed
        // registration must never be visible to the dispatch loop.
        match clear_override {
            Some(c) => c.clear_source(self, &src),
            None => source::clear(self.hw, self.plat, &src),
        }
        source::enable(self.hw, self.plat, &src);

        info!("registered {:?} child", kind);
        Ok(handle)
    }

    /// Tear a registration down. The hardware source is disabled only when
    /// no other record still shares it.
    pub fn unregister(&self, handle: DispatchHandle) -> Result<()> {
        let removed = self.db.lock(|db| db.remove(handle))?;

        let still_needed = self
            .db
            .lock(|db| db.iter().any(|r| r.source.is_same(&removed.source)));
        if !still_needed {
            source::disable(self.hw, self.plat, &removed.source);
        }
        if removed.kind == ProtocolKind::PeriodicTimer {
            protocol::timer::reprogram(self);
        }

        info!("unregistered {:?} child", removed.kind);
        Ok(())
    }

    /// The family-specific interval query: walk the platform's supported
    /// periodic-timer intervals, longest first.
    pub fn next_shorter_interval(&self, prev: Option<u64>) -> Option<u64> {
        protocol::timer::next_shorter_interval(self.plat, prev)
    }

    fn os_present(&self) -> bool {
        bit::read_bit(self.hw, self.plat, &self.plat.sci_en)
    }

    /// Try to latch end-of-SMI. The chipset drops the latch while any SMI is
    /// still pending, so the write is read back.
    fn set_eos(&self) -> bool {
        let eos = &self.plat.eos;
        if eos.is_null() {
            return true;
        }
        bit::write_bit(self.hw, self.plat, eos, true);
        bit::read_bit(self.hw, self.plat, eos)
    }

    /// Find, mark, and return the next unprocessed record on `src` that is
    /// eligible to fire. Ineligible records are consumed (marked processed)
    /// without being returned, so one activation visits each record at most
    /// once no matter how often the scan restarts.
    #[allow(clippy::type_complexity)]
    fn next_candidate(
        &self,
        src: &SourceDesc,
    ) -> Option<(
        DispatchHandle,
        &'static (dyn SmiHandler + Sync),
        Option<DispatchData>,
    )> {
        let hw = self.hw;
        let plat = self.plat;
        self.db.lock(|db| {
            for (handle, rec) in db.entries_mut() {
                if rec.processed || !rec.source.is_same(src) {
                    continue;
                }
                rec.processed = true;
                match family_ops(rec.kind) {
                    None => return Some((handle, rec.handler, None)),
                    Some(ops) => {
                        let snap = match ops.snapshot(hw, plat) {
                            Some(snap) => snap,
                            None => continue,
                        };
                        if ops.eligible(rec, &snap) {
                            let data = ops.payload(rec, &snap);
                            return Some((handle, rec.handler, Some(data)));
                        }
                    }
                }
            }
            None
        })
    }

    /// Drain every pending SMI source, dispatching each eligible child
    /// exactly once per activation of its source.
    ///
    /// The loop runs until the chipset accepts the end-of-SMI latch or the
    /// escape ceiling is reached. The foreground indirect-addressing state is
    /// restored on every exit path, and the "SMI pin asserted" indicator is
    /// acknowledged last so a handled SMI cannot immediately re-enter.
    pub fn dispatch(&self, _token: &SmiToken) -> DispatchOutcome {
        self.db.lock(|db| db.clear_processed());

        let saved = self.hw.save_shared();
        let mut dispatched = false;
        let mut cleared = false;
        let mut quiesced = false;
        // A sleep request from any matched child is equivalent; remember it
        // across passes and act once the sources are drained.
        let mut sleep_fired: Option<SleepKind> = None;

        for _pass in 0..ESCAPE_CEILING {
            let os_present = self.os_present();
            let active = self.db.lock(|db| {
                db.iter()
                    .find(|r| source::is_active(self.hw, self.plat, &r.source, os_present))
                    .map(|r| r.source)
            });

            let src = match active {
                Some(src) => src,
                None => {
                    if self.set_eos() {
                        quiesced = true;
                        break;
                    }
                    continue;
                }
            };

            // Dispatch every unprocessed record on this source. The scan
            // restarts from the head after every callback, since a callback
            // may register or unregister records, including its own.
            loop {
                let (handle, handler, data) = match self.next_candidate(&src) {
                    Some(next) => next,
                    None => break,
                };
                if let Some(DispatchData::Sx { kind, .. }) = data {
                    sleep_fired = Some(kind);
                }
                handler.handle(self, handle, data.as_ref());
                dispatched = true;
            }

            // Acknowledge the source, through a child's override when one is
            // registered on it.
            let clearer = self.db.lock(|db| {
                db.iter()
                    .filter(|r| r.source.is_same(&src))
                    .find_map(|r| r.clear_override)
            });
            match clearer {
                Some(c) => c.clear_source(self, &src),
                None => source::clear(self.hw, self.plat, &src),
            }
            cleared = true;
        }

        if !quiesced {
            // The static bit tables promise sources quiesce. Hand the machine
            // back anyway; looping forever in SMM is the one unacceptable
            // outcome.
            warn!(
                "SMI sources still asserted after {} passes, forcing EOS",
                ESCAPE_CEILING
            );
            self.set_eos();
        }

        self.hw.restore_shared(saved);

        if let Some(kind) = sleep_fired {
            protocol::sx::go_to_sleep(self.hw, self.plat, kind, self.os_present());
        }

        bit::write_bit(self.hw, self.plat, &self.plat.pin_assert, true);

        if !quiesced {
            DispatchOutcome::Stuck
        } else if dispatched {
            DispatchOutcome::Handled
        } else if cleared {
            DispatchOutcome::Quiesced
        } else {
            DispatchOutcome::Idle
        }
    }
}

static CUR_DISPATCHER: InitStateLock<Option<&'static SmiDispatcher>> = InitStateLock::new(None);

/// Install the engine the platform SMI vector invokes.
pub fn register_dispatcher(engine: &'static SmiDispatcher) {
    CUR_DISPATCHER.write(|cur| *cur = Some(engine));
}

/// The installed engine.
pub fn dispatcher() -> &'static SmiDispatcher {
    CUR_DISPATCHER.read(|cur| match cur {
        Some(engine) => *engine,
        None => panic!("SMI dispatcher not registered yet!"),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    use super::*;
    use crate::bsp::q35::PLATFORM;
    use crate::hw::mock::MockIo;
    use crate::hw::{PciAddress, Width};
    use crate::protocol::{
        ChipsetContext, ChipsetEvent, GpiContext, SwContext, SxContext, SxPhase, TimerContext,
        SW_AUTO_ASSIGN,
    };
    use crate::Error;

    const PM: u16 = 0x600;
    const PM1_STS: u16 = PM;
    const PM1_CNT: u16 = PM + 0x04;
    const SMI_EN: u16 = PM + 0x30;
    const SMI_STS: u16 = PM + 0x34;
    const GPE0_STS: u16 = 0x628;
    const GPE0_EN: u16 = 0x62c;
    const APM_CNT: u16 = 0xb2;
    const LPC: PciAddress = PciAddress::new(0, 31, 0);

    /// A mock wired with the chipset's write-one-to-clear status registers.
    fn fresh_hw() -> &'static MockIo {
        let hw = Box::leak(Box::new(MockIo::new()));
        for i in 0..4 {
            hw.mark_io_w1c(SMI_STS + i, 0xff);
            hw.mark_io_w1c(GPE0_STS + i, 0xff);
        }
        for i in 0..2 {
            hw.mark_io_w1c(PM1_STS + i, 0xff);
        }
        hw
    }

    fn engine(hw: &'static MockIo) -> &'static SmiDispatcher {
        Box::leak(Box::new(SmiDispatcher::new(hw, &PLATFORM)))
    }

    fn token() -> SmiToken<'static> {
        unsafe { SmiToken::new() }
    }

    #[derive(Default)]
    struct Counter {
        calls: AtomicUsize,
        last_swi: AtomicU64,
        last_elapsed: AtomicU64,
    }

    impl SmiHandler for Counter {
        fn handle(
            &self,
            _engine: &SmiDispatcher,
            _handle: DispatchHandle,
            data: Option<&DispatchData>,
        ) {
            self.calls.fetch_add(1, Ordering::Relaxed);
            match data {
                Some(DispatchData::Sw { swi_num }) => {
                    self.last_swi.store(*swi_num, Ordering::Relaxed);
                }
                Some(DispatchData::Timer { elapsed_us }) => {
                    self.last_elapsed.store(*elapsed_us, Ordering::Relaxed);
                }
                _ => {}
            }
        }
    }

    fn counter() -> &'static Counter {
        Box::leak(Box::new(Counter::default()))
    }

    fn calls(c: &Counter) -> usize {
        c.calls.load(Ordering::Relaxed)
    }

    /// Unregisters the stashed victim, or itself when none is stashed.
    struct Remover {
        calls: AtomicUsize,
        victim: NullLock<Option<DispatchHandle>>,
    }

    impl Remover {
        fn new() -> &'static Self {
            Box::leak(Box::new(Self {
                calls: AtomicUsize::new(0),
                victim: NullLock::new(None),
            }))
        }
    }

    impl SmiHandler for Remover {
        fn handle(
            &self,
            engine: &SmiDispatcher,
            handle: DispatchHandle,
            _data: Option<&DispatchData>,
        ) {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let target = self.victim.lock(|v| v.take()).unwrap_or(handle);
            engine.unregister(target).unwrap();
        }
    }

    /// Registers a fresh GPI child the first time it runs.
    struct Registrar {
        calls: AtomicUsize,
    }

    impl SmiHandler for Registrar {
        fn handle(
            &self,
            engine: &SmiDispatcher,
            _handle: DispatchHandle,
            _data: Option<&DispatchData>,
        ) {
            if self.calls.fetch_add(1, Ordering::Relaxed) == 0 {
                engine
                    .register(counter(), RegisterContext::Gpi(GpiContext { pin: 7 }))
                    .unwrap();
            }
        }
    }

    fn tco() -> RegisterContext {
        RegisterContext::Chipset(ChipsetContext {
            event: ChipsetEvent::TcoTimeout,
        })
    }

    fn raise_tco(hw: &MockIo) {
        let sts = hw.get_io(SMI_STS, Width::Dword);
        hw.set_io(SMI_STS, Width::Dword, sts | (1 << 13));
    }

    fn raise_sw(hw: &MockIo, swi_num: u32) {
        hw.set_io(APM_CNT, Width::Byte, swi_num);
        let sts = hw.get_io(SMI_STS, Width::Dword);
        hw.set_io(SMI_STS, Width::Dword, sts | (1 << 5));
    }

    fn raise_timer(hw: &MockIo) {
        let sts = hw.get_io(SMI_STS, Width::Dword);
        hw.set_io(SMI_STS, Width::Dword, sts | (1 << 14));
    }

    fn timer_select(hw: &MockIo) -> u32 {
        hw.get_pci(LPC, 0xa0, Width::Word) & 0x3
    }

    #[test]
    fn idle_when_nothing_pending() {
        let hw = fresh_hw();
        let e = engine(hw);

        assert_eq!(e.dispatch(&token()), DispatchOutcome::Idle);
        // EOS latched, foreground state restored.
        assert_ne!(hw.get_io(SMI_EN, Width::Dword) & (1 << 1), 0);
        assert_eq!(hw.saves(), 1);
        assert_eq!(hw.restores(), 1);
    }

    #[test]
    fn software_value_lifecycle() {
        let hw = fresh_hw();
        let e = engine(hw);
        let c = counter();

        let h = e
            .register(
                c,
                RegisterContext::Sw(SwContext {
                    swi_num: SW_AUTO_ASSIGN,
                }),
            )
            .unwrap();

        // The lowest value was assigned, so re-requesting it explicitly is a
        // duplicate.
        assert_eq!(
            e.register(c, RegisterContext::Sw(SwContext { swi_num: 1 }))
                .err(),
            Some(Error::InvalidParameter)
        );
        // Registration armed the source.
        assert_ne!(hw.get_io(SMI_EN, Width::Dword) & (1 << 5), 0);

        raise_sw(hw, 1);
        assert_eq!(e.dispatch(&token()), DispatchOutcome::Handled);
        assert_eq!(calls(c), 1);
        assert_eq!(c.last_swi.load(Ordering::Relaxed), 1);

        e.unregister(h).unwrap();
        assert_eq!(hw.get_io(SMI_EN, Width::Dword) & (1 << 5), 0);
    }

    #[test]
    fn software_values_out_of_range_are_rejected() {
        let hw = fresh_hw();
        let e = engine(hw);

        assert_eq!(
            e.register(counter(), RegisterContext::Sw(SwContext { swi_num: 0 }))
                .err(),
            Some(Error::InvalidParameter)
        );
        assert_eq!(
            e.register(counter(), RegisterContext::Sw(SwContext { swi_num: 0x100 }))
                .err(),
            Some(Error::InvalidParameter)
        );
    }

    #[test]
    fn auto_assignment_picks_the_lowest_unused_value() {
        let hw = fresh_hw();
        let e = engine(hw);
        let c1 = counter();
        let c2 = counter();

        e.register(c1, RegisterContext::Sw(SwContext { swi_num: 1 }))
            .unwrap();
        e.register(
            c2,
            RegisterContext::Sw(SwContext {
                swi_num: SW_AUTO_ASSIGN,
            }),
        )
        .unwrap();

        // Only the child registered for value 2 fires.
        raise_sw(hw, 2);
        assert_eq!(e.dispatch(&token()), DispatchOutcome::Handled);
        assert_eq!(calls(c1), 0);
        assert_eq!(calls(c2), 1);
        assert_eq!(c2.last_swi.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn quiesced_when_no_child_is_eligible() {
        let hw = fresh_hw();
        let e = engine(hw);
        let c = counter();

        e.register(c, RegisterContext::Sw(SwContext { swi_num: 5 }))
            .unwrap();

        // The source asserts with a value nobody registered for.
        raise_sw(hw, 7);
        assert_eq!(e.dispatch(&token()), DispatchOutcome::Quiesced);
        assert_eq!(calls(c), 0);
        // The source was still acknowledged.
        assert_eq!(hw.get_io(SMI_STS, Width::Dword) & (1 << 5), 0);
    }

    #[test]
    fn shared_source_dispatches_each_child_exactly_once() {
        let hw = fresh_hw();
        let e = engine(hw);
        let a = counter();
        let b = counter();

        e.register(a, tco()).unwrap();
        e.register(b, tco()).unwrap();

        raise_tco(hw);
        assert_eq!(e.dispatch(&token()), DispatchOutcome::Handled);
        assert_eq!(calls(a), 1);
        assert_eq!(calls(b), 1);

        // A second activation dispatches both again.
        raise_tco(hw);
        assert_eq!(e.dispatch(&token()), DispatchOutcome::Handled);
        assert_eq!(calls(a), 2);
        assert_eq!(calls(b), 2);
    }

    #[test]
    fn registration_from_inside_a_callback_does_not_disturb_the_pass() {
        let hw = fresh_hw();
        let e = engine(hw);
        let a: &'static Registrar = Box::leak(Box::new(Registrar {
            calls: AtomicUsize::new(0),
        }));
        let b = counter();

        e.register(a, tco()).unwrap();
        e.register(b, tco()).unwrap();

        raise_tco(hw);
        assert_eq!(e.dispatch(&token()), DispatchOutcome::Handled);
        // The registrar ran once, its new GPI child did not fire, and the
        // sibling was neither skipped nor double-dispatched.
        assert_eq!(a.calls.load(Ordering::Relaxed), 1);
        assert_eq!(calls(b), 1);
    }

    #[test]
    fn a_callback_may_unregister_itself() {
        let hw = fresh_hw();
        let e = engine(hw);
        let r = Remover::new();
        let b = counter();

        e.register(r, tco()).unwrap();
        e.register(b, tco()).unwrap();

        raise_tco(hw);
        assert_eq!(e.dispatch(&token()), DispatchOutcome::Handled);
        assert_eq!(r.calls.load(Ordering::Relaxed), 1);
        assert_eq!(calls(b), 1);

        // The remover is gone; its sibling keeps the source alive.
        raise_tco(hw);
        assert_eq!(e.dispatch(&token()), DispatchOutcome::Handled);
        assert_eq!(r.calls.load(Ordering::Relaxed), 1);
        assert_eq!(calls(b), 2);
    }

    #[test]
    fn a_callback_may_unregister_a_sibling() {
        let hw = fresh_hw();
        let e = engine(hw);
        let r = Remover::new();
        let b = counter();

        e.register(r, tco()).unwrap();
        let hb = e.register(b, tco()).unwrap();
        r.victim.lock(|v| *v = Some(hb));

        raise_tco(hw);
        assert_eq!(e.dispatch(&token()), DispatchOutcome::Handled);
        // The sibling was unregistered before its turn came.
        assert_eq!(r.calls.load(Ordering::Relaxed), 1);
        assert_eq!(calls(b), 0);
        // The remover itself still needs the source.
        assert_ne!(hw.get_io(SMI_EN, Width::Dword) & (1 << 13), 0);
    }

    #[test]
    fn hardware_is_disabled_on_last_release_only() {
        let hw = fresh_hw();
        let e = engine(hw);

        let ha = e.register(counter(), tco()).unwrap();
        let hb = e.register(counter(), tco()).unwrap();
        assert_ne!(hw.get_io(SMI_EN, Width::Dword) & (1 << 13), 0);

        e.unregister(ha).unwrap();
        assert_ne!(hw.get_io(SMI_EN, Width::Dword) & (1 << 13), 0);

        e.unregister(hb).unwrap();
        assert_eq!(hw.get_io(SMI_EN, Width::Dword) & (1 << 13), 0);
    }

    #[test]
    fn stale_handles_are_rejected() {
        let hw = fresh_hw();
        let e = engine(hw);

        let h = e.register(counter(), tco()).unwrap();
        e.unregister(h).unwrap();
        assert_eq!(e.unregister(h).err(), Some(Error::InvalidParameter));
    }

    #[test]
    fn registration_is_bounded_by_the_database() {
        let hw = fresh_hw();
        let e = engine(hw);
        let c = counter();

        for _ in 0..record::MAX_RECORDS {
            e.register(
                c,
                RegisterContext::Sw(SwContext {
                    swi_num: SW_AUTO_ASSIGN,
                }),
            )
            .unwrap();
        }
        assert_eq!(
            e.register(
                c,
                RegisterContext::Sw(SwContext {
                    swi_num: SW_AUTO_ASSIGN,
                }),
            )
            .err(),
            Some(Error::OutOfResources)
        );
    }

    #[test]
    fn gpi_children_bind_their_own_pin() {
        let hw = fresh_hw();
        let e = engine(hw);
        let c = counter();

        assert_eq!(
            e.register(c, RegisterContext::Gpi(GpiContext { pin: 99 }))
                .err(),
            Some(Error::InvalidParameter)
        );

        e.register(c, RegisterContext::Gpi(GpiContext { pin: 3 }))
            .unwrap();
        assert_ne!(hw.get_io(GPE0_EN, Width::Dword) & (1 << 3), 0);

        hw.set_io(GPE0_STS, Width::Dword, 1 << 3);
        assert_eq!(e.dispatch(&token()), DispatchOutcome::Handled);
        assert_eq!(calls(c), 1);
    }

    #[test]
    fn sci_dependent_sources_defer_to_the_os() {
        let hw = fresh_hw();
        let e = engine(hw);
        let c = counter();

        e.register(
            c,
            RegisterContext::Chipset(ChipsetContext {
                event: ChipsetEvent::PowerButton,
            }),
        )
        .unwrap();

        // OS present: the pending status belongs to the OS, not to us.
        hw.set_io(PM1_CNT, Width::Dword, 1);
        hw.set_io(PM1_STS, Width::Word, 1 << 8);
        assert_eq!(e.dispatch(&token()), DispatchOutcome::Idle);
        assert_eq!(calls(c), 0);

        hw.set_io(PM1_CNT, Width::Dword, 0);
        assert_eq!(e.dispatch(&token()), DispatchOutcome::Handled);
        assert_eq!(calls(c), 1);
    }

    #[test]
    fn sleep_entry_dispatches_matching_children_then_transitions() {
        let hw = fresh_hw();
        let e = engine(hw);
        let s3 = counter();
        let s1 = counter();

        e.register(
            s3,
            RegisterContext::Sx(SxContext {
                kind: SleepKind::S3,
                phase: SxPhase::Entry,
            }),
        )
        .unwrap();
        e.register(
            s1,
            RegisterContext::Sx(SxContext {
                kind: SleepKind::S1,
                phase: SxPhase::Entry,
            }),
        )
        .unwrap();

        // The OS wrote SLP_TYP = S3 and the write trapped into us.
        hw.set_io(PM1_CNT, Width::Dword, 5 << 10);
        let sts = hw.get_io(SMI_STS, Width::Dword);
        hw.set_io(SMI_STS, Width::Dword, sts | (1 << 4));

        assert_eq!(e.dispatch(&token()), DispatchOutcome::Handled);
        assert_eq!(calls(s3), 1);
        assert_eq!(calls(s1), 0);

        // The transition ran: caches flushed, trigger written, type field
        // left consistent for the wake path, source re-armed.
        assert_eq!(hw.cache_flushes(), 1);
        let pm1_cnt = hw.get_io(PM1_CNT, Width::Dword);
        assert_ne!(pm1_cnt & (1 << 13), 0);
        assert_eq!((pm1_cnt >> 10) & 0x7, PLATFORM.sleep.wake_typ);
        assert_ne!(hw.get_io(SMI_EN, Width::Dword) & (1 << 4), 0);
    }

    #[test]
    fn timer_arms_the_fastest_requested_interval() {
        let hw = fresh_hw();
        let e = engine(hw);

        let ha = e
            .register(
                counter(),
                RegisterContext::PeriodicTimer(TimerContext {
                    period_us: 16_000_000,
                    tick_interval_us: 0,
                }),
            )
            .unwrap();
        assert_eq!(timer_select(hw), 2);

        let hb = e
            .register(
                counter(),
                RegisterContext::PeriodicTimer(TimerContext {
                    period_us: 8_000_000,
                    tick_interval_us: 0,
                }),
            )
            .unwrap();
        assert_eq!(timer_select(hw), 3);

        // Removing the faster child restores the slower rate.
        e.unregister(hb).unwrap();
        assert_eq!(timer_select(hw), 2);

        e.unregister(ha).unwrap();
        assert_eq!(hw.get_io(SMI_EN, Width::Dword) & (1 << 14), 0);
    }

    #[test]
    fn timer_children_accumulate_until_their_own_period() {
        let hw = fresh_hw();
        let e = engine(hw);
        let c = counter();

        e.register(
            c,
            RegisterContext::PeriodicTimer(TimerContext {
                period_us: 32_000_000,
                tick_interval_us: 8_000_000,
            }),
        )
        .unwrap();
        assert_eq!(timer_select(hw), 3);

        for tick in 1..=3 {
            raise_timer(hw);
            assert_eq!(e.dispatch(&token()), DispatchOutcome::Quiesced, "tick {}", tick);
            assert_eq!(calls(c), 0);
        }

        raise_timer(hw);
        assert_eq!(e.dispatch(&token()), DispatchOutcome::Handled);
        assert_eq!(calls(c), 1);
        assert_eq!(c.last_elapsed.load(Ordering::Relaxed), 32_000_000);

        // The accounting reset: the next tick starts a fresh period.
        raise_timer(hw);
        assert_eq!(e.dispatch(&token()), DispatchOutcome::Quiesced);
        assert_eq!(calls(c), 1);
    }

    #[test]
    fn timer_children_with_different_periods_share_one_timer() {
        let hw = fresh_hw();
        let e = engine(hw);
        let slow = counter();
        let fast = counter();

        e.register(
            slow,
            RegisterContext::PeriodicTimer(TimerContext {
                period_us: 32_000_000,
                tick_interval_us: 8_000_000,
            }),
        )
        .unwrap();
        e.register(
            fast,
            RegisterContext::PeriodicTimer(TimerContext {
                period_us: 8_000_000,
                tick_interval_us: 0,
            }),
        )
        .unwrap();

        for _ in 0..4 {
            raise_timer(hw);
            e.dispatch(&token());
        }
        assert_eq!(calls(fast), 4);
        assert_eq!(calls(slow), 1);
    }

    #[test]
    fn stuck_status_terminates_at_the_escape_ceiling() {
        let hw = fresh_hw();
        let e = engine(hw);
        let c = counter();

        e.register(c, tco()).unwrap();

        // Bit 13 lives in byte 1 of SMI_STS; hardware refuses to drop it.
        hw.mark_io_stuck(SMI_STS + 1, 0x20);
        raise_tco(hw);

        assert_eq!(e.dispatch(&token()), DispatchOutcome::Stuck);
        // The child still ran exactly once, and the foreground state was
        // restored despite the wedge.
        assert_eq!(calls(c), 1);
        assert_eq!(hw.saves(), 1);
        assert_eq!(hw.restores(), 1);
    }

    #[test]
    fn refused_eos_terminates_at_the_escape_ceiling() {
        let hw = fresh_hw();
        let e = engine(hw);

        hw.refuse_io_latch(SMI_EN, 0x02);
        assert_eq!(e.dispatch(&token()), DispatchOutcome::Stuck);
        assert_eq!(hw.saves(), 1);
        assert_eq!(hw.restores(), 1);

        hw.allow_io_latch(SMI_EN, 0x02);
        assert_eq!(e.dispatch(&token()), DispatchOutcome::Idle);
    }

    #[test]
    fn interval_query_walks_the_platform_table() {
        let hw = fresh_hw();
        let e = engine(hw);

        assert_eq!(e.next_shorter_interval(None), Some(64_000_000));
        assert_eq!(e.next_shorter_interval(Some(8_000_000)), None);
    }

    #[test]
    fn installed_engine_is_reachable() {
        let hw = fresh_hw();
        let e = engine(hw);

        register_dispatcher(e);
        assert!(core::ptr::eq(dispatcher(), e));
    }
}
