// SPDX-License-Identifier: MIT
//! The record database: one slot per registered child, addressed by
//! generation-checked handles.

use crate::error::{Error, Result};
use crate::hw::source::SourceDesc;
use crate::protocol::{ProtocolKind, RegisterContext};

use super::{SmiHandler, SourceClearer};

pub(crate) const MAX_RECORDS: usize = 32;

/// Opaque registration handle: an arena slot plus the generation it was
/// issued for. A stale handle fails the generation check instead of reaching
/// a recycled slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchHandle {
    index: usize,
    generation: u32,
}

/// One registered child.
pub(crate) struct Record {
    pub(crate) source: SourceDesc,
    pub(crate) handler: &'static (dyn SmiHandler + Sync),
    pub(crate) context: RegisterContext,
    pub(crate) kind: ProtocolKind,
    pub(crate) clear_override: Option<&'static (dyn SourceClearer + Sync)>,
    /// Already visited during the current activation.
    pub(crate) processed: bool,
    /// Timer children: microseconds accumulated since their last callback.
    pub(crate) elapsed_us: u64,
}

struct Slot {
    generation: u32,
    record: Option<Record>,
}

/// Fixed-size arena. Slots are recycled; generations make old handles
/// harmless.
pub(crate) struct Database {
    slots: [Slot; MAX_RECORDS],
}

impl Database {
    pub(crate) const fn new() -> Self {
        const EMPTY: Slot = Slot {
            generation: 0,
            record: None,
        };
        Self {
            slots: [EMPTY; MAX_RECORDS],
        }
    }

    pub(crate) fn insert(&mut self, record: Record) -> Result<DispatchHandle> {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.record.is_none() {
                slot.generation = slot.generation.wrapping_add(1);
                slot.record = Some(record);
                return Ok(DispatchHandle {
                    index,
                    generation: slot.generation,
                });
            }
        }
        Err(Error::OutOfResources)
    }

    /// Remove the record a handle refers to. Stale and foreign handles fail
    /// the generation check.
    pub(crate) fn remove(&mut self, handle: DispatchHandle) -> Result<Record> {
        let slot = self
            .slots
            .get_mut(handle.index)
            .ok_or(Error::InvalidParameter)?;
        if slot.generation != handle.generation {
            return Err(Error::InvalidParameter);
        }
        slot.record.take().ok_or(Error::InvalidParameter)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Record> {
        self.slots.iter().filter_map(|s| s.record.as_ref())
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Record> {
        self.slots.iter_mut().filter_map(|s| s.record.as_mut())
    }

    /// Records with the handles they were issued under, in slot order.
    pub(crate) fn entries_mut(&mut self) -> impl Iterator<Item = (DispatchHandle, &mut Record)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, s)| {
            let generation = s.generation;
            s.record
                .as_mut()
                .map(move |r| (DispatchHandle { index, generation }, r))
        })
    }

    pub(crate) fn clear_processed(&mut self) {
        for rec in self.iter_mut() {
            rec.processed = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{SmiDispatcher, SmiHandler};
    use crate::hw::source::NULL_SOURCE;
    use crate::protocol::{DispatchData, GpiContext};

    struct Nop;

    impl SmiHandler for Nop {
        fn handle(
            &self,
            _engine: &SmiDispatcher,
            _handle: DispatchHandle,
            _data: Option<&DispatchData>,
        ) {
        }
    }

    static NOP: Nop = Nop;

    fn record() -> Record {
        Record {
            source: NULL_SOURCE,
            handler: &NOP,
            context: RegisterContext::Gpi(GpiContext { pin: 0 }),
            kind: ProtocolKind::Gpi,
            clear_override: None,
            processed: false,
            elapsed_us: 0,
        }
    }

    #[test]
    fn handles_go_stale_on_removal() {
        let mut db = Database::new();
        let h = db.insert(record()).unwrap();
        assert!(db.remove(h).is_ok());
        assert_eq!(db.remove(h).err(), Some(Error::InvalidParameter));
    }

    #[test]
    fn recycled_slots_reject_old_handles() {
        let mut db = Database::new();
        let old = db.insert(record()).unwrap();
        db.remove(old).unwrap();

        let new = db.insert(record()).unwrap();
        assert_ne!(old, new);
        assert_eq!(db.remove(old).err(), Some(Error::InvalidParameter));
        assert!(db.remove(new).is_ok());
    }

    #[test]
    fn arena_capacity_is_bounded() {
        let mut db = Database::new();
        for _ in 0..MAX_RECORDS {
            db.insert(record()).unwrap();
        }
        assert_eq!(db.insert(record()).err(), Some(Error::OutOfResources));
    }
}
