// SPDX-License-Identifier: MIT
use core::fmt::Arguments;

use crate::console::interface::Write;
use crate::sync::interface::Mutex;
use crate::sync::NullLock;

pub mod interface {
    use core::fmt;

    pub trait Write {
        fn write_fmt(&self, args: fmt::Arguments) -> fmt::Result;
    }
}

struct NullConsole;

impl Write for NullConsole {
    fn write_fmt(&self, _args: Arguments) -> core::fmt::Result {
        Ok(())
    }
}

static NULL_CONSOLE: NullConsole = NullConsole;
static CUR_CONSOLE: NullLock<&'static (dyn Write + Sync)> = NullLock::new(&NULL_CONSOLE);

pub fn console() -> &'static dyn Write {
    CUR_CONSOLE.lock(|con| *con)
}

/// Point engine logging at a real sink. Until this is called, all output is
/// dropped.
pub fn register_console(con: &'static (dyn Write + Sync)) {
    CUR_CONSOLE.lock(|cur| *cur = con);
}
