// SPDX-License-Identifier: MIT
mod init;
mod null;

pub mod interface;

pub use self::init::*;
pub use self::null::*;
