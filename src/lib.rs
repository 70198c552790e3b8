// SPDX-License-Identifier: MIT
//! Platform SMI dispatch engine.
//!
//! The chipset funnels every System Management Interrupt source through one
//! shared interrupt. This crate fans that interrupt back out: children
//! register a handler against one logical source (a sleep-state transition, a
//! software SMI value, a GPI pin, the periodic SMI timer, a chipset event),
//! and the dispatch loop drains every pending source per activation, invoking
//! each interested child exactly once.
//!
//! The engine runs in SMM: a single hardware thread at the platform's highest
//! non-preemptible priority. Nothing here blocks, allocates, or depends on a
//! scheduler. All hardware access goes through [`hw::interface::HardwareIo`],
//! so the engine also runs against a mock register file on a build host.
//!
//! # Example
//!
//! ```no_run
//! use smm_core::protocol::{RegisterContext, SwContext, SW_AUTO_ASSIGN};
//! use smm_core::{SmiDispatcher, SmiHandler, SmiToken};
//!
//! struct FlashService;
//!
//! impl SmiHandler for FlashService {
//!     fn handle(
//!         &self,
//!         _engine: &SmiDispatcher,
//!         _handle: smm_core::DispatchHandle,
//!         _data: Option<&smm_core::protocol::DispatchData>,
//!     ) {
//!         // service the request
//!     }
//! }
//!
//! static FLASH_SERVICE: FlashService = FlashService;
//! static ENGINE: SmiDispatcher =
//!     SmiDispatcher::new(&smm_core::hw::x86::X86_IO, &smm_core::bsp::q35::PLATFORM);
//!
//! ENGINE
//!     .register(
//!         &FLASH_SERVICE,
//!         RegisterContext::Sw(SwContext { swi_num: SW_AUTO_ASSIGN }),
//!     )
//!     .expect("software SMI registration failed");
//!
//! // From the platform SMI entry vector:
//! let token = unsafe { SmiToken::new() };
//! ENGINE.dispatch(&token);
//! ```

#![cfg_attr(not(test), no_std)]

pub mod bsp;
pub mod console;
mod dispatch;
mod error;
pub mod hw;
pub mod print;
pub mod protocol;
pub mod sync;

pub use dispatch::{
    dispatcher, register_dispatcher, DispatchHandle, DispatchOutcome, SmiDispatcher, SmiHandler,
    SmiToken,
};
pub use error::{Error, Result};
