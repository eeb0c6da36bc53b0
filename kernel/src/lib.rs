// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Core kernel support for the USB device stack.
//!
//! The kernel crate holds code that chips, capsules, and boards share: the
//! Hardware Interface Layer (HIL) definitions, the common `ErrorCode`, the
//! `debug!` output path, and compile-time configuration.
//!
//! Most `unsafe` code is in this kernel crate.

#![warn(unreachable_pub)]
#![no_std]

#[cfg(test)]
extern crate std;

#[macro_use]
pub mod debug;
pub mod config;
pub mod errorcode;
pub mod hil;
pub mod utilities;

pub use crate::errorcode::ErrorCode;
