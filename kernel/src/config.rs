// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Data structure for storing compile-time configuration options.
//!
//! Configuration lives in a `const` object rather than behind `#[cfg]`
//! attributes scattered through the code. All code paths are type-checked
//! by the compiler, even the disabled ones, and a boolean condition used in
//! an `if` block is folded away when the constant is false.

/// Data structure holding compile-time configuration options.
///
/// To change the configuration, enable the matching cargo feature on the
/// `kernel` crate from the board crate.
pub struct Config {
    /// Whether the USB device stack should trace every control request to the
    /// debug output.
    ///
    /// If enabled, each setup packet is printed together with the outcome of
    /// its data and status stages.
    pub trace_control_requests: bool,

    /// Whether the USB device stack should print bus-level events (reset,
    /// suspend, wake, VBUS changes) to the debug output.
    pub trace_bus_events: bool,
}

/// A unique instance of `Config` where compile-time configuration options are
/// defined. This is the only location where we permit `#[cfg(x)]` to be used
/// to configure code based on Cargo features.
pub const CONFIG: Config = Config {
    trace_control_requests: cfg!(feature = "trace_control_requests"),
    trace_bus_events: cfg!(feature = "trace_bus_events"),
};
