// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Utility functions and types shared across the kernel, chips, and capsules.

pub mod registers;

/// The Tock `Cell` types.
///
/// This is a re-export of the `tock-cells` crate provided for convenience.
///
/// To use `OptionalCell`, for example, users should use:
///
///     use kernel::utilities::cells::OptionalCell;
pub mod cells {
    pub use tock_cells::map_cell::MapCell;
    pub use tock_cells::optional_cell::OptionalCell;
    pub use tock_cells::take_cell::TakeCell;
}
