// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Re-export of the `tock-registers` bitfield types.
//!
//! Capsules name register-shaped values through this module so they do not
//! need a direct dependency on `tock-registers`.

pub use tock_registers::fields::{Field, FieldValue};
pub use tock_registers::{register_bitfields, LocalRegisterCopy, RegisterLongName};
