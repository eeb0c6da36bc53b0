// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2023.

//! USB device stack.

pub mod descriptors;
pub mod device;
pub mod hid;
