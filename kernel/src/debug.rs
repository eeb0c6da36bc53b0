// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Support for the `debug!` macro.
//!
//! A board registers a single [`IoWrite`] sink with [`set_debug_writer`],
//! typically a UART or a semihosting channel. Every `debug!` line is prefixed
//! with the file and line that emitted it and terminated with `\r\n`.
//!
//! Until a writer is registered, `debug!` output is discarded, so capsules can
//! trace unconditionally in unit tests and on boards with no console.
//!
//! ```ignore
//! debug!("setup: {:02x} {:02x}", request_type, request);
//! ```

use core::fmt::{write, Arguments, Result, Write};
use core::ptr::{addr_of, addr_of_mut};

/// Byte sink behind the `debug!` macro.
pub trait IoWrite {
    /// Write `buf` and return the number of bytes accepted.
    fn write(&self, buf: &[u8]) -> usize;
}

static mut DEBUG_WRITER: Option<&'static dyn IoWrite> = None;

/// Register the output sink for `debug!`.
///
/// # Safety
///
/// Must not race with a concurrent `debug!` call, which on a single core means
/// it must be called before interrupts that may print are enabled.
pub unsafe fn set_debug_writer(writer: &'static dyn IoWrite) {
    *addr_of_mut!(DEBUG_WRITER) = Some(writer);
}

fn debug_writer() -> Option<&'static dyn IoWrite> {
    // Only written by `set_debug_writer`, whose contract rules out a
    // concurrent write.
    unsafe { *addr_of!(DEBUG_WRITER) }
}

struct DebugWriterWrapper {
    dw: &'static dyn IoWrite,
}

impl Write for DebugWriterWrapper {
    fn write_str(&mut self, s: &str) -> Result {
        self.dw.write(s.as_bytes());
        Ok(())
    }
}

/// Format one `debug!` line. Use the macro instead of calling this directly.
pub fn debug_fmt(args: Arguments, file_line: &(&'static str, u32)) {
    if let Some(dw) = debug_writer() {
        let mut writer = DebugWriterWrapper { dw };
        let (file, line) = *file_line;
        let _ = writer.write_fmt(format_args!("TOCK_DEBUG: {}:{}: ", file, line));
        let _ = write(&mut writer, args);
        let _ = writer.write_str("\r\n");
    }
}

/// In-kernel `println()` debugging.
#[macro_export]
macro_rules! debug {
    () => ({
        // Allow an empty debug!() to print the location when hit
        $crate::debug!("")
    });
    ($msg:expr $(,)?) => ({
        $crate::debug::debug_fmt(format_args!("{}", $msg), {
            static _FILE_LINE: (&'static str, u32) = (file!(), line!());
            &_FILE_LINE
        })
    });
    ($fmt:expr, $($arg:tt)+) => ({
        $crate::debug::debug_fmt(format_args!($fmt, $($arg)+), {
            static _FILE_LINE: (&'static str, u32) = (file!(), line!());
            &_FILE_LINE
        })
    });
}

#[cfg(test)]
mod test {
    use super::{set_debug_writer, IoWrite};
    use std::boxed::Box;
    use std::string::String;
    use std::sync::Mutex;

    struct Capture(Mutex<String>);

    impl IoWrite for Capture {
        fn write(&self, buf: &[u8]) -> usize {
            let mut out = self.0.lock().unwrap();
            out.push_str(core::str::from_utf8(buf).unwrap());
            buf.len()
        }
    }

    #[test]
    fn debug_prefixes_location() {
        let capture: &'static Capture = Box::leak(Box::new(Capture(Mutex::new(String::new()))));
        unsafe { set_debug_writer(capture) };

        debug!("address {}", 5);

        let out = capture.0.lock().unwrap();
        assert!(out.starts_with("TOCK_DEBUG: "));
        assert!(out.contains("debug.rs:"));
        assert!(out.ends_with(": address 5\r\n"));
    }
}
