// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2023.

//! Blocking stage and stream primitives.
//!
//! These loops busy-wait on endpoint flags. They never block forever on a
//! detached or suspended bus: every iteration checks the device state, which
//! the USB interrupt handler updates underneath the loop.

use core::cmp;

use kernel::hil::usb::{EndpointDirection, EndpointTransport, UsbController};
use kernel::ErrorCode;

use super::{DeviceState, UsbDevice};
use crate::usb::descriptors::TransferDirection;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamError {
    /// VBUS went away during the transfer.
    Disconnected,
    /// The bus was suspended during the transfer.
    Suspended,
    /// The host sent a new SETUP packet, abandoning the current transfer.
    AbortedByHost,
    /// The endpoint is halted.
    Stalled,
    /// The host did not service the endpoint in time.
    Timeout,
    /// The bank filled up and the caller asked not to wait. The progress
    /// cursor tells where to resume.
    Incomplete,
}

impl From<StreamError> for ErrorCode {
    fn from(err: StreamError) -> ErrorCode {
        match err {
            StreamError::Disconnected => ErrorCode::OFF,
            StreamError::Suspended => ErrorCode::BUSY,
            StreamError::AbortedByHost => ErrorCode::CANCEL,
            StreamError::Stalled => ErrorCode::FAIL,
            StreamError::Timeout => ErrorCode::NOACK,
            StreamError::Incomplete => ErrorCode::SIZE,
        }
    }
}

impl<'a, H: EndpointTransport + UsbController> UsbDevice<'a, H> {
    /// Checked at every poll point of a control stage.
    fn control_aborted(&self) -> Result<(), StreamError> {
        match self.state.get() {
            DeviceState::Unattached => Err(StreamError::Disconnected),
            DeviceState::Suspended => Err(StreamError::Suspended),
            _ if self.hw.setup_received() => Err(StreamError::AbortedByHost),
            _ => Ok(()),
        }
    }

    fn wait_control(&self, ready: impl Fn(&H) -> bool) -> Result<(), StreamError> {
        loop {
            if ready(self.hw) {
                return Ok(());
            }
            self.control_aborted()?;
        }
    }

    /// Run the STATUS stage of the current control transfer on endpoint 0.
    ///
    /// `direction` is the direction of the request, so the handshake runs
    /// the opposite way.
    pub(crate) fn status_stage(&self, direction: TransferDirection) -> Result<(), StreamError> {
        match direction {
            TransferDirection::DeviceToHost => {
                self.wait_control(|hw| hw.out_received())?;
                self.hw.ack_out();
            }
            TransferDirection::HostToDevice => {
                self.hw.flush_in();
                self.wait_control(|hw| hw.in_ready())?;
            }
        }
        Ok(())
    }

    /// Send `data` as the IN data stage of the current control transfer,
    /// followed by the STATUS stage.
    ///
    /// At most `requested` bytes are sent, in packets of the control endpoint
    /// size. A short or zero-length packet terminates the stage when less
    /// than `requested` was sent. The host may cut the stage short by
    /// starting the STATUS stage early.
    pub(crate) fn control_in(&self, data: &[u8], requested: u16) -> Result<(), StreamError> {
        let packet_size = self.config.control_endpoint_size.bytes();
        let requested = requested as usize;
        let total = cmp::min(data.len(), requested);
        let mut sent = 0;
        let mut done = requested == 0;

        while !done {
            self.control_aborted()?;
            if self.hw.out_received() {
                break;
            }
            if !self.hw.in_ready() {
                continue;
            }

            let mut in_bank = self.hw.bytes_in_bank();
            while sent < total && in_bank < packet_size {
                self.hw.write_byte(data[sent]);
                sent += 1;
                in_bank += 1;
            }
            self.hw.flush_in();

            done = sent == total && (in_bank < packet_size || total == requested);
        }

        self.status_stage(TransferDirection::DeviceToHost)
    }

    /// Wait until the selected endpoint can be read or written.
    ///
    /// Fails after `stream_timeout_frames` frames without the host servicing
    /// the endpoint.
    pub fn wait_until_ready(&self) -> Result<(), StreamError> {
        let mut remaining = self.config.stream_timeout_frames;
        let mut previous_frame = self.hw.frame_number();

        loop {
            let ready = match self.hw.direction() {
                EndpointDirection::In => self.hw.in_ready(),
                EndpointDirection::Out => self.hw.out_received(),
            };
            if ready {
                return Ok(());
            }

            match self.state.get() {
                DeviceState::Unattached => return Err(StreamError::Disconnected),
                DeviceState::Suspended => return Err(StreamError::Suspended),
                _ => {}
            }
            if self.hw.is_stalled() {
                return Err(StreamError::Stalled);
            }

            let frame = self.hw.frame_number();
            if frame != previous_frame {
                previous_frame = frame;
                if remaining == 0 {
                    return Err(StreamError::Timeout);
                }
                remaining -= 1;
            }
        }
    }

    /// Write `data` to the selected IN endpoint, flushing every full bank and
    /// the final partial one.
    ///
    /// Without a progress cursor the call waits for each bank to drain. With
    /// `bytes_processed`, the call starts at the cursor and returns
    /// `Incomplete` instead of waiting once a bank fills up; call it again with
    /// the same cursor to continue.
    pub fn data_stream_in(
        &self,
        data: &[u8],
        mut bytes_processed: Option<&mut usize>,
    ) -> Result<(), StreamError> {
        self.wait_until_ready()?;

        let start = bytes_processed.as_deref().copied().unwrap_or(0);
        let mut offset = cmp::min(start, data.len());
        let mut pending = false;

        while offset < data.len() {
            if !self.hw.is_read_write_allowed() {
                self.hw.flush_in();
                pending = false;
                if let Some(processed) = bytes_processed.as_deref_mut() {
                    *processed = offset;
                    return Err(StreamError::Incomplete);
                }
                self.wait_until_ready()?;
            } else {
                self.hw.write_byte(data[offset]);
                offset += 1;
                pending = true;
            }
        }

        if pending {
            self.hw.flush_in();
        }
        if let Some(processed) = bytes_processed {
            *processed = offset;
        }
        Ok(())
    }

    /// Answer the current control request with `data` from a class or vendor
    /// handler. Endpoint 0 must be selected.
    pub fn send_control_data(&self, data: &[u8]) -> Result<(), ErrorCode> {
        let requested = self.setup.get().length;
        self.control_in(data, requested).map_err(ErrorCode::from)
    }

    /// Complete a host-to-device control request that has no data stage.
    pub fn acknowledge_control(&self) -> Result<(), ErrorCode> {
        self.status_stage(TransferDirection::HostToDevice)
            .map_err(ErrorCode::from)
    }
}
