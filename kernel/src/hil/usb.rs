// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interface to USB device controller hardware.
//!
//! A chip exposes its USB peripheral through two traits:
//!
//! - [`EndpointTransport`]: byte access to the endpoint FIFOs. One endpoint is
//!   selected at a time and every other endpoint method applies to the
//!   selected one.
//! - [`UsbController`]: power, clock, attach, address, and the device-level
//!   interrupt flags.
//!
//! The protocol logic above these traits (control transfers, device state)
//! lives in `capsules_extra::usb`.

use crate::utilities::registers::{register_bitfields, FieldValue, LocalRegisterCopy};
use crate::ErrorCode;

/// Address of the default control endpoint.
pub const CONTROL_ENDPOINT: u8 = 0;

/// Direction bit of an endpoint address.
pub const ENDPOINT_DIR_IN: u8 = 0x80;

/// Mask for the endpoint number in an endpoint address.
pub const ENDPOINT_NUMBER_MASK: u8 = 0x0F;

register_bitfields![u8,
    pub DeviceInterrupt [
        // VBUS level changed
        VBUS OFFSET(0) NUMBITS(1) [],
        // Bus idle for more than 3 ms
        SUSPEND OFFSET(1) NUMBITS(1) [],
        // Bus activity while suspended
        WAKE OFFSET(2) NUMBITS(1) [],
        // Host finished driving a bus reset
        END_OF_RESET OFFSET(3) NUMBITS(1) [],
        // Start-of-frame token received
        START_OF_FRAME OFFSET(4) NUMBITS(1) []
    ]
];

/// Snapshot of the device-level interrupt flags.
pub type DeviceInterrupts = LocalRegisterCopy<u8, DeviceInterrupt::Register>;

/// Build an interrupt mask from one or more `DeviceInterrupt` fields.
pub fn device_interrupts(fields: FieldValue<u8, DeviceInterrupt::Register>) -> DeviceInterrupts {
    let mut mask = DeviceInterrupts::new(0);
    mask.write(fields);
    mask
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferType {
    Control = 0,
    Isochronous,
    Bulk,
    Interrupt,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndpointDirection {
    Out,
    In,
}

impl EndpointDirection {
    pub fn from_address(address: u8) -> Self {
        if address & ENDPOINT_DIR_IN != 0 {
            EndpointDirection::In
        } else {
            EndpointDirection::Out
        }
    }
}

/// FIFO size of an endpoint bank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndpointSize {
    Bytes8,
    Bytes16,
    Bytes32,
    Bytes64,
    Bytes128,
    Bytes256,
    Bytes512,
}

impl EndpointSize {
    pub fn bytes(self) -> usize {
        match self {
            EndpointSize::Bytes8 => 8,
            EndpointSize::Bytes16 => 16,
            EndpointSize::Bytes32 => 32,
            EndpointSize::Bytes64 => 64,
            EndpointSize::Bytes128 => 128,
            EndpointSize::Bytes256 => 256,
            EndpointSize::Bytes512 => 512,
        }
    }

    /// Smallest bank size that holds `bytes`, if any.
    pub fn for_bytes(bytes: usize) -> Option<Self> {
        match bytes {
            0..=8 => Some(EndpointSize::Bytes8),
            9..=16 => Some(EndpointSize::Bytes16),
            17..=32 => Some(EndpointSize::Bytes32),
            33..=64 => Some(EndpointSize::Bytes64),
            65..=128 => Some(EndpointSize::Bytes128),
            129..=256 => Some(EndpointSize::Bytes256),
            257..=512 => Some(EndpointSize::Bytes512),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BankCount {
    Single,
    Double,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceSpeed {
    Low,
    Full,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UsbMode {
    Device,
    Host,
}

/// Byte-level access to the endpoint FIFOs.
pub trait EndpointTransport {
    /// Select the endpoint that the following calls operate on. `address`
    /// may include the direction bit.
    fn select(&self, address: u8);

    /// Currently selected endpoint address.
    fn selected(&self) -> u8;

    /// Direction of the selected endpoint.
    fn direction(&self) -> EndpointDirection;

    fn read_byte(&self) -> u8;

    fn write_byte(&self, byte: u8);

    /// Write a 16-bit value in USB (little-endian) byte order.
    fn write_integer(&self, value: u16) {
        for byte in value.to_le_bytes() {
            self.write_byte(byte);
        }
    }

    /// Number of bytes currently held in the selected bank.
    fn bytes_in_bank(&self) -> usize;

    /// For IN endpoints, whether the bank has room. For OUT endpoints, whether
    /// the bank holds unread data.
    fn is_read_write_allowed(&self) -> bool;

    /// The IN bank is free for new data.
    fn in_ready(&self) -> bool;

    /// An OUT packet has been received.
    fn out_received(&self) -> bool;

    /// A SETUP packet has been received on the selected control endpoint.
    fn setup_received(&self) -> bool;

    /// Hand the IN bank to the hardware for transmission.
    fn flush_in(&self);

    /// Release the OUT bank back to the hardware.
    fn ack_out(&self);

    /// Acknowledge the SETUP packet and release its bank.
    fn clear_setup(&self);

    fn is_stalled(&self) -> bool;

    fn stall(&self);

    fn clear_stall(&self);

    /// Allocate and enable an endpoint.
    fn configure(
        &self,
        address: u8,
        transfer_type: TransferType,
        size: EndpointSize,
        banks: BankCount,
    ) -> Result<(), ErrorCode>;
}

/// Power, attach, and interrupt control of the USB peripheral.
pub trait UsbController {
    fn enable(&self, speed: DeviceSpeed);

    fn disable(&self);

    /// Connect the pull-up so the host sees the device.
    fn attach(&self);

    fn detach(&self);

    fn vbus_present(&self) -> bool;

    fn enable_pll(&self);

    fn disable_pll(&self);

    fn enable_clock(&self);

    fn freeze_clock(&self);

    fn pending_interrupts(&self) -> DeviceInterrupts;

    fn enabled_interrupts(&self) -> DeviceInterrupts;

    fn enable_interrupts(&self, mask: DeviceInterrupts);

    fn disable_interrupts(&self, mask: DeviceInterrupts);

    fn clear_interrupts(&self, mask: DeviceInterrupts);

    /// Program the device address. It takes effect after `enable_address`.
    fn set_address(&self, address: u8);

    fn enable_address(&self);

    fn is_address_enabled(&self) -> bool;

    /// Current 11-bit frame number.
    fn frame_number(&self) -> u16;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn interrupt_mask_composition() {
        let mask = device_interrupts(DeviceInterrupt::VBUS::SET + DeviceInterrupt::END_OF_RESET::SET);
        assert_eq!(mask.get(), 0b1001);
        assert!(mask.is_set(DeviceInterrupt::VBUS));
        assert!(!mask.is_set(DeviceInterrupt::SUSPEND));
    }

    #[test]
    fn endpoint_size_for_bytes() {
        assert_eq!(EndpointSize::for_bytes(8), Some(EndpointSize::Bytes8));
        assert_eq!(EndpointSize::for_bytes(9), Some(EndpointSize::Bytes16));
        assert_eq!(EndpointSize::for_bytes(64).map(EndpointSize::bytes), Some(64));
        assert_eq!(EndpointSize::for_bytes(513), None);
    }

    #[test]
    fn direction_from_address() {
        assert_eq!(EndpointDirection::from_address(0x81), EndpointDirection::In);
        assert_eq!(EndpointDirection::from_address(0x02), EndpointDirection::Out);
    }
}
