// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2023.

//! Keyboard USB HID device
//!
//! A boot-protocol keyboard built on [`UsbDevice`]. `HidDevice` registers as
//! the device's event listener: it configures its interrupt IN endpoint when
//! the host selects a configuration, answers the HID class requests sent to
//! its interface, and forwards every event to an optional application
//! listener.
//!
//! SET_REPORT is not supported, so keyboard LED state is not reported.

use core::cell::Cell;

use kernel::debug;
use kernel::hil::usb::{
    BankCount, EndpointSize, EndpointTransport, TransferType, UsbController, ENDPOINT_DIR_IN,
};
use kernel::utilities::cells::OptionalCell;
use kernel::ErrorCode;

use super::descriptors::{
    compose_configuration, ConfigurationAttributes, ConfigurationDescriptor, Descriptor,
    DescriptorType, DeviceRequestType, EndpointAddress, EndpointDescriptor, HIDCountryCode,
    HIDDescriptor, HIDSubordinateDescriptor, InterfaceDescriptor, InterfaceTree, Recipient,
    RequestType, TransferDirection,
};
use super::device::{DeviceState, UsbDevice, UsbEvents};

/// HID class request codes.
pub mod request {
    pub const GET_REPORT: u8 = 0x01;
    pub const GET_IDLE: u8 = 0x02;
    pub const GET_PROTOCOL: u8 = 0x03;
    pub const SET_REPORT: u8 = 0x09;
    pub const SET_IDLE: u8 = 0x0a;
    pub const SET_PROTOCOL: u8 = 0x0b;
}

/// Size of a boot keyboard input report.
pub const REPORT_LEN: usize = 8;

const BOOT_PROTOCOL: u8 = 0;
const REPORT_PROTOCOL: u8 = 1;

/// The HID report descriptor for keyboard from
/// https://www.usb.org/sites/default/files/hid1_11.pdf
pub static REPORT_DESCRIPTOR: &[u8] = &[
    0x05, 0x01, // Usage Page (Generic Desktop),
    0x09, 0x06, // Usage (Keyboard),
    0xA1, 0x01, // Collection (Application),
    0x75, 0x01, // Report Size (1),
    0x95, 0x08, // Report Count (8),
    0x05, 0x07, // Usage Page (Key Codes),
    0x19, 0xE0, // Usage Minimum (224),
    0x29, 0xE7, // Usage Maximum (231),
    0x15, 0x00, // Logical Minimum (0),
    0x25, 0x01, // Logical Maximum (1),
    0x81, 0x02, // Input (Data, Variable, Absolute), ;Modifier byte
    0x95, 0x01, // Report Count (1),
    0x75, 0x08, // Report Size (8),
    0x81, 0x03, // Input (Constant), ;Reserved byte
    0x95, 0x05, // Report Count (5),
    0x75, 0x01, // Report Size (1),
    0x05, 0x08, // Usage Page (LEDs),
    0x19, 0x01, // Usage Minimum (1),
    0x29, 0x05, // Usage Maximum (5),
    0x91, 0x02, // Output (Data, Variable, Absolute), ;LED report
    0x95, 0x01, // Report Count (1),
    0x75, 0x03, // Report Size (3),
    0x91, 0x03, // Output (Constant), ;LED report padding
    0x95, 0x06, // Report Count (6),
    0x75, 0x08, // Report Size (8),
    0x15, 0x00, // Logical Minimum (0),
    0x25, 0x68, // Logical Maximum(104),
    0x05, 0x07, // Usage Page (Key Codes),
    0x19, 0x00, // Usage Minimum (0),
    0x29, 0x68, // Usage Maximum (104),
    0x81, 0x00, // Input (Data, Array),
    0xc0, // End Collection
];

static SUB_HID_DESCRIPTOR: &[HIDSubordinateDescriptor] = &[HIDSubordinateDescriptor {
    typ: DescriptorType::Report,
    len: REPORT_DESCRIPTOR.len() as u16,
}];

pub static HID_DESCRIPTOR: HIDDescriptor<'static> = HIDDescriptor {
    hid_class: 0x0111,
    country_code: HIDCountryCode::NotSupported,
    sub_descriptors: SUB_HID_DESCRIPTOR,
};

/// Serialize the HID descriptor, for the class descriptor table.
pub fn hid_descriptor(buf: &mut [u8]) -> usize {
    HID_DESCRIPTOR.write_to(buf)
}

/// Serialize a one-interface keyboard configuration into `buf`.
pub fn keyboard_configuration(interface: u8, endpoint: u8, buf: &mut [u8]) -> Option<usize> {
    let endpoints = [EndpointDescriptor {
        endpoint_address: EndpointAddress::new(endpoint, TransferDirection::DeviceToHost),
        transfer_type: TransferType::Interrupt,
        max_packet_size: REPORT_LEN as u16,
        interval: 10,
    }];
    let interfaces = [InterfaceTree {
        interface: InterfaceDescriptor {
            interface_number: interface,
            interface_class: 0x03,    // HID
            interface_subclass: 0x01, // Boot subclass
            interface_protocol: 0x01, // Keyboard
            ..InterfaceDescriptor::default()
        },
        class: Some(&HID_DESCRIPTOR),
        endpoints: &endpoints,
    }];
    compose_configuration(
        ConfigurationDescriptor {
            attributes: ConfigurationAttributes::new(true, true),
            max_power: 0x32,
            ..ConfigurationDescriptor::default()
        },
        &interfaces,
        buf,
    )
}

pub struct HidDevice<'a, H: EndpointTransport + UsbController> {
    device: &'a UsbDevice<'a, H>,
    interface: u8,
    /// Endpoint number of the interrupt IN endpoint.
    endpoint: u8,
    /// Idle rate in 4 ms units, 0 means reports are sent only on change.
    idle: Cell<u8>,
    protocol: Cell<u8>,
    report: Cell<[u8; REPORT_LEN]>,
    client: OptionalCell<&'a dyn UsbEvents>,
}

impl<'a, H: EndpointTransport + UsbController> HidDevice<'a, H> {
    pub fn new(device: &'a UsbDevice<'a, H>, interface: u8, endpoint: u8) -> Self {
        HidDevice {
            device,
            interface,
            endpoint,
            idle: Cell::new(0),
            protocol: Cell::new(REPORT_PROTOCOL),
            report: Cell::new([0; REPORT_LEN]),
            client: OptionalCell::empty(),
        }
    }

    pub fn set_client(&self, client: &'a dyn UsbEvents) {
        self.client.set(client);
    }

    pub fn idle_rate(&self) -> u8 {
        self.idle.get()
    }

    pub fn is_boot_protocol(&self) -> bool {
        self.protocol.get() == BOOT_PROTOCOL
    }

    /// Send an input report on the interrupt IN endpoint.
    pub fn send_report(&self, report: &[u8]) -> Result<(), ErrorCode> {
        if self.device.state() != DeviceState::Configured {
            return Err(ErrorCode::OFF);
        }
        if report.len() > REPORT_LEN {
            return Err(ErrorCode::SIZE);
        }
        let mut last = [0; REPORT_LEN];
        last[..report.len()].copy_from_slice(report);
        self.report.set(last);

        let hw = self.device.hw();
        let previous = hw.selected();
        hw.select(ENDPOINT_DIR_IN | self.endpoint);
        let result = self.device.data_stream_in(report, None);
        hw.select(previous);
        result.map_err(ErrorCode::from)
    }

    /// Answer a HID class request. Returns false if the request is not ours.
    fn class_request(&self, request: u8, request_type: DeviceRequestType, value: u16) -> bool {
        let setup = self.device.control_request();
        if request_type.request_type() != RequestType::Class
            || request_type.recipient() != Recipient::Interface
            || setup.index != self.interface as u16
        {
            return false;
        }

        let result = match (request, request_type.transfer_direction()) {
            (request::GET_REPORT, TransferDirection::DeviceToHost) => {
                self.device.send_control_data(&self.report.get())
            }
            (request::GET_IDLE, TransferDirection::DeviceToHost) => {
                self.device.send_control_data(&[self.idle.get()])
            }
            (request::GET_PROTOCOL, TransferDirection::DeviceToHost) => {
                self.device.send_control_data(&[self.protocol.get()])
            }
            (request::SET_IDLE, TransferDirection::HostToDevice) => {
                self.idle.set((value >> 8) as u8);
                self.device.acknowledge_control()
            }
            (request::SET_PROTOCOL, TransferDirection::HostToDevice) => {
                self.protocol.set((value & 0xff) as u8);
                self.device.acknowledge_control()
            }
            _ => return false,
        };
        if let Err(err) = result {
            debug!("hid: request {:#04x} failed: {:?}", request, err);
        }
        true
    }

}

impl<'a, H: EndpointTransport + UsbController> UsbEvents for HidDevice<'a, H> {
    fn configuration_changed(&self, configuration: u8) {
        let hw = self.device.hw();
        let previous = hw.selected();
        let result = hw.configure(
            ENDPOINT_DIR_IN | self.endpoint,
            TransferType::Interrupt,
            EndpointSize::Bytes8,
            BankCount::Single,
        );
        hw.select(previous);
        match result {
            Ok(()) => {
                self.client.map(|c| c.configuration_changed(configuration));
            }
            Err(err) => {
                debug!("hid: endpoint {} configuration failed: {:?}", self.endpoint, err);
                self.client.map(|c| c.error());
            }
        }
    }

    fn control_request(&self, request: u8, request_type: DeviceRequestType, value: u16) {
        if !self.class_request(request, request_type, value) {
            self.client.map(|c| c.control_request(request, request_type, value));
        }
    }

    fn error(&self) {
        self.client.map(|c| c.error());
    }

    fn suspend(&self) {
        self.client.map(|c| c.suspend());
    }

    fn wake(&self) {
        self.client.map(|c| c.wake());
    }

    fn connect_with_bus(&self) {
        self.client.map(|c| c.connect_with_bus());
    }

    fn disconnect_from_bus(&self) {
        self.client.map(|c| c.disconnect_from_bus());
    }

    fn start_of_frame(&self) {
        self.client.map(|c| c.start_of_frame());
    }

    fn end_of_reset(&self) {
        self.client.map(|c| c.end_of_reset());
    }
}
