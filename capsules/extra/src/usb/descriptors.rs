// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2023.

//! Platform-independent USB 2.0 protocol library.
//!
//! Mostly data types for USB setup packets and descriptors, plus a table
//! backed [`DescriptorProvider`] that the control engine reads from.

use core::fmt;
use kernel::hil::usb::{TransferType, ENDPOINT_DIR_IN, ENDPOINT_NUMBER_MASK};
use kernel::utilities::registers::{register_bitfields, LocalRegisterCopy};

register_bitfields![u8,
    REQUEST_TYPE [
        RECIPIENT OFFSET(0) NUMBITS(5) [
            Device = 0,
            Interface = 1,
            Endpoint = 2,
            Other = 3
        ],
        TYPE OFFSET(5) NUMBITS(2) [
            Standard = 0,
            Class = 1,
            Vendor = 2,
            Reserved = 3
        ],
        DIRECTION OFFSET(7) NUMBITS(1) [
            HostToDevice = 0,
            DeviceToHost = 1
        ]
    ]
];

/// Standard request codes (`bRequest`).
pub mod request {
    pub const GET_STATUS: u8 = 0;
    pub const CLEAR_FEATURE: u8 = 1;
    pub const SET_FEATURE: u8 = 3;
    pub const SET_ADDRESS: u8 = 5;
    pub const GET_DESCRIPTOR: u8 = 6;
    pub const SET_DESCRIPTOR: u8 = 7;
    pub const GET_CONFIGURATION: u8 = 8;
    pub const SET_CONFIGURATION: u8 = 9;
    pub const GET_INTERFACE: u8 = 10;
    pub const SET_INTERFACE: u8 = 11;
    pub const SYNCH_FRAME: u8 = 12;
}

/// The data structure sent in a SETUP handshake.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct SetupPacket {
    pub request_type: DeviceRequestType,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

impl SetupPacket {
    pub const SIZE: usize = 8;

    /// Create a `SetupPacket` from the raw bytes received on the wire.
    pub fn from_bytes(p: &[u8; Self::SIZE]) -> Self {
        SetupPacket {
            request_type: DeviceRequestType(p[0]),
            request: p[1],
            value: u16::from_le_bytes([p[2], p[3]]),
            index: u16::from_le_bytes([p[4], p[5]]),
            length: u16::from_le_bytes([p[6], p[7]]),
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let [v0, v1] = self.value.to_le_bytes();
        let [i0, i1] = self.index.to_le_bytes();
        let [l0, l1] = self.length.to_le_bytes();
        [self.request_type.0, self.request, v0, v1, i0, i1, l0, l1]
    }

    /// If the `SetupPacket` represents a standard device request, return it.
    pub fn standard_request(&self) -> Option<StandardRequest> {
        if self.request_type.request_type() != RequestType::Standard {
            return None;
        }
        match self.request {
            request::GET_STATUS => Some(StandardRequest::GetStatus {
                recipient_index: self.index,
            }),
            request::CLEAR_FEATURE => Some(StandardRequest::ClearFeature {
                feature: FeatureSelector::get(self.value),
                recipient_index: self.index,
            }),
            request::SET_FEATURE => Some(StandardRequest::SetFeature {
                feature: FeatureSelector::get(self.value),
                test_mode: (self.index >> 8) as u8,
                recipient_index: self.index & 0xff,
            }),
            request::SET_ADDRESS => Some(StandardRequest::SetAddress {
                device_address: (self.value & 0x7f) as u8,
            }),
            request::GET_DESCRIPTOR => Some(StandardRequest::GetDescriptor {
                descriptor_type: (self.value >> 8) as u8,
                descriptor_index: (self.value & 0xff) as u8,
                lang_id: self.index,
                requested_length: self.length,
            }),
            request::SET_DESCRIPTOR => Some(StandardRequest::SetDescriptor {
                descriptor_type: (self.value >> 8) as u8,
                descriptor_index: (self.value & 0xff) as u8,
                lang_id: self.index,
                descriptor_length: self.length,
            }),
            request::GET_CONFIGURATION => Some(StandardRequest::GetConfiguration),
            request::SET_CONFIGURATION => Some(StandardRequest::SetConfiguration {
                configuration_value: (self.value & 0xff) as u8,
            }),
            request::GET_INTERFACE => Some(StandardRequest::GetInterface {
                interface: self.index,
            }),
            request::SET_INTERFACE => Some(StandardRequest::SetInterface {
                alternate_setting: self.value,
                interface: self.index,
            }),
            request::SYNCH_FRAME => Some(StandardRequest::SynchFrame {
                endpoint: self.index,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardRequest {
    GetStatus {
        recipient_index: u16,
    },
    ClearFeature {
        feature: FeatureSelector,
        recipient_index: u16,
    },
    SetFeature {
        feature: FeatureSelector,
        test_mode: u8,
        recipient_index: u16,
    },
    SetAddress {
        device_address: u8,
    },
    GetDescriptor {
        descriptor_type: u8,
        descriptor_index: u8,
        lang_id: u16,
        requested_length: u16,
    },
    SetDescriptor {
        descriptor_type: u8,
        descriptor_index: u8,
        lang_id: u16,
        descriptor_length: u16,
    },
    GetConfiguration,
    SetConfiguration {
        configuration_value: u8,
    },
    GetInterface {
        interface: u16,
    },
    SetInterface {
        alternate_setting: u16,
        interface: u16,
    },
    SynchFrame {
        endpoint: u16,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DescriptorType {
    Device = 1,
    Configuration,
    String,
    Interface,
    Endpoint,
    DeviceQualifier,
    OtherSpeedConfiguration,
    InterfacePower,
    HID = 0x21,
    Report = 0x22,
    CsInterface = 0x24,
}

impl DescriptorType {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(DescriptorType::Device),
            2 => Some(DescriptorType::Configuration),
            3 => Some(DescriptorType::String),
            4 => Some(DescriptorType::Interface),
            5 => Some(DescriptorType::Endpoint),
            6 => Some(DescriptorType::DeviceQualifier),
            7 => Some(DescriptorType::OtherSpeedConfiguration),
            8 => Some(DescriptorType::InterfacePower),
            0x21 => Some(DescriptorType::HID),
            0x22 => Some(DescriptorType::Report),
            0x24 => Some(DescriptorType::CsInterface),
            _ => None,
        }
    }

    /// `wValue` of a GET_DESCRIPTOR request for this type and index.
    pub const fn value(self, index: u8) -> u16 {
        ((self as u16) << 8) | index as u16
    }
}

/// The `bmRequestType` byte of a setup packet.
#[derive(Copy, Clone, Default, PartialEq, Eq)]
pub struct DeviceRequestType(pub u8);

impl DeviceRequestType {
    pub fn new(direction: TransferDirection, request_type: RequestType, recipient: Recipient) -> Self {
        let mut reg = LocalRegisterCopy::<u8, REQUEST_TYPE::Register>::new(0);
        reg.write(
            REQUEST_TYPE::DIRECTION.val(direction as u8)
                + REQUEST_TYPE::TYPE.val(request_type as u8)
                + REQUEST_TYPE::RECIPIENT.val(recipient as u8),
        );
        DeviceRequestType(reg.get())
    }

    fn reg(self) -> LocalRegisterCopy<u8, REQUEST_TYPE::Register> {
        LocalRegisterCopy::new(self.0)
    }

    pub fn transfer_direction(self) -> TransferDirection {
        if self.reg().is_set(REQUEST_TYPE::DIRECTION) {
            TransferDirection::DeviceToHost
        } else {
            TransferDirection::HostToDevice
        }
    }

    pub fn request_type(self) -> RequestType {
        match self.reg().read(REQUEST_TYPE::TYPE) {
            0 => RequestType::Standard,
            1 => RequestType::Class,
            2 => RequestType::Vendor,
            _ => RequestType::Reserved,
        }
    }

    pub fn recipient(self) -> Recipient {
        match self.reg().read(REQUEST_TYPE::RECIPIENT) {
            0 => Recipient::Device,
            1 => Recipient::Interface,
            2 => Recipient::Endpoint,
            3 => Recipient::Other,
            _ => Recipient::Reserved,
        }
    }
}

impl fmt::Debug for DeviceRequestType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{{{:?}, {:?}, {:?}}}",
            self.transfer_direction(),
            self.request_type(),
            self.recipient()
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransferDirection {
    HostToDevice = 0,
    DeviceToHost = 1,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RequestType {
    Standard = 0,
    Class = 1,
    Vendor = 2,
    Reserved = 3,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Recipient {
    Device = 0,
    Interface = 1,
    Endpoint = 2,
    Other = 3,
    Reserved = 31,
}

pub const FEATURE_ENDPOINT_HALT: u16 = 0;
pub const FEATURE_DEVICE_REMOTE_WAKEUP: u16 = 1;
pub const FEATURE_TEST_MODE: u16 = 2;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FeatureSelector {
    DeviceRemoteWakeup,
    EndpointHalt,
    TestMode,
    Unknown,
}

impl FeatureSelector {
    fn get(value: u16) -> Self {
        match value {
            FEATURE_ENDPOINT_HALT => FeatureSelector::EndpointHalt,
            FEATURE_DEVICE_REMOTE_WAKEUP => FeatureSelector::DeviceRemoteWakeup,
            FEATURE_TEST_MODE => FeatureSelector::TestMode,
            _ => FeatureSelector::Unknown,
        }
    }
}

/// Source of the static descriptor blobs served by GET_DESCRIPTOR.
pub trait DescriptorProvider {
    /// Look up a descriptor by the `wValue` (type in the high byte, index in
    /// the low byte) and `wIndex` of the request. `None` or an empty slice
    /// means the descriptor does not exist.
    fn descriptor(&self, value: u16, index: u16) -> Option<&[u8]>;
}

/// A class-specific descriptor (HID, report, ...) bound to an interface.
pub struct ClassDescriptor<'a> {
    pub descriptor_type: DescriptorType,
    pub interface: u8,
    pub bytes: &'a [u8],
}

/// Descriptor tables compiled into the image.
pub struct StaticDescriptors<'a> {
    pub device: &'a [u8],
    /// Indexed by the configuration descriptor index, which is the
    /// configuration value minus one.
    pub configurations: &'a [&'a [u8]],
    /// Index 0 holds the language ID table.
    pub strings: &'a [&'a [u8]],
    pub class: &'a [ClassDescriptor<'a>],
}

impl DescriptorProvider for StaticDescriptors<'_> {
    fn descriptor(&self, value: u16, index: u16) -> Option<&[u8]> {
        let descriptor_index = (value & 0xff) as usize;
        match DescriptorType::from_u8((value >> 8) as u8)? {
            DescriptorType::Device => (descriptor_index == 0).then_some(self.device),
            DescriptorType::Configuration => self.configurations.get(descriptor_index).copied(),
            DescriptorType::String => self.strings.get(descriptor_index).copied(),
            typ => self
                .class
                .iter()
                .find(|d| d.descriptor_type == typ && d.interface as u16 == index)
                .map(|d| d.bytes),
        }
    }
}

/// Largest value `bLength` can hold.
pub const MAX_DESCRIPTOR_LEN: usize = 255;

pub trait Descriptor {
    /// Serialized size of Descriptor
    fn size(&self) -> usize;

    /// Serialize the descriptor to a buffer for transmission on the bus.
    /// Returns 0 if `buf` is too short or the descriptor does not fit in
    /// its one-byte `bLength`.
    fn write_to(&self, buf: &mut [u8]) -> usize {
        if self.size() > buf.len() || self.size() > MAX_DESCRIPTOR_LEN {
            0
        } else {
            self.write_to_unchecked(buf)
        }
    }

    /// Same as `write_to()`, but doesn't check that `buf` is long enough
    /// before indexing into it.  This should be used only if the result
    /// of `size()` is first consulted.
    fn write_to_unchecked(&self, buf: &mut [u8]) -> usize;
}

fn put_u16(buf: &mut [u8], n: u16) {
    buf[..2].copy_from_slice(&n.to_le_bytes());
}

pub struct DeviceDescriptor {
    /// Valid values include 0x0100 (USB1.0), 0x0110 (USB1.1) and 0x0200 (USB2.0)
    pub usb_release: u16,

    /// 0x00 means each interface defines its own class.
    /// 0xFF means the class behavior is defined by the vendor.
    /// All other values have meaning assigned by USB-IF
    pub class: u8,

    pub subclass: u8,

    pub protocol: u8,

    /// Max packet size for endpoint 0.  Must be 8, 16, 32 or 64
    pub max_packet_size_ep0: u8,

    /// Obtained from USB-IF
    pub vendor_id: u16,

    /// Together with `vendor_id`, this must be unique to the product
    pub product_id: u16,

    /// Device release number in binary coded decimal (BCD)
    pub device_release: u16,

    /// Index of the string descriptor describing manufacturer, or 0 if none
    pub manufacturer_string: u8,

    /// Index of the string descriptor describing product, or 0 if none
    pub product_string: u8,

    /// Index of the string descriptor giving device serial number, or 0 if none
    pub serial_number_string: u8,

    /// Number of configurations the device supports.  Must be at least one
    pub num_configurations: u8,
}

impl Default for DeviceDescriptor {
    fn default() -> Self {
        DeviceDescriptor {
            usb_release: 0x0110,
            class: 0,
            subclass: 0,
            protocol: 0,
            max_packet_size_ep0: 8,
            vendor_id: 0x6667,
            product_id: 0xabcd,
            device_release: 0x0001,
            manufacturer_string: 0,
            product_string: 0,
            serial_number_string: 0,
            num_configurations: 1,
        }
    }
}

impl Descriptor for DeviceDescriptor {
    fn size(&self) -> usize {
        18
    }

    fn write_to_unchecked(&self, buf: &mut [u8]) -> usize {
        buf[0] = 18;
        buf[1] = DescriptorType::Device as u8;
        put_u16(&mut buf[2..4], self.usb_release);
        buf[4] = self.class;
        buf[5] = self.subclass;
        buf[6] = self.protocol;
        buf[7] = self.max_packet_size_ep0;
        put_u16(&mut buf[8..10], self.vendor_id);
        put_u16(&mut buf[10..12], self.product_id);
        put_u16(&mut buf[12..14], self.device_release);
        buf[14] = self.manufacturer_string;
        buf[15] = self.product_string;
        buf[16] = self.serial_number_string;
        buf[17] = self.num_configurations;
        18
    }
}

pub struct ConfigurationDescriptor {
    pub num_interfaces: u8,
    pub configuration_value: u8,
    pub string_index: u8,
    pub attributes: ConfigurationAttributes,
    pub max_power: u8, // in 2mA units
    pub related_descriptor_length: usize,
}

impl Default for ConfigurationDescriptor {
    fn default() -> Self {
        ConfigurationDescriptor {
            num_interfaces: 1,
            configuration_value: 1,
            string_index: 0,
            attributes: ConfigurationAttributes::new(true, false),
            max_power: 0,
            related_descriptor_length: 0,
        }
    }
}

impl Descriptor for ConfigurationDescriptor {
    fn size(&self) -> usize {
        9
    }

    fn write_to_unchecked(&self, buf: &mut [u8]) -> usize {
        buf[0] = 9;
        buf[1] = DescriptorType::Configuration as u8;
        put_u16(&mut buf[2..4], (9 + self.related_descriptor_length) as u16);
        buf[4] = self.num_interfaces;
        buf[5] = self.configuration_value;
        buf[6] = self.string_index;
        buf[7] = self.attributes.into();
        buf[8] = self.max_power;
        9
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ConfigurationAttributes(u8);

impl ConfigurationAttributes {
    pub const fn new(is_self_powered: bool, supports_remote_wakeup: bool) -> Self {
        ConfigurationAttributes(
            (1 << 7)
                | if is_self_powered { 1 << 6 } else { 0 }
                | if supports_remote_wakeup { 1 << 5 } else { 0 },
        )
    }
}

impl From<ConfigurationAttributes> for u8 {
    fn from(ca: ConfigurationAttributes) -> u8 {
        ca.0
    }
}

pub struct InterfaceDescriptor {
    pub interface_number: u8,
    pub alternate_setting: u8,
    pub num_endpoints: u8,
    pub interface_class: u8,
    pub interface_subclass: u8,
    pub interface_protocol: u8,
    pub string_index: u8,
}

impl Default for InterfaceDescriptor {
    fn default() -> Self {
        InterfaceDescriptor {
            interface_number: 0,
            alternate_setting: 0,
            num_endpoints: 0,      // excluding the default control endpoint
            interface_class: 0xff, // vendor specific
            interface_subclass: 0,
            interface_protocol: 0,
            string_index: 0,
        }
    }
}

impl Descriptor for InterfaceDescriptor {
    fn size(&self) -> usize {
        9
    }

    fn write_to_unchecked(&self, buf: &mut [u8]) -> usize {
        buf[0] = 9;
        buf[1] = DescriptorType::Interface as u8;
        buf[2] = self.interface_number;
        buf[3] = self.alternate_setting;
        buf[4] = self.num_endpoints;
        buf[5] = self.interface_class;
        buf[6] = self.interface_subclass;
        buf[7] = self.interface_protocol;
        buf[8] = self.string_index;
        9
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EndpointAddress(u8);

impl EndpointAddress {
    pub const fn new(endpoint: u8, direction: TransferDirection) -> Self {
        EndpointAddress(endpoint & ENDPOINT_NUMBER_MASK | (direction as u8) << 7)
    }

    pub fn number(self) -> u8 {
        self.0 & ENDPOINT_NUMBER_MASK
    }

    pub fn is_in(self) -> bool {
        self.0 & ENDPOINT_DIR_IN != 0
    }
}

impl From<EndpointAddress> for u8 {
    fn from(address: EndpointAddress) -> u8 {
        address.0
    }
}

pub struct EndpointDescriptor {
    pub endpoint_address: EndpointAddress,
    pub transfer_type: TransferType,
    pub max_packet_size: u16,
    // Poll for device data every `interval` frames
    pub interval: u8,
}

impl Descriptor for EndpointDescriptor {
    fn size(&self) -> usize {
        7
    }

    fn write_to_unchecked(&self, buf: &mut [u8]) -> usize {
        buf[0] = 7;
        buf[1] = DescriptorType::Endpoint as u8;
        buf[2] = self.endpoint_address.0;
        // No synchronization, data endpoint.
        buf[3] = self.transfer_type as u8;
        put_u16(&mut buf[4..6], self.max_packet_size & 0x7ff);
        buf[6] = self.interval;
        7
    }
}

#[derive(Copy, Clone, Debug)]
pub enum HIDCountryCode {
    NotSupported = 0,
    German = 9,
    International = 13,
    UK = 32,
    US = 33,
}

pub struct HIDDescriptor<'a> {
    pub hid_class: u16,
    pub country_code: HIDCountryCode,
    pub sub_descriptors: &'a [HIDSubordinateDescriptor],
}

pub struct HIDSubordinateDescriptor {
    pub typ: DescriptorType,
    pub len: u16,
}

impl Descriptor for HIDDescriptor<'_> {
    fn size(&self) -> usize {
        6 + (3 * self.sub_descriptors.len())
    }

    fn write_to_unchecked(&self, buf: &mut [u8]) -> usize {
        let len = self.size();
        buf[0] = len as u8;
        buf[1] = DescriptorType::HID as u8;
        put_u16(&mut buf[2..4], self.hid_class);
        buf[4] = self.country_code as u8;
        buf[5] = self.sub_descriptors.len() as u8;
        for (i, desc) in self.sub_descriptors.iter().enumerate() {
            buf[6 + 3 * i] = desc.typ as u8;
            put_u16(&mut buf[7 + 3 * i..9 + 3 * i], desc.len);
        }
        len
    }
}

pub struct LanguagesDescriptor<'a> {
    pub langs: &'a [u16],
}

impl Descriptor for LanguagesDescriptor<'_> {
    fn size(&self) -> usize {
        2 + (2 * self.langs.len())
    }

    fn write_to_unchecked(&self, buf: &mut [u8]) -> usize {
        let len = self.size();
        buf[0] = len as u8;
        buf[1] = DescriptorType::String as u8;
        for (i, lang) in self.langs.iter().enumerate() {
            put_u16(&mut buf[2 + 2 * i..4 + 2 * i], *lang);
        }
        len
    }
}

pub struct StringDescriptor<'a> {
    pub string: &'a str,
}

impl Descriptor for StringDescriptor<'_> {
    fn size(&self) -> usize {
        2 + 2 * self.string.encode_utf16().count()
    }

    // Encode as utf16-le
    fn write_to_unchecked(&self, buf: &mut [u8]) -> usize {
        let len = self.size();
        buf[0] = len as u8;
        buf[1] = DescriptorType::String as u8;
        for (i, unit) in self.string.encode_utf16().enumerate() {
            put_u16(&mut buf[2 + 2 * i..4 + 2 * i], unit);
        }
        len
    }
}

/// Interface descriptor together with the descriptors that follow it in a
/// configuration: class descriptors first, then endpoints.
pub struct InterfaceTree<'a> {
    pub interface: InterfaceDescriptor,
    pub class: Option<&'a dyn Descriptor>,
    pub endpoints: &'a [EndpointDescriptor],
}

/// Serialize a full configuration (configuration, interfaces, class
/// descriptors, endpoints) into `buf` and return its length. The interface
/// and endpoint counts and `wTotalLength` are filled in. Returns `None` if
/// `buf` is too short.
pub fn compose_configuration(
    mut configuration: ConfigurationDescriptor,
    interfaces: &[InterfaceTree],
    buf: &mut [u8],
) -> Option<usize> {
    configuration.num_interfaces = interfaces.len() as u8;
    configuration.related_descriptor_length = interfaces
        .iter()
        .map(|tree| {
            tree.interface.size()
                + tree.class.map_or(0, |d| d.size())
                + tree.endpoints.iter().map(|d| d.size()).sum::<usize>()
        })
        .sum();
    if configuration.size() + configuration.related_descriptor_length > buf.len() {
        return None;
    }

    let mut len = configuration.write_to_unchecked(buf);
    for tree in interfaces {
        len += tree.interface.write_to_unchecked(&mut buf[len..]);
        // The count comes from the endpoint list, not the struct field.
        buf[len - 5] = tree.endpoints.len() as u8;
        if let Some(class) = tree.class {
            len += class.write_to_unchecked(&mut buf[len..]);
        }
        for endpoint in tree.endpoints {
            len += endpoint.write_to_unchecked(&mut buf[len..]);
        }
    }
    Some(len)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_get_descriptor() {
        let setup = SetupPacket::from_bytes(&[0x80, 0x06, 0x00, 0x01, 0x00, 0x00, 0x40, 0x00]);
        assert_eq!(
            setup.request_type.transfer_direction(),
            TransferDirection::DeviceToHost
        );
        assert_eq!(setup.request_type.request_type(), RequestType::Standard);
        assert_eq!(setup.request_type.recipient(), Recipient::Device);
        assert_eq!(
            setup.standard_request(),
            Some(StandardRequest::GetDescriptor {
                descriptor_type: DescriptorType::Device as u8,
                descriptor_index: 0,
                lang_id: 0,
                requested_length: 64,
            })
        );
        assert_eq!(
            setup.to_bytes(),
            [0x80, 0x06, 0x00, 0x01, 0x00, 0x00, 0x40, 0x00]
        );
    }

    #[test]
    fn class_requests_are_not_standard() {
        // HID GET_REPORT shares its code with CLEAR_FEATURE.
        let setup = SetupPacket::from_bytes(&[0xa1, 0x01, 0x00, 0x01, 0x00, 0x00, 0x08, 0x00]);
        assert_eq!(setup.request_type.request_type(), RequestType::Class);
        assert_eq!(setup.request_type.recipient(), Recipient::Interface);
        assert_eq!(setup.standard_request(), None);
    }

    #[test]
    fn set_address_masks_to_seven_bits() {
        let setup = SetupPacket::from_bytes(&[0x00, 0x05, 0xff, 0x00, 0, 0, 0, 0]);
        assert_eq!(
            setup.standard_request(),
            Some(StandardRequest::SetAddress {
                device_address: 0x7f
            })
        );
    }

    #[test]
    fn request_type_new_matches_raw_byte() {
        let rt = DeviceRequestType::new(
            TransferDirection::DeviceToHost,
            RequestType::Class,
            Recipient::Interface,
        );
        assert_eq!(rt, DeviceRequestType(0xa1));
        let rt = DeviceRequestType::new(
            TransferDirection::HostToDevice,
            RequestType::Standard,
            Recipient::Endpoint,
        );
        assert_eq!(rt, DeviceRequestType(0x02));
    }

    #[test]
    fn device_descriptor_layout() {
        let mut buf = [0u8; 18];
        let desc = DeviceDescriptor {
            vendor_id: 0x03eb,
            product_id: 0x2042,
            max_packet_size_ep0: 64,
            ..DeviceDescriptor::default()
        };
        assert_eq!(desc.write_to(&mut buf), 18);
        assert_eq!(&buf[..2], &[18, 1]);
        assert_eq!(&buf[2..4], &[0x10, 0x01]);
        assert_eq!(buf[7], 64);
        assert_eq!(&buf[8..12], &[0xeb, 0x03, 0x42, 0x20]);
        assert_eq!(desc.write_to(&mut [0u8; 17]), 0);
    }

    #[test]
    fn string_descriptor_is_utf16le() {
        let mut buf = [0u8; 16];
        let len = StringDescriptor { string: "Tö" }.write_to(&mut buf);
        assert_eq!(len, 6);
        assert_eq!(&buf[..6], &[6, 3, b'T', 0, 0xf6, 0]);
    }

    #[test]
    fn oversized_string_descriptor_is_rejected() {
        let mut buf = [0xaau8; 300];
        let long = [b'a'; 130];
        let string = core::str::from_utf8(&long).unwrap();
        assert_eq!(StringDescriptor { string }.write_to(&mut buf), 0);
        assert_eq!(buf[0], 0xaa);

        // 126 characters still fit: 2 + 2 * 126 = 254.
        let len = StringDescriptor {
            string: &string[..126],
        }
        .write_to(&mut buf);
        assert_eq!(len, 254);
        assert_eq!(buf[0] as usize, len);

        let langs = [0x0409u16; 127];
        assert_eq!(LanguagesDescriptor { langs: &langs }.write_to(&mut buf), 0);
    }

    #[test]
    fn configuration_total_length() {
        let endpoints = [EndpointDescriptor {
            endpoint_address: EndpointAddress::new(1, TransferDirection::DeviceToHost),
            transfer_type: TransferType::Interrupt,
            max_packet_size: 8,
            interval: 10,
        }];
        let hid = HIDDescriptor {
            hid_class: 0x0111,
            country_code: HIDCountryCode::NotSupported,
            sub_descriptors: &[HIDSubordinateDescriptor {
                typ: DescriptorType::Report,
                len: 63,
            }],
        };
        let trees = [InterfaceTree {
            interface: InterfaceDescriptor {
                interface_class: 0x03,
                ..InterfaceDescriptor::default()
            },
            class: Some(&hid),
            endpoints: &endpoints,
        }];
        let mut buf = [0u8; 64];
        let len = compose_configuration(ConfigurationDescriptor::default(), &trees, &mut buf);
        assert_eq!(len, Some(9 + 9 + 9 + 7));
        assert_eq!(&buf[2..4], &[34, 0]);
        assert_eq!(buf[4], 1); // bNumInterfaces
        assert_eq!(buf[9 + 4], 1); // bNumEndpoints
        assert_eq!(buf[18 + 1], DescriptorType::HID as u8);
        assert_eq!(buf[27 + 2], 0x81);

        assert_eq!(
            compose_configuration(ConfigurationDescriptor::default(), &trees, &mut [0u8; 20]),
            None
        );
    }

    #[test]
    fn static_descriptor_lookup() {
        let device = [18u8, 1, 0, 0];
        let config = [9u8, 2];
        let report = [0x05u8, 0x01];
        let table = StaticDescriptors {
            device: &device,
            configurations: &[&config],
            strings: &[&[4, 3, 0x09, 0x04]],
            class: &[ClassDescriptor {
                descriptor_type: DescriptorType::Report,
                interface: 0,
                bytes: &report,
            }],
        };
        assert_eq!(
            table.descriptor(DescriptorType::Device.value(0), 0),
            Some(&device[..])
        );
        assert_eq!(
            table.descriptor(DescriptorType::Configuration.value(0), 0),
            Some(&config[..])
        );
        assert_eq!(
            table.descriptor(DescriptorType::Configuration.value(99), 0),
            None
        );
        assert_eq!(
            table.descriptor(DescriptorType::Report.value(0), 0),
            Some(&report[..])
        );
        assert_eq!(table.descriptor(DescriptorType::Report.value(0), 1), None);
        assert_eq!(table.descriptor(0x4200, 0), None);
    }
}
