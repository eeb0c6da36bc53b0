// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2023.

//! Control transfer engine for the standard device requests (USB 2.0
//! chapter 9.4).

use kernel::config::CONFIG;
use kernel::debug;
use kernel::hil::usb::{EndpointTransport, UsbController, CONTROL_ENDPOINT, ENDPOINT_NUMBER_MASK};

use super::{DeviceState, UnsupportedRequestPolicy, UsbDevice};
use crate::usb::descriptors::{
    DescriptorType, FeatureSelector, Recipient, RequestType, SetupPacket, StandardRequest,
    TransferDirection,
};
use crate::usb::device::StreamError;

/// Value returned for GET_INTERFACE. Alternate settings are not tracked.
const ALTERNATE_SETTING: u8 = 1;

impl<'a, H: EndpointTransport + UsbController> UsbDevice<'a, H> {
    /// Run one control transfer to completion. Endpoint 0 must be selected
    /// and hold a SETUP packet.
    ///
    /// The registered `control_request` event fires at the end, whatever
    /// the request and its outcome.
    pub fn handle_control_request(&self) {
        let mut raw = [0u8; SetupPacket::SIZE];
        for byte in raw.iter_mut() {
            *byte = self.hw.read_byte();
        }
        self.hw.clear_setup();

        let setup = SetupPacket::from_bytes(&raw);
        self.setup.set(setup);
        if CONFIG.trace_control_requests {
            debug!(
                "usb: setup {:?} request {:#04x} value {:#06x} index {:#06x} length {}",
                setup.request_type, setup.request, setup.value, setup.index, setup.length
            );
        }

        let result = match setup.standard_request() {
            Some(request) => self.standard_request(&setup, request),
            None if setup.request_type.request_type() == RequestType::Standard => {
                self.unsupported(&setup, false)
            }
            // Class and vendor requests belong to the `control_request` listener.
            None => Ok(()),
        };

        if CONFIG.trace_control_requests {
            if let Err(err) = result {
                debug!("usb: request {:#04x} aborted: {:?}", setup.request, err);
            }
        }

        self.events
            .map(|e| e.control_request(setup.request, setup.request_type, setup.value));
    }

    fn standard_request(
        &self,
        setup: &SetupPacket,
        request: StandardRequest,
    ) -> Result<(), StreamError> {
        let direction = setup.request_type.transfer_direction();
        let recipient = setup.request_type.recipient();

        match (request, direction, recipient) {
            (
                StandardRequest::GetStatus { recipient_index },
                TransferDirection::DeviceToHost,
                _,
            ) => self.get_status(setup, recipient, recipient_index),

            (
                StandardRequest::ClearFeature {
                    feature,
                    recipient_index,
                },
                TransferDirection::HostToDevice,
                _,
            ) => self.endpoint_feature(setup, recipient, feature, recipient_index, false),

            (
                StandardRequest::SetFeature {
                    feature,
                    recipient_index,
                    ..
                },
                TransferDirection::HostToDevice,
                _,
            ) => self.endpoint_feature(setup, recipient, feature, recipient_index, true),

            (
                StandardRequest::SetAddress { device_address },
                TransferDirection::HostToDevice,
                Recipient::Device,
            ) => {
                // The status handshake still runs on the old address.
                self.hw.set_address(device_address);
                self.status_stage(TransferDirection::HostToDevice)?;
                self.hw.enable_address();
                self.state.set(DeviceState::Addressed);
                Ok(())
            }

            (
                StandardRequest::GetDescriptor {
                    requested_length, ..
                },
                TransferDirection::DeviceToHost,
                Recipient::Device | Recipient::Interface,
            ) => match self.descriptors.descriptor(setup.value, setup.index) {
                Some(bytes) if !bytes.is_empty() => self.control_in(bytes, requested_length),
                _ => {
                    if CONFIG.trace_control_requests {
                        debug!(
                            "usb: no descriptor {:#06x} index {:#06x}",
                            setup.value, setup.index
                        );
                    }
                    self.events.map(|e| e.error());
                    if self.config.unsupported_requests == UnsupportedRequestPolicy::Stall {
                        self.hw.stall();
                    }
                    Ok(())
                }
            },

            (
                StandardRequest::GetConfiguration,
                TransferDirection::DeviceToHost,
                Recipient::Device,
            ) => {
                self.hw.write_byte(self.configuration.get());
                self.hw.flush_in();
                self.status_stage(TransferDirection::DeviceToHost)
            }

            (
                StandardRequest::SetConfiguration {
                    configuration_value,
                },
                TransferDirection::HostToDevice,
                Recipient::Device,
            ) => self.set_configuration(setup, configuration_value),

            (StandardRequest::GetInterface { .. }, TransferDirection::DeviceToHost, _) => {
                self.hw.write_byte(ALTERNATE_SETTING);
                self.hw.flush_in();
                self.status_stage(TransferDirection::DeviceToHost)
            }

            // Alternate settings are not implemented.
            (StandardRequest::SetInterface { .. }, TransferDirection::HostToDevice, _) => Ok(()),

            _ => self.unsupported(setup, false),
        }
    }

    fn get_status(
        &self,
        setup: &SetupPacket,
        recipient: Recipient,
        recipient_index: u16,
    ) -> Result<(), StreamError> {
        let status: u16 = match recipient {
            Recipient::Device | Recipient::Interface => 0,
            Recipient::Endpoint => {
                let endpoint = recipient_index as u8 & ENDPOINT_NUMBER_MASK;
                if endpoint >= self.config.total_endpoints {
                    return self.unsupported(setup, false);
                }
                self.hw.select(endpoint);
                let halted = self.hw.is_stalled();
                self.hw.select(CONTROL_ENDPOINT);
                halted as u16
            }
            Recipient::Other | Recipient::Reserved => return self.unsupported(setup, false),
        };

        self.hw.write_integer(status);
        self.hw.flush_in();
        self.status_stage(TransferDirection::DeviceToHost)
    }

    /// CLEAR_FEATURE and SET_FEATURE. Only ENDPOINT_HALT on a non-control
    /// endpoint does anything.
    fn endpoint_feature(
        &self,
        setup: &SetupPacket,
        recipient: Recipient,
        feature: FeatureSelector,
        recipient_index: u16,
        set: bool,
    ) -> Result<(), StreamError> {
        let endpoint = recipient_index as u8 & ENDPOINT_NUMBER_MASK;
        let acted_on = recipient == Recipient::Endpoint
            && feature == FeatureSelector::EndpointHalt
            && endpoint != CONTROL_ENDPOINT
            && endpoint < self.config.total_endpoints;
        if !acted_on {
            return self.unsupported(setup, true);
        }

        self.hw.select(endpoint);
        if set {
            self.hw.stall();
        } else {
            self.hw.clear_stall();
        }
        self.hw.select(CONTROL_ENDPOINT);
        self.status_stage(TransferDirection::HostToDevice)
    }

    fn set_configuration(&self, setup: &SetupPacket, configuration: u8) -> Result<(), StreamError> {
        self.status_stage(TransferDirection::HostToDevice)?;

        if configuration == 0 {
            self.configuration.set(0);
            self.state.set(DeviceState::Addressed);
            return Ok(());
        }

        // Configuration values start at 1, descriptor indices at 0.
        let value = DescriptorType::Configuration.value(configuration - 1);
        match self.descriptors.descriptor(value, setup.index) {
            Some(bytes) if !bytes.is_empty() => {
                self.configuration.set(configuration);
                self.state.set(DeviceState::Configured);
                self.events.map(|e| e.configuration_changed(configuration));
            }
            _ => {
                if CONFIG.trace_control_requests {
                    debug!("usb: no configuration {}", configuration);
                }
                self.events.map(|e| e.error());
            }
        }
        Ok(())
    }

    /// A standard request this engine does not implement. Under the `Ignore`
    /// policy the request is dropped, or acknowledged when `acknowledge` is
    /// set.
    fn unsupported(&self, setup: &SetupPacket, acknowledge: bool) -> Result<(), StreamError> {
        match self.config.unsupported_requests {
            UnsupportedRequestPolicy::Stall => {
                if CONFIG.trace_control_requests {
                    debug!("usb: stall request {:#04x}", setup.request);
                }
                self.hw.stall();
                Ok(())
            }
            UnsupportedRequestPolicy::Ignore if acknowledge => {
                self.status_stage(setup.request_type.transfer_direction())
            }
            UnsupportedRequestPolicy::Ignore => Ok(()),
        }
    }
}
