// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2023.

//! USB device core: device state machine and event dispatch.
//!
//! `UsbDevice` owns everything the device side of the USB protocol keeps
//! between transfers: the device state, the active configuration, and the
//! last setup packet. The chip's USB interrupt handler calls
//! [`UsbDevice::handle_interrupt`], and the main loop calls
//! [`UsbDevice::poll`] to run pending control transfers on endpoint 0.
//!
//! Usage
//! -----
//!
//! ```rust,ignore
//! let usb = UsbDevice::new(&controller, &DESCRIPTORS, UsbConfig::default());
//! let keyboard = HidDevice::new(&usb, 0, 1);
//! usb.set_events(&keyboard);
//! usb.init()?;
//! ```
//!
//! Application code reacts to protocol events through [`UsbEvents`]. Exactly
//! one listener is registered; every event is fire-and-forget.

use core::cell::Cell;

use kernel::config::CONFIG;
use kernel::debug;
use kernel::hil::usb::{
    device_interrupts, BankCount, DeviceInterrupt, DeviceInterrupts, DeviceSpeed, EndpointSize,
    EndpointTransport, TransferType, UsbController, UsbMode, CONTROL_ENDPOINT,
};
use kernel::utilities::cells::OptionalCell;
use kernel::ErrorCode;

use super::descriptors::{DescriptorProvider, DeviceRequestType, SetupPacket};

pub mod std_request;
pub mod stream;

pub use stream::StreamError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceState {
    /// Not connected to a host, or VBUS absent.
    Unattached,
    /// VBUS present, waiting for the host to reset the bus.
    Powered,
    /// No bus activity for more than 3 ms.
    Suspended,
    /// The host reset the bus; the device answers on address 0.
    Reset,
    /// SET_ADDRESS completed.
    Addressed,
    /// A nonzero configuration is active.
    Configured,
}

/// What the control engine does with a standard request it does not
/// implement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnsupportedRequestPolicy {
    /// Accept and do nothing. Feature requests still get a STATUS stage.
    #[default]
    Ignore,
    /// Answer with a STALL handshake on endpoint 0.
    Stall,
}

#[derive(Clone, Copy, Debug)]
pub struct UsbConfig {
    pub mode: UsbMode,
    pub speed: DeviceSpeed,
    pub control_endpoint_size: EndpointSize,
    /// Arm the start-of-frame interrupt and deliver `start_of_frame` events.
    pub start_of_frame_events: bool,
    pub unsupported_requests: UnsupportedRequestPolicy,
    /// Frames to wait for a stream endpoint before giving up.
    pub stream_timeout_frames: u16,
    /// Number of endpoints including endpoint 0.
    pub total_endpoints: u8,
}

impl Default for UsbConfig {
    fn default() -> Self {
        UsbConfig {
            mode: UsbMode::Device,
            speed: DeviceSpeed::Full,
            control_endpoint_size: EndpointSize::Bytes8,
            start_of_frame_events: false,
            unsupported_requests: UnsupportedRequestPolicy::Ignore,
            stream_timeout_frames: 100,
            total_endpoints: 7,
        }
    }
}

/// Protocol events delivered to application code.
///
/// Every method has an empty default so a listener implements only what it
/// needs.
pub trait UsbEvents {
    /// SET_CONFIGURATION selected a valid, nonzero configuration. The listener
    /// configures the endpoints of that configuration.
    fn configuration_changed(&self, _configuration: u8) {}

    /// Called after every control request, whether or not the engine handled
    /// it. Class and vendor drivers answer their own requests from here.
    fn control_request(&self, _request: u8, _request_type: DeviceRequestType, _value: u16) {}

    /// A descriptor was requested that does not exist, or endpoint 0 could
    /// not be configured.
    fn error(&self) {}

    fn suspend(&self) {}

    fn wake(&self) {}

    fn connect_with_bus(&self) {}

    fn disconnect_from_bus(&self) {}

    fn start_of_frame(&self) {}

    /// The bus reset finished and endpoint 0 is configured.
    fn end_of_reset(&self) {}
}

pub struct UsbDevice<'a, H: EndpointTransport + UsbController> {
    hw: &'a H,
    descriptors: &'a dyn DescriptorProvider,
    config: UsbConfig,
    state: Cell<DeviceState>,
    configuration: Cell<u8>,
    setup: Cell<SetupPacket>,
    events: OptionalCell<&'a dyn UsbEvents>,
}

impl<'a, H: EndpointTransport + UsbController> UsbDevice<'a, H> {
    pub fn new(hw: &'a H, descriptors: &'a dyn DescriptorProvider, config: UsbConfig) -> Self {
        UsbDevice {
            hw,
            descriptors,
            config,
            state: Cell::new(DeviceState::Unattached),
            configuration: Cell::new(0),
            setup: Cell::new(SetupPacket::default()),
            events: OptionalCell::empty(),
        }
    }

    pub fn set_events(&self, events: &'a dyn UsbEvents) {
        self.events.set(events);
    }

    pub fn state(&self) -> DeviceState {
        self.state.get()
    }

    /// Active configuration value, 0 when unconfigured.
    pub fn configuration(&self) -> u8 {
        self.configuration.get()
    }

    /// The setup packet of the current (or most recent) control transfer.
    pub fn control_request(&self) -> SetupPacket {
        self.setup.get()
    }

    pub fn hw(&self) -> &'a H {
        self.hw
    }

    pub fn config(&self) -> &UsbConfig {
        &self.config
    }

    fn bus_interrupts(&self) -> DeviceInterrupts {
        let mut fields = DeviceInterrupt::VBUS::SET
            + DeviceInterrupt::SUSPEND::SET
            + DeviceInterrupt::END_OF_RESET::SET;
        if self.config.start_of_frame_events {
            fields = fields + DeviceInterrupt::START_OF_FRAME::SET;
        }
        device_interrupts(fields)
    }

    /// Power up the controller and attach to the bus.
    ///
    /// The device becomes `Powered` right away if VBUS is already present,
    /// otherwise it stays `Unattached` until the VBUS interrupt fires.
    pub fn init(&self) -> Result<(), ErrorCode> {
        if self.config.mode != UsbMode::Device {
            return Err(ErrorCode::NOSUPPORT);
        }
        self.state.set(DeviceState::Unattached);
        self.configuration.set(0);

        self.hw.enable(self.config.speed);
        self.hw.clear_interrupts(DeviceInterrupts::new(0xff));
        self.hw.enable_interrupts(self.bus_interrupts());
        self.hw.attach();

        if self.hw.vbus_present() {
            self.connect();
        }
        Ok(())
    }

    /// Detach from the bus and power the controller down.
    pub fn disable(&self) {
        self.hw.detach();
        self.hw.disable_interrupts(DeviceInterrupts::new(0xff));
        self.hw.disable();
        self.hw.disable_pll();
        self.state.set(DeviceState::Unattached);
        self.configuration.set(0);
    }

    /// Foreground entry point. Runs the control transfer waiting on
    /// endpoint 0, if any, and restores the endpoint selection afterwards.
    pub fn poll(&self) {
        if self.state.get() == DeviceState::Unattached {
            return;
        }
        let previous = self.hw.selected();
        self.hw.select(CONTROL_ENDPOINT);
        if self.hw.setup_received() {
            self.handle_control_request();
        }
        self.hw.select(previous);
    }

    /// Service the pending device-level interrupts.
    pub fn handle_interrupt(&self) {
        let active = DeviceInterrupts::new(
            self.hw.pending_interrupts().get() & self.hw.enabled_interrupts().get(),
        );

        if active.is_set(DeviceInterrupt::START_OF_FRAME) {
            self.hw
                .clear_interrupts(device_interrupts(DeviceInterrupt::START_OF_FRAME::SET));
            self.events.map(|e| e.start_of_frame());
        }

        if active.is_set(DeviceInterrupt::VBUS) {
            self.hw
                .clear_interrupts(device_interrupts(DeviceInterrupt::VBUS::SET));
            if self.hw.vbus_present() {
                self.connect();
            } else {
                self.disconnect();
            }
        }

        // A bus reset in the same pass supersedes the suspend.
        if active.is_set(DeviceInterrupt::SUSPEND)
            && !active.is_set(DeviceInterrupt::END_OF_RESET)
        {
            self.hw
                .disable_interrupts(device_interrupts(DeviceInterrupt::SUSPEND::SET));
            self.hw
                .enable_interrupts(device_interrupts(DeviceInterrupt::WAKE::SET));
            self.hw.clear_interrupts(device_interrupts(
                DeviceInterrupt::SUSPEND::SET + DeviceInterrupt::WAKE::SET,
            ));
            self.hw.freeze_clock();

            if CONFIG.trace_bus_events {
                debug!("usb: suspend");
            }
            self.state.set(DeviceState::Suspended);
            self.events.map(|e| e.suspend());
        }

        if active.is_set(DeviceInterrupt::WAKE) {
            self.hw.enable_clock();
            self.hw
                .clear_interrupts(device_interrupts(DeviceInterrupt::WAKE::SET));
            self.hw
                .disable_interrupts(device_interrupts(DeviceInterrupt::WAKE::SET));
            self.hw
                .enable_interrupts(device_interrupts(DeviceInterrupt::SUSPEND::SET));

            let state = if self.configuration.get() > 0 {
                DeviceState::Configured
            } else if self.hw.is_address_enabled() {
                DeviceState::Addressed
            } else {
                DeviceState::Powered
            };
            if CONFIG.trace_bus_events {
                debug!("usb: wake -> {:?}", state);
            }
            self.state.set(state);
            self.events.map(|e| e.wake());
        }

        if active.is_set(DeviceInterrupt::END_OF_RESET) {
            self.end_of_reset();
        }
    }

    fn connect(&self) {
        self.hw.enable_pll();
        self.hw.enable_clock();
        if CONFIG.trace_bus_events {
            debug!("usb: vbus connected");
        }
        self.state.set(DeviceState::Powered);
        self.events.map(|e| e.connect_with_bus());
    }

    fn disconnect(&self) {
        self.hw.disable_pll();
        if CONFIG.trace_bus_events {
            debug!("usb: vbus removed");
        }
        self.configuration.set(0);
        self.state.set(DeviceState::Unattached);
        self.events.map(|e| e.disconnect_from_bus());
    }

    fn end_of_reset(&self) {
        self.hw.clear_interrupts(device_interrupts(
            DeviceInterrupt::END_OF_RESET::SET + DeviceInterrupt::SUSPEND::SET,
        ));
        self.hw
            .disable_interrupts(device_interrupts(DeviceInterrupt::WAKE::SET));
        self.hw
            .enable_interrupts(device_interrupts(DeviceInterrupt::SUSPEND::SET));
        self.hw.enable_clock();

        self.configuration.set(0);
        self.state.set(DeviceState::Reset);

        let previous = self.hw.selected();
        let result = self.hw.configure(
            CONTROL_ENDPOINT,
            TransferType::Control,
            self.config.control_endpoint_size,
            BankCount::Single,
        );
        self.hw.select(previous);

        match result {
            Ok(()) => {
                if CONFIG.trace_bus_events {
                    debug!("usb: end of reset");
                }
                self.events.map(|e| e.end_of_reset());
            }
            Err(err) => {
                debug!("usb: control endpoint configuration failed: {:?}", err);
                self.events.map(|e| e.error());
            }
        }
    }
}
