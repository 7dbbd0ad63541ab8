//! Rust library for driving Enttec DMX USB Pro style widgets. It sends and receives DMX512
//! (ANSI E1.11) universes and talks DMX-RDM (ANSI E1.20) through the widget, including
//! binary search discovery. The core features no-std as well as no-alloc support
//! (no heap allocation), the transport and clock are traits so any serial implementation
//! can be plugged in.
//!
//! Please refer to the [official specifications](https://tsp.esta.org/) published by the ESTA
//! and the Enttec DMX USB Pro api documentation.
//!
//! # Usage
//! These examples use the serial port transport from the `serialport` feature.
//!
//! ## Controller
//!
//! ```rust,ignore
//! use dmx_rdm_usbpro::discovery::discover_all;
//! use dmx_rdm_usbpro::serial_transport::SerialPortTransport;
//! use dmx_rdm_usbpro::transport::StdClock;
//! use dmx_rdm_usbpro::widget_session::{WidgetSession, WidgetSessionConfig};
//!
//! let transport = SerialPortTransport::open("/dev/ttyUSB0").unwrap();
//! let mut session = WidgetSession::new(transport, StdClock::new(), WidgetSessionConfig::default());
//!
//! let parameters = session.query_widget_parameters().unwrap();
//! println!("Widget {} with firmware {:?}", session.serial_hex_string().unwrap(),
//!     parameters.firmware_version_parts());
//!
//! // Search for devices, there is space for 64 of them.
//! let mut devices_found = heapless::Vec::<_, 64>::new();
//! discover_all(&mut session, &mut devices_found).unwrap();
//!
//! for device in devices_found {
//!     match session.rdm_set_identify(device, true) {
//!         Ok(_) => println!("Activated identify for device_uid {device}"),
//!         Err(error) => {
//!             println!("Activating identify for device_uid {device} failed with {error}")
//!         },
//!     }
//! }
//!
//! session.send_dmx(&[255, 0, 128]).unwrap();
//! ```
//!
//! ## Receiving
//!
//! ```rust,ignore
//! use dmx_rdm_usbpro::rdm_packet::RdmPacket;
//! use dmx_rdm_usbpro::serial_transport::SerialPortTransport;
//! use dmx_rdm_usbpro::transport::StdClock;
//! use dmx_rdm_usbpro::unique_identifier::UniqueIdentifier;
//! use dmx_rdm_usbpro::widget_session::{WidgetEventHandler, WidgetSession, WidgetSessionConfig};
//!
//! struct Printer;
//!
//! impl WidgetEventHandler for Printer {
//!     fn handle_dmx(&mut self, levels: &[u8]) {
//!         println!("Channel 1 is at {}", levels[0]);
//!     }
//!
//!     fn handle_rdm(&mut self, packet: &RdmPacket) {
//!         println!("Rdm package from {}", packet.source_uid());
//!     }
//! }
//!
//! let transport = SerialPortTransport::open_index(0).unwrap();
//! let mut session = WidgetSession::new(transport, StdClock::new(), WidgetSessionConfig::default());
//!
//! // Only report channels that changed.
//! session.set_receive_dmx_on_change(true).unwrap();
//!
//! loop {
//!     match session.poll(&mut Printer) {
//!         Ok(_) => std::thread::sleep(std::time::Duration::from_millis(10)),
//!         Err(error) => println!("'{error}' during polling"),
//!     }
//! }
//! ```
//!

#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Change of state reception, where the widget only reports channels that changed.
pub mod change_of_state;
pub mod command_class;
pub mod consts;
/// Binary search discovery of rdm responders.
pub mod discovery;
mod layouts;
pub mod pids;
pub mod rdm_packet;
/// Typed rdm requests for common parameters.
pub mod rdm_parameters;
pub mod rdm_types;
/// Serial port transport.
#[cfg(feature = "serialport")]
#[cfg_attr(docsrs, doc(cfg(feature = "serialport")))]
pub mod serial_transport;
/// Traits to plug in the byte stream to the widget and a clock.
pub mod transport;
pub mod types;
pub mod unique_identifier;
pub mod utils;
/// Framing of the widget messages.
pub mod widget_frame;
pub mod widget_parameters;
/// The connection to a widget.
pub mod widget_session;
