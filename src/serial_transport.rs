use std::io::{Read, Write};
use std::time::Duration;

use serialport::{DataBits, Parity, SerialPort, StopBits};

use crate::consts::WIDGET_BAUD;
use crate::transport::WidgetTransport;

/// Reads only ask for bytes that are already buffered, this merely bounds a stuck driver.
const SERIAL_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub enum SerialTransportError {
    /// There is no serial port with this index.
    PortNotFound(usize),
    /// The port could not be opened or queried.
    Serial(serialport::Error),
    /// Reading or writing failed.
    Io(std::io::Error),
}

impl core::fmt::Display for SerialTransportError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SerialTransportError::PortNotFound(index) => write!(f, "no serial port #{}", index),
            SerialTransportError::Serial(error) => write!(f, "serial port error: {}", error),
            SerialTransportError::Io(error) => write!(f, "io error: {}", error),
        }
    }
}

impl std::error::Error for SerialTransportError {}

impl From<serialport::Error> for SerialTransportError {
    fn from(value: serialport::Error) -> Self {
        Self::Serial(value)
    }
}

impl From<std::io::Error> for SerialTransportError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// A widget attached to a (virtual) serial port, 57600 baud 8N1.
pub struct SerialPortTransport {
    port: Box<dyn SerialPort>,
}

impl SerialPortTransport {
    /// Opens the port by name, e.g. `/dev/ttyUSB0` or `COM3`.
    pub fn open(path: &str) -> Result<Self, SerialTransportError> {
        let port = serialport::new(path, WIDGET_BAUD)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(SERIAL_TIMEOUT)
            .open()?;

        log::info!("opened widget on {}", path);

        Ok(Self { port })
    }

    /// Opens the n-th port the operating system lists.
    pub fn open_index(index: usize) -> Result<Self, SerialTransportError> {
        let ports = serialport::available_ports()?;
        let port_info = ports
            .get(index)
            .ok_or(SerialTransportError::PortNotFound(index))?;

        Self::open(&port_info.port_name)
    }

    /// Wraps an already configured port.
    pub fn from_port(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl WidgetTransport for SerialPortTransport {
    type TransportError = SerialTransportError;

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::TransportError> {
        self.port.write_all(data)?;
        self.port.flush()?;

        Ok(data.len())
    }

    fn bytes_available(&mut self) -> Result<usize, Self::TransportError> {
        Ok(self.port.bytes_to_read()? as usize)
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, Self::TransportError> {
        match self.port.read(buffer) {
            Ok(bytes_read) => Ok(bytes_read),
            Err(error) if error.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(error) => Err(error.into()),
        }
    }
}
