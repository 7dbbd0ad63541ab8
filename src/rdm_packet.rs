use crate::command_class::CommandClass;
use crate::consts::{
    PREAMBLE_BYTE, RDM_CHECKSUM_SIZE, RDM_DISCOVERY_RESPONSE_SIZE, RDM_HEADER_SIZE,
    RDM_MAX_DISCOVERY_RESPONSE_SIZE, RDM_MAX_PACKAGE_SIZE, RDM_MAX_PARAMETER_DATA_LENGTH,
    RDM_MAX_PREAMBLE_SIZE, RDM_MIN_PACKAGE_SIZE, SC_RDM, SC_SUB_MESSAGE, SEPARATOR_BYTE,
};
use crate::layouts::rdm_packet_layout;
use crate::pids;
use crate::types::ResponseType;
use crate::unique_identifier::UniqueIdentifier;
use crate::utils::{calculate_checksum, decode_disc_unique, encode_disc_unique};

/// Port id requests are sent with, the widget only has the one port.
const REQUEST_PORT_ID: u8 = 0x01;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RdmPacketError {
    /// Buffer must hold at least the header and the checksum (26 bytes).
    BufferTooSmall,
    /// Received wrong start code (0xCC) or sub start code (0x01).
    WrongStartCode,
    /// The buffer is shorter than the parameter data length announces; contains the buffer size.
    WrongMessageLength(usize),
    /// The parameter data does not fit into one package; contains the requested size.
    ParameterDataTooLong(usize),
    /// Tried to read past the parameter data.
    OutOfRange { offset: usize, length: usize },
    /// The parameter data is not a valid string.
    InvalidString,
    /// A discovery response without the 0xAA separator after its preamble.
    MissingSeparator,
    /// The command class was not found; contains contents of command class field.
    UnknownCommandClass(u8),
    /// The response type was not found; contains contents of response type field.
    UnknownResponseType(u8),
}

impl core::fmt::Display for RdmPacketError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RdmPacketError::BufferTooSmall => write!(f, "buffer too small"),
            RdmPacketError::WrongStartCode => write!(f, "start code is incorrect"),
            RdmPacketError::WrongMessageLength(size) => {
                write!(f, "buffer of {} bytes is shorter than announced", size)
            },
            RdmPacketError::ParameterDataTooLong(size) => {
                write!(f, "{} bytes of parameter data do not fit into a package", size)
            },
            RdmPacketError::OutOfRange { offset, length } => write!(
                f,
                "offset {} is out of range for {} bytes of parameter data",
                offset, length
            ),
            RdmPacketError::InvalidString => write!(f, "parameter data is not a valid string"),
            RdmPacketError::MissingSeparator => {
                write!(f, "discovery response separator is missing")
            },
            RdmPacketError::UnknownCommandClass(command_class) => {
                write!(f, "command class {} not found", command_class)
            },
            RdmPacketError::UnknownResponseType(response_type) => {
                write!(f, "response type {} is unknown", response_type)
            },
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RdmPacketError {}

/// An rdm package kept in its wire representation.
///
/// All fields are read from and written to the byte buffer directly, so a package that came in
/// with a broken checksum can still be inspected. Setters leave the checksum alone, call
/// [RdmPacket::update_checksum] once all fields are in place.
#[derive(Clone)]
pub struct RdmPacket {
    buffer: [u8; RDM_MAX_PACKAGE_SIZE],
    length: usize,
}

impl RdmPacket {
    /// Zeroed package with start codes and length fields filled in.
    /// `parameter_data_length` has to be checked by the caller.
    fn blank(parameter_data_length: usize) -> Self {
        debug_assert!(parameter_data_length <= RDM_MAX_PARAMETER_DATA_LENGTH);

        let mut packet = Self {
            buffer: [0u8; RDM_MAX_PACKAGE_SIZE],
            length: RDM_MIN_PACKAGE_SIZE,
        };

        let mut view = rdm_packet_layout::View::new(&mut packet.buffer[..]);
        view.start_code_mut().write(SC_RDM);
        view.sub_start_code_mut().write(SC_SUB_MESSAGE);
        packet.resize_parameter_data(parameter_data_length);

        packet
    }

    fn resize_parameter_data(&mut self, parameter_data_length: usize) {
        self.length = RDM_MIN_PACKAGE_SIZE + parameter_data_length;
        // Keep the bytes past the end zeroed so equal packages compare equal.
        self.buffer[self.length..].fill(0);

        let mut view = rdm_packet_layout::View::new(&mut self.buffer[..]);
        view.message_length_mut()
            .write((RDM_HEADER_SIZE + parameter_data_length) as u8);
        view.parameter_data_length_mut()
            .write(parameter_data_length as u8);
    }

    /// Builds a complete package including the checksum.
    pub fn encode(
        destination_uid: UniqueIdentifier,
        source_uid: UniqueIdentifier,
        transaction_number: u8,
        command_class: CommandClass,
        parameter_id: u16,
        parameter_data: &[u8],
    ) -> Result<Self, RdmPacketError> {
        if parameter_data.len() > RDM_MAX_PARAMETER_DATA_LENGTH {
            return Err(RdmPacketError::ParameterDataTooLong(
                parameter_data.len(),
            ));
        }

        let mut packet = Self::blank(parameter_data.len());
        packet.set_destination_uid(destination_uid);
        packet.set_source_uid(source_uid);
        packet.set_transaction_number(transaction_number);
        packet.set_command_class(command_class);
        packet.set_parameter_id(parameter_id);
        packet.parameter_data_mut().copy_from_slice(parameter_data);
        packet.update_checksum();

        Ok(packet)
    }

    /// A request without parameter data. Source uid and transaction number are stamped
    /// by the session when the request gets sent.
    pub fn new(
        destination_uid: UniqueIdentifier,
        command_class: CommandClass,
        parameter_id: u16,
    ) -> Self {
        let mut packet = Self::blank(0);
        packet.set_destination_uid(destination_uid);
        packet.set_port_id(REQUEST_PORT_ID);
        packet.set_command_class(command_class);
        packet.set_parameter_id(parameter_id);
        packet.update_checksum();

        packet
    }

    /// DISC_UNIQUE_BRANCH request for the inclusive uid range `lower..=upper`.
    pub fn discovery_unique_branch(lower: UniqueIdentifier, upper: UniqueIdentifier) -> Self {
        let mut packet = Self::blank(12);
        packet.set_destination_uid(UniqueIdentifier::BROADCAST);
        packet.set_source_uid(UniqueIdentifier::BROADCAST);
        packet.set_port_id(REQUEST_PORT_ID);
        packet.set_command_class(CommandClass::DiscoveryCommand);
        packet.set_parameter_id(pids::DISC_UNIQUE_BRANCH);

        let parameter_data = packet.parameter_data_mut();
        parameter_data[..6].copy_from_slice(&lower.to_bytes());
        parameter_data[6..].copy_from_slice(&upper.to_bytes());
        packet.update_checksum();

        packet
    }

    pub fn disc_mute(uid: UniqueIdentifier) -> Self {
        Self::new(uid, CommandClass::DiscoveryCommand, pids::DISC_MUTE)
    }

    pub fn disc_un_mute(uid: UniqueIdentifier) -> Self {
        Self::new(uid, CommandClass::DiscoveryCommand, pids::DISC_UN_MUTE)
    }

    /// Parses a package. The checksum is not verified, use [RdmPacket::validate] for that.
    /// Bytes following the checksum are ignored.
    pub fn decode(buffer: &[u8]) -> Result<Self, RdmPacketError> {
        if buffer.len() < RDM_MIN_PACKAGE_SIZE {
            return Err(RdmPacketError::BufferTooSmall);
        }

        let view = rdm_packet_layout::View::new(buffer);
        if view.start_code().read() != SC_RDM || view.sub_start_code().read() != SC_SUB_MESSAGE
        {
            return Err(RdmPacketError::WrongStartCode);
        }

        let parameter_data_length = view.parameter_data_length().read() as usize;
        if parameter_data_length > RDM_MAX_PARAMETER_DATA_LENGTH {
            return Err(RdmPacketError::ParameterDataTooLong(
                parameter_data_length,
            ));
        }

        let length = RDM_MIN_PACKAGE_SIZE + parameter_data_length;
        if buffer.len() < length {
            return Err(RdmPacketError::WrongMessageLength(buffer.len()));
        }

        let mut packet = Self {
            buffer: [0u8; RDM_MAX_PACKAGE_SIZE],
            length,
        };
        packet.buffer[..length].copy_from_slice(&buffer[..length]);

        Ok(packet)
    }

    /// The package as it goes onto the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.length]
    }

    fn view(&self) -> rdm_packet_layout::View<&[u8]> {
        rdm_packet_layout::View::new(self.as_bytes())
    }

    fn view_mut(&mut self) -> rdm_packet_layout::View<&mut [u8]> {
        rdm_packet_layout::View::new(&mut self.buffer[..self.length])
    }

    pub fn calculate_checksum(&self) -> u16 {
        calculate_checksum(&self.buffer[..self.length - RDM_CHECKSUM_SIZE])
    }

    /// The checksum stored in the package.
    pub fn checksum(&self) -> u16 {
        u16::from_be_bytes([
            self.buffer[self.length - 2],
            self.buffer[self.length - 1],
        ])
    }

    pub fn update_checksum(&mut self) {
        let checksum = self.calculate_checksum();
        let length = self.length;
        self.buffer[length - RDM_CHECKSUM_SIZE..length].copy_from_slice(&checksum.to_be_bytes());
    }

    /// True if the stored checksum matches the package contents.
    pub fn validate(&self) -> bool {
        self.checksum() == self.calculate_checksum()
    }

    pub fn message_length(&self) -> u8 {
        self.view().message_length().read()
    }

    pub fn destination_uid(&self) -> UniqueIdentifier {
        UniqueIdentifier::from_bytes(self.view().destination_uid())
    }

    pub fn set_destination_uid(&mut self, uid: UniqueIdentifier) {
        self.view_mut()
            .destination_uid_mut()
            .copy_from_slice(&uid.to_bytes());
    }

    pub fn source_uid(&self) -> UniqueIdentifier {
        UniqueIdentifier::from_bytes(self.view().source_uid())
    }

    pub fn set_source_uid(&mut self, uid: UniqueIdentifier) {
        self.view_mut()
            .source_uid_mut()
            .copy_from_slice(&uid.to_bytes());
    }

    pub fn transaction_number(&self) -> u8 {
        self.view().transaction_number().read()
    }

    pub fn set_transaction_number(&mut self, transaction_number: u8) {
        self.view_mut()
            .transaction_number_mut()
            .write(transaction_number);
    }

    /// Requests carry the port id where responses carry the response type.
    pub fn port_id(&self) -> u8 {
        self.view().port_id_response_type().read()
    }

    pub fn set_port_id(&mut self, port_id: u8) {
        self.view_mut().port_id_response_type_mut().write(port_id);
    }

    pub fn response_type(&self) -> Result<ResponseType, RdmPacketError> {
        ResponseType::try_from(self.port_id()).map_err(RdmPacketError::UnknownResponseType)
    }

    pub fn set_response_type(&mut self, response_type: ResponseType) {
        self.set_port_id(response_type.into());
    }

    pub fn message_count(&self) -> u8 {
        self.view().message_count().read()
    }

    pub fn set_message_count(&mut self, message_count: u8) {
        self.view_mut().message_count_mut().write(message_count);
    }

    pub fn sub_device(&self) -> u16 {
        self.view().sub_device().read()
    }

    pub fn set_sub_device(&mut self, sub_device: u16) {
        self.view_mut().sub_device_mut().write(sub_device);
    }

    pub fn command_class(&self) -> Result<CommandClass, RdmPacketError> {
        let command_class = self.view().command_class().read();
        CommandClass::try_from(command_class).map_err(RdmPacketError::UnknownCommandClass)
    }

    pub fn set_command_class(&mut self, command_class: CommandClass) {
        self.view_mut()
            .command_class_mut()
            .write(command_class.into());
    }

    /// The parameter id in host order. On the wire it is big endian.
    pub fn parameter_id(&self) -> u16 {
        self.view().parameter_id().read()
    }

    pub fn set_parameter_id(&mut self, parameter_id: u16) {
        self.view_mut().parameter_id_mut().write(parameter_id);
    }

    pub fn parameter_data_length(&self) -> u8 {
        self.view().parameter_data_length().read()
    }

    pub fn parameter_data(&self) -> &[u8] {
        &self.buffer[RDM_HEADER_SIZE..self.length - RDM_CHECKSUM_SIZE]
    }

    fn parameter_data_mut(&mut self) -> &mut [u8] {
        let end = self.length - RDM_CHECKSUM_SIZE;
        &mut self.buffer[RDM_HEADER_SIZE..end]
    }

    /// Replaces the parameter data, adjusting message length and parameter data length.
    pub fn set_parameter_data(&mut self, parameter_data: &[u8]) -> Result<(), RdmPacketError> {
        if parameter_data.len() > RDM_MAX_PARAMETER_DATA_LENGTH {
            return Err(RdmPacketError::ParameterDataTooLong(
                parameter_data.len(),
            ));
        }

        self.resize_parameter_data(parameter_data.len());
        self.parameter_data_mut().copy_from_slice(parameter_data);

        Ok(())
    }

    fn parameter_data_slice(&self, offset: usize, size: usize) -> Result<&[u8], RdmPacketError> {
        let parameter_data = self.parameter_data();

        match offset.checked_add(size) {
            Some(end) if end <= parameter_data.len() => Ok(&parameter_data[offset..end]),
            _ => Err(RdmPacketError::OutOfRange {
                offset,
                length: parameter_data.len(),
            }),
        }
    }

    pub fn parameter_data_as_uid(&self, offset: usize) -> Result<UniqueIdentifier, RdmPacketError> {
        let mut uid_bytes = [0u8; 6];
        uid_bytes.copy_from_slice(self.parameter_data_slice(offset, 6)?);

        Ok(UniqueIdentifier::from_bytes(&uid_bytes))
    }

    /// Reads a big endian u16 from the parameter data.
    pub fn parameter_data_as_u16(&self, offset: usize) -> Result<u16, RdmPacketError> {
        let bytes = self.parameter_data_slice(offset, 2)?;

        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Reads the rest of the parameter data as a string. Rdm labels may be NUL padded,
    /// the string ends at the first NUL.
    pub fn parameter_data_as_str(&self, offset: usize) -> Result<&str, RdmPacketError> {
        let remaining = self.parameter_data().len().saturating_sub(offset);
        let bytes = self.parameter_data_slice(offset, remaining)?;
        let end = bytes.iter().position(|&byte| byte == 0).unwrap_or(bytes.len());

        core::str::from_utf8(&bytes[..end]).map_err(|_| RdmPacketError::InvalidString)
    }
}

impl PartialEq for RdmPacket {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for RdmPacket {}

impl core::fmt::Debug for RdmPacket {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RdmPacket")
            .field("destination_uid", &self.destination_uid())
            .field("source_uid", &self.source_uid())
            .field("transaction_number", &self.transaction_number())
            .field("port_id_response_type", &self.port_id())
            .field("command_class", &self.view().command_class().read())
            .field("parameter_id", &self.parameter_id())
            .field("parameter_data", &self.parameter_data())
            .field("valid", &self.validate())
            .finish()
    }
}

/// Decodes the response to a DISC_UNIQUE_BRANCH request.
///
/// The response is no regular package: up to seven 0xFE preamble bytes, the 0xAA separator,
/// the uid with every byte spread over two bytes and the checksum encoded the same way.
/// Returns `Ok(None)` if the checksum does not match, which usually means several responders
/// answered at once.
pub fn decode_discovery_uid(buffer: &[u8]) -> Result<Option<UniqueIdentifier>, RdmPacketError> {
    let separator_index = match buffer
        .iter()
        .take(RDM_MAX_PREAMBLE_SIZE + 1)
        .position(|&byte| byte != PREAMBLE_BYTE)
    {
        Some(index) if buffer[index] == SEPARATOR_BYTE => index,
        _ => return Err(RdmPacketError::MissingSeparator),
    };

    let encoded = &buffer[separator_index + 1..];
    if encoded.len() < RDM_DISCOVERY_RESPONSE_SIZE {
        return Err(RdmPacketError::BufferTooSmall);
    }

    let mut uid_bytes = [0u8; 6];
    decode_disc_unique(&encoded[..12], &mut uid_bytes);

    let mut checksum_bytes = [0u8; 2];
    decode_disc_unique(&encoded[12..16], &mut checksum_bytes);
    let received_checksum = u16::from_be_bytes(checksum_bytes);

    // E1.20 sums the encoded bytes, some firmwares only sum the decoded uid.
    if received_checksum != calculate_checksum(&encoded[..12])
        && received_checksum != calculate_checksum(&uid_bytes)
    {
        return Ok(None);
    }

    Ok(Some(UniqueIdentifier::from_bytes(&uid_bytes)))
}

/// Encodes the answer a responder sends to a matching DISC_UNIQUE_BRANCH request.
pub fn encode_discovery_response(uid: UniqueIdentifier) -> [u8; RDM_MAX_DISCOVERY_RESPONSE_SIZE] {
    let mut frame_buffer = [PREAMBLE_BYTE; RDM_MAX_DISCOVERY_RESPONSE_SIZE];
    frame_buffer[RDM_MAX_PREAMBLE_SIZE] = SEPARATOR_BYTE;

    encode_disc_unique(&uid.to_bytes(), &mut frame_buffer[8..20]);
    let checksum = calculate_checksum(&frame_buffer[8..20]);
    encode_disc_unique(&checksum.to_be_bytes(), &mut frame_buffer[20..24]);

    frame_buffer
}
