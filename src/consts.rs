pub const DMX_NULL_START: u8 = 0x00;
pub const DMX_MAX_CHANNELS: usize = 512;
/// The widget firmware refuses shorter universes.
pub const DMX_MIN_CHANNELS: usize = 24;

pub const SC_RDM: u8 = 0xCC;
pub const SC_SUB_MESSAGE: u8 = 0x01;

pub const PREAMBLE_BYTE: u8 = 0xFE;
pub const SEPARATOR_BYTE: u8 = 0xAA;
pub const RDM_MAX_PREAMBLE_SIZE: usize = 7;

pub const BROADCAST_UID: u64 = 0xFFFF_FFFFFFFF;
/// "EN", the manufacturer id the widget derives its own uid from.
pub const ENTTEC_MANUFACTURER_UID: u16 = 0x454E;

/// Header size up to and including the parameter data length field.
pub const RDM_HEADER_SIZE: usize = 24;
pub const RDM_CHECKSUM_SIZE: usize = 2;
pub const RDM_MIN_PACKAGE_SIZE: usize = RDM_HEADER_SIZE + RDM_CHECKSUM_SIZE;
pub const RDM_MAX_PACKAGE_SIZE: usize = 257;
/// Excluding preamble and separator
pub const RDM_DISCOVERY_RESPONSE_SIZE: usize = 16;
/// Including 7 bytes preamble + 1 byte separator
pub const RDM_MAX_DISCOVERY_RESPONSE_SIZE: usize = RDM_DISCOVERY_RESPONSE_SIZE + 8;

pub const RDM_MAX_PARAMETER_DATA_LENGTH: usize = 231;
pub const RDM_DEVICE_INFO_SIZE: usize = 0x13;
pub const RDM_MAX_SUPPORTED_PARAMETERS_PER_REQUEST: usize = 115;

pub const WIDGET_START_OF_MESSAGE: u8 = 0x7E;
pub const WIDGET_END_OF_MESSAGE: u8 = 0xE7;
/// start marker + label + 2 length bytes + end marker
pub const WIDGET_FRAME_OVERHEAD: usize = 5;
pub const WIDGET_MAX_PAYLOAD_SIZE: usize = 600;
pub const WIDGET_MAX_FRAME_SIZE: usize = WIDGET_MAX_PAYLOAD_SIZE + WIDGET_FRAME_OVERHEAD;
pub const WIDGET_RECEIVE_BUFFER_SIZE: usize = 1024;
pub const WIDGET_BAUD: u32 = 57_600;

/// start byte index + 5 bitmask bytes
pub const CHANGE_OF_STATE_HEADER_SIZE: usize = 6;
pub const CHANGE_OF_STATE_MASK_SIZE: usize = 5;

pub const DEFAULT_REPLY_TIMEOUT_MICROS: u64 = 1_000_000;
pub const DEFAULT_POLL_INTERVAL_MICROS: u32 = 1_000;
pub const DEFAULT_DISCOVERY_TIMEOUT_MICROS: u64 = 50_000;
pub const DEFAULT_UNMUTE_SETTLE_MICROS: u64 = 10_000;
