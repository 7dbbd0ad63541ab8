use crate::consts::{RDM_DEVICE_INFO_SIZE, RDM_MAX_SUPPORTED_PARAMETERS_PER_REQUEST};
use crate::layouts::rdm_device_info_layout;
use crate::unique_identifier::UniqueIdentifier;
use modular_bitfield::bitfield;
use modular_bitfield::prelude::B12;

pub const RDM_MAX_SOFTWARE_VERSION_LABEL_LENGTH: usize = 32;

pub type SoftwareVersionLabel = heapless::String<RDM_MAX_SOFTWARE_VERSION_LABEL_LENGTH>;
pub type SupportedParameters = heapless::Vec<u16, RDM_MAX_SUPPORTED_PARAMETERS_PER_REQUEST>;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeserializationError;

impl core::fmt::Display for DeserializationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "parameter data could not be deserialized")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DeserializationError {}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmxStartAddress {
    /// The requested device has a dmx footprint of 0.
    NoAddress,
    /// The requested device does allocate dmx addresses.
    Address(u16),
}

impl DmxStartAddress {
    pub fn as_u16(&self) -> u16 {
        match self {
            DmxStartAddress::Address(address) => *address,
            DmxStartAddress::NoAddress => 0xFFFF,
        }
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, DeserializationError> {
        match data {
            [high, low] => u16::from_be_bytes([*high, *low]).try_into(),
            _ => Err(DeserializationError),
        }
    }

    pub fn serialize(&self) -> [u8; 2] {
        self.as_u16().to_be_bytes()
    }
}

impl TryFrom<u16> for DmxStartAddress {
    type Error = DeserializationError;

    fn try_from(start_address: u16) -> Result<Self, Self::Error> {
        if start_address == 0xFFFF {
            return Ok(Self::NoAddress);
        }

        if !(1..=512).contains(&start_address) {
            return Err(DeserializationError);
        }

        Ok(Self::Address(start_address))
    }
}

/// Acknowledgement of a DISC_MUTE or DISC_UN_MUTE request.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiscoveryMuteResponse {
    /// The responder is a proxy device.
    pub managed_proxy: bool,
    /// The responder supports sub devices.
    pub sub_device: bool,
    /// The responder is not operational before receiving a firmware update.
    pub boot_loader: bool,
    /// A proxy device has responded on behalf of another device.
    pub proxy_device: bool,
    /// Sent by devices with several responder ports, the uid of the primary port.
    pub binding_uid: Option<UniqueIdentifier>,
}

/// Control field of the mute acknowledgement, a big endian u16 with the flags in the low bits.
#[bitfield]
struct DiscControlField {
    managed_proxy: bool,
    sub_device: bool,
    boot_loader: bool,
    proxy_device: bool,
    #[skip]
    reserved: B12,
}

impl DiscoveryMuteResponse {
    pub fn deserialize(data: &[u8]) -> Result<Self, DeserializationError> {
        let (control_field, binding_uid) = match data {
            [high, low] => ([*low, *high], None),
            [high, low, uid @ ..] if uid.len() == 6 => {
                let mut uid_bytes = [0u8; 6];
                uid_bytes.copy_from_slice(uid);
                ([*low, *high], Some(UniqueIdentifier::from_bytes(&uid_bytes)))
            },
            _ => return Err(DeserializationError),
        };

        let control_field = DiscControlField::from_bytes(control_field);

        Ok(Self {
            managed_proxy: control_field.managed_proxy(),
            sub_device: control_field.sub_device(),
            boot_loader: control_field.boot_loader(),
            proxy_device: control_field.proxy_device(),
            binding_uid,
        })
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceInfo {
    pub protocol_version: u16,
    pub device_model_id: u16,
    pub product_category: u16,
    pub software_version: u32,
    pub dmx_footprint: u16,
    pub dmx_personality: u16,
    pub dmx_start_address: DmxStartAddress,
    pub sub_device_count: u16,
    pub sensor_count: u8,
}

impl DeviceInfo {
    pub fn deserialize(buffer: &[u8]) -> Result<Self, DeserializationError> {
        if buffer.len() != RDM_DEVICE_INFO_SIZE {
            return Err(DeserializationError);
        }

        let device_info_view = rdm_device_info_layout::View::new(buffer);
        Ok(DeviceInfo {
            protocol_version: device_info_view.protocol_version().read(),
            device_model_id: device_info_view.device_model_id().read(),
            product_category: device_info_view.product_category().read(),
            software_version: device_info_view.software_version_id().read(),
            dmx_footprint: device_info_view.dmx_footprint().read(),
            dmx_personality: device_info_view.dmx_personality().read(),
            dmx_start_address: device_info_view.dmx_start_address().read().try_into()?,
            sub_device_count: device_info_view.sub_device_count().read(),
            sensor_count: device_info_view.sensor_count().read(),
        })
    }

    pub fn serialize(&self) -> [u8; RDM_DEVICE_INFO_SIZE] {
        let mut buffer = [0u8; RDM_DEVICE_INFO_SIZE];
        let mut device_info_view = rdm_device_info_layout::View::new(&mut buffer[..]);

        device_info_view
            .protocol_version_mut()
            .write(self.protocol_version);
        device_info_view
            .device_model_id_mut()
            .write(self.device_model_id);
        device_info_view
            .product_category_mut()
            .write(self.product_category);
        device_info_view
            .software_version_id_mut()
            .write(self.software_version);
        device_info_view
            .dmx_footprint_mut()
            .write(self.dmx_footprint);
        device_info_view
            .dmx_personality_mut()
            .write(self.dmx_personality);
        device_info_view
            .dmx_start_address_mut()
            .write(self.dmx_start_address.as_u16());
        device_info_view
            .sub_device_count_mut()
            .write(self.sub_device_count);
        device_info_view.sensor_count_mut().write(self.sensor_count);

        buffer
    }
}

pub fn deserialize_identify(buffer: &[u8]) -> Result<bool, DeserializationError> {
    match buffer {
        [identify] => Ok(*identify != 0),
        _ => Err(DeserializationError),
    }
}

/// Labels may be NUL padded, the label ends at the first NUL.
pub fn deserialize_software_version_label(
    buffer: &[u8],
) -> Result<SoftwareVersionLabel, DeserializationError> {
    let end = buffer.iter().position(|&byte| byte == 0).unwrap_or(buffer.len());
    let label = core::str::from_utf8(&buffer[..end]).map_err(|_| DeserializationError)?;

    let mut software_version_label = SoftwareVersionLabel::new();
    software_version_label
        .push_str(label)
        .map_err(|_| DeserializationError)?;

    Ok(software_version_label)
}

pub fn deserialize_supported_parameters(
    buffer: &[u8],
) -> Result<SupportedParameters, DeserializationError> {
    if buffer.len() % 2 != 0 {
        return Err(DeserializationError);
    }

    buffer
        .chunks_exact(2)
        .map(|pid_bytes| u16::from_be_bytes([pid_bytes[0], pid_bytes[1]]))
        .try_fold(SupportedParameters::new(), |mut supported_parameters, pid| {
            supported_parameters
                .push(pid)
                .map_err(|_| DeserializationError)?;
            Ok(supported_parameters)
        })
}

/// Returned by parameter packages where the response might not fit into one package.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum OverflowMessageResp<T> {
    /// Has received the complete message.
    Complete(T),
    /// Has not received the complete message.
    /// Request the same pid to get the next part until you receive [OverflowMessageResp::Complete].
    Incomplete(T),
}

impl<T> OverflowMessageResp<T> {
    /// The message if it was received completely.
    pub fn into_complete(self) -> Result<T, DeserializationError> {
        match self {
            OverflowMessageResp::Complete(message) => Ok(message),
            OverflowMessageResp::Incomplete(_) => Err(DeserializationError),
        }
    }
}
