//! Typed rdm requests on top of [WidgetSession::get_rdm].

use crate::command_class::CommandClass;
use crate::pids;
use crate::rdm_packet::{RdmPacket, RdmPacketError};
use crate::rdm_types::{
    deserialize_identify, deserialize_software_version_label, deserialize_supported_parameters,
    DeserializationError, DeviceInfo, DiscoveryMuteResponse, DmxStartAddress, OverflowMessageResp,
    SoftwareVersionLabel, SupportedParameters,
};
use crate::transport::{Clock, WidgetError, WidgetTransport};
use crate::types::{NackReason, ResponseType};
use crate::unique_identifier::UniqueIdentifier;
use crate::widget_session::WidgetSession;

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RdmResponseError<E> {
    /// The parameter data couldn't be deserialized.
    ParameterDataNotDeserializable,
    /// The response has an error status but the contents aren't deserializable.
    ErrorNotDeserializable,
    /// The response isn't ready yet. The value is the estimated time in 100ms steps.
    NotReady(u16),
    /// The responder didn't acknowledge the request.
    NotAcknowledged(NackReason),
    /// The start address has to be between 1 and 512.
    InvalidStartAddress(u16),
    /// The session raised an error.
    WidgetError(WidgetError<E>),
}

impl<E: core::fmt::Display> core::fmt::Display for RdmResponseError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RdmResponseError::ParameterDataNotDeserializable => {
                write!(f, "parameter data could not be deserialized")
            },
            RdmResponseError::ErrorNotDeserializable => {
                write!(f, "error response could not be deserialized")
            },
            RdmResponseError::NotReady(delay) => {
                write!(f, "response not ready, retry in {} ms", *delay as u32 * 100)
            },
            RdmResponseError::NotAcknowledged(nack_reason) => {
                write!(f, "request not acknowledged: {:?}", nack_reason)
            },
            RdmResponseError::InvalidStartAddress(start_address) => {
                write!(f, "start address {} is not within 1 to 512", start_address)
            },
            RdmResponseError::WidgetError(error) => error.fmt(f),
        }
    }
}

#[cfg(feature = "std")]
impl<E: core::fmt::Debug + core::fmt::Display> std::error::Error for RdmResponseError<E> {}

impl<E> From<WidgetError<E>> for RdmResponseError<E> {
    fn from(value: WidgetError<E>) -> Self {
        Self::WidgetError(value)
    }
}

impl<E> From<DeserializationError> for RdmResponseError<E> {
    fn from(_: DeserializationError) -> Self {
        Self::ParameterDataNotDeserializable
    }
}

/// Parameter data of a timer or nack response.
fn error_value<E>(response: &RdmPacket) -> Result<u16, RdmResponseError<E>> {
    if response.parameter_data_length() != 2 {
        return Err(RdmResponseError::ErrorNotDeserializable);
    }

    response
        .parameter_data_as_u16(0)
        .map_err(|_: RdmPacketError| RdmResponseError::ErrorNotDeserializable)
}

/// Sorts a response by its response type.
///
/// Acknowledged data is returned, split into complete and overflowing responses.
/// Timer and nack responses become errors.
pub fn classify_response<E>(
    response: RdmPacket,
) -> Result<OverflowMessageResp<RdmPacket>, RdmResponseError<E>> {
    match response.response_type() {
        Ok(ResponseType::Ack) => Ok(OverflowMessageResp::Complete(response)),
        Ok(ResponseType::AckOverflow) => Ok(OverflowMessageResp::Incomplete(response)),
        Ok(ResponseType::AckTimer) => Err(RdmResponseError::NotReady(error_value::<E>(
            &response,
        )?)),
        Ok(ResponseType::NackReason) => match NackReason::try_from(error_value::<E>(&response)?) {
            Ok(nack_reason) => Err(RdmResponseError::NotAcknowledged(nack_reason)),
            Err(_) => Err(RdmResponseError::ErrorNotDeserializable),
        },
        Err(_) => Err(RdmResponseError::ErrorNotDeserializable),
    }
}

impl<T: WidgetTransport, C: Clock> WidgetSession<T, C> {
    fn rdm_exchange(
        &mut self,
        request: &mut RdmPacket,
    ) -> Result<OverflowMessageResp<RdmPacket>, RdmResponseError<T::TransportError>> {
        classify_response(self.get_rdm(request)?)
    }

    fn rdm_request(
        &mut self,
        command_class: CommandClass,
        uid: UniqueIdentifier,
        parameter_id: u16,
        parameter_data: &[u8],
    ) -> Result<OverflowMessageResp<RdmPacket>, RdmResponseError<T::TransportError>> {
        let mut request = RdmPacket::new(uid, command_class, parameter_id);
        request
            .set_parameter_data(parameter_data)
            .map_err(WidgetError::<T::TransportError>::PacketError)?;

        self.rdm_exchange(&mut request)
    }

    /// Sends a get request.
    pub fn rdm_get(
        &mut self,
        uid: UniqueIdentifier,
        parameter_id: u16,
    ) -> Result<OverflowMessageResp<RdmPacket>, RdmResponseError<T::TransportError>> {
        self.rdm_request(CommandClass::GetCommand, uid, parameter_id, &[])
    }

    /// Sends a set request.
    pub fn rdm_set(
        &mut self,
        uid: UniqueIdentifier,
        parameter_id: u16,
        parameter_data: &[u8],
    ) -> Result<OverflowMessageResp<RdmPacket>, RdmResponseError<T::TransportError>> {
        self.rdm_request(CommandClass::SetCommand, uid, parameter_id, parameter_data)
    }

    /// Mute device from discovery. It will not respond to discovery requests anymore.
    pub fn rdm_disc_mute(
        &mut self,
        uid: UniqueIdentifier,
    ) -> Result<DiscoveryMuteResponse, RdmResponseError<T::TransportError>> {
        let response = self
            .rdm_exchange(&mut RdmPacket::disc_mute(uid))?
            .into_complete()?;

        Ok(DiscoveryMuteResponse::deserialize(
            response.parameter_data(),
        )?)
    }

    /// Unmute device from discovery. It will respond to discovery requests again.
    /// Returns None if the request was a broadcast, broadcasts are not answered.
    pub fn rdm_disc_un_mute(
        &mut self,
        uid: UniqueIdentifier,
    ) -> Result<Option<DiscoveryMuteResponse>, RdmResponseError<T::TransportError>> {
        let mut request = RdmPacket::disc_un_mute(uid);

        if uid.is_broadcast() {
            self.send_rdm(&mut request)?;
            return Ok(None);
        }

        let response = self.rdm_exchange(&mut request)?.into_complete()?;

        Ok(Some(DiscoveryMuteResponse::deserialize(
            response.parameter_data(),
        )?))
    }

    /// Get the identify state in the rdm device (led for searching)
    pub fn rdm_get_identify(
        &mut self,
        uid: UniqueIdentifier,
    ) -> Result<bool, RdmResponseError<T::TransportError>> {
        let response = self.rdm_get(uid, pids::IDENTIFY_DEVICE)?.into_complete()?;

        Ok(deserialize_identify(response.parameter_data())?)
    }

    /// Set the identify state in the rdm device (led for searching)
    pub fn rdm_set_identify(
        &mut self,
        uid: UniqueIdentifier,
        enabled: bool,
    ) -> Result<(), RdmResponseError<T::TransportError>> {
        self.rdm_set(uid, pids::IDENTIFY_DEVICE, &[enabled as u8])?;

        Ok(())
    }

    /// Get the software version label.
    pub fn rdm_get_software_version_label(
        &mut self,
        uid: UniqueIdentifier,
    ) -> Result<SoftwareVersionLabel, RdmResponseError<T::TransportError>> {
        let response = self.rdm_get(uid, pids::SOFTWARE_VERSION_LABEL)?.into_complete()?;

        Ok(deserialize_software_version_label(
            response.parameter_data(),
        )?)
    }

    /// Get the current start address of the dmx slave.
    pub fn rdm_get_dmx_start_address(
        &mut self,
        uid: UniqueIdentifier,
    ) -> Result<DmxStartAddress, RdmResponseError<T::TransportError>> {
        let response = self.rdm_get(uid, pids::DMX_START_ADDRESS)?.into_complete()?;

        Ok(DmxStartAddress::deserialize(response.parameter_data())?)
    }

    /// Set the current start address of the dmx slave. The address has to be between 1 and 512.
    pub fn rdm_set_dmx_start_address(
        &mut self,
        uid: UniqueIdentifier,
        start_address: u16,
    ) -> Result<(), RdmResponseError<T::TransportError>> {
        if !(1..=512).contains(&start_address) {
            return Err(RdmResponseError::InvalidStartAddress(start_address));
        }

        self.rdm_set(
            uid,
            pids::DMX_START_ADDRESS,
            &DmxStartAddress::Address(start_address).serialize(),
        )?;

        Ok(())
    }

    /// Get the device info from the rdm device.
    pub fn rdm_get_device_info(
        &mut self,
        uid: UniqueIdentifier,
    ) -> Result<DeviceInfo, RdmResponseError<T::TransportError>> {
        let response = self.rdm_get(uid, pids::DEVICE_INFO)?.into_complete()?;

        Ok(DeviceInfo::deserialize(response.parameter_data())?)
    }

    /// Get the parameter ids that are supported by the responder.
    ///
    /// <div class="warning">Note that this only includes optional parameter ids that are not
    /// required to be compliant with ANSI E1.20.</div>
    pub fn rdm_get_supported_parameters(
        &mut self,
        uid: UniqueIdentifier,
    ) -> Result<OverflowMessageResp<SupportedParameters>, RdmResponseError<T::TransportError>>
    {
        Ok(match self.rdm_get(uid, pids::SUPPORTED_PARAMETERS)? {
            OverflowMessageResp::Complete(response) => OverflowMessageResp::Complete(
                deserialize_supported_parameters(response.parameter_data())?,
            ),
            OverflowMessageResp::Incomplete(response) => OverflowMessageResp::Incomplete(
                deserialize_supported_parameters(response.parameter_data())?,
            ),
        })
    }
}
