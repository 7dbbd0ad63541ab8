use crate::rdm_packet::RdmPacket;
use crate::rdm_types::DiscoveryMuteResponse;
use crate::transport::{Clock, WidgetError, WidgetTransport};
use crate::types::ResponseType;
use crate::unique_identifier::UniqueIdentifier;
use crate::widget_session::{DiscoveryOption, WidgetSession};

/// Bisecting 48 bits leaves at most one pending range per level.
const DISCOVERY_STACK_SIZE: usize = 64;

fn uid_from_u64(value: u64) -> UniqueIdentifier {
    let bytes = value.to_be_bytes();

    UniqueIdentifier::from_bytes(&[bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7]])
}

/// Blocking discovery of every responder on the line.
///
/// Un-mutes all responders, waits for their replies to settle and searches the whole uid space.
/// See [discover_range] for how found devices are stored.
pub fn discover_all<T: WidgetTransport, C: Clock, const N: usize>(
    session: &mut WidgetSession<T, C>,
    found: &mut heapless::Vec<UniqueIdentifier, N>,
) -> Result<usize, WidgetError<T::TransportError>> {
    session.send_rdm(&mut RdmPacket::disc_un_mute(UniqueIdentifier::BROADCAST))?;

    let unmute_settle_us = session.config().unmute_settle_us;
    let discarded = session.discard_incoming(unmute_settle_us)?;
    if discarded > 0 {
        log::debug!("discarded {} frames after un-mute broadcast", discarded);
    }

    discover_range(
        session,
        UniqueIdentifier::ZERO,
        UniqueIdentifier::BROADCAST,
        found,
    )
}

/// Blocking binary search discovery of `lower..=upper`.
///
/// Every device found is muted and added to `found`, which is treated as a set. Ranges with
/// colliding replies are split in half, the lower half is searched first. If `found` fills up
/// the search stops without muting more devices; calling this again without un-muting continues
/// where it left off.
///
/// Returns the number of devices added to `found`.
///
/// <div class="warning">Responders that never acknowledge the mute are dropped, they keep
/// answering and collide with devices in the same range.</div>
pub fn discover_range<T: WidgetTransport, C: Clock, const N: usize>(
    session: &mut WidgetSession<T, C>,
    lower: UniqueIdentifier,
    upper: UniqueIdentifier,
    found: &mut heapless::Vec<UniqueIdentifier, N>,
) -> Result<usize, WidgetError<T::TransportError>> {
    let mut pending: heapless::Vec<(u64, u64), DISCOVERY_STACK_SIZE> = heapless::Vec::new();
    if lower <= upper {
        let _ = pending.push((u64::from(lower), u64::from(upper)));
    }

    let mut devices_added = 0;

    while let Some((lower_bound, upper_bound)) = pending.pop() {
        if found.is_full() {
            log::warn!("no space left for discovered devices, stopping discovery");
            break;
        }

        let lower_uid = uid_from_u64(lower_bound);
        let upper_uid = uid_from_u64(upper_bound);

        match session.rdm_discover(lower_uid, upper_uid)? {
            DiscoveryOption::NoDevice => {
                log::debug!("no device in {}..={}", lower_uid, upper_uid);
            },
            DiscoveryOption::Found(uid) => {
                if mute_and_record(session, uid, found)? {
                    devices_added += 1;
                }
            },
            DiscoveryOption::Collision if lower_bound == upper_bound => {
                log::warn!("abandoning {} which keeps colliding", lower_uid);
            },
            DiscoveryOption::Collision => {
                log::debug!("collision in {}..={}", lower_uid, upper_uid);

                let middle = (lower_bound + upper_bound) / 2;
                // Popped in reverse, so the lower half is searched first.
                if pending.push((middle + 1, upper_bound)).is_err()
                    || pending.push((lower_bound, middle)).is_err()
                {
                    log::warn!("discovery stack exhausted, skipping {}..={}", lower_uid, upper_uid);
                }
            },
        }
    }

    Ok(devices_added)
}

/// Mutes the device and records the uid of the acknowledgement.
/// Returns true if a new uid was added.
fn mute_and_record<T: WidgetTransport, C: Clock, const N: usize>(
    session: &mut WidgetSession<T, C>,
    uid: UniqueIdentifier,
    found: &mut heapless::Vec<UniqueIdentifier, N>,
) -> Result<bool, WidgetError<T::TransportError>> {
    let response = match session.get_rdm(&mut RdmPacket::disc_mute(uid)) {
        Ok(response) => response,
        Err(WidgetError::TimeoutError) => {
            log::warn!("{} did not acknowledge the mute, dropping it", uid);
            return Ok(false);
        },
        Err(error) => return Err(error),
    };

    if response.response_type() != Ok(ResponseType::Ack) {
        log::warn!("{} refused the mute, dropping it", uid);
        return Ok(false);
    }

    match DiscoveryMuteResponse::deserialize(response.parameter_data()) {
        Ok(mute_response) => log::debug!("{} muted: {:?}", uid, mute_response),
        Err(error) => log::debug!("{} muted with unreadable control field: {}", uid, error),
    }

    let muted_uid = response.source_uid();
    if found.contains(&muted_uid) {
        return Ok(false);
    }

    if found.push(muted_uid).is_err() {
        return Ok(false);
    }

    log::info!("discovered {}", muted_uid);

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uid_from_u64() {
        assert_eq!(uid_from_u64(0xFFFF_FFFF_FFFF), UniqueIdentifier::BROADCAST);
        assert_eq!(
            uid_from_u64(0x454E_0000_0001),
            UniqueIdentifier::new(0x454E, 1)
        );
    }
}
