use crate::consts::BROADCAST_UID;

/// Raised when a number does not fit into the 48 bit uid space.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UidOutOfRangeError(pub u64);

impl core::fmt::Display for UidOutOfRangeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#X} does not fit into 48 bits", self.0)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for UidOutOfRangeError {}

/// The 48 bit unique id of an rdm device.
///
/// Made of a manufacturer id assigned by the ESTA and a device id picked by the manufacturer.
/// The ordering is the numeric ordering of the 48 bit value, which is what discovery bisects on.
/// [more information](https://tsp.esta.org/tsp/working_groups/CP/mfctrIDs.php)
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct UniqueIdentifier {
    manufacturer_uid: u16,
    device_uid: u32,
}

impl core::fmt::Display for UniqueIdentifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:04X}:{:08X}", self.manufacturer_uid, self.device_uid)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for UniqueIdentifier {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{:04X}:{:08X}", self.manufacturer_uid, self.device_uid);
    }
}

impl UniqueIdentifier {
    /// Lower bound of the device address space.
    pub const ZERO: Self = Self {
        manufacturer_uid: 0,
        device_uid: 0,
    };

    /// Upper bound of the device address space; addresses every device.
    pub const BROADCAST: Self = Self {
        manufacturer_uid: u16::MAX,
        device_uid: u32::MAX,
    };

    pub const fn new(manufacturer_uid: u16, device_uid: u32) -> Self {
        Self {
            manufacturer_uid,
            device_uid,
        }
    }

    pub fn manufacturer_uid(&self) -> u16 {
        self.manufacturer_uid
    }

    pub fn device_uid(&self) -> u32 {
        self.device_uid
    }

    /// True for the all devices broadcast as well as manufacturer broadcasts.
    pub fn is_broadcast(&self) -> bool {
        self.device_uid == u32::MAX
    }

    pub fn from_bytes(buffer: &[u8; 6]) -> Self {
        Self {
            manufacturer_uid: u16::from_be_bytes([buffer[0], buffer[1]]),
            device_uid: u32::from_be_bytes([buffer[2], buffer[3], buffer[4], buffer[5]]),
        }
    }

    pub fn to_bytes(&self) -> [u8; 6] {
        let mut buffer = [0u8; 6];

        buffer[..2].copy_from_slice(&self.manufacturer_uid.to_be_bytes());
        buffer[2..].copy_from_slice(&self.device_uid.to_be_bytes());

        buffer
    }
}

impl TryFrom<u64> for UniqueIdentifier {
    type Error = UidOutOfRangeError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > BROADCAST_UID {
            return Err(UidOutOfRangeError(value));
        }

        Ok(Self {
            manufacturer_uid: (value >> u32::BITS) as u16,
            device_uid: value as u32,
        })
    }
}

impl From<UniqueIdentifier> for u64 {
    fn from(value: UniqueIdentifier) -> Self {
        ((value.manufacturer_uid as u64) << u32::BITS) | value.device_uid as u64
    }
}
