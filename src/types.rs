/// Declares a fieldless enum that maps one to one onto a wire value.
///
/// `TryFrom` hands back the unknown raw value as its error so callers can report it.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident: $repr:ident {
            $($(#[$variant_meta:meta])* $variant:ident = $value:expr,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        #[repr($repr)]
        $vis enum $name {
            $($(#[$variant_meta])* $variant = $value,)+
        }

        impl TryFrom<$repr> for $name {
            type Error = $repr;

            fn try_from(value: $repr) -> Result<Self, $repr> {
                $(
                    if value == $value {
                        return Ok(Self::$variant);
                    }
                )+

                Err(value)
            }
        }

        impl From<$name> for $repr {
            fn from(value: $name) -> Self {
                value as $repr
            }
        }
    };
}

pub(crate) use wire_enum;

wire_enum! {
    /// Response status of a rdm package.
    pub enum ResponseType: u8 {
        /// The request was acknowledged.
        Ack = 0x00,
        /// The request was acknowledged but the result isn't ready yet.
        AckTimer = 0x01,
        /// The request was not acknowledged.
        NackReason = 0x02,
        /// The request was acknowledged but the response does not fit into a single response.
        AckOverflow = 0x03,
    }
}

wire_enum! {
    pub enum NackReason: u16 {
        UnknownPid = 0x0000,
        FormatError = 0x0001,
        HardwareFault = 0x0002,
        ProxyReject = 0x0003,
        WriteProtect = 0x0004,
        UnsupportedCommandClass = 0x0005,
        DataOutOfRange = 0x0006,
        BufferFull = 0x0007,
        PacketSizeUnsupported = 0x0008,
        SubDeviceOutOfRange = 0x0009,
        ProxyBufferFull = 0x000A,
    }
}

impl NackReason {
    pub fn to_bytes(self) -> [u8; 2] {
        u16::from(self).to_be_bytes()
    }
}
