use crate::types::wire_enum;

wire_enum! {
    /// The command class field of an rdm package.
    pub enum CommandClass: u8 {
        DiscoveryCommand = 0x10,
        DiscoveryCommandResponse = 0x11,
        GetCommand = 0x20,
        GetCommandResponse = 0x21,
        SetCommand = 0x30,
        SetCommandResponse = 0x31,
    }
}

impl CommandClass {
    /// Responses always carry the odd class right above their request class.
    pub fn is_response(&self) -> bool {
        u8::from(*self) & 0x01 == 0x01
    }

    /// Returns the class a responder answers this request class with.
    /// Response classes map to themselves.
    pub fn response_class(&self) -> CommandClass {
        match self {
            Self::DiscoveryCommand => Self::DiscoveryCommandResponse,
            Self::GetCommand => Self::GetCommandResponse,
            Self::SetCommand => Self::SetCommandResponse,
            response => *response,
        }
    }

    /// Returns the request class this response class answers.
    /// Request classes map to themselves.
    pub fn request_class(&self) -> CommandClass {
        match self {
            Self::DiscoveryCommandResponse => Self::DiscoveryCommand,
            Self::GetCommandResponse => Self::GetCommand,
            Self::SetCommandResponse => Self::SetCommand,
            request => *request,
        }
    }
}
