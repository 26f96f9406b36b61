//! Commands that can be sent to the modem.
//!
//! Only the commands the session layer itself issues are modelled; anything
//! else goes through [`Command::Raw`].

use crate::codec::LineCodec;

/// Message storage list filter used with `AT+CMGL` in PDU mode (4 = all).
pub const LIST_ALL_MESSAGES: u8 = 4;

/// A command understood by the modem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // ========== Bring-up ==========
    /// Attention, checks the modem is responsive (`AT`).
    Attention,

    /// Disable command echo (`ATE0`).
    EchoOff,

    /// Switch message format to PDU mode (`AT+CMFG=0`).
    PduMode,

    /// Select the read/delete and write/send storage areas.
    SelectStorage {
        /// Storage for reading and deleting.
        read: String,
        /// Storage for writing and sending.
        write: String,
    },

    // ========== Notifications ==========
    /// Route new-message indications to the host as `+CMTI:` lines.
    EnableNewMessageIndications,

    // ========== Messages ==========
    /// List stored messages (`AT+CMGL=<filter>`).
    ListMessages {
        /// Status filter, [`LIST_ALL_MESSAGES`] for everything.
        filter: u8,
    },

    /// Read a single message (`AT+CMGR=<index>`).
    ReadMessage {
        /// Storage slot.
        index: u32,
    },

    /// Delete a single message (`AT+CMGD=<index>`).
    DeleteMessage {
        /// Storage slot.
        index: u32,
    },

    // ========== Raw Command ==========
    /// Send a raw command string.
    Raw {
        /// The raw command text.
        command: String,
    },
}

impl Command {
    /// The default storage selection used at bring-up (`"ME","SM"`).
    pub fn default_storage() -> Command {
        Command::SelectStorage {
            read: "ME".to_string(),
            write: "SM".to_string(),
        }
    }

    /// List every stored message.
    pub fn list_all() -> Command {
        Command::ListMessages {
            filter: LIST_ALL_MESSAGES,
        }
    }

    /// Encode the command as a line to send to the modem.
    /// Returns the bytes to send (including the `\r\n` terminator).
    pub fn encode(&self) -> Vec<u8> {
        LineCodec::encode_command(&self.to_command_string())
    }

    /// Get the command string without the terminator.
    pub fn to_command_string(&self) -> String {
        match self {
            Command::Attention => "AT".to_string(),
            Command::EchoOff => "ATE0".to_string(),
            Command::PduMode => "AT+CMFG=0".to_string(),
            Command::SelectStorage { read, write } => {
                format!("AT+CPMS=\"{}\",\"{}\"", read, write)
            }
            Command::EnableNewMessageIndications => "AT+CNMI=2,1,0,2".to_string(),
            Command::ListMessages { filter } => format!("AT+CMGL={}", filter),
            Command::ReadMessage { index } => format!("AT+CMGR={}", index),
            Command::DeleteMessage { index } => format!("AT+CMGD={}", index),
            Command::Raw { command } => command.clone(),
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_command_string())
    }
}
