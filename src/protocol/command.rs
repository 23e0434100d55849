//! Command definitions
//!
//! Represents commands from clients.

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    Get = 0x01,
    Put = 0x02,
    Remove = 0x03,
    Ping = 0x04,
    Range = 0x05,
    Prefix = 0x06,
    KMin = 0x07,
    KMax = 0x08,
    Length = 0x09,
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Get a value by key
    Get { key: String },

    /// Insert or update a key-value pair
    Put { key: String, value: Vec<u8> },

    /// Remove a key (accepted, but the store never deletes)
    Remove { key: String },

    /// Ping (health check)
    Ping,

    /// Entries with start <= key < end
    Range {
        start: String,
        end: String,
        limit: u32,
    },

    /// Entries whose key starts with `prefix`
    Prefix { prefix: String, limit: u32 },

    /// The k smallest entries
    KMin { k: u32 },

    /// The k largest entries
    KMax { k: u32 },

    /// Number of entries
    Length,
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Get { .. } => CommandType::Get,
            Command::Put { .. } => CommandType::Put,
            Command::Remove { .. } => CommandType::Remove,
            Command::Ping => CommandType::Ping,
            Command::Range { .. } => CommandType::Range,
            Command::Prefix { .. } => CommandType::Prefix,
            Command::KMin { .. } => CommandType::KMin,
            Command::KMax { .. } => CommandType::KMax,
            Command::Length => CommandType::Length,
        }
    }
}
