use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Type of a stored key, as returned by the `TYPE` command
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyType {
    String,
    List,
    Set,
    ZSet,
    Hash,
    Stream,
    /// The key does not exist
    None,
    /// Type name this client does not know about (module types)
    Other(std::string::String),
}

impl KeyType {
    pub fn as_str(&self) -> &str {
        match self {
            KeyType::String => "string",
            KeyType::List => "list",
            KeyType::Set => "set",
            KeyType::ZSet => "zset",
            KeyType::Hash => "hash",
            KeyType::Stream => "stream",
            KeyType::None => "none",
            KeyType::Other(name) => name,
        }
    }

    /// Whether the key exists at all
    pub fn exists(&self) -> bool {
        !matches!(self, KeyType::None)
    }
}

impl From<&str> for KeyType {
    fn from(reply: &str) -> Self {
        match reply {
            "string" => KeyType::String,
            "list" => KeyType::List,
            "set" => KeyType::Set,
            "zset" => KeyType::ZSet,
            "hash" => KeyType::Hash,
            "stream" => KeyType::Stream,
            "none" => KeyType::None,
            other => KeyType::Other(other.to_string()),
        }
    }
}

impl FromStr for KeyType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(KeyType::from(s))
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
