use std::fmt;

/// Everything that can stop a run, from building the dictionary to scanning the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A dictionary entry is the empty string.
    EmptyName,
    /// A dictionary entry is longer than the scanner can locate a delimiter for.
    NameTooLong { name: String, len: usize, max: usize },
    DuplicateName(String),
    /// Two dictionary entries produce the same content hash.
    HashCollision { first: String, second: String },
    /// No displacement could be found that places every key in its own slot.
    PerfectHash { keys: usize },
    /// A record names a station outside of the dictionary.
    UnknownName { offset: usize, name: String },
    /// A record at `offset` is missing its delimiter, value or terminator.
    MalformedRecord { offset: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyName => write!(f, "dictionary contains an empty name"),
            Error::NameTooLong { name, len, max } => {
                write!(f, "name `{name}` is {len} bytes long, at most {max} are supported")
            }
            Error::DuplicateName(name) => write!(f, "name `{name}` appears twice in the dictionary"),
            Error::HashCollision { first, second } => {
                write!(f, "names `{first}` and `{second}` share a content hash")
            }
            Error::PerfectHash { keys } => {
                write!(f, "could not build a perfect hash over {keys} keys")
            }
            Error::UnknownName { offset, name } => {
                write!(f, "unknown name `{name}` in record at byte {offset}")
            }
            Error::MalformedRecord { offset } => write!(f, "malformed record at byte {offset}"),
        }
    }
}

impl std::error::Error for Error {}
