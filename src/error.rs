//! Errors raised while building a [`Config`].
//!
//! The obfuscated streams never produce these errors. Their read and write
//! operations return [`io::Error`] values from the underlying transport
//! unchanged.
//!
//! [`Config`]: crate::Config
use core::{
    error,
    fmt::{Display, Formatter},
};
use std::io::{self, ErrorKind};

/// Enumeration of all possible configuration errors.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[non_exhaustive]
pub enum Error {
    /// The address does not name a host.
    EmptyHost,

    /// The port is not a decimal number in the range `0..=65535`.
    InvalidPort {
        /// The port string we received.
        received: String,
    },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::EmptyHost => write!(f, "EmptyHost"),
            Error::InvalidPort { received } => {
                write!(f, "InvalidPort: received {:?}", received)
            }
        }
    }
}

impl error::Error for Error {}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        io::Error::new(ErrorKind::InvalidInput, e)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_into_io_error() {
        let e: io::Error = Error::InvalidPort {
            received: "http".to_string(),
        }
        .into();
        assert_eq!(e.kind(), ErrorKind::InvalidInput);
        assert_eq!(e.to_string(), "InvalidPort: received \"http\"");
        assert_eq!(
            e.get_ref().and_then(|e| e.downcast_ref::<Error>()),
            Some(&Error::InvalidPort {
                received: "http".to_string()
            })
        );
    }
}
