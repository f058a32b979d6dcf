use std::convert::From;
use std::error;
use std::fmt;
use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: Option<String>,
}

#[derive(Debug)]
pub enum ErrorKind {
    InvalidMonth,
    InvalidYear,
    InvalidFormat,
    Config,
    Persistence,
    Render,
    IOError(io::Error),
}

impl Error {
    pub fn new(kind: ErrorKind, msg: &str) -> Self {
        Error {
            kind,
            message: Some(msg.to_owned()),
        }
    }

    pub fn with_msg(mut self, message: &str) -> Self {
        self.message = Some(message.to_owned());
        self
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            kind,
            message: None,
        }
    }
}

impl From<io::ErrorKind> for Error {
    fn from(kind: io::ErrorKind) -> Error {
        Error::from(io::Error::from(kind))
    }
}

impl From<io::Error> for Error {
    fn from(io_error: io::Error) -> Error {
        Error::from(ErrorKind::IOError(io_error))
    }
}

impl From<nix::Error> for Error {
    fn from(errno: nix::Error) -> Error {
        Error::from(io::Error::from(errno))
    }
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Error {
        Error::new(
            ErrorKind::InvalidFormat,
            &format!("Could not parse TOML: {}", error),
        )
    }
}

impl From<toml::ser::Error> for Error {
    fn from(error: toml::ser::Error) -> Error {
        Error::new(
            ErrorKind::Persistence,
            &format!("Could not serialize state: {}", error),
        )
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let Error { kind, message } = err;
        match kind {
            ErrorKind::IOError(io_error) => io_error,
            kind => io::Error::new(
                io::ErrorKind::InvalidInput,
                message.unwrap_or_else(|| kind.as_str()),
            ),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{}: {}", self.kind.as_str(), msg),
            None => write!(f, "{}", self.kind.as_str()),
        }
    }
}

impl error::Error for Error {}

impl ErrorKind {
    pub fn as_str(&self) -> String {
        match self {
            ErrorKind::InvalidMonth => "month out of range".to_owned(),
            ErrorKind::InvalidYear => "year out of range".to_owned(),
            ErrorKind::InvalidFormat => "invalid format".to_owned(),
            ErrorKind::Config => "invalid configuration".to_owned(),
            ErrorKind::Persistence => "state persistence failed".to_owned(),
            ErrorKind::Render => "rendering failed".to_owned(),
            ErrorKind::IOError(err) => err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_and_without_message() {
        let plain = Error::from(ErrorKind::InvalidMonth);
        assert_eq!(plain.to_string(), "month out of range");

        let detailed = Error::new(ErrorKind::InvalidMonth, "13 is not a month");
        assert_eq!(detailed.to_string(), "month out of range: 13 is not a month");
    }

    #[test]
    fn io_error_round_trips_kind() {
        let err = Error::from(io::ErrorKind::NotFound);
        let io_err: io::Error = err.into();
        assert_eq!(io_err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn non_io_error_converts_with_message() {
        let io_err: io::Error = Error::from(ErrorKind::Persistence).into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(io_err.to_string(), "state persistence failed");

        let io_err: io::Error = Error::new(ErrorKind::Render, "pipe closed").into();
        assert_eq!(io_err.to_string(), "pipe closed");
    }
}
