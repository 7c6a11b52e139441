//! Configuration structures for setting up an [`ObfuscatedStream`] or
//! [`AsyncObfuscatedStream`].
//!
//! The only parameters are the host and port placed in the `Host` header of
//! the disguised request. They should name the server the traffic pretends to
//! talk to, which is usually not the proxy server itself.
//!
//! The port is kept as a string. When it is exactly `"80"` the `Host` header
//! carries the bare host, otherwise it carries `host:port`.
//!
//! # Example
//!
//! Build a config from its parts:
//! ```
//! use httpobfs::Config;
//!
//! let config = Config::builder_with_host("www.bing.com").with_default_port();
//! assert_eq!(config.host_header(), "www.bing.com");
//!
//! let config = Config::builder_with_host("example.com").with_port("8080");
//! assert_eq!(config.host_header(), "example.com:8080");
//! ```
//!
//! Parse a config from a `host:port` address:
//! ```
//! use httpobfs::Config;
//!
//! let config = Config::from_address("[::1]:8443").unwrap();
//! assert_eq!(config.host(), "[::1]");
//! assert_eq!(config.host_header(), "[::1]:8443");
//!
//! assert!(Config::from_address("example.com:http").is_err());
//! ```
//!
//! [`ObfuscatedStream`]: crate::ObfuscatedStream
//! [`AsyncObfuscatedStream`]: crate::AsyncObfuscatedStream
use crate::error::Error;

/// The port for which the `Host` header omits the port suffix.
pub(crate) const DEFAULT_PORT: &str = "80";

/// Configuration structure for setting up an [`ObfuscatedStream`] or
/// [`AsyncObfuscatedStream`].
///
/// For details on constructing `config`, refer to the [`config`] module.
///
/// [`config`]: crate::config
/// [`ObfuscatedStream`]: crate::ObfuscatedStream
/// [`AsyncObfuscatedStream`]: crate::AsyncObfuscatedStream
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Config {
    pub(crate) host: String,
    pub(crate) port: String,
}

/// A builder for creating a [`Config`] instance.
///
/// To get a [`ConfigBuilder`], use [`Config::builder_with_host`].
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ConfigBuilder<State> {
    state: State,
}

impl Config {
    /// Sets up the host of the `Host` header.
    pub fn builder_with_host(host: impl Into<String>) -> ConfigBuilder<WantsPort> {
        ConfigBuilder {
            state: WantsPort { host: host.into() },
        }
    }

    /// Parses a `host:port` address.
    ///
    /// IPv6 literals must be enclosed in brackets (`[::1]:443`); the brackets
    /// are kept in the host so the `Host` header stays unambiguous. When the
    /// port is omitted, port `80` is used.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyHost`] if no host is given, and
    /// [`Error::InvalidPort`] if the port is not a decimal `u16`.
    pub fn from_address(address: &str) -> Result<Self, Error> {
        let (host, port) = match address.strip_prefix('[') {
            Some(rest) => match rest.split_once(']') {
                Some((host, "")) => (host, None),
                Some((host, tail)) => match tail.strip_prefix(':') {
                    Some(port) => (host, Some(port)),
                    None => {
                        return Err(Error::InvalidPort {
                            received: tail.to_string(),
                        });
                    }
                },
                None => return Err(Error::EmptyHost),
            },
            None => match address.rsplit_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (address, None),
            },
        };

        if host.is_empty() {
            return Err(Error::EmptyHost);
        }
        let builder = if address.starts_with('[') {
            Config::builder_with_host(format!("[{}]", host))
        } else {
            Config::builder_with_host(host)
        };
        match port {
            None => Ok(builder.with_default_port()),
            Some(port) if is_decimal_port(port) => Ok(builder.with_port(port)),
            Some(port) => Err(Error::InvalidPort {
                received: port.to_string(),
            }),
        }
    }

    /// Returns the host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port, exactly as it was configured.
    pub fn port(&self) -> &str {
        &self.port
    }

    /// Returns the value of the `Host` header of the disguised request.
    ///
    /// This is the bare host when the port is `"80"`, otherwise `host:port`.
    pub fn host_header(&self) -> String {
        if self.port == DEFAULT_PORT {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl ConfigBuilder<WantsPort> {
    /// Sets up the port of the `Host` header.
    ///
    /// The value is used verbatim; only the exact string `"80"` is treated
    /// as the default HTTP port.
    pub fn with_port(self, port: impl Into<String>) -> Config {
        Config {
            host: self.state.host,
            port: port.into(),
        }
    }

    /// Use the default HTTP port (80).
    pub fn with_default_port(self) -> Config {
        self.with_port(DEFAULT_PORT)
    }
}

/// Config builder state where the caller must supply a port.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct WantsPort {
    host: String,
}

fn is_decimal_port(port: &str) -> bool {
    !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) && port.parse::<u16>().is_ok()
}
