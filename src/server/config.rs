//! Server configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::error::{Error, Result};

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8080;

/// Period of the inactive-session sweep. Fixed, not part of [`ServerConfig`].
pub const SWEEP_PERIOD: Duration = Duration::from_millis(500);

/// Value of the `Server` header on every reply
pub const SERVER_NAME: &str = "camfeed";

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Worker threads servicing HTTP requests
    pub server_threads: usize,

    /// Worker threads delivering bus callbacks
    pub bus_threads: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Capacity, in chunks, of each connection's outgoing queue
    pub connection_queue: usize,

    /// Largest request header block accepted
    pub max_request_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            server_threads: 1,
            bus_threads: 2,
            tcp_nodelay: true, // frames are written as soon as they are encoded
            connection_queue: 64,
            max_request_size: 8 * 1024,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set only the port, keeping the bind IP
    pub fn port(mut self, port: u16) -> Self {
        self.bind_addr.set_port(port);
        self
    }

    /// Set the HTTP worker thread count
    pub fn server_threads(mut self, threads: usize) -> Self {
        self.server_threads = threads;
        self
    }

    /// Set the bus callback worker thread count
    pub fn bus_threads(mut self, threads: usize) -> Self {
        self.bus_threads = threads;
        self
    }

    /// Set the per-connection outgoing queue capacity
    pub fn connection_queue(mut self, chunks: usize) -> Self {
        self.connection_queue = chunks.max(1);
        self
    }

    /// Check values that cannot be defaulted away
    pub fn validate(&self) -> Result<()> {
        if self.server_threads == 0 {
            return Err(Error::Config("server_threads must be at least 1".into()));
        }
        if self.bus_threads == 0 {
            return Err(Error::Config("bus_threads must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 8080);
        assert!(config.bind_addr.ip().is_unspecified());
        assert_eq!(config.server_threads, 1);
        assert_eq!(config.bus_threads, 2);
        assert!(config.tcp_nodelay);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.server_threads, 1);
    }

    #[test]
    fn test_builder_port_keeps_ip() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let config = ServerConfig::with_addr(addr).port(8181);

        assert_eq!(config.bind_addr, "127.0.0.1:8181".parse().unwrap());
    }

    #[test]
    fn test_builder_connection_queue_floor() {
        let config = ServerConfig::default().connection_queue(0);

        assert_eq!(config.connection_queue, 1);
    }

    #[test]
    fn test_zero_threads_rejected() {
        assert!(ServerConfig::default().server_threads(0).validate().is_err());
        assert!(ServerConfig::default().bus_threads(0).validate().is_err());
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "0.0.0.0:8000".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .server_threads(4)
            .bus_threads(3)
            .connection_queue(16);

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.server_threads, 4);
        assert_eq!(config.bus_threads, 3);
        assert_eq!(config.connection_queue, 16);
    }
}
