// # IP Resolver Trait
//
// Defines the interface for determining the host's public IPv4 address.
//
// ## Implementations
//
// - HTTP ip-echo service: `ipwarden-ip-http` crate
//
// ## Contract
//
// `resolve()` issues a single outbound request. Any network error,
// non-2xx status, or malformed body is an `Err`; it never panics and
// never retries internally. Retry is the poll engine's responsibility
// via the next scheduled cycle.

use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Trait for public-IP resolver implementations
///
/// Implementations must be thread-safe and usable across async tasks.
/// They are observers only: no state, no scheduling, no retries.
#[async_trait]
pub trait IpResolver: Send + Sync {
    /// Resolve the caller's current public IPv4 address
    ///
    /// # Returns
    ///
    /// - `Ok(Ipv4Addr)`: The current public address
    /// - `Err(Error)`: If the address could not be determined this cycle
    async fn resolve(&self) -> Result<Ipv4Addr, crate::Error>;
}
