//! Rate limiting middleware using governor and `tower_governor`.
//!
//! - `api_rate_limiter`: read endpoints (~100/min per client)
//! - `write_rate_limiter`: cart sync and newsletter sign-up (~20/min per client)

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Proxy headers carrying the client IP, most trusted first. Each value may
/// be a comma-separated chain; the first entry is the client.
const CLIENT_IP_HEADERS: &[&str] = &[
    "cf-connecting-ip",
    "fly-client-ip",
    "x-forwarded-for",
    "x-real-ip",
];

/// Key extractor that reads the client IP from proxy headers, falling back
/// to the peer address when the server runs with connect info.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        client_ip(req.headers())
            .or_else(|| {
                req.extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip())
            })
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    CLIENT_IP_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)?
            .to_str()
            .ok()?
            .split(',')
            .next()?
            .trim()
            .parse::<IpAddr>()
            .ok()
    })
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

fn limiter(replenish_secs: u64, burst: u32) -> Option<RateLimiterLayer> {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(replenish_secs)
        .burst_size(burst)
        .finish()?;
    Some(GovernorLayer::new(Arc::new(config)))
}

/// Create rate limiter for read endpoints: 1 token per second, burst of 50.
///
/// Returns `None` only if governor rejects the configuration.
#[must_use]
pub fn api_rate_limiter() -> Option<RateLimiterLayer> {
    limiter(1, 50)
}

/// Create rate limiter for writes: 1 token every 3 seconds, burst of 10.
///
/// Each cart change posts the full line list, so bursts of a few requests are
/// normal while a shopper adjusts quantities.
#[must_use]
pub fn write_rate_limiter() -> Option<RateLimiterLayer> {
    limiter(3, 10)
}
