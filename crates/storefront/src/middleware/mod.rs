//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers (nosniff, no framing, no caching)
//! 5. CORS (browser client on another origin)
//! 6. Rate limiting (governor; attached in `main`)

pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use rate_limit::{api_rate_limiter, write_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
