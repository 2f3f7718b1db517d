//! Load and throughput benchmark harness for TLSRPT report collectors.
//!
//! The harness first runs a blocking, unpaced ramp-up against the
//! collector's unix datagram socket to establish the baseline throughput
//! ([`calibrate`]), then drives background load at escalating fractions of
//! that baseline from a pool of worker threads ([`worker`]), each pacing
//! itself with a convergence scheduler ([`pacer`]) against a shared target
//! rate, while the main thread periodically layers unthrottled foreground
//! bursts on top and reports per-worker and aggregate rates ([`burst`]).
//!
//! Everything is measured with the sampling windows in [`rate`]; the
//! synthetic report payloads come from [`requests`] and leave the process
//! through the narrow client seam in [`client`].

pub mod burst;
pub mod calibrate;
pub mod client;
pub mod pacer;
pub mod rate;
pub mod reporter;
pub mod requests;
pub mod worker;
