//! pews-client: Fetches the early-warning feed over HTTP and drives the
//! pews-core decoders on a polling loop.

pub mod error;
pub mod feed;
pub mod fetch;
pub mod logging;
pub mod paths;

pub use error::ClientError;
pub use feed::{poll_loop, Cycle, FeedClient, PollOptions};
pub use fetch::{Fetch, HttpFetcher};
