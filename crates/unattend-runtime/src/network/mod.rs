//! Network adapters: reachability probes and the payload downloader.

mod download;
mod probe;

pub use download::{HttpPayloadDownloader, file_name_from_url};
pub use probe::{CachedConnectivityProbe, TcpConnectivityProbe};
