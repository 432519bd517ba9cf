//! Link discovery module
//!
//! Best-effort extraction of outbound links from fetched pages and the
//! filter that decides which candidates are worth visiting.

mod extract;
mod filter;

pub use extract::extract_links;
pub use filter::{is_blacklisted, should_accept};
