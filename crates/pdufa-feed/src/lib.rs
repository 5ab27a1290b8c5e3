//! Calendar feeds: iCalendar parsing into raw events, and HTTP fetching.

mod error;
pub mod ics;

#[cfg(feature = "http")]
pub mod http;

pub use error::FeedError;
pub use ics::{parse_calendar, parse_calendar_str};

#[cfg(feature = "http")]
pub use http::{FeedClient, FetchReport};
