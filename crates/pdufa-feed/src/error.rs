use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("could not parse calendar {feed}: {message}")]
    Parse { feed: String, message: String },

    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned {status}: {body}")]
    Server {
        url: String,
        status: u16,
        body: String,
    },
}
