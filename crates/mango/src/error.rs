/// Errors from the Mango API layer.
#[derive(Debug, thiserror::Error)]
pub enum MangoError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Mango returned a status we did not expect.
    #[error("Mango API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
        /// `Location` header, when the response carried one.
        location: Option<String>,
    },

    /// Writing a recording to disk failed.
    #[error("Recording storage error: {0}")]
    Io(#[from] std::io::Error),

    /// A payload could not be interpreted.
    #[error("Malformed payload: {0}")]
    Decode(String),
}

impl MangoError {
    /// Redirect target carried by an unexpected 3xx response.
    pub fn redirect_location(&self) -> Option<&str> {
        match self {
            Self::Api {
                status,
                location: Some(location),
                ..
            } if (300..400).contains(status) => Some(location),
            _ => None,
        }
    }
}
