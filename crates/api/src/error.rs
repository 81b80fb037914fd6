/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The bearer credential was rejected.
    Unauthorized,
    /// The request failed at the transport level, or the server returned
    /// a non-success status.
    Http,
    /// The response body could not be decoded.
    Decode,
    /// Any other errors.
    Other,
}
