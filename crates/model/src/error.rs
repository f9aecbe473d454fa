/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The backend could not be reached at all.
    Unreachable,
    /// The backend produced a stream the provider could not decode.
    MalformedStream,
    /// Any other errors.
    Other,
}
