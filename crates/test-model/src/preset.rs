use serde::{Deserialize, Serialize};

/// How a scripted generation should fail, if at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FailureMode {
    /// The request itself errors before any fragment is produced.
    BeforeStream,
    /// The stream errors after delivering the first `after` fragments.
    MidStream {
        /// Number of fragments delivered before the failure.
        after: usize,
    },
}

/// The preset outcome for one generation request.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetGeneration {
    /// Fragments streamed for this request, in order.
    pub fragments: Vec<String>,
    /// If set, the request fails according to the mode.
    pub failure: Option<FailureMode>,
}

impl PresetGeneration {
    /// Creates a successful preset streaming the given fragments.
    #[inline]
    pub fn with_fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            failure: None,
        }
    }

    /// Creates a preset that fails before producing any fragment.
    #[inline]
    pub fn failing_before_stream() -> Self {
        Self {
            fragments: vec![],
            failure: Some(FailureMode::BeforeStream),
        }
    }

    /// Makes the preset fail after delivering the first `after` of its
    /// fragments.
    #[inline]
    pub fn failing_after(mut self, after: usize) -> Self {
        self.failure = Some(FailureMode::MidStream { after });
        self
    }
}
