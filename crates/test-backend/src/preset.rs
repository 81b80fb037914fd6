use brook_api::Fragment;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// The scripted stream for one chat request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetStream {
    /// Fragments to deliver, in order.
    pub fragments: Vec<Fragment>,
    /// If set, the request fails before any fragment is delivered.
    pub refuse: bool,
    /// If set, the stream fails after delivering this many fragments.
    pub fail_after: Option<usize>,
}

impl PresetStream {
    /// Creates a preset that delivers the specified fragments and then
    /// completes normally.
    #[inline]
    pub fn with_fragments(fragments: impl Into<Vec<Fragment>>) -> Self {
        Self {
            fragments: fragments.into(),
            refuse: false,
            fail_after: None,
        }
    }

    /// Creates a preset whose request is refused outright.
    #[inline]
    pub fn refused() -> Self {
        Self {
            fragments: vec![],
            refuse: true,
            fail_after: None,
        }
    }

    /// Makes the stream fail after delivering `count` fragments.
    #[inline]
    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }
}

/// A fixed instant for scripts that exercise elapsed-time computation.
pub fn script_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, 1, 10, 0, 0).unwrap()
}

/// Creates a content fragment stamped `seconds` after [`script_epoch`].
pub fn content_at(content: impl Into<String>, seconds: i64) -> Fragment {
    Fragment {
        history_id: None,
        content: Some(content.into()),
        created_at: Some(script_epoch() + chrono::Duration::seconds(seconds)),
    }
}
