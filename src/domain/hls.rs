use serde::Serialize;

/// Options handed to the segmenting engine. These are service policy, not
/// caller-tunable: full on-demand playlists cut into 10-second chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentOptions {
    /// Index of the first chunk
    pub start_number: u32,
    /// Target chunk duration, seconds
    pub chunk_seconds: u32,
    /// Manifest window; `None` keeps every entry (VOD, not a live stream)
    pub playlist_window: Option<u32>,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            start_number: 0,
            chunk_seconds: 10,
            playlist_window: None,
        }
    }
}

/// One file published to the object store.
#[derive(Debug, Clone, Serialize)]
pub struct PublishedFile {
    pub name: String,
    pub url: String,
}
