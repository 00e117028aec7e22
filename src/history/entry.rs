//! History entry type.

use crate::error::Result;
use crate::image::{AspectRatio, ImagePayload};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One completed generation, as stored in history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    /// Unique, time-derived id.
    pub id: String,
    /// Self-contained `data:` URL of the (compressed) image.
    pub url: String,
    /// Prompt the image was generated from.
    pub prompt: String,
    /// Creation time, Unix epoch milliseconds.
    pub timestamp: i64,
    /// Aspect ratio the image was requested with.
    pub aspect_ratio: AspectRatio,
}

impl GeneratedImage {
    /// Builds an entry whose url embeds `payload`.
    pub fn new(
        id: impl Into<String>,
        payload: &ImagePayload,
        prompt: impl Into<String>,
        timestamp: i64,
        aspect_ratio: AspectRatio,
    ) -> Self {
        Self {
            id: id.into(),
            url: payload.to_data_url(),
            prompt: prompt.into(),
            timestamp,
            aspect_ratio,
        }
    }

    /// Decodes the embedded image.
    pub fn payload(&self) -> Result<ImagePayload> {
        ImagePayload::from_data_url(&self.url)
    }

    /// Returns the creation time, if the timestamp is in range.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

/// Hands out millisecond ids that never repeat within a process, even when
/// two cycles commit in the same millisecond.
#[derive(Debug, Default)]
pub(crate) struct IdClock {
    last: i64,
}

impl IdClock {
    /// Starts after `last`, e.g. the newest id already in history.
    pub(crate) fn starting_after(last: i64) -> Self {
        Self { last }
    }

    /// Returns `(id, timestamp)` for an entry created at `now_ms`.
    pub(crate) fn next(&mut self, now_ms: i64) -> (String, i64) {
        let id = now_ms.max(self.last + 1);
        self.last = id;
        (id.to_string(), now_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageFormat;

    #[test]
    fn test_serialized_shape() {
        let payload = ImagePayload::new(vec![1, 2, 3], ImageFormat::Jpeg);
        let entry = GeneratedImage::new(
            "1700000000000",
            &payload,
            "a fox",
            1_700_000_000_000,
            AspectRatio::Landscape,
        );
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["aspectRatio"], "16:9");
        assert_eq!(json["url"], "data:image/jpeg;base64,AQID");
        assert_eq!(json["timestamp"], 1_700_000_000_000i64);
        assert!(json.get("aspect_ratio").is_none());
    }

    #[test]
    fn test_reads_legacy_entry() {
        let json = r#"{"id":"1712345678901","url":"data:image/jpeg;base64,AQID","prompt":"neon koi","timestamp":1712345678901,"aspectRatio":"3:4"}"#;
        let entry: GeneratedImage = serde_json::from_str(json).unwrap();
        assert_eq!(entry.aspect_ratio, AspectRatio::Tall);
        assert_eq!(entry.payload().unwrap().data, vec![1, 2, 3]);
        assert!(entry.created_at().is_some());
    }

    #[test]
    fn test_id_clock_never_repeats() {
        let mut clock = IdClock::default();
        assert_eq!(clock.next(100), ("100".to_string(), 100));
        assert_eq!(clock.next(100).0, "101");
        assert_eq!(clock.next(99).0, "102");
        assert_eq!(clock.next(500).0, "500");

        let mut resumed = IdClock::starting_after(500);
        assert_eq!(resumed.next(400).0, "501");
    }
}
