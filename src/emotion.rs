use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fine label carried by the stand-in record for days with no emotion data.
pub const UNRECORDED_FINE_LABEL: &str = "no record";

/// Marker color for days whose emotion is pending or unknown.
pub const UNKNOWN_COLOR: &str = "black";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionLabel {
    Fear,
    Surprised,
    Anger,
    Sadness,
    Neutral,
    Joy,
    Disgust,
    None,
}

impl EmotionLabel {
    pub const ALL: [EmotionLabel; 8] = [
        Self::Fear,
        Self::Surprised,
        Self::Anger,
        Self::Sadness,
        Self::Neutral,
        Self::Joy,
        Self::Disgust,
        Self::None,
    ];

    /// Parses the `emotion_large` value sent by the walk service.
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fear" => Self::Fear,
            "surprised" => Self::Surprised,
            "anger" => Self::Anger,
            "sadness" => Self::Sadness,
            "neutral" => Self::Neutral,
            "joy" => Self::Joy,
            "disgust" => Self::Disgust,
            "none" | "" => Self::None,
            other => {
                debug!(label = other, "unrecognised emotion label");
                Self::None
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fear => "fear",
            Self::Surprised => "surprised",
            Self::Anger => "anger",
            Self::Sadness => "sadness",
            Self::Neutral => "neutral",
            Self::Joy => "joy",
            Self::Disgust => "disgust",
            Self::None => "none",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Self::Fear => "#48992C",
            Self::Surprised => "#287EFF",
            Self::Anger => "#EF281C",
            Self::Sadness => "#2A2096",
            Self::Neutral => "gray",
            Self::Joy => "#F5AF27",
            Self::Disgust => "#DB2B7F",
            Self::None => UNKNOWN_COLOR,
        }
    }

    pub fn korean_name(self) -> &'static str {
        match self {
            Self::Fear => "공포",
            Self::Surprised => "놀람",
            Self::Anger => "분노",
            Self::Sadness => "슬픔",
            Self::Neutral => "모호",
            Self::Joy => "행복",
            Self::Disgust => "혐오",
            Self::None => "기록 없음",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmotionRecord {
    pub date: NaiveDate,
    pub label: EmotionLabel,
    pub fine_label: String,
    pub sentence: String,
}

impl EmotionRecord {
    pub fn unrecorded(date: NaiveDate) -> Self {
        Self {
            date,
            label: EmotionLabel::None,
            fine_label: UNRECORDED_FINE_LABEL.to_string(),
            sentence: String::new(),
        }
    }
}

/// Result of a cache-aside emotion lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum EmotionLookup {
    /// Fetched, but the service had nothing for the day (or the fetch failed).
    Absent,
    Pending,
    Ready(EmotionRecord),
}

impl EmotionLookup {
    pub fn color(&self) -> &'static str {
        match self {
            Self::Ready(record) => record.label.color(),
            Self::Absent | Self::Pending => UNKNOWN_COLOR,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Pending => "pending",
            Self::Ready(_) => "ready",
        }
    }
}
