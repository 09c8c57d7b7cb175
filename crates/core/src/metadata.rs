use crate::exif_reader::{read_exif_tags, ExifTags, MetadataError, CAPTURE_TIMESTAMP_TAG};
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub const EXIF_TIMESTAMP_FORMAT: &str = "%Y:%m:%d %H:%M:%S";
pub const WATERMARK_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FallbackReason {
    NoMetadata,
    MissingTag,
    Unparsable(String),
    ReadError(String),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::NoMetadata => f.write_str("EXIFが含まれていません"),
            FallbackReason::MissingTag => {
                write!(f, "{CAPTURE_TIMESTAMP_TAG} がありません")
            }
            FallbackReason::Unparsable(raw) => write!(f, "撮影日時を解釈できません: {raw:?}"),
            FallbackReason::ReadError(message) => f.write_str(message),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DateSource {
    Exif,
    FallbackToday(FallbackReason),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WatermarkDate {
    pub text: String,
    pub source: DateSource,
}

impl WatermarkDate {
    pub fn fallback_reason(&self) -> Option<&FallbackReason> {
        match &self.source {
            DateSource::Exif => None,
            DateSource::FallbackToday(reason) => Some(reason),
        }
    }
}

/// 撮影日時を `YYYY-MM-DD` で返す。取得できなければ当日の日付にフォールバックする。
pub fn extract_watermark_date(path: &Path) -> WatermarkDate {
    let today = Local::now().date_naive();
    let date = resolve_watermark_date(read_exif_tags(path), today);
    if let Some(reason) = date.fallback_reason() {
        log::info!(
            "撮影日時が見つからないため当日の日付を使用します: {} ({}) -> {}",
            path.display(),
            reason,
            date.text
        );
    }
    date
}

pub fn resolve_watermark_date(
    tags: Result<ExifTags, MetadataError>,
    today: NaiveDate,
) -> WatermarkDate {
    let parsed = match tags {
        Ok(tags) => date_from_tags(&tags),
        Err(MetadataError::NotFound) => Err(FallbackReason::NoMetadata),
        Err(err) => Err(FallbackReason::ReadError(err.to_string())),
    };

    match parsed {
        Ok(date) => WatermarkDate {
            text: date.format(WATERMARK_DATE_FORMAT).to_string(),
            source: DateSource::Exif,
        },
        Err(reason) => WatermarkDate {
            text: today.format(WATERMARK_DATE_FORMAT).to_string(),
            source: DateSource::FallbackToday(reason),
        },
    }
}

fn date_from_tags(tags: &ExifTags) -> Result<NaiveDate, FallbackReason> {
    if tags.is_empty() {
        return Err(FallbackReason::NoMetadata);
    }
    let raw = tags
        .get(CAPTURE_TIMESTAMP_TAG)
        .ok_or(FallbackReason::MissingTag)?;
    NaiveDateTime::parse_from_str(raw.trim(), EXIF_TIMESTAMP_FORMAT)
        .map(|dt| dt.date())
        .map_err(|_| FallbackReason::Unparsable(raw.clone()))
}
