use exif::{Reader, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

pub const CAPTURE_TIMESTAMP_TAG: &str = "DateTimeOriginal";

/// タグ名 -> 値。ASCII タグは生の文字列のまま保持する。
pub type ExifTags = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("EXIF読み込み対象を開けませんでした: {0}")]
    Open(#[from] std::io::Error),
    #[error("EXIFが含まれていません")]
    NotFound,
    #[error("EXIFを解析できませんでした: {0}")]
    Parse(exif::Error),
}

impl From<exif::Error> for MetadataError {
    fn from(err: exif::Error) -> Self {
        match err {
            exif::Error::NotFound(_) => MetadataError::NotFound,
            exif::Error::Io(io) => MetadataError::Open(io),
            other => MetadataError::Parse(other),
        }
    }
}

pub fn read_exif_tags(path: &Path) -> Result<ExifTags, MetadataError> {
    let file = File::open(path)?;
    let mut buf = BufReader::new(file);
    let exif = Reader::new().read_from_container(&mut buf)?;

    let mut tags = ExifTags::new();
    for field in exif.fields() {
        // Display はタグ名 ("DateTimeOriginal")、Debug は "Tag(Exif, 36867)" になる
        let tag_name = field.tag.to_string();
        // 同名タグは先に現れたもの (主画像の IFD) を優先する
        if tags.contains_key(&tag_name) {
            continue;
        }
        let value = match &field.value {
            Value::Ascii(parts) => parts
                .first()
                .map(|raw| String::from_utf8_lossy(raw).to_string())
                .unwrap_or_default(),
            _ => field.display_value().with_unit(&exif).to_string(),
        };
        tags.insert(tag_name, value);
    }

    Ok(tags)
}
