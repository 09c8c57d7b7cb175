use exif::experimental::Writer;
use exif::{Field, In, Tag, Value};
use image::{ImageFormat, Rgb, RgbImage};
use img_parts::jpeg::Jpeg;
use img_parts::{Bytes, ImageEXIF};
use log::{LevelFilter, Log, Metadata, Record};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};

/// JPEG を生成し、`DateTimeOriginal` を埋め込む。
pub(crate) fn write_jpeg_with_capture_date(
    path: &Path,
    size: (u32, u32),
    capture: &str,
) -> PathBuf {
    let image = RgbImage::from_pixel(size.0, size.1, Rgb([40, 40, 40]));
    let mut encoded = Cursor::new(Vec::new());
    image
        .write_to(&mut encoded, ImageFormat::Jpeg)
        .expect("encode jpeg");

    let make = Field {
        tag: Tag::Make,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![b"TEST".to_vec()]),
    };
    let original = Field {
        tag: Tag::DateTimeOriginal,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![capture.as_bytes().to_vec()]),
    };
    let mut writer = Writer::new();
    writer.push_field(&make);
    writer.push_field(&original);
    let mut exif_buf = Cursor::new(Vec::new());
    writer.write(&mut exif_buf, false).expect("write exif");

    let mut jpeg = Jpeg::from_bytes(Bytes::from(encoded.into_inner())).expect("parse jpeg");
    jpeg.set_exif(Some(Bytes::from(exif_buf.into_inner())));
    fs::write(path, jpeg.encoder().bytes()).expect("write jpeg");
    path.to_path_buf()
}

static RECORDS: Mutex<Vec<String>> = Mutex::new(Vec::new());
static INSTALL: Once = Once::new();

struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if let Ok(mut records) = RECORDS.lock() {
            records.push(format!("{} {}", record.level(), record.args()));
        }
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;

/// テストプロセス全体でログを記録する。並列に走る他テストのログも混ざるので、
/// 呼び出し側はファイルパスなど固有の文字列で絞り込むこと。
pub(crate) fn capture_logs() {
    INSTALL.call_once(|| {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(LevelFilter::Debug);
        }
    });
}

/// `needle` を含む記録済みログ (`"INFO message"` 形式)。
pub(crate) fn logs_containing(needle: &str) -> Vec<String> {
    RECORDS
        .lock()
        .map(|records| {
            records
                .iter()
                .filter(|line| line.contains(needle))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}
