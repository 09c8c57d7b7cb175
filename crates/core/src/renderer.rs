use crate::color::{InvalidArgument, DEFAULT_ALPHA};
use crate::font::WatermarkFont;
use crate::metadata::{extract_watermark_date, DateSource, FallbackReason};
use crate::position::{calculate_position, Position};
use image::{DynamicImage, GrayImage, ImageFormat, Rgba, RgbaImage};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_FONT_SIZE: u32 = 36;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkConfig {
    font_size: u32,
    color: Rgba<u8>,
    position: Position,
    font_path: Option<PathBuf>,
}

impl WatermarkConfig {
    pub fn new(
        font_size: u32,
        color: Rgba<u8>,
        position: Position,
        font_path: Option<PathBuf>,
    ) -> Result<Self, InvalidArgument> {
        if font_size == 0 {
            return Err(InvalidArgument::FontSize(font_size));
        }
        Ok(Self {
            font_size,
            color,
            position,
            font_path,
        })
    }

    pub fn font_size(&self) -> u32 {
        self.font_size
    }

    pub fn color(&self) -> Rgba<u8> {
        self.color
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn font_path(&self) -> Option<&Path> {
        self.font_path.as_deref()
    }
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE,
            color: Rgba([255, 255, 255, DEFAULT_ALPHA]),
            position: Position::default(),
            font_path: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("画像を開けませんでした: {path}: {source}")]
    Open {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("出力形式を拡張子から判別できません: {0}")]
    UnsupportedOutput(PathBuf),
    #[error("出力フォルダを作成できませんでした: {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("画像を保存できませんでした: {path}: {source}")]
    Save {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("出力ファイルを確定できませんでした: {path}: {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug)]
pub enum RenderOutcome {
    Watermarked { date: String },
    MetadataFallback { date: String, reason: FallbackReason },
    Failed(RenderError),
}

impl RenderOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, RenderOutcome::Failed(_))
    }

    pub fn date(&self) -> Option<&str> {
        match self {
            RenderOutcome::Watermarked { date } | RenderOutcome::MetadataFallback { date, .. } => {
                Some(date)
            }
            RenderOutcome::Failed(_) => None,
        }
    }

    pub fn status(&self) -> RenderStatus {
        match self {
            RenderOutcome::Watermarked { .. } => RenderStatus::Watermarked,
            RenderOutcome::MetadataFallback { .. } => RenderStatus::MetadataFallback,
            RenderOutcome::Failed(_) => RenderStatus::Failed,
        }
    }

    pub fn detail(&self) -> Option<String> {
        match self {
            RenderOutcome::Watermarked { .. } => None,
            RenderOutcome::MetadataFallback { reason, .. } => Some(reason.to_string()),
            RenderOutcome::Failed(err) => Some(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RenderStatus {
    Watermarked,
    MetadataFallback,
    Failed,
}

#[derive(Debug)]
pub struct Watermarker {
    config: WatermarkConfig,
    font: WatermarkFont,
}

impl Watermarker {
    pub fn new(config: WatermarkConfig) -> Self {
        let font = WatermarkFont::load(config.font_size, config.font_path());
        Self::with_font(config, font)
    }

    pub fn with_font(config: WatermarkConfig, font: WatermarkFont) -> Self {
        Self { config, font }
    }

    pub fn font(&self) -> &WatermarkFont {
        &self.font
    }

    /// 1ファイル分の処理。失敗はログに出して `Failed` として返し、呼び出し元へは伝播しない。
    pub fn render_one(&self, input: &Path, output: &Path) -> RenderOutcome {
        let date = extract_watermark_date(input);
        match self.try_render(input, output, &date.text) {
            Ok(()) => {
                log::info!("透かしを追加しました: {}", output.display());
                match date.source {
                    DateSource::Exif => RenderOutcome::Watermarked { date: date.text },
                    DateSource::FallbackToday(reason) => RenderOutcome::MetadataFallback {
                        date: date.text,
                        reason,
                    },
                }
            }
            Err(err) => {
                log::warn!("透かしの追加に失敗しました: {err}");
                RenderOutcome::Failed(err)
            }
        }
    }

    fn try_render(&self, input: &Path, output: &Path, text: &str) -> Result<(), RenderError> {
        let format = ImageFormat::from_path(output)
            .map_err(|_| RenderError::UnsupportedOutput(output.to_path_buf()))?;
        let source = image::open(input).map_err(|source| RenderError::Open {
            path: input.to_path_buf(),
            source,
        })?;

        let mut canvas = source.to_rgba8();
        self.draw(&mut canvas, text);

        let keep_alpha = source.color().has_alpha() && format != ImageFormat::Jpeg;
        let rendered = if keep_alpha {
            DynamicImage::ImageRgba8(canvas)
        } else {
            DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8())
        };
        drop(source);

        save_atomically(&rendered, output, format)
    }

    /// `canvas` 上に日付文字列を描画する。キャンバスの大きさは変えない。
    pub fn draw(&self, canvas: &mut RgbaImage, text: &str) {
        let text_size = self.font.measure(text);
        let (x, y) = calculate_position(canvas.dimensions(), text_size, self.config.position);

        let mut mask = GrayImage::new(canvas.width(), canvas.height());
        self.font.draw_coverage(&mut mask, x, y, text);
        blend_coverage(canvas, &mask, self.config.color);
    }
}

/// 被覆率と色のアルファを掛け合わせ、通常の "over" 合成で重ねる。
fn blend_coverage(canvas: &mut RgbaImage, mask: &GrayImage, color: Rgba<u8>) {
    let color_alpha = f32::from(color[3]) / 255.0;
    for (pixel, coverage) in canvas.pixels_mut().zip(mask.pixels()) {
        if coverage[0] == 0 {
            continue;
        }
        let src_a = f32::from(coverage[0]) / 255.0 * color_alpha;
        if src_a <= 0.0 {
            continue;
        }
        let dst_a = f32::from(pixel[3]) / 255.0;
        let out_a = src_a + dst_a * (1.0 - src_a);
        for c in 0..3 {
            let src = f32::from(color[c]);
            let dst = f32::from(pixel[c]);
            let value = (src * src_a + dst * dst_a * (1.0 - src_a)) / out_a;
            pixel[c] = value.round().clamp(0.0, 255.0) as u8;
        }
        pixel[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    }
}

/// 隠し一時ファイルに書き出してから rename し、途中状態の出力を残さない。
fn save_atomically(
    image: &DynamicImage,
    output: &Path,
    format: ImageFormat,
) -> Result<(), RenderError> {
    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|source| RenderError::CreateDir {
        path: parent.clone(),
        source,
    })?;

    let file_name = output
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| RenderError::UnsupportedOutput(output.to_path_buf()))?;
    let temp_path = parent.join(format!(".{file_name}.partial"));

    if let Err(source) = image.save_with_format(&temp_path, format) {
        let _ = fs::remove_file(&temp_path);
        return Err(RenderError::Save {
            path: output.to_path_buf(),
            source,
        });
    }
    if let Err(source) = fs::rename(&temp_path, output) {
        let _ = fs::remove_file(&temp_path);
        return Err(RenderError::Persist {
            path: output.to_path_buf(),
            source,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_jpeg_with_capture_date;
    use image::{GenericImageView, Rgb, RgbImage};
    use tempfile::tempdir;

    fn builtin(position: Position, color: Rgba<u8>) -> Watermarker {
        let config = WatermarkConfig::new(36, color, position, None).expect("valid config");
        Watermarker::with_font(config, WatermarkFont::Builtin)
    }

    #[test]
    fn config_rejects_zero_font_size() {
        let err = WatermarkConfig::new(0, Rgba([0, 0, 0, 0]), Position::Center, None)
            .expect_err("must fail");
        assert_eq!(err, InvalidArgument::FontSize(0));
    }

    #[test]
    fn default_config_matches_cli_defaults() {
        let config = WatermarkConfig::default();
        assert_eq!(config.font_size(), 36);
        assert_eq!(config.color(), Rgba([255, 255, 255, 128]));
        assert_eq!(config.position(), Position::RightBottom);
        assert!(config.font_path().is_none());
    }

    #[test]
    fn draw_touches_only_the_anchored_region() {
        let marker = builtin(Position::LeftTop, Rgba([255, 0, 0, 255]));
        let mut canvas = RgbaImage::from_pixel(300, 200, Rgba([0, 0, 0, 255]));
        marker.draw(&mut canvas, "2023-05-17");

        let (w, h) = WatermarkFont::Builtin.measure("2023-05-17");
        let mut changed = 0;
        for (x, y, pixel) in canvas.enumerate_pixels() {
            if *pixel != Rgba([0, 0, 0, 255]) {
                changed += 1;
                assert!((20..20 + w).contains(&x) && (20..20 + h).contains(&y));
                assert_eq!(*pixel, Rgba([255, 0, 0, 255]));
            }
        }
        assert!(changed > 0);
    }

    #[test]
    fn alpha_is_blended_over_opaque_pixels() {
        let marker = builtin(Position::LeftTop, Rgba([255, 255, 255, 128]));
        let mut canvas = RgbaImage::from_pixel(200, 100, Rgba([0, 0, 0, 255]));
        marker.draw(&mut canvas, "8");

        // '8' の最上段は 2 列目から始まる
        let pixel = canvas.get_pixel(22, 20);
        assert_eq!(pixel[3], 255);
        assert_eq!(pixel[0], 128);
        assert_eq!(pixel[0], pixel[1]);
    }

    #[test]
    fn zero_alpha_leaves_canvas_untouched() {
        let marker = builtin(Position::Center, Rgba([255, 255, 255, 0]));
        let original = RgbaImage::from_pixel(120, 80, Rgba([9, 9, 9, 255]));
        let mut canvas = original.clone();
        marker.draw(&mut canvas, "2023-05-17");
        assert_eq!(canvas, original);
    }

    #[test]
    fn render_one_keeps_dimensions_and_uses_exif_date() {
        let temp = tempdir().expect("tempdir");
        let input = write_jpeg_with_capture_date(
            &temp.path().join("IMG_0001.jpg"),
            (320, 240),
            "2023:05:17 14:30:00",
        );
        let output = temp.path().join("out").join("nested").join("IMG_0001.jpg");

        let marker = builtin(Position::RightBottom, Rgba([255, 255, 255, 128]));
        let outcome = marker.render_one(&input, &output);

        assert!(outcome.is_success(), "{outcome:?}");
        assert!(matches!(&outcome, RenderOutcome::Watermarked { date } if date == "2023-05-17"));
        let rendered = image::open(&output).expect("output must decode");
        assert_eq!(rendered.dimensions(), (320, 240));
        assert!(!output.with_file_name(".IMG_0001.jpg.partial").exists());
    }

    #[test]
    fn render_one_reports_metadata_fallback() {
        let temp = tempdir().expect("tempdir");
        let input = temp.path().join("plain.png");
        RgbImage::from_pixel(100, 60, Rgb([50, 60, 70]))
            .save(&input)
            .expect("save png");
        let output = temp.path().join("out.png");

        let outcome = builtin(Position::Center, Rgba([0, 0, 0, 255])).render_one(&input, &output);

        assert_eq!(outcome.status(), RenderStatus::MetadataFallback);
        assert!(outcome.is_success());
        assert_eq!(outcome.date().map(str::len), Some(10));
        let rendered = image::open(&output).expect("output must decode");
        assert_eq!(rendered.dimensions(), (100, 60));
        assert!(!rendered.color().has_alpha());
    }

    #[test]
    fn render_one_preserves_alpha_for_png_sources_with_alpha() {
        let temp = tempdir().expect("tempdir");
        let input = temp.path().join("alpha.png");
        RgbaImage::from_pixel(90, 50, Rgba([10, 10, 10, 0]))
            .save(&input)
            .expect("save png");
        let output = temp.path().join("alpha_out.png");

        let outcome =
            builtin(Position::Center, Rgba([255, 255, 255, 255])).render_one(&input, &output);
        assert!(outcome.is_success(), "{outcome:?}");
        let rendered = image::open(&output).expect("output must decode");
        assert!(rendered.color().has_alpha());
    }

    #[test]
    fn render_one_fails_for_undecodable_input() {
        let temp = tempdir().expect("tempdir");
        let input = temp.path().join("broken.jpg");
        fs::write(&input, b"definitely not a jpeg").expect("write");
        let output = temp.path().join("out").join("broken.jpg");

        let outcome = builtin(Position::Center, Rgba([0, 0, 0, 255])).render_one(&input, &output);

        assert!(!outcome.is_success());
        assert!(matches!(outcome, RenderOutcome::Failed(RenderError::Open { .. })));
        assert!(!output.exists());
    }

    #[test]
    fn render_one_fails_for_unknown_output_extension() {
        let temp = tempdir().expect("tempdir");
        let input = temp.path().join("plain.png");
        RgbImage::from_pixel(10, 10, Rgb([0, 0, 0]))
            .save(&input)
            .expect("save png");

        let outcome = builtin(Position::Center, Rgba([0, 0, 0, 255]))
            .render_one(&input, &temp.path().join("out.unknownext"));
        assert!(matches!(
            outcome,
            RenderOutcome::Failed(RenderError::UnsupportedOutput(_))
        ));
    }

    #[test]
    fn render_one_overwrites_existing_output() {
        let temp = tempdir().expect("tempdir");
        let input = temp.path().join("plain.bmp");
        RgbImage::from_pixel(64, 48, Rgb([200, 200, 200]))
            .save(&input)
            .expect("save bmp");
        let output = temp.path().join("out.bmp");
        fs::write(&output, b"stale").expect("write stale");

        let outcome = builtin(Position::LeftBottom, Rgba([0, 0, 0, 255])).render_one(&input, &output);
        assert!(outcome.is_success(), "{outcome:?}");
        assert_eq!(
            image::open(&output).expect("decode").dimensions(),
            (64, 48)
        );
    }
}
