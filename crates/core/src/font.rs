use ab_glyph::{point, Font, FontVec, GlyphId, OutlinedGlyph, PxScale, Rect, ScaleFont};
use image::{GrayImage, Luma};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FontError {
    #[error("フォントを読み込めませんでした: {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("フォント形式が不正です: {0}")]
    Invalid(PathBuf),
}

pub enum WatermarkFont {
    Scalable {
        font: FontVec,
        scale: PxScale,
        path: PathBuf,
    },
    Builtin,
}

impl std::fmt::Debug for WatermarkFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

impl WatermarkFont {
    pub fn from_file(path: &Path, font_size: u32) -> Result<Self, FontError> {
        let data = fs::read(path).map_err(|source| FontError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let font =
            FontVec::try_from_vec(data).map_err(|_| FontError::Invalid(path.to_path_buf()))?;
        Ok(WatermarkFont::Scalable {
            font,
            scale: PxScale::from(font_size as f32),
            path: path.to_path_buf(),
        })
    }

    /// 指定フォント、システムフォントの順に試し、全て失敗したら内蔵フォントを使う。
    pub fn load(font_size: u32, custom: Option<&Path>) -> Self {
        if let Some(path) = custom {
            match Self::from_file(path, font_size) {
                Ok(font) => return font,
                Err(err) => log::warn!("{err}"),
            }
        }

        for candidate in system_font_candidates() {
            if !candidate.is_file() {
                continue;
            }
            match Self::from_file(&candidate, font_size) {
                Ok(font) => {
                    log::debug!("フォント: {}", candidate.display());
                    return font;
                }
                Err(err) => log::debug!("{err}"),
            }
        }

        log::debug!("システムフォントが見つからないため内蔵フォントを使用します");
        WatermarkFont::Builtin
    }

    pub fn describe(&self) -> String {
        match self {
            WatermarkFont::Scalable { path, scale, .. } => {
                format!("{} ({}px)", path.display(), scale.y)
            }
            WatermarkFont::Builtin => "builtin".to_string(),
        }
    }

    /// 描画時の外接矩形 (幅, 高さ)。`draw_coverage` はこの矩形の左上を (x, y) に合わせて描く。
    pub fn measure(&self, text: &str) -> (u32, u32) {
        match self {
            WatermarkFont::Scalable { font, scale, .. } => {
                match ink_bounds(&layout(font, *scale, text)) {
                    Some(bounds) => (bounds.width() as u32, bounds.height() as u32),
                    None => (0, 0),
                }
            }
            WatermarkFont::Builtin => builtin::measure(text),
        }
    }

    /// `mask` にグリフの被覆率 (0-255) を書き込む。
    pub fn draw_coverage(&self, mask: &mut GrayImage, x: i32, y: i32, text: &str) {
        match self {
            WatermarkFont::Scalable { font, scale, .. } => {
                let glyphs = layout(font, *scale, text);
                if let Some(bounds) = ink_bounds(&glyphs) {
                    draw_glyphs(mask, x, y, &glyphs, bounds);
                }
            }
            WatermarkFont::Builtin => builtin::draw(mask, x, y, text),
        }
    }
}

/// ベースラインを ascent の位置に置いて 1 行に並べる。輪郭のない文字 (空白など) は送り幅だけ進む。
fn layout(font: &FontVec, scale: PxScale, text: &str) -> Vec<OutlinedGlyph> {
    let scaled = font.as_scaled(scale);
    let mut caret = point(0.0, scaled.ascent());
    let mut previous: Option<GlyphId> = None;
    let mut glyphs = Vec::new();

    for ch in text.chars() {
        let id = scaled.glyph_id(ch);
        if let Some(prev) = previous {
            caret.x += scaled.kern(prev, id);
        }
        let glyph = id.with_scale_and_position(scale, caret);
        caret.x += scaled.h_advance(id);
        previous = Some(id);
        if let Some(outlined) = font.outline_glyph(glyph) {
            glyphs.push(outlined);
        }
    }
    glyphs
}

/// 全グリフのピクセル境界の和。px_bounds は整数座標に丸められている。
fn ink_bounds(glyphs: &[OutlinedGlyph]) -> Option<Rect> {
    glyphs
        .iter()
        .map(OutlinedGlyph::px_bounds)
        .reduce(|acc, bb| Rect {
            min: point(acc.min.x.min(bb.min.x), acc.min.y.min(bb.min.y)),
            max: point(acc.max.x.max(bb.max.x), acc.max.y.max(bb.max.y)),
        })
}

fn draw_glyphs(mask: &mut GrayImage, x: i32, y: i32, glyphs: &[OutlinedGlyph], bounds: Rect) {
    let (width, height) = (mask.width() as i64, mask.height() as i64);
    for glyph in glyphs {
        let bb = glyph.px_bounds();
        let origin_x = x as i64 + (bb.min.x - bounds.min.x) as i64;
        let origin_y = y as i64 + (bb.min.y - bounds.min.y) as i64;
        glyph.draw(|gx, gy, coverage| {
            let px = origin_x + gx as i64;
            let py = origin_y + gy as i64;
            if !(0..width).contains(&px) || !(0..height).contains(&py) {
                return;
            }
            let value = (coverage.clamp(0.0, 1.0) * 255.0).round() as u8;
            let pixel = mask.get_pixel_mut(px as u32, py as u32);
            // 隣接グリフが重なる部分は濃い方を残す
            if value > pixel[0] {
                *pixel = Luma([value]);
            }
        });
    }
}

fn system_font_candidates() -> Vec<PathBuf> {
    if cfg!(target_os = "windows") {
        let root = std::env::var_os("WINDIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(r"C:\Windows"));
        vec![root.join("Fonts").join("arial.ttf")]
    } else if cfg!(target_os = "macos") {
        [
            "/System/Library/Fonts/Supplemental/Arial.ttf",
            "/Library/Fonts/Arial.ttf",
            "/Library/Fonts/DejaVuSans.ttf",
        ]
        .iter()
        .map(PathBuf::from)
        .collect()
    } else {
        [
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
            "/usr/share/fonts/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
            "/usr/local/share/fonts/DejaVuSans.ttf",
        ]
        .iter()
        .map(PathBuf::from)
        .collect()
    }
}

/// 5x7 のビットマップ数字フォント。サイズは固定。
mod builtin {
    use image::{GrayImage, Luma};

    const GLYPH_WIDTH: u32 = 5;
    const GLYPH_HEIGHT: u32 = 7;
    const PIXEL: u32 = 2;
    const SPACING: u32 = 1;

    const TOFU: [u8; 7] = [0x1F, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1F];

    fn glyph(ch: char) -> [u8; 7] {
        match ch {
            '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
            '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
            '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
            '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
            '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
            '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
            '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
            '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
            '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
            '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
            '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
            ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
            '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
            '/' => [0x01, 0x01, 0x02, 0x04, 0x08, 0x10, 0x10],
            ' ' => [0x00; 7],
            _ => TOFU,
        }
    }

    fn advance() -> u32 {
        (GLYPH_WIDTH + SPACING) * PIXEL
    }

    pub(super) fn measure(text: &str) -> (u32, u32) {
        let count = text.chars().count() as u32;
        if count == 0 {
            return (0, 0);
        }
        (count * advance() - SPACING * PIXEL, GLYPH_HEIGHT * PIXEL)
    }

    pub(super) fn draw(mask: &mut GrayImage, x: i32, y: i32, text: &str) {
        let (width, height) = (mask.width() as i64, mask.height() as i64);
        for (index, ch) in text.chars().enumerate() {
            let origin_x = x as i64 + index as i64 * advance() as i64;
            for (row, bits) in glyph(ch).iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                        continue;
                    }
                    for dy in 0..PIXEL {
                        for dx in 0..PIXEL {
                            let px = origin_x + (col * PIXEL + dx) as i64;
                            let py = y as i64 + (row as u32 * PIXEL + dy) as i64;
                            if (0..width).contains(&px) && (0..height).contains(&py) {
                                mask.put_pixel(px as u32, py as u32, Luma([255]));
                            }
                        }
                    }
                }
            }
        }
    }
}
