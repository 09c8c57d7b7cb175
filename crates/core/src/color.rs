use image::Rgba;
use thiserror::Error;

pub const DEFAULT_ALPHA: u8 = 128;
pub const DEFAULT_COLOR: &str = "255,255,255,128";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidArgument {
    #[error("色は3つまたは4つの成分で指定してください (指定数: {0})")]
    ComponentCount(usize),
    #[error("色の{index}番目の成分が範囲外です (0-255): {value}")]
    ComponentOutOfRange { index: usize, value: i64 },
    #[error("色の成分が整数ではありません: {0:?}")]
    NotANumber(String),
    #[error("フォントサイズは1以上で指定してください: {0}")]
    FontSize(u32),
}

/// `"R,G,B"` または `"R,G,B,A"` を RGBA に変換する。アルファ省略時は 128。
pub fn parse_color(input: &str) -> Result<Rgba<u8>, InvalidArgument> {
    let mut components = input
        .split(',')
        .map(|part| {
            let part = part.trim();
            part.parse::<i64>()
                .map_err(|_| InvalidArgument::NotANumber(part.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    match components.len() {
        3 => components.push(i64::from(DEFAULT_ALPHA)),
        4 => {}
        n => return Err(InvalidArgument::ComponentCount(n)),
    }

    let mut rgba = [0u8; 4];
    for (i, value) in components.into_iter().enumerate() {
        rgba[i] = u8::try_from(value).map_err(|_| InvalidArgument::ComponentOutOfRange {
            index: i + 1,
            value,
        })?;
    }

    Ok(Rgba(rgba))
}

pub fn format_color(color: Rgba<u8>) -> String {
    let [r, g, b, a] = color.0;
    format!("{r},{g},{b},{a}")
}
