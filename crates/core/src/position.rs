use serde::{Deserialize, Serialize};
use std::fmt;

pub const PADDING: i32 = 20;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    LeftTop,
    CenterTop,
    RightTop,
    LeftCenter,
    Center,
    RightCenter,
    LeftBottom,
    CenterBottom,
    #[default]
    RightBottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    Start,
    Middle,
    End,
}

impl Anchor {
    fn offset(self, dimension: i32, text: i32) -> i32 {
        match self {
            Anchor::Start => PADDING,
            Anchor::Middle => (dimension - text).div_euclid(2),
            Anchor::End => dimension - text - PADDING,
        }
    }
}

impl Position {
    pub const ALL: [Position; 9] = [
        Position::LeftTop,
        Position::CenterTop,
        Position::RightTop,
        Position::LeftCenter,
        Position::Center,
        Position::RightCenter,
        Position::LeftBottom,
        Position::CenterBottom,
        Position::RightBottom,
    ];

    pub const NAMES: [&'static str; 9] = [
        "left_top",
        "center_top",
        "right_top",
        "left_center",
        "center",
        "right_center",
        "left_bottom",
        "center_bottom",
        "right_bottom",
    ];

    pub fn name(self) -> &'static str {
        match self {
            Position::LeftTop => "left_top",
            Position::CenterTop => "center_top",
            Position::RightTop => "right_top",
            Position::LeftCenter => "left_center",
            Position::Center => "center",
            Position::RightCenter => "right_center",
            Position::LeftBottom => "left_bottom",
            Position::CenterBottom => "center_bottom",
            Position::RightBottom => "right_bottom",
        }
    }

    /// 未知の名前は右下として扱う。
    pub fn from_name(name: &str) -> Position {
        let name = name.trim();
        Position::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
            .unwrap_or_default()
    }

    fn anchors(self) -> (Anchor, Anchor) {
        match self {
            Position::LeftTop => (Anchor::Start, Anchor::Start),
            Position::CenterTop => (Anchor::Middle, Anchor::Start),
            Position::RightTop => (Anchor::End, Anchor::Start),
            Position::LeftCenter => (Anchor::Start, Anchor::Middle),
            Position::Center => (Anchor::Middle, Anchor::Middle),
            Position::RightCenter => (Anchor::End, Anchor::Middle),
            Position::LeftBottom => (Anchor::Start, Anchor::End),
            Position::CenterBottom => (Anchor::Middle, Anchor::End),
            Position::RightBottom => (Anchor::End, Anchor::End),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// テキストの左上座標を返す。はみ出す場合は負の値になりうる。
pub fn calculate_position(
    image_size: (u32, u32),
    text_size: (u32, u32),
    position: Position,
) -> (i32, i32) {
    let (horizontal, vertical) = position.anchors();
    (
        horizontal.offset(to_i32(image_size.0), to_i32(text_size.0)),
        vertical.offset(to_i32(image_size.1), to_i32(text_size.1)),
    )
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
