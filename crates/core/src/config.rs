use crate::color::{parse_color, DEFAULT_COLOR};
use crate::position::Position;
use crate::renderer::{WatermarkConfig, DEFAULT_FONT_SIZE};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub font_size: u32,
    pub color: String,
    pub position: String,
    pub font_path: Option<PathBuf>,
    pub parallel: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE,
            color: DEFAULT_COLOR.to_string(),
            position: Position::default().name().to_string(),
            font_path: None,
            parallel: false,
        }
    }
}

impl AppConfig {
    /// 位置名が不明な場合は右下として扱う。
    pub fn to_watermark_config(&self) -> Result<WatermarkConfig> {
        let color = parse_color(&self.color)
            .with_context(|| format!("設定ファイルの color が不正です: {}", self.color))?;
        let position = Position::from_name(&self.position);
        if position.name() != self.position.trim().to_ascii_lowercase() {
            log::debug!(
                "設定ファイルの position を {} として扱います: {}",
                position,
                self.position
            );
        }
        let config = WatermarkConfig::new(self.font_size, color, position, self.font_path.clone())
            .context("設定ファイルの font_size が不正です")?;
        Ok(config)
    }
}

/// OS標準の設定ディレクトリにある `config.toml`。`--config` 未指定時に使う。
pub fn default_config_path() -> Result<PathBuf> {
    let proj = ProjectDirs::from("com", "kelly", "photo-watermark")
        .context("OS標準設定ディレクトリを取得できませんでした")?;
    Ok(proj.config_dir().join("config.toml"))
}

pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("設定ファイルを読めませんでした: {}", path.display()))?;

    let config = toml::from_str::<AppConfig>(&raw).context("設定ファイルのパースに失敗しました")?;
    Ok(config)
}

pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| {
            format!("設定ディレクトリを作成できませんでした: {}", dir.display())
        })?;
    }
    let body = toml::to_string_pretty(config).context("設定のシリアライズに失敗しました")?;
    fs::write(path, body)
        .with_context(|| format!("設定ファイルを書き込めませんでした: {}", path.display()))?;
    Ok(())
}
