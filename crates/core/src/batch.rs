use crate::renderer::{RenderOutcome, RenderStatus, Watermarker};
use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tiff", "bmp"];
pub const OUTPUT_DIR_SUFFIX: &str = "_watermark";

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    pub parallel: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub status: RenderStatus,
    pub date: Option<String>,
    pub detail: Option<String>,
}

impl FileReport {
    pub fn new(input: PathBuf, output: PathBuf, outcome: &RenderOutcome) -> Self {
        Self {
            input,
            output,
            status: outcome.status(),
            date: outcome.date().map(str::to_string),
            detail: outcome.detail(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status != RenderStatus::Failed
    }
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct BatchReport {
    pub input_dir: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub files: Vec<FileReport>,
    pub skipped_unsupported: usize,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.files.iter().filter(|f| f.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.files.len() - self.succeeded()
    }
}

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy();
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

/// `dir` の末尾要素名。`.` のように名前を持たない場合は正規化したパスから取る。
fn directory_name(dir: &Path) -> String {
    dir.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .or_else(|| {
            fs::canonicalize(dir)
                .ok()
                .and_then(|abs| abs.file_name().map(|name| name.to_string_lossy().to_string()))
        })
        .unwrap_or_default()
}

/// `<dir>/<basename(dir)>_watermark`
pub fn output_dir_for(dir: &Path) -> PathBuf {
    dir.join(format!("{}{}", directory_name(dir), OUTPUT_DIR_SUFFIX))
}

/// `<dirname(input)>/<basename(dirname(input))>_watermark/<filename(input)>`
pub fn output_path_for_file(input: &Path) -> Result<PathBuf> {
    let file_name = input
        .file_name()
        .with_context(|| format!("ファイル名を取得できませんでした: {}", input.display()))?;
    let parent = match input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Ok(output_dir_for(parent).join(file_name))
}

pub fn collect_images(dir: &Path) -> Result<(Vec<PathBuf>, usize)> {
    let mut images = Vec::new();
    let mut skipped = 0usize;

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("フォルダを読めませんでした: {}", dir.display()))?;
        // シンボリックリンクはリンク先で判定する。壊れたリンクは画像として扱い、処理時に失敗させる
        if entry.path().is_dir() {
            continue;
        }
        if is_supported_image(entry.path()) {
            images.push(entry.into_path());
        } else {
            skipped += 1;
        }
    }

    Ok((images, skipped))
}

/// 単一ファイルを処理する。出力先は入力と同じフォルダ配下の `*_watermark`。
pub fn render_file(marker: &Watermarker, input: &Path) -> Result<FileReport> {
    let output = output_path_for_file(input)?;
    let outcome = marker.render_one(input, &output);
    Ok(FileReport::new(input.to_path_buf(), output, &outcome))
}

/// フォルダ直下の画像を処理する。1ファイルの失敗で全体は止めない。
pub fn render_directory(marker: &Watermarker, dir: &Path, options: BatchOptions) -> BatchReport {
    let mut report = BatchReport {
        input_dir: dir.to_path_buf(),
        ..BatchReport::default()
    };

    if !dir.is_dir() {
        log::warn!("フォルダではありません: {}", dir.display());
        return report;
    }

    let output_dir = output_dir_for(dir);
    if let Err(err) = fs::create_dir_all(&output_dir) {
        log::warn!(
            "出力フォルダを作成できませんでした: {}: {err}",
            output_dir.display()
        );
        return report;
    }

    let (images, skipped) = match collect_images(dir) {
        Ok(found) => found,
        Err(err) => {
            log::warn!("{err:#}");
            return report;
        }
    };

    let render = |input: &PathBuf| {
        let output = input
            .file_name()
            .map(|name| output_dir.join(name))
            .unwrap_or_else(|| output_dir.clone());
        let outcome = marker.render_one(input, &output);
        FileReport::new(input.clone(), output, &outcome)
    };

    report.files = if options.parallel {
        images.par_iter().map(render).collect()
    } else {
        images.iter().map(render).collect()
    };
    report.output_dir = Some(output_dir);
    report.skipped_unsupported = skipped;
    report
}
