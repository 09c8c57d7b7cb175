use anyhow::{Context, Result};
use clap::builder::PossibleValuesParser;
use clap::{Parser, ValueEnum};
use photo_watermark_core::{
    default_config_path, format_color, load_config_from, parse_color, render_directory, render_file,
    save_config_to, AppConfig, BatchOptions, BatchReport, FileReport, Position, Rgba,
    Watermarker,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "watermark", version)]
#[command(about = "EXIFの撮影日を写真に透かしとして書き込みます")]
struct Cli {
    /// 画像ファイル、または画像を含むフォルダ
    #[arg(required_unless_present_any = ["show_config", "save_config"])]
    input_path: Option<PathBuf>,
    /// 文字サイズ (既定: 36)
    #[arg(short = 's', long, value_parser = clap::value_parser!(u32).range(1..))]
    font_size: Option<u32>,
    /// "R,G,B" または "R,G,B,A" (0-255, 既定: 255,255,255,128)
    #[arg(short, long, value_parser = parse_color)]
    color: Option<Rgba<u8>>,
    /// 透かしの位置 (既定: right_bottom)
    #[arg(short, long, value_parser = PossibleValuesParser::new(Position::NAMES))]
    position: Option<String>,
    /// システムフォントより優先して使うフォントファイル
    #[arg(long)]
    font: Option<PathBuf>,
    /// フォルダ内の画像を並列に処理する
    #[arg(long, default_value_t = false)]
    parallel: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    /// 設定ファイルの場所 (既定: OS標準の設定ディレクトリ)
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = false, conflicts_with = "save_config")]
    show_config: bool,
    /// 指定したオプションを既定値として保存する
    #[arg(long, default_value_t = false)]
    save_config: bool,
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.verbose, cli.output);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            println!("エラー: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// 診断メッセージは標準出力へ。JSON 出力時のみ標準エラーへ逃がす。
fn init_logger(verbose: bool, output: OutputFormat) {
    let level = if verbose { "debug" } else { "info" };
    let target = match output {
        OutputFormat::Table => env_logger::Target::Stdout,
        OutputFormat::Json => env_logger::Target::Stderr,
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .target(target)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let stored = load_config_from(&config_path)?;

    if cli.show_config {
        cmd_config_show(&config_path, &stored)?;
        return Ok(ExitCode::SUCCESS);
    }

    let effective = merge_flags(stored, &cli);

    if cli.save_config {
        effective.to_watermark_config()?;
        save_config_to(&effective, &config_path)?;
        println!("設定を保存しました: {}", config_path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let input = cli
        .input_path
        .as_deref()
        .context("入力パスを指定してください")?;
    if !input.exists() {
        println!("エラー: 入力パスが存在しません: {}", input.display());
        return Ok(ExitCode::FAILURE);
    }

    let marker = Watermarker::new(effective.to_watermark_config()?);
    log::debug!("フォント: {}", marker.font().describe());

    if input.is_dir() {
        let options = BatchOptions {
            parallel: effective.parallel,
        };
        let report = render_directory(&marker, input, options);
        print_batch(&report, cli.output)?;
    } else {
        let report = render_file(&marker, input)?;
        print_single(&report, cli.output)?;
    }

    Ok(ExitCode::SUCCESS)
}

fn merge_flags(mut config: AppConfig, cli: &Cli) -> AppConfig {
    if let Some(size) = cli.font_size {
        config.font_size = size;
    }
    if let Some(color) = cli.color {
        config.color = format_color(color);
    }
    if let Some(position) = &cli.position {
        config.position = position.clone();
    }
    if let Some(font) = &cli.font {
        config.font_path = Some(font.clone());
    }
    if cli.parallel {
        config.parallel = true;
    }
    config
}

fn cmd_config_show(path: &Path, config: &AppConfig) -> Result<()> {
    println!("設定ファイル: {}", path.display());
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn print_batch(report: &BatchReport, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Table => {
            for file in report.files.iter().filter(|f| !f.is_success()) {
                println!(
                    "失敗: {} ({})",
                    file.input.display(),
                    file.detail.as_deref().unwrap_or("-")
                );
            }
            println!(
                "処理完了: {}件 (失敗 {}件, 対象外 {}件)",
                report.succeeded(),
                report.failed(),
                report.skipped_unsupported
            );
        }
    }
    Ok(())
}

fn print_single(report: &FileReport, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Table if report.is_success() => {
            println!("透かしを追加しました: {}", report.output.display())
        }
        OutputFormat::Table => println!("透かしを追加できませんでした: {}", report.input.display()),
    }
    Ok(())
}
