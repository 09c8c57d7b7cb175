mod batch;
mod color;
mod config;
mod exif_reader;
mod font;
mod metadata;
mod position;
mod renderer;
#[cfg(test)]
mod test_support;

pub use batch::{
    collect_images, is_supported_image, output_dir_for, output_path_for_file, render_directory,
    render_file, BatchOptions, BatchReport, FileReport, OUTPUT_DIR_SUFFIX, SUPPORTED_EXTENSIONS,
};
pub use color::{format_color, parse_color, InvalidArgument, DEFAULT_ALPHA, DEFAULT_COLOR};
pub use config::{default_config_path, load_config_from, save_config_to, AppConfig};
pub use exif_reader::{read_exif_tags, ExifTags, MetadataError, CAPTURE_TIMESTAMP_TAG};
pub use font::{FontError, WatermarkFont};
pub use image::Rgba;
pub use metadata::{
    extract_watermark_date, resolve_watermark_date, DateSource, FallbackReason, WatermarkDate,
};
pub use position::{calculate_position, Position, PADDING};
pub use renderer::{
    RenderError, RenderOutcome, RenderStatus, WatermarkConfig, Watermarker, DEFAULT_FONT_SIZE,
};
