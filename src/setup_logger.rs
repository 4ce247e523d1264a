use crate::core::config::LoggingConfig;
use crate::core::error::{AppError, AppResult};
use env_logger::{Builder, Target};
use std::fs::File;
use std::io::Write;

pub fn setup_logger(config: &LoggingConfig) -> AppResult<()> {
    let mut builder = Builder::new();

    // タイムスタンプ付きのフォーマット
    builder.filter_level(config.level).format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] {} - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.target(), // モジュールパスが表示される
            record.args()
        )
    });

    match &config.file {
        Some(path) => {
            let file = File::create(path)
                .map_err(|e| AppError::Logger(format!("{}: {}", path.display(), e)))?;
            builder.target(Target::Pipe(Box::new(file)));
        }
        None => {
            builder.target(Target::Stdout);
        }
    }

    builder.try_init().map_err(|e| AppError::Logger(e.to_string()))
}
