use std::{fs, path::PathBuf};

pub mod amd;
pub mod config;
pub mod errors;
pub mod ffx;
pub mod guid;
pub mod kmt;
pub mod ngx;
pub mod utils;

pub use config::{Config, ConfigStore, ConfigValue, FgOutput};
pub use errors::UpshiftError;
pub use guid::Guid;

pub mod logging {
  use std::{fmt, fs::OpenOptions, path::Path};

  use chrono::Local;
  use fern::FormatCallback;
  use log::LevelFilter;

  use crate::errors::UpshiftError;

  pub const LOG_FILE_NAME: &str = "upshift.log";

  pub fn upshift_stdout_logging_format(out: FormatCallback, message: &fmt::Arguments, record: &log::Record) {
    out.finish(format_args!(
      "[Upshift] [{}] [{}] {}",
      record.level(),
      record.target(),
      message
    ))
  }

  pub fn upshift_file_logging_format(out: FormatCallback, message: &fmt::Arguments, record: &log::Record) {
    out.finish(format_args!(
      "[Upshift] {} [{}] [{}] {}",
      Local::now().format("%Y-%m-%d %H:%M:%S%.3f %:z"),
      record.level(),
      record.target(),
      message
    ))
  }

  /// Installs the global logger. Fails if a logger is already set.
  pub fn init(level: LevelFilter, to_console: bool, log_dir: Option<&Path>) -> Result<(), UpshiftError> {
    let mut dispatch = fern::Dispatch::new().level(level);

    if to_console {
      dispatch = dispatch.chain(
        fern::Dispatch::new()
          .format(upshift_stdout_logging_format)
          .chain(std::io::stdout())
      );
    }

    if let Some(dir) = log_dir {
      let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE_NAME))?;
      dispatch = dispatch.chain(fern::Dispatch::new().format(upshift_file_logging_format).chain(file));
    }

    dispatch.apply()?;
    Ok(())
  }
}

pub fn get_upshift_config_path() -> Option<PathBuf> {
  let path = dirs::config_dir().map(|dir| dir.join("Upshift"));
  if let Some(ref upshift_path) = path {
    fs::create_dir_all(upshift_path).ok()?
  }
  path
}

pub fn get_upshift_config_file() -> Option<PathBuf> {
  get_upshift_config_path().map(|path| path.join(config::CONFIG_FILE_NAME))
}

pub fn get_upshift_log_path() -> Option<PathBuf> {
  let path = get_upshift_config_path().map(|c| c.join("logs"))?;
  fs::create_dir_all(&path).ok()?;
  Some(path)
}

/// Loads the shared config and installs logging as configured. Falls back to defaults when the file is unusable.
pub fn bootstrap() -> ConfigStore {
  let store = match get_upshift_config_file().map(ConfigStore::load_or_create) {
    Some(Ok(store)) => store,
    Some(Err(e)) => {
      eprintln!("[Upshift] Config unreadable, using defaults: {}", e);
      ConfigStore::in_memory(Config::documented_defaults())
    }
    None => ConfigStore::in_memory(Config::documented_defaults())
  };

  let config = store.snapshot();
  let log_dir = if config.log_to_file.value_or(true) { get_upshift_log_path() } else { None };
  if let Err(e) = logging::init(
    config.log_level_filter(),
    config.log_to_console.value_or_default(),
    log_dir.as_deref()
  ) {
    eprintln!("[Upshift] Logger not installed: {}", e);
  }

  store
}
