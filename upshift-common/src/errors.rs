use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpshiftError {
  #[error("An error occurred while attempting to hook a function: {0}")]
  Hooking(String),
  #[error("A MinHook error occurred: {0}")]
  MinHook(String),
  #[error("An error occurred: {0}")]
  IO(String),
  #[error("A JSON error occurred: {0}")]
  JSON(String),
  #[error("A logger error occurred: {0}")]
  Logger(String),
  #[error("A path error has occurred: {0}")]
  Path(String),
  #[error("Could not load module: {0}")]
  Loader(String),
  #[error("A session is already active in this process")]
  SessionExists
}

impl From<io::Error> for UpshiftError {
  fn from(error: io::Error) -> Self {
    UpshiftError::IO(error.to_string())
  }
}

#[cfg(windows)]
impl From<minhook::MH_STATUS> for UpshiftError {
  fn from(error: minhook::MH_STATUS) -> Self {
    UpshiftError::MinHook(format!("{:?}", error))
  }
}

impl From<serde_json::Error> for UpshiftError {
  fn from(error: serde_json::Error) -> Self {
    UpshiftError::JSON(error.to_string())
  }
}

impl From<log::SetLoggerError> for UpshiftError {
  fn from(error: log::SetLoggerError) -> Self {
    UpshiftError::Logger(error.to_string())
  }
}
