use std::{
  fs,
  io::Write,
  path::{Path, PathBuf},
  sync::{Mutex, RwLock},
  time::{Duration, Instant, SystemTime}
};

use log::{LevelFilter, info, warn};
use serde::{Deserialize, Serialize};

use crate::errors::UpshiftError;

pub const CONFIG_FILE_NAME: &str = "upshift_config.json";

const RELOAD_INTERVAL: Duration = Duration::from_secs(1);

/// An optional setting. A volatile value set at runtime shadows the persisted one and is never written back.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Option<T>", into = "Option<T>")]
pub struct ConfigValue<T: Clone> {
  value: Option<T>,
  volatile: Option<T>
}

impl<T: Clone> From<Option<T>> for ConfigValue<T> {
  fn from(value: Option<T>) -> Self {
    Self { value, volatile: None }
  }
}

impl<T: Clone> From<ConfigValue<T>> for Option<T> {
  fn from(value: ConfigValue<T>) -> Self {
    value.value
  }
}

impl<T: Clone> ConfigValue<T> {
  pub const fn unset() -> Self {
    Self {
      value: None,
      volatile: None
    }
  }

  pub fn new(value: T) -> Self {
    Self {
      value: Some(value),
      volatile: None
    }
  }

  pub fn has_value(&self) -> bool {
    self.volatile.is_some() || self.value.is_some()
  }

  pub fn value(&self) -> Option<T> {
    self.volatile.clone().or_else(|| self.value.clone())
  }

  pub fn value_or(&self, fallback: T) -> T {
    self.value().unwrap_or(fallback)
  }

  pub fn set(&mut self, value: T) {
    self.value = Some(value);
  }

  pub fn set_volatile_value(&mut self, value: T) {
    self.volatile = Some(value);
  }

  pub fn clear_volatile_value(&mut self) {
    self.volatile = None;
  }

  fn carry_volatile(&mut self, previous: &Self) {
    if self.volatile.is_none() {
      self.volatile = previous.volatile.clone();
    }
  }
}

impl<T: Clone + Default> ConfigValue<T> {
  pub fn value_or_default(&self) -> T {
    self.value().unwrap_or_default()
  }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FgOutput {
  #[default]
  None,
  FsrFg,
  XeFg
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
  pub enable_hot_swapping: ConfigValue<bool>,
  pub use_ffx_inputs: ConfigValue<bool>,

  pub override_vsync: ConfigValue<bool>,
  pub prefer_dedicated_gpu: ConfigValue<bool>,
  pub prefer_first_dedicated_gpu: ConfigValue<bool>,
  pub fg_output: ConfigValue<FgOutput>,
  pub fg_force_borderless: ConfigValue<bool>,
  pub no_fsr_fg_first_swapchain: ConfigValue<bool>,
  pub fg_module: ConfigValue<String>,

  pub extended_limits: ConfigValue<bool>,
  pub upscale_ratio_override_enabled: ConfigValue<bool>,
  pub upscale_ratio_override_value: ConfigValue<f32>,
  pub quality_ratio_override_enabled: ConfigValue<bool>,
  pub quality_ratio_ultra_performance: ConfigValue<f32>,
  pub quality_ratio_performance: ConfigValue<f32>,
  pub quality_ratio_balanced: ConfigValue<f32>,
  pub quality_ratio_quality: ConfigValue<f32>,
  pub quality_ratio_dlaa: ConfigValue<f32>,
  pub jitter_phase_base: ConfigValue<f32>,

  pub dlss_feature_path: ConfigValue<String>,
  pub ngx_module: ConfigValue<String>,
  pub ffx_original_module: ConfigValue<String>,

  pub fsr4_update: ConfigValue<bool>,

  pub spoof_gpu: ConfigValue<bool>,
  pub spoof_vendor_id: ConfigValue<u32>,
  pub spoof_device_id: ConfigValue<u32>,
  pub spoof_description: ConfigValue<String>,

  pub feature_settle_ms: ConfigValue<u64>,
  pub fast_feature_reset: ConfigValue<bool>,

  pub log_level: ConfigValue<String>,
  pub log_to_file: ConfigValue<bool>,
  pub log_to_console: ConfigValue<bool>
}

macro_rules! carry_volatile {
  ($next:ident, $previous:ident, $($field:ident),*) => {
    $( $next.$field.carry_volatile(&$previous.$field); )*
  };
}

impl Config {
  /// The file written on first start, with every knob spelled out.
  pub fn documented_defaults() -> Self {
    Self {
      enable_hot_swapping: ConfigValue::new(false),
      use_ffx_inputs: ConfigValue::new(false),
      override_vsync: ConfigValue::new(false),
      prefer_dedicated_gpu: ConfigValue::new(false),
      prefer_first_dedicated_gpu: ConfigValue::new(false),
      fg_output: ConfigValue::new(FgOutput::None),
      fg_force_borderless: ConfigValue::new(false),
      extended_limits: ConfigValue::new(false),
      upscale_ratio_override_enabled: ConfigValue::new(false),
      upscale_ratio_override_value: ConfigValue::new(1.3),
      quality_ratio_override_enabled: ConfigValue::new(false),
      quality_ratio_ultra_performance: ConfigValue::new(3.0),
      quality_ratio_performance: ConfigValue::new(2.0),
      quality_ratio_balanced: ConfigValue::new(1.7),
      quality_ratio_quality: ConfigValue::new(1.5),
      quality_ratio_dlaa: ConfigValue::new(1.0),
      log_level: ConfigValue::new("info".to_string()),
      ..Default::default()
    }
  }

  pub fn log_level_filter(&self) -> LevelFilter {
    match self.log_level.value_or("info".to_string()).to_lowercase().as_str() {
      "off" => LevelFilter::Off,
      "error" => LevelFilter::Error,
      "warn" => LevelFilter::Warn,
      "debug" => LevelFilter::Debug,
      "trace" => LevelFilter::Trace,
      _ => LevelFilter::Info
    }
  }

  pub fn feature_settle_time(&self) -> Duration {
    let default = if self.fast_feature_reset.value_or_default() { 100 } else { 1000 };
    Duration::from_millis(self.feature_settle_ms.value_or(default))
  }

  fn carry_volatile_from(&mut self, previous: &Config) {
    carry_volatile!(
      self,
      previous,
      enable_hot_swapping,
      use_ffx_inputs,
      override_vsync,
      prefer_dedicated_gpu,
      prefer_first_dedicated_gpu,
      fg_output,
      fg_force_borderless,
      no_fsr_fg_first_swapchain,
      fg_module,
      extended_limits,
      upscale_ratio_override_enabled,
      upscale_ratio_override_value,
      quality_ratio_override_enabled,
      quality_ratio_ultra_performance,
      quality_ratio_performance,
      quality_ratio_balanced,
      quality_ratio_quality,
      quality_ratio_dlaa,
      jitter_phase_base,
      dlss_feature_path,
      ngx_module,
      ffx_original_module,
      fsr4_update,
      spoof_gpu,
      spoof_vendor_id,
      spoof_device_id,
      spoof_description,
      feature_settle_ms,
      fast_feature_reset,
      log_level,
      log_to_file,
      log_to_console
    );
  }
}

pub fn read_config(path: &Path) -> Result<Config, UpshiftError> {
  let file = fs::File::open(path)?;
  Ok(serde_json::from_reader(file)?)
}

pub fn create_config(path: &Path) -> Result<Config, UpshiftError> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)?;
  }

  let config = Config::documented_defaults();
  if let Ok(false) = fs::exists(path) {
    info!("Writing default config to {}", path.display());
    let mut file = fs::File::create(path)?;
    file.write_all(serde_json::to_string_pretty(&config)?.as_bytes())?;
  }

  Ok(config)
}

/// Shared, live-reloadable configuration. Readers take a fresh snapshot on every call.
pub struct ConfigStore {
  path: Option<PathBuf>,
  current: RwLock<Config>,
  modified: Mutex<Option<SystemTime>>,
  last_check: Mutex<Option<Instant>>
}

impl ConfigStore {
  pub fn in_memory(config: Config) -> Self {
    Self {
      path: None,
      current: RwLock::new(config),
      modified: Mutex::new(None),
      last_check: Mutex::new(None)
    }
  }

  pub fn load_or_create(path: PathBuf) -> Result<Self, UpshiftError> {
    let config = match fs::exists(&path) {
      Ok(true) => read_config(&path)?,
      _ => create_config(&path)?
    };

    let modified = fs::metadata(&path).and_then(|m| m.modified()).ok();
    Ok(Self {
      path: Some(path),
      current: RwLock::new(config),
      modified: Mutex::new(modified),
      last_check: Mutex::new(Some(Instant::now()))
    })
  }

  pub fn path(&self) -> Option<&Path> {
    self.path.as_deref()
  }

  pub fn snapshot(&self) -> Config {
    match self.current.read() {
      Ok(config) => config.clone(),
      Err(poisoned) => poisoned.into_inner().clone()
    }
  }

  pub fn update<F: FnOnce(&mut Config)>(&self, f: F) {
    match self.current.write() {
      Ok(mut config) => f(&mut config),
      Err(poisoned) => f(&mut poisoned.into_inner())
    }
  }

  /// Re-reads the file when its modification time moved. Checks at most once per second.
  pub fn reload_if_changed(&self) -> Result<bool, UpshiftError> {
    let Some(path) = self.path.as_ref() else {
      return Ok(false);
    };

    {
      let mut last_check = self.last_check.lock().map_err(|e| UpshiftError::IO(e.to_string()))?;
      if let Some(at) = *last_check &&
        at.elapsed() < RELOAD_INTERVAL
      {
        return Ok(false);
      }
      *last_check = Some(Instant::now());
    }

    let modified = fs::metadata(path)?.modified()?;
    let mut known = self.modified.lock().map_err(|e| UpshiftError::IO(e.to_string()))?;
    if *known == Some(modified) {
      return Ok(false);
    }

    let mut next = match read_config(path) {
      Ok(config) => config,
      Err(e) => {
        warn!("Keeping previous config, reload failed: {}", e);
        *known = Some(modified);
        return Ok(false);
      }
    };

    self.update(|current| {
      next.carry_volatile_from(current);
      *current = next;
    });
    *known = Some(modified);
    info!("Config reloaded from {}", path.display());
    Ok(true)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn volatile_value_shadows_persisted_value() {
    let mut value = ConfigValue::new(true);
    assert!(value.value_or_default());
    value.set_volatile_value(false);
    assert!(!value.value_or(true));
    value.clear_volatile_value();
    assert!(value.value_or(false));
  }

  #[test]
  fn unset_values_fall_back() {
    let value: ConfigValue<f32> = ConfigValue::unset();
    assert!(!value.has_value());
    assert_eq!(value.value_or(1.3), 1.3);
    assert_eq!(value.value_or_default(), 0.0);
  }

  #[test]
  fn volatile_values_are_not_serialized() {
    let mut config = Config::default();
    config.override_vsync.set(true);
    config.fsr4_update.set_volatile_value(true);
    let json = serde_json::to_value(&config).unwrap();
    assert_eq!(json["overrideVsync"], serde_json::json!(true));
    assert!(json["fsr4Update"].is_null());
  }

  #[test]
  fn missing_fields_deserialize_as_unset() {
    let config: Config = serde_json::from_str(r#"{ "enableHotSwapping": true, "fgOutput": "xeFg" }"#).unwrap();
    assert!(config.enable_hot_swapping.value_or_default());
    assert_eq!(config.fg_output.value_or_default(), FgOutput::XeFg);
    assert!(!config.quality_ratio_override_enabled.has_value());
  }

  #[test]
  fn settle_time_honours_fast_reset() {
    let mut config = Config::default();
    assert_eq!(config.feature_settle_time(), Duration::from_millis(1000));
    config.fast_feature_reset.set(true);
    assert_eq!(config.feature_settle_time(), Duration::from_millis(100));
    config.feature_settle_ms.set(0);
    assert_eq!(config.feature_settle_time(), Duration::ZERO);
  }

  #[test]
  fn reload_keeps_volatile_overrides() {
    let dir = std::env::temp_dir().join(format!("upshift-config-{}", std::process::id()));
    let path = dir.join(CONFIG_FILE_NAME);
    let _ = fs::remove_dir_all(&dir);

    let store = ConfigStore::load_or_create(path.clone()).unwrap();
    store.update(|c| c.override_vsync.set_volatile_value(false));
    fs::write(&path, r#"{ "overrideVsync": true, "enableHotSwapping": true }"#).unwrap();

    *store.last_check.lock().unwrap() = None;
    *store.modified.lock().unwrap() = None;
    assert!(store.reload_if_changed().unwrap());

    let config = store.snapshot();
    assert!(config.enable_hot_swapping.value_or_default());
    assert!(!config.override_vsync.value_or_default());
    let _ = fs::remove_dir_all(&dir);
  }
}
