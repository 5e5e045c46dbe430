//! The single live session of the process: configuration, captured graphics objects and the context translator.

use std::{
  path::PathBuf,
  sync::{
    Mutex, MutexGuard, OnceLock,
    atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering}
  }
};

use ash::vk::{self, Handle};
use log::{debug, info, warn};
use upshift_common::{Config, ConfigStore, UpshiftError};

use crate::{
  interception::spoof::AdapterIdentity,
  translate::{Environment, FfxSurface}
};

static SESSION_ALIVE: AtomicBool = AtomicBool::new(false);
static GLOBAL: OnceLock<Option<Session>> = OnceLock::new();

/// Graphics objects and flags captured by the hooks. Pointers are stored as addresses and never dereferenced here.
#[derive(Debug, Default)]
pub struct RuntimeState {
  pub command_queue: AtomicUsize,
  pub d3d12_device: AtomicUsize,
  pub d3d11_device: AtomicUsize,
  pub adapter: Mutex<Option<AdapterIdentity>>,
  pub swapchain: AtomicUsize,
  /// The last swapchain asked for exclusive fullscreen and was coerced to borderless.
  pub sc_exclusive_fullscreen: AtomicBool,
  pub real_exclusive_fullscreen: AtomicBool,
  pub sc_allow_tearing: AtomicBool,
  pub sc_last_flags: AtomicU32,
  pub is_running_on_dxvk: AtomicBool,
  pub is_running_on_linux: AtomicBool,
  pub is_rdna4: OnceLock<bool>,
  pub is_shutting_down: AtomicBool,
  pub vk_instance: AtomicU64,
  pub frame_count: AtomicU64,
  hwnd_swapchain_seen: AtomicBool
}

impl RuntimeState {
  /// True exactly once, for the first HWND swapchain of the process.
  pub fn take_first_hwnd_swapchain(&self) -> bool {
    !self.hwnd_swapchain_seen.swap(true, Ordering::SeqCst)
  }

  pub fn set_adapter(&self, identity: Option<AdapterIdentity>) {
    match self.adapter.lock() {
      Ok(mut adapter) => *adapter = identity,
      Err(poisoned) => *poisoned.into_inner() = identity
    }
  }

  pub fn adapter(&self) -> Option<AdapterIdentity> {
    match self.adapter.lock() {
      Ok(adapter) => adapter.clone(),
      Err(poisoned) => poisoned.into_inner().clone()
    }
  }

  pub fn shutting_down(&self) -> bool {
    self.is_shutting_down.load(Ordering::SeqCst)
  }

  pub fn instance(&self) -> vk::Instance {
    vk::Instance::from_raw(self.vk_instance.load(Ordering::SeqCst))
  }
}

type TranslatorSlot = Option<Box<dyn FfxSurface>>;

pub struct Session {
  config: ConfigStore,
  state: RuntimeState,
  translator: Mutex<TranslatorSlot>,
  exe_dir: Option<PathBuf>
}

impl Session {
  /// Fails with [`UpshiftError::SessionExists`] while another session is alive.
  pub fn create(config: ConfigStore) -> Result<Self, UpshiftError> {
    if SESSION_ALIVE.swap(true, Ordering::SeqCst) {
      return Err(UpshiftError::SessionExists);
    }

    let exe_dir = std::env::current_exe().ok().and_then(|exe| exe.parent().map(PathBuf::from));
    info!("Session started, host directory: {:?}", exe_dir);
    Ok(Self {
      config,
      state: RuntimeState::default(),
      translator: Mutex::new(None),
      exe_dir
    })
  }

  pub fn config(&self) -> &ConfigStore {
    &self.config
  }

  pub fn state(&self) -> &RuntimeState {
    &self.state
  }

  fn slot(&self) -> MutexGuard<'_, TranslatorSlot> {
    match self.translator.lock() {
      Ok(slot) => slot,
      Err(poisoned) => poisoned.into_inner()
    }
  }

  pub fn has_translator(&self) -> bool {
    self.slot().is_some()
  }

  /// Runs `call` against the translator, building it with `build` on first use. `None` when it cannot be built.
  pub fn with_translator<R>(
    &self,
    build: impl FnOnce(&Config) -> Option<Box<dyn FfxSurface>>,
    call: impl FnOnce(&mut dyn FfxSurface, &Environment) -> R
  ) -> Option<R> {
    let config = self.config.snapshot();
    let env = Environment {
      config: &config,
      shutting_down: self.state.shutting_down(),
      instance: self.state.instance(),
      exe_dir: self.exe_dir.clone()
    };

    let mut slot = self.slot();
    if slot.is_none() {
      *slot = build(&config);
    }
    slot.as_deref_mut().map(|translator| call(translator, &env))
  }

  /// Re-reads the config file if it changed. Live NGX features are recreated so new settings take effect.
  pub fn poll_config(&self) -> bool {
    match self.config.reload_if_changed() {
      Ok(true) => {
        if let Some(translator) = self.slot().as_deref_mut() {
          translator.request_recreate_all();
        }
        true
      }
      Ok(false) => false,
      Err(e) => {
        debug!("Config reload skipped: {}", e);
        false
      }
    }
  }

  pub fn begin_shutdown(&self) {
    self.state.is_shutting_down.store(true, Ordering::SeqCst);
    info!("Shutting down");
  }
}

impl Drop for Session {
  fn drop(&mut self) {
    SESSION_ALIVE.store(false, Ordering::SeqCst);
  }
}

/// The session the exports and hooks share, created with [`upshift_common::bootstrap`] on first use.
pub fn global() -> Option<&'static Session> {
  GLOBAL
    .get_or_init(|| match Session::create(upshift_common::bootstrap()) {
      Ok(session) => Some(session),
      Err(e) => {
        warn!("No session: {}", e);
        None
      }
    })
    .as_ref()
}

/// The session if one was already started. Never creates one.
pub fn current() -> Option<&'static Session> {
  GLOBAL.get().and_then(Option::as_ref)
}

#[cfg(test)]
mod tests {
  use std::cell::Cell;

  use upshift_common::ffx::*;

  use super::*;

  struct CountingSurface {
    recreates: &'static AtomicU32
  }

  impl FfxSurface for CountingSurface {
    unsafe fn create_context(
      &mut self,
      _env: &Environment,
      _context: *mut ffxContext,
      _desc: *mut ffxCreateContextDescHeader,
      _mem_cb: *const ffxAllocationCallbacks
    ) -> FfxReturnCode {
      FfxReturnCode::OK
    }

    unsafe fn destroy_context(
      &mut self,
      env: &Environment,
      _context: *mut ffxContext,
      _mem_cb: *const ffxAllocationCallbacks
    ) -> FfxReturnCode {
      if env.shutting_down { FfxReturnCode::ERROR } else { FfxReturnCode::OK }
    }

    unsafe fn configure(&mut self, _env: &Environment, _context: *mut ffxContext, _desc: *const ffxConfigureDescHeader) -> FfxReturnCode {
      FfxReturnCode::OK
    }

    unsafe fn query(&mut self, _env: &Environment, _context: *mut ffxContext, _desc: *mut ffxQueryDescHeader) -> FfxReturnCode {
      FfxReturnCode::OK
    }

    unsafe fn dispatch(&mut self, env: &Environment, _context: *mut ffxContext, _desc: *const ffxDispatchDescHeader) -> FfxReturnCode {
      if env.config.enable_hot_swapping.value_or_default() { FfxReturnCode::NO_PROVIDER } else { FfxReturnCode::OK }
    }

    fn request_recreate_all(&mut self) {
      self.recreates.fetch_add(1, Ordering::SeqCst);
    }
  }

  static RECREATES: AtomicU32 = AtomicU32::new(0);

  // One test owns every Session in this binary, the single-session rule is process-wide.
  #[test]
  fn session_lifecycle() {
    let mut config = Config::default();
    config.enable_hot_swapping.set(true);
    let session = Session::create(ConfigStore::in_memory(config)).unwrap();
    assert!(matches!(
      Session::create(ConfigStore::in_memory(Config::default())),
      Err(UpshiftError::SessionExists)
    ));

    let builds = Cell::new(0);
    let build = || {
      builds.set(builds.get() + 1);
      Some(Box::new(CountingSurface { recreates: &RECREATES }) as Box<dyn FfxSurface>)
    };
    let mut context: ffxContext = std::ptr::null_mut();
    let first = session.with_translator(|_| build(), |t, env| unsafe { t.dispatch(env, &mut context, std::ptr::null()) });
    let second = session.with_translator(|_| build(), |t, env| unsafe { t.dispatch(env, &mut context, std::ptr::null()) });
    assert_eq!(first, Some(FfxReturnCode::NO_PROVIDER));
    assert_eq!(second, first);
    assert_eq!(builds.get(), 1);

    // in-memory config never reloads
    assert!(!session.poll_config());
    assert_eq!(RECREATES.load(Ordering::SeqCst), 0);

    session.begin_shutdown();
    let destroyed =
      session.with_translator(|_| None, |t, env| unsafe { t.destroy_context(env, &mut context, std::ptr::null()) });
    assert_eq!(destroyed, Some(FfxReturnCode::ERROR));

    drop(session);
    let again = Session::create(ConfigStore::in_memory(Config::default())).unwrap();
    assert!(!again.has_translator());
    assert!(again.with_translator(|_| None, |_, _| ()).is_none());
  }

  #[test]
  fn first_hwnd_swapchain_is_reported_once() {
    let state = RuntimeState::default();
    assert!(state.take_first_hwnd_swapchain());
    assert!(!state.take_first_hwnd_swapchain());
  }

  #[test]
  fn adapter_identity_is_replaced() {
    let state = RuntimeState::default();
    assert_eq!(state.adapter(), None);
    state.set_adapter(Some(AdapterIdentity {
      vendor_id: 0x1002,
      device_id: 0x7550,
      description: "AMD Radeon RX 9070 XT".into()
    }));
    assert_eq!(state.adapter().map(|a| a.vendor_id), Some(0x1002));
    state.set_adapter(None);
    assert_eq!(state.adapter(), None);
  }
}
