//! Swapchain creation policy shared by `CreateSwapChain`, `CreateSwapChainForHwnd` and
//! `CreateSwapChainForCoreWindow`.

use std::sync::atomic::Ordering;

use log::{debug, error, info, warn};
use upshift_common::{
  Config, ConfigStore, FgOutput,
  amd::{HRESULT, S_OK}
};

use super::Skip;
use crate::session::RuntimeState;

pub const DXGI_SWAP_EFFECT_FLIP_DISCARD: i32 = 4;
pub const DXGI_SWAP_CHAIN_FLAG_ALLOW_MODE_SWITCH: u32 = 0x2;
pub const DXGI_SWAP_CHAIN_FLAG_ALLOW_TEARING: u32 = 0x800;
pub const DXGI_PRESENT_ALLOW_TEARING: u32 = 0x200;

/// Helper windows of overlays and launchers create tiny swapchains.
const OVERLAY_MAX_DIMENSION: u32 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variant {
  Basic,
  Hwnd,
  CoreWindow
}

/// The fields of a swapchain description the policy reads or rewrites, common to every creation variant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SwapchainParams {
  pub width: u32,
  pub height: u32,
  pub buffer_count: u32,
  pub swap_effect: i32,
  pub flags: u32,
  /// `None` when the call carries no fullscreen description, which means windowed.
  pub windowed: Option<bool>,
  /// Set by the policy when the buffers must be stretched to the output.
  pub stretch: bool
}

impl SwapchainParams {
  pub fn is_overlay(&self) -> bool {
    self.width < OVERLAY_MAX_DIMENSION || self.height < OVERLAY_MAX_DIMENSION
  }

  pub fn wants_fullscreen(&self) -> bool {
    self.windowed == Some(false)
  }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SwapchainPolicy {
  pub force_borderless: bool,
  pub override_vsync: bool
}

impl SwapchainPolicy {
  pub fn from_config(config: &Config) -> Self {
    Self {
      // only XeFG needs a borderless swapchain
      force_borderless: config.fg_output.value_or_default() == FgOutput::XeFg &&
        config.fg_force_borderless.value_or_default(),
      override_vsync: config.override_vsync.value_or_default()
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Adjusted {
  pub params: SwapchainParams,
  /// The caller asked for exclusive fullscreen and got borderless.
  pub coerced_from_fullscreen: bool,
  /// The swapchain stays exclusive fullscreen, so vsync must not be overridden from now on.
  pub disable_vsync_override: bool
}

/// Applies borderless coercion, then the vsync override.
pub fn adjust(policy: SwapchainPolicy, mut params: SwapchainParams) -> Adjusted {
  let mut coerced_from_fullscreen = false;
  if policy.force_borderless {
    if params.wants_fullscreen() {
      coerced_from_fullscreen = true;
      params.windowed = Some(true);
    }
    params.flags &= !DXGI_SWAP_CHAIN_FLAG_ALLOW_MODE_SWITCH;
    params.stretch = true;
  }

  let disable_vsync_override = params.wants_fullscreen();
  if policy.override_vsync && !disable_vsync_override {
    params.swap_effect = DXGI_SWAP_EFFECT_FLIP_DISCARD;
    params.flags |= DXGI_SWAP_CHAIN_FLAG_ALLOW_TEARING;
    params.buffer_count = params.buffer_count.max(2);
  }

  Adjusted {
    params,
    coerced_from_fullscreen,
    disable_vsync_override
  }
}

/// One creation call, seen from the policy.
pub trait SwapchainCalls {
  /// Calls the real creation function with the caller's original arguments.
  fn forward_original(&mut self) -> HRESULT;
  /// Probes the device for a D3D12 command queue and records it, with its device and adapter, when present.
  fn capture_queue(&mut self, state: &RuntimeState) -> bool;
  /// Records a non-queue device (D3D11) and its adapter.
  fn capture_device(&mut self, state: &RuntimeState);
  /// Asks the frame-generation module for its swapchain.
  fn create_frame_generation(&mut self, params: &SwapchainParams) -> HRESULT;
  /// Calls the real creation function with the adjusted description.
  fn create_plain(&mut self, params: &SwapchainParams) -> HRESULT;
  /// Installs present interception on the swapchain `create_plain` returned, and yields its address.
  fn intercept_present(&mut self, state: &RuntimeState) -> usize;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreationPath {
  Bypass,
  FrameGeneration,
  Plain
}

/// Creates one swapchain under the configured policy. `params` is `None` when the device or description was null.
pub fn create_swapchain<C: SwapchainCalls>(
  calls: &mut C,
  config: &ConfigStore,
  state: &RuntimeState,
  variant: Variant,
  params: Option<SwapchainParams>
) -> (HRESULT, CreationPath) {
  let first_hwnd = variant == Variant::Hwnd && state.take_first_hwnd_swapchain();

  let Some(params) = params else {
    warn!("Device or description is null, creating unmodified");
    return (calls.forward_original(), CreationPath::Bypass);
  };
  if params.is_overlay() {
    warn!("Overlay call ({}x{}), creating unmodified", params.width, params.height);
    return (calls.forward_original(), CreationPath::Bypass);
  }

  let snapshot = config.snapshot();
  debug!(
    "{:?} swapchain {}x{}, buffers: {}, flags: {:#x}, windowed: {:?}",
    variant, params.width, params.height, params.buffer_count, params.flags, params.windowed
  );

  let adjusted = adjust(SwapchainPolicy::from_config(&snapshot), params);
  if adjusted.coerced_from_fullscreen {
    state.sc_exclusive_fullscreen.store(true, Ordering::SeqCst);
  }
  if adjusted.disable_vsync_override {
    info!("Game is creating fullscreen swapchain, disabled V-Sync overrides");
    config.update(|c| c.override_vsync.set_volatile_value(false));
  }

  let local = adjusted.params;
  state
    .sc_allow_tearing
    .store(local.flags & DXGI_SWAP_CHAIN_FLAG_ALLOW_TEARING != 0, Ordering::SeqCst);
  state.sc_last_flags.store(local.flags, Ordering::SeqCst);
  state.real_exclusive_fullscreen.store(local.wants_fullscreen(), Ordering::SeqCst);

  let skip_fg = Skip::FgSwapchain.active() ||
    snapshot.fg_output.value_or_default() == FgOutput::None ||
    (first_hwnd && snapshot.no_fsr_fg_first_swapchain.value_or_default());

  if calls.capture_queue(state) {
    if !skip_fg {
      let result = {
        let _skip = Skip::FgSwapchain.scoped();
        calls.create_frame_generation(&local)
      };
      if result == S_OK {
        info!("Frame generation swapchain created");
        return (result, CreationPath::FrameGeneration);
      }
      debug!("Frame generation swapchain failed: {:#x}", result as u32);
    }
  } else {
    info!("Failed to get ID3D12CommandQueue from device, creating Dx11 swapchain!");
    calls.capture_device(state);
  }

  let result = calls.create_plain(&local);
  if result != S_OK {
    error!("CreateSwapChain failed: {:#x}", result as u32);
    return (result, CreationPath::Plain);
  }

  let swapchain = calls.intercept_present(state);
  // a swapchain made for frame generation belongs to that module
  if !Skip::FgSwapchain.active() {
    state.swapchain.store(swapchain, Ordering::SeqCst);
  }
  debug!("Created new swapchain: {:#x}", swapchain);
  (result, CreationPath::Plain)
}

/// Sync interval and flags for one `Present`. Windowed swapchains created with tearing allowed present unsynced
/// while the vsync override is on.
pub fn present_args(config: &Config, state: &RuntimeState, sync_interval: u32, flags: u32) -> (u32, u32) {
  state.frame_count.fetch_add(1, Ordering::Relaxed);
  if config.override_vsync.value_or_default() &&
    state.sc_allow_tearing.load(Ordering::SeqCst) &&
    !state.real_exclusive_fullscreen.load(Ordering::SeqCst)
  {
    return (0, flags | DXGI_PRESENT_ALLOW_TEARING);
  }
  (sync_interval, flags)
}

#[cfg(test)]
mod tests {
  use upshift_common::amd::E_NOTIMPL;

  use super::*;

  #[derive(Clone, Debug, PartialEq)]
  enum Call {
    Original,
    CaptureQueue,
    CaptureDevice,
    FrameGeneration(SwapchainParams, bool),
    Plain(SwapchainParams),
    Intercept
  }

  #[derive(Default)]
  struct FakeCalls {
    queue: bool,
    fg_result: Option<HRESULT>,
    plain_result: HRESULT,
    calls: Vec<Call>
  }

  impl SwapchainCalls for FakeCalls {
    fn forward_original(&mut self) -> HRESULT {
      self.calls.push(Call::Original);
      S_OK
    }

    fn capture_queue(&mut self, state: &RuntimeState) -> bool {
      self.calls.push(Call::CaptureQueue);
      if self.queue {
        state.command_queue.store(0xC0, Ordering::SeqCst);
      }
      self.queue
    }

    fn capture_device(&mut self, state: &RuntimeState) {
      self.calls.push(Call::CaptureDevice);
      state.d3d11_device.store(0xD11, Ordering::SeqCst);
    }

    fn create_frame_generation(&mut self, params: &SwapchainParams) -> HRESULT {
      self.calls.push(Call::FrameGeneration(*params, Skip::FgSwapchain.active()));
      self.fg_result.unwrap_or(E_NOTIMPL)
    }

    fn create_plain(&mut self, params: &SwapchainParams) -> HRESULT {
      self.calls.push(Call::Plain(*params));
      self.plain_result
    }

    fn intercept_present(&mut self, _state: &RuntimeState) -> usize {
      self.calls.push(Call::Intercept);
      0x5C
    }
  }

  fn params(width: u32, height: u32) -> SwapchainParams {
    SwapchainParams {
      width,
      height,
      buffer_count: 1,
      swap_effect: 0,
      flags: DXGI_SWAP_CHAIN_FLAG_ALLOW_MODE_SWITCH,
      windowed: Some(true),
      stretch: false
    }
  }

  fn store(f: impl FnOnce(&mut Config)) -> ConfigStore {
    let mut config = Config::default();
    f(&mut config);
    ConfigStore::in_memory(config)
  }

  #[test]
  fn overlay_sized_swapchains_bypass_everything() {
    let config = store(|c| {
      c.override_vsync.set(true);
      c.fg_output.set(FgOutput::FsrFg);
    });
    let state = RuntimeState::default();
    let mut calls = FakeCalls {
      queue: true,
      ..Default::default()
    };

    let outcome = create_swapchain(&mut calls, &config, &state, Variant::Basic, Some(params(64, 64)));
    assert_eq!(outcome, (S_OK, CreationPath::Bypass));
    assert_eq!(calls.calls, vec![Call::Original]);
    assert_eq!(state.sc_last_flags.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn null_arguments_bypass() {
    let state = RuntimeState::default();
    let mut calls = FakeCalls::default();
    let outcome = create_swapchain(&mut calls, &store(|_| ()), &state, Variant::Hwnd, None);
    assert_eq!(outcome.1, CreationPath::Bypass);
    assert_eq!(calls.calls, vec![Call::Original]);
  }

  #[test]
  fn vsync_override_forces_flip_discard_with_tearing() {
    let adjusted = adjust(
      SwapchainPolicy {
        force_borderless: false,
        override_vsync: true
      },
      params(1920, 1080)
    );
    assert_eq!(adjusted.params.swap_effect, DXGI_SWAP_EFFECT_FLIP_DISCARD);
    assert_eq!(
      adjusted.params.flags,
      DXGI_SWAP_CHAIN_FLAG_ALLOW_MODE_SWITCH | DXGI_SWAP_CHAIN_FLAG_ALLOW_TEARING
    );
    assert_eq!(adjusted.params.buffer_count, 2);
    assert!(!adjusted.params.stretch);
  }

  #[test]
  fn borderless_coercion_remembers_fullscreen() {
    let mut fullscreen = params(2560, 1440);
    fullscreen.windowed = Some(false);
    fullscreen.buffer_count = 3;
    let adjusted = adjust(
      SwapchainPolicy {
        force_borderless: true,
        override_vsync: true
      },
      fullscreen
    );
    assert!(adjusted.coerced_from_fullscreen);
    assert!(!adjusted.disable_vsync_override);
    assert_eq!(adjusted.params.windowed, Some(true));
    assert!(adjusted.params.stretch);
    assert_eq!(adjusted.params.flags, DXGI_SWAP_CHAIN_FLAG_ALLOW_TEARING);
    assert_eq!(adjusted.params.buffer_count, 3);
  }

  #[test]
  fn only_xefg_coerces_fullscreen_to_borderless() {
    let mut fullscreen = params(1920, 1080);
    fullscreen.windowed = Some(false);

    let fsr = store(|c| {
      c.fg_output.set(FgOutput::FsrFg);
      c.fg_force_borderless.set(true);
    });
    let policy = SwapchainPolicy::from_config(&fsr.snapshot());
    assert!(!policy.force_borderless);
    let adjusted = adjust(policy, fullscreen);
    assert!(!adjusted.coerced_from_fullscreen);
    assert_eq!(adjusted.params.windowed, Some(false));
    assert!(!adjusted.params.stretch);

    let xefg = store(|c| {
      c.fg_output.set(FgOutput::XeFg);
      c.fg_force_borderless.set(true);
    });
    let adjusted = adjust(SwapchainPolicy::from_config(&xefg.snapshot()), fullscreen);
    assert!(adjusted.coerced_from_fullscreen);
    assert_eq!(adjusted.params.windowed, Some(true));
    assert!(adjusted.params.stretch);
  }

  #[test]
  fn exclusive_fullscreen_turns_vsync_override_off() {
    let config = store(|c| c.override_vsync.set(true));
    let state = RuntimeState::default();
    let mut calls = FakeCalls::default();
    let mut fullscreen = params(1920, 1080);
    fullscreen.windowed = Some(false);

    let (result, path) = create_swapchain(&mut calls, &config, &state, Variant::Basic, Some(fullscreen));
    assert_eq!((result, path), (S_OK, CreationPath::Plain));
    assert!(!config.snapshot().override_vsync.value_or_default());
    assert!(state.real_exclusive_fullscreen.load(Ordering::SeqCst));
    assert!(!state.sc_allow_tearing.load(Ordering::SeqCst));
    assert_eq!(calls.calls[2], Call::Plain(fullscreen));
  }

  #[test]
  fn queue_devices_try_frame_generation_first() {
    let config = store(|c| c.fg_output.set(FgOutput::FsrFg));
    let state = RuntimeState::default();
    let mut calls = FakeCalls {
      queue: true,
      fg_result: Some(S_OK),
      ..Default::default()
    };

    let (result, path) = create_swapchain(&mut calls, &config, &state, Variant::Hwnd, Some(params(1920, 1080)));
    assert_eq!((result, path), (S_OK, CreationPath::FrameGeneration));
    assert_eq!(
      calls.calls,
      vec![Call::CaptureQueue, Call::FrameGeneration(params(1920, 1080), true)]
    );
    assert_eq!(state.command_queue.load(Ordering::SeqCst), 0xC0);
    assert!(!Skip::FgSwapchain.active());
  }

  #[test]
  fn failed_frame_generation_falls_back_to_a_plain_swapchain() {
    let config = store(|c| c.fg_output.set(FgOutput::XeFg));
    let state = RuntimeState::default();
    let mut calls = FakeCalls {
      queue: true,
      ..Default::default()
    };

    let (_, path) = create_swapchain(&mut calls, &config, &state, Variant::Basic, Some(params(1920, 1080)));
    assert_eq!(path, CreationPath::Plain);
    assert_eq!(calls.calls.len(), 4);
    assert_eq!(calls.calls[3], Call::Intercept);
    assert_eq!(state.swapchain.load(Ordering::SeqCst), 0x5C);
  }

  #[test]
  fn first_hwnd_swapchain_can_skip_frame_generation() {
    let config = store(|c| {
      c.fg_output.set(FgOutput::FsrFg);
      c.no_fsr_fg_first_swapchain.set(true);
    });
    let state = RuntimeState::default();
    let mut calls = FakeCalls {
      queue: true,
      fg_result: Some(S_OK),
      ..Default::default()
    };

    let (_, first) = create_swapchain(&mut calls, &config, &state, Variant::Hwnd, Some(params(1920, 1080)));
    let (_, second) = create_swapchain(&mut calls, &config, &state, Variant::Hwnd, Some(params(1920, 1080)));
    assert_eq!((first, second), (CreationPath::Plain, CreationPath::FrameGeneration));
  }

  #[test]
  fn other_devices_are_captured_and_created_plain() {
    let config = store(|c| c.fg_output.set(FgOutput::FsrFg));
    let state = RuntimeState::default();
    let mut calls = FakeCalls {
      plain_result: E_NOTIMPL,
      ..Default::default()
    };

    let (result, path) = create_swapchain(&mut calls, &config, &state, Variant::CoreWindow, Some(params(800, 600)));
    assert_eq!((result, path), (E_NOTIMPL, CreationPath::Plain));
    assert_eq!(
      calls.calls,
      vec![Call::CaptureQueue, Call::CaptureDevice, Call::Plain(params(800, 600))]
    );
    assert_eq!(state.d3d11_device.load(Ordering::SeqCst), 0xD11);
    assert_eq!(state.swapchain.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn present_tears_only_for_windowed_tearing_swapchains() {
    let mut config = Config::default();
    config.override_vsync.set(true);
    let state = RuntimeState::default();

    assert_eq!(present_args(&config, &state, 1, 0), (1, 0));
    state.sc_allow_tearing.store(true, Ordering::SeqCst);
    assert_eq!(present_args(&config, &state, 1, 0), (0, DXGI_PRESENT_ALLOW_TEARING));
    state.real_exclusive_fullscreen.store(true, Ordering::SeqCst);
    assert_eq!(present_args(&config, &state, 1, 0), (1, 0));
    assert_eq!(state.frame_count.load(Ordering::SeqCst), 3);
  }
}
