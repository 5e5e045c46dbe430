//! Adapter enumeration under the GPU-preference policy.

use std::sync::atomic::Ordering;

use log::{debug, error, warn};
use upshift_common::{
  Config, Guid,
  amd::{HRESULT, S_OK}
};

use super::Skip;
use crate::session::RuntimeState;

pub const DXGI_ERROR_NOT_FOUND: HRESULT = 0x887A_0002_u32 as i32;

/// Private interface DXVK adapters answer to.
pub const IID_DXVK_VK_INTERFACE: Guid = Guid::from_u128(0x907bf281_ea3c_43b4_a8e4_9f231107b4ff);

/// One enumeration call on the real factory. The adapter produced by the last successful call is the "current" one.
pub trait AdapterSource {
  /// `EnumAdapters` or `EnumAdapters1`.
  fn enumerate(&mut self, index: u32) -> HRESULT;
  /// `EnumAdapterByGpuPreference` with high performance, `None` on factories older than `IDXGIFactory6`.
  /// Must reach the driver without passing through the enumeration hooks again.
  fn enumerate_high_performance(&mut self, index: u32) -> Option<HRESULT>;
  /// Description of the current adapter.
  fn description(&self) -> Option<String>;
  /// Whether the current adapter answers `QueryInterface` for [`IID_DXVK_VK_INTERFACE`].
  fn answers(&self, iid: &Guid) -> bool;
  /// Hooks `GetDesc`/`GetDesc1` of the current adapter.
  fn attach_spoofing(&mut self);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EnumPolicy {
  pub prefer_dedicated: bool,
  pub prefer_first: bool
}

impl EnumPolicy {
  pub fn from_config(config: &Config) -> Self {
    Self {
      prefer_dedicated: config.prefer_dedicated_gpu.value_or_default(),
      prefer_first: config.prefer_first_dedicated_gpu.value_or_default()
    }
  }
}

/// `EnumAdapters`/`EnumAdapters1` as the game sees them.
pub fn enum_adapters<S: AdapterSource>(source: &mut S, policy: EnumPolicy, state: &RuntimeState, index: u32) -> HRESULT {
  let result = if !Skip::HighPerfCheck.active() && policy.prefer_dedicated {
    if policy.prefer_first && index > 0 {
      debug!("{}, returning not found", index);
      return DXGI_ERROR_NOT_FOUND;
    }
    enumerate_preferring_dedicated(source, index)
  } else {
    source.enumerate(index)
  };

  after_enumeration(source, state, result)
}

fn enumerate_preferring_dedicated<S: AdapterSource>(source: &mut S, index: u32) -> HRESULT {
  debug!("Trying to select high performance adapter ({})", index);
  let high_performance = {
    let _skip = Skip::HighPerfCheck.scoped();
    source.enumerate_high_performance(index)
  };

  let result = match high_performance {
    Some(S_OK) => S_OK,
    Some(failed) => {
      error!(
        "Can't get high performance adapter {}: {:#x}, fallback to standard method",
        index, failed as u32
      );
      source.enumerate(index)
    }
    None => return source.enumerate(index)
  };

  if result == S_OK {
    let _skip = Skip::Spoofing.scoped();
    match source.description() {
      Some(name) => debug!("Adapter ({}) will be used", name),
      None => error!("Can't get adapter description!")
    }
  }
  result
}

/// The tail every enumeration entry point shares: DXVK check, then spoofing.
pub fn after_enumeration<S: AdapterSource>(source: &mut S, state: &RuntimeState, result: HRESULT) -> HRESULT {
  if result != S_OK {
    return result;
  }

  if !state.is_running_on_dxvk.load(Ordering::SeqCst) && source.answers(&IID_DXVK_VK_INTERFACE) {
    warn!("DXVK adapter detected");
    state.is_running_on_dxvk.store(true, Ordering::SeqCst);
  }
  source.attach_spoofing();
  result
}
