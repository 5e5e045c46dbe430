use std::ffi::c_void;

use minhook::{MH_STATUS, MinHook};
use once_cell::sync::Lazy;

use super::{DetourEngine, HookError, HookPrimitive};

pub struct MinHookPrimitive;

fn status(status: MH_STATUS, target: usize) -> HookError {
  HookError::Primitive {
    status: format!("{:?}", status),
    target
  }
}

impl HookPrimitive for MinHookPrimitive {
  fn create(&self, target: usize, detour: usize) -> Result<usize, HookError> {
    unsafe { MinHook::create_hook(target as *mut c_void, detour as *mut c_void) }
      .map(|trampoline| trampoline as usize)
      .map_err(|e| status(e, target))
  }

  fn queue_enable(&self, target: usize) -> Result<(), HookError> {
    unsafe { MinHook::queue_enable_hook(target as *mut c_void) }.map_err(|e| status(e, target))
  }

  fn apply_queued(&self) -> Result<(), HookError> {
    unsafe { MinHook::apply_queued() }.map_err(|e| status(e, 0))
  }

  fn disable(&self, target: usize) -> Result<(), HookError> {
    unsafe { MinHook::disable_hook(target as *mut c_void) }.map_err(|e| status(e, target))
  }

  fn remove(&self, target: usize) -> Result<(), HookError> {
    unsafe { MinHook::remove_hook(target as *mut c_void) }.map_err(|e| status(e, target))
  }
}

pub static ENGINE: Lazy<DetourEngine<MinHookPrimitive>> = Lazy::new(|| DetourEngine::new(MinHookPrimitive));
