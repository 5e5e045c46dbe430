use std::sync::atomic::Ordering;

use ash::vk::{self, Handle};
use log::{debug, info};

use crate::{
  detour::{HookSlot, minhook::ENGINE},
  loader::{ModuleApi, ModuleHandle, win32::Win32Modules},
  session
};

pub(crate) const MODULE: &str = "vulkan-1.dll";

static CREATE_INSTANCE: HookSlot<vk::PFN_vkCreateInstance> = HookSlot::new();

pub(crate) fn attach(module: ModuleHandle) {
  let Some(target) = Win32Modules.symbol(module, "vkCreateInstance") else {
    return;
  };

  let mut tx = ENGINE.begin();
  unsafe { CREATE_INSTANCE.attach(&mut tx, target, create_instance as usize) };
  if tx.commit() > 0 {
    info!("[HOOK] vkCreateInstance hooked");
  }
}

/// The latest instance is the one image views are created against.
unsafe extern "system" fn create_instance(
  create_info: *const vk::InstanceCreateInfo<'_>,
  allocator: *const vk::AllocationCallbacks<'_>,
  instance: *mut vk::Instance
) -> vk::Result {
  let Some(original) = CREATE_INSTANCE.get() else {
    return vk::Result::ERROR_INITIALIZATION_FAILED;
  };

  let result = unsafe { original(create_info, allocator, instance) };
  if result == vk::Result::SUCCESS
    && let Some(instance) = unsafe { instance.as_ref() }
    && let Some(session) = session::current()
  {
    debug!("[HOOK] Vulkan instance {:#x}", instance.as_raw());
    session.state().vk_instance.store(instance.as_raw(), Ordering::SeqCst);
  }
  result
}
