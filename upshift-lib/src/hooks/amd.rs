use std::{ffi::c_void, sync::atomic::Ordering};

use log::{debug, info};
use upshift_common::{
  Guid,
  amd::{HRESULT, PfnAmdExtD3DCreateInterface}
};

use crate::{
  detour::{HookSlot, minhook::ENGINE},
  hooks::dxgi::real_adapters,
  interception::spoof::detect_rdna4,
  loader::{ModuleApi, ModuleHandle, win32::Win32Modules},
  session::{self, Session},
  shims::{ExportRoutes, amd_ext}
};

pub(crate) const MODULE: &str = "amdxc64.dll";

static CREATE_INTERFACE: HookSlot<PfnAmdExtD3DCreateInterface> = HookSlot::new();

pub(crate) fn attach(module: ModuleHandle) {
  let Some(target) = Win32Modules.symbol(module, "AmdExtD3DCreateInterface") else {
    debug!("{} has no AmdExtD3DCreateInterface", MODULE);
    return;
  };

  let mut tx = ENGINE.begin();
  unsafe { CREATE_INTERFACE.attach(&mut tx, target, create_interface as usize) };
  if tx.commit() > 0 {
    info!("[HOOK] AmdExtD3DCreateInterface hooked");
  }
}

fn routes(session: &Session) -> ExportRoutes {
  let state = session.state();
  state
    .is_rdna4
    .get_or_init(|| detect_rdna4(real_adapters(), session.config()));

  ExportRoutes {
    fsr4_update: session.config().snapshot().fsr4_update.value_or_default(),
    on_linux: state.is_running_on_linux.load(Ordering::SeqCst)
  }
}

unsafe extern "system" fn create_interface(outer: *mut c_void, riid: *const Guid, ppv: *mut *mut c_void) -> HRESULT {
  let routes = session::current().map(routes).unwrap_or_default();
  unsafe { amd_ext::create_interface(routes, CREATE_INTERFACE.get(), outer, riid, ppv) }
}
