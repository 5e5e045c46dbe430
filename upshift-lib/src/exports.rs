//! The FFX API as exported by this module. Every call runs against the session's context translator, built on
//! first use from the configured NGX runtime and the renamed original FFX module.

use std::sync::atomic::{AtomicBool, Ordering};

use log::error;
use upshift_common::{Config, ffx::*};

use crate::{
  session,
  translate::{Environment, FfxSurface}
};

static UNAVAILABLE: AtomicBool = AtomicBool::new(false);

#[cfg(windows)]
fn build_translator(config: &Config) -> Option<Box<dyn FfxSurface>> {
  use log::info;

  use crate::{
    loader::{system_loader, win32},
    translate::{
      ContextTranslator,
      ffx_proxy::{DEFAULT_FFX_MODULE, FfxProxy},
      ngx_runtime::{DEFAULT_NGX_MODULE, NgxRuntime},
      vulkan::AshViewFactory
    }
  };

  let loader = system_loader();
  let ngx_module = config.ngx_module.value_or(DEFAULT_NGX_MODULE.to_string());
  let runtime = match NgxRuntime::resolve(&loader, &ngx_module) {
    Ok(runtime) => runtime,
    Err(e) => {
      error!("NGX runtime unavailable: {}", e);
      return None;
    }
  };

  let ffx_module = config.ffx_original_module.value_or(DEFAULT_FFX_MODULE.to_string());
  let version = loader
    .load_module(&ffx_module)
    .ok()
    .and_then(win32::module_path)
    .and_then(|path| win32::file_version(&path))
    .unwrap_or_default();
  let forwarder = FfxProxy::resolve(&loader, &ffx_module, version);

  info!("Context translator ready, NGX from {}", ngx_module);
  Some(Box::new(ContextTranslator::new(runtime, AshViewFactory::default(), forwarder)))
}

#[cfg(not(windows))]
fn build_translator(_config: &Config) -> Option<Box<dyn FfxSurface>> {
  error!("The NGX runtime is only available on Windows");
  None
}

/// Builds the translator once. A failed build is not retried.
fn build_once(config: &Config) -> Option<Box<dyn FfxSurface>> {
  if UNAVAILABLE.load(Ordering::SeqCst) {
    return None;
  }
  let translator = build_translator(config);
  if translator.is_none() {
    UNAVAILABLE.store(true, Ordering::SeqCst);
  }
  translator
}

fn with_surface(call: impl FnOnce(&mut dyn FfxSurface, &Environment) -> FfxReturnCode) -> ffxReturnCode_t {
  session::global()
    .and_then(|session| session.with_translator(build_once, call))
    .unwrap_or(FfxReturnCode::NO_PROVIDER)
    .0
}

/// # Safety
/// Arguments follow the `ffxCreateContext` contract.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ffxCreateContext(
  context: *mut ffxContext,
  desc: *mut ffxCreateContextDescHeader,
  mem_cb: *const ffxAllocationCallbacks
) -> ffxReturnCode_t {
  with_surface(|translator, env| unsafe { translator.create_context(env, context, desc, mem_cb) })
}

/// # Safety
/// Arguments follow the `ffxDestroyContext` contract.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ffxDestroyContext(context: *mut ffxContext, mem_cb: *const ffxAllocationCallbacks) -> ffxReturnCode_t {
  with_surface(|translator, env| unsafe { translator.destroy_context(env, context, mem_cb) })
}

/// # Safety
/// Arguments follow the `ffxConfigure` contract.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ffxConfigure(context: *mut ffxContext, desc: *const ffxConfigureDescHeader) -> ffxReturnCode_t {
  with_surface(|translator, env| unsafe { translator.configure(env, context, desc) })
}

/// # Safety
/// Arguments follow the `ffxQuery` contract.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ffxQuery(context: *mut ffxContext, desc: *mut ffxQueryDescHeader) -> ffxReturnCode_t {
  with_surface(|translator, env| unsafe { translator.query(env, context, desc) })
}

/// # Safety
/// Arguments follow the `ffxDispatch` contract.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ffxDispatch(context: *mut ffxContext, desc: *const ffxDispatchDescHeader) -> ffxReturnCode_t {
  with_surface(|translator, env| unsafe { translator.dispatch(env, context, desc) })
}
