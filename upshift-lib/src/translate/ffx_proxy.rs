//! The real `amd_fidelityfx_vk.dll`, renamed by the installer, as calls are passed through to it.

use std::mem::transmute;

use log::{info, warn};
use upshift_common::ffx::*;

use super::backend::FfxForwarder;
use crate::loader::{KmtApi, ModuleApi, ModuleLoader};

pub const DEFAULT_FFX_MODULE: &str = "amd_fidelityfx_vk_original.dll";

#[derive(Clone, Copy, Default)]
pub struct FfxProxy {
  create_context: Option<PfnFfxCreateContext>,
  destroy_context: Option<PfnFfxDestroyContext>,
  configure: Option<PfnFfxConfigure>,
  query: Option<PfnFfxQuery>,
  dispatch: Option<PfnFfxDispatch>,
  version: (u32, u32, u32)
}

impl FfxProxy {
  /// Binds whatever of the five entry points `module_name` exports. A missing module leaves every call answering
  /// `NO_PROVIDER`.
  pub fn resolve<M: ModuleApi, K: KmtApi>(
    loader: &ModuleLoader<M, K>,
    module_name: &str,
    version: (u32, u32, u32)
  ) -> Self {
    let Ok(module) = loader.load_module(module_name) else {
      warn!("{} not found, FFX calls will not be forwarded", module_name);
      return Self {
        version,
        ..Default::default()
      };
    };

    let symbol = |name: &str| {
      let address = loader.resolve(module, module_name, name).inspect_err(|e| warn!("{}", e)).ok();
      address.filter(|a| *a != 0)
    };

    let proxy = unsafe {
      Self {
        create_context: symbol("ffxCreateContext").map(|a| transmute::<usize, PfnFfxCreateContext>(a)),
        destroy_context: symbol("ffxDestroyContext").map(|a| transmute::<usize, PfnFfxDestroyContext>(a)),
        configure: symbol("ffxConfigure").map(|a| transmute::<usize, PfnFfxConfigure>(a)),
        query: symbol("ffxQuery").map(|a| transmute::<usize, PfnFfxQuery>(a)),
        dispatch: symbol("ffxDispatch").map(|a| transmute::<usize, PfnFfxDispatch>(a)),
        version
      }
    };
    info!(
      "Forwarding to {} {}.{}.{}",
      module_name, version.0, version.1, version.2
    );
    proxy
  }

  pub fn is_bound(&self) -> bool {
    self.create_context.is_some()
  }
}

impl FfxForwarder for FfxProxy {
  unsafe fn create_context(
    &self,
    context: *mut ffxContext,
    desc: *mut ffxCreateContextDescHeader,
    mem_cb: *const ffxAllocationCallbacks
  ) -> FfxReturnCode {
    match self.create_context {
      Some(f) => FfxReturnCode(unsafe { f(context, desc, mem_cb) }),
      None => FfxReturnCode::NO_PROVIDER
    }
  }

  unsafe fn destroy_context(&self, context: *mut ffxContext, mem_cb: *const ffxAllocationCallbacks) -> FfxReturnCode {
    match self.destroy_context {
      Some(f) => FfxReturnCode(unsafe { f(context, mem_cb) }),
      None => FfxReturnCode::NO_PROVIDER
    }
  }

  unsafe fn configure(&self, context: *mut ffxContext, desc: *const ffxConfigureDescHeader) -> FfxReturnCode {
    match self.configure {
      Some(f) => FfxReturnCode(unsafe { f(context, desc) }),
      None => FfxReturnCode::NO_PROVIDER
    }
  }

  unsafe fn query(&self, context: *mut ffxContext, desc: *mut ffxQueryDescHeader) -> FfxReturnCode {
    match self.query {
      Some(f) => FfxReturnCode(unsafe { f(context, desc) }),
      None => FfxReturnCode::NO_PROVIDER
    }
  }

  unsafe fn dispatch(&self, context: *mut ffxContext, desc: *const ffxDispatchDescHeader) -> FfxReturnCode {
    match self.dispatch {
      Some(f) => FfxReturnCode(unsafe { f(context, desc) }),
      None => FfxReturnCode::NO_PROVIDER
    }
  }

  fn version(&self) -> (u32, u32, u32) {
    self.version
  }
}
