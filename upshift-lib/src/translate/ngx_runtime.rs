//! The NGX runtime reached through the exports of the configured module.

use std::{
  ffi::{CString, c_void},
  mem::transmute,
  path::PathBuf,
  ptr
};

use ash::vk;
use log::{debug, error, info, warn};
use upshift_common::{
  ngx::*,
  utils::widestring
};

use super::backend::{FeatureHandle, NgxBackend, ParamValue, ParameterBag, VulkanDevices};
use crate::loader::{KmtApi, LoaderError, ModuleApi, ModuleLoader};

pub const DEFAULT_NGX_MODULE: &str = "_nvngx.dll";

const PROJECT_ID: &std::ffi::CStr = c"upshift";
const ENGINE_VERSION: &std::ffi::CStr = c"1.0";

#[derive(Clone, Copy)]
struct Setters {
  set_ui: PfnNgxParameterSetUI,
  set_i: PfnNgxParameterSetI,
  set_f: PfnNgxParameterSetF,
  set_d: PfnNgxParameterSetD,
  set_void_pointer: PfnNgxParameterSetVoidPointer
}

#[derive(Clone, Copy)]
struct EntryPoints {
  init: PfnNgxVulkanInitProjectIdExt,
  get_capability_parameters: PfnNgxVulkanGetCapabilityParameters,
  create_feature: PfnNgxVulkanCreateFeature,
  evaluate_feature: PfnNgxVulkanEvaluateFeature,
  release_feature: PfnNgxVulkanReleaseFeature,
  setters: Setters
}

pub struct NgxRuntime {
  entry: EntryPoints,
  get_instance_proc_addr: Option<vk::PFN_vkGetInstanceProcAddr>
}

/// A parameter block handed out by `GetCapabilityParameters`.
pub struct NgxParameters {
  raw: *mut NVSDK_NGX_Parameter,
  setters: Setters
}

unsafe impl Send for NgxParameters {}
unsafe impl Send for NgxRuntime {}

impl ParameterBag for NgxParameters {
  fn set(&mut self, key: &str, value: ParamValue) {
    let Ok(name) = CString::new(key) else {
      return;
    };
    let s = &self.setters;
    unsafe {
      match value {
        ParamValue::U32(v) => (s.set_ui)(self.raw, name.as_ptr(), v),
        ParamValue::I32(v) => (s.set_i)(self.raw, name.as_ptr(), v),
        ParamValue::F32(v) => (s.set_f)(self.raw, name.as_ptr(), v),
        ParamValue::F64(v) => (s.set_d)(self.raw, name.as_ptr(), v),
        ParamValue::Resource(v) => (s.set_void_pointer)(self.raw, name.as_ptr(), v as *mut c_void)
      }
    }
  }
}

macro_rules! resolve_fn {
  ($loader:expr, $module:expr, $module_name:expr, $symbol:literal, $ty:ty) => {{
    let address = $loader.resolve($module, $module_name, $symbol)?;
    unsafe { transmute::<usize, $ty>(address) }
  }};
}

impl NgxRuntime {
  /// Resolves the NGX exports from `module_name`, loading it the way every vendor module is loaded.
  pub fn resolve<M: ModuleApi, K: KmtApi>(loader: &ModuleLoader<M, K>, module_name: &str) -> Result<Self, LoaderError> {
    let module = loader.load_module(module_name)?;
    let entry = EntryPoints {
      init: resolve_fn!(loader, module, module_name, "NVSDK_NGX_VULKAN_Init_ProjectID_Ext", PfnNgxVulkanInitProjectIdExt),
      get_capability_parameters: resolve_fn!(
        loader,
        module,
        module_name,
        "NVSDK_NGX_VULKAN_GetCapabilityParameters",
        PfnNgxVulkanGetCapabilityParameters
      ),
      create_feature: resolve_fn!(loader, module, module_name, "NVSDK_NGX_VULKAN_CreateFeature", PfnNgxVulkanCreateFeature),
      evaluate_feature: resolve_fn!(
        loader,
        module,
        module_name,
        "NVSDK_NGX_VULKAN_EvaluateFeature",
        PfnNgxVulkanEvaluateFeature
      ),
      release_feature: resolve_fn!(
        loader,
        module,
        module_name,
        "NVSDK_NGX_VULKAN_ReleaseFeature",
        PfnNgxVulkanReleaseFeature
      ),
      setters: Setters {
        set_ui: resolve_fn!(loader, module, module_name, "NVSDK_NGX_Parameter_SetUI", PfnNgxParameterSetUI),
        set_i: resolve_fn!(loader, module, module_name, "NVSDK_NGX_Parameter_SetI", PfnNgxParameterSetI),
        set_f: resolve_fn!(loader, module, module_name, "NVSDK_NGX_Parameter_SetF", PfnNgxParameterSetF),
        set_d: resolve_fn!(loader, module, module_name, "NVSDK_NGX_Parameter_SetD", PfnNgxParameterSetD),
        set_void_pointer: resolve_fn!(
          loader,
          module,
          module_name,
          "NVSDK_NGX_Parameter_SetVoidPointer",
          PfnNgxParameterSetVoidPointer
        )
      }
    };

    let get_instance_proc_addr = loader
      .load_module("vulkan-1.dll")
      .and_then(|vulkan| loader.resolve(vulkan, "vulkan-1.dll", "vkGetInstanceProcAddr"))
      .map(|address| unsafe { transmute::<usize, vk::PFN_vkGetInstanceProcAddr>(address) })
      .inspect_err(|e| warn!("vkGetInstanceProcAddr unavailable: {}", e))
      .ok();

    info!("NGX entry points resolved from {}", module_name);
    Ok(Self {
      entry,
      get_instance_proc_addr
    })
  }
}

impl NgxBackend for NgxRuntime {
  type Params = NgxParameters;

  fn init(&mut self, devices: &VulkanDevices, search_paths: &[PathBuf]) -> Result<(), NVSDK_NGX_Result> {
    let wide: Vec<Vec<u16>> = search_paths.iter().map(|p| widestring(p.to_string_lossy())).collect();
    let pointers: Vec<*const u16> = wide.iter().map(|p| p.as_ptr()).collect();
    for path in search_paths {
      debug!("NGX search path: {}", path.display());
    }

    let feature_info = NVSDK_NGX_FeatureCommonInfo {
      PathListInfo: NVSDK_NGX_PathListInfo {
        Path: pointers.as_ptr(),
        Length: pointers.len() as u32
      },
      InternalData: ptr::null_mut(),
      LoggingInfo: NVSDK_NGX_LoggingInfo {
        LoggingCallback: None,
        MinimumLoggingLevel: 0,
        DisableOtherLoggingSinks: false
      }
    };
    let app_data = search_paths.first().map(|p| widestring(p.to_string_lossy())).unwrap_or_else(|| widestring("."));

    let result = unsafe {
      (self.entry.init)(
        PROJECT_ID.as_ptr(),
        NVSDK_NGX_ENGINE_TYPE_CUSTOM,
        ENGINE_VERSION.as_ptr(),
        app_data.as_ptr(),
        devices.instance,
        devices.physical_device,
        devices.device,
        self.get_instance_proc_addr,
        devices.get_device_proc_addr,
        NVSDK_NGX_VERSION_API,
        &feature_info
      )
    };

    if ngx_succeeded(result) {
      info!("NGX initialised");
      Ok(())
    } else {
      error!("NVSDK_NGX_VULKAN_Init_ProjectID_Ext failed: {:#x}", result);
      Err(result)
    }
  }

  fn capability_parameters(&mut self) -> Result<NgxParameters, NVSDK_NGX_Result> {
    let mut raw = ptr::null_mut();
    let result = unsafe { (self.entry.get_capability_parameters)(&mut raw) };
    if !ngx_succeeded(result) || raw.is_null() {
      return Err(result);
    }
    Ok(NgxParameters {
      raw,
      setters: self.entry.setters
    })
  }

  fn create_feature(
    &mut self,
    command_buffer: vk::CommandBuffer,
    params: &mut NgxParameters
  ) -> Result<FeatureHandle, NVSDK_NGX_Result> {
    let mut handle = ptr::null_mut();
    let result =
      unsafe { (self.entry.create_feature)(command_buffer, NVSDK_NGX_FEATURE_SUPER_SAMPLING, params.raw, &mut handle) };
    if !ngx_succeeded(result) || handle.is_null() {
      return Err(result);
    }
    Ok(FeatureHandle(handle))
  }

  fn evaluate_feature(
    &mut self,
    command_buffer: vk::CommandBuffer,
    feature: FeatureHandle,
    params: &NgxParameters
  ) -> NVSDK_NGX_Result {
    unsafe { (self.entry.evaluate_feature)(command_buffer, feature.0, params.raw, None) }
  }

  fn release_feature(&mut self, feature: FeatureHandle) -> NVSDK_NGX_Result {
    unsafe { (self.entry.release_feature)(feature.0) }
  }
}
