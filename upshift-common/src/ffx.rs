//! FidelityFX API host types.
//!
//! Layouts mirror `ffx_api.h`, `ffx_api_types.h`, `ffx_upscale.h` and `ffx_api_vk.h`. Enum-like fields stay
//! plain integers because callers may pass values outside the known set.

#![allow(non_camel_case_types, non_snake_case)]

use std::ffi::{c_char, c_void};

pub type ffxStructType_t = u64;
pub type ffxReturnCode_t = u32;
pub type ffxContext = *mut c_void;

/// ABI return code of every `ffx*` entry point.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FfxReturnCode(pub ffxReturnCode_t);

impl FfxReturnCode {
  pub const OK: Self = Self(0);
  pub const ERROR: Self = Self(1);
  pub const UNKNOWN_DESCTYPE: Self = Self(2);
  pub const RUNTIME_ERROR: Self = Self(3);
  pub const NO_PROVIDER: Self = Self(4);
  pub const MEMORY: Self = Self(5);
  pub const PARAMETER: Self = Self(6);

  pub fn is_ok(self) -> bool {
    self == Self::OK
  }

  pub fn name(self) -> &'static str {
    match self.0 {
      0 => "OK",
      1 => "ERROR",
      2 => "ERROR_UNKNOWN_DESCTYPE",
      3 => "ERROR_RUNTIME_ERROR",
      4 => "NO_PROVIDER",
      5 => "ERROR_MEMORY",
      6 => "ERROR_PARAMETER",
      _ => "UNKNOWN"
    }
  }
}

pub const FFX_API_EFFECT_MASK: u64 = 0xffff_0000;
pub const FFX_API_EFFECT_ID_GENERAL: u64 = 0x0000_0000;
pub const FFX_API_EFFECT_ID_UPSCALE: u64 = 0x0001_0000;
pub const FFX_API_EFFECT_ID_FRAMEGENERATION: u64 = 0x0002_0000;
pub const FFX_API_EFFECT_ID_FGSC_DX12: u64 = 0x0003_0000;
pub const FFX_API_EFFECT_ID_FGSC_VK: u64 = 0x0004_0000;

pub const FFX_API_CONFIGURE_DESC_TYPE_GLOBALDEBUG1: u64 = 0x0000_0001;
pub const FFX_API_CREATE_CONTEXT_DESC_TYPE_BACKEND_DX12: u64 = 0x0000_0002;
pub const FFX_API_CREATE_CONTEXT_DESC_TYPE_BACKEND_VK: u64 = 0x0000_0003;
pub const FFX_API_QUERY_DESC_TYPE_GET_VERSIONS: u64 = 0x0000_0004;
pub const FFX_API_DESC_TYPE_OVERRIDE_VERSION: u64 = 0x0000_0005;
pub const FFX_API_QUERY_DESC_TYPE_GET_PROVIDER_VERSION: u64 = 0x0000_0006;

pub const FFX_API_CREATE_CONTEXT_DESC_TYPE_UPSCALE: u64 = 0x0001_0000;
pub const FFX_API_DISPATCH_DESC_TYPE_UPSCALE: u64 = 0x0001_0001;
pub const FFX_API_QUERY_DESC_TYPE_UPSCALE_GETUPSCALERATIOFROMQUALITYMODE: u64 = 0x0001_0002;
pub const FFX_API_QUERY_DESC_TYPE_UPSCALE_GETRENDERRESOLUTIONFROMQUALITYMODE: u64 = 0x0001_0003;
pub const FFX_API_QUERY_DESC_TYPE_UPSCALE_GETJITTERPHASECOUNT: u64 = 0x0001_0004;
pub const FFX_API_QUERY_DESC_TYPE_UPSCALE_GETJITTEROFFSET: u64 = 0x0001_0005;
pub const FFX_API_DISPATCH_DESC_TYPE_UPSCALE_GENERATEREACTIVEMASK: u64 = 0x0001_0006;
pub const FFX_API_CONFIGURE_DESC_TYPE_UPSCALE_KEYVALUE: u64 = 0x0001_0007;
pub const FFX_API_QUERY_DESC_TYPE_UPSCALE_GPU_MEMORY_USAGE: u64 = 0x0001_0008;

pub const FFX_UPSCALE_QUALITY_MODE_NATIVEAA: u32 = 0;
pub const FFX_UPSCALE_QUALITY_MODE_QUALITY: u32 = 1;
pub const FFX_UPSCALE_QUALITY_MODE_BALANCED: u32 = 2;
pub const FFX_UPSCALE_QUALITY_MODE_PERFORMANCE: u32 = 3;
pub const FFX_UPSCALE_QUALITY_MODE_ULTRA_PERFORMANCE: u32 = 4;

pub const FFX_UPSCALE_ENABLE_HIGH_DYNAMIC_RANGE: u32 = 1 << 0;
pub const FFX_UPSCALE_ENABLE_DISPLAY_RESOLUTION_MOTION_VECTORS: u32 = 1 << 1;
pub const FFX_UPSCALE_ENABLE_MOTION_VECTORS_JITTER_CANCELLATION: u32 = 1 << 2;
pub const FFX_UPSCALE_ENABLE_DEPTH_INVERTED: u32 = 1 << 3;
pub const FFX_UPSCALE_ENABLE_DEPTH_INFINITE: u32 = 1 << 4;
pub const FFX_UPSCALE_ENABLE_AUTO_EXPOSURE: u32 = 1 << 5;
pub const FFX_UPSCALE_ENABLE_DYNAMIC_RESOLUTION: u32 = 1 << 6;
pub const FFX_UPSCALE_ENABLE_DEBUG_CHECKING: u32 = 1 << 7;
pub const FFX_UPSCALE_ENABLE_NON_LINEAR_COLORSPACE: u32 = 1 << 8;

pub const FFX_API_RESOURCE_USAGE_READ_ONLY: u32 = 0;
pub const FFX_API_RESOURCE_USAGE_RENDERTARGET: u32 = 1 << 0;
pub const FFX_API_RESOURCE_USAGE_UAV: u32 = 1 << 1;
pub const FFX_API_RESOURCE_USAGE_DEPTHTARGET: u32 = 1 << 2;
pub const FFX_API_RESOURCE_USAGE_INDIRECT: u32 = 1 << 3;
pub const FFX_API_RESOURCE_USAGE_ARRAYVIEW: u32 = 1 << 4;
pub const FFX_API_RESOURCE_USAGE_STENCILTARGET: u32 = 1 << 5;

pub mod surface_format {
  pub const UNKNOWN: u32 = 0;
  pub const R32G32B32A32_TYPELESS: u32 = 1;
  pub const R32G32B32A32_UINT: u32 = 2;
  pub const R32G32B32A32_FLOAT: u32 = 3;
  pub const R16G16B16A16_FLOAT: u32 = 4;
  pub const R32G32B32_FLOAT: u32 = 5;
  pub const R32G32_FLOAT: u32 = 6;
  pub const R8_UINT: u32 = 7;
  pub const R32_UINT: u32 = 8;
  pub const R8G8B8A8_TYPELESS: u32 = 9;
  pub const R8G8B8A8_UNORM: u32 = 10;
  pub const R8G8B8A8_SNORM: u32 = 11;
  pub const R8G8B8A8_SRGB: u32 = 12;
  pub const B8G8R8A8_TYPELESS: u32 = 13;
  pub const B8G8R8A8_UNORM: u32 = 14;
  pub const B8G8R8A8_SRGB: u32 = 15;
  pub const R11G11B10_FLOAT: u32 = 16;
  pub const R10G10B10A2_UNORM: u32 = 17;
  pub const R16G16_FLOAT: u32 = 18;
  pub const R16G16_UINT: u32 = 19;
  pub const R16G16_SINT: u32 = 20;
  pub const R16_FLOAT: u32 = 21;
  pub const R16_UINT: u32 = 22;
  pub const R16_UNORM: u32 = 23;
  pub const R16_SNORM: u32 = 24;
  pub const R8_UNORM: u32 = 25;
  pub const R8G8_UNORM: u32 = 26;
  pub const R8G8_UINT: u32 = 27;
  pub const R32_FLOAT: u32 = 28;
  pub const R9G9B9E5_SHAREDEXP: u32 = 29;
  pub const R16G16B16A16_TYPELESS: u32 = 30;
  pub const R32G32_TYPELESS: u32 = 31;
  pub const R10G10B10A2_TYPELESS: u32 = 32;
  pub const R16G16_TYPELESS: u32 = 33;
  pub const R16_TYPELESS: u32 = 34;
  pub const R8_TYPELESS: u32 = 35;
  pub const R8G8_TYPELESS: u32 = 36;
  pub const R32_TYPELESS: u32 = 37;
}

#[repr(C)]
#[derive(Debug)]
pub struct ffxApiHeader {
  pub type_: ffxStructType_t,
  pub pNext: *mut ffxApiHeader
}

pub type ffxCreateContextDescHeader = ffxApiHeader;
pub type ffxConfigureDescHeader = ffxApiHeader;
pub type ffxQueryDescHeader = ffxApiHeader;
pub type ffxDispatchDescHeader = ffxApiHeader;

pub type ffxAlloc = Option<unsafe extern "C" fn(pUserData: *mut c_void, size: u64) -> *mut c_void>;
pub type ffxDealloc = Option<unsafe extern "C" fn(pUserData: *mut c_void, pMem: *mut c_void)>;

#[repr(C)]
pub struct ffxAllocationCallbacks {
  pub pUserData: *mut c_void,
  pub alloc: ffxAlloc,
  pub dealloc: ffxDealloc
}

pub type ffxApiMessage = Option<unsafe extern "C" fn(type_: u32, message: *const u16)>;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FfxApiDimensions2D {
  pub width: u32,
  pub height: u32
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FfxApiFloatCoords2D {
  pub x: f32,
  pub y: f32
}

/// `width`/`height`/`depth` share storage with `size`/`stride`/`alignment` for buffers.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct FfxApiResourceDescription {
  pub type_: u32,
  pub format: u32,
  pub width: u32,
  pub height: u32,
  pub depth: u32,
  pub mipCount: u32,
  pub flags: u32,
  pub usage: u32
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct FfxApiResource {
  pub resource: *mut c_void,
  pub description: FfxApiResourceDescription,
  pub state: u32
}

impl Default for FfxApiResource {
  fn default() -> Self {
    Self {
      resource: std::ptr::null_mut(),
      description: FfxApiResourceDescription::default(),
      state: 0
    }
  }
}

#[repr(C)]
pub struct ffxCreateContextDescUpscale {
  pub header: ffxCreateContextDescHeader,
  pub flags: u32,
  pub maxRenderSize: FfxApiDimensions2D,
  pub maxUpscaleSize: FfxApiDimensions2D,
  pub fpMessage: ffxApiMessage
}

#[repr(C)]
pub struct ffxDispatchDescUpscale {
  pub header: ffxDispatchDescHeader,
  pub commandList: *mut c_void,
  pub color: FfxApiResource,
  pub depth: FfxApiResource,
  pub motionVectors: FfxApiResource,
  pub exposure: FfxApiResource,
  pub reactive: FfxApiResource,
  pub transparencyAndComposition: FfxApiResource,
  pub output: FfxApiResource,
  pub jitterOffset: FfxApiFloatCoords2D,
  pub motionVectorScale: FfxApiFloatCoords2D,
  pub renderSize: FfxApiDimensions2D,
  pub upscaleSize: FfxApiDimensions2D,
  pub enableSharpening: bool,
  pub sharpness: f32,
  pub frameTimeDelta: f32,
  pub preExposure: f32,
  pub reset: bool,
  pub cameraNear: f32,
  pub cameraFar: f32,
  pub cameraFovAngleVertical: f32,
  pub viewSpaceToMetersFactor: f32,
  pub flags: u32
}

#[repr(C)]
pub struct ffxQueryDescUpscaleGetUpscaleRatioFromQualityMode {
  pub header: ffxQueryDescHeader,
  pub qualityMode: u32,
  pub pOutUpscaleRatio: *mut f32
}

#[repr(C)]
pub struct ffxQueryDescUpscaleGetRenderResolutionFromQualityMode {
  pub header: ffxQueryDescHeader,
  pub displayWidth: u32,
  pub displayHeight: u32,
  pub qualityMode: u32,
  pub pOutRenderWidth: *mut u32,
  pub pOutRenderHeight: *mut u32
}

#[repr(C)]
pub struct ffxQueryDescUpscaleGetJitterPhaseCount {
  pub header: ffxQueryDescHeader,
  pub renderWidth: u32,
  pub displayWidth: u32,
  pub pOutPhaseCount: *mut i32
}

#[repr(C)]
pub struct ffxQueryDescUpscaleGetJitterOffset {
  pub header: ffxQueryDescHeader,
  pub index: i32,
  pub phaseCount: i32,
  pub pOutX: *mut f32,
  pub pOutY: *mut f32
}

#[repr(C)]
pub struct ffxDispatchDescUpscaleGenerateReactiveMask {
  pub header: ffxDispatchDescHeader,
  pub commandList: *mut c_void,
  pub colorOpaqueOnly: FfxApiResource,
  pub colorPreUpscale: FfxApiResource,
  pub outReactive: FfxApiResource,
  pub renderSize: FfxApiDimensions2D,
  pub scale: f32,
  pub cutoffThreshold: f32,
  pub binaryValue: f32,
  pub flags: u32
}

#[repr(C)]
pub struct ffxConfigureDescUpscaleKeyValue {
  pub header: ffxConfigureDescHeader,
  pub key: u64,
  pub u64_: u64,
  pub ptr: *mut c_void
}

#[repr(C)]
pub struct ffxQueryGetProviderVersion {
  pub header: ffxQueryDescHeader,
  pub versionId: u64,
  pub versionName: *const c_char
}

#[repr(C)]
pub struct ffxCreateBackendVKDesc {
  pub header: ffxCreateContextDescHeader,
  pub vkDevice: ash::vk::Device,
  pub vkPhysicalDevice: ash::vk::PhysicalDevice,
  pub vkDeviceProcAddr: Option<ash::vk::PFN_vkGetDeviceProcAddr>
}

pub type PfnFfxCreateContext = unsafe extern "C" fn(
  context: *mut ffxContext,
  desc: *mut ffxCreateContextDescHeader,
  mem_cb: *const ffxAllocationCallbacks
) -> ffxReturnCode_t;

pub type PfnFfxDestroyContext =
  unsafe extern "C" fn(context: *mut ffxContext, mem_cb: *const ffxAllocationCallbacks) -> ffxReturnCode_t;

pub type PfnFfxConfigure =
  unsafe extern "C" fn(context: *mut ffxContext, desc: *const ffxConfigureDescHeader) -> ffxReturnCode_t;

pub type PfnFfxQuery = unsafe extern "C" fn(context: *mut ffxContext, desc: *mut ffxQueryDescHeader) -> ffxReturnCode_t;

pub type PfnFfxDispatch =
  unsafe extern "C" fn(context: *mut ffxContext, desc: *const ffxDispatchDescHeader) -> ffxReturnCode_t;
