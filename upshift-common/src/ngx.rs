//! NGX host types and parameter names for the Vulkan entry points.

#![allow(non_camel_case_types, non_snake_case)]

use std::ffi::{c_char, c_void};

use ash::vk;

pub type NVSDK_NGX_Result = u32;

pub const NVSDK_NGX_RESULT_SUCCESS: NVSDK_NGX_Result = 0x1;
pub const NVSDK_NGX_RESULT_FAIL: NVSDK_NGX_Result = 0xBAD0_0000;

pub fn ngx_succeeded(result: NVSDK_NGX_Result) -> bool {
  (result & 0xFFF0_0000) != NVSDK_NGX_RESULT_FAIL
}

pub const NVSDK_NGX_FEATURE_SUPER_SAMPLING: u32 = 1;

pub const NVSDK_NGX_ENGINE_TYPE_CUSTOM: u32 = 0;
pub const NVSDK_NGX_VERSION_API: u32 = 0x0000_0015;

pub mod feature_flags {
  pub const NONE: u32 = 0;
  pub const IS_HDR: u32 = 1 << 0;
  pub const MV_LOW_RES: u32 = 1 << 1;
  pub const MV_JITTERED: u32 = 1 << 2;
  pub const DEPTH_INVERTED: u32 = 1 << 3;
  pub const DO_SHARPENING: u32 = 1 << 5;
  pub const AUTO_EXPOSURE: u32 = 1 << 6;
}

/// `NVSDK_NGX_PerfQuality_Value`.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PerfQuality {
  MaxPerf = 0,
  Balanced = 1,
  MaxQuality = 2,
  UltraPerformance = 3,
  UltraQuality = 4,
  Dlaa = 5
}

pub mod params {
  pub const DLSS_FEATURE_CREATE_FLAGS: &str = "DLSS.Feature.Create.Flags";
  pub const WIDTH: &str = "Width";
  pub const HEIGHT: &str = "Height";
  pub const OUT_WIDTH: &str = "OutWidth";
  pub const OUT_HEIGHT: &str = "OutHeight";
  pub const PERF_QUALITY_VALUE: &str = "PerfQualityValue";
  pub const JITTER_OFFSET_X: &str = "Jitter.Offset.X";
  pub const JITTER_OFFSET_Y: &str = "Jitter.Offset.Y";
  pub const MV_SCALE_X: &str = "MV.Scale.X";
  pub const MV_SCALE_Y: &str = "MV.Scale.Y";
  pub const DLSS_EXPOSURE_SCALE: &str = "DLSS.Exposure.Scale";
  pub const DLSS_PRE_EXPOSURE: &str = "DLSS.Pre.Exposure";
  pub const RESET: &str = "Reset";
  pub const DLSS_RENDER_SUBRECT_WIDTH: &str = "DLSS.Render.Subrect.Dimensions.Width";
  pub const DLSS_RENDER_SUBRECT_HEIGHT: &str = "DLSS.Render.Subrect.Dimensions.Height";
  pub const DEPTH: &str = "Depth";
  pub const COLOR: &str = "Color";
  pub const MOTION_VECTORS: &str = "MotionVectors";
  pub const OUTPUT: &str = "Output";
  pub const EXPOSURE_TEXTURE: &str = "ExposureTexture";
  pub const DLSS_INPUT_BIAS_COLOR_MASK: &str = "DLSS.Input.Bias.Current.Color.Mask";
  pub const SHARPNESS: &str = "Sharpness";

  pub const FSR_UPSCALE_WIDTH: &str = "FSR.upscaleSize.width";
  pub const FSR_UPSCALE_HEIGHT: &str = "FSR.upscaleSize.height";
  pub const FSR_TRANSPARENCY: &str = "FSR.transparencyAndComposition";
  pub const FSR_REACTIVE: &str = "FSR.reactive";
  pub const FSR_CAMERA_NEAR: &str = "FSR.cameraNear";
  pub const FSR_CAMERA_FAR: &str = "FSR.cameraFar";
  pub const FSR_CAMERA_FOV: &str = "FSR.cameraFovAngleVertical";
  pub const FSR_FRAME_TIME_DELTA: &str = "FSR.frameTimeDelta";
  pub const FSR_VIEW_TO_METERS: &str = "FSR.viewSpaceToMetersFactor";
}

#[repr(C)]
#[derive(Debug)]
pub struct NVSDK_NGX_Handle {
  pub Id: u32
}

/// Opaque parameter object owned by the NGX runtime.
#[repr(C)]
pub struct NVSDK_NGX_Parameter {
  _private: [u8; 0]
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct NVSDK_NGX_ImageViewInfo_VK {
  pub ImageView: vk::ImageView,
  pub Image: vk::Image,
  pub SubresourceRange: vk::ImageSubresourceRange,
  pub Format: vk::Format,
  pub Width: u32,
  pub Height: u32
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct NVSDK_NGX_BufferInfo_VK {
  pub Buffer: vk::Buffer,
  pub SizeInBytes: u32
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union NVSDK_NGX_Resource_VK_Union {
  pub ImageViewInfo: NVSDK_NGX_ImageViewInfo_VK,
  pub BufferInfo: NVSDK_NGX_BufferInfo_VK
}

pub const NVSDK_NGX_RESOURCE_VK_TYPE_VK_IMAGEVIEW: u32 = 0;
pub const NVSDK_NGX_RESOURCE_VK_TYPE_VK_BUFFER: u32 = 1;

#[repr(C)]
#[derive(Clone, Copy)]
pub struct NVSDK_NGX_Resource_VK {
  pub Resource: NVSDK_NGX_Resource_VK_Union,
  pub Type: u32,
  pub ReadWrite: bool
}

impl NVSDK_NGX_Resource_VK {
  pub fn image_view(info: NVSDK_NGX_ImageViewInfo_VK, read_write: bool) -> Self {
    Self {
      Resource: NVSDK_NGX_Resource_VK_Union { ImageViewInfo: info },
      Type: NVSDK_NGX_RESOURCE_VK_TYPE_VK_IMAGEVIEW,
      ReadWrite: read_write
    }
  }

  pub fn image_view_info(&self) -> Option<NVSDK_NGX_ImageViewInfo_VK> {
    if self.Type == NVSDK_NGX_RESOURCE_VK_TYPE_VK_IMAGEVIEW {
      Some(unsafe { self.Resource.ImageViewInfo })
    } else {
      None
    }
  }
}

impl std::fmt::Debug for NVSDK_NGX_Resource_VK {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("NVSDK_NGX_Resource_VK")
      .field("Type", &self.Type)
      .field("ReadWrite", &self.ReadWrite)
      .field("ImageViewInfo", &self.image_view_info())
      .finish()
  }
}

#[repr(C)]
pub struct NVSDK_NGX_PathListInfo {
  pub Path: *const *const u16,
  pub Length: u32
}

pub type NVSDK_NGX_AppLogCallback =
  Option<unsafe extern "C" fn(message: *const c_char, level: u32, source: u32)>;

#[repr(C)]
pub struct NVSDK_NGX_LoggingInfo {
  pub LoggingCallback: NVSDK_NGX_AppLogCallback,
  pub MinimumLoggingLevel: u32,
  pub DisableOtherLoggingSinks: bool
}

#[repr(C)]
pub struct NVSDK_NGX_FeatureCommonInfo {
  pub PathListInfo: NVSDK_NGX_PathListInfo,
  pub InternalData: *mut c_void,
  pub LoggingInfo: NVSDK_NGX_LoggingInfo
}

pub type PfnNgxVulkanInitProjectIdExt = unsafe extern "C" fn(
  project_id: *const c_char,
  engine_type: u32,
  engine_version: *const c_char,
  application_data_path: *const u16,
  instance: vk::Instance,
  physical_device: vk::PhysicalDevice,
  device: vk::Device,
  get_instance_proc_addr: Option<vk::PFN_vkGetInstanceProcAddr>,
  get_device_proc_addr: Option<vk::PFN_vkGetDeviceProcAddr>,
  sdk_version: u32,
  feature_info: *const NVSDK_NGX_FeatureCommonInfo
) -> NVSDK_NGX_Result;

pub type PfnNgxVulkanGetCapabilityParameters =
  unsafe extern "C" fn(out_parameters: *mut *mut NVSDK_NGX_Parameter) -> NVSDK_NGX_Result;

pub type PfnNgxVulkanCreateFeature = unsafe extern "C" fn(
  command_buffer: vk::CommandBuffer,
  feature: u32,
  parameters: *mut NVSDK_NGX_Parameter,
  out_handle: *mut *mut NVSDK_NGX_Handle
) -> NVSDK_NGX_Result;

pub type PfnNgxProgressCallback = Option<unsafe extern "C" fn(progress: f32, should_cancel: *mut bool)>;

pub type PfnNgxVulkanEvaluateFeature = unsafe extern "C" fn(
  command_buffer: vk::CommandBuffer,
  handle: *const NVSDK_NGX_Handle,
  parameters: *const NVSDK_NGX_Parameter,
  callback: PfnNgxProgressCallback
) -> NVSDK_NGX_Result;

pub type PfnNgxVulkanReleaseFeature = unsafe extern "C" fn(handle: *mut NVSDK_NGX_Handle) -> NVSDK_NGX_Result;

pub type PfnNgxParameterSetUI =
  unsafe extern "C" fn(parameter: *mut NVSDK_NGX_Parameter, name: *const c_char, value: u32);
pub type PfnNgxParameterSetI =
  unsafe extern "C" fn(parameter: *mut NVSDK_NGX_Parameter, name: *const c_char, value: i32);
pub type PfnNgxParameterSetF =
  unsafe extern "C" fn(parameter: *mut NVSDK_NGX_Parameter, name: *const c_char, value: f32);
pub type PfnNgxParameterSetD =
  unsafe extern "C" fn(parameter: *mut NVSDK_NGX_Parameter, name: *const c_char, value: f64);
pub type PfnNgxParameterSetVoidPointer =
  unsafe extern "C" fn(parameter: *mut NVSDK_NGX_Parameter, name: *const c_char, value: *mut c_void);
