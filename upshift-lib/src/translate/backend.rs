//! Collaborators of the translator: the NGX runtime, its parameter bags, Vulkan view creation, the real FFX
//! implementation and the hot-swap settle wait.

use std::{path::PathBuf, time::Duration};

use ash::vk;
use upshift_common::{
  ffx::{
    FfxReturnCode, ffxAllocationCallbacks, ffxConfigureDescHeader, ffxContext, ffxCreateContextDescHeader,
    ffxDispatchDescHeader, ffxQueryDescHeader
  },
  ngx::{NVSDK_NGX_Handle, NVSDK_NGX_Resource_VK, NVSDK_NGX_Result}
};

/// Device handles captured from the Vulkan backend descriptor at context creation.
#[derive(Clone, Copy, Debug, Default)]
pub struct VulkanDevices {
  pub instance: vk::Instance,
  pub physical_device: vk::PhysicalDevice,
  pub device: vk::Device,
  pub get_device_proc_addr: Option<vk::PFN_vkGetDeviceProcAddr>
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamValue {
  U32(u32),
  I32(i32),
  F32(f32),
  F64(f64),
  /// Must stay valid until the next evaluation returns.
  Resource(*mut NVSDK_NGX_Resource_VK)
}

pub trait ParameterBag {
  fn set(&mut self, key: &str, value: ParamValue);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FeatureHandle(pub *mut NVSDK_NGX_Handle);

unsafe impl Send for FeatureHandle {}

pub trait NgxBackend {
  type Params: ParameterBag;

  fn init(&mut self, devices: &VulkanDevices, search_paths: &[PathBuf]) -> Result<(), NVSDK_NGX_Result>;
  fn capability_parameters(&mut self) -> Result<Self::Params, NVSDK_NGX_Result>;
  fn create_feature(
    &mut self,
    command_buffer: vk::CommandBuffer,
    params: &mut Self::Params
  ) -> Result<FeatureHandle, NVSDK_NGX_Result>;
  fn evaluate_feature(
    &mut self,
    command_buffer: vk::CommandBuffer,
    feature: FeatureHandle,
    params: &Self::Params
  ) -> NVSDK_NGX_Result;
  fn release_feature(&mut self, feature: FeatureHandle) -> NVSDK_NGX_Result;
}

pub trait ViewFactory {
  /// Loads the device's entry points. Called whenever a backend descriptor names a device.
  fn bind_device(&mut self, devices: &VulkanDevices);
  fn create_view(&mut self, info: &vk::ImageViewCreateInfo) -> Result<vk::ImageView, vk::Result>;
  fn destroy_view(&mut self, view: vk::ImageView);
}

/// The real FFX API implementation the game would otherwise have talked to.
pub trait FfxForwarder {
  /// # Safety
  /// Arguments are passed through unchanged and must be valid for the real implementation.
  unsafe fn create_context(
    &self,
    context: *mut ffxContext,
    desc: *mut ffxCreateContextDescHeader,
    mem_cb: *const ffxAllocationCallbacks
  ) -> FfxReturnCode;
  /// # Safety
  /// See [`FfxForwarder::create_context`].
  unsafe fn destroy_context(&self, context: *mut ffxContext, mem_cb: *const ffxAllocationCallbacks) -> FfxReturnCode;
  /// # Safety
  /// See [`FfxForwarder::create_context`].
  unsafe fn configure(&self, context: *mut ffxContext, desc: *const ffxConfigureDescHeader) -> FfxReturnCode;
  /// # Safety
  /// See [`FfxForwarder::create_context`].
  unsafe fn query(&self, context: *mut ffxContext, desc: *mut ffxQueryDescHeader) -> FfxReturnCode;
  /// # Safety
  /// See [`FfxForwarder::create_context`].
  unsafe fn dispatch(&self, context: *mut ffxContext, desc: *const ffxDispatchDescHeader) -> FfxReturnCode;

  /// `(major, minor, patch)` of the real implementation.
  fn version(&self) -> (u32, u32, u32);
}

/// Blocks while an outgoing feature drains before its replacement is created.
pub trait SettleWait {
  fn wait(&self, settle: Duration);
}

pub struct SleepSettle;

impl SettleWait for SleepSettle {
  fn wait(&self, settle: Duration) {
    if !settle.is_zero() {
      std::thread::sleep(settle);
    }
  }
}
