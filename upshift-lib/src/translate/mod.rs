//! FFX upscaling contexts served by an NGX feature.
//!
//! A context is registered by `create_context` (init parameters plus a capability parameter block) and gets its
//! NGX feature on the first dispatch, when the render size is finally known.

pub mod backend;
pub mod ffx_proxy;
pub mod ngx_runtime;
pub mod policy;
pub mod quality;
pub mod vulkan;

use std::{
  collections::{HashMap, HashSet},
  ffi::CString,
  path::PathBuf
};

use ash::vk;
use log::{debug, error, info, warn};
use thiserror::Error;
use upshift_common::{
  Config,
  ffx::*,
  ngx::{NVSDK_NGX_RESULT_SUCCESS, NVSDK_NGX_Result, feature_flags, params}
};

use self::{
  backend::{FeatureHandle, FfxForwarder, NgxBackend, ParamValue, ParameterBag, SettleWait, SleepSettle, ViewFactory, VulkanDevices},
  policy::{Op, Policy, Request, Route, StructKind, find_in_chain, indirect_kind},
  quality::{QualityTable, jitter_offset, jitter_phase_count, preset_for_ratio, render_resolution},
  vulkan::ViewCache
};

const FIRST_CONTEXT_ID: usize = 0x1ee7;

pub const FRAME_GENERATION_VERSION_TAG: u64 = 0xF600_0000 << 32;
pub const UPSCALING_VERSION_TAG: u64 = 0xF5A5_CA1E << 32;

const DLSS_FEATURE_MARKERS: [&str; 3] = ["nvngx_dlss.dll", "nvngx_dlssd.dll", "nvngx_dlssg.dll"];

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum TranslateError {
  #[error("invalid descriptor")]
  Parameter,
  #[error("backend failure {0:#x}")]
  Runtime(NVSDK_NGX_Result),
  #[error("no such interface")]
  NoInterface,
  #[error("not found")]
  NotFound
}

impl From<TranslateError> for FfxReturnCode {
  fn from(value: TranslateError) -> Self {
    match value {
      TranslateError::Parameter => FfxReturnCode::PARAMETER,
      TranslateError::Runtime(_) => FfxReturnCode::RUNTIME_ERROR,
      TranslateError::NoInterface | TranslateError::NotFound => FfxReturnCode::ERROR
    }
  }
}

fn to_code(result: Result<(), TranslateError>) -> FfxReturnCode {
  match result {
    Ok(()) => FfxReturnCode::OK,
    Err(e) => {
      debug!("Translation failed: {}", e);
      e.into()
    }
  }
}

/// What one call may consult besides the translator itself.
pub struct Environment<'a> {
  pub config: &'a Config,
  pub shutting_down: bool,
  pub instance: vk::Instance,
  /// Directory of the host executable, root of the NGX search paths.
  pub exe_dir: Option<PathBuf>
}

impl Environment<'_> {
  fn policy(&self) -> Policy {
    Policy::from_config(self.config, self.shutting_down)
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InitParams {
  pub flags: u32,
  pub max_render_size: FfxApiDimensions2D,
  pub max_upscale_size: FfxApiDimensions2D
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeatureSize {
  pub render_width: u32,
  pub target_width: u32
}

/// Maps FFX upscale creation flags onto DLSS feature flags.
pub fn feature_create_flags(flags: u32) -> u32 {
  let mut out = feature_flags::NONE;
  if flags & FFX_UPSCALE_ENABLE_HIGH_DYNAMIC_RANGE != 0 {
    out |= feature_flags::IS_HDR;
  }
  if flags & FFX_UPSCALE_ENABLE_DEPTH_INVERTED != 0 {
    out |= feature_flags::DEPTH_INVERTED;
  }
  if flags & FFX_UPSCALE_ENABLE_AUTO_EXPOSURE != 0 {
    out |= feature_flags::AUTO_EXPOSURE;
  }
  if flags & FFX_UPSCALE_ENABLE_MOTION_VECTORS_JITTER_CANCELLATION != 0 {
    out |= feature_flags::MV_JITTERED;
  }
  if flags & FFX_UPSCALE_ENABLE_DISPLAY_RESOLUTION_MOTION_VECTORS == 0 {
    out |= feature_flags::MV_LOW_RES;
  }
  out
}

pub fn pack_version((major, minor, patch): (u32, u32, u32)) -> u64 {
  (((major << 22) | (minor << 12) | patch) & 0xFFFF_FFFF) as u64
}

pub struct ContextTranslator<B: NgxBackend, V: ViewFactory, F: FfxForwarder> {
  backend: B,
  views: V,
  forwarder: F,
  settle: Box<dyn SettleWait + Send>,

  devices: VulkanDevices,
  ngx_ready: bool,
  context_counter: usize,

  init_params: HashMap<usize, InitParams>,
  parameters: HashMap<usize, B::Params>,
  features: HashMap<usize, FeatureHandle>,
  recreate: HashSet<usize>,

  view_cache: ViewCache,
  current_feature: Option<(usize, FeatureSize)>,
  version_name: CString
}

impl<B: NgxBackend, V: ViewFactory, F: FfxForwarder> ContextTranslator<B, V, F> {
  pub fn new(backend: B, views: V, forwarder: F) -> Self {
    Self {
      backend,
      views,
      forwarder,
      settle: Box::new(SleepSettle),
      devices: VulkanDevices::default(),
      ngx_ready: false,
      context_counter: FIRST_CONTEXT_ID,
      init_params: HashMap::new(),
      parameters: HashMap::new(),
      features: HashMap::new(),
      recreate: HashSet::new(),
      view_cache: ViewCache::default(),
      current_feature: None,
      version_name: CString::default()
    }
  }

  pub fn with_settle(mut self, settle: Box<dyn SettleWait + Send>) -> Self {
    self.settle = settle;
    self
  }

  pub fn backend(&self) -> &B {
    &self.backend
  }

  pub fn views(&self) -> &V {
    &self.views
  }

  pub fn forwarder(&self) -> &F {
    &self.forwarder
  }

  pub fn is_tracked(&self, context: usize) -> bool {
    self.init_params.contains_key(&context) || self.parameters.contains_key(&context) || self.features.contains_key(&context)
  }

  pub fn has_feature(&self, context: usize) -> bool {
    self.features.contains_key(&context)
  }

  pub fn live_views(&self) -> usize {
    self.view_cache.len()
  }

  /// Arms Release -> settle -> Create for the next dispatch of `context`.
  pub fn request_feature_recreate(&mut self, context: usize) {
    if self.features.contains_key(&context) {
      info!("Feature recreate requested for {:#x}", context);
      self.recreate.insert(context);
    }
  }

  pub fn request_recreate_all(&mut self) {
    let contexts: Vec<usize> = self.features.keys().copied().collect();
    for context in contexts {
      self.request_feature_recreate(context);
    }
  }

  fn search_paths(env: &Environment) -> Vec<PathBuf> {
    let extra = env.config.dlss_feature_path.value().map(PathBuf::from);
    match env.exe_dir.as_deref() {
      Some(root) => crate::loader::search_paths_with_markers(root, &DLSS_FEATURE_MARKERS, extra),
      None => extra.into_iter().collect()
    }
  }

  /// # Safety
  /// `context`, `desc` and the descriptor chain must be valid as the FFX API defines them.
  pub unsafe fn create_context(
    &mut self,
    env: &Environment,
    context: *mut ffxContext,
    desc: *mut ffxCreateContextDescHeader,
    mem_cb: *const ffxAllocationCallbacks
  ) -> FfxReturnCode {
    if desc.is_null() || context.is_null() {
      return FfxReturnCode::PARAMETER;
    }

    let upscale = unsafe { find_in_chain(desc, FFX_API_CREATE_CONTEXT_DESC_TYPE_UPSCALE) }
      .map(|h| unsafe { &*(h as *const ffxCreateContextDescUpscale) });
    if let Some(backend) = unsafe { find_in_chain(desc, FFX_API_CREATE_CONTEXT_DESC_TYPE_BACKEND_VK) } {
      let backend = unsafe { &*(backend as *const ffxCreateBackendVKDesc) };
      self.devices = VulkanDevices {
        instance: env.instance,
        physical_device: backend.vkPhysicalDevice,
        device: backend.vkDevice,
        get_device_proc_addr: backend.vkDeviceProcAddr
      };
      self.views.bind_device(&self.devices);
    }

    let kind = if upscale.is_some() { StructKind::Upscaling } else { StructKind::of(unsafe { (*desc).type_ }) };
    let route = env.policy().route(Request::new(Op::Create, kind, unsafe { (*desc).type_ }, false));
    match route {
      Route::Forward => return unsafe { self.forwarder.create_context(context, desc, mem_cb) },
      Route::ForwardThenTranslate => {
        let result = unsafe { self.forwarder.create_context(context, desc, mem_cb) };
        debug!("Real create result: {} ({:#x})", result.name(), unsafe { *context } as usize);
        if !result.is_ok() && unsafe { *context }.is_null() {
          return result;
        }
      }
      Route::Reject => return FfxReturnCode::PARAMETER,
      Route::Ignore => return FfxReturnCode::OK,
      Route::Translate => {}
    }

    let Some(upscale) = upscale else {
      return FfxReturnCode::PARAMETER;
    };
    to_code(unsafe { self.register_context(env, context, upscale) })
  }

  unsafe fn register_context(
    &mut self,
    env: &Environment,
    context: *mut ffxContext,
    upscale: &ffxCreateContextDescUpscale
  ) -> Result<(), TranslateError> {
    if !self.ngx_ready {
      self.devices.instance = env.instance;
      let paths = Self::search_paths(env);
      info!("Initialising NGX with {} search paths", paths.len());
      self.backend.init(&self.devices, &paths).map_err(|result| {
        error!("NGX init failed: {:#x}", result);
        TranslateError::Runtime(result)
      })?;
      self.ngx_ready = true;
    }

    if !env.config.enable_hot_swapping.value_or_default() {
      self.context_counter += 1;
      unsafe { *context = self.context_counter as ffxContext };
      info!("Custom context index: {:#x}", self.context_counter);
    }

    let key = unsafe { *context } as usize;
    let parameters = self.backend.capability_parameters().map_err(|result| {
      error!("GetCapabilityParameters failed: {:#x}", result);
      TranslateError::Runtime(result)
    })?;

    self.parameters.insert(key, parameters);
    self.init_params.insert(
      key,
      InitParams {
        flags: upscale.flags,
        max_render_size: upscale.maxRenderSize,
        max_upscale_size: upscale.maxUpscaleSize
      }
    );
    info!(
      "Context created: {:#x}, max render {}x{}, max upscale {}x{}",
      key,
      upscale.maxRenderSize.width,
      upscale.maxRenderSize.height,
      upscale.maxUpscaleSize.width,
      upscale.maxUpscaleSize.height
    );
    Ok(())
  }

  /// # Safety
  /// See [`ContextTranslator::create_context`].
  pub unsafe fn destroy_context(
    &mut self,
    env: &Environment,
    context: *mut ffxContext,
    mem_cb: *const ffxAllocationCallbacks
  ) -> FfxReturnCode {
    if context.is_null() || unsafe { *context }.is_null() {
      return FfxReturnCode::OK;
    }

    let key = unsafe { *context } as usize;
    let known = self.is_tracked(key);
    if let Some(feature) = self.features.remove(&key) {
      let result = self.backend.release_feature(feature);
      debug!("Released feature of {:#x}: {:#x}", key, result);
    }
    self.parameters.remove(&key);
    self.init_params.remove(&key);
    self.recreate.remove(&key);
    if self.current_feature.is_some_and(|(owner, _)| owner == key) {
      self.current_feature = None;
    }

    match env.policy().route(Request::new(Op::Destroy, StructKind::Unknown, 0, known)) {
      Route::Translate | Route::Ignore | Route::Reject => FfxReturnCode::OK,
      Route::ForwardThenTranslate => {
        let result = unsafe { self.forwarder.destroy_context(context, mem_cb) };
        info!("Real destroy result: {}", result.name());
        FfxReturnCode::OK
      }
      Route::Forward => unsafe { self.forwarder.destroy_context(context, mem_cb) }
    }
  }

  /// # Safety
  /// See [`ContextTranslator::create_context`].
  pub unsafe fn configure(
    &mut self,
    env: &Environment,
    context: *mut ffxContext,
    desc: *const ffxConfigureDescHeader
  ) -> FfxReturnCode {
    if desc.is_null() {
      return FfxReturnCode::PARAMETER;
    }

    let desc_type = unsafe { (*desc).type_ };
    if desc_type == FFX_API_CONFIGURE_DESC_TYPE_UPSCALE_KEYVALUE {
      let kv = unsafe { &*(desc as *const ffxConfigureDescUpscaleKeyValue) };
      debug!("Configure key: {}, value: {}, ptr: {:p}", kv.key, kv.u64_, kv.ptr);
    }

    let known = !context.is_null() && self.is_tracked(unsafe { *context } as usize);
    match env.policy().route(Request::new(Op::Configure, StructKind::of(desc_type), desc_type, known)) {
      Route::Forward => unsafe { self.forwarder.configure(context, desc) },
      Route::Reject => FfxReturnCode::PARAMETER,
      _ => FfxReturnCode::OK
    }
  }

  /// # Safety
  /// See [`ContextTranslator::create_context`].
  pub unsafe fn query(&mut self, env: &Environment, context: *mut ffxContext, desc: *mut ffxQueryDescHeader) -> FfxReturnCode {
    if desc.is_null() {
      return FfxReturnCode::PARAMETER;
    }

    let desc_type = unsafe { (*desc).type_ };
    let kind = unsafe { indirect_kind(desc) };
    let known = !context.is_null() && self.has_feature(unsafe { *context } as usize);
    debug!("Query type: {:#x}, kind: {:?}", desc_type, kind);

    match env.policy().route(Request::new(Op::Query, kind, desc_type, known)) {
      Route::Forward => unsafe { self.forwarder.query(context, desc) },
      Route::Translate => to_code(unsafe { self.answer_query(env, desc, kind) }),
      Route::Reject => FfxReturnCode::PARAMETER,
      Route::Ignore | Route::ForwardThenTranslate => {
        debug!("Ignoring upscaler query {:#x}", desc_type);
        FfxReturnCode::OK
      }
    }
  }

  unsafe fn answer_query(
    &mut self,
    env: &Environment,
    desc: *mut ffxQueryDescHeader,
    kind: StructKind
  ) -> Result<(), TranslateError> {
    let table = QualityTable::from_config(env.config);

    match unsafe { (*desc).type_ } {
      FFX_API_QUERY_DESC_TYPE_UPSCALE_GETRENDERRESOLUTIONFROMQUALITYMODE => {
        let query = unsafe { &mut *(desc as *mut ffxQueryDescUpscaleGetRenderResolutionFromQualityMode) };
        let ratio = table.ratio(query.qualityMode).ok_or(TranslateError::Parameter)?;
        let (width, height) = render_resolution(query.displayWidth, query.displayHeight, ratio);
        if !query.pOutRenderWidth.is_null() {
          unsafe { *query.pOutRenderWidth = width };
        }
        if !query.pOutRenderHeight.is_null() {
          unsafe { *query.pOutRenderHeight = height };
        }
        if query.pOutRenderWidth.is_null() || query.pOutRenderHeight.is_null() {
          warn!("Quality mode: {}, an output pointer is null", query.qualityMode);
        } else {
          debug!("Quality mode: {}, render resolution: {}x{}", query.qualityMode, width, height);
        }
        Ok(())
      }

      FFX_API_QUERY_DESC_TYPE_UPSCALE_GETUPSCALERATIOFROMQUALITYMODE => {
        let query = unsafe { &mut *(desc as *mut ffxQueryDescUpscaleGetUpscaleRatioFromQualityMode) };
        let ratio = table.ratio(query.qualityMode).ok_or(TranslateError::Parameter)?;
        if query.pOutUpscaleRatio.is_null() {
          return Err(TranslateError::Parameter);
        }
        unsafe { *query.pOutUpscaleRatio = ratio };
        Ok(())
      }

      FFX_API_QUERY_DESC_TYPE_UPSCALE_GETJITTERPHASECOUNT => {
        let query = unsafe { &mut *(desc as *mut ffxQueryDescUpscaleGetJitterPhaseCount) };
        if let Some((_, size)) = self.current_feature {
          query.displayWidth = size.target_width;
          query.renderWidth = size.render_width;
        }
        let count = jitter_phase_count(query.renderWidth, query.displayWidth, env.config.jitter_phase_base.value())
          .ok_or(TranslateError::Parameter)?;
        if query.pOutPhaseCount.is_null() {
          return Err(TranslateError::Parameter);
        }
        unsafe { *query.pOutPhaseCount = count };
        debug!(
          "Render width: {}, display width: {}, jitter phase count: {}",
          query.renderWidth, query.displayWidth, count
        );
        Ok(())
      }

      FFX_API_QUERY_DESC_TYPE_UPSCALE_GETJITTEROFFSET => {
        let query = unsafe { &mut *(desc as *mut ffxQueryDescUpscaleGetJitterOffset) };
        let (x, y) = if query.pOutX.is_null() || query.pOutY.is_null() {
          (0.0, 0.0)
        } else {
          jitter_offset(query.index, query.phaseCount).unwrap_or((0.0, 0.0))
        };
        if !query.pOutX.is_null() {
          unsafe { *query.pOutX = x };
        }
        if !query.pOutY.is_null() {
          unsafe { *query.pOutY = y };
        }
        debug!("Jitter offset: ({}, {})", x, y);
        Ok(())
      }

      FFX_API_QUERY_DESC_TYPE_GET_PROVIDER_VERSION => {
        let query = unsafe { &mut *(desc as *mut ffxQueryGetProviderVersion) };
        let version = self.forwarder.version();
        let tag = match kind {
          StructKind::FrameGeneration | StructKind::SwapchainVulkan => FRAME_GENERATION_VERSION_TAG,
          StructKind::Upscaling => UPSCALING_VERSION_TAG,
          _ => 0
        };
        query.versionId = tag | pack_version(version);
        self.version_name = CString::new(format!("{}.{}.{}", version.0, version.1, version.2)).unwrap_or_default();
        query.versionName = self.version_name.as_ptr();
        Ok(())
      }

      other => {
        warn!("Unhandled query {:#x}", other);
        Err(TranslateError::Parameter)
      }
    }
  }

  /// # Safety
  /// See [`ContextTranslator::create_context`].
  pub unsafe fn dispatch(
    &mut self,
    env: &Environment,
    context: *mut ffxContext,
    desc: *const ffxDispatchDescHeader
  ) -> FfxReturnCode {
    if desc.is_null() || context.is_null() {
      return FfxReturnCode::PARAMETER;
    }

    let key = unsafe { *context } as usize;
    let desc_type = unsafe { (*desc).type_ };
    let policy = env.policy();
    let known = self.init_params.contains_key(&key);

    match policy.route(Request::new(Op::Dispatch, StructKind::of(desc_type), desc_type, known)) {
      Route::Forward => {
        if !known {
          debug!("Context {:#x} unknown, forwarding dispatch", key);
        }
        return unsafe { self.forwarder.dispatch(context, desc) };
      }
      Route::Reject => return FfxReturnCode::PARAMETER,
      Route::Ignore => return FfxReturnCode::OK,
      Route::Translate | Route::ForwardThenTranslate => {}
    }

    let mut upscale = None;
    for header in unsafe { policy::chain(desc) } {
      match unsafe { (*header).type_ } {
        FFX_API_DISPATCH_DESC_TYPE_UPSCALE => upscale = Some(header as *const ffxDispatchDescUpscale),
        FFX_API_DISPATCH_DESC_TYPE_UPSCALE_GENERATEREACTIVEMASK if !policy.hot_swap => {
          debug!("Skipping reactive mask generation");
          return FfxReturnCode::OK;
        }
        _ => {}
      }
    }

    let Some(upscale) = upscale.map(|d| unsafe { &*d }) else {
      info!("No upscale descriptor in chain, desc type: {:#x}", desc_type);
      return unsafe { self.forwarder.dispatch(context, desc) };
    };

    if upscale.commandList.is_null() {
      error!("Dispatch without a command list");
      return unsafe { self.forwarder.dispatch(context, desc) };
    }

    to_code(self.evaluate(env, key, upscale))
  }

  fn evaluate(&mut self, env: &Environment, key: usize, desc: &ffxDispatchDescUpscale) -> Result<(), TranslateError> {
    let command_buffer = <vk::CommandBuffer as vk::Handle>::from_raw(desc.commandList as u64);

    if self.recreate.remove(&key)
      && let Some(feature) = self.features.remove(&key)
    {
      info!("Recreating feature of {:#x}", key);
      self.backend.release_feature(feature);
      self.settle.wait(env.config.feature_settle_time());
    }

    if !self.features.contains_key(&key) {
      self.create_feature(key, command_buffer, desc)?;
    }

    let (Some(feature), Some(bag)) = (self.features.get(&key).copied(), self.parameters.get_mut(&key)) else {
      return Err(TranslateError::Runtime(0));
    };

    bag.set(params::JITTER_OFFSET_X, ParamValue::F32(desc.jitterOffset.x));
    bag.set(params::JITTER_OFFSET_Y, ParamValue::F32(desc.jitterOffset.y));
    bag.set(params::MV_SCALE_X, ParamValue::F32(desc.motionVectorScale.x));
    bag.set(params::MV_SCALE_Y, ParamValue::F32(desc.motionVectorScale.y));
    bag.set(params::DLSS_EXPOSURE_SCALE, ParamValue::F64(1.0));
    bag.set(params::DLSS_PRE_EXPOSURE, ParamValue::F32(desc.preExposure));
    bag.set(params::RESET, ParamValue::I32(desc.reset as i32));
    bag.set(params::WIDTH, ParamValue::U32(desc.renderSize.width));
    bag.set(params::HEIGHT, ParamValue::U32(desc.renderSize.height));
    bag.set(params::DLSS_RENDER_SUBRECT_WIDTH, ParamValue::U32(desc.renderSize.width));
    bag.set(params::DLSS_RENDER_SUBRECT_HEIGHT, ParamValue::U32(desc.renderSize.height));

    self.view_cache.clear(&mut self.views);

    let bindings: [(&FfxApiResource, &str, &str); 8] = [
      (&desc.depth, params::DEPTH, "Depth"),
      (&desc.exposure, params::EXPOSURE_TEXTURE, ""),
      (&desc.reactive, params::DLSS_INPUT_BIAS_COLOR_MASK, ""),
      (&desc.color, params::COLOR, "Color"),
      (&desc.motionVectors, params::MOTION_VECTORS, "Motion Vectors"),
      (&desc.output, params::OUTPUT, "Output"),
      (&desc.transparencyAndComposition, params::FSR_TRANSPARENCY, ""),
      (&desc.reactive, params::FSR_REACTIVE, "")
    ];

    for (resource, key_name, mandatory) in bindings {
      match self.view_cache.bind(&mut self.views, resource) {
        Some(bound) => bag.set(key_name, ParamValue::Resource(bound)),
        None if !mandatory.is_empty() => {
          error!("{} error!", mandatory);
          return Err(TranslateError::Runtime(0));
        }
        None => {}
      }
    }

    bag.set(params::FSR_CAMERA_NEAR, ParamValue::F32(desc.cameraNear));
    bag.set(params::FSR_CAMERA_FAR, ParamValue::F32(desc.cameraFar));
    bag.set(params::FSR_CAMERA_FOV, ParamValue::F32(desc.cameraFovAngleVertical));
    bag.set(params::FSR_FRAME_TIME_DELTA, ParamValue::F32(desc.frameTimeDelta));
    bag.set(params::FSR_VIEW_TO_METERS, ParamValue::F32(desc.viewSpaceToMetersFactor));
    bag.set(params::SHARPNESS, ParamValue::F32(desc.sharpness));

    debug!(
      "Evaluating {:#x}, render size {}x{}",
      key, desc.renderSize.width, desc.renderSize.height
    );
    let result = self.backend.evaluate_feature(command_buffer, feature, bag);
    if result == NVSDK_NGX_RESULT_SUCCESS {
      Ok(())
    } else {
      error!("EvaluateFeature failed: {:#x}", result);
      Err(TranslateError::Runtime(result))
    }
  }

  fn create_feature(
    &mut self,
    key: usize,
    command_buffer: vk::CommandBuffer,
    desc: &ffxDispatchDescUpscale
  ) -> Result<(), TranslateError> {
    let (Some(init), Some(bag)) = (self.init_params.get(&key).copied(), self.parameters.get_mut(&key)) else {
      return Err(TranslateError::Runtime(0));
    };

    bag.set(params::DLSS_FEATURE_CREATE_FLAGS, ParamValue::U32(feature_create_flags(init.flags)));
    bag.set(params::WIDTH, ParamValue::U32(desc.renderSize.width));
    bag.set(params::HEIGHT, ParamValue::U32(desc.renderSize.height));
    bag.set(params::OUT_WIDTH, ParamValue::U32(init.max_upscale_size.width));
    bag.set(params::OUT_HEIGHT, ParamValue::U32(init.max_upscale_size.height));
    bag.set(params::FSR_UPSCALE_WIDTH, ParamValue::U32(desc.upscaleSize.width));
    bag.set(params::FSR_UPSCALE_HEIGHT, ParamValue::U32(desc.upscaleSize.height));

    let target_width = if desc.upscaleSize.width > 0 { desc.upscaleSize.width } else { init.max_upscale_size.width };
    let ratio = target_width as f32 / desc.renderSize.width as f32;
    let preset = preset_for_ratio(ratio);
    info!(
      "Render width: {}, target width: {}, ratio: {}, preset: {:?}",
      desc.renderSize.width, target_width, ratio, preset
    );
    bag.set(params::PERF_QUALITY_VALUE, ParamValue::I32(preset as i32));

    let feature = self.backend.create_feature(command_buffer, bag).map_err(|result| {
      error!("CreateFeature failed: {:#x}", result);
      TranslateError::Runtime(result)
    })?;

    self.features.insert(key, feature);
    self.current_feature = Some((
      key,
      FeatureSize {
        render_width: desc.renderSize.width,
        target_width
      }
    ));
    info!("Feature created for {:#x}", key);
    Ok(())
  }
}

/// The FFX entry points as the exports see them.
pub trait FfxSurface: Send {
  /// # Safety
  /// Pointers must be valid as the FFX API defines them.
  unsafe fn create_context(
    &mut self,
    env: &Environment,
    context: *mut ffxContext,
    desc: *mut ffxCreateContextDescHeader,
    mem_cb: *const ffxAllocationCallbacks
  ) -> FfxReturnCode;
  /// # Safety
  /// See [`FfxSurface::create_context`].
  unsafe fn destroy_context(
    &mut self,
    env: &Environment,
    context: *mut ffxContext,
    mem_cb: *const ffxAllocationCallbacks
  ) -> FfxReturnCode;
  /// # Safety
  /// See [`FfxSurface::create_context`].
  unsafe fn configure(&mut self, env: &Environment, context: *mut ffxContext, desc: *const ffxConfigureDescHeader) -> FfxReturnCode;
  /// # Safety
  /// See [`FfxSurface::create_context`].
  unsafe fn query(&mut self, env: &Environment, context: *mut ffxContext, desc: *mut ffxQueryDescHeader) -> FfxReturnCode;
  /// # Safety
  /// See [`FfxSurface::create_context`].
  unsafe fn dispatch(&mut self, env: &Environment, context: *mut ffxContext, desc: *const ffxDispatchDescHeader) -> FfxReturnCode;
  fn request_recreate_all(&mut self);
}

impl<B, V, F> FfxSurface for ContextTranslator<B, V, F>
where
  B: NgxBackend + Send,
  B::Params: Send,
  V: ViewFactory + Send,
  F: FfxForwarder + Send
{
  unsafe fn create_context(
    &mut self,
    env: &Environment,
    context: *mut ffxContext,
    desc: *mut ffxCreateContextDescHeader,
    mem_cb: *const ffxAllocationCallbacks
  ) -> FfxReturnCode {
    unsafe { ContextTranslator::create_context(self, env, context, desc, mem_cb) }
  }

  unsafe fn destroy_context(
    &mut self,
    env: &Environment,
    context: *mut ffxContext,
    mem_cb: *const ffxAllocationCallbacks
  ) -> FfxReturnCode {
    unsafe { ContextTranslator::destroy_context(self, env, context, mem_cb) }
  }

  unsafe fn configure(&mut self, env: &Environment, context: *mut ffxContext, desc: *const ffxConfigureDescHeader) -> FfxReturnCode {
    unsafe { ContextTranslator::configure(self, env, context, desc) }
  }

  unsafe fn query(&mut self, env: &Environment, context: *mut ffxContext, desc: *mut ffxQueryDescHeader) -> FfxReturnCode {
    unsafe { ContextTranslator::query(self, env, context, desc) }
  }

  unsafe fn dispatch(&mut self, env: &Environment, context: *mut ffxContext, desc: *const ffxDispatchDescHeader) -> FfxReturnCode {
    unsafe { ContextTranslator::dispatch(self, env, context, desc) }
  }

  fn request_recreate_all(&mut self) {
    ContextTranslator::request_recreate_all(self);
  }
}

#[cfg(test)]
mod tests;
