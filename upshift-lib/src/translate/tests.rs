use std::{
  cell::RefCell,
  ffi::{CStr, c_void},
  ptr,
  sync::{Arc, Mutex},
  time::Duration
};

use ash::vk::{self, Handle};
use upshift_common::{Config, ffx::*, ngx::*};

use super::{
  backend::*,
  vulkan::tests::FakeViews,
  *
};

#[derive(Default)]
struct FakeParams {
  values: Vec<(String, ParamValue)>
}

impl FakeParams {
  fn get(&self, key: &str) -> Option<ParamValue> {
    self.values.iter().rev().find(|(k, _)| k == key).map(|(_, v)| *v)
  }
}

impl ParameterBag for FakeParams {
  fn set(&mut self, key: &str, value: ParamValue) {
    self.values.push((key.to_string(), value));
  }
}

#[derive(Default)]
struct FakeBackend {
  inits: usize,
  fail_init: bool,
  next_feature: usize,
  created: Vec<Vec<(String, ParamValue)>>,
  evaluated: Vec<(FeatureHandle, Vec<(String, ParamValue)>)>,
  released: Vec<FeatureHandle>,
  evaluate_result: Option<NVSDK_NGX_Result>
}

impl NgxBackend for FakeBackend {
  type Params = FakeParams;

  fn init(&mut self, _devices: &VulkanDevices, _search_paths: &[PathBuf]) -> Result<(), NVSDK_NGX_Result> {
    self.inits += 1;
    if self.fail_init { Err(NVSDK_NGX_RESULT_FAIL) } else { Ok(()) }
  }

  fn capability_parameters(&mut self) -> Result<FakeParams, NVSDK_NGX_Result> {
    Ok(FakeParams::default())
  }

  fn create_feature(
    &mut self,
    _command_buffer: vk::CommandBuffer,
    params: &mut FakeParams
  ) -> Result<FeatureHandle, NVSDK_NGX_Result> {
    self.next_feature += 1;
    self.created.push(params.values.clone());
    Ok(FeatureHandle((0x5000 + self.next_feature) as *mut NVSDK_NGX_Handle))
  }

  fn evaluate_feature(
    &mut self,
    _command_buffer: vk::CommandBuffer,
    feature: FeatureHandle,
    params: &FakeParams
  ) -> NVSDK_NGX_Result {
    self.evaluated.push((feature, params.values.clone()));
    self.evaluate_result.unwrap_or(NVSDK_NGX_RESULT_SUCCESS)
  }

  fn release_feature(&mut self, feature: FeatureHandle) -> NVSDK_NGX_Result {
    self.released.push(feature);
    NVSDK_NGX_RESULT_SUCCESS
  }
}

const REAL_CONTEXT: usize = 0xF00D;

#[derive(Default)]
struct FakeForwarder {
  calls: RefCell<Vec<&'static str>>
}

impl FakeForwarder {
  fn calls(&self) -> Vec<&'static str> {
    self.calls.borrow().clone()
  }
}

impl FfxForwarder for FakeForwarder {
  unsafe fn create_context(
    &self,
    context: *mut ffxContext,
    _desc: *mut ffxCreateContextDescHeader,
    _mem_cb: *const ffxAllocationCallbacks
  ) -> FfxReturnCode {
    self.calls.borrow_mut().push("create");
    unsafe { *context = REAL_CONTEXT as ffxContext };
    FfxReturnCode::OK
  }

  unsafe fn destroy_context(&self, _context: *mut ffxContext, _mem_cb: *const ffxAllocationCallbacks) -> FfxReturnCode {
    self.calls.borrow_mut().push("destroy");
    FfxReturnCode::OK
  }

  unsafe fn configure(&self, _context: *mut ffxContext, _desc: *const ffxConfigureDescHeader) -> FfxReturnCode {
    self.calls.borrow_mut().push("configure");
    FfxReturnCode::OK
  }

  unsafe fn query(&self, _context: *mut ffxContext, _desc: *mut ffxQueryDescHeader) -> FfxReturnCode {
    self.calls.borrow_mut().push("query");
    FfxReturnCode::OK
  }

  unsafe fn dispatch(&self, _context: *mut ffxContext, _desc: *const ffxDispatchDescHeader) -> FfxReturnCode {
    self.calls.borrow_mut().push("dispatch");
    FfxReturnCode::OK
  }

  fn version(&self) -> (u32, u32, u32) {
    (1, 1, 4)
  }
}

#[derive(Clone, Default)]
struct RecordingSettle(Arc<Mutex<Vec<Duration>>>);

impl SettleWait for RecordingSettle {
  fn wait(&self, settle: Duration) {
    self.0.lock().unwrap().push(settle);
  }
}

type Translator = ContextTranslator<FakeBackend, FakeViews, FakeForwarder>;

fn translator() -> (Translator, RecordingSettle) {
  let settle = RecordingSettle::default();
  let translator = ContextTranslator::new(FakeBackend::default(), FakeViews::default(), FakeForwarder::default())
    .with_settle(Box::new(settle.clone()));
  (translator, settle)
}

fn env(config: &Config) -> Environment<'_> {
  Environment {
    config,
    shutting_down: false,
    instance: vk::Instance::null(),
    exe_dir: None
  }
}

fn hot_swap() -> Config {
  let mut config = Config::default();
  config.enable_hot_swapping.set(true);
  config
}

fn header(type_: ffxStructType_t) -> ffxApiHeader {
  ffxApiHeader {
    type_,
    pNext: ptr::null_mut()
  }
}

fn upscale_create(flags: u32) -> ffxCreateContextDescUpscale {
  ffxCreateContextDescUpscale {
    header: header(FFX_API_CREATE_CONTEXT_DESC_TYPE_UPSCALE),
    flags,
    maxRenderSize: FfxApiDimensions2D {
      width: 1920,
      height: 1080
    },
    maxUpscaleSize: FfxApiDimensions2D {
      width: 3840,
      height: 2160
    },
    fpMessage: None
  }
}

fn vk_backend() -> ffxCreateBackendVKDesc {
  ffxCreateBackendVKDesc {
    header: header(FFX_API_CREATE_CONTEXT_DESC_TYPE_BACKEND_VK),
    vkDevice: vk::Device::from_raw(0xD0),
    vkPhysicalDevice: vk::PhysicalDevice::from_raw(0xD1),
    vkDeviceProcAddr: None
  }
}

fn resource(handle: usize) -> FfxApiResource {
  FfxApiResource {
    resource: handle as *mut c_void,
    description: FfxApiResourceDescription {
      format: surface_format::R16G16B16A16_FLOAT,
      width: 1920,
      height: 1080,
      ..Default::default()
    },
    state: 0
  }
}

fn upscale_dispatch() -> ffxDispatchDescUpscale {
  ffxDispatchDescUpscale {
    header: header(FFX_API_DISPATCH_DESC_TYPE_UPSCALE),
    commandList: 0xC0 as *mut c_void,
    color: resource(0x100),
    depth: resource(0x200),
    motionVectors: resource(0x300),
    exposure: FfxApiResource::default(),
    reactive: FfxApiResource::default(),
    transparencyAndComposition: FfxApiResource::default(),
    output: resource(0x400),
    jitterOffset: FfxApiFloatCoords2D { x: 0.25, y: -0.25 },
    motionVectorScale: FfxApiFloatCoords2D { x: 1920.0, y: 1080.0 },
    renderSize: FfxApiDimensions2D {
      width: 1920,
      height: 1080
    },
    upscaleSize: FfxApiDimensions2D {
      width: 3840,
      height: 2160
    },
    enableSharpening: false,
    sharpness: 0.3,
    frameTimeDelta: 16.6,
    preExposure: 1.0,
    reset: true,
    cameraNear: 0.1,
    cameraFar: 1000.0,
    cameraFovAngleVertical: 1.2,
    viewSpaceToMetersFactor: 1.0,
    flags: 0
  }
}

fn create(translator: &mut Translator, config: &Config) -> (FfxReturnCode, ffxContext) {
  let mut backend = vk_backend();
  let mut desc = upscale_create(FFX_UPSCALE_ENABLE_HIGH_DYNAMIC_RANGE);
  desc.header.pNext = &mut backend.header;
  let mut context: ffxContext = ptr::null_mut();
  let result = unsafe { translator.create_context(&env(config), &mut context, &mut desc.header, ptr::null()) };
  (result, context)
}

fn dispatch(translator: &mut Translator, config: &Config, context: ffxContext, desc: &ffxDispatchDescUpscale) -> FfxReturnCode {
  let mut context = context;
  unsafe { translator.dispatch(&env(config), &mut context, &desc.header) }
}

fn param(values: &[(String, ParamValue)], key: &str) -> Option<ParamValue> {
  values.iter().rev().find(|(k, _)| k == key).map(|(_, v)| *v)
}

#[test]
fn create_then_destroy_leaves_no_residue() {
  let config = Config::default();
  let (mut translator, _) = translator();

  let (result, context) = create(&mut translator, &config);
  assert_eq!(result, FfxReturnCode::OK);
  assert_eq!(context as usize, FIRST_CONTEXT_ID + 1);
  assert!(translator.is_tracked(context as usize));
  assert_eq!(translator.views().bound_devices, vec![vk::Device::from_raw(0xD0)]);

  let mut handle = context;
  let result = unsafe { translator.destroy_context(&env(&config), &mut handle, ptr::null()) };
  assert_eq!(result, FfxReturnCode::OK);
  assert!(!translator.is_tracked(context as usize));
  assert!(translator.backend().released.is_empty());
  assert!(translator.forwarder().calls().is_empty());
}

#[test]
fn context_ids_increase_and_ngx_initialises_once() {
  let config = Config::default();
  let (mut translator, _) = translator();

  let (_, first) = create(&mut translator, &config);
  let (_, second) = create(&mut translator, &config);
  assert_eq!(second as usize, first as usize + 1);
  assert_eq!(translator.backend().inits, 1);
}

#[test]
fn failed_ngx_init_is_a_runtime_error() {
  let config = Config::default();
  let (mut translator, _) = translator();
  translator.backend.fail_init = true;

  let (result, context) = create(&mut translator, &config);
  assert_eq!(result, FfxReturnCode::RUNTIME_ERROR);
  assert!(context.is_null());
}

#[test]
fn hot_swap_create_keeps_the_real_context() {
  let config = hot_swap();
  let (mut translator, _) = translator();

  let (result, context) = create(&mut translator, &config);
  assert_eq!(result, FfxReturnCode::OK);
  assert_eq!(context as usize, REAL_CONTEXT);
  assert!(translator.is_tracked(REAL_CONTEXT));
  assert_eq!(translator.forwarder().calls(), vec!["create"]);
}

#[test]
fn non_upscale_create_is_forwarded() {
  let config = Config::default();
  let (mut translator, _) = translator();
  let mut fg = header(FFX_API_EFFECT_ID_FRAMEGENERATION);
  let mut context: ffxContext = ptr::null_mut();

  let result = unsafe { translator.create_context(&env(&config), &mut context, &mut fg, ptr::null()) };
  assert_eq!(result, FfxReturnCode::OK);
  assert_eq!(context as usize, REAL_CONTEXT);
  assert!(!translator.is_tracked(REAL_CONTEXT));
}

#[test]
fn first_dispatch_creates_and_evaluates_the_feature() {
  let config = Config::default();
  let (mut translator, _) = translator();
  let (_, context) = create(&mut translator, &config);

  let result = dispatch(&mut translator, &config, context, &upscale_dispatch());
  assert_eq!(result, FfxReturnCode::OK);

  let backend = translator.backend();
  assert_eq!(backend.created.len(), 1);
  assert_eq!(backend.evaluated.len(), 1);
  let created = &backend.created[0];
  assert_eq!(param(created, params::PERF_QUALITY_VALUE), Some(ParamValue::I32(PerfQuality::MaxPerf as i32)));
  assert_eq!(param(created, params::WIDTH), Some(ParamValue::U32(1920)));
  assert_eq!(param(created, params::OUT_WIDTH), Some(ParamValue::U32(3840)));
  assert_eq!(
    param(created, params::DLSS_FEATURE_CREATE_FLAGS),
    Some(ParamValue::U32(feature_flags::IS_HDR | feature_flags::MV_LOW_RES))
  );

  let (_, evaluated) = &backend.evaluated[0];
  assert_eq!(param(evaluated, params::RESET), Some(ParamValue::I32(1)));
  assert_eq!(param(evaluated, params::DLSS_EXPOSURE_SCALE), Some(ParamValue::F64(1.0)));
  assert_eq!(param(evaluated, params::JITTER_OFFSET_X), Some(ParamValue::F32(0.25)));
  assert_eq!(param(evaluated, params::DLSS_RENDER_SUBRECT_HEIGHT), Some(ParamValue::U32(1080)));
  assert!(param(evaluated, params::EXPOSURE_TEXTURE).is_none());
  assert!(matches!(param(evaluated, params::OUTPUT), Some(ParamValue::Resource(_))));
  assert_eq!(translator.live_views(), 4);
}

#[test]
fn views_of_the_previous_dispatch_are_destroyed() {
  let config = Config::default();
  let (mut translator, _) = translator();
  let (_, context) = create(&mut translator, &config);

  dispatch(&mut translator, &config, context, &upscale_dispatch());
  let first_views = translator.views().created.clone();
  dispatch(&mut translator, &config, context, &upscale_dispatch());

  assert_eq!(translator.views().destroyed, first_views);
  assert_eq!(translator.backend().created.len(), 1);
  assert_eq!(translator.backend().evaluated.len(), 2);
  assert_eq!(translator.live_views(), 4);
}

#[test]
fn missing_color_fails_without_evaluating() {
  let config = Config::default();
  let (mut translator, _) = translator();
  let (_, context) = create(&mut translator, &config);
  let mut desc = upscale_dispatch();
  desc.color = FfxApiResource::default();

  let result = dispatch(&mut translator, &config, context, &desc);
  assert_eq!(result, FfxReturnCode::RUNTIME_ERROR);
  assert!(translator.backend().evaluated.is_empty());
}

#[test]
fn failed_evaluation_is_a_runtime_error() {
  let config = Config::default();
  let (mut translator, _) = translator();
  translator.backend.evaluate_result = Some(NVSDK_NGX_RESULT_FAIL);
  let (_, context) = create(&mut translator, &config);

  let result = dispatch(&mut translator, &config, context, &upscale_dispatch());
  assert_eq!(result, FfxReturnCode::RUNTIME_ERROR);
}

#[test]
fn reactive_mask_generation_is_skipped() {
  let config = Config::default();
  let (mut translator, _) = translator();
  let (_, context) = create(&mut translator, &config);
  let mut mask = header(FFX_API_DISPATCH_DESC_TYPE_UPSCALE_GENERATEREACTIVEMASK);
  let mut desc = upscale_dispatch();
  desc.header.pNext = &mut mask;

  let result = dispatch(&mut translator, &config, context, &desc);
  assert_eq!(result, FfxReturnCode::OK);
  assert!(translator.backend().created.is_empty());
  assert!(translator.backend().evaluated.is_empty());
  assert!(translator.forwarder().calls().is_empty());
}

#[test]
fn unknown_context_dispatch_is_forwarded() {
  let config = Config::default();
  let (mut translator, _) = translator();

  let result = dispatch(&mut translator, &config, 0x4242 as ffxContext, &upscale_dispatch());
  assert_eq!(result, FfxReturnCode::OK);
  assert_eq!(translator.forwarder().calls(), vec!["dispatch"]);
  assert!(translator.backend().evaluated.is_empty());
}

#[test]
fn recreate_releases_waits_then_creates() {
  let mut config = Config::default();
  config.feature_settle_ms.set(250);
  let (mut translator, settle) = translator();
  let (_, context) = create(&mut translator, &config);
  dispatch(&mut translator, &config, context, &upscale_dispatch());

  translator.request_recreate_all();
  let result = dispatch(&mut translator, &config, context, &upscale_dispatch());
  assert_eq!(result, FfxReturnCode::OK);

  let backend = translator.backend();
  assert_eq!(backend.released.len(), 1);
  assert_eq!(backend.created.len(), 2);
  assert_eq!(backend.evaluated.len(), 2);
  assert_ne!(backend.evaluated[0].0, backend.evaluated[1].0);
  assert_eq!(*settle.0.lock().unwrap(), vec![Duration::from_millis(250)]);
}

#[test]
fn destroy_releases_the_feature() {
  let config = Config::default();
  let (mut translator, _) = translator();
  let (_, context) = create(&mut translator, &config);
  dispatch(&mut translator, &config, context, &upscale_dispatch());

  let mut handle = context;
  unsafe { translator.destroy_context(&env(&config), &mut handle, ptr::null()) };
  assert_eq!(translator.backend().released.len(), 1);
  assert!(!translator.has_feature(context as usize));
}

#[test]
fn render_resolution_query_is_answered_locally() {
  let config = Config::default();
  let (mut translator, _) = translator();
  let (mut width, mut height) = (0u32, 0u32);
  let mut query = ffxQueryDescUpscaleGetRenderResolutionFromQualityMode {
    header: header(FFX_API_QUERY_DESC_TYPE_UPSCALE_GETRENDERRESOLUTIONFROMQUALITYMODE),
    displayWidth: 3840,
    displayHeight: 2160,
    qualityMode: FFX_UPSCALE_QUALITY_MODE_BALANCED,
    pOutRenderWidth: &mut width,
    pOutRenderHeight: &mut height
  };

  let result = unsafe { translator.query(&env(&config), ptr::null_mut(), &mut query.header) };
  assert_eq!(result, FfxReturnCode::OK);
  assert_eq!((width, height), (2258, 1270));

  query.qualityMode = 9;
  let result = unsafe { translator.query(&env(&config), ptr::null_mut(), &mut query.header) };
  assert_eq!(result, FfxReturnCode::PARAMETER);
  assert!(translator.forwarder().calls().is_empty());
}

#[test]
fn phase_count_follows_the_live_feature() {
  let config = Config::default();
  let (mut translator, _) = translator();
  let (_, context) = create(&mut translator, &config);
  dispatch(&mut translator, &config, context, &upscale_dispatch());

  let mut count = 0i32;
  let mut query = ffxQueryDescUpscaleGetJitterPhaseCount {
    header: header(FFX_API_QUERY_DESC_TYPE_UPSCALE_GETJITTERPHASECOUNT),
    renderWidth: 100,
    displayWidth: 100,
    pOutPhaseCount: &mut count
  };
  let result = unsafe { translator.query(&env(&config), ptr::null_mut(), &mut query.header) };
  assert_eq!(result, FfxReturnCode::OK);
  assert_eq!(count, 32);
}

#[test]
fn provider_version_carries_the_effect_tag() {
  let config = Config::default();
  let (mut translator, _) = translator();

  for (effect, tag) in [
    (FFX_API_QUERY_DESC_TYPE_UPSCALE_GETJITTEROFFSET, UPSCALING_VERSION_TAG),
    (FFX_API_EFFECT_ID_FRAMEGENERATION | 5, FRAME_GENERATION_VERSION_TAG)
  ] {
    let mut effect = header(effect);
    let mut query = ffxQueryGetProviderVersion {
      header: header(FFX_API_QUERY_DESC_TYPE_GET_PROVIDER_VERSION),
      versionId: 0,
      versionName: ptr::null()
    };
    query.header.pNext = &mut effect;

    let result = unsafe { translator.query(&env(&config), ptr::null_mut(), &mut query.header) };
    assert_eq!(result, FfxReturnCode::OK);
    assert_eq!(query.versionId, tag | pack_version((1, 1, 4)));
    assert_eq!(unsafe { CStr::from_ptr(query.versionName) }.to_str().unwrap(), "1.1.4");
  }
}

#[test]
fn configure_forwards_only_with_hot_swap() {
  let (mut translator, _) = translator();
  let kv = ffxConfigureDescUpscaleKeyValue {
    header: header(FFX_API_CONFIGURE_DESC_TYPE_UPSCALE_KEYVALUE),
    key: 0,
    u64_: 1,
    ptr: ptr::null_mut()
  };

  let result = unsafe { translator.configure(&env(&Config::default()), ptr::null_mut(), &kv.header) };
  assert_eq!(result, FfxReturnCode::OK);
  assert!(translator.forwarder().calls().is_empty());

  unsafe { translator.configure(&env(&hot_swap()), ptr::null_mut(), &kv.header) };
  assert_eq!(translator.forwarder().calls(), vec!["configure"]);
}

#[test]
fn create_flags_translate_bit_by_bit() {
  assert_eq!(feature_create_flags(0), feature_flags::MV_LOW_RES);
  assert_eq!(
    feature_create_flags(
      FFX_UPSCALE_ENABLE_DEPTH_INVERTED
        | FFX_UPSCALE_ENABLE_AUTO_EXPOSURE
        | FFX_UPSCALE_ENABLE_MOTION_VECTORS_JITTER_CANCELLATION
        | FFX_UPSCALE_ENABLE_DISPLAY_RESOLUTION_MOTION_VECTORS
    ),
    feature_flags::DEPTH_INVERTED | feature_flags::AUTO_EXPOSURE | feature_flags::MV_JITTERED
  );
}
