use std::{collections::HashMap, ffi::c_void, ptr};

use ash::vk::{self, Handle};
use log::{error, warn};
use upshift_common::{
  ffx::{FFX_API_RESOURCE_USAGE_DEPTHTARGET, FFX_API_RESOURCE_USAGE_STENCILTARGET, FFX_API_RESOURCE_USAGE_UAV, FfxApiResource, surface_format as sf},
  ngx::{NVSDK_NGX_ImageViewInfo_VK, NVSDK_NGX_Resource_VK}
};

use super::backend::{VulkanDevices, ViewFactory};

pub fn vk_format(format: u32) -> vk::Format {
  match format {
    sf::R32G32B32A32_FLOAT => vk::Format::R32G32B32A32_SFLOAT,
    sf::R32G32B32_FLOAT => vk::Format::R32G32B32_SFLOAT,
    sf::R32G32_FLOAT => vk::Format::R32G32_SFLOAT,
    sf::R32_FLOAT => vk::Format::R32_SFLOAT,

    sf::R32G32B32A32_UINT => vk::Format::R32G32B32A32_UINT,
    sf::R32_UINT => vk::Format::R32_UINT,

    sf::R16G16B16A16_FLOAT => vk::Format::R16G16B16A16_SFLOAT,
    sf::R16G16_FLOAT => vk::Format::R16G16_SFLOAT,
    sf::R16_FLOAT => vk::Format::R16_SFLOAT,

    sf::R16G16_UINT => vk::Format::R16G16_UINT,
    sf::R16_UINT => vk::Format::R16_UINT,
    sf::R16G16_SINT => vk::Format::R16G16_SINT,
    sf::R16_UNORM => vk::Format::R16_UNORM,
    sf::R16_SNORM => vk::Format::R16_SNORM,

    sf::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
    sf::R8G8B8A8_SNORM => vk::Format::R8G8B8A8_SNORM,
    sf::R8G8B8A8_SRGB => vk::Format::R8G8B8A8_SRGB,
    sf::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
    sf::B8G8R8A8_SRGB => vk::Format::B8G8R8A8_SRGB,
    sf::R8G8_UNORM => vk::Format::R8G8_UNORM,
    sf::R8G8_UINT => vk::Format::R8G8_UINT,
    sf::R8_UNORM => vk::Format::R8_UNORM,
    sf::R8_UINT => vk::Format::R8_UINT,

    sf::R11G11B10_FLOAT => vk::Format::B10G11R11_UFLOAT_PACK32,
    sf::R10G10B10A2_UNORM => vk::Format::A2B10G10R10_UNORM_PACK32,
    sf::R9G9B9E5_SHAREDEXP => vk::Format::E5B9G9R9_UFLOAT_PACK32,

    sf::R32G32B32A32_TYPELESS => vk::Format::R32G32B32A32_SFLOAT,
    sf::R16G16B16A16_TYPELESS => vk::Format::R16G16B16A16_SFLOAT,
    sf::R32G32_TYPELESS => vk::Format::R32G32_SFLOAT,
    sf::R10G10B10A2_TYPELESS => vk::Format::A2B10G10R10_UNORM_PACK32,
    sf::R8G8B8A8_TYPELESS => vk::Format::R8G8B8A8_UNORM,
    sf::B8G8R8A8_TYPELESS => vk::Format::B8G8R8A8_UNORM,
    sf::R16G16_TYPELESS => vk::Format::R16G16_SFLOAT,
    sf::R32_TYPELESS => vk::Format::R32_SFLOAT,
    sf::R16_TYPELESS => vk::Format::R16_SFLOAT,
    sf::R8G8_TYPELESS => vk::Format::R8G8_UNORM,
    sf::R8_TYPELESS => vk::Format::R8_UNORM,

    _ => {
      warn!("Unknown FFX API surface format: {}", format);
      vk::Format::UNDEFINED
    }
  }
}

pub fn aspect_for_usage(usage: u32) -> vk::ImageAspectFlags {
  if usage & FFX_API_RESOURCE_USAGE_DEPTHTARGET != 0 {
    vk::ImageAspectFlags::DEPTH
  } else if usage & FFX_API_RESOURCE_USAGE_STENCILTARGET != 0 {
    vk::ImageAspectFlags::STENCIL
  } else {
    vk::ImageAspectFlags::COLOR
  }
}

pub fn view_create_info(resource: &FfxApiResource) -> vk::ImageViewCreateInfo<'static> {
  vk::ImageViewCreateInfo::default()
    .image(vk::Image::from_raw(resource.resource as u64))
    .view_type(vk::ImageViewType::TYPE_2D)
    .format(vk_format(resource.description.format))
    .components(vk::ComponentMapping::default())
    .subresource_range(vk::ImageSubresourceRange {
      aspect_mask: aspect_for_usage(resource.description.usage),
      base_mip_level: 0,
      level_count: 1,
      base_array_layer: 0,
      layer_count: 1
    })
}

/// The NGX description of a freshly created view over `resource`.
pub fn ngx_resource(
  resource: &FfxApiResource,
  info: &vk::ImageViewCreateInfo,
  view: vk::ImageView
) -> NVSDK_NGX_Resource_VK {
  NVSDK_NGX_Resource_VK::image_view(
    NVSDK_NGX_ImageViewInfo_VK {
      ImageView: view,
      Image: info.image,
      SubresourceRange: info.subresource_range,
      Format: info.format,
      Width: resource.description.width,
      Height: resource.description.height
    },
    resource.description.usage & FFX_API_RESOURCE_USAGE_UAV != 0
  )
}

/// Creates views through the entry points of the device named by the game's backend descriptor.
#[derive(Default)]
pub struct AshViewFactory {
  device: vk::Device,
  tables: HashMap<vk::Device, ash::DeviceFnV1_0>
}

impl ViewFactory for AshViewFactory {
  fn bind_device(&mut self, devices: &VulkanDevices) {
    let Some(get_device_proc_addr) = devices.get_device_proc_addr else {
      warn!("Backend descriptor without vkGetDeviceProcAddr");
      return;
    };

    self.device = devices.device;
    let device = devices.device;
    self.tables.entry(device).or_insert_with(|| {
      ash::DeviceFnV1_0::load(|name| unsafe {
        get_device_proc_addr(device, name.as_ptr()).map_or(ptr::null(), |f| f as *const c_void)
      })
    });
  }

  fn create_view(&mut self, info: &vk::ImageViewCreateInfo) -> Result<vk::ImageView, vk::Result> {
    let table = self.tables.get(&self.device).ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)?;
    let mut view = vk::ImageView::null();
    let result = unsafe { (table.create_image_view)(self.device, info, ptr::null(), &mut view) };
    if result != vk::Result::SUCCESS {
      error!("vkCreateImageView error!: {:?}", result);
      return Err(result);
    }
    Ok(view)
  }

  fn destroy_view(&mut self, view: vk::ImageView) {
    if let Some(table) = self.tables.get(&self.device) {
      unsafe { (table.destroy_image_view)(self.device, view, ptr::null()) };
    }
  }
}

struct BoundView {
  view: vk::ImageView,
  resource: Box<NVSDK_NGX_Resource_VK>
}

/// The views of one dispatch. Single buffered: the previous set is destroyed, in creation order, before the next
/// is built.
#[derive(Default)]
pub struct ViewCache {
  views: Vec<BoundView>
}

impl ViewCache {
  pub fn clear<V: ViewFactory>(&mut self, factory: &mut V) {
    for bound in self.views.drain(..) {
      factory.destroy_view(bound.view);
    }
  }

  /// Wraps `resource` in a new view. The returned pointer stays valid until the next [`ViewCache::clear`].
  pub fn bind<V: ViewFactory>(
    &mut self,
    factory: &mut V,
    resource: &FfxApiResource
  ) -> Option<*mut NVSDK_NGX_Resource_VK> {
    if resource.resource.is_null() {
      return None;
    }

    let info = view_create_info(resource);
    let view = factory.create_view(&info).ok()?;
    let mut bound = BoundView {
      view,
      resource: Box::new(ngx_resource(resource, &info, view))
    };
    let pointer: *mut NVSDK_NGX_Resource_VK = &mut *bound.resource;
    self.views.push(bound);
    Some(pointer)
  }

  pub fn len(&self) -> usize {
    self.views.len()
  }

  pub fn is_empty(&self) -> bool {
    self.views.is_empty()
  }
}
