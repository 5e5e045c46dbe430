//! Descriptor classification and the forwarding decision table.

use upshift_common::{Config, ffx::*};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StructKind {
  General,
  Upscaling,
  FrameGeneration,
  SwapchainDx12,
  SwapchainVulkan,
  Unknown
}

impl StructKind {
  pub fn of(type_: ffxStructType_t) -> Self {
    match type_ & FFX_API_EFFECT_MASK {
      FFX_API_EFFECT_ID_GENERAL => Self::General,
      FFX_API_EFFECT_ID_UPSCALE => Self::Upscaling,
      FFX_API_EFFECT_ID_FRAMEGENERATION => Self::FrameGeneration,
      FFX_API_EFFECT_ID_FGSC_DX12 => Self::SwapchainDx12,
      FFX_API_EFFECT_ID_FGSC_VK => Self::SwapchainVulkan,
      _ => Self::Unknown
    }
  }

  pub fn is_frame_generation(self) -> bool {
    matches!(self, Self::FrameGeneration | Self::SwapchainVulkan)
  }
}

/// Anything at or below this address is a small integer, not a header.
const MIN_HEADER_ADDRESS: usize = 0x10000;

/// Walks a descriptor chain. Stops on null or on pointers too small to be real.
pub struct HeaderChain {
  next: *const ffxApiHeader
}

impl Iterator for HeaderChain {
  type Item = *const ffxApiHeader;

  fn next(&mut self) -> Option<Self::Item> {
    let current = self.next;
    if current.is_null() || (current as usize) <= MIN_HEADER_ADDRESS {
      return None;
    }
    self.next = unsafe { (*current).pNext };
    Some(current)
  }
}

/// # Safety
/// Every header in the chain must be readable.
pub unsafe fn chain(header: *const ffxApiHeader) -> HeaderChain {
  HeaderChain { next: header }
}

/// # Safety
/// See [`chain`].
pub unsafe fn find_in_chain(header: *const ffxApiHeader, type_: ffxStructType_t) -> Option<*const ffxApiHeader> {
  unsafe { chain(header) }.find(|h| unsafe { (**h).type_ } == type_)
}

/// Kind of the first non-general header, so a general query chained to an effect descriptor classifies as that
/// effect.
///
/// # Safety
/// See [`chain`].
pub unsafe fn indirect_kind(header: *const ffxApiHeader) -> StructKind {
  unsafe { chain(header) }
    .map(|h| StructKind::of(unsafe { (*h).type_ }))
    .find(|kind| *kind != StructKind::General)
    .unwrap_or(StructKind::General)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
  Create,
  Destroy,
  Configure,
  Query,
  Dispatch
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Request {
  pub op: Op,
  /// Kind of the descriptor chain; for Create, `Upscaling` means an upscale descriptor is present.
  pub kind: StructKind,
  pub desc_type: ffxStructType_t,
  pub known_context: bool,
  pub null_desc: bool
}

impl Request {
  pub fn new(op: Op, kind: StructKind, desc_type: ffxStructType_t, known_context: bool) -> Self {
    Self {
      op,
      kind,
      desc_type,
      known_context,
      null_desc: false
    }
  }

  pub fn null(op: Op) -> Self {
    Self {
      op,
      kind: StructKind::Unknown,
      desc_type: 0,
      known_context: false,
      null_desc: true
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
  /// Handle locally only.
  Translate,
  /// Hand the call to the real implementation and return its result.
  Forward,
  /// Call the real implementation, then handle locally.
  ForwardThenTranslate,
  /// Answer OK without doing anything.
  Ignore,
  /// Answer with a parameter error.
  Reject
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Policy {
  pub hot_swap: bool,
  pub use_ffx_inputs: bool,
  pub shutting_down: bool
}

impl Policy {
  pub fn from_config(config: &Config, shutting_down: bool) -> Self {
    Self {
      hot_swap: config.enable_hot_swapping.value_or_default(),
      use_ffx_inputs: config.use_ffx_inputs.value_or_default(),
      shutting_down
    }
  }

  pub fn route(&self, request: Request) -> Route {
    if request.null_desc {
      return match request.op {
        Op::Destroy => Route::Ignore,
        _ => Route::Reject
      };
    }

    match request.op {
      Op::Create => match (request.kind, self.hot_swap) {
        (StructKind::Upscaling, true) => Route::ForwardThenTranslate,
        (StructKind::Upscaling, false) => Route::Translate,
        _ => Route::Forward
      },

      Op::Destroy => match (request.known_context, self.hot_swap, self.shutting_down) {
        (true, false, _) | (true, true, true) => Route::Translate,
        (true, true, false) => Route::ForwardThenTranslate,
        (false, _, true) => Route::Ignore,
        (false, _, false) => Route::Forward
      },

      Op::Configure => {
        if self.hot_swap {
          Route::Forward
        } else {
          Route::Ignore
        }
      }

      Op::Query => {
        if is_translated_query(request.desc_type) {
          return Route::Translate;
        }
        if request.kind.is_frame_generation() {
          return Route::Forward;
        }
        if request.desc_type == FFX_API_QUERY_DESC_TYPE_UPSCALE_GETJITTERPHASECOUNT {
          return if self.hot_swap { Route::Forward } else { Route::Translate };
        }
        if request.known_context && !self.hot_swap {
          return Route::Ignore;
        }
        if self.hot_swap || StructKind::of(request.desc_type) == StructKind::General {
          Route::Forward
        } else {
          Route::Ignore
        }
      }

      Op::Dispatch => {
        if StructKind::of(request.desc_type).is_frame_generation() {
          return Route::Forward;
        }
        if self.hot_swap && !self.use_ffx_inputs {
          return Route::Forward;
        }
        if !request.known_context {
          return Route::Forward;
        }
        Route::Translate
      }
    }
  }
}

fn is_translated_query(desc_type: ffxStructType_t) -> bool {
  matches!(
    desc_type,
    FFX_API_QUERY_DESC_TYPE_UPSCALE_GETRENDERRESOLUTIONFROMQUALITYMODE
      | FFX_API_QUERY_DESC_TYPE_UPSCALE_GETUPSCALERATIOFROMQUALITYMODE
      | FFX_API_QUERY_DESC_TYPE_UPSCALE_GETJITTEROFFSET
      | FFX_API_QUERY_DESC_TYPE_GET_PROVIDER_VERSION
  )
}
