//! DXGI factory interception: swapchain creation policy and adapter enumeration.
//!
//! The flows here only see the [`swapchain::SwapchainCalls`] and [`adapter::AdapterSource`] seams. The COM glue that
//! implements them lives in `hooks::dxgi`.

pub mod adapter;
pub mod spoof;
pub mod swapchain;

use std::{cell::Cell, thread::LocalKey};

thread_local! {
  static SKIP_SPOOFING: Cell<u32> = const { Cell::new(0) };
  static SKIP_HIGH_PERF_CHECK: Cell<u32> = const { Cell::new(0) };
  static SKIP_FG_SWAPCHAIN: Cell<u32> = const { Cell::new(0) };
}

/// Per-thread switches that stop a hook from acting on calls it made itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Skip {
  /// Adapter descriptions are reported unaltered.
  Spoofing,
  /// Enumeration takes the plain path, set while the hook calls the high-performance enumeration.
  HighPerfCheck,
  /// Swapchain creation never goes through frame generation, set while the frame-generation module creates its own.
  FgSwapchain
}

impl Skip {
  fn key(self) -> &'static LocalKey<Cell<u32>> {
    match self {
      Skip::Spoofing => &SKIP_SPOOFING,
      Skip::HighPerfCheck => &SKIP_HIGH_PERF_CHECK,
      Skip::FgSwapchain => &SKIP_FG_SWAPCHAIN
    }
  }

  pub fn active(self) -> bool {
    self.key().with(|depth| depth.get() > 0)
  }

  /// Holds the switch on this thread until the guard drops. Guards nest.
  pub fn scoped(self) -> SkipGuard {
    self.key().with(|depth| depth.set(depth.get() + 1));
    SkipGuard { skip: self }
  }
}

#[must_use]
pub struct SkipGuard {
  skip: Skip
}

impl Drop for SkipGuard {
  fn drop(&mut self) {
    self.skip.key().with(|depth| depth.set(depth.get().saturating_sub(1)));
  }
}
