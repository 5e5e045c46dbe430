//! Inline hooks installed in transactions.
//!
//! A target moves Unhooked -> Hooked on a committed attach and back on detach. Attaching a target that is already
//! hooked, or filling a slot that already holds an original, does nothing.

#[cfg(windows)]
pub(crate) mod minhook;

use std::{
  collections::HashMap,
  ffi::c_void,
  sync::{Mutex, MutexGuard, OnceLock}
};

use log::{error, info, warn};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HookError {
  #[error("{status} while hooking {target:#x}")]
  Primitive { status: String, target: usize },
  #[error("{0:#x} is not hooked")]
  NotHooked(usize),
  #[error("null hook target")]
  NullTarget
}

/// The OS hooking primitive. Addresses are plain integers so fakes need no real code.
pub trait HookPrimitive {
  /// Builds the trampoline for `target` without enabling it.
  fn create(&self, target: usize, detour: usize) -> Result<usize, HookError>;
  fn queue_enable(&self, target: usize) -> Result<(), HookError>;
  fn apply_queued(&self) -> Result<(), HookError>;
  fn disable(&self, target: usize) -> Result<(), HookError>;
  fn remove(&self, target: usize) -> Result<(), HookError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Installed {
  detour: usize,
  trampoline: usize
}

type Completion<'a> = Box<dyn FnOnce(usize) + Send + 'a>;

pub struct DetourEngine<P: HookPrimitive> {
  primitive: P,
  installed: Mutex<HashMap<usize, Installed>>
}

impl<P: HookPrimitive> DetourEngine<P> {
  pub fn new(primitive: P) -> Self {
    Self {
      primitive,
      installed: Mutex::new(HashMap::new())
    }
  }

  /// Opens a transaction. Other transactions wait until this one commits or drops.
  pub fn begin(&self) -> Transaction<'_, P> {
    let installed = match self.installed.lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner()
    };

    Transaction {
      primitive: &self.primitive,
      installed,
      pending: Vec::new()
    }
  }

  pub fn is_hooked(&self, target: usize) -> bool {
    self.begin().installed.contains_key(&target)
  }

  pub fn hooked_count(&self) -> usize {
    self.begin().installed.len()
  }

  pub fn detach(&self, target: usize) -> Result<(), HookError> {
    let mut tx = self.begin();
    let Some(hook) = tx.installed.remove(&target) else {
      return Err(HookError::NotHooked(target));
    };
    self.primitive.disable(target)?;
    self.primitive.remove(target)?;
    info!(
      "[HOOK] Detached {:#x} (detour {:#x}, trampoline {:#x})",
      target, hook.detour, hook.trampoline
    );
    Ok(())
  }

  /// Shutdown path: disables and removes everything this engine installed.
  pub fn detach_all(&self) {
    let mut tx = self.begin();
    let targets: Vec<usize> = tx.installed.drain().map(|(target, _)| target).collect();
    for target in targets {
      if let Err(e) = self.primitive.disable(target).and_then(|_| self.primitive.remove(target)) {
        warn!("[HOOK] Detach failed: {}", e);
      }
    }
    info!("[HOOK] All hooks detached");
  }
}

struct PendingHook<'a> {
  target: usize,
  detour: usize,
  trampoline: usize,
  completion: Option<Completion<'a>>
}

pub struct Transaction<'a, P: HookPrimitive> {
  primitive: &'a P,
  installed: MutexGuard<'a, HashMap<usize, Installed>>,
  pending: Vec<PendingHook<'a>>
}

impl<'a, P: HookPrimitive> Transaction<'a, P> {
  /// Queues a hook. Failures are logged and leave the target untouched.
  pub fn attach(&mut self, target: usize, detour: usize) {
    self.attach_with(target, detour, None);
  }

  fn attach_with(&mut self, target: usize, detour: usize, completion: Option<Completion<'a>>) {
    if target == 0 {
      error!("[HOOK] {}", HookError::NullTarget);
      return;
    }

    if self.installed.contains_key(&target) || self.pending.iter().any(|p| p.target == target) {
      info!("[HOOK] {:#x} already hooked", target);
      return;
    }

    let queued = self
      .primitive
      .create(target, detour)
      .and_then(|trampoline| self.primitive.queue_enable(target).map(|_| trampoline));

    match queued {
      Ok(trampoline) => self.pending.push(PendingHook {
        target,
        detour,
        trampoline,
        completion
      }),
      Err(e) => {
        error!("[HOOK] Attach failed: {}", e);
        let _ = self.primitive.remove(target);
      }
    }
  }

  /// Enables every queued hook at once. If enabling fails nothing stays installed.
  pub fn commit(mut self) -> usize {
    if self.pending.is_empty() {
      return 0;
    }

    if let Err(e) = self.primitive.apply_queued() {
      error!("[HOOK] Commit failed, rolling back {} hooks: {}", self.pending.len(), e);
      for hook in self.pending.drain(..) {
        let _ = self.primitive.remove(hook.target);
      }
      return 0;
    }

    let count = self.pending.len();
    for mut hook in self.pending.drain(..) {
      self.installed.insert(
        hook.target,
        Installed {
          detour: hook.detour,
          trampoline: hook.trampoline
        }
      );
      if let Some(completion) = hook.completion.take() {
        completion(hook.trampoline);
      }
    }
    count
  }
}

impl<P: HookPrimitive> Drop for Transaction<'_, P> {
  fn drop(&mut self) {
    for hook in self.pending.drain(..) {
      let _ = self.primitive.remove(hook.target);
    }
  }
}

/// The original of one hooked function, filled when its transaction commits.
pub struct HookSlot<F: Copy + Send + Sync + 'static> {
  original: OnceLock<F>
}

impl<F: Copy + Send + Sync + 'static> HookSlot<F> {
  pub const fn new() -> Self {
    Self {
      original: OnceLock::new()
    }
  }

  pub fn get(&self) -> Option<F> {
    self.original.get().copied()
  }

  pub fn is_attached(&self) -> bool {
    self.original.get().is_some()
  }

  /// Queues `target` -> `detour` and fills this slot with the trampoline on commit.
  ///
  /// # Safety
  /// `F` must be a function pointer type matching `target`.
  pub unsafe fn attach<'a, P: HookPrimitive>(&'static self, tx: &mut Transaction<'a, P>, target: usize, detour: usize) {
    if self.is_attached() {
      return;
    }

    let slot = &self.original;
    tx.attach_with(
      target,
      detour,
      Some(Box::new(move |trampoline: usize| {
        let _ = slot.set(unsafe { std::mem::transmute_copy::<usize, F>(&trampoline) });
      }))
    );
  }
}

impl<F: Copy + Send + Sync + 'static> Default for HookSlot<F> {
  fn default() -> Self {
    Self::new()
  }
}

/// Address stored at `index` of a COM object's v-table.
///
/// # Safety
/// `object` must point to a live COM object whose v-table has more than `index` entries.
pub unsafe fn vtable_entry(object: *mut c_void, index: usize) -> usize {
  unsafe {
    let vtable = *(object as *const *const usize);
    *vtable.add(index)
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use std::sync::Mutex;

  use super::*;

  #[derive(Clone, Debug, PartialEq, Eq)]
  pub(crate) enum Call {
    Create(usize),
    QueueEnable(usize),
    Apply,
    Disable(usize),
    Remove(usize)
  }

  #[derive(Default)]
  pub(crate) struct FakePrimitive {
    pub calls: Mutex<Vec<Call>>,
    pub fail_create: Option<usize>,
    pub fail_apply: bool
  }

  impl FakePrimitive {
    pub fn calls(&self) -> Vec<Call> {
      self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
      self.calls.lock().unwrap().push(call);
    }
  }

  impl HookPrimitive for FakePrimitive {
    fn create(&self, target: usize, detour: usize) -> Result<usize, HookError> {
      self.record(Call::Create(target));
      if self.fail_create == Some(target) {
        return Err(HookError::Primitive {
          status: "MH_ERROR_NOT_EXECUTABLE".into(),
          target
        });
      }
      Ok(detour + 0x1000)
    }

    fn queue_enable(&self, target: usize) -> Result<(), HookError> {
      self.record(Call::QueueEnable(target));
      Ok(())
    }

    fn apply_queued(&self) -> Result<(), HookError> {
      self.record(Call::Apply);
      if self.fail_apply {
        return Err(HookError::Primitive {
          status: "MH_ERROR_MEMORY_PROTECT".into(),
          target: 0
        });
      }
      Ok(())
    }

    fn disable(&self, target: usize) -> Result<(), HookError> {
      self.record(Call::Disable(target));
      Ok(())
    }

    fn remove(&self, target: usize) -> Result<(), HookError> {
      self.record(Call::Remove(target));
      Ok(())
    }
  }

  #[test]
  fn commit_installs_every_queued_hook() {
    let engine = DetourEngine::new(FakePrimitive::default());
    let mut tx = engine.begin();
    tx.attach(0x10, 0x100);
    tx.attach(0x20, 0x200);
    assert_eq!(tx.commit(), 2);

    assert!(engine.is_hooked(0x10));
    assert!(engine.is_hooked(0x20));
    let applies = engine.primitive.calls().iter().filter(|c| **c == Call::Apply).count();
    assert_eq!(applies, 1);
  }

  #[test]
  fn reattach_is_a_no_op() {
    let engine = DetourEngine::new(FakePrimitive::default());
    let mut tx = engine.begin();
    tx.attach(0x10, 0x100);
    tx.commit();

    let mut tx = engine.begin();
    tx.attach(0x10, 0x999);
    assert_eq!(tx.commit(), 0);

    let creates = engine.primitive.calls().iter().filter(|c| **c == Call::Create(0x10)).count();
    assert_eq!(creates, 1);
  }

  #[test]
  fn failed_attach_leaves_the_rest_of_the_transaction() {
    let engine = DetourEngine::new(FakePrimitive {
      fail_create: Some(0x20),
      ..Default::default()
    });
    let mut tx = engine.begin();
    tx.attach(0x10, 0x100);
    tx.attach(0x20, 0x200);
    tx.attach(0x30, 0x300);
    assert_eq!(tx.commit(), 2);

    assert!(engine.is_hooked(0x10));
    assert!(!engine.is_hooked(0x20));
    assert!(engine.is_hooked(0x30));
  }

  #[test]
  fn failed_commit_rolls_back() {
    let engine = DetourEngine::new(FakePrimitive {
      fail_apply: true,
      ..Default::default()
    });
    let mut tx = engine.begin();
    tx.attach(0x10, 0x100);
    tx.attach(0x20, 0x200);
    assert_eq!(tx.commit(), 0);

    assert_eq!(engine.hooked_count(), 0);
    let calls = engine.primitive.calls();
    assert!(calls.contains(&Call::Remove(0x10)));
    assert!(calls.contains(&Call::Remove(0x20)));
  }

  #[test]
  fn dropped_transaction_removes_its_queued_hooks() {
    let engine = DetourEngine::new(FakePrimitive::default());
    {
      let mut tx = engine.begin();
      tx.attach(0x10, 0x100);
    }
    assert!(!engine.is_hooked(0x10));
    assert!(engine.primitive.calls().contains(&Call::Remove(0x10)));
  }

  #[test]
  fn detach_returns_the_target_to_unhooked() {
    let engine = DetourEngine::new(FakePrimitive::default());
    let mut tx = engine.begin();
    tx.attach(0x10, 0x100);
    tx.commit();

    assert_eq!(engine.detach(0x10), Ok(()));
    assert!(!engine.is_hooked(0x10));
    assert_eq!(engine.detach(0x10), Err(HookError::NotHooked(0x10)));

    let mut tx = engine.begin();
    tx.attach(0x10, 0x100);
    assert_eq!(tx.commit(), 1);
  }

  #[test]
  fn slots_fill_only_after_commit() {
    static SLOT: HookSlot<usize> = HookSlot::new();
    let engine = DetourEngine::new(FakePrimitive::default());

    let mut tx = engine.begin();
    unsafe { SLOT.attach(&mut tx, 0x40, 0x400) };
    assert!(!SLOT.is_attached());
    tx.commit();
    assert_eq!(SLOT.get(), Some(0x1400));

    let mut tx = engine.begin();
    unsafe { SLOT.attach(&mut tx, 0x50, 0x500) };
    assert_eq!(tx.commit(), 0);
  }

  #[test]
  fn detach_all_clears_everything() {
    let engine = DetourEngine::new(FakePrimitive::default());
    let mut tx = engine.begin();
    tx.attach(0x10, 0x100);
    tx.attach(0x20, 0x200);
    tx.commit();

    engine.detach_all();
    assert_eq!(engine.hooked_count(), 0);
  }

  #[test]
  fn vtable_entries_are_read_through_the_object() {
    let vtable: [usize; 3] = [0xA, 0xB, 0xC];
    let object: *const usize = vtable.as_ptr();
    let entry = unsafe { vtable_entry(&object as *const _ as *mut c_void, 2) };
    assert_eq!(entry, 0xC);
  }
}
