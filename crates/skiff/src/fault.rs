//
// fault.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::RwLock;

use crate::errors::ProcessCrashed;
use crate::worker::WorkerHandle;

/// Injector consulted at the start of every engine operation, before the
/// operation has any visible effect on the worker. Returning an error makes
/// the worker appear to have crashed at exactly that point.
pub type FaultInjector = dyn Fn(&WorkerHandle, &str) -> Result<(), ProcessCrashed> + Send + Sync;

/// The process-wide injector slot. `None` means no fault injection, which
/// is the production state.
static FAULT_INJECTOR: RwLock<Option<Arc<FaultInjector>>> = RwLock::new(None);

/// Serializes installation: two tests driving the process-wide slot at the
/// same time would see each other's faults.
static INSTALL_LOCK: Mutex<()> = Mutex::new(());

pub(crate) fn maybe_inject_fault(worker: &WorkerHandle, op: &str) -> Result<(), ProcessCrashed> {
    let injector = FAULT_INJECTOR
        .read()
        .expect("Can lock the fault injector slot.")
        .clone();

    match injector {
        Some(injector) => injector(worker, op),
        None => Ok(()),
    }
}

/// Install `injector` process-wide. The returned guard restores the no-op
/// default on drop, and holds the installation lock for its whole lifetime
/// so injector-driven tests run one at a time.
pub fn set_fault_injector<F>(injector: F) -> FaultInjectorGuard
where
    F: Fn(&WorkerHandle, &str) -> Result<(), ProcessCrashed> + Send + Sync + 'static,
{
    // A previous holder may have panicked mid-test; the lock protects
    // nothing that can be left inconsistent, so claim it anyway.
    let serial = INSTALL_LOCK.lock().unwrap_or_else(|err| err.into_inner());

    *FAULT_INJECTOR
        .write()
        .expect("Can lock the fault injector slot.") = Some(Arc::new(injector));

    FaultInjectorGuard { _serial: serial }
}

pub struct FaultInjectorGuard {
    _serial: MutexGuard<'static, ()>,
}

impl Drop for FaultInjectorGuard {
    fn drop(&mut self) {
        *FAULT_INJECTOR
            .write()
            .expect("Can lock the fault injector slot.") = None;
    }
}
