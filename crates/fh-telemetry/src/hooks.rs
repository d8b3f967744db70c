//! Process-wide failure hooks.
//!
//! The panic hook is installed at most once per process and chains the
//! previously installed hook. It reports to whichever core registered most
//! recently; the core is held weakly so the hook never keeps it alive.

use std::cell::Cell;
use std::panic::PanicHookInfo;
use std::sync::{Arc, Mutex, OnceLock, Weak};

use fh_common::Metadata;
use serde_json::json;

use crate::core::TelemetryCore;

thread_local! {
    static DELIVERY_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// Marks the current thread as delivering events to subscribers.
pub(crate) struct DeliveryGuard;

impl DeliveryGuard {
    pub(crate) fn enter() -> Self {
        DELIVERY_DEPTH.with(|d| d.set(d.get() + 1));
        DeliveryGuard
    }
}

impl Drop for DeliveryGuard {
    fn drop(&mut self) {
        DELIVERY_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

/// Whether the current thread is inside subscriber delivery.
pub fn in_delivery() -> bool {
    DELIVERY_DEPTH.with(|d| d.get() > 0)
}

static HOOK_TARGET: OnceLock<Mutex<Weak<TelemetryCore>>> = OnceLock::new();

/// Route panics to `core` as `UNCAUGHT_PANIC` events.
///
/// Returns true when this call installed the hook; later calls only
/// retarget it. Panics raised inside subscriber callbacks are not recorded.
pub fn install_panic_hook(core: &Arc<TelemetryCore>) -> bool {
    let mut installed = false;
    let target = HOOK_TARGET.get_or_init(|| {
        installed = true;
        Mutex::new(Weak::new())
    });
    *target.lock().unwrap_or_else(|p| p.into_inner()) = Arc::downgrade(core);

    if installed {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if !in_delivery() {
                report_panic(info);
            }
            previous(info);
        }));
        tracing::debug!("telemetry panic hook installed");
    }
    installed
}

fn report_panic(info: &PanicHookInfo<'_>) {
    let Some(target) = HOOK_TARGET.get() else {
        return;
    };
    let core = match target.lock() {
        Ok(weak) => weak.upgrade(),
        Err(_) => None,
    };
    let Some(core) = core else {
        return;
    };

    let mut metadata = Metadata::new();
    metadata.insert("message".to_string(), json!(panic_message(info)));
    if let Some(location) = info.location() {
        metadata.insert(
            "location".to_string(),
            json!(format!(
                "{}:{}:{}",
                location.file(),
                location.line(),
                location.column()
            )),
        );
        metadata.insert("file".to_string(), json!(location.file()));
        metadata.insert("line".to_string(), json!(location.line()));
    }
    let thread = std::thread::current();
    metadata.insert(
        "thread".to_string(),
        json!(thread.name().unwrap_or("<unnamed>")),
    );
    let stack = std::backtrace::Backtrace::force_capture().to_string();
    core.track_panic(metadata, stack);
}

/// Payload of a panic as text.
pub fn panic_message(info: &PanicHookInfo<'_>) -> String {
    let payload = info.payload();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}
