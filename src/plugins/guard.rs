//! Fault boundary around plugin hooks.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::error::GatewayError;
use crate::plugins::Phase;

/// Run one hook, turning a panic into `PluginRuntimeError`.
///
/// Errors the hook returns itself pass through untouched.
pub fn call_hook<F>(plugin: &str, phase: Phase, hook: F) -> Result<(), GatewayError>
where
    F: FnOnce() -> Result<(), GatewayError>,
{
    match panic::catch_unwind(AssertUnwindSafe(hook)) {
        Ok(result) => result,
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            tracing::error!(plugin, phase = phase.label(), reason = %reason, "Plugin panicked");
            Err(GatewayError::PluginRuntimeError {
                plugin: plugin.to_string(),
                phase: phase.label(),
                reason,
            })
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
