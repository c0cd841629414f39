//! Browser host for `tempo-scheduler`.

mod error;
mod web_host;

pub use error::HostError;
pub use web_host::WebHost;

use tempo_scheduler::{Scheduler, SchedulerConfig};
use wasm_bindgen::prelude::*;

/// Builds a scheduler on the page's event loop. Input-pending checks are
/// switched on when the browser supports them.
pub fn scheduler(mut config: SchedulerConfig) -> Result<Scheduler<WebHost>, JsValue> {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    let host = WebHost::new().map_err(|err| JsValue::from_str(&err.to_string()))?;
    if !host.supports_input_pending() {
        config.enable_is_input_pending = false;
    }
    Scheduler::with_config(host, config).map_err(|err| JsValue::from_str(&err.to_string()))
}
