// SPDX-License-Identifier: MIT

//! First-run handler initialization: a handler's persisted state starts
//! at `0` (not ready); `initialize()` runs once and flips the `READY`
//! bit, taking the handler from loaded to ready to operational.

use crate::error::PumpFault;
use ldrepl_cache::CacheFacade;
use ldrepl_core::model::HandlerState;
use ldrepl_handlers::HandlerRegistry;

pub async fn ensure_handlers_ready(cache: &dyn CacheFacade, registry: &HandlerRegistry) -> Result<(), PumpFault> {
    for handler in registry.iter() {
        let name = &handler.manifest.name;
        let state = HandlerState(cache.read_handler_state(name)?);
        if state.is_ready() {
            continue;
        }
        handler.module.initialize().await.map_err(|e| PumpFault::fatal(e.0))?;
        let mut ready = state;
        ready.set_ready(true);
        cache.write_handler_state(name, ready.0)?;
        tracing::info!(handler = %name, "handler initialized and marked ready");
    }
    Ok(())
}
