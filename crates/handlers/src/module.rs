// SPDX-License-Identifier: MIT

//! `HandlerModule`: one plugin's callables, across its lifecycle
//! (`loaded -> ready -> operational -> prepared -> ...`).

use async_trait::async_trait;
use std::collections::BTreeMap;

pub type AttrMap = BTreeMap<String, Vec<Vec<u8>>>;

#[derive(Debug, thiserror::Error)]
#[error("handler failed: {0}")]
pub struct HandlerFault(pub String);

/// The callables `handlers.c` calls `setdata`/`initialize`/`clean`/
/// `prerun`/`handler`/`postrun`. Implementors own no persisted state
/// themselves -- the registry and cache own `HandlerState` and the
/// `prepared` flag.
#[async_trait]
pub trait HandlerModule: Send + Sync {
    fn name(&self) -> &str;

    async fn setdata(&self, _key: &str, _value: &str) -> Result<(), HandlerFault> {
        Ok(())
    }

    async fn initialize(&self) -> Result<(), HandlerFault> {
        Ok(())
    }

    async fn clean(&self) -> Result<(), HandlerFault> {
        Ok(())
    }

    async fn prerun(&self) -> Result<(), HandlerFault> {
        Ok(())
    }

    async fn postrun(&self) -> Result<(), HandlerFault> {
        Ok(())
    }

    /// `cmd` is populated only when the handler's manifest sets `modrdn`.
    async fn handle(
        &self,
        dn: &str,
        new: &AttrMap,
        old: &AttrMap,
        cmd: Option<&str>,
    ) -> Result<(), HandlerFault>;
}
