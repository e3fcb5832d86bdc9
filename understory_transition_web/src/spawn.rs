// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Executor for lifecycle continuations.

use futures::task::{LocalFutureObj, LocalSpawn, SpawnError};

/// Spawns onto the browser's microtask queue.
#[derive(Clone, Copy, Debug, Default)]
pub struct WasmSpawner;

impl LocalSpawn for WasmSpawner {
    fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
        wasm_bindgen_futures::spawn_local(future);
        Ok(())
    }
}
