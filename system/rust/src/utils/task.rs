// Copyright 2024, The Android Open Source Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Helpers to drive async code from synchronous tests

use std::{future::Future, time::Duration};

use tokio::{runtime::Builder, task::LocalSet, time::timeout};

/// Runs `f` to completion on a current-thread runtime with a paused clock,
/// inside a [`LocalSet`] so `spawn_local` works. Fails the test if `f` does
/// not complete within ten (virtual) seconds.
pub fn block_on_locally<T>(f: impl Future<Output = T>) -> T {
    let rt = Builder::new_current_thread().enable_time().start_paused(true).build().unwrap();
    let local = LocalSet::new();
    local.block_on(&rt, async move {
        timeout(Duration::from_secs(10), f).await.expect("test did not complete in time")
    })
}
