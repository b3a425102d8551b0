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

//! A task handle that aborts its task once dropped

use std::ops::Deref;

use tokio::task::JoinHandle;

/// Owns a spawned task. Dropping (or replacing) the handle aborts the task,
/// so a timer held in one never fires after it was cancelled.
#[derive(Debug)]
pub struct OwnedHandle<T>(JoinHandle<T>);

impl<T> From<JoinHandle<T>> for OwnedHandle<T> {
    fn from(handle: JoinHandle<T>) -> Self {
        Self(handle)
    }
}

impl<T> Deref for OwnedHandle<T> {
    type Target = JoinHandle<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> Drop for OwnedHandle<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod test {
    use std::{cell::Cell, rc::Rc, time::Duration};

    use tokio::{task::spawn_local, time::sleep};

    use super::OwnedHandle;
    use crate::utils::task::block_on_locally;

    #[test]
    fn test_dropped_handle_aborts_task() {
        block_on_locally(async {
            // arrange
            let fired = Rc::new(Cell::new(false));
            let handle: OwnedHandle<()> = spawn_local({
                let fired = fired.clone();
                async move {
                    sleep(Duration::from_millis(10)).await;
                    fired.set(true);
                }
            })
            .into();

            // act
            drop(handle);
            sleep(Duration::from_millis(20)).await;

            // assert
            assert!(!fired.get());
        });
    }

    #[test]
    fn test_kept_handle_runs_task() {
        block_on_locally(async {
            let fired = Rc::new(Cell::new(false));
            let _handle: OwnedHandle<()> = spawn_local({
                let fired = fired.clone();
                async move {
                    sleep(Duration::from_millis(10)).await;
                    fired.set(true);
                }
            })
            .into();

            sleep(Duration::from_millis(20)).await;

            assert!(fired.get());
        });
    }
}
