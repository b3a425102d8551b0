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

//! The LE Audio unicast client, and the event loop it runs on. All the
//! session state lives on a single thread; foreign threads post closures to
//! it with [`do_in_le_audio_thread`].

use anyhow::{anyhow, bail, Result};
use log::{error, info, warn};
use tokio::{runtime::Builder, sync::mpsc, task::LocalSet};

use std::{cell::RefCell, rc::Rc, sync::Mutex};

use le_audio::client::LeAudioClient;

pub mod core;
pub mod le_audio;
pub mod utils;

/// The LE Audio thread runner. Starts in an idle state.
#[derive(Default, Debug)]
pub enum LeAudioModuleRunner {
    /// Not started yet
    #[default]
    NotStarted,
    /// Main event loop is running and messages can be processed.
    /// Use [`LeAudioModuleRunner::send`] to queue a callback.
    Running { tx: mpsc::UnboundedSender<BoxedLeAudioCallback> },
    /// Asked to stop. Queued messages are still processed, new ones are
    /// refused.
    Stopping,
    /// The event loop has ended. `result` holds an error if it did not end
    /// gracefully.
    Ended { result: Result<(), String> },
}

static GLOBAL_MODULE_RUNNER: Mutex<LeAudioModuleRunner> = Mutex::new(LeAudioModuleRunner::new());

fn lock_runner() -> Result<std::sync::MutexGuard<'static, LeAudioModuleRunner>> {
    GLOBAL_MODULE_RUNNER.lock().map_err(|_| anyhow!("runner lock poisoned"))
}

impl LeAudioModuleRunner {
    const fn new() -> Self {
        Self::NotStarted
    }

    /// Runs the LE Audio event loop on the calling thread until [`stop`] is
    /// called. `client_factory` builds the client once the executor is up.
    ///
    /// Can only be run once.
    ///
    /// [`stop`]: LeAudioModuleRunner::stop
    pub fn run(
        client_factory: impl FnOnce() -> Rc<RefCell<LeAudioClient>>,
        on_started: impl FnOnce(),
    ) -> Result<()> {
        utils::init_logging();
        info!("starting the LE Audio module");
        let mut main_thread_rx = match lock_runner()?.start() {
            Ok(main_thread_rx) => main_thread_rx,
            Err(reason) => {
                error!("cannot start the LE Audio module: {reason}");
                bail!("LE Audio module: {reason}");
            }
        };
        let rt = Builder::new_current_thread().enable_all().build()?;
        let local = LocalSet::new();

        let result = local.block_on(&rt, async move {
            let client = client_factory();

            on_started();

            info!("starting event loop");
            while let Some(f) = main_thread_rx.recv().await {
                match client.try_borrow_mut() {
                    Ok(mut client) => f(&mut client),
                    Err(_) => error!("client busy, dropping the call"),
                }
            }
            Ok::<(), String>(())
        });
        warn!("LeAudioModuleRunner has stopped, shutting down executor thread");

        if let Err(e) = lock_runner()?.finished(result) {
            warn!("failed to record runner finish: {e}");
        }
        Ok(())
    }

    /// Externally stop the global runner.
    pub fn stop() -> Result<()> {
        lock_runner()?.shutdown();
        Ok(())
    }

    fn send(&self, f: BoxedLeAudioCallback) -> Result<(), String> {
        match self {
            Self::NotStarted => Err("Not started yet".to_string()),
            Self::Ended { .. } | Self::Stopping => Err("Runner ended".to_string()),
            Self::Running { tx } => tx.send(f).map_err(|_| "Failed to send".to_string()),
        }
    }

    fn start(&mut self) -> Result<mpsc::UnboundedReceiver<BoxedLeAudioCallback>, String> {
        match self {
            Self::Running { .. } => return Err("Already started".to_string()),
            Self::Ended { result } => return Err(format!("Already finished: {result:?}")),
            Self::Stopping => return Err("Can't start, finishing".to_string()),
            Self::NotStarted => {}
        };

        let (tx, rx) = mpsc::unbounded_channel();
        *self = Self::Running { tx };
        Ok(rx)
    }

    fn shutdown(&mut self) {
        // Dropping the sender ends the event loop once the queue is drained
        match std::mem::replace(self, Self::Stopping) {
            Self::NotStarted => {
                warn!("Runner being stopped when it hasn't been started");
                *self = Self::Ended { result: Err("Never started".to_string()) };
            }
            Self::Stopping => warn!("Asked to shutdown twice before stopped"),
            Self::Ended { result } => *self = Self::Ended { result },
            Self::Running { .. } => {}
        }
    }

    fn finished(&mut self, result: Result<(), String>) -> Result<(), String> {
        match self {
            Self::NotStarted => return Err("Not started".to_string()),
            Self::Ended { result } => return Err(format!("Already finished with {result:?}")),
            Self::Running { .. } | Self::Stopping => {}
        }

        *self = Self::Ended { result };
        Ok(())
    }
}

type BoxedLeAudioCallback = Box<dyn FnOnce(&mut LeAudioClient) + Send + 'static>;

/// Posts a callback to the LE Audio thread, used by the audio framework and
/// the GATT layer.
///
/// Do not call this from the LE Audio thread itself: the client is borrowed
/// while a callback runs and re-entrant posts only queue behind it.
pub fn do_in_le_audio_thread<F>(f: F) -> Result<()>
where
    F: FnOnce(&mut LeAudioClient) + Send + 'static,
{
    if let Err(reason) = lock_runner()?.send(Box::new(f)) {
        error!("failed to post to the LE Audio thread: {reason}");
        bail!("LE Audio call failed: {reason}");
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_runner_lifecycle() {
        // arrange
        let mut runner = LeAudioModuleRunner::new();

        // act
        let rx = runner.start();

        // assert
        assert!(rx.is_ok());
        assert!(runner.start().is_err());
        assert!(runner.send(Box::new(|_: &mut LeAudioClient| {})).is_ok());

        // act
        runner.shutdown();

        // assert
        assert!(matches!(runner, LeAudioModuleRunner::Stopping));
        assert!(runner.send(Box::new(|_: &mut LeAudioClient| {})).is_err());
        assert!(runner.finished(Ok(())).is_ok());
        assert!(matches!(runner, LeAudioModuleRunner::Ended { result: Ok(()) }));
        assert!(runner.start().is_err());
    }

    #[test]
    fn test_stop_before_start() {
        // arrange
        let mut runner = LeAudioModuleRunner::new();

        // act
        runner.shutdown();

        // assert
        assert!(matches!(runner, LeAudioModuleRunner::Ended { result: Err(_) }));
        assert!(runner.send(Box::new(|_: &mut LeAudioClient| {})).is_err());
    }
}
