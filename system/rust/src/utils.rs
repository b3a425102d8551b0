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

//! Helpers shared by the LE Audio modules

pub mod owned_handle;

#[cfg(test)]
pub mod task;

const LOG_TAG: &str = "bluetooth";

/// Routes `log` records to logcat
#[cfg(target_os = "android")]
pub fn init_logging() {
    android_logger::init_once(
        android_logger::Config::default().with_tag(LOG_TAG).with_max_level(log::LevelFilter::Debug),
    );
}

/// Routes `log` records to stderr, filtered by `RUST_LOG`
#[cfg(not(target_os = "android"))]
pub fn init_logging() {
    env_logger::Builder::new().parse_default_env().try_init().ok();
    log::debug!("{LOG_TAG}: logging initialized");
}
