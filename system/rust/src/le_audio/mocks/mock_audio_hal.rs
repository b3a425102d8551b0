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

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::le_audio::{
    group::StreamParameters, set_configuration::LeAudioCodecConfiguration, AudioHalClient,
};

/// Routes calls to one direction of the audio HAL into a channel
pub struct MockAudioHal(UnboundedSender<MockAudioHalEvents>);

impl MockAudioHal {
    /// Constructor. Returns self and the RX side of the associated channel.
    pub fn new() -> (Self, UnboundedReceiver<MockAudioHalEvents>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }
}

/// Events representing calls to AudioHalClient
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockAudioHalEvents {
    Start(LeAudioCodecConfiguration),
    Stop,
    ConfirmStreamingRequest,
    CancelStreamingRequest,
    SuspendedForReconfiguration,
    ReconfigurationComplete,
    UpdateRemoteDelay(u16),
    UpdateAudioConfig(StreamParameters),
}

impl AudioHalClient for MockAudioHal {
    fn start(&self, codec_config: &LeAudioCodecConfiguration) -> bool {
        self.0.send(MockAudioHalEvents::Start(*codec_config)).unwrap();
        true
    }

    fn stop(&self) {
        self.0.send(MockAudioHalEvents::Stop).unwrap();
    }

    fn confirm_streaming_request(&self) {
        self.0.send(MockAudioHalEvents::ConfirmStreamingRequest).unwrap();
    }

    fn cancel_streaming_request(&self) {
        self.0.send(MockAudioHalEvents::CancelStreamingRequest).unwrap();
    }

    fn suspended_for_reconfiguration(&self) {
        self.0.send(MockAudioHalEvents::SuspendedForReconfiguration).unwrap();
    }

    fn reconfiguration_complete(&self) {
        self.0.send(MockAudioHalEvents::ReconfigurationComplete).unwrap();
    }

    fn update_remote_delay(&self, delay_ms: u16) {
        self.0.send(MockAudioHalEvents::UpdateRemoteDelay(delay_ms)).unwrap();
    }

    fn update_audio_config(&self, stream_params: &StreamParameters) {
        self.0.send(MockAudioHalEvents::UpdateAudioConfig(stream_params.clone())).unwrap();
    }
}
