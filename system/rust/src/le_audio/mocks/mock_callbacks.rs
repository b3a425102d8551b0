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
    ids::GroupId,
    types::{AudioContexts, AudioLocations, Directions},
    GroupStatus, GroupStreamStatus, LeAudioClientCallbacks,
};

/// Routes upper layer notifications into a channel
pub struct MockLeAudioCallbacks(UnboundedSender<MockLeAudioCallbacksEvents>);

impl MockLeAudioCallbacks {
    /// Constructor. Returns self and the RX side of the associated channel.
    pub fn new() -> (Self, UnboundedReceiver<MockLeAudioCallbacksEvents>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }
}

/// Events representing calls to LeAudioClientCallbacks
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockLeAudioCallbacksEvents {
    GroupStatus(GroupId, GroupStatus),
    GroupStreamStatus(GroupId, GroupStreamStatus),
    AudioConf {
        directions: Directions,
        group_id: GroupId,
        sink_locations: AudioLocations,
        source_locations: AudioLocations,
        available_contexts: AudioContexts,
    },
}

impl LeAudioClientCallbacks for MockLeAudioCallbacks {
    fn on_group_status(&self, group_id: GroupId, status: GroupStatus) {
        self.0.send(MockLeAudioCallbacksEvents::GroupStatus(group_id, status)).unwrap();
    }

    fn on_group_stream_status(&self, group_id: GroupId, status: GroupStreamStatus) {
        self.0.send(MockLeAudioCallbacksEvents::GroupStreamStatus(group_id, status)).unwrap();
    }

    fn on_audio_conf(
        &self,
        directions: Directions,
        group_id: GroupId,
        sink_locations: AudioLocations,
        source_locations: AudioLocations,
        available_contexts: AudioContexts,
    ) {
        self.0
            .send(MockLeAudioCallbacksEvents::AudioConf {
                directions,
                group_id,
                sink_locations,
                source_locations,
                available_contexts,
            })
            .unwrap();
    }
}
