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

use crate::{
    core::address::RawAddress,
    le_audio::{
        device::LeAudioDevices,
        group::LeAudioDeviceGroup,
        ids::GroupId,
        types::{AseState, AudioContexts, BidirectionalPair, LeAudioContextType},
        GroupStateMachine,
    },
};

/// Routes calls to the group state machine into a channel. Stream starts
/// run the real ASE selection so the group looks configured afterwards.
pub struct MockGroupStateMachine(UnboundedSender<MockGroupStateMachineEvents>);

impl MockGroupStateMachine {
    /// Constructor. Returns self and the RX side of the associated channel.
    pub fn new() -> (Self, UnboundedReceiver<MockGroupStateMachineEvents>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }
}

/// Events representing calls to GroupStateMachine
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockGroupStateMachineEvents {
    /// A stream start was requested
    StartStream {
        group_id: GroupId,
        context_type: LeAudioContextType,
        metadata_contexts: BidirectionalPair<AudioContexts>,
        ccid_lists: BidirectionalPair<Vec<u8>>,
    },
    /// A configuration without enabling was requested
    ConfigureStream { group_id: GroupId, context_type: LeAudioContextType },
    StopStream(GroupId),
    SuspendStream(GroupId),
    AttachToStream(GroupId, RawAddress),
}

impl GroupStateMachine for MockGroupStateMachine {
    fn start_stream(
        &self,
        group: &mut LeAudioDeviceGroup,
        devices: &mut LeAudioDevices,
        context_type: LeAudioContextType,
        metadata_contexts: &BidirectionalPair<AudioContexts>,
        ccid_lists: &BidirectionalPair<Vec<u8>>,
    ) -> bool {
        self.0
            .send(MockGroupStateMachineEvents::StartStream {
                group_id: group.group_id,
                context_type,
                metadata_contexts: *metadata_contexts,
                ccid_lists: ccid_lists.clone(),
            })
            .unwrap();
        if group.configure(context_type, metadata_contexts, ccid_lists, devices).is_err() {
            return false;
        }
        group.update_stream_conf(devices);
        group.set_target_state(AseState::Streaming);
        true
    }

    fn configure_stream(
        &self,
        group: &mut LeAudioDeviceGroup,
        devices: &mut LeAudioDevices,
        context_type: LeAudioContextType,
        metadata_contexts: &BidirectionalPair<AudioContexts>,
        ccid_lists: &BidirectionalPair<Vec<u8>>,
    ) -> bool {
        self.0
            .send(MockGroupStateMachineEvents::ConfigureStream {
                group_id: group.group_id,
                context_type,
            })
            .unwrap();
        if group.configure(context_type, metadata_contexts, ccid_lists, devices).is_err() {
            return false;
        }
        group.pending_configuration = false;
        group.set_target_state(AseState::QosConfigured);
        true
    }

    fn stop_stream(&self, group: &mut LeAudioDeviceGroup, _devices: &mut LeAudioDevices) {
        self.0.send(MockGroupStateMachineEvents::StopStream(group.group_id)).unwrap();
        group.set_target_state(AseState::Idle);
    }

    fn suspend_stream(&self, group: &mut LeAudioDeviceGroup, _devices: &mut LeAudioDevices) {
        self.0.send(MockGroupStateMachineEvents::SuspendStream(group.group_id)).unwrap();
        group.set_target_state(AseState::QosConfigured);
    }

    fn attach_to_stream(
        &self,
        group: &mut LeAudioDeviceGroup,
        _devices: &mut LeAudioDevices,
        address: RawAddress,
        _ccid_lists: &BidirectionalPair<Vec<u8>>,
    ) -> bool {
        self.0.send(MockGroupStateMachineEvents::AttachToStream(group.group_id, address)).unwrap();
        true
    }
}
