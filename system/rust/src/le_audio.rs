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

//! LE Audio unicast client: the models of remote audio devices and their
//! coordinated sets, and the session logic bridging the local audio HAL with
//! the group streams.

use crate::core::address::RawAddress;

use self::{
    device::LeAudioDevices,
    group::{LeAudioDeviceGroup, StreamParameters},
    ids::GroupId,
    set_configuration::LeAudioCodecConfiguration,
    types::{AudioContexts, AudioLocations, BidirectionalPair, Directions, LeAudioContextType},
};

pub mod ase;
pub mod ccid;
pub mod client;
pub mod context_policy;
pub mod device;
pub mod group;
pub mod ids;
pub mod ltv;
pub mod mocks;
pub mod parser;
pub mod set_configuration;
pub mod storage;
pub mod types;

mod reader;
mod writer;

/// Stream status of a group, as reported by the group state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GroupStreamStatus {
    Idle,
    Streaming,
    Releasing,
    Suspending,
    Suspended,
    ConfiguredAutonomous,
    ConfiguredByUser,
    Destroyed,
}

/// Whether a group is the one the local audio is routed to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupStatus {
    Inactive,
    Active,
}

/// State of one direction of the local audio, as seen by the session
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum AudioState {
    #[default]
    Idle,
    ReadyToStart,
    Started,
    ReadyToRelease,
    Releasing,
}

impl AudioState {
    /// Starting or started
    pub fn is_streaming(&self) -> bool {
        matches!(self, AudioState::ReadyToStart | AudioState::Started)
    }
}

/// Outcome of re-evaluating the local codec configurations of a group
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioReconfigurationResult {
    Needed,
    NotNeeded,
    NotPossible,
}

/// The protocol level state machine walking the ASEs of a group through
/// their states. It reports back through
/// [`client::LeAudioClient::on_state_machine_status_report`].
pub trait GroupStateMachine {
    /// Configures the group for `context_type` and enables its ASEs
    fn start_stream(
        &self,
        group: &mut LeAudioDeviceGroup,
        devices: &mut LeAudioDevices,
        context_type: LeAudioContextType,
        metadata_contexts: &BidirectionalPair<AudioContexts>,
        ccid_lists: &BidirectionalPair<Vec<u8>>,
    ) -> bool;

    /// Configures the group for `context_type` without enabling it
    fn configure_stream(
        &self,
        group: &mut LeAudioDeviceGroup,
        devices: &mut LeAudioDevices,
        context_type: LeAudioContextType,
        metadata_contexts: &BidirectionalPair<AudioContexts>,
        ccid_lists: &BidirectionalPair<Vec<u8>>,
    ) -> bool;

    /// Releases all the ASEs of the group
    fn stop_stream(&self, group: &mut LeAudioDeviceGroup, devices: &mut LeAudioDevices);

    /// Disables all the ASEs of the group, keeping their configuration
    fn suspend_stream(&self, group: &mut LeAudioDeviceGroup, devices: &mut LeAudioDevices);

    /// Brings a freshly connected member into the ongoing stream of its group
    fn attach_to_stream(
        &self,
        group: &mut LeAudioDeviceGroup,
        devices: &mut LeAudioDevices,
        address: RawAddress,
        ccid_lists: &BidirectionalPair<Vec<u8>>,
    ) -> bool;
}

/// One direction of the local audio HAL
pub trait AudioHalClient {
    /// Opens the audio session with the given local format
    fn start(&self, codec_config: &LeAudioCodecConfiguration) -> bool;
    fn stop(&self);
    fn confirm_streaming_request(&self);
    fn cancel_streaming_request(&self);
    fn suspended_for_reconfiguration(&self);
    fn reconfiguration_complete(&self);
    fn update_remote_delay(&self, delay_ms: u16);
    /// Tells the HAL about the parameters of the established stream
    fn update_audio_config(&self, stream_params: &StreamParameters);
}

/// Notifications for the upper layer
pub trait LeAudioClientCallbacks {
    fn on_group_status(&self, group_id: GroupId, status: GroupStatus);
    /// Only `Streaming` and `Idle` are reported, once per change
    fn on_group_stream_status(&self, group_id: GroupId, status: GroupStreamStatus);
    fn on_audio_conf(
        &self,
        directions: Directions,
        group_id: GroupId,
        sink_locations: AudioLocations,
        source_locations: AudioLocations,
        available_contexts: AudioContexts,
    );
}

/// Manages the ACL links of the devices
pub trait DeviceConnector {
    fn connect(&self, address: RawAddress);
    /// Disconnects the device. With `recover`, the device is reconnected
    /// right away.
    fn disconnect(&self, address: RawAddress, recover: bool);
}
