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

//! The LE Audio unicast client session. It owns the device and group
//! registries and drives two local audio directions:
//! - the "sender", local source to remote sink
//! - the "receiver", remote source to local sink
//!
//! All entry points run on the LE Audio thread; timers re-enter through a
//! weak reference to the client.

use log::{debug, error, info, warn};
use std::{
    cell::RefCell,
    collections::HashMap,
    rc::{Rc, Weak},
    time::Duration,
};
use tokio::{task::spawn_local, time::sleep};

use crate::{core::address::RawAddress, utils::owned_handle::OwnedHandle};

use super::{
    ase::Ase,
    ccid::ContentControlIdKeeper,
    context_policy::{
        apply_remote_metadata_audio_context_policy, choose_configuration_context_type,
        choose_metadata_context_type, directional_realign_metadata_audio_contexts,
        get_audio_contexts_from_sink_metadata, get_audio_contexts_from_source_metadata, CallState,
        GroupContexts, PlaybackTrackMetadata, RecordTrackMetadata, NON_DISRUPTIVE_CONTEXTS,
    },
    device::{DeviceConnectState, LeAudioDevice, LeAudioDevices},
    group::{LeAudioDeviceGroup, LeAudioDeviceGroups},
    ids::{AttHandle, ConnectionId, GroupId, HandlePair},
    parser::ParseError,
    set_configuration::{AudioSetConfigurationProvider, LeAudioCodecConfiguration},
    storage,
    types::{AseState, AudioContexts, BidirectionalPair, Direction, Directions, LeAudioContextType},
    AudioHalClient, AudioReconfigurationResult, AudioState, DeviceConnector, GroupStateMachine,
    GroupStatus, GroupStreamStatus, LeAudioClientCallbacks,
};

/// Delay before a timer retries reaching a client that is borrowed
const BUSY_RETRY_DELAY: Duration = Duration::from_millis(5);

/// Local format offered to the audio framework for playback
const AUDIO_FRAMEWORK_SOURCE_CONFIG: LeAudioCodecConfiguration = LeAudioCodecConfiguration {
    num_channels: 2,
    sample_rate: 48000,
    bits_per_sample: 16,
    data_interval_us: 10000,
};

/// Local format offered to the audio framework for recording
const AUDIO_FRAMEWORK_SINK_CONFIG: LeAudioCodecConfiguration = LeAudioCodecConfiguration {
    num_channels: 1,
    sample_rate: 16000,
    bits_per_sample: 16,
    data_interval_us: 10000,
};

/// Tunables of the client
#[derive(Clone, Debug)]
pub struct LeAudioConfig {
    /// Put every requested context in the metadata instead of the most
    /// important one
    pub allow_multiple_contexts_in_metadata: bool,
    /// Time a suspended group keeps its stream before it is released
    pub suspend_timeout: Duration,
    /// When set, a suspended group is first disabled after this long
    pub stream_disable_timeout: Option<Duration>,
    /// Time the back channel may stay closed before the playback contexts are
    /// re-evaluated
    pub vbc_close_timeout: Duration,
    /// Delay before retrying to attach a device to an ongoing stream
    pub attach_retry_delay: Duration,
}

impl Default for LeAudioConfig {
    fn default() -> Self {
        Self {
            allow_multiple_contexts_in_metadata: true,
            suspend_timeout: Duration::from_millis(5000),
            stream_disable_timeout: None,
            vbc_close_timeout: Duration::from_millis(2000),
            attach_retry_delay: Duration::from_millis(500),
        }
    }
}

/// The collaborators of the client
pub struct LeAudioInterfaces {
    pub state_machine: Rc<dyn GroupStateMachine>,
    /// Local source, feeding the remote sinks
    pub source_hal: Rc<dyn AudioHalClient>,
    /// Local sink, fed by the remote sources
    pub sink_hal: Rc<dyn AudioHalClient>,
    pub callbacks: Rc<dyn LeAudioClientCallbacks>,
    pub connector: Rc<dyn DeviceConnector>,
}

/// Everything persisted about a device
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoredDevice {
    pub sink_pacs: Option<Vec<u8>>,
    pub source_pacs: Option<Vec<u8>>,
    pub ases: Option<Vec<u8>>,
    pub handles: Option<Vec<u8>>,
}

/// The unicast client
pub struct LeAudioClient {
    config: LeAudioConfig,
    devices: LeAudioDevices,
    groups: LeAudioDeviceGroups,
    ccids: ContentControlIdKeeper,

    state_machine: Rc<dyn GroupStateMachine>,
    source_hal: Rc<dyn AudioHalClient>,
    sink_hal: Rc<dyn AudioHalClient>,
    callbacks: Rc<dyn LeAudioClientCallbacks>,
    connector: Rc<dyn DeviceConnector>,

    active_group_id: GroupId,
    configuration_context_type: LeAudioContextType,
    /// Contexts of the local tracks: playback in `source`, record in `sink`
    local_metadata_context_types: BidirectionalPair<AudioContexts>,
    call: CallState,

    audio_sender_state: AudioState,
    audio_receiver_state: AudioState,
    /// Local format of the sender, `None` if the configuration has no sink
    current_source_codec_config: Option<LeAudioCodecConfiguration>,
    /// Local format of the receiver, `None` if the configuration has no
    /// source
    current_sink_codec_config: Option<LeAudioCodecConfiguration>,

    last_notified_stream_status: HashMap<GroupId, GroupStreamStatus>,

    suspend_timer: Option<OwnedHandle<()>>,
    disable_timer: Option<OwnedHandle<()>>,
    vbc_close_timer: Option<OwnedHandle<()>>,
    attach_timers: HashMap<RawAddress, OwnedHandle<()>>,

    weak_self: Weak<RefCell<LeAudioClient>>,
}

impl LeAudioClient {
    /// Constructor
    pub fn new(
        config: LeAudioConfig,
        provider: Rc<dyn AudioSetConfigurationProvider>,
        interfaces: LeAudioInterfaces,
    ) -> Rc<RefCell<Self>> {
        Rc::new_cyclic(|weak_self| {
            RefCell::new(Self {
                config,
                devices: LeAudioDevices::new(),
                groups: LeAudioDeviceGroups::new(provider),
                ccids: ContentControlIdKeeper::new(),
                state_machine: interfaces.state_machine,
                source_hal: interfaces.source_hal,
                sink_hal: interfaces.sink_hal,
                callbacks: interfaces.callbacks,
                connector: interfaces.connector,
                active_group_id: GroupId::UNKNOWN,
                configuration_context_type: LeAudioContextType::Uninitialized,
                local_metadata_context_types: BidirectionalPair::default(),
                call: CallState::default(),
                audio_sender_state: AudioState::Idle,
                audio_receiver_state: AudioState::Idle,
                current_source_codec_config: None,
                current_sink_codec_config: None,
                last_notified_stream_status: HashMap::new(),
                suspend_timer: None,
                disable_timer: None,
                vbc_close_timer: None,
                attach_timers: HashMap::new(),
                weak_self: weak_self.clone(),
            })
        })
    }

    pub fn active_group_id(&self) -> GroupId {
        self.active_group_id
    }

    pub fn configuration_context_type(&self) -> LeAudioContextType {
        self.configuration_context_type
    }

    pub fn audio_sender_state(&self) -> AudioState {
        self.audio_sender_state
    }

    pub fn audio_receiver_state(&self) -> AudioState {
        self.audio_receiver_state
    }

    pub fn group(&self, group_id: GroupId) -> Option<&LeAudioDeviceGroup> {
        self.groups.find_by_id(group_id)
    }

    /// Lets the group state machine update the group it reports about
    pub fn group_mut(&mut self, group_id: GroupId) -> Option<&mut LeAudioDeviceGroup> {
        self.groups.find_by_id_mut(group_id)
    }

    pub fn device(&self, address: &RawAddress) -> Option<&LeAudioDevice> {
        self.devices.find_by_address(address)
    }

    /// Whether either local direction is started
    pub fn is_in_streaming(&self) -> bool {
        self.audio_sender_state == AudioState::Started
            || self.audio_receiver_state == AudioState::Started
    }

    pub fn set_in_call(&mut self, in_call: bool) {
        info!("in call: {in_call}");
        self.call.in_call = in_call;
    }

    pub fn is_in_call(&self) -> bool {
        self.call.in_call
    }

    pub fn set_in_voip_call(&mut self, in_voip_call: bool) {
        info!("in voip call: {in_voip_call}");
        self.call.in_voip_call = in_voip_call;
    }

    pub fn is_in_voip_call(&self) -> bool {
        self.call.in_voip_call
    }

    /// Registers the content control service serving `context_types`
    pub fn set_ccid_information(&mut self, ccid: u8, context_types: u16) {
        debug!("ccid {ccid}, contexts {context_types:#06x}");
        self.ccids.set_ccid(AudioContexts::from_bits_truncate(context_types), ccid);
    }

    fn schedule(
        &self,
        delay: Duration,
        f: impl FnOnce(&mut LeAudioClient) + 'static,
    ) -> OwnedHandle<()> {
        let weak_self = self.weak_self.clone();
        spawn_local(async move {
            sleep(delay).await;
            let mut f = Some(f);
            loop {
                {
                    let Some(client) = weak_self.upgrade() else { return };
                    if let Ok(mut client) = client.try_borrow_mut() {
                        if let Some(f) = f.take() {
                            f(&mut client);
                        }
                        return;
                    };
                }
                debug!("client busy, retrying timer event");
                sleep(BUSY_RETRY_DELAY).await;
            }
        })
        .into()
    }

    // Device registry

    /// Adds a device to the registry and to `group_id`
    pub fn add_device(&mut self, address: RawAddress, group_id: GroupId) -> bool {
        if !self.devices.add(address, DeviceConnectState::Disconnected, GroupId::UNKNOWN) {
            return false;
        }
        if group_id.is_known() {
            self.groups.add_device(group_id, address, &mut self.devices);
        }
        true
    }

    /// Restores a device learned in a previous session. Malformed blobs are
    /// skipped; discovery has to fill the gap.
    pub fn load_device(
        &mut self,
        address: RawAddress,
        group_id: GroupId,
        autoconnect: bool,
        stored: &StoredDevice,
    ) -> bool {
        if !self.add_device(address, group_id) {
            return false;
        }
        let Some(device) = self.devices.find_by_address_mut(&address) else { return false };
        device.autoconnect_flag = autoconnect;

        let mut results = vec![];
        if let Some(blob) = &stored.handles {
            results.push(storage::deserialize_handles(device, blob));
        }
        if let Some(blob) = &stored.sink_pacs {
            results.push(storage::deserialize_pacs(device, Direction::Sink, blob));
        }
        if let Some(blob) = &stored.source_pacs {
            results.push(storage::deserialize_pacs(device, Direction::Source, blob));
        }
        if let Some(blob) = &stored.ases {
            results.push(storage::deserialize_ases(device, blob));
        }
        for err in results.into_iter().filter_map(Result::err) {
            warn!("{address:?}: stored data dropped: {err:?}");
        }

        for address in self.devices.set_initial_group_autoconnect_state(group_id, autoconnect) {
            self.connector.connect(address);
        }
        true
    }

    /// What should be persisted about a device
    pub fn stored_device(&self, address: &RawAddress) -> Option<StoredDevice> {
        let device = self.devices.find_by_address(address)?;
        Some(StoredDevice {
            sink_pacs: storage::serialize_pacs(device, Direction::Sink),
            source_pacs: storage::serialize_pacs(device, Direction::Source),
            ases: storage::serialize_ases(device),
            handles: storage::serialize_handles(device),
        })
    }

    /// Removes a device. A device still streaming is disconnected first and
    /// removed once its group is idle.
    pub fn remove_device(&mut self, address: RawAddress) {
        let Some(device) = self.devices.find_by_address_mut(&address) else {
            warn!("unknown device {address:?}");
            return;
        };
        if device.is_connected() {
            info!("{address:?}: disconnecting before removal");
            device.connection_state = DeviceConnectState::Removing;
            device.autoconnect_flag = false;
            self.disconnect_device(address, false);
            return;
        }
        self.remove_device_node(address);
    }

    fn remove_device_node(&mut self, address: RawAddress) {
        let Some(device) = self.devices.find_by_address(&address) else { return };
        let group_id = device.group_id;
        self.attach_timers.remove(&address);
        self.groups.remove_device(group_id, &address, &mut self.devices);
        self.devices.remove(&address);
        info!("{address:?}: removed");
    }

    /// Records a new ASE found during discovery
    pub fn add_ase(&mut self, address: RawAddress, hdls: HandlePair, direction: Direction, id: u8) {
        match self.devices.find_by_address_mut(&address) {
            Some(device) => device.ases.push(Ase::new(hdls, direction, id)),
            None => warn!("unknown device {address:?}"),
        }
    }

    /// GATT connection established
    pub fn on_connected(&mut self, address: RawAddress, conn_id: ConnectionId) {
        let Some(device) = self.devices.find_by_address_mut(&address) else {
            warn!("unknown device {address:?}");
            return;
        };
        device.connection_state = if device.autoconnect_flag {
            DeviceConnectState::ConnectedAutoconnectGettingReady
        } else {
            DeviceConnectState::ConnectedByUserGettingReady
        };
        self.devices.set_conn_id(&address, conn_id);
    }

    /// Discovery and initial reads are done; the device can stream
    pub fn on_device_ready(&mut self, address: RawAddress) {
        let Some(device) = self.devices.find_by_address_mut(&address) else { return };
        device.connection_state = DeviceConnectState::Connected;
        device.autoconnect_flag = true;
        let group_id = device.group_id;
        info!("{address:?}: ready in group {group_id:?}");

        self.update_locations_and_contexts_availability(group_id);
        self.attach_to_streaming_group_if_needed(address);
    }

    /// GATT connection lost
    pub fn on_disconnected(&mut self, address: RawAddress) {
        let Some(device) = self.devices.find_by_address_mut(&address) else { return };
        device.deactivate_all_ases();
        device.closing_stream_for_disconnection = false;
        let group_id = device.group_id;
        let previous_state = device.connection_state;
        device.connection_state = match previous_state {
            DeviceConnectState::DisconnectingAndRecover => DeviceConnectState::ConnectingAutoconnect,
            DeviceConnectState::Removing => DeviceConnectState::Removing,
            _ if device.autoconnect_flag => DeviceConnectState::ConnectingAutoconnect,
            _ => DeviceConnectState::Disconnected,
        };
        let reconnect = device.connection_state == DeviceConnectState::ConnectingAutoconnect;
        self.devices.set_conn_id(&address, ConnectionId::INVALID);
        self.attach_timers.remove(&address);
        info!("{address:?}: disconnected from {previous_state:?}");

        if previous_state == DeviceConnectState::Removing {
            self.remove_device_node(address);
        } else if reconnect {
            self.connector.connect(address);
        }

        self.update_locations_and_contexts_availability(group_id);
        let group_connected = self
            .groups
            .find_by_id(group_id)
            .is_some_and(|group| group.is_any_device_connected(&self.devices));
        if group_id == self.active_group_id && !group_connected {
            info!("group {group_id:?}: last device gone");
            self.group_set_and_notify_inactive();
        }
    }

    fn update_device<T>(
        &mut self,
        address: RawAddress,
        update: impl FnOnce(&mut LeAudioDevice) -> Result<T, ParseError>,
    ) -> Option<T> {
        let Some(device) = self.devices.find_by_address_mut(&address) else {
            warn!("unknown device {address:?}");
            return None;
        };
        match update(device) {
            Ok(result) => Some(result),
            Err(err) => {
                error!("{address:?}: malformed attribute value: {err:?}");
                None
            }
        }
    }

    fn device_group_id(&self, address: &RawAddress) -> GroupId {
        self.devices.find_by_address(address).map_or(GroupId::UNKNOWN, |device| device.group_id)
    }

    /// A PAC characteristic was read or notified
    pub fn on_pacs(
        &mut self,
        address: RawAddress,
        direction: Direction,
        hdls: HandlePair,
        value: &[u8],
    ) -> bool {
        if self.update_device(address, |device| device.register_pacs(direction, hdls, value)).is_none()
        {
            return false;
        }
        let group_id = self.device_group_id(&address);
        if let Some(group) = self.groups.find_by_id_mut(group_id) {
            group.invalidate_cached_configurations();
        }
        self.update_locations_and_contexts_availability(group_id);
        true
    }

    /// An audio locations characteristic was read or notified
    pub fn on_audio_locations(&mut self, address: RawAddress, direction: Direction, value: &[u8]) {
        if self.update_device(address, |device| device.update_audio_locations(direction, value))
            == Some(true)
        {
            let group_id = self.device_group_id(&address);
            self.update_locations_and_contexts_availability(group_id);
        }
    }

    pub fn on_supported_contexts(&mut self, address: RawAddress, value: &[u8]) {
        if self.update_device(address, |device| device.update_supported_contexts(value)).is_some() {
            let group_id = self.device_group_id(&address);
            self.update_locations_and_contexts_availability(group_id);
        }
    }

    pub fn on_available_contexts(&mut self, address: RawAddress, value: &[u8]) {
        if self.update_device(address, |device| device.update_available_contexts(value))
            == Some(true)
        {
            let group_id = self.device_group_id(&address);
            self.update_locations_and_contexts_availability(group_id);
        }
    }

    /// An ASE characteristic was read or notified. The state change itself
    /// is for the group state machine to act on.
    pub fn on_ase_status(&mut self, address: RawAddress, val_hdl: AttHandle, value: &[u8]) {
        let Some(device) = self.devices.find_by_address_mut(&address) else {
            warn!("unknown device {address:?}");
            return;
        };
        let Some(ase) = device.get_ase_by_val_hdl_mut(val_hdl) else {
            warn!("{address:?}: no ASE at {val_hdl:?}");
            return;
        };
        match ase.apply_status(value) {
            Ok(state) => debug!("{address:?}: ASE {val_hdl:?} in {state:?}"),
            Err(err) => error!("{address:?}: malformed ASE status: {err:?}"),
        }
    }

    fn update_locations_and_contexts_availability(&mut self, group_id: GroupId) {
        let Some(group) = self.groups.find_by_id_mut(group_id) else { return };
        let mut changed = group.reload_audio_locations(&self.devices);
        changed |= group.reload_audio_directions(&self.devices);
        changed |= group.update_audio_context_availability(&self.devices);
        if !changed {
            return;
        }

        group.invalidate_cached_configurations();
        self.callbacks.on_audio_conf(
            group.audio_directions,
            group_id,
            group.audio_locations.sink,
            group.audio_locations.source,
            group.available_contexts.union(),
        );
    }

    fn attach_to_streaming_group_if_needed(&mut self, address: RawAddress) {
        let group_id = self.device_group_id(&address);
        if group_id != self.active_group_id {
            debug!("group {group_id:?} is not active, nothing to attach to");
            return;
        }
        let Some(device) = self.devices.find_by_address(&address) else { return };
        let Some(group) = self.groups.find_by_id_mut(group_id) else { return };

        if !group.metadata_context_type.union().intersects(device.available_contexts.union()) {
            info!("{address:?} does not have the streamed contexts");
            return;
        }
        if self.audio_sender_state == AudioState::Idle
            && self.audio_receiver_state == AudioState::Idle
        {
            debug!("group {group_id:?} is active but not streaming");
            return;
        }
        let Some(conf) = group.stream_conf.conf.clone() else {
            info!("group {group_id:?} has no configuration yet");
            return;
        };

        let device_fits = Direction::BOTH.into_iter().all(|direction| {
            conf.confs[direction].first().map_or(true, |ent| {
                device.ase_count(direction) > 0
                    && device.get_codec_configuration_supported_pac(direction, &ent.codec).is_some()
            })
        });
        if !device_fits {
            info!("group {group_id:?}: {} does not fit {address:?}, reconfiguring", conf.name);
            group.pending_configuration = true;
            self.state_machine.stop_stream(group, &mut self.devices);
            return;
        }

        let mut ccid_contexts = group.metadata_context_type;
        if self.call.in_voip_call && !self.call.in_call {
            ccid_contexts.sink.remove(AudioContexts::CONVERSATIONAL);
            ccid_contexts.source.remove(AudioContexts::CONVERSATIONAL);
        }
        let ccid_lists = BidirectionalPair::new(
            self.ccids.get_all_ccids(ccid_contexts.sink),
            self.ccids.get_all_ccids(ccid_contexts.source),
        );

        if !self.state_machine.attach_to_stream(group, &mut self.devices, address, &ccid_lists) {
            warn!("{address:?}: could not attach to group {group_id:?}, retrying later");
            let timer = self.schedule(self.config.attach_retry_delay, move |client| {
                client.attach_timers.remove(&address);
                client.restart_attach_to_the_stream(address)
            });
            self.attach_timers.insert(address, timer);
        }
    }

    fn restart_attach_to_the_stream(&mut self, address: RawAddress) {
        match self.devices.find_by_address(&address) {
            Some(device) if device.is_connected() => {
                self.attach_to_streaming_group_if_needed(address)
            }
            _ => info!("{address:?} is not available anymore"),
        }
    }

    /// Connects a device on user request
    pub fn connect(&mut self, address: RawAddress) {
        let Some(device) = self.devices.find_by_address_mut(&address) else {
            warn!("unknown device {address:?}");
            return;
        };
        if device.is_connected() {
            info!("{address:?} already connected");
            return;
        }
        device.connection_state = DeviceConnectState::ConnectingByUser;
        self.connector.connect(address);
    }

    /// Disconnects a device on user request. Autoconnect is dropped.
    pub fn disconnect(&mut self, address: RawAddress) {
        let Some(device) = self.devices.find_by_address_mut(&address) else {
            warn!("unknown device {address:?}");
            return;
        };
        device.autoconnect_flag = false;
        if device.connection_state != DeviceConnectState::Removing {
            device.connection_state = DeviceConnectState::Disconnecting;
        }
        self.disconnect_device(address, false);
    }

    /// The last device streaming in its group first closes the stream; the
    /// link goes down once the group reports idle.
    fn disconnect_device(&mut self, address: RawAddress, recover: bool) {
        let Some(device) = self.devices.find_by_address(&address) else { return };
        let group_id = device.group_id;
        if device.have_active_ase() {
            if let Some(group) = self.groups.find_by_id_mut(group_id) {
                if group.active_devices(&self.devices).len() == 1 {
                    if let Some(device) = self.devices.find_by_address_mut(&address) {
                        device.closing_stream_for_disconnection = true;
                    }
                    info!("{address:?}: closing the stream of group {group_id:?} first");
                    self.state_machine.stop_stream(group, &mut self.devices);
                    return;
                }
            }
        }
        self.connector.disconnect(address, recover);
    }

    fn handle_pending_device_disconnection(&mut self, group_id: GroupId) {
        let Some(group) = self.groups.find_by_id(group_id) else { return };
        let mut pending = vec![];
        for address in group.members() {
            if let Some(device) = self.devices.find_by_address_mut(address) {
                if device.closing_stream_for_disconnection {
                    device.closing_stream_for_disconnection = false;
                    pending.push(*address);
                }
            }
        }
        for address in pending {
            debug!("group {group_id:?}: disconnecting {address:?}");
            self.connector.disconnect(address, false);
        }
    }

    // Group operations

    /// Makes `group_id` the group the local audio is routed to.
    /// `GroupId::UNKNOWN` deactivates the current one.
    pub fn group_set_active(&mut self, group_id: GroupId) {
        info!("group_id: {group_id:?}");
        if !group_id.is_known() {
            if !self.active_group_id.is_known() {
                return;
            }
            let group_id_to_close = self.active_group_id;
            self.group_set_and_notify_inactive();
            self.group_stop(group_id_to_close);
            return;
        }

        let Some(group) = self.groups.find_by_id_mut(group_id) else {
            error!("invalid group: {group_id:?}");
            return;
        };
        if self.active_group_id == group_id {
            info!("group {group_id:?} is already active");
            self.callbacks.on_group_status(group_id, GroupStatus::Active);
            return;
        }

        let current = self.configuration_context_type;
        let default_context_type = if current != LeAudioContextType::Uninitialized
            && group.get_configuration(current, &self.devices).is_some()
        {
            current
        } else if group.get_configuration(LeAudioContextType::Unspecified, &self.devices).is_some() {
            LeAudioContextType::Unspecified
        } else {
            LeAudioContextType::ALL
                .into_iter()
                .find(|context_type| group.get_configuration(*context_type, &self.devices).is_some())
                .unwrap_or(current)
        };

        self.update_config_and_check_if_reconfiguration_is_needed(group_id, default_context_type);
        if self.current_source_codec_config.is_none() && self.current_sink_codec_config.is_none() {
            error!("group {group_id:?}: unsupported device configurations");
            return;
        }

        let previous_active_group = self.active_group_id;
        info!("active group changed {previous_active_group:?} -> {group_id:?}");
        if !previous_active_group.is_known() {
            self.start_audio_session(group_id);
            self.active_group_id = group_id;
        } else {
            // The new group is set first so the status reports of the old one
            // are not taken for the active group
            self.active_group_id = group_id;
            self.group_stop(previous_active_group);
            self.callbacks.on_group_status(previous_active_group, GroupStatus::Inactive);
        }
        self.callbacks.on_group_status(group_id, GroupStatus::Active);
    }

    fn start_audio_session(&mut self, group_id: GroupId) {
        let data_interval_us = self
            .current_source_codec_config
            .or(self.current_sink_codec_config)
            .map_or(AUDIO_FRAMEWORK_SOURCE_CONFIG.data_interval_us, |config| {
                config.data_interval_us
            });

        let source_config =
            LeAudioCodecConfiguration { data_interval_us, ..AUDIO_FRAMEWORK_SOURCE_CONFIG };
        if !self.source_hal.start(&source_config) {
            error!("could not start the local source session");
        }

        let mut sink_config =
            LeAudioCodecConfiguration { data_interval_us, ..AUDIO_FRAMEWORK_SINK_CONFIG };
        let conversational = self.groups.find_by_id_mut(group_id).and_then(|group| {
            group.get_codec_configuration_by_direction(
                LeAudioContextType::Conversational,
                Direction::Source,
                &self.devices,
            )
        });
        if let Some(conversational) = conversational {
            sink_config.sample_rate = sink_config.sample_rate.max(conversational.sample_rate);
        }
        if !self.sink_hal.start(&sink_config) {
            error!("could not start the local sink session");
        }
    }

    fn group_set_and_notify_inactive(&mut self) {
        if !self.active_group_id.is_known() {
            return;
        }
        let group_id = std::mem::replace(&mut self.active_group_id, GroupId::UNKNOWN);
        info!("group {group_id:?} is not active anymore");
        self.suspend_timer = None;
        self.stop_audio();
        self.source_hal.stop();
        self.sink_hal.stop();
        self.callbacks.on_group_status(group_id, GroupStatus::Inactive);
    }

    /// Starts streaming `context_type` on a group outside of the local audio
    /// flow
    pub fn group_stream(&mut self, group_id: GroupId, context_type: u16) -> bool {
        let Some(configuration_context_type) = LeAudioContextType::from_u16(context_type) else {
            error!("not a single context type: {context_type:#06x}");
            return false;
        };
        let contexts = AudioContexts::from_bits_truncate(context_type);
        self.group_stream_with_contexts(
            group_id,
            configuration_context_type,
            BidirectionalPair::new(contexts, contexts),
        )
    }

    fn group_stream_with_contexts(
        &mut self,
        group_id: GroupId,
        configuration_context_type: LeAudioContextType,
        mut remote_contexts: BidirectionalPair<AudioContexts>,
    ) -> bool {
        debug!("configuration context type {configuration_context_type:?}");
        if configuration_context_type >= LeAudioContextType::Rfu {
            error!("stream context type not supported: {configuration_context_type:?}");
            return false;
        }
        let Some(group) = self.groups.find_by_id_mut(group_id) else {
            error!("unknown group: {group_id:?}");
            return false;
        };
        if !group.is_any_device_connected(&self.devices) {
            error!("group {group_id:?} is not connected");
            return false;
        }
        if group.is_in_transition() {
            warn!(
                "group {group_id:?} in transition from {:?} to {:?}",
                group.get_state(),
                group.get_target_state()
            );
            return false;
        }

        // Local sink metadata has no place in a sink only scenario
        if !AudioContexts::ALL_BIDIR.test(configuration_context_type) {
            remote_contexts.source = AudioContexts::empty();
        }

        // The telephony bearer is not involved in VoIP calls
        let mut ccid_contexts = remote_contexts;
        if self.call.in_voip_call && !self.call.in_call {
            ccid_contexts.sink.remove(AudioContexts::CONVERSATIONAL);
            ccid_contexts.source.remove(AudioContexts::CONVERSATIONAL);
        }
        let ccid_lists = BidirectionalPair::new(
            self.ccids.get_all_ccids(ccid_contexts.sink),
            self.ccids.get_all_ccids(ccid_contexts.source),
        );

        if group.pending_configuration {
            return self.state_machine.configure_stream(
                group,
                &mut self.devices,
                self.configuration_context_type,
                &remote_contexts,
                &ccid_lists,
            );
        }
        self.state_machine.start_stream(
            group,
            &mut self.devices,
            configuration_context_type,
            &remote_contexts,
            &ccid_lists,
        )
    }

    /// Suspends a streaming group, keeping its configuration
    pub fn group_suspend(&mut self, group_id: GroupId) {
        let Some(group) = self.groups.find_by_id_mut(group_id) else {
            error!("unknown group: {group_id:?}");
            return;
        };
        if !group.is_any_device_connected(&self.devices) {
            error!("group {group_id:?} is not connected");
            return;
        }
        if group.is_in_transition() {
            info!(
                "group {group_id:?} in transition from {:?} to {:?}",
                group.get_state(),
                group.get_target_state()
            );
            return;
        }
        if group.get_state() != AseState::Streaming {
            error!("group {group_id:?}: cannot suspend in {:?}", group.get_state());
            return;
        }
        self.state_machine.suspend_stream(group, &mut self.devices);
    }

    /// Releases the stream of a group
    pub fn group_stop(&mut self, group_id: GroupId) {
        let Some(group) = self.groups.find_by_id_mut(group_id) else {
            error!("unknown group: {group_id:?}");
            return;
        };
        if group.is_empty() {
            error!("group {group_id:?} is empty");
            return;
        }
        if group.get_state() == AseState::Idle {
            if group.get_target_state() != AseState::Idle {
                warn!("group {group_id:?} was about to stream, canceling {:?}", group.get_target_state());
                group.set_target_state(AseState::Idle);
            } else {
                warn!("group {group_id:?} already stopped");
            }
            return;
        }
        self.state_machine.stop_stream(group, &mut self.devices);
    }

    /// Removes every member of a group
    pub fn group_destroy(&mut self, group_id: GroupId) {
        let Some(group) = self.groups.find_by_id(group_id) else {
            error!("unknown group: {group_id:?}");
            return;
        };
        for address in group.members().to_vec() {
            self.remove_device(address);
        }
    }

    // Local audio

    fn confirm_local_audio_source_streaming_request(&mut self) {
        self.source_hal.confirm_streaming_request();
        debug!("sender {:?} -> Started", self.audio_sender_state);
        self.audio_sender_state = AudioState::Started;
    }

    fn confirm_local_audio_sink_streaming_request(&mut self) {
        self.sink_hal.confirm_streaming_request();
        debug!("receiver {:?} -> Started", self.audio_receiver_state);
        self.audio_receiver_state = AudioState::Started;
    }

    fn cancel_local_audio_source_streaming_request(&mut self) {
        self.source_hal.cancel_streaming_request();
        debug!("sender {:?} -> Idle", self.audio_sender_state);
        self.audio_sender_state = AudioState::Idle;
    }

    fn cancel_local_audio_sink_streaming_request(&mut self) {
        self.sink_hal.cancel_streaming_request();
        debug!("receiver {:?} -> Idle", self.audio_receiver_state);
        self.audio_receiver_state = AudioState::Idle;
    }

    fn cancel_streaming_request(&mut self) {
        if self.audio_sender_state >= AudioState::ReadyToStart {
            self.cancel_local_audio_source_streaming_request();
        }
        if self.audio_receiver_state >= AudioState::ReadyToStart {
            self.cancel_local_audio_sink_streaming_request();
        }
    }

    fn stop_audio(&mut self) {
        self.cancel_streaming_request();
    }

    fn suspended_for_reconfiguration(&self) {
        if self.audio_sender_state > AudioState::Idle {
            self.source_hal.suspended_for_reconfiguration();
        }
        if self.audio_receiver_state > AudioState::Idle {
            self.sink_hal.suspended_for_reconfiguration();
        }
    }

    fn reconfiguration_complete(&self, directions: Directions) {
        if directions.contains(Directions::SINK) {
            self.source_hal.reconfiguration_complete();
        }
        if directions.contains(Directions::SOURCE) {
            self.sink_hal.reconfiguration_complete();
        }
    }

    fn start_sending_audio(&mut self, group_id: GroupId) {
        let Some(group) = self.groups.find_by_id_mut(group_id) else { return };
        let stream_params = group.stream_conf.stream_params.sink.clone();
        if stream_params.stream_locations.is_empty() {
            error!("group {group_id:?}: no sink stream configuration");
            self.state_machine.stop_stream(group, &mut self.devices);
            return;
        }
        for (cis_conn_hdl, locations) in stream_params.stream_locations.iter() {
            debug!("sink CIS {cis_conn_hdl:#06x}, allocation {locations:?}");
        }

        let remote_delay_ms = group.get_remote_delay(Direction::Sink, &self.devices);
        self.source_hal.update_remote_delay(remote_delay_ms);
        self.confirm_local_audio_source_streaming_request();
        self.source_hal.update_audio_config(&stream_params);
    }

    fn start_receiving_audio(&mut self, group_id: GroupId) {
        let Some(group) = self.groups.find_by_id_mut(group_id) else { return };
        let stream_params = group.stream_conf.stream_params.source.clone();
        if stream_params.stream_locations.is_empty() {
            warn!("group {group_id:?}: no source stream configuration, microphone not configured");
            self.state_machine.stop_stream(group, &mut self.devices);
            return;
        }

        let remote_delay_ms = group.get_remote_delay(Direction::Source, &self.devices);
        self.sink_hal.update_remote_delay(remote_delay_ms);
        self.confirm_local_audio_sink_streaming_request();
        self.sink_hal.update_audio_config(&stream_params);
    }

    fn start_audio(&mut self, group_id: GroupId, remote_direction: Direction) {
        match remote_direction {
            Direction::Sink => self.start_sending_audio(group_id),
            Direction::Source => self.start_receiving_audio(group_id),
        }
    }

    fn is_direction_available_for_current_configuration(
        &mut self,
        group_id: GroupId,
        direction: Direction,
    ) -> bool {
        let context_type = self.configuration_context_type;
        let devices = &self.devices;
        self.groups.find_by_id_mut(group_id).is_some_and(|group| {
            group.get_codec_configuration_by_direction(context_type, direction, devices).is_some()
        })
    }

    fn group_state(&self, group_id: GroupId) -> Option<AseState> {
        self.groups.find_by_id(group_id).map(LeAudioDeviceGroup::get_state)
    }

    /// Resumes one direction while the other one already owns the stream
    fn join_ongoing_stream(&mut self, group_id: GroupId, remote_direction: Direction) {
        if self.group_state(group_id) != Some(AseState::Streaming) {
            error!(
                "{remote_direction:?} resume in wrong state, sender {:?}, receiver {:?}",
                self.audio_sender_state, self.audio_receiver_state
            );
            self.cancel_streaming_request();
            return;
        }
        if self.is_direction_available_for_current_configuration(group_id, remote_direction) {
            self.start_audio(group_id, remote_direction);
        } else {
            warn!(
                "{remote_direction:?} is not configured, reconfiguring to {:?}",
                self.configuration_context_type
            );
            self.set_configuration_and_stop_stream_when_needed(
                group_id,
                self.configuration_context_type,
            );
        }
    }

    fn reconfigure_when_direction_unavailable(&mut self, group_id: GroupId, direction: Direction) {
        if !self.is_direction_available_for_current_configuration(group_id, direction) {
            warn!(
                "{direction:?} is not configured, reconfiguring to {:?}",
                self.configuration_context_type
            );
            self.set_configuration_and_stop_stream_when_needed(
                group_id,
                self.configuration_context_type,
            );
        }
    }

    /// The local source wants to play, towards the remote sinks
    pub fn on_local_audio_source_resume(&mut self) {
        info!(
            "group {:?}, sender {:?}, receiver {:?}",
            self.active_group_id, self.audio_sender_state, self.audio_receiver_state
        );
        let group_id = self.active_group_id;
        if self.groups.find_by_id(group_id).is_none() {
            error!("invalid group: {group_id:?}");
            return;
        }
        if !self.is_direction_available_for_current_configuration(group_id, Direction::Sink) {
            error!("invalid resume request for {:?}", self.configuration_context_type);
            self.cancel_local_audio_source_streaming_request();
            return;
        }

        match self.audio_sender_state {
            // The previous confirmation did not make it
            AudioState::Started => self.confirm_local_audio_source_streaming_request(),
            AudioState::Idle => match self.audio_receiver_state {
                AudioState::Idle => {
                    if self.on_audio_resume(group_id, Direction::Source) {
                        self.audio_sender_state = AudioState::ReadyToStart;
                    } else {
                        self.cancel_local_audio_source_streaming_request();
                    }
                }
                AudioState::ReadyToStart => {
                    self.audio_sender_state = AudioState::ReadyToStart;
                    self.reconfigure_when_direction_unavailable(group_id, Direction::Sink);
                }
                AudioState::Started => {
                    self.audio_sender_state = AudioState::ReadyToStart;
                    self.join_ongoing_stream(group_id, Direction::Sink);
                }
                AudioState::ReadyToRelease => {
                    self.audio_sender_state = AudioState::ReadyToStart;
                    self.join_ongoing_stream(group_id, Direction::Sink);
                }
                // Reconfiguring, wait for the stream to be configured
                AudioState::Releasing => self.audio_sender_state = self.audio_receiver_state,
            },
            AudioState::ReadyToStart => error!("double resume request of the local source"),
            AudioState::ReadyToRelease => {
                if self.audio_receiver_state != AudioState::Releasing {
                    self.suspend_timer = None;
                    self.confirm_local_audio_source_streaming_request();
                }
            }
            AudioState::Releasing => {}
        }
    }

    /// The local source stopped playing
    pub fn on_local_audio_source_suspend(&mut self) {
        info!(
            "group {:?}, sender {:?}, receiver {:?}",
            self.active_group_id, self.audio_sender_state, self.audio_receiver_state
        );
        match self.audio_sender_state {
            AudioState::ReadyToStart | AudioState::Started => {
                self.audio_sender_state = AudioState::ReadyToRelease
            }
            AudioState::Releasing => return,
            AudioState::Idle => {
                if self.audio_receiver_state == AudioState::ReadyToRelease {
                    self.on_audio_suspend();
                }
                return;
            }
            AudioState::ReadyToRelease => {}
        }

        if matches!(self.audio_receiver_state, AudioState::Idle | AudioState::ReadyToRelease) {
            self.on_audio_suspend();
        }
    }

    /// The local sink wants to record, from the remote sources
    pub fn on_local_audio_sink_resume(&mut self) {
        info!(
            "group {:?}, sender {:?}, receiver {:?}",
            self.active_group_id, self.audio_sender_state, self.audio_receiver_state
        );
        self.vbc_close_timer = None;

        let group_id = self.active_group_id;
        if self.groups.find_by_id(group_id).is_none() {
            error!("invalid group: {group_id:?}");
            return;
        }
        if self.audio_receiver_state == AudioState::Idle {
            self.reconfigure_or_update_remote(group_id, Direction::Source);
        }
        if !self.is_direction_available_for_current_configuration(group_id, Direction::Source) {
            error!("invalid resume request for {:?}", self.configuration_context_type);
            self.cancel_local_audio_sink_streaming_request();
            return;
        }

        match self.audio_receiver_state {
            AudioState::Started => self.confirm_local_audio_sink_streaming_request(),
            AudioState::Idle => match self.audio_sender_state {
                AudioState::Idle => {
                    if self.on_audio_resume(group_id, Direction::Sink) {
                        self.audio_receiver_state = AudioState::ReadyToStart;
                    } else {
                        self.cancel_local_audio_sink_streaming_request();
                    }
                }
                AudioState::ReadyToStart => {
                    self.audio_receiver_state = AudioState::ReadyToStart;
                    self.reconfigure_when_direction_unavailable(group_id, Direction::Source);
                }
                AudioState::Started => {
                    self.audio_receiver_state = AudioState::ReadyToStart;
                    self.join_ongoing_stream(group_id, Direction::Source);
                }
                AudioState::ReadyToRelease => {
                    self.audio_receiver_state = AudioState::ReadyToStart;
                    self.join_ongoing_stream(group_id, Direction::Source);
                }
                AudioState::Releasing => self.audio_receiver_state = self.audio_sender_state,
            },
            AudioState::ReadyToStart => error!("double resume request of the local sink"),
            AudioState::ReadyToRelease => {
                if self.audio_sender_state != AudioState::Releasing {
                    self.suspend_timer = None;
                    self.confirm_local_audio_sink_streaming_request();
                }
            }
            AudioState::Releasing => {}
        }
    }

    /// The local sink stopped recording
    pub fn on_local_audio_sink_suspend(&mut self) {
        info!(
            "group {:?}, sender {:?}, receiver {:?}",
            self.active_group_id, self.audio_sender_state, self.audio_receiver_state
        );
        self.start_vbc_close_timeout();

        match self.audio_receiver_state {
            AudioState::ReadyToStart | AudioState::Started => {
                self.audio_receiver_state = AudioState::ReadyToRelease
            }
            AudioState::Releasing => return,
            AudioState::Idle => {
                if self.audio_sender_state == AudioState::ReadyToRelease {
                    self.on_audio_suspend();
                }
                return;
            }
            AudioState::ReadyToRelease => {}
        }

        if matches!(self.audio_sender_state, AudioState::Idle | AudioState::ReadyToRelease) {
            self.on_audio_suspend();
        }
    }

    /// New playback tracks on the local source
    pub fn on_local_audio_source_metadata_update(&mut self, tracks: &[PlaybackTrackMetadata]) {
        let group_id = self.active_group_id;
        if !group_id.is_known() {
            warn!("no active group, ignoring the playback metadata");
            return;
        }
        let Some(group) = self.groups.find_by_id(group_id) else {
            error!("invalid group: {group_id:?}");
            return;
        };
        info!(
            "group {group_id:?} in {:?} to {:?}, sender {:?}, receiver {:?}",
            group.get_state(),
            group.get_target_state(),
            self.audio_sender_state,
            self.audio_receiver_state
        );

        // Reconfiguring anyway if the back channel was suspended
        self.vbc_close_timer = None;

        let allow_multiple = self.config.allow_multiple_contexts_in_metadata;
        let local = &mut self.local_metadata_context_types;
        local.source = get_audio_contexts_from_source_metadata(tracks);
        local.sink = choose_metadata_context_type(local.sink, allow_multiple);
        local.source = choose_metadata_context_type(local.source, allow_multiple);

        self.reconfigure_or_update_remote(group_id, Direction::Sink);
    }

    /// New record tracks on the local sink
    pub fn on_local_audio_sink_metadata_update(&mut self, tracks: &[RecordTrackMetadata]) {
        let group_id = self.active_group_id;
        if !group_id.is_known() {
            warn!("no active group, ignoring the record metadata");
            return;
        }
        if self.groups.find_by_id(group_id).is_none() {
            error!("invalid group: {group_id:?}");
            return;
        }

        let allow_multiple = self.config.allow_multiple_contexts_in_metadata;
        let local = &mut self.local_metadata_context_types;
        local.sink = get_audio_contexts_from_sink_metadata(tracks);
        local.sink = choose_metadata_context_type(local.sink, allow_multiple);
        local.source = choose_metadata_context_type(local.source, allow_multiple);

        // Otherwise the local sink resume takes care of it
        if self.audio_receiver_state == AudioState::Started {
            self.reconfigure_or_update_remote(group_id, Direction::Source);
        }
    }

    /// Returns true if the stream is starting
    fn on_audio_resume(&mut self, group_id: GroupId, local_direction: Direction) -> bool {
        let remote_direction = local_direction.opposite();
        let mut remote_contexts =
            self.directional_realign_metadata_audio_contexts(group_id, remote_direction);
        self.apply_remote_metadata_audio_context_policy(
            group_id,
            &mut remote_contexts,
            remote_direction,
        );
        if remote_contexts.sink.is_empty() && remote_contexts.source.is_empty() {
            warn!("requested contexts are not available on the remote side");
            return false;
        }
        self.group_stream_with_contexts(
            self.active_group_id,
            self.configuration_context_type,
            remote_contexts,
        )
    }

    fn on_audio_suspend(&mut self) {
        let group_id = self.active_group_id;
        if !group_id.is_known() {
            warn!("there is no active group anymore");
            return;
        }

        let mut timeout = self.config.suspend_timeout;
        if let Some(disable_timeout) = self.config.stream_disable_timeout {
            debug!("disable timer started: {disable_timeout:?}");
            self.disable_timer =
                Some(self.schedule(disable_timeout, move |client| client.group_suspend(group_id)));
            timeout += disable_timeout;
        }

        debug!("suspend timer started: {timeout:?}");
        self.suspend_timer = Some(self.schedule(timeout, move |client| client.group_stop(group_id)));
    }

    fn start_vbc_close_timeout(&mut self) {
        debug!("back channel close timer started: {:?}", self.config.vbc_close_timeout);
        self.vbc_close_timer = Some(
            self.schedule(self.config.vbc_close_timeout, |client| {
                client.reconfigure_after_vbc_close()
            }),
        );
    }

    fn reconfigure_after_vbc_close(&mut self) {
        debug!("back channel close timeout");
        if self.call.in_voip_call {
            self.set_in_voip_call(false);
        }

        let group_id = self.active_group_id;
        let Some(group) = self.groups.find_by_id(group_id) else {
            error!("invalid group: {group_id:?}");
            return;
        };
        if !matches!(
            self.configuration_context_type,
            LeAudioContextType::Media | LeAudioContextType::Game
        ) {
            info!("keeping {:?}, no high quality playback needed", self.configuration_context_type);
            return;
        }

        let local = &mut self.local_metadata_context_types;
        local.source &= group.available_contexts.sink;
        if local.source.is_empty() {
            warn!("unknown playback contexts, using media");
            local.source = AudioContexts::MEDIA;
        }
        let new_configuration_context = choose_configuration_context_type(
            local.source,
            self.call.in_call,
            self.configuration_context_type,
        );
        let remote_contexts = BidirectionalPair::new(local.source, local.sink);
        debug!("new configuration context {new_configuration_context:?}");
        self.reconfigure_or_update_metadata(group_id, new_configuration_context, remote_contexts);
    }

    fn directional_realign_metadata_audio_contexts(
        &mut self,
        group_id: GroupId,
        remote_direction: Direction,
    ) -> BidirectionalPair<AudioContexts> {
        let remote_other_direction = remote_direction.opposite();
        let other_direction_hal = match remote_other_direction {
            Direction::Sink => self.audio_sender_state,
            Direction::Source => self.audio_receiver_state,
        };
        let is_streaming_other_direction = other_direction_hal.is_streaming();
        let is_pending =
            self.groups.find_by_id(group_id).is_some_and(|group| group.pending_configuration);
        let is_releasing_for_reconfiguration = (self.audio_receiver_state == AudioState::Releasing
            || self.audio_sender_state == AudioState::Releasing)
            && is_pending
            && self.is_direction_available_for_current_configuration(group_id, remote_other_direction);

        directional_realign_metadata_audio_contexts(
            &mut self.local_metadata_context_types,
            &mut self.call,
            remote_direction,
            is_streaming_other_direction,
            is_releasing_for_reconfiguration,
        )
    }

    fn apply_remote_metadata_audio_context_policy(
        &self,
        group_id: GroupId,
        remote_contexts: &mut BidirectionalPair<AudioContexts>,
        remote_direction: Direction,
    ) {
        let Some(group) = self.groups.find_by_id(group_id) else { return };
        let group_contexts = GroupContexts {
            available: group.available_contexts,
            supported: group.supported_contexts,
            in_use: group.metadata_context_type,
        };
        let streaming = BidirectionalPair::new(
            self.audio_sender_state.is_streaming(),
            self.audio_receiver_state.is_streaming(),
        );
        apply_remote_metadata_audio_context_policy(
            remote_contexts,
            remote_direction,
            &group_contexts,
            &streaming,
            self.config.allow_multiple_contexts_in_metadata,
        );
    }

    /// Re-evaluates the local codec configurations for `context_type`
    pub fn update_config_and_check_if_reconfiguration_is_needed(
        &mut self,
        group_id: GroupId,
        context_type: LeAudioContextType,
    ) -> AudioReconfigurationResult {
        debug!("checking reconfiguration from {:?} to {context_type:?}", self.configuration_context_type);
        let Some(group) = self.groups.find_by_id_mut(group_id) else {
            error!("invalid group: {group_id:?}");
            return AudioReconfigurationResult::NotNeeded;
        };

        let source_configuration =
            group.get_codec_configuration_by_direction(context_type, Direction::Sink, &self.devices);
        let sink_configuration =
            group.get_codec_configuration_by_direction(context_type, Direction::Source, &self.devices);

        let mut reconfiguration_needed = false;
        if source_configuration != self.current_source_codec_config {
            self.current_source_codec_config = source_configuration;
            reconfiguration_needed = true;
        }
        if sink_configuration != self.current_sink_codec_config {
            self.current_sink_codec_config = sink_configuration;
            reconfiguration_needed = true;
        }
        debug!(
            "{context_type:?}: reconfiguration needed {reconfiguration_needed}, sink {}, source {}",
            sink_configuration.is_some(),
            source_configuration.is_some()
        );

        if !reconfiguration_needed {
            // The context still tells the use case even with the same codec
            if self.configuration_context_type != context_type {
                self.configuration_context_type = context_type;
                group.configuration_context_type = context_type;
            }
            return AudioReconfigurationResult::NotNeeded;
        }
        if source_configuration.is_none() && sink_configuration.is_none() {
            return AudioReconfigurationResult::NotPossible;
        }

        info!("group {group_id:?}: session reconfiguration needed for {context_type:?}");
        self.configuration_context_type = context_type;
        AudioReconfigurationResult::Needed
    }

    /// Returns true if the stream is being stopped to be reconfigured
    pub fn set_configuration_and_stop_stream_when_needed(
        &mut self,
        group_id: GroupId,
        new_context_type: LeAudioContextType,
    ) -> bool {
        let result =
            self.update_config_and_check_if_reconfiguration_is_needed(group_id, new_context_type);
        // Also the initial configuration
        self.configuration_context_type = new_context_type;
        info!("group {group_id:?}, context {new_context_type:?}: {result:?}");
        if result != AudioReconfigurationResult::Needed {
            return false;
        }

        let Some(group) = self.groups.find_by_id_mut(group_id) else { return false };
        if group.get_state() != AseState::Streaming {
            debug!("group {group_id:?} is not streaming");
            return false;
        }

        self.suspend_timer = None;
        group.pending_configuration = true;
        self.state_machine.stop_stream(group, &mut self.devices);
        true
    }

    /// Picks the configuration context for the new local metadata and applies
    /// it to the remote side
    pub fn reconfigure_or_update_remote(
        &mut self,
        group_id: GroupId,
        remote_direction: Direction,
    ) -> bool {
        let mut remote_metadata =
            self.directional_realign_metadata_audio_contexts(group_id, remote_direction);

        let candidates = remote_metadata.union();
        let current = self.configuration_context_type;
        let mut new_config_context =
            choose_configuration_context_type(candidates, self.call.in_call, current);
        debug!("candidates {candidates:?}, new configuration context {new_config_context:?}");

        // Sonification does not need a better quality than what is there
        if !candidates.is_empty()
            && candidates.difference(NON_DISRUPTIVE_CONTEXTS).is_empty()
            && current != LeAudioContextType::Uninitialized
            && current != LeAudioContextType::Unspecified
            && self.is_direction_available_for_current_configuration(group_id, Direction::Sink)
        {
            info!("staying with {current:?} for {candidates:?}");
            new_config_context = current;
        }

        // The back channel is not reconfigured once it is up
        if remote_direction == Direction::Source
            && self.is_direction_available_for_current_configuration(group_id, Direction::Source)
            && self.group_state(group_id) == Some(AseState::Streaming)
        {
            info!("audio source already available in {current:?}, not switching to {new_config_context:?}");
            new_config_context = current;
        }

        self.apply_remote_metadata_audio_context_policy(
            group_id,
            &mut remote_metadata,
            remote_direction,
        );
        self.reconfigure_or_update_metadata(group_id, new_config_context, remote_metadata)
    }

    /// Either reconfigures the stream for a new context, or only updates the
    /// metadata of the running one
    pub fn reconfigure_or_update_metadata(
        &mut self,
        group_id: GroupId,
        new_configuration_context: LeAudioContextType,
        remote_contexts: BidirectionalPair<AudioContexts>,
    ) -> bool {
        if new_configuration_context != self.configuration_context_type {
            info!(
                "checking configuration change from {:?} to {new_configuration_context:?}",
                self.configuration_context_type
            );
            if self.set_configuration_and_stop_stream_when_needed(group_id, new_configuration_context)
            {
                return false;
            }
        }

        let target_state = self.groups.find_by_id(group_id).map(LeAudioDeviceGroup::get_target_state);
        if target_state == Some(AseState::Streaming) {
            info!(
                "{:?} unchanged, updating metadata to sink {:?}, source {:?}",
                self.configuration_context_type, remote_contexts.sink, remote_contexts.source
            );
            return self.group_stream_with_contexts(
                group_id,
                self.configuration_context_type,
                remote_contexts,
            );
        }
        false
    }

    // Group state machine reports

    fn notify_group_stream_status(&mut self, group_id: GroupId, status: GroupStreamStatus) {
        let status = match status {
            GroupStreamStatus::Streaming => GroupStreamStatus::Streaming,
            _ => GroupStreamStatus::Idle,
        };
        if self.last_notified_stream_status.insert(group_id, status) != Some(status) {
            self.callbacks.on_group_stream_status(group_id, status);
        }
    }

    /// A group reached a new stream status
    pub fn on_state_machine_status_report(&mut self, group_id: GroupId, status: GroupStreamStatus) {
        info!(
            "group {group_id:?}: {status:?}, sender {:?}, receiver {:?}",
            self.audio_sender_state, self.audio_receiver_state
        );
        self.notify_group_stream_status(group_id, status);

        match status {
            GroupStreamStatus::Streaming => self.on_group_streaming(group_id),
            GroupStreamStatus::Suspended => self.stop_audio(),
            GroupStreamStatus::ConfiguredByUser => {
                let mut previously_active_directions = Directions::empty();
                if self.audio_sender_state >= AudioState::ReadyToStart {
                    previously_active_directions |= Directions::SINK;
                }
                if self.audio_receiver_state >= AudioState::ReadyToStart {
                    previously_active_directions |= Directions::SOURCE;
                }
                // Lets the HAL resume again with the new configuration
                self.cancel_streaming_request();
                self.reconfiguration_complete(previously_active_directions);
            }
            // The remote keeps its cached configuration, same as idle
            GroupStreamStatus::ConfiguredAutonomous | GroupStreamStatus::Idle => {
                self.on_group_idle(group_id)
            }
            GroupStreamStatus::Releasing | GroupStreamStatus::Suspending => {
                let unexpected = self.active_group_id == group_id
                    && self.groups.find_by_id(group_id).is_some_and(|group| !group.pending_configuration)
                    && (self.audio_sender_state == AudioState::Started
                        || self.audio_receiver_state == AudioState::Started);
                if unexpected {
                    error!("group {group_id:?} released while streaming, deactivating it");
                    self.group_set_and_notify_inactive();
                }
                if self.audio_sender_state != AudioState::Idle {
                    self.audio_sender_state = AudioState::Releasing;
                }
                if self.audio_receiver_state != AudioState::Idle {
                    self.audio_receiver_state = AudioState::Releasing;
                }
            }
            GroupStreamStatus::Destroyed => {}
        }
    }

    fn on_group_streaming(&mut self, group_id: GroupId) {
        if group_id != self.active_group_id {
            error!("streaming group {group_id:?} is not the active {:?}", self.active_group_id);
        }
        let Some(group) = self.groups.find_by_id_mut(group_id) else {
            error!("group {group_id:?} does not exist anymore");
            return;
        };

        if self.audio_sender_state == AudioState::Idle
            && self.audio_receiver_state == AudioState::Idle
        {
            warn!("stopping group {group_id:?}, the local audio is not interested anymore");
            self.state_machine.stop_stream(group, &mut self.devices);
            return;
        }

        // The configuration may have changed during the stream setup
        if group.configuration_context_type != self.configuration_context_type {
            debug!(
                "{:?} no longer valid, stopping to reconfigure to {:?}",
                group.configuration_context_type, self.configuration_context_type
            );
            group.pending_configuration = true;
            self.state_machine.stop_stream(group, &mut self.devices);
            return;
        }

        if self.audio_sender_state == AudioState::ReadyToStart {
            self.start_sending_audio(group_id);
        }
        if self.audio_receiver_state == AudioState::ReadyToStart {
            self.start_receiving_audio(group_id);
        }
    }

    fn on_group_idle(&mut self, group_id: GroupId) {
        if self.groups.find_by_id(group_id).is_some() {
            self.update_locations_and_contexts_availability(group_id);
            let pending =
                self.groups.find_by_id(group_id).is_some_and(|group| group.pending_configuration);
            if pending {
                self.suspended_for_reconfiguration();
                let remote_direction =
                    if AudioContexts::ALL_REMOTE_SOURCE.test(self.configuration_context_type) {
                        Direction::Source
                    } else {
                        Direction::Sink
                    };
                let mut remote_contexts =
                    self.directional_realign_metadata_audio_contexts(group_id, remote_direction);
                self.apply_remote_metadata_audio_context_policy(
                    group_id,
                    &mut remote_contexts,
                    remote_direction,
                );
                if self.group_stream_with_contexts(
                    group_id,
                    self.configuration_context_type,
                    remote_contexts,
                ) {
                    // Waiting for the new status
                    return;
                }
                info!("group {group_id:?}: clearing the pending configuration");
                if let Some(group) = self.groups.find_by_id_mut(group_id) {
                    group.pending_configuration = false;
                }
            }
        }

        self.cancel_streaming_request();

        if self.groups.find_by_id(group_id).is_some() {
            self.handle_pending_device_disconnection(group_id);
        }
    }

    /// The group state machine did not reach its target state in time. The
    /// remote devices are assumed unresponsive.
    pub fn on_device_set_state_timeout(&mut self, group_id: GroupId) {
        let Some(group) = self.groups.find_by_id_mut(group_id) else { return };

        let check_if_recovery_needed = group.get_target_state() == AseState::Idle;
        error!(
            "group {group_id:?}: state not achieved on time, current {:?}, target {:?}",
            group.get_state(),
            group.get_target_state()
        );
        group.set_target_state(AseState::Idle);
        group.clear_cises(&mut self.devices);

        let mut to_disconnect = group.active_devices(&self.devices);
        if to_disconnect.is_empty() {
            error!("group {group_id:?}: no active device");
            to_disconnect.extend(group.members().first());
        }

        self.cancel_streaming_request();
        if to_disconnect.is_empty() {
            error!("group {group_id:?} is empty");
            return;
        }

        // No recovery when the stream was only closing to disconnect
        let recovery = !(check_if_recovery_needed
            && to_disconnect.iter().any(|address| {
                self.devices
                    .find_by_address(address)
                    .is_some_and(|device| device.closing_stream_for_disconnection)
            }));

        for address in to_disconnect {
            if let Some(device) = self.devices.find_by_address_mut(&address) {
                device.connection_state = if recovery {
                    DeviceConnectState::DisconnectingAndRecover
                } else {
                    DeviceConnectState::Disconnecting
                };
            }
            self.connector.disconnect(address, recovery);
        }

        if recovery {
            self.group_set_and_notify_inactive();
        }
    }
}
