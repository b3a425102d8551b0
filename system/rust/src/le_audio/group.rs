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

//! Coordinated sets of devices and the group-wide view of their capabilities
//! and streams.

use log::{debug, error, info, warn};
use std::{collections::HashMap, rc::Rc};

use crate::core::address::RawAddress;

use super::{
    device::{
        ConfigurationFailure, DeviceConnectState, DirectionConfigurationState, LeAudioDevice,
        LeAudioDevices,
    },
    ids::GroupId,
    ltv::codec_spec_conf,
    set_configuration::{
        AudioSetConfiguration, AudioSetConfigurationProvider, LeAudioCodecConfiguration,
    },
    types::{
        AseState, AudioContexts, AudioLocations, BidirectionalPair, CigState, CisState, Direction,
        Directions, LeAudioContextType,
    },
};

/// Parameters of one direction of an established stream
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamParameters {
    pub sample_frequency_hz: u32,
    pub frame_duration_us: u32,
    pub octets_per_codec_frame: u16,
    pub codec_frames_blocks_per_sdu: u8,
    pub num_of_channels: u8,
    pub num_of_devices: u8,
    pub audio_channel_allocation: AudioLocations,
    /// CIS connection handle and channel allocation of each active ASE
    pub stream_locations: Vec<(u16, AudioLocations)>,
}

/// Snapshot of what the group is streaming
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamConfiguration {
    pub conf: Option<Rc<AudioSetConfiguration>>,
    pub stream_params: BidirectionalPair<StreamParameters>,
}

/// A coordinated set of LE Audio devices
pub struct LeAudioDeviceGroup {
    pub group_id: GroupId,
    members: Vec<RawAddress>,
    provider: Rc<dyn AudioSetConfigurationProvider>,
    config_cache: HashMap<LeAudioContextType, Option<Rc<AudioSetConfiguration>>>,

    pub audio_locations: BidirectionalPair<AudioLocations>,
    pub audio_directions: Directions,
    pub available_contexts: BidirectionalPair<AudioContexts>,
    pub supported_contexts: BidirectionalPair<AudioContexts>,

    current_state: AseState,
    target_state: AseState,
    in_transition: bool,
    pub cig_state: CigState,
    pub enabled: bool,

    /// Context the current ASE configuration was selected for
    pub configuration_context_type: LeAudioContextType,
    /// Contexts announced in the metadata of each direction
    pub metadata_context_type: BidirectionalPair<AudioContexts>,
    /// A stop was requested so that the group can be configured again
    pub pending_configuration: bool,
    pub stream_conf: StreamConfiguration,
}

impl std::fmt::Debug for LeAudioDeviceGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeAudioDeviceGroup")
            .field("group_id", &self.group_id)
            .field("members", &self.members)
            .field("current_state", &self.current_state)
            .field("target_state", &self.target_state)
            .field("configuration_context_type", &self.configuration_context_type)
            .finish()
    }
}

impl LeAudioDeviceGroup {
    /// Constructor
    pub fn new(group_id: GroupId, provider: Rc<dyn AudioSetConfigurationProvider>) -> Self {
        Self {
            group_id,
            members: vec![],
            provider,
            config_cache: HashMap::new(),
            audio_locations: BidirectionalPair::default(),
            audio_directions: Directions::empty(),
            available_contexts: BidirectionalPair::default(),
            supported_contexts: BidirectionalPair::default(),
            current_state: AseState::Idle,
            target_state: AseState::Idle,
            in_transition: false,
            cig_state: CigState::None,
            enabled: true,
            configuration_context_type: LeAudioContextType::Uninitialized,
            metadata_context_type: BidirectionalPair::default(),
            pending_configuration: false,
            stream_conf: StreamConfiguration::default(),
        }
    }

    pub fn members(&self) -> &[RawAddress] {
        &self.members
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    fn add_member(&mut self, address: RawAddress) {
        if !self.members.contains(&address) {
            self.members.push(address);
            self.invalidate_cached_configurations();
        }
    }

    fn remove_member(&mut self, address: &RawAddress) {
        self.members.retain(|member| member != address);
        self.invalidate_cached_configurations();
    }

    fn member_devices<'a>(
        &'a self,
        devices: &'a LeAudioDevices,
    ) -> impl Iterator<Item = &'a LeAudioDevice> + 'a {
        self.members.iter().filter_map(|address| devices.find_by_address(address))
    }

    fn connected_devices<'a>(
        &'a self,
        devices: &'a LeAudioDevices,
    ) -> impl Iterator<Item = &'a LeAudioDevice> + 'a {
        self.member_devices(devices).filter(|device| {
            device.is_connected() && device.connection_state == DeviceConnectState::Connected
        })
    }

    pub fn num_of_connected(&self, devices: &LeAudioDevices) -> usize {
        self.connected_devices(devices).count()
    }

    pub fn is_any_device_connected(&self, devices: &LeAudioDevices) -> bool {
        self.connected_devices(devices).next().is_some()
    }

    /// Members with at least one active ASE
    pub fn active_devices(&self, devices: &LeAudioDevices) -> Vec<RawAddress> {
        self.member_devices(devices)
            .filter(|device| device.have_active_ase())
            .map(|device| device.address)
            .collect()
    }

    pub fn have_any_active_ase(&self, devices: &LeAudioDevices) -> bool {
        self.member_devices(devices).any(|device| device.have_active_ase())
    }

    pub fn get_state(&self) -> AseState {
        self.current_state
    }

    pub fn get_target_state(&self) -> AseState {
        self.target_state
    }

    pub fn is_in_transition(&self) -> bool {
        self.in_transition
    }

    pub fn set_state(&mut self, state: AseState) {
        info!("group {:?}: state {:?} -> {:?}", self.group_id, self.current_state, state);
        self.current_state = state;
        self.in_transition = self.target_state != self.current_state;
    }

    pub fn set_target_state(&mut self, state: AseState) {
        debug!("group {:?}: target state {:?} -> {:?}", self.group_id, self.target_state, state);
        self.target_state = state;
        self.in_transition = self.target_state != self.current_state;
    }

    pub fn is_in_transition_to(&self, state: AseState) -> bool {
        self.in_transition && self.target_state == state
    }

    pub fn is_streaming(&self) -> bool {
        self.current_state == AseState::Streaming
    }

    pub fn is_releasing_or_idle(&self) -> bool {
        if self.in_transition {
            self.target_state == AseState::Idle
        } else {
            self.current_state == AseState::Idle
        }
    }

    /// Recomputes the union of member locations. Returns whether it changed.
    pub fn reload_audio_locations(&mut self, devices: &LeAudioDevices) -> bool {
        let mut locations = BidirectionalPair::<AudioLocations>::default();
        for device in self.connected_devices(devices) {
            locations.sink |= device.audio_locations.sink;
            locations.source |= device.audio_locations.source;
        }
        let changed = locations != self.audio_locations;
        self.audio_locations = locations;
        changed
    }

    /// Recomputes the directions members have capabilities for. Returns
    /// whether they changed.
    pub fn reload_audio_directions(&mut self, devices: &LeAudioDevices) -> bool {
        let mut directions = Directions::empty();
        for device in self.connected_devices(devices) {
            for direction in Direction::BOTH {
                if device.has_pacs(direction) {
                    directions |= direction.into();
                }
            }
        }
        let changed = directions != self.audio_directions;
        self.audio_directions = directions;
        changed
    }

    /// Recomputes the supported and available contexts from the connected
    /// members. Returns whether the available contexts changed.
    pub fn update_audio_context_availability(&mut self, devices: &LeAudioDevices) -> bool {
        let mut available = BidirectionalPair::<AudioContexts>::default();
        let mut supported = BidirectionalPair::<AudioContexts>::default();
        for device in self.connected_devices(devices) {
            available.sink |= device.available_contexts.sink;
            available.source |= device.available_contexts.source;
            supported.sink |= device.supported_contexts.sink;
            supported.source |= device.supported_contexts.source;
        }

        if supported != self.supported_contexts {
            self.invalidate_cached_configurations();
        }
        self.supported_contexts = supported;

        let changed = available != self.available_contexts;
        if changed {
            info!(
                "group {:?}: available contexts sink {:?}, source {:?}",
                self.group_id, available.sink, available.source
            );
        }
        self.available_contexts = available;
        changed
    }

    pub fn invalidate_cached_configurations(&mut self) {
        self.config_cache.clear();
    }

    /// Whether the connected members can carry `conf`
    pub fn is_audio_set_configuration_supported(
        &self,
        conf: &AudioSetConfiguration,
        devices: &LeAudioDevices,
    ) -> bool {
        let num_connected = self.num_of_connected(devices);

        for direction in Direction::BOTH {
            let ents = &conf.confs[direction];
            let Some(first) = ents.first() else { continue };

            let required_devices = conf.topology_info.device_count[direction].max(1) as usize;
            if required_devices > num_connected {
                debug!("{}: needs {required_devices} devices, {num_connected} connected", conf.name);
                return false;
            }

            let ases_per_device = ents.len().div_ceil(required_devices);
            let capable_devices = self
                .connected_devices(devices)
                .filter(|device| {
                    device.ase_count(direction) >= ases_per_device
                        && device.get_codec_configuration_supported_pac(direction, &first.codec).is_some()
                })
                .count();
            if capable_devices < required_devices {
                debug!("{}: {capable_devices} of {required_devices} devices capable", conf.name);
                return false;
            }
        }
        true
    }

    /// The first candidate for `context_type` the group can carry
    pub fn get_configuration(
        &mut self,
        context_type: LeAudioContextType,
        devices: &LeAudioDevices,
    ) -> Option<Rc<AudioSetConfiguration>> {
        if let Some(cached) = self.config_cache.get(&context_type) {
            return cached.clone();
        }

        let conf = self
            .provider
            .get_configurations(context_type)
            .into_iter()
            .find(|conf| self.is_audio_set_configuration_supported(conf, devices));
        match &conf {
            Some(conf) => info!("group {:?}: {context_type:?} uses {}", self.group_id, conf.name),
            None => warn!("group {:?}: no configuration for {context_type:?}", self.group_id),
        }

        // Nothing is cached while no member is connected
        if self.is_any_device_connected(devices) {
            self.config_cache.insert(context_type, conf.clone());
        }
        conf
    }

    /// The local audio format of one direction of the configuration for
    /// `context_type`
    pub fn get_codec_configuration_by_direction(
        &mut self,
        context_type: LeAudioContextType,
        direction: Direction,
        devices: &LeAudioDevices,
    ) -> Option<LeAudioCodecConfiguration> {
        let conf = self.get_configuration(context_type, devices)?;
        LeAudioCodecConfiguration::from_ase_configurations(&conf.confs[direction])
    }

    /// Whether the configuration currently selected carries `direction`
    pub fn is_direction_available_for_current_configuration(
        &mut self,
        direction: Direction,
        devices: &LeAudioDevices,
    ) -> bool {
        let context_type = self.configuration_context_type;
        self.get_configuration(context_type, devices)
            .is_some_and(|conf| !conf.confs[direction].is_empty())
    }

    /// Selects the configuration for `context_type` and activates the ASEs of
    /// the connected members accordingly
    pub fn configure(
        &mut self,
        context_type: LeAudioContextType,
        metadata_contexts: &BidirectionalPair<AudioContexts>,
        ccid_lists: &BidirectionalPair<Vec<u8>>,
        devices: &mut LeAudioDevices,
    ) -> Result<(), ConfigurationFailure> {
        let Some(conf) = self.get_configuration(context_type, devices) else {
            return Err(ConfigurationFailure::NoConfiguration);
        };
        let reuse_cis_id = self.cig_state == CigState::Created;

        for direction in Direction::BOTH {
            let required = conf.confs[direction].len();
            if required == 0 {
                continue;
            }
            let required_devices = conf.topology_info.device_count[direction].max(1) as usize;

            let mut state = DirectionConfigurationState::default();
            let mut configured_devices = 0;
            for address in self.members.iter() {
                if state.active_ases >= required {
                    break;
                }
                let Some(device) = devices.find_by_address_mut(address) else { continue };
                if !device.is_connected()
                    || device.connection_state != DeviceConnectState::Connected
                {
                    continue;
                }
                match device.configure_ases(
                    &conf,
                    direction,
                    context_type,
                    &mut state,
                    metadata_contexts[direction],
                    &ccid_lists[direction],
                    reuse_cis_id,
                ) {
                    Ok(()) => configured_devices += 1,
                    Err(failure) => {
                        warn!("{address:?}: {direction:?} not configured: {failure:?}")
                    }
                }
            }

            if configured_devices < required_devices || state.active_ases < required {
                error!(
                    "group {:?}: {} configured {configured_devices}/{required_devices} devices, {}/{required} ASEs",
                    self.group_id, conf.name, state.active_ases
                );
                self.deactivate(devices);
                return Err(ConfigurationFailure::NotEnoughDevices);
            }
        }

        self.configuration_context_type = context_type;
        self.metadata_context_type = *metadata_contexts;
        self.stream_conf.conf = Some(conf);
        Ok(())
    }

    /// Reactivates ASEs left configured for `context_type`
    pub fn activate(
        &mut self,
        context_type: LeAudioContextType,
        metadata_contexts: &BidirectionalPair<AudioContexts>,
        ccid_lists: &BidirectionalPair<Vec<u8>>,
        devices: &mut LeAudioDevices,
    ) -> bool {
        let mut activated = false;
        for address in self.members.iter() {
            if let Some(device) = devices.find_by_address_mut(address) {
                activated |=
                    device.activate_configured_ases(context_type, metadata_contexts, ccid_lists);
            }
        }
        activated
    }

    pub fn deactivate(&mut self, devices: &mut LeAudioDevices) {
        for address in self.members.iter() {
            if let Some(device) = devices.find_by_address_mut(address) {
                device.deactivate_all_ases();
            }
        }
    }

    /// Forgets all CISes of the group
    pub fn clear_cises(&mut self, devices: &mut LeAudioDevices) {
        for address in self.members.iter() {
            if let Some(device) = devices.find_by_address_mut(address) {
                for ase in device.ases.iter_mut() {
                    ase.cis_state = CisState::Idle;
                    ase.cis_conn_hdl = 0;
                }
            }
        }
        self.cig_state = CigState::None;
        self.stream_conf.stream_params = BidirectionalPair::default();
    }

    /// Whether the metadata of any active ASE would change
    pub fn is_metadata_changed(
        &self,
        metadata_contexts: &BidirectionalPair<AudioContexts>,
        ccid_lists: &BidirectionalPair<Vec<u8>>,
        devices: &LeAudioDevices,
    ) -> bool {
        self.member_devices(devices)
            .any(|device| device.is_metadata_changed(metadata_contexts, ccid_lists))
    }

    /// Largest presentation delay of the active ASEs of `direction`, in ms
    pub fn get_remote_delay(&self, direction: Direction, devices: &LeAudioDevices) -> u16 {
        let delay_us = self
            .member_devices(devices)
            .flat_map(|device| device.ases.iter())
            .filter(|ase| ase.active && ase.direction == direction)
            .map(|ase| ase.qos_config.presentation_delay)
            .max()
            .unwrap_or(0);
        u16::try_from(delay_us / 1000).unwrap_or(u16::MAX)
    }

    /// Rebuilds the stream parameters from the active ASEs
    pub fn update_stream_conf(&mut self, devices: &LeAudioDevices) {
        let mut params = BidirectionalPair::<StreamParameters>::default();
        for direction in Direction::BOTH {
            let stream = &mut params[direction];
            for device in self.member_devices(devices) {
                let mut device_counted = false;
                for ase in device.ases.iter().filter(|ase| ase.active && ase.direction == direction)
                {
                    let core = ase.codec_config.as_core_codec_config();
                    let locations = core.get_audio_locations();
                    stream.sample_frequency_hz = core.get_sampling_frequency_hz().unwrap_or(0);
                    stream.frame_duration_us = core.get_frame_duration_us().unwrap_or(0);
                    stream.octets_per_codec_frame = core.octets_per_codec_frame.unwrap_or(0);
                    stream.codec_frames_blocks_per_sdu =
                        core.codec_frames_blocks_per_sdu.unwrap_or(1);
                    stream.num_of_channels += core.get_channel_count_per_iso_stream();
                    stream.audio_channel_allocation |= locations;
                    stream.stream_locations.push((ase.cis_conn_hdl, locations));
                    if !device_counted {
                        stream.num_of_devices += 1;
                        device_counted = true;
                    }
                }
            }
        }
        debug!(
            "group {:?}: {} sink and {} source stream locations",
            self.group_id,
            params.sink.stream_locations.len(),
            params.source.stream_locations.len()
        );
        self.stream_conf.stream_params = params;
    }

    /// Frame duration of the sink configuration in use, if any
    pub fn get_sdu_interval(&self, direction: Direction) -> Option<u32> {
        let conf = self.stream_conf.conf.as_ref()?;
        let ent = conf.confs[direction].first()?;
        ent.codec.params.as_core_codec_config().get_frame_duration_us()
    }

    /// Whether the codec of the selected configuration uses 7.5 ms frames
    pub fn uses_short_frames(&self, direction: Direction) -> bool {
        self.stream_conf.conf.as_ref().and_then(|conf| conf.confs[direction].first()).is_some_and(
            |ent| {
                ent.codec.params.find_u8(codec_spec_conf::TYPE_FRAME_DURATION)
                    == Some(codec_spec_conf::FRAME_DURATION_7500US)
            },
        )
    }
}

/// Registry of all groups
#[derive(Default)]
pub struct LeAudioDeviceGroups {
    groups: Vec<LeAudioDeviceGroup>,
    provider: Option<Rc<dyn AudioSetConfigurationProvider>>,
}

impl LeAudioDeviceGroups {
    /// Constructor
    pub fn new(provider: Rc<dyn AudioSetConfigurationProvider>) -> Self {
        Self { groups: vec![], provider: Some(provider) }
    }

    /// Adds a group. Returns false if it already exists.
    pub fn add(&mut self, group_id: GroupId) -> bool {
        if self.find_by_id(group_id).is_some() {
            error!("group already exists: {group_id:?}");
            return false;
        }
        let Some(provider) = self.provider.clone() else {
            error!("no configuration provider");
            return false;
        };
        self.groups.push(LeAudioDeviceGroup::new(group_id, provider));
        true
    }

    /// Removes a group, unless it still holds members or a CIG
    pub fn remove(&mut self, group_id: GroupId) -> bool {
        let Some(idx) = self.groups.iter().position(|group| group.group_id == group_id) else {
            return false;
        };
        let group = &self.groups[idx];
        if !group.is_empty() || group.cig_state != CigState::None {
            warn!(
                "group {group_id:?} kept: {} members, CIG {:?}",
                group.size(),
                group.cig_state
            );
            return false;
        }
        self.groups.remove(idx);
        true
    }

    /// Makes `address` a member of `group_id`, creating the group if needed
    pub fn add_device(
        &mut self,
        group_id: GroupId,
        address: RawAddress,
        devices: &mut LeAudioDevices,
    ) -> bool {
        if !group_id.is_known() {
            return false;
        }
        if self.find_by_id(group_id).is_none() && !self.add(group_id) {
            return false;
        }
        let Some(device) = devices.find_by_address_mut(&address) else {
            error!("unknown device {address:?}");
            return false;
        };
        let previous = device.group_id;
        device.group_id = group_id;
        if previous.is_known() && previous != group_id {
            self.remove_device(previous, &address, devices);
        }
        if let Some(group) = self.find_by_id_mut(group_id) {
            group.add_member(address);
        }
        true
    }

    /// Removes `address` from `group_id`. The group goes away with its last
    /// member, once it has no CIG left.
    pub fn remove_device(
        &mut self,
        group_id: GroupId,
        address: &RawAddress,
        devices: &mut LeAudioDevices,
    ) {
        let Some(group) = self.find_by_id_mut(group_id) else { return };
        group.remove_member(address);
        let now_empty = group.is_empty();
        group.reload_audio_locations(devices);
        group.reload_audio_directions(devices);
        group.update_audio_context_availability(devices);

        if let Some(device) = devices.find_by_address_mut(address) {
            if device.group_id == group_id {
                device.group_id = GroupId::UNKNOWN;
            }
        }
        if now_empty {
            self.remove(group_id);
        }
    }

    pub fn find_by_id(&self, group_id: GroupId) -> Option<&LeAudioDeviceGroup> {
        self.groups.iter().find(|group| group.group_id == group_id)
    }

    pub fn find_by_id_mut(&mut self, group_id: GroupId) -> Option<&mut LeAudioDeviceGroup> {
        self.groups.iter_mut().find(|group| group.group_id == group_id)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LeAudioDeviceGroup> {
        self.groups.iter()
    }

    pub fn clean_up(&mut self) {
        self.groups.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::le_audio::{
        ase::Ase,
        ids::{AttHandle, ConnectionId, HandlePair},
        ltv::{codec_spec_caps, LtvMap},
        set_configuration::StaticAudioSetConfigurationProvider,
        types::ConfigurationStrategy,
    };

    const GROUP_ID: GroupId = GroupId(2);
    const LEFT: RawAddress = RawAddress([0x11, 0x22, 0x33, 0x44, 0x55, 0x01]);
    const RIGHT: RawAddress = RawAddress([0x11, 0x22, 0x33, 0x44, 0x55, 0x02]);

    fn pac_value(channel_counts: u8) -> Vec<u8> {
        let mut caps = LtvMap::new();
        caps.add_u16(codec_spec_caps::TYPE_SUPPORTED_SAMPLING_FREQUENCIES, 0x00a4)
            .add_u8(codec_spec_caps::TYPE_SUPPORTED_FRAME_DURATIONS, 0x02)
            .add_u8(codec_spec_caps::TYPE_SUPPORTED_AUDIO_CHANNEL_COUNTS, channel_counts)
            .add_u32(codec_spec_caps::TYPE_SUPPORTED_OCTETS_PER_CODEC_FRAME, 40 | (120 << 16));
        let caps = caps.to_vec();
        let mut value = vec![0x01, 0x06, 0x00, 0x00, 0x00, 0x00, caps.len() as u8];
        value.extend(caps);
        value.push(0x00);
        value
    }

    fn add_device(
        devices: &mut LeAudioDevices,
        groups: &mut LeAudioDeviceGroups,
        address: RawAddress,
        conn_id: u16,
        locations: AudioLocations,
        sink_ases: u8,
        channel_counts: u8,
    ) {
        devices.add(address, DeviceConnectState::Connected, GroupId::UNKNOWN);
        devices.set_conn_id(&address, ConnectionId(conn_id));
        let device = devices.find_by_address_mut(&address).unwrap();
        for id in 1..=sink_ases {
            device.ases.push(Ase::new(
                HandlePair::new(AttHandle(0x30 + id as u16), AttHandle(0)),
                Direction::Sink,
                id,
            ));
        }
        device
            .register_pacs(
                Direction::Sink,
                HandlePair::new(AttHandle(0x10), AttHandle(0x11)),
                &pac_value(channel_counts),
            )
            .unwrap();
        device.audio_locations.sink = locations;
        device.available_contexts.sink = AudioContexts::MEDIA | AudioContexts::UNSPECIFIED;
        device.supported_contexts.sink = AudioContexts::MEDIA | AudioContexts::UNSPECIFIED;
        groups.add_device(GROUP_ID, address, devices);
    }

    fn setup() -> (LeAudioDevices, LeAudioDeviceGroups) {
        (
            LeAudioDevices::new(),
            LeAudioDeviceGroups::new(Rc::new(StaticAudioSetConfigurationProvider::new())),
        )
    }

    #[test]
    fn test_two_earbuds_get_one_side_each() {
        // arrange
        let (mut devices, mut groups) = setup();
        add_device(&mut devices, &mut groups, LEFT, 1, AudioLocations::FRONT_LEFT, 1, 0x01);
        add_device(&mut devices, &mut groups, RIGHT, 2, AudioLocations::FRONT_RIGHT, 1, 0x01);
        let group = groups.find_by_id_mut(GROUP_ID).unwrap();
        let metadata = BidirectionalPair::new(AudioContexts::MEDIA, AudioContexts::empty());

        // act
        let result = group.configure(
            LeAudioContextType::Media,
            &metadata,
            &BidirectionalPair::default(),
            &mut devices,
        );

        // assert
        assert_eq!(result, Ok(()));
        let conf = group.stream_conf.conf.clone().unwrap();
        assert_eq!(conf.topology_info.device_count.sink, 2);
        assert_eq!(conf.topology_info.strategy.sink, ConfigurationStrategy::MonoOneCisPerDevice);
        for (address, location) in [(LEFT, AudioLocations::FRONT_LEFT), (RIGHT, AudioLocations::FRONT_RIGHT)] {
            let ase = devices
                .find_by_address(&address)
                .unwrap()
                .get_first_active_ase_by_direction(Direction::Sink)
                .unwrap();
            assert_eq!(
                ase.codec_config.find_u32(codec_spec_conf::TYPE_AUDIO_CHANNEL_ALLOCATION),
                Some(location.bits())
            );
        }
    }

    #[test]
    fn test_single_stereo_device_uses_one_cis() {
        // arrange
        let (mut devices, mut groups) = setup();
        add_device(
            &mut devices,
            &mut groups,
            LEFT,
            1,
            AudioLocations::FRONT_LEFT | AudioLocations::FRONT_RIGHT,
            1,
            0x03,
        );
        let group = groups.find_by_id_mut(GROUP_ID).unwrap();

        // act
        let conf = group.get_configuration(LeAudioContextType::Media, &devices).unwrap();

        // assert
        assert_eq!(conf.topology_info.strategy.sink, ConfigurationStrategy::StereoOneCisPerDevice);
        let hal = group
            .get_codec_configuration_by_direction(LeAudioContextType::Media, Direction::Sink, &devices)
            .unwrap();
        assert_eq!(hal.num_channels, 2);
        assert_eq!(hal.sample_rate, 48000);
        assert_eq!(
            group.get_codec_configuration_by_direction(
                LeAudioContextType::Media,
                Direction::Source,
                &devices
            ),
            None
        );
    }

    #[test]
    fn test_configuration_cache_invalidated_on_member_change() {
        // arrange
        let (mut devices, mut groups) = setup();
        add_device(&mut devices, &mut groups, LEFT, 1, AudioLocations::FRONT_LEFT, 1, 0x01);
        let first = groups
            .find_by_id_mut(GROUP_ID)
            .unwrap()
            .get_configuration(LeAudioContextType::Media, &devices)
            .unwrap();

        // act
        add_device(&mut devices, &mut groups, RIGHT, 2, AudioLocations::FRONT_RIGHT, 1, 0x01);
        let second = groups
            .find_by_id_mut(GROUP_ID)
            .unwrap()
            .get_configuration(LeAudioContextType::Media, &devices)
            .unwrap();

        // assert
        assert_eq!(first.topology_info.device_count.sink, 1);
        assert_eq!(second.topology_info.device_count.sink, 2);
    }

    #[test]
    fn test_configure_without_connected_members_fails() {
        let (mut devices, mut groups) = setup();
        add_device(&mut devices, &mut groups, LEFT, 1, AudioLocations::FRONT_LEFT, 1, 0x01);
        devices.set_conn_id(&LEFT, ConnectionId::INVALID);
        let group = groups.find_by_id_mut(GROUP_ID).unwrap();

        let result = group.configure(
            LeAudioContextType::Media,
            &BidirectionalPair::default(),
            &BidirectionalPair::default(),
            &mut devices,
        );

        assert_eq!(result, Err(ConfigurationFailure::NoConfiguration));
    }

    #[test]
    fn test_context_availability_and_locations() {
        // arrange
        let (mut devices, mut groups) = setup();
        add_device(&mut devices, &mut groups, LEFT, 1, AudioLocations::FRONT_LEFT, 1, 0x01);
        add_device(&mut devices, &mut groups, RIGHT, 2, AudioLocations::FRONT_RIGHT, 1, 0x01);
        devices.find_by_address_mut(&RIGHT).unwrap().available_contexts.source =
            AudioContexts::CONVERSATIONAL;
        let group = groups.find_by_id_mut(GROUP_ID).unwrap();

        // act
        let contexts_changed = group.update_audio_context_availability(&devices);
        let locations_changed = group.reload_audio_locations(&devices);
        let directions_changed = group.reload_audio_directions(&devices);

        // assert
        assert!(contexts_changed);
        assert!(locations_changed);
        assert!(directions_changed);
        assert_eq!(group.available_contexts.source, AudioContexts::CONVERSATIONAL);
        assert_eq!(
            group.audio_locations.sink,
            AudioLocations::FRONT_LEFT | AudioLocations::FRONT_RIGHT
        );
        assert_eq!(group.audio_directions, Directions::from(Direction::Sink));
        assert!(!group.update_audio_context_availability(&devices));
    }

    #[test]
    fn test_group_removed_with_last_member_only_without_cig() {
        // arrange
        let (mut devices, mut groups) = setup();
        add_device(&mut devices, &mut groups, LEFT, 1, AudioLocations::FRONT_LEFT, 1, 0x01);
        add_device(&mut devices, &mut groups, RIGHT, 2, AudioLocations::FRONT_RIGHT, 1, 0x01);
        groups.find_by_id_mut(GROUP_ID).unwrap().cig_state = CigState::Created;

        // act
        groups.remove_device(GROUP_ID, &LEFT, &mut devices);
        groups.remove_device(GROUP_ID, &RIGHT, &mut devices);

        // assert
        let group = groups.find_by_id(GROUP_ID).unwrap();
        assert!(group.is_empty());
        assert_eq!(devices.find_by_address(&LEFT).unwrap().group_id, GroupId::UNKNOWN);

        groups.find_by_id_mut(GROUP_ID).unwrap().cig_state = CigState::None;
        assert!(groups.remove(GROUP_ID));
        assert!(groups.is_empty());
    }

    #[test]
    fn test_target_state_transitions() {
        let (_, mut groups) = setup();
        groups.add(GROUP_ID);
        let group = groups.find_by_id_mut(GROUP_ID).unwrap();

        assert!(group.is_releasing_or_idle());
        group.set_target_state(AseState::Streaming);
        assert!(group.is_in_transition_to(AseState::Streaming));
        assert!(!group.is_releasing_or_idle());
        group.set_state(AseState::Streaming);
        assert!(!group.is_in_transition());
        assert!(group.is_streaming());
    }

    #[test]
    fn test_stream_conf_and_remote_delay() {
        // arrange
        let (mut devices, mut groups) = setup();
        add_device(&mut devices, &mut groups, LEFT, 1, AudioLocations::FRONT_LEFT, 1, 0x01);
        add_device(&mut devices, &mut groups, RIGHT, 2, AudioLocations::FRONT_RIGHT, 1, 0x01);
        let group = groups.find_by_id_mut(GROUP_ID).unwrap();
        group
            .configure(
                LeAudioContextType::Media,
                &BidirectionalPair::new(AudioContexts::MEDIA, AudioContexts::empty()),
                &BidirectionalPair::default(),
                &mut devices,
            )
            .unwrap();
        devices.find_by_address_mut(&RIGHT).unwrap().ases[0].qos_config.presentation_delay = 40000;

        // act
        group.update_stream_conf(&devices);

        // assert
        let sink = &group.stream_conf.stream_params.sink;
        assert_eq!(sink.num_of_devices, 2);
        assert_eq!(sink.num_of_channels, 2);
        assert_eq!(sink.stream_locations.len(), 2);
        assert!(group.stream_conf.stream_params.source.stream_locations.is_empty());
        assert_eq!(group.get_remote_delay(Direction::Sink, &devices), 40);
        assert_eq!(group.get_sdu_interval(Direction::Sink), Some(10000));
        assert!(!group.uses_short_frames(Direction::Sink));
    }
}
