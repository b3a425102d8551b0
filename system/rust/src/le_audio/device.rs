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

//! Per-device state: the ASEs of a peer, its published capabilities, and the
//! selector that maps a candidate configuration onto its ASEs.

use log::{debug, error, info, warn};
use std::collections::HashMap;

use crate::core::address::RawAddress;

use super::{
    ase::Ase,
    ids::{AttHandle, ConnectionId, GroupId, HandlePair},
    ltv::{codec_spec_conf, make_metadata, LtvMap},
    parser::{
        parse_audio_locations, parse_available_audio_contexts, parse_pacs,
        parse_supported_audio_contexts, parse_tmap_role, AcsAcRecord, ParseError,
    },
    set_configuration::{is_codec_config_setting_supported, AudioSetConfiguration, CodecConfigSetting},
    types::{
        AseState, AudioContexts, AudioLocations, BidirectionalPair, CisState, ConfigurationStrategy,
        Direction, LeAudioContextType, INVALID_CIS_ID,
    },
};

/// Connection state of a device, as tracked by the client
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeviceConnectState {
    Connected,
    #[default]
    Disconnected,
    Removing,
    Disconnecting,
    DisconnectingAndRecover,
    ConnectingByUser,
    ConnectedByUserGettingReady,
    ConnectingAutoconnect,
    ConnectedAutoconnectGettingReady,
}

/// Why a configuration could not be applied
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigurationFailure {
    /// There is no ASE left for the direction
    NoFreeAse,
    /// No published capability matches the requested codec setting
    NoSupportedPac,
    /// Fewer devices than the configuration requires could be configured
    NotEnoughDevices,
    /// None of the candidate configurations fits the group
    NoConfiguration,
    /// The device has no GATT connection
    NotConnected,
}

/// Characteristic handles of a device, other than PACs and ASEs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceHandles {
    pub ctp_hdls: HandlePair,
    pub snk_audio_locations_hdls: HandlePair,
    pub src_audio_locations_hdls: HandlePair,
    pub supported_contexts_hdls: HandlePair,
    pub available_contexts_hdls: HandlePair,
    pub tmap_role_hdl: AttHandle,
}

/// The published capabilities of one direction, per PAC characteristic
pub type PacRecords = Vec<(HandlePair, Vec<AcsAcRecord>)>;

/// Group-wide bookkeeping for one direction while a configuration is applied
/// across the members
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DirectionConfigurationState {
    /// ASEs activated so far in the group
    pub active_ases: usize,
    /// Locations already claimed by members
    pub audio_locations: AudioLocations,
}

/// A remote LE Audio device
#[derive(Debug)]
pub struct LeAudioDevice {
    pub address: RawAddress,
    pub connection_state: DeviceConnectState,
    conn_id: ConnectionId,
    pub group_id: GroupId,
    pub autoconnect_flag: bool,
    /// Set when the stream is being closed because the device goes away
    pub closing_stream_for_disconnection: bool,
    pub ases: Vec<Ase>,
    pub pacs: BidirectionalPair<PacRecords>,
    pub audio_locations: BidirectionalPair<AudioLocations>,
    pub supported_contexts: BidirectionalPair<AudioContexts>,
    pub available_contexts: BidirectionalPair<AudioContexts>,
    pub handles: DeviceHandles,
    pub tmap_role: u16,
}

impl LeAudioDevice {
    /// Constructor
    pub fn new(address: RawAddress, connection_state: DeviceConnectState, group_id: GroupId) -> Self {
        Self {
            address,
            connection_state,
            conn_id: ConnectionId::INVALID,
            group_id,
            autoconnect_flag: false,
            closing_stream_for_disconnection: false,
            ases: vec![],
            pacs: BidirectionalPair::default(),
            audio_locations: BidirectionalPair::default(),
            supported_contexts: BidirectionalPair::default(),
            available_contexts: BidirectionalPair::default(),
            handles: DeviceHandles::default(),
            tmap_role: 0,
        }
    }

    /// The GATT connection, or `ConnectionId::INVALID`
    pub fn conn_id(&self) -> ConnectionId {
        self.conn_id
    }

    pub fn is_connected(&self) -> bool {
        self.conn_id != ConnectionId::INVALID
    }

    /// Replaces the records of one PAC characteristic. On a malformed value the
    /// previous records are kept.
    pub fn register_pacs(
        &mut self,
        direction: Direction,
        hdls: HandlePair,
        value: &[u8],
    ) -> Result<(), ParseError> {
        let records = parse_pacs(value)?;
        info!("{:?}: {} {:?} PAC records", self.address, records.len(), direction);

        let pacs = &mut self.pacs[direction];
        match pacs.iter_mut().find(|(pac_hdls, _)| pac_hdls.val_hdl == hdls.val_hdl) {
            Some(entry) => entry.1 = records,
            None => pacs.push((hdls, records)),
        }
        Ok(())
    }

    /// Returns whether the locations changed
    pub fn update_audio_locations(
        &mut self,
        direction: Direction,
        value: &[u8],
    ) -> Result<bool, ParseError> {
        let locations = parse_audio_locations(value)?;
        let changed = self.audio_locations[direction] != locations;
        self.audio_locations[direction] = locations;
        Ok(changed)
    }

    pub fn update_supported_contexts(&mut self, value: &[u8]) -> Result<(), ParseError> {
        self.supported_contexts = parse_supported_audio_contexts(value)?;
        Ok(())
    }

    /// Returns whether the available contexts changed
    pub fn update_available_contexts(&mut self, value: &[u8]) -> Result<bool, ParseError> {
        let contexts = parse_available_audio_contexts(value)?;
        let changed = self.available_contexts != contexts;
        self.available_contexts = contexts;
        Ok(changed)
    }

    pub fn update_tmap_role(&mut self, value: &[u8]) -> Result<(), ParseError> {
        self.tmap_role = parse_tmap_role(value)?;
        Ok(())
    }

    /// Directions this device has capabilities for
    pub fn has_pacs(&self, direction: Direction) -> bool {
        self.pacs[direction].iter().any(|(_, records)| !records.is_empty())
    }

    pub fn ase_count(&self, direction: Direction) -> usize {
        self.ases.iter().filter(|ase| ase.direction == direction).count()
    }

    fn first_active_ase_idx(&self, direction: Direction) -> Option<usize> {
        self.ases.iter().position(|ase| ase.active && ase.direction == direction)
    }

    fn next_active_ase_idx_with_same_direction(&self, base: usize) -> Option<usize> {
        let direction = self.ases.get(base)?.direction;
        self.ases
            .iter()
            .enumerate()
            .skip(base + 1)
            .find(|(_, ase)| ase.active && ase.direction == direction)
            .map(|(idx, _)| idx)
    }

    fn first_inactive_ase_idx(&self, direction: Direction, reuse_cis_id: bool) -> Option<usize> {
        let inactive = |ase: &&Ase| !ase.active && ase.direction == direction;
        if reuse_cis_id {
            let with_cis_id = self
                .ases
                .iter()
                .position(|ase| inactive(&ase) && ase.cis_id != INVALID_CIS_ID);
            if with_cis_id.is_some() {
                return with_cis_id;
            }
        }
        self.ases.iter().position(|ase| inactive(&ase))
    }

    pub fn get_first_active_ase(&self) -> Option<&Ase> {
        self.ases.iter().find(|ase| ase.active)
    }

    pub fn get_first_active_ase_by_direction(&self, direction: Direction) -> Option<&Ase> {
        self.first_active_ase_idx(direction).map(|idx| &self.ases[idx])
    }

    /// The next active ASE after `base` with the same direction
    pub fn get_next_active_ase_with_same_direction(&self, base: &Ase) -> Option<&Ase> {
        let base = self.ases.iter().position(|ase| ase.id == base.id)?;
        self.next_active_ase_idx_with_same_direction(base).map(|idx| &self.ases[idx])
    }

    /// The next active ASE after `base` with the other direction
    pub fn get_next_active_ase_with_different_direction(&self, base: &Ase) -> Option<&Ase> {
        let base_idx = self.ases.iter().position(|ase| ase.id == base.id)?;
        self.ases
            .iter()
            .skip(base_idx + 1)
            .find(|ase| ase.active && ase.direction != base.direction)
    }

    pub fn get_first_inactive_ase(&self, direction: Direction, reuse_cis_id: bool) -> Option<&Ase> {
        self.first_inactive_ase_idx(direction, reuse_cis_id).map(|idx| &self.ases[idx])
    }

    pub fn get_first_ase_with_state(&self, direction: Direction, state: AseState) -> Option<&Ase> {
        self.ases.iter().find(|ase| ase.direction == direction && ase.state == state)
    }

    pub fn get_ase_by_val_hdl(&self, val_hdl: AttHandle) -> Option<&Ase> {
        self.ases.iter().find(|ase| ase.hdls.val_hdl == val_hdl)
    }

    pub fn get_ase_by_val_hdl_mut(&mut self, val_hdl: AttHandle) -> Option<&mut Ase> {
        self.ases.iter_mut().find(|ase| ase.hdls.val_hdl == val_hdl)
    }

    /// The sink and source ASEs carried by a CIS connection handle
    pub fn get_ases_by_cis_conn_hdl(&self, conn_hdl: u16) -> BidirectionalPair<Option<&Ase>> {
        let by_direction = |direction| {
            self.ases
                .iter()
                .find(|ase| ase.direction == direction && ase.cis_conn_hdl == conn_hdl)
        };
        BidirectionalPair::new(by_direction(Direction::Sink), by_direction(Direction::Source))
    }

    /// The sink and source ASEs bound to a CIS id
    pub fn get_ases_by_cis_id(&self, cis_id: u8) -> BidirectionalPair<Option<&Ase>> {
        let by_direction = |direction| {
            self.ases.iter().find(|ase| ase.direction == direction && ase.cis_id == cis_id)
        };
        BidirectionalPair::new(by_direction(Direction::Sink), by_direction(Direction::Source))
    }

    /// The active ASE of the other direction sharing the CIS of `base`
    pub fn get_ase_to_match_bidirection_cis(&self, base: &Ase) -> Option<&Ase> {
        self.ases.iter().find(|ase| {
            ase.active
                && ase.direction != base.direction
                && ase.cis_conn_hdl == base.cis_conn_hdl
                && ase.cis_id == base.cis_id
        })
    }

    pub fn have_active_ase(&self) -> bool {
        self.ases.iter().any(|ase| ase.active)
    }

    pub fn have_all_active_ases_same_state(&self, state: AseState) -> bool {
        self.ases.iter().filter(|ase| ase.active).all(|ase| ase.state == state)
    }

    /// Every active sink ASE is at least enabling and every active source ASE
    /// is enabling
    pub fn is_ready_to_create_stream(&self) -> bool {
        self.ases.iter().filter(|ase| ase.active).all(|ase| match ase.direction {
            Direction::Sink => matches!(ase.state, AseState::Streaming | AseState::Enabling),
            Direction::Source => ase.state == AseState::Enabling,
        })
    }

    pub fn is_ready_to_suspend_stream(&self) -> bool {
        self.ases.iter().filter(|ase| ase.active).all(|ase| match ase.direction {
            Direction::Sink => ase.state == AseState::QosConfigured,
            Direction::Source => ase.state == AseState::Disabling,
        })
    }

    /// Whether the CIS of every active ASE is up. A device without ASEs has
    /// nothing to wait for.
    pub fn have_all_active_ases_cis_est(&self) -> bool {
        if self.ases.is_empty() {
            warn!("{:?}: no ASEs", self.address);
            return true;
        }
        let mut has_active = false;
        for ase in self.ases.iter().filter(|ase| ase.active) {
            has_active = true;
            if ase.cis_state != CisState::Connected {
                return false;
            }
        }
        has_active
    }

    pub fn have_any_cis_connected(&self) -> bool {
        self.ases.iter().any(|ase| {
            matches!(
                ase.cis_state,
                CisState::Connected | CisState::Connecting | CisState::Disconnecting
            )
        })
    }

    /// Channel count bitmask of the first LTV based PAC of the direction.
    /// Zero means there are no capabilities.
    pub fn get_supported_audio_channel_counts(&self, direction: Direction) -> u8 {
        let pacs = &self.pacs[direction];
        if pacs.is_empty() {
            error!("{:?}: missing PAC for {direction:?}", self.address);
            return 0;
        }
        for record in pacs.iter().flat_map(|(_, records)| records) {
            if !record.codec_id.is_using_ltv_format() {
                warn!("unknown codec PAC record for codec {:?}", record.codec_id);
                continue;
            }
            return record.codec_spec_caps.as_core_codec_capabilities().supported_audio_channel_counts.unwrap_or(1);
        }
        0
    }

    /// The first capability record able to carry `setting`
    pub fn get_codec_configuration_supported_pac(
        &self,
        direction: Direction,
        setting: &CodecConfigSetting,
    ) -> Option<&AcsAcRecord> {
        let pac = self.pacs[direction]
            .iter()
            .flat_map(|(_, records)| records)
            .find(|record| is_codec_config_setting_supported(record, setting));
        if pac.is_none() {
            debug!("{:?}: no {direction:?} PAC for {:?}", self.address, setting.id);
        }
        pac
    }

    /// Metadata announced for a stream with the given contexts
    pub fn get_metadata(&self, contexts: AudioContexts, ccid_list: &[u8]) -> LtvMap {
        make_metadata(contexts, ccid_list)
    }

    fn metadata_for(&self, direction: Direction, contexts: AudioContexts, ccid_list: &[u8]) -> Vec<u8> {
        let filtered = contexts & self.available_contexts[direction];
        if filtered.is_empty() {
            debug!(
                "{:?}: none of {contexts:?} available for {direction:?}, using unspecified",
                self.address
            );
            return make_metadata(AudioContexts::UNSPECIFIED, &[]).to_vec();
        }
        make_metadata(filtered, ccid_list).to_vec()
    }

    /// Attaches metadata to an ASE, restricted to what the device currently
    /// accepts
    pub fn set_metadata_to_ase(&mut self, ase_idx: usize, contexts: AudioContexts, ccid_list: &[u8]) {
        let Some(direction) = self.ases.get(ase_idx).map(|ase| ase.direction) else { return };
        let metadata = self.metadata_for(direction, contexts, ccid_list);
        self.ases[ase_idx].metadata = metadata;
    }

    /// Whether the metadata of any active ASE would change
    pub fn is_metadata_changed(
        &self,
        contexts: &BidirectionalPair<AudioContexts>,
        ccid_lists: &BidirectionalPair<Vec<u8>>,
    ) -> bool {
        self.ases.iter().filter(|ase| ase.active).any(|ase| {
            self.metadata_for(ase.direction, contexts[ase.direction], &ccid_lists[ase.direction])
                != ase.metadata
        })
    }

    /// Reactivates ASEs left Codec Configured for `context_type`. Returns
    /// whether any ASE was activated.
    pub fn activate_configured_ases(
        &mut self,
        context_type: LeAudioContextType,
        contexts: &BidirectionalPair<AudioContexts>,
        ccid_lists: &BidirectionalPair<Vec<u8>>,
    ) -> bool {
        if !self.is_connected() {
            warn!("{:?}: device not connected", self.address);
            return false;
        }

        let mut activated = false;
        for idx in 0..self.ases.len() {
            let ase = &self.ases[idx];
            if ase.state != AseState::CodecConfigured
                || ase.configured_for_context_type != context_type
            {
                continue;
            }
            let direction = ase.direction;
            debug!("{:?}: activating ASE {}", self.address, ase.id);
            self.ases[idx].active = true;
            self.set_metadata_to_ase(idx, contexts[direction], &ccid_lists[direction]);
            activated = true;
        }
        activated
    }

    pub fn deactivate_all_ases(&mut self) {
        for ase in self.ases.iter_mut() {
            ase.deactivate();
        }
    }

    /// Picks the channel allocation of the next ASE, claiming it in the group
    pub fn pick_audio_location(
        &self,
        strategy: ConfigurationStrategy,
        direction: Direction,
        group_locations: &mut AudioLocations,
    ) -> AudioLocations {
        let device_locations = self.audio_locations[direction];
        let left_not_assigned = !group_locations.intersects(AudioLocations::ANY_LEFT);
        let right_not_assigned = !group_locations.intersects(AudioLocations::ANY_RIGHT);
        let left = device_locations.first_left();
        let right = device_locations.first_right();

        if left.is_none() && right.is_none() {
            warn!("{:?}: cannot render left nor right channel", self.address);
        }

        match strategy {
            ConfigurationStrategy::MonoOneCisPerDevice
            | ConfigurationStrategy::StereoTwoCisesPerDevice => {
                if let Some(left) = left.filter(|_| left_not_assigned) {
                    *group_locations |= left;
                    return left;
                }
                if let Some(right) = right.filter(|_| right_not_assigned) {
                    *group_locations |= right;
                    return right;
                }
            }
            ConfigurationStrategy::StereoOneCisPerDevice => {
                if let (Some(left), Some(right)) = (left, right) {
                    *group_locations |= left | right;
                    return left | right;
                }
            }
            ConfigurationStrategy::Rfu => {
                error!("unsupported strategy {strategy:?}");
            }
        }

        error!(
            "{:?}: no free location for {strategy:?}, device {device_locations:?}, group {group_locations:?}",
            self.address
        );
        // Several members may end up sharing a location
        left.or(right).unwrap_or_else(AudioLocations::empty)
    }

    /// Activates and configures this device's share of the ASEs `conf`
    /// requires in `direction`
    #[allow(clippy::too_many_arguments)]
    pub fn configure_ases(
        &mut self,
        conf: &AudioSetConfiguration,
        direction: Direction,
        context_type: LeAudioContextType,
        group_state: &mut DirectionConfigurationState,
        metadata_contexts: AudioContexts,
        ccid_list: &[u8],
        reuse_cis_id: bool,
    ) -> Result<(), ConfigurationFailure> {
        let ents = &conf.confs[direction];
        let Some(first_ent) = ents.first() else {
            return Ok(());
        };

        let Some(mut idx) = self
            .first_active_ase_idx(direction)
            .or_else(|| self.first_inactive_ase_idx(direction, reuse_cis_id))
        else {
            error!("{:?}: no free {direction:?} ASE", self.address);
            return Err(ConfigurationFailure::NoFreeAse);
        };

        let device_cnt = conf.topology_info.device_count[direction].max(1) as usize;
        let strategy = conf.topology_info.strategy[direction];
        let max_required_ase_per_dev = ents.len().div_ceil(device_cnt);

        let Some(pac) = self.get_codec_configuration_supported_pac(direction, &first_ent.codec)
        else {
            return Err(ConfigurationFailure::NoSupportedPac);
        };
        let max_codec_frames_per_sdu =
            pac.codec_spec_caps.as_core_codec_capabilities().get_max_codec_frames_per_sdu();

        let needed_ase =
            max_required_ase_per_dev.min(ents.len().saturating_sub(group_state.active_ases));
        debug!(
            "{:?}: configuring {needed_ase} {direction:?} ASEs for {context_type:?}",
            self.address
        );

        for _ in 0..needed_ase {
            let ent = &ents[group_state.active_ases.min(ents.len() - 1)];
            let audio_location = (self.ases[idx].state != AseState::Streaming
                && ent.codec.params.find(codec_spec_conf::TYPE_AUDIO_CHANNEL_ALLOCATION).is_none())
            .then(|| self.pick_audio_location(strategy, direction, &mut group_state.audio_locations));

            let ase = &mut self.ases[idx];
            ase.active = true;
            ase.configured_for_context_type = context_type;
            group_state.active_ases += 1;

            if ase.state != AseState::Streaming {
                if ase.state == AseState::CodecConfigured {
                    ase.reconfigure = true;
                }
                ase.target_latency = ent.qos.target_latency;
                ase.codec_id = ent.codec.id;
                ase.codec_config = ent.codec.params.clone();

                if let Some(location) = audio_location {
                    ase.codec_config
                        .add_u32(codec_spec_conf::TYPE_AUDIO_CHANNEL_ALLOCATION, location.bits());
                }
                if ase.codec_config.find_u8(codec_spec_conf::TYPE_CODEC_FRAME_BLOCKS_PER_SDU).is_none()
                {
                    ase.codec_config.add_u8(
                        codec_spec_conf::TYPE_CODEC_FRAME_BLOCKS_PER_SDU,
                        max_codec_frames_per_sdu,
                    );
                }

                let core = ase.codec_config.as_core_codec_config();
                ase.qos_config.max_sdu_size = core.calculate_max_sdu_size();
                ase.qos_config.sdu_interval = core.get_frame_duration_us().unwrap_or(0);
                ase.qos_config.retrans_nb = ent.qos.retransmission_number;
                ase.qos_config.max_transport_latency = ent.qos.max_transport_latency;

                info!(
                    "{:?}: ASE {} configured, max SDU {}, SDU interval {} us",
                    self.address, ase.id, ase.qos_config.max_sdu_size, ase.qos_config.sdu_interval
                );
                self.set_metadata_to_ase(idx, metadata_contexts, ccid_list);
            }

            match self
                .next_active_ase_idx_with_same_direction(idx)
                .or_else(|| self.first_inactive_ase_idx(direction, reuse_cis_id))
            {
                Some(next) => idx = next,
                None => break,
            }
        }

        Ok(())
    }
}

/// Registry of all known devices
#[derive(Debug, Default)]
pub struct LeAudioDevices {
    devices: Vec<LeAudioDevice>,
    by_conn_id: HashMap<ConnectionId, RawAddress>,
}

impl LeAudioDevices {
    /// Constructor
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a device. Returns false if the address is already known.
    pub fn add(
        &mut self,
        address: RawAddress,
        state: DeviceConnectState,
        group_id: GroupId,
    ) -> bool {
        if self.find_by_address(&address).is_some() {
            error!("device already exists: {address:?}");
            return false;
        }
        self.devices.push(LeAudioDevice::new(address, state, group_id));
        true
    }

    pub fn remove(&mut self, address: &RawAddress) -> Option<LeAudioDevice> {
        let idx = self.devices.iter().position(|device| device.address == *address)?;
        let device = self.devices.remove(idx);
        self.by_conn_id.remove(&device.conn_id);
        Some(device)
    }

    /// Records a GATT connection change of a device
    pub fn set_conn_id(&mut self, address: &RawAddress, conn_id: ConnectionId) {
        let Some(device) = self.devices.iter_mut().find(|device| device.address == *address)
        else {
            warn!("unknown device {address:?}");
            return;
        };
        self.by_conn_id.remove(&device.conn_id);
        device.conn_id = conn_id;
        if conn_id != ConnectionId::INVALID {
            self.by_conn_id.insert(conn_id, *address);
        }
    }

    pub fn find_by_address(&self, address: &RawAddress) -> Option<&LeAudioDevice> {
        self.devices.iter().find(|device| device.address == *address)
    }

    pub fn find_by_address_mut(&mut self, address: &RawAddress) -> Option<&mut LeAudioDevice> {
        self.devices.iter_mut().find(|device| device.address == *address)
    }

    pub fn find_by_conn_id(&self, conn_id: ConnectionId) -> Option<&LeAudioDevice> {
        let address = self.by_conn_id.get(&conn_id)?;
        self.find_by_address(address)
    }

    pub fn find_by_conn_id_mut(&mut self, conn_id: ConnectionId) -> Option<&mut LeAudioDevice> {
        let address = *self.by_conn_id.get(&conn_id)?;
        self.find_by_address_mut(&address)
    }

    /// The member of `group_id` owning the CIS with connection handle
    /// `conn_hdl`. The group id doubles as the CIG id.
    pub fn find_by_cis_conn_hdl(&self, group_id: GroupId, conn_hdl: u16) -> Option<&LeAudioDevice> {
        self.devices.iter().find(|device| {
            device.group_id == group_id
                && device.ases.iter().any(|ase| ase.cis_conn_hdl == conn_hdl)
        })
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LeAudioDevice> {
        self.devices.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut LeAudioDevice> {
        self.devices.iter_mut()
    }

    /// If any member of the group is set to autoconnect, switches every
    /// disconnected member to autoconnect too. Returns the devices that
    /// should now be connected.
    pub fn set_initial_group_autoconnect_state(
        &mut self,
        group_id: GroupId,
        autoconnect_flag: bool,
    ) -> Vec<RawAddress> {
        if !autoconnect_flag {
            return vec![];
        }
        let any_autoconnect = self
            .devices
            .iter()
            .any(|device| device.group_id == group_id && device.autoconnect_flag);
        if !any_autoconnect {
            return vec![];
        }

        let mut to_connect = vec![];
        for device in self.devices.iter_mut().filter(|device| device.group_id == group_id) {
            if device.connection_state == DeviceConnectState::Disconnected {
                device.connection_state = DeviceConnectState::ConnectingAutoconnect;
                device.autoconnect_flag = true;
                to_connect.push(device.address);
            }
        }
        to_connect
    }

    pub fn clean_up(&mut self) {
        self.devices.clear();
        self.by_conn_id.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::le_audio::{
        ltv::codec_spec_caps,
        set_configuration::{AseConfiguration, QosConfigSetting},
        types::CodecId,
    };

    const ADDRESS: RawAddress = RawAddress([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
    const OTHER_ADDRESS: RawAddress = RawAddress([0x11, 0x22, 0x33, 0x44, 0x55, 0x77]);
    const GROUP_ID: GroupId = GroupId(1);
    const CONN_ID: ConnectionId = ConnectionId(3);

    const QOS: QosConfigSetting =
        QosConfigSetting { target_latency: 0x02, retransmission_number: 5, max_transport_latency: 20 };

    fn pac_value(channel_counts: u8) -> Vec<u8> {
        let mut caps = LtvMap::new();
        caps.add_u16(codec_spec_caps::TYPE_SUPPORTED_SAMPLING_FREQUENCIES, 0x0084)
            .add_u8(codec_spec_caps::TYPE_SUPPORTED_FRAME_DURATIONS, 0x02)
            .add_u8(codec_spec_caps::TYPE_SUPPORTED_AUDIO_CHANNEL_COUNTS, channel_counts)
            .add_u32(codec_spec_caps::TYPE_SUPPORTED_OCTETS_PER_CODEC_FRAME, 40 | (120 << 16))
            .add_u8(codec_spec_caps::TYPE_SUPPORTED_MAX_CODEC_FRAMES_PER_SDU, 1);
        let caps = caps.to_vec();
        let mut value = vec![0x01, 0x06, 0x00, 0x00, 0x00, 0x00, caps.len() as u8];
        value.extend(caps);
        value.push(0x00);
        value
    }

    fn make_device(ase_count: u8, locations: AudioLocations, channel_counts: u8) -> LeAudioDevice {
        let mut device = LeAudioDevice::new(ADDRESS, DeviceConnectState::Connected, GROUP_ID);
        device.conn_id = CONN_ID;
        for id in 1..=ase_count {
            let hdl = AttHandle(0x20 + 2 * id as u16);
            device.ases.push(Ase::new(
                HandlePair::new(hdl, AttHandle(hdl.0 + 1)),
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
        device
    }

    fn make_conf(channels: u8, ase_count: usize, device_count: u8) -> AudioSetConfiguration {
        let ase = AseConfiguration {
            codec: CodecConfigSetting::lc3(
                codec_spec_conf::SAMPLING_FREQ_48000HZ,
                codec_spec_conf::FRAME_DURATION_10000US,
                120,
                channels,
            ),
            qos: QOS,
        };
        AudioSetConfiguration::new(
            "test",
            BidirectionalPair::new(vec![ase; ase_count], vec![]),
            BidirectionalPair::new(device_count, 0),
        )
    }

    #[test]
    fn test_configure_stereo_one_cis() {
        // arrange
        let mut device =
            make_device(2, AudioLocations::FRONT_LEFT | AudioLocations::FRONT_RIGHT, 0x03);
        let conf = make_conf(2, 1, 1);
        let mut state = DirectionConfigurationState::default();

        // act
        device
            .configure_ases(
                &conf,
                Direction::Sink,
                LeAudioContextType::Media,
                &mut state,
                AudioContexts::MEDIA,
                &[],
                false,
            )
            .unwrap();

        // assert
        assert_eq!(state.active_ases, 1);
        let ase = device.get_first_active_ase_by_direction(Direction::Sink).unwrap();
        assert_eq!(ase.id, 1);
        assert_eq!(
            ase.codec_config.find_u32(codec_spec_conf::TYPE_AUDIO_CHANNEL_ALLOCATION),
            Some((AudioLocations::FRONT_LEFT | AudioLocations::FRONT_RIGHT).bits())
        );
        assert_eq!(ase.qos_config.max_sdu_size, 240);
        assert_eq!(ase.qos_config.sdu_interval, 10000);
        assert_eq!(ase.qos_config.retrans_nb, 5);
        assert_eq!(ase.configured_for_context_type, LeAudioContextType::Media);
        assert!(!device.ases[1].active);
    }

    #[test]
    fn test_configure_stereo_two_cises() {
        // arrange
        let mut device =
            make_device(2, AudioLocations::FRONT_LEFT | AudioLocations::FRONT_RIGHT, 0x01);
        let conf = make_conf(1, 2, 1);
        let mut state = DirectionConfigurationState::default();

        // act
        device
            .configure_ases(
                &conf,
                Direction::Sink,
                LeAudioContextType::Media,
                &mut state,
                AudioContexts::MEDIA,
                &[],
                false,
            )
            .unwrap();

        // assert
        let allocations: Vec<_> = device
            .ases
            .iter()
            .map(|ase| ase.codec_config.find_u32(codec_spec_conf::TYPE_AUDIO_CHANNEL_ALLOCATION))
            .collect();
        assert_eq!(
            allocations,
            vec![Some(AudioLocations::FRONT_LEFT.bits()), Some(AudioLocations::FRONT_RIGHT.bits())]
        );
        assert_eq!(state.active_ases, 2);
    }

    #[test]
    fn test_configure_without_free_ase() {
        let mut device = make_device(0, AudioLocations::FRONT_LEFT, 0x01);
        let conf = make_conf(1, 1, 1);
        let mut state = DirectionConfigurationState::default();

        let result = device.configure_ases(
            &conf,
            Direction::Sink,
            LeAudioContextType::Media,
            &mut state,
            AudioContexts::MEDIA,
            &[],
            false,
        );

        assert_eq!(result, Err(ConfigurationFailure::NoFreeAse));
        assert_eq!(state.active_ases, 0);
    }

    #[test]
    fn test_configure_without_matching_pac() {
        let mut device = make_device(1, AudioLocations::FRONT_LEFT, 0x01);
        let conf = make_conf(2, 1, 1);
        let mut state = DirectionConfigurationState::default();

        let result = device.configure_ases(
            &conf,
            Direction::Sink,
            LeAudioContextType::Media,
            &mut state,
            AudioContexts::MEDIA,
            &[],
            false,
        );

        assert_eq!(result, Err(ConfigurationFailure::NoSupportedPac));
        assert!(!device.have_active_ase());
    }

    #[test]
    fn test_configure_marks_reconfigure() {
        let mut device = make_device(1, AudioLocations::FRONT_LEFT, 0x01);
        device.ases[0].state = AseState::CodecConfigured;
        let conf = make_conf(1, 1, 1);
        let mut state = DirectionConfigurationState::default();

        device
            .configure_ases(
                &conf,
                Direction::Sink,
                LeAudioContextType::Media,
                &mut state,
                AudioContexts::MEDIA,
                &[],
                false,
            )
            .unwrap();

        assert!(device.ases[0].reconfigure);
    }

    #[test]
    fn test_configure_reuses_cis_id() {
        let mut device = make_device(2, AudioLocations::FRONT_LEFT, 0x01);
        device.ases[1].cis_id = 4;
        let conf = make_conf(1, 1, 1);
        let mut state = DirectionConfigurationState::default();

        device
            .configure_ases(
                &conf,
                Direction::Sink,
                LeAudioContextType::Media,
                &mut state,
                AudioContexts::MEDIA,
                &[],
                true,
            )
            .unwrap();

        assert!(!device.ases[0].active);
        assert!(device.ases[1].active);
    }

    #[test]
    fn test_pick_audio_location_two_devices() {
        // arrange
        let first = make_device(1, AudioLocations::FRONT_LEFT | AudioLocations::FRONT_RIGHT, 1);
        let second = make_device(1, AudioLocations::FRONT_LEFT | AudioLocations::FRONT_RIGHT, 1);
        let mut group_locations = AudioLocations::empty();

        // act
        let first_pick = first.pick_audio_location(
            ConfigurationStrategy::MonoOneCisPerDevice,
            Direction::Sink,
            &mut group_locations,
        );
        let second_pick = second.pick_audio_location(
            ConfigurationStrategy::MonoOneCisPerDevice,
            Direction::Sink,
            &mut group_locations,
        );

        // assert
        assert_eq!(first_pick, AudioLocations::FRONT_LEFT);
        assert_eq!(second_pick, AudioLocations::FRONT_RIGHT);
        assert_eq!(group_locations, AudioLocations::FRONT_LEFT | AudioLocations::FRONT_RIGHT);
    }

    #[test]
    fn test_pick_audio_location_exhausted_falls_back_to_claimed() {
        let device = make_device(1, AudioLocations::FRONT_LEFT, 1);
        let mut group_locations = AudioLocations::FRONT_LEFT | AudioLocations::FRONT_RIGHT;

        let pick = device.pick_audio_location(
            ConfigurationStrategy::MonoOneCisPerDevice,
            Direction::Sink,
            &mut group_locations,
        );

        assert_eq!(pick, AudioLocations::FRONT_LEFT);
    }

    #[test]
    fn test_pick_audio_location_stereo_needs_both_sides() {
        let device = make_device(1, AudioLocations::FRONT_RIGHT, 1);
        let mut group_locations = AudioLocations::empty();

        let pick = device.pick_audio_location(
            ConfigurationStrategy::StereoOneCisPerDevice,
            Direction::Sink,
            &mut group_locations,
        );

        assert_eq!(pick, AudioLocations::FRONT_RIGHT);
        assert!(group_locations.is_empty());
    }

    #[test]
    fn test_malformed_pac_keeps_previous_records() {
        // arrange
        let mut device = make_device(1, AudioLocations::FRONT_LEFT, 0x01);
        let mut value = pac_value(0x03);
        value[6] += 4;

        // act
        let result = device.register_pacs(
            Direction::Sink,
            HandlePair::new(AttHandle(0x10), AttHandle(0x11)),
            &value,
        );

        // assert
        assert_eq!(result, Err(ParseError::Pacs));
        assert_eq!(device.get_supported_audio_channel_counts(Direction::Sink), 0x01);
    }

    #[test]
    fn test_supported_audio_channel_counts() {
        let device = make_device(1, AudioLocations::FRONT_LEFT, 0x03);

        assert_eq!(device.get_supported_audio_channel_counts(Direction::Sink), 0x03);
        assert_eq!(device.get_supported_audio_channel_counts(Direction::Source), 0);
    }

    #[test]
    fn test_metadata_filtered_to_available_contexts() {
        // arrange
        let mut device = make_device(1, AudioLocations::FRONT_LEFT, 0x01);
        device.ases[0].active = true;

        // act
        device.set_metadata_to_ase(0, AudioContexts::GAME, &[0x05]);

        // assert
        assert_eq!(device.ases[0].metadata, make_metadata(AudioContexts::UNSPECIFIED, &[]).to_vec());
        let contexts = BidirectionalPair::new(AudioContexts::MEDIA, AudioContexts::empty());
        let ccids = BidirectionalPair::new(vec![0x05], vec![]);
        assert!(device.is_metadata_changed(&contexts, &ccids));
        device.set_metadata_to_ase(0, AudioContexts::MEDIA, &[0x05]);
        assert!(!device.is_metadata_changed(&contexts, &ccids));
    }

    #[test]
    fn test_activate_configured_ases() {
        // arrange
        let mut device = make_device(2, AudioLocations::FRONT_LEFT, 0x01);
        device.ases[0].state = AseState::CodecConfigured;
        device.ases[0].configured_for_context_type = LeAudioContextType::Media;
        device.ases[1].state = AseState::CodecConfigured;
        device.ases[1].configured_for_context_type = LeAudioContextType::Game;
        let contexts = BidirectionalPair::new(AudioContexts::MEDIA, AudioContexts::empty());

        // act
        let activated = device.activate_configured_ases(
            LeAudioContextType::Media,
            &contexts,
            &BidirectionalPair::default(),
        );

        // assert
        assert!(activated);
        assert!(device.ases[0].active);
        assert!(!device.ases[1].active);
        assert_eq!(device.ases[0].metadata, make_metadata(AudioContexts::MEDIA, &[]).to_vec());
    }

    #[test]
    fn test_activate_configured_ases_needs_connection() {
        let mut device = make_device(1, AudioLocations::FRONT_LEFT, 0x01);
        device.conn_id = ConnectionId::INVALID;
        device.ases[0].state = AseState::CodecConfigured;
        device.ases[0].configured_for_context_type = LeAudioContextType::Media;

        assert!(!device.activate_configured_ases(
            LeAudioContextType::Media,
            &BidirectionalPair::default(),
            &BidirectionalPair::default(),
        ));
    }

    #[test]
    fn test_stream_readiness() {
        let mut device = make_device(2, AudioLocations::FRONT_LEFT, 0x01);
        device.ases[1].direction = Direction::Source;
        device.ases[0].active = true;
        device.ases[1].active = true;

        device.ases[0].state = AseState::Streaming;
        device.ases[1].state = AseState::Enabling;
        assert!(device.is_ready_to_create_stream());

        device.ases[1].state = AseState::Streaming;
        assert!(!device.is_ready_to_create_stream());

        device.ases[0].state = AseState::QosConfigured;
        device.ases[1].state = AseState::Disabling;
        assert!(device.is_ready_to_suspend_stream());
    }

    #[test]
    fn test_cis_established() {
        let mut device = make_device(2, AudioLocations::FRONT_LEFT, 0x01);
        assert!(!device.have_all_active_ases_cis_est());

        device.ases[0].active = true;
        device.ases[0].cis_state = CisState::Connected;
        assert!(device.have_all_active_ases_cis_est());
        assert!(device.have_any_cis_connected());

        device.ases.clear();
        assert!(device.have_all_active_ases_cis_est());
    }

    #[test]
    fn test_deactivate_all_ases() {
        let mut device = make_device(1, AudioLocations::FRONT_LEFT, 0x01);
        device.ases[0].active = true;
        device.ases[0].state = AseState::Streaming;
        device.ases[0].cis_id = 2;

        device.deactivate_all_ases();

        assert!(!device.have_active_ase());
        assert_eq!(device.ases[0].state, AseState::Idle);
        assert_eq!(device.ases[0].cis_id, INVALID_CIS_ID);
    }

    #[test]
    fn test_registry_lookups() {
        // arrange
        let mut devices = LeAudioDevices::new();
        assert!(devices.add(ADDRESS, DeviceConnectState::Connected, GROUP_ID));
        assert!(devices.add(OTHER_ADDRESS, DeviceConnectState::Disconnected, GROUP_ID));

        // act
        devices.set_conn_id(&ADDRESS, CONN_ID);
        devices.find_by_address_mut(&ADDRESS).unwrap().ases.push({
            let mut ase = Ase::new(HandlePair::default(), Direction::Sink, 1);
            ase.cis_conn_hdl = 0x60;
            ase
        });

        // assert
        assert!(!devices.add(ADDRESS, DeviceConnectState::Connected, GROUP_ID));
        assert_eq!(devices.find_by_conn_id(CONN_ID).unwrap().address, ADDRESS);
        assert_eq!(devices.find_by_cis_conn_hdl(GROUP_ID, 0x60).unwrap().address, ADDRESS);
        assert!(devices.find_by_cis_conn_hdl(GroupId(2), 0x60).is_none());

        devices.set_conn_id(&ADDRESS, ConnectionId::INVALID);
        assert!(devices.find_by_conn_id(CONN_ID).is_none());
        assert!(devices.remove(&ADDRESS).is_some());
        assert_eq!(devices.len(), 1);
    }

    #[test]
    fn test_initial_group_autoconnect_state() {
        // arrange
        let mut devices = LeAudioDevices::new();
        devices.add(ADDRESS, DeviceConnectState::Connected, GROUP_ID);
        devices.add(OTHER_ADDRESS, DeviceConnectState::Disconnected, GROUP_ID);
        devices.find_by_address_mut(&ADDRESS).unwrap().autoconnect_flag = true;

        // act
        let to_connect = devices.set_initial_group_autoconnect_state(GROUP_ID, true);

        // assert
        assert_eq!(to_connect, vec![OTHER_ADDRESS]);
        let other = devices.find_by_address(&OTHER_ADDRESS).unwrap();
        assert_eq!(other.connection_state, DeviceConnectState::ConnectingAutoconnect);
        assert!(other.autoconnect_flag);
    }

    #[test]
    fn test_vendor_pac_is_skipped_for_channel_counts() {
        let mut device = make_device(1, AudioLocations::FRONT_LEFT, 0x03);
        device.pacs.sink[0].1.insert(
            0,
            AcsAcRecord { codec_id: CodecId::vendor(1, 2), ..Default::default() },
        );

        assert_eq!(device.get_supported_audio_channel_counts(Direction::Sink), 0x03);
    }
}
