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

//! Audio Stream Endpoint model

use log::{debug, error, info};

use super::{
    ids::HandlePair,
    ltv::LtvMap,
    parser::{
        parse_ase_status_codec_configured_state_params, parse_ase_status_header,
        parse_ase_status_qos_configured_state_params, parse_ase_status_transient_state_params,
        ParseError,
    },
    types::{
        AseState, CisState, CodecId, DataPathState, Direction, LeAudioContextType, INVALID_CIS_ID,
    },
};

/// QoS parameters of an ASE, either requested by us or reported by the peer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AseQosConfiguration {
    pub sdu_interval: u32,
    pub framing: u8,
    pub phy: u8,
    pub max_sdu_size: u16,
    pub retrans_nb: u8,
    pub max_transport_latency: u16,
    pub presentation_delay_min: u32,
    pub presentation_delay_max: u32,
    pub presentation_delay: u32,
}

/// QoS preferences published by the peer in the Codec Configured state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AseQosPreferences {
    pub framing: u8,
    pub preferred_phy: u8,
    pub preferred_retrans_nb: u8,
    pub max_transport_latency: u16,
    pub preferred_pres_delay_min: u32,
    pub preferred_pres_delay_max: u32,
}

/// A single Audio Stream Endpoint of a remote device
#[derive(Clone, Debug)]
pub struct Ase {
    pub hdls: HandlePair,
    pub id: u8,
    pub direction: Direction,
    pub state: AseState,
    pub cis_state: CisState,
    pub data_path_state: DataPathState,
    /// Part of the currently selected configuration
    pub active: bool,
    /// Needs a new Codec Configuration while already configured
    pub reconfigure: bool,
    pub configured_for_context_type: LeAudioContextType,
    pub cis_id: u8,
    pub cis_conn_hdl: u16,
    pub target_latency: u8,
    pub codec_id: CodecId,
    pub codec_config: LtvMap,
    pub qos_config: AseQosConfiguration,
    pub qos_preferences: AseQosPreferences,
    pub metadata: Vec<u8>,
}

impl Ase {
    /// Constructor
    pub fn new(hdls: HandlePair, direction: Direction, id: u8) -> Self {
        Self {
            hdls,
            id,
            direction,
            state: AseState::Idle,
            cis_state: CisState::Idle,
            data_path_state: DataPathState::Idle,
            active: false,
            reconfigure: false,
            configured_for_context_type: LeAudioContextType::Uninitialized,
            cis_id: INVALID_CIS_ID,
            cis_conn_hdl: 0,
            target_latency: 0,
            codec_id: CodecId::default(),
            codec_config: LtvMap::new(),
            qos_config: AseQosConfiguration::default(),
            qos_preferences: AseQosPreferences::default(),
            metadata: vec![],
        }
    }

    /// Applies an ASE characteristic value. The state specific tail is
    /// validated before anything is changed.
    pub fn apply_status(&mut self, value: &[u8]) -> Result<AseState, ParseError> {
        let (header, tail) = parse_ase_status_header(value)?;
        if header.id != self.id {
            error!("ASE id mismatch: expected {}, got {}", self.id, header.id);
            return Err(ParseError::AseIdMismatch);
        }
        let Some(state) = AseState::from_u8(header.state) else {
            error!("ASE {} reports unknown state {:#04x}", self.id, header.state);
            return Err(ParseError::AseHeader);
        };

        match state {
            AseState::CodecConfigured => {
                let params = parse_ase_status_codec_configured_state_params(tail)?;
                let codec_config = if params.codec_id.is_using_ltv_format() {
                    LtvMap::parse(&params.codec_spec_conf)?
                } else {
                    LtvMap::new()
                };
                self.qos_preferences = AseQosPreferences {
                    framing: params.framing,
                    preferred_phy: params.preferred_phy,
                    preferred_retrans_nb: params.preferred_retrans_nb,
                    max_transport_latency: params.max_transport_latency,
                    preferred_pres_delay_min: params.preferred_pres_delay_min,
                    preferred_pres_delay_max: params.preferred_pres_delay_max,
                };
                self.qos_config.presentation_delay_min = params.pres_delay_min;
                self.qos_config.presentation_delay_max = params.pres_delay_max;
                self.codec_id = params.codec_id;
                self.codec_config = codec_config;
            }
            AseState::QosConfigured => {
                let params = parse_ase_status_qos_configured_state_params(tail)?;
                self.cis_id = params.cis_id;
                self.qos_config.sdu_interval = params.sdu_interval;
                self.qos_config.framing = params.framing;
                self.qos_config.phy = params.phy;
                self.qos_config.max_sdu_size = params.max_sdu;
                self.qos_config.retrans_nb = params.retrans_nb;
                self.qos_config.max_transport_latency = params.max_transport_latency;
                self.qos_config.presentation_delay = params.pres_delay;
            }
            AseState::Enabling | AseState::Streaming | AseState::Disabling => {
                let params = parse_ase_status_transient_state_params(tail)?;
                self.cis_id = params.cis_id;
                self.metadata = params.metadata;
            }
            AseState::Idle | AseState::Releasing => {}
        }

        info!("ASE {} ({:?}): {:?} -> {:?}", self.id, self.direction, self.state, state);
        self.state = state;
        Ok(state)
    }

    /// Resets everything that belongs to a stream, keeping the identity
    pub(crate) fn deactivate(&mut self) {
        if !self.active
            && self.cis_state != CisState::Idle
            && self.data_path_state != DataPathState::Idle
        {
            debug!(
                "ASE {} deactivated with cis state {:?} and data path {:?}",
                self.id, self.cis_state, self.data_path_state
            );
        }
        self.state = AseState::Idle;
        self.cis_state = CisState::Idle;
        self.data_path_state = DataPathState::Idle;
        self.active = false;
        self.reconfigure = false;
        self.cis_id = INVALID_CIS_ID;
        self.cis_conn_hdl = 0;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::le_audio::ids::AttHandle;

    const ASE_ID: u8 = 3;

    fn make_ase() -> Ase {
        Ase::new(HandlePair::new(AttHandle(0x20), AttHandle(0x21)), Direction::Sink, ASE_ID)
    }

    #[test]
    fn test_apply_codec_configured() {
        // arrange
        let mut ase = make_ase();
        let mut value = vec![ASE_ID, 0x01, 0x00, 0x02, 0x02, 0x14, 0x00];
        value.extend([0x40, 0x9c, 0x00, 0x40, 0x9c, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
        value.extend([0x06, 0x00, 0x00, 0x00, 0x00, 0x03, 0x02, 0x01, 0x08]);

        // act
        let state = ase.apply_status(&value);

        // assert
        assert_eq!(state, Ok(AseState::CodecConfigured));
        assert_eq!(ase.codec_id, CodecId::LC3);
        assert_eq!(ase.codec_config.as_core_codec_config().get_sampling_frequency_hz(), Some(48000));
        assert_eq!(ase.qos_config.presentation_delay_max, 40000);
        assert_eq!(ase.qos_preferences.max_transport_latency, 20);
    }

    #[test]
    fn test_apply_malformed_status_keeps_state() {
        // arrange
        let mut ase = make_ase();
        ase.state = AseState::QosConfigured;

        // act
        let result = ase.apply_status(&[ASE_ID, 0x04, 0x01, 0x02, 0x05, 0xaa]);

        // assert
        assert_eq!(result, Err(ParseError::AseTransient));
        assert_eq!(ase.state, AseState::QosConfigured);
    }

    #[test]
    fn test_apply_streaming_updates_metadata() {
        let mut ase = make_ase();

        ase.apply_status(&[ASE_ID, 0x04, 0x01, 0x02, 0x02, 0xaa, 0xbb]).unwrap();

        assert_eq!(ase.state, AseState::Streaming);
        assert_eq!(ase.cis_id, 0x02);
        assert_eq!(ase.metadata, vec![0xaa, 0xbb]);
    }

    #[test]
    fn test_apply_rejects_other_ase_id() {
        let mut ase = make_ase();

        assert_eq!(ase.apply_status(&[ASE_ID + 1, 0x00]), Err(ParseError::AseIdMismatch));
    }

    #[test]
    fn test_deactivate() {
        let mut ase = make_ase();
        ase.active = true;
        ase.state = AseState::Streaming;
        ase.cis_id = 1;
        ase.cis_conn_hdl = 0x60;

        ase.deactivate();

        assert!(!ase.active);
        assert_eq!(ase.state, AseState::Idle);
        assert_eq!(ase.cis_id, INVALID_CIS_ID);
        assert_eq!(ase.cis_conn_hdl, 0);
    }
}
