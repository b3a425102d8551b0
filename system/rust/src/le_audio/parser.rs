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

//! Parsers for the ASCS/PACS/TMAS attribute values received from the peer,
//! and builders for the ASE control point operations we write back.
//!
//! Every parser is fail-closed: on any length mismatch it returns an error
//! and produces nothing.

use log::{error, info};

use super::{
    ltv::LtvMap,
    reader::{Read, Reader},
    types::{AudioContexts, AudioLocations, BidirectionalPair, CodecId},
    writer::{Write, Writer},
};

/// Which attribute value failed to parse
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// A Length-Type-Value collection is truncated
    Ltv,
    /// The ASE status header is too short
    AseHeader,
    /// The Codec Configured tail of an ASE status is malformed
    AseCodecConfigured,
    /// The QoS Configured tail of an ASE status is malformed
    AseQosConfigured,
    /// The Enabling/Streaming/Disabling tail of an ASE status is malformed
    AseTransient,
    /// An ASE status for an id that does not match the characteristic
    AseIdMismatch,
    /// The ASE control point notification is malformed
    ControlPointNotification,
    /// A PAC record set is malformed
    Pacs,
    /// The audio locations value is malformed
    AudioLocations,
    /// A supported or available audio contexts value is malformed
    AudioContexts,
    /// The TMAP role value is malformed
    TmapRole,
    /// A persisted blob is malformed
    Storage,
}

/// ASE control point opcodes
pub mod ctp_opcode {
    pub const CODEC_CONFIGURATION: u8 = 0x01;
    pub const QOS_CONFIGURATION: u8 = 0x02;
    pub const ENABLE: u8 = 0x03;
    pub const RECEIVER_START_READY: u8 = 0x04;
    pub const DISABLE: u8 = 0x05;
    pub const RECEIVER_STOP_READY: u8 = 0x06;
    pub const UPDATE_METADATA: u8 = 0x07;
    pub const RELEASE: u8 = 0x08;
}

const ASE_RSP_HDR_MIN_LEN: usize = 2;
const ASE_STATUS_CODEC_CONF_MIN_LEN: usize = 23;
const ASE_STATUS_QOS_CONF_LEN: usize = 15;
const ASE_STATUS_TRANSIENT_MIN_LEN: usize = 3;
const CTP_NTF_MIN_LEN: usize = 2;
const CTP_ASE_ENTRY_LEN: usize = 3;
const ACS_PAC_RECORD_MIN_LEN: usize = 7;
const AUDIO_LOCATIONS_LEN: usize = 4;
const AUDIO_CONTEXTS_LEN: usize = 4;
const TMAP_ROLE_LEN: usize = 2;

/// Longest attribute value we are allowed to write
pub const GATT_MAX_ATTR_LEN: usize = 512;

impl Read for CodecId {
    fn read(r: &mut Reader) -> Option<Self> {
        Some(CodecId {
            coding_format: r.read_u8()?,
            vendor_company_id: r.read_u16()?,
            vendor_codec_id: r.read_u16()?,
        })
    }
}

impl Write for CodecId {
    fn write(&self, w: &mut Writer) {
        w.write_u8(self.coding_format);
        w.write_u16(self.vendor_company_id);
        w.write_u16(self.vendor_codec_id);
    }
}

/// Common header of every ASE characteristic value
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AseRspHeader {
    pub id: u8,
    pub state: u8,
}

/// Parses the ASE status header, returning it and the state specific tail
pub fn parse_ase_status_header(value: &[u8]) -> Result<(AseRspHeader, &[u8]), ParseError> {
    if value.len() < ASE_RSP_HDR_MIN_LEN {
        error!("wrong len of ASE char (header): {}", value.len());
        return Err(ParseError::AseHeader);
    }
    let header = AseRspHeader { id: value[0], state: value[1] };
    info!("ASE status: id {:#04x}, state {:#04x}", header.id, header.state);
    Ok((header, &value[ASE_RSP_HDR_MIN_LEN..]))
}

/// Tail of the Codec Configured ASE state
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AseCodecConfiguredStateParams {
    pub framing: u8,
    pub preferred_phy: u8,
    pub preferred_retrans_nb: u8,
    pub max_transport_latency: u16,
    pub pres_delay_min: u32,
    pub pres_delay_max: u32,
    pub preferred_pres_delay_min: u32,
    pub preferred_pres_delay_max: u32,
    pub codec_id: CodecId,
    pub codec_spec_conf: Vec<u8>,
}

pub fn parse_ase_status_codec_configured_state_params(
    value: &[u8],
) -> Result<AseCodecConfiguredStateParams, ParseError> {
    if value.len() < ASE_STATUS_CODEC_CONF_MIN_LEN {
        error!("wrong len of codec conf status (codec conf header)");
        return Err(ParseError::AseCodecConfigured);
    }

    let mut r = Reader::new(value);
    let params = (|| {
        let mut params = AseCodecConfiguredStateParams {
            framing: r.read_u8()?,
            preferred_phy: r.read_u8()?,
            preferred_retrans_nb: r.read_u8()?,
            max_transport_latency: r.read_u16()?,
            pres_delay_min: r.read_u24()?,
            pres_delay_max: r.read_u24()?,
            preferred_pres_delay_min: r.read_u24()?,
            preferred_pres_delay_max: r.read_u24()?,
            codec_id: r.read()?,
            codec_spec_conf: vec![],
        };
        let conf_len = r.read_u8()? as usize;
        if r.remaining() != conf_len {
            error!("wrong len of codec conf status (codec spec conf)");
            return None;
        }
        params.codec_spec_conf = r.get(conf_len)?.to_vec();
        Some(params)
    })();

    params.ok_or(ParseError::AseCodecConfigured)
}

/// Tail of the QoS Configured ASE state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AseQosConfiguredStateParams {
    pub cig_id: u8,
    pub cis_id: u8,
    pub sdu_interval: u32,
    pub framing: u8,
    pub phy: u8,
    pub max_sdu: u16,
    pub retrans_nb: u8,
    pub max_transport_latency: u16,
    pub pres_delay: u32,
}

pub fn parse_ase_status_qos_configured_state_params(
    value: &[u8],
) -> Result<AseQosConfiguredStateParams, ParseError> {
    if value.len() != ASE_STATUS_QOS_CONF_LEN {
        error!("wrong len of ASE characteristic (QoS conf header)");
        return Err(ParseError::AseQosConfigured);
    }

    let mut r = Reader::new(value);
    let params = (|| {
        Some(AseQosConfiguredStateParams {
            cig_id: r.read_u8()?,
            cis_id: r.read_u8()?,
            sdu_interval: r.read_u24()?,
            framing: r.read_u8()?,
            phy: r.read_u8()?,
            max_sdu: r.read_u16()?,
            retrans_nb: r.read_u8()?,
            max_transport_latency: r.read_u16()?,
            pres_delay: r.read_u24()?,
        })
    })();

    params.ok_or(ParseError::AseQosConfigured)
}

/// Tail of the Enabling, Streaming and Disabling ASE states
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AseTransientStateParams {
    pub cig_id: u8,
    pub cis_id: u8,
    pub metadata: Vec<u8>,
}

pub fn parse_ase_status_transient_state_params(
    value: &[u8],
) -> Result<AseTransientStateParams, ParseError> {
    if value.len() < ASE_STATUS_TRANSIENT_MIN_LEN {
        error!("wrong len of ASE characteristic (metadata)");
        return Err(ParseError::AseTransient);
    }

    let mut r = Reader::new(value);
    let params = (|| {
        let cig_id = r.read_u8()?;
        let cis_id = r.read_u8()?;
        let metadata_len = r.read_u8()? as usize;
        if r.remaining() != metadata_len {
            error!("wrong len of ASE characteristic (metadata)");
            return None;
        }
        Some(AseTransientStateParams { cig_id, cis_id, metadata: r.get(metadata_len)?.to_vec() })
    })();

    params.ok_or(ParseError::AseTransient)
}

/// One ASE entry of a control point notification
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CtpAseEntry {
    pub ase_id: u8,
    pub response_code: u8,
    pub reason: u8,
}

/// ASE control point notification
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CtpNtf {
    pub op: u8,
    pub entries: Vec<CtpAseEntry>,
}

pub fn parse_ase_ctp_notification(value: &[u8]) -> Result<CtpNtf, ParseError> {
    if value.len() < CTP_NTF_MIN_LEN {
        error!("wrong len of ASE control point notification: {}", value.len());
        return Err(ParseError::ControlPointNotification);
    }

    let (op, num_entries) = (value[0], value[1] as usize);
    if value.len() != CTP_NTF_MIN_LEN + num_entries * CTP_ASE_ENTRY_LEN {
        error!("wrong len of ASE control point notification (ASE ids)");
        return Err(ParseError::ControlPointNotification);
    }

    let entries = value[CTP_NTF_MIN_LEN..]
        .chunks_exact(CTP_ASE_ENTRY_LEN)
        .map(|e| CtpAseEntry { ase_id: e[0], response_code: e[1], reason: e[2] })
        .collect();

    info!("control point notification: opcode {op:#04x}, {num_entries} ASEs");
    Ok(CtpNtf { op, entries })
}

/// Codec Configuration request for one ASE
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CtpCodecConf {
    pub ase_id: u8,
    pub target_latency: u8,
    pub target_phy: u8,
    pub codec_id: CodecId,
    pub codec_config: Vec<u8>,
}

pub fn prepare_ase_ctp_codec_config(confs: &[CtpCodecConf]) -> Option<Vec<u8>> {
    if confs.is_empty() {
        return None;
    }

    let mut w = Writer::new(vec![]);
    w.write_u8(ctp_opcode::CODEC_CONFIGURATION);
    w.write_u8(u8::try_from(confs.len()).ok()?);
    for conf in confs {
        w.write_u8(conf.ase_id);
        w.write_u8(conf.target_latency);
        w.write_u8(conf.target_phy);
        w.write(&conf.codec_id);
        w.write_len_prefixed(&conf.codec_config)?;
        info!(
            "codec configuration: ase {:#04x}, target latency {:#04x}, phy {:#04x}, {:?}",
            conf.ase_id, conf.target_latency, conf.target_phy, conf.codec_id
        );
    }
    Some(w.into_vec())
}

/// QoS Configuration request for one ASE
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CtpQosConf {
    pub ase_id: u8,
    pub cig: u8,
    pub cis: u8,
    pub sdu_interval: u32,
    pub framing: u8,
    pub phy: u8,
    pub max_sdu: u16,
    pub retrans_nb: u8,
    pub max_transport_latency: u16,
    pub pres_delay: u32,
}

pub fn prepare_ase_ctp_config_qos(confs: &[CtpQosConf]) -> Option<Vec<u8>> {
    if confs.is_empty() {
        return None;
    }

    let mut w = Writer::new(vec![]);
    w.write_u8(ctp_opcode::QOS_CONFIGURATION);
    w.write_u8(u8::try_from(confs.len()).ok()?);
    for conf in confs {
        w.write_u8(conf.ase_id);
        w.write_u8(conf.cig);
        w.write_u8(conf.cis);
        w.write_u24(conf.sdu_interval);
        w.write_u8(conf.framing);
        w.write_u8(conf.phy);
        w.write_u16(conf.max_sdu);
        w.write_u8(conf.retrans_nb);
        w.write_u16(conf.max_transport_latency);
        w.write_u24(conf.pres_delay);
    }
    Some(w.into_vec())
}

/// Enable or Update Metadata request for one ASE
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CtpMetadata {
    pub ase_id: u8,
    pub metadata: Vec<u8>,
}

fn prepare_ase_ctp_metadata_op(op: u8, confs: &[CtpMetadata]) -> Option<Vec<u8>> {
    if confs.is_empty() {
        return None;
    }
    let Ok(num) = u8::try_from(confs.len()) else {
        error!("too many ASEs in request: {}", confs.len());
        return None;
    };

    let mut w = Writer::new(vec![]);
    w.write_u8(op);
    w.write_u8(num);
    for conf in confs {
        w.write_u8(conf.ase_id);
        if w.write_len_prefixed(&conf.metadata).is_none() {
            error!("ase[{}] metadata length is invalid", conf.ase_id);
            return None;
        }
    }

    let value = w.into_vec();
    if value.len() > GATT_MAX_ATTR_LEN {
        error!("message length above GATT maximum: {}", value.len());
        return None;
    }
    Some(value)
}

pub fn prepare_ase_ctp_enable(confs: &[CtpMetadata]) -> Option<Vec<u8>> {
    prepare_ase_ctp_metadata_op(ctp_opcode::ENABLE, confs)
}

pub fn prepare_ase_ctp_update_metadata(confs: &[CtpMetadata]) -> Option<Vec<u8>> {
    prepare_ase_ctp_metadata_op(ctp_opcode::UPDATE_METADATA, confs)
}

fn prepare_ase_ctp_id_list_op(op: u8, ase_ids: &[u8]) -> Option<Vec<u8>> {
    let mut w = Writer::new(vec![]);
    w.write_u8(op);
    w.write_len_prefixed(ase_ids)?;
    Some(w.into_vec())
}

pub fn prepare_ase_ctp_audio_receiver_start_ready(ase_ids: &[u8]) -> Option<Vec<u8>> {
    if ase_ids.is_empty() {
        return None;
    }
    prepare_ase_ctp_id_list_op(ctp_opcode::RECEIVER_START_READY, ase_ids)
}

pub fn prepare_ase_ctp_disable(ase_ids: &[u8]) -> Option<Vec<u8>> {
    if ase_ids.is_empty() {
        return None;
    }
    prepare_ase_ctp_id_list_op(ctp_opcode::DISABLE, ase_ids)
}

pub fn prepare_ase_ctp_audio_receiver_stop_ready(ase_ids: &[u8]) -> Option<Vec<u8>> {
    if ase_ids.is_empty() {
        return None;
    }
    prepare_ase_ctp_id_list_op(ctp_opcode::RECEIVER_STOP_READY, ase_ids)
}

/// Releasing nothing is not an error, it just produces no message
pub fn prepare_ase_ctp_release(ase_ids: &[u8]) -> Option<Vec<u8>> {
    if ase_ids.is_empty() {
        return Some(vec![]);
    }
    prepare_ase_ctp_id_list_op(ctp_opcode::RELEASE, ase_ids)
}

/// A single Published Audio Capability record
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AcsAcRecord {
    pub codec_id: CodecId,
    /// Parsed capabilities, only populated for LTV based codecs
    pub codec_spec_caps: LtvMap,
    pub codec_spec_caps_raw: Vec<u8>,
    pub metadata: Vec<u8>,
}

impl Read for AcsAcRecord {
    fn read(r: &mut Reader) -> Option<Self> {
        if r.remaining() < ACS_PAC_RECORD_MIN_LEN {
            error!("wrong len of PAC record: {}", r.remaining());
            return None;
        }
        let codec_id: CodecId = r.read()?;
        let codec_spec_caps_raw: Vec<u8> = r.read()?;
        let codec_spec_caps = if codec_id.is_using_ltv_format() {
            LtvMap::parse(&codec_spec_caps_raw).ok()?
        } else {
            LtvMap::new()
        };
        let metadata: Vec<u8> = r.read()?;
        Some(AcsAcRecord { codec_id, codec_spec_caps, codec_spec_caps_raw, metadata })
    }
}

/// Parses a PAC characteristic value. Any malformed record rejects the whole
/// set.
pub fn parse_pacs(value: &[u8]) -> Result<Vec<AcsAcRecord>, ParseError> {
    let mut r = Reader::new(value);
    let Some(num_records) = r.read_u8() else {
        error!("wrong len of PAC characteristic: {}", value.len());
        return Err(ParseError::Pacs);
    };

    let mut records = Vec::with_capacity(num_records as usize);
    for i in 0..num_records {
        let Some(record) = r.read::<AcsAcRecord>() else {
            error!("malformed PAC record {i} of {num_records}");
            return Err(ParseError::Pacs);
        };
        records.push(record);
    }
    Ok(records)
}

pub fn parse_audio_locations(value: &[u8]) -> Result<AudioLocations, ParseError> {
    if value.len() != AUDIO_LOCATIONS_LEN {
        error!("wrong len of audio location characteristic: {}", value.len());
        return Err(ParseError::AudioLocations);
    }
    let locations = Reader::new(value).read_u32::<4>().ok_or(ParseError::AudioLocations)?;
    info!("audio locations: {locations:#010x}");
    Ok(AudioLocations::from_bits_retain(locations))
}

fn parse_audio_contexts(value: &[u8]) -> Result<BidirectionalPair<AudioContexts>, ParseError> {
    if value.len() != AUDIO_CONTEXTS_LEN {
        error!("wrong len of audio contexts characteristic: {}", value.len());
        return Err(ParseError::AudioContexts);
    }
    let mut r = Reader::new(value);
    let (Some(sink), Some(source)) = (r.read_u16(), r.read_u16()) else {
        return Err(ParseError::AudioContexts);
    };
    Ok(BidirectionalPair::new(
        AudioContexts::from_bits_retain(sink),
        AudioContexts::from_bits_retain(source),
    ))
}

pub fn parse_supported_audio_contexts(
    value: &[u8],
) -> Result<BidirectionalPair<AudioContexts>, ParseError> {
    let contexts = parse_audio_contexts(value)?;
    info!("supported audio contexts: sink {:?}, source {:?}", contexts.sink, contexts.source);
    Ok(contexts)
}

pub fn parse_available_audio_contexts(
    value: &[u8],
) -> Result<BidirectionalPair<AudioContexts>, ParseError> {
    let contexts = parse_audio_contexts(value)?;
    info!("available audio contexts: sink {:?}, source {:?}", contexts.sink, contexts.source);
    Ok(contexts)
}

pub fn parse_tmap_role(value: &[u8]) -> Result<u16, ParseError> {
    if value.len() != TMAP_ROLE_LEN {
        error!("wrong len of TMAP role characteristic: {}", value.len());
        return Err(ParseError::TmapRole);
    }
    Reader::new(value).read_u16().ok_or(ParseError::TmapRole)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ase_status_header() {
        let (header, tail) = parse_ase_status_header(&[0x01, 0x02, 0x03]).unwrap();

        assert_eq!(header, AseRspHeader { id: 0x01, state: 0x02 });
        assert_eq!(tail, &[0x03]);
        assert_eq!(parse_ase_status_header(&[0x01]), Err(ParseError::AseHeader));
    }

    #[test]
    fn test_codec_configured_params() {
        // arrange
        let value = [
            0x01, // framing
            0x02, // preferred phy
            0x03, // retransmissions
            0x04, 0x05, // max transport latency
            0x06, 0x07, 0x08, // pres delay min
            0x09, 0x0a, 0x0b, // pres delay max
            0x0c, 0x0d, 0x0e, // preferred pres delay min
            0x0f, 0x10, 0x11, // preferred pres delay max
            0x06, 0x00, 0x00, 0x00, 0x00, // codec id
            0x03, // codec config length
            0x02, 0x01, 0x08,
        ];

        // act
        let params = parse_ase_status_codec_configured_state_params(&value).unwrap();

        // assert
        assert_eq!(params.max_transport_latency, 0x0504);
        assert_eq!(params.pres_delay_min, 0x080706);
        assert_eq!(params.preferred_pres_delay_max, 0x11100f);
        assert_eq!(params.codec_id, CodecId::LC3);
        assert_eq!(params.codec_spec_conf, vec![0x02, 0x01, 0x08]);
    }

    #[test]
    fn test_codec_configured_params_length_mismatch() {
        let mut value = vec![0u8; 22];
        value.push(0x02);
        value.push(0xaa);

        assert_eq!(
            parse_ase_status_codec_configured_state_params(&value),
            Err(ParseError::AseCodecConfigured)
        );
        assert_eq!(
            parse_ase_status_codec_configured_state_params(&[0u8; 22]),
            Err(ParseError::AseCodecConfigured)
        );
    }

    #[test]
    fn test_qos_configured_params() {
        let value = [
            0x01, 0x02, 0x10, 0x27, 0x00, 0x00, 0x02, 0x64, 0x00, 0x05, 0x14, 0x00, 0x40, 0x9c,
            0x00,
        ];

        let params = parse_ase_status_qos_configured_state_params(&value).unwrap();

        assert_eq!(params.cig_id, 0x01);
        assert_eq!(params.cis_id, 0x02);
        assert_eq!(params.sdu_interval, 10000);
        assert_eq!(params.max_sdu, 100);
        assert_eq!(params.max_transport_latency, 20);
        assert_eq!(params.pres_delay, 40000);
        assert_eq!(
            parse_ase_status_qos_configured_state_params(&value[..14]),
            Err(ParseError::AseQosConfigured)
        );
    }

    #[test]
    fn test_transient_params() {
        let params =
            parse_ase_status_transient_state_params(&[0x01, 0x02, 0x02, 0xaa, 0xbb]).unwrap();

        assert_eq!(params.metadata, vec![0xaa, 0xbb]);
        assert_eq!(
            parse_ase_status_transient_state_params(&[0x01, 0x02, 0x03, 0xaa, 0xbb]),
            Err(ParseError::AseTransient)
        );
    }

    #[test]
    fn test_ctp_notification() {
        let ntf = parse_ase_ctp_notification(&[0x01, 0x02, 0x01, 0x00, 0x00, 0x02, 0x05, 0x01])
            .unwrap();

        assert_eq!(ntf.op, ctp_opcode::CODEC_CONFIGURATION);
        assert_eq!(ntf.entries[1], CtpAseEntry { ase_id: 0x02, response_code: 0x05, reason: 0x01 });
        assert!(parse_ase_ctp_notification(&[0x01, 0x02, 0x01, 0x00, 0x00]).is_err());
    }

    #[test]
    fn test_prepare_codec_config() {
        let conf = CtpCodecConf {
            ase_id: 0x01,
            target_latency: 0x02,
            target_phy: 0x02,
            codec_id: CodecId::LC3,
            codec_config: vec![0x02, 0x01, 0x08],
        };

        let value = prepare_ase_ctp_codec_config(&[conf]).unwrap();

        assert_eq!(
            value,
            vec![0x01, 0x01, 0x01, 0x02, 0x02, 0x06, 0x00, 0x00, 0x00, 0x00, 0x03, 0x02, 0x01, 0x08]
        );
        assert_eq!(prepare_ase_ctp_codec_config(&[]), None);
    }

    #[test]
    fn test_prepare_qos_config_length() {
        let value = prepare_ase_ctp_config_qos(&[CtpQosConf::default(), CtpQosConf::default()])
            .unwrap();

        assert_eq!(value.len(), 2 + 2 * 16);
        assert_eq!(value[0], ctp_opcode::QOS_CONFIGURATION);
    }

    #[test]
    fn test_prepare_enable_rejects_long_metadata() {
        let conf = CtpMetadata { ase_id: 0x01, metadata: vec![0u8; 256] };

        assert_eq!(prepare_ase_ctp_enable(&[conf]), None);
    }

    #[test]
    fn test_prepare_update_metadata() {
        let conf = CtpMetadata { ase_id: 0x03, metadata: vec![0x03, 0x02, 0x04, 0x00] };

        let value = prepare_ase_ctp_update_metadata(&[conf]).unwrap();

        assert_eq!(value, vec![0x07, 0x01, 0x03, 0x04, 0x03, 0x02, 0x04, 0x00]);
    }

    #[test]
    fn test_prepare_id_list_ops() {
        assert_eq!(prepare_ase_ctp_disable(&[0x01, 0x02]), Some(vec![0x05, 0x02, 0x01, 0x02]));
        assert_eq!(prepare_ase_ctp_audio_receiver_start_ready(&[0x01]), Some(vec![0x04, 0x01, 0x01]));
        assert_eq!(prepare_ase_ctp_audio_receiver_stop_ready(&[]), None);
        assert_eq!(prepare_ase_ctp_release(&[]), Some(vec![]));
        assert_eq!(prepare_ase_ctp_release(&[0x04]), Some(vec![0x08, 0x01, 0x04]));
    }

    #[test]
    fn test_parse_pacs() {
        // arrange
        let value = [
            0x02, // two records
            0x06, 0x00, 0x00, 0x00, 0x00, // LC3
            0x04, 0x03, 0x01, 0x80, 0x00, // caps
            0x00, // no metadata
            0xff, 0x0f, 0x00, 0x01, 0x00, // vendor codec
            0x02, 0xaa, 0xbb, // opaque caps
            0x01, 0xcc, // metadata
        ];

        // act
        let records = parse_pacs(&value).unwrap();

        // assert
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].codec_spec_caps.find_u16(0x01), Some(0x0080));
        assert_eq!(records[1].codec_id, CodecId::vendor(0x000f, 0x0001));
        assert!(records[1].codec_spec_caps.is_empty());
        assert_eq!(records[1].codec_spec_caps_raw, vec![0xaa, 0xbb]);
        assert_eq!(records[1].metadata, vec![0xcc]);
    }

    #[test]
    fn test_parse_pacs_caps_overrun() {
        let value = [0x01, 0x06, 0x00, 0x00, 0x00, 0x00, 0x09, 0x03, 0x01, 0x80, 0x00, 0x00];

        assert_eq!(parse_pacs(&value), Err(ParseError::Pacs));
    }

    #[test]
    fn test_parse_pacs_malformed_ltv_caps() {
        let value = [0x01, 0x06, 0x00, 0x00, 0x00, 0x00, 0x02, 0x05, 0x01, 0x00];

        assert_eq!(parse_pacs(&value), Err(ParseError::Pacs));
    }

    #[test]
    fn test_parse_fixed_size_characteristics() {
        assert_eq!(
            parse_audio_locations(&[0x03, 0x00, 0x00, 0x00]),
            Ok(AudioLocations::FRONT_LEFT | AudioLocations::FRONT_RIGHT)
        );
        assert_eq!(parse_audio_locations(&[0x03, 0x00, 0x00]), Err(ParseError::AudioLocations));

        let contexts = parse_available_audio_contexts(&[0x04, 0x00, 0x02, 0x00]).unwrap();
        assert_eq!(contexts.sink, AudioContexts::MEDIA);
        assert_eq!(contexts.source, AudioContexts::CONVERSATIONAL);
        assert!(parse_supported_audio_contexts(&[0x04, 0x00, 0x02]).is_err());

        assert_eq!(parse_tmap_role(&[0x3f, 0x00]), Ok(0x003f));
        assert_eq!(parse_tmap_role(&[0x3f]), Err(ParseError::TmapRole));
    }
}
