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

//! Binary layouts used to persist what was learned about a device through
//! service discovery, so a reconnection can skip it.
//!
//! All blobs start with a layout magic. Multi byte values are little endian.

use log::{debug, error, warn};

use super::{
    device::{LeAudioDevice, PacRecords},
    ase::Ase,
    ids::{AttHandle, HandlePair},
    parser::{AcsAcRecord, ParseError},
    reader::Reader,
    types::Direction,
    writer::Writer,
};

const PACS_STORAGE_CURRENT_LAYOUT_MAGIC: u8 = 0x00;
const ASE_STORAGE_CURRENT_LAYOUT_MAGIC: u8 = 0x00;
const HANDLES_STORAGE_CURRENT_LAYOUT_MAGIC: u8 = 0x00;

/// Size of the magic and entry count
const STORAGE_HEADER_WITH_ENTRIES_LEN: usize = 2;
/// Record length, codec id, capabilities and metadata lengths
const PACS_ENTRY_LEN: usize = 8;
const ASES_ENTRY_LEN: usize = 6;
const HANDLES_ENTRIES_LEN: usize = 23;

fn write_handle_pair(w: &mut Writer, hdls: &HandlePair) {
    w.write_u16(hdls.val_hdl.0);
    w.write_u16(hdls.ccc_hdl.0);
}

fn read_handle_pair(r: &mut Reader) -> Option<HandlePair> {
    let val_hdl = AttHandle(r.read_u16()?);
    let ccc_hdl = AttHandle(r.read_u16()?);
    Some(HandlePair::new(val_hdl, ccc_hdl))
}

fn serialize_pac_records(pacs: &PacRecords) -> Option<Vec<u8>> {
    let num_of_pacs = u8::try_from(pacs.len()).ok().filter(|n| *n > 0);
    let Some(num_of_pacs) = num_of_pacs else {
        warn!("no PACs to store");
        return None;
    };

    let mut w = Writer::new(vec![]);
    w.write_u8(PACS_STORAGE_CURRENT_LAYOUT_MAGIC);
    w.write_u8(num_of_pacs);

    for (hdls, records) in pacs {
        write_handle_pair(&mut w, hdls);
        w.write_u8(u8::try_from(records.len()).ok()?);

        for record in records {
            // Length of everything that follows the length byte itself
            let len = PACS_ENTRY_LEN - 1 + record.codec_spec_caps_raw.len() + record.metadata.len();
            w.write_u8(u8::try_from(len).ok()?);
            w.write(&record.codec_id);
            w.write_len_prefixed(&record.codec_spec_caps_raw)?;
            w.write_len_prefixed(&record.metadata)?;
        }
    }
    Some(w.into_vec())
}

/// Serializes the sink or source PACs of `device`
pub fn serialize_pacs(device: &LeAudioDevice, direction: Direction) -> Option<Vec<u8>> {
    debug!("{:?}: {} {direction:?} PAC characteristics", device.address, device.pacs[direction].len());
    serialize_pac_records(&device.pacs[direction])
}

fn parse_stored_pacs(value: &[u8]) -> Option<PacRecords> {
    let mut r = Reader::new(value);
    if r.read_u8()? != PACS_STORAGE_CURRENT_LAYOUT_MAGIC {
        error!("invalid PACs layout magic");
        return None;
    }
    let num_of_chars = r.read_u8()?;
    if value.len() < STORAGE_HEADER_WITH_ENTRIES_LEN + num_of_chars as usize * PACS_ENTRY_LEN {
        return None;
    }

    let mut pacs = PacRecords::new();
    for _ in 0..num_of_chars {
        let hdls = read_handle_pair(&mut r)?;
        let pac_count = r.read_u8()?;

        let mut records = Vec::with_capacity(pac_count as usize);
        for _ in 0..pac_count {
            let len = r.read_u8()? as usize;
            let mut record_reader = Reader::new(r.get(len)?);
            let record: AcsAcRecord = record_reader.read()?;
            if !record_reader.is_empty() {
                return None;
            }
            records.push(record);
        }
        pacs.push((hdls, records));
    }
    Some(pacs)
}

/// Restores the sink or source PACs of `device`. Nothing is changed if the
/// blob is malformed.
pub fn deserialize_pacs(
    device: &mut LeAudioDevice,
    direction: Direction,
    value: &[u8],
) -> Result<(), ParseError> {
    if value.len() < STORAGE_HEADER_WITH_ENTRIES_LEN + PACS_ENTRY_LEN {
        warn!("{:?}: no {direction:?} PACs stored", device.address);
        return Err(ParseError::Storage);
    }
    let Some(pacs) = parse_stored_pacs(value) else {
        error!("{:?}: invalid stored {direction:?} PACs", device.address);
        return Err(ParseError::Storage);
    };

    let known = &mut device.pacs[direction];
    for (hdls, records) in pacs {
        match known.iter_mut().find(|(known_hdls, _)| known_hdls.val_hdl == hdls.val_hdl) {
            Some(entry) => entry.1 = records,
            None => known.push((hdls, records)),
        }
    }
    Ok(())
}

/// Serializes the handles, ids and directions of the ASEs of `device`
pub fn serialize_ases(device: &LeAudioDevice) -> Option<Vec<u8>> {
    let num_of_ases = u8::try_from(device.ases.len()).ok().filter(|n| *n > 0);
    let Some(num_of_ases) = num_of_ases else {
        warn!("{:?}: no ASEs to store", device.address);
        return None;
    };

    let mut w = Writer::new(vec![]);
    w.write_u8(ASE_STORAGE_CURRENT_LAYOUT_MAGIC);
    w.write_u8(num_of_ases);
    for ase in device.ases.iter() {
        write_handle_pair(&mut w, &ase.hdls);
        w.write_u8(ase.id);
        w.write_u8(ase.direction as u8);
    }
    Some(w.into_vec())
}

fn parse_stored_ases(value: &[u8]) -> Option<Vec<Ase>> {
    let mut r = Reader::new(value);
    if r.read_u8()? != ASE_STORAGE_CURRENT_LAYOUT_MAGIC {
        error!("invalid ASEs layout magic");
        return None;
    }
    let num_of_ases = r.read_u8()?;
    if value.len() < STORAGE_HEADER_WITH_ENTRIES_LEN + num_of_ases as usize * ASES_ENTRY_LEN {
        return None;
    }

    let mut ases = Vec::with_capacity(num_of_ases as usize);
    for _ in 0..num_of_ases {
        let hdls = read_handle_pair(&mut r)?;
        let id = r.read_u8()?;
        let direction = Direction::from_u8(r.read_u8()?)?;
        ases.push(Ase::new(hdls, direction, id));
    }
    Some(ases)
}

/// Restores the ASEs of `device`. Nothing is changed if the blob is
/// malformed.
pub fn deserialize_ases(device: &mut LeAudioDevice, value: &[u8]) -> Result<(), ParseError> {
    if value.len() < STORAGE_HEADER_WITH_ENTRIES_LEN + ASES_ENTRY_LEN {
        warn!("{:?}: no ASEs stored", device.address);
        return Err(ParseError::Storage);
    }
    let Some(ases) = parse_stored_ases(value) else {
        error!("{:?}: invalid stored ASEs", device.address);
        return Err(ParseError::Storage);
    };

    debug!("{:?}: loaded {} ASEs", device.address, ases.len());
    device.ases.extend(ases);
    Ok(())
}

/// Serializes the attribute handles of the audio services of `device`
pub fn serialize_handles(device: &LeAudioDevice) -> Option<Vec<u8>> {
    let handles = &device.handles;
    if handles.ctp_hdls.val_hdl.0 == 0 || handles.ctp_hdls.ccc_hdl.0 == 0 {
        warn!("{:?}: invalid control point handles", device.address);
        return None;
    }

    let mut w = Writer::new(Vec::with_capacity(HANDLES_ENTRIES_LEN));
    w.write_u8(HANDLES_STORAGE_CURRENT_LAYOUT_MAGIC);
    write_handle_pair(&mut w, &handles.ctp_hdls);
    write_handle_pair(&mut w, &handles.snk_audio_locations_hdls);
    write_handle_pair(&mut w, &handles.src_audio_locations_hdls);
    write_handle_pair(&mut w, &handles.supported_contexts_hdls);
    write_handle_pair(&mut w, &handles.available_contexts_hdls);
    w.write_u16(handles.tmap_role_hdl.0);
    Some(w.into_vec())
}

/// Restores the attribute handles of `device`. Nothing is changed if the
/// blob is malformed.
pub fn deserialize_handles(device: &mut LeAudioDevice, value: &[u8]) -> Result<(), ParseError> {
    if value.len() != HANDLES_ENTRIES_LEN {
        warn!("{:?}: wrong stored handles length {}", device.address, value.len());
        return Err(ParseError::Storage);
    }

    let mut r = Reader::new(value);
    if r.read_u8() != Some(HANDLES_STORAGE_CURRENT_LAYOUT_MAGIC) {
        error!("{:?}: invalid handles layout magic", device.address);
        return Err(ParseError::Storage);
    }

    let handles = &mut device.handles;
    let mut read_all = || -> Option<()> {
        handles.ctp_hdls = read_handle_pair(&mut r)?;
        handles.snk_audio_locations_hdls = read_handle_pair(&mut r)?;
        handles.src_audio_locations_hdls = read_handle_pair(&mut r)?;
        handles.supported_contexts_hdls = read_handle_pair(&mut r)?;
        handles.available_contexts_hdls = read_handle_pair(&mut r)?;
        handles.tmap_role_hdl = AttHandle(r.read_u16()?);
        Some(())
    };
    // The length was checked above
    read_all().ok_or(ParseError::Storage)
}
