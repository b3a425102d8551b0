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

//! Length-Type-Value collections used for codec capabilities, codec
//! configuration and metadata.
//!
//! On the wire each record is `[len][type][value..]`, where `len` covers the
//! type byte and the value. A zero length byte is padding.

use log::{error, warn};
use std::collections::BTreeMap;

use super::{
    parser::ParseError,
    reader::Reader,
    types::{AudioContexts, AudioLocations},
    writer::Writer,
};

/// Codec specific configuration types (Assigned Numbers 6.12.5)
pub mod codec_spec_conf {
    pub const TYPE_SAMPLING_FREQ: u8 = 0x01;
    pub const TYPE_FRAME_DURATION: u8 = 0x02;
    pub const TYPE_AUDIO_CHANNEL_ALLOCATION: u8 = 0x03;
    pub const TYPE_OCTETS_PER_CODEC_FRAME: u8 = 0x04;
    pub const TYPE_CODEC_FRAME_BLOCKS_PER_SDU: u8 = 0x05;

    pub const SAMPLING_FREQ_8000HZ: u8 = 0x01;
    pub const SAMPLING_FREQ_11025HZ: u8 = 0x02;
    pub const SAMPLING_FREQ_16000HZ: u8 = 0x03;
    pub const SAMPLING_FREQ_22050HZ: u8 = 0x04;
    pub const SAMPLING_FREQ_24000HZ: u8 = 0x05;
    pub const SAMPLING_FREQ_32000HZ: u8 = 0x06;
    pub const SAMPLING_FREQ_44100HZ: u8 = 0x07;
    pub const SAMPLING_FREQ_48000HZ: u8 = 0x08;
    pub const SAMPLING_FREQ_88200HZ: u8 = 0x09;
    pub const SAMPLING_FREQ_96000HZ: u8 = 0x0A;
    pub const SAMPLING_FREQ_176400HZ: u8 = 0x0B;
    pub const SAMPLING_FREQ_192000HZ: u8 = 0x0C;
    pub const SAMPLING_FREQ_384000HZ: u8 = 0x0D;

    pub const FRAME_DURATION_7500US: u8 = 0x00;
    pub const FRAME_DURATION_10000US: u8 = 0x01;
}

/// Codec specific capability types (Assigned Numbers 6.12.4)
pub mod codec_spec_caps {
    pub const TYPE_SUPPORTED_SAMPLING_FREQUENCIES: u8 = 0x01;
    pub const TYPE_SUPPORTED_FRAME_DURATIONS: u8 = 0x02;
    pub const TYPE_SUPPORTED_AUDIO_CHANNEL_COUNTS: u8 = 0x03;
    pub const TYPE_SUPPORTED_OCTETS_PER_CODEC_FRAME: u8 = 0x04;
    pub const TYPE_SUPPORTED_MAX_CODEC_FRAMES_PER_SDU: u8 = 0x05;

    pub const FRAME_DURATION_7500US: u8 = 0x01;
    pub const FRAME_DURATION_10000US: u8 = 0x02;
    pub const FRAME_DURATION_7500US_PREFERRED: u8 = 0x10;
    pub const FRAME_DURATION_10000US_PREFERRED: u8 = 0x20;
}

/// Metadata types (Assigned Numbers 6.12.6)
pub mod metadata {
    pub const TYPE_PREFERRED_AUDIO_CONTEXTS: u8 = 0x01;
    pub const TYPE_STREAMING_AUDIO_CONTEXTS: u8 = 0x02;
    pub const TYPE_PROGRAM_INFO: u8 = 0x03;
    pub const TYPE_LANGUAGE: u8 = 0x04;
    pub const TYPE_CCID_LIST: u8 = 0x05;
    pub const TYPE_PARENTAL_RATING: u8 = 0x06;
    pub const TYPE_PROGRAM_INFO_URI: u8 = 0x07;
    pub const TYPE_EXTENDED_METADATA: u8 = 0xFE;
    pub const TYPE_VENDOR_SPECIFIC: u8 = 0xFF;
}

/// Longest value a single record can carry
const MAX_VALUE_LEN: usize = u8::MAX as usize - 1;

/// Longest serialized collection, carried behind a one byte length
const MAX_RAW_SIZE: usize = u8::MAX as usize;

/// A collection of LTV records, at most one per type
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct LtvMap {
    values: BTreeMap<u8, Vec<u8>>,
}

impl LtvMap {
    /// Constructor
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a complete LTV buffer. Fails if any record overruns the buffer,
    /// in which case nothing is returned.
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let mut r = Reader::new(data);
        let mut ltv = LtvMap::new();

        while !r.is_empty() {
            let Some(len) = r.read_u8() else { return Err(ParseError::Ltv) };
            if len == 0 {
                continue;
            }
            let (Some(ty), Some(value)) = (r.read_u8(), r.get(len as usize - 1)) else {
                warn!("LTV record of length {len} overruns the buffer");
                return Err(ParseError::Ltv);
            };
            ltv.values.insert(ty, value.to_vec());
        }

        Ok(ltv)
    }

    /// Inserts or overwrites the value for the given type
    pub fn add(&mut self, ty: u8, value: impl Into<Vec<u8>>) -> &mut Self {
        let value = value.into();
        if value.len() > MAX_VALUE_LEN {
            error!("LTV value of type {ty:#04x} is too long: {}", value.len());
            return self;
        }
        let replaced = self.values.get(&ty).map_or(0, |old| old.len() + 2);
        let raw_size = self.raw_size() - replaced + value.len() + 2;
        if raw_size > MAX_RAW_SIZE {
            error!("LTV type {ty:#04x} would grow the collection to {raw_size} bytes");
            return self;
        }
        self.values.insert(ty, value);
        self
    }

    pub fn add_u8(&mut self, ty: u8, value: u8) -> &mut Self {
        self.add(ty, [value])
    }

    pub fn add_u16(&mut self, ty: u8, value: u16) -> &mut Self {
        self.add(ty, value.to_le_bytes())
    }

    pub fn add_u32(&mut self, ty: u8, value: u32) -> &mut Self {
        self.add(ty, value.to_le_bytes())
    }

    /// The value of the given type, if present
    pub fn find(&self, ty: u8) -> Option<&[u8]> {
        self.values.get(&ty).map(Vec::as_slice)
    }

    pub fn find_u8(&self, ty: u8) -> Option<u8> {
        self.find_fixed::<1>(ty).map(|v| v as u8)
    }

    pub fn find_u16(&self, ty: u8) -> Option<u16> {
        self.find_fixed::<2>(ty).map(|v| v as u16)
    }

    pub fn find_u32(&self, ty: u8) -> Option<u32> {
        self.find_fixed::<4>(ty)
    }

    fn find_fixed<const N: usize>(&self, ty: u8) -> Option<u32> {
        let value = self.find(ty)?;
        if value.len() != N {
            warn!("LTV type {ty:#04x} has width {}, expected {N}", value.len());
            return None;
        }
        Reader::new(value).read_u32::<N>()
    }

    pub fn remove(&mut self, ty: u8) -> Option<Vec<u8>> {
        self.values.remove(&ty)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Removes every type that is present in `other`
    pub fn remove_all_types(&mut self, other: &LtvMap) {
        for ty in other.values.keys() {
            self.values.remove(ty);
        }
    }

    /// Records present in both collections with identical values
    pub fn get_intersection(&self, other: &LtvMap) -> LtvMap {
        let values = self
            .values
            .iter()
            .filter(|(ty, value)| other.values.get(ty) == Some(value))
            .map(|(ty, value)| (*ty, value.clone()))
            .collect();
        LtvMap { values }
    }

    /// Adds all records of `other`, overwriting existing types
    pub fn append(&mut self, other: &LtvMap) -> &mut Self {
        for (ty, value) in &other.values {
            self.add(*ty, value.as_slice());
        }
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &[u8])> {
        self.values.iter().map(|(ty, value)| (*ty, value.as_slice()))
    }

    /// Size of the serialized form
    pub fn raw_size(&self) -> usize {
        self.values.values().map(|value| value.len() + 2).sum()
    }

    pub(crate) fn write_to(&self, w: &mut Writer) {
        for (ty, value) in &self.values {
            // values are bounded by add() and parse()
            w.write_u8((value.len() + 1) as u8);
            w.write_u8(*ty);
            w.put(value);
        }
    }

    /// Serializes the records in ascending type order
    pub fn to_vec(&self) -> Vec<u8> {
        let mut w = Writer::new(Vec::with_capacity(self.raw_size()));
        self.write_to(&mut w);
        w.into_vec()
    }

    /// Interprets the records as a core codec configuration
    pub fn as_core_codec_config(&self) -> CoreCodecConfig {
        CoreCodecConfig {
            sampling_frequency: self.find_u8(codec_spec_conf::TYPE_SAMPLING_FREQ),
            frame_duration: self.find_u8(codec_spec_conf::TYPE_FRAME_DURATION),
            audio_channel_allocation: self
                .find_u32(codec_spec_conf::TYPE_AUDIO_CHANNEL_ALLOCATION),
            octets_per_codec_frame: self.find_u16(codec_spec_conf::TYPE_OCTETS_PER_CODEC_FRAME),
            codec_frames_blocks_per_sdu: self
                .find_u8(codec_spec_conf::TYPE_CODEC_FRAME_BLOCKS_PER_SDU),
        }
    }

    /// Interprets the records as core codec capabilities
    pub fn as_core_codec_capabilities(&self) -> CoreCodecCapabilities {
        let octets = self.find_u32(codec_spec_caps::TYPE_SUPPORTED_OCTETS_PER_CODEC_FRAME);
        CoreCodecCapabilities {
            supported_sampling_frequencies: self
                .find_u16(codec_spec_caps::TYPE_SUPPORTED_SAMPLING_FREQUENCIES),
            supported_frame_durations: self
                .find_u8(codec_spec_caps::TYPE_SUPPORTED_FRAME_DURATIONS),
            supported_audio_channel_counts: self
                .find_u8(codec_spec_caps::TYPE_SUPPORTED_AUDIO_CHANNEL_COUNTS),
            supported_min_octets_per_codec_frame: octets.map(|v| (v & 0xffff) as u16),
            supported_max_octets_per_codec_frame: octets.map(|v| (v >> 16) as u16),
            supported_max_codec_frames_per_sdu: self
                .find_u8(codec_spec_caps::TYPE_SUPPORTED_MAX_CODEC_FRAMES_PER_SDU),
        }
    }

    /// Streaming audio contexts metadata, if present
    pub fn streaming_audio_contexts(&self) -> Option<AudioContexts> {
        self.find_u16(metadata::TYPE_STREAMING_AUDIO_CONTEXTS).map(AudioContexts::from_bits_retain)
    }

    /// CCID list metadata, if present
    pub fn ccid_list(&self) -> Option<&[u8]> {
        self.find(metadata::TYPE_CCID_LIST)
    }
}

/// Builds the metadata LTV advertising the streamed contexts and the content
/// control ids bound to them
pub fn make_metadata(contexts: AudioContexts, ccid_list: &[u8]) -> LtvMap {
    let mut ltv = LtvMap::new();
    ltv.add_u16(metadata::TYPE_STREAMING_AUDIO_CONTEXTS, contexts.bits());
    if !ccid_list.is_empty() {
        ltv.add(metadata::TYPE_CCID_LIST, ccid_list);
    }
    ltv
}

/// Typed view of a codec configuration LTV
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CoreCodecConfig {
    pub sampling_frequency: Option<u8>,
    pub frame_duration: Option<u8>,
    pub audio_channel_allocation: Option<u32>,
    pub octets_per_codec_frame: Option<u16>,
    pub codec_frames_blocks_per_sdu: Option<u8>,
}

impl CoreCodecConfig {
    /// Sampling frequency in Hz
    pub fn get_sampling_frequency_hz(&self) -> Option<u32> {
        sampling_frequency_to_hz(self.sampling_frequency?)
    }

    /// Frame duration in microseconds, which is also the SDU interval
    pub fn get_frame_duration_us(&self) -> Option<u32> {
        match self.frame_duration? {
            codec_spec_conf::FRAME_DURATION_7500US => Some(7500),
            codec_spec_conf::FRAME_DURATION_10000US => Some(10000),
            _ => None,
        }
    }

    /// Number of channels carried by one ISO stream
    pub fn get_channel_count_per_iso_stream(&self) -> u8 {
        match self.audio_channel_allocation {
            Some(allocation) if allocation != 0 => allocation.count_ones() as u8,
            _ => 1,
        }
    }

    pub fn get_audio_locations(&self) -> AudioLocations {
        AudioLocations::from_bits_retain(self.audio_channel_allocation.unwrap_or(0))
    }

    pub fn calculate_max_sdu_size(&self) -> u16 {
        let octets = self.octets_per_codec_frame.unwrap_or(0) as u32;
        let channels = self.get_channel_count_per_iso_stream() as u32;
        let blocks = self.codec_frames_blocks_per_sdu.unwrap_or(1) as u32;
        u16::try_from(octets * channels * blocks).unwrap_or(u16::MAX)
    }

    /// Back to the LTV form
    pub fn to_ltv(&self) -> LtvMap {
        let mut ltv = LtvMap::new();
        if let Some(v) = self.sampling_frequency {
            ltv.add_u8(codec_spec_conf::TYPE_SAMPLING_FREQ, v);
        }
        if let Some(v) = self.frame_duration {
            ltv.add_u8(codec_spec_conf::TYPE_FRAME_DURATION, v);
        }
        if let Some(v) = self.audio_channel_allocation {
            ltv.add_u32(codec_spec_conf::TYPE_AUDIO_CHANNEL_ALLOCATION, v);
        }
        if let Some(v) = self.octets_per_codec_frame {
            ltv.add_u16(codec_spec_conf::TYPE_OCTETS_PER_CODEC_FRAME, v);
        }
        if let Some(v) = self.codec_frames_blocks_per_sdu {
            ltv.add_u8(codec_spec_conf::TYPE_CODEC_FRAME_BLOCKS_PER_SDU, v);
        }
        ltv
    }
}

/// Sampling frequency configuration code to Hz
pub fn sampling_frequency_to_hz(code: u8) -> Option<u32> {
    const FREQUENCIES: [u32; 13] = [
        8000, 11025, 16000, 22050, 24000, 32000, 44100, 48000, 88200, 96000, 176400, 192000,
        384000,
    ];
    FREQUENCIES.get((code as usize).checked_sub(1)?).copied()
}

/// Typed view of a codec capabilities LTV
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CoreCodecCapabilities {
    pub supported_sampling_frequencies: Option<u16>,
    pub supported_frame_durations: Option<u8>,
    pub supported_audio_channel_counts: Option<u8>,
    pub supported_min_octets_per_codec_frame: Option<u16>,
    pub supported_max_octets_per_codec_frame: Option<u16>,
    pub supported_max_codec_frames_per_sdu: Option<u8>,
}

impl CoreCodecCapabilities {
    pub fn has_supported_sampling_frequencies(&self) -> bool {
        self.supported_sampling_frequencies.is_some()
    }

    pub fn has_supported_frame_durations(&self) -> bool {
        self.supported_frame_durations.is_some()
    }

    pub fn has_supported_audio_channel_counts(&self) -> bool {
        self.supported_audio_channel_counts.is_some()
    }

    pub fn has_supported_octets_per_codec_frame(&self) -> bool {
        self.supported_min_octets_per_codec_frame.is_some()
            && self.supported_max_octets_per_codec_frame.is_some()
    }

    pub fn has_supported_max_codec_frames_per_sdu(&self) -> bool {
        self.supported_max_codec_frames_per_sdu.is_some()
    }

    /// Bit `code - 1` of the supported frequencies is set
    pub fn is_sampling_frequency_config_supported(&self, code: u8) -> bool {
        let Some(bit) = code.checked_sub(1).filter(|bit| *bit < 16) else { return false };
        self.supported_sampling_frequencies.unwrap_or(0) & (1 << bit) != 0
    }

    pub fn is_frame_duration_config_supported(&self, code: u8) -> bool {
        let supported = self.supported_frame_durations.unwrap_or(0);
        match code {
            codec_spec_conf::FRAME_DURATION_7500US => {
                supported & codec_spec_caps::FRAME_DURATION_7500US != 0
            }
            codec_spec_conf::FRAME_DURATION_10000US => {
                supported & codec_spec_caps::FRAME_DURATION_10000US != 0
            }
            _ => false,
        }
    }

    /// A missing channel count capability means a single channel
    pub fn is_audio_channel_count_supported(&self, count: u8) -> bool {
        let Some(bit) = count.checked_sub(1).filter(|bit| *bit < 8) else { return false };
        self.supported_audio_channel_counts.unwrap_or(0x01) & (1 << bit) != 0
    }

    pub fn is_octets_per_codec_frame_config_supported(&self, octets: u16) -> bool {
        match (self.supported_min_octets_per_codec_frame, self.supported_max_octets_per_codec_frame)
        {
            (Some(min), Some(max)) => (min..=max).contains(&octets),
            _ => false,
        }
    }

    pub fn is_codec_frames_per_sdu_supported(&self, frames: u8) -> bool {
        frames <= self.get_max_codec_frames_per_sdu()
    }

    /// Defaults to one frame per SDU when not advertised
    pub fn get_max_codec_frames_per_sdu(&self) -> u8 {
        self.supported_max_codec_frames_per_sdu.unwrap_or(1)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_valid() {
        // arrange
        let data = [0x02, 0x01, 0x0a, 0x03, 0x02, 0xaa, 0xbb, 0x04, 0x03, 0xde, 0xc0, 0xde];

        // act
        let ltv = LtvMap::parse(&data).unwrap();

        // assert
        assert_eq!(ltv.len(), 3);
        assert_eq!(ltv.find(0x01), Some([0x0a].as_slice()));
        assert_eq!(ltv.find(0x02), Some([0xaa, 0xbb].as_slice()));
        assert_eq!(ltv.find(0x03), Some([0xde, 0xc0, 0xde].as_slice()));
    }

    #[test]
    fn test_parse_empty_value() {
        let ltv = LtvMap::parse(&[0x01, 0x02]).unwrap();

        assert_eq!(ltv.find(0x02), Some([].as_slice()));
    }

    #[test]
    fn test_parse_skips_zero_length_padding() {
        let ltv = LtvMap::parse(&[0x00, 0x02, 0x01, 0x0a, 0x00]).unwrap();

        assert_eq!(ltv.len(), 1);
    }

    #[test]
    fn test_parse_rejects_overrun() {
        assert_eq!(LtvMap::parse(&[0x02, 0x01, 0x0a, 0x04, 0x02, 0xaa, 0xbb]), Err(ParseError::Ltv));
    }

    #[test]
    fn test_parse_rejects_dangling_length() {
        assert_eq!(LtvMap::parse(&[0x02, 0x01, 0x0a, 0x01]), Err(ParseError::Ltv));
        assert_eq!(LtvMap::parse(&[0x02, 0x01, 0x0a, 0x02, 0x03]), Err(ParseError::Ltv));
    }

    #[test]
    fn test_serialize_is_sorted_by_type() {
        // arrange
        let mut ltv = LtvMap::new();
        ltv.add(0x03, [0xde, 0xc0]).add_u8(0x01, 0x0a);

        // act
        let bytes = ltv.to_vec();

        // assert
        assert_eq!(bytes, vec![0x02, 0x01, 0x0a, 0x03, 0x03, 0xde, 0xc0]);
        assert_eq!(ltv.raw_size(), bytes.len());
        assert_eq!(LtvMap::parse(&bytes).unwrap(), ltv);
    }

    #[test]
    fn test_add_overwrites() {
        let mut ltv = LtvMap::new();
        ltv.add_u8(0x01, 0x01).add_u8(0x01, 0x02);

        assert_eq!(ltv.len(), 1);
        assert_eq!(ltv.find_u8(0x01), Some(0x02));
    }

    #[test]
    fn test_add_rejects_oversized_value() {
        let mut ltv = LtvMap::new();
        ltv.add(0x01, vec![0u8; 255]);

        assert!(ltv.is_empty());
    }

    #[test]
    fn test_add_rejects_oversized_collection() {
        // arrange
        let mut ltv = LtvMap::new();
        ltv.add(0x01, vec![0u8; 200]);

        // act
        ltv.add(0x02, vec![0u8; 200]).add(0x03, vec![0u8; 51]);

        // assert
        assert_eq!(ltv.find(0x02), None);
        assert_eq!(ltv.find(0x03).map(<[u8]>::len), Some(51));
        assert_eq!(ltv.raw_size(), 255);
        assert!(ltv.to_vec().len() <= 255);
    }

    #[test]
    fn test_add_checks_size_of_overwritten_value() {
        // arrange
        let mut ltv = LtvMap::new();
        ltv.add(0x01, vec![0u8; 200]).add(0x02, vec![0u8; 50]);

        // act
        ltv.add(0x01, vec![1u8; 201]);
        ltv.add(0x02, vec![1u8; 51]);

        // assert
        assert_eq!(ltv.find(0x01), Some(vec![1u8; 201].as_slice()));
        assert_eq!(ltv.find(0x02), Some(vec![0u8; 50].as_slice()));
        assert_eq!(ltv.raw_size(), 255);
    }

    #[test]
    fn test_serialize_then_parse_gives_same_map() {
        let mut empty_values = LtvMap::new();
        empty_values.add(0x01, Vec::new()).add(0x7f, Vec::new()).add_u8(0x02, 0x0a);
        let mut one_full_value = LtvMap::new();
        one_full_value.add(0x05, vec![0xa5; 253]);
        let mut full_collection = LtvMap::new();
        full_collection
            .add(0x01, vec![0x11; 100])
            .add(0x02, vec![0x22; 100])
            .add_u32(0x03, 0xdeadc0de)
            .add(0xff, vec![0x33; 43]);
        assert_eq!(full_collection.raw_size(), 255);

        for ltv in [LtvMap::new(), empty_values, one_full_value, full_collection] {
            let bytes = ltv.to_vec();

            assert_eq!(bytes.len(), ltv.raw_size());
            assert_eq!(LtvMap::parse(&bytes).unwrap(), ltv);
        }
    }

    #[test]
    fn test_parsed_longest_value_serializes_back() {
        // arrange
        let mut data = vec![0xff, 0x04];
        data.extend([0x5a; 254]);

        // act
        let ltv = LtvMap::parse(&data).unwrap();

        // assert
        assert_eq!(ltv.find(0x04).map(<[u8]>::len), Some(254));
        assert_eq!(ltv.to_vec(), data);
    }

    #[test]
    fn test_append_overwrites() {
        // arrange
        let mut ltv = LtvMap::parse(&[0x02, 0x01, 0x0a, 0x03, 0x02, 0xaa, 0xbb, 0x04, 0x03, 0xde, 0xc0, 0xd0])
            .unwrap();
        let other = LtvMap::parse(&[0x04, 0x03, 0xde, 0xc0, 0xde, 0x05, 0x04, 0xc0, 0xde, 0xc0, 0xde])
            .unwrap();

        // act
        ltv.append(&other);

        // assert
        assert_eq!(
            ltv.iter().map(|(ty, _)| ty).collect::<Vec<_>>(),
            vec![0x01, 0x02, 0x03, 0x04]
        );
        assert_eq!(ltv.find(0x03), Some([0xde, 0xc0, 0xde].as_slice()));
    }

    #[test]
    fn test_intersection_requires_equal_values() {
        let mut a = LtvMap::new();
        a.add_u8(0x01, 0x01).add_u8(0x02, 0x02);
        let mut b = LtvMap::new();
        b.add_u8(0x01, 0x01).add_u8(0x02, 0x03);

        let common = a.get_intersection(&b);

        assert_eq!(common.len(), 1);
        assert_eq!(common.find_u8(0x01), Some(0x01));
    }

    #[test]
    fn test_remove_all_types() {
        let mut a = LtvMap::new();
        a.add_u8(0x01, 0x01).add_u8(0x02, 0x02);
        let mut b = LtvMap::new();
        b.add_u8(0x02, 0xff);

        a.remove_all_types(&b);

        assert_eq!(a.find(0x02), None);
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn test_core_codec_config_view() {
        // arrange
        let mut ltv = LtvMap::new();
        ltv.add_u8(codec_spec_conf::TYPE_SAMPLING_FREQ, codec_spec_conf::SAMPLING_FREQ_48000HZ)
            .add_u8(codec_spec_conf::TYPE_FRAME_DURATION, codec_spec_conf::FRAME_DURATION_10000US)
            .add_u32(codec_spec_conf::TYPE_AUDIO_CHANNEL_ALLOCATION, 0x03)
            .add_u16(codec_spec_conf::TYPE_OCTETS_PER_CODEC_FRAME, 120)
            .add_u8(0x7f, 0x00);

        // act
        let config = ltv.as_core_codec_config();

        // assert
        assert_eq!(config.get_sampling_frequency_hz(), Some(48000));
        assert_eq!(config.get_frame_duration_us(), Some(10000));
        assert_eq!(config.get_channel_count_per_iso_stream(), 2);
        assert_eq!(config.calculate_max_sdu_size(), 240);
        assert_eq!(config.to_ltv().len(), 4);
    }

    #[test]
    fn test_core_codec_config_ignores_wrong_width() {
        let mut ltv = LtvMap::new();
        ltv.add_u16(codec_spec_conf::TYPE_SAMPLING_FREQ, 0x0008);

        assert_eq!(ltv.as_core_codec_config().sampling_frequency, None);
    }

    #[test]
    fn test_core_codec_capabilities_view() {
        // arrange
        let mut ltv = LtvMap::new();
        ltv.add_u16(codec_spec_caps::TYPE_SUPPORTED_SAMPLING_FREQUENCIES, 0x0004 | 0x0080)
            .add_u8(codec_spec_caps::TYPE_SUPPORTED_FRAME_DURATIONS, 0x02)
            .add_u32(codec_spec_caps::TYPE_SUPPORTED_OCTETS_PER_CODEC_FRAME, 40 | (120 << 16));

        // act
        let caps = ltv.as_core_codec_capabilities();

        // assert
        assert!(caps.is_sampling_frequency_config_supported(codec_spec_conf::SAMPLING_FREQ_16000HZ));
        assert!(caps.is_sampling_frequency_config_supported(codec_spec_conf::SAMPLING_FREQ_48000HZ));
        assert!(!caps.is_sampling_frequency_config_supported(codec_spec_conf::SAMPLING_FREQ_96000HZ));
        assert!(caps.is_frame_duration_config_supported(codec_spec_conf::FRAME_DURATION_10000US));
        assert!(!caps.is_frame_duration_config_supported(codec_spec_conf::FRAME_DURATION_7500US));
        assert!(caps.is_audio_channel_count_supported(1));
        assert!(!caps.is_audio_channel_count_supported(2));
        assert!(caps.is_octets_per_codec_frame_config_supported(120));
        assert!(!caps.is_octets_per_codec_frame_config_supported(155));
        assert!(caps.is_codec_frames_per_sdu_supported(1));
        assert!(!caps.is_codec_frames_per_sdu_supported(2));
        assert!(!caps.has_supported_audio_channel_counts());
    }

    #[test]
    fn test_sampling_frequency_codes() {
        assert_eq!(sampling_frequency_to_hz(0x00), None);
        assert_eq!(sampling_frequency_to_hz(0x01), Some(8000));
        assert_eq!(sampling_frequency_to_hz(0x0D), Some(384000));
        assert_eq!(sampling_frequency_to_hz(0x0E), None);
    }

    #[test]
    fn test_make_metadata() {
        let md = make_metadata(AudioContexts::MEDIA, &[0x05]);

        assert_eq!(md.to_vec(), vec![0x03, 0x02, 0x04, 0x00, 0x02, 0x05, 0x05]);
        assert_eq!(md.streaming_audio_contexts(), Some(AudioContexts::MEDIA));
    }
}
