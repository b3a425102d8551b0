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

//! Shared LE Audio data types: directions, context and location bitmasks,
//! codec identifiers and the ASE/CIS state enums.

use bitflags::bitflags;
use std::ops::{Index, IndexMut};

/// Audio direction, as seen from the remote device
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Direction {
    /// Remote sink, i.e. local audio is sent to the peer
    Sink = 0x01,
    /// Remote source, i.e. the peer sends audio to us
    Source = 0x02,
}

impl Direction {
    /// Both directions, sink first
    pub const BOTH: [Direction; 2] = [Direction::Sink, Direction::Source];

    /// The other direction
    pub fn opposite(self) -> Self {
        match self {
            Direction::Sink => Direction::Source,
            Direction::Source => Direction::Sink,
        }
    }

    /// Decode the on-air direction value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Direction::Sink),
            0x02 => Some(Direction::Source),
            _ => None,
        }
    }
}

bitflags! {
    /// A set of directions
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Directions: u8 {
        const SINK = 0x01;
        const SOURCE = 0x02;
    }
}

impl From<Direction> for Directions {
    fn from(direction: Direction) -> Self {
        Directions::from_bits_retain(direction as u8)
    }
}

/// A value for each of the two directions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BidirectionalPair<T> {
    /// Value for the remote sink direction
    pub sink: T,
    /// Value for the remote source direction
    pub source: T,
}

impl<T> BidirectionalPair<T> {
    /// Constructor
    pub fn new(sink: T, source: T) -> Self {
        Self { sink, source }
    }

    /// The value for the given direction
    pub fn get(&self, direction: Direction) -> &T {
        match direction {
            Direction::Sink => &self.sink,
            Direction::Source => &self.source,
        }
    }

    /// The mutable value for the given direction
    pub fn get_mut(&mut self, direction: Direction) -> &mut T {
        match direction {
            Direction::Sink => &mut self.sink,
            Direction::Source => &mut self.source,
        }
    }
}

impl<T> Index<Direction> for BidirectionalPair<T> {
    type Output = T;

    fn index(&self, direction: Direction) -> &T {
        self.get(direction)
    }
}

impl<T> IndexMut<Direction> for BidirectionalPair<T> {
    fn index_mut(&mut self, direction: Direction) -> &mut T {
        self.get_mut(direction)
    }
}

impl BidirectionalPair<AudioContexts> {
    /// Union of both directions
    pub fn union(&self) -> AudioContexts {
        self.sink | self.source
    }
}

/// A single LE Audio context type (Assigned Numbers 6.12.3)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum LeAudioContextType {
    #[default]
    Uninitialized = 0x0000,
    Unspecified = 0x0001,
    Conversational = 0x0002,
    Media = 0x0004,
    Game = 0x0008,
    Instructional = 0x0010,
    VoiceAssistants = 0x0020,
    Live = 0x0040,
    SoundEffects = 0x0080,
    Notifications = 0x0100,
    Ringtone = 0x0200,
    Alerts = 0x0400,
    EmergencyAlarm = 0x0800,
    Rfu = 0x1000,
}

impl LeAudioContextType {
    /// All the valid context types, in bit order
    pub const ALL: [LeAudioContextType; 12] = [
        LeAudioContextType::Unspecified,
        LeAudioContextType::Conversational,
        LeAudioContextType::Media,
        LeAudioContextType::Game,
        LeAudioContextType::Instructional,
        LeAudioContextType::VoiceAssistants,
        LeAudioContextType::Live,
        LeAudioContextType::SoundEffects,
        LeAudioContextType::Notifications,
        LeAudioContextType::Ringtone,
        LeAudioContextType::Alerts,
        LeAudioContextType::EmergencyAlarm,
    ];

    /// Decode a single context value. Anything that is not exactly one
    /// known bit maps to `None`.
    pub fn from_u16(value: u16) -> Option<Self> {
        if value == 0 {
            return Some(LeAudioContextType::Uninitialized);
        }
        if value >= LeAudioContextType::Rfu as u16 {
            return Some(LeAudioContextType::Rfu);
        }
        Self::ALL.into_iter().find(|ctx| *ctx as u16 == value)
    }
}

bitflags! {
    /// A set of LE Audio context types
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct AudioContexts: u16 {
        const UNSPECIFIED = 0x0001;
        const CONVERSATIONAL = 0x0002;
        const MEDIA = 0x0004;
        const GAME = 0x0008;
        const INSTRUCTIONAL = 0x0010;
        const VOICEASSISTANTS = 0x0020;
        const LIVE = 0x0040;
        const SOUNDEFFECTS = 0x0080;
        const NOTIFICATIONS = 0x0100;
        const RINGTONE = 0x0200;
        const ALERTS = 0x0400;
        const EMERGENCYALARM = 0x0800;
    }
}

impl AudioContexts {
    /// Contexts which may use both directions at once
    pub const ALL_BIDIR: Self = Self::from_bits_retain(
        Self::CONVERSATIONAL.bits()
            | Self::GAME.bits()
            | Self::VOICEASSISTANTS.bits()
            | Self::LIVE.bits(),
    );
    /// Contexts which may be used by the remote source
    pub const ALL_REMOTE_SOURCE: Self = Self::ALL_BIDIR;
    /// Contexts which only ever make sense on the remote sink
    pub const ALL_REMOTE_SINK_ONLY: Self = Self::from_bits_retain(
        Self::MEDIA.bits()
            | Self::INSTRUCTIONAL.bits()
            | Self::SOUNDEFFECTS.bits()
            | Self::NOTIFICATIONS.bits()
            | Self::RINGTONE.bits()
            | Self::ALERTS.bits()
            | Self::EMERGENCYALARM.bits(),
    );

    /// True if the given context type is part of the set
    pub fn test(&self, context: LeAudioContextType) -> bool {
        self.intersects(AudioContexts::from(context))
    }

    /// True if any bit of `other` is part of the set
    pub fn test_any(&self, other: AudioContexts) -> bool {
        self.intersects(other)
    }

    /// Iterate over the individual context types in bit order
    pub fn types(&self) -> impl Iterator<Item = LeAudioContextType> + '_ {
        LeAudioContextType::ALL.into_iter().filter(move |ctx| self.test(*ctx))
    }
}

impl From<LeAudioContextType> for AudioContexts {
    fn from(context: LeAudioContextType) -> Self {
        match context {
            LeAudioContextType::Rfu => AudioContexts::empty(),
            other => AudioContexts::from_bits_retain(other as u16),
        }
    }
}

bitflags! {
    /// Audio location bitmask (Assigned Numbers 6.12.1)
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct AudioLocations: u32 {
        const FRONT_LEFT = 0x0000_0001;
        const FRONT_RIGHT = 0x0000_0002;
        const FRONT_CENTER = 0x0000_0004;
        const LOW_FREQ_EFFECTS_1 = 0x0000_0008;
        const BACK_LEFT = 0x0000_0010;
        const BACK_RIGHT = 0x0000_0020;
        const FRONT_LEFT_OF_CENTER = 0x0000_0040;
        const FRONT_RIGHT_OF_CENTER = 0x0000_0080;
        const BACK_CENTER = 0x0000_0100;
        const LOW_FREQ_EFFECTS_2 = 0x0000_0200;
        const SIDE_LEFT = 0x0000_0400;
        const SIDE_RIGHT = 0x0000_0800;
        const TOP_FRONT_LEFT = 0x0000_1000;
        const TOP_FRONT_RIGHT = 0x0000_2000;
        const TOP_FRONT_CENTER = 0x0000_4000;
        const TOP_CENTER = 0x0000_8000;
        const TOP_BACK_LEFT = 0x0001_0000;
        const TOP_BACK_RIGHT = 0x0002_0000;
        const TOP_SIDE_LEFT = 0x0004_0000;
        const TOP_SIDE_RIGHT = 0x0008_0000;
        const TOP_BACK_CENTER = 0x0010_0000;
        const BOTTOM_FRONT_CENTER = 0x0020_0000;
        const BOTTOM_FRONT_LEFT = 0x0040_0000;
        const BOTTOM_FRONT_RIGHT = 0x0080_0000;
        const FRONT_LEFT_WIDE = 0x0100_0000;
        const FRONT_RIGHT_WIDE = 0x0200_0000;
        const LEFT_SURROUND = 0x0400_0000;
        const RIGHT_SURROUND = 0x0800_0000;
    }
}

impl AudioLocations {
    /// Left locations, most preferred first
    pub const LEFT_PRIORITY: [AudioLocations; 10] = [
        AudioLocations::FRONT_LEFT,
        AudioLocations::BACK_LEFT,
        AudioLocations::FRONT_LEFT_OF_CENTER,
        AudioLocations::SIDE_LEFT,
        AudioLocations::TOP_FRONT_LEFT,
        AudioLocations::TOP_BACK_LEFT,
        AudioLocations::TOP_SIDE_LEFT,
        AudioLocations::BOTTOM_FRONT_LEFT,
        AudioLocations::FRONT_LEFT_WIDE,
        AudioLocations::LEFT_SURROUND,
    ];

    /// Right locations, most preferred first
    pub const RIGHT_PRIORITY: [AudioLocations; 10] = [
        AudioLocations::FRONT_RIGHT,
        AudioLocations::BACK_RIGHT,
        AudioLocations::FRONT_RIGHT_OF_CENTER,
        AudioLocations::SIDE_RIGHT,
        AudioLocations::TOP_FRONT_RIGHT,
        AudioLocations::TOP_BACK_RIGHT,
        AudioLocations::TOP_SIDE_RIGHT,
        AudioLocations::BOTTOM_FRONT_RIGHT,
        AudioLocations::FRONT_RIGHT_WIDE,
        AudioLocations::RIGHT_SURROUND,
    ];

    /// Any left location
    pub const ANY_LEFT: Self = Self::from_bits_retain(
        0x0000_0001 | 0x0000_0010 | 0x0000_0040 | 0x0000_0400 | 0x0000_1000 | 0x0001_0000
            | 0x0004_0000 | 0x0040_0000 | 0x0100_0000 | 0x0400_0000,
    );

    /// Any right location
    pub const ANY_RIGHT: Self = Self::from_bits_retain(
        0x0000_0002 | 0x0000_0020 | 0x0000_0080 | 0x0000_0800 | 0x0000_2000 | 0x0002_0000
            | 0x0008_0000 | 0x0080_0000 | 0x0200_0000 | 0x0800_0000,
    );

    /// The most preferred left location of this set, if any
    pub fn first_left(&self) -> Option<AudioLocations> {
        Self::LEFT_PRIORITY.into_iter().find(|loc| self.contains(*loc))
    }

    /// The most preferred right location of this set, if any
    pub fn first_right(&self) -> Option<AudioLocations> {
        Self::RIGHT_PRIORITY.into_iter().find(|loc| self.contains(*loc))
    }
}

/// Codec identifier, as carried in PAC records and ASE configurations
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CodecId {
    /// Coding format (Assigned Numbers 2.11)
    pub coding_format: u8,
    /// Company id, only meaningful for vendor specific codecs
    pub vendor_company_id: u16,
    /// Vendor codec id, only meaningful for vendor specific codecs
    pub vendor_codec_id: u16,
}

impl CodecId {
    /// Coding format of LC3
    pub const CODING_FORMAT_LC3: u8 = 0x06;
    /// Coding format of vendor specific codecs
    pub const CODING_FORMAT_VENDOR_SPECIFIC: u8 = 0xFF;

    /// The LC3 codec
    pub const LC3: CodecId = CodecId {
        coding_format: Self::CODING_FORMAT_LC3,
        vendor_company_id: 0,
        vendor_codec_id: 0,
    };

    /// A vendor specific codec
    pub fn vendor(vendor_company_id: u16, vendor_codec_id: u16) -> Self {
        Self { coding_format: Self::CODING_FORMAT_VENDOR_SPECIFIC, vendor_company_id, vendor_codec_id }
    }

    /// Whether this is a vendor specific codec
    pub fn is_vendor(&self) -> bool {
        self.coding_format == Self::CODING_FORMAT_VENDOR_SPECIFIC
    }

    /// Whether codec specific capabilities and configuration use the LTV format
    pub fn is_using_ltv_format(&self) -> bool {
        *self == Self::LC3
    }
}

/// ASE state, as defined by ASCS
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum AseState {
    #[default]
    Idle = 0x00,
    CodecConfigured = 0x01,
    QosConfigured = 0x02,
    Enabling = 0x03,
    Streaming = 0x04,
    Disabling = 0x05,
    Releasing = 0x06,
}

impl AseState {
    /// Decode the on-air state value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(AseState::Idle),
            0x01 => Some(AseState::CodecConfigured),
            0x02 => Some(AseState::QosConfigured),
            0x03 => Some(AseState::Enabling),
            0x04 => Some(AseState::Streaming),
            0x05 => Some(AseState::Disabling),
            0x06 => Some(AseState::Releasing),
            _ => None,
        }
    }
}

/// State of the CIS carrying an ASE
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CisState {
    #[default]
    Idle,
    Assigned,
    Connecting,
    Connected,
    Disconnecting,
}

/// State of the ISO data path of an ASE
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DataPathState {
    #[default]
    Idle,
    Configuring,
    Configured,
    Removing,
}

/// Transport-level state of a group's CIG
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CigState {
    #[default]
    None,
    Creating,
    Created,
    Removing,
}

/// How the channels of a configuration are spread over devices and CISes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConfigurationStrategy {
    /// One CIS per device, carrying a single channel
    MonoOneCisPerDevice,
    /// Two CISes per device, one per channel
    StereoTwoCisesPerDevice,
    /// One CIS per device, carrying both channels
    StereoOneCisPerDevice,
    #[default]
    Rfu,
}

/// Invalid CIS id marker
pub const INVALID_CIS_ID: u8 = 0xFF;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_direction_opposite() {
        assert_eq!(Direction::Sink.opposite(), Direction::Source);
        assert_eq!(Direction::Source.opposite(), Direction::Sink);
        assert_eq!(Direction::from_u8(0x03), None);
    }

    #[test]
    fn test_bidirectional_pair_index() {
        // arrange
        let mut pair = BidirectionalPair::new(1, 2);

        // act
        pair[Direction::Source] = 5;

        // assert
        assert_eq!(pair[Direction::Sink], 1);
        assert_eq!(*pair.get(Direction::Source), 5);
    }

    #[test]
    fn test_context_sets() {
        assert!(AudioContexts::ALL_BIDIR.test(LeAudioContextType::Conversational));
        assert!(!AudioContexts::ALL_BIDIR.test(LeAudioContextType::Media));
        assert!(AudioContexts::ALL_REMOTE_SINK_ONLY.test(LeAudioContextType::Ringtone));
        assert!((AudioContexts::ALL_BIDIR & AudioContexts::ALL_REMOTE_SINK_ONLY).is_empty());
        assert_eq!(AudioContexts::from(LeAudioContextType::Rfu), AudioContexts::empty());
    }

    #[test]
    fn test_context_type_decoding() {
        assert_eq!(LeAudioContextType::from_u16(0x0004), Some(LeAudioContextType::Media));
        assert_eq!(LeAudioContextType::from_u16(0x0006), None);
        assert_eq!(LeAudioContextType::from_u16(0x2000), Some(LeAudioContextType::Rfu));
    }

    #[test]
    fn test_context_types_iteration_order() {
        let contexts = AudioContexts::RINGTONE | AudioContexts::MEDIA | AudioContexts::UNSPECIFIED;

        let types: Vec<_> = contexts.types().collect();

        assert_eq!(
            types,
            vec![
                LeAudioContextType::Unspecified,
                LeAudioContextType::Media,
                LeAudioContextType::Ringtone
            ]
        );
    }

    #[test]
    fn test_first_left_and_right() {
        let locations = AudioLocations::SIDE_LEFT
            | AudioLocations::BACK_LEFT
            | AudioLocations::RIGHT_SURROUND;

        assert_eq!(locations.first_left(), Some(AudioLocations::BACK_LEFT));
        assert_eq!(locations.first_right(), Some(AudioLocations::RIGHT_SURROUND));
        assert_eq!(AudioLocations::FRONT_CENTER.first_left(), None);
    }

    #[test]
    fn test_any_left_matches_priority_list() {
        let left = AudioLocations::LEFT_PRIORITY.iter().fold(AudioLocations::empty(), |a, b| a | *b);
        let right =
            AudioLocations::RIGHT_PRIORITY.iter().fold(AudioLocations::empty(), |a, b| a | *b);

        assert_eq!(left, AudioLocations::ANY_LEFT);
        assert_eq!(right, AudioLocations::ANY_RIGHT);
    }
}
