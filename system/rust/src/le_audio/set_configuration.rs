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

//! Candidate audio set configurations and the provider that offers them for
//! each context type.

use log::{debug, warn};
use std::{collections::HashMap, rc::Rc};

use super::{
    ltv::{codec_spec_conf, CoreCodecConfig, LtvMap},
    parser::AcsAcRecord,
    types::{BidirectionalPair, CodecId, ConfigurationStrategy, Direction, LeAudioContextType},
};

/// ASCS target latency values
pub mod target_latency {
    pub const LOWER: u8 = 0x01;
    pub const BALANCED_RELIABILITY: u8 = 0x02;
    pub const HIGHER_RELIABILITY: u8 = 0x03;
}

/// Codec settings requested for a single ASE
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodecConfigSetting {
    pub id: CodecId,
    /// Codec specific configuration, without the channel allocation which is
    /// picked per device
    pub params: LtvMap,
    pub channel_count_per_iso_stream: u8,
}

impl CodecConfigSetting {
    /// An LC3 setting
    pub fn lc3(
        sampling_frequency: u8,
        frame_duration: u8,
        octets_per_codec_frame: u16,
        channel_count_per_iso_stream: u8,
    ) -> Self {
        let mut params = LtvMap::new();
        params
            .add_u8(codec_spec_conf::TYPE_SAMPLING_FREQ, sampling_frequency)
            .add_u8(codec_spec_conf::TYPE_FRAME_DURATION, frame_duration)
            .add_u16(codec_spec_conf::TYPE_OCTETS_PER_CODEC_FRAME, octets_per_codec_frame);
        Self { id: CodecId::LC3, params, channel_count_per_iso_stream }
    }

    pub fn core(&self) -> CoreCodecConfig {
        self.params.as_core_codec_config()
    }

    pub fn get_sampling_frequency_hz(&self) -> u32 {
        self.core().get_sampling_frequency_hz().unwrap_or(0)
    }

    pub fn get_data_interval_us(&self) -> u32 {
        self.core().get_frame_duration_us().unwrap_or(0)
    }
}

/// QoS settings requested for a single ASE
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QosConfigSetting {
    pub target_latency: u8,
    pub retransmission_number: u8,
    pub max_transport_latency: u16,
}

/// Requested settings of one ASE
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AseConfiguration {
    pub codec: CodecConfigSetting,
    pub qos: QosConfigSetting,
}

/// How many devices a configuration is spread over, and how
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TopologyInfo {
    pub device_count: BidirectionalPair<u8>,
    pub strategy: BidirectionalPair<ConfigurationStrategy>,
}

/// A complete candidate configuration for a group
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioSetConfiguration {
    pub name: String,
    pub confs: BidirectionalPair<Vec<AseConfiguration>>,
    pub topology_info: TopologyInfo,
}

impl AudioSetConfiguration {
    /// Builds a configuration, deriving the strategy from the ASE layout
    pub fn new(
        name: &str,
        confs: BidirectionalPair<Vec<AseConfiguration>>,
        device_count: BidirectionalPair<u8>,
    ) -> Self {
        let strategy = BidirectionalPair::new(
            get_strategy_for_ase_config(&confs.sink, device_count.sink),
            get_strategy_for_ase_config(&confs.source, device_count.source),
        );
        Self {
            name: name.to_string(),
            confs,
            topology_info: TopologyInfo { device_count, strategy },
        }
    }

    /// Number of ASEs needed for the given direction
    pub fn num_of_ases(&self, direction: Direction) -> usize {
        self.confs[direction].len()
    }
}

/// Local audio HAL stream format derived from a configuration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LeAudioCodecConfiguration {
    pub num_channels: u8,
    pub sample_rate: u32,
    pub bits_per_sample: u8,
    pub data_interval_us: u32,
}

impl LeAudioCodecConfiguration {
    /// The local format used for one direction of a configuration
    pub fn from_ase_configurations(confs: &[AseConfiguration]) -> Option<Self> {
        let first = confs.first()?;
        let channels: u32 =
            confs.iter().map(|conf| conf.codec.channel_count_per_iso_stream as u32).sum();
        Some(Self {
            num_channels: channels.clamp(1, 2) as u8,
            sample_rate: first.codec.get_sampling_frequency_hz(),
            bits_per_sample: 16,
            data_interval_us: first.codec.get_data_interval_us(),
        })
    }
}

/// Picks how channels map onto CISes for a set of ASE configurations
pub fn get_strategy_for_ase_config(
    confs: &[AseConfiguration],
    device_cnt: u8,
) -> ConfigurationStrategy {
    let Some(first) = confs.first() else { return ConfigurationStrategy::Rfu };

    if device_cnt == 1 {
        if first.codec.channel_count_per_iso_stream == 1 {
            if confs.len() == 1 {
                ConfigurationStrategy::MonoOneCisPerDevice
            } else {
                ConfigurationStrategy::StereoTwoCisesPerDevice
            }
        } else {
            ConfigurationStrategy::StereoOneCisPerDevice
        }
    } else if confs.len() == 1 {
        ConfigurationStrategy::Rfu
    } else {
        ConfigurationStrategy::MonoOneCisPerDevice
    }
}

/// Whether a published capability record can satisfy the requested codec
/// setting
pub fn is_codec_config_setting_supported(pac: &AcsAcRecord, setting: &CodecConfigSetting) -> bool {
    if pac.codec_id != setting.id {
        return false;
    }
    if !setting.id.is_using_ltv_format() {
        debug!("no capability matching for codec {:?}", setting.id);
        return false;
    }

    let caps = pac.codec_spec_caps.as_core_codec_capabilities();
    let config = setting.core();

    if let Some(freq) = config.sampling_frequency {
        if !caps.is_sampling_frequency_config_supported(freq) {
            return false;
        }
    }
    if let Some(duration) = config.frame_duration {
        if !caps.is_frame_duration_config_supported(duration) {
            return false;
        }
    }
    if let Some(octets) = config.octets_per_codec_frame {
        if !caps.is_octets_per_codec_frame_config_supported(octets) {
            return false;
        }
    }
    if let Some(blocks) = config.codec_frames_blocks_per_sdu {
        if !caps.is_codec_frames_per_sdu_supported(blocks) {
            return false;
        }
    }
    caps.is_audio_channel_count_supported(setting.channel_count_per_iso_stream)
}

/// Source of candidate configurations for a context type, most preferred
/// first
pub trait AudioSetConfigurationProvider {
    fn get_configurations(&self, context_type: LeAudioContextType) -> Vec<Rc<AudioSetConfiguration>>;
}

/// Named groups of configurations shared by several context types
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Scenario {
    Media,
    Conversational,
    Live,
    Game,
    VoiceAssistants,
}

impl Scenario {
    fn for_context(context_type: LeAudioContextType) -> Option<Self> {
        match context_type {
            LeAudioContextType::Unspecified
            | LeAudioContextType::Media
            | LeAudioContextType::SoundEffects
            | LeAudioContextType::Notifications
            | LeAudioContextType::Alerts
            | LeAudioContextType::Instructional
            | LeAudioContextType::EmergencyAlarm => Some(Scenario::Media),
            LeAudioContextType::Conversational | LeAudioContextType::Ringtone => {
                Some(Scenario::Conversational)
            }
            LeAudioContextType::Live => Some(Scenario::Live),
            LeAudioContextType::Game => Some(Scenario::Game),
            LeAudioContextType::VoiceAssistants => Some(Scenario::VoiceAssistants),
            LeAudioContextType::Uninitialized | LeAudioContextType::Rfu => None,
        }
    }
}

/// Built-in LC3 configurations
pub struct StaticAudioSetConfigurationProvider {
    scenarios: HashMap<Scenario, Vec<Rc<AudioSetConfiguration>>>,
}

const LC3_48_4: (u8, u8, u16) =
    (codec_spec_conf::SAMPLING_FREQ_48000HZ, codec_spec_conf::FRAME_DURATION_10000US, 120);
const LC3_48_2: (u8, u8, u16) =
    (codec_spec_conf::SAMPLING_FREQ_48000HZ, codec_spec_conf::FRAME_DURATION_10000US, 100);
const LC3_32_2: (u8, u8, u16) =
    (codec_spec_conf::SAMPLING_FREQ_32000HZ, codec_spec_conf::FRAME_DURATION_10000US, 80);
const LC3_16_2: (u8, u8, u16) =
    (codec_spec_conf::SAMPLING_FREQ_16000HZ, codec_spec_conf::FRAME_DURATION_10000US, 40);

const HIGH_RELIABILITY: QosConfigSetting = QosConfigSetting {
    target_latency: target_latency::HIGHER_RELIABILITY,
    retransmission_number: 13,
    max_transport_latency: 100,
};
const LOW_LATENCY: QosConfigSetting = QosConfigSetting {
    target_latency: target_latency::LOWER,
    retransmission_number: 2,
    max_transport_latency: 10,
};
const BALANCED: QosConfigSetting = QosConfigSetting {
    target_latency: target_latency::BALANCED_RELIABILITY,
    retransmission_number: 5,
    max_transport_latency: 20,
};

fn ases(codec: (u8, u8, u16), channels: u8, qos: QosConfigSetting, count: usize) -> Vec<AseConfiguration> {
    let (freq, duration, octets) = codec;
    (0..count)
        .map(|_| AseConfiguration { codec: CodecConfigSetting::lc3(freq, duration, octets, channels), qos })
        .collect()
}

/// The usual layouts for a sink codec and an optional source codec
fn layouts(
    prefix: &str,
    sink: (u8, u8, u16),
    sink_qos: QosConfigSetting,
    source: Option<((u8, u8, u16), QosConfigSetting)>,
) -> Vec<Rc<AudioSetConfiguration>> {
    let src = |count| match source {
        Some((codec, qos)) => ases(codec, 1, qos, count),
        None => vec![],
    };
    let src_devices = |count| if source.is_some() { count } else { 0 };

    vec![
        AudioSetConfiguration::new(
            &format!("{prefix}_DualDev_OneChanStereoSnk"),
            BidirectionalPair::new(ases(sink, 1, sink_qos, 2), src(2)),
            BidirectionalPair::new(2, src_devices(2)),
        ),
        AudioSetConfiguration::new(
            &format!("{prefix}_SingleDev_TwoChanStereoSnk"),
            BidirectionalPair::new(ases(sink, 2, sink_qos, 1), src(1)),
            BidirectionalPair::new(1, src_devices(1)),
        ),
        AudioSetConfiguration::new(
            &format!("{prefix}_SingleDev_OneChanStereoSnk"),
            BidirectionalPair::new(ases(sink, 1, sink_qos, 2), src(1)),
            BidirectionalPair::new(1, src_devices(1)),
        ),
        AudioSetConfiguration::new(
            &format!("{prefix}_SingleDev_OneChanMonoSnk"),
            BidirectionalPair::new(ases(sink, 1, sink_qos, 1), src(1)),
            BidirectionalPair::new(1, src_devices(1)),
        ),
    ]
    .into_iter()
    .map(Rc::new)
    .collect()
}

impl StaticAudioSetConfigurationProvider {
    /// Constructor
    pub fn new() -> Self {
        let mut media = layouts("Lc3_48_4_High_Reliability", LC3_48_4, HIGH_RELIABILITY, None);
        media.extend(layouts("Lc3_16_2_Balanced_Reliability", LC3_16_2, BALANCED, None));

        let mut conversational = layouts(
            "Lc3_32_2_Low_Latency",
            LC3_32_2,
            LOW_LATENCY,
            Some((LC3_32_2, LOW_LATENCY)),
        );
        conversational.extend(layouts(
            "Lc3_16_2_Low_Latency",
            LC3_16_2,
            LOW_LATENCY,
            Some((LC3_16_2, LOW_LATENCY)),
        ));
        conversational.extend(layouts("Lc3_16_2_Low_Latency_SnkOnly", LC3_16_2, LOW_LATENCY, None));

        let live = layouts(
            "Lc3_48_2_Low_Latency",
            LC3_48_2,
            LOW_LATENCY,
            Some((LC3_48_2, LOW_LATENCY)),
        );
        let mut game = layouts(
            "Lc3_48_2_Balanced_Reliability",
            LC3_48_2,
            BALANCED,
            Some((LC3_16_2, BALANCED)),
        );
        game.extend(layouts("Lc3_48_2_Balanced_Reliability_SnkOnly", LC3_48_2, BALANCED, None));
        let voice_assistants = layouts(
            "Lc3_32_2_Balanced_Reliability",
            LC3_32_2,
            BALANCED,
            Some((LC3_16_2, BALANCED)),
        );

        let scenarios = HashMap::from([
            (Scenario::Media, media),
            (Scenario::Conversational, conversational),
            (Scenario::Live, live),
            (Scenario::Game, game),
            (Scenario::VoiceAssistants, voice_assistants),
        ]);
        Self { scenarios }
    }
}

impl Default for StaticAudioSetConfigurationProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSetConfigurationProvider for StaticAudioSetConfigurationProvider {
    fn get_configurations(&self, context_type: LeAudioContextType) -> Vec<Rc<AudioSetConfiguration>> {
        let scenario = Scenario::for_context(context_type).unwrap_or_else(|| {
            warn!("no predefined scenario for context {context_type:?}, using media");
            Scenario::Media
        });
        self.scenarios.get(&scenario).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::le_audio::ltv::codec_spec_caps;

    fn make_pac(sampling_frequencies: u16, channel_counts: Option<u8>) -> AcsAcRecord {
        let mut caps = LtvMap::new();
        caps.add_u16(codec_spec_caps::TYPE_SUPPORTED_SAMPLING_FREQUENCIES, sampling_frequencies)
            .add_u8(codec_spec_caps::TYPE_SUPPORTED_FRAME_DURATIONS, 0x02)
            .add_u32(codec_spec_caps::TYPE_SUPPORTED_OCTETS_PER_CODEC_FRAME, 40 | (120 << 16));
        if let Some(counts) = channel_counts {
            caps.add_u8(codec_spec_caps::TYPE_SUPPORTED_AUDIO_CHANNEL_COUNTS, counts);
        }
        AcsAcRecord {
            codec_id: CodecId::LC3,
            codec_spec_caps_raw: caps.to_vec(),
            codec_spec_caps: caps,
            metadata: vec![],
        }
    }

    #[test]
    fn test_strategy_for_single_device() {
        assert_eq!(
            get_strategy_for_ase_config(&ases(LC3_48_4, 1, BALANCED, 1), 1),
            ConfigurationStrategy::MonoOneCisPerDevice
        );
        assert_eq!(
            get_strategy_for_ase_config(&ases(LC3_48_4, 1, BALANCED, 2), 1),
            ConfigurationStrategy::StereoTwoCisesPerDevice
        );
        assert_eq!(
            get_strategy_for_ase_config(&ases(LC3_48_4, 2, BALANCED, 1), 1),
            ConfigurationStrategy::StereoOneCisPerDevice
        );
    }

    #[test]
    fn test_strategy_for_multiple_devices() {
        assert_eq!(get_strategy_for_ase_config(&[], 2), ConfigurationStrategy::Rfu);
        assert_eq!(
            get_strategy_for_ase_config(&ases(LC3_48_4, 1, BALANCED, 1), 2),
            ConfigurationStrategy::Rfu
        );
        assert_eq!(
            get_strategy_for_ase_config(&ases(LC3_48_4, 1, BALANCED, 2), 2),
            ConfigurationStrategy::MonoOneCisPerDevice
        );
    }

    #[test]
    fn test_codec_setting_supported() {
        // arrange
        let pac = make_pac(0x0080, Some(0x03));
        let stereo_48 = CodecConfigSetting::lc3(
            codec_spec_conf::SAMPLING_FREQ_48000HZ,
            codec_spec_conf::FRAME_DURATION_10000US,
            120,
            2,
        );
        let mono_16 = CodecConfigSetting::lc3(
            codec_spec_conf::SAMPLING_FREQ_16000HZ,
            codec_spec_conf::FRAME_DURATION_10000US,
            40,
            1,
        );

        // act / assert
        assert!(is_codec_config_setting_supported(&pac, &stereo_48));
        assert!(!is_codec_config_setting_supported(&pac, &mono_16));
    }

    #[test]
    fn test_missing_channel_counts_means_mono() {
        let pac = make_pac(0x0080, None);
        let mut setting = CodecConfigSetting::lc3(
            codec_spec_conf::SAMPLING_FREQ_48000HZ,
            codec_spec_conf::FRAME_DURATION_10000US,
            120,
            1,
        );

        assert!(is_codec_config_setting_supported(&pac, &setting));
        setting.channel_count_per_iso_stream = 2;
        assert!(!is_codec_config_setting_supported(&pac, &setting));
    }

    #[test]
    fn test_vendor_codec_not_matched() {
        let mut pac = make_pac(0x0080, None);
        pac.codec_id = CodecId::vendor(0x0001, 0x0002);
        let mut setting = CodecConfigSetting::lc3(0x08, 0x01, 120, 1);
        setting.id = pac.codec_id;

        assert!(!is_codec_config_setting_supported(&pac, &setting));
    }

    #[test]
    fn test_provider_scenarios() {
        let provider = StaticAudioSetConfigurationProvider::new();

        let media = provider.get_configurations(LeAudioContextType::Media);
        let alerts = provider.get_configurations(LeAudioContextType::Alerts);
        let ringtone = provider.get_configurations(LeAudioContextType::Ringtone);
        let conversational = provider.get_configurations(LeAudioContextType::Conversational);

        assert_eq!(media, alerts);
        assert_eq!(ringtone, conversational);
        assert!(media.iter().all(|conf| conf.confs.source.is_empty()));
        assert!(conversational.iter().any(|conf| !conf.confs.source.is_empty()));
    }

    #[test]
    fn test_hal_codec_configuration() {
        let confs = ases(LC3_48_4, 1, HIGH_RELIABILITY, 2);

        let config = LeAudioCodecConfiguration::from_ase_configurations(&confs).unwrap();

        assert_eq!(config.num_channels, 2);
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.data_interval_us, 10000);
        assert_eq!(LeAudioCodecConfiguration::from_ase_configurations(&[]), None);
    }
}
