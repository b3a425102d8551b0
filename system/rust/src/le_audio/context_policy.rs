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

//! Maps local audio track metadata onto LE Audio context types and reconciles
//! the contexts requested for the remote sink and source.

use log::{debug, info, warn};

use super::types::{AudioContexts, BidirectionalPair, Direction, LeAudioContextType};

/// Usage of a playback track, as reported by the audio framework
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AudioUsage {
    #[default]
    Unknown = 0,
    Media = 1,
    VoiceCommunication = 2,
    VoiceCommunicationSignalling = 3,
    Alarm = 4,
    Notification = 5,
    NotificationTelephonyRingtone = 6,
    NotificationCommunicationRequest = 7,
    NotificationCommunicationInstant = 8,
    NotificationCommunicationDelayed = 9,
    NotificationEvent = 10,
    AssistanceAccessibility = 11,
    AssistanceNavigationGuidance = 12,
    AssistanceSonification = 13,
    Game = 14,
    VirtualSource = 15,
    Assistant = 16,
    CallAssistant = 17,
    Emergency = 1000,
    Safety = 1001,
    VehicleStatus = 1002,
    Announcement = 1003,
}

/// Content type of a playback track
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AudioContentType {
    #[default]
    Unknown = 0,
    Speech = 1,
    Music = 2,
    Movie = 3,
    Sonification = 4,
}

/// Source of a record track
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum AudioSource {
    Invalid = -1,
    #[default]
    Default = 0,
    Mic = 1,
    VoiceUplink = 2,
    VoiceDownlink = 3,
    VoiceCall = 4,
    Camcorder = 5,
    VoiceRecognition = 6,
    VoiceCommunication = 7,
    RemoteSubmix = 8,
    Unprocessed = 9,
    VoicePerformance = 10,
}

/// Separator of the attribute tags of a track
pub const TAGS_SEPARATOR: char = ';';

/// Tag marking a track as a short sample sound
pub const SAMPLE_SOUND_TAG: &str = "VX_AOSP_SAMPLESOUND";

/// Metadata of one local playback track
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlaybackTrackMetadata {
    pub usage: AudioUsage,
    pub content_type: AudioContentType,
    pub gain: f32,
    pub tags: String,
}

/// Metadata of one local record track
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordTrackMetadata {
    pub source: AudioSource,
    pub gain: f32,
    pub dest_device: u32,
    pub tags: String,
}

/// Contexts in the order they are preferred when choosing a configuration
pub const CONFIGURATION_CONTEXT_PRIORITY: [LeAudioContextType; 11] = [
    LeAudioContextType::Conversational,
    LeAudioContextType::Ringtone,
    LeAudioContextType::Live,
    LeAudioContextType::VoiceAssistants,
    LeAudioContextType::Game,
    LeAudioContextType::Media,
    LeAudioContextType::EmergencyAlarm,
    LeAudioContextType::Alerts,
    LeAudioContextType::Instructional,
    LeAudioContextType::Notifications,
    LeAudioContextType::SoundEffects,
];

/// Contexts which never justify a reconfiguration of an ongoing stream
pub const NON_DISRUPTIVE_CONTEXTS: AudioContexts = AudioContexts::from_bits_retain(
    AudioContexts::NOTIFICATIONS.bits()
        | AudioContexts::SOUNDEFFECTS.bits()
        | AudioContexts::INSTRUCTIONAL.bits()
        | AudioContexts::ALERTS.bits()
        | AudioContexts::EMERGENCYALARM.bits()
        | AudioContexts::UNSPECIFIED.bits(),
);

/// Maps the usage of a playback track (and the content type, for the
/// signalling usage) to a context
pub fn audio_content_to_le_audio_context(
    content_type: AudioContentType,
    usage: AudioUsage,
) -> LeAudioContextType {
    match usage {
        AudioUsage::Media => LeAudioContextType::Media,
        AudioUsage::Assistant => LeAudioContextType::VoiceAssistants,
        AudioUsage::VoiceCommunication | AudioUsage::CallAssistant => {
            LeAudioContextType::Conversational
        }
        AudioUsage::VoiceCommunicationSignalling => match content_type {
            AudioContentType::Speech => LeAudioContextType::Conversational,
            AudioContentType::Sonification => LeAudioContextType::Ringtone,
            _ => LeAudioContextType::Media,
        },
        AudioUsage::Game => LeAudioContextType::Game,
        AudioUsage::Notification => LeAudioContextType::Notifications,
        AudioUsage::NotificationTelephonyRingtone => LeAudioContextType::Ringtone,
        AudioUsage::Alarm => LeAudioContextType::Alerts,
        AudioUsage::Emergency => LeAudioContextType::EmergencyAlarm,
        AudioUsage::AssistanceNavigationGuidance => LeAudioContextType::Instructional,
        AudioUsage::AssistanceSonification => LeAudioContextType::SoundEffects,
        _ => LeAudioContextType::Media,
    }
}

fn is_metadata_tag_present(tags: &str, tag: &str) -> bool {
    tags.split(TAGS_SEPARATOR).any(|t| t == tag)
}

/// Contexts of the local playback tracks, which feed the remote sink
pub fn get_audio_contexts_from_source_metadata(tracks: &[PlaybackTrackMetadata]) -> AudioContexts {
    let mut contexts = AudioContexts::empty();
    for track in tracks {
        if track.content_type == AudioContentType::Unknown && track.usage == AudioUsage::Unknown {
            continue;
        }
        info!(
            "usage={:?}, content_type={:?}, gain={}, tags={}",
            track.usage, track.content_type, track.gain, track.tags
        );

        if is_metadata_tag_present(&track.tags, SAMPLE_SOUND_TAG) {
            contexts |= AudioContexts::SOUNDEFFECTS;
        } else {
            contexts |= audio_content_to_le_audio_context(track.content_type, track.usage).into();
        }
    }
    contexts
}

/// Contexts of the local record tracks, which feed from the remote source
pub fn get_audio_contexts_from_sink_metadata(tracks: &[RecordTrackMetadata]) -> AudioContexts {
    let mut contexts = AudioContexts::empty();
    for track in tracks {
        if track.source == AudioSource::Invalid {
            continue;
        }
        debug!("source={:?}, gain={}, dest_device={:#010x}", track.source, track.gain, track.dest_device);

        contexts |= match track.source {
            AudioSource::Mic => AudioContexts::LIVE,
            AudioSource::VoiceCommunication => AudioContexts::CONVERSATIONAL,
            other => {
                warn!("{other:?} does not match any context, using voice assistants");
                AudioContexts::VOICEASSISTANTS
            }
        };
    }

    if contexts.is_empty() {
        debug!("no context found in the sink metadata, the back channel may not work");
        contexts = AudioContexts::UNSPECIFIED;
    }
    contexts
}

/// Picks the context a configuration is selected for. An ongoing call always
/// wins; otherwise the first match in [`CONFIGURATION_CONTEXT_PRIORITY`] is
/// used, falling back to `previous`.
pub fn choose_configuration_context_type(
    available_contexts: AudioContexts,
    in_call: bool,
    previous: LeAudioContextType,
) -> LeAudioContextType {
    if in_call {
        debug!("in call, using conversational");
        return LeAudioContextType::Conversational;
    }

    if let Some(context) =
        CONFIGURATION_CONTEXT_PRIORITY.into_iter().find(|ctx| available_contexts.test(*ctx))
    {
        return context;
    }

    match previous {
        LeAudioContextType::Uninitialized => LeAudioContextType::Unspecified,
        previous => previous,
    }
}

/// Narrows `contexts` down to a single context unless several are allowed in
/// one metadata LTV
pub fn choose_metadata_context_type(
    contexts: AudioContexts,
    allow_multiple_contexts: bool,
) -> AudioContexts {
    if allow_multiple_contexts {
        return contexts;
    }

    CONFIGURATION_CONTEXT_PRIORITY
        .into_iter()
        .find(|ctx| contexts.test(*ctx))
        .map_or(AudioContexts::UNSPECIFIED, AudioContexts::from)
}

/// Whether a call is ongoing, either reported by telephony or inferred from
/// the local tracks
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallState {
    pub in_call: bool,
    pub in_voip_call: bool,
}

/// Context bookkeeping of a group the policy checks against
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GroupContexts {
    pub available: BidirectionalPair<AudioContexts>,
    pub supported: BidirectionalPair<AudioContexts>,
    /// Contexts in the metadata of the ongoing stream
    pub in_use: BidirectionalPair<AudioContexts>,
}

/// Builds the contexts requested for each remote direction from the local
/// track contexts, when the stream for `remote_direction` is about to change.
///
/// `local` holds the contexts of the local playback (`source`) and record
/// (`sink`) tracks. It is rewritten when a call is ongoing.
pub fn directional_realign_metadata_audio_contexts(
    local: &mut BidirectionalPair<AudioContexts>,
    call: &mut CallState,
    remote_direction: Direction,
    is_streaming_other: bool,
    is_releasing_for_reconfig: bool,
) -> BidirectionalPair<AudioContexts> {
    let other = remote_direction.opposite();

    if local.source.test_any(AudioContexts::RINGTONE | AudioContexts::CONVERSATIONAL)
        && (remote_direction == Direction::Sink || is_streaming_other)
    {
        if !call.in_call {
            info!("ringtone or conversational playback, assuming a voip call");
            call.in_voip_call = true;
        }
    } else if call.in_voip_call {
        info!("voip call is over");
        call.in_voip_call = false;
    }

    if call.in_call || call.in_voip_call {
        for contexts in [&mut local.sink, &mut local.source] {
            contexts.remove(AudioContexts::ALL_BIDIR);
            contexts.insert(AudioContexts::CONVERSATIONAL);
        }
    }

    let mut remote = BidirectionalPair::new(local.source, local.sink);
    if call.in_voip_call {
        remote.sink.remove(AudioContexts::RINGTONE);
    }
    debug!("local contexts {local:?}, remote contexts {remote:?}");

    let ongoing_call_other = is_streaming_other && (call.in_voip_call || call.in_call);

    if remote[other].test_any(AudioContexts::ALL_BIDIR) && !is_streaming_other {
        debug!("{other:?} is not streaming, dropping its bidirectional contexts");
        remote[other] = AudioContexts::empty();
    }

    if remote[remote_direction].test_any(AudioContexts::ALL_BIDIR) {
        if ongoing_call_other {
            let contexts = &mut remote[remote_direction];
            contexts.remove(AudioContexts::ALL_BIDIR);
            contexts.insert(AudioContexts::CONVERSATIONAL);
        } else {
            if !is_streaming_other {
                remote[other] = AudioContexts::empty();
            }
            let aligned = remote[remote_direction] - AudioContexts::ALL_REMOTE_SINK_ONLY;
            let contexts = &mut remote[other];
            contexts.remove(AudioContexts::ALL_BIDIR | AudioContexts::ALL_REMOTE_SINK_ONLY);
            contexts.insert(aligned);
        }
    }

    if (is_releasing_for_reconfig || is_streaming_other)
        && ((remote[remote_direction].is_empty() && !remote[other].is_empty())
            || remote[other].test_any(AudioContexts::ALL_BIDIR))
    {
        debug!("aligning {remote_direction:?} contexts with {other:?}");
        let aligned = (remote[remote_direction] - AudioContexts::ALL_BIDIR) | remote[other];
        remote[remote_direction] = aligned;
    }

    remote.source.remove(AudioContexts::ALL_REMOTE_SINK_ONLY);
    debug!("realigned remote contexts {remote:?}");
    remote
}

/// Restricts the requested remote contexts to what the group can accept.
///
/// `streaming` tells, per remote direction, whether the local direction
/// feeding it is starting or started.
pub fn apply_remote_metadata_audio_context_policy(
    remote: &mut BidirectionalPair<AudioContexts>,
    remote_direction: Direction,
    group: &GroupContexts,
    streaming: &BidirectionalPair<bool>,
    allow_multiple_contexts: bool,
) {
    if remote[remote_direction].is_empty() {
        warn!("no {remote_direction:?} context metadata, using unspecified");
        remote[remote_direction] = AudioContexts::UNSPECIFIED;
    }

    for direction in Direction::BOTH {
        // Contexts already streamed stay usable even once unavailable
        let mut available = group.available[direction];
        if streaming[direction] {
            available |= group.in_use[direction];
        }

        let unavailable = remote[direction] - available;
        if unavailable.is_empty() {
            continue;
        }

        remote[direction] &= available;
        let unavailable_but_supported = unavailable & group.supported[direction];
        if unavailable_but_supported.is_empty() && available.contains(AudioContexts::UNSPECIFIED)
        {
            debug!("replacing unsupported {unavailable:?} with unspecified");
            remote[direction].insert(AudioContexts::UNSPECIFIED);
        } else {
            debug!("supported but unavailable: {unavailable_but_supported:?}");
        }
    }

    // UNSPECIFIED is never mixed with other contexts
    for direction in Direction::BOTH {
        let other = direction.opposite();
        if !remote[direction].contains(AudioContexts::UNSPECIFIED) {
            continue;
        }
        if remote[direction] == AudioContexts::UNSPECIFIED {
            if streaming[other] && remote[other] != AudioContexts::UNSPECIFIED {
                info!("{other:?} is streaming, borrowing its contexts {:?}", remote[other]);
                remote[direction] = remote[other];
            }
        } else {
            remote[direction].remove(AudioContexts::UNSPECIFIED);
        }
    }

    for direction in Direction::BOTH {
        remote[direction] = choose_metadata_context_type(remote[direction], allow_multiple_contexts);
    }
}
