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

//! Content control ids (CCIDs) of the local content control services,
//! indexed by the context type they serve.

use log::{debug, error};
use std::collections::BTreeMap;

use super::types::{AudioContexts, LeAudioContextType};

/// Keeps track of which CCID serves which context type
#[derive(Debug, Default)]
pub struct ContentControlIdKeeper {
    ccids: BTreeMap<LeAudioContextType, u8>,
}

impl ContentControlIdKeeper {
    /// Constructor
    pub fn new() -> Self {
        Self::default()
    }

    fn set_context_ccid(&mut self, context_type: LeAudioContextType, ccid: u8) {
        if context_type >= LeAudioContextType::Rfu {
            error!("unknown context type {context_type:?}");
            return;
        }
        debug!("ccid {ccid} serves {context_type:?}");
        self.ccids.insert(context_type, ccid);
    }

    /// Assigns `ccid` to every context in `contexts`. An empty set removes
    /// the ccid altogether.
    pub fn set_ccid(&mut self, contexts: AudioContexts, ccid: u8) {
        if contexts.is_empty() {
            self.remove_ccid(ccid);
            return;
        }
        for context_type in contexts.types() {
            self.set_context_ccid(context_type, ccid);
        }
    }

    /// Forgets `ccid` for all the contexts it served
    pub fn remove_ccid(&mut self, ccid: u8) {
        debug!("removing ccid {ccid}");
        self.ccids.retain(|_, value| *value != ccid);
    }

    /// The ccid serving `context_type`, if any
    pub fn get_ccid(&self, context_type: LeAudioContextType) -> Option<u8> {
        if context_type >= LeAudioContextType::Rfu {
            error!("unknown context type {context_type:?}");
            return None;
        }
        self.ccids.get(&context_type).copied()
    }

    /// Unique ccids serving any of `contexts`, in context order
    pub fn get_all_ccids(&self, contexts: AudioContexts) -> Vec<u8> {
        let mut ccids = vec![];
        for ccid in contexts.types().filter_map(|ctx| self.get_ccid(ctx)) {
            if !ccids.contains(&ccid) {
                ccids.push(ccid);
            }
        }
        ccids
    }

    /// Forgets everything
    pub fn clear(&mut self) {
        self.ccids.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const MEDIA_CCID: u8 = 5;
    const CALL_CCID: u8 = 7;

    #[test]
    fn test_set_and_get() {
        // arrange
        let mut keeper = ContentControlIdKeeper::new();

        // act
        keeper.set_ccid(AudioContexts::MEDIA | AudioContexts::GAME, MEDIA_CCID);

        // assert
        assert_eq!(keeper.get_ccid(LeAudioContextType::Media), Some(MEDIA_CCID));
        assert_eq!(keeper.get_ccid(LeAudioContextType::Game), Some(MEDIA_CCID));
        assert_eq!(keeper.get_ccid(LeAudioContextType::Conversational), None);
    }

    #[test]
    fn test_rfu_is_rejected() {
        let keeper = ContentControlIdKeeper::new();

        assert_eq!(keeper.get_ccid(LeAudioContextType::Rfu), None);
    }

    #[test]
    fn test_empty_contexts_remove_ccid() {
        // arrange
        let mut keeper = ContentControlIdKeeper::new();
        keeper.set_ccid(AudioContexts::MEDIA | AudioContexts::GAME, MEDIA_CCID);
        keeper.set_ccid(AudioContexts::CONVERSATIONAL, CALL_CCID);

        // act
        keeper.set_ccid(AudioContexts::empty(), MEDIA_CCID);

        // assert
        assert_eq!(keeper.get_ccid(LeAudioContextType::Media), None);
        assert_eq!(keeper.get_ccid(LeAudioContextType::Game), None);
        assert_eq!(keeper.get_ccid(LeAudioContextType::Conversational), Some(CALL_CCID));
    }

    #[test]
    fn test_get_all_ccids_is_unique_and_ordered() {
        // arrange
        let mut keeper = ContentControlIdKeeper::new();
        keeper.set_ccid(AudioContexts::MEDIA | AudioContexts::GAME, MEDIA_CCID);
        keeper.set_ccid(AudioContexts::CONVERSATIONAL, CALL_CCID);

        // act
        let ccids = keeper.get_all_ccids(
            AudioContexts::MEDIA | AudioContexts::GAME | AudioContexts::CONVERSATIONAL,
        );

        // assert
        assert_eq!(ccids, vec![CALL_CCID, MEDIA_CCID]);
    }
}
