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

//! These are strongly-typed identifiers representing the various objects
//! the LE Audio client keeps track of

/// The handle of a given ATT attribute
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttHandle(pub u16);

/// Value handle and Client Characteristic Configuration descriptor handle of
/// a characteristic
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct HandlePair {
    pub val_hdl: AttHandle,
    pub ccc_hdl: AttHandle,
}

impl HandlePair {
    /// Constructor
    pub fn new(val_hdl: AttHandle, ccc_hdl: AttHandle) -> Self {
        Self { val_hdl, ccc_hdl }
    }
}

/// The id of a coordinated set of devices. It doubles as the CIG id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub i32);

impl GroupId {
    /// No group
    pub const UNKNOWN: GroupId = GroupId(-1);

    /// Whether this refers to an actual group
    pub fn is_known(&self) -> bool {
        *self != Self::UNKNOWN
    }
}

impl Default for GroupId {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

/// The id of a GATT connection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u16);

impl ConnectionId {
    /// Not connected
    pub const INVALID: ConnectionId = ConnectionId(0xFFFF);
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::INVALID
    }
}
