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

//! A Bluetooth device address

use std::fmt;

/// The 6 address bytes, most significant byte first, as printed
#[derive(Copy, Clone, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct RawAddress(pub [u8; 6]);

impl RawAddress {
    /// An empty/invalid address
    pub const EMPTY: Self = Self([0; 6]);

    /// Whether this is the empty address
    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }
}

impl fmt::Display for RawAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Only the last two bytes are printed, the rest identifies the user
impl fmt::Debug for RawAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "xx:xx:xx:xx:{:02x}:{:02x}", self.0[4], self.0[5])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_display() {
        let address = RawAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x5a]);

        assert_eq!(address.to_string(), "00:11:22:33:44:5a");
        assert_eq!(format!("{address:?}"), "xx:xx:xx:xx:44:5a");
        assert!(RawAddress::EMPTY.is_empty());
    }
}
