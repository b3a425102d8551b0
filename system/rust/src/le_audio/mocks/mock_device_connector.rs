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

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::{core::address::RawAddress, le_audio::DeviceConnector};

/// Routes ACL requests into a channel
pub struct MockDeviceConnector(UnboundedSender<MockDeviceConnectorEvents>);

impl MockDeviceConnector {
    /// Constructor. Returns self and the RX side of the associated channel.
    pub fn new() -> (Self, UnboundedReceiver<MockDeviceConnectorEvents>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }
}

/// Events representing calls to DeviceConnector
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockDeviceConnectorEvents {
    Connect(RawAddress),
    Disconnect { address: RawAddress, recover: bool },
}

impl DeviceConnector for MockDeviceConnector {
    fn connect(&self, address: RawAddress) {
        self.0.send(MockDeviceConnectorEvents::Connect(address)).unwrap();
    }

    fn disconnect(&self, address: RawAddress, recover: bool) {
        self.0.send(MockDeviceConnectorEvents::Disconnect { address, recover }).unwrap();
    }
}
