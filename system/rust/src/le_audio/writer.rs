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

//! Little-endian serializer used for control point operations and the
//! persisted blobs.

pub(crate) trait Write {
    fn write(&self, w: &mut Writer)
    where
        Self: Sized;
}

pub(crate) struct Writer {
    vec: Vec<u8>,
}

impl Writer {
    pub(crate) fn new(vec: Vec<u8>) -> Self {
        Self { vec }
    }

    pub(crate) fn into_vec(self) -> Vec<u8> {
        self.vec
    }

    pub(crate) fn put(&mut self, slice: &[u8]) {
        self.vec.extend_from_slice(slice);
    }

    pub(crate) fn write<T: Write>(&mut self, v: &T) {
        v.write(self)
    }

    pub(crate) fn write_u8(&mut self, v: u8) {
        self.write_u32::<1>(v.into());
    }

    pub(crate) fn write_u16(&mut self, v: u16) {
        self.write_u32::<2>(v.into());
    }

    pub(crate) fn write_u24(&mut self, v: u32) {
        self.write_u32::<3>(v);
    }

    pub(crate) fn write_u32<const N: usize>(&mut self, mut v: u32) {
        for _ in 0..N {
            self.vec.push((v & 0xff) as u8);
            v >>= 8;
        }
    }

    /// Writes a one byte length prefix and the payload. Fails if the payload
    /// does not fit the prefix.
    pub(crate) fn write_len_prefixed(&mut self, bytes: &[u8]) -> Option<()> {
        self.write_u8(u8::try_from(bytes.len()).ok()?);
        self.put(bytes);
        Some(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_write_little_endian() {
        let mut w = Writer::new(vec![]);

        w.write_u8(0x01);
        w.write_u16(0x0302);
        w.write_u24(0x060504);

        assert_eq!(w.into_vec(), vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
    }

    #[test]
    fn test_write_len_prefixed_rejects_oversized() {
        let mut w = Writer::new(vec![]);

        assert_eq!(w.write_len_prefixed(&[0u8; 256]), None);
        assert_eq!(w.write_len_prefixed(&[0xaa]), Some(()));
    }
}
