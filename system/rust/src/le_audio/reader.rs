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

//! Little-endian cursor over peer supplied attribute bytes. Every read is
//! bounds checked and yields `None` once the buffer is exhausted.

pub(crate) trait Read {
    fn read(r: &mut Reader) -> Option<Self>
    where
        Self: Sized;
}

pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn get(&mut self, n: usize) -> Option<&'a [u8]> {
        if n > self.remaining() {
            return None;
        }
        let old_pos = self.pos;
        self.pos += n;
        Some(&self.data[old_pos..self.pos])
    }

    pub(crate) fn read<T: Read>(&mut self) -> Option<T> {
        T::read(self)
    }

    pub(crate) fn read_u8(&mut self) -> Option<u8> {
        Some(self.read_u32::<1>()? as u8)
    }

    pub(crate) fn read_u16(&mut self) -> Option<u16> {
        Some(self.read_u32::<2>()? as u16)
    }

    pub(crate) fn read_u24(&mut self) -> Option<u32> {
        self.read_u32::<3>()
    }

    pub(crate) fn read_u32<const N: usize>(&mut self) -> Option<u32> {
        let data_it = self.get(N)?.iter().enumerate();
        Some(data_it.fold(0u32, |v, (i, byte)| v | (*byte as u32) << (i * 8)))
    }

    /// Number of bytes not consumed yet
    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}

/// One byte length prefix followed by the payload
impl Read for Vec<u8> {
    fn read(r: &mut Reader) -> Option<Self> {
        let len = r.read_u8()? as usize;
        Some(Vec::from(r.get(len)?))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_read_little_endian() {
        let mut r = Reader::new(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);

        assert_eq!(r.read_u8(), Some(0x01));
        assert_eq!(r.read_u16(), Some(0x0302));
        assert_eq!(r.read_u24(), Some(0x060504));
        assert!(r.is_empty());
        assert_eq!(r.read_u8(), None);
    }

    #[test]
    fn test_overrun_does_not_consume() {
        let mut r = Reader::new(&[0x01, 0x02]);

        assert_eq!(r.read_u24(), None);
        assert_eq!(r.remaining(), 2);
    }

    #[test]
    fn test_read_length_prefixed_vec() {
        let mut r = Reader::new(&[0x02, 0xaa, 0xbb, 0x03, 0xcc]);

        assert_eq!(r.read::<Vec<u8>>(), Some(vec![0xaa, 0xbb]));
        assert_eq!(r.read::<Vec<u8>>(), None);
    }
}
