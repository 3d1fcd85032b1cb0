use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};

/// A little-endian cursor over the event stream, with the handful of
/// primitive reads the format needs plus VLQ text lengths.
pub struct EventReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> EventReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    pub fn read_u8(&mut self) -> std::io::Result<u8> {
        self.cursor.read_u8()
    }

    pub fn read_u16(&mut self) -> std::io::Result<u16> {
        self.cursor.read_u16::<LittleEndian>()
    }

    pub fn read_u32(&mut self) -> std::io::Result<u32> {
        self.cursor.read_u32::<LittleEndian>()
    }

    pub fn read_i32(&mut self) -> std::io::Result<i32> {
        self.cursor.read_i32::<LittleEndian>()
    }

    pub fn read_f32(&mut self) -> std::io::Result<f32> {
        self.cursor.read_f32::<LittleEndian>()
    }

    pub fn read_f64(&mut self) -> std::io::Result<f64> {
        self.cursor.read_f64::<LittleEndian>()
    }

    pub fn read_bytes(&mut self, n: usize) -> std::io::Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.cursor.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// The low 7 bits of each byte hold length data; the high bit set means
    /// another byte follows.
    pub fn read_text_len(&mut self) -> std::io::Result<usize> {
        let mut ret: usize = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            ret |= ((byte & 0x7f) as usize) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                break;
            }
        }
        Ok(ret)
    }
}
