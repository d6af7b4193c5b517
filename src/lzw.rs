//! GIF-variant LZW: variable code width starting at `min_code_size + 1`,
//! LSB-first bit packing, Clear/End-of-Information codes, 12-bit cap with a
//! dictionary reset. The code width schedule on both sides is driven by the
//! decoder's table growth, so encoder and decoder switch widths on the same
//! wire code. The decoder exists so the validator can prove every frame's
//! stream decodes back to the expected pixel count without touching encoder
//! state.

use std::collections::HashMap;

use crate::error::GifPipeError;

const MAX_TABLE_SIZE: u16 = 4096;
const MAX_CODE_WIDTH: u32 = 12;

struct BitWriter {
    data: Vec<u8>,
    current: u32,
    bits: u32,
}

impl BitWriter {
    fn new() -> Self {
        Self {
            data: Vec::with_capacity(4096),
            current: 0,
            bits: 0,
        }
    }

    fn write(&mut self, value: u16, width: u32) -> Result<(), GifPipeError> {
        if (value as u32) >= (1 << width) {
            return Err(GifPipeError::LzwCodeOverflow { code: value, width });
        }
        self.current |= (value as u32) << self.bits;
        self.bits += width;
        while self.bits >= 8 {
            self.data.push(self.current as u8);
            self.current >>= 8;
            self.bits -= 8;
        }
        Ok(())
    }

    fn finish(mut self) -> Vec<u8> {
        if self.bits > 0 {
            self.data.push(self.current as u8);
        }
        self.data
    }
}

struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    current: u32,
    bits: u32,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            current: 0,
            bits: 0,
        }
    }

    fn read(&mut self, width: u32) -> Option<u16> {
        while self.bits < width {
            if self.pos >= self.data.len() {
                return None;
            }
            self.current |= (self.data[self.pos] as u32) << self.bits;
            self.pos += 1;
            self.bits += 8;
        }
        let value = (self.current & ((1 << width) - 1)) as u16;
        self.current >>= width;
        self.bits -= width;
        Some(value)
    }
}

/// Wire-level code emitter. A decoder rebuilds one table entry per data code
/// it reads, starting with the second after a clear, and widens its codes
/// once that table fills the current width. The emitter mirrors that counter
/// exactly; the encoder's own dictionary never drives the width. This keeps
/// both sides on the same width for every wire code, including the
/// End-of-Information code of a stream that ends right on a boundary.
struct CodeStream {
    writer: BitWriter,
    code_width: u32,
    min_width: u32,
    base_len: u16,
    decoder_table_len: u16,
    primed: bool,
}

impl CodeStream {
    fn new(min_code_size: u8) -> Self {
        let min_width = min_code_size as u32 + 1;
        let base_len = (1u16 << min_code_size) + 2;
        Self {
            writer: BitWriter::new(),
            code_width: min_width,
            min_width,
            base_len,
            decoder_table_len: base_len,
            primed: false,
        }
    }

    fn data(&mut self, code: u16) -> Result<(), GifPipeError> {
        self.writer.write(code, self.code_width)?;
        if self.primed && self.decoder_table_len < MAX_TABLE_SIZE {
            self.decoder_table_len += 1;
            if self.decoder_table_len == (1 << self.code_width) as u16
                && self.code_width < MAX_CODE_WIDTH
            {
                self.code_width += 1;
            }
        }
        self.primed = true;
        Ok(())
    }

    fn clear(&mut self, clear_code: u16) -> Result<(), GifPipeError> {
        self.writer.write(clear_code, self.code_width)?;
        self.code_width = self.min_width;
        self.decoder_table_len = self.base_len;
        self.primed = false;
        Ok(())
    }

    fn end(mut self, eoi_code: u16) -> Result<Vec<u8>, GifPipeError> {
        self.writer.write(eoi_code, self.code_width)?;
        Ok(self.writer.finish())
    }
}

/// Compress a palette index stream into raw LZW bytes (no sub-blocking).
///
/// The dictionary is an exact-match map keyed on (prefix code, next index),
/// so identical input always produces identical output.
pub fn compress(indices: &[u8], min_code_size: u8) -> Result<Vec<u8>, GifPipeError> {
    let clear_code: u16 = 1 << min_code_size;
    let eoi_code: u16 = clear_code + 1;

    let mut stream = CodeStream::new(min_code_size);
    stream.clear(clear_code)?;

    if indices.is_empty() {
        return stream.end(eoi_code);
    }

    for &index in indices {
        if index as u16 >= clear_code {
            return Err(GifPipeError::IndexOutOfRange {
                index,
                palette_len: clear_code as usize,
            });
        }
    }

    let mut table: HashMap<(u16, u8), u16> = HashMap::with_capacity(MAX_TABLE_SIZE as usize);
    let mut next_code = eoi_code + 1;
    let mut prefix = indices[0] as u16;

    for &byte in &indices[1..] {
        match table.get(&(prefix, byte)) {
            Some(&code) => prefix = code,
            None => {
                stream.data(prefix)?;

                if next_code < MAX_TABLE_SIZE {
                    table.insert((prefix, byte), next_code);
                    next_code += 1;
                } else {
                    // Table full: reset before any code would outgrow 12 bits.
                    stream.clear(clear_code)?;
                    table.clear();
                    next_code = eoi_code + 1;
                }

                prefix = byte as u16;
            }
        }
    }

    stream.data(prefix)?;
    stream.end(eoi_code)
}

/// Split raw LZW bytes into GIF data sub-blocks: each at most 255 bytes,
/// prefixed by its length, terminated by a zero-length block.
pub fn to_sub_blocks(compressed: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(compressed.len() + compressed.len() / 255 + 2);
    for chunk in compressed.chunks(255) {
        out.push(chunk.len() as u8);
        out.extend_from_slice(chunk);
    }
    out.push(0);
    out
}

/// Decompress raw LZW bytes back into palette indices.
pub fn decompress(data: &[u8], min_code_size: u8) -> Result<Vec<u8>, String> {
    let clear_code: u16 = 1 << min_code_size;
    let eoi_code: u16 = clear_code + 1;

    // Table of decoded strings; literals first, placeholders for clear/EOI.
    let base_table = || -> Vec<Vec<u8>> {
        let mut t: Vec<Vec<u8>> = (0..clear_code).map(|i| vec![i as u8]).collect();
        t.push(Vec::new()); // clear
        t.push(Vec::new()); // EOI
        t
    };

    let mut table = base_table();
    let mut code_width = min_code_size as u32 + 1;
    let mut reader = BitReader::new(data);
    let mut out = Vec::new();
    let mut prev: Option<u16> = None;

    loop {
        let Some(code) = reader.read(code_width) else {
            return Err("LZW stream ended without End-of-Information code".into());
        };

        if code == clear_code {
            table = base_table();
            code_width = min_code_size as u32 + 1;
            prev = None;
            continue;
        }
        if code == eoi_code {
            return Ok(out);
        }

        let entry: Vec<u8> = if (code as usize) < table.len() {
            table[code as usize].clone()
        } else if code as usize == table.len() {
            // KwKwK case: only legal as previous string + its first byte.
            let Some(p) = prev else {
                return Err(format!("LZW code {code} referenced before any output"));
            };
            let mut e = table[p as usize].clone();
            e.push(table[p as usize][0]);
            e
        } else {
            return Err(format!(
                "LZW code {code} out of range (table has {} entries)",
                table.len()
            ));
        };

        out.extend_from_slice(&entry);

        if let Some(p) = prev {
            if table.len() < MAX_TABLE_SIZE as usize {
                let mut new_entry = table[p as usize].clone();
                new_entry.push(entry[0]);
                table.push(new_entry);
                // Width grows the moment the table fills the current width;
                // the encoder mirrors this exact counter.
                if table.len() == (1 << code_width) && code_width < MAX_CODE_WIDTH {
                    code_width += 1;
                }
            }
        }
        prev = Some(code);
    }
}
