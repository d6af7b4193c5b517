//! GIF89a container assembly. Emits header, logical screen descriptor,
//! global color table, optional NETSCAPE2.0 loop extension, per-frame
//! graphic control + image descriptor + LZW data, and the trailer, in input
//! order with no frame diffing.

use tracing::debug;

use crate::error::GifPipeError;
use crate::lzw;
use crate::palette::Palette;
use crate::QuantizedFrame;

const TRAILER: u8 = 0x3B;
const EXTENSION_INTRODUCER: u8 = 0x21;
const APPLICATION_EXTENSION: u8 = 0xFF;
const GRAPHIC_CONTROL: u8 = 0xF9;
const IMAGE_SEPARATOR: u8 = 0x2C;

/// The finished byte buffer plus the metadata the validator checks against.
#[derive(Debug, Clone)]
pub struct GifDocument {
    pub bytes: Vec<u8>,
    pub frame_count: usize,
    pub size_bytes: usize,
    pub loop_forever: bool,
    pub has_netscape_loop: bool,
    pub has_trailer: bool,
}

/// Serialize quantized frames against the shared palette.
///
/// `delays` carries one centisecond value per frame. Disposal is "do not
/// dispose" unless the palette reserves a transparency sentinel, in which
/// case frames restore to background so stale pixels never show through.
pub fn assemble(
    palette: &Palette,
    frames: &[QuantizedFrame],
    delays: &[u16],
    width: u16,
    height: u16,
    loop_forever: bool,
) -> Result<GifDocument, GifPipeError> {
    debug_assert_eq!(frames.len(), delays.len());

    let palette_len = palette.len();
    for frame in frames {
        for &idx in &frame.indices {
            if idx as usize >= palette_len {
                return Err(GifPipeError::IndexOutOfRange {
                    index: idx,
                    palette_len,
                });
            }
        }
    }

    let mut bytes = Vec::with_capacity(1024 + frames.len() * (width as usize * height as usize) / 4);

    write_header(&mut bytes, width, height, palette);
    write_global_color_table(&mut bytes, palette);

    if loop_forever {
        write_netscape_loop(&mut bytes, 0);
    }

    let min_code_size = palette.min_code_size();

    for (i, (frame, &delay)) in frames.iter().zip(delays.iter()).enumerate() {
        write_graphic_control(&mut bytes, delay, palette.transparent_index());
        write_image_descriptor(&mut bytes, width, height);

        bytes.push(min_code_size);
        let compressed = lzw::compress(&frame.indices, min_code_size)?;
        debug!(frame = i, compressed_bytes = compressed.len(), "frame encoded");
        bytes.extend_from_slice(&lzw::to_sub_blocks(&compressed));
    }

    bytes.push(TRAILER);

    let size_bytes = bytes.len();
    Ok(GifDocument {
        bytes,
        frame_count: frames.len(),
        size_bytes,
        loop_forever,
        has_netscape_loop: loop_forever,
        has_trailer: true,
    })
}

/// `GIF89a` signature + Logical Screen Descriptor.
fn write_header(out: &mut Vec<u8>, width: u16, height: u16, palette: &Palette) {
    out.extend_from_slice(b"GIF89a");
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());

    // Global color table present, color resolution 8-bit, table size bits.
    let packed = 0xF0 | gct_size_bits(palette.len());
    out.push(packed);

    out.push(0); // background color index
    out.push(0); // pixel aspect ratio
}

/// Table size field: padded length is 2^(bits+1).
fn gct_size_bits(palette_len: usize) -> u8 {
    let padded = palette_len.next_power_of_two().max(2);
    (padded.trailing_zeros() - 1) as u8
}

/// Palette entries padded with black up to the next power of two.
fn write_global_color_table(out: &mut Vec<u8>, palette: &Palette) {
    for entry in palette.entries() {
        out.extend_from_slice(entry);
    }
    let padded = palette.len().next_power_of_two().max(2);
    for _ in palette.len()..padded {
        out.extend_from_slice(&[0, 0, 0]);
    }
}

fn write_netscape_loop(out: &mut Vec<u8>, loop_count: u16) {
    out.push(EXTENSION_INTRODUCER);
    out.push(APPLICATION_EXTENSION);
    out.push(0x0B);
    out.extend_from_slice(b"NETSCAPE2.0");
    out.push(0x03); // sub-block size
    out.push(0x01); // loop sub-block id
    out.extend_from_slice(&loop_count.to_le_bytes()); // 0 = infinite
    out.push(0x00); // block terminator
}

fn write_graphic_control(out: &mut Vec<u8>, delay_cs: u16, transparent_index: Option<u8>) {
    out.push(EXTENSION_INTRODUCER);
    out.push(GRAPHIC_CONTROL);
    out.push(0x04);

    // Disposal 1 = do not dispose, 2 = restore to background (transparency).
    let (disposal, transparent_flag, transparent_idx) = match transparent_index {
        Some(idx) => (2u8, 1u8, idx),
        None => (1u8, 0u8, 0u8),
    };
    out.push(disposal << 2 | transparent_flag);
    out.extend_from_slice(&delay_cs.to_le_bytes());
    out.push(transparent_idx);
    out.push(0x00); // block terminator
}

fn write_image_descriptor(out: &mut Vec<u8>, width: u16, height: u16) {
    out.push(IMAGE_SEPARATOR);
    out.extend_from_slice(&0u16.to_le_bytes()); // left
    out.extend_from_slice(&0u16.to_le_bytes()); // top
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out.push(0x00); // no local color table, no interlace
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette_of(n: usize) -> Palette {
        let colors: Vec<rgb::RGB<u8>> = (0..n).map(|i| rgb::RGB {
            r: (i % 256) as u8,
            g: 0,
            b: 0,
        }).collect();
        Palette::from_colors(colors, false)
    }

    fn solid_frame(pixels: usize, index: u8) -> QuantizedFrame {
        QuantizedFrame {
            indices: vec![index; pixels],
        }
    }

    #[test]
    fn signature_and_trailer() {
        let palette = palette_of(4);
        let doc = assemble(&palette, &[solid_frame(16, 1)], &[4], 4, 4, false).unwrap();
        assert!(doc.bytes.starts_with(b"GIF89a"));
        assert_eq!(*doc.bytes.last().unwrap(), 0x3B);
        assert!(doc.has_trailer);
        assert_eq!(doc.frame_count, 1);
        assert_eq!(doc.size_bytes, doc.bytes.len());
    }

    #[test]
    fn netscape_block_only_when_looping() {
        let palette = palette_of(4);
        let frames = [solid_frame(16, 0)];
        let looped = assemble(&palette, &frames, &[4], 4, 4, true).unwrap();
        let single = assemble(&palette, &frames, &[4], 4, 4, false).unwrap();

        let has_netscape = |bytes: &[u8]| {
            bytes.windows(11).any(|w| w == b"NETSCAPE2.0")
        };
        assert!(has_netscape(&looped.bytes));
        assert!(looped.has_netscape_loop);
        assert!(!has_netscape(&single.bytes));
        assert!(!single.has_netscape_loop);
    }

    #[test]
    fn screen_descriptor_dimensions_little_endian() {
        let palette = palette_of(2);
        let doc = assemble(&palette, &[solid_frame(81 * 81, 0)], &[4], 81, 81, false).unwrap();
        assert_eq!(&doc.bytes[6..8], &81u16.to_le_bytes());
        assert_eq!(&doc.bytes[8..10], &81u16.to_le_bytes());
    }

    #[test]
    fn gct_padded_to_power_of_two() {
        // 5 colors pad to 8 entries → size bits 2.
        let palette = palette_of(5);
        let doc = assemble(&palette, &[solid_frame(4, 0)], &[4], 2, 2, false).unwrap();
        let packed = doc.bytes[10];
        assert_eq!(packed & 0x80, 0x80, "GCT flag");
        assert_eq!(packed & 0x07, 2, "size bits");
        // GCT occupies bytes 13..13+8*3.
        assert_eq!(doc.bytes[13 + 5 * 3..13 + 8 * 3], [0u8; 9]);
    }

    #[test]
    fn delay_lands_in_graphic_control() {
        let palette = palette_of(2);
        let doc = assemble(&palette, &[solid_frame(4, 0)], &[300], 2, 2, false).unwrap();
        // GCE directly follows the GCT (no loop block): 21 F9 04 packed lo hi.
        let gce = 13 + 2 * 3;
        assert_eq!(doc.bytes[gce], 0x21);
        assert_eq!(doc.bytes[gce + 1], 0xF9);
        assert_eq!(&doc.bytes[gce + 4..gce + 6], &300u16.to_le_bytes());
    }

    #[test]
    fn transparency_sets_flag_and_disposal() {
        let palette = Palette::from_colors(vec![rgb::RGB { r: 9, g: 9, b: 9 }], true);
        let doc = assemble(&palette, &[solid_frame(4, 0)], &[4], 2, 2, false).unwrap();
        let gce = 13 + 2 * 3;
        let packed = doc.bytes[gce + 3];
        assert_eq!(packed & 0x01, 1, "transparency flag");
        assert_eq!((packed >> 2) & 0x07, 2, "restore-to-background disposal");
        assert_eq!(doc.bytes[gce + 6], 0, "sentinel index");
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let palette = palette_of(2);
        let err = assemble(&palette, &[solid_frame(4, 7)], &[4], 2, 2, false).unwrap_err();
        assert!(matches!(err, GifPipeError::IndexOutOfRange { index: 7, .. }));
    }
}
