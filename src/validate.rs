//! Structural self-check of assembled GIF bytes. Re-parses the buffer
//! independently of the assembler — a malformed extension block or mis-sized
//! color table still opens in many viewers, so corruption here is silent
//! unless we prove the structure back out of the bytes.

use crate::lzw;

/// What the pipeline expects the bytes to contain.
#[derive(Debug, Clone, Copy)]
pub struct Expectations {
    pub width: u16,
    pub height: u16,
    pub frame_count: usize,
    pub loop_forever: bool,
}

/// Outcome of one validation pass. Violations are reported, never thrown.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub has_netscape_loop: bool,
    pub has_trailer: bool,
    pub frame_count: usize,
    pub loop_count: Option<u16>,
    pub frame_delays: Vec<u16>,
}

impl ValidationReport {
    fn fail(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
        self.is_valid = false;
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn u8(&mut self) -> Option<u8> {
        let b = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    fn u16_le(&mut self) -> Option<u16> {
        let lo = self.u8()? as u16;
        let hi = self.u8()? as u16;
        Some(hi << 8 | lo)
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        let s = self.data.get(self.pos..end)?;
        self.pos = end;
        Some(s)
    }

    /// Read length-prefixed sub-blocks up to the zero terminator.
    fn sub_blocks(&mut self) -> Option<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let len = self.u8()? as usize;
            if len == 0 {
                return Some(out);
            }
            out.extend_from_slice(self.take(len)?);
        }
    }
}

/// Re-parse `bytes` and check every structural invariant against
/// `expectations`.
pub fn validate(bytes: &[u8], expectations: &Expectations) -> ValidationReport {
    let mut report = ValidationReport {
        is_valid: true,
        errors: Vec::new(),
        has_netscape_loop: false,
        has_trailer: false,
        frame_count: 0,
        loop_count: None,
        frame_delays: Vec::new(),
    };

    if bytes.len() < 13 {
        report.fail(format!("buffer too short: {} bytes", bytes.len()));
        return report;
    }

    if &bytes[0..6] != b"GIF89a" {
        report.fail(format!(
            "bad signature: {:02X?} (expected GIF89a)",
            &bytes[0..6]
        ));
    }

    let width = u16::from_le_bytes([bytes[6], bytes[7]]);
    let height = u16::from_le_bytes([bytes[8], bytes[9]]);
    if width != expectations.width || height != expectations.height {
        report.fail(format!(
            "screen is {width}x{height}, expected {}x{}",
            expectations.width, expectations.height
        ));
    }

    let packed = bytes[10];
    let gct_present = packed & 0x80 != 0;
    let gct_size = 2usize << (packed & 0x07);
    if !gct_present {
        report.fail("global color table missing");
    }

    let mut cursor = Cursor { data: bytes, pos: 13 };
    if gct_present && cursor.take(gct_size * 3).is_none() {
        report.fail("buffer ends inside global color table");
        return report;
    }

    let mut pending_delay: Option<u16> = None;

    loop {
        let Some(block) = cursor.u8() else {
            report.fail("buffer ended without trailer");
            break;
        };

        match block {
            0x21 => {
                let Some(label) = cursor.u8() else {
                    report.fail("truncated extension block");
                    break;
                };
                match label {
                    0xFF => {
                        let parsed = (|| {
                            let len = cursor.u8()? as usize;
                            let app_id = cursor.take(len)?.to_vec();
                            let data = cursor.sub_blocks()?;
                            Some((app_id, data))
                        })();
                        let Some((app_id, data)) = parsed else {
                            report.fail("truncated application extension");
                            break;
                        };
                        if app_id == b"NETSCAPE2.0" {
                            report.has_netscape_loop = true;
                            if data.len() >= 3 && data[0] == 1 {
                                report.loop_count =
                                    Some(u16::from_le_bytes([data[1], data[2]]));
                            } else {
                                report.fail("NETSCAPE2.0 extension without loop sub-block");
                            }
                        }
                    }
                    0xF9 => {
                        let parsed = (|| {
                            let size = cursor.u8()?;
                            if size != 4 {
                                return None;
                            }
                            let _packed = cursor.u8()?;
                            let delay = cursor.u16_le()?;
                            let _transparent_index = cursor.u8()?;
                            let terminator = cursor.u8()?;
                            if terminator != 0 {
                                return None;
                            }
                            Some(delay)
                        })();
                        match parsed {
                            Some(delay) => pending_delay = Some(delay),
                            None => {
                                report.fail("malformed graphic control extension");
                                break;
                            }
                        }
                    }
                    _ => {
                        if cursor.sub_blocks().is_none() {
                            report.fail(format!("truncated extension 0x{label:02X}"));
                            break;
                        }
                    }
                }
            }
            0x2C => {
                let frame = report.frame_count;
                let parsed = (|| {
                    let _left = cursor.u16_le()?;
                    let _top = cursor.u16_le()?;
                    let w = cursor.u16_le()?;
                    let h = cursor.u16_le()?;
                    let packed = cursor.u8()?;
                    Some((w, h, packed))
                })();
                let Some((w, h, img_packed)) = parsed else {
                    report.fail("truncated image descriptor");
                    break;
                };

                if w != expectations.width || h != expectations.height {
                    report.fail(format!(
                        "frame {frame} is {w}x{h}, expected {}x{}",
                        expectations.width, expectations.height
                    ));
                }
                if img_packed & 0x80 != 0 {
                    report.fail(format!("frame {frame} declares a local color table"));
                }
                if img_packed & 0x40 != 0 {
                    report.fail(format!("frame {frame} is interlaced"));
                }

                let decoded = (|| {
                    let min_code_size = cursor.u8()?;
                    let data = cursor.sub_blocks()?;
                    Some((min_code_size, data))
                })();
                let Some((min_code_size, data)) = decoded else {
                    report.fail("truncated image data");
                    break;
                };
                match lzw::decompress(&data, min_code_size) {
                    Ok(indices) => {
                        let expected = w as usize * h as usize;
                        if indices.len() != expected {
                            report.fail(format!(
                                "frame {frame} decoded to {} pixels, expected {expected}",
                                indices.len()
                            ));
                        }
                    }
                    Err(e) => report.fail(format!("frame {frame} LZW stream invalid: {e}")),
                }

                report.frame_delays.push(pending_delay.take().unwrap_or(0));
                report.frame_count += 1;
            }
            0x3B => {
                report.has_trailer = cursor.pos == bytes.len();
                if !report.has_trailer {
                    report.fail(format!(
                        "{} trailing bytes after trailer",
                        bytes.len() - cursor.pos
                    ));
                }
                break;
            }
            other => {
                report.fail(format!("unknown block introducer 0x{other:02X}"));
                break;
            }
        }
    }

    if report.frame_count != expectations.frame_count {
        let found = report.frame_count;
        report.fail(format!(
            "found {found} frames, expected {}",
            expectations.frame_count
        ));
    }
    if expectations.loop_forever && !report.has_netscape_loop {
        report.fail("looping requested but NETSCAPE2.0 extension missing");
    }
    if !expectations.loop_forever && report.has_netscape_loop {
        report.fail("NETSCAPE2.0 extension present but looping not requested");
    }
    if !report.has_trailer && report.errors.is_empty() {
        report.fail("missing trailer byte");
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::assemble;
    use crate::palette::Palette;
    use crate::QuantizedFrame;

    fn sample_gif(loop_forever: bool) -> (Vec<u8>, Expectations) {
        let palette = Palette::from_colors(
            (0..4).map(|i| rgb::RGB { r: i * 80, g: 0, b: 0 }).collect(),
            false,
        );
        let frames = vec![
            QuantizedFrame { indices: vec![0; 36] },
            QuantizedFrame { indices: vec![3; 36] },
        ];
        let doc = assemble(&palette, &frames, &[4, 4], 6, 6, loop_forever).unwrap();
        (
            doc.bytes,
            Expectations {
                width: 6,
                height: 6,
                frame_count: 2,
                loop_forever,
            },
        )
    }

    #[test]
    fn valid_output_passes() {
        let (bytes, exp) = sample_gif(true);
        let report = validate(&bytes, &exp);
        assert!(report.is_valid, "errors: {:?}", report.errors);
        assert!(report.has_netscape_loop);
        assert!(report.has_trailer);
        assert_eq!(report.frame_count, 2);
        assert_eq!(report.loop_count, Some(0));
        assert_eq!(report.frame_delays, vec![4, 4]);
    }

    #[test]
    fn non_looping_output_passes() {
        let (bytes, exp) = sample_gif(false);
        let report = validate(&bytes, &exp);
        assert!(report.is_valid, "errors: {:?}", report.errors);
        assert!(!report.has_netscape_loop);
    }

    #[test]
    fn corrupt_signature_is_reported() {
        let (mut bytes, exp) = sample_gif(false);
        bytes[4] = b'7'; // GIF87a
        let report = validate(&bytes, &exp);
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|e| e.contains("signature")));
    }

    #[test]
    fn truncated_buffer_is_reported_not_panicked() {
        let (bytes, exp) = sample_gif(true);
        for cut in [0, 5, 12, 20, bytes.len() / 2, bytes.len() - 1] {
            let report = validate(&bytes[..cut], &exp);
            assert!(!report.is_valid, "cut at {cut} accepted");
        }
    }

    #[test]
    fn missing_netscape_when_looping_expected() {
        let (bytes, mut exp) = sample_gif(false);
        exp.loop_forever = true;
        let report = validate(&bytes, &exp);
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|e| e.contains("NETSCAPE")));
    }

    #[test]
    fn wrong_dimension_expectation_fails() {
        let (bytes, mut exp) = sample_gif(false);
        exp.width = 7;
        let report = validate(&bytes, &exp);
        assert!(!report.is_valid);
    }

    #[test]
    fn frame_count_mismatch_names_both_counts() {
        let (bytes, mut exp) = sample_gif(false);
        exp.frame_count = 3;
        let report = validate(&bytes, &exp);
        assert!(!report.is_valid);
        assert_eq!(report.frame_count, 2);
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("found 2 frames, expected 3")));
    }

    #[test]
    fn corrupt_lzw_stream_is_reported() {
        let (mut bytes, exp) = sample_gif(false);
        // Stomp the first image's data bytes after its min-code-size byte.
        let img = bytes.windows(1).position(|w| w[0] == 0x2C).unwrap();
        let data_start = img + 10 + 1 + 1; // descriptor + mcs + length byte
        for b in &mut bytes[data_start..data_start + 2] {
            *b = 0xFF;
        }
        let report = validate(&bytes, &exp);
        assert!(!report.is_valid);
    }

    #[test]
    fn trailing_garbage_is_reported() {
        let (mut bytes, exp) = sample_gif(false);
        bytes.push(0x00);
        let report = validate(&bytes, &exp);
        assert!(!report.is_valid);
    }
}
