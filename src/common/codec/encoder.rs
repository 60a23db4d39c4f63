use crate::common::bitstream::BitStream;
use crate::common::error::{QRError, QRResult};
use crate::common::metadata::{ECLevel, Version};

use super::types::{Mode, Segment, MODE_INDICATOR_BIT_LEN, PADDING_CODEWORDS};

// Encoder
//------------------------------------------------------------------------------

/// Encodes the payload into the padded data codeword stream of the smallest
/// version that fits, honouring the version and mode hints.
pub(crate) fn encode(
    data: &[u8],
    ec_level: ECLevel,
    version_hint: Option<Version>,
    mode_hint: Option<Mode>,
) -> QRResult<(BitStream, Version, Mode)> {
    if data.is_empty() {
        return Err(QRError::EmptyData);
    }

    let mode = match mode_hint {
        Some(mode) => mode,
        None => Mode::detect(data),
    };
    let seg = Segment::new(mode, data)?;

    let min_version = find_min_version(&seg, ec_level)?;
    // A hint below the minimum cannot fit the payload and is ignored.
    let version = match version_hint {
        Some(hint) if hint >= min_version => hint,
        _ => min_version,
    };

    let mut bs = BitStream::new(version.bit_capacity(ec_level));
    push_segment(&seg, version, &mut bs);
    push_terminator(&mut bs);
    pad_remaining_capacity(&mut bs);

    Ok((bs, version, mode))
}

// The segment length only changes where the char count width steps up, so
// the length is re-evaluated at versions 1, 10 and 27 only.
fn find_min_version(seg: &Segment, ec_level: ECLevel) -> QRResult<Version> {
    let mut bit_len = 0;
    for v in 1..=40 {
        let version = Version(v);
        if v == 1 || v == 10 || v == 27 {
            bit_len = seg.bit_len(version);
        }
        if bit_len <= version.bit_capacity(ec_level) {
            return Ok(version);
        }
    }
    Err(QRError::CapacityExceeded)
}

// Writer for encoded data
//------------------------------------------------------------------------------

fn push_segment(seg: &Segment, version: Version, out: &mut BitStream) {
    push_header(seg, version, out);
    match seg.mode {
        Mode::Numeric => push_numeric_data(&seg.data, out),
        Mode::Alphanumeric => push_alphanumeric_data(&seg.data, out),
        Mode::Byte => push_byte_data(&seg.data, out),
        Mode::Kanji => push_kanji_data(&seg.data, out),
    }
}

fn push_header(seg: &Segment, version: Version, out: &mut BitStream) {
    out.push_bits(seg.mode as u8, MODE_INDICATOR_BIT_LEN);
    let len_bits = version.char_count_bit_len(seg.mode);
    debug_assert!(
        seg.char_count < (1 << len_bits),
        "Char count exceeds bit length: Char count {}, Char count bits {len_bits}",
        seg.char_count
    );
    out.push_bits(seg.char_count as u16, len_bits);
}

fn push_numeric_data(data: &[u8], out: &mut BitStream) {
    for chunk in data.chunks(3) {
        let len = (chunk.len() * 10 + 2) / 3;
        out.push_bits(Mode::Numeric.encode_chunk(chunk), len);
    }
}

fn push_alphanumeric_data(data: &[u8], out: &mut BitStream) {
    for chunk in data.chunks(2) {
        let len = (chunk.len() * 11 + 1) / 2;
        out.push_bits(Mode::Alphanumeric.encode_chunk(chunk), len);
    }
}

fn push_byte_data(data: &[u8], out: &mut BitStream) {
    for chunk in data.chunks(1) {
        out.push_bits(Mode::Byte.encode_chunk(chunk), 8);
    }
}

fn push_kanji_data(data: &[u8], out: &mut BitStream) {
    debug_assert!(data.len() & 1 == 0, "Kanji data must be Shift JIS double byte pairs");

    for chunk in data.chunks(2) {
        out.push_bits(Mode::Kanji.encode_chunk(chunk), 13);
    }
}

fn push_terminator(out: &mut BitStream) {
    let bit_len = out.len();
    let bit_capacity = out.capacity();
    if bit_len < bit_capacity {
        let term_len = std::cmp::min(4, bit_capacity - bit_len);
        out.push_bits(0, term_len);
    }
}

fn pad_remaining_capacity(out: &mut BitStream) {
    push_padding_bits(out);
    push_padding_codewords(out);
}

fn push_padding_bits(out: &mut BitStream) {
    let offset = out.len() & 7;
    if offset > 0 {
        out.push_bits(0, 8 - offset);
    }
}

fn push_padding_codewords(out: &mut BitStream) {
    let offset = out.len() & 7;
    debug_assert!(offset == 0, "Bit offset should be zero before padding codewords: {offset}");

    let remain_byte_capacity = (out.capacity() - out.len()) >> 3;
    PADDING_CODEWORDS.iter().copied().cycle().take(remain_byte_capacity).for_each(|pc| {
        out.push_bits(pc, 8);
    });
}
