mod qr;

pub use qr::{Module, QR};

use std::ops::Deref;

use crate::common::{
    codec::{encode, Mode},
    ec::ecc,
    error::{QRError, QRResult},
    mask::{apply_best_mask, MaskPattern},
    metadata::{ECLevel, Version},
    BitStream,
};

// Trace
//------------------------------------------------------------------------------

/// Pipeline stages reported through the optional trace callback.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum TracePhase {
    Encoding,
    ErrorCorrection,
    FunctionPatterns,
    Placement,
    Masking,
}

pub type TraceFn = fn(TracePhase, &str);

// QR builder
//------------------------------------------------------------------------------

pub struct QRBuilder<'a> {
    data: &'a [u8],
    version: Option<Version>,
    ec_level: ECLevel,
    mode: Option<Mode>,
    mask: Option<MaskPattern>,
    trace: Option<TraceFn>,
}

impl<'a> QRBuilder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, version: None, ec_level: ECLevel::M, mode: None, mask: None, trace: None }
    }

    pub fn data(&mut self, data: &'a [u8]) -> &mut Self {
        self.data = data;
        self
    }

    /// Requests a version; honoured only when it is at least the computed
    /// minimum, otherwise the minimum is used.
    pub fn version(&mut self, version: Version) -> &mut Self {
        self.version = Some(version);
        self
    }

    pub fn ec_level(&mut self, ec_level: ECLevel) -> &mut Self {
        self.ec_level = ec_level;
        self
    }

    /// Requests an encoding mode instead of the detected one; building
    /// fails with `UnsupportedByMode` if the payload does not fit it.
    pub fn mode(&mut self, mode: Mode) -> &mut Self {
        self.mode = Some(mode);
        self
    }

    /// Forces a mask pattern, skipping the penalty search.
    pub fn mask(&mut self, mask: MaskPattern) -> &mut Self {
        self.mask = Some(mask);
        self
    }

    pub fn trace(&mut self, trace: TraceFn) -> &mut Self {
        self.trace = Some(trace);
        self
    }

    fn emit(&self, phase: TracePhase, event: impl FnOnce() -> String) {
        if let Some(trace) = self.trace {
            trace(phase, &event());
        }
    }
}

impl QRBuilder<'_> {
    pub fn build(&self) -> QRResult<QR> {
        let (encoded, version, mode) = encode(self.data, self.ec_level, self.version, self.mode)?;
        self.emit(TracePhase::Encoding, || {
            format!(
                "version {version}, mode {mode:?}, {} of {} data bits",
                encoded.len(),
                version.bit_capacity(self.ec_level)
            )
        });

        let data_codewords = version.bit_capacity(self.ec_level) >> 3;
        if encoded.data().len() != data_codewords {
            return Err(QRError::InternalInvariant);
        }

        let (data_blocks, ecc_blocks) = Self::compute_ecc(encoded.data(), version, self.ec_level);
        let total_codewords = version.total_codewords();
        let mut payload = BitStream::new(total_codewords << 3);
        payload.extend(&Self::interleave(&data_blocks));
        payload.extend(&Self::interleave(&ecc_blocks));
        if payload.len() != total_codewords << 3 {
            return Err(QRError::InternalInvariant);
        }
        self.emit(TracePhase::ErrorCorrection, || {
            format!(
                "{data_codewords} data codewords, {} ec codewords over {} blocks, corrects up to {} errors",
                total_codewords - data_codewords,
                data_blocks.len(),
                Self::error_correction_capacity(version, self.ec_level)
            )
        });

        let mut qr = QR::new(version, self.ec_level);
        qr.draw_all_function_patterns();
        self.emit(TracePhase::FunctionPatterns, || {
            format!("{0} by {0} grid painted", version.width())
        });

        qr.draw_encoding_region(payload.data())?;
        self.emit(TracePhase::Placement, || {
            format!("{} codewords placed", total_codewords)
        });

        let mask = match self.mask {
            Some(mask) => {
                qr.apply_mask(mask);
                mask
            }
            None => apply_best_mask(&mut qr),
        };
        self.emit(TracePhase::Masking, || format!("mask pattern {}", *mask));

        Ok(qr)
    }

    // ECC: splits the data stream into its blocks and computes the error
    // correction codewords of each
    fn compute_ecc(data: &[u8], version: Version, ec_level: ECLevel) -> (Vec<&[u8]>, Vec<Vec<u8>>) {
        let data_blocks = Self::blockify(data, version, ec_level);

        let ecc_size_per_block = version.ecc_per_block(ec_level);
        let ecc_blocks = data_blocks.iter().map(|b| ecc(b, ecc_size_per_block)).collect::<Vec<_>>();

        (data_blocks, ecc_blocks)
    }

    pub(crate) fn blockify(data: &[u8], version: Version, ec_level: ECLevel) -> Vec<&[u8]> {
        let (block1_size, block1_count, block2_size, block2_count) =
            version.data_codewords_per_block(ec_level);

        let total_blocks = block1_count + block2_count;
        let total_block1_size = block1_size * block1_count;
        let total_size = total_block1_size + block2_size * block2_count;

        debug_assert!(
            total_size == data.len(),
            "Data len doesn't match total size of blocks: Data len {}, Total block size {}",
            data.len(),
            total_size
        );

        let mut data_blocks = Vec::with_capacity(total_blocks);
        data_blocks.extend(data[..total_block1_size].chunks(block1_size));
        if block2_size > 0 {
            data_blocks.extend(data[total_block1_size..].chunks(block2_size));
        }
        data_blocks
    }

    // Worst case number of correctable codewords after subtracting the
    // misdecode protection p of the small versions.
    pub fn error_correction_capacity(version: Version, ec_level: ECLevel) -> usize {
        let p = match (*version, ec_level) {
            (1, ECLevel::L) => 3,
            (2, ECLevel::L) | (1, ECLevel::M) => 2,
            (1, _) | (3, ECLevel::L) => 1,
            _ => 0,
        };

        let ec_bytes_per_block = version.ecc_per_block(ec_level);
        let (_, count1, _, count2) = version.data_codewords_per_block(ec_level);
        let ec_bytes = (count1 + count2) * ec_bytes_per_block;

        (ec_bytes - p) / 2
    }

    // Column major interleave; shorter blocks simply run out early.
    pub fn interleave<T: Copy, V: Deref<Target = [T]>>(blocks: &[V]) -> Vec<T> {
        let max_block_size = blocks.iter().map(|b| b.len()).max().expect("Blocks is empty");
        let total_size = blocks.iter().map(|b| b.len()).sum::<usize>();
        let mut res = Vec::with_capacity(total_size);
        for i in 0..max_block_size {
            for b in blocks {
                if i < b.len() {
                    res.push(b[i]);
                }
            }
        }
        res
    }
}
