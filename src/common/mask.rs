use std::ops::Deref;

use crate::builder::QR;

// Mask pattern
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Copy, Clone, PartialOrd, Ord)]
pub struct MaskPattern(u8);

impl MaskPattern {
    pub fn new(pattern: u8) -> Self {
        debug_assert!(pattern < 8, "Invalid masking pattern");
        Self(pattern)
    }
}

impl Deref for MaskPattern {
    type Target = u8;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Predicates take (row, column) module coordinates.
mod mask_functions {
    pub fn checkerboard(r: i16, c: i16) -> bool {
        (r + c) & 1 == 0
    }

    pub fn horizontal_lines(r: i16, _: i16) -> bool {
        r & 1 == 0
    }

    pub fn vertical_lines(_: i16, c: i16) -> bool {
        c % 3 == 0
    }

    pub fn diagonal_lines(r: i16, c: i16) -> bool {
        (r + c) % 3 == 0
    }

    pub fn large_checkerboard(r: i16, c: i16) -> bool {
        ((r >> 1) + (c / 3)) & 1 == 0
    }

    pub fn fields(r: i16, c: i16) -> bool {
        ((r * c) & 1) + ((r * c) % 3) == 0
    }

    pub fn diamonds(r: i16, c: i16) -> bool {
        (((r * c) & 1) + ((r * c) % 3)) & 1 == 0
    }

    pub fn meadow(r: i16, c: i16) -> bool {
        (((r + c) & 1) + ((r * c) % 3)) & 1 == 0
    }
}

impl MaskPattern {
    pub fn mask_function(self) -> fn(i16, i16) -> bool {
        match self.0 {
            0b000 => mask_functions::checkerboard,
            0b001 => mask_functions::horizontal_lines,
            0b010 => mask_functions::vertical_lines,
            0b011 => mask_functions::diagonal_lines,
            0b100 => mask_functions::large_checkerboard,
            0b101 => mask_functions::fields,
            0b110 => mask_functions::diamonds,
            0b111 => mask_functions::meadow,
            _ => unreachable!("Invalid pattern"),
        }
    }
}

// Mask selection
//------------------------------------------------------------------------------

// Evaluates all eight candidates on clones of the symbol and keeps the one
// with the lowest penalty; min_by_key retains the earlier candidate on
// ties, which settles them on the lowest pattern id.
pub fn apply_best_mask(qr: &mut QR) -> MaskPattern {
    let best_mask = (0..8)
        .min_by_key(|m| {
            let mut candidate = qr.clone();
            candidate.apply_mask(MaskPattern(*m));
            compute_total_penalty(&candidate)
        })
        .expect("Should return atleast 1 mask");
    let best_mask = MaskPattern(best_mask);
    qr.apply_mask(best_mask);
    best_mask
}

pub fn compute_total_penalty(qr: &QR) -> u32 {
    compute_run_penalty(qr)
        + compute_block_penalty(qr)
        + compute_finder_penalty(qr)
        + compute_balance_penalty(qr)
}

// Rule 1: every maximal run of 5 or more same colored modules in a row or
// column scores 3 + (run length - 5).
fn compute_run_penalty(qr: &QR) -> u32 {
    let w = qr.width() as i16;
    let mut pen = 0;
    for i in 0..w {
        pen += line_run_penalty((0..w).map(|j| qr.get(i, j).is_dark()));
        pen += line_run_penalty((0..w).map(|j| qr.get(j, i).is_dark()));
    }
    pen
}

fn line_run_penalty(line: impl Iterator<Item = bool>) -> u32 {
    let mut pen = 0;
    let mut run = 0u32;
    let mut last = None;
    for dark in line {
        if last == Some(dark) {
            run += 1;
        } else {
            if run >= 5 {
                pen += run - 2;
            }
            last = Some(dark);
            run = 1;
        }
    }
    if run >= 5 {
        pen += run - 2;
    }
    pen
}

// Rule 2: every 2x2 block of same colored modules scores 3, overlapping
// blocks included.
fn compute_block_penalty(qr: &QR) -> u32 {
    let mut pen = 0;
    let w = qr.width() as i16;
    for r in 0..w - 1 {
        for c in 0..w - 1 {
            let dark = qr.get(r, c).is_dark();
            if dark == qr.get(r + 1, c).is_dark()
                && dark == qr.get(r, c + 1).is_dark()
                && dark == qr.get(r + 1, c + 1).is_dark()
            {
                pen += 3;
            }
        }
    }
    pen
}

// Rule 3: a 1011101 run with four light modules on either side resembles a
// finder pattern and scores 40. Modules beyond the symbol edge count as
// light, like the quiet zone they border.
fn compute_finder_penalty(qr: &QR) -> u32 {
    const PATTERN: [bool; 7] = [true, false, true, true, true, false, true];

    let w = qr.width();
    let mut pen = 0;
    let mut line = Vec::with_capacity(w);
    for i in 0..w as i16 {
        for transposed in [false, true] {
            line.clear();
            line.extend((0..w as i16).map(|j| {
                let module = if transposed { qr.get(j, i) } else { qr.get(i, j) };
                module.is_dark()
            }));
            for j in 0..=w - 7 {
                if line[j..j + 7] != PATTERN {
                    continue;
                }
                let light_before = line[j.saturating_sub(4)..j].iter().all(|&dark| !dark);
                let light_after = line[j + 7..(j + 11).min(w)].iter().all(|&dark| !dark);
                if light_before || light_after {
                    pen += 40;
                }
            }
        }
    }
    pen
}

// Rule 4: deviation of the dark module ratio from 50%, scored 10 per 5%
// step.
fn compute_balance_penalty(qr: &QR) -> u32 {
    let dark = qr.count_dark_modules();
    let total = qr.width() * qr.width();
    let steps = (dark * 2).abs_diff(total) * 10 / total;
    (steps * 10) as u32
}

#[cfg(test)]
mod penalty_tests {
    use super::{
        compute_balance_penalty, compute_block_penalty, compute_finder_penalty, line_run_penalty,
        MaskPattern,
    };
    use crate::builder::{Module, QR};
    use crate::common::metadata::{Color, ECLevel, Version};

    fn blank_qr() -> QR {
        let mut qr = QR::new(Version(1), ECLevel::L);
        let w = qr.width() as i16;
        for r in 0..w {
            for c in 0..w {
                qr.set(r, c, Module::Data(Color::Light));
            }
        }
        qr
    }

    fn set_dark(qr: &mut QR, r: i16, cols: &[i16]) {
        for &c in cols {
            qr.set(r, c, Module::Data(Color::Dark));
        }
    }

    #[test]
    fn test_mask_function_coordinates() {
        // Row parity drives pattern 1, column parity drives none of the
        // first four the same way
        let f = MaskPattern::new(1).mask_function();
        assert!(f(0, 0) && f(0, 5) && f(2, 3));
        assert!(!f(1, 0) && !f(3, 4));
        let f = MaskPattern::new(2).mask_function();
        assert!(f(0, 0) && f(5, 3) && f(1, 6));
        assert!(!f(0, 1) && !f(4, 5));
    }

    #[test]
    fn test_line_run_penalty() {
        assert_eq!(line_run_penalty([true; 5].into_iter()), 3);
        assert_eq!(line_run_penalty([true; 7].into_iter()), 5);
        assert_eq!(line_run_penalty([false; 6].into_iter()), 4);
        assert_eq!(line_run_penalty([true, false, true, false, true].into_iter()), 0);
        let two_runs = [true, true, true, true, true, false, false, false, false, false];
        assert_eq!(line_run_penalty(two_runs.into_iter()), 6);
        assert_eq!(line_run_penalty([true; 4].into_iter()), 0);
    }

    #[test]
    fn test_block_penalty() {
        let mut qr = blank_qr();
        // An all light grid scores every overlapping 2x2 block
        assert_eq!(compute_block_penalty(&qr), 3 * 20 * 20);
        // A single flipped module spoils its four surrounding blocks
        qr.set(10, 10, Module::Data(Color::Dark));
        assert_eq!(compute_block_penalty(&qr), 3 * (20 * 20 - 4));
    }

    #[test]
    fn test_finder_penalty() {
        let mut qr = blank_qr();
        assert_eq!(compute_finder_penalty(&qr), 0);
        // 1011101 at the left edge: quiet zone on one side, light run on
        // the other, counted once per orientation it appears in
        set_dark(&mut qr, 10, &[0, 2, 3, 4, 6]);
        assert_eq!(compute_finder_penalty(&qr), 40);
    }

    #[test]
    fn test_balance_penalty() {
        let qr = blank_qr();
        // 0% dark is ten 5% steps away from the middle
        assert_eq!(compute_balance_penalty(&qr), 100);
    }
}

#[cfg(test)]
mod mask_selection_tests {
    use super::{compute_total_penalty, MaskPattern};
    use crate::builder::QRBuilder;
    use crate::common::metadata::ECLevel;

    #[test]
    fn test_best_mask_minimizes_penalty() {
        let data = b"https://github.com/rust-lang/rust";
        let qr = QRBuilder::new(data).ec_level(ECLevel::M).build().unwrap();
        let chosen = qr.mask_pattern().unwrap();
        let chosen_penalty = compute_total_penalty(&qr);

        for m in 0..8 {
            let candidate = QRBuilder::new(data)
                .ec_level(ECLevel::M)
                .mask(MaskPattern::new(m))
                .build()
                .unwrap();
            let penalty = compute_total_penalty(&candidate);
            assert!(
                chosen_penalty <= penalty,
                "mask {m} scores {penalty}, chosen {} scores {chosen_penalty}",
                *chosen
            );
        }
    }

    #[test]
    fn test_function_modules_survive_masking() {
        use crate::builder::Module;

        let data = b"MASK NEUTRALITY";
        let base = QRBuilder::new(data)
            .ec_level(ECLevel::Q)
            .mask(MaskPattern::new(0))
            .build()
            .unwrap();
        let w = base.width() as i16;
        for m in 1..8 {
            let other = QRBuilder::new(data)
                .ec_level(ECLevel::Q)
                .mask(MaskPattern::new(m))
                .build()
                .unwrap();
            for r in 0..w {
                for c in 0..w {
                    // Format modules differ by construction; every other
                    // reserved module must be untouched by the mask
                    if matches!(base.get(r, c), Module::Func(_) | Module::Version(_)) {
                        assert_eq!(
                            base.get(r, c),
                            other.get(r, c),
                            "mask {m} altered function module ({r}, {c})"
                        );
                    }
                }
            }
        }
    }
}
