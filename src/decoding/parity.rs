//! Parity check of 30-bit navigation words.

/// Parity equations D25..D30 in word order: the context bit seeding the
/// equation (0 for D29*, 1 for D30*) and the source data bits (0 based,
/// d1 at index 0) it covers.
pub(crate) const PARITY_EQUATIONS: [(usize, &[usize]); 6] = [
    (0, &[0, 1, 2, 4, 5, 9, 10, 11, 12, 13, 16, 17, 19, 22]),
    (1, &[1, 2, 3, 5, 6, 10, 11, 12, 13, 14, 17, 18, 20, 23]),
    (0, &[0, 2, 3, 4, 6, 7, 11, 12, 13, 14, 15, 18, 19, 21]),
    (1, &[1, 3, 4, 5, 7, 8, 12, 13, 14, 15, 16, 19, 20, 22]),
    (1, &[0, 2, 4, 5, 6, 8, 9, 13, 14, 15, 16, 17, 20, 21, 23]),
    (0, &[2, 4, 5, 7, 8, 9, 10, 12, 14, 18, 21, 22, 23]),
];

/// Checks the parity of one navigation word given as 32 values of -1/+1:
/// D29* and D30* of the previous word followed by D1..D30.
///
/// Returns 0 when the parity fails, otherwise `-ndat[1]`: +1 or -1
/// depending on the polarity of the data bits. Inverting all 32 values
/// yields the same outcome with the opposite sign.
pub fn parity_check(ndat: &[i8; 32]) -> i8 {
    let mut ndat = *ndat;
    let d30_star = ndat[1];

    // Undo the data inversion applied when D30* is set
    if d30_star != 1 {
        ndat[2..26].iter_mut().for_each(|b| *b = -*b);
    }

    let parity_ok = PARITY_EQUATIONS
        .iter()
        .enumerate()
        .all(|(k, (context, indices))| {
            let computed = indices
                .iter()
                .fold(ndat[*context] as i32, |acc, &i| acc * ndat[i + 2] as i32);
            computed == ndat[26 + k] as i32
        });

    if parity_ok {
        -d30_star
    } else {
        0
    }
}
