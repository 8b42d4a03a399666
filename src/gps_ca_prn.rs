//! GPS L1 C/A Gold code generator.

use crate::gps_constants::GPS_L1_CA_CODE_LENGTH_CHIPS;

const CODE_LEN: usize = GPS_L1_CA_CODE_LENGTH_CHIPS as usize;

// G2 output delay in chips for PRN 1..=32 (ICD-200C table 3-I)
const G2_DELAY: [usize; 32] = [
    5, 6, 7, 8, 17, 18, 139, 140, 141, 251, 252, 254, 255, 256, 257, 258, 469, 470, 471, 472, 473,
    474, 509, 512, 513, 514, 515, 516, 859, 860, 861, 862,
];

/// Generates the 1023 chips of the C/A code of `prn` (1..=32) as -1/+1,
/// a logical one being +1.
///
/// # Panics
/// When `prn` is outside 1..=32.
pub fn generate_ca_code(prn: u8) -> Vec<i8> {
    assert!(
        (1..=G2_DELAY.len() as u8).contains(&prn),
        "PRN {} has no C/A code",
        prn
    );
    let mut g1 = [0u8; CODE_LEN];
    let mut g2 = [0u8; CODE_LEN];
    let mut r1 = [1u8; 10];
    let mut r2 = [1u8; 10];
    for i in 0..CODE_LEN {
        g1[i] = r1[9];
        g2[i] = r2[9];
        let feedback1 = r1[2] ^ r1[9];
        let feedback2 = r2[1] ^ r2[2] ^ r2[5] ^ r2[7] ^ r2[8] ^ r2[9];
        r1.rotate_right(1);
        r2.rotate_right(1);
        r1[0] = feedback1;
        r2[0] = feedback2;
    }

    let delay = G2_DELAY[(prn - 1) as usize];
    (0..CODE_LEN)
        .map(|i| {
            let chip = g1[i] ^ g2[(i + CODE_LEN - delay) % CODE_LEN];
            if chip == 1 {
                1
            } else {
                -1
            }
        })
        .collect()
}
