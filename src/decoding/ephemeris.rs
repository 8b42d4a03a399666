use binrw::{BinRead, BinWrite};
use log::{debug, warn};

use super::DecodeError;
use crate::comm_func::{bin2dec, twos_comp2dec};
use crate::gps_constants::*;

/// Clock and orbit parameters from subframes 1 to 3. Angles are in
/// radians, angular rates in rad/s.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Default)]
#[brw(little)]
pub struct EphemerisSet {
    // Subframe 1
    /// Transmitted week number, modulo 1024
    pub week_number: u32,
    pub accuracy: u32,
    pub health: u32,
    pub t_gd: f64,
    pub iodc: u32,
    pub t_oc: f64,
    pub a_f2: f64,
    pub a_f1: f64,
    pub a_f0: f64,
    // Subframe 2
    pub iode_sf2: u32,
    pub c_rs: f64,
    pub delta_n: f64,
    pub m_0: f64,
    pub c_uc: f64,
    pub e: f64,
    pub c_us: f64,
    pub sqrt_a: f64,
    pub t_oe: f64,
    // Subframe 3
    pub c_ic: f64,
    pub omega_0: f64,
    pub c_is: f64,
    pub i_0: f64,
    pub c_rc: f64,
    pub omega: f64,
    pub omega_dot: f64,
    pub iode_sf3: u32,
    pub i_dot: f64,
    /// Bit k set once subframe k + 1 has been decoded
    pub subframes_seen: u8,
}

impl EphemerisSet {
    pub fn has_subframe(&self, id: u8) -> bool {
        (1..=8).contains(&id) && self.subframes_seen & (1 << (id - 1)) != 0
    }

    /// Subframes 1, 2 and 3 all decoded.
    pub fn is_complete(&self) -> bool {
        self.subframes_seen & 0b111 == 0b111
    }

    /// Subframes 1 to 3 belong to the same issue of data.
    pub fn is_consistent(&self) -> bool {
        self.is_complete()
            && self.iode_sf2 == self.iode_sf3
            && self.iode_sf2 == self.iodc & 0xFF
    }
}

fn bits(sf: &[u8], start: usize, end: usize) -> Result<u64, DecodeError> {
    Ok(bin2dec(&sf[start..end])?)
}

fn signed(sf: &[u8], start: usize, end: usize, scale: f64) -> Result<f64, DecodeError> {
    Ok(twos_comp2dec(&sf[start..end])? as f64 * scale)
}

fn signed_split(sf: &[u8], first: (usize, usize), second: (usize, usize), scale: f64) -> Result<f64, DecodeError> {
    let field = [&sf[first.0..first.1], &sf[second.0..second.1]].concat();
    Ok(twos_comp2dec(&field)? as f64 * scale)
}

fn unsigned_split(sf: &[u8], first: (usize, usize), second: (usize, usize)) -> Result<u64, DecodeError> {
    let field = [&sf[first.0..first.1], &sf[second.0..second.1]].concat();
    Ok(bin2dec(&field)?)
}

fn decode_subframe_1(sf: &[u8], eph: &mut EphemerisSet) -> Result<(), DecodeError> {
    eph.week_number = bits(sf, 60, 70)? as u32;
    eph.accuracy = bits(sf, 72, 76)? as u32;
    eph.health = bits(sf, 76, 82)? as u32;
    eph.t_gd = signed(sf, 196, 204, 2f64.powi(-31))?;
    eph.iodc = unsigned_split(sf, (82, 84), (210, 218))? as u32;
    eph.t_oc = bits(sf, 218, 234)? as f64 * 2f64.powi(4);
    eph.a_f2 = signed(sf, 240, 248, 2f64.powi(-55))?;
    eph.a_f1 = signed(sf, 248, 264, 2f64.powi(-43))?;
    eph.a_f0 = signed(sf, 270, 292, 2f64.powi(-31))?;
    Ok(())
}

fn decode_subframe_2(sf: &[u8], eph: &mut EphemerisSet) -> Result<(), DecodeError> {
    eph.iode_sf2 = bits(sf, 60, 68)? as u32;
    eph.c_rs = signed(sf, 68, 84, 2f64.powi(-5))?;
    eph.delta_n = signed(sf, 90, 106, 2f64.powi(-43))? * GPS_PI;
    eph.m_0 = signed_split(sf, (106, 114), (120, 144), 2f64.powi(-31))? * GPS_PI;
    eph.c_uc = signed(sf, 150, 166, 2f64.powi(-29))?;
    eph.e = unsigned_split(sf, (166, 174), (180, 204))? as f64 * 2f64.powi(-33);
    eph.c_us = signed(sf, 210, 226, 2f64.powi(-29))?;
    eph.sqrt_a = unsigned_split(sf, (226, 234), (240, 264))? as f64 * 2f64.powi(-19);
    eph.t_oe = bits(sf, 270, 286)? as f64 * 2f64.powi(4);
    Ok(())
}

fn decode_subframe_3(sf: &[u8], eph: &mut EphemerisSet) -> Result<(), DecodeError> {
    eph.c_ic = signed(sf, 60, 76, 2f64.powi(-29))?;
    eph.omega_0 = signed_split(sf, (76, 84), (90, 114), 2f64.powi(-31))? * GPS_PI;
    eph.c_is = signed(sf, 120, 136, 2f64.powi(-29))?;
    eph.i_0 = signed_split(sf, (136, 144), (150, 174), 2f64.powi(-31))? * GPS_PI;
    eph.c_rc = signed(sf, 180, 196, 2f64.powi(-5))?;
    eph.omega = signed_split(sf, (196, 204), (210, 234), 2f64.powi(-31))? * GPS_PI;
    eph.omega_dot = signed(sf, 240, 264, 2f64.powi(-43))? * GPS_PI;
    eph.iode_sf3 = bits(sf, 270, 278)? as u32;
    eph.i_dot = signed(sf, 278, 292, 2f64.powi(-43))? * GPS_PI;
    Ok(())
}

/// Decodes five subframes of navigation bits (0/1), the first bit being the
/// first bit of a subframe, and `d30_star` the bit transmitted just before.
///
/// Returns the ephemeris together with the time of week [s] at the start of
/// the first subframe. Subframes 4 and 5 are skipped.
pub fn decode_ephemeris(nav_bits: &[u8], d30_star: u8) -> Result<(EphemerisSet, f64), DecodeError> {
    let n_bits = GPS_SUBFRAMES_PER_DECODE * GPS_SUBFRAME_BITS;
    if nav_bits.len() < n_bits {
        return Err(DecodeError::InvalidInput(format!(
            "{} navigation bits given, at least {} needed",
            nav_bits.len(),
            n_bits
        )));
    }
    if d30_star > 1 {
        return Err(DecodeError::InvalidInput(format!(
            "D30* must be 0 or 1, got {}",
            d30_star
        )));
    }
    if let Some(b) = nav_bits.iter().find(|&&b| b > 1) {
        return Err(DecodeError::InvalidInput(format!(
            "navigation bit {} is not binary",
            b
        )));
    }

    let mut nav_bits = nav_bits[..n_bits].to_vec();
    let mut d30_star = d30_star;
    let mut eph = EphemerisSet::default();
    let mut tow = 0.0;

    for (i, sf) in nav_bits.chunks_exact_mut(GPS_SUBFRAME_BITS).enumerate() {
        // Restore the data bits inverted by the previous word's D30
        for word in sf.chunks_exact_mut(GPS_WORD_BITS) {
            if d30_star == 1 {
                word[..GPS_WORD_DATA_BITS].iter_mut().for_each(|b| *b ^= 1);
            }
            d30_star = word[GPS_WORD_BITS - 1];
        }

        let subframe_id = bits(sf, 49, 52)? as u8;
        if i == 0 {
            tow = bits(sf, 30, 47)? as f64 * 6.0 - 6.0;
        }
        debug!("subframe {} has ID {}", i, subframe_id);
        match subframe_id {
            1 => decode_subframe_1(sf, &mut eph)?,
            2 => decode_subframe_2(sf, &mut eph)?,
            3 => decode_subframe_3(sf, &mut eph)?,
            // Almanac and ionosphere pages
            4 | 5 => continue,
            other => {
                warn!("subframe {} carries unknown ID {}", i, other);
                continue;
            }
        }
        eph.subframes_seen |= 1 << (subframe_id - 1);
    }

    if !eph.is_consistent() {
        warn!(
            "ephemeris incomplete or from mixed issues: subframes {:03b}, IODC {} IODE {}/{}",
            eph.subframes_seen, eph.iodc, eph.iode_sf2, eph.iode_sf3
        );
    }
    Ok((eph, tow))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utilities::{encode_subframes, nav_message, sample_ephemeris, subframe_source_bits};
    use rstest::rstest;

    fn assert_close(a: f64, b: f64, name: &str) {
        assert!((a - b).abs() <= 1e-12 * b.abs().max(1e-20), "{}: {} vs {}", name, a, b);
    }

    #[rstest]
    #[case(1, 0)]
    #[case(3, 0)]
    #[case(4, 1)]
    fn test_decode_round_trip(#[case] first_id: u8, #[case] polarity: u8) {
        let expected = sample_ephemeris();
        // The first subframe only supplies D30*
        let mut stream = nav_message(&expected, first_id, 20_000, 6);
        stream.iter_mut().for_each(|b| *b ^= polarity);
        let (d30_star, nav_bits) = (stream[299], &stream[300..]);

        let (eph, tow) = decode_ephemeris(nav_bits, d30_star).unwrap();
        assert_eq!(tow, 20_001.0 * 6.0);
        assert!(eph.is_complete());
        assert!(eph.is_consistent());
        assert_eq!(eph.week_number, expected.week_number);
        assert_eq!(eph.accuracy, expected.accuracy);
        assert_eq!(eph.health, expected.health);
        assert_eq!(eph.iodc, expected.iodc);
        assert_eq!(eph.iode_sf2, expected.iode_sf2);
        assert_eq!(eph.iode_sf3, expected.iode_sf3);
        for (name, got, want) in [
            ("t_gd", eph.t_gd, expected.t_gd),
            ("t_oc", eph.t_oc, expected.t_oc),
            ("a_f1", eph.a_f1, expected.a_f1),
            ("a_f0", eph.a_f0, expected.a_f0),
            ("c_rs", eph.c_rs, expected.c_rs),
            ("delta_n", eph.delta_n, expected.delta_n),
            ("m_0", eph.m_0, expected.m_0),
            ("c_uc", eph.c_uc, expected.c_uc),
            ("e", eph.e, expected.e),
            ("c_us", eph.c_us, expected.c_us),
            ("sqrt_a", eph.sqrt_a, expected.sqrt_a),
            ("t_oe", eph.t_oe, expected.t_oe),
            ("c_ic", eph.c_ic, expected.c_ic),
            ("omega_0", eph.omega_0, expected.omega_0),
            ("c_is", eph.c_is, expected.c_is),
            ("i_0", eph.i_0, expected.i_0),
            ("c_rc", eph.c_rc, expected.c_rc),
            ("omega", eph.omega, expected.omega),
            ("omega_dot", eph.omega_dot, expected.omega_dot),
            ("i_dot", eph.i_dot, expected.i_dot),
        ] {
            assert_close(got, want, name);
        }
        assert_eq!(eph.a_f2, 0.0);
    }

    #[test]
    fn test_any_subframe_order() {
        let stream = nav_message(&sample_ephemeris(), 4, 100, 10);
        let (eph, _) = decode_ephemeris(&stream[..1500], 0).unwrap();
        assert!(eph.is_complete());
        let (eph, _) = decode_ephemeris(&stream[600..2100], stream[599]).unwrap();
        assert!(eph.is_complete());
        let stream = nav_message(&sample_ephemeris(), 2, 100, 5);
        let (eph, tow) = decode_ephemeris(&stream, 0).unwrap();
        assert!(eph.has_subframe(1) && eph.has_subframe(2) && eph.has_subframe(3));
        assert_eq!(tow, 600.0);
    }

    #[test]
    fn test_missing_subframe() {
        let eph_in = sample_ephemeris();
        let subframes: Vec<[u8; 300]> = [4u8, 5, 1, 2, 4]
            .iter()
            .enumerate()
            .map(|(k, &id)| subframe_source_bits(&eph_in, id, 50 + k as u32))
            .collect();
        let stream = encode_subframes(&subframes, 0, 0);
        let (eph, _) = decode_ephemeris(&stream, 0).unwrap();
        assert!(eph.has_subframe(1) && eph.has_subframe(2));
        assert!(!eph.has_subframe(3));
        assert!(!eph.is_complete());
        assert_eq!(eph.sqrt_a, eph_in.sqrt_a);
    }

    #[test]
    fn test_invalid_input() {
        let stream = nav_message(&sample_ephemeris(), 1, 100, 5);
        assert!(matches!(
            decode_ephemeris(&stream[..1499], 0),
            Err(DecodeError::InvalidInput(_))
        ));
        assert!(matches!(
            decode_ephemeris(&stream, 2),
            Err(DecodeError::InvalidInput(_))
        ));
        let mut bad = stream.clone();
        bad[700] = 3;
        assert!(matches!(
            decode_ephemeris(&bad, 0),
            Err(DecodeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_subframe_bookkeeping() {
        let mut eph = EphemerisSet::default();
        assert!(!eph.is_complete());
        eph.subframes_seen = 0b011;
        assert!(eph.has_subframe(1) && eph.has_subframe(2) && !eph.has_subframe(3));
        assert!(!eph.is_complete());
        eph.subframes_seen = 0b111;
        assert!(eph.is_complete());
        eph.iodc = 0x1F3;
        eph.iode_sf2 = 0xF3;
        eph.iode_sf3 = 0xF2;
        assert!(!eph.is_consistent());
    }
}
