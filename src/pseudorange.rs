use binrw::{BinRead, BinWrite};

/// Pseudorange of one channel at a measurement epoch.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq)]
#[brw(little)]
pub struct Pseudorange {
    pub prn: u8,
    pub range_m: f64,
}

/// Converts the sample index at which each channel's measurement epoch
/// begins into pseudoranges.
///
/// Travel times are in milliseconds relative to the earliest channel,
/// floored to a whole code period, plus `start_offset_ms` for the
/// typical signal travel time.
pub fn calculate_pseudoranges(
    sample_indices: &[(u8, f64)],
    samples_per_code: f64,
    start_offset_ms: f64,
    speed_of_light: f64,
) -> Vec<Pseudorange> {
    let travel_time_ms: Vec<f64> = sample_indices
        .iter()
        .map(|&(_, sample)| sample / samples_per_code)
        .collect();
    let min_time = match travel_time_ms.iter().copied().reduce(f64::min) {
        Some(t) => t.floor(),
        None => return Vec::new(),
    };

    sample_indices
        .iter()
        .zip(&travel_time_ms)
        .map(|(&(prn, _), &t)| Pseudorange {
            prn,
            range_m: (t - min_time + start_offset_ms) * speed_of_light / 1000.0,
        })
        .collect()
}
