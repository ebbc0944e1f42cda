//! Histogram voting over inter-beat intervals.

use std::collections::BTreeMap;

/// Minimum number of beats needed before any tempo is reported.
pub const MIN_BEATS: usize = 4;

const MIN_INTERVAL_SECS: f32 = 0.2;
const MAX_INTERVAL_SECS: f32 = 2.0;
const VOTE_MIN_BPM: f32 = 50.0;
const VOTE_MAX_BPM: f32 = 220.0;
const FOLD_MIN_BPM: f32 = 60.0;
const FOLD_MAX_BPM: f32 = 180.0;
/// Buckets per BPM (0.5 BPM resolution).
const KEYS_PER_BPM: f32 = 2.0;
const NEIGHBOUR_RATIO: f32 = 0.92;
const NEIGHBOUR_SPAN: i32 = 3;

/// Primary tempo plus its metrical relatives, each with a vote weight.
const RELATED_TEMPOS: [(f32, f32); 5] = [
    (1.0, 1.0),
    (2.0, 0.9),
    (0.5, 0.8),
    (3.0, 0.5),
    (1.0 / 3.0, 0.5),
];

/// Estimates the tempo of a beat sequence in whole BPM.
///
/// `hop_size` is the hop of the frame grid the indices refer to. Returns 0
/// when there are fewer than four beats or no inter-beat interval falls in
/// 0.2–2.0 s.
pub fn estimate_tempo(beats: &[usize], sample_rate: u32, hop_size: usize) -> u32 {
    if beats.len() < MIN_BEATS || sample_rate == 0 {
        return 0;
    }

    let times: Vec<f32> = beats
        .iter()
        .map(|&b| (b * hop_size) as f32 / sample_rate as f32)
        .collect();

    let intervals: Vec<f32> = times
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|&ibi| (MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS).contains(&ibi))
        .collect();

    if intervals.is_empty() {
        log::debug!("No usable inter-beat intervals among {} beats", beats.len());
        return 0;
    }

    let histogram = tempo_histogram(&intervals);

    // Strictly greater keeps the lowest key on ties.
    let mut best_key = 0;
    let mut max_score = 0.0f32;
    for (&key, &score) in &histogram {
        if score > max_score {
            max_score = score;
            best_key = key;
        }
    }

    for offset in -NEIGHBOUR_SPAN..=NEIGHBOUR_SPAN {
        let key = best_key + offset;
        if let Some(&score) = histogram.get(&key) {
            if score > NEIGHBOUR_RATIO * max_score {
                best_key = ((best_key as f32 * max_score + key as f32 * score)
                    / (max_score + score)) as i32;
                break;
            }
        }
    }

    let mut bpm = best_key as f32 / KEYS_PER_BPM;
    if bpm < FOLD_MIN_BPM {
        bpm *= 2.0;
    } else if bpm > FOLD_MAX_BPM {
        bpm /= 2.0;
    }

    log::debug!(
        "Tempo histogram: {} buckets, winner {:.1} BPM from {} intervals",
        histogram.len(),
        bpm,
        intervals.len()
    );

    bpm.round() as u32
}

fn tempo_histogram(intervals: &[f32]) -> BTreeMap<i32, f32> {
    let count = intervals.len() as f32;
    let mut histogram = BTreeMap::new();

    for (k, &interval) in intervals.iter().enumerate() {
        // Later intervals weigh more.
        let weight = 0.5 + 0.5 * (k as f32 / count);
        let primary = 60.0 / interval;

        for &(multiple, vote) in &RELATED_TEMPOS {
            let bpm = primary * multiple;
            if (VOTE_MIN_BPM..=VOTE_MAX_BPM).contains(&bpm) {
                let key = (bpm * KEYS_PER_BPM).round() as i32;
                *histogram.entry(key).or_insert(0.0) += weight * vote;
            }
        }
    }

    histogram
}
