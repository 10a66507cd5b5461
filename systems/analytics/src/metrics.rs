//! Summary metrics derived from a landing distribution.

use galton_board_core::StatsReport;

/// Mean bin index over every recorded landing, or `None` when nothing landed.
#[must_use]
pub fn mean_bin(distribution: &[u64]) -> Option<f64> {
    let total: u64 = distribution.iter().sum();
    if total == 0 {
        return None;
    }

    let weighted: f64 = distribution
        .iter()
        .enumerate()
        .map(|(bin, count)| bin as f64 * *count as f64)
        .sum();
    Some(weighted / total as f64)
}

/// Share of landings an unbiased walk puts into each bin: `C(rows, k) / 2^rows`.
#[must_use]
pub fn binomial_shares(rows: u32) -> Vec<f64> {
    let mut shares = Vec::with_capacity(rows as usize + 1);
    let mut coefficient = 1.0_f64;
    let scale = 2.0_f64.powi(rows as i32);
    for k in 0..=rows {
        shares.push(coefficient / scale);
        coefficient = coefficient * f64::from(rows - k) / f64::from(k + 1);
    }
    shares
}

/// Total variation distance between the observed distribution and the
/// unbiased walk, in basis points. `None` when nothing landed.
#[must_use]
pub fn deviation_from_binomial_bps(report: &StatsReport) -> Option<u32> {
    let total: u64 = report.distribution.iter().sum();
    if total == 0 || report.distribution.is_empty() {
        return None;
    }

    let rows = (report.distribution.len() - 1) as u32;
    let expected = binomial_shares(rows);
    let distance: f64 = report
        .proportions()
        .iter()
        .zip(expected.iter())
        .map(|(observed, ideal)| (observed - ideal).abs())
        .sum::<f64>()
        / 2.0;
    Some((distance * 10_000.0).round() as u32)
}

/// Renders the leaderboard the way the overlay dumps it to its console.
#[must_use]
pub fn format_leaders(report: &StatsReport) -> String {
    report
        .leaders
        .iter()
        .enumerate()
        .map(|(index, entry)| format!("{}. {}: {}", index + 1, entry.owner, entry.score))
        .collect::<Vec<_>>()
        .join("\n")
}
