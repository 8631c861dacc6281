//! Move suggestions.
//!
//! A swap is worth suggesting only if it lines up a run; everything else
//! bounces back. These helpers look one move ahead and never touch the engine,
//! so they create no tiles and use no randomness.
use crate::engine::{index_of, Board, GRID_SIZE};

/// Lists every adjacent pair `(a, b)` with `a < b` whose swap produces a match.
///
/// Pairs are listed in row-major order of `a`, right neighbour before the one
/// below.
pub fn find_valid_swaps(board: &Board) -> Vec<(usize, usize)> {
    let mut swaps = Vec::new();
    for row in 0..GRID_SIZE {
        for col in 0..GRID_SIZE {
            let a = index_of(row, col);
            let mut candidates = Vec::with_capacity(2);
            if col + 1 < GRID_SIZE {
                candidates.push(index_of(row, col + 1));
            }
            if row + 1 < GRID_SIZE {
                candidates.push(index_of(row + 1, col));
            }
            for b in candidates {
                if board.color_at(a) != board.color_at(b) && !board.swapped(a, b).is_stable() {
                    swaps.push((a, b));
                }
            }
        }
    }
    swaps
}

/// Returns `true` if at least one swap would produce a match.
pub fn has_moves(board: &Board) -> bool {
    !find_valid_swaps(board).is_empty()
}

/// Chooses the swap that destroys the most tiles immediately.
///
/// Only the first round is counted; cascades depend on refill colors and are
/// not predicted. Ties go to the first swap in `find_valid_swaps` order.
/// Returns `None` if no swap produces a match.
pub fn choose_swap_max_matched(board: &Board) -> Option<(usize, usize)> {
    let mut best: Option<((usize, usize), usize)> = None;
    for swap in find_valid_swaps(board) {
        let matched = board.swapped(swap.0, swap.1).find_all_matches().len();
        if best.map_or(true, |(_, best_matched)| matched > best_matched) {
            best = Some((swap, matched));
        }
    }
    best.map(|(swap, _)| swap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::board_from_str_array;

    #[test]
    fn test_find_valid_swaps() {
        let board = board_from_str_array(&["BBGBY", "PAYGB", "YGBPA", "BPAYG", "GYPAB"]).unwrap();
        let swaps = find_valid_swaps(&board);
        // Cell 2 with 3 completes BBB in row 0.
        assert!(swaps.contains(&(2, 3)));
        assert!(!swaps.contains(&(4, 9)));
        for &(a, b) in &swaps {
            assert!(a < b);
            assert!(!board.swapped(a, b).is_stable());
        }
    }

    #[test]
    fn test_no_moves_on_dead_board() {
        // Checkerboard-like pattern where no single swap lines up three.
        let board = board_from_str_array(&["BGPAY", "PAYBG", "YBGPA", "GPABY", "AYBGP"]).unwrap();
        assert!(board.is_stable());
        assert!(find_valid_swaps(&board).is_empty());
        assert!(!has_moves(&board));
        assert_eq!(choose_swap_max_matched(&board), None);
    }

    #[test]
    fn test_choose_swap_prefers_larger_match() {
        // Swapping 7 and 12 fills row 1 with pink; swapping 2 and 3 or 6 and 7
        // only lines up three.
        let board = board_from_str_array(&["BBGBY", "PPGPP", "GAPAG", "AYBYA", "YGAGY"]).unwrap();
        assert!(board.is_stable());
        assert!(find_valid_swaps(&board).contains(&(2, 3)));
        assert!(find_valid_swaps(&board).contains(&(6, 7)));
        assert_eq!(choose_swap_max_matched(&board), Some((7, 12)));
    }
}
