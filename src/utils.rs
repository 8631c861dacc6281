use crate::engine::{Board, RuneColor, RuneTile, GRID_COUNT, GRID_SIZE};
use crate::error::BoardParseError;

/// Parses an array of string slices into a `Board` object.
///
/// Each string slice represents a row on the board, starting from row 0 (the
/// top). Exactly `GRID_SIZE` rows of exactly `GRID_SIZE` letters are required,
/// because a settled board never has empty cells. Tiles get ids `1..=GRID_COUNT`
/// in row-major order.
///
/// Valid characters for tiles are:
/// - 'B': `RuneColor::Blue`
/// - 'G': `RuneColor::Green`
/// - 'P': `RuneColor::Pink`
/// - 'A': `RuneColor::Grey`
/// - 'Y': `RuneColor::Yellow`
///
/// # Examples
/// ```
/// use rune_cascade::utils::board_from_str_array;
/// use rune_cascade::engine::RuneColor;
///
/// let board = board_from_str_array(&["BBGBY", "PAYGB", "YGBPA", "BPAYG", "GYPAB"]).unwrap();
/// assert_eq!(board.tile_at(0, 2).color, RuneColor::Green);
/// assert_eq!(board.tile_at(0, 2).id, 3);
///
/// assert!(board_from_str_array(&["BBGBX", "PAYGB", "YGBPA", "BPAYG", "GYPAB"]).is_err());
/// ```
pub fn board_from_str_array(s: &[&str]) -> Result<Board, BoardParseError> {
    if s.len() != GRID_SIZE {
        return Err(BoardParseError::RowCount {
            expected: GRID_SIZE,
            found: s.len(),
        });
    }

    let mut tiles = [RuneTile {
        id: 0,
        color: RuneColor::Blue,
    }; GRID_COUNT];

    for (r, row_str) in s.iter().enumerate() {
        let found = row_str.chars().count();
        if found != GRID_SIZE {
            return Err(BoardParseError::RowLength {
                row: r,
                expected: GRID_SIZE,
                found,
            });
        }

        for (c, ch) in row_str.chars().enumerate() {
            let color =
                RuneColor::from_char(ch).ok_or(BoardParseError::UnknownColor { ch, row: r, col: c })?;
            let index = r * GRID_SIZE + c;
            tiles[index] = RuneTile {
                id: index as u64 + 1,
                color,
            };
        }
    }
    Ok(Board::from_tiles(tiles))
}

/// Renders a board as rows of color letters, the inverse of `board_from_str_array`
/// apart from tile ids.
pub fn board_to_rows(board: &Board) -> Vec<String> {
    board
        .tiles()
        .chunks(GRID_SIZE)
        .map(|row| row.iter().map(|t| t.color.to_char()).collect())
        .collect()
}
