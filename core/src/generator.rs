use ndarray::Array2;
use rand::Rng;
use rand::seq::IndexedRandom;

use crate::*;

/// Places `config.mines` mines uniformly among the cells outside the safe
/// zone around `start` (the clicked cell plus its in-bounds neighbors).
///
/// When the safe zone leaves fewer free cells than mines to place, only the
/// clicked cell itself is excluded. On near-minimum boards this can still put
/// a mine next to the first click; that is the documented behavior.
pub fn generate_minefield(config: GameConfig, start: Coord2, rng: &mut impl Rng) -> Minefield {
    let size = config.size;
    let mines_needed = config.mines as usize;

    let mut excluded: Array2<bool> = Array2::default(nd(size));
    for coords in safe_zone(start, size) {
        excluded[nd(coords)] = true;
    }

    let mut candidates = free_cells(&excluded, size);
    if candidates.len() < mines_needed {
        log::warn!(
            "safe zone leaves {} cells for {} mines, excluding only the clicked cell",
            candidates.len(),
            mines_needed
        );
        excluded.fill(false);
        excluded[nd(start)] = true;
        candidates = free_cells(&excluded, size);
    }

    let mut mask: Array2<bool> = Array2::default(nd(size));
    for &coords in candidates.choose_multiple(rng, mines_needed) {
        mask[nd(coords)] = true;
    }

    let field = Minefield::from_mask(mask);
    if field.mine_count() != config.mines {
        log::warn!(
            "generated {} mines, requested {}",
            field.mine_count(),
            config.mines
        );
    }
    field
}

fn free_cells(excluded: &Array2<bool>, size: Coord2) -> Vec<Coord2> {
    let mut cells = Vec::with_capacity(excluded.len());
    for x in 0..size.0 {
        for y in 0..size.1 {
            if !excluded[nd((x, y))] {
                cells.push((x, y));
            }
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn safe_zone_is_never_mined() {
        for seed in 0..50 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let config = Difficulty::Easy.config();
            let start = (4, 4);

            let field = generate_minefield(config, start, &mut rng);

            assert_eq!(field.mine_count(), config.mines);
            for coords in safe_zone(start, config.size) {
                assert!(!field.is_mine(coords), "mine in safe zone at {coords:?}");
            }
        }
    }

    #[test]
    fn safe_start_holds_in_corners() {
        let mut rng = SmallRng::seed_from_u64(7);
        let config = Difficulty::Hard.config();

        let field = generate_minefield(config, (0, 0), &mut rng);

        assert!(!field.is_mine((0, 0)));
        assert!(!field.is_mine((1, 1)));
        assert_eq!(field.mine_count(), 99);
    }

    #[test]
    fn tiny_board_falls_back_to_single_cell_exclusion() {
        // 3x3 with 8 mines: the 3x3 safe zone around the center would leave
        // zero candidates, so only the clicked cell is spared.
        let mut rng = SmallRng::seed_from_u64(3);
        let config = GameConfig::new((3, 3), 8);

        let field = generate_minefield(config, (1, 1), &mut rng);

        assert!(!field.is_mine((1, 1)));
        assert_eq!(field.mine_count(), 8);
    }
}
