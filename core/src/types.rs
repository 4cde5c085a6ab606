/// Single board axis, used for coordinates and dimensions.
pub type Coord = u8;

/// Area-scale counter, used for mine and cell totals.
pub type CellCount = u16;

/// Board position `(x, y)`.
pub type Coord2 = (Coord, Coord);

/// `ndarray` index for a board position.
pub const fn nd(coords: Coord2) -> [usize; 2] {
    [coords.0 as usize, coords.1 as usize]
}

pub const fn cell_count(width: Coord, height: Coord) -> CellCount {
    (width as CellCount).saturating_mul(height as CellCount)
}

const OFFSETS: [(i16, i16); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Iterates the up-to-8 in-bounds neighbors of `center` on a `size` board.
pub fn neighbors(center: Coord2, size: Coord2) -> impl Iterator<Item = Coord2> {
    OFFSETS.iter().filter_map(move |&(dx, dy)| {
        let x = i16::from(center.0) + dx;
        let y = i16::from(center.1) + dy;
        let in_bounds = (0..i16::from(size.0)).contains(&x) && (0..i16::from(size.1)).contains(&y);
        in_bounds.then(|| (x as Coord, y as Coord))
    })
}

/// The clicked cell plus its in-bounds neighbors.
pub fn safe_zone(center: Coord2, size: Coord2) -> impl Iterator<Item = Coord2> {
    core::iter::once(center).chain(neighbors(center, size))
}
