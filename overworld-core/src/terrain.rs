use serde::{Deserialize, Serialize};

/// Overworld tile classes. The first sixteen variants map one-to-one onto the
/// low nibble of a run-length map byte; `None` marks a cell that generation
/// has not filled yet and is never written out.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Terrain {
    Town,
    Cave,
    Palace,
    Bridge,
    Desert,
    Grass,
    Forest,
    Swamp,
    Grave,
    Road,
    Lava,
    Mountain,
    Water,
    WalkableWater,
    Rock,
    Spider,
    None,
}

const NIBBLE_ORDER: [Terrain; 16] = [
    Terrain::Town,
    Terrain::Cave,
    Terrain::Palace,
    Terrain::Bridge,
    Terrain::Desert,
    Terrain::Grass,
    Terrain::Forest,
    Terrain::Swamp,
    Terrain::Grave,
    Terrain::Road,
    Terrain::Lava,
    Terrain::Mountain,
    Terrain::Water,
    Terrain::WalkableWater,
    Terrain::Rock,
    Terrain::Spider,
];

impl Terrain {
    pub fn from_nibble(value: u8) -> Option<Terrain> {
        NIBBLE_ORDER.get(value as usize).copied()
    }

    pub fn nibble(self) -> Option<u8> {
        NIBBLE_ORDER
            .iter()
            .position(|t| *t == self)
            .map(|idx| idx as u8)
    }

    /// Towns, caves and palaces are entered rather than walked across.
    pub fn is_entrance(self) -> bool {
        matches!(self, Terrain::Town | Terrain::Cave | Terrain::Palace)
    }

    /// Passable with no movement item at all.
    pub fn is_open(self) -> bool {
        matches!(
            self,
            Terrain::Town
                | Terrain::Cave
                | Terrain::Palace
                | Terrain::Bridge
                | Terrain::Desert
                | Terrain::Grass
                | Terrain::Forest
                | Terrain::Swamp
                | Terrain::Grave
                | Terrain::Road
                | Terrain::Lava
        )
    }

    pub fn passable_with(self, movement: Movement) -> bool {
        match self {
            Terrain::WalkableWater => movement.boots,
            Terrain::Rock => movement.hammer,
            Terrain::Spider => movement.flute,
            other => other.is_open(),
        }
    }

    /// Land the island pass treats as one landmass, regardless of which items
    /// the player will eventually hold.
    pub fn is_connective(self) -> bool {
        !self.is_entrance()
            && !matches!(self, Terrain::Water | Terrain::Mountain | Terrain::None)
    }
}

/// Movement abilities consulted by the flood fill.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Movement {
    pub boots: bool,
    pub hammer: bool,
    pub flute: bool,
}

impl Movement {
    pub const ALL: Movement = Movement {
        boots: true,
        hammer: true,
        flute: true,
    };
}

/// Region-local cell coordinate: `x` is the column, `y` the row.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub x: usize,
    pub y: usize,
}

impl Pos {
    pub const fn new(x: usize, y: usize) -> Pos {
        Pos { x, y }
    }

    pub fn manhattan(self, other: Pos) -> usize {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    West,
    East,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::West,
        Direction::East,
    ];

    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::West | Direction::East)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TerrainGrid {
    rows: usize,
    cols: usize,
    cells: Vec<Terrain>,
}

impl TerrainGrid {
    pub fn new(rows: usize, cols: usize, fill: Terrain) -> Self {
        Self {
            rows,
            cols,
            cells: vec![fill; rows * cols],
        }
    }

    pub fn from_cells(rows: usize, cols: usize, cells: Vec<Terrain>) -> Option<Self> {
        (cells.len() == rows * cols).then_some(Self { rows, cols, cells })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn cells(&self) -> &[Terrain] {
        &self.cells
    }

    pub fn index(&self, pos: Pos) -> usize {
        pos.y * self.cols + pos.x
    }

    pub fn pos_of(&self, index: usize) -> Pos {
        Pos::new(index % self.cols, index / self.cols)
    }

    pub fn contains(&self, x: isize, y: isize) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.cols && (y as usize) < self.rows
    }

    pub fn get(&self, pos: Pos) -> Terrain {
        self.cells[self.index(pos)]
    }

    pub fn set(&mut self, pos: Pos, terrain: Terrain) {
        let idx = self.index(pos);
        self.cells[idx] = terrain;
    }

    /// Writes only over unfilled cells.
    pub fn fill_empty(&mut self, pos: Pos, terrain: Terrain) {
        if self.get(pos) == Terrain::None {
            self.set(pos, terrain);
        }
    }

    pub fn is_border(&self, pos: Pos) -> bool {
        pos.x == 0 || pos.y == 0 || pos.x + 1 == self.cols || pos.y + 1 == self.rows
    }

    pub fn offset(&self, pos: Pos, dx: isize, dy: isize) -> Option<Pos> {
        let x = pos.x as isize + dx;
        let y = pos.y as isize + dy;
        self.contains(x, y).then(|| Pos::new(x as usize, y as usize))
    }

    pub fn neighbors4(&self, pos: Pos) -> impl Iterator<Item = Pos> + '_ {
        [(0, -1), (0, 1), (-1, 0), (1, 0)]
            .into_iter()
            .filter_map(move |(dx, dy)| self.offset(pos, dx, dy))
    }

    pub fn neighbors8(&self, pos: Pos) -> impl Iterator<Item = Pos> + '_ {
        (-1..=1)
            .flat_map(|dy| (-1..=1).map(move |dx| (dx, dy)))
            .filter(|&(dx, dy)| dx != 0 || dy != 0)
            .filter_map(move |(dx, dy)| self.offset(pos, dx, dy))
    }

    pub fn positions(&self) -> impl Iterator<Item = Pos> + '_ {
        (0..self.cells.len()).map(|idx| self.pos_of(idx))
    }

    pub fn count(&self, terrain: Terrain) -> usize {
        self.cells.iter().filter(|t| **t == terrain).count()
    }

    /// Draws the outermost ring of cells.
    pub fn draw_border(&mut self, terrain: Terrain) {
        for x in 0..self.cols {
            self.set(Pos::new(x, 0), terrain);
            self.set(Pos::new(x, self.rows - 1), terrain);
        }
        for y in 0..self.rows {
            self.set(Pos::new(0, y), terrain);
            self.set(Pos::new(self.cols - 1, y), terrain);
        }
    }

    /// Nibble-encoded cells; unfilled cells encode as grass.
    pub fn to_nibbles(&self) -> Vec<u8> {
        let grass = Terrain::Grass.nibble().unwrap_or(5);
        self.cells
            .iter()
            .map(|t| t.nibble().unwrap_or(grass))
            .collect()
    }

    /// Renders the grid one character per cell, used by the spoiler log.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity((self.cols + 1) * self.rows);
        for y in 0..self.rows {
            for x in 0..self.cols {
                out.push(match self.get(Pos::new(x, y)) {
                    Terrain::Town => 'T',
                    Terrain::Cave => 'C',
                    Terrain::Palace => 'P',
                    Terrain::Bridge => '=',
                    Terrain::Desert => ':',
                    Terrain::Grass => '.',
                    Terrain::Forest => 'f',
                    Terrain::Swamp => 's',
                    Terrain::Grave => '+',
                    Terrain::Road => '#',
                    Terrain::Lava => 'x',
                    Terrain::Mountain => '^',
                    Terrain::Water => '~',
                    Terrain::WalkableWater => 'w',
                    Terrain::Rock => 'o',
                    Terrain::Spider => '&',
                    Terrain::None => ' ',
                });
            }
            out.push('\n');
        }
        out
    }
}
