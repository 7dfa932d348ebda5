//! Lattice placement of atoms for text rendering.
//!
//! Every atom gets a lattice point. Bonds between lattice neighbours are
//! drawn as lines; all other bonds become paired closure markers.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::graph::NodeIndex;

use crate::graph_ops::connected_components;
use crate::structure::MolecularStructure;

pub(crate) type Point = (i32, i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    East,
    South,
    West,
    North,
}

impl Direction {
    fn step(self, (x, y): Point) -> Point {
        match self {
            Direction::East => (x + 1, y),
            Direction::South => (x, y + 1),
            Direction::West => (x - 1, y),
            Direction::North => (x, y - 1),
        }
    }

    fn right(self) -> Self {
        match self {
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
            Direction::North => Direction::East,
        }
    }

    fn left(self) -> Self {
        self.right().right().right()
    }

    fn back(self) -> Self {
        self.right().right()
    }

    /// Straight ahead first, then right, left and back.
    fn preferences(self) -> [Direction; 4] {
        [self, self.right(), self.left(), self.back()]
    }
}

pub(crate) fn adjacent(a: Point, b: Point) -> bool {
    (a.0 - b.0).abs() + (a.1 - b.1).abs() == 1
}

/// Lattice points per atom and the bonds that may be drawn as lines.
#[derive(Debug)]
pub(crate) struct Layout {
    pub positions: Vec<Point>,
    pub lines: BTreeSet<(NodeIndex, NodeIndex)>,
}

pub(crate) fn key(a: NodeIndex, b: NodeIndex) -> (NodeIndex, NodeIndex) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

struct Placer<'a> {
    structure: &'a MolecularStructure,
    closed_rings: bool,
    positions: Vec<Option<Point>>,
    occupied: BTreeMap<Point, NodeIndex>,
    tree: BTreeSet<(NodeIndex, NodeIndex)>,
}

impl<'a> Placer<'a> {
    fn place(&mut self, atom: NodeIndex, at: Point) {
        self.positions[atom.index()] = Some(at);
        self.occupied.insert(at, atom);
    }

    fn position(&self, atom: NodeIndex) -> Point {
        self.positions[atom.index()].unwrap_or_default()
    }

    fn is_free(&self, p: Point) -> bool {
        !self.occupied.contains_key(&p)
    }

    /// A point on a fresh row below everything placed so far.
    fn overflow_point(&self) -> Point {
        let min_x = self.occupied.keys().map(|p| p.0).min().unwrap_or(0);
        let max_y = self.occupied.keys().map(|p| p.1).max().unwrap_or(-2);
        (min_x, max_y + 2)
    }

    fn layout_component(&mut self, root: NodeIndex) {
        let origin = self.overflow_point();
        self.place(root, origin);

        let mut stack = vec![(root, Direction::East)];
        while let Some((atom, heading)) = stack.pop() {
            let mut unplaced: Vec<NodeIndex> = self
                .structure
                .neighbors(atom)
                .filter(|n| self.positions[n.index()].is_none())
                .collect();
            unplaced.sort();

            let mut next = Vec::new();
            for neighbor in unplaced {
                if self.positions[neighbor.index()].is_some() {
                    continue;
                }
                if self.closed_rings {
                    if let Some(ring) = self.place_ring(atom, neighbor, heading) {
                        next.extend(ring);
                        continue;
                    }
                }

                let from = self.position(atom);
                let free = heading
                    .preferences()
                    .into_iter()
                    .find(|d| self.is_free(d.step(from)));
                match free {
                    Some(d) => {
                        self.place(neighbor, d.step(from));
                        next.push((neighbor, d));
                    }
                    None => {
                        let p = self.overflow_point();
                        self.place(neighbor, p);
                        next.push((neighbor, Direction::East));
                    }
                }
                self.tree.insert(key(atom, neighbor));
            }
            stack.extend(next.into_iter().rev());
        }
    }

    /// Places the smallest even ring through `from`-`to` as a closed
    /// rectangle, if every other member is unplaced and the space is free.
    fn place_ring(
        &mut self,
        from: NodeIndex,
        to: NodeIndex,
        heading: Direction,
    ) -> Option<Vec<(NodeIndex, Direction)>> {
        if !self.structure.is_ring_bond(from, to) {
            return None;
        }
        let ring = self.smallest_ring_through(from, to)?;
        if ring.len() % 2 != 0 || ring[1..].iter().any(|a| self.positions[a.index()].is_some()) {
            return None;
        }

        let start = self.position(from);
        for (first, turn_right) in heading
            .preferences()
            .into_iter()
            .flat_map(|d| [(d, true), (d, false)])
        {
            for (width, height) in rectangles(ring.len()) {
                let path = rectangle_path(start, first, turn_right, width, height);
                if path[1..].iter().all(|&(p, _)| self.is_free(p)) {
                    let mut placed = Vec::with_capacity(ring.len() - 1);
                    for (i, &(p, d)) in path.iter().enumerate().skip(1) {
                        self.place(ring[i], p);
                        self.tree.insert(key(ring[i - 1], ring[i]));
                        placed.push((ring[i], d));
                    }
                    return Some(placed);
                }
            }
        }
        None
    }

    /// Members of the smallest basis cycle containing bond `a`-`b`, rotated
    /// to start with `a` followed by `b`.
    fn smallest_ring_through(&self, a: NodeIndex, b: NodeIndex) -> Option<Vec<NodeIndex>> {
        self.structure
            .cycles()
            .cycles()
            .iter()
            .filter_map(|cycle| {
                let n = cycle.len();
                let i = cycle.iter().position(|&x| x == a)?;
                if cycle[(i + 1) % n] == b {
                    Some((0..n).map(|k| cycle[(i + k) % n]).collect::<Vec<_>>())
                } else if cycle[(i + n - 1) % n] == b {
                    Some((0..n).map(|k| cycle[(i + n - k) % n]).collect::<Vec<_>>())
                } else {
                    None
                }
            })
            .min_by_key(Vec::len)
    }
}

/// Rectangles whose perimeter has `size` lattice points, squarest first.
fn rectangles(size: usize) -> Vec<(usize, usize)> {
    let half = size / 2 + 2;
    let mut shapes: Vec<(usize, usize)> = (2..half - 1).map(|w| (w, half - w)).collect();
    shapes.sort_by_key(|&(w, h)| (w.abs_diff(h), std::cmp::Reverse(w)));
    shapes
}

/// Walks the perimeter from `start`, `width - 1` steps along `first` before
/// the first turn. Each point comes with the direction used to reach it.
fn rectangle_path(
    start: Point,
    first: Direction,
    turn_right: bool,
    width: usize,
    height: usize,
) -> Vec<(Point, Direction)> {
    let turn = |d: Direction| if turn_right { d.right() } else { d.left() };
    let legs = [width - 1, height - 1, width - 1, height - 2];
    let mut path = vec![(start, first)];
    let mut at = start;
    let mut d = first;
    for (i, &len) in legs.iter().enumerate() {
        if i > 0 {
            d = turn(d);
        }
        for _ in 0..len {
            at = d.step(at);
            path.push((at, d));
        }
    }
    path
}

/// Lays out every component on its own rows.
///
/// With `closed_rings`, even rings are drawn as rectangles where space
/// allows; otherwise only spanning-tree bonds become lines.
pub(crate) fn layout(structure: &MolecularStructure, closed_rings: bool) -> Layout {
    let mut placer = Placer {
        structure,
        closed_rings,
        positions: vec![None; structure.atom_count()],
        occupied: BTreeMap::new(),
        tree: BTreeSet::new(),
    };
    for component in connected_components(structure) {
        placer.layout_component(component[0]);
    }

    let positions: Vec<Point> = placer.positions.iter().map(|p| p.unwrap_or_default()).collect();
    let lines = structure
        .bonds()
        .filter_map(|e| structure.bond_endpoints(e))
        .map(|(a, b)| key(a, b))
        .filter(|&(a, b)| {
            adjacent(positions[a.index()], positions[b.index()])
                && (closed_rings || placer.tree.contains(&(a, b)))
        })
        .collect();
    Layout { positions, lines }
}
