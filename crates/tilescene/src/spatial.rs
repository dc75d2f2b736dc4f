//! Quadtree residency index over the scene bounds.
//!
//! Cells live in a flat arena addressed by [`CellId`]. Cells are never freed, so a handle stays
//! valid for the lifetime of the tree. Subdivision only pushes residents down into descendants,
//! which means an actor's recorded handle always names its cell or one of that cell's ancestors.
//!
//! Footprints are snapshots taken on insert and on [`QuadTree::refresh`]; queries reflect the
//! state of the last synchronization point.

use tracing::debug;

use crate::actor::{Actor, ActorId};
use crate::geometry::{Rect, Vec2};

pub const MAX_CELL_DEPTH: u32 = 8;
const MIN_CELL_EXTENT: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellId(usize);

impl CellId {
    pub const ROOT: CellId = CellId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// Id-based access to actors owned elsewhere.
pub trait ActorLookup {
    fn actor(&self, id: ActorId) -> Option<&Actor>;
    fn actor_mut(&mut self, id: ActorId) -> Option<&mut Actor>;
}

#[derive(Debug, Clone, Copy)]
struct Resident {
    id: ActorId,
    footprint: Rect,
}

#[derive(Debug, Clone)]
struct Cell {
    bounds: Rect,
    parent: Option<CellId>,
    children: Option<[CellId; 4]>,
    residents: Vec<Resident>,
    max_actors: usize,
    depth: u32,
}

impl Cell {
    fn new(bounds: Rect, parent: Option<CellId>, max_actors: usize, depth: u32) -> Self {
        Self {
            bounds,
            parent,
            children: None,
            residents: Vec::new(),
            max_actors,
            depth,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuadTree {
    cells: Vec<Cell>,
}

impl QuadTree {
    pub fn new(bounds: Rect, max_actors_per_cell: usize) -> Self {
        Self {
            cells: vec![Cell::new(bounds, None, max_actors_per_cell.max(1), 0)],
        }
    }

    pub fn bounds(&self) -> Rect {
        self.cells[CellId::ROOT.0].bounds
    }

    pub fn max_occupancy(&self) -> usize {
        self.cells[CellId::ROOT.0].max_actors
    }

    /// Sets the subdivision threshold on the root, and on every existing cell when `propagate`.
    pub fn set_max_occupancy(&mut self, max_actors: usize, propagate: bool) {
        let max_actors = max_actors.max(1);
        if propagate {
            for cell in &mut self.cells {
                cell.max_actors = max_actors;
            }
        } else {
            self.cells[CellId::ROOT.0].max_actors = max_actors;
        }
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn len(&self) -> usize {
        self.cells.iter().map(|cell| cell.residents.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|cell| cell.residents.is_empty())
    }

    pub fn cell_bounds(&self, cell: CellId) -> Option<Rect> {
        self.cells.get(cell.0).map(|cell| cell.bounds)
    }

    pub fn contains(&self, actor: &Actor) -> bool {
        actor
            .cell
            .and_then(|hint| self.locate(actor.id, hint))
            .is_some()
    }

    /// Places the actor in the deepest cell that fully contains its footprint. Footprints that
    /// leave the root bounds stay in the root.
    pub fn insert(&mut self, actor: &mut Actor) -> CellId {
        if actor.cell.is_some() {
            self.remove(actor);
        }
        let footprint = actor.footprint();
        let cell = self.target_cell(&footprint);
        self.cells[cell.0].residents.push(Resident {
            id: actor.id,
            footprint,
        });
        actor.cell = Some(cell);
        self.split_if_crowded(cell);
        cell
    }

    /// Returns `false` when the actor is not resident anywhere.
    pub fn remove(&mut self, actor: &mut Actor) -> bool {
        let Some(hint) = actor.cell.take() else {
            return false;
        };
        let Some(cell) = self.locate(actor.id, hint) else {
            return false;
        };
        let residents = &mut self.cells[cell.0].residents;
        match residents.iter().position(|resident| resident.id == actor.id) {
            Some(index) => {
                residents.remove(index);
                true
            }
            None => false,
        }
    }

    /// Depth-first list of every resident actor.
    pub fn collect_all(&self) -> Vec<ActorId> {
        let mut out = Vec::with_capacity(self.len());
        let mut stack = vec![CellId::ROOT];
        while let Some(cell_id) = stack.pop() {
            let cell = &self.cells[cell_id.0];
            out.extend(cell.residents.iter().map(|resident| resident.id));
            if let Some(children) = cell.children {
                stack.extend(children.iter().rev());
            }
        }
        out
    }

    /// Every actor whose bounding boxes the segment touches, nearest first.
    pub fn raycast<L: ActorLookup + ?Sized>(
        &self,
        origin: Vec2,
        end: Vec2,
        ignore: &[ActorId],
        actors: &L,
    ) -> Vec<ActorId> {
        let delta = end - origin;
        let mut hits = Vec::<(f32, ActorId)>::new();
        let mut stack = vec![CellId::ROOT];

        while let Some(cell_id) = stack.pop() {
            let cell = &self.cells[cell_id.0];
            // Root is always searched: out-of-bounds footprints are kept there.
            if cell_id != CellId::ROOT && cell.bounds.segment_entry(origin, delta).is_none() {
                continue;
            }
            for resident in &cell.residents {
                if ignore.contains(&resident.id) {
                    continue;
                }
                let Some(actor) = actors.actor(resident.id) else {
                    continue;
                };
                let nearest = actor
                    .world_bounding_boxes()
                    .filter_map(|rect| rect.segment_entry(origin, delta))
                    .reduce(f32::min);
                if let Some(t) = nearest {
                    hits.push((t, resident.id));
                }
            }
            if let Some(children) = cell.children {
                stack.extend(children);
            }
        }

        hits.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        hits.into_iter().map(|(_, id)| id).collect()
    }

    pub fn raycast_first_hit<L: ActorLookup + ?Sized>(
        &self,
        origin: Vec2,
        end: Vec2,
        ignore: &[ActorId],
        actors: &L,
    ) -> Option<ActorId> {
        self.raycast(origin, end, ignore, actors).into_iter().next()
    }

    /// Re-reads every resident's footprint and moves actors whose best cell changed.
    /// Residents whose actor no longer exists are dropped. Returns the number of moves.
    pub fn refresh<L: ActorLookup + ?Sized>(&mut self, actors: &mut L) -> usize {
        let mut moved = 0;
        for cell_index in 0..self.cells.len() {
            let residents = std::mem::take(&mut self.cells[cell_index].residents);
            let mut kept = Vec::with_capacity(residents.len());
            let mut relocated = Vec::new();

            for mut resident in residents {
                let Some(actor) = actors.actor_mut(resident.id) else {
                    continue;
                };
                let footprint = actor.footprint();
                let target = self.target_cell(&footprint);
                resident.footprint = footprint;
                actor.cell = Some(target);
                if target.0 == cell_index {
                    kept.push(resident);
                } else {
                    relocated.push((target, resident));
                }
            }

            self.cells[cell_index].residents = kept;
            for (target, resident) in relocated {
                self.cells[target.0].residents.push(resident);
                moved += 1;
            }
        }

        for cell_index in 0..self.cells.len() {
            self.split_if_crowded(CellId(cell_index));
        }
        moved
    }

    /// Pushes overlapping actors apart along their axis of least penetration, each moving half
    /// the distance. Pairs are checked inside a cell and against residents of ancestor cells.
    /// Returns the number of separated pairs.
    pub fn resolve_collisions<L: ActorLookup + ?Sized>(&mut self, actors: &mut L) -> usize {
        self.refresh(actors);

        let mut separated = 0;
        for cell_index in 0..self.cells.len() {
            let local: Vec<ActorId> = self.cells[cell_index]
                .residents
                .iter()
                .map(|resident| resident.id)
                .collect();
            if local.is_empty() {
                continue;
            }

            let mut ancestors = Vec::new();
            let mut parent = self.cells[cell_index].parent;
            while let Some(parent_id) = parent {
                let cell = &self.cells[parent_id.0];
                ancestors.extend(cell.residents.iter().map(|resident| resident.id));
                parent = cell.parent;
            }

            for (i, &a) in local.iter().enumerate() {
                for &b in local[i + 1..].iter().chain(ancestors.iter()) {
                    if separate_pair(actors, a, b) {
                        separated += 1;
                    }
                }
            }
        }

        self.refresh(actors);
        separated
    }

    /// Resident actors sorted back-to-front by `depth`, ties broken by id.
    pub fn render_order(&self, depth: impl Fn(ActorId) -> Option<f32>) -> Vec<ActorId> {
        let mut keyed: Vec<(f32, ActorId)> = self
            .collect_all()
            .into_iter()
            .filter_map(|id| depth(id).map(|key| (key, id)))
            .collect();
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        keyed.into_iter().map(|(_, id)| id).collect()
    }

    fn target_cell(&self, footprint: &Rect) -> CellId {
        let mut current = CellId::ROOT;
        while let Some(children) = self.cells[current.0].children {
            match children
                .iter()
                .copied()
                .find(|child| self.cells[child.0].bounds.contains_rect(footprint))
            {
                Some(child) => current = child,
                None => break,
            }
        }
        current
    }

    fn locate(&self, id: ActorId, hint: CellId) -> Option<CellId> {
        if hint.0 >= self.cells.len() {
            return None;
        }
        let mut stack = vec![hint];
        while let Some(cell_id) = stack.pop() {
            let cell = &self.cells[cell_id.0];
            if cell.residents.iter().any(|resident| resident.id == id) {
                return Some(cell_id);
            }
            if let Some(children) = cell.children {
                stack.extend(children);
            }
        }
        None
    }

    fn split_if_crowded(&mut self, cell_id: CellId) {
        let cell = &self.cells[cell_id.0];
        if cell.children.is_some()
            || cell.residents.len() <= cell.max_actors
            || cell.depth >= MAX_CELL_DEPTH
            || cell.bounds.width * 0.5 < MIN_CELL_EXTENT
            || cell.bounds.height * 0.5 < MIN_CELL_EXTENT
        {
            return;
        }

        let bounds = cell.bounds;
        let max_actors = cell.max_actors;
        let depth = cell.depth + 1;
        let half_w = bounds.width * 0.5;
        let half_h = bounds.height * 0.5;
        let quadrants = [
            Rect::new(bounds.x, bounds.y, half_w, half_h),
            Rect::new(bounds.x + half_w, bounds.y, half_w, half_h),
            Rect::new(bounds.x, bounds.y + half_h, half_w, half_h),
            Rect::new(bounds.x + half_w, bounds.y + half_h, half_w, half_h),
        ];

        let first = self.cells.len();
        for quadrant in quadrants {
            self.cells
                .push(Cell::new(quadrant, Some(cell_id), max_actors, depth));
        }
        let children = [
            CellId(first),
            CellId(first + 1),
            CellId(first + 2),
            CellId(first + 3),
        ];
        self.cells[cell_id.0].children = Some(children);

        let residents = std::mem::take(&mut self.cells[cell_id.0].residents);
        let mut kept = Vec::new();
        for resident in residents {
            match children
                .iter()
                .copied()
                .find(|child| self.cells[child.0].bounds.contains_rect(&resident.footprint))
            {
                Some(child) => self.cells[child.0].residents.push(resident),
                None => kept.push(resident),
            }
        }
        self.cells[cell_id.0].residents = kept;
        debug!(
            cell = cell_id.0,
            depth,
            cell_count = self.cells.len(),
            "spatial_cell_subdivided"
        );

        for child in children {
            self.split_if_crowded(child);
        }
    }
}

fn separate_pair<L: ActorLookup + ?Sized>(actors: &mut L, a: ActorId, b: ActorId) -> bool {
    let (Some(actor_a), Some(actor_b)) = (actors.actor(a), actors.actor(b)) else {
        return false;
    };

    let mut push = None;
    'boxes: for rect_a in actor_a.world_bounding_boxes() {
        for rect_b in actor_b.world_bounding_boxes() {
            if !rect_a.intersects(&rect_b) {
                continue;
            }
            let overlap_x = rect_a.right().min(rect_b.right()) - rect_a.left().max(rect_b.left());
            let overlap_y = rect_a.bottom().min(rect_b.bottom()) - rect_a.top().max(rect_b.top());
            let delta = rect_a.centre() - rect_b.centre();
            push = Some(if overlap_x < overlap_y {
                let sign = if delta.x < 0.0 { -1.0 } else { 1.0 };
                Vec2::new(overlap_x * sign, 0.0)
            } else {
                let sign = if delta.y < 0.0 { -1.0 } else { 1.0 };
                Vec2::new(0.0, overlap_y * sign)
            });
            break 'boxes;
        }
    }

    let Some(push) = push else {
        return false;
    };
    let half = push * 0.5;
    if let Some(actor) = actors.actor_mut(a) {
        let position = actor.position();
        actor.set_position(position + half);
    }
    if let Some(actor) = actors.actor_mut(b) {
        let position = actor.position();
        actor.set_position(position - half);
    }
    true
}
