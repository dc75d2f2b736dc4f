use tracing::{debug, warn};

use crate::actor::{Actor, ActorId, ActorIdAllocator};
use crate::content::ActorFactory;
use crate::geometry::Vec2;
use crate::spatial::{ActorLookup, QuadTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecyclePhase {
    #[default]
    Idle,
    UpdatingActors,
}

/// Mutation surface handed to behaviours while the live list is being iterated.
/// Spawns and destroy requests are buffered until the pass ends.
pub struct UpdateContext<'a> {
    ids: &'a mut ActorIdAllocator,
    spawned: &'a mut Vec<Actor>,
    destroy_requests: &'a mut Vec<ActorId>,
    index: &'a mut QuadTree,
    factory: &'a dyn ActorFactory,
}

impl UpdateContext<'_> {
    /// The new actor joins the live list after the current pass and is not updated in it.
    pub fn spawn(&mut self, resource: &str, position: Vec2, elevation: f32) -> Option<ActorId> {
        let mut actor = build_actor(self.ids, self.factory, resource, position, elevation)?;
        self.index.insert(&mut actor);
        let id = actor.id;
        self.spawned.push(actor);
        Some(id)
    }

    pub fn destroy(&mut self, id: ActorId) {
        self.destroy_requests.push(id);
    }
}

/// Owns every actor. Ids are allocated in increasing order and both lists keep insertion
/// order, so each list stays sorted by id.
#[derive(Debug, Default)]
pub struct ActorLifecycle {
    ids: ActorIdAllocator,
    live: Vec<Actor>,
    pending_spawns: Vec<Actor>,
    destroy_requests: Vec<ActorId>,
    phase: LifecyclePhase,
}

impl ActorLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending_spawns.len()
    }

    pub fn actors(&self) -> &[Actor] {
        &self.live
    }

    pub fn actors_mut(&mut self) -> impl Iterator<Item = &mut Actor> {
        self.live.iter_mut()
    }

    /// Builds the actor through the factory. A failed load consumes no id and registers nothing.
    pub fn spawn(
        &mut self,
        factory: &dyn ActorFactory,
        index: &mut QuadTree,
        resource: &str,
        position: Vec2,
        elevation: f32,
    ) -> Option<ActorId> {
        let mut actor = build_actor(&mut self.ids, factory, resource, position, elevation)?;
        index.insert(&mut actor);
        let id = actor.id;
        match self.phase {
            LifecyclePhase::Idle => self.live.push(actor),
            LifecyclePhase::UpdatingActors => self.pending_spawns.push(actor),
        }
        Some(id)
    }

    /// Flags a live or pending actor; removal happens at the next finalize.
    pub fn destroy(&mut self, id: ActorId) -> bool {
        match self.actor_mut(id) {
            Some(actor) => {
                actor.destroy();
                true
            }
            None => false,
        }
    }

    pub fn destroy_all(&mut self, index: &mut QuadTree) {
        let removed = self.live.len() + self.pending_spawns.len();
        for actor in self.live.iter_mut().chain(self.pending_spawns.iter_mut()) {
            index.remove(actor);
        }
        self.live.clear();
        self.pending_spawns.clear();
        self.destroy_requests.clear();
        debug!(removed, "actors_cleared");
    }

    pub fn begin_update(&mut self) {
        self.phase = LifecyclePhase::UpdatingActors;
    }

    /// Runs every live actor's behaviour in list order.
    pub fn run_updates(&mut self, dt_seconds: f32, factory: &dyn ActorFactory, index: &mut QuadTree) {
        let Self {
            ids,
            live,
            pending_spawns,
            destroy_requests,
            ..
        } = self;
        let mut ctx = UpdateContext {
            ids,
            spawned: pending_spawns,
            destroy_requests,
            index,
            factory,
        };
        for actor in live.iter_mut() {
            actor.run_behavior(dt_seconds, &mut ctx);
        }
    }

    /// Merges buffered spawns, evicts destroyed actors and returns to idle.
    pub fn end_update(&mut self, index: &mut QuadTree) -> usize {
        let merged = self.pending_spawns.len();
        self.live.append(&mut self.pending_spawns);
        let destroyed = self.finalize_destructions(index);
        self.phase = LifecyclePhase::Idle;
        if merged > 0 || destroyed > 0 {
            debug!(merged, destroyed, live = self.live.len(), "actor_lists_updated");
        }
        destroyed
    }

    pub fn update(&mut self, dt_seconds: f32, factory: &dyn ActorFactory, index: &mut QuadTree) {
        self.begin_update();
        self.run_updates(dt_seconds, factory, index);
        self.end_update(index);
    }

    /// Applies buffered destroy requests, then drops every flagged live actor after taking it
    /// out of the index. Returns the number of actors removed.
    pub fn finalize_destructions(&mut self, index: &mut QuadTree) -> usize {
        let requests = std::mem::take(&mut self.destroy_requests);
        for id in requests {
            self.destroy(id);
        }

        if !self.live.iter().any(Actor::is_pending_destroy) {
            return 0;
        }
        let (doomed, retained): (Vec<Actor>, Vec<Actor>) = std::mem::take(&mut self.live)
            .into_iter()
            .partition(Actor::is_pending_destroy);
        self.live = retained;

        let destroyed = doomed.len();
        for mut actor in doomed {
            index.remove(&mut actor);
        }
        destroyed
    }

    fn position_in(list: &[Actor], id: ActorId) -> Option<usize> {
        list.binary_search_by_key(&id, |actor| actor.id).ok()
    }
}

impl ActorLookup for ActorLifecycle {
    fn actor(&self, id: ActorId) -> Option<&Actor> {
        if let Some(index) = Self::position_in(&self.live, id) {
            return Some(&self.live[index]);
        }
        Self::position_in(&self.pending_spawns, id).map(|index| &self.pending_spawns[index])
    }

    fn actor_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        if let Some(index) = Self::position_in(&self.live, id) {
            return Some(&mut self.live[index]);
        }
        Self::position_in(&self.pending_spawns, id).map(|index| &mut self.pending_spawns[index])
    }
}

fn build_actor(
    ids: &mut ActorIdAllocator,
    factory: &dyn ActorFactory,
    resource: &str,
    position: Vec2,
    elevation: f32,
) -> Option<Actor> {
    let mut actor = Actor::unregistered(resource, position, elevation);
    if let Err(error) = factory.populate(resource, &mut actor) {
        warn!(resource, error = %error, "actor_spawn_failed");
        return None;
    }
    actor.id = ids.allocate();
    Some(actor)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::actor::ActorBehavior;
    use crate::content::{ActorLoadError, ActorLoadErrorCode};
    use crate::geometry::{BoundingBox, Rect};

    type Log = Rc<RefCell<Vec<ActorId>>>;

    struct Recorder {
        log: Log,
        spawn: Option<&'static str>,
        destroy: Option<ActorId>,
    }

    impl ActorBehavior for Recorder {
        fn update(&mut self, actor: &mut Actor, _dt_seconds: f32, ctx: &mut UpdateContext<'_>) {
            self.log.borrow_mut().push(actor.id());
            if let Some(resource) = self.spawn.take() {
                ctx.spawn(resource, actor.position(), 0.0);
            }
            if let Some(target) = self.destroy.take() {
                ctx.destroy(target);
            }
        }
    }

    /// Spawns a child and immediately asks for its removal in the same pass.
    struct SpawnAndCull {
        resource: &'static str,
        culled: Rc<RefCell<Option<ActorId>>>,
    }

    impl ActorBehavior for SpawnAndCull {
        fn update(&mut self, actor: &mut Actor, _dt_seconds: f32, ctx: &mut UpdateContext<'_>) {
            if let Some(child) = ctx.spawn(self.resource, actor.position(), 0.0) {
                ctx.destroy(child);
                *self.culled.borrow_mut() = Some(child);
            }
        }
    }

    struct TestFactory {
        log: Log,
    }

    impl ActorFactory for TestFactory {
        fn populate(&self, resource: &str, actor: &mut Actor) -> Result<(), ActorLoadError> {
            match resource {
                "missing.xml" => Err(ActorLoadError::new(
                    ActorLoadErrorCode::ReadFile,
                    "not found",
                    resource,
                )),
                _ => {
                    actor.add_bounding_box(BoundingBox {
                        offset: Vec2::ZERO,
                        width: 0.5,
                        height: 0.5,
                    });
                    let spawn = (resource == "spawner.xml").then_some("plain.xml");
                    actor.set_behavior(Box::new(Recorder {
                        log: Rc::clone(&self.log),
                        spawn,
                        destroy: None,
                    }));
                    Ok(())
                }
            }
        }
    }

    fn fixture() -> (ActorLifecycle, TestFactory, QuadTree, Log) {
        let log: Log = Rc::default();
        let factory = TestFactory {
            log: Rc::clone(&log),
        };
        let index = QuadTree::new(Rect::new(-0.5, -0.5, 32.0, 32.0), 4);
        (ActorLifecycle::new(), factory, index, log)
    }

    #[test]
    fn failed_spawn_consumes_no_id() {
        let (mut lifecycle, factory, mut index, _) = fixture();
        let none = lifecycle.spawn(&factory, &mut index, "missing.xml", Vec2::ZERO, 0.0);
        assert!(none.is_none());
        assert!(lifecycle.is_empty());
        assert!(index.is_empty());

        let id = lifecycle
            .spawn(&factory, &mut index, "plain.xml", Vec2::ZERO, 0.0)
            .expect("spawn");
        assert_eq!(id, ActorId(0));
    }

    #[test]
    fn idle_spawn_is_live_and_indexed() {
        let (mut lifecycle, factory, mut index, _) = fixture();
        let id = lifecycle
            .spawn(&factory, &mut index, "plain.xml", Vec2::new(2.0, 2.0), 0.0)
            .expect("spawn");
        assert_eq!(lifecycle.len(), 1);
        let actor = lifecycle.actor(id).expect("actor");
        assert!(index.contains(actor));
    }

    #[test]
    fn spawn_during_update_is_deferred_and_not_updated() {
        let (mut lifecycle, factory, mut index, log) = fixture();
        let spawner = lifecycle
            .spawn(&factory, &mut index, "spawner.xml", Vec2::new(1.0, 1.0), 0.0)
            .expect("spawn");

        lifecycle.begin_update();
        lifecycle.run_updates(0.016, &factory, &mut index);
        assert_eq!(lifecycle.len(), 1);
        assert_eq!(lifecycle.pending_len(), 1);
        assert_eq!(lifecycle.phase(), LifecyclePhase::UpdatingActors);
        lifecycle.end_update(&mut index);

        assert_eq!(lifecycle.phase(), LifecyclePhase::Idle);
        assert_eq!(lifecycle.len(), 2);
        assert_eq!(*log.borrow(), vec![spawner]);

        lifecycle.update(0.016, &factory, &mut index);
        assert_eq!(log.borrow().len(), 3);
    }

    #[test]
    fn spawn_while_updating_goes_to_pending_list() {
        let (mut lifecycle, factory, mut index, _) = fixture();
        lifecycle.begin_update();
        let id = lifecycle
            .spawn(&factory, &mut index, "plain.xml", Vec2::ZERO, 0.0)
            .expect("spawn");
        assert!(lifecycle.actors().is_empty());
        assert!(lifecycle.actor(id).is_some());
        lifecycle.end_update(&mut index);
        assert_eq!(lifecycle.actors()[0].id(), id);
    }

    #[test]
    fn updates_run_in_list_order() {
        let (mut lifecycle, factory, mut index, log) = fixture();
        let ids: Vec<ActorId> = (0..4)
            .map(|i| {
                lifecycle
                    .spawn(&factory, &mut index, "plain.xml", Vec2::new(i as f32, 0.0), 0.0)
                    .expect("spawn")
            })
            .collect();
        lifecycle.update(0.016, &factory, &mut index);
        assert_eq!(*log.borrow(), ids);
    }

    #[test]
    fn finalize_removes_flagged_actors_from_index_and_list() {
        let (mut lifecycle, factory, mut index, _) = fixture();
        let keep = lifecycle
            .spawn(&factory, &mut index, "plain.xml", Vec2::new(1.0, 1.0), 0.0)
            .expect("spawn");
        let doomed = lifecycle
            .spawn(&factory, &mut index, "plain.xml", Vec2::new(3.0, 3.0), 0.0)
            .expect("spawn");

        assert!(lifecycle.destroy(doomed));
        assert_eq!(lifecycle.len(), 2);
        assert_eq!(lifecycle.finalize_destructions(&mut index), 1);

        assert!(lifecycle.actor(doomed).is_none());
        assert!(lifecycle.actor(keep).is_some());
        assert_eq!(index.collect_all(), vec![keep]);
        assert!(!lifecycle.destroy(doomed));
    }

    #[test]
    fn behaviour_destroy_request_applies_after_pass() {
        let (mut lifecycle, factory, mut index, log) = fixture();
        let victim = lifecycle
            .spawn(&factory, &mut index, "plain.xml", Vec2::new(5.0, 5.0), 0.0)
            .expect("spawn");
        let killer = lifecycle
            .spawn(&factory, &mut index, "plain.xml", Vec2::new(1.0, 1.0), 0.0)
            .expect("spawn");
        lifecycle
            .actor_mut(killer)
            .expect("killer")
            .set_behavior(Box::new(Recorder {
                log: Rc::clone(&log),
                spawn: None,
                destroy: Some(victim),
            }));

        lifecycle.update(0.016, &factory, &mut index);
        assert_eq!(*log.borrow(), vec![victim, killer]);
        assert!(lifecycle.actor(victim).is_none());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn actor_spawned_and_destroyed_in_one_pass_is_merged_then_removed() {
        let (mut lifecycle, factory, mut index, _) = fixture();
        let parent = lifecycle
            .spawn(&factory, &mut index, "plain.xml", Vec2::new(2.0, 2.0), 0.0)
            .expect("spawn");
        let culled = Rc::new(RefCell::new(None));
        lifecycle
            .actor_mut(parent)
            .expect("parent")
            .set_behavior(Box::new(SpawnAndCull {
                resource: "plain.xml",
                culled: Rc::clone(&culled),
            }));

        lifecycle.update(0.016, &factory, &mut index);

        let child = (*culled.borrow()).expect("child spawned");
        assert_eq!(lifecycle.len(), 1);
        assert_eq!(lifecycle.pending_len(), 0);
        assert!(lifecycle.actor(child).is_none());
        assert_eq!(index.len(), 1);
        assert_eq!(index.collect_all(), vec![parent]);
    }

    #[test]
    fn destroy_all_empties_index_and_lists() {
        let (mut lifecycle, factory, mut index, _) = fixture();
        for i in 0..6 {
            lifecycle.spawn(&factory, &mut index, "plain.xml", Vec2::new(i as f32, 2.0), 0.0);
        }
        lifecycle.destroy_all(&mut index);
        assert!(lifecycle.is_empty());
        assert!(index.is_empty());
    }
}
