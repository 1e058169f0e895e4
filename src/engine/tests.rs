use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use proptest::prelude::*;

use super::*;
use crate::roster::{RosterRejection, ReservationRejection, check_roster};
use crate::store::{MemoryRunStore, StoreError, Version, VersionedRoster};
use crate::test_utils::{Fixture, arb_class, at, boosted_with, seat, test_settings};
use crate::types::CharacterClass::{self, *};

async fn roster(fixture: &Fixture, run_id: &RunId) -> VersionedRoster {
    fixture.store.load_roster(run_id).await.unwrap().unwrap()
}

/// Creates a run whose creator sits as a boosted participant, so every
/// carrier seat is still free.
async fn open_run(fixture: &Fixture) -> RunId {
    let creator = fixture.character("creator", Mage).await;
    fixture
        .engine
        .create_run(
            &creator.owner,
            at(2024, 6, 14),
            seat(&creator, Role::Boosted, false),
        )
        .await
        .unwrap()
        .id
}

async fn seat_carriers(fixture: &Fixture, run_id: &RunId, classes: &[CharacterClass]) {
    for (i, class) in classes.iter().enumerate() {
        let character = fixture.character(&format!("carrier-{i}"), *class).await;
        fixture
            .engine
            .join_run(run_id, &character.owner, seat(&character, Role::Carrier, false))
            .await
            .unwrap();
    }
}

// ─── Scenarios ───

#[tokio::test]
async fn first_carrier_can_lead() {
    let fixture = Fixture::new();
    let run_id = open_run(&fixture).await;
    let a = fixture.character("a", Warrior).await;

    let outcome = fixture
        .engine
        .join_run(&run_id, &a.owner, seat(&a, Role::Carrier, true))
        .await
        .unwrap();

    assert!(outcome.participant.is_leader);
    let current = roster(&fixture, &run_id).await;
    assert_eq!(current.roster.run.leader, Some(outcome.participant.id));
}

#[tokio::test]
async fn sixth_carrier_is_rejected_without_writing() {
    let fixture = Fixture::new();
    let run_id = open_run(&fixture).await;
    seat_carriers(&fixture, &run_id, &[Priest, Shaman, Warrior, Rogue, Hunter]).await;
    let before = roster(&fixture, &run_id).await;

    let b = fixture.character("b", Priest).await;
    let err = fixture
        .engine
        .join_run(&run_id, &b.owner, seat(&b, Role::Carrier, false))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::Roster(RosterRejection::RoleFull {
            role: Role::Carrier,
            max: 5
        })
    ));
    assert_eq!(roster(&fixture, &run_id).await, before);
}

#[tokio::test]
async fn quota_blocks_fourth_non_support_carrier() {
    let fixture = Fixture::new();
    let run_id = open_run(&fixture).await;
    seat_carriers(&fixture, &run_id, &[Warrior, Rogue, Mage]).await;

    let c = fixture.character("c", Warlock).await;
    let err = fixture
        .engine
        .join_run(&run_id, &c.owner, seat(&c, Role::Carrier, false))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SupportQuotaUnmet);
}

#[tokio::test]
async fn quota_met_admits_non_support_carrier() {
    let fixture = Fixture::new();
    let run_id = open_run(&fixture).await;
    seat_carriers(&fixture, &run_id, &[Priest, Shaman, Warrior]).await;

    let d = fixture.character("d", Rogue).await;
    fixture
        .engine
        .join_run(&run_id, &d.owner, seat(&d, Role::Carrier, false))
        .await
        .unwrap();
    assert_eq!(roster(&fixture, &run_id).await.roster.count(Role::Carrier), 4);
}

#[tokio::test]
async fn boosted_reservations_come_and_go_with_the_seat() {
    let fixture = Fixture::new();
    let run_id = open_run(&fixture).await;
    let sulfuras = fixture.item("Sulfuras").await;
    let atiesh = fixture.item("Atiesh").await;
    let e = fixture.character("e", Druid).await;

    let outcome = fixture
        .engine
        .join_run(&run_id, &e.owner, boosted_with(&e, &[&sulfuras, &atiesh]))
        .await
        .unwrap();
    assert_eq!(outcome.reservations.len(), 2);
    assert_eq!(outcome.reservations[0].item, sulfuras);
    assert_eq!(roster(&fixture, &run_id).await.roster.claims.len(), 2);

    fixture.engine.leave_run(&run_id, &e.owner).await.unwrap();
    let after = roster(&fixture, &run_id).await;
    assert!(after.roster.claims.is_empty());
    assert!(after.roster.member(&e.owner).is_none());
}

#[tokio::test]
async fn carrier_with_items_is_rejected_without_writing() {
    let fixture = Fixture::new();
    let run_id = open_run(&fixture).await;
    let item = fixture.item("Thunderfury").await;
    let f = fixture.character("f", Paladin).await;
    let before = roster(&fixture, &run_id).await;

    let request = JoinRequest {
        item_ids: vec![item.id.clone()],
        ..seat(&f, Role::Carrier, false)
    };
    let err = fixture
        .engine
        .join_run(&run_id, &f.owner, request)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::Reservation(ReservationRejection::ReservationsNotAllowedForCarrier)
    ));
    assert_eq!(roster(&fixture, &run_id).await, before);
}

// ─── Lookups and ordering of checks ───

#[tokio::test]
async fn missing_run_and_foreign_character() {
    let fixture = Fixture::new();
    let a = fixture.character("a", Priest).await;

    let err = fixture
        .engine
        .join_run(&RunId::new("nope"), &a.owner, seat(&a, Role::Carrier, false))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RunNotFound);

    let run_id = open_run(&fixture).await;
    let intruder = ActorId::new("intruder");
    let err = fixture
        .engine
        .join_run(&run_id, &intruder, seat(&a, Role::Carrier, false))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CharacterNotFound);
}

#[tokio::test]
async fn unknown_item_names_first_missing_id() {
    let fixture = Fixture::new();
    let run_id = open_run(&fixture).await;
    let real = fixture.item("Atiesh").await;
    let e = fixture.character("e", Mage).await;

    let request = JoinRequest {
        item_ids: vec![real.id.clone(), ItemId::new("ghost-1"), ItemId::new("ghost-2")],
        ..seat(&e, Role::Boosted, false)
    };
    let err = fixture
        .engine
        .join_run(&run_id, &e.owner, request)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Reservation(ReservationRejection::ItemNotFound(ref id))
            if id.as_str() == "ghost-1"
    ));
    assert!(roster(&fixture, &run_id).await.roster.member(&e.owner).is_none());
}

#[tokio::test]
async fn duplicate_item_ids_reserve_once() {
    let fixture = Fixture::new();
    let run_id = open_run(&fixture).await;
    let item = fixture.item("Warglaives").await;
    let e = fixture.character("e", Hunter).await;

    let outcome = fixture
        .engine
        .join_run(&run_id, &e.owner, boosted_with(&e, &[&item, &item]))
        .await
        .unwrap();
    assert_eq!(outcome.reservations.len(), 1);
}

#[tokio::test]
async fn two_actors_may_reserve_the_same_item() {
    let fixture = Fixture::new();
    let run_id = open_run(&fixture).await;
    let item = fixture.item("Val'anyr").await;
    for actor in ["x", "y"] {
        let character = fixture.character(actor, Rogue).await;
        fixture
            .engine
            .join_run(&run_id, &character.owner, boosted_with(&character, &[&item]))
            .await
            .unwrap();
    }
    assert_eq!(roster(&fixture, &run_id).await.roster.claims.len(), 2);
}

#[tokio::test]
async fn rejoining_is_already_member() {
    let fixture = Fixture::new();
    let run_id = open_run(&fixture).await;
    let a = fixture.character("a", Shaman).await;
    fixture
        .engine
        .join_run(&run_id, &a.owner, seat(&a, Role::Carrier, false))
        .await
        .unwrap();

    let err = fixture
        .engine
        .join_run(&run_id, &a.owner, seat(&a, Role::Boosted, false))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyMember);
}

// ─── Creation ───

#[tokio::test]
async fn create_run_seats_creator_with_reservations() {
    let fixture = Fixture::new();
    let item = fixture.item("Sulfuras").await;
    let creator = fixture.character("creator", Warlock).await;

    let view = fixture
        .engine
        .create_run(&creator.owner, at(2024, 7, 1), boosted_with(&creator, &[&item]))
        .await
        .unwrap();

    assert_eq!(view.activity, DEFAULT_ACTIVITY);
    assert_eq!(view.created_by, creator.owner);
    assert_eq!(view.participants.len(), 1);
    assert_eq!(view.reservations.len(), 1);
    assert_eq!(view.leader_id, None);
    assert_eq!(fixture.engine.get_run(&view.id).await.unwrap(), view);
}

#[tokio::test]
async fn create_run_as_leader_sets_leader() {
    let fixture = Fixture::new();
    let creator = fixture.character("creator", Priest).await;

    let view = fixture
        .engine
        .create_run(&creator.owner, at(2024, 7, 1), seat(&creator, Role::Carrier, true))
        .await
        .unwrap();
    assert_eq!(view.leader_id, Some(view.participants[0].id.clone()));
}

#[tokio::test]
async fn failed_creation_writes_nothing() {
    let fixture = Fixture::new();
    let creator = fixture.character("creator", Mage).await;

    let request = JoinRequest {
        item_ids: vec![ItemId::new("missing")],
        ..seat(&creator, Role::Boosted, false)
    };
    let err = fixture
        .engine
        .create_run(&creator.owner, at(2024, 7, 1), request)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ItemNotFound);

    let err = fixture
        .engine
        .create_run(&creator.owner, at(2024, 7, 1), seat(&creator, Role::Boosted, true))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LeaderMustBeCarrier);

    assert!(fixture.engine.list_runs(None).await.unwrap().is_empty());
}

// ─── Leave and delete ───

#[tokio::test]
async fn leader_leaving_clears_leader_only() {
    let fixture = Fixture::new();
    let run_id = open_run(&fixture).await;
    let lead = fixture.character("lead", Priest).await;
    let other = fixture.character("other", Shaman).await;
    fixture
        .engine
        .join_run(&run_id, &lead.owner, seat(&lead, Role::Carrier, true))
        .await
        .unwrap();
    fixture
        .engine
        .join_run(&run_id, &other.owner, seat(&other, Role::Carrier, false))
        .await
        .unwrap();

    fixture.engine.leave_run(&run_id, &other.owner).await.unwrap();
    assert!(roster(&fixture, &run_id).await.roster.run.leader.is_some());

    fixture.engine.leave_run(&run_id, &lead.owner).await.unwrap();
    let after = roster(&fixture, &run_id).await;
    assert_eq!(after.roster.run.leader, None);
    assert!(after.roster.members.iter().all(|m| !m.is_leader()));

    // The seat is free for a new leader.
    fixture
        .engine
        .join_run(&run_id, &other.owner, seat(&other, Role::Carrier, true))
        .await
        .unwrap();
}

#[tokio::test]
async fn leave_by_non_member() {
    let fixture = Fixture::new();
    let run_id = open_run(&fixture).await;

    let err = fixture
        .engine
        .leave_run(&run_id, &ActorId::new("stranger"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAMember);

    let err = fixture
        .engine
        .leave_run(&RunId::new("nope"), &ActorId::new("stranger"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RunNotFound);
}

#[tokio::test]
async fn leave_keeps_other_reservations() {
    let fixture = Fixture::new();
    let run_id = open_run(&fixture).await;
    let item = fixture.item("Atiesh").await;
    let stays = fixture.character("stays", Rogue).await;
    let goes = fixture.character("goes", Mage).await;
    for c in [&stays, &goes] {
        fixture
            .engine
            .join_run(&run_id, &c.owner, boosted_with(c, &[&item]))
            .await
            .unwrap();
    }

    fixture.engine.leave_run(&run_id, &goes.owner).await.unwrap();
    let after = roster(&fixture, &run_id).await;
    assert_eq!(after.roster.claims.len(), 1);
    assert_eq!(after.roster.claims[0].reservation.actor_id, stays.owner);
}

#[tokio::test]
async fn only_creator_deletes() {
    let fixture = Fixture::new();
    let run_id = open_run(&fixture).await;
    let joiner = fixture.character("joiner", Priest).await;
    fixture
        .engine
        .join_run(&run_id, &joiner.owner, seat(&joiner, Role::Carrier, true))
        .await
        .unwrap();

    let err = fixture
        .engine
        .delete_run(&run_id, &joiner.owner)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotRunCreator);

    fixture
        .engine
        .delete_run(&run_id, &ActorId::new("creator"))
        .await
        .unwrap();
    assert_eq!(
        fixture.engine.get_run(&run_id).await.unwrap_err().kind(),
        ErrorKind::RunNotFound
    );
}

#[tokio::test]
async fn list_runs_by_month() {
    let fixture = Fixture::new();
    let c = fixture.character("c", Mage).await;
    for day in [(2024, 3, 28), (2024, 3, 2), (2024, 4, 1)] {
        fixture
            .engine
            .create_run(&c.owner, at(day.0, day.1, day.2), seat(&c, Role::Boosted, false))
            .await
            .unwrap();
    }

    let march = fixture
        .engine
        .list_runs(Some(at(2024, 3, 15)))
        .await
        .unwrap();
    let days: Vec<_> = march.iter().map(|r| r.scheduled_at).collect();
    assert_eq!(days, vec![at(2024, 3, 2), at(2024, 3, 28)]);
    assert_eq!(fixture.engine.list_runs(None).await.unwrap().len(), 3);
}

// ─── Catalog ───

#[tokio::test]
async fn catalog_rejects_blank_names_and_seeds_once() {
    let fixture = Fixture::new();
    let actor = ActorId::new("a");

    let err = fixture
        .engine
        .register_character(&actor, "   ", Priest)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    let err = fixture.engine.register_item("", 1, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    assert_eq!(fixture.engine.seed_catalog().await.unwrap(), 5);
    assert_eq!(fixture.engine.seed_catalog().await.unwrap(), 0);
    assert_eq!(fixture.engine.items().await.unwrap().len(), 5);
}

// ─── Concurrency ───

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_carrier_joins_never_overfill() {
    let fixture = Fixture::new();
    let run_id = open_run(&fixture).await;

    let mut characters = Vec::new();
    for i in 0..9 {
        characters.push(fixture.character(&format!("p{i}"), Priest).await);
    }

    let handles: Vec<_> = characters
        .into_iter()
        .map(|c| {
            let engine = fixture.engine.clone();
            let run_id = run_id.clone();
            tokio::spawn(async move {
                engine
                    .join_run(&run_id, &c.owner, seat(&c, Role::Carrier, false))
                    .await
            })
        })
        .collect();

    let mut admitted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::RoleFull),
        }
    }

    assert_eq!(admitted, 5);
    let current = roster(&fixture, &run_id).await;
    assert_eq!(current.roster.count(Role::Carrier), 5);
    assert!(check_roster(&current.roster).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_leaders_admit_exactly_one() {
    let fixture = Fixture::new();
    let run_id = open_run(&fixture).await;

    let mut characters = Vec::new();
    for i in 0..4 {
        characters.push(fixture.character(&format!("l{i}"), Shaman).await);
    }

    let handles: Vec<_> = characters
        .into_iter()
        .map(|c| {
            let engine = fixture.engine.clone();
            let run_id = run_id.clone();
            tokio::spawn(async move {
                engine
                    .join_run(&run_id, &c.owner, seat(&c, Role::Carrier, true))
                    .await
            })
        })
        .collect();

    let mut leaders = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => leaders += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::LeaderExists),
        }
    }
    assert_eq!(leaders, 1);
    assert!(roster(&fixture, &run_id).await.roster.run.leader.is_some());
}

/// Reports a conflict for the first `conflicts` commits, then delegates.
struct ConflictingStore {
    inner: Arc<MemoryRunStore>,
    conflicts: AtomicU32,
    commits: AtomicU32,
}

impl ConflictingStore {
    fn new(inner: Arc<MemoryRunStore>, conflicts: u32) -> Self {
        ConflictingStore {
            inner,
            conflicts: AtomicU32::new(conflicts),
            commits: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl RunStore for ConflictingStore {
    async fn load_roster(
        &self,
        run_id: &RunId,
    ) -> std::result::Result<Option<VersionedRoster>, StoreError> {
        self.inner.load_roster(run_id).await
    }

    async fn list_rosters(
        &self,
        window: Option<ScheduleWindow>,
    ) -> std::result::Result<Vec<Roster>, StoreError> {
        self.inner.list_rosters(window).await
    }

    async fn commit(&self, change: RosterChange) -> std::result::Result<Version, StoreError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Conflict {
                run_id: change.run_id().clone(),
                expected: change.expected().unwrap_or_default(),
                found: change.expected().unwrap_or_default() + 1,
            });
        }
        self.inner.commit(change).await
    }

    async fn character(
        &self,
        id: &CharacterId,
    ) -> std::result::Result<Option<Character>, StoreError> {
        self.inner.character(id).await
    }

    async fn characters_of(
        &self,
        owner: &ActorId,
    ) -> std::result::Result<Vec<Character>, StoreError> {
        self.inner.characters_of(owner).await
    }

    async fn register_character(
        &self,
        character: Character,
    ) -> std::result::Result<(), StoreError> {
        self.inner.register_character(character).await
    }

    async fn find_items(
        &self,
        ids: &[ItemId],
    ) -> std::result::Result<HashMap<ItemId, Item>, StoreError> {
        self.inner.find_items(ids).await
    }

    async fn items(&self) -> std::result::Result<Vec<Item>, StoreError> {
        self.inner.items().await
    }

    async fn register_item(&self, item: Item) -> std::result::Result<(), StoreError> {
        self.inner.register_item(item).await
    }
}

#[tokio::test]
async fn conflicts_are_retried_from_fresh_snapshot() {
    let fixture = Fixture::new();
    let run_id = open_run(&fixture).await;
    let a = fixture.character("a", Priest).await;

    let store = Arc::new(ConflictingStore::new(fixture.store.clone(), 2));
    let engine = RosterEngine::new(store.clone(), test_settings());
    engine
        .join_run(&run_id, &a.owner, seat(&a, Role::Carrier, false))
        .await
        .unwrap();

    assert_eq!(store.commits.load(Ordering::SeqCst), 3);
    assert_eq!(roster(&fixture, &run_id).await.roster.count(Role::Carrier), 1);
}

#[tokio::test]
async fn exhausted_retries_are_storage_failure() {
    let fixture = Fixture::new();
    let run_id = open_run(&fixture).await;
    let a = fixture.character("a", Priest).await;
    let before = roster(&fixture, &run_id).await;

    let store = Arc::new(ConflictingStore::new(fixture.store.clone(), 100));
    let settings = EngineSettings {
        retry: RetryConfig::new(
            3,
            std::time::Duration::from_millis(1),
            std::time::Duration::from_millis(2),
            2.0,
        ),
        ..EngineSettings::default()
    };
    let engine = RosterEngine::new(store.clone(), settings);
    let err = engine
        .join_run(&run_id, &a.owner, seat(&a, Role::Carrier, false))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StorageFailure);
    assert!(err.kind().is_retryable());
    assert_eq!(store.commits.load(Ordering::SeqCst), 3);
    assert_eq!(roster(&fixture, &run_id).await, before);
}

// ─── Random operation sequences ───

#[derive(Debug, Clone)]
enum Op {
    Join {
        actor: usize,
        class: CharacterClass,
        carrier: bool,
        lead: bool,
        items: usize,
    },
    Leave {
        actor: usize,
    },
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0usize..14, arb_class(), any::<bool>(), any::<bool>(), 0usize..3).prop_map(
            |(actor, class, carrier, lead, items)| Op::Join {
                actor,
                class,
                carrier,
                lead,
                items,
            }
        ),
        1 => (0usize..14).prop_map(|actor| Op::Leave { actor }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Every invariant holds after every operation, and a rejected operation
    /// changes nothing.
    #[test]
    fn invariants_hold_over_random_sequences(ops in prop::collection::vec(arb_op(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let fixture = Fixture::new();
            let run_id = open_run(&fixture).await;
            let items = [fixture.item("Atiesh").await, fixture.item("Sulfuras").await];

            for op in ops {
                let before = roster(&fixture, &run_id).await;
                let result = match op {
                    Op::Join { actor, class, carrier, lead, items: n } => {
                        let character = fixture.character(&format!("actor-{actor}"), class).await;
                        let role = if carrier { Role::Carrier } else { Role::Boosted };
                        let request = JoinRequest {
                            item_ids: items.iter().take(n).map(|i| i.id.clone()).collect(),
                            ..seat(&character, role, lead)
                        };
                        fixture
                            .engine
                            .join_run(&run_id, &character.owner, request)
                            .await
                            .map(|_| ())
                    }
                    Op::Leave { actor } => {
                        fixture
                            .engine
                            .leave_run(&run_id, &ActorId::new(format!("actor-{actor}")))
                            .await
                    }
                };

                let after = roster(&fixture, &run_id).await;
                prop_assert!(
                    check_roster(&after.roster).is_empty(),
                    "violations: {:?}",
                    check_roster(&after.roster)
                );
                if result.is_err() {
                    prop_assert_eq!(&after, &before);
                }
            }
            Ok(())
        })?;
    }
}
