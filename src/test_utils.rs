//! Shared test utilities and arbitrary generators for property-based testing.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

use crate::engine::{EngineSettings, JoinRequest, RetryConfig, RosterEngine};
use crate::persistence::StoreEventPayload;
use crate::store::{MemoryRunStore, StoreState};
use crate::types::{
    ActorId, Character, CharacterClass, CharacterId, Claim, Item, ItemId, Member, Participant,
    ParticipantId, Reservation, ReservationId, Role, Roster, Run, RunId,
};

// ─── Generators ───

pub fn arb_role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::Carrier), Just(Role::Boosted)]
}

pub fn arb_class() -> impl Strategy<Value = CharacterClass> {
    prop::sample::select(CharacterClass::ALL.to_vec())
}

pub fn arb_actor() -> impl Strategy<Value = ActorId> {
    "[a-z]{1,8}".prop_map(ActorId::new)
}

pub fn arb_datetime() -> impl Strategy<Value = DateTime<Utc>> {
    // Whole seconds between 2000 and 2100.
    (946_684_800i64..4_102_444_800i64).prop_map(|secs| Utc.timestamp_opt(secs, 0).unwrap())
}

fn arb_id() -> impl Strategy<Value = String> {
    "[0-9a-f]{8}"
}

pub fn arb_character() -> impl Strategy<Value = Character> {
    (arb_id(), arb_actor(), "[A-Za-z]{1,12}", arb_class(), arb_datetime()).prop_map(
        |(id, owner, name, class, created_at)| Character {
            id: CharacterId::new(id),
            owner,
            name,
            class,
            created_at,
        },
    )
}

pub fn arb_item() -> impl Strategy<Value = Item> {
    (
        arb_id(),
        "[A-Za-z ,']{1,30}",
        0u64..100_000,
        prop::option::of("https://[a-z]{1,10}\\.example/[a-z_]{1,12}\\.jpg"),
    )
        .prop_map(|(id, name, value, image_url)| Item {
            id: ItemId::new(id),
            name,
            value,
            image_url,
        })
}

fn arb_run() -> impl Strategy<Value = Run> {
    (arb_id(), arb_datetime(), arb_actor(), arb_datetime()).prop_map(
        |(id, scheduled_at, created_by, created_at)| Run {
            id: RunId::new(id),
            activity: "Upper Blackrock Spire".to_string(),
            scheduled_at,
            leader: None,
            created_by,
            created_at,
        },
    )
}

fn arb_participant(run_id: RunId) -> impl Strategy<Value = Participant> {
    (arb_id(), arb_actor(), arb_id(), arb_role(), any::<bool>(), arb_datetime()).prop_map(
        move |(id, actor_id, character_id, role, is_leader, joined_at)| Participant {
            id: ParticipantId::new(id),
            run_id: run_id.clone(),
            actor_id,
            character_id: CharacterId::new(character_id),
            role,
            is_leader: is_leader && role.is_carrier(),
            joined_at,
        },
    )
}

fn arb_reservations(run_id: RunId) -> impl Strategy<Value = Vec<Reservation>> {
    prop::collection::vec((arb_id(), arb_id(), arb_actor()), 0..3).prop_map(move |rows| {
        rows.into_iter()
            .map(|(id, item_id, actor_id)| Reservation {
                id: ReservationId::new(id),
                run_id: run_id.clone(),
                item_id: ItemId::new(item_id),
                actor_id,
            })
            .collect()
    })
}

fn arb_run_id() -> impl Strategy<Value = RunId> {
    arb_id().prop_map(RunId::new)
}

pub fn arb_store_event_payload() -> impl Strategy<Value = StoreEventPayload> {
    prop_oneof![
        arb_run().prop_flat_map(|run| {
            let run_id = run.id.clone();
            (
                Just(run),
                arb_participant(run_id.clone()),
                arb_reservations(run_id),
            )
                .prop_map(|(run, participant, reservations)| {
                    StoreEventPayload::RunCreated {
                        run,
                        participant,
                        reservations,
                    }
                })
        }),
        arb_run_id().prop_flat_map(|run_id| {
            (arb_participant(run_id.clone()), arb_reservations(run_id)).prop_map(
                |(participant, reservations)| StoreEventPayload::ParticipantJoined {
                    participant,
                    reservations,
                },
            )
        }),
        (arb_run_id(), arb_id(), any::<bool>()).prop_map(|(run_id, p, cleared_leader)| {
            StoreEventPayload::ParticipantLeft {
                run_id,
                participant_id: ParticipantId::new(p),
                cleared_leader,
            }
        }),
        arb_run_id().prop_map(|run_id| StoreEventPayload::RunDeleted { run_id }),
        arb_character().prop_map(|character| StoreEventPayload::CharacterRegistered { character }),
        arb_item().prop_map(|item| StoreEventPayload::ItemRegistered { item }),
    ]
}

/// A store state built by applying random events to an empty store.
pub fn arb_store_state() -> impl Strategy<Value = StoreState> {
    prop::collection::vec(arb_store_event_payload(), 0..12).prop_map(|payloads| {
        let mut state = StoreState::default();
        for payload in &payloads {
            state.apply(payload);
        }
        state
    })
}

// ─── Roster builders ───

/// A member whose character is owned by `actor`, seated in a run with id
/// `run`.
pub fn member(actor: &str, role: Role, class: CharacterClass, is_leader: bool) -> Member {
    let actor = ActorId::new(actor);
    let character = Character::new(actor.clone(), actor.as_str(), class);
    Member {
        participant: Participant::new(
            RunId::new("run"),
            actor,
            character.id.clone(),
            role,
            is_leader,
        ),
        character,
    }
}

/// A reservation by `actor` on a fresh item called `item_name`.
pub fn claim(actor: &str, item_name: &str) -> Claim {
    let item = Item::new(item_name, 1000, None);
    Claim {
        reservation: Reservation::new(RunId::new("run"), item.id.clone(), ActorId::new(actor)),
        item,
    }
}

/// A roster with the given members and claims whose leader field names the
/// first flagged leader.
pub fn roster_of(members: Vec<Member>, claims: Vec<Claim>) -> Roster {
    let mut run = Run::new("Upper Blackrock Spire", at(2024, 6, 1), ActorId::new("creator"));
    run.id = RunId::new("run");
    run.leader = members
        .iter()
        .find(|m| m.is_leader())
        .map(|m| m.participant.id.clone());
    Roster {
        run,
        members,
        claims,
    }
}

pub fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 20, 0, 0).unwrap()
}

// ─── Engine fixture ───

/// Retries generous enough that contention in tests never exhausts them.
pub fn test_settings() -> EngineSettings {
    EngineSettings {
        retry: RetryConfig::new(
            64,
            std::time::Duration::from_millis(1),
            std::time::Duration::from_millis(5),
            2.0,
        ),
        ..EngineSettings::default()
    }
}

pub struct Fixture {
    pub engine: Arc<RosterEngine>,
    pub store: Arc<MemoryRunStore>,
}

impl Fixture {
    pub fn new() -> Self {
        let store = Arc::new(MemoryRunStore::new());
        Fixture {
            engine: Arc::new(RosterEngine::new(store.clone(), test_settings())),
            store,
        }
    }

    pub async fn character(&self, actor: &str, class: CharacterClass) -> Character {
        self.engine
            .register_character(&ActorId::new(actor), &format!("{actor}-{class}"), class)
            .await
            .unwrap()
    }

    pub async fn item(&self, name: &str) -> Item {
        self.engine.register_item(name, 5000, None).await.unwrap()
    }
}

/// A join request for `character` with no reservations.
pub fn seat(character: &Character, role: Role, is_leader: bool) -> JoinRequest {
    JoinRequest {
        character_id: character.id.clone(),
        role,
        is_leader,
        item_ids: Vec::new(),
    }
}

/// A boosted join request for `character` reserving `items`.
pub fn boosted_with(character: &Character, items: &[&Item]) -> JoinRequest {
    JoinRequest {
        item_ids: items.iter().map(|i| i.id.clone()).collect(),
        ..seat(character, Role::Boosted, false)
    }
}
