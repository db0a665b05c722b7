//! Group membership: lazy resolution, duplicates, cycles, external
//! members, teardown and cache re-homing.

mod support;

use beamline_pool::{
    ControllerId, Element, ElementId, ElementKind, EventKind, GroupElement, PoolError, State,
    StateInfo, UserElementRef,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use support::{add_channel, add_motor, seed_state, test_pool, MockActionCache, MockController};

#[test]
fn unresolved_member_leaves_the_group_pending_until_retry() {
    let pool = test_pool();
    pool.add_controller(MockController::new(ControllerId(1), "motctrl01"))
        .expect("controller");
    let cache = MockActionCache::new(&pool, "motion");
    add_motor(&pool, 1, ControllerId(1), "mot01", Some(&cache));

    // mot02 (id 2) is not constructed yet: the group build defers.
    let group = GroupElement::new(
        ElementKind::MotorGroup,
        "mg01",
        "testpool/mg01",
        ElementId(100),
        &pool,
        MockActionCache::new(&pool, "mg01.motion"),
        vec![
            UserElementRef::Internal(ElementId(1)),
            UserElementRef::Internal(ElementId(2)),
        ],
    )
    .expect("construction succeeds while pending");
    assert!(group.is_pending());

    // Accessing resolved views retries the build and reports what is
    // still missing.
    let err = group.user_elements().expect_err("still unresolved");
    assert!(matches!(err, PoolError::UnresolvedMember(ElementId(2))));
    assert!(group.is_pending());

    // Once the missing element exists, the next access succeeds.
    add_motor(&pool, 2, ControllerId(1), "mot02", Some(&cache));
    let members = group.user_elements().expect("resolved");
    assert_eq!(
        members.iter().map(|m| m.name().to_string()).collect::<Vec<_>>(),
        vec!["mot01", "mot02"]
    );
    assert!(!group.is_pending());
    assert_eq!(
        group.physical_elements_set().expect("set"),
        HashSet::from([ElementId(1), ElementId(2)])
    );
}

#[test]
fn duplicate_member_is_rejected_without_partial_mutation() {
    let pool = test_pool();
    pool.add_controller(MockController::new(ControllerId(1), "motctrl01"))
        .expect("controller");
    let cache = MockActionCache::new(&pool, "motion");
    let m1 = add_motor(&pool, 1, ControllerId(1), "mot01", Some(&cache));
    add_motor(&pool, 2, ControllerId(1), "mot02", Some(&cache));

    let group = GroupElement::new(
        ElementKind::MotorGroup,
        "mg01",
        "testpool/mg01",
        ElementId(100),
        &pool,
        MockActionCache::new(&pool, "mg01.motion"),
        vec![
            UserElementRef::Internal(ElementId(1)),
            UserElementRef::Internal(ElementId(2)),
        ],
    )
    .expect("group");

    let ids_before = group.user_element_ids();
    let set_before = group.physical_elements_set().expect("set");

    let err = group.add_user_element(m1, None).expect_err("duplicate");
    assert!(matches!(err, PoolError::DuplicateMember { .. }));

    assert_eq!(group.user_element_ids(), ids_before);
    assert_eq!(group.user_elements().expect("members").len(), 2);
    assert_eq!(group.physical_elements_set().expect("set"), set_before);
}

#[test]
fn membership_cycles_are_rejected() {
    let pool = test_pool();
    pool.add_controller(MockController::new(ControllerId(1), "motctrl01"))
        .expect("controller");
    let cache = MockActionCache::new(&pool, "motion");
    add_motor(&pool, 1, ControllerId(1), "mot01", Some(&cache));

    let inner = GroupElement::new(
        ElementKind::MotorGroup,
        "mg_inner",
        "testpool/mg_inner",
        ElementId(10),
        &pool,
        MockActionCache::new(&pool, "mg_inner.motion"),
        vec![UserElementRef::Internal(ElementId(1))],
    )
    .expect("inner");
    pool.add_element(inner.clone()).expect("register inner");

    let outer = GroupElement::new(
        ElementKind::MotorGroup,
        "mg_outer",
        "testpool/mg_outer",
        ElementId(11),
        &pool,
        MockActionCache::new(&pool, "mg_outer.motion"),
        vec![UserElementRef::Internal(ElementId(10))],
    )
    .expect("outer");
    pool.add_element(outer.clone()).expect("register outer");

    // inner ∈ outer, so outer must not become a member of inner.
    let err = inner
        .add_user_element(outer, None)
        .expect_err("transitive cycle");
    assert!(matches!(err, PoolError::MembershipCycle { .. }));

    // A group can never contain itself either.
    let inner_again: Arc<dyn Element> = inner.clone();
    let err = inner
        .add_user_element(inner_again, None)
        .expect_err("self membership");
    assert!(matches!(err, PoolError::MembershipCycle { .. }));
}

#[test]
fn user_element_ids_round_trip_through_membership_changes() {
    let pool = test_pool();
    pool.add_controller(MockController::new(ControllerId(1), "motctrl01"))
        .expect("controller");
    let cache = MockActionCache::new(&pool, "motion");
    add_motor(&pool, 1, ControllerId(1), "mot01", Some(&cache));
    add_motor(&pool, 2, ControllerId(1), "mot02", Some(&cache));
    let m3 = add_motor(&pool, 3, ControllerId(1), "mot03", Some(&cache));
    let m4 = add_motor(&pool, 4, ControllerId(1), "mot04", Some(&cache));

    let group = GroupElement::new(
        ElementKind::MotorGroup,
        "mg01",
        "testpool/mg01",
        ElementId(100),
        &pool,
        MockActionCache::new(&pool, "mg01.motion"),
        vec![
            UserElementRef::Internal(ElementId(1)),
            UserElementRef::Internal(ElementId(2)),
        ],
    )
    .expect("group");

    group.add_user_element(m3, None).expect("append");
    group.add_user_element(m4, Some(1)).expect("insert");

    let expected = vec![
        UserElementRef::Internal(ElementId(1)),
        UserElementRef::Internal(ElementId(4)),
        UserElementRef::Internal(ElementId(2)),
        UserElementRef::Internal(ElementId(3)),
    ];
    assert_eq!(group.user_element_ids(), expected);

    // Rebuilding from the reference list reproduces the same ordered
    // membership.
    group.set_user_element_ids(expected.clone());
    let names: Vec<String> = group
        .user_elements()
        .expect("rebuilt")
        .iter()
        .map(|m| m.name().to_string())
        .collect();
    assert_eq!(names, vec!["mot01", "mot04", "mot02", "mot03"]);
    assert_eq!(group.user_element_ids(), expected);
}

#[test]
fn unmanaged_internal_member_is_resolved_as_external() {
    let pool = test_pool();
    pool.add_controller(MockController::new(ControllerId(1), "ctctrl01"))
        .expect("controller");
    let cache = MockActionCache::new(&pool, "motion");
    let m1 = add_motor(&pool, 1, ControllerId(1), "mot01", Some(&cache));
    // A counter channel is not a moveable: a motor group externalizes it.
    add_channel(
        &pool,
        ElementKind::CounterTimer,
        5,
        ControllerId(1),
        "ct01",
        Some(&cache),
    );
    seed_state(&m1, State::On, "ready");

    let group = GroupElement::new(
        ElementKind::MotorGroup,
        "mg01",
        "testpool/mg01",
        ElementId(100),
        &pool,
        MockActionCache::new(&pool, "mg01.motion"),
        vec![
            UserElementRef::Internal(ElementId(1)),
            UserElementRef::Internal(ElementId(5)),
        ],
    )
    .expect("group");

    let members = group.user_elements().expect("members");
    assert_eq!(members.len(), 2);
    assert_eq!(members[1].kind(), ElementKind::External);
    assert_eq!(members[1].name(), "ct01");

    // External members contribute nothing to the physical set nor to the
    // aggregate.
    assert_eq!(
        group.physical_elements_set().expect("set"),
        HashSet::from([ElementId(1)])
    );
    let (state, status) = group.calculate_states(None).expect("aggregate");
    assert_eq!(state, State::On);
    assert_eq!(status, "mot01 is On");
}

#[test]
fn clearing_members_unsubscribes_their_listeners() {
    let pool = test_pool();
    pool.add_controller(MockController::new(ControllerId(1), "motctrl01"))
        .expect("controller");
    let cache = MockActionCache::new(&pool, "motion");
    let m1 = add_motor(&pool, 1, ControllerId(1), "mot01", Some(&cache));
    seed_state(&m1, State::On, "ready");

    let group = GroupElement::new(
        ElementKind::MotorGroup,
        "mg01",
        "testpool/mg01",
        ElementId(100),
        &pool,
        MockActionCache::new(&pool, "mg01.motion"),
        vec![UserElementRef::Internal(ElementId(1))],
    )
    .expect("group");

    let group_events = Arc::new(AtomicUsize::new(0));
    {
        let group_events = Arc::clone(&group_events);
        group.subscribe(Arc::new(move |event| {
            if event.evt_type.kind == EventKind::State {
                group_events.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }

    m1.set_state_info(StateInfo::new(State::Moving, "ramping"), 1);
    assert_eq!(group_events.load(Ordering::SeqCst), 1);

    group.clear_user_elements();
    assert!(group.is_pending());

    // Member events no longer reach the group.
    m1.set_state_info(StateInfo::new(State::Fault, "encoder loss"), 1);
    assert_eq!(group_events.load(Ordering::SeqCst), 1);
}

#[test]
fn rehoming_deregisters_from_the_old_cache_first() {
    let pool = test_pool();
    pool.add_controller(MockController::new(ControllerId(1), "motctrl01"))
        .expect("controller");
    add_motor(&pool, 1, ControllerId(1), "mot01", None);
    add_motor(&pool, 2, ControllerId(1), "mot02", None);

    let first_cache = MockActionCache::new(&pool, "mg01.motion");
    let group = GroupElement::new(
        ElementKind::MotorGroup,
        "mg01",
        "testpool/mg01",
        ElementId(100),
        &pool,
        first_cache.clone(),
        vec![
            UserElementRef::Internal(ElementId(1)),
            UserElementRef::Internal(ElementId(2)),
        ],
    )
    .expect("group");

    assert!(first_cache.contains(ElementId(1)));
    assert!(first_cache.contains(ElementId(2)));

    let second_cache = MockActionCache::new(&pool, "mg01.motion-2");
    group
        .rehome_action_cache(second_cache.clone())
        .expect("re-home");

    assert_eq!(first_cache.element_count(), 0, "old cache emptied first");
    assert!(second_cache.contains(ElementId(1)));
    assert!(second_cache.contains(ElementId(2)));
    assert_eq!(second_cache.element_count(), 2, "no duplicate registration");
}
