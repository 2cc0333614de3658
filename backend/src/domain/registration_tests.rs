//! Behavioural coverage for the registration service.
//!
//! These tests drive [`RegistrationService`] against the real in-memory
//! store so that the optimistic-retry path, the idempotency guard, and the
//! chain fan-out are exercised end to end rather than against mocks.

use std::sync::Arc;

use mockable::DefaultClock;

use crate::domain::ports::{
    CodeAdministration, NetworkQuery, NetworkStore, RegistrationCommand, RegistrationRequest,
};
use crate::domain::{
    DisplayName, ErrorCode, PhoneNumber, Rank, ReferralCode, RegistrationService, UserId,
};
use crate::outbound::memory::InMemoryNetworkStore;

type Service = RegistrationService<InMemoryNetworkStore>;

fn harness() -> (Arc<InMemoryNetworkStore>, Service) {
    let store = Arc::new(InMemoryNetworkStore::new());
    let service = RegistrationService::new(Arc::clone(&store), Arc::new(DefaultClock));
    (store, service)
}

fn request(user_id: UserId, referral_code: Option<ReferralCode>) -> RegistrationRequest {
    RegistrationRequest {
        user_id,
        phone: PhoneNumber::new("+2348012345678").expect("valid phone"),
        display_name: DisplayName::new("Ada Lovelace").expect("valid name"),
        referral_code,
    }
}

/// Register `user_id` under `code` and return their own assigned code.
async fn register(service: &Service, user_id: UserId, code: Option<ReferralCode>) -> ReferralCode {
    service
        .register(request(user_id, code))
        .await
        .expect("registration succeeds")
        .referral_code
}

#[tokio::test]
async fn register_without_code_assigns_fresh_code_at_member_rank() {
    let (store, service) = harness();
    let user = UserId::random();

    let outcome = service
        .register(request(user, None))
        .await
        .expect("registration succeeds");

    assert_eq!(outcome.rank, Rank::Member);
    assert!(outcome.credited_referrer.is_none());
    assert!(!outcome.replayed);
    // The assigned code is canonical and owned by the registrant.
    let reparsed = ReferralCode::parse(outcome.referral_code.as_str()).expect("canonical code");
    assert_eq!(reparsed, outcome.referral_code);

    let profile = store
        .profile(&user)
        .await
        .expect("read profile")
        .expect("profile exists");
    assert_eq!(profile.referral_code, Some(outcome.referral_code));
    assert!(!profile.has_referrer());
    assert!(profile.upline.is_empty());
}

#[tokio::test]
async fn register_with_code_credits_referrer_and_records_event() {
    let (store, service) = harness();
    let referrer = UserId::random();
    let referred = UserId::random();
    let code = register(&service, referrer, None).await;

    let outcome = service
        .register(request(referred, Some(code.clone())))
        .await
        .expect("registration succeeds");
    assert_eq!(outcome.credited_referrer, Some(referrer));

    let credited = store
        .profile(&referrer)
        .await
        .expect("read referrer")
        .expect("referrer exists");
    assert_eq!(credited.direct_referrals, 1);
    assert_eq!(credited.team_size, 1);

    let events = store.events_for(&referrer, 50).await.expect("events");
    assert_eq!(events.len(), 1);
    let event = events.first().expect("one event");
    assert_eq!(event.new_user, referred);
    assert_eq!(event.code, code);
}

#[tokio::test]
async fn crediting_fans_out_team_size_across_the_chain() {
    let (store, service) = harness();
    let (a, b, c) = (UserId::random(), UserId::random(), UserId::random());

    let code_a = register(&service, a, None).await;
    let code_b = register(&service, b, Some(code_a)).await;
    register(&service, c, Some(code_b)).await;

    let profile_a = store.profile(&a).await.expect("read").expect("a exists");
    assert_eq!(profile_a.direct_referrals, 1, "only b is direct under a");
    assert_eq!(profile_a.team_size, 2, "b and c both count toward a's team");

    let profile_b = store.profile(&b).await.expect("read").expect("b exists");
    assert_eq!(profile_b.direct_referrals, 1);
    assert_eq!(profile_b.team_size, 1);

    let profile_c = store.profile(&c).await.expect("read").expect("c exists");
    assert_eq!(profile_c.upline, vec![b, a], "chain is nearest-first");
}

#[tokio::test]
async fn idempotent_retry_does_not_double_credit() {
    let (store, service) = harness();
    let referrer = UserId::random();
    let referred = UserId::random();
    let code = register(&service, referrer, None).await;

    let first = service
        .register(request(referred, Some(code.clone())))
        .await
        .expect("first registration succeeds");
    let second = service
        .register(request(referred, Some(code)))
        .await
        .expect("retry succeeds");

    assert!(second.replayed);
    assert!(second.credited_referrer.is_none());
    assert_eq!(second.referral_code, first.referral_code);

    let credited = store
        .profile(&referrer)
        .await
        .expect("read referrer")
        .expect("referrer exists");
    assert_eq!(credited.direct_referrals, 1, "retry must not credit again");
    assert_eq!(credited.team_size, 1);
    let events = store.events_for(&referrer, 50).await.expect("events");
    assert_eq!(events.len(), 1, "retry must not duplicate the event");
}

#[tokio::test]
async fn code_less_registrant_can_attach_a_referrer_later() {
    let (store, service) = harness();
    let referrer = UserId::random();
    let late = UserId::random();
    let code = register(&service, referrer, None).await;

    let own_code = register(&service, late, None).await;
    let attached = service
        .register(request(late, Some(code.clone())))
        .await
        .expect("late attachment succeeds");

    assert_eq!(attached.credited_referrer, Some(referrer));
    assert_eq!(attached.referral_code, own_code, "own code never changes");

    // A further submission is a no-op replay.
    let again = service
        .register(request(late, Some(code)))
        .await
        .expect("replay succeeds");
    assert!(again.replayed);

    let credited = store
        .profile(&referrer)
        .await
        .expect("read referrer")
        .expect("referrer exists");
    assert_eq!(credited.direct_referrals, 1);
}

#[tokio::test]
async fn self_referral_is_rejected_without_state_change() {
    let (store, service) = harness();
    let user = UserId::random();
    let code = register(&service, user, None).await;

    let error = service
        .register(request(user, Some(code.clone())))
        .await
        .expect_err("self referral rejected");
    assert_eq!(error.code(), ErrorCode::SelfReferral);

    let profile = store
        .profile(&user)
        .await
        .expect("read profile")
        .expect("profile exists");
    assert_eq!(profile.direct_referrals, 0);
    assert_eq!(profile.team_size, 0);
    assert_eq!(profile.referral_code, Some(code));
    assert!(!profile.has_referrer());
}

#[tokio::test]
async fn downstream_code_is_rejected_as_self_referral() {
    let (store, service) = harness();
    let (a, b) = (UserId::random(), UserId::random());
    let code_a = register(&service, a, None).await;
    let code_b = register(&service, b, Some(code_a)).await;

    // Attaching a below b would make a its own ancestor.
    let error = service
        .register(request(a, Some(code_b)))
        .await
        .expect_err("cycle rejected");
    assert_eq!(error.code(), ErrorCode::SelfReferral);

    let profile_b = store.profile(&b).await.expect("read").expect("b exists");
    assert_eq!(profile_b.direct_referrals, 0, "no credit from rejected attempt");
}

#[tokio::test]
async fn unknown_code_is_rejected_with_no_partial_state() {
    let (store, service) = harness();
    let user = UserId::random();
    let bogus = ReferralCode::parse("TLW-ZZZ999").expect("well-formed code");

    let error = service
        .register(request(user, Some(bogus)))
        .await
        .expect_err("unknown code rejected");
    assert_eq!(error.code(), ErrorCode::NotFound);

    assert!(
        store.profile(&user).await.expect("read").is_none(),
        "no profile may be created by a failed registration"
    );
}

#[tokio::test]
async fn inactive_code_is_rejected_without_state_change() {
    let (store, service) = harness();
    let referrer = UserId::random();
    let user = UserId::random();
    let code = register(&service, referrer, None).await;

    service
        .deactivate_code(&code)
        .await
        .expect("deactivation succeeds");

    let error = service
        .register(request(user, Some(code)))
        .await
        .expect_err("inactive code rejected");
    assert_eq!(error.code(), ErrorCode::Inactive);

    let credited = store
        .profile(&referrer)
        .await
        .expect("read referrer")
        .expect("referrer exists");
    assert_eq!(credited.direct_referrals, 0);
    assert!(store.profile(&user).await.expect("read").is_none());
}

#[tokio::test]
async fn deactivating_an_unknown_code_is_not_found() {
    let (_store, service) = harness();
    let bogus = ReferralCode::parse("TLW-ZZZ999").expect("well-formed code");
    let error = service
        .deactivate_code(&bogus)
        .await
        .expect_err("unknown code");
    assert_eq!(error.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn rank_advances_only_when_both_thresholds_are_met() {
    let (store, service) = harness();
    let a = UserId::random();
    let code_a = register(&service, a, None).await;

    // Two directs: direct threshold for Activist met, team still short.
    let b = UserId::random();
    let code_b = register(&service, b, Some(code_a.clone())).await;
    register(&service, UserId::random(), Some(code_a.clone())).await;

    let profile_a = store.profile(&a).await.expect("read").expect("a exists");
    assert_eq!(
        (profile_a.direct_referrals, profile_a.team_size),
        (2, 2)
    );
    assert_eq!(profile_a.rank, Rank::Member, "team threshold not yet met");

    // Three more below b push a's team to five without new directs.
    for _ in 0..3 {
        register(&service, UserId::random(), Some(code_b.clone())).await;
    }

    let promoted = store.profile(&a).await.expect("read").expect("a exists");
    assert_eq!((promoted.direct_referrals, promoted.team_size), (2, 5));
    assert_eq!(promoted.rank, Rank::Activist);

    let profile_b = store.profile(&b).await.expect("read").expect("b exists");
    assert_eq!(profile_b.rank, Rank::Member, "b has 3 directs but team of 3");
}

#[tokio::test]
async fn summary_reflects_network_position() {
    let (_store, service) = harness();
    let referrer = UserId::random();
    let referred = UserId::random();
    let code = register(&service, referrer, None).await;
    register(&service, referred, Some(code.clone())).await;

    let summary = service.summary(&referrer).await.expect("summary");
    assert_eq!(summary.referral_code, Some(code));
    assert_eq!(summary.direct_referrals, 1);
    assert_eq!(summary.team_size, 1);
    assert!(summary.referred_by.is_none());

    let referred_summary = service.summary(&referred).await.expect("summary");
    assert_eq!(referred_summary.referred_by, Some(referrer));
}

#[tokio::test]
async fn summary_for_unregistered_user_is_not_found() {
    let (_store, service) = harness();
    let error = service
        .summary(&UserId::random())
        .await
        .expect_err("unknown user");
    assert_eq!(error.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn direct_referral_listing_contains_every_direct() {
    let (_store, service) = harness();
    let referrer = UserId::random();
    let code = register(&service, referrer, None).await;
    let first = UserId::random();
    let second = UserId::random();
    register(&service, first, Some(code.clone())).await;
    let second_code = register(&service, second, Some(code.clone())).await;
    // A second-level referral must not appear in the direct listing.
    register(&service, UserId::random(), Some(second_code)).await;

    let listed = service
        .direct_referrals(&referrer)
        .await
        .expect("listing succeeds");
    let ids: Vec<UserId> = listed.iter().map(|entry| entry.id).collect();
    assert_eq!(listed.len(), 2);
    assert!(ids.contains(&first));
    assert!(ids.contains(&second));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ten_concurrent_registrations_all_credit_the_referrer() {
    let store = Arc::new(InMemoryNetworkStore::new());
    let service = Arc::new(RegistrationService::new(
        Arc::clone(&store),
        Arc::new(DefaultClock),
    ));
    let referrer = UserId::random();
    let code = register(&service, referrer, None).await;

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let task_service = Arc::clone(&service);
            let task_code = code.clone();
            tokio::spawn(async move {
                task_service
                    .register(request(UserId::random(), Some(task_code)))
                    .await
            })
        })
        .collect();
    for joined in futures::future::join_all(handles).await {
        joined
            .expect("task completes")
            .expect("registration succeeds");
    }

    let profile = store
        .profile(&referrer)
        .await
        .expect("read referrer")
        .expect("referrer exists");
    assert_eq!(profile.direct_referrals, 10, "no lost updates");
    assert_eq!(profile.team_size, 10);
    let events = store.events_for(&referrer, 50).await.expect("events");
    assert_eq!(events.len(), 10);
}
