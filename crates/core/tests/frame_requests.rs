mod support;

use std::sync::Arc;

use device_frame_core::catalog::{Catalog, RawListing};
use device_frame_core::coordinator::{FrameRequestCoordinator, FrameStatus, RequestStatus};
use device_frame_core::config::PreferredDefaults;
use device_frame_core::{FrameApplyError, SelectionCascade, SelectionState};
use support::{GatedService, listing, png, screenshot};

fn setup() -> (Arc<GatedService>, FrameRequestCoordinator, Catalog) {
    let service = Arc::new(GatedService::new(listing()));
    let coordinator = FrameRequestCoordinator::new(service.clone());
    let catalog = Catalog::load(RawListing::from_value(listing()).unwrap()).unwrap();
    (service, coordinator, catalog)
}

fn state_with(catalog: &Catalog, image_name: &str) -> SelectionState {
    let mut cascade = SelectionCascade::new(PreferredDefaults::default());
    cascade.reconcile(catalog);
    cascade.set_source_image(Some(screenshot(image_name)));
    cascade.state().clone()
}

#[tokio::test]
async fn older_completion_after_newer_is_ignored() {
    let (service, coordinator, catalog) = setup();

    let g1 = coordinator.submit(&catalog, &state_with(&catalog, "one.png")).unwrap();
    let g2 = coordinator.submit(&catalog, &state_with(&catalog, "two.png")).unwrap();
    assert!(g1 < g2);

    let mut calls = service.take_calls(2).await;
    let second = calls.pop().unwrap();
    let first = calls.pop().unwrap();
    assert_eq!(first.request.image.file_name(), "one.png");
    assert_eq!(second.request.image.file_name(), "two.png");

    // newer settles first, older afterwards
    second.respond(Ok(png(20, 40)));
    let mut status = coordinator.subscribe();
    status
        .wait_for(|s| *s == FrameStatus::Succeeded { generation: g2 })
        .await
        .unwrap();
    first.respond(Ok(png(10, 10)));
    coordinator.settle().await;

    assert_eq!(coordinator.status(), FrameStatus::Succeeded { generation: g2 });
    assert_eq!(coordinator.with_result(|r| (r.generation(), r.dimensions())), Some((g2, (20, 40))));
    let tracker = coordinator.tracker();
    assert_eq!(tracker.live(), 1);
    assert_eq!(tracker.released(), 1);
}

#[tokio::test]
async fn stale_success_then_current_success_shows_latest() {
    let (service, coordinator, catalog) = setup();

    let _a = coordinator.submit(&catalog, &state_with(&catalog, "image1.png")).unwrap();
    let b = coordinator.submit(&catalog, &state_with(&catalog, "image2.png")).unwrap();

    let mut calls = service.take_calls(2).await.into_iter();
    let call_a = calls.next().unwrap();
    let call_b = calls.next().unwrap();

    call_a.respond(Ok(png(1, 1)));
    call_b.respond(Ok(png(2, 2)));
    coordinator.settle().await;

    assert_eq!(coordinator.status(), FrameStatus::Succeeded { generation: b });
    assert_eq!(coordinator.with_result(|r| r.dimensions()), Some((2, 2)));
    // A was acquired and released without ever becoming visible
    assert_eq!(coordinator.tracker().released(), 1);
    assert_eq!(coordinator.tracker().live(), 1);
}

#[tokio::test]
async fn stale_error_does_not_replace_current_result() {
    let (service, coordinator, catalog) = setup();

    coordinator.submit(&catalog, &state_with(&catalog, "one.png")).unwrap();
    let g2 = coordinator.submit(&catalog, &state_with(&catalog, "two.png")).unwrap();
    let mut calls = service.take_calls(2).await.into_iter();
    let first = calls.next().unwrap();
    let second = calls.next().unwrap();

    second.respond(Ok(png(3, 3)));
    first.respond(Err(FrameApplyError::Transport("connection reset".into())));
    coordinator.settle().await;

    assert_eq!(coordinator.status(), FrameStatus::Succeeded { generation: g2 });
    assert!(coordinator.has_result());
}

#[tokio::test]
async fn latest_error_is_visible_even_if_older_succeeds() {
    let (service, coordinator, catalog) = setup();

    coordinator.submit(&catalog, &state_with(&catalog, "one.png")).unwrap();
    let g2 = coordinator.submit(&catalog, &state_with(&catalog, "two.png")).unwrap();
    let mut calls = service.take_calls(2).await.into_iter();
    let first = calls.next().unwrap();
    let second = calls.next().unwrap();

    let error = FrameApplyError::Service { status: 500, detail: "Renderer crashed".into() };
    second.respond(Err(error.clone()));
    first.respond(Ok(png(3, 3)));
    coordinator.settle().await;

    assert_eq!(coordinator.status(), FrameStatus::Failed { generation: g2, error });
    assert!(!coordinator.has_result());
    assert_eq!(coordinator.tracker().live(), 0);
    assert_eq!(coordinator.tracker().released(), 1);
}

#[tokio::test]
async fn new_submission_marks_previous_superseded() {
    let (service, coordinator, catalog) = setup();

    let g1 = coordinator.submit(&catalog, &state_with(&catalog, "one.png")).unwrap();
    assert_eq!(coordinator.active_request().unwrap().status, RequestStatus::Pending);
    let g2 = coordinator.submit(&catalog, &state_with(&catalog, "two.png")).unwrap();

    assert_eq!(coordinator.request(g1).unwrap().status, RequestStatus::Superseded);
    let active = coordinator.active_request().unwrap();
    assert_eq!(active.generation, g2);
    assert_eq!(active.status, RequestStatus::Pending);
    assert_eq!(coordinator.current_generation(), g2);

    let mut calls = service.take_calls(2).await.into_iter();
    let first = calls.next().unwrap();
    let second = calls.next().unwrap();

    // still superseded while the current request is unanswered
    second.respond(Ok(png(2, 2)));
    let mut status = coordinator.subscribe();
    status
        .wait_for(|s| *s == FrameStatus::Succeeded { generation: g2 })
        .await
        .unwrap();
    assert_eq!(coordinator.request(g1).unwrap().status, RequestStatus::Superseded);
    assert_eq!(coordinator.request(g2).unwrap().status, RequestStatus::Succeeded);

    first.respond(Ok(png(1, 1)));
    coordinator.settle().await;
    assert!(coordinator.request(g1).is_none());
    assert_eq!(coordinator.active_request().unwrap().generation, g2);
}

#[tokio::test]
async fn reset_supersedes_in_flight_request_until_it_settles() {
    let (service, coordinator, catalog) = setup();

    let g1 = coordinator.submit(&catalog, &state_with(&catalog, "one.png")).unwrap();
    coordinator.reset();

    assert!(coordinator.active_request().is_none());
    assert_eq!(coordinator.request(g1).unwrap().status, RequestStatus::Superseded);

    service.take_calls(1).await.pop().unwrap().respond(Ok(png(1, 1)));
    coordinator.settle().await;
    assert!(coordinator.request(g1).is_none());
    assert_eq!(coordinator.status(), FrameStatus::Idle);
    assert_eq!(coordinator.tracker().live(), 0);
}

#[tokio::test]
async fn replacing_a_visible_result_releases_it_once() {
    let (service, coordinator, catalog) = setup();
    let state = state_with(&catalog, "shot.png");

    for round in 1..=3 {
        coordinator.submit(&catalog, &state).unwrap();
        let call = service.take_calls(1).await.pop().unwrap();
        call.respond(Ok(png(round, round)));
        coordinator.settle().await;
        assert_eq!(coordinator.tracker().live(), 1);
        assert_eq!(coordinator.tracker().released(), (round - 1) as usize);
    }

    coordinator.reset();
    coordinator.reset();
    assert_eq!(coordinator.tracker().live(), 0);
    assert_eq!(coordinator.tracker().released(), 3);
}
