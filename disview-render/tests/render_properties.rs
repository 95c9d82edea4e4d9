//! Behavioural tests for the asynchronous renderer and the consumer view
//!
//! These cover coalescing, mutual exclusion, delivery order, abort and the
//! cache reuse scenarios end to end through the public API.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use disview_render::*;
use tokio_test::{assert_pending, assert_ready_eq};

const WAIT: Duration = Duration::from_secs(5);

async fn next_completion(completions: &mut CompletionReceiver) -> RenderCompleted {
    tokio::time::timeout(WAIT, completions.recv())
        .await
        .expect("timed out waiting for a completion")
        .expect("completion channel closed")
}

fn pump_until<S>(view: &mut RenderConsumerView<S>, mut done: impl FnMut(&RenderConsumerView<S>) -> bool) {
    let deadline = Instant::now() + WAIT;
    loop {
        view.pump();
        if done(view) {
            return;
        }
        assert!(Instant::now() < deadline, "view never reached the expected state");
        thread::sleep(Duration::from_millis(1));
    }
}

struct Listing {
    extent: Size,
}

impl ContentSource for Listing {
    type Snapshot = Point;

    fn extent(&self) -> Size {
        self.extent
    }

    fn snapshot(&self, viewport: &Viewport) -> Point {
        viewport.offset
    }
}

#[tokio::test]
async fn test_requests_during_render_coalesce_into_one() {
    let follow_ups = [
        vec![Priority::Low],
        vec![Priority::Low, Priority::High],
        vec![Priority::Idle, Priority::Highest, Priority::Lowest],
        vec![Priority::High, Priority::Low, Priority::Normal, Priority::TimeCritical, Priority::Idle],
    ];

    for priorities in follow_ups {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);

        let (renderer, mut completions) = AsyncRenderer::spawn(
            RendererOptions::default(),
            move |ctx: &RenderContext, _: &(), _: &mut RenderedImage| {
                let _ = started_tx.send(ctx.sequence);
                if ctx.sequence == 1 {
                    let _ = release_rx.lock().unwrap().recv_timeout(WAIT);
                }
            },
        )
        .unwrap();

        let first = renderer.schedule(Priority::Normal, Size::new(8, 8), ()).unwrap();
        assert_eq!(started_rx.recv_timeout(WAIT).unwrap(), first);

        let mut last = first;
        for priority in &priorities {
            last = renderer.schedule(*priority, Size::new(8, 8), ()).unwrap();
        }
        release_tx.send(()).unwrap();

        let completed = next_completion(&mut completions).await;
        assert_eq!(completed.sequence, first);

        let completed = next_completion(&mut completions).await;
        assert_eq!(completed.sequence, last);
        assert_eq!(completed.priority, *priorities.last().unwrap());

        let extra = tokio::time::timeout(Duration::from_millis(100), completions.recv()).await;
        assert!(extra.is_err(), "a third render ran for {:?}", priorities);

        let stats = renderer.stats();
        assert_eq!(stats.rendered, 2);
        assert_eq!(stats.coalesced, priorities.len() as u64 - 1);
    }
}

#[tokio::test]
async fn test_render_operation_never_runs_concurrently() {
    let active = Arc::new(AtomicUsize::new(0));
    let overlapped = Arc::new(AtomicBool::new(false));

    let (a, o) = (active.clone(), overlapped.clone());
    let (renderer, mut completions) = AsyncRenderer::spawn(
        RendererOptions::default(),
        move |_: &RenderContext, _: &(), _: &mut RenderedImage| {
            if a.fetch_add(1, Ordering::SeqCst) != 0 {
                o.store(true, Ordering::SeqCst);
            }
            thread::sleep(Duration::from_millis(2));
            a.fetch_sub(1, Ordering::SeqCst);
        },
    )
    .unwrap();

    let mut last = 0;
    for i in 0..40 {
        last = renderer.schedule(Priority::Normal, Size::new(4, 4), ()).unwrap();
        if i % 3 == 0 {
            thread::sleep(Duration::from_millis(1));
        }
    }

    loop {
        if next_completion(&mut completions).await.sequence == last {
            break;
        }
    }

    assert!(!overlapped.load(Ordering::SeqCst));
    assert_eq!(active.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_completions_arrive_in_schedule_order() {
    let (renderer, mut completions) = AsyncRenderer::spawn(
        RendererOptions::default(),
        |_: &RenderContext, marker: &u8, image: &mut RenderedImage| {
            image.fill(Rgba::rgb(*marker, 0, 0));
            thread::sleep(Duration::from_millis(1));
        },
    )
    .unwrap();

    let mut scheduled = Vec::new();
    for marker in 0..20u8 {
        scheduled.push((renderer.schedule(Priority::Normal, Size::new(1, 1), marker).unwrap(), marker));
        thread::sleep(Duration::from_millis(2));
    }
    let last = scheduled.last().unwrap().0;

    let mut delivered = Vec::new();
    loop {
        let completed = next_completion(&mut completions).await;
        let marker = completed.image.pixel(0, 0).unwrap().r;
        delivered.push((completed.sequence, marker));
        if completed.sequence == last {
            break;
        }
    }

    assert!(delivered.windows(2).all(|pair| pair[0].0 < pair[1].0));
    for entry in &delivered {
        assert!(scheduled.contains(entry), "{:?} does not match its request", entry);
    }
}

#[test]
fn test_no_delivery_after_abort() {
    for _ in 0..50 {
        let (mut renderer, mut completions) = AsyncRenderer::spawn(
            RendererOptions::default(),
            |_: &RenderContext, _: &(), image: &mut RenderedImage| image.fill(Rgba::BLACK),
        )
        .unwrap();

        renderer.schedule(Priority::High, Size::new(16, 16), ()).unwrap();
        renderer.abort();

        assert!(completions.try_recv().is_none());
        let mut next = tokio_test::task::spawn(completions.recv());
        assert_ready_eq!(next.poll(), None);
        drop(next);
        assert_eq!(renderer.stats().delivered, 0);
    }
}

#[test]
fn test_receiver_waits_while_renderer_is_idle() {
    let (_renderer, mut completions) = AsyncRenderer::spawn(
        RendererOptions::default(),
        |_: &RenderContext, _: &(), _: &mut RenderedImage| {},
    )
    .unwrap();

    let mut next = tokio_test::task::spawn(completions.recv());
    assert_pending!(next.poll());
}

#[test]
fn test_black_viewport_is_reused_on_scroll() {
    let renders = Arc::new(AtomicUsize::new(0));
    let counter = renders.clone();
    let mut view = RenderConsumerView::new(
        ViewOptions::default(),
        move |_: &RenderContext, _: &Point, image: &mut RenderedImage| {
            counter.fetch_add(1, Ordering::SeqCst);
            image.fill(Rgba::BLACK);
        },
    )
    .unwrap();
    let listing = Listing {
        extent: Size::new(800, 2400),
    };

    assert!(view.resize(Size::new(800, 600), &listing).unwrap());
    pump_until(&mut view, |v| v.cached_image().is_some());

    let image = view.cached_image().unwrap();
    assert_eq!(image.size(), Size::new(800, 600));
    assert!(image.pixels().iter().all(|p| *p == Rgba::BLACK));

    assert!(view.scroll_by(0, 120));
    assert!(!view.pump());
    let plan = view.paint().unwrap();
    assert_eq!(plan.source, Rect::new(Point::new(0, 120), Size::new(800, 480)));
    assert_eq!(plan.target, Point::new(0, 0));

    thread::sleep(Duration::from_millis(20));
    view.pump();
    assert_eq!(renders.load(Ordering::SeqCst), 1);
    assert_eq!(view.state(), RenderState::Idle);
}

#[test]
fn test_rapid_invalidations_render_twice() {
    let (started_tx, started_rx) = mpsc::channel();
    let mut view = RenderConsumerView::new(
        ViewOptions::default(),
        move |ctx: &RenderContext, _: &Point, _: &mut RenderedImage| {
            let _ = started_tx.send(ctx.sequence);
            thread::sleep(Duration::from_millis(50));
        },
    )
    .unwrap();
    let listing = Listing {
        extent: Size::new(640, 480),
    };

    view.resize(Size::new(640, 480), &listing).unwrap();
    started_rx.recv_timeout(WAIT).unwrap();
    assert_eq!(view.state(), RenderState::Rendering);

    view.invalidate(&listing).unwrap();
    thread::sleep(Duration::from_millis(1));
    let last = view.invalidate(&listing).unwrap();
    assert_eq!(view.state(), RenderState::Rendering);

    pump_until(&mut view, |v| v.cached_sequence() == Some(last));
    thread::sleep(Duration::from_millis(100));
    view.pump();

    assert_eq!(view.stats().rendered, 2);
    assert_eq!(view.stats().coalesced, 1);
    assert_eq!(view.state(), RenderState::Idle);
}

#[test]
fn test_drop_waits_for_running_render() {
    let finished = Arc::new(AtomicBool::new(false));
    let flag = finished.clone();
    let (started_tx, started_rx) = mpsc::channel();
    let mut view = RenderConsumerView::new(
        ViewOptions::default(),
        move |_: &RenderContext, _: &Point, _: &mut RenderedImage| {
            let _ = started_tx.send(());
            thread::sleep(Duration::from_millis(100));
            flag.store(true, Ordering::SeqCst);
        },
    )
    .unwrap();
    let listing = Listing {
        extent: Size::new(320, 200),
    };

    view.resize(Size::new(320, 200), &listing).unwrap();
    started_rx.recv_timeout(WAIT).unwrap();
    thread::sleep(Duration::from_millis(5));

    let started = Instant::now();
    drop(view);

    assert!(finished.load(Ordering::SeqCst));
    assert!(started.elapsed() >= Duration::from_millis(50));
}
