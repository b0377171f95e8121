use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use ellipsize::{HeuristicMeasurer, LineEnd};
use ellipsize_render::{
    Content, FontContext, LineBudget, ReflowController, ReflowDiagnostic, ReflowHost,
    ReflowOptions, ReflowState, ResizeSubscription, RetryPolicy, TextMeasurer,
};

/// 10px per char regardless of font, so widths are easy to reason about.
struct FixedPitch;

impl TextMeasurer for FixedPitch {
    fn measure_text_px(&self, text: &str, font: &FontContext) -> f32 {
        text.chars().count() as f32 * font.size_px * 0.625
    }
}

#[derive(Debug, Default)]
struct FakeHost {
    width: f32,
    font: FontContext,
    frames_requested: usize,
    next_subscription: u64,
    active: Vec<u64>,
    released: Vec<u64>,
}

impl FakeHost {
    fn with_width(width: f32) -> Self {
        Self {
            width,
            ..Self::default()
        }
    }
}

impl ReflowHost for FakeHost {
    fn container_width(&self) -> f32 {
        self.width
    }

    fn computed_font(&self) -> FontContext {
        self.font.clone()
    }

    fn request_frame(&mut self) {
        self.frames_requested += 1;
    }

    fn subscribe_resize(&mut self) -> ResizeSubscription {
        self.next_subscription += 1;
        self.active.push(self.next_subscription);
        ResizeSubscription::new(self.next_subscription)
    }

    fn unsubscribe_resize(&mut self, subscription: ResizeSubscription) {
        self.active.retain(|id| *id != subscription.id());
        self.released.push(subscription.id());
    }
}

fn controller(host: FakeHost, options: ReflowOptions) -> ReflowController<FakeHost> {
    ReflowController::new(host, Arc::new(FixedPitch), options)
}

fn rendered(ctrl: &ReflowController<FakeHost>) -> Vec<String> {
    let outcome = ctrl.latest().expect("an outcome should be published");
    outcome.result.render_with_ellipsis(&ctrl.options().ellipsis)
}

#[test]
fn computes_on_open_with_container_width() {
    let mut ctrl = controller(FakeHost::with_width(120.7), ReflowOptions::default());
    ctrl.set_content(Content::plain("Lorem Ipsum is simply dummy text"));
    assert!(ctrl.latest().is_none());

    ctrl.open();
    assert_eq!(ctrl.state(), ReflowState::Ready);
    let outcome = ctrl.latest().expect("outcome after open");
    assert_eq!(outcome.target_width, 120.0);
    assert!(outcome.result.truncated);
    // 120px / 10px per char, minus 30px of ellipsis.
    assert_eq!(rendered(&ctrl), vec!["Lorem Ips..."]);
}

#[test]
fn explicit_width_overrides_container() {
    let options = ReflowOptions::default()
        .with_width(500.0)
        .with_lines(LineBudget::Limit(2));
    let mut ctrl = controller(FakeHost::with_width(50.0), options);
    ctrl.set_content(Content::plain("Hello world"));
    ctrl.open();
    let outcome = ctrl.latest().expect("outcome");
    assert_eq!(outcome.target_width, 500.0);
    assert!(!outcome.result.truncated);
    assert_eq!(rendered(&ctrl), vec!["Hello world"]);
}

#[test]
fn zero_width_defers_until_a_frame_sees_layout() {
    let mut ctrl = controller(FakeHost::with_width(0.0), ReflowOptions::default());
    ctrl.set_content(Content::plain("Hello world"));
    ctrl.open();
    assert_eq!(ctrl.state(), ReflowState::WaitingForLayout { attempts: 1 });
    assert_eq!(ctrl.host().frames_requested, 1);
    assert!(ctrl.latest().is_none());

    ctrl.on_frame();
    assert_eq!(ctrl.state(), ReflowState::WaitingForLayout { attempts: 2 });
    assert_eq!(ctrl.host().frames_requested, 2);

    ctrl.host_mut().width = 400.0;
    ctrl.on_frame();
    assert_eq!(ctrl.state(), ReflowState::Ready);
    assert_eq!(rendered(&ctrl), vec!["Hello world"]);
    assert_eq!(ctrl.host().frames_requested, 2);
}

#[test]
fn unbounded_retry_keeps_requesting_frames() {
    let mut ctrl = controller(FakeHost::with_width(0.0), ReflowOptions::default());
    ctrl.open();
    for _ in 0..50 {
        ctrl.on_frame();
    }
    assert_eq!(ctrl.state(), ReflowState::WaitingForLayout { attempts: 51 });
    assert_eq!(ctrl.host().frames_requested, 51);
}

#[test]
fn bounded_retry_stalls_without_callback() {
    let calls = Rc::new(Cell::new(0usize));
    let diagnostics = Rc::new(RefCell::new(Vec::new()));
    let options = ReflowOptions::default().with_retry(RetryPolicy::Bounded(2));
    let mut ctrl = controller(FakeHost::with_width(0.0), options);
    {
        let calls = Rc::clone(&calls);
        ctrl.on_truncate(move |_| calls.set(calls.get() + 1));
        let diagnostics = Rc::clone(&diagnostics);
        ctrl.set_diagnostic_sink(move |d| diagnostics.borrow_mut().push(d));
    }
    ctrl.set_content(Content::plain("Hello"));
    ctrl.open();
    ctrl.on_frame();
    ctrl.on_frame();
    assert_eq!(ctrl.state(), ReflowState::Stalled { attempts: 2 });
    ctrl.on_frame();
    assert_eq!(ctrl.host().frames_requested, 2);
    assert_eq!(calls.get(), 0);
    assert_eq!(
        diagnostics.borrow().as_slice(),
        &[
            ReflowDiagnostic::Deferred { attempt: 1 },
            ReflowDiagnostic::Deferred { attempt: 2 },
            ReflowDiagnostic::RetryLimitReached { attempts: 2 },
        ]
    );

    ctrl.host_mut().width = 200.0;
    ctrl.on_resize();
    assert_eq!(ctrl.state(), ReflowState::Ready);
    assert_eq!(calls.get(), 1);
}

#[test]
fn callback_fires_once_per_computation() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut ctrl = controller(FakeHost::with_width(60.0), ReflowOptions::default());
    {
        let seen = Rc::clone(&seen);
        ctrl.on_truncate(move |truncated| seen.borrow_mut().push(truncated));
    }
    ctrl.set_content(Content::plain("abc"));
    ctrl.open();
    ctrl.set_content(Content::plain("a much longer line"));
    ctrl.host_mut().width = 1000.0;
    ctrl.on_resize();
    assert_eq!(seen.borrow().as_slice(), &[false, true, false]);
}

#[test]
fn font_change_invalidates_measurements() {
    let diagnostics = Rc::new(RefCell::new(Vec::new()));
    let mut ctrl = controller(FakeHost::with_width(100.0), ReflowOptions::default());
    {
        let diagnostics = Rc::clone(&diagnostics);
        ctrl.set_diagnostic_sink(move |d| diagnostics.borrow_mut().push(d));
    }
    ctrl.set_content(Content::plain("abcdefgh"));
    ctrl.open();
    assert!(!ctrl.latest().expect("outcome").result.truncated);

    ctrl.host_mut().font = FontContext::new("sans-serif", 32.0);
    ctrl.on_font_change();
    let outcome = ctrl.latest().expect("outcome");
    assert_eq!(outcome.font.size_px, 32.0);
    assert!(outcome.result.truncated);
    assert!(diagnostics
        .borrow()
        .iter()
        .any(|d| *d == ReflowDiagnostic::FontApplied));
    let stats = ctrl.cache_stats().expect("context is open");
    assert_eq!(stats.invalidations, 1);
}

#[test]
fn disabled_lines_pass_through_without_layout() {
    let options = ReflowOptions::default().with_lines(LineBudget::Disabled);
    let mut ctrl = controller(FakeHost::with_width(0.0), options);
    ctrl.set_content(Content::plain("Hello\r\nWorld  again"));
    ctrl.open();
    assert_eq!(ctrl.state(), ReflowState::Ready);
    assert_eq!(ctrl.host().frames_requested, 0);
    let outcome = ctrl.latest().expect("outcome");
    assert!(!outcome.result.truncated);
    assert_eq!(outcome.result.lines.len(), 1);
    assert_eq!(outcome.result.lines[0].text, "Hello\r\nWorld  again");

    let markup = "<p>Hi <b>there</b></p>";
    ctrl.set_content(Content::markup(markup));
    let outcome = ctrl.latest().expect("outcome");
    assert_eq!(outcome.result.lines[0].text, markup);
    assert_eq!(outcome.result.lines[0].end, LineEnd::Final);
}

#[test]
fn malformed_markup_falls_back_to_plain_text() {
    let diagnostics = Rc::new(RefCell::new(Vec::new()));
    let options = ReflowOptions::default().with_width(1000.0);
    let mut ctrl = controller(FakeHost::default(), options);
    {
        let diagnostics = Rc::clone(&diagnostics);
        ctrl.set_diagnostic_sink(move |d| diagnostics.borrow_mut().push(d));
    }
    ctrl.set_content(Content::markup("<p>unclosed <b>bold</b></p"));
    ctrl.open();
    assert!(diagnostics
        .borrow()
        .contains(&ReflowDiagnostic::MarkupFallback));
    assert!(ctrl.latest().is_some());
}

#[test]
fn markup_content_is_flattened() {
    let options = ReflowOptions::default()
        .with_width(1000.0)
        .with_lines(LineBudget::Limit(3));
    let mut ctrl = controller(FakeHost::default(), options);
    ctrl.set_content(Content::markup("first<br/>second <i>line</i>"));
    ctrl.open();
    assert_eq!(rendered(&ctrl), vec!["first", "second line"]);
}

#[test]
fn subscription_is_scoped_to_open_close() {
    let mut ctrl = controller(FakeHost::with_width(100.0), ReflowOptions::default());
    ctrl.open();
    ctrl.open();
    assert_eq!(ctrl.host().active, vec![1]);
    assert!(ctrl.cache_stats().is_some());

    ctrl.close();
    ctrl.close();
    assert!(ctrl.host().active.is_empty());
    assert_eq!(ctrl.host().released, vec![1]);
    assert!(ctrl.cache_stats().is_none());
    assert_eq!(ctrl.state(), ReflowState::Closed);

    ctrl.on_resize();
    assert_eq!(ctrl.state(), ReflowState::Closed);

    ctrl.open();
    assert_eq!(ctrl.host().active, vec![2]);
}

#[test]
fn drop_releases_subscription() {
    let released = Rc::new(Cell::new(false));

    struct Watch {
        inner: FakeHost,
        released: Rc<Cell<bool>>,
    }

    impl ReflowHost for Watch {
        fn container_width(&self) -> f32 {
            self.inner.container_width()
        }
        fn computed_font(&self) -> FontContext {
            self.inner.computed_font()
        }
        fn request_frame(&mut self) {
            self.inner.request_frame();
        }
        fn subscribe_resize(&mut self) -> ResizeSubscription {
            self.inner.subscribe_resize()
        }
        fn unsubscribe_resize(&mut self, subscription: ResizeSubscription) {
            self.released.set(true);
            self.inner.unsubscribe_resize(subscription);
        }
    }

    {
        let host = Watch {
            inner: FakeHost::with_width(100.0),
            released: Rc::clone(&released),
        };
        let mut ctrl = ReflowController::new(
            host,
            Arc::new(HeuristicMeasurer::new()),
            ReflowOptions::default(),
        );
        ctrl.open();
        assert!(!released.get());
    }
    assert!(released.get());
}

#[test]
fn trim_whitespace_option_reaches_fitter() {
    let options = ReflowOptions::default()
        .with_width(85.0)
        .with_trim_whitespace(true);
    let mut ctrl = controller(FakeHost::default(), options);
    ctrl.set_content(Content::plain("aaaa bbbb"));
    ctrl.open();
    assert_eq!(rendered(&ctrl), vec!["aaaa..."]);
}
