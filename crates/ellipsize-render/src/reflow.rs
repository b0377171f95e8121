use core::fmt;
use std::sync::Arc;
use std::time::Instant;

use ellipsize::normalize::normalize_plain;
use ellipsize::{
    fit, Content, FitParams, FontContext, Line, LineEnd, MeasurementContext, NormalizedText,
    TextMeasurer, TextNormalizer, TruncationResult,
};

use crate::host::{ReflowHost, ResizeSubscription};
use crate::options::{ReflowOptions, RetryPolicy};

/// Runtime diagnostics from the controller.
#[derive(Clone, Debug, PartialEq)]
pub enum ReflowDiagnostic {
    /// Container had no width; a frame was requested.
    Deferred { attempt: u32 },
    /// Bounded retry gave up.
    RetryLimitReached { attempts: u32 },
    /// The host font differed from the one the measurement context held.
    FontApplied,
    /// Markup failed to normalize and was treated as plain text.
    MarkupFallback,
    Computed {
        lines: usize,
        truncated: bool,
        elapsed_us: u64,
    },
}

/// Lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReflowState {
    Closed,
    /// Waiting for a non-zero container width.
    WaitingForLayout { attempts: u32 },
    /// `latest()` reflects the current inputs.
    Ready,
    /// Bounded retry exhausted; a resize or input change restarts it.
    Stalled { attempts: u32 },
}

/// One published computation.
#[derive(Clone, Debug, PartialEq)]
pub struct ReflowOutcome {
    pub result: TruncationResult,
    /// Width the lines were fitted to.
    pub target_width: f32,
    /// Font the widths were measured with.
    pub font: FontContext,
}

type TruncateCallback = Box<dyn FnMut(bool)>;
type DiagnosticSink = Option<Box<dyn FnMut(ReflowDiagnostic)>>;

/// Drives normalize -> fit from host layout events.
///
/// Owns the measurement context and the resize subscription between
/// [`ReflowController::open`] and [`ReflowController::close`].
pub struct ReflowController<H: ReflowHost> {
    host: H,
    measurer: Arc<dyn TextMeasurer>,
    options: ReflowOptions,
    normalizer: TextNormalizer,
    content: Content,
    state: ReflowState,
    frame_pending: bool,
    subscription: Option<ResizeSubscription>,
    context: Option<MeasurementContext<Arc<dyn TextMeasurer>>>,
    latest: Option<ReflowOutcome>,
    on_truncate: Option<TruncateCallback>,
    diagnostic_sink: DiagnosticSink,
}

impl<H: ReflowHost + fmt::Debug> fmt::Debug for ReflowController<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReflowController")
            .field("host", &self.host)
            .field("options", &self.options)
            .field("state", &self.state)
            .field("latest", &self.latest)
            .finish_non_exhaustive()
    }
}

impl<H: ReflowHost> ReflowController<H> {
    /// Create a closed controller.
    pub fn new(host: H, measurer: Arc<dyn TextMeasurer>, options: ReflowOptions) -> Self {
        Self {
            host,
            measurer,
            options,
            normalizer: TextNormalizer::new(),
            content: Content::default(),
            state: ReflowState::Closed,
            frame_pending: false,
            subscription: None,
            context: None,
            latest: None,
            on_truncate: None,
            diagnostic_sink: None,
        }
    }

    /// Replace the normalizer (limits for markup content).
    pub fn with_normalizer(mut self, normalizer: TextNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Register the result callback, invoked once per completed computation.
    pub fn on_truncate<F>(&mut self, callback: F)
    where
        F: FnMut(bool) + 'static,
    {
        self.on_truncate = Some(Box::new(callback));
    }

    /// Register or replace the diagnostics sink.
    pub fn set_diagnostic_sink<F>(&mut self, sink: F)
    where
        F: FnMut(ReflowDiagnostic) + 'static,
    {
        self.diagnostic_sink = Some(Box::new(sink));
    }

    fn emit_diagnostic(&mut self, diagnostic: ReflowDiagnostic) {
        if let Some(sink) = self.diagnostic_sink.as_mut() {
            sink(diagnostic);
        }
    }

    /// Acquire the resize subscription and measurement context, then compute.
    pub fn open(&mut self) {
        if self.state != ReflowState::Closed {
            return;
        }
        self.subscription = Some(self.host.subscribe_resize());
        let font = self.host.computed_font();
        self.context = Some(
            MeasurementContext::new(Arc::clone(&self.measurer), font)
                .with_ellipsis(self.options.ellipsis.as_str())
                .with_cache_limits(self.options.measure_cache),
        );
        self.state = ReflowState::WaitingForLayout { attempts: 0 };
        log::debug!("Reflow controller opened");
        self.refresh(0);
    }

    /// Release the resize subscription and measurement context.
    ///
    /// The last outcome stays readable. Idempotent.
    pub fn close(&mut self) {
        if self.state == ReflowState::Closed {
            return;
        }
        if let Some(subscription) = self.subscription.take() {
            self.host.unsubscribe_resize(subscription);
        }
        self.context = None;
        self.frame_pending = false;
        self.state = ReflowState::Closed;
        log::debug!("Reflow controller closed");
    }

    pub fn is_open(&self) -> bool {
        self.state != ReflowState::Closed
    }

    pub fn state(&self) -> ReflowState {
        self.state
    }

    /// Most recent published outcome.
    pub fn latest(&self) -> Option<&ReflowOutcome> {
        self.latest.as_ref()
    }

    pub fn options(&self) -> &ReflowOptions {
        &self.options
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Cache counters of the live measurement context.
    pub fn cache_stats(&self) -> Option<ellipsize::MeasureCacheStats> {
        self.context.as_ref().map(MeasurementContext::cache_stats)
    }

    pub fn set_content(&mut self, content: Content) {
        self.content = content;
        self.refresh(0);
    }

    pub fn set_options(&mut self, options: ReflowOptions) {
        if let Some(ctx) = self.context.as_mut() {
            ctx.set_cache_limits(options.measure_cache);
        }
        self.options = options;
        self.refresh(0);
    }

    /// Host resize notification.
    pub fn on_resize(&mut self) {
        self.refresh(0);
    }

    /// Host font change notification.
    pub fn on_font_change(&mut self) {
        self.refresh(0);
    }

    /// The frame requested through [`ReflowHost::request_frame`] arrived.
    pub fn on_frame(&mut self) {
        if !self.frame_pending {
            return;
        }
        self.frame_pending = false;
        if let ReflowState::WaitingForLayout { attempts } = self.state {
            self.refresh(attempts);
        }
    }

    fn resolve_target_width(&self) -> Option<f32> {
        if let Some(width) = self.options.explicit_width() {
            return Some(width);
        }
        let width = self.host.container_width().floor();
        (width.is_finite() && width > 0.0).then_some(width)
    }

    fn refresh(&mut self, attempts: u32) {
        if self.state == ReflowState::Closed {
            return;
        }
        if self.options.lines.is_disabled() {
            let target_width = self.resolve_target_width().unwrap_or(0.0);
            self.pass_through(target_width);
            return;
        }
        match self.resolve_target_width() {
            Some(target_width) => self.compute(target_width),
            None => self.defer(attempts),
        }
    }

    fn defer(&mut self, attempts: u32) {
        if let RetryPolicy::Bounded(max_attempts) = self.options.retry {
            if attempts >= max_attempts {
                log::warn!(
                    "Container width still unknown after {} attempts; giving up",
                    attempts
                );
                self.state = ReflowState::Stalled { attempts };
                self.emit_diagnostic(ReflowDiagnostic::RetryLimitReached { attempts });
                return;
            }
        }
        let attempt = attempts.saturating_add(1);
        self.state = ReflowState::WaitingForLayout { attempts: attempt };
        self.emit_diagnostic(ReflowDiagnostic::Deferred { attempt });
        if !self.frame_pending {
            self.frame_pending = true;
            self.host.request_frame();
        }
    }

    fn compute(&mut self, target_width: f32) {
        let started = Instant::now();
        let font = self.host.computed_font();
        let text = self.normalized_content();
        let Some(ctx) = self.context.as_mut() else {
            return;
        };
        let font_applied = ctx.apply_font(&font);
        ctx.set_ellipsis(self.options.ellipsis.as_str());
        let params = FitParams::new(target_width, self.options.lines.max_lines())
            .with_ellipsis_width(ctx.measure_ellipsis())
            .with_trim_trailing_whitespace(self.options.trim_whitespace);
        let result = fit(&*ctx, &text, params);

        if font_applied {
            self.emit_diagnostic(ReflowDiagnostic::FontApplied);
        }
        self.publish(result, target_width, font, started);
    }

    /// Disabled truncation publishes the content source untouched.
    fn pass_through(&mut self, target_width: f32) {
        let started = Instant::now();
        let font = self.host.computed_font();
        let result = TruncationResult {
            lines: vec![Line {
                text: self.content.as_source().to_string(),
                end: LineEnd::Final,
            }],
            truncated: false,
        };
        self.publish(result, target_width, font, started);
    }

    fn publish(
        &mut self,
        result: TruncationResult,
        target_width: f32,
        font: FontContext,
        started: Instant,
    ) {
        let elapsed_us = started.elapsed().as_micros().min(u64::MAX as u128) as u64;
        self.emit_diagnostic(ReflowDiagnostic::Computed {
            lines: result.lines.len(),
            truncated: result.truncated,
            elapsed_us,
        });
        let truncated = result.truncated;
        self.latest = Some(ReflowOutcome {
            result,
            target_width,
            font,
        });
        self.state = ReflowState::Ready;
        if let Some(callback) = self.on_truncate.as_mut() {
            callback(truncated);
        }
    }

    fn normalized_content(&mut self) -> NormalizedText {
        match self.normalizer.normalize(&self.content) {
            Ok(text) => text,
            Err(err) => {
                log::warn!("{}; falling back to plain text", err);
                self.emit_diagnostic(ReflowDiagnostic::MarkupFallback);
                normalize_plain(self.content.as_source())
            }
        }
    }
}

impl<H: ReflowHost> Drop for ReflowController<H> {
    fn drop(&mut self) {
        self.close();
    }
}
