//! Web preview helpers for `ellipsize`.
//!
//! Fits one piece of content at several container widths through a
//! [`ReflowController`] and produces a serializable payload plus a
//! self-contained HTML page that draws each sample next to a width guide.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use ellipsize::{
    Content, FontContext, HeuristicMeasurer, LineEnd, MeasurementContext, TextMeasurer,
    TruncationResult,
};
use ellipsize_render::{
    ReflowController, ReflowDiagnostic, ReflowHost, ReflowOptions, ReflowState,
    ResizeSubscription,
};
use serde::Serialize;

/// Current crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Host with a fixed font whose width the preview steps through.
#[derive(Clone, Debug)]
pub struct StaticHost {
    pub width: f32,
    pub font: FontContext,
    next_subscription: u64,
}

impl StaticHost {
    pub fn new(width: f32, font: FontContext) -> Self {
        Self {
            width,
            font,
            next_subscription: 0,
        }
    }
}

impl ReflowHost for StaticHost {
    fn container_width(&self) -> f32 {
        self.width
    }

    fn computed_font(&self) -> FontContext {
        self.font.clone()
    }

    // Layout is always known; nothing to wait for.
    fn request_frame(&mut self) {}

    fn subscribe_resize(&mut self) -> ResizeSubscription {
        self.next_subscription += 1;
        ResizeSubscription::new(self.next_subscription)
    }

    fn unsubscribe_resize(&mut self, _subscription: ResizeSubscription) {}
}

#[derive(Clone, Debug, Serialize)]
pub struct PreviewPayload {
    pub meta: PreviewMeta,
    pub samples: Vec<SamplePayload>,
    pub warnings: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PreviewMeta {
    pub version: &'static str,
    pub font: String,
    pub font_size_px: f32,
    pub options: ReflowOptions,
    pub source_chars: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct SamplePayload {
    /// Container width the sample was laid out in.
    pub container_width: f32,
    /// Width the lines were fitted to; `None` when the container never
    /// reported a usable width.
    pub target_width: Option<f32>,
    pub truncated: bool,
    pub lines: Vec<LinePayload>,
}

#[derive(Clone, Debug, Serialize)]
pub struct LinePayload {
    pub text: String,
    /// Line text with the ellipsis appended when this is the cut line.
    pub display: String,
    pub end: LineEndPayload,
    pub measured_px: f32,
}

/// Serializable mirror of [`LineEnd`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineEndPayload {
    Wrap,
    Paragraph { breaks: usize },
    Final,
    Truncated,
}

impl From<LineEnd> for LineEndPayload {
    fn from(end: LineEnd) -> Self {
        match end {
            LineEnd::Wrap => Self::Wrap,
            LineEnd::Paragraph { breaks } => Self::Paragraph { breaks },
            LineEnd::Final => Self::Final,
            LineEnd::Truncated => Self::Truncated,
        }
    }
}

/// Convert one result into its payload form.
pub fn sample_payload<M: TextMeasurer>(
    container_width: f32,
    target_width: Option<f32>,
    result: &TruncationResult,
    measure: &MeasurementContext<M>,
) -> SamplePayload {
    let displayed = result.render_with_ellipsis(measure.ellipsis());
    let lines = result
        .lines
        .iter()
        .zip(displayed)
        .map(|(line, display)| LinePayload {
            measured_px: measure.measure(&display),
            text: line.text.clone(),
            display,
            end: line.end.into(),
        })
        .collect();
    SamplePayload {
        container_width,
        target_width,
        truncated: result.truncated,
        lines,
    }
}

/// Fit `content` at each of `widths` with the heuristic measurer.
pub fn render_preview_payload(
    content: Content,
    options: ReflowOptions,
    font: FontContext,
    widths: &[f32],
) -> PreviewPayload {
    let measurer: Arc<dyn TextMeasurer> = Arc::new(HeuristicMeasurer::new());
    let source_chars = content.as_source().chars().count();
    let warnings = Rc::new(RefCell::new(Vec::new()));

    let first_width = widths.first().copied().unwrap_or(0.0);
    let mut ctrl = ReflowController::new(
        StaticHost::new(first_width, font.clone()),
        Arc::clone(&measurer),
        options.clone(),
    );
    {
        let warnings = Rc::clone(&warnings);
        ctrl.set_diagnostic_sink(move |diagnostic| {
            let warning = match diagnostic {
                ReflowDiagnostic::MarkupFallback => {
                    "markup could not be parsed; rendered as plain text".to_string()
                }
                ReflowDiagnostic::RetryLimitReached { attempts } => {
                    format!("no container width after {} attempts", attempts)
                }
                _ => return,
            };
            let mut warnings = warnings.borrow_mut();
            if !warnings.contains(&warning) {
                warnings.push(warning);
            }
        });
    }
    ctrl.set_content(content);
    ctrl.open();

    let measure = MeasurementContext::new(Arc::clone(&measurer), font.clone())
        .with_ellipsis(options.ellipsis.as_str());
    let mut samples = Vec::with_capacity(widths.len());
    for &width in widths {
        ctrl.host_mut().width = width;
        ctrl.on_resize();
        let sample = match (ctrl.state(), ctrl.latest()) {
            (ReflowState::Ready, Some(outcome)) => sample_payload(
                width,
                Some(outcome.target_width),
                &outcome.result,
                &measure,
            ),
            _ => SamplePayload {
                container_width: width,
                target_width: None,
                truncated: false,
                lines: Vec::new(),
            },
        };
        samples.push(sample);
    }
    ctrl.close();

    let warnings = warnings.borrow().clone();
    PreviewPayload {
        meta: PreviewMeta {
            version: VERSION,
            font: font.to_css(),
            font_size_px: font.size_px,
            options,
            source_chars,
        },
        samples,
        warnings,
    }
}

/// Self-contained page rendering `payload_json`.
pub fn build_html(payload_json: &str) -> String {
    let safe_json = payload_json.replace("</script>", "<\\/script>");

    let template = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>ellipsize preview</title>
  <style>
    :root {
      --bg: #f2efe8;
      --panel: #fdfbf7;
      --ink: #252016;
      --muted: #675f50;
      --accent: #226a52;
      --line: #d7cebc;
    }
    body { margin: 0; padding: 24px; background: var(--bg); color: var(--ink);
           font-family: system-ui, sans-serif; }
    header { margin-bottom: 16px; color: var(--muted); font-size: 13px; }
    .sample { background: var(--panel); border: 1px solid var(--line);
              border-radius: 6px; padding: 12px; margin-bottom: 12px; }
    .sample h2 { margin: 0 0 8px; font-size: 13px; color: var(--muted); font-weight: 500; }
    .guide { border-right: 2px dashed var(--accent); }
    .line { white-space: pre; overflow: visible; }
    .truncated .line:last-child { color: var(--accent); }
    .warn { color: #a2451d; }
  </style>
</head>
<body>
  <header id="meta"></header>
  <main id="samples"></main>
  <script id="payload" type="application/json">__PAYLOAD__</script>
  <script>
    const data = JSON.parse(document.getElementById("payload").textContent);
    const meta = document.getElementById("meta");
    meta.textContent = `ellipsize ${data.meta.version} | ${data.meta.font} | lines=${JSON.stringify(data.meta.options.lines)} | ellipsis="${data.meta.options.ellipsis}"`;
    for (const warning of data.warnings) {
      const p = document.createElement("p");
      p.className = "warn";
      p.textContent = warning;
      meta.appendChild(p);
    }
    const root = document.getElementById("samples");
    for (const sample of data.samples) {
      const section = document.createElement("section");
      section.className = "sample" + (sample.truncated ? " truncated" : "");
      const title = document.createElement("h2");
      const target = sample.target_width === null ? "waiting for layout" : `${sample.target_width}px`;
      title.textContent = `container ${sample.container_width}px, target ${target}, truncated=${sample.truncated}`;
      section.appendChild(title);
      const guide = document.createElement("div");
      guide.className = "guide";
      guide.style.width = `${Math.max(sample.target_width || 0, 0)}px`;
      guide.style.font = data.meta.font;
      for (const line of sample.lines) {
        const div = document.createElement("div");
        div.className = "line";
        div.title = `${line.measured_px.toFixed(1)}px, ${line.end.kind}`;
        div.textContent = line.display;
        guide.appendChild(div);
      }
      section.appendChild(guide);
      root.appendChild(section);
    }
  </script>
</body>
</html>
"#;

    template.replace("__PAYLOAD__", &safe_json)
}
