//! DHAT heap profiler for ellipsize.
//!
//! Profiles allocation patterns across the truncation pipeline:
//! normalize -> measure -> fit, and the reflow controller driving it.
//!
//! Usage:
//!   cargo run -p ellipsize-heap-profile --release -- [OPTIONS] [TEXT_FILES...]
//!
//! Outputs dhat-<phase>.json files in the output directory (default: target/memory).
//! Open in https://nnethercote.github.io/dh_view/dh_view.html

#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::path::{Path, PathBuf};
use std::process::Command;

use ellipsize::{fit, Content, FitParams, FontContext, MeasurementContext, TextNormalizer};
use ellipsize_embedded_graphics::EgTextMeasurer;
use ellipsize_render::{LineBudget, ReflowController, ReflowHost, ReflowOptions, ResizeSubscription};

const TARGET_WIDTH: f32 = 480.0;
const LINE_BUDGET: usize = 6;
const RESIZE_STEPS: usize = 64;
const SYNTHETIC_WORDS: usize = 20_000;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    Normalize,
    Fit,
    Reflow,
    Full,
}

impl Phase {
    fn from_str(s: &str) -> Option<Self> {
        match s {
            "normalize" => Some(Self::Normalize),
            "fit" => Some(Self::Fit),
            "reflow" => Some(Self::Reflow),
            "full" => Some(Self::Full),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Normalize => "normalize",
            Self::Fit => "fit",
            Self::Reflow => "reflow",
            Self::Full => "full",
        }
    }
}

struct ResizingHost {
    width: f32,
    font: FontContext,
}

impl ReflowHost for ResizingHost {
    fn container_width(&self) -> f32 {
        self.width
    }

    fn computed_font(&self) -> FontContext {
        self.font.clone()
    }

    fn request_frame(&mut self) {}

    fn subscribe_resize(&mut self) -> ResizeSubscription {
        ResizeSubscription::new(1)
    }

    fn unsubscribe_resize(&mut self, _subscription: ResizeSubscription) {}
}

fn synthetic_markup() -> String {
    const WORDS: &[&str] = &[
        "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed",
        "do", "eiusmod", "tempor", "incididunt", "ut", "labore", "et", "dolore", "magna",
    ];
    let mut out = String::with_capacity(SYNTHETIC_WORDS * 8);
    out.push_str("<div>");
    for i in 0..SYNTHETIC_WORDS {
        if i % 120 == 0 {
            out.push_str("<p>");
        }
        if i % 17 == 0 {
            out.push_str("<em>");
            out.push_str(WORDS[i % WORDS.len()]);
            out.push_str("</em> ");
        } else {
            out.push_str(WORDS[i % WORDS.len()]);
            out.push(' ');
        }
        if i % 120 == 119 {
            out.push_str("</p>");
        }
    }
    out.push_str("</p></div>");
    out
}

fn load_content(path: Option<&Path>) -> Content {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .unwrap_or_else(|e| panic!("read {}: {}", path.display(), e));
            let is_markup = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| matches!(ext, "html" | "htm" | "xhtml" | "xml"));
            if is_markup {
                Content::markup(text)
            } else {
                Content::plain(text)
            }
        }
        None => Content::markup(synthetic_markup()),
    }
}

fn profile_content(content: &Content, label: &str, phase: Phase) {
    let normalizer = TextNormalizer::new();
    let font = FontContext::new("monospace", 16.0);

    match phase {
        Phase::Normalize => {
            let _text = normalizer
                .normalize(content)
                .unwrap_or_else(|e| panic!("normalize {}: {}", label, e));
        }
        Phase::Fit => {
            let text = normalizer
                .normalize(content)
                .unwrap_or_else(|e| panic!("normalize {}: {}", label, e));
            let ctx = MeasurementContext::new(EgTextMeasurer::new(), font);
            let params = FitParams::new(TARGET_WIDTH, LINE_BUDGET)
                .with_ellipsis_width(ctx.measure_ellipsis());
            for _ in 0..8 {
                let _result = fit(&ctx, &text, params);
            }
        }
        Phase::Reflow | Phase::Full => {
            let host = ResizingHost {
                width: TARGET_WIDTH,
                font,
            };
            let options = ReflowOptions::default().with_lines(LineBudget::Limit(LINE_BUDGET));
            let mut ctrl = ReflowController::new(host, EgTextMeasurer::shared(), options);
            ctrl.set_content(content.clone());
            ctrl.open();

            // Drag the container narrower and back, like a window resize.
            let steps = if matches!(phase, Phase::Full) {
                RESIZE_STEPS * 4
            } else {
                RESIZE_STEPS
            };
            for step in 0..steps {
                let shrink = (step % RESIZE_STEPS) as f32 * 4.0;
                ctrl.host_mut().width = (TARGET_WIDTH - shrink).max(40.0);
                ctrl.on_resize();
            }
            if matches!(phase, Phase::Full) {
                ctrl.host_mut().font = FontContext::new("monospace", 24.0);
                ctrl.on_font_change();
            }
            if ctrl.latest().is_none() {
                panic!("reflow {} produced no outcome", label);
            }
            ctrl.close();
        }
    }
}

/// Extract a short name from a file path for use in output filenames.
fn short_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}

fn usage() {
    eprintln!("Usage: heap-profile [OPTIONS] [TEXT_FILES...]");
    eprintln!();
    eprintln!("Options:");
    eprintln!(
        "  --phase <normalize|fit|reflow|full>  Pipeline phase to profile (default: fit)"
    );
    eprintln!("  --out-dir <DIR>                      Output directory for dhat JSON (default: target/memory)");
    eprintln!(
        "  --aggregate                          Single profile for all files (default: per-file)"
    );
    eprintln!();
    eprintln!("Files ending in .html/.htm/.xhtml/.xml are treated as markup.");
    eprintln!("If no files are given, profiles a synthetic markup document in-process.");
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut phase = Phase::Fit;
    let mut out_dir = PathBuf::from("target/memory");
    let mut files: Vec<PathBuf> = Vec::with_capacity(8);
    let mut aggregate = false;
    // Internal flag: when set, we're a child process profiling a single file.
    let mut single_file_mode = false;
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--phase" => {
                i += 1;
                let value = args.get(i).map(String::as_str).unwrap_or_default();
                phase = Phase::from_str(value).unwrap_or_else(|| {
                    eprintln!("Unknown phase: {}", value);
                    usage();
                    std::process::exit(1);
                });
            }
            "--out-dir" => {
                i += 1;
                let Some(value) = args.get(i) else {
                    usage();
                    std::process::exit(1);
                };
                out_dir = PathBuf::from(value);
            }
            "--aggregate" => {
                aggregate = true;
            }
            "--single-file" => {
                single_file_mode = true;
            }
            "--help" | "-h" => {
                usage();
                std::process::exit(0);
            }
            other => {
                files.push(PathBuf::from(other));
            }
        }
        i += 1;
    }

    std::fs::create_dir_all(&out_dir).unwrap_or_else(|e| {
        eprintln!("Failed to create output dir {}: {}", out_dir.display(), e);
        std::process::exit(1);
    });

    let phase_name = phase.name();

    if files.is_empty() {
        let json_path = out_dir.join(format!("dhat-{phase_name}-synthetic.json"));
        eprintln!(
            "heap-profile: phase={}, synthetic document, out={}",
            phase_name,
            out_dir.display()
        );
        let content = load_content(None);
        let _profiler = dhat::Profiler::builder()
            .file_name(json_path.clone())
            .build();
        profile_content(&content, "synthetic", phase);
        eprintln!(
            "Done. Open {} in https://nnethercote.github.io/dh_view/dh_view.html",
            json_path.display()
        );
        return;
    }

    // Child process mode: profile exactly the one file with DHAT active.
    if single_file_mode {
        assert!(files.len() == 1, "--single-file expects exactly one file");
        let file = &files[0];
        let name = short_name(file);
        let json_path = out_dir.join(format!("dhat-{phase_name}-{name}.json"));
        let content = load_content(Some(file));

        let _profiler = dhat::Profiler::builder().file_name(json_path).build();

        profile_content(&content, &file.to_string_lossy(), phase);
        return;
    }

    if aggregate {
        let json_path = out_dir.join(format!("dhat-{phase_name}.json"));
        eprintln!(
            "heap-profile: phase={}, files={} (aggregate), out={}",
            phase_name,
            files.len(),
            out_dir.display()
        );

        let _profiler = dhat::Profiler::builder()
            .file_name(json_path.clone())
            .build();

        for file in &files {
            eprintln!("  profiling: {}", file.display());
            let content = load_content(Some(file));
            profile_content(&content, &file.to_string_lossy(), phase);
        }

        eprintln!(
            "Done. Open {} in https://nnethercote.github.io/dh_view/dh_view.html",
            json_path.display()
        );
        return;
    }

    // Per-file mode (default): spawn a child process per file for clean DHAT sessions.
    let self_exe = std::env::current_exe().unwrap_or_else(|e| {
        eprintln!("Failed to determine own executable path: {}", e);
        std::process::exit(1);
    });

    eprintln!(
        "heap-profile: phase={}, files={} (per-file), out={}",
        phase_name,
        files.len(),
        out_dir.display()
    );

    let mut any_failed = false;
    for file in &files {
        let name = short_name(file);
        eprintln!(
            "  profiling: {} -> dhat-{}-{}.json",
            file.display(),
            phase_name,
            name
        );

        let status = Command::new(&self_exe)
            .arg("--single-file")
            .arg("--phase")
            .arg(phase_name)
            .arg("--out-dir")
            .arg(&out_dir)
            .arg(file)
            .status();

        match status {
            Ok(s) if s.success() => {}
            Ok(s) => {
                eprintln!("    FAILED (exit {})", s.code().unwrap_or(-1));
                any_failed = true;
            }
            Err(e) => {
                eprintln!("    FAILED to spawn: {}", e);
                any_failed = true;
            }
        }
    }

    eprintln!();
    eprintln!("Open in https://nnethercote.github.io/dh_view/dh_view.html");

    if any_failed {
        std::process::exit(1);
    }
}

