use std::env;
use std::io::Read;
use std::process::ExitCode;

use ellipsize::{
    fit, Content, FitParams, FontContext, HeuristicMeasurer, Line, LineEnd, MeasurementContext,
    TextNormalizer, TruncationResult, DEFAULT_ELLIPSIS,
};
use serde::Serialize;

#[derive(Clone, Debug)]
struct Args {
    input_path: Option<String>,
    width: f32,
    lines: usize,
    ellipsis: String,
    trim_whitespace: bool,
    markup: bool,
    font: FontContext,
    letter_spacing: f32,
    json: bool,
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    font: String,
    target_width: f32,
    ellipsis: &'a str,
    truncated: bool,
    lines: Vec<String>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    match run(env::args().collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("error: {}", msg);
            eprintln!("{}", help_text());
            ExitCode::FAILURE
        }
    }
}

fn run(args: Vec<String>) -> Result<(), String> {
    let cli = parse_args(args)?;
    let raw = read_input(cli.input_path.as_deref())?;
    let result = if cli.lines == 0 {
        TruncationResult {
            lines: vec![Line {
                text: raw,
                end: LineEnd::Final,
            }],
            truncated: false,
        }
    } else {
        fit_input(&cli, raw)
    };
    let rendered = result.render_with_ellipsis(&cli.ellipsis);

    if cli.json {
        let report = Report {
            font: cli.font.to_css(),
            target_width: cli.width,
            ellipsis: &cli.ellipsis,
            truncated: result.truncated,
            lines: rendered,
        };
        let json = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
        println!("{}", json);
    } else {
        for line in &rendered {
            println!("{}", line);
        }
        println!("truncated={}", result.truncated);
    }
    Ok(())
}

fn fit_input(cli: &Args, raw: String) -> TruncationResult {
    let normalizer = TextNormalizer::new();
    let content = if cli.markup {
        Content::markup(raw)
    } else {
        Content::plain(raw)
    };
    let text = match normalizer.normalize(&content) {
        Ok(text) => text,
        Err(err) => {
            log::warn!("{}; treating input as plain text", err);
            ellipsize::normalize::normalize_plain(content.as_source())
        }
    };

    let measurer = HeuristicMeasurer::new().with_letter_spacing(cli.letter_spacing);
    let ctx = MeasurementContext::new(measurer, cli.font.clone())
        .with_ellipsis(cli.ellipsis.as_str());
    let params = FitParams::new(cli.width, cli.lines)
        .with_ellipsis_width(ctx.measure_ellipsis())
        .with_trim_trailing_whitespace(cli.trim_whitespace);
    fit(&ctx, &text, params)
}

fn read_input(path: Option<&str>) -> Result<String, String> {
    match path {
        Some("-") | None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| format!("failed to read stdin: {}", e))?;
            Ok(buf)
        }
        Some(path) => {
            std::fs::read_to_string(path).map_err(|e| format!("failed to read {}: {}", path, e))
        }
    }
}

fn parse_args(args: Vec<String>) -> Result<Args, String> {
    if args.len() >= 2 && (args[1] == "--help" || args[1] == "-h") {
        return Err("help requested".to_string());
    }

    let mut cfg = Args {
        input_path: None,
        width: 0.0,
        lines: 1,
        ellipsis: DEFAULT_ELLIPSIS.to_string(),
        trim_whitespace: false,
        markup: false,
        font: FontContext::default(),
        letter_spacing: 0.0,
        json: false,
    };
    let mut width_set = false;

    let mut i = 1usize;
    while i < args.len() {
        match args[i].as_str() {
            "--width" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--width requires a value".to_string())?;
                cfg.width = v
                    .parse::<f32>()
                    .map_err(|_| format!("invalid --width value '{}'", v))?;
                width_set = true;
                i += 2;
            }
            "--lines" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--lines requires a value".to_string())?;
                cfg.lines = parse_line_budget(v)
                    .ok_or_else(|| format!("invalid --lines value '{}'", v))?;
                i += 2;
            }
            "--ellipsis" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--ellipsis requires a value".to_string())?;
                cfg.ellipsis = v.clone();
                i += 2;
            }
            "--font" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--font requires a value".to_string())?;
                cfg.font = v
                    .parse::<FontContext>()
                    .map_err(|e| format!("invalid --font value '{}': {}", v, e))?;
                i += 2;
            }
            "--letter-spacing" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--letter-spacing requires a value".to_string())?;
                cfg.letter_spacing = v
                    .parse::<f32>()
                    .ok()
                    .filter(|px| px.is_finite())
                    .ok_or_else(|| format!("invalid --letter-spacing value '{}'", v))?;
                i += 2;
            }
            "--trim-whitespace" => {
                cfg.trim_whitespace = true;
                i += 1;
            }
            "--markup" => {
                cfg.markup = true;
                i += 1;
            }
            "--json" => {
                cfg.json = true;
                i += 1;
            }
            other if other.starts_with("--") => {
                return Err(format!("unknown option '{}'", other));
            }
            other => {
                if cfg.input_path.is_some() {
                    return Err(format!("unexpected argument '{}'", other));
                }
                cfg.input_path = Some(other.to_string());
                i += 1;
            }
        }
    }

    if !width_set {
        return Err("--width is required".to_string());
    }
    Ok(cfg)
}

/// `false`, `0` and negative values disable truncation.
fn parse_line_budget(raw: &str) -> Option<usize> {
    if raw.eq_ignore_ascii_case("false") {
        return Some(0);
    }
    let value = raw.parse::<i64>().ok()?;
    Some(usize::try_from(value).unwrap_or(0))
}

fn help_text() -> &'static str {
    "usage: ellipsize [FILE|-] --width <px> [--lines <n|false>] [--ellipsis <s>]\n\
     \x20                [--font \"<weight> <style> <size>px <family>\"] [--trim-whitespace]\n\
     \x20                [--letter-spacing <px>] [--markup] [--json]\n\
     \n\
     Reads text from FILE (or stdin), fits it to --width pixels within --lines\n\
     lines and prints the resulting lines, appending the ellipsis when cut.\n\
     Set RUST_LOG=debug for measurement diagnostics."
}
