use std::env;
use std::path::Path;
use std::process::ExitCode;

use ellipsize::{Content, FontContext};
use ellipsize_render::{LineBudget, ReflowOptions};
use ellipsize_render_web::{build_html, render_preview_payload};

const DEFAULT_OUT_PATH: &str = "target/ellipsize-preview/index.html";
const DEFAULT_WIDTHS: &[f32] = &[80.0, 160.0, 240.0, 320.0, 480.0];
const DEFAULT_TEXT: &str = "Lorem Ipsum is simply dummy text of the printing and typesetting \
industry. Lorem Ipsum has been the industry's standard dummy text ever since the 1500s, when an \
unknown printer took a galley of type and scrambled it to make a type specimen book.";

#[derive(Clone, Debug)]
struct Args {
    input_path: Option<String>,
    text: Option<String>,
    out_path: String,
    json_path: Option<String>,
    widths: Vec<f32>,
    font: FontContext,
    markup: bool,
    options: ReflowOptions,
}

fn main() -> ExitCode {
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
    if cli.out_path.is_empty() {
        return Err("--out must not be empty".to_string());
    }

    let source = match (&cli.text, &cli.input_path) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path, e))?,
        (None, None) => DEFAULT_TEXT.to_string(),
    };
    let content = if cli.markup {
        Content::markup(source)
    } else {
        Content::plain(source)
    };

    let payload = render_preview_payload(content, cli.options.clone(), cli.font, &cli.widths);
    let data_json = serde_json::to_string(&payload).map_err(|e| e.to_string())?;

    write_creating_parent(&cli.out_path, &build_html(&data_json))?;
    if let Some(json_path) = &cli.json_path {
        let pretty = serde_json::to_string_pretty(&payload).map_err(|e| e.to_string())?;
        write_creating_parent(json_path, &pretty)?;
    }

    let truncated = payload.samples.iter().filter(|s| s.truncated).count();
    println!(
        "wrote preview to {} (samples={}, truncated={}, warnings={})",
        cli.out_path,
        payload.samples.len(),
        truncated,
        payload.warnings.len(),
    );
    for warning in &payload.warnings {
        eprintln!("warning: {}", warning);
    }
    Ok(())
}

fn write_creating_parent(path: &str, contents: &str) -> Result<(), String> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
    }
    std::fs::write(path, contents).map_err(|e| format!("failed to write {}: {}", path, e))
}

fn parse_widths(value: &str) -> Result<Vec<f32>, String> {
    let widths = value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<f32>()
                .map_err(|_| format!("invalid --widths entry '{}'", part))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if widths.is_empty() {
        return Err("--widths requires at least one width".to_string());
    }
    Ok(widths)
}

fn parse_line_budget(value: &str) -> Result<LineBudget, String> {
    match value {
        "false" | "off" => Ok(LineBudget::Disabled),
        other => other
            .parse::<i64>()
            .map(LineBudget::from_count)
            .map_err(|_| format!("invalid --lines value '{}'", other)),
    }
}

fn parse_args(args: Vec<String>) -> Result<Args, String> {
    if args.len() >= 2 && (args[1] == "--help" || args[1] == "-h") {
        return Err("help requested".to_string());
    }

    let has_positional_input = args.get(1).is_some_and(|v| !v.starts_with("--"));

    let mut cfg = Args {
        input_path: has_positional_input.then(|| args[1].clone()),
        text: None,
        out_path: DEFAULT_OUT_PATH.to_string(),
        json_path: None,
        widths: DEFAULT_WIDTHS.to_vec(),
        font: FontContext::default(),
        markup: false,
        options: ReflowOptions::default().with_lines(LineBudget::Limit(2)),
    };

    let mut i = if has_positional_input { 2usize } else { 1usize };
    while i < args.len() {
        match args[i].as_str() {
            "--out" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--out requires a value".to_string())?;
                cfg.out_path = v.clone();
                i += 2;
            }
            "--json" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--json requires a value".to_string())?;
                cfg.json_path = Some(v.clone());
                i += 2;
            }
            "--text" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--text requires a value".to_string())?;
                cfg.text = Some(v.clone());
                i += 2;
            }
            "--widths" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--widths requires a value".to_string())?;
                cfg.widths = parse_widths(v)?;
                i += 2;
            }
            "--lines" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--lines requires a value".to_string())?;
                cfg.options.lines = parse_line_budget(v)?;
                i += 2;
            }
            "--ellipsis" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--ellipsis requires a value".to_string())?;
                cfg.options.ellipsis = v.clone();
                i += 2;
            }
            "--font" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--font requires a value".to_string())?;
                cfg.font = v.parse::<FontContext>().map_err(|e| e.to_string())?;
                i += 2;
            }
            "--options" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--options requires a value".to_string())?;
                let json = std::fs::read_to_string(v)
                    .map_err(|e| format!("failed to read {}: {}", v, e))?;
                cfg.options = ReflowOptions::from_json(&json).map_err(|e| e.to_string())?;
                i += 2;
            }
            "--markup" => {
                cfg.markup = true;
                i += 1;
            }
            "--trim-whitespace" => {
                cfg.options.trim_whitespace = true;
                i += 1;
            }
            other => return Err(format!("unknown argument '{}'", other)),
        }
    }

    Ok(cfg)
}

fn help_text() -> &'static str {
    "usage: ellipsize-preview [INPUT] [--text <TEXT>] [--out <HTML>] [--json <JSON>]\n\
     \x20                        [--widths <W1,W2,...>] [--lines <N|false>] [--ellipsis <S>]\n\
     \x20                        [--font <CSS font>] [--options <JSON file>] [--markup]\n\
     \x20                        [--trim-whitespace]\n\
     \n\
     Fits INPUT (or --text, or a built-in sample) at each width and writes an HTML preview."
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("ellipsize-preview")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn parses_positional_input_and_flags() {
        let cfg = parse_args(args(&[
            "notes.html",
            "--markup",
            "--widths",
            "100, 200",
            "--lines",
            "3",
        ]))
        .expect("arguments should parse");
        assert_eq!(cfg.input_path.as_deref(), Some("notes.html"));
        assert!(cfg.markup);
        assert_eq!(cfg.widths, vec![100.0, 200.0]);
        assert_eq!(cfg.options.lines, LineBudget::Limit(3));
    }

    #[test]
    fn defaults_without_arguments() {
        let cfg = parse_args(args(&[])).expect("no arguments is valid");
        assert!(cfg.input_path.is_none());
        assert_eq!(cfg.out_path, DEFAULT_OUT_PATH);
        assert_eq!(cfg.widths, DEFAULT_WIDTHS.to_vec());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(parse_args(args(&["--widths", ","])).is_err());
        assert!(parse_args(args(&["--lines", "many"])).is_err());
        assert!(parse_args(args(&["--bogus"])).is_err());
        assert_eq!(parse_line_budget("false"), Ok(LineBudget::Disabled));
        assert_eq!(parse_line_budget("-2"), Ok(LineBudget::Disabled));
    }
}
