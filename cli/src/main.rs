use std::error::Error;
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use clap::Parser;
use form_model::{
    encode_pairs, from_urlencoded, pairs, walk_json, BuildOptions, UrlDecodeOptions, Value,
};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

#[derive(Parser, Debug)]
#[command(
    name = "formnest",
    version,
    about = "Bracket-path form data encoder/decoder"
)]
struct Args {
    /// Input file path (.json, .txt, .query or .form). Omit or use '-' to read from stdin.
    input: Option<String>,

    /// Output file path (prints to stdout if omitted).
    #[arg(short, long, value_name = "file")]
    output: Option<String>,

    /// Force encode mode: JSON in, urlencoded query out.
    #[arg(short = 'e', long)]
    encode: bool,

    /// Force decode mode: urlencoded query in, JSON out.
    #[arg(short = 'd', long)]
    decode: bool,

    /// Turn numeric-looking and literal values into typed values when decoding.
    #[arg(long)]
    coerce: bool,

    /// Materialize numeric segments as objects instead of arrays when decoding.
    #[arg(long = "arrays-as-objects")]
    arrays_as_objects: bool,

    /// Indentation size for JSON output (default: 2, 0 for compact).
    #[arg(long, value_name = "number", default_value_t = 2)]
    indent: usize,

    /// Print one `key=value` pair per line without percent-encoding.
    #[arg(long)]
    pairs: bool,

    /// Log skipped pairs and traversal details to stderr.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Encode,
    Decode,
}

#[derive(Debug)]
enum InputSource {
    Stdin,
    File(String),
}

fn main() {
    if let Err(err) = run() {
        eprintln!("ERROR  {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let (input_text, input_source) = read_input(args.input.as_deref())?;
    let mode = resolve_mode(&args, &input_text, &input_source)?;
    debug!(?mode, ?input_source, "resolved mode");

    match mode {
        Mode::Encode => run_encode(&args, &input_text, &input_source),
        Mode::Decode => run_decode(&args, &input_text, &input_source),
    }
}

fn init_tracing(verbose: bool) {
    if !verbose && std::env::var_os("RUST_LOG").is_none() {
        return;
    }
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("form_model=debug"));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_filter(filter),
        )
        .init();
}

fn run_encode(args: &Args, input: &str, input_source: &InputSource) -> Result<(), Box<dyn Error>> {
    let json: serde_json::Value = serde_json::from_str(input)?;
    let mut emitted = Vec::new();
    walk_json(&json, |key, value| emitted.push((key.to_string(), value.clone())))?;

    let rendered = if args.pairs {
        render_lines(&emitted)
    } else {
        encode_pairs(emitted)
    };

    let output_target = OutputTarget::from_arg(args.output.as_deref());
    write_output(output_target.path(), rendered.as_bytes())?;
    if let OutputTarget::File(path) = &output_target {
        report_status(Mode::Encode, input_source, path);
    }
    Ok(())
}

fn run_decode(args: &Args, input: &str, input_source: &InputSource) -> Result<(), Box<dyn Error>> {
    let options = UrlDecodeOptions::new()
        .with_coerce(args.coerce)
        .with_build(BuildOptions::new().with_arrays_as_objects(args.arrays_as_objects));
    let model = from_urlencoded(input.trim(), &options);
    let output_target = OutputTarget::from_arg(args.output.as_deref());

    if args.pairs {
        write_output(output_target.path(), render_lines(&pairs(&model)).as_bytes())?;
    } else {
        with_output_writer(output_target.path(), |writer| {
            write_json(writer, &model.to_json(), args.indent)
        })?;
    }
    if let OutputTarget::File(path) = &output_target {
        report_status(Mode::Decode, input_source, path);
    }
    Ok(())
}

fn render_lines(emitted: &[(String, Value)]) -> String {
    emitted
        .iter()
        .map(|(key, value)| format!("{key}={}", value.to_text()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn resolve_mode(
    args: &Args,
    input: &str,
    input_source: &InputSource,
) -> Result<Mode, Box<dyn Error>> {
    if args.encode {
        return Ok(Mode::Encode);
    }

    if args.decode {
        return Ok(Mode::Decode);
    }

    match input_source {
        InputSource::Stdin => match input.trim_start().as_bytes().first() {
            Some(b'{') | Some(b'[') => Ok(Mode::Encode),
            _ => Ok(Mode::Decode),
        },
        InputSource::File(path) => match Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => Ok(Mode::Encode),
            Some("txt") | Some("query") | Some("form") => Ok(Mode::Decode),
            _ => Err("unable to auto-detect mode; use --encode or --decode".into()),
        },
    }
}

fn read_input(input: Option<&str>) -> Result<(String, InputSource), Box<dyn Error>> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok((buf, InputSource::Stdin))
        }
        Some(path) => {
            let buf = fs::read_to_string(path)?;
            Ok((buf, InputSource::File(path.to_string())))
        }
    }
}

#[derive(Clone, Debug)]
enum OutputTarget {
    Stdout,
    File(String),
}

impl OutputTarget {
    fn from_arg(output: Option<&str>) -> Self {
        match output {
            Some(path) if path != "-" => OutputTarget::File(path.to_string()),
            _ => OutputTarget::Stdout,
        }
    }

    fn path(&self) -> Option<&str> {
        match self {
            OutputTarget::Stdout => None,
            OutputTarget::File(path) => Some(path.as_str()),
        }
    }
}

fn with_output_writer<F>(path: Option<&str>, f: F) -> Result<(), Box<dyn Error>>
where
    F: FnOnce(&mut dyn Write) -> Result<(), Box<dyn Error>>,
{
    match path {
        Some(path) => {
            let mut file = fs::File::create(path)?;
            f(&mut file)
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            f(&mut handle)
        }
    }
}

fn write_output(path: Option<&str>, data: &[u8]) -> Result<(), Box<dyn Error>> {
    with_output_writer(path, |writer| {
        writer.write_all(data)?;
        Ok(())
    })
}

fn write_json(
    writer: &mut dyn Write,
    value: &serde_json::Value,
    indent: usize,
) -> Result<(), Box<dyn Error>> {
    if indent == 0 {
        serde_json::to_writer(writer, value)?;
        return Ok(());
    }

    let indent_bytes = vec![b' '; indent];
    let formatter = serde_json::ser::PrettyFormatter::with_indent(&indent_bytes);
    let mut serializer = serde_json::Serializer::with_formatter(writer, formatter);
    value.serialize(&mut serializer)?;
    Ok(())
}

fn report_status(mode: Mode, input_source: &InputSource, output_path: &str) {
    let input_label = match input_source {
        InputSource::Stdin => "stdin".to_string(),
        InputSource::File(path) => display_path(path),
    };
    let verb = match mode {
        Mode::Encode => "Encoded",
        Mode::Decode => "Decoded",
    };
    println!("✔ {verb} {input_label} → {}", display_path(output_path));
}

fn display_path(path: &str) -> String {
    let path = Path::new(path);
    let Ok(cwd) = std::env::current_dir() else {
        return path.to_string_lossy().into_owned();
    };
    match path.strip_prefix(&cwd) {
        Ok(relative) => relative.to_string_lossy().into_owned(),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}
