use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};
use ess_core::core_api::{Engine, Session};
use ess_core::{CompressionType, DecodeMode, DecodeStats, ReadOptions, verify_identical};
use ess_render::{
    FieldSelection, JsonStyle, TextRenderOptions, TextStyle, render_decode_stats_json,
    render_decode_stats_text, render_json_full, render_json_selected, render_text_with_options,
};
use serde_json::Value as JsonValue;
use tracing::Level;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum CompressionArg {
    None,
    Zlib,
    Lz4,
}

impl From<CompressionArg> for CompressionType {
    fn from(arg: CompressionArg) -> Self {
        match arg {
            CompressionArg::None => CompressionType::None,
            CompressionArg::Zlib => CompressionType::Zlib,
            CompressionArg::Lz4 => CompressionType::Lz4,
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    #[arg(value_name = "SAVE.ess|SAVE.fos")]
    path: PathBuf,
    #[arg(long)]
    header: bool,
    #[arg(long)]
    plugins: bool,
    #[arg(long)]
    globals: bool,
    #[arg(long = "global-variables")]
    global_variables: bool,
    #[arg(long = "change-forms")]
    change_forms: bool,
    #[arg(long)]
    capabilities: bool,
    #[arg(long)]
    json: bool,
    /// Debug logging on stderr and a full change-form listing.
    #[arg(short, long)]
    verbose: bool,
    /// Decode every change-form body and report the outcome.
    #[arg(long)]
    decode: bool,
    /// Treat any body that does not decode cleanly as an error.
    #[arg(long)]
    strict: bool,
    /// Serialize, re-read and compare against the loaded save.
    #[arg(long)]
    verify: bool,
    #[arg(long, value_enum, value_name = "none|zlib|lz4")]
    compression: Option<CompressionArg>,
    #[arg(long)]
    output: Option<PathBuf>,
}

impl Cli {
    fn fields(&self) -> FieldSelection {
        FieldSelection {
            header: self.header,
            plugins: self.plugins,
            globals: self.globals,
            global_variables: self.global_variables,
            change_forms: self.change_forms,
            capabilities: self.capabilities,
        }
    }

    fn decode_mode(&self) -> DecodeMode {
        if self.strict {
            DecodeMode::Strict
        } else {
            DecodeMode::BestEffort
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.compression.is_some() && cli.output.is_none() {
        eprintln!("--compression requires --output <PATH>");
        process::exit(2);
    }

    let engine = Engine::with_options(ReadOptions {
        decode: cli.decode_mode(),
        ..ReadOptions::default()
    });
    let mut session = engine.open_path(&cli.path).unwrap_or_else(|e| {
        eprintln!("Error parsing save file: {}", cli.path.display());
        eprintln!("  {}", e);
        process::exit(1);
    });

    let stats = (cli.decode || cli.strict).then(|| session.decode_all());

    if cli.verify {
        verify_roundtrip(&engine, &session);
    }

    if let Some(out_path) = &cli.output {
        if let Some(kind) = cli.compression {
            session.set_compression(kind.into()).unwrap_or_else(|e| {
                eprintln!("Error selecting compression: {e}");
                process::exit(1);
            });
        }
        session.write_path(out_path).unwrap_or_else(|e| {
            eprintln!("Error writing {}: {e}", out_path.display());
            process::exit(1);
        });
        info!(path = %out_path.display(), "wrote save");
    }

    if cli.json {
        print_json(&cli, &session, stats.as_ref());
    } else {
        print_text(&cli, &session, stats.as_ref());
    }

    if cli.strict && stats.as_ref().is_some_and(|s| !s.failed.is_empty()) {
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Could not install logger: {e}");
    }
}

fn verify_roundtrip(engine: &Engine, session: &Session) {
    let bytes = session.to_bytes().unwrap_or_else(|e| {
        eprintln!("Error serializing save for verification: {e}");
        process::exit(1);
    });
    let reread = engine.open_bytes(&bytes).unwrap_or_else(|e| {
        eprintln!("Error re-reading serialized save: {e}");
        process::exit(1);
    });
    if let Err(e) = verify_identical(session.ess(), reread.ess()) {
        eprintln!("Verification failed: {e}");
        process::exit(1);
    }
    info!(size = bytes.len(), "verified round trip");
}

fn print_json(cli: &Cli, session: &Session, stats: Option<&DecodeStats>) {
    let fields = cli.fields();
    let mut json = if fields.is_any_selected() {
        render_json_selected(session, &fields, JsonStyle::CanonicalV1)
    } else {
        render_json_full(session, JsonStyle::CanonicalV1)
    };
    if let (Some(stats), JsonValue::Object(map)) = (stats, &mut json) {
        map.insert("decode".to_string(), render_decode_stats_json(stats));
    }
    if cli.verify
        && let JsonValue::Object(map) = &mut json
    {
        map.insert("verified".to_string(), JsonValue::Bool(true));
    }

    let rendered = serde_json::to_string_pretty(&json).unwrap_or_else(|e| {
        eprintln!("Error rendering JSON output: {e}");
        process::exit(1);
    });
    println!("{rendered}");
}

fn print_text(cli: &Cli, session: &Session, stats: Option<&DecodeStats>) {
    let fields = cli.fields();
    if fields.is_any_selected() {
        let json = render_json_selected(session, &fields, JsonStyle::CanonicalV1);
        if let JsonValue::Object(map) = json {
            for (key, value) in map {
                match value {
                    JsonValue::Array(items) => {
                        for item in items {
                            println!("{key}={}", flatten(&item));
                        }
                    }
                    other => println!("{key}={}", flatten(&other)),
                }
            }
        }
    } else {
        let options = TextRenderOptions { verbose: cli.verbose };
        print!("{}", render_text_with_options(session, TextStyle::Summary, options));
    }

    if let Some(stats) = stats {
        print!("{}", render_decode_stats_text(stats));
    }
    if cli.verify {
        println!("Verified: round trip is structurally identical");
    }
    if let Some(out_path) = &cli.output {
        println!("Wrote save to {}", out_path.display());
    }
}

/// One-line `k=v` rendering of a JSON value for field mode.
fn flatten(value: &JsonValue) -> String {
    match value {
        JsonValue::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{k}:{}", flatten(v)))
            .collect::<Vec<_>>()
            .join(" "),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}
