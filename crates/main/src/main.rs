use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use report_sheet::{DocumentComposer, FontResolver, FontRole, ReportKind, ReportRecord};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

/// Renders incident and near-miss report sheets from the command line.
///
/// Japanese fonts are looked up in the usual system locations. Point the
/// `REPORT_SHEET_BODY_FONT` and `REPORT_SHEET_LABEL_FONT` environment variables at font
/// files to override them.
#[derive(Parser)]
#[command(author, version, about = "Render one-page report sheets to PDF")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a record stored as a flat JSON object.
    Render {
        /// JSON file with the report fields.
        #[arg(long, short)]
        input: PathBuf,
        /// Destination PDF.
        #[arg(long, short)]
        output: PathBuf,
        /// Form to use; overrides the `kind` field of the input.
        #[arg(long)]
        kind: Option<ReportKind>,
    },

    /// Render the built-in sample record.
    Sample {
        /// Form to use.
        #[arg(long, default_value = "accident")]
        kind: ReportKind,
        /// Destination PDF.
        #[arg(long, short, default_value = "sample_report.pdf")]
        output: PathBuf,
    },

    /// Show which font each role resolves to.
    Fonts,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Render {
            input,
            output,
            kind,
        } => render(&input, &output, kind),
        Commands::Sample { kind, output } => write_report(&ReportRecord::sample(kind), &output),
        Commands::Fonts => {
            print_fonts();
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        print_error_sources(err.as_ref());
        std::process::exit(1);
    }
}

fn render(input: &Path, output: &Path, kind: Option<ReportKind>) -> Result<(), Box<dyn Error>> {
    let text = fs::read_to_string(input)?;
    let mut fields = flatten_fields(&serde_json::from_str::<Value>(&text)?)
        .ok_or_else(|| format!("{} does not contain a JSON object", input.display()))?;
    if let Some(kind) = kind {
        fields.insert("kind".into(), kind.as_str().into());
    }
    write_report(&ReportRecord::from_fields(&fields), output)
}

fn write_report(record: &ReportRecord, output: &Path) -> Result<(), Box<dyn Error>> {
    let path = DocumentComposer::system().render_to_file(record, output)?;
    let size = fs::metadata(&path)?.len();
    println!("Generated {} ({} bytes)", path.display(), size);
    Ok(())
}

/// Turns a JSON object into the flat string mapping the record reader expects.
///
/// Arrays are joined with commas; nulls are treated as missing.
fn flatten_fields(value: &Value) -> Option<BTreeMap<String, String>> {
    let object = value.as_object()?;
    Some(
        object
            .iter()
            .filter_map(|(key, value)| scalar_text(value).map(|text| (key.clone(), text)))
            .collect(),
    )
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(scalar_text)
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Object(_) => None,
    }
}

fn print_fonts() {
    let fonts = FontResolver::system().resolve();
    for role in FontRole::ALL {
        let resolution = fonts.resolution(role);
        println!(
            "{:?}: {} ({})",
            role,
            resolution.value().name(),
            if resolution.is_fallback() {
                "fallback"
            } else {
                "preferred"
            }
        );
    }
}

fn print_error_sources(mut error: &(dyn Error + 'static)) {
    while let Some(source) = error.source() {
        eprintln!("  caused by: {}", source);
        error = source;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_values_are_flattened() {
        let value: Value = serde_json::json!({
            "facility_name": "ひまわり",
            "cause_indices": [1, 6, 12],
            "category_index": 2,
            "others": null
        });
        let fields = flatten_fields(&value).unwrap();
        assert_eq!(fields["facility_name"], "ひまわり");
        assert_eq!(fields["cause_indices"], "1,6,12");
        assert_eq!(fields["category_index"], "2");
        assert!(!fields.contains_key("others"));
    }

    #[test]
    fn non_objects_are_rejected() {
        assert!(flatten_fields(&serde_json::json!([1, 2])).is_none());
    }
}
