use clap::{Args, Parser, Subcommand, ValueEnum};
use docmapper::{Filter, Found, QueryOptions, Store, ToPlainOptions, UpdatePayload};
use std::path::PathBuf;
use std::process;

/// docmapper CLI: read and write documents in a data directory
#[derive(Parser)]
#[command(name = "docmapper", version, about)]
struct Cli {
    /// Path to the data directory (default: current directory)
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

/// How results are shaped on output
#[derive(Args, Clone, Copy)]
struct ShapeArgs {
    /// Print raw stored records, skipping hydration
    #[arg(long)]
    lean: bool,
    /// Include virtual fields
    #[arg(long)]
    virtuals: bool,
    /// Apply getters to field values
    #[arg(long)]
    getters: bool,
}

impl ShapeArgs {
    fn query_options(&self) -> QueryOptions {
        QueryOptions {
            lean: self.lean,
            virtuals: self.virtuals,
            getters: self.getters,
            ..QueryOptions::default()
        }
    }

    fn plain(&self) -> ToPlainOptions {
        ToPlainOptions {
            getters: self.getters,
            virtuals: self.virtuals,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// List documents matching equality filters
    Find {
        /// Model name
        model: String,
        /// Equality filters (e.g. --filter role=admin)
        #[arg(long = "filter", value_parser = parse_key_value)]
        filters: Vec<(String, String)>,
        /// Return at most this many documents
        #[arg(long)]
        limit: Option<usize>,
        #[command(flatten)]
        shape: ShapeArgs,
    },

    /// Get a single document by ID
    Get {
        /// Model name
        model: String,
        /// Document ID
        id: String,
        #[command(flatten)]
        shape: ShapeArgs,
    },

    /// Count documents matching equality filters
    Count {
        /// Model name
        model: String,
        #[arg(long = "filter", value_parser = parse_key_value)]
        filters: Vec<(String, String)>,
    },

    /// Create and save a new document
    Insert {
        /// Model name
        model: String,
        /// Field or virtual values (e.g. --field fullName="Ada Lovelace")
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
    },

    /// Update one document by ID
    Update {
        /// Model name
        model: String,
        /// Document ID
        id: String,
        /// Field values to set (e.g. --field role=admin)
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
        /// Fields to remove
        #[arg(long = "unset")]
        unset: Vec<String>,
        #[command(flatten)]
        shape: ShapeArgs,
    },

    /// Delete a document by ID
    Delete {
        /// Model name
        model: String,
        /// Document ID
        id: String,
        /// Show what would be deleted without actually deleting
        #[arg(long)]
        dry_run: bool,
    },

    /// Show models, record counts and unclaimed collections
    Status,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Invalid key=value pair: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open(&cli.data_dir)?;

    match cli.command {
        Command::Find {
            model,
            filters,
            limit,
            shape,
        } => {
            let options = QueryOptions {
                limit,
                ..shape.query_options()
            };
            let found = store
                .model(&model)?
                .find(Filter::from_equalities(fields_to_map(&filters)), options)
                .await?;
            let docs: Vec<_> = found
                .iter()
                .map(|f| serde_json::Value::Object(f.to_plain(shape.plain())))
                .collect();
            print_output(&serde_json::Value::Array(docs), &cli.format)?;
        }

        Command::Get { model, id, shape } => {
            let found = store
                .model(&model)?
                .find_by_id(&id, shape.query_options())
                .await?
                .ok_or_else(|| docmapper::Error::NotFound {
                    model: model.clone(),
                    id: id.clone(),
                })?;
            print_found(&found, shape, &cli.format)?;
        }

        Command::Count { model, filters } => {
            let n = store
                .model(&model)?
                .count(Filter::from_equalities(fields_to_map(&filters)))
                .await?;
            print_output(&serde_json::json!({ "count": n }), &cli.format)?;
        }

        Command::Insert { model, fields } => {
            let doc = store.model(&model)?.create(fields_to_map(&fields)).await?;
            print_output(&serde_json::json!({ "id": doc.id() }), &cli.format)?;
        }

        Command::Update {
            model,
            id,
            fields,
            unset,
            shape,
        } => {
            let mut update = UpdatePayload::new();
            for (field, value) in fields_to_map(&fields) {
                update = update.set(&field, value);
            }
            for field in &unset {
                update = update.unset(field);
            }
            let options = QueryOptions {
                return_after_update: true,
                ..shape.query_options()
            };
            let found = store
                .model(&model)?
                .find_one_and_update(Filter::by_id(&id), update, options)
                .await?
                .ok_or_else(|| docmapper::Error::NotFound {
                    model: model.clone(),
                    id: id.clone(),
                })?;
            print_found(&found, shape, &cli.format)?;
        }

        Command::Delete { model, id, dry_run } => {
            let handle = store.model(&model)?;
            let found = handle
                .find_by_id(&id, QueryOptions::default())
                .await?
                .ok_or_else(|| docmapper::Error::NotFound {
                    model: model.clone(),
                    id: id.clone(),
                })?;
            if dry_run {
                print_output(
                    &serde_json::json!({
                        "dry_run": true,
                        "would_delete": { "model": model, "id": id },
                        "document": found.to_plain(ToPlainOptions::default()),
                    }),
                    &cli.format,
                )?;
            } else if let Some(mut doc) = found.into_document() {
                doc.remove().await?;
                print_output(&serde_json::json!({ "ok": true, "deleted": id }), &cli.format)?;
            }
        }

        Command::Status => {
            let result = store.status().await?;
            print_output(&result, &cli.format)?;
        }
    }

    Ok(())
}

fn print_found(
    found: &Found,
    shape: ShapeArgs,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    print_output(&serde_json::Value::Object(found.to_plain(shape.plain())), format)
}

fn print_output(
    value: &serde_json::Value,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

fn fields_to_map(fields: &[(String, String)]) -> serde_json::Map<String, serde_json::Value> {
    let mut map = serde_json::Map::new();
    for (key, val) in fields {
        // Try to parse as JSON value (for numbers, booleans, arrays, objects)
        let json_val = serde_json::from_str(val).unwrap_or(serde_json::Value::String(val.clone()));
        map.insert(key.clone(), json_val);
    }
    map
}
