//! Tessera CLI - Command-line tool for inspecting and editing plugin files.
//!
//! This is the main entry point for the Tessera command-line application.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;

use tessera::common::convert;
use tessera::prelude::*;

/// Tessera - plugin file inspection and editing tool
#[derive(Parser)]
#[command(name = "tessera")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Record layout definition (XML)
    #[arg(long, global = true, env = "TESSERA_SCHEMA")]
    schema: Option<PathBuf>,

    /// Locale of the string tables
    #[arg(long, global = true, env = "TESSERA_LOCALE")]
    locale: Option<String>,

    /// Record types to skip while decoding (comma-separated)
    #[arg(long, global = true, env = "TESSERA_SKIP", value_delimiter = ',')]
    skip: Vec<String>,

    /// Do not resolve FormIDs to record labels
    #[arg(long, global = true)]
    no_links: bool,

    /// JSON settings file; command-line values take precedence
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the header, masters and record counts of a plugin
    Info {
        /// Path to the plugin file
        plugin: PathBuf,
    },

    /// Print the record tree with formatted subrecords
    Dump {
        /// Path to the plugin file
        plugin: PathBuf,

        /// Only dump the record with this FormID (hex)
        #[arg(short, long)]
        form_id: Option<String>,
    },

    /// Decode and re-encode a plugin, checking the result
    Roundtrip {
        /// Path to the plugin file
        plugin: PathBuf,

        /// Write the re-encoded plugin here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the localized strings of a plugin
    Strings {
        /// Path to the plugin file
        plugin: PathBuf,
    },

    /// Apply a JSON batch edit to every matching record
    Batch {
        /// Path to the plugin file
        plugin: PathBuf,

        /// Batch criteria (JSON)
        #[arg(short, long)]
        criteria: PathBuf,

        /// Output plugin; defaults to overwriting the input
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List editor IDs
    Ids {
        /// Path to the plugin file
        plugin: PathBuf,

        /// Lowercase the IDs
        #[arg(short, long)]
        lowercase: bool,
    },
}

/// Keys accepted in the `--settings` file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Settings {
    schema: Option<PathBuf>,
    locale: Option<String>,
    skip: Vec<String>,
    no_links: bool,
}

/// Settings after merging the file, the environment and the command line.
struct Config {
    schema: Option<PathBuf>,
    locale: String,
    skip: Vec<Tag>,
    links: bool,
}

impl Config {
    fn resolve(cli: &Cli) -> Result<Self> {
        let file = match &cli.settings {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read settings {}", path.display()))?;
                serde_json::from_str(&text).context("Failed to parse settings")?
            }
            None => Settings::default(),
        };

        let skip_names = if cli.skip.is_empty() { &file.skip } else { &cli.skip };
        let skip = skip_names
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .map(|name| name.parse::<Tag>().with_context(|| format!("Invalid record type {name:?}")))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            schema: cli.schema.clone().or(file.schema),
            locale: cli
                .locale
                .clone()
                .or(file.locale)
                .unwrap_or_else(|| "English".to_string()),
            skip,
            links: !(cli.no_links || file.no_links),
        })
    }

    fn load_schema(&self) -> Result<Schema> {
        match &self.schema {
            Some(path) => Schema::load(path)
                .with_context(|| format!("Failed to load schema {}", path.display())),
            None => {
                tracing::info!("No schema given; subrecords are shown as hex");
                Ok(Schema::default())
            }
        }
    }

    fn decode_options(&self) -> DecodeOptions {
        DecodeOptions::new().skip_all(self.skip.iter().copied())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = Config::resolve(&cli)?;

    match &cli.command {
        Commands::Info { plugin } => cmd_info(plugin, &config)?,
        Commands::Dump { plugin, form_id } => cmd_dump(plugin, form_id.as_deref(), &config)?,
        Commands::Roundtrip { plugin, output } => cmd_roundtrip(plugin, output.as_deref(), &config)?,
        Commands::Strings { plugin } => cmd_strings(plugin, &config)?,
        Commands::Batch { plugin, criteria, output } => {
            cmd_batch(plugin, criteria, output.as_deref(), &config)?
        }
        Commands::Ids { plugin, lowercase } => cmd_ids(plugin, *lowercase, &config)?,
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn open_plugin(path: &Path, config: &Config) -> Result<Plugin> {
    let start = Instant::now();
    let plugin = Plugin::open(path, &config.decode_options())
        .with_context(|| format!("Failed to open plugin {}", path.display()))?;
    tracing::debug!("Loaded {} nodes in {:?}", plugin.len(), start.elapsed());
    Ok(plugin)
}

fn load_strings(path: &Path, plugin: &Plugin, config: &Config) -> Result<Option<LocalizedStrings>> {
    let localized = plugin
        .header_record()
        .and_then(|h| plugin.record(h).ok())
        .is_some_and(|h| h.is_localized());
    if !localized {
        return Ok(None);
    }
    let strings = LocalizedStrings::load_for_plugin(path, &config.locale)
        .context("Failed to load string tables")?;
    Ok(Some(strings))
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn cmd_info(path: &Path, config: &Config) -> Result<()> {
    let plugin = open_plugin(path, config)?;

    println!("Plugin: {}", plugin.name());
    println!("Layout: {:?}", plugin.layout());

    if let Some(header) = plugin.header_record() {
        let record = plugin.record(header)?;
        println!("Flags: {:#010X}{}", record.flags1, if record.is_localized() { " (localized)" } else { "" });

        if let Some(hedr) = plugin.find_subrecord(header, "HEDR".parse()?) {
            let data = plugin.subrecord(hedr)?.data();
            if data.len() >= 12 {
                println!("Version: {}", convert::to_f32(&data[0..4])?);
                println!("Records: {}", convert::to_u32(&data[4..8])?);
                println!("Next object ID: {:08X}", convert::to_u32(&data[8..12])?);
            }
        }
        if let Some(author) = plugin.find_subrecord(header, "CNAM".parse()?) {
            println!("Author: {}", plugin.subrecord(author)?.as_cstr());
        }
    }

    let masters = plugin.masters();
    if !masters.is_empty() {
        println!("Masters:");
        for master in &masters {
            println!("  {master}");
        }
    }

    println!("\nTop-level groups:");
    let mut total = 0;
    for &child in plugin.children(plugin.root())? {
        let Ok(group) = plugin.group(child) else {
            continue;
        };
        let count = plugin.records(child)?.len();
        total += count;
        match group.contents_type() {
            Some(contents) => println!("  {contents}: {count} records"),
            None => println!("  {:?}: {count} records", group.kind()),
        }
    }
    println!("\nTotal: {} records, {} bytes", total, plugin.total_size(plugin.root())?);

    Ok(())
}

fn cmd_dump(path: &Path, form_id: Option<&str>, config: &Config) -> Result<()> {
    let schema = config.load_schema()?;
    let plugin = open_plugin(path, config)?;
    let strings = load_strings(path, &plugin, config)?;

    let mut lookup = PluginLookup::new(&plugin).with_links(config.links);
    if let Some(strings) = &strings {
        lookup = lookup.with_strings(strings);
    }

    let start = match form_id {
        Some(text) => {
            let id = u32::from_str_radix(text.trim_start_matches("0x"), 16)
                .with_context(|| format!("Invalid FormID {text:?}"))?;
            plugin
                .lookup_form_id(id)
                .with_context(|| format!("No record with FormID {id:08X}"))?
        }
        None => plugin.root(),
    };

    for (level, node) in dump_nodes(&plugin, start)? {
        let indent = "  ".repeat(level);
        match plugin.kind(node)? {
            NodeKind::Plugin | NodeKind::Subrecord => {}
            NodeKind::Group => {
                let group = plugin.group(node)?;
                match group.contents_type() {
                    Some(contents) => println!("{indent}GRUP {contents}"),
                    None => println!("{indent}GRUP {:?} {:02X?}", group.kind(), group.label),
                }
            }
            NodeKind::Record => {
                let label = plugin.description(node).unwrap_or_default();
                println!("{indent}{label}");
                for formatted in format_record(&plugin, node, &schema, &lookup)? {
                    for line in formatted.to_string().lines() {
                        println!("{indent}  {line}");
                    }
                }
            }
        }
    }

    Ok(())
}

/// Groups and records under `start`, each with its indent level.
fn dump_nodes(plugin: &Plugin, start: NodeId) -> Result<Vec<(usize, NodeId)>> {
    let base = plugin.depth(start)?;
    let mut out = Vec::new();
    for node in plugin.descendants(start)? {
        if matches!(plugin.kind(node)?, NodeKind::Group | NodeKind::Record) {
            out.push((plugin.depth(node)? - base, node));
        }
    }
    Ok(out)
}

fn cmd_roundtrip(path: &Path, output: Option<&Path>, config: &Config) -> Result<()> {
    let original = fs::read(path).context("Failed to read plugin")?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_message("Decoding");
    let start = Instant::now();
    let options = config.decode_options();
    let mut session = DecodeSession::new(&options);
    let plugin = session.decode(&original, &path.display().to_string())?;
    let stats = session.stats();

    spinner.set_message("Encoding");
    let encoded = plugin.encode()?;
    spinner.finish_and_clear();

    println!(
        "Decoded {} groups, {} records ({} compressed), {} subrecords in {:?}",
        stats.groups,
        stats.records,
        stats.compressed,
        stats.subrecords,
        start.elapsed()
    );

    if stats.compressed == 0 && stats.skipped == 0 {
        if encoded != original {
            let offset = encoded
                .iter()
                .zip(&original)
                .position(|(a, b)| a != b)
                .unwrap_or(encoded.len().min(original.len()));
            anyhow::bail!(
                "Re-encoded plugin differs from the original at offset {:#x} ({} vs {} bytes)",
                offset,
                encoded.len(),
                original.len()
            );
        }
        println!("Round trip is byte-exact ({} bytes)", encoded.len());
    } else {
        let again = Plugin::decode(&encoded, &DecodeOptions::new())?.encode()?;
        if again != encoded {
            anyhow::bail!("Re-encoding is not stable");
        }
        println!(
            "Round trip is stable ({} -> {} bytes, compressed records written uncompressed)",
            original.len(),
            encoded.len()
        );
    }

    if let Some(output) = output {
        fs::write(output, &encoded).context("Failed to write output file")?;
        println!("Written to {}", output.display());
    }

    Ok(())
}

fn cmd_strings(path: &Path, config: &Config) -> Result<()> {
    let strings = LocalizedStrings::load_for_plugin(path, &config.locale)
        .context("Failed to load string tables")?;

    for kind in StringsKind::ALL {
        for (id, text) in strings.table(kind).iter() {
            println!("{kind} {id:08X} {text}");
        }
    }
    println!("\nTotal: {} strings", strings.len());

    Ok(())
}

fn cmd_batch(path: &Path, criteria_path: &Path, output: Option<&Path>, config: &Config) -> Result<()> {
    let schema = config.load_schema()?;
    let text = fs::read_to_string(criteria_path).context("Failed to read batch criteria")?;
    let criteria: BatchCriteria = serde_json::from_str(&text).context("Failed to parse batch criteria")?;

    // The edited plugin is written back whole, so nothing may be skipped.
    if !config.skip.is_empty() {
        tracing::warn!("Ignoring skipped record types for batch edits");
    }
    let mut plugin = Plugin::open(path, &DecodeOptions::new())
        .with_context(|| format!("Failed to open plugin {}", path.display()))?;

    let records = plugin.records(plugin.root())?;
    println!("Applying batch edit to {} records...", records.len());

    let pb = progress_bar(records.len())?;
    let mut totals = BatchReport::default();
    for chunk in records.chunks(256) {
        let report = apply_batch(&mut plugin, &schema, chunk, &criteria);
        totals.records += report.records;
        totals.modified += report.modified;
        totals.created += report.created;
        totals.deleted += report.deleted;
        totals.assigned += report.assigned;
        totals.failures.extend(report.failures);
        pb.inc(chunk.len() as u64);
    }
    pb.finish_with_message("Done");

    for failure in &totals.failures {
        match &failure.field {
            Some(field) => eprintln!("{:08X} {}: {}", failure.form_id, field, failure.error),
            None => eprintln!("{:08X}: {}", failure.form_id, failure.error),
        }
    }
    println!(
        "Matched {} records: {} modified, {} subrecords created, {} deleted, {} fields assigned ({} failures)",
        totals.records,
        totals.modified,
        totals.created,
        totals.deleted,
        totals.assigned,
        totals.failures.len()
    );

    let output = output.unwrap_or(path);
    plugin.save(output).context("Failed to write plugin")?;
    println!("Written to {}", output.display());

    Ok(())
}

fn cmd_ids(path: &Path, lowercase: bool, config: &Config) -> Result<()> {
    let plugin = open_plugin(path, config)?;
    let ids = plugin.get_ids(plugin.root(), lowercase)?;
    for id in &ids {
        println!("{id}");
    }
    println!("\nTotal: {} IDs", ids.len());
    Ok(())
}
