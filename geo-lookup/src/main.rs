//! Geo Lookup CLI Application
//!
//! A command-line interface for concurrent IP geolocation lookups.
//! This CLI application provides a user-friendly interface to the geo-lookup-lib library.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use geo_lookup_lib::{load_env_config, ConfigManager, EnvConfig, FileConfig};
use geo_lookup_lib::{parse_address_lines, parse_timeout};
use geo_lookup_lib::{ErrorKind, GeoLocator, Location, LocationResult, LookupConfig, LookupError};
use geo_lookup_lib::OutputMode;
use serde::Serialize;
use std::process;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// Bulk runs above this size need `--force`.
const MAX_ADDRESSES: usize = 10_000;

/// Per-address outcome as produced by the library.
pub(crate) type Outcome = Result<LocationResult, LookupError>;

/// CLI arguments for geo-lookup
#[derive(Parser, Debug)]
#[command(name = "geo-lookup")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Sai Dutt G.V <gvs46@protonmail.com>")]
#[command(about = "Look up IP geolocation for many addresses concurrently")]
#[command(
    long_about = "Look up IP geolocation for many addresses concurrently.\n\nAt most --concurrency lookups are in flight at once. Each lookup has its own\nrequest timeout, and the whole run is bounded by --timeout."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// IP addresses or hostnames to look up
    #[arg(value_name = "ADDRESSES", help_heading = "Input")]
    pub addresses: Vec<String>,

    /// Input file with addresses (one per line, # comments allowed)
    #[arg(short = 'f', long = "file", value_name = "FILE", help_heading = "Input")]
    pub file: Option<String>,

    /// Override the 10000 address limit for bulk runs
    #[arg(long = "force", help_heading = "Input")]
    pub force: bool,

    /// Output results in JSON format
    #[arg(short = 'j', long = "json", help_heading = "Output Format")]
    pub json: bool,

    /// Output results in CSV format
    #[arg(long = "csv", help_heading = "Output Format")]
    pub csv: bool,

    /// Enable grouped, structured output with section headers
    #[arg(short = 'p', long = "pretty", help_heading = "Output Format")]
    pub pretty: bool,

    /// Collect all results before displaying
    #[arg(long = "batch", help_heading = "Output Format")]
    pub batch: bool,

    /// Show results as they complete
    #[arg(long = "streaming", help_heading = "Output Format")]
    pub streaming: bool,

    /// Max concurrent lookups (default: 5, max: 100)
    #[arg(short = 'c', long = "concurrency", help_heading = "Performance")]
    pub concurrency: Option<usize>,

    /// Overall deadline for the whole run (e.g. 5s, 500ms, 2m)
    #[arg(short = 't', long = "timeout", value_name = "DURATION", help_heading = "Performance")]
    pub timeout: Option<String>,

    /// Deadline for each individual lookup (default: 2s)
    #[arg(long = "request-timeout", value_name = "DURATION", help_heading = "Performance")]
    pub request_timeout: Option<String>,

    /// Geolocation endpoint; the address is appended as a path segment
    #[arg(long = "endpoint", value_name = "URL", help_heading = "Service")]
    pub endpoint: Option<String>,

    /// Response language (e.g. en, de, fr)
    #[arg(long = "lang", value_name = "LANG", help_heading = "Service")]
    pub lang: Option<String>,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Show detailed debug information and error messages
    #[arg(short = 'd', long = "debug", help_heading = "Configuration")]
    pub debug: bool,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,
}

/// Output settings resolved from CLI, environment and config file.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OutputSettings {
    pub(crate) json_pretty: bool,
    pub(crate) csv_headers: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            json_pretty: true,
            csv_headers: true,
        }
    }
}

/// Error statistics for aggregated reporting
#[derive(Debug, Default)]
pub(crate) struct ErrorStats {
    pub(crate) timeouts: Vec<String>,
    pub(crate) network_errors: Vec<String>,
    pub(crate) status_errors: Vec<String>,
    pub(crate) decode_errors: Vec<String>,
    pub(crate) invalid_addresses: Vec<String>,
    pub(crate) other_errors: Vec<String>,
}

impl ErrorStats {
    fn add_error(&mut self, error: &LookupError) {
        let address = error.address().unwrap_or("-").to_string();

        if error.is_timeout() {
            self.timeouts.push(address);
            return;
        }

        match error.kind() {
            ErrorKind::Transport => self.network_errors.push(address),
            ErrorKind::Status => self.status_errors.push(address),
            ErrorKind::Decode => self.decode_errors.push(address),
            ErrorKind::RequestConstruction => self.invalid_addresses.push(address),
            _ => self.other_errors.push(address),
        }
    }

    pub(crate) fn has_errors(&self) -> bool {
        !self.timeouts.is_empty()
            || !self.network_errors.is_empty()
            || !self.status_errors.is_empty()
            || !self.decode_errors.is_empty()
            || !self.invalid_addresses.is_empty()
            || !self.other_errors.is_empty()
    }

    /// Non-empty categories in display order.
    pub(crate) fn categories(&self) -> Vec<(&'static str, &[String])> {
        [
            ("timeout", &self.timeouts),
            ("network error", &self.network_errors),
            ("status error", &self.status_errors),
            ("decode error", &self.decode_errors),
            ("invalid address", &self.invalid_addresses),
            ("other error", &self.other_errors),
        ]
        .into_iter()
        .filter(|(_, addresses)| !addresses.is_empty())
        .map(|(label, addresses)| (label, addresses.as_slice()))
        .collect()
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_tracing(&args);

    let env_config = load_env_config();

    // Validate arguments
    if let Err(e) = validate_args(&args, &env_config) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "geo-lookup starting");

    // Run the lookups
    if let Err(e) = run_lookup(args, env_config).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Install the stderr log subscriber.
///
/// `RUST_LOG` wins when set; otherwise `--debug` and `--verbose` pick the level.
fn init_tracing(args: &Args) {
    let default_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "warn"
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Validate command line arguments
fn validate_args(args: &Args, env_config: &EnvConfig) -> Result<(), String> {
    // Must have either addresses or a file
    if args.addresses.is_empty() && args.file.is_none() && env_config.file.is_none() {
        return Err("You must specify addresses or a file with --file".to_string());
    }

    // Can't have conflicting output modes
    if args.batch && args.streaming {
        return Err("Cannot specify both --batch and --streaming modes".to_string());
    }

    // Can't have multiple output formats
    if args.json && args.csv {
        return Err("Cannot specify multiple output formats (--json, --csv)".to_string());
    }

    // Streaming mode doesn't support structured output formats
    if args.streaming && (args.json || args.csv) {
        return Err(
            "Cannot use --streaming with --json or --csv. Use --batch for structured output"
                .to_string(),
        );
    }

    if let Some(concurrency) = args.concurrency {
        if concurrency == 0 || concurrency > 100 {
            return Err("Concurrency must be between 1 and 100".to_string());
        }
    }

    for (flag, value) in [
        ("--timeout", &args.timeout),
        ("--request-timeout", &args.request_timeout),
    ] {
        if let Some(value) = value {
            if parse_timeout(value).is_none() {
                return Err(format!(
                    "Invalid {} '{}'. Use format like '500ms', '5s', '2m' (at most 24h)",
                    flag, value
                ));
            }
        }
    }

    Ok(())
}

/// Main lookup logic
async fn run_lookup(
    mut args: Args,
    env_config: EnvConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let file_config = load_file_config(&args, &env_config)?;

    // Build configuration from CLI args
    let config = build_config(&args, &env_config, &file_config);
    config.validate()?;

    // Fill in output format from env/config when the CLI chose none
    let output = resolve_output(&mut args, &env_config, &file_config);

    let addresses = get_addresses(&args, &env_config).await?;

    if addresses.len() > MAX_ADDRESSES && !args.force {
        return Err(format!(
            "{} addresses exceeds the limit of {}. Use --force to run anyway",
            addresses.len(),
            MAX_ADDRESSES
        )
        .into());
    }

    let locator = GeoLocator::with_config(config)?;

    match output_mode(&args, addresses.len()) {
        OutputMode::Streaming => run_streaming_lookup(&locator, addresses, &args).await?,
        OutputMode::Collected => run_batch_lookup(&locator, addresses, &args, &output).await?,
    }

    Ok(())
}

/// Determine whether to stream or collect results
fn output_mode(args: &Args, address_count: usize) -> OutputMode {
    // Force batch mode if explicitly requested
    if args.batch {
        return OutputMode::Collected;
    }

    // Force streaming mode if explicitly requested
    if args.streaming {
        return OutputMode::Streaming;
    }

    // Stream multiple addresses unless in JSON/CSV mode
    if address_count > 1 && !args.json && !args.csv {
        return OutputMode::Streaming;
    }

    OutputMode::Collected
}

/// Run lookups in streaming mode, printing each outcome as it arrives
async fn run_streaming_lookup(
    locator: &GeoLocator,
    addresses: Vec<String>,
    args: &Args,
) -> Result<(), Box<dyn std::error::Error>> {
    use futures::StreamExt;

    let total = addresses.len();

    if args.pretty {
        ui::print_header(total, locator.config());
    }

    let mut located = 0usize;
    let mut failed = 0usize;
    let mut error_stats = ErrorStats::default();

    let start_time = std::time::Instant::now();
    let mut stream = locator.locate_stream(addresses)?;

    while let Some(outcome) = stream.next().await {
        match &outcome {
            Ok(_) => located += 1,
            Err(e) => {
                failed += 1;
                error_stats.add_error(e);
            }
        }

        let completed = located + failed;
        let counter = if total > 1 {
            Some((completed, total))
        } else {
            None
        };
        if args.pretty {
            ui::print_outcome(&outcome, args.debug, counter);
        } else {
            ui::print_outcome_default(&outcome, args.debug, counter);
        }
    }

    let duration = start_time.elapsed();

    tracing::debug!(
        received = stream.received(),
        peak_in_flight = stream.peak_in_flight(),
        "run drained"
    );

    if total > 1 {
        println!();
        ui::print_summary(total, located, failed, duration);
        if error_stats.has_errors() {
            println!();
            ui::print_error_summary(&error_stats, args);
        }
    }

    Ok(())
}

/// Run lookups in batch mode (collect all results first)
async fn run_batch_lookup(
    locator: &GeoLocator,
    addresses: Vec<String>,
    args: &Args,
    output: &OutputSettings,
) -> Result<(), Box<dyn std::error::Error>> {
    let is_structured = args.json || args.csv;
    let count = addresses.len();

    if args.pretty && !is_structured && count > 1 {
        ui::print_header(count, locator.config());
    }

    // Spinner::start returns None if stderr isn't a TTY
    let spinner = if !is_structured && count > 1 {
        ui::Spinner::start(format!("Looking up {} addresses...", count))
    } else {
        None
    };

    let start_time = std::time::Instant::now();
    let outcomes = locator.locate_all(addresses).await?;
    let duration = start_time.elapsed();

    if let Some(s) = spinner {
        s.stop().await;
    }

    display_results(&outcomes, args, output, duration)?;

    Ok(())
}

/// Load the config file named by `--config`/`GEO_CONFIG`, or discover one.
fn load_file_config(
    args: &Args,
    env_config: &EnvConfig,
) -> Result<FileConfig, Box<dyn std::error::Error>> {
    let config_manager = ConfigManager::new(args.verbose);

    let explicit = args
        .config
        .as_ref()
        .map(|path| (path, "CLI --config"))
        .or_else(|| env_config.config.as_ref().map(|path| (path, "GEO_CONFIG env var")));

    match explicit {
        Some((path, source)) => {
            tracing::info!(path = %path, source, "using explicit config file");
            config_manager
                .load_file(path)
                .map_err(|e| format!("Failed to load config file '{}': {}", path, e).into())
        }
        None => Ok(config_manager.discover_and_load()?),
    }
}

/// Build LookupConfig with config file and environment integration.
///
/// Precedence order (highest to lowest):
/// 1. CLI arguments (explicit user input)
/// 2. Environment variables (GEO_*)
/// 3. Config files (explicit, or local > global > XDG)
/// 4. Built-in defaults
fn build_config(args: &Args, env_config: &EnvConfig, file_config: &FileConfig) -> LookupConfig {
    let config = file_config.apply_to(LookupConfig::default());
    let config = env_config.apply_to(config);
    apply_cli_args_to_config(config, args)
}

/// Apply CLI arguments to config (highest precedence).
///
/// Durations were checked by `validate_args`.
fn apply_cli_args_to_config(mut config: LookupConfig, args: &Args) -> LookupConfig {
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(timeout) = args.timeout.as_deref().and_then(parse_timeout) {
        config.timeout = timeout;
    }
    if let Some(timeout) = args.request_timeout.as_deref().and_then(parse_timeout) {
        config.request_timeout = timeout;
    }
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(lang) = &args.lang {
        config.lang = Some(lang.clone());
    }
    config
}

/// Resolve output format and formatting flags.
///
/// An explicit `--json`/`--csv`/`--streaming` on the command line wins;
/// otherwise `GEO_JSON`/`GEO_CSV`, then `[output] default_format`.
fn resolve_output(
    args: &mut Args,
    env_config: &EnvConfig,
    file_config: &FileConfig,
) -> OutputSettings {
    let file_output = file_config.output.clone().unwrap_or_default();

    if !args.json && !args.csv && !args.streaming {
        if env_config.has_output_format_conflict() {
            tracing::warn!("both GEO_JSON and GEO_CSV are set, ignoring both");
        } else if env_config.json == Some(true) {
            args.json = true;
        } else if env_config.csv == Some(true) {
            args.csv = true;
        } else {
            match file_output.default_format.as_deref() {
                Some("json") => args.json = true,
                Some("csv") => args.csv = true,
                _ => {}
            }
        }
    }

    let defaults = OutputSettings::default();
    OutputSettings {
        json_pretty: file_output.json_pretty.unwrap_or(defaults.json_pretty),
        csv_headers: file_output.csv_headers.unwrap_or(defaults.csv_headers),
    }
}

/// Get the list of addresses from CLI args and the address file
async fn get_addresses(
    args: &Args,
    env_config: &EnvConfig,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let mut addresses = args.addresses.clone();

    let file = args
        .file
        .as_ref()
        .map(|path| (path, "CLI --file"))
        .or_else(|| env_config.file.as_ref().map(|path| (path, "GEO_FILE env var")));

    if let Some((path, source)) = file {
        tracing::info!(path = %path, source, "reading addresses from file");
        addresses.extend(read_addresses_from_file(path).await?);
    }

    if addresses.is_empty() {
        return Err("No addresses found to look up".into());
    }

    Ok(addresses)
}

/// Read addresses from a file
async fn read_addresses_from_file(file_path: &str) -> Result<Vec<String>, LookupError> {
    let content = tokio::fs::read_to_string(file_path)
        .await
        .map_err(|e| LookupError::file_error(file_path, e.to_string()))?;

    let addresses = parse_address_lines(&content);
    if addresses.is_empty() {
        return Err(LookupError::file_error(
            file_path,
            "No addresses found in the file",
        ));
    }

    Ok(addresses)
}

fn display_results(
    outcomes: &[Outcome],
    args: &Args,
    output: &OutputSettings,
    duration: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    if args.json {
        println!("{}", format_json(outcomes, output.json_pretty)?);
    } else if args.csv {
        print!("{}", format_csv(outcomes, output.csv_headers));
    } else {
        display_text_results(outcomes, args, duration);
    }

    Ok(())
}

/// One row of JSON output.
#[derive(Debug, Serialize)]
struct OutcomeRecord<'a> {
    address: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lookup_ms: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<String>,
}

impl<'a> From<&'a Outcome> for OutcomeRecord<'a> {
    fn from(outcome: &'a Outcome) -> Self {
        match outcome {
            Ok(result) => Self {
                address: &result.address,
                location: Some(&result.location),
                lookup_ms: result.lookup_duration.map(|d| d.as_millis()),
                error: None,
                error_kind: None,
            },
            Err(e) => Self {
                address: e.address().unwrap_or("-"),
                location: None,
                lookup_ms: None,
                error: Some(e.to_string()),
                error_kind: Some(e.kind().to_string()),
            },
        }
    }
}

/// Format outcomes as a JSON array
fn format_json(outcomes: &[Outcome], pretty: bool) -> Result<String, serde_json::Error> {
    let records: Vec<OutcomeRecord<'_>> = outcomes.iter().map(OutcomeRecord::from).collect();
    if pretty {
        serde_json::to_string_pretty(&records)
    } else {
        serde_json::to_string(&records)
    }
}

/// Format outcomes as CSV, one line per address
fn format_csv(outcomes: &[Outcome], headers: bool) -> String {
    let mut out = String::new();
    if headers {
        out.push_str("address,status,country,region,city,lat,lon,isp,error\n");
    }

    for outcome in outcomes {
        let row = match outcome {
            Ok(result) => {
                let loc = &result.location;
                [
                    result.address.clone(),
                    "success".to_string(),
                    loc.country.clone().unwrap_or_default(),
                    loc.region_name.clone().unwrap_or_default(),
                    loc.city.clone().unwrap_or_default(),
                    loc.lat.map(|v| v.to_string()).unwrap_or_default(),
                    loc.lon.map(|v| v.to_string()).unwrap_or_default(),
                    loc.isp.clone().unwrap_or_default(),
                    String::new(),
                ]
            }
            Err(e) => [
                e.address().unwrap_or("-").to_string(),
                "error".to_string(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                e.to_string(),
            ],
        };

        let fields: Vec<String> = row.iter().map(|f| csv_field(f)).collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }

    out
}

/// Quote a CSV field when it contains a separator, quote or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Display results in human-readable text format
fn display_text_results(outcomes: &[Outcome], args: &Args, duration: Duration) {
    if args.pretty {
        ui::print_grouped_results(outcomes, args.debug);
    } else {
        for outcome in outcomes {
            ui::print_outcome_default(outcome, args.debug, None);
        }
    }

    if outcomes.len() > 1 {
        let located = outcomes.iter().filter(|o| o.is_ok()).count();
        let failed = outcomes.len() - located;

        let mut error_stats = ErrorStats::default();
        for e in outcomes.iter().filter_map(|o| o.as_ref().err()) {
            error_stats.add_error(e);
        }

        println!();
        ui::print_summary(outcomes.len(), located, failed, duration);
        if error_stats.has_errors() {
            println!();
            ui::print_error_summary(&error_stats, args);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_lookup_lib::{load_env_config_from, DefaultsConfig, OutputConfig};
    use std::collections::HashMap;

    fn create_test_args() -> Args {
        Args {
            addresses: vec![],
            file: None,
            force: false,
            json: false,
            csv: false,
            pretty: false,
            batch: false,
            streaming: false,
            concurrency: None,
            timeout: None,
            request_timeout: None,
            endpoint: None,
            lang: None,
            config: None,
            debug: false,
            verbose: false,
        }
    }

    fn env_from(vars: &[(&str, &str)]) -> EnvConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        load_env_config_from(|key| map.get(key).cloned())
    }

    fn success(address: &str, city: &str) -> Outcome {
        Ok(LocationResult {
            address: address.to_string(),
            location: Location {
                status: Some("success".to_string()),
                country: Some("Canada".to_string()),
                region_name: Some("Quebec".to_string()),
                city: Some(city.to_string()),
                lat: Some(45.5),
                lon: Some(-73.5),
                isp: Some("Videotron, Ltee".to_string()),
                ..Default::default()
            },
            lookup_duration: Some(Duration::from_millis(42)),
        })
    }

    #[test]
    fn test_validate_args_requires_input() {
        let args = create_test_args();
        let result = validate_args(&args, &EnvConfig::default());
        assert!(result.unwrap_err().contains("You must specify addresses"));
    }

    #[test]
    fn test_validate_args_env_file_counts_as_input() {
        let args = create_test_args();
        let env = env_from(&[("GEO_FILE", "ips.txt")]);
        assert!(validate_args(&args, &env).is_ok());
    }

    #[test]
    fn test_validate_args_streaming_with_json_rejected() {
        let mut args = create_test_args();
        args.addresses = vec!["1.1.1.1".to_string()];
        args.streaming = true;
        args.json = true;

        let result = validate_args(&args, &EnvConfig::default());
        assert!(result.unwrap_err().contains("--streaming"));
    }

    #[test]
    fn test_validate_args_streaming_with_csv_rejected() {
        let mut args = create_test_args();
        args.addresses = vec!["1.1.1.1".to_string()];
        args.streaming = true;
        args.csv = true;

        let result = validate_args(&args, &EnvConfig::default());
        assert!(result.unwrap_err().contains("--streaming"));
    }

    #[test]
    fn test_validate_args_batch_with_json_allowed() {
        let mut args = create_test_args();
        args.addresses = vec!["1.1.1.1".to_string()];
        args.batch = true;
        args.json = true;

        assert!(validate_args(&args, &EnvConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_args_concurrency_bounds() {
        let mut args = create_test_args();
        args.addresses = vec!["1.1.1.1".to_string()];

        args.concurrency = Some(0);
        assert!(validate_args(&args, &EnvConfig::default()).is_err());

        args.concurrency = Some(101);
        assert!(validate_args(&args, &EnvConfig::default()).is_err());

        args.concurrency = Some(100);
        assert!(validate_args(&args, &EnvConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_args_bad_duration() {
        let mut args = create_test_args();
        args.addresses = vec!["1.1.1.1".to_string()];
        args.request_timeout = Some("soon".to_string());

        let result = validate_args(&args, &EnvConfig::default());
        assert!(result.unwrap_err().contains("--request-timeout"));

        args.request_timeout = Some("0s".to_string());
        assert!(validate_args(&args, &EnvConfig::default()).is_err());

        args.request_timeout = None;
        args.timeout = Some("18446744073709551615s".to_string());
        let result = validate_args(&args, &EnvConfig::default());
        assert!(result.unwrap_err().contains("--timeout"));
    }

    #[test]
    fn test_output_mode_selection() {
        let mut args = create_test_args();
        assert_eq!(output_mode(&args, 1), OutputMode::Collected);
        assert_eq!(output_mode(&args, 3), OutputMode::Streaming);

        args.json = true;
        assert_eq!(output_mode(&args, 3), OutputMode::Collected);

        args.json = false;
        args.batch = true;
        assert_eq!(output_mode(&args, 3), OutputMode::Collected);

        args.batch = false;
        args.streaming = true;
        assert_eq!(output_mode(&args, 1), OutputMode::Streaming);
    }

    #[test]
    fn test_build_config_precedence() {
        let file_config = FileConfig {
            defaults: Some(DefaultsConfig {
                concurrency: Some(8),
                timeout: Some("30s".to_string()),
                request_timeout: Some("3s".to_string()),
                lang: Some("de".to_string()),
                ..Default::default()
            }),
            output: None,
        };
        let env = env_from(&[("GEO_CONCURRENCY", "12"), ("GEO_TIMEOUT", "20s")]);
        let mut args = create_test_args();
        args.timeout = Some("10s".to_string());

        let config = build_config(&args, &env, &file_config);

        assert_eq!(config.concurrency, 12); // env beats file
        assert_eq!(config.timeout, Duration::from_secs(10)); // CLI beats env
        assert_eq!(config.request_timeout, Duration::from_secs(3)); // file beats default
        assert_eq!(config.lang.as_deref(), Some("de"));
        assert_eq!(config.endpoint, geo_lookup_lib::DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_cli_args_only_override_when_given() {
        let args = create_test_args();
        let config = LookupConfig::default().with_concurrency(42);

        let result = apply_cli_args_to_config(config, &args);
        assert_eq!(result.concurrency, 42);
        assert_eq!(result.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_resolve_output_from_file_default_format() {
        let mut args = create_test_args();
        let file_config = FileConfig {
            defaults: None,
            output: Some(OutputConfig {
                default_format: Some("csv".to_string()),
                csv_headers: Some(false),
                json_pretty: None,
            }),
        };

        let output = resolve_output(&mut args, &EnvConfig::default(), &file_config);

        assert!(args.csv);
        assert!(!args.json);
        assert!(!output.csv_headers);
        assert!(output.json_pretty);
    }

    #[test]
    fn test_resolve_output_env_beats_file_and_cli_beats_env() {
        let file_config = FileConfig {
            defaults: None,
            output: Some(OutputConfig {
                default_format: Some("csv".to_string()),
                ..Default::default()
            }),
        };
        let env = env_from(&[("GEO_JSON", "true")]);

        let mut args = create_test_args();
        resolve_output(&mut args, &env, &file_config);
        assert!(args.json);
        assert!(!args.csv);

        let mut args = create_test_args();
        args.streaming = true;
        resolve_output(&mut args, &env, &file_config);
        assert!(!args.json, "explicit --streaming keeps text output");
    }

    #[test]
    fn test_error_stats_aggregation() {
        let mut stats = ErrorStats::default();

        stats.add_error(&LookupError::timeout("1.1.1.1", Duration::from_secs(2)));
        stats.add_error(&LookupError::deadline_exceeded("8.8.8.8"));
        stats.add_error(&LookupError::network("9.9.9.9", "connection refused"));
        stats.add_error(&LookupError::status("bad-ip", 500, "Internal Server Error"));
        stats.add_error(&LookupError::invalid_address("a/b", "forbidden character"));

        assert_eq!(stats.timeouts, vec!["1.1.1.1", "8.8.8.8"]);
        assert_eq!(stats.network_errors, vec!["9.9.9.9"]);
        assert_eq!(stats.status_errors, vec!["bad-ip"]);
        assert_eq!(stats.invalid_addresses, vec!["a/b"]);
        assert!(stats.has_errors());

        let labels: Vec<&str> = stats.categories().iter().map(|(l, _)| *l).collect();
        assert_eq!(
            labels,
            vec!["timeout", "network error", "status error", "invalid address"]
        );
    }

    #[test]
    fn test_format_json_records() {
        let outcomes = vec![
            success("24.48.0.1", "Montreal"),
            Err(LookupError::status("bad-ip", 500, "Internal Server Error")),
        ];

        let json = format_json(&outcomes, false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value[0]["address"], "24.48.0.1");
        assert_eq!(value[0]["location"]["city"], "Montreal");
        assert_eq!(value[0]["lookup_ms"], 42);
        assert!(value[0].get("error").is_none());

        assert_eq!(value[1]["address"], "bad-ip");
        assert_eq!(value[1]["error_kind"], "status");
        assert!(value[1].get("location").is_none());
    }

    #[test]
    fn test_format_csv_quotes_and_headers() {
        let outcomes = vec![
            success("24.48.0.1", "Montreal"),
            Err(LookupError::timeout("8.8.8.8", Duration::from_secs(2))),
        ];

        let csv = format_csv(&outcomes, true);
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "address,status,country,region,city,lat,lon,isp,error");
        assert_eq!(
            lines[1],
            "24.48.0.1,success,Canada,Quebec,Montreal,45.5,-73.5,\"Videotron, Ltee\","
        );
        assert!(lines[2].starts_with("8.8.8.8,error,,,,,,,"));

        let no_headers = format_csv(&outcomes, false);
        assert!(no_headers.starts_with("24.48.0.1,"));
    }

    #[test]
    fn test_csv_field_escaping() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[tokio::test]
    async fn test_read_addresses_from_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            "# resolvers\n1.1.1.1\n\n8.8.8.8  # google\n1.1.1.1\n",
        )
        .unwrap();

        let addresses = read_addresses_from_file(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(addresses, vec!["1.1.1.1", "8.8.8.8", "1.1.1.1"]);
    }

    #[tokio::test]
    async fn test_read_addresses_missing_or_empty_file() {
        let err = read_addresses_from_file("/definitely/not/here.txt")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::File);

        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "# only comments\n\n").unwrap();
        let err = read_addresses_from_file(file.path().to_str().unwrap())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No addresses"));
    }
}
