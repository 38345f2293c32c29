//! Display logic for geo-lookup CLI.
//!
//! This module handles all text output: colored outcome lines,
//! grouped batch output, spinner animation, progress counters,
//! headers, and summaries. Uses only the `console` crate.

use console::{pad_str, style, Alignment, Term};
use geo_lookup_lib::{Location, LookupConfig, LookupError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::{Args, ErrorStats, Outcome};

const ADDRESS_WIDTH: usize = 24;

// ── Spinner ──────────────────────────────────────────────────────────────────

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// An async braille-dot spinner that writes to stderr so stdout stays clean.
pub struct Spinner {
    running: Arc<AtomicBool>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl Spinner {
    /// Start a new spinner, or `None` when stderr is not a terminal.
    pub fn start(message: String) -> Option<Self> {
        let term = Term::stderr();
        if !term.is_term() {
            return None;
        }

        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();

        let handle = tokio::spawn(async move {
            let mut idx = 0usize;
            while running_clone.load(Ordering::Relaxed) {
                let frame = SPINNER_FRAMES[idx % SPINNER_FRAMES.len()];
                let _ = term.clear_line();
                let _ = term.write_str(&format!("{} {}", style(frame).cyan(), message));
                idx += 1;
                tokio::time::sleep(Duration::from_millis(80)).await;
            }
            let _ = term.clear_line();
        });

        Some(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Stop the spinner and clear the line.
    pub async fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.await;
        }
    }
}

// ── Header ───────────────────────────────────────────────────────────────────

/// Print a styled header at the start of a pretty run.
pub fn print_header(address_count: usize, config: &LookupConfig) {
    println!(
        "{} {} {}",
        style("geo-lookup").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
        style(format!(
            "- Looking up {} address{}",
            address_count,
            if address_count == 1 { "" } else { "es" }
        ))
        .dim(),
    );

    let mut meta_parts = vec![
        format!("Concurrency: {}", config.concurrency),
        format!("Timeout: {}", format_duration(config.timeout)),
        format!("Per request: {}", format_duration(config.request_timeout)),
    ];
    if let Some(lang) = &config.lang {
        meta_parts.push(format!("Lang: {}", lang));
    }

    println!("{}", style(meta_parts.join(" | ")).dim());
    println!();
}

// ── Single outcome line ──────────────────────────────────────────────────────

/// Format and print a single outcome with colors and alignment.
///
/// If `counter` is Some((current, total)), a progress prefix like `[3/8]` is shown.
pub fn print_outcome(outcome: &Outcome, debug: bool, counter: Option<(usize, usize)>) {
    let prefix = match counter {
        Some((cur, total)) => format!("{} ", style(format!("[{}/{}]", cur, total)).dim()),
        None => String::new(),
    };

    match outcome {
        Ok(result) => {
            let padded = pad_str(&result.address, ADDRESS_WIDTH, Alignment::Left, Some(".."));
            println!(
                "  {}{}  {}  {}",
                prefix,
                style(&padded).white(),
                style("LOCATED").green().bold(),
                format_location(&result.location),
            );
            if debug {
                print_debug_line("    ", result.lookup_duration, &result.location);
            }
        }
        Err(e) => {
            let address = e.address().unwrap_or("-");
            let padded = pad_str(address, ADDRESS_WIDTH, Alignment::Left, Some(".."));
            println!(
                "  {}{}  {}  {}",
                prefix,
                style(&padded).white(),
                style("FAILED").red().bold(),
                style(brief_error(e)).dim(),
            );
            if debug {
                println!("    {} {}", style("└─").dim(), style(e).dim());
            }
        }
    }
}

/// Plain one-line output used when `--pretty` is off.
pub fn print_outcome_default(outcome: &Outcome, debug: bool, counter: Option<(usize, usize)>) {
    let prefix = match counter {
        Some((cur, total)) => format!("{} ", style(format!("[{}/{}]", cur, total)).dim()),
        None => String::new(),
    };

    match outcome {
        Ok(result) => {
            println!(
                "{}{} {} {}",
                prefix,
                style("✓").green(),
                result.address,
                format_location(&result.location),
            );
            if debug {
                print_debug_line("  ", result.lookup_duration, &result.location);
            }
        }
        Err(e) => {
            println!(
                "{}{} {} {}",
                prefix,
                style("✗").red(),
                e.address().unwrap_or("-"),
                style(if debug { e.to_string() } else { brief_error(e) }).dim(),
            );
        }
    }
}

fn print_debug_line(indent: &str, duration: Option<Duration>, location: &Location) {
    let mut parts = Vec::new();
    if let Some(duration) = duration {
        parts.push(format!("Looked up in {}ms", duration.as_millis()));
    }
    if let Some(isp) = &location.isp {
        parts.push(format!("ISP: {}", isp));
    }
    if let Some(asn) = &location.as_number {
        parts.push(asn.clone());
    }
    if !parts.is_empty() {
        println!("{}{} {}", indent, style("└─").dim(), style(parts.join(", ")).dim());
    }
}

// ── Grouped batch output ─────────────────────────────────────────────────────

/// Print outcomes grouped into Located and Failed sections.
/// Empty sections are omitted entirely.
pub fn print_grouped_results(outcomes: &[Outcome], debug: bool) {
    let located: Vec<&Outcome> = outcomes.iter().filter(|o| o.is_ok()).collect();
    let failed: Vec<&Outcome> = outcomes.iter().filter(|o| o.is_err()).collect();

    if !located.is_empty() {
        println!(
            "  {} {}",
            style(format!("── Located ({}) ", located.len())).green().bold(),
            style("─".repeat(40)).green().dim(),
        );
        for outcome in &located {
            print_grouped_line(outcome, debug);
        }
        println!();
    }

    if !failed.is_empty() {
        println!(
            "  {} {}",
            style(format!("── Failed ({}) ", failed.len())).red().bold(),
            style("─".repeat(41)).red().dim(),
        );
        for outcome in &failed {
            print_grouped_line(outcome, debug);
        }
        println!();
    }
}

/// Print a single line inside a grouped section.
fn print_grouped_line(outcome: &Outcome, debug: bool) {
    match outcome {
        Ok(result) => {
            let padded = pad_str(&result.address, ADDRESS_WIDTH, Alignment::Left, Some(".."));
            println!(
                "    {}  {}",
                style(&padded).white(),
                format_location(&result.location)
            );
            if debug {
                print_debug_line("      ", result.lookup_duration, &result.location);
            }
        }
        Err(e) => {
            let padded = pad_str(e.address().unwrap_or("-"), ADDRESS_WIDTH, Alignment::Left, Some(".."));
            println!("    {}  {}", style(&padded).white(), style(brief_error(e)).dim());
            if debug {
                println!("      {} {}", style("└─").dim(), style(e).dim());
            }
        }
    }
}

// ── Summary ──────────────────────────────────────────────────────────────────

/// Print the final summary bar with colored counts.
pub fn print_summary(total: usize, located: usize, failed: usize, duration: Duration) {
    println!(
        "  {}",
        style("────────────────────────────────────────────────────").dim()
    );
    println!(
        "  {} address{} in {:.1}s  {}  {}  {}  {}",
        style(total).bold(),
        if total == 1 { "" } else { "es" },
        duration.as_secs_f64(),
        style("|").dim(),
        style(format!("{} located", located)).green(),
        style("|").dim(),
        style(format!("{} failed", failed)).red(),
    );
}

// ── Error summary ────────────────────────────────────────────────────────────

/// Print a categorized error summary using colors.
pub fn print_error_summary(error_stats: &ErrorStats, args: &Args) {
    if !error_stats.has_errors() {
        return;
    }

    println!(
        "  {}",
        style("Some addresses could not be located:").yellow()
    );

    let max_show = if args.debug { usize::MAX } else { 5 };
    for (label, addresses) in error_stats.categories() {
        println!(
            "  {} {} {}{}: {}",
            style("•").dim(),
            addresses.len(),
            label,
            if addresses.len() == 1 { "" } else { "s" },
            format_address_list(addresses, max_show),
        );
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Join addresses, truncating after `max_show` entries.
fn format_address_list(addresses: &[String], max_show: usize) -> String {
    if addresses.len() <= max_show {
        addresses.join(", ")
    } else {
        let shown = &addresses[..max_show];
        let remaining = addresses.len() - max_show;
        format!("{}, ... and {} more", shown.join(", "), remaining)
    }
}

/// Format a location into a concise `City, Region, Country (lat, lon)` string.
pub fn format_location(location: &Location) -> String {
    let place: Vec<&str> = [
        location.city.as_deref(),
        location.region_name.as_deref(),
        location.country.as_deref(),
    ]
    .into_iter()
    .flatten()
    .filter(|part| !part.is_empty())
    .collect();

    let mut out = if place.is_empty() {
        "No location data".to_string()
    } else {
        place.join(", ")
    };

    if let (Some(lat), Some(lon)) = (location.lat, location.lon) {
        out.push_str(&format!(" ({:.4}, {:.4})", lat, lon));
    }
    out
}

/// Short parenthesized reason for a failed lookup.
fn brief_error(error: &LookupError) -> String {
    match error {
        LookupError::Timeout { .. } => "(timeout)".to_string(),
        LookupError::DeadlineExceeded { .. } => "(deadline exceeded)".to_string(),
        LookupError::Network { .. } => "(network error)".to_string(),
        LookupError::Status { status_code, .. } => format!("(HTTP {})", status_code),
        LookupError::Rejected { message, .. } => format!("({})", message),
        LookupError::Decode { .. } => "(bad response)".to_string(),
        LookupError::InvalidAddress { .. } => "(invalid address)".to_string(),
        _ => "(error)".to_string(),
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.subsec_millis() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
