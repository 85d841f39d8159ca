//! groundlink - telemetry downlink decoder
//!
//! Listens for framed telemetry datagrams, decodes them and prints each
//! record. Also captures raw sessions, replays them, and encodes test frames.

#![deny(clippy::unwrap_used)]

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use serde::Serialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;

use groundlink::capture::CaptureWriter;
use groundlink::providers::ReplayProvider;
use groundlink::{
    Connection, DecodeStats, FramePacker, Groundlink, GroundlinkConfig, TelemetryRecord,
    TracingObserver, UpdateRate, logging,
};

#[derive(Parser)]
#[command(name = "groundlink")]
#[command(about = "Decode rocket telemetry frames received over UDP")]
#[command(version)]
struct Cli {
    /// Output records as JSON lines
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// YAML configuration file
    #[arg(short, long, global = true, env = "GROUNDLINK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Receive and decode datagrams until interrupted
    Listen {
        /// Override the configured bind address
        #[arg(short, long)]
        bind: Option<SocketAddr>,

        /// Print at most this many records per second
        #[arg(long)]
        rate: Option<u32>,

        /// Stop after this many records
        #[arg(long)]
        count: Option<usize>,
    },

    /// Decode a capture file
    Replay {
        /// Capture written by `groundlink capture`
        path: PathBuf,

        /// Playback speed multiplier
        #[arg(long, default_value_t = 1.0, conflicts_with = "fast")]
        speed: f64,

        /// Ignore recorded timing
        #[arg(long)]
        fast: bool,
    },

    /// Record raw datagrams to a capture file
    Capture {
        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Override the configured bind address
        #[arg(short, long)]
        bind: Option<SocketAddr>,

        /// Capture duration in seconds
        #[arg(short, long, default_value_t = 60)]
        duration: u64,
    },

    /// Encode a frame from field values (unset fields are zero)
    Encode {
        /// Field assignments such as `Az=-1.6`
        #[arg(value_name = "FIELD=VALUE")]
        values: Vec<String>,

        /// Send the frame to this address instead of printing it
        #[arg(long)]
        send: Option<SocketAddr>,
    },

    /// Show the active field layout
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = match &cli.config {
        Some(path) => GroundlinkConfig::load(path)
            .with_context(|| format!("failed to load configuration '{}'", path.display()))?,
        None => GroundlinkConfig::default(),
    };

    match cli.command {
        Commands::Listen { bind, rate, count } => {
            listen(config, bind, rate, count, cli.json).await
        }
        Commands::Replay { path, speed, fast } => replay(config, &path, speed, fast, cli.json).await,
        Commands::Capture { output, bind, duration } => {
            capture(config, bind, &output, duration, cli.json).await
        }
        Commands::Encode { values, send } => encode(&config, &values, send, cli.json).await,
        Commands::Schema => schema(&config, cli.json),
    }
}

async fn listen(
    mut config: GroundlinkConfig,
    bind: Option<SocketAddr>,
    rate: Option<u32>,
    count: Option<usize>,
    json: bool,
) -> Result<()> {
    if let Some(bind) = bind {
        config.bind = bind;
    }
    let connection = Groundlink::listen(&config)
        .await
        .with_context(|| format!("failed to listen on {}", config.bind))?;
    let rate = rate.map_or(config.update_rate, UpdateRate::Max);

    print_records(&connection, rate, count, json).await?;
    let stats = connection.shutdown().await?;
    eprintln!("{} of {} datagrams decoded", stats.records, stats.datagrams);
    Ok(())
}

async fn replay(
    config: GroundlinkConfig,
    path: &Path,
    speed: f64,
    fast: bool,
    json: bool,
) -> Result<()> {
    let provider = ReplayProvider::open(path)
        .with_context(|| format!("failed to open capture '{}'", path.display()))?;
    let provider = if fast { provider.unpaced() } else { provider.with_speed(speed) };
    let connection = Groundlink::from_provider(provider, &config, TracingObserver)?;

    print_records(&connection, config.update_rate, None, json).await?;
    let stats = connection.finished().await?;
    if json {
        println!("{}", serde_json::to_string(&stats)?);
    } else {
        println!("Replay complete");
        print!("{}", stats_summary(&stats));
    }
    Ok(())
}

/// One indented `name: count` line per counter, in `--json` field order.
fn stats_summary(stats: &DecodeStats) -> String {
    [
        ("datagrams", stats.datagrams),
        ("records", stats.records),
        ("sync_not_found", stats.sync_not_found),
        ("terminator_not_found", stats.terminator_not_found),
        ("insufficient_bits", stats.insufficient_bits),
        ("trailing_bits", stats.trailing_bits),
        ("other_field_errors", stats.other_field_errors),
        ("transport_errors", stats.transport_errors),
    ]
    .iter()
    .map(|(name, count)| format!("  {name}: {count}\n"))
    .collect()
}

/// Print records until the stream ends, `count` is reached, or Ctrl-C.
async fn print_records(
    connection: &Connection,
    rate: UpdateRate,
    count: Option<usize>,
    json: bool,
) -> Result<()> {
    let mut records = connection.subscribe(rate);
    let mut printed = 0usize;

    loop {
        let record = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            record = records.next() => record,
        };
        let Some(record) = record else { break };

        print_record(&record, json)?;
        printed += 1;
        if count.is_some_and(|count| printed >= count) {
            break;
        }
    }
    Ok(())
}

fn print_record(record: &TelemetryRecord, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(record)?);
        return Ok(());
    }
    let width = record.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    for (name, value) in record.iter() {
        println!("{name:>width$} = {value}");
    }
    println!();
    Ok(())
}

#[derive(Serialize)]
struct CaptureSummary {
    listen: String,
    duration_seconds: u64,
    datagrams: u64,
    output: String,
}

async fn capture(
    config: GroundlinkConfig,
    bind: Option<SocketAddr>,
    output: &Path,
    duration_seconds: u64,
    json: bool,
) -> Result<()> {
    let bind = bind.unwrap_or(config.bind);
    let socket = UdpSocket::bind(bind).await.with_context(|| {
        format!("failed to bind UDP capture socket at {bind} (is another process using this port?)")
    })?;
    let mut writer = CaptureWriter::create(output)
        .with_context(|| format!("failed to create capture file '{}'", output.display()))?;

    let start = Instant::now();
    let deadline = start + Duration::from_secs(duration_seconds.max(1));
    let mut buf = vec![0u8; config.recv_buffer];

    while Instant::now() < deadline {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let timeout = remaining.min(Duration::from_millis(250));
        let recv = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            recv = tokio::time::timeout(timeout, socket.recv_from(&mut buf)) => recv,
        };
        let len = match recv {
            Ok(Ok((len, _source))) => len,
            Ok(Err(error)) => return Err(anyhow!("capture receive failed: {error}")),
            Err(_) => continue,
        };
        writer.append(start.elapsed(), &buf[..len])?;
    }

    let datagrams = writer.records();
    writer.finish()?;

    let summary = CaptureSummary {
        listen: bind.to_string(),
        duration_seconds,
        datagrams,
        output: output.display().to_string(),
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Capture complete");
        println!("  listen: {}", summary.listen);
        println!("  duration_s: {}", summary.duration_seconds);
        println!("  datagrams: {}", summary.datagrams);
        println!("  output: {}", summary.output);
    }
    Ok(())
}

fn parse_assignment(arg: &str) -> Result<(String, f64)> {
    let (name, value) =
        arg.split_once('=').ok_or_else(|| anyhow!("expected FIELD=VALUE, got '{arg}'"))?;
    let value: f64 =
        value.trim().parse().with_context(|| format!("invalid number for field '{name}'"))?;
    Ok((name.trim().to_string(), value))
}

async fn encode(
    config: &GroundlinkConfig,
    assignments: &[String],
    send: Option<SocketAddr>,
    json: bool,
) -> Result<()> {
    let schema = config.schema()?;
    let mut values: Vec<(String, f64)> = schema
        .fields()
        .iter()
        .filter(|field| !field.reserved)
        .map(|field| (field.name.clone(), 0.0))
        .collect();
    for arg in assignments {
        let (name, value) = parse_assignment(arg)?;
        match values.iter_mut().find(|(field, _)| *field == name) {
            Some(slot) => slot.1 = value,
            None => bail!("unknown field '{name}'"),
        }
    }

    let packer = FramePacker::new(Arc::clone(&schema), config.markers);
    let frame = packer.encode_frame(values)?;

    if let Some(target) = send {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket
            .send_to(&frame, target)
            .await
            .with_context(|| format!("failed to send frame to {target}"))?;
        eprintln!("sent {} bytes to {target}", frame.len());
        return Ok(());
    }

    let hex: String = frame.iter().map(|byte| format!("{byte:02x}")).collect();
    if json {
        println!("{}", serde_json::json!({ "frame": hex, "len": frame.len() }));
    } else {
        println!("{hex}");
    }
    Ok(())
}

#[derive(Serialize)]
struct FieldRow<'a> {
    name: &'a str,
    offset: usize,
    bit_width: u32,
    signed: bool,
    scale: u32,
    reserved: bool,
}

fn schema(config: &GroundlinkConfig, json: bool) -> Result<()> {
    let schema = config.schema()?;
    let rows: Vec<_> = schema
        .offsets()
        .map(|(field, offset)| FieldRow {
            name: &field.name,
            offset,
            bit_width: field.bit_width,
            signed: field.signed,
            scale: field.scale,
            reserved: field.reserved,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    println!("{:<10} {:>6} {:>5} {:<8} {:>5}", "field", "offset", "bits", "type", "scale");
    for row in &rows {
        let kind = match (row.reserved, row.signed) {
            (true, _) => "reserved",
            (false, true) => "signed",
            (false, false) => "unsigned",
        };
        println!(
            "{:<10} {:>6} {:>5} {:<8} {:>5}",
            row.name, row.offset, row.bit_width, kind, row.scale
        );
    }
    println!("{} bits ({} bytes)", schema.frame_bits(), schema.frame_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn parse_listen_defaults() -> TestResult {
        let cli = Cli::try_parse_from(["groundlink", "listen"])?;
        assert!(!cli.json);
        assert_eq!(cli.verbose, 0);
        assert!(matches!(cli.command, Commands::Listen { bind: None, rate: None, count: None }));
        Ok(())
    }

    #[test]
    fn parse_global_flags_after_subcommand() -> TestResult {
        let cli = Cli::try_parse_from(["groundlink", "schema", "--json", "-vv"])?;
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        Ok(())
    }

    #[test]
    fn replay_speed_conflicts_with_fast() {
        let result =
            Cli::try_parse_from(["groundlink", "replay", "a.cap", "--fast", "--speed", "2"]);
        assert!(result.is_err());
    }

    #[test]
    fn replay_summary_lists_every_counter() -> TestResult {
        let stats = DecodeStats { other_field_errors: 2, transport_errors: 3, ..Default::default() };
        let text = stats_summary(&stats);
        assert!(text.contains("  other_field_errors: 2\n"));
        assert!(text.contains("  transport_errors: 3\n"));

        let json = serde_json::to_value(stats)?;
        let fields = json.as_object().ok_or("stats serialize as an object")?;
        assert_eq!(text.lines().count(), fields.len());
        for name in fields.keys() {
            assert!(text.contains(&format!("  {name}: ")), "missing {name}");
        }
        Ok(())
    }

    #[test]
    fn parse_encode_assignments() -> TestResult {
        let cli = Cli::try_parse_from(["groundlink", "encode", "Az=-1.6", "volts=12.6"])?;
        let Commands::Encode { values, send } = cli.command else {
            return Err("expected encode".into());
        };
        assert!(send.is_none());
        assert_eq!(parse_assignment(&values[0])?, ("Az".to_string(), -1.6));
        assert!(parse_assignment("Az").is_err());
        assert!(parse_assignment("Az=fast").is_err());
        Ok(())
    }
}
