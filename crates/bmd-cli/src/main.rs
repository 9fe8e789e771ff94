#![forbid(unsafe_code)]

use anyhow::{bail, Context, Result};
use bmd_digest::DistanceFn;
use bmd_engine::{
    diagnose, execute, generate, repair, restore, verify, Budgets, DiagnoseInputs, RestoreInputs,
    RestoreMode, SearchOptions, TaskReport,
};
use bmd_sidecar::{text, InstructionReader, MismatchReader, SidecarHeader};
use bmd_types::{ChecksumMethod, Geometry, RecordKind, Redundancy};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::env::VarError;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

// ── CLI definition ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Human,
    Json,
}

impl LogFormat {
    const ENV_KEY: &'static str = "BMD_LOG_FORMAT";

    fn from_env() -> Result<Option<Self>> {
        match std::env::var(Self::ENV_KEY) {
            Ok(value) => <Self as ValueEnum>::from_str(value.trim(), true)
                .map(Some)
                .map_err(|_| {
                    anyhow::anyhow!(
                        "invalid {key}={value:?}; expected one of: human, json",
                        key = Self::ENV_KEY
                    )
                }),
            Err(VarError::NotPresent) => Ok(None),
            Err(VarError::NotUnicode(_)) => {
                bail!("{key} contains non-UTF-8 bytes", key = Self::ENV_KEY)
            }
        }
    }
}

#[derive(Parser)]
#[command(name = "bmd", about = "BitMend — bit-preservation toolkit for archival files")]
struct Cli {
    /// Log output format (overrides BMD_LOG_FORMAT).
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Print the task report as JSON instead of a summary line.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a checksum sidecar for a data file.
    Generate {
        /// Checksum method: md4, md5, sha256, crc32, md5_16, md5_32, md5_64.
        #[arg(long)]
        method: String,
        /// Data bytes per checksum byte; a power of two.
        #[arg(long, default_value_t = 32)]
        redundancy: u32,
        /// Path to the data file.
        #[arg(long)]
        data: PathBuf,
        /// Checksum sidecar to create.
        #[arg(long)]
        checksum: PathBuf,
    },
    /// Compare a data file against its checksum sidecar.
    Verify {
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        checksum: PathBuf,
        /// Mismatch sidecar to create (a text twin lands next to it).
        #[arg(long)]
        error: PathBuf,
    },
    /// Brute-force search for the original contents of mismatched blocks.
    Repair {
        #[arg(long)]
        data: PathBuf,
        /// Mismatch sidecar from a verify pass.
        #[arg(long)]
        error: PathBuf,
        /// Instruction sidecar to create.
        #[arg(long)]
        repair: PathBuf,
        /// Checksum computations allowed per block.
        #[arg(long = "bruteforce-repair", default_value_t = 100_000)]
        bruteforce: u64,
        #[command(flatten)]
        scoring: ScoringArgs,
    },
    /// Re-search unresolved blocks with the help of a backup copy.
    Restore {
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        backup: PathBuf,
        /// Checksum sidecar generated from the backup.
        #[arg(long)]
        backup_checksum: PathBuf,
        /// Instruction sidecar from a repair pass.
        #[arg(long)]
        repair: PathBuf,
        /// Instruction sidecar to create.
        #[arg(long)]
        restore: PathBuf,
        /// Which repair outcomes to take on: all, ambi-no, ambi-only.
        #[arg(long, default_value = "all")]
        mode: String,
        /// Checksum computations allowed per block.
        #[arg(long = "bruteforce-restore", default_value_t = 100_000)]
        bruteforce: u64,
        #[command(flatten)]
        scoring: ScoringArgs,
    },
    /// Apply HIT!/HIT? instruction records to the data file in place.
    Execute {
        #[arg(long)]
        data: PathBuf,
        /// Instruction sidecar from a repair or restore pass.
        #[arg(long)]
        instructions: PathBuf,
    },
    /// Compare pipeline stages against a known-good original.
    Diag {
        #[arg(long)]
        repair: PathBuf,
        #[arg(long)]
        restore: PathBuf,
        #[arg(long)]
        orig: PathBuf,
        #[arg(long)]
        backup: PathBuf,
        /// The data file as it looked before repair.
        #[arg(long)]
        corrupt: PathBuf,
        #[arg(long)]
        data: PathBuf,
        /// Comparison report to create.
        #[arg(long)]
        diag: PathBuf,
    },
    /// Pretty-print any binary sidecar.
    Show {
        /// Path to the sidecar file.
        #[arg(long)]
        sidecar: PathBuf,
        /// Body layout: checksum, error, or instructions.
        #[arg(long = "as", value_enum)]
        layout: SidecarLayout,
        /// Only show instruction records with this tag (e.g. "HIT!").
        #[arg(long)]
        kind: Option<String>,
        /// Only show the last N records.
        #[arg(long)]
        tail: Option<usize>,
    },
}

/// Distance scoring flags shared by repair and restore.
#[derive(Debug, clap::Args)]
struct ScoringArgs {
    /// Distance function: linear, square, conservative, conservative-biased.
    #[arg(long, default_value = "linear")]
    distance: String,
    /// Checksum penalty applied to digest bit differences.
    #[arg(long, default_value_t = 1)]
    penalty: u64,
}

impl ScoringArgs {
    fn into_options(self, bruteforce_repair: u64, bruteforce_restore: u64) -> Result<SearchOptions> {
        let distance = DistanceFn::from_name(&self.distance)?;
        Ok(SearchOptions::new(
            Budgets {
                repair: bruteforce_repair,
                restore: bruteforce_restore,
            },
            distance,
            self.penalty,
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SidecarLayout {
    Checksum,
    Error,
    Instructions,
}

// ── Logging ─────────────────────────────────────────────────────────────────

fn default_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_logging(override_format: Option<LogFormat>) -> Result<()> {
    let format = match override_format {
        Some(format) => format,
        None => LogFormat::from_env()?.unwrap_or(LogFormat::Human),
    };
    match format {
        LogFormat::Human => tracing_subscriber::fmt()
            .with_env_filter(default_env_filter())
            .with_writer(std::io::stderr)
            .with_target(true)
            .compact()
            .try_init()
            .map_err(|err| anyhow::anyhow!("failed to initialize logger: {err}"))?,
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .flatten_event(true)
            .with_env_filter(default_env_filter())
            .with_writer(std::io::stderr)
            .with_target(true)
            .try_init()
            .map_err(|err| anyhow::anyhow!("failed to initialize logger: {err}"))?,
    }
    Ok(())
}

// ── Entry point ─────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format)?;

    let report = match cli.command {
        Command::Generate {
            method,
            redundancy,
            data,
            checksum,
        } => {
            let method = ChecksumMethod::from_name(&method)?;
            let redundancy = Redundancy::new(redundancy)?;
            generate(&data, &checksum, Geometry::new(method, redundancy))
                .context("generate failed")?
        }
        Command::Verify {
            data,
            checksum,
            error,
        } => verify(&data, &checksum, &error).context("verify failed")?,
        Command::Repair {
            data,
            error,
            repair: repair_path,
            bruteforce,
            scoring,
        } => {
            let opts = scoring.into_options(bruteforce, bruteforce)?;
            repair(&data, &error, &repair_path, &opts).context("repair failed")?
        }
        Command::Restore {
            data,
            backup,
            backup_checksum,
            repair: repair_path,
            restore: restore_path,
            mode,
            bruteforce,
            scoring,
        } => {
            let mode = RestoreMode::from_name(&mode)?;
            let opts = scoring.into_options(bruteforce, bruteforce)?;
            restore(
                &RestoreInputs {
                    repair: &repair_path,
                    data: &data,
                    backup: &backup,
                    backup_checksum: &backup_checksum,
                },
                &restore_path,
                mode,
                &opts,
            )
            .context("restore failed")?
        }
        Command::Execute { data, instructions } => {
            execute(&data, &instructions).context("execute failed")?
        }
        Command::Diag {
            repair: repair_path,
            restore: restore_path,
            orig,
            backup,
            corrupt,
            data,
            diag,
        } => diagnose(
            &DiagnoseInputs {
                repair: &repair_path,
                restore: &restore_path,
                original: &orig,
                backup: &backup,
                corrupt: &corrupt,
                data: &data,
            },
            &diag,
        )
        .context("diag failed")?,
        Command::Show {
            sidecar,
            layout,
            kind,
            tail,
        } => {
            show(&sidecar, layout, kind.as_deref(), tail, cli.json)?;
            return Ok(());
        }
    };

    emit_report(&report, cli.json)?;
    if !report.ran_clean() {
        bail!("{} blocks hit I/O errors", report.io_errors);
    }
    Ok(())
}

fn emit_report(report: &TaskReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}

// ── Sidecar display ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ShownHeader {
    method: ChecksumMethod,
    checksum_bits: u32,
    block_bytes: usize,
    repaired_fields: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ShownRecord {
    Digest {
        block: u64,
        digest: String,
    },
    Mismatch {
        block: u64,
        given: String,
        computed: String,
    },
    Instruction {
        kind: RecordKind,
        block: u64,
        len: usize,
        distance: u64,
        ambival: u64,
        digest: String,
    },
}

fn show(
    path: &std::path::Path,
    layout: SidecarLayout,
    kind: Option<&str>,
    tail: Option<usize>,
    json: bool,
) -> Result<()> {
    let kind = kind.map(RecordKind::from_tag).transpose()?;
    let mut reader = BufReader::new(File::open(path)?);
    let decoded = SidecarHeader::read_from(&mut reader)?;
    let geometry = decoded.header.geometry;
    let digest_bytes = geometry.method.digest_bytes();

    let mut records: Vec<ShownRecord> = Vec::new();
    match layout {
        SidecarLayout::Checksum => {
            let mut digest = vec![0u8; digest_bytes];
            let mut block = 0u64;
            loop {
                match reader.read_exact(&mut digest) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                    Err(e) => return Err(e.into()),
                }
                records.push(ShownRecord::Digest {
                    block,
                    digest: text::hex(&digest),
                });
                block += 1;
            }
        }
        SidecarLayout::Error => {
            for record in MismatchReader::new(reader, digest_bytes) {
                let record = record?;
                records.push(ShownRecord::Mismatch {
                    block: record.block.0,
                    given: text::hex(&record.given),
                    computed: text::hex(&record.computed),
                });
            }
        }
        SidecarLayout::Instructions => {
            let instruction_reader =
                InstructionReader::new(reader, digest_bytes, geometry.block_bytes() as u64);
            for record in instruction_reader {
                let record = record?;
                if kind.is_some_and(|k| k != record.kind) {
                    continue;
                }
                records.push(ShownRecord::Instruction {
                    kind: record.kind,
                    block: record.block.0,
                    len: record.data.len(),
                    distance: record.distance,
                    ambival: record.ambival,
                    digest: text::hex(&record.digest),
                });
            }
        }
    }
    if let Some(tail) = tail {
        let skip = records.len().saturating_sub(tail);
        records.drain(..skip);
    }

    let header = ShownHeader {
        method: geometry.method,
        checksum_bits: geometry.method.digest_bits(),
        block_bytes: geometry.block_bytes(),
        repaired_fields: decoded.repaired,
    };
    if json {
        #[derive(Serialize)]
        struct ShownSidecar {
            header: ShownHeader,
            records: Vec<ShownRecord>,
        }
        println!("{}", serde_json::to_string_pretty(&ShownSidecar { header, records })?);
    } else {
        println!(
            "method {} checksum_bits {} block_bytes {}",
            header.method, header.checksum_bits, header.block_bytes
        );
        for field in &header.repaired_fields {
            println!("warning: header field {field} was reconciled from its twin");
        }
        for record in &records {
            match record {
                ShownRecord::Digest { block, digest } => println!("block {block} {digest}"),
                ShownRecord::Mismatch {
                    block,
                    given,
                    computed,
                } => println!("block {block} given={given} computed={computed}"),
                ShownRecord::Instruction {
                    kind,
                    block,
                    len,
                    distance,
                    ambival,
                    digest,
                } => println!(
                    "{:<8} block {block} len {len} dist {distance} ambival {ambival} digest={digest}",
                    kind.tag()
                ),
            }
        }
    }
    Ok(())
}
