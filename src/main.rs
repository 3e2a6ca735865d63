//! Var-data dump CLI
//!
//! Inspect var-meta index, payload and property streams extracted from a project file.

use clap::{Args, Parser, Subcommand, ValueEnum};
use mpp_varstore::output::{self, IndexDump, PropsDump, DEFAULT_PREVIEW};
use mpp_varstore::{
    Framing, IndexDecoder, Props14, PropsDecoder, Value, ValueKind, VarDataStore, VarMeta12,
};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "varstore-dump")]
#[command(about = "Dump var-data index, payload and property streams")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Show verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Dump every entry of a var-meta index with a preview of its payload bytes
    Index {
        #[command(flatten)]
        streams: StreamArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Dump a property stream
    Props {
        /// Property stream file
        input: PathBuf,

        /// Fail when the stream holds fewer entries than declared
        #[arg(long)]
        strict: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Decode a single field
    Field {
        #[command(flatten)]
        streams: StreamArgs,

        /// Entity id
        #[arg(long)]
        id: i32,

        /// Field type code
        #[arg(long = "type")]
        field_type: i32,

        /// How to interpret the value
        #[arg(long, value_enum)]
        kind: KindArg,

        /// How the value's length is found [default: size-prefixed with --sub, else fixed]
        #[arg(long, value_enum)]
        framing: Option<FramingArg>,

        /// Treat the field as an extended attribute block and read this sub-type
        #[arg(long)]
        sub: Option<i32>,

        /// Framing of pooled strings referenced from an extended block
        #[arg(long, value_enum, default_value = "terminated")]
        ref_framing: FramingArg,
    },
}

#[derive(Args)]
struct StreamArgs {
    /// Var-meta index stream file
    #[arg(long)]
    meta: PathBuf,

    /// Payload stream file
    #[arg(long)]
    data: PathBuf,

    /// Fail on declared/actual entry count drift
    #[arg(long)]
    strict: bool,
}

#[derive(Args)]
struct OutputArgs {
    /// Output file path (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(short, long)]
    pretty: bool,

    /// Bytes shown per value
    #[arg(long, default_value_t = DEFAULT_PREVIEW)]
    preview: usize,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Byte,
    Short,
    Int,
    Long6,
    Long,
    Double,
    Duration,
    Time,
    Date,
    Timestamp,
    Text,
    Unicode,
    Bytes,
}

impl From<KindArg> for ValueKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Byte => ValueKind::Byte,
            KindArg::Short => ValueKind::Short,
            KindArg::Int => ValueKind::Int,
            KindArg::Long6 => ValueKind::Long6,
            KindArg::Long => ValueKind::Long,
            KindArg::Double => ValueKind::Double,
            KindArg::Duration => ValueKind::Duration,
            KindArg::Time => ValueKind::Time,
            KindArg::Date => ValueKind::Date,
            KindArg::Timestamp => ValueKind::Timestamp,
            KindArg::Text => ValueKind::Text,
            KindArg::Unicode => ValueKind::UnicodeText,
            KindArg::Bytes => ValueKind::Bytes,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FramingArg {
    /// Width implied by the kind
    Fixed,
    SizePrefixed,
    Terminated,
    NextOffset,
    ToEnd,
}

impl FramingArg {
    /// Framing of the stored field. An extended block is a size-prefixed
    /// value regardless of the sub-value kind.
    fn field(framing: Option<Self>, kind: ValueKind, sub: Option<i32>) -> Framing {
        match (framing, sub) {
            (Some(framing), _) => framing.resolve(kind),
            (None, Some(_)) => Framing::SizePrefixed,
            (None, None) => FramingArg::Fixed.resolve(kind),
        }
    }

    /// Resolve against a kind; variable-length kinds have no fixed width.
    fn resolve(self, kind: ValueKind) -> Framing {
        match self {
            FramingArg::Fixed => kind.width().map_or(Framing::Terminated, Framing::Fixed),
            FramingArg::SizePrefixed => Framing::SizePrefixed,
            FramingArg::Terminated => Framing::Terminated,
            FramingArg::NextOffset => Framing::UntilNextOffset,
            FramingArg::ToEnd => Framing::ToEnd,
        }
    }
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn main() {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    let result = match &cli.command {
        Command::Index { streams, output } => dump_index(streams, output),
        Command::Props {
            input,
            strict,
            output,
        } => dump_props(input, *strict, output),
        Command::Field {
            streams,
            id,
            field_type,
            kind,
            framing,
            sub,
            ref_framing,
        } => {
            let kind = ValueKind::from(*kind);
            let request = FieldRequest {
                id: *id,
                field_type: *field_type,
                kind,
                framing: FramingArg::field(*framing, kind, *sub),
                sub: *sub,
                ref_framing: ref_framing.resolve(kind),
            };
            show_field(streams, &request)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("mpp_varstore=debug,varstore_dump=debug,info")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_store(streams: &StreamArgs) -> CliResult<VarDataStore> {
    let meta = std::fs::read(&streams.meta)?;
    let payload = std::fs::read(&streams.data)?;
    debug!(meta = meta.len(), payload = payload.len(), "streams read");

    let decoder = VarMeta12 {
        strict: streams.strict,
    };
    let index = decoder.decode_index(&meta)?;
    if streams.strict {
        index.check_count("VarMeta")?;
    }

    let name = streams
        .data
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "VarData".to_string());
    Ok(VarDataStore::new(name, Arc::new(index), payload))
}

fn dump_index(streams: &StreamArgs, args: &OutputArgs) -> CliResult<()> {
    let store = load_store(streams)?;
    let dump = IndexDump::from_store(&store, args.preview);
    info!(
        entities = dump.entities.len(),
        fields = dump.field_count(),
        errors = dump.error_count(),
        "index dumped"
    );

    write_output(args, |writer| match args.format {
        OutputFormat::Json => Ok(output::write_json(&dump, writer, args.pretty)?),
        OutputFormat::Csv => Ok(output::write_index_csv(&dump, writer)?),
    })
}

fn dump_props(input: &Path, strict: bool, args: &OutputArgs) -> CliResult<()> {
    let bytes = std::fs::read(input)?;
    let props = Props14 { strict }.decode_props(&bytes)?;
    let dump = PropsDump::from_props(&props, args.preview);
    info!(properties = dump.properties.len(), "properties dumped");

    write_output(args, |writer| match args.format {
        OutputFormat::Json => Ok(output::write_json(&dump, writer, args.pretty)?),
        OutputFormat::Csv => Ok(output::write_props_csv(&dump, writer)?),
    })
}

fn write_output(
    args: &OutputArgs,
    write: impl FnOnce(&mut dyn Write) -> CliResult<()>,
) -> CliResult<()> {
    let mut writer: BufWriter<Box<dyn Write>> = match &args.output {
        Some(path) => BufWriter::new(Box::new(File::create(path)?)),
        None => BufWriter::new(Box::new(io::stdout().lock())),
    };
    write(&mut writer)?;
    if matches!(args.format, OutputFormat::Json) {
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

struct FieldRequest {
    id: i32,
    field_type: i32,
    kind: ValueKind,
    framing: Framing,
    sub: Option<i32>,
    ref_framing: Framing,
}

fn show_field(streams: &StreamArgs, req: &FieldRequest) -> CliResult<()> {
    let store = load_store(streams)?;

    let value: Option<Value> = match req.sub {
        Some(sub) => match store.extended(req.id, req.field_type, req.framing)? {
            Some(block) => {
                debug!(entries = block.len(), "extended block scanned");
                block.read(sub, req.kind, req.ref_framing)?
            }
            None => None,
        },
        None => store.read(req.id, req.field_type, req.kind, req.framing)?,
    };

    match value {
        Some(value) => println!("{}", value),
        None => println!("<absent>"),
    }
    Ok(())
}
