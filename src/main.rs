use std::fs;
use std::io;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::{error, info, warn, Level};

use lisafs::{format_volume, Error, Geometry, TextPolicy, Volume, VolumeImage, WriteOptions};

#[derive(Parser)]
#[command(version, about = "Insert files into a Lisa ProFile volume image")]
struct Args {
    /// Existing Disk Copy 4.2 volume image; never modified
    #[arg(short, long, required_unless_present = "format", conflicts_with = "format")]
    input: Option<PathBuf>,

    /// Where the rewritten image is written
    #[arg(short, long)]
    output: PathBuf,

    /// Start from a freshly formatted, empty volume instead of --input
    #[arg(long)]
    format: bool,

    /// Volume size in sectors (formatting, or to insist on a size when loading)
    #[arg(long)]
    sectors: Option<u32>,

    /// File to insert, as HOST_PATH or HOST_PATH=LISA_NAME
    #[arg(short, long = "file", value_name = "HOST[=NAME]")]
    files: Vec<String>,

    /// Line-ending conversion for inserted files
    #[arg(long, value_enum, default_value_t = Policy::Auto)]
    text: Policy,

    /// Print the catalog after inserting
    #[arg(short, long)]
    list: bool,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Policy {
    Raw,
    Lisa,
    Auto,
}

impl From<Policy> for TextPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::Raw => TextPolicy::Raw,
            Policy::Lisa => TextPolicy::LisaText,
            Policy::Auto => TextPolicy::Auto,
        }
    }
}

/// Splits `HOST[=NAME]`; the Lisa name defaults to the host file name.
fn parse_file_arg(arg: &str) -> (PathBuf, String) {
    match arg.split_once('=') {
        Some((host, name)) => (PathBuf::from(host), name.to_string()),
        None => {
            let host = PathBuf::from(arg);
            let name = host
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| arg.to_string());
            (host, name)
        }
    }
}

fn run(args: Args) -> Result<(), Error> {
    let geometry = args.sectors.map(Geometry::new);
    let image = match &args.input {
        Some(input) => {
            let same = matches!(
                (fs::canonicalize(input), fs::canonicalize(&args.output)),
                (Ok(a), Ok(b)) if a == b
            );
            if same {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "refusing to overwrite the input image; write to a copy",
                )));
            }
            VolumeImage::load(input, geometry)?
        }
        None => format_volume(geometry.unwrap_or(Geometry::PROFILE_5MB), "lisafs")?,
    };

    let mut volume = Volume::open(image)?;
    let options = WriteOptions {
        policy: args.text.into(),
        ..WriteOptions::default()
    };
    for arg in &args.files {
        let (host, name) = parse_file_arg(arg);
        let content = fs::read(&host)?;
        match volume.write_file(&name, &content, &options) {
            Ok(entry) => info!("{} -> {} (s-file {})", host.display(), entry.name, entry.sfile),
            Err(Error::DuplicateName(name)) => warn!("skipped {}: name already on volume", name),
            Err(e) => return Err(e),
        }
    }

    if args.list {
        print!("{}", volume.dump()?);
    }
    volume.finish().save(&args.output)
}

fn main() -> Result<(), Error> {
    let args = Args::parse();
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    run(args).inspect_err(|e| error!("{}", e))
}
