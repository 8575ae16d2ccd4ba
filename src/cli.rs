use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "zipman")]
#[command(version)]
#[command(about = "List, extract, create and test ZIP archives", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipman list data.zip                  show entries with their indices\n  \
  zipman extract data.zip -s 0,2,5-8    extract entries 0, 2 and 5 to 8\n  \
  zipman create photos/ photos -e       create photos.zip, asking for a password\n  \
  zipman test data.zip -P secret        verify every entry's CRC")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Read defaults from this TOML file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", global = true, action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List archive entries with their indices
    #[command(alias = "l")]
    List {
        /// ZIP file path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Show sizes, ratios, dates and totals
        #[arg(short = 'l', long = "long")]
        long: bool,

        /// Password for encrypted archives
        #[arg(short = 'P', long)]
        password: Option<String>,
    },

    /// Extract all entries or a selection of them
    #[command(alias = "x")]
    Extract {
        /// ZIP file path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Entry indices to extract, e.g. "0,2,5-8" (default: all)
        #[arg(short = 's', long = "select", value_name = "SELECTION")]
        selection: Option<String>,

        /// Extract files into this directory
        #[arg(short = 'd', value_name = "DIR")]
        extract_dir: Option<PathBuf>,

        /// Password for encrypted entries
        #[arg(short = 'P', long)]
        password: Option<String>,

        /// Overwrite existing files WITHOUT prompting
        #[arg(short = 'o', conflicts_with = "never_overwrite")]
        overwrite: bool,

        /// Never overwrite existing files
        #[arg(short = 'n')]
        never_overwrite: bool,

        /// Junk paths (do not make directories)
        #[arg(short = 'j')]
        junk_paths: bool,

        /// Quiet mode, no progress bar or per-file messages
        #[arg(short = 'q')]
        quiet: bool,
    },

    /// Create an archive from a file or directory
    #[command(alias = "c")]
    Create {
        /// File or directory to compress
        #[arg(value_name = "SOURCE")]
        source: PathBuf,

        /// Output archive path (".zip" is appended when missing)
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Compression level 0-9 (0 stores without compression)
        #[arg(short = 'l', long, value_parser = clap::value_parser!(u32).range(0..=9))]
        level: Option<u32>,

        /// Ask for a password and encrypt the entries
        #[arg(short = 'e', long, conflicts_with = "password")]
        encrypt: bool,

        /// Encrypt the entries with this password
        #[arg(short = 'P', long)]
        password: Option<String>,

        /// Replace an existing output file without asking
        #[arg(short = 'f', long)]
        force: bool,
    },

    /// Show a summary of an archive
    #[command(alias = "i")]
    Info {
        /// ZIP file path
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Decode every entry and verify its CRC
    #[command(alias = "t")]
    Test {
        /// ZIP file path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Password for encrypted entries
        #[arg(short = 'P', long)]
        password: Option<String>,
    },
}

impl Cli {
    /// Log filter derived from `-v` occurrences.
    pub fn log_level(&self) -> &'static str {
        match self.verbosity {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn extract_accepts_selection_and_flags() {
        let cli = Cli::parse_from(["zipman", "extract", "a.zip", "-s", "0,2-4", "-d", "out", "-o"]);
        match cli.command {
            Command::Extract {
                selection,
                extract_dir,
                overwrite,
                ..
            } => {
                assert_eq!(selection.as_deref(), Some("0,2-4"));
                assert_eq!(extract_dir, Some(PathBuf::from("out")));
                assert!(overwrite);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn create_rejects_out_of_range_level() {
        assert!(Cli::try_parse_from(["zipman", "create", "src", "out", "-l", "10"]).is_err());
    }

    #[test]
    fn verbosity_maps_to_log_level() {
        let cli = Cli::parse_from(["zipman", "-vv", "info", "a.zip"]);
        assert_eq!(cli.log_level(), "debug");
    }
}
