//! urifs CLI - Command line interface for URI-addressed file handles
//!
//! Usage:
//!   urifs cat s3://bucket/key                 # Print content
//!   urifs exists sftp://user@host/path        # Exit 0 if present, 1 if not
//!   urifs walk ~/projects --max-depth 2       # List the directory tree
//!   echo hi | urifs put /tmp/hi.txt           # Write stdin
//!   urifs download s3://bucket/key ./key      # Copy a remote file locally
//!   urifs get config.yaml database            # Mapping lookup
//!   urifs get dynamodb://users alice          # Item lookup in a table
//!
//! Credentials go through `-c key=value` (repeatable). Logging is controlled
//! by `RUST_LOG` and written to stderr.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use futures_util::TryStreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing_subscriber::EnvFilter;
use urifs::{Credentials, FileHandle, Mapping, Mode, OpenOptions, WalkEntry, WalkOptions};

/// urifs - files addressed by URI
#[derive(Parser, Debug)]
#[command(name = "urifs")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Access mode: r, rb, r+, rb+, w, wb, w+, wb+, a, ab, a+, ab+
    #[arg(short, long, global = true)]
    mode: Option<String>,

    /// Backend credential, e.g. -c region=eu-west-1 (repeatable)
    #[arg(
        short = 'c',
        long = "credential",
        value_name = "KEY=VALUE",
        value_parser = parse_credential,
        global = true
    )]
    credentials: Vec<(String, String)>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Print the content of a resource
    Cat { uri: String },
    /// Check whether a resource exists
    Exists { uri: String },
    /// List the directory tree rooted at a URI
    Walk {
        uri: String,
        /// Deepest level to list; the root is level 0
        #[arg(long)]
        max_depth: Option<usize>,
        /// Descend into symlinked directories (local paths only)
        #[arg(long)]
        follow_links: bool,
        /// Print JSON instead of an indented listing
        #[arg(long)]
        json: bool,
    },
    /// Write stdin to a resource
    Put { uri: String },
    /// Download a remote resource to a local path (~/Downloads by default)
    Download { source: String, target: Option<String> },
    /// Look up a key in a JSON/YAML mapping, or list its keys
    Get { uri: String, key: Option<String> },
}

fn parse_credential(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

impl Args {
    fn credentials(&self) -> Credentials {
        self.credentials.iter().cloned().collect()
    }

    fn options(&self, default_mode: Mode) -> Result<OpenOptions> {
        let mode = match &self.mode {
            Some(raw) => raw.parse::<Mode>()?,
            None => default_mode,
        };
        Ok(OpenOptions::new().mode(mode).credentials(self.credentials()))
    }
}

fn render_entry(entry: &WalkEntry) -> String {
    let mut out = format!("{}\n", entry.dir);
    for dir in &entry.dirs {
        out.push_str(&format!("  {dir}/\n"));
    }
    for file in &entry.files {
        out.push_str(&format!("  {file}\n"));
    }
    out
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    match &args.command {
        Cmd::Cat { uri } => {
            let mut file = urifs::open(uri, args.options(Mode::ReadBinary)?)?;
            let content = file
                .read(None)
                .await
                .with_context(|| format!("Failed to read {}", urifs::redact_uri(uri)))?;
            file.close().await?;
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&content).await?;
            stdout.flush().await?;
        }
        Cmd::Exists { uri } => {
            let present = urifs::exists(uri, args.options(Mode::Read)?).await?;
            println!("{present}");
            if !present {
                std::process::exit(1);
            }
        }
        Cmd::Walk {
            uri,
            max_depth,
            follow_links,
            json,
        } => {
            let mut walk = WalkOptions::new().follow_links(*follow_links);
            if let Some(depth) = max_depth {
                walk = walk.max_depth(*depth);
            }
            let context = || format!("Failed to walk {}", urifs::redact_uri(uri));
            let mut entries = urifs::walk(uri, args.options(Mode::Read)?, &walk)
                .await
                .with_context(context)?;
            if *json {
                let entries: Vec<WalkEntry> = entries.try_collect().await.with_context(context)?;
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                // Printed as listed; a large tree starts showing immediately.
                while let Some(entry) = entries.try_next().await.with_context(context)? {
                    print!("{}", render_entry(&entry));
                }
            }
        }
        Cmd::Put { uri } => {
            let mut content = Vec::new();
            tokio::io::stdin().read_to_end(&mut content).await?;
            let mut file = urifs::open(uri, args.options(Mode::WriteBinary)?)?;
            file.write(content.as_slice().into())
                .await
                .with_context(|| format!("Failed to write {}", urifs::redact_uri(uri)))?;
            file.close().await?;
        }
        Cmd::Download { source, target } => {
            if args.mode.is_some() {
                bail!("--mode does not apply to download; targets are always opened r+");
            }
            let credentials = args.credentials();
            let target = urifs::download(source, target.as_deref(), Some(credentials))
                .await
                .with_context(|| format!("Failed to download {}", urifs::redact_uri(source)))?;
            println!("{}", target.uri());
        }
        Cmd::Get { uri, key } => {
            let mut mapping = urifs::map(uri, args.options(Mode::Read)?)?;
            match key {
                Some(key) => {
                    let value = mapping.get(key).await?;
                    println!("{}", serde_json::to_string_pretty(&value)?);
                }
                None => {
                    for key in mapping.keys().await? {
                        println!("{key}");
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn credential_pairs() {
        assert_eq!(
            parse_credential("region=eu-west-1"),
            Ok(("region".to_string(), "eu-west-1".to_string()))
        );
        assert_eq!(
            parse_credential("token=a=b"),
            Ok(("token".to_string(), "a=b".to_string()))
        );
        assert!(parse_credential("novalue").is_err());
        assert!(parse_credential("=value").is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "urifs", "cat", "s3://b/k", "-c", "region=us-east-1", "--mode", "rb",
        ])
        .unwrap();
        assert_eq!(args.credentials().get("region"), Some("us-east-1"));
        assert_eq!(args.options(Mode::Read).unwrap().get_mode(), Mode::ReadBinary);
    }

    #[test]
    fn invalid_mode_is_rejected() {
        let args = Args::try_parse_from(["urifs", "--mode", "rw", "cat", "x"]).unwrap();
        let err = args.options(Mode::Read).unwrap_err();
        assert_eq!(err.to_string(), "cannot open in 'rw' mode");
    }

    #[test]
    fn walk_listing() {
        let root = WalkEntry::new("s3://b/foo/", ["bar"], ["ban"]);
        let leaf = WalkEntry::new("s3://b/foo/bar/", Vec::<String>::new(), ["x"]);
        assert_eq!(render_entry(&root), "s3://b/foo/\n  bar/\n  ban\n");
        assert_eq!(render_entry(&leaf), "s3://b/foo/bar/\n  x\n");
    }
}
