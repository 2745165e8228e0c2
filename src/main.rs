use arch_wiki_md::logging::init_logging;
use arch_wiki_md::{Config, Result, SourceFormat, WikiClient};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

#[derive(Debug, Parser)]
#[command(name = "arch-wiki-md", version, about = "Mirror the ArchWiki as Markdown files")]
struct Cli {
    /// Directory the Markdown tree and db.json are written to.
    #[arg(short = 't', long, global = true, value_name = "PATH")]
    target_dir: Option<PathBuf>,
    /// Table of contents page (URL or local HTML file) used by `scrape`.
    #[arg(short = 'c', long = "table-of-contents", global = true, value_name = "URL|PATH")]
    table_of_contents: Option<String>,
    /// Fetch rendered HTML instead of wikitext (slower, easier to convert).
    #[arg(long, global = true)]
    html: bool,
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,
    /// More log output; repeat for more.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch every article and write the full mirror.
    Build,
    /// Fetch articles changed since the last build or sync.
    Sync,
    /// Crawl the table of contents and category pages.
    Scrape,
    /// Convert a local file and print the result.
    Convert(ConvertArgs),
}

#[derive(Debug, Args)]
struct ConvertArgs {
    file: PathBuf,
    /// Print the description instead of the Markdown.
    #[arg(long)]
    describe: bool,
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = Config::default();
        if let Some(dir) = &self.target_dir {
            config.target_dir = dir.clone();
        }
        if let Some(toc) = &self.table_of_contents {
            config.toc = toc.clone();
        }
        if let Some(api_url) = &self.api_url {
            config.api_url = api_url.clone();
        }
        if self.html {
            config.format = SourceFormat::Html;
        }
        config
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.config();
    match &cli.command {
        Command::Build => {
            let mut client = WikiClient::new(&config)?;
            arch_wiki_md::build(&config, &mut client)?;
        }
        Command::Sync => {
            let mut client = WikiClient::new(&config)?;
            arch_wiki_md::sync(&config, &mut client)?;
        }
        Command::Scrape => {
            let mut client = WikiClient::new(&config)?;
            arch_wiki_md::scrape(&config, &mut client)?;
        }
        Command::Convert(args) => {
            let out = arch_wiki_md::convert_file(&args.file, config.format, args.describe)?;
            println!("{}", out);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(target: "arch_wiki_md", "{e}");
            ExitCode::FAILURE
        }
    }
}
