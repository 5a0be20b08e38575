use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "deep-search")]
#[command(about = "Search the web, render the results in a headless browser and follow their links")]
#[command(version)]
pub struct Args {
    /// Query to search for (not used with --serve)
    pub query: Option<String>,

    /// Number of search results to visit
    #[arg(short, long, allow_negative_numbers = true)]
    pub results: Option<i64>,

    /// Levels of links to follow, the results themselves being level 1
    #[arg(short, long, allow_negative_numbers = true)]
    pub depth: Option<i64>,

    /// JSON configuration file (environment variables override it)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Answer JSON requests read line by line from stdin
    #[arg(long, conflicts_with = "query")]
    pub serve: bool,

    /// Print the tool's name, description and input schema as JSON, then exit
    #[arg(long, conflicts_with_all = ["query", "serve"])]
    pub describe: bool,
}
