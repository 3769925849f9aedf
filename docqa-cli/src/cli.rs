use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "docqa")]
#[command(about = "Ask questions about PDFs and exported database records", long_about = None)]
pub struct Cli {
    #[arg(long, global = true, help = "Directory of the persisted index (overrides DOCQA_INDEX_DIR)")]
    pub index_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Index PDF (or text/markdown) files and answer questions about them")]
    Pdf {
        #[arg(required = true, help = "Files to index")]
        files: Vec<PathBuf>,

        #[command(flatten)]
        query: QueryArgs,
    },

    #[command(about = "Index JSON records and answer questions about them")]
    Records {
        #[arg(long, conflicts_with = "from_mongo", required_unless_present = "from_mongo", help = "JSON export to index")]
        json: Option<PathBuf>,

        #[arg(long, help = "Export the source database first, then index the export")]
        from_mongo: bool,

        #[arg(long, default_value = "users", help = "Top-level key holding the records")]
        key: String,

        #[arg(long, default_value = "data/blogging.json", help = "Where --from-mongo writes the export")]
        export_path: PathBuf,

        #[arg(long, help = "Rebuild the index even if one exists")]
        rebuild: bool,

        #[command(flatten)]
        query: QueryArgs,
    },

    #[command(about = "Export the source database collections to JSON")]
    ExportMongo {
        #[arg(long, default_value = "data/blogging.json", help = "Output file")]
        out: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    #[arg(long, help = "Answer one question and exit instead of starting the prompt")]
    pub question: Option<String>,

    #[arg(long, help = "Number of chunks retrieved per question")]
    pub top_k: Option<usize>,
}
