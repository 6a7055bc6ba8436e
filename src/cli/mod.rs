use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_DOMAIN: &str = "JW300";

#[derive(Parser)]
#[command(name = "masakhane-loader")]
#[command(version, about = "Download Masakhane JoeyNMT models and prepare them for local use", long_about = None)]
pub struct Cli {
	/// Path to a TOML configuration file
	#[arg(long, global = true, env = "MASAKHANE_CONFIG")]
	pub config: Option<PathBuf>,

	/// Registry location (URL or local TSV file), overrides the configuration
	#[arg(long, global = true)]
	pub registry: Option<String>,

	/// Root directory for downloaded models, overrides the configuration
	#[arg(long, global = true)]
	pub models_dir: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Download the model for one language pair
	Fetch {
		/// Source language code (e.g., "en")
		src_lang: String,

		/// Target language code (e.g., "zu")
		trg_lang: String,

		/// Preferred domain when several models exist for the pair
		#[arg(long, default_value = DEFAULT_DOMAIN)]
		domain: String,
	},

	/// Download every available model for a source language and report the results
	CheckAll {
		/// Source language code
		src_lang: String,

		#[arg(long, default_value = DEFAULT_DOMAIN)]
		domain: String,

		/// Print the report as JSON
		#[arg(long)]
		json: bool,
	},

	/// List models available for a source language
	List {
		/// Source language code
		src_lang: String,

		#[arg(long, default_value = DEFAULT_DOMAIN)]
		domain: String,
	},
}
