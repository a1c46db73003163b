use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use np2_tools::bitmap_get::load_bitmap;
use np2_tools::bitmap_make::save_bitmap;
use np2_tools::iface_check;
use np2_tools::param_validator::{parse_color_count, parse_depth, parse_percent};
use np2_tools::quantize;
use np2_tools::recipes::{self, STANDARD_SIZES};
use np2_tools::release_build::{self, PackageOutcome, ReleaseBuilder};
use np2_tools::release_config::ReleaseConfig;
use np2_tools::{Axis, Bitmap, ColorDepth, QuantizeMethod, ResizeMethod};


#[derive(Parser)]
#[command(name = "np2tools", about = "Notepad2 build tooling", version)]
struct Cli {
	/// Log debug messages
	#[arg(short, long, global = true, conflicts_with = "quiet")]
	verbose: bool,

	/// Log warnings and errors only
	#[arg(short, long, global = true)]
	quiet: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// Bitmap conversion and toolbar generation
	#[command(subcommand)]
	Image(ImageCommand),

	/// Audit Scintilla interface definitions
	#[command(subcommand)]
	Iface(IfaceCommand),

	/// Build, package and upload release archives
	#[command(subcommand)]
	Release(ReleaseCommand),
}

#[derive(Subcommand)]
enum ImageCommand {
	/// Convert between BMP and PNG, optionally changing the bit depth
	Convert {
		input: PathBuf,
		#[arg(short, long)]
		output: Option<PathBuf>,
		#[arg(short, long, value_parser = parse_depth)]
		depth: Option<ColorDepth>,
		/// Reduce colors to fit an indexed depth first
		#[arg(long)]
		quantize: bool,
		#[arg(long, value_enum)]
		method: Option<QuantizeMethod>,
	},

	/// Print the header and write the raw pixel data
	Dump { input: PathBuf },

	/// Join images side by side or stacked
	Concat {
		#[arg(value_enum)]
		axis: Axis,
		output: PathBuf,
		#[arg(required = true)]
		inputs: Vec<PathBuf>,
		#[arg(short, long, value_parser = parse_depth)]
		depth: Option<ColorDepth>,
	},

	/// Cut an image into tiles
	Split {
		#[arg(value_enum)]
		axis: Axis,
		input: PathBuf,
		/// Tile sizes, e.g. "16x40" or "16 24 32"; square tiles when absent
		#[arg(long)]
		dims: Option<String>,
		#[arg(long)]
		out_dir: Option<PathBuf>,
		#[arg(long)]
		ext: Option<String>,
	},

	/// Mirror an image
	Flip {
		#[arg(value_enum)]
		axis: Axis,
		input: PathBuf,
		#[arg(short, long)]
		output: Option<PathBuf>,
	},

	/// Scale a toolbar strip
	Resize {
		input: PathBuf,
		#[arg(short, long, value_parser = parse_percent)]
		percent: u32,
		#[arg(short, long, value_enum, default_value = "nearest")]
		method: ResizeMethod,
		/// Scale every square icon on its own
		#[arg(long)]
		each: bool,
		#[arg(short, long)]
		output: Option<PathBuf>,
	},

	/// Reduce the palette to 2, 16 or 256 colors
	Quantize {
		input: PathBuf,
		#[arg(short, long, value_parser = parse_color_count)]
		colors: usize,
		#[arg(short, long, value_enum, default_value = "median-cut")]
		method: QuantizeMethod,
		#[arg(short, long)]
		output: Option<PathBuf>,
	},

	/// Assemble the toolbar bitmaps from the icon folders
	Toolbar {
		#[arg(value_enum)]
		kind: ToolbarKind,
		/// Folder holding `<size>x<size>/` icon folders
		#[arg(long)]
		images_dir: PathBuf,
		#[arg(long)]
		out_dir: PathBuf,
		/// Icon size; every standard size when absent
		#[arg(long)]
		size: Option<u32>,
	},
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum ToolbarKind {
	Notepad2,
	Metapath,
	Other,
}

#[derive(Subcommand)]
enum IfaceCommand {
	/// Message number holes and collisions in Scintilla.iface
	Api { path: PathBuf },

	/// Lexer and style id collisions in SciLexer.iface
	Lexer { path: PathBuf },
}

#[derive(Subcommand)]
enum ReleaseCommand {
	/// Build and package every locale and architecture
	Build {
		#[arg(long)]
		config: Option<PathBuf>,
		/// Log external commands without running them
		#[arg(long)]
		dry_run: bool,
	},

	/// Upload the archives of the build folder to a GitHub release
	Upload {
		tag: String,
		#[arg(long)]
		config: Option<PathBuf>,
		#[arg(long)]
		dry_run: bool,
	},

	/// Print the application version
	Version {
		#[arg(long)]
		config: Option<PathBuf>,
	},
}


fn init_logging(verbose: bool, quiet: bool) {
	let level: &str = if verbose { "debug" } else if quiet { "warn" } else { "info" };
	let filter: EnvFilter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

	tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}


fn main() -> Result<()> {
	let cli = Cli::parse();
	init_logging(cli.verbose, cli.quiet);

	match cli.command {
		Command::Image(command) => run_image(command),
		Command::Iface(command) => run_iface(command),
		Command::Release(command) => run_release(command),
	}
}


fn run_image(command: ImageCommand) -> Result<()> {
	match command {
		ImageCommand::Convert { input, output, depth, quantize, method } => {
			recipes::convert_image(&input, output.as_deref(), depth, quantize, method)
				.with_context(|| format!("converting {}", input.display()))?;
		},

		ImageCommand::Dump { input } => {
			let dump = recipes::dump_bitmap(&input).with_context(|| format!("dumping {}", input.display()))?;

			if let Some(header) = &dump.header {
				println!("{}", header);
			}
			println!("size: {}x{}, depth: {}, colors used: {}", dump.size.0, dump.size.1, dump.depth, dump.color_used);
		},

		ImageCommand::Concat { axis, output, inputs, depth } => {
			recipes::concat_images(axis, &inputs, &output, depth).with_context(|| format!("writing {}", output.display()))?;
		},

		ImageCommand::Split { axis, input, dims, out_dir, ext } => {
			let tiles: Vec<PathBuf> = recipes::split_image(axis, &input, dims.as_deref(), out_dir.as_deref(), ext.as_deref())
				.with_context(|| format!("splitting {}", input.display()))?;
			info!("wrote {} tiles", tiles.len());
		},

		ImageCommand::Flip { axis, input, output } => {
			recipes::flip_image(axis, &input, output.as_deref()).with_context(|| format!("flipping {}", input.display()))?;
		},

		ImageCommand::Resize { input, percent, method, each, output } => {
			let result = if each {
				recipes::resize_toolbar_each(&input, percent, method, output.as_deref())
			}
			else {
				recipes::resize_toolbar_whole(&input, percent, method, output.as_deref())
			};

			let written: PathBuf = result.with_context(|| format!("resizing {}", input.display()))?;
			info!("wrote {}", written.display());
		},

		ImageCommand::Quantize { input, colors, method, output } => {
			let bitmap: Bitmap = load_bitmap(&input).with_context(|| format!("reading {}", input.display()))?;
			let before: usize = bitmap.color_used();
			let quantized: Bitmap = quantize::quantize(&bitmap, colors, method)?;
			let output: PathBuf = output.unwrap_or_else(|| input.clone());

			info!("quantize image {}: {} => {}", method.name(), before, quantized.color_used());
			save_bitmap(&quantized, &output, ColorDepth::for_color_count(colors)).with_context(|| format!("writing {}", output.display()))?;
		},

		ImageCommand::Toolbar { kind, images_dir, out_dir, size } => {
			fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
			let sizes: Vec<u32> = size.map_or_else(|| STANDARD_SIZES.to_vec(), |size| vec![size]);

			match kind {
				ToolbarKind::Notepad2 => {
					for size in sizes {
						recipes::make_notepad2_toolbar(size, &images_dir, &out_dir)?;
					}
				},

				ToolbarKind::Metapath => {
					for size in sizes {
						recipes::make_metapath_toolbar(size, &images_dir, &out_dir)?;
					}
				},

				ToolbarKind::Other => {
					recipes::make_other_bitmaps(&images_dir, &out_dir)?;
				},
			}
		},
	}

	Ok(())
}


fn run_iface(command: IfaceCommand) -> Result<()> {
	match command {
		IfaceCommand::Api { path } => {
			let text: String = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
			print!("{}", iface_check::find_api_holes(&text));
		},

		IfaceCommand::Lexer { path } => {
			let text: String = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
			print!("{}", iface_check::check_lexer_definition(&text));
		},
	}

	Ok(())
}


fn run_release(command: ReleaseCommand) -> Result<()> {
	match command {
		ReleaseCommand::Build { config, dry_run } => {
			let config: ReleaseConfig = ReleaseConfig::load(config.as_deref())?;
			let builder = ReleaseBuilder::new(config, dry_run)?;
			let outcomes: Vec<PackageOutcome> = builder.build_all()?;

			let packaged: usize = outcomes.iter().filter(|outcome| matches!(outcome, PackageOutcome::Packaged { .. })).count();
			info!("{} of {} archives packaged", packaged, outcomes.len());
		},

		ReleaseCommand::Upload { tag, config, dry_run } => {
			let config: ReleaseConfig = ReleaseConfig::load(config.as_deref())?;
			release_build::upload(&config, &tag, dry_run)?;
		},

		ReleaseCommand::Version { config } => {
			let config: ReleaseConfig = ReleaseConfig::load(config.as_deref())?;
			let version = release_build::app_version(&config.resolve(&config.version_header), &config.resolve(&config.version_rev_header))?;
			println!("{}", version);
		},
	}

	Ok(())
}
