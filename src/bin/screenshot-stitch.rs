use std::path::PathBuf;
use std::process;

use clap::Parser;

use screenshot_stitcher::{
    collect_inputs, default_output_path, resolve_header_height, save_image, AnalysisReport,
    IssueKind, SeparatorStyle, StitchEngine, StitchOptions,
};

#[derive(Parser)]
#[command(
    name = "screenshot-stitch",
    about = "Stitch vertically scrolled screenshots into one image",
    version,
    after_help = "Inputs are sorted by file name in numeric order (1.png, 2.png, 10.png)\n\
                  unless --keep-order is given. Directories expand to the images they contain."
)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Input image files or directories, top to bottom
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output file (default: {first}_stitched.png next to the first input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Keep the command-line order instead of sorting by file name
    #[arg(long)]
    keep_order: bool,

    /// Rows of repeating header to strip from every image but the first
    #[arg(long)]
    header_height: Option<u32>,

    /// Analysis report (JSON) with issues and a suggested header height
    #[arg(long)]
    analysis: Option<PathBuf>,

    /// Drop the later image of every SIMILARITY pair in the analysis report
    #[arg(long, requires = "analysis")]
    drop_similar: bool,

    /// Insert a thin 3px separator where images do not overlap
    #[arg(long)]
    separator: bool,

    /// Separator height in pixels (overrides --separator)
    #[arg(long)]
    separator_height: Option<u32>,

    /// Separator color as #RRGGBB
    #[arg(long, default_value = "#4B5563")]
    separator_color: String,

    /// Fraction of pixels per row allowed to differ when matching (0.0-1.0)
    #[arg(short, long, default_value = "0.01")]
    tolerance: f32,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if !(0.0..=1.0).contains(&cli.tolerance) {
        eprintln!("Error: Tolerance must be between 0.0 and 1.0");
        process::exit(1);
    }

    let color = match SeparatorStyle::parse_color(&cli.separator_color) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };
    let separator_height = match (cli.separator_height, cli.separator) {
        (Some(h), _) => h,
        (None, true) => SeparatorStyle::thin().height_px,
        (None, false) => 0,
    };

    let report = match cli.analysis.as_deref().map(AnalysisReport::from_path) {
        Some(Ok(r)) => Some(r),
        Some(Err(e)) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
        None => None,
    };

    let mut files = match collect_inputs(&cli.inputs, cli.keep_order) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error: Failed to read inputs: {e}");
            process::exit(1);
        }
    };
    if files.is_empty() {
        eprintln!("Error: No supported images found");
        process::exit(1);
    }

    if let Some(report) = &report {
        if !cli.quiet {
            for issue in &report.issues {
                let kind = match issue.kind {
                    IssueKind::Gap => "GAP",
                    IssueKind::Similarity => "SIMILARITY",
                };
                let (a, b) = issue.indices;
                eprintln!("[WARN] {kind} between #{a} and #{b}: {}", issue.reason);
            }
        }
        if cli.drop_similar {
            for index in report.similar_duplicates(files.len()).into_iter().rev() {
                let dropped = files.remove(index);
                if !cli.quiet {
                    eprintln!("[SKIP] {}: similar to previous image", dropped.display());
                }
            }
        }
    }

    let header_height = resolve_header_height(
        cli.header_height,
        report.as_ref().map(|r| r.common_header_height),
    );

    let opts = StitchOptions {
        header_height,
        separator: SeparatorStyle::new(separator_height, color),
        row_tolerance: cli.tolerance,
    };

    if !cli.quiet {
        eprintln!(
            "Stitching {} images (header crop: {header_height}px, tolerance: {:.1}%)",
            files.len(),
            opts.row_tolerance * 100.0
        );
    }

    let engine = StitchEngine::new(opts);
    let stitched = match engine.stitch_files(&files) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("[FAIL] {e}");
            process::exit(1);
        }
    };

    if cli.verbose {
        for (i, (path, overlap)) in files.iter().zip(&stitched.overlaps).enumerate() {
            eprintln!("  #{i} {}: overlap {overlap}px", path.display());
        }
    }

    let output = cli
        .output
        .unwrap_or_else(|| default_output_path(&files[0]));
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("[FAIL] Failed to create output directory: {e}");
            process::exit(1);
        }
    }

    if let Err(e) = save_image(&stitched.canvas, &output) {
        eprintln!("[FAIL] {}: {e}", output.display());
        process::exit(1);
    }

    if !cli.quiet {
        eprintln!(
            "[OK] {} ({}x{}, overlaps: {:?})",
            output.display(),
            stitched.canvas.width(),
            stitched.canvas.height(),
            stitched.overlaps
        );
    }
}
