use std::path::PathBuf;

use clap::Parser;
use env_logger::{Env, TimestampPrecision};
use indicatif::{MultiProgress, ProgressBar};
use indicatif_log_bridge::LogWrapper;

mod generate;

use generate::{GenerateOptions, Result};

#[derive(Parser, Debug)]
#[clap(name = "generate-artifacts", about = "Precompute the precompressed elevation tile pyramid")]
pub struct Opt {
    /// Root of the DEM source cell tree (`<cell_id>.zst` + `<cell_id>.json`).
    #[clap(long, env = "DEM_SOURCE_DIR")]
    pub source_dir: PathBuf,

    /// Root to write `<z>/<x>/<y>.u16[.br|.gz]` and `manifest.json` into.
    #[clap(long, env = "ARTIFACT_OUTPUT_DIR")]
    pub output_dir: PathBuf,

    #[clap(long, default_value_t = 0)]
    pub min_zoom: i32,

    #[clap(long)]
    pub max_zoom: i32,

    /// `south,west,north,east` in degrees; defaults to the full web-Mercator extent.
    #[clap(long, value_delimiter = ',', num_args = 4, default_value = "-85.0511,-180.0,85.0511,180.0")]
    pub bbox: Vec<f64>,

    /// Comma-separated variants to materialize: `br`, `gzip`, `identity`.
    #[clap(long, value_delimiter = ',', default_value = "br,gzip")]
    pub encodings: Vec<String>,

    #[clap(long, default_value_t = dem_store::DEFAULT_SOURCE_CACHE_CAPACITY)]
    pub source_cache_max: usize,
}

fn main() -> Result<()> {
    let opt = Opt::parse();

    let logger = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(Some(TimestampPrecision::Millis))
        .build();

    let multi = MultiProgress::new();
    let level = logger.filter();
    LogWrapper::new(multi.clone(), logger).try_init().unwrap();
    log::set_max_level(level);

    let encodings = opt
        .encodings
        .iter()
        .map(|s| generate::parse_encoding(s))
        .collect::<Result<Vec<_>>>()?;

    let [south, west, north, east] = opt.bbox[..] else {
        panic!("--bbox must have exactly 4 components: south,west,north,east");
    };

    let bar = multi.add(ProgressBar::new(0));
    let opts = GenerateOptions {
        source_dir: opt.source_dir,
        output_dir: opt.output_dir,
        min_zoom: opt.min_zoom,
        max_zoom: opt.max_zoom,
        bbox: (south, west, north, east),
        encodings,
        source_cache_max: opt.source_cache_max,
    };

    let manifest = generate::run(opts, |zoom, done, total| {
        bar.set_length(total);
        bar.set_position(done);
        bar.set_message(format!("zoom {zoom}"));
    })?;

    bar.finish_and_clear();
    log::info!(
        "generation complete: {} tiles written across zooms {}..={}",
        manifest.total_tiles_written(),
        manifest.min_zoom,
        manifest.max_zoom
    );

    Ok(())
}
