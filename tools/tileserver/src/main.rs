use std::{path::PathBuf, str::FromStr};

use clap::Parser;
use env_logger::{Env, TimestampPrecision};
use tileserver::tileapihandler;

/// Elevation tile server: serves the §6 HTTP surface (uint16 wire tiles,
/// colorized PNG tiles, point-sample risk lookups) over a precompressed
/// artifact pyramid with runtime synthesis as fallback.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Opt {
    /// Filesystem root for DEM `.zst` + `.json` source cells.
    #[arg(long, env = "TILESERVER_SOURCE_DIR")]
    source_dir: PathBuf,

    /// Filesystem root for the precompressed `.u16[.br|.gz]` pyramid.
    /// Omit to disable precompressed lookups and always synthesize at
    /// request time.
    #[arg(long, env = "TILESERVER_PRECOMPRESSED_DIR")]
    precompressed_dir: Option<PathBuf>,

    /// Max decompressed source arrays held in RAM.
    #[arg(long, env = "TILESERVER_SOURCE_CACHE_MAX", default_value_t = 64)]
    source_cache_max: usize,

    /// Max rendered PNGs held in RAM.
    #[arg(long, env = "TILESERVER_PNG_CACHE_MAX", default_value_t = 1000)]
    png_cache_max: usize,

    /// Policy maximum zoom level; cannot exceed the hard ceiling.
    #[arg(long, env = "TILESERVER_MAX_ZOOM", default_value_t = tile_engine::config::MAX_Z)]
    max_zoom: i32,

    /// Minimum accepted water level, in meters.
    #[arg(long, env = "TILESERVER_MIN_WATER_LEVEL_M", default_value_t = tile_engine::config::MIN_WL_M)]
    min_water_level_m: f64,

    /// Maximum accepted water level, in meters.
    #[arg(long, env = "TILESERVER_MAX_WATER_LEVEL_M", default_value_t = tile_engine::config::MAX_WL_M)]
    max_water_level_m: f64,

    /// Max in-flight tile syntheses before requests queue.
    #[arg(long, env = "TILESERVER_CONCURRENCY_CAP", default_value_t = 64)]
    concurrency_cap: usize,

    /// Max queued requests beyond the concurrency cap before `Overloaded`.
    #[arg(long, env = "TILESERVER_QUEUE_CAP", default_value_t = 256)]
    queue_cap: usize,

    /// Per-request deadline, in milliseconds.
    #[arg(long, env = "TILESERVER_DEADLINE_MS", default_value_t = 5_000)]
    deadline_ms: u64,

    /// Listen address; defaults to the unspecified address (all interfaces).
    #[arg(long, env = "TILESERVER_ADDR")]
    addr: Option<String>,

    /// Listen port.
    #[arg(long, env = "TILESERVER_PORT", default_value_t = 8080)]
    port: u16,
}

impl From<Opt> for tile_engine::Config {
    fn from(opt: Opt) -> Self {
        tile_engine::Config {
            source_dir: opt.source_dir,
            precompressed_dir: opt.precompressed_dir,
            source_cache_max: opt.source_cache_max,
            png_cache_max: opt.png_cache_max,
            max_zoom: opt.max_zoom.min(tile_engine::config::MAX_Z),
            water_level_range: (opt.min_water_level_m, opt.max_water_level_m),
            concurrency_cap: opt.concurrency_cap,
            queue_cap: opt.queue_cap,
            deadline_ms: opt.deadline_ms,
        }
    }
}

#[tokio::main(worker_threads = 16)]
async fn main() {
    let opt = Opt::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or("warn"))
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let addr = opt.addr.clone();
    let port = opt.port;
    let config: tile_engine::Config = opt.into();
    log::info!(
        "starting elevation tile server: source_dir={:?} precompressed_dir={:?} max_zoom={}",
        config.source_dir,
        config.precompressed_dir,
        config.max_zoom
    );

    let app = tileapihandler::create_router(config);

    let ip_addr = match addr {
        Some(addr) => std::net::IpAddr::from_str(addr.as_str()).expect("invalid ip address provided"),
        None => std::net::IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED),
    };

    let sock_addr = std::net::SocketAddr::from((ip_addr, port));
    log::debug!("listening on {sock_addr}");

    let listener = tokio::net::TcpListener::bind(&sock_addr).await.expect("unable to bind to address");
    axum::serve(listener, app).await.expect("unable to start server");
}
