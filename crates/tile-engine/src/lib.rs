//! Tile Engine: the request coordinator. Owns the Source Store, the
//! Precompressed Artifact Store, the Tile Cache, and the two single-flight
//! coordinators that collapse duplicate concurrent work; translates engine
//! errors into the abstract taxonomy at `error::ErrorKind`.
//!
//! Constructed once at process startup (`TileEngine::new`) and held behind
//! an `Arc` by the HTTP harness; dropped at shutdown. No module-level
//! singletons.

pub mod config;
mod error;
mod point_sample;
mod single_flight;

use std::collections::HashMap;
use std::sync::Arc;

use artifact_store::{AcceptEncoding, ArtifactStore};
use dem_store::{ElevationLoader, Resampling, SourceStore};
use geo::{Coordinate, Tile};
use parking_lot::RwLock;
use tile_cache::{CacheKey, TileCache};

pub use config::Config;
pub use error::{Error, ErrorKind};
pub use point_sample::{PointSampleRequest, PointSampleResponse};
pub use single_flight::SingleFlight;

pub type Result<T = ()> = std::result::Result<T, Error>;

/// Where a served payload's bytes ultimately came from, surfaced to callers
/// as the `X-Tile-Source` diagnostic header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileSource {
    Precompressed,
    Runtime,
    Cache,
}

impl TileSource {
    pub fn header_value(self) -> &'static str {
        match self {
            TileSource::Precompressed => "precompressed",
            TileSource::Runtime => "runtime",
            TileSource::Cache => "cache",
        }
    }
}

/// Which colorization pipeline a `serve_png` call should run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PngMode {
    Topographic,
    Flood { water_level_m: f64 },
}

/// Result of `serve_uint16`: the response body (possibly still under a
/// content-encoding) plus the headers the HTTP layer needs to set.
pub struct Uint16Response {
    pub payload: Vec<u8>,
    pub source: TileSource,
    /// `Some("br")` / `Some("gzip")` when `payload` is still compressed;
    /// `None` when `payload` is the raw, identity-encoded 131,072 bytes.
    pub content_encoding: Option<&'static str>,
}

/// Result of `serve_png`: the rendered PNG body plus diagnostic headers.
pub struct PngResponse {
    pub bytes: Arc<[u8]>,
    pub source: TileSource,
    pub water_level_quantum: Option<f64>,
}

/// Process introspection for `/api/v1/status`: cache occupancy and
/// in-flight single-flight counts, pulled on demand rather than pushed.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Status {
    pub source_cache_entries: usize,
    pub png_cache_entries: usize,
    pub mosaic_syntheses_in_flight: usize,
    pub png_renders_in_flight: usize,
    pub precompressed_enabled: bool,
    /// `None` when there is no Precompressed Store, or its `manifest.json`
    /// is missing or unreadable - a status probe never fails over this.
    pub manifest: Option<ManifestSummary>,
}

/// The parts of `artifact_store::Manifest` worth surfacing over `/api/v1/status`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ManifestSummary {
    pub generator_version: String,
    pub min_zoom: u32,
    pub max_zoom: u32,
    pub variants: Vec<String>,
    pub total_tiles_written: u64,
}

impl From<artifact_store::Manifest> for ManifestSummary {
    fn from(m: artifact_store::Manifest) -> Self {
        ManifestSummary {
            generator_version: m.generator_version.clone(),
            min_zoom: m.min_zoom,
            max_zoom: m.max_zoom,
            variants: m.variants.clone(),
            total_tiles_written: m.total_tiles_written(),
        }
    }
}

type MosaicFlight = SingleFlight<(i32, i32, i32), Arc<[u8]>>;
type PngFlight = SingleFlight<CacheKey, (Arc<[u8]>, TileSource)>;

/// The request coordinator. Owns every store and cache the server needs;
/// constructed once, shared by reference (typically `Arc<TileEngine>`)
/// across request handlers.
pub struct TileEngine {
    config: Config,
    source_store: Arc<SourceStore>,
    artifact_store: Option<Arc<ArtifactStore>>,
    png_cache: TileCache,
    mosaic_flight: MosaicFlight,
    png_flight: PngFlight,
    topo_lut: Arc<colormap::Lut>,
    flood_luts: RwLock<HashMap<i64, Arc<colormap::Lut>>>,
    /// Bounds in-flight tile syntheses/renders to `config.concurrency_cap`.
    concurrency: Arc<tokio::sync::Semaphore>,
    /// Requests currently queued waiting for a concurrency permit; beyond
    /// `config.queue_cap` a new arrival is rejected as `Overloaded` rather
    /// than joining the queue.
    queued: std::sync::atomic::AtomicUsize,
}

impl TileEngine {
    pub fn new(config: Config) -> Self {
        let source_store = Arc::new(SourceStore::with_capacity(&config.source_dir, config.source_cache_max));
        let artifact_store = config.precompressed_dir.as_ref().map(|dir| Arc::new(ArtifactStore::new(dir)));
        let png_cache = TileCache::new(config.png_cache_max);
        let topo_lut = Arc::new(colormap::Lut::build(colormap::Mode::Topographic));
        let concurrency = Arc::new(tokio::sync::Semaphore::new(config.concurrency_cap));

        TileEngine {
            config,
            source_store,
            artifact_store,
            png_cache,
            mosaic_flight: SingleFlight::new(),
            png_flight: SingleFlight::new(),
            topo_lut,
            flood_luts: RwLock::new(HashMap::new()),
            concurrency,
            queued: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Admits one more in-flight request under `concurrency_cap`, queuing if
    /// the cap is already reached and rejecting outright once `queue_cap`
    /// waiters are already queued. Then runs `f` under `deadline_ms`,
    /// translating an expired deadline to `Error::Timeout`.
    async fn admit<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        use std::sync::atomic::Ordering;

        if self.queued.load(Ordering::SeqCst) >= self.config.queue_cap {
            return Err(Error::Overloaded);
        }
        self.queued.fetch_add(1, Ordering::SeqCst);
        let permit = Arc::clone(&self.concurrency).acquire_owned().await;
        self.queued.fetch_sub(1, Ordering::SeqCst);
        let _permit = permit.map_err(|_| Error::Internal("concurrency semaphore closed".into()))?;

        match tokio::time::timeout(std::time::Duration::from_millis(self.config.deadline_ms), f()).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout),
        }
    }

    /// Validates `(z, x, y)` against the policy zoom bound and the tile
    /// grid's own extent at that zoom.
    fn validate_tile(&self, z: i32, x: i32, y: i32) -> Result<Tile> {
        if z < 0 || z > self.config.max_zoom {
            return Err(Error::InvalidRequest(format!("zoom {z} outside [0, {}]", self.config.max_zoom)));
        }
        let span = 1i64 << z;
        if (x as i64) < 0 || (x as i64) >= span || (y as i64) < 0 || (y as i64) >= span {
            return Err(Error::InvalidRequest(format!("tile ({z}, {x}, {y}) outside the grid at this zoom")));
        }
        Ok(Tile { x, y, z })
    }

    fn validate_water_level(&self, water_level_m: f64) -> Result<f64> {
        let (min, max) = self.config.water_level_range;
        if water_level_m < min || water_level_m > max {
            return Err(Error::InvalidRequest(format!("water level {water_level_m} outside [{min}, {max}]")));
        }
        Ok(colormap::quantize_water_level(water_level_m))
    }

    /// Runs a blocking closure on the Rayon pool and bridges its result
    /// back into the async world via a oneshot channel, keeping mosaic
    /// assembly and tile encoding off the async runtime.
    async fn offload<F, T>(f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = tokio::sync::oneshot::channel();
        rayon::spawn(move || {
            let _ = tx.send(f());
        });
        rx.await.map_err(|_| Error::Internal("worker thread panicked before producing a result".into()))?
    }

    /// Elevation Loader + Uint16 Codec, collapsed behind single-flight on
    /// `(z, x, y)`: at most one call into the loader per tile key among all
    /// concurrently overlapping callers, whether they arrived via the
    /// uint16 endpoint or the PNG endpoint.
    async fn synthesize_raw_payload(&self, tile: Tile) -> Result<Arc<[u8]>> {
        let key = (tile.z, tile.x, tile.y);
        let store = Arc::clone(&self.source_store);
        self.mosaic_flight
            .run(key, move || {
                let store = Arc::clone(&store);
                async move {
                    Self::offload(move || {
                        let loader = ElevationLoader::new(&store);
                        let mosaic = loader.load(tile, Resampling::Nearest)?;
                        let payload = if mosaic.has_data {
                            tile_codec::encode_tile(&mosaic.data)?
                        } else {
                            tile_codec::all_nodata_payload()
                        };
                        Ok::<Arc<[u8]>, Error>(Arc::from(payload))
                    })
                    .await
                }
            })
            .await
    }

    /// Obtains the raw, identity (uncompressed) 131,072-byte uint16 payload
    /// for internal consumption (PNG rendering, point sampling): prefers a
    /// precompressed artifact, decoded in-process, over driving the loader.
    async fn raw_payload_for_internal_use(&self, tile: Tile) -> Result<(Arc<[u8]>, TileSource)> {
        if let Some(store) = &self.artifact_store {
            let accept = AcceptEncoding { br: true, gzip: true };
            if let Some((encoding, path)) = store.negotiate(&accept, tile.z as u32, tile.x as u32, tile.y as u32) {
                let store = Arc::clone(store);
                let bytes = Self::offload(move || store.read_decoded(encoding, &path).map_err(Error::from)).await?;
                return Ok((Arc::from(bytes), TileSource::Precompressed));
            }
        }
        let bytes = self.synthesize_raw_payload(tile).await?;
        Ok((bytes, TileSource::Runtime))
    }

    /// `serve_uint16(z, x, y, ...)`: precompressed negotiation first, then
    /// single-flighted runtime synthesis. `allow_runtime_synthesis = false`
    /// corresponds to the client explicitly forbidding synthesis (`?method=
    /// precompressed`): a precompressed miss then surfaces as `NotFound`
    /// instead of falling through. Admitted under the concurrency cap and
    /// bounded by the configured per-request deadline.
    pub async fn serve_uint16(&self, z: i32, x: i32, y: i32, accept: AcceptEncoding, allow_runtime_synthesis: bool) -> Result<Uint16Response> {
        self.admit(move || self.serve_uint16_inner(z, x, y, accept, allow_runtime_synthesis)).await
    }

    async fn serve_uint16_inner(&self, z: i32, x: i32, y: i32, accept: AcceptEncoding, allow_runtime_synthesis: bool) -> Result<Uint16Response> {
        let tile = self.validate_tile(z, x, y)?;

        if let Some(store) = &self.artifact_store {
            if let Some((encoding, path)) = store.negotiate(&accept, z as u32, x as u32, y as u32) {
                let store = Arc::clone(store);
                let bytes = Self::offload(move || store.read_raw(&path).map_err(Error::from)).await?;
                return Ok(Uint16Response {
                    payload: bytes,
                    source: TileSource::Precompressed,
                    content_encoding: encoding.content_encoding_header(),
                });
            }
            if !allow_runtime_synthesis {
                return Err(Error::NotFound);
            }
        }

        let payload = self.synthesize_raw_payload(tile).await?;
        Ok(Uint16Response {
            payload: payload.to_vec(),
            source: TileSource::Runtime,
            content_encoding: None,
        })
    }

    fn lut_for(&self, mode: colormap::Mode) -> Arc<colormap::Lut> {
        match mode {
            colormap::Mode::Topographic => Arc::clone(&self.topo_lut),
            colormap::Mode::Flood { water_level_quantum } => {
                let key = (water_level_quantum * 10.0).round() as i64;
                if let Some(lut) = self.flood_luts.read().get(&key) {
                    return Arc::clone(lut);
                }
                let lut = Arc::new(colormap::Lut::build(mode));
                let mut luts = self.flood_luts.write();
                Arc::clone(luts.entry(key).or_insert_with(|| Arc::clone(&lut)))
            }
        }
    }

    /// `serve_png(z, x, y, mode)`: cache probe, single-flight on the cache
    /// key, raw-payload acquisition, LUT lookup, PNG encode, cache insert.
    /// Admitted under the concurrency cap and bounded by the configured
    /// per-request deadline.
    pub async fn serve_png(&self, z: i32, x: i32, y: i32, mode: PngMode) -> Result<PngResponse> {
        self.admit(move || self.serve_png_inner(z, x, y, mode)).await
    }

    async fn serve_png_inner(&self, z: i32, x: i32, y: i32, mode: PngMode) -> Result<PngResponse> {
        let tile = self.validate_tile(z, x, y)?;

        let (colormap_mode, water_level_quantum, cache_key) = match mode {
            PngMode::Topographic => (colormap::Mode::Topographic, None, CacheKey::topographic(z, x, y)),
            PngMode::Flood { water_level_m } => {
                let quantum = self.validate_water_level(water_level_m)?;
                (colormap::Mode::Flood { water_level_quantum: quantum }, Some(quantum), CacheKey::flood(quantum, z, x, y))
            }
        };

        if let Some(bytes) = self.png_cache.get(&cache_key) {
            return Ok(PngResponse { bytes, source: TileSource::Cache, water_level_quantum });
        }

        let (bytes, source) = self
            .png_flight
            .run(cache_key, move || async move {
                // Re-probe: another leader may have inserted while we were
                // queued behind the single-flight slot.
                if let Some(cached) = self.png_cache.get(&cache_key) {
                    return Ok((cached, TileSource::Cache));
                }

                let (raw, source) = self.raw_payload_for_internal_use(tile).await?;
                let lut = self.lut_for(colormap_mode);
                let bytes = Self::offload(move || render_png(&raw, &lut)).await?;

                self.png_cache.insert(cache_key, Arc::clone(&bytes));
                Ok((bytes, source))
            })
            .await?;

        Ok(PngResponse { bytes, source, water_level_quantum })
    }

    /// Point-Sample Service entry point; see [`point_sample`]. Admitted
    /// under the same concurrency cap and deadline as the tile endpoints.
    pub async fn sample_point(&self, request: PointSampleRequest) -> Result<PointSampleResponse> {
        self.admit(move || point_sample::sample(self, request)).await
    }

    async fn tile_for_coordinate(&self, coord: Coordinate) -> Result<(Tile, Arc<[u8]>, TileSource)> {
        let zoom = self.config.max_zoom.min(config::MAX_Z);
        let tile = Tile::for_coordinate(coord, zoom);
        let (raw, source) = self.raw_payload_for_internal_use(tile).await?;
        Ok((tile, raw, source))
    }

    pub async fn status(&self) -> Status {
        Status {
            source_cache_entries: self.source_store.cache_len(),
            png_cache_entries: self.png_cache.len(),
            mosaic_syntheses_in_flight: self.mosaic_flight.in_flight_count().await,
            png_renders_in_flight: self.png_flight.in_flight_count().await,
            precompressed_enabled: self.artifact_store.is_some(),
            manifest: self.manifest_summary(),
        }
    }

    fn manifest_summary(&self) -> Option<ManifestSummary> {
        let dir = self.config.precompressed_dir.as_ref()?;
        artifact_store::Manifest::load(&dir.join("manifest.json")).ok().map(ManifestSummary::from)
    }
}

/// Builds the RGBA raster for `raw` (a 131,072-byte uint16 payload) via LUT
/// lookup and PNG-encodes it at compression level 1 - speed over size,
/// since PNG here is a compatibility format, not the primary wire format.
fn render_png(raw: &[u8], lut: &colormap::Lut) -> Result<Arc<[u8]>> {
    if raw.len() != tile_codec::PAYLOAD_BYTES {
        return Err(Error::Internal(format!(
            "raw payload is {} bytes, expected {}",
            raw.len(),
            tile_codec::PAYLOAD_BYTES
        )));
    }

    let mut rgba = vec![0u8; tile_codec::TILE_DIM * tile_codec::TILE_DIM * 4];
    let all_nodata = raw.chunks_exact(2).all(|b| u16::from_le_bytes([b[0], b[1]]) == tile_codec::NODATA_U16);

    if all_nodata {
        let fill = lut.get(tile_codec::NODATA_U16).to_le_bytes();
        for pixel in rgba.chunks_exact_mut(4) {
            pixel.copy_from_slice(&fill);
        }
    } else {
        for (chunk, pixel) in raw.chunks_exact(2).zip(rgba.chunks_exact_mut(4)) {
            let value = u16::from_le_bytes([chunk[0], chunk[1]]);
            pixel.copy_from_slice(&lut.get(value).to_le_bytes());
        }
    }

    encode_png(&rgba)
}

fn encode_png(rgba: &[u8]) -> Result<Arc<[u8]>> {
    let mut buf = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut buf, tile_codec::TILE_DIM as u32, tile_codec::TILE_DIM as u32);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(png::Compression::Fast);
        let mut writer = encoder.write_header().map_err(|err| Error::PngEncode(err.to_string()))?;
        writer.write_image_data(rgba).map_err(|err| Error::PngEncode(err.to_string()))?;
    }
    Ok(Arc::from(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_cell(dir: &std::path::Path, lat_floor: i32, lon_floor: i32, shape: (u32, u32), value: i16) {
        let id = SourceStore::cell_id(lat_floor, lon_floor);
        let side_car = dem_store::SideCar {
            shape,
            bounds: [lon_floor as f64, lat_floor as f64, (lon_floor + 1) as f64, (lat_floor + 1) as f64],
            nodata: -32768,
            crs: "EPSG:4326".into(),
        };
        std::fs::write(dir.join(format!("{id}.json")), serde_json::to_vec(&side_car).unwrap()).unwrap();
        let raw: Vec<u8> = (0..shape.0 * shape.1).flat_map(|_| value.to_le_bytes()).collect();
        std::fs::write(dir.join(format!("{id}.zst")), zstd::bulk::compress(&raw, 3).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn pure_ocean_tile_round_trips_as_all_ff() {
        let dir = tempfile::tempdir().unwrap();
        let engine = TileEngine::new(Config::new(dir.path()));

        let response = engine.serve_uint16(9, 140, 215, AcceptEncoding::default(), true).await.unwrap();
        assert_eq!(response.payload.len(), tile_codec::PAYLOAD_BYTES);
        assert!(response.payload.iter().all(|&b| b == 0xFF));
    }

    #[tokio::test]
    async fn invalid_zoom_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let engine = TileEngine::new(Config::new(dir.path()));
        let err = engine.serve_uint16(99, 0, 0, AcceptEncoding::default(), true).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn out_of_range_tile_coordinate_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let engine = TileEngine::new(Config::new(dir.path()));
        let err = engine.serve_uint16(2, 4, 0, AcceptEncoding::default(), true).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn out_of_range_water_level_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let engine = TileEngine::new(Config::new(dir.path()));
        let err = engine.serve_png(9, 140, 215, PngMode::Flood { water_level_m: 5000.0 }).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn ocean_tile_flood_png_is_water_colored() {
        let dir = tempfile::tempdir().unwrap();
        let engine = TileEngine::new(Config::new(dir.path()));
        let response = engine.serve_png(9, 140, 215, PngMode::Flood { water_level_m: 1.0 }).await.unwrap();
        assert!(!response.bytes.is_empty());
        assert_eq!(response.water_level_quantum, Some(1.0));
    }

    #[tokio::test]
    async fn quantized_water_levels_cache_identically() {
        let dir = tempfile::tempdir().unwrap();
        let engine = TileEngine::new(Config::new(dir.path()));

        let a = engine.serve_png(9, 140, 215, PngMode::Flood { water_level_m: 1.23 }).await.unwrap();
        let b = engine.serve_png(9, 140, 215, PngMode::Flood { water_level_m: 1.27 }).await.unwrap();
        assert_ne!(a.bytes.as_ref(), b.bytes.as_ref());

        let repeat = engine.serve_png(9, 140, 215, PngMode::Flood { water_level_m: 1.23 }).await.unwrap();
        assert_eq!(a.bytes.as_ref(), repeat.bytes.as_ref());
        assert_eq!(repeat.source, TileSource::Cache);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_requests_for_the_same_tile_collapse_to_one_synthesis() {
        let dir = tempfile::tempdir().unwrap();
        write_cell(dir.path(), 51, 3, (3601, 3601), 42);
        let engine = Arc::new(TileEngine::new(Config::new(dir.path())));

        let mut handles = Vec::new();
        for _ in 0..50 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move { engine.serve_uint16(10, 522, 342, AcceptEncoding::default(), true).await.unwrap() }));
        }

        let mut bodies = Vec::new();
        for handle in handles {
            bodies.push(handle.await.unwrap().payload);
        }
        assert!(bodies.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn status_reports_cache_occupancy() {
        let dir = tempfile::tempdir().unwrap();
        let engine = TileEngine::new(Config::new(dir.path()));
        let _ = engine.serve_png(9, 140, 215, PngMode::Topographic).await.unwrap();
        let status = engine.status().await;
        assert_eq!(status.png_cache_entries, 1);
        assert!(!status.precompressed_enabled);
        assert!(status.manifest.is_none());
    }

    #[tokio::test]
    async fn status_surfaces_manifest_summary_when_present() {
        let source_dir = tempfile::tempdir().unwrap();
        let precompressed_dir = tempfile::tempdir().unwrap();

        let manifest = artifact_store::Manifest::new("source", 0, 11, 1_700_000_000, vec!["br".to_string()]);
        manifest.save(&precompressed_dir.path().join("manifest.json")).unwrap();

        let mut config = Config::new(source_dir.path());
        config.precompressed_dir = Some(precompressed_dir.path().to_path_buf());
        let engine = TileEngine::new(config);

        let status = engine.status().await;
        let summary = status.manifest.expect("manifest.json should have been read");
        assert_eq!(summary.max_zoom, 11);
        assert_eq!(summary.variants, vec!["br".to_string()]);
    }
}
