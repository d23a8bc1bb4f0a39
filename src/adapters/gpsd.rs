//! Location provider backed by gpsd
//! Connects to a gpsd daemon, enables its JSON watch mode and turns `TPV`
//! reports into [`LocationSample`]s.
//!
//! gpsd has no notion of a per-client permission, so the wearer's
//! `share_location` setting stands in for it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use log::{debug, info, warn};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::config::location_config::LocationConfig;
use crate::core::bluetooth::receiver_stream;
use crate::core::ports::{LocationProvider, LocationSample, PermissionStatus, WatchOptions};

const WATCH_COMMAND: &[u8] = b"?WATCH={\"enable\":true,\"json\":true};\n";
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Fix modes reported by gpsd: 0/1 no fix, 2 = 2D, 3 = 3D
const MIN_FIX_MODE: u8 = 2;

pub struct GpsdLocationProvider {
    address: String,
    consent: bool,
}

impl GpsdLocationProvider {
    pub fn new(config: &LocationConfig) -> Self {
        Self {
            address: config.gpsd_address.clone(),
            consent: config.share_location,
        }
    }
}

#[async_trait]
impl LocationProvider for GpsdLocationProvider {
    async fn request_foreground_permission(&self) -> Result<PermissionStatus> {
        Ok(if self.consent {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        })
    }

    async fn watch_position(&self, options: WatchOptions) -> Result<BoxStream<'static, LocationSample>> {
        let mut stream = TcpStream::connect(&self.address)
            .await
            .with_context(|| format!("connecting to gpsd at {}", self.address))?;
        stream.write_all(WATCH_COMMAND).await?;
        info!("Watching gpsd at {} ({:?} accuracy).", self.address, options.accuracy);

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stream).lines();
            let mut filter = SampleFilter::new(options);

            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            let Some(sample) = parse_tpv(&line) else {
                                continue;
                            };
                            if filter.accept(&sample) && tx.send(sample).is_err() {
                                break;
                            }
                        }
                        Ok(None) => {
                            warn!("gpsd closed the connection.");
                            break;
                        }
                        Err(e) => {
                            warn!("Error reading from gpsd: {}", e);
                            break;
                        }
                    }
                }
            }
            debug!("gpsd watch ended.");
        });

        Ok(receiver_stream(rx))
    }
}

#[derive(Deserialize)]
struct GpsdReport {
    class: String,
    #[serde(default)]
    mode: u8,
    lat: Option<f64>,
    lon: Option<f64>,
    time: Option<DateTime<Utc>>,
}

/// Parses a gpsd JSON line. Only `TPV` reports with a position fix count.
fn parse_tpv(line: &str) -> Option<LocationSample> {
    let report: GpsdReport = serde_json::from_str(line).ok()?;
    if report.class != "TPV" || report.mode < MIN_FIX_MODE {
        return None;
    }
    Some(LocationSample {
        latitude: report.lat?,
        longitude: report.lon?,
        timestamp: report.time.unwrap_or_else(Utc::now),
    })
}

/// Applies the interval and distance hints of a [`WatchOptions`].
struct SampleFilter {
    options: WatchOptions,
    last: Option<LocationSample>,
}

impl SampleFilter {
    fn new(options: WatchOptions) -> Self {
        Self { options, last: None }
    }

    fn accept(&mut self, sample: &LocationSample) -> bool {
        if let Some(last) = &self.last {
            let elapsed_ms = (sample.timestamp - last.timestamp).num_milliseconds();
            if elapsed_ms < self.options.min_interval_ms as i64 {
                return false;
            }
            if distance_m(last, sample) < self.options.min_distance_m {
                return false;
            }
        }
        self.last = Some(*sample);
        true
    }
}

/// Great-circle distance between two samples (haversine)
fn distance_m(a: &LocationSample, b: &LocationSample) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let d_lat = lat2 - lat1;
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}
