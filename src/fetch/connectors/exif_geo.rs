//! Local image inspection: file digest plus EXIF GPS position, reverse-geocoded
//! through Nominatim when a fix is present.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::fetch::connectors::send_json;
use crate::fetch::types::{Connector, FetchContext, FetchError, Fetched, SourceKind};

const NOMINATIM_REVERSE: &str = "https://nominatim.openstreetmap.org/reverse";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsFix {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Deserialize)]
struct Reverse {
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Default)]
pub struct ExifGeoConnector;

impl ExifGeoConnector {
    /// Everything except the address lookup; pure over the file bytes.
    pub fn inspect(path: &str, bytes: &[u8]) -> (Value, Option<GpsFix>) {
        let digest = Sha256::digest(bytes);
        let sha256: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        let gps = gps_from_jpeg(bytes);
        let raw = json!({
            "path": path,
            "size_bytes": bytes.len(),
            "sha256": sha256,
            "gps": gps.map(|g| json!({"lat": g.lat, "lon": g.lon})),
            "address": Value::Null,
        });
        (raw, gps)
    }
}

#[async_trait]
impl Connector for ExifGeoConnector {
    fn kind(&self) -> SourceKind {
        SourceKind::ExifImageGeo
    }

    async fn fetch(&self, target: &str, ctx: &FetchContext<'_>) -> Result<Fetched, FetchError> {
        let path = target.trim();
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FetchError::NotFound(format!("file {path}")),
            _ => FetchError::Upstream(format!("reading {path}: {e}")),
        })?;
        let name = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string());

        let (mut raw, gps) = Self::inspect(path, &bytes);
        let Some(fix) = gps else {
            return Ok(Fetched::new(
                raw,
                format!("Exif Image Geo {name}: no GPS metadata"),
            ));
        };

        let lookup: Result<Reverse, FetchError> = send_json(
            ctx.transport
                .client()
                .get(NOMINATIM_REVERSE)
                .query(&[("format", "jsonv2")])
                .query(&[("lat", fix.lat), ("lon", fix.lon)]),
        )
        .await;
        let address = match lookup {
            Ok(r) => r.display_name,
            Err(e) if e.is_retryable() => return Err(e),
            Err(e) => {
                tracing::debug!(error = %e, "reverse geocoding unavailable");
                None
            }
        };
        raw["address"] = json!(address);

        let summary = format!(
            "Exif Image Geo {name}: GPS {:.5}, {:.5} → {}",
            fix.lat,
            fix.lon,
            address.as_deref().unwrap_or("address unknown")
        );
        Ok(Fetched::new(raw, summary))
    }
}

/// Locate the APP1 Exif segment of a JPEG and decode its GPS latitude/longitude.
pub fn gps_from_jpeg(bytes: &[u8]) -> Option<GpsFix> {
    let tiff = exif_segment(bytes)?;
    Tiff::new(tiff)?.gps()
}

fn exif_segment(bytes: &[u8]) -> Option<&[u8]> {
    if bytes.get(0..2)? != [0xFF, 0xD8] {
        return None;
    }
    let mut pos = 2usize;
    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xFF {
            return None;
        }
        let marker = bytes[pos + 1];
        match marker {
            0xFF => {
                pos += 1;
                continue;
            }
            0x01 | 0xD0..=0xD7 => {
                pos += 2;
                continue;
            }
            // Start of scan / end of image: no metadata past this point.
            0xDA | 0xD9 => return None,
            _ => {}
        }
        let len = u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]) as usize;
        if len < 2 {
            return None;
        }
        let seg = bytes.get(pos + 4..pos + 2 + len)?;
        if marker == 0xE1 && seg.starts_with(b"Exif\0\0") {
            return Some(&seg[6..]);
        }
        pos += 2 + len;
    }
    None
}

struct Tiff<'a> {
    data: &'a [u8],
    little_endian: bool,
}

struct Entry {
    tag: u16,
    kind: u16,
    count: u32,
    /// Offset of the 4-byte value/offset field within `data`.
    value_at: usize,
}

const TAG_GPS_IFD: u16 = 0x8825;
const GPS_LAT_REF: u16 = 0x0001;
const GPS_LAT: u16 = 0x0002;
const GPS_LON_REF: u16 = 0x0003;
const GPS_LON: u16 = 0x0004;
const TYPE_ASCII: u16 = 2;
const TYPE_LONG: u16 = 4;
const TYPE_RATIONAL: u16 = 5;

impl<'a> Tiff<'a> {
    fn new(data: &'a [u8]) -> Option<Self> {
        let little_endian = match data.get(0..2)? {
            b"II" => true,
            b"MM" => false,
            _ => return None,
        };
        let t = Self {
            data,
            little_endian,
        };
        (t.u16(2)? == 42).then_some(t)
    }

    fn u16(&self, at: usize) -> Option<u16> {
        let b: [u8; 2] = self.data.get(at..at + 2)?.try_into().ok()?;
        Some(if self.little_endian {
            u16::from_le_bytes(b)
        } else {
            u16::from_be_bytes(b)
        })
    }

    fn u32(&self, at: usize) -> Option<u32> {
        let b: [u8; 4] = self.data.get(at..at + 4)?.try_into().ok()?;
        Some(if self.little_endian {
            u32::from_le_bytes(b)
        } else {
            u32::from_be_bytes(b)
        })
    }

    fn entries(&self, ifd: usize) -> Option<Vec<Entry>> {
        let n = self.u16(ifd)? as usize;
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            let at = ifd + 2 + i * 12;
            out.push(Entry {
                tag: self.u16(at)?,
                kind: self.u16(at + 2)?,
                count: self.u32(at + 4)?,
                value_at: at + 8,
            });
        }
        Some(out)
    }

    fn gps(&self) -> Option<GpsFix> {
        let ifd0 = self.u32(4)? as usize;
        let gps_ptr = self
            .entries(ifd0)?
            .into_iter()
            .find(|e| e.tag == TAG_GPS_IFD && e.kind == TYPE_LONG)?;
        let gps_ifd = self.u32(gps_ptr.value_at)? as usize;
        let entries = self.entries(gps_ifd)?;
        let find = |tag: u16| entries.iter().find(|e| e.tag == tag);

        let lat = self.dms(find(GPS_LAT)?)?;
        let lon = self.dms(find(GPS_LON)?)?;
        let lat_sign = match find(GPS_LAT_REF).and_then(|e| self.ascii_ref(e)) {
            Some(b'S') => -1.0,
            _ => 1.0,
        };
        let lon_sign = match find(GPS_LON_REF).and_then(|e| self.ascii_ref(e)) {
            Some(b'W') => -1.0,
            _ => 1.0,
        };
        Some(GpsFix {
            lat: lat * lat_sign,
            lon: lon * lon_sign,
        })
    }

    fn ascii_ref(&self, e: &Entry) -> Option<u8> {
        (e.kind == TYPE_ASCII && e.count <= 4)
            .then(|| self.data.get(e.value_at).copied())
            .flatten()
    }

    /// Degrees/minutes/seconds as three RATIONALs -> decimal degrees.
    fn dms(&self, e: &Entry) -> Option<f64> {
        if e.kind != TYPE_RATIONAL || e.count < 3 {
            return None;
        }
        let base = self.u32(e.value_at)? as usize;
        let mut parts = [0f64; 3];
        for (i, p) in parts.iter_mut().enumerate() {
            let num = self.u32(base + i * 8)? as f64;
            let den = self.u32(base + i * 8 + 4)? as f64;
            *p = if den == 0.0 { 0.0 } else { num / den };
        }
        Some(parts[0] + parts[1] / 60.0 + parts[2] / 3600.0)
    }
}
