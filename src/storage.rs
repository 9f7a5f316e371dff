use crate::error::TrackResult;
use crate::metrics::RunSummary;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete run export (JSON-serializable)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunExport {
    pub summary: RunSummary,
    pub display: DisplayFields,
    pub exported_at: DateTime<Utc>,
}

/// Pre-rendered strings so consumers do not need to reimplement the formatting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayFields {
    pub distance: String,
    pub duration: String,
    pub pace: String,
}

impl RunExport {
    pub fn new(summary: RunSummary) -> Self {
        let display = DisplayFields {
            distance: summary.formatted_distance(),
            duration: summary.formatted_duration(),
            pace: summary.formatted_pace(),
        };
        Self {
            summary,
            display,
            exported_at: Utc::now(),
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> TrackResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Serialize to JSON bytes
    pub fn to_json_bytes(&self) -> TrackResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_json(json: &str) -> TrackResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// GPX track format for mapping applications
#[derive(Debug, Serialize)]
pub struct GpxTrack {
    pub name: String,
    pub description: String,
    pub track_points: Vec<GpxPoint>,
}

#[derive(Debug, Serialize)]
pub struct GpxPoint {
    pub lat: f64,
    pub lon: f64,
    pub time: Option<String>,
    pub hdop: f64, // horizontal dilution of precision
}

impl GpxTrack {
    /// Build a track from the accepted points of a finished run
    pub fn from_summary(summary: &RunSummary) -> Self {
        let track_points = summary
            .route
            .iter()
            .map(|point| GpxPoint {
                lat: point.fix.latitude,
                lon: point.fix.longitude,
                time: Utc
                    .timestamp_millis_opt(point.fix.timestamp_ms)
                    .single()
                    .map(|t| t.to_rfc3339()),
                hdop: point.fix.accuracy_m / 5.0, // Rough HDOP from accuracy radius
            })
            .collect();

        GpxTrack {
            name: format!("Run {}", summary.session_id),
            description: format!(
                "{} in {}, started {}",
                summary.formatted_distance(),
                summary.formatted_duration(),
                summary.start_time.to_rfc3339()
            ),
            track_points,
        }
    }

    /// Generate GPX document XML string
    pub fn to_gpx_xml(&self) -> String {
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str("<gpx version=\"1.1\" creator=\"run_tracker\">\n");
        xml.push_str("  <metadata>\n");
        xml.push_str(&format!("    <name>{}</name>\n", escape_xml(&self.name)));
        xml.push_str(&format!("    <desc>{}</desc>\n", escape_xml(&self.description)));
        xml.push_str("  </metadata>\n");
        xml.push_str("  <trk>\n");
        xml.push_str(&format!("    <name>{}</name>\n", escape_xml(&self.name)));
        xml.push_str("    <trkseg>\n");

        for point in &self.track_points {
            xml.push_str(&format!(
                "      <trkpt lat=\"{}\" lon=\"{}\">\n",
                point.lat, point.lon
            ));
            if let Some(time) = &point.time {
                xml.push_str(&format!("        <time>{}</time>\n", time));
            }
            xml.push_str(&format!("        <hdop>{:.1}</hdop>\n", point.hdop));
            xml.push_str("      </trkpt>\n");
        }

        xml.push_str("    </trkseg>\n");
        xml.push_str("  </trk>\n");
        xml.push_str("</gpx>\n");

        xml
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> TrackResult<()> {
        fs::write(path, self.to_gpx_xml())?;
        Ok(())
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
