// crates/slipstream-core/src/options.rs
//
// Per-media configuration record.
//
// The original engine exposed these through a process-wide option
// registration system; here they are a plain struct mutated through
// `set(name, value)` over the fixed recognized set. Time-valued options
// arrive as seconds (f64) and are stored as canonical microseconds.

use crate::error::{Error, Result};
use crate::helpers::time::secs_to_ts;
use crate::media_types::PixelFormat;

/// Which elementary stream of the container to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamSelect {
    Audio,
    #[default]
    Video,
}

/// A loosely-typed option value, so `set` can take anything the client API
/// hands over without a per-option method.
#[derive(Debug, Clone, PartialEq)]
pub enum OptValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
}

impl From<bool> for OptValue {
    fn from(v: bool) -> Self {
        OptValue::Bool(v)
    }
}
impl From<i64> for OptValue {
    fn from(v: i64) -> Self {
        OptValue::Int(v)
    }
}
impl From<f64> for OptValue {
    fn from(v: f64) -> Self {
        OptValue::Double(v)
    }
}
impl From<&str> for OptValue {
    fn from(v: &str) -> Self {
        OptValue::Str(v.to_owned())
    }
}
impl From<String> for OptValue {
    fn from(v: String) -> Self {
        OptValue::Str(v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaOptions {
    /// Prefer a hardware decoder when the backend has one.
    pub auto_hwaccel:           bool,
    /// Stamp frames with the packet duration instead of the decoder's guess.
    pub use_pkt_duration:       bool,
    /// Pixel budget for output frames; larger frames are downscaled with the
    /// aspect ratio preserved. None = native size.
    pub max_pixels:             Option<u32>,
    /// Preferred output format of a hardware decode session.
    pub vt_pix_fmt:             PixelFormat,
    /// Preferred output format of a software decode session.
    pub sw_pix_fmt:             PixelFormat,
    /// Apply container rotation metadata.
    pub autorotate:             bool,
    /// Ask the decoder to export motion vectors as frame side data.
    pub export_mvs:             bool,
    pub avselect:               StreamSelect,
    /// Initial seek target, canonical microseconds.
    pub skip:                   Option<i64>,
    /// Drop frames past this presentation time, canonical microseconds.
    pub trim_duration:          Option<i64>,
    /// A forward get_frame gap larger than this seeks instead of decoding
    /// through the gap. Canonical microseconds.
    pub dist_time_seek_trigger: i64,
    /// Frames queue capacity (decoder → filter).
    pub max_nb_frames:          usize,
    /// Packet queue capacity (reader → decoder).
    pub max_nb_packets:         usize,
    /// Sink queue capacity (filter → client).
    pub max_nb_sink:            usize,
    /// When > 1, drop non-key packets whose sequence number is not a
    /// multiple of this (approximate fast decode).
    pub pkt_skip_mod:           i64,
    /// Filter-graph expression for external filter engines. The built-in
    /// filter ignores it.
    pub filters:                Option<String>,
}

impl Default for MediaOptions {
    fn default() -> Self {
        MediaOptions {
            auto_hwaccel:           true,
            use_pkt_duration:       false,
            max_pixels:             None,
            vt_pix_fmt:             PixelFormat::Auto,
            sw_pix_fmt:             PixelFormat::Auto,
            autorotate:             true,
            export_mvs:             false,
            avselect:               StreamSelect::Video,
            skip:                   None,
            trim_duration:          None,
            dist_time_seek_trigger: secs_to_ts(1.5),
            max_nb_frames:          2,
            max_nb_packets:         2,
            max_nb_sink:            3,
            pkt_skip_mod:           0,
            filters:                None,
        }
    }
}

impl MediaOptions {
    /// Set one option by its public name. Unknown names and mistyped values
    /// are rejected; nothing is silently coerced.
    pub fn set(&mut self, name: &str, value: impl Into<OptValue>) -> Result<()> {
        use OptValue::*;
        match (name, value.into()) {
            ("auto_hwaccel", Bool(b))     => self.auto_hwaccel = b,
            ("use_pkt_duration", Bool(b)) => self.use_pkt_duration = b,
            ("autorotate", Bool(b))       => self.autorotate = b,
            ("export_mvs", Bool(b))       => self.export_mvs = b,

            ("max_pixels", Int(n)) if n >= 0 => {
                self.max_pixels = if n == 0 { None } else { Some(n as u32) };
            }
            ("max_nb_frames", Int(n)) if n > 0  => self.max_nb_frames = n as usize,
            ("max_nb_packets", Int(n)) if n > 0 => self.max_nb_packets = n as usize,
            ("max_nb_sink", Int(n)) if n > 0    => self.max_nb_sink = n as usize,
            ("pkt_skip_mod", Int(n)) if n >= 0  => self.pkt_skip_mod = n,

            ("skip", Double(s)) if s >= 0.0          => self.skip = Some(secs_to_ts(s)),
            ("trim_duration", Double(s)) if s >= 0.0 => self.trim_duration = Some(secs_to_ts(s)),
            ("dist_time_seek_trigger", Double(s)) if s >= 0.0 => {
                self.dist_time_seek_trigger = secs_to_ts(s);
            }

            ("vt_pix_fmt", Str(s)) => {
                self.vt_pix_fmt = PixelFormat::from_name(&s)
                    .ok_or_else(|| Error::Unsupported(format!("pixel format {s}")))?;
            }
            ("sw_pix_fmt", Str(s)) => {
                self.sw_pix_fmt = PixelFormat::from_name(&s)
                    .ok_or_else(|| Error::Unsupported(format!("pixel format {s}")))?;
            }
            ("avselect", Str(s)) => {
                self.avselect = match s.as_str() {
                    "audio" => StreamSelect::Audio,
                    "video" => StreamSelect::Video,
                    _ => return Err(Error::Unsupported(format!("avselect {s}"))),
                };
            }
            ("filters", Str(s)) => self.filters = if s.is_empty() { None } else { Some(s) },

            (name, value) => {
                return Err(Error::Unsupported(format!("option {name} = {value:?}")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognized_options_round_trip() {
        let mut o = MediaOptions::default();
        o.set("auto_hwaccel", false).unwrap();
        o.set("skip", 2.5).unwrap();
        o.set("max_pixels", 640 * 360i64).unwrap();
        o.set("sw_pix_fmt", "rgba").unwrap();
        o.set("avselect", "audio").unwrap();
        o.set("max_nb_sink", 5i64).unwrap();
        o.set("filters", "scale=iw/2:ih/2").unwrap();

        assert!(!o.auto_hwaccel);
        assert_eq!(o.skip, Some(2_500_000));
        assert_eq!(o.max_pixels, Some(640 * 360));
        assert_eq!(o.sw_pix_fmt, PixelFormat::Rgba);
        assert_eq!(o.avselect, StreamSelect::Audio);
        assert_eq!(o.max_nb_sink, 5);
        assert_eq!(o.filters.as_deref(), Some("scale=iw/2:ih/2"));
    }

    #[test]
    fn unknown_and_mistyped_options_are_rejected() {
        let mut o = MediaOptions::default();
        assert!(o.set("no_such_option", true).is_err());
        // right name, wrong type
        assert!(o.set("skip", true).is_err());
        assert!(o.set("max_nb_frames", 0i64).is_err());
        assert!(o.set("sw_pix_fmt", "p010").is_err());
        // nothing changed
        assert_eq!(o, MediaOptions::default());
    }

    #[test]
    fn zero_max_pixels_disables_the_budget() {
        let mut o = MediaOptions::default();
        o.set("max_pixels", 100i64).unwrap();
        o.set("max_pixels", 0i64).unwrap();
        assert_eq!(o.max_pixels, None);
    }
}
