//! Tile URL construction for the supported server layouts

use std::collections::BTreeMap;

use reqwest::Url;

use crate::core::config::{SchemeKind, TileSourceOptions};
use crate::tiles::codec::{tile_xyz_to_quadkey, tms_to_wmts, MercatorCodec};
use crate::{Error, Result};

const PLACEHOLDERS: [&str; 8] = ["X", "Y", "Z", "Q", "XMIN", "YMIN", "XMAX", "YMAX"];

/// Units substituted into bounding-box URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BboxUnits {
    Meters,
    LatLon,
}

/// How a tile position becomes a request URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TilingScheme {
    Wmts,
    Tms,
    Quadkey,
    Bbox(BboxUnits),
}

impl TilingScheme {
    pub fn from_options(options: &TileSourceOptions) -> Self {
        match options.scheme {
            SchemeKind::Wmts => Self::Wmts,
            SchemeKind::Tms => Self::Tms,
            SchemeKind::Quadkey => Self::Quadkey,
            SchemeKind::Bbox if options.use_latlon => Self::Bbox(BboxUnits::LatLon),
            SchemeKind::Bbox => Self::Bbox(BboxUnits::Meters),
        }
    }

    pub fn kind(&self) -> SchemeKind {
        match self {
            Self::Wmts => SchemeKind::Wmts,
            Self::Tms => SchemeKind::Tms,
            Self::Quadkey => SchemeKind::Quadkey,
            Self::Bbox(_) => SchemeKind::Bbox,
        }
    }

    /// Placeholders this scheme fills in.
    pub fn placeholders(&self) -> &'static [&'static str] {
        match self {
            Self::Wmts | Self::Tms => &PLACEHOLDERS[..3],
            Self::Quadkey => &PLACEHOLDERS[3..4],
            Self::Bbox(_) => &PLACEHOLDERS[4..],
        }
    }

    /// URL for a normalised TMS tile position.
    pub fn image_url(&self, template: &UrlTemplate, codec: &MercatorCodec, x: i64, y: i64, z: u8) -> String {
        match self {
            Self::Tms => template.render(&[
                ("X", x.to_string()),
                ("Y", y.to_string()),
                ("Z", z.to_string()),
            ]),
            Self::Wmts => {
                let flipped = tms_to_wmts(x, y, z);
                template.render(&[
                    ("X", flipped.x.to_string()),
                    ("Y", flipped.y.to_string()),
                    ("Z", flipped.z.to_string()),
                ])
            }
            Self::Quadkey => {
                let flipped = tms_to_wmts(x, y, z);
                template.render(&[("Q", tile_xyz_to_quadkey(flipped.x, flipped.y, flipped.z))])
            }
            Self::Bbox(units) => {
                let bounds = match units {
                    BboxUnits::Meters => codec.get_tile_meter_bounds(x, y, z),
                    BboxUnits::LatLon => codec.get_tile_geographic_bounds(x, y, z),
                };
                template.render(&[
                    ("XMIN", bounds.xmin.to_string()),
                    ("YMIN", bounds.ymin.to_string()),
                    ("XMAX", bounds.xmax.to_string()),
                    ("YMAX", bounds.ymax.to_string()),
                ])
            }
        }
    }
}

/// A URL template with its placeholders upper-cased and caller variables attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    template: String,
    extra_vars: BTreeMap<String, String>,
}

impl UrlTemplate {
    pub fn new(url: &str, extra_vars: BTreeMap<String, String>) -> Self {
        Self {
            template: normalize_case(url),
            extra_vars,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Substitutes the scheme's tokens, then any `{key}` from the extra variables.
    pub fn render(&self, substitutions: &[(&str, String)]) -> String {
        let mut url = self.template.clone();
        for (token, value) in substitutions {
            url = url.replace(&format!("{{{token}}}"), value);
        }
        for (key, value) in &self.extra_vars {
            url = url.replace(&format!("{{{key}}}"), value);
        }
        url
    }

    /// Fails when the template cannot produce an absolute URL.
    pub fn validate(&self, scheme: &TilingScheme) -> Result<()> {
        if self.template.trim().is_empty() {
            return Err(Error::Config("tile url template is empty".into()));
        }
        let sample: Vec<_> = PLACEHOLDERS.iter().map(|token| (*token, "0".to_string())).collect();
        let rendered = self.render(&sample);
        Url::parse(&rendered)
            .map_err(|e| Error::Config(format!("tile url {:?} is not an absolute url: {e}", self.template)))?;

        let uses_scheme = scheme
            .placeholders()
            .iter()
            .any(|token| self.template.contains(&format!("{{{token}}}")));
        if !uses_scheme {
            log::warn!(
                "tile url {:?} has none of the {:?} placeholders {:?}",
                self.template,
                scheme.kind(),
                scheme.placeholders()
            );
        }
        Ok(())
    }
}

/// Upper-cases the known placeholders so `{x}` and `{X}` behave the same.
/// Uppercases every `{token}` naming a placeholder, in any case.
/// Other braces are left alone so extra variables keep their spelling.
fn normalize_case(url: &str) -> String {
    let mut normalized = String::with_capacity(url.len());
    let mut rest = url;
    while let Some(open) = rest.find('{') {
        normalized.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        match tail.find('}') {
            Some(close) => {
                let name = &tail[..close];
                match PLACEHOLDERS.iter().find(|token| token.eq_ignore_ascii_case(name)) {
                    Some(token) => normalized.push_str(&format!("{{{token}}}")),
                    None => normalized.push_str(&format!("{{{name}}}")),
                }
                rest = &tail[close + 1..];
            }
            None => {
                normalized.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    normalized.push_str(rest);
    normalized
}
