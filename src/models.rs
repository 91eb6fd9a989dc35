//! Data models and structures
//!
//! Defines the image format and classification types shared by the collector,
//! the engine and the planner, the remote asset listing shapes, and the runtime
//! configuration.

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Raster formats the conversion engine accepts as input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Tiff,
}

impl SourceFormat {
    pub const ALL: [SourceFormat; 5] = [
        SourceFormat::Jpeg,
        SourceFormat::Png,
        SourceFormat::Gif,
        SourceFormat::Bmp,
        SourceFormat::Tiff,
    ];

    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::Gif => Some(Self::Gif),
            ImageFormat::Bmp => Some(Self::Bmp),
            ImageFormat::Tiff => Some(Self::Tiff),
            _ => None,
        }
    }

    /// Format implied by a file name's extension, if it names one we accept.
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        ext.parse().ok()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SourceFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "gif" => Ok(Self::Gif),
            "bmp" => Ok(Self::Bmp),
            "tiff" => Ok(Self::Tiff),
            other => Err(format!("unsupported source format '{}'", other)),
        }
    }
}

/// Lowercase name for any format the sniffer can recognise.
pub fn format_name(format: ImageFormat) -> String {
    match SourceFormat::from_image_format(format) {
        Some(known) => known.name().to_string(),
        None => format!("{:?}", format).to_lowercase(),
    }
}

/// What content sniffing says about a candidate file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "format", rename_all = "snake_case")]
pub enum Classification {
    Supported(SourceFormat),
    Unsupported(String),
    NotAnImage,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Supported(format) => write!(f, "supported ({})", format),
            Self::Unsupported(format) => write!(f, "unsupported ({})", format),
            Self::NotAnImage => f.write_str("not an image"),
        }
    }
}

// Remote asset listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Asset {
    pub public_id: String,
    pub format: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub secure_url: Option<String>,
}

impl Asset {
    /// Relative file name the asset is stored under locally.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.public_id, self.format)
    }

    pub fn download_url(&self) -> Option<&str> {
        self.secure_url.as_deref().or(self.url.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AssetPage {
    #[serde(rename = "resources", default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

// Configuration
const DEFAULT_OUTPUT_DIR: &str = "./converted";
const DEFAULT_ASSET_API_BASE_URL: &str = "https://api.cloudinary.com";
const SCAN_SUBDIR: &str = "subidas";

#[derive(Debug, Clone)]
pub struct AssetStoreConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub app_folder: PathBuf,
    pub output_dir: PathBuf,
    pub concurrency: usize,
    pub source_formats: Vec<SourceFormat>,
    pub download_enabled: bool,
    pub asset_store: Option<AssetStoreConfig>,
}

impl Config {
    pub fn new(app_folder: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            app_folder,
            output_dir,
            concurrency: 1,
            source_formats: vec![SourceFormat::Png],
            download_enabled: false,
            asset_store: None,
        }
    }

    /// Load `.env` when present, then read the process environment.
    pub fn from_env() -> crate::Result<Self> {
        load_dotenv(dotenvy::dotenv().map(|_| ()))?;
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let app_folder = get("APP_FOLDER")
            .map(PathBuf::from)
            .ok_or_else(|| crate::Error::Config("APP_FOLDER not set".to_string()))?;
        let output_dir = get("OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

        let concurrency = match get("CONVERT_CONCURRENCY") {
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
                crate::Error::Config(format!("Invalid CONVERT_CONCURRENCY '{}'", raw))
            })?,
            None => 1,
        };

        let source_formats = match get("CONVERT_FORMATS") {
            Some(raw) => raw
                .split(',')
                .filter(|part| !part.trim().is_empty())
                .map(|part| part.parse::<SourceFormat>().map_err(crate::Error::Config))
                .collect::<crate::Result<Vec<_>>>()?,
            None => vec![SourceFormat::Png],
        };

        let download_enabled = match get("DOWNLOAD_ENABLED") {
            Some(raw) => parse_flag(&raw).ok_or_else(|| {
                crate::Error::Config(format!("Invalid DOWNLOAD_ENABLED '{}'", raw))
            })?,
            None => false,
        };

        let asset_store = match (
            get("APP_CLOUDINARY"),
            get("APP_CLOUDINARY_KEY"),
            get("APP_CLOUDINARY_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(AssetStoreConfig {
                cloud_name,
                api_key,
                api_secret,
                base_url: get("ASSET_API_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_ASSET_API_BASE_URL.to_string()),
            }),
            _ => None,
        };

        let config = Self {
            app_folder,
            output_dir,
            concurrency,
            source_formats,
            download_enabled,
            asset_store,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.concurrency == 0 {
            return Err(crate::Error::Config(
                "CONVERT_CONCURRENCY must be at least 1".to_string(),
            ));
        }
        if self.source_formats.is_empty() {
            return Err(crate::Error::Config(
                "CONVERT_FORMATS must name at least one format".to_string(),
            ));
        }
        if self.download_enabled && self.asset_store.is_none() {
            return Err(crate::Error::Config(
                "Downloading requires APP_CLOUDINARY, APP_CLOUDINARY_KEY and APP_CLOUDINARY_SECRET"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Directory the collector walks.
    pub fn scan_dir(&self) -> PathBuf {
        self.app_folder.join(SCAN_SUBDIR)
    }
}

/// A missing `.env` is fine; one that exists but cannot be parsed is not.
fn load_dotenv(result: std::result::Result<(), dotenvy::Error>) -> crate::Result<()> {
    match result {
        Err(e) if !e.not_found() => Err(e.into()),
        _ => Ok(()),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn config_from(pairs: &[(&str, &str)]) -> crate::Result<Config> {
        let map = vars(pairs);
        Config::from_vars(|key| map.get(key).cloned())
    }

    #[test]
    fn test_source_format_parsing() {
        assert_eq!("PNG".parse::<SourceFormat>(), Ok(SourceFormat::Png));
        assert_eq!("jpg".parse::<SourceFormat>(), Ok(SourceFormat::Jpeg));
        assert!("webp".parse::<SourceFormat>().is_err());
    }

    #[test]
    fn test_source_format_from_extension_is_case_insensitive() {
        assert_eq!(
            SourceFormat::from_extension(Path::new("a/Photo.PNG")),
            Some(SourceFormat::Png)
        );
        assert_eq!(
            SourceFormat::from_extension(Path::new("scan.tiff")),
            Some(SourceFormat::Tiff)
        );
        assert_eq!(SourceFormat::from_extension(Path::new("clip.webp")), None);
        assert_eq!(SourceFormat::from_extension(Path::new("README")), None);
    }

    #[test]
    fn test_format_name_for_unsupported_formats() {
        assert_eq!(format_name(ImageFormat::WebP), "webp");
        assert_eq!(format_name(ImageFormat::Jpeg), "jpeg");
    }

    #[test]
    fn test_classification_serialization() {
        let json = serde_json::to_string(&Classification::Supported(SourceFormat::Png)).unwrap();
        assert_eq!(json, r#"{"kind":"supported","format":"png"}"#);

        let json = serde_json::to_string(&Classification::NotAnImage).unwrap();
        assert_eq!(json, r#"{"kind":"not_an_image"}"#);
    }

    #[test]
    fn test_asset_page_deserialization() {
        let json = r#"{
            "resources": [
                {"public_id": "subidas/cat", "format": "png", "url": "http://x/cat.png", "secure_url": "https://x/cat.png", "bytes": 10}
            ],
            "next_cursor": "abc"
        }"#;

        let page: AssetPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.assets.len(), 1);
        assert_eq!(page.assets[0].file_name(), "subidas/cat.png");
        assert_eq!(page.assets[0].download_url(), Some("https://x/cat.png"));
        assert_eq!(page.next_cursor.as_deref(), Some("abc"));
    }

    #[test]
    fn test_config_defaults() {
        let config = config_from(&[("APP_FOLDER", "uploads")]).unwrap();

        assert_eq!(config.scan_dir(), PathBuf::from("uploads").join("subidas"));
        assert_eq!(config.output_dir, PathBuf::from("./converted"));
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.source_formats, vec![SourceFormat::Png]);
        assert!(!config.download_enabled);
        assert!(config.asset_store.is_none());
    }

    #[test]
    fn test_config_requires_app_folder() {
        let err = config_from(&[]).unwrap_err();
        assert!(err.to_string().contains("APP_FOLDER"));
    }

    #[test]
    fn test_config_parses_overrides() {
        let config = config_from(&[
            ("APP_FOLDER", "uploads"),
            ("OUTPUT_DIR", "/tmp/out"),
            ("CONVERT_CONCURRENCY", "4"),
            ("CONVERT_FORMATS", "png, gif,bmp"),
            ("DOWNLOAD_ENABLED", "true"),
            ("APP_CLOUDINARY", "demo"),
            ("APP_CLOUDINARY_KEY", "key"),
            ("APP_CLOUDINARY_SECRET", "secret"),
        ])
        .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.concurrency, 4);
        assert_eq!(
            config.source_formats,
            vec![SourceFormat::Png, SourceFormat::Gif, SourceFormat::Bmp]
        );
        assert!(config.download_enabled);
        let store = config.asset_store.unwrap();
        assert_eq!(store.cloud_name, "demo");
        assert_eq!(store.base_url, "https://api.cloudinary.com");
    }

    #[test]
    fn test_config_rejects_download_without_credentials() {
        let err = config_from(&[("APP_FOLDER", "uploads"), ("DOWNLOAD_ENABLED", "1")])
            .unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_config_rejects_zero_concurrency_and_bad_formats() {
        assert!(config_from(&[("APP_FOLDER", "u"), ("CONVERT_CONCURRENCY", "0")]).is_err());
        assert!(config_from(&[("APP_FOLDER", "u"), ("CONVERT_CONCURRENCY", "many")]).is_err());
        assert!(config_from(&[("APP_FOLDER", "u"), ("CONVERT_FORMATS", "png,webp")]).is_err());
        assert!(config_from(&[("APP_FOLDER", "u"), ("CONVERT_FORMATS", " , ")]).is_err());
    }

    #[test]
    fn test_dotenv_missing_file_is_ignored_but_bad_file_is_not() {
        let missing = dotenvy::Error::Io(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(load_dotenv(Err(missing)).is_ok());
        assert!(load_dotenv(Ok(())).is_ok());

        let malformed = dotenvy::Error::LineParse("APP FOLDER=x".to_string(), 3);
        assert!(matches!(
            load_dotenv(Err(malformed)),
            Err(crate::Error::EnvVar(_))
        ));
    }
}
