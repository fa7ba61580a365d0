//! Regeneration trigger.
//!
//! Generated artifacts are stale when the marker file is missing or older
//! than the newest settings file (`config/**/*.yml`) or project template.
//! Built-in templates ship inside the binary, so artifacts written by another
//! stackctl version are stale too; [`stamp_matches`] checks the version stamp.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use walkdir::WalkDir;

use crate::error::Result;

/// `true` when `marker` must be regenerated.
pub fn is_stale(marker: &Path, config_dir: &Path, template_dir: &Path) -> Result<bool> {
    let marker_time = match marker.metadata().and_then(|m| m.modified()) {
        Ok(time) => time,
        Err(_) => {
            log::debug!("{} missing, regenerating", marker.display());
            return Ok(true);
        }
    };
    let newest = [newest_config(config_dir)?, newest_file(template_dir)]
        .into_iter()
        .flatten()
        .max();
    Ok(match newest {
        Some(source_time) => source_time > marker_time,
        None => false,
    })
}

/// Version written with generated artifacts.
pub const GENERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// `true` when `stamp` records `version`.
pub fn stamp_matches(stamp: &Path, version: &str) -> bool {
    match fs::read_to_string(stamp) {
        Ok(text) => text.trim() == version,
        Err(_) => false,
    }
}

fn newest_config(config_dir: &Path) -> Result<Option<SystemTime>> {
    let pattern = config_dir.join("**").join("*.yml");
    let mut newest = None;
    for entry in glob::glob(&pattern.to_string_lossy())? {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                log::warn!("skipping unreadable settings path: {}", e);
                continue;
            }
        };
        if let Ok(modified) = path.metadata().and_then(|m| m.modified()) {
            newest = newest.max(Some(modified));
        }
    }
    Ok(newest)
}

fn newest_file(dir: &Path) -> Option<SystemTime> {
    if !dir.is_dir() {
        return None;
    }
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok()?.modified().ok())
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;
    use tempfile::TempDir;

    fn set_mtime(path: &Path, time: SystemTime) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    fn setup() -> (TempDir, std::path::PathBuf, std::path::PathBuf, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config");
        let templates = dir.path().join("templates");
        fs::create_dir_all(config.join("environments")).unwrap();
        fs::create_dir_all(templates.join("compose")).unwrap();
        fs::write(config.join("deployment.yml"), "config: {}\n").unwrap();
        fs::write(config.join("environments/test.yml"), "config: {}\n").unwrap();
        fs::write(templates.join("compose/service.yml"), "x\n").unwrap();
        let marker = dir.path().join("compose.env");
        (dir, config, templates, marker)
    }

    #[test]
    fn test_missing_marker_is_stale() {
        let (_dir, config, templates, marker) = setup();
        assert!(is_stale(&marker, &config, &templates).unwrap());
    }

    #[test]
    fn test_fresh_marker_then_touched_template() {
        let (_dir, config, templates, marker) = setup();
        let base = SystemTime::now() - Duration::from_secs(3600);
        set_mtime(&config.join("deployment.yml"), base);
        set_mtime(&config.join("environments/test.yml"), base);
        let template = templates.join("compose/service.yml");
        set_mtime(&template, base);
        fs::write(&marker, "").unwrap();
        set_mtime(&marker, base + Duration::from_secs(60));
        assert!(!is_stale(&marker, &config, &templates).unwrap());

        set_mtime(&template, base + Duration::from_secs(120));
        assert!(is_stale(&marker, &config, &templates).unwrap());
    }

    #[test]
    fn test_nested_settings_file_counts() {
        let (_dir, config, templates, marker) = setup();
        let base = SystemTime::now() - Duration::from_secs(3600);
        for p in ["deployment.yml", "environments/test.yml"] {
            set_mtime(&config.join(p), base);
        }
        set_mtime(&templates.join("compose/service.yml"), base);
        fs::write(&marker, "").unwrap();
        set_mtime(&marker, base + Duration::from_secs(10));

        set_mtime(&config.join("environments/test.yml"), base + Duration::from_secs(20));
        assert!(is_stale(&marker, &config, &templates).unwrap());
    }

    #[test]
    fn test_stamp_matches() {
        let dir = TempDir::new().unwrap();
        let stamp = dir.path().join("generator.version");
        assert!(!stamp_matches(&stamp, "1.2.0"));
        fs::write(&stamp, "1.2.0\n").unwrap();
        assert!(stamp_matches(&stamp, "1.2.0"));
        assert!(!stamp_matches(&stamp, "1.3.0"));
    }

    #[test]
    fn test_no_sources_means_fresh() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("marker");
        fs::write(&marker, "").unwrap();
        assert!(!is_stale(&marker, &dir.path().join("config"), &dir.path().join("templates")).unwrap());
    }
}
