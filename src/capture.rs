//! Screenshot capture and publication.

pub mod browser;
pub mod publisher;

pub use browser::CaptureSession;
pub use publisher::ArtifactPublisher;

/// Storage-channel label identifying one artifact: language and item name,
/// joined and uppercased. The first underscore separates the two when
/// parsing the label back.
pub fn artifact_label(language: &str, name: &str) -> String {
    format!("{language}_{name}").to_uppercase()
}

/// On-disk file name for an artifact.
pub fn artifact_file_name(language: &str, name: &str) -> String {
    format!("{}.png", artifact_label(language, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_uppercased() {
        assert_eq!(artifact_label("en", "Plasma Rifle"), "EN_PLASMA RIFLE");
        assert_eq!(artifact_label("fr", "falcon"), "FR_FALCON");
    }

    #[test]
    fn file_names_append_the_extension() {
        assert_eq!(artifact_file_name("en", "Falcon"), "EN_FALCON.png");
    }
}
