use std::path::Path;

pub fn detect_mime_type<P: AsRef<Path>>(path: P) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("image/jpeg")
        .to_string()
}

pub fn current_timestamp_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}
