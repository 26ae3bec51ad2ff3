use std::path::Path;

/// Last component of `path`, extension included. Both `/` and `\` separate
/// components since importers hand through paths authored on either platform.
pub fn file_name_of(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

pub fn filename_without_extension(path: &str) -> Option<&str> {
    let name = file_name_of(path);
    Path::new(name).file_stem().and_then(|s| s.to_str())
}

pub fn extension_of(path: &str) -> Option<String> {
    Path::new(file_name_of(path))
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
}
