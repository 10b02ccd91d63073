/* src/core/src/mime.rs */

/// Mime type for a file extension. Closed table; anything unknown is
/// served as an opaque byte stream.
pub fn from_ext(ext: &str) -> &'static str {
  match ext {
    "html" | "htm" => "text/html; charset=utf-8",
    "css" => "text/css; charset=utf-8",
    "js" | "mjs" => "text/javascript; charset=utf-8",
    "json" | "map" | "webmanifest" => "application/json",
    "txt" => "text/plain; charset=utf-8",
    "xml" => "application/xml",
    "svg" => "image/svg+xml",
    "png" => "image/png",
    "jpg" | "jpeg" => "image/jpeg",
    "gif" => "image/gif",
    "webp" => "image/webp",
    "avif" => "image/avif",
    "ico" => "image/x-icon",
    "woff" => "font/woff",
    "woff2" => "font/woff2",
    "ttf" => "font/ttf",
    "otf" => "font/otf",
    "wasm" => "application/wasm",
    "pdf" => "application/pdf",
    "webm" => "video/webm",
    "mp4" => "video/mp4",
    "mp3" => "audio/mpeg",
    _ => "application/octet-stream",
  }
}

/// Mime type for a path, from its extension.
pub fn from_path(path: &std::path::Path) -> &'static str {
  path
    .extension()
    .and_then(|e| e.to_str())
    .map_or("application/octet-stream", from_ext)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::Path;

  #[test]
  fn common_web_types() {
    assert_eq!(from_ext("html"), "text/html; charset=utf-8");
    assert_eq!(from_ext("js"), "text/javascript; charset=utf-8");
    assert_eq!(from_ext("mjs"), "text/javascript; charset=utf-8");
    assert_eq!(from_ext("css"), "text/css; charset=utf-8");
    assert_eq!(from_ext("woff2"), "font/woff2");
  }

  #[test]
  fn unknown_extension_is_octet_stream() {
    assert_eq!(from_ext("weird"), "application/octet-stream");
  }

  #[test]
  fn path_lookup() {
    assert_eq!(from_path(Path::new("assets/app-abc123.js")), "text/javascript; charset=utf-8");
    assert_eq!(from_path(Path::new("no_extension")), "application/octet-stream");
  }
}
