/* src/build/src/assets_out.rs */

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use pyra_core::{AssetMeta, mime};
use sha2::{Digest, Sha256};

/// Copy the public directory into the client output dir, opaque
/// pass-through, preserving the tree.
pub fn copy_public(public_dir: &Path, client_dir: &Path) -> Result<u32> {
  copy_tree(public_dir, client_dir)
}

fn copy_tree(from: &Path, to: &Path) -> Result<u32> {
  let mut copied = 0;
  std::fs::create_dir_all(to).with_context(|| format!("failed to create {}", to.display()))?;
  let entries =
    std::fs::read_dir(from).with_context(|| format!("failed to read {}", from.display()))?;
  for entry in entries {
    let entry = entry?;
    let source = entry.path();
    let target = to.join(entry.file_name());
    if source.is_dir() {
      copied += copy_tree(&source, &target)?;
    } else {
      std::fs::copy(&source, &target)
        .with_context(|| format!("failed to copy {} -> {}", source.display(), target.display()))?;
      copied += 1;
    }
  }
  Ok(copied)
}

/// Index every file under the client output dir: relative path ->
/// {size, content hash, mime}. BTreeMap keeps manifest output stable.
pub fn index_assets(client_dir: &Path) -> Result<BTreeMap<String, AssetMeta>> {
  let mut assets = BTreeMap::new();
  index_tree(client_dir, client_dir, &mut assets)?;
  Ok(assets)
}

fn index_tree(
  root: &Path,
  dir: &Path,
  assets: &mut BTreeMap<String, AssetMeta>,
) -> Result<()> {
  let entries =
    std::fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
  for entry in entries {
    let entry = entry?;
    let path = entry.path();
    if path.is_dir() {
      index_tree(root, &path, assets)?;
      continue;
    }
    let contents =
      std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(&contents);
    let digest = hasher.finalize();
    let relative = path
      .strip_prefix(root)
      .unwrap_or(&path)
      .components()
      .map(|c| c.as_os_str().to_string_lossy())
      .collect::<Vec<_>>()
      .join("/");
    assets.insert(
      relative,
      AssetMeta {
        size: contents.len() as u64,
        hash: hex::encode(&digest[..8]),
        mime: mime::from_path(&path).to_string(),
      },
    );
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn copies_nested_public_tree() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let public = tmp.path().join("public");
    std::fs::create_dir_all(public.join("img")).expect("mkdir");
    std::fs::write(public.join("robots.txt"), "User-agent: *").expect("write");
    std::fs::write(public.join("img/logo.svg"), "<svg/>").expect("write");

    let client = tmp.path().join("client");
    let copied = copy_public(&public, &client).expect("copy");
    assert_eq!(copied, 2);
    assert!(client.join("robots.txt").is_file());
    assert!(client.join("img/logo.svg").is_file());
  }

  #[test]
  fn indexes_sizes_hashes_and_mimes() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let client = tmp.path().join("client");
    std::fs::create_dir_all(client.join("assets")).expect("mkdir");
    std::fs::write(client.join("assets/app-abc123.js"), "console.log(1)").expect("write");
    std::fs::write(client.join("index.html"), "<html></html>").expect("write");

    let assets = index_assets(&client).expect("index");
    let js = assets.get("assets/app-abc123.js").expect("js");
    assert_eq!(js.size, 14);
    assert_eq!(js.hash.len(), 16);
    assert_eq!(js.mime, "text/javascript; charset=utf-8");
    assert_eq!(assets.get("index.html").expect("html").mime, "text/html; charset=utf-8");
  }

  #[test]
  fn identical_content_hashes_identically() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let client = tmp.path().join("client");
    std::fs::create_dir_all(&client).expect("mkdir");
    std::fs::write(client.join("a.txt"), "same").expect("write");
    std::fs::write(client.join("b.txt"), "same").expect("write");

    let assets = index_assets(&client).expect("index");
    assert_eq!(assets["a.txt"].hash, assets["b.txt"].hash);
  }
}
