//! Move package manifests (`Move.toml`)
//!
//! Package names are PascalCase and their named address is the snake_case
//! form of the name, e.g. `name = "AccountExtensions"` publishes under
//! `account_extensions`.

use std::path::{Path, PathBuf};

use super::publisher::PublishError;

pub const MANIFEST_FILE: &str = "Move.toml";
pub const LOCK_FILE: &str = "Move.lock";

/// Placeholder a package uses for its own address before it is published
pub const UNASSIGNED_ADDRESS: &str = "0x0";

/// One publishable package discovered on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageManifest {
    pub name: String,
    /// Package directory (the one holding `Move.toml`)
    pub path: PathBuf,
    /// Names of `local = "..."` dependencies, in declaration order
    pub dependencies: Vec<String>,
    pub published: bool,
    pub resolved_address: Option<String>,
}

impl PackageManifest {
    pub fn named_address(&self) -> String {
        named_address(&self.name)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.path.join(MANIFEST_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.path.join(LOCK_FILE)
    }

    pub fn depends_on(&self, name: &str) -> bool {
        self.dependencies.iter().any(|d| d == name)
    }
}

/// Convert a PascalCase package name to its snake_case named address
pub fn named_address(package_name: &str) -> String {
    let mut out = String::with_capacity(package_name.len() + 4);
    let mut prev: Option<char> = None;
    for c in package_name.chars() {
        if c.is_ascii_uppercase() {
            if prev.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit()) {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c.to_ascii_lowercase());
        }
        prev = Some(c);
    }
    out
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PublishError + '_ {
    move |source| PublishError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Recursively find every `Move.toml` under `dir`.
///
/// Entries are visited in file-name order so discovery is stable across
/// runs. Symlinks are not followed.
pub fn find_manifests(dir: &Path) -> Result<Vec<PathBuf>, PublishError> {
    let mut results = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries = std::fs::read_dir(&current)
            .map_err(io_error(&current))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(io_error(&current))?;
        entries.sort_by_key(|e| e.file_name());

        let mut subdirs = Vec::new();
        for entry in entries {
            let file_type = entry.file_type().map_err(io_error(&entry.path()))?;
            if file_type.is_dir() {
                subdirs.push(entry.path());
            } else if file_type.is_file() && entry.file_name() == MANIFEST_FILE {
                results.push(entry.path());
            }
        }
        // Push in reverse so the worklist pops subdirectories in sorted order
        pending.extend(subdirs.into_iter().rev());
    }

    Ok(results)
}

/// Parse manifest contents. Returns `None` when no package name is declared.
pub fn parse_manifest(content: &str, package_dir: &Path) -> Result<Option<PackageManifest>, PublishError> {
    let table: toml::Table = content.parse().map_err(|e: toml::de::Error| PublishError::Manifest {
        path: package_dir.join(MANIFEST_FILE),
        reason: e.to_string(),
    })?;

    let Some(name) = table
        .get("package")
        .and_then(|p| p.get("name"))
        .and_then(|n| n.as_str())
        .filter(|n| !n.is_empty())
    else {
        return Ok(None);
    };

    let dependencies = table
        .get("dependencies")
        .and_then(|d| d.as_table())
        .map(|deps| {
            deps.iter()
                .filter(|(_, info)| info.as_table().is_some_and(|t| t.contains_key("local")))
                .map(|(dep_name, _)| dep_name.clone())
                .collect()
        })
        .unwrap_or_default();

    Ok(Some(PackageManifest {
        name: name.to_string(),
        path: package_dir.to_path_buf(),
        dependencies,
        published: false,
        resolved_address: None,
    }))
}

/// Read and parse a `Move.toml` file
pub fn read_manifest(manifest_path: &Path) -> Result<Option<PackageManifest>, PublishError> {
    let content = std::fs::read_to_string(manifest_path).map_err(io_error(manifest_path))?;
    let package_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    parse_manifest(&content, package_dir)
}

/// Set `[addresses].<key> = <value>` in a manifest.
///
/// The file is edited in place: key order, inline tables, and comments are
/// kept, and only the one value changes. Returns `Ok(false)` without touching
/// the file when the manifest has no `[addresses]` table, unless `required`
/// is set, in which case that is a configuration error.
pub fn set_address(
    package_name: &str,
    manifest_path: &Path,
    key: &str,
    value: &str,
    required: bool,
) -> Result<bool, PublishError> {
    let content = std::fs::read_to_string(manifest_path).map_err(io_error(manifest_path))?;
    let mut doc: toml_edit::Document = content.parse().map_err(|e: toml_edit::TomlError| PublishError::Manifest {
        path: manifest_path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let Some(addresses) = doc
        .as_table_mut()
        .get_mut("addresses")
        .and_then(|a| a.as_table_like_mut())
    else {
        if required {
            return Err(PublishError::MissingAddresses {
                package: package_name.to_string(),
            });
        }
        return Ok(false);
    };

    if let Some(existing) = addresses.get_mut(key).and_then(|item| item.as_value_mut()) {
        let decor = existing.decor().clone();
        *existing = toml_edit::Value::from(value);
        *existing.decor_mut() = decor;
    } else {
        addresses.insert(key, toml_edit::value(value));
    }

    std::fs::write(manifest_path, doc.to_string()).map_err(io_error(manifest_path))?;
    Ok(true)
}

/// Read back `[addresses].<key>` from a manifest
#[cfg(test)]
pub fn read_address(manifest_path: &Path, key: &str) -> Result<Option<String>, PublishError> {
    let content = std::fs::read_to_string(manifest_path).map_err(io_error(manifest_path))?;
    let table: toml::Table = content.parse().map_err(|e: toml::de::Error| PublishError::Manifest {
        path: manifest_path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(table
        .get("addresses")
        .and_then(|a| a.get(key))
        .and_then(|v| v.as_str())
        .map(String::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
[package]
name = "AccountExtensions"
edition = "2024.beta"

[dependencies]
Sui = { git = "https://github.com/MystenLabs/sui.git", subdir = "crates/sui-framework/packages/sui-framework", rev = "framework/mainnet" }
AccountProtocol = { local = "../protocol" }
Kiosk = { local = "../kiosk" }

[addresses]
account_extensions = "0x0"
account_protocol = "0x0"
"#;

    #[test]
    fn test_named_address() {
        assert_eq!(named_address("AccountExtensions"), "account_extensions");
        assert_eq!(named_address("Kiosk"), "kiosk");
        assert_eq!(named_address("Pkg2Name"), "pkg2_name");
        assert_eq!(named_address("NFTMarket"), "nftmarket");
    }

    #[test]
    fn test_parse_manifest_local_dependencies_only() {
        let pkg = parse_manifest(MANIFEST, Path::new("/pkgs/ext")).unwrap().unwrap();
        assert_eq!(pkg.name, "AccountExtensions");
        assert_eq!(pkg.path, PathBuf::from("/pkgs/ext"));
        assert_eq!(pkg.dependencies, vec!["AccountProtocol", "Kiosk"]);
        assert!(!pkg.published);
        assert!(pkg.resolved_address.is_none());
    }

    #[test]
    fn test_parse_manifest_without_name_is_skipped() {
        let content = "[package]\nedition = \"2024.beta\"\n";
        assert!(parse_manifest(content, Path::new(".")).unwrap().is_none());
        assert!(parse_manifest("[addresses]\n", Path::new(".")).unwrap().is_none());
    }

    #[test]
    fn test_parse_manifest_rejects_invalid_toml() {
        assert!(matches!(
            parse_manifest("[package\nname=", Path::new(".")),
            Err(PublishError::Manifest { .. })
        ));
    }

    #[test]
    fn test_find_manifests_recursive_and_sorted() {
        let dir = TempDir::new().unwrap();
        for sub in ["b", "a/nested", "a", "c/deeper/deepest"] {
            std::fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        for sub in ["b", "a/nested", "a", "c/deeper/deepest"] {
            std::fs::write(dir.path().join(sub).join(MANIFEST_FILE), "").unwrap();
        }
        std::fs::write(dir.path().join("b").join("Move.lock"), "").unwrap();

        let found: Vec<PathBuf> = find_manifests(dir.path())
            .unwrap()
            .into_iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            found,
            vec![
                PathBuf::from("a/Move.toml"),
                PathBuf::from("a/nested/Move.toml"),
                PathBuf::from("b/Move.toml"),
                PathBuf::from("c/deeper/deepest/Move.toml"),
            ]
        );
    }

    #[test]
    fn test_set_address_rewrites_value() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        std::fs::write(&path, MANIFEST).unwrap();

        assert!(set_address("AccountExtensions", &path, "account_protocol", "0xcc", true).unwrap());

        assert_eq!(read_address(&path, "account_protocol").unwrap().as_deref(), Some("0xcc"));
        assert_eq!(read_address(&path, "account_extensions").unwrap().as_deref(), Some("0x0"));
        // The rest of the manifest survives the rewrite
        let reparsed = read_manifest(&path).unwrap().unwrap();
        assert_eq!(reparsed.dependencies, vec!["AccountProtocol", "Kiosk"]);
    }

    #[test]
    fn test_set_address_keeps_layout_and_comments() {
        let content = r#"# Marketplace package
[package]
name = "MarketPlace"
edition = "2024.beta" # pinned

[dependencies]
CoreLib = { local = "../core" }

[addresses]
market_place = "0x0"
core_lib = "0x0" # filled in at publish time
"#;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        std::fs::write(&path, content).unwrap();

        assert!(set_address("MarketPlace", &path, "core_lib", "0xaa", true).unwrap());

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            content.replace(
                "core_lib = \"0x0\" # filled in",
                "core_lib = \"0xaa\" # filled in"
            )
        );
    }

    #[test]
    fn test_set_address_adds_missing_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        std::fs::write(&path, "[package]\nname = \"Kiosk\"\n\n[addresses]\nkiosk = \"0x0\"\n").unwrap();

        assert!(set_address("Kiosk", &path, "core_lib", "0xaa", true).unwrap());

        assert_eq!(read_address(&path, "core_lib").unwrap().as_deref(), Some("0xaa"));
        assert_eq!(read_address(&path, "kiosk").unwrap().as_deref(), Some("0x0"));
    }

    #[test]
    fn test_set_address_without_addresses_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        let content = "[package]\nname = \"Kiosk\"\n";
        std::fs::write(&path, content).unwrap();

        assert!(!set_address("Kiosk", &path, "kiosk", "0xcc", false).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), content);

        assert!(matches!(
            set_address("Kiosk", &path, "kiosk", "0x0", true),
            Err(PublishError::MissingAddresses { .. })
        ));
    }
}
