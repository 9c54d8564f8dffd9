//! Fallback metadata source: walk `category/package/package-version.ebuild`
//! directly. Used when a tree carries no generated metadata cache at
//! all — always available, slower than the other two backends since
//! nothing is precomputed.

use super::{category_allowed, CacheBackend, ErrorCallback};
use crate::error::EixError;
use crate::package::{Package, Version};
use crate::writer::PackageTree;
use std::fs;
use std::path::PathBuf;

pub struct EbuildTreeCache {
    root: PathBuf,
}

impl EbuildTreeCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        EbuildTreeCache { root: root.into() }
    }
}

impl CacheBackend for EbuildTreeCache {
    fn can_read_multiple_categories(&self) -> bool {
        false
    }

    fn read_categories(
        &self,
        tree: &mut PackageTree,
        categories_filter: Option<&[String]>,
        single_category: Option<&str>,
        on_error: &mut ErrorCallback,
    ) -> Result<(), EixError> {
        let category_dirs = fs::read_dir(&self.root)
            .map_err(|e| EixError::missing_file(self.root.display().to_string(), e.to_string()))?;

        for entry in category_dirs.filter_map(Result::ok) {
            let category_path = entry.path();
            if !category_path.is_dir() {
                continue;
            }
            let category = entry.file_name().to_string_lossy().into_owned();
            if !category_allowed(&category, categories_filter, single_category) {
                continue;
            }

            let Ok(package_dirs) = fs::read_dir(&category_path) else {
                continue;
            };
            for pkg_dir_entry in package_dirs.filter_map(Result::ok) {
                let pkg_path = pkg_dir_entry.path();
                if !pkg_path.is_dir() {
                    continue;
                }
                let name = pkg_dir_entry.file_name().to_string_lossy().into_owned();

                let Ok(ebuild_files) = fs::read_dir(&pkg_path) else {
                    continue;
                };
                let mut pkg = Package::new(category.clone(), name.clone());
                for ebuild_entry in ebuild_files.filter_map(Result::ok) {
                    let path = ebuild_entry.path();
                    if path.extension().and_then(|e| e.to_str()) != Some("ebuild") {
                        continue;
                    }
                    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                        continue;
                    };
                    let Some(version_str) = stem.strip_prefix(&format!("{name}-")) else {
                        on_error(format!("Can't parse ebuild filename {}", path.display()));
                        continue;
                    };
                    pkg.versions.push(Version::from_cache_fields(
                        version_str.to_string(),
                        "0".to_string(),
                        String::new(),
                        Vec::new(),
                        0,
                        0,
                        None,
                    ));
                }
                if !pkg.versions.is_empty() {
                    tree.insert(pkg);
                }
            }
        }
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        "ebuild"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn discovers_versions_from_ebuild_filenames() {
        let dir = tempdir().unwrap();
        let pkg_dir = dir.path().join("sys-apps/eix");
        fs::create_dir_all(&pkg_dir).unwrap();
        fs::write(pkg_dir.join("eix-0.20.ebuild"), "").unwrap();
        fs::write(pkg_dir.join("eix-0.32.7.ebuild"), "").unwrap();

        let mut tree = PackageTree::new();
        let backend = EbuildTreeCache::new(dir.path());
        backend.read_categories(&mut tree, None, None, &mut |_| {}).unwrap();

        assert_eq!(tree.package_count(), 1);
    }
}
