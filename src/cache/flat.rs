//! Flat-file metadata cache backend: one newline-delimited file per
//! ebuild, fields at fixed line offsets. Grounded directly in
//! `flat_reader.cc`'s `flat_get_keywords_slot_iuse_restrict` and
//! `flat_read_file`.

use super::{category_allowed, CacheBackend, ErrorCallback};
use crate::error::EixError;
use crate::package::{Depend, IUse, Package, Version};
use crate::writer::PackageTree;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Line index of each field in a flat cache file, per spec.md §6.
mod line {
    pub const DEPEND: usize = 0;
    pub const RDEPEND: usize = 1;
    pub const SLOT: usize = 2;
    pub const RESTRICT: usize = 4;
    pub const HOMEPAGE: usize = 5;
    pub const LICENSES: usize = 6;
    pub const DESCRIPTION: usize = 7;
    pub const KEYWORDS: usize = 8;
    pub const IUSE: usize = 10;
    pub const PDEPEND: usize = 12;
    pub const PROPERTIES: usize = 15;
}

/// A tree of `category/package/cache-file-per-version` layout, as laid
/// down by `egencache`/`emerge --metadata`.
pub struct FlatCache {
    root: PathBuf,
    use_depend: bool,
}

impl FlatCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FlatCache {
            root: root.into(),
            use_depend: true,
        }
    }

    fn read_one(&self, path: &Path, on_error: &mut ErrorCallback) -> Option<FlatFields> {
        let file = match fs::File::open(path) {
            Ok(f) => f,
            Err(e) => {
                on_error(format!("Can't read cache file {}: {}", path.display(), e));
                return None;
            }
        };
        let lines: Vec<String> = BufReader::new(file).lines().map_while(Result::ok).collect();

        let get = |i: usize| lines.get(i).cloned().unwrap_or_default();

        if lines.len() <= line::DESCRIPTION {
            on_error(format!(
                "Can't read cache file {}: file has only {} lines, need at least {}",
                path.display(),
                lines.len(),
                line::DESCRIPTION + 1
            ));
            return None;
        }

        let depend = if self.use_depend { get(line::DEPEND) } else { String::new() };
        let rdepend = if self.use_depend { get(line::RDEPEND) } else { String::new() };
        let pdepend = if self.use_depend { get(line::PDEPEND) } else { String::new() };

        Some(FlatFields {
            slot: get(line::SLOT),
            restrict: get(line::RESTRICT),
            homepage: get(line::HOMEPAGE),
            licenses: get(line::LICENSES),
            description: get(line::DESCRIPTION),
            keywords: get(line::KEYWORDS),
            iuse: get(line::IUSE),
            properties: get(line::PROPERTIES),
            depend,
            rdepend,
            pdepend,
        })
    }
}

struct FlatFields {
    slot: String,
    restrict: String,
    homepage: String,
    licenses: String,
    description: String,
    keywords: String,
    iuse: String,
    properties: String,
    depend: String,
    rdepend: String,
    pdepend: String,
}

impl CacheBackend for FlatCache {
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

            let Ok(package_files) = fs::read_dir(&category_path) else {
                continue;
            };
            for pkg_entry in package_files.filter_map(Result::ok) {
                let path = pkg_entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("cache") {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                let Some((name, full_version)) = split_name_version(stem) else {
                    continue;
                };

                let Some(fields) = self.read_one(&path, on_error) else {
                    continue;
                };

                let mut pkg = Package::new(category.clone(), name.to_string());
                pkg.homepage = fields.homepage;
                pkg.licenses = fields.licenses;
                pkg.desc = fields.description;

                let depend = if self.use_depend {
                    Some(Depend {
                        depend: fields.depend.split_whitespace().map(str::to_string).collect(),
                        rdepend: fields.rdepend.split_whitespace().map(str::to_string).collect(),
                        pdepend: fields.pdepend.split_whitespace().map(str::to_string).collect(),
                        bdepend: Vec::new(),
                        idepend: Vec::new(),
                    })
                } else {
                    None
                };

                let version = Version::from_cache_fields(
                    full_version.to_string(),
                    fields.slot,
                    fields.keywords,
                    fields.iuse.split_whitespace().map(IUse::parse).collect(),
                    parse_restrict(&fields.restrict),
                    parse_properties(&fields.properties),
                    depend,
                );
                pkg.versions.push(version);
                tree.insert(pkg);
            }
        }
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        "flat"
    }
}

fn split_name_version(stem: &str) -> Option<(&str, &str)> {
    let idx = stem.rfind('-')?;
    let (head, tail) = stem.split_at(idx);
    let version_part = &tail[1..];
    if version_part.chars().next()?.is_ascii_digit() {
        Some((head, version_part))
    } else {
        None
    }
}

fn parse_restrict(s: &str) -> u64 {
    use crate::package::restrict::NAMES;
    s.split_whitespace().fold(0u64, |acc, tok| {
        acc | NAMES.iter().find(|(_, name)| *name == tok).map(|(bit, _)| *bit).unwrap_or(0)
    })
}

fn parse_properties(s: &str) -> u64 {
    use crate::package::properties::NAMES;
    s.split_whitespace().fold(0u64, |acc, tok| {
        acc | NAMES.iter().find(|(_, name)| *name == tok).map(|(bit, _)| *bit).unwrap_or(0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_cache_file(dir: &Path, category: &str, filename: &str, lines: &[&str]) {
        let cat_dir = dir.join(category);
        fs::create_dir_all(&cat_dir).unwrap();
        fs::write(cat_dir.join(filename), lines.join("\n")).unwrap();
    }

    #[test]
    fn reads_fields_at_fixed_line_offsets() {
        let dir = tempdir().unwrap();
        let mut lines = vec![""; 16];
        lines[line::DEPEND] = "";
        lines[line::SLOT] = "0";
        lines[line::RESTRICT] = "test";
        lines[line::HOMEPAGE] = "https://example.org";
        lines[line::LICENSES] = "MIT";
        lines[line::DESCRIPTION] = "a small utility";
        lines[line::KEYWORDS] = "amd64 ~x86";
        lines[line::IUSE] = "+foo -bar";
        lines[line::PROPERTIES] = "live";
        write_cache_file(dir.path(), "sys-apps", "eix-0.20.cache", &lines);

        let mut tree = PackageTree::new();
        let mut errors = Vec::new();
        let backend = FlatCache::new(dir.path());
        backend
            .read_categories(&mut tree, None, None, &mut |e| errors.push(e))
            .unwrap();

        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        assert_eq!(tree.package_count(), 1);
    }

    #[test]
    fn short_file_reports_cant_read_error() {
        let dir = tempdir().unwrap();
        write_cache_file(dir.path(), "sys-apps", "eix-0.20.cache", &["only", "three", "lines"]);

        let mut tree = PackageTree::new();
        let mut errors = Vec::new();
        let backend = FlatCache::new(dir.path());
        backend
            .read_categories(&mut tree, None, None, &mut |e| errors.push(e))
            .unwrap();

        assert_eq!(tree.package_count(), 0);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Can't read cache file"));
    }

    #[test]
    fn category_filter_restricts_to_named_categories() {
        let dir = tempdir().unwrap();
        let mut lines = vec![""; 16];
        lines[line::DESCRIPTION] = "desc";
        write_cache_file(dir.path(), "sys-apps", "a-1.0.cache", &lines);
        write_cache_file(dir.path(), "dev-lang", "b-1.0.cache", &lines);

        let mut tree = PackageTree::new();
        let backend = FlatCache::new(dir.path());
        backend
            .read_categories(&mut tree, Some(&["sys-apps".to_string()]), None, &mut |_| {})
            .unwrap();
        assert_eq!(tree.package_count(), 1);
    }
}
