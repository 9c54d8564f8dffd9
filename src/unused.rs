//! Reports lines in a `package.{keywords,mask,unmask,use}`-style file
//! that match no package in the given list — the `-t` mode's
//! collaborator, grounded in `eix.cc`'s `print_unused`.

use crate::package::Package;
use std::fs;
use std::path::Path;

/// First whitespace-delimited token of a non-comment, non-empty line
/// is the category/name (optionally versioned) atom this entry
/// targets; everything after it (keyword list, `-*`, a use-flag list)
/// is the entry's payload and is irrelevant to "is this still used".
fn atom_category_name(token: &str) -> Option<(&str, &str)> {
    let token = token
        .trim_start_matches(['<', '>', '='])
        .trim_start_matches("~");
    let slash = token.find('/')?;
    let (category, rest) = token.split_at(slash);
    let rest = &rest[1..];
    // Strip a trailing "-<version>" if present, so "=sys-apps/eix-0.20"
    // still matches a package named "eix".
    let name = match rest.rfind('-') {
        Some(pos) if rest[pos + 1..].starts_with(|c: char| c.is_ascii_digit()) => &rest[..pos],
        _ => rest,
    };
    Some((category, name))
}

/// Read `path` and return every non-empty, non-comment line whose
/// leading atom matches no package in `packages`. Returns an empty
/// vector (not an error) if `path` doesn't exist — most installations
/// don't have all four of `package.keywords`/`mask`/`unmask`/`use`.
pub fn report_unused(path: &Path, packages: &[Package]) -> Vec<String> {
    let Ok(contents) = fs::read_to_string(path) else {
        return Vec::new();
    };

    let mut unused = Vec::new();
    for line in contents.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some(first_token) = trimmed.split_whitespace().next() else {
            continue;
        };
        let Some((category, name)) = atom_category_name(first_token) else {
            continue;
        };
        let still_used = packages.iter().any(|p| p.category == category && p.name == name);
        if !still_used {
            unused.push(line.to_string());
        }
    }
    unused
}
