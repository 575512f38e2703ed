// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::error::ArgumentError;

/// Width of the numeric suffix given to sequential nodes
pub const SEQUENCE_WIDTH: usize = 10;

/// Checks that a node path is absolute and normalized.
pub fn validate_path(path: &str) -> Result<(), ArgumentError> {
    if path.is_empty() {
        return Err(ArgumentError::EmptyPath);
    }
    if !path.starts_with('/') {
        return Err(ArgumentError::NotAbsolute(path.to_string()));
    }
    // Shortcut, no need to check more since the path is the root.
    if path.len() == 1 {
        return Ok(());
    }
    if path.ends_with('/') {
        return Err(ArgumentError::TrailingSlash(path.to_string()));
    }
    for name in path[1..].split('/') {
        match name {
            "" => return Err(ArgumentError::EmptySegment(path.to_string())),
            "." | ".." => return Err(ArgumentError::RelativeSegment(path.to_string())),
            _ => {}
        }
    }
    Ok(())
}

/// Iterates the names of a validated path, root first. The root has none.
pub fn segments(path: &str) -> impl DoubleEndedIterator<Item = &str> {
    path.split('/').filter(|name| !name.is_empty())
}

/// Extracts the final name of a path, if it has one
pub fn basename(path: &str) -> Option<&str> {
    segments(path).next_back()
}

/// Extracts the parent path, if there is one
pub fn dirname(path: &str) -> Option<&str> {
    match path.rfind('/') {
        None => None,
        Some(_) if path == "/" => None,
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
    }
}

/// Joins a parent path and a child name
pub fn join(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Appends `n` to `base`, left-padded with zeros to `width` digits.
pub fn zero_pad(base: &str, n: u64, width: usize) -> String {
    format!("{base}{n:0width$}")
}

/// Extracts the chroot from a connection string such as `host:2181,host2:2181/app`.
///
/// Everything from the first `/` on is the chroot; a bare `/` means none.
pub fn parse_chroot(connection: &str) -> Result<String, ArgumentError> {
    let Some(idx) = connection.find('/') else {
        return Ok(String::new());
    };
    let chroot = &connection[idx..];
    if chroot == "/" {
        return Ok(String::new());
    }
    validate_path(chroot).map_err(|err| ArgumentError::InvalidChroot {
        connection: connection.to_string(),
        reason: Box::new(err),
    })?;
    Ok(chroot.to_string())
}

/// Prefixes a validated caller path with a session chroot.
pub fn prepend_chroot(chroot: &str, path: &str) -> String {
    if chroot.is_empty() {
        path.to_string()
    } else if path == "/" {
        chroot.to_string()
    } else {
        format!("{chroot}{path}")
    }
}
