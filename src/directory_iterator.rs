use std::fs::File;

use log::warn;

use crate::directory_entry::DirectoryEntry;
use crate::zim::Zim;

/// Iterates directory entries in URL-pointer-table order, i.e. sorted by
/// `(namespace, url)`.
///
/// Bogus entries are skipped with a diagnostic so a single bad record does
/// not end the walk.
pub struct DirectoryIterator<'a> {
    zim: &'a Zim,
    file: File,
    next: u32,
    max: u32,
}

impl<'a> DirectoryIterator<'a> {
    pub(crate) fn new(zim: &'a Zim, file: File) -> DirectoryIterator<'a> {
        DirectoryIterator {
            zim,
            file,
            next: 0,
            max: zim.header.article_count,
        }
    }
}

impl<'a> Iterator for DirectoryIterator<'a> {
    type Item = DirectoryEntry;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.max {
            let index = self.next;
            self.next += 1;

            match self.zim.entry_at_with(&mut self.file, index) {
                Ok(entry) => return Some(entry),
                Err(err) => warn!("skipping bogus directory entry {}: {}", index, err),
            }
        }
        None
    }
}
