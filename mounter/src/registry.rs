//! Filesystem registry
//!
//! Resident filesystem drivers keyed by dostype. Entries are published at
//! the head, so a lookup by dostype finds the most recently loaded driver.
//! The lock only guards list scans and inserts; loading happens between
//! [`FileSystemRegistry::lookup_or_prepare`] and
//! [`FileSystemRegistry::commit`] with the lock released.
//!
//! A process-wide instance is available through [`global`]; callers that
//! need isolation (tests, several adapters with separate lists) create
//! their own and inject it.

use alloc::string::String;
use alloc::vec::Vec;

use rdb::format::filesys::{FileSysHeaderBlock, HandlerFields, Version};
use rdb::{DosType, HunkAllocator, LoadedImage};
use spin::{Mutex, Once};

/// Handler description of a registered filesystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsHandler {
    /// Filesystem type
    pub dos_type: DosType,
    /// `major << 16 | minor`
    pub version: u32,
    /// Handler fields to patch into device nodes
    pub patch_flags: u32,
    /// Field values; the segment list field holds the image BPTR
    pub handler: HandlerFields,
}

/// Diagnostic view of one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsListing {
    /// Handler description
    pub fs: FsHandler,
    /// Who registered it
    pub creator: String,
}

impl core::fmt::Display for FsListing {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}  {}  {}",
            self.fs.dos_type,
            Version(self.fs.version),
            self.creator
        )
    }
}

struct FileSystemEntry {
    fs: FsHandler,
    creator: String,
    image: LoadedImage,
}

/// A provisional entry, not yet visible to lookups
#[derive(Debug)]
pub struct PreparedEntry {
    fs: FsHandler,
    creator: String,
    image: Option<LoadedImage>,
}

impl PreparedEntry {
    /// Filesystem type
    pub fn dos_type(&self) -> DosType {
        self.fs.dos_type
    }

    /// Version of the driver being prepared
    pub fn version(&self) -> u32 {
        self.fs.version
    }

    /// Handler fields copied from the header block
    pub fn handler(&self) -> &HandlerFields {
        &self.fs.handler
    }

    /// Attach the loaded driver; its entry point becomes the segment list
    pub fn attach(&mut self, image: LoadedImage) {
        self.fs
            .handler
            .set(HandlerFields::SEG_LIST, image.seglist_bptr());
        self.image = Some(image);
    }

    /// Whether an image is attached
    pub fn is_loaded(&self) -> bool {
        self.image.is_some()
    }

    /// Drop the entry, returning any attached image to `alloc`
    pub fn discard<A: HunkAllocator>(self, alloc: &mut A) {
        if let Some(image) = self.image {
            image.release(alloc);
        }
    }
}

/// Registry of resident filesystems
pub struct FileSystemRegistry {
    entries: Mutex<Vec<FileSystemEntry>>,
}

impl Default for FileSystemRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystemRegistry {
    /// Create an empty registry
    pub const fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Prepare an entry for the driver described by `fshd`
    ///
    /// Returns `None` when a driver for the same dostype with the same or a
    /// newer version is already registered. Otherwise the returned entry
    /// carries the handler fields selected by the header's patch flags.
    pub fn lookup_or_prepare(&self, fshd: &FileSysHeaderBlock, creator: &str) -> Option<PreparedEntry> {
        {
            let entries = self.entries.lock();
            if let Some(e) = entries
                .iter()
                .find(|e| e.fs.dos_type == fshd.dos_type && e.fs.version >= fshd.version)
            {
                log::debug!(
                    "Registry: {} found, version {} >= {}",
                    fshd.dos_type,
                    Version(e.fs.version),
                    Version(fshd.version)
                );
                return None;
            }
        }

        let mut handler = HandlerFields::default();
        handler.patch_from(&fshd.handler, fshd.patch_flags);
        log::debug!(
            "Registry: {} not found or old version: created new",
            fshd.dos_type
        );
        Some(PreparedEntry {
            fs: FsHandler {
                dos_type: fshd.dos_type,
                version: fshd.version,
                patch_flags: fshd.patch_flags,
                handler,
            },
            creator: String::from(creator),
            image: None,
        })
    }

    /// Publish `entry` at the head
    ///
    /// An entry without an image, or one the list has no room for, is
    /// handed back so the caller can return its memory.
    pub fn commit(&self, entry: PreparedEntry) -> core::result::Result<(), PreparedEntry> {
        let (fs, creator, image) = match entry {
            PreparedEntry {
                fs,
                creator,
                image: Some(image),
            } => (fs, creator, image),
            unloaded => {
                log::debug!("Registry: {} not loaded, entry dropped", unloaded.fs.dos_type);
                return Err(unloaded);
            }
        };

        let mut entries = self.entries.lock();
        if entries.try_reserve(1).is_err() {
            log::warn!("Registry: no memory for {}", fs.dos_type);
            return Err(PreparedEntry {
                fs,
                creator,
                image: Some(image),
            });
        }
        entries.insert(
            0,
            FileSystemEntry {
                fs,
                creator,
                image,
            },
        );
        log::info!("Registry: {} {} added", fs.dos_type, Version(fs.version));
        Ok(())
    }

    /// Most recently published entry for `dos_type`
    pub fn find(&self, dos_type: DosType) -> Option<FsHandler> {
        self.entries
            .lock()
            .iter()
            .find(|e| e.fs.dos_type == dos_type)
            .map(|e| e.fs)
    }

    /// Run `f` on the image of the most recent entry for `dos_type`
    ///
    /// The registry lock is held while `f` runs.
    pub fn with_image<R>(&self, dos_type: DosType, f: impl FnOnce(&LoadedImage) -> R) -> Option<R> {
        self.entries
            .lock()
            .iter()
            .find(|e| e.fs.dos_type == dos_type)
            .map(|e| f(&e.image))
    }

    /// Snapshot of all entries, head first
    pub fn entries(&self) -> Vec<FsListing> {
        self.entries
            .lock()
            .iter()
            .map(|e| FsListing {
                fs: e.fs,
                creator: e.creator.clone(),
            })
            .collect()
    }

    /// Number of published entries
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing is published
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

static GLOBAL: Once<FileSystemRegistry> = Once::new();

/// The process-wide registry, created on first use
pub fn global() -> &'static FileSystemRegistry {
    GLOBAL.call_once(FileSystemRegistry::new)
}
