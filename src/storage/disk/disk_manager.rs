use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::atomic::{AtomicU32, Ordering},
};

use log::debug;
use parking_lot::Mutex;

use crate::common::config::{PageId, PAGE_SIZE};

/// File-backed page storage: a database file addressed in PAGE_SIZE slots,
/// plus a sidecar log file treated as an append-only byte stream. Page ids
/// are handed out here as well, monotonically and never twice within a
/// session.
///
/// Both file handles sit behind mutexes so one DiskManager can serve the
/// buffer pool and the scheduler's worker thread at the same time. An I/O
/// error panics; nothing below this layer can recover it.
#[derive(Debug)]
pub struct DiskManager {
    db_io: Mutex<File>,
    file_name: PathBuf,
    log_io: Mutex<File>,
    log_name: PathBuf,
    // The next page id to hand out; ids are never recycled
    next_page_id: AtomicU32,
    num_flushes: AtomicU32,
    num_writes: AtomicU32,
}

fn open_or_create(path: &Path, append: bool) -> File {
    let mut options = OpenOptions::new();
    options.read(true).create(true);
    if append {
        options.append(true);
    } else {
        options.write(true);
    }
    match options.open(path) {
        Ok(file) => file,
        Err(e) => panic!("cannot open {}: {:?}", path.display(), e),
    }
}

impl DiskManager {
    /// Opens the database file at `db_file`, creating it if missing. The
    /// log file lives next to it under the same name with a `.log`
    /// extension.
    pub fn new(db_file: impl AsRef<Path>) -> Self {
        let file_name = db_file.as_ref().to_path_buf();
        let log_name = file_name.with_extension("log");
        Self {
            db_io: Mutex::new(open_or_create(&file_name, false)),
            file_name,
            log_io: Mutex::new(open_or_create(&log_name, true)),
            log_name,
            next_page_id: AtomicU32::new(0),
            num_flushes: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
        }
    }

    /// Hands out the next page id.
    pub fn allocate_page(&self) -> PageId {
        self.next_page_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Reclaims the page's disk space. The id itself stays retired; nothing
    /// tracks free extents yet, so this is a no-op on the data file.
    pub fn deallocate_page(&self, _page_id: PageId) {}

    /// Writes one page's worth of bytes into the page's slot and syncs the
    /// file before returning.
    pub fn write_page(&self, page_id: PageId, page_data: &[u8]) {
        assert_eq!(page_data.len(), PAGE_SIZE);
        self.num_writes.fetch_add(1, Ordering::Relaxed);

        let mut db_io = self.db_io.lock();
        db_io.seek(SeekFrom::Start(Self::slot_offset(page_id))).unwrap();
        if let Err(e) = db_io.write_all(page_data) {
            panic!("failed to write page {}: {:?}", page_id, e);
        }
        db_io.flush().unwrap();
    }

    /// Fills `page_data` from the page's slot. A slot at or past the end of
    /// the file reads as zeroes: the page was allocated but never written.
    pub fn read_page(&self, page_id: PageId, page_data: &mut [u8]) {
        assert_eq!(page_data.len(), PAGE_SIZE);

        let mut db_io = self.db_io.lock();
        let offset = Self::slot_offset(page_id);
        if offset >= db_io.metadata().unwrap().len() {
            page_data.fill(0);
            return;
        }
        db_io.seek(SeekFrom::Start(offset)).unwrap();
        match db_io.read(page_data) {
            Ok(count) => {
                if count < PAGE_SIZE {
                    debug!(
                        "short read on page {}, zero-filling {} bytes",
                        page_id,
                        PAGE_SIZE - count
                    );
                    page_data[count..].fill(0);
                }
            }
            Err(e) => panic!("failed to read page {}: {:?}", page_id, e),
        }
    }

    /// Appends a record to the log file and syncs it before returning. An
    /// empty record is dropped and does not count as a flush.
    pub fn write_log(&self, log_data: &[u8]) {
        if log_data.is_empty() {
            return;
        }
        self.num_flushes.fetch_add(1, Ordering::Relaxed);

        let mut log_io = self.log_io.lock();
        if let Err(e) = log_io.write_all(log_data) {
            panic!("failed to append to the log: {:?}", e);
        }
        log_io.flush().unwrap();
    }

    /// Fills `log_data` from the log starting at `offset`, zero-padding a
    /// short read. Returns false when `offset` is already past the end.
    pub fn read_log(&self, log_data: &mut [u8], offset: usize) -> bool {
        let mut log_io = self.log_io.lock();
        if offset as u64 >= log_io.metadata().unwrap().len() {
            debug!("log read at offset {} is past the end", offset);
            return false;
        }
        log_io.seek(SeekFrom::Start(offset as u64)).unwrap();
        match log_io.read(log_data) {
            Ok(count) => log_data[count..].fill(0),
            Err(e) => panic!("failed to read the log: {:?}", e),
        }
        true
    }

    /// Number of log flushes so far.
    pub fn get_num_flushes(&self) -> u32 {
        self.num_flushes.load(Ordering::Relaxed)
    }

    /// Number of page writes so far.
    pub fn get_num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    pub fn db_file_name(&self) -> &Path {
        &self.file_name
    }

    pub fn log_file_name(&self) -> &Path {
        &self.log_name
    }

    fn slot_offset(page_id: PageId) -> u64 {
        page_id as u64 * PAGE_SIZE as u64
    }
}
